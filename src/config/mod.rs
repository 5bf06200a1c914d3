use anyhow::{anyhow, Result};
use clap::{Args, Subcommand};

use common::config::{load_config, update_config, MyWardenConfig};

#[derive(Debug, Args)]
pub struct Config {
    #[clap(subcommand)]
    command: ConfigCommands,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Show the effective configuration
    Get {
        /// Output format (toml, json, text)
        #[clap(long, default_value = "text")]
        format: String,
    },
    /// Write the effective configuration to the first writable config path
    Init,
}

impl Config {
    pub async fn run(self) -> Result<()> {
        match self.command {
            ConfigCommands::Get { format } => {
                let config = load_config()?;
                println!("{}", render(&config, &format)?);
            }
            ConfigCommands::Init => {
                let config = load_config()?;
                let path = update_config(&config).map_err(|e| anyhow!(e.to_string()))?;
                println!("Configuration written to {}", path.display());
            }
        }

        Ok(())
    }
}

fn render(config: &MyWardenConfig, format: &str) -> Result<String> {
    let rendered = match format {
        "toml" => toml::to_string_pretty(config)?,
        "json" => serde_json::to_string_pretty(config)?,
        "text" => {
            let or_unset = |value: Option<String>| value.unwrap_or_else(|| "<not set>".to_string());
            let mut lines = vec!["mywarden configuration:".to_string()];
            lines.push("  MySQL:".to_string());
            lines.push(format!("    Host: {}", config.mysql.host));
            lines.push(format!("    Port: {}", or_unset(config.mysql.port.map(|p| p.to_string()))));
            lines.push(format!("    User: {}", config.mysql.user));
            lines.push(format!(
                "    Password: {}",
                if config.mysql.password.is_some() { "<set>" } else { "<not set>" }
            ));
            lines.push(format!("    Database: {}", or_unset(config.mysql.database.clone())));
            lines.push("  Tools:".to_string());
            lines.push(format!(
                "    mysqldump: {}",
                or_unset(config.tools.mysqldump.as_ref().map(|p| p.display().to_string()))
            ));
            lines.push(format!(
                "    mysql: {}",
                or_unset(config.tools.mysql.as_ref().map(|p| p.display().to_string()))
            ));
            lines.push(format!("    Column statistics: {:?}", config.tools.column_statistics));
            lines.push(format!("  Backup directory: {}", config.backup.dir.display()));
            lines.join("\n")
        }
        _ => return Err(anyhow!("Invalid format: {}", format)),
    };

    Ok(rendered)
}
