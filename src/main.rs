mod config;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[clap(
    name = "mywarden",
    about = "Compressed MySQL dumps and restores through the official client tools",
    version
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// MySQL backup and restore commands
    #[clap(subcommand)]
    Mysql(mysql::cli::MySqlCommands),

    /// Manage the mywarden configuration
    Config(config::Config),
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .format_timestamp(None)
        .format_level(true)
        .format_module_path(false)
        .format_indent(Some(4))
        .filter_level(log::LevelFilter::Info)
        .try_init()?;

    let cli = Cli::parse();

    match cli.command {
        Commands::Mysql(mysql_command) => mysql::cli::commands::run(mysql_command).await?,
        Commands::Config(config) => config.run().await?,
    }

    Ok(())
}
