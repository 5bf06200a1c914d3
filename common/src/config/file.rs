use config::{Config, ConfigError, File};
use log::{debug, error, info};
use serde::{de, Deserialize, Deserializer, Serialize};
use std::fmt::Display;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Configuration search path, lowest precedence first.
pub const CONFIG_PATHS: [&str; 3] = [
    "/etc/mywarden/mywarden.toml",
    "~/.config/mywarden/mywarden.toml",
    "mywarden.toml",
];

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MyWardenConfig {
    pub mysql: MySqlSection,
    pub tools: ToolsConfig,
    pub backup: BackupConfig,
}

/// Connection defaults; every field can be overridden on the command line.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MySqlSection {
    pub host: String,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub port: Option<u16>,
    pub user: String,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub password: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub database: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ToolsConfig {
    /// Absolute path to `mysqldump`, bypassing the `PATH` lookup
    #[serde(default, deserialize_with = "empty_as_none")]
    pub mysqldump: Option<PathBuf>,
    /// Absolute path to `mysql`, bypassing the `PATH` lookup
    #[serde(default, deserialize_with = "empty_as_none")]
    pub mysql: Option<PathBuf>,
    pub column_statistics: ColumnStatistics,
}

/// How to decide whether `mysqldump` gets `--column-statistics=0`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnStatistics {
    /// Trial run of the installed tool
    #[default]
    Auto,
    On,
    Off,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackupConfig {
    pub dir: PathBuf,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./backups"),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Integer(i64),
    Text(String),
}

/// Optional values accept `""` as unset, and numbers or strings alike.
fn empty_as_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: Display,
{
    let text = match Option::<Scalar>::deserialize(deserializer)? {
        None => return Ok(None),
        Some(Scalar::Integer(n)) => n.to_string(),
        Some(Scalar::Text(s)) if s.is_empty() => return Ok(None),
        Some(Scalar::Text(s)) => s,
    };
    text.parse().map(Some).map_err(de::Error::custom)
}

fn expand(path: &str) -> Result<String, ConfigError> {
    shellexpand::full(path)
        .map(|p| p.into_owned())
        .map_err(|e| ConfigError::Message(format!("Failed to expand {path}: {e}")))
}

pub fn load_config() -> Result<MyWardenConfig, ConfigError> {
    load_config_from(&CONFIG_PATHS)
}

/// Loads configuration from the given files, skipping the ones that do not exist.
pub fn load_config_from(config_paths: &[&str]) -> Result<MyWardenConfig, ConfigError> {
    let mut config_builder = Config::builder()
        .set_default("mysql.host", "localhost")?
        .set_default("mysql.port", None::<i64>)?
        .set_default("mysql.user", "root")?
        .set_default("mysql.password", None::<String>)?
        .set_default("mysql.database", None::<String>)?
        .set_default("tools.mysqldump", None::<String>)?
        .set_default("tools.mysql", None::<String>)?
        .set_default("tools.column_statistics", "auto")?
        .set_default("backup.dir", "./backups")?;

    for path in config_paths {
        let path = expand(path)?;
        if Path::new(&path).exists() {
            debug!("Loading configuration from {path}");
            config_builder = config_builder.add_source(File::with_name(&path));
        }
    }

    config_builder.build()?.try_deserialize()
}

/// Updates the configuration file with the provided config values
///
/// Writes to the first path in [`CONFIG_PATHS`] that can be created, so a
/// system-wide file wins when the process has the rights for it.
pub fn update_config(config: &MyWardenConfig) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let toml_string = toml::to_string_pretty(config)?;

    for path in CONFIG_PATHS {
        let expanded_path = expand(path)?;
        let path_obj = Path::new(&expanded_path);

        if let Some(parent) = path_obj.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                if let Err(e) = fs::create_dir_all(parent) {
                    error!("Failed to create directory {}: {}", parent.display(), e);
                    continue;
                }
            }
        }

        match fs::File::create(path_obj) {
            Ok(mut file) => {
                if let Err(e) = file.write_all(toml_string.as_bytes()) {
                    error!("Failed to write to {}: {}", expanded_path, e);
                    continue;
                }

                info!("Configuration updated successfully at {}", expanded_path);
                return Ok(path_obj.to_path_buf());
            }
            Err(e) => {
                error!("Failed to create file {}: {}", expanded_path, e);
                continue;
            }
        }
    }

    Err("Failed to update configuration: could not write to any config file path".into())
}
