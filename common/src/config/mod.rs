mod file;

pub use file::{
    load_config, load_config_from, update_config, BackupConfig, ColumnStatistics, MySqlSection,
    MyWardenConfig, ToolsConfig, CONFIG_PATHS,
};
