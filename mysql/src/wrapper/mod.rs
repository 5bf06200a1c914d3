pub mod mysql;
pub mod mysqldump;

// Re-export for convenience
pub use mysql::{ensure_database_statement, MySqlClient};
pub use mysqldump::{
    dump_args, ColumnStatisticsProbe, FixedProbe, MySqlDump, TrialRunProbe,
    COLUMN_STATISTICS_FLAG,
};
