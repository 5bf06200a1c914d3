pub mod commands;

use std::path::PathBuf;

/// Connection flags shared by every MySQL subcommand. Anything left out
/// falls back to the configuration file.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct ConnectionArgs {
    /// MySQL host
    #[clap(long)]
    pub host: Option<String>,

    /// MySQL port
    #[clap(long)]
    pub port: Option<u16>,

    /// MySQL user
    #[clap(long)]
    pub user: Option<String>,

    /// MySQL password
    #[clap(long)]
    pub password: Option<String>,

    /// MySQL database
    #[clap(long)]
    pub database: Option<String>,
}

#[derive(clap::Subcommand, Debug)]
pub enum MySqlCommands {
    /// Dump the database into a gzip file
    Dump {
        #[clap(flatten)]
        connection: ConnectionArgs,

        /// Output file, defaults to a timestamped file in the backup directory
        #[clap(long, short)]
        output: Option<PathBuf>,

        /// Backup directory
        #[clap(long)]
        backup_dir: Option<PathBuf>,
    },

    /// Restore the database from a gzip dump
    Restore {
        #[clap(flatten)]
        connection: ConnectionArgs,

        /// Gzip dump to load
        #[clap(long, short)]
        file: PathBuf,

        /// Drop the database before restoring
        #[clap(long)]
        drop: bool,
    },

    /// Create the database if it does not exist
    CreateDatabase {
        #[clap(flatten)]
        connection: ConnectionArgs,

        /// Drop the database first
        #[clap(long)]
        drop: bool,
    },

    /// Check whether mysqldump supports --column-statistics
    Probe {
        #[clap(flatten)]
        connection: ConnectionArgs,
    },
}
