use anyhow::{anyhow, Context, Result};
use log::info;
use std::path::PathBuf;
use std::sync::Arc;

use common::config::{load_config, MyWardenConfig};

use crate::cli::{ConnectionArgs, MySqlCommands};
use crate::common::{format_bytes, MySqlConfig};
use crate::manager::MySqlManager;
use crate::tools::SystemResolver;

/// Merges command line flags over the configuration file.
pub fn connection_config(args: &ConnectionArgs, settings: &MyWardenConfig) -> Result<MySqlConfig> {
    let database = args
        .database
        .clone()
        .or_else(|| settings.mysql.database.clone())
        .ok_or_else(|| anyhow!("No database given: pass --database or set mysql.database"))?;

    let config = MySqlConfig::new(
        args.host.clone().unwrap_or_else(|| settings.mysql.host.clone()),
        args.port.or(settings.mysql.port),
        args.user.clone().unwrap_or_else(|| settings.mysql.user.clone()),
        args.password.clone().or_else(|| settings.mysql.password.clone()),
        database,
    )?;

    Ok(config)
}

fn manager(args: &ConnectionArgs, settings: &MyWardenConfig) -> Result<MySqlManager> {
    let config = connection_config(args, settings)?;
    info!(
        "[CLI] Params: host={}, port={:?}, database={}, user={}",
        config.host, config.port, config.database, config.user
    );

    Ok(MySqlManager::new(config)
        .with_resolver(Arc::new(SystemResolver::from_config(&settings.tools)))
        .with_column_statistics(settings.tools.column_statistics))
}

pub async fn run(command: MySqlCommands) -> Result<()> {
    let settings = load_config().context("Failed to load configuration")?;

    match command {
        MySqlCommands::Dump {
            connection,
            output,
            backup_dir,
        } => dump(&connection, output, backup_dir, &settings).await,
        MySqlCommands::Restore {
            connection,
            file,
            drop,
        } => restore(&connection, file, drop, &settings).await,
        MySqlCommands::CreateDatabase { connection, drop } => {
            create_database(&connection, drop, &settings).await
        }
        MySqlCommands::Probe { connection } => probe(&connection, &settings).await,
    }
}

pub async fn dump(
    connection: &ConnectionArgs,
    output: Option<PathBuf>,
    backup_dir: Option<PathBuf>,
    settings: &MyWardenConfig,
) -> Result<()> {
    info!("[CLI] Entering dump");
    let manager = manager(connection, settings)?;

    let dump = match output {
        Some(path) => manager.dump_to(&path).await,
        None => {
            let dir = backup_dir.unwrap_or_else(|| settings.backup.dir.clone());
            manager.backup(&dir).await
        }
    }
    .with_context(|| format!("Failed to dump database `{}`", manager.config().database))?;

    println!(
        "Dump written to {} ({})",
        dump.path.display(),
        format_bytes(dump.size_bytes)
    );
    Ok(())
}

pub async fn restore(
    connection: &ConnectionArgs,
    file: PathBuf,
    drop: bool,
    settings: &MyWardenConfig,
) -> Result<()> {
    info!("[CLI] Entering restore");
    let manager = manager(connection, settings)?;

    manager.restore(&file, drop).await.with_context(|| {
        format!(
            "Failed to restore '{}' into `{}`",
            file.display(),
            manager.config().database
        )
    })?;

    println!(
        "Restored {} into {}",
        file.display(),
        manager.config().database
    );
    Ok(())
}

pub async fn create_database(
    connection: &ConnectionArgs,
    drop: bool,
    settings: &MyWardenConfig,
) -> Result<()> {
    info!("[CLI] Entering create_database");
    let manager = manager(connection, settings)?;

    manager
        .client()
        .ensure_database(drop)
        .await
        .with_context(|| format!("Failed to create database `{}`", manager.config().database))?;

    println!("Database {} is ready", manager.config().database);
    Ok(())
}

pub async fn probe(connection: &ConnectionArgs, settings: &MyWardenConfig) -> Result<()> {
    let manager = manager(connection, settings)?;
    let dumper = manager.dumper();

    let dump_version = dumper.version().await.context("mysqldump is not available")?;
    let client_version = manager
        .client()
        .version()
        .await
        .context("mysql is not available")?;
    let supported = dumper.supports_column_statistics().await;

    println!("{dump_version}");
    println!("{client_version}");
    println!("column statistics: {}", if supported { "supported" } else { "unsupported" });
    Ok(())
}
