//! `routesync` - CLI for the local route record store
//!
//! This binary inspects and maintains the records kept on this device. It has
//! no remote connection, so listings show the local-only view.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;

use routesync::cli::{
    record_table, state_label, ClearCommand, Cli, Command, ConfigCommand, ListCommand,
    RemoveCommand, RenameCommand, ShowCommand, TerminalConfirm,
};
use routesync::{
    init_logging, Config, DeleteOutcome, OfflineGateway, RecordFilter, RecordManager,
    RecordState, RouteRecord,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    // Load configuration
    let config = Config::load_from(cli.config.clone()).context("loading configuration")?;

    match cli.command {
        Command::List(cmd) => handle_list(&config, &cmd).await,
        Command::Show(cmd) => handle_show(&config, &cmd).await,
        Command::Rename(cmd) => handle_rename(&config, &cmd).await,
        Command::Remove(cmd) => handle_remove(&config, &cmd).await,
        Command::Clear(cmd) => handle_clear(&config, &cmd).await,
        Command::Config(cmd) => handle_config(&config, cmd),
    }
}

fn manager(config: &Config) -> RecordManager {
    RecordManager::from_config(config, Arc::new(OfflineGateway), Arc::new(OfflineGateway))
}

async fn find(manager: &RecordManager, id: &str) -> anyhow::Result<RouteRecord> {
    manager
        .local_record(id)
        .await?
        .with_context(|| format!("no local record with id {id}"))
}

async fn handle_list(config: &Config, cmd: &ListCommand) -> anyhow::Result<()> {
    let manager = manager(config);
    let filter = cmd
        .filter
        .map_or(manager.default_filter(), RecordFilter::from);
    let view = manager.load(filter).await?;

    if cmd.json {
        let records: Vec<_> = view.records.iter().map(|r| &r.record).collect();
        println!("{}", serde_json::to_string_pretty(&records)?);
    } else {
        print!("{}", record_table(&view));
    }
    Ok(())
}

async fn handle_show(config: &Config, cmd: &ShowCommand) -> anyhow::Result<()> {
    let manager = manager(config);
    let record = find(&manager, &cmd.id).await?;

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&record)?);
    } else {
        println!("Record {}", record.id);
        println!("---------------------");
        println!("Name:       {}", record.display_name());
        println!("State:      {}", state_label(&record));
        println!("Captured:   {}", record.timestamp.to_rfc3339());
        println!("Model:      {}", record.model_id().unwrap_or("-"));
        println!("Crag:       {}", record.crag_id().unwrap_or("-"));
        println!("Route:      {}", record.route_id().unwrap_or("-"));
        if let Some(remote_id) = record.remote_id() {
            println!("Remote id:  {remote_id}");
        }
        if let Some(uploaded_at) = record.uploaded_at {
            println!("Uploaded:   {}", uploaded_at.to_rfc3339());
        }
    }
    Ok(())
}

async fn handle_rename(config: &Config, cmd: &RenameCommand) -> anyhow::Result<()> {
    let manager = manager(config);
    let record = find(&manager, &cmd.id).await?;
    let renamed = manager.rename(&record, &cmd.name).await?;
    println!("Renamed {} to \"{}\".", renamed.id, renamed.display_name());
    Ok(())
}

async fn handle_remove(config: &Config, cmd: &RemoveCommand) -> anyhow::Result<()> {
    let manager = manager(config);
    let record = find(&manager, &cmd.id).await?;

    if record.state() != RecordState::LocalOnly {
        bail!(
            "record {} is uploaded; delete it from a connected client so the remote copy is removed too",
            record.id
        );
    }

    let confirm = TerminalConfirm { assume_yes: cmd.yes };
    match manager.delete(&record, &confirm).await? {
        DeleteOutcome::Cancelled => println!("Cancelled."),
        _ => println!("Removed {}.", record.id),
    }
    Ok(())
}

async fn handle_clear(config: &Config, cmd: &ClearCommand) -> anyhow::Result<()> {
    let manager = manager(config);
    let count = manager.store().count().await?;

    if !cmd.yes {
        println!("This will delete {count} local records, including uploaded ones.");
        println!("Use --yes to confirm.");
        return Ok(());
    }

    manager.store().clear().await?;
    println!("Removed {count} local records.");
    Ok(())
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Storage]");
                println!("  Records path:       {}", config.records_path().display());
                println!("  Pretty JSON:        {}", config.storage.pretty);
                println!();
                println!("[Remote]");
                println!("  List timeout (ms):  {}", config.remote.list_timeout_ms);
                println!("  Request timeout:    {}", config.remote.request_timeout_ms);
                println!();
                println!("[View]");
                println!("  Default filter:     {}", config.view.default_filter);
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => println!("Configuration error: {e}"),
            }
        }
    }
    Ok(())
}
