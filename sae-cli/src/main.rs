mod cli;
mod prompts;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use log::debug;
use std::path::Path;
use std::sync::Arc;

use sae_core::cache::ClaimedClients;
use sae_core::db::{copy_slot, infer_backend_type};
use sae_core::{
    clamp_int, create_backend, export_to_path, get_config_path, import_from_path,
    summary_markdown, AppConfig, AssetCacheWorker, BuildingField, CacheStorage, DiskCacheStorage,
    HttpNetwork, ProjectDocument, ProjectStore, Registration, Request, Route, BUILDINGS_COUNT_MAX,
    BUILDINGS_COUNT_MIN,
};

use crate::cli::{CacheCommand, Cli, Command, ConfigCommand, DbCommand};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => get_config_path()?,
    };
    let mut config = AppConfig::load(&config_path)?;
    if let Some(data) = &cli.data {
        // An explicit location picks its backend from the extension
        config.data_path = data.clone();
        config.backend = None;
    }
    debug!(
        "Using {} backend at {:?}",
        config.backend_type(),
        config.data_path
    );

    match &cli.command {
        Command::Cache(cmd) => return handle_cache_command(cmd, &config),
        Command::Config(cmd) => return handle_config_command(cmd, &config, &config_path),
        _ => {}
    }

    let mut store = open_store(&config)?;

    match &cli.command {
        Command::Show { json } => {
            if *json {
                println!("{}", store.export_document()?);
            } else {
                print_document(store.document());
            }
        }
        Command::Summary { markdown } => {
            if *markdown {
                print!("{}", summary_markdown(store.document()));
            } else {
                let summary = store.compute_summary();
                println!("{}: {}", "Buildings".blue(), summary.buildings);
                println!("{}: {}", "Total floors".blue(), summary.total_floors);
                println!("{}: {}", "Total devices".blue(), summary.total_devices);
            }
        }
        Command::Set { path, value } => {
            store.set_field(path, value)?;
            println!("{} {}", "Updated".green(), path);
        }
        Command::Buildings { count } => {
            let n = clamp_int(count, BUILDINGS_COUNT_MIN, BUILDINGS_COUNT_MAX);
            store.set_buildings_count(n)?;
            if n.to_string() != count.trim() {
                println!(
                    "{}",
                    format!("Building count adjusted to {}", n).yellow()
                );
            }
            println!(
                "{} {} buildings",
                "Project now has".green(),
                store.document().building.items.len()
            );
        }
        Command::Building {
            index,
            field,
            value,
        } => {
            let field: BuildingField = field.parse().map_err(|e: String| anyhow::anyhow!(e))?;
            let position = index
                .checked_sub(1)
                .context("Building numbers start at 1")?;
            store.set_building_field(position, field, value)?;

            let entry = &store.document().building.items[position];
            println!(
                "{} building {}: {} ({} floors, {} devices)",
                "Updated".green(),
                index,
                entry.name,
                entry.floors,
                entry.approx_devices
            );
        }
        Command::Import { file } => {
            let doc = import_from_path(&mut store, file)?;
            println!(
                "{} {} ({} buildings)",
                "Imported project".green(),
                doc.project.project_auto_id,
                doc.building.items.len()
            );
        }
        Command::Export { output } => match output {
            Some(output) => {
                let written = export_to_path(&store, output)?;
                println!("{} {}", "Exported to".green(), written.display());
            }
            None => println!("{}", store.export_document()?),
        },
        Command::Reset { yes } => {
            if !*yes && !prompts::confirm_reset()? {
                println!("{}", "Reset cancelled.".yellow());
                return Ok(());
            }
            let doc = store.reset()?;
            println!(
                "{} {}",
                "Started new project".green(),
                doc.project.project_auto_id
            );
        }
        Command::Wizard { route } => {
            let start = route.as_deref().map(Route::parse).unwrap_or(Route::Project);
            prompts::run_wizard(&mut store, start)?;
        }
        Command::Db(cmd) => handle_db_command(cmd, &store)?,
        Command::Cache(_) | Command::Config(_) => {}
    }

    Ok(())
}

fn open_store(config: &AppConfig) -> Result<ProjectStore> {
    let backend = create_backend(&config.data_path, Some(config.backend_type()))
        .with_context(|| format!("Failed to open storage at {:?}", config.data_path))?;
    Ok(ProjectStore::open_with_key(backend, &config.storage_key))
}

fn yes_no(value: bool) -> colored::ColoredString {
    if value {
        "yes".green()
    } else {
        "no".dimmed()
    }
}

fn print_document(doc: &ProjectDocument) {
    let project = &doc.project;
    println!("{}", "Project".blue().bold());
    println!("  {}: {}", "ID".blue(), project.project_auto_id);
    println!(
        "  {}: {}",
        "Systems integrator".blue(),
        project.systems_integrator_id
    );
    println!("  {}: {}", "Name".blue(), project.project_name);
    println!("  {}: {}", "Buildings".blue(), project.buildings_count);

    println!("\n{}", "Buildings".blue().bold());
    println!("  {:<4} {:<30} {:>8} {:>10}", "#", "Name", "Floors", "Devices");
    println!("  {}", "-".repeat(55));
    for (i, entry) in doc.building.items.iter().enumerate() {
        println!(
            "  {:<4} {:<30} {:>8} {:>10}",
            i + 1,
            truncate(&entry.name, 30),
            entry.floors,
            entry.approx_devices
        );
    }
    let summary = doc.summary();
    println!(
        "  {:<4} {:<30} {:>8} {:>10}",
        "",
        "Total".bold(),
        summary.total_floors,
        summary.total_devices
    );

    let solution = &doc.solution;
    println!("\n{}", "Solution".blue().bold());
    println!(
        "  {}: {}",
        "Connectivity".blue(),
        solution.connectivity.label()
    );
    println!("  {}: {}", "Cloud".blue(), yes_no(solution.includes_cloud));
    for (key, enabled) in &solution.integrations {
        println!("  {}: {}", key.blue(), yes_no(*enabled));
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max - 3).collect();
        format!("{}...", cut)
    }
}

fn handle_db_command(cmd: &DbCommand, store: &ProjectStore) -> Result<()> {
    let backend = store.backend();
    match cmd {
        DbCommand::Path => {
            let location = backend
                .path()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "(in memory)".to_string());
            println!("{} ({} backend)", location, backend.backend_type());
            println!("{}: {}", "Slot key".blue(), store.key());
        }
        DbCommand::Migrate { target } => {
            if backend.path() == Some(target.as_path()) {
                anyhow::bail!("Target is the current storage location");
            }
            let target_backend = create_backend(target, Some(infer_backend_type(target)))?;
            if copy_slot(backend, target_backend.as_ref(), store.key())? {
                println!(
                    "{} {} ({} backend)",
                    "Project copied to".green(),
                    target.display(),
                    target_backend.backend_type()
                );
            } else {
                println!("{}", "Nothing stored yet; nothing to copy.".yellow());
            }
        }
    }
    Ok(())
}

fn handle_config_command(cmd: &ConfigCommand, config: &AppConfig, path: &Path) -> Result<()> {
    match cmd {
        ConfigCommand::Init => {
            if path.exists() {
                println!("Config already exists at {}", path.display());
            } else {
                AppConfig::create_default(path)?;
                println!("{} {}", "Created".green(), path.display());
            }
        }
        ConfigCommand::Show => {
            println!("{}", format!("# {}", path.display()).dimmed());
            print!("{}", serde_yaml::to_string(config)?);
        }
    }
    Ok(())
}

fn handle_cache_command(cmd: &CacheCommand, config: &AppConfig) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;
    runtime.block_on(run_cache_command(cmd, config))
}

async fn run_cache_command(cmd: &CacheCommand, config: &AppConfig) -> Result<()> {
    let cache = config.cache.clone();
    let storage = Arc::new(DiskCacheStorage::new(&cache.dir));
    let network = Arc::new(HttpNetwork::new(cache.origin.as_deref())?);
    let clients = Arc::new(ClaimedClients::new());

    match cmd {
        CacheCommand::Install => {
            let assets = cache.assets.len();
            let mut registration = Registration::new(clients, network.clone());
            let worker = AssetCacheWorker::new(cache, storage, network);
            let report = registration.deploy(worker).await?;
            println!(
                "{} {} ({} assets)",
                "Installed and activated".green(),
                report.version,
                assets
            );
            print_deleted(&report.deleted);
        }
        CacheCommand::Activate => {
            let mut worker = AssetCacheWorker::restore_installed(cache, storage, network).await?;
            let report = worker.activate(clients.as_ref()).await?;
            println!("{} {}", "Activated".green(), report.version);
            print_deleted(&report.deleted);
        }
        CacheCommand::Status => {
            println!("{}: {}", "Cache dir".blue(), storage.root().display());
            let names = storage.keys().await?;
            if names.is_empty() {
                println!("{}", "No caches installed.".yellow());
            }
            for name in names {
                let marker = if name == cache.version {
                    "(current)".green()
                } else {
                    "(stale)".yellow()
                };
                println!("{} {}", name.bold(), marker);
                for url in storage.entry_urls(&name).await? {
                    println!("  {}", url);
                }
            }
        }
        CacheCommand::Fetch { url, navigate } => {
            let request = if *navigate {
                Request::navigate(url.as_str())
            } else {
                Request::get(url.as_str())
            };

            let registration = match AssetCacheWorker::resume(cache, storage, network.clone()).await {
                Ok(worker) => Registration::with_active(worker, clients, network),
                Err(e) => {
                    debug!("No active cache, fetching directly: {}", e);
                    Registration::new(clients, network)
                }
            };

            let response = registration.fetch(&request).await?;
            let status = format!("{} {}", response.status, response.status_text);
            if response.is_ok() {
                eprintln!("{}", status.green());
            } else {
                eprintln!("{}", status.red());
            }
            print!("{}", response.text());
        }
    }
    Ok(())
}

fn print_deleted(deleted: &[String]) {
    for name in deleted {
        println!("  {} {}", "Deleted stale cache".dimmed(), name);
    }
}
