use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::net::IpAddr;
use std::path::PathBuf;
use tabled::{Table, Tabled};
use tracing::debug;

use connfilter::config::Config;
use connfilter::error::FilterError;
use connfilter::{persist, FilterEngine};

#[derive(Parser)]
#[command(name = "connfilter")]
#[command(author, version, about = "Connection-time IP filter with timed bans")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Add a filter entry (bare address or address/prefix)
    Add {
        /// Address or CIDR mask, e.g. 192.0.2.5 or 192.0.2.0/24
        mask: String,

        /// Ban duration in minutes (0 = permanent)
        #[arg(long, default_value = "0")]
        duration: u32,
    },

    /// Remove a filter entry (exact mask match)
    Remove {
        /// Address or CIDR mask as originally added
        mask: String,
    },

    /// List active filter entries
    List {
        /// Output format (table, json, simple)
        #[arg(short, long, default_value = "table")]
        format: String,
    },

    /// Test whether an address would be allowed to connect
    Check {
        /// IP address to test
        ip: IpAddr,
    },

    /// Rewrite the persisted filter list
    Save,

    /// Generate default configuration file
    GenConfig {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Tabled)]
struct FilterRow {
    #[tabled(rename = "Duration")]
    duration: String,
    #[tabled(rename = "IP")]
    mask: String,
}

pub fn run_command(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::load_or_default()?,
    };

    let now = Utc::now();
    match cli.command {
        Commands::Add { mask, duration } => cmd_add(config, mask, duration, now),
        Commands::Remove { mask } => cmd_remove(config, mask, now),
        Commands::List { format } => cmd_list(config, format, now),
        Commands::Check { ip } => cmd_check(config, ip, now),
        Commands::Save => cmd_save(config, now),
        Commands::GenConfig { output } => cmd_gen_config(output),
    }
}

/// Build the engine from config and replay the persisted list, if any.
/// A mode directive in the list overrides the configured mode, exactly
/// as replaying it through the live admin surface would.
fn open_engine(config: &Config, now: DateTime<Utc>) -> Result<FilterEngine> {
    let mut engine = FilterEngine::new(config.filter.mode, config.filter.max_filters);

    let path = config.list_path();
    if path.exists() {
        let applied = persist::load(&path, &mut engine, now)
            .with_context(|| format!("Failed to load filter list: {}", path.display()))?;
        debug!(applied, "replayed persisted filter list");
    }

    Ok(engine)
}

fn save_engine(config: &Config, engine: &mut FilterEngine, now: DateTime<Utc>) -> Result<()> {
    let path = config.list_path();
    engine.sweep(now);
    persist::save(&path, engine.mode(), engine.entries())
        .with_context(|| format!("Failed to write filter list: {}", path.display()))
}

fn cmd_add(config: Config, mask: String, duration: u32, now: DateTime<Utc>) -> Result<()> {
    let mut engine = open_engine(&config, now)?;

    engine.add(&mask, duration, now)?;
    save_engine(&config, &mut engine, now)?;

    println!(
        "{} {} ({})",
        "Added:".green().bold(),
        mask,
        if duration == 0 {
            "permanent".to_string()
        } else {
            format!("{} min", duration)
        }
    );

    Ok(())
}

fn cmd_remove(config: Config, mask: String, now: DateTime<Utc>) -> Result<()> {
    let mut engine = open_engine(&config, now)?;

    match engine.remove(&mask, now) {
        Ok(removed) => {
            save_engine(&config, &mut engine, now)?;
            println!("{} {}", "Removed:".green().bold(), removed);
        }
        Err(FilterError::NotFound(_)) => {
            println!("{} didn't find {}", "Note:".yellow().bold(), mask);
        }
        Err(e) => return Err(e.into()),
    }

    Ok(())
}

fn cmd_list(config: Config, format: String, now: DateTime<Utc>) -> Result<()> {
    let mut engine = open_engine(&config, now)?;
    let filters = engine.list(now);

    if filters.is_empty() {
        println!("No filter entries");
        return Ok(());
    }

    match format.as_str() {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&filters)?);
        }
        "simple" => {
            for f in &filters {
                println!("{}", f.mask);
            }
        }
        _ => {
            let rows: Vec<FilterRow> = filters
                .iter()
                .map(|f| FilterRow {
                    duration: f.duration_label(),
                    mask: f.mask.to_string(),
                })
                .collect();

            println!("{}", Table::new(rows));
        }
    }

    Ok(())
}

fn cmd_check(config: Config, ip: IpAddr, now: DateTime<Utc>) -> Result<()> {
    let mut engine = open_engine(&config, now)?;

    if engine.check(ip, now) {
        println!("{} {} may connect", "Allowed:".green().bold(), ip);
    } else {
        println!("{} {} would be refused", "Refused:".red().bold(), ip);
    }

    Ok(())
}

fn cmd_save(config: Config, now: DateTime<Utc>) -> Result<()> {
    let mut engine = open_engine(&config, now)?;
    save_engine(&config, &mut engine, now)?;

    println!("{} {}", "Wrote".green().bold(), config.list_path().display());
    Ok(())
}

fn cmd_gen_config(output: Option<PathBuf>) -> Result<()> {
    let config = Config::default();
    let content = toml::to_string_pretty(&config)?;

    match output {
        Some(path) => {
            std::fs::write(&path, content)
                .with_context(|| format!("Failed to write config to {}", path.display()))?;
            println!("{} {}", "Wrote".green().bold(), path.display());
        }
        None => print!("{}", content),
    }

    Ok(())
}
