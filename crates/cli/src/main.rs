//! NalaBranch command-line tool.
//!
//! Provides subcommands for resolving branch tokens, deriving canonical ids
//! for legacy branch ids, printing backfill tables, and generating /
//! validating configuration files.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use comfy_table::{presets::UTF8_FULL, Cell, Color, ContentArrangement, Table};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use nalabranch_core::branch::{backfill_rows, BranchRegister, BranchResolver, GuidLayout};
use nalabranch_core::config::AppConfig;

/// Largest range accepted by `table`.
const MAX_TABLE_ROWS: i64 = 100_000;

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// NalaBranch command-line tool.
#[derive(Parser, Debug)]
#[command(
    name = "nalabranch",
    version,
    about = "Resolve branch tokens and derive canonical branch ids"
)]
struct Cli {
    /// Path to the TOML configuration file. Defaults apply when omitted.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override the configured GUID layout (mixed-endian, big-endian).
    #[arg(long, global = true)]
    layout: Option<GuidLayout>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Resolve raw branch tokens (UUIDs or legacy ids).
    Resolve {
        /// Tokens to resolve.
        #[arg(required = true, allow_negative_numbers = true)]
        raw: Vec<String>,

        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// Derive the canonical id of a legacy branch id.
    Derive {
        /// Legacy branch id.
        #[arg(allow_negative_numbers = true)]
        legacy_id: i32,
    },

    /// Print derived ids for a range of legacy ids.
    Table {
        /// First legacy id (inclusive).
        #[arg(long, allow_negative_numbers = true)]
        from: i32,

        /// Last legacy id (inclusive).
        #[arg(long, allow_negative_numbers = true)]
        to: i32,

        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// Print the backfill table for the configured branch register.
    Register {
        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// Generate a default configuration file.
    Init {
        /// Output path for the generated config file.
        #[arg(short, long, default_value = "./nalabranch.toml")]
        output: PathBuf,
    },

    /// Validate a configuration file.
    Validate,
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> ExitCode {
    // Minimal logging for CLI
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("warn"))
        .with_target(false)
        .without_time()
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Init { output } => cmd_init(&output),
        Commands::Validate => {
            let path = cli
                .config
                .as_deref()
                .context("validate requires --config <PATH>")?;
            cmd_validate(path)
        }
        command => {
            let config = load_config(cli.config.as_deref())?;
            let layout = cli.layout.unwrap_or(config.branch.guid_layout);
            let resolver = BranchResolver::new(layout);

            match command {
                Commands::Resolve { raw, json } => cmd_resolve(&resolver, &raw, json),
                Commands::Derive { legacy_id } => cmd_derive(&resolver, legacy_id),
                Commands::Table { from, to, json } => cmd_table(&resolver, from, to, json),
                Commands::Register { json } => cmd_register(&config, &resolver, json),
                Commands::Init { .. } | Commands::Validate => {
                    unreachable!("handled before loading configuration")
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Config helpers
// ---------------------------------------------------------------------------

fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    match path {
        Some(path) => {
            AppConfig::load_and_validate(path).context("failed to load configuration file")
        }
        None => {
            debug!("no configuration file given, using defaults");
            Ok(AppConfig::default())
        }
    }
}

// ---------------------------------------------------------------------------
// Subcommand implementations
// ---------------------------------------------------------------------------

fn cmd_resolve(resolver: &BranchResolver, tokens: &[String], json: bool) -> Result<()> {
    let results: Vec<_> = tokens
        .iter()
        .map(|raw| (raw, resolver.resolve(raw)))
        .collect();
    let failures = results.iter().filter(|(_, r)| r.is_err()).count();

    if json {
        let items: Vec<serde_json::Value> = results
            .iter()
            .map(|(raw, result)| match result {
                Ok(resolved) => serde_json::json!({
                    "raw": raw,
                    "ok": true,
                    "canonicalId": resolved.canonical_id,
                    "legacyId": resolved.legacy_id,
                }),
                Err(e) => serde_json::json!({
                    "raw": raw,
                    "ok": false,
                    "error": e.to_string(),
                }),
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&items)?);
    } else {
        let mut table = new_table(vec!["Input", "Canonical ID", "Legacy ID"]);
        for (raw, result) in &results {
            match result {
                Ok(resolved) => table.add_row(vec![
                    Cell::new(raw),
                    Cell::new(resolved.canonical_id),
                    Cell::new(
                        resolved
                            .legacy_id
                            .map(|id| id.to_string())
                            .unwrap_or_else(|| "—".to_string()),
                    ),
                ]),
                Err(e) => table.add_row(vec![
                    Cell::new(raw),
                    Cell::new(e).fg(Color::Red),
                    Cell::new("—"),
                ]),
            };
        }
        println!("{}", table);
    }

    if failures > 0 {
        anyhow::bail!("{} of {} branch tokens could not be resolved", failures, tokens.len());
    }
    Ok(())
}

fn cmd_derive(resolver: &BranchResolver, legacy_id: i32) -> Result<()> {
    println!("{}", resolver.derive(legacy_id));
    Ok(())
}

fn cmd_table(resolver: &BranchResolver, from: i32, to: i32, json: bool) -> Result<()> {
    let ids = legacy_range(from, to)?;

    if json {
        let rows: Vec<serde_json::Value> = ids
            .map(|id| {
                serde_json::json!({
                    "legacyId": id,
                    "canonicalId": resolver.derive(id),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
    } else {
        let mut table = new_table(vec!["Legacy ID", "Canonical ID"]);
        for id in ids {
            table.add_row(vec![Cell::new(id), Cell::new(resolver.derive(id))]);
        }
        println!("{}", table);
    }

    Ok(())
}

fn cmd_register(config: &AppConfig, resolver: &BranchResolver, json: bool) -> Result<()> {
    let path = config
        .branch
        .register_file
        .as_ref()
        .context("no branch.register_file configured")?;
    let entries = BranchRegister::load(path).context("failed to load branch register")?;
    let rows = backfill_rows(&entries, resolver.layout());

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    println!();
    println!("Branch register: {} ({} branches)", path.display(), rows.len());
    println!();

    let mut table = new_table(vec!["Legacy ID", "Name", "Code", "Canonical ID"]);
    for row in &rows {
        table.add_row(vec![
            Cell::new(row.legacy_id),
            Cell::new(&row.name),
            Cell::new(row.code.as_deref().unwrap_or("—")),
            Cell::new(row.canonical_id),
        ]);
    }
    println!("{}", table);

    Ok(())
}

fn cmd_init(output: &Path) -> Result<()> {
    let default_config = r#"# NalaBranch Configuration
# See documentation for all available options.

[server]
listen = "127.0.0.1:3000"
log_level = "info"
max_batch = 500

[branch]
# Byte layout for derived ids. Must match ids already stored downstream.
guid_layout = "mixed-endian"
claim_header = "x-branch-id"
# register_file = "/etc/nalabranch/branches.toml"
"#;

    if output.exists() {
        anyhow::bail!(
            "file already exists: {}. Use a different path or remove the existing file.",
            output.display()
        );
    }

    std::fs::write(output, default_config).context("failed to write config file")?;

    println!("Default configuration written to {}", output.display());
    println!();
    println!("Next steps:");
    println!("  1. Point branch.register_file at your legacy branch register");
    println!(
        "  2. Validate with: nalabranch validate --config {}",
        output.display()
    );
    println!(
        "  3. Start the daemon: nalabranch-daemon --config {}",
        output.display()
    );

    Ok(())
}

fn cmd_validate(config_path: &Path) -> Result<()> {
    println!("Validating configuration: {}", config_path.display());
    println!();

    let config = AppConfig::load_from_file(config_path).context("failed to parse configuration")?;
    println!("  [OK] TOML structure is valid");

    match config.validate() {
        Ok(()) => {
            println!("  [OK] All fields are valid");
        }
        Err(e) => {
            println!("  [FAIL] Validation error: {}", e);
            anyhow::bail!("configuration validation failed");
        }
    }

    if let Some(path) = &config.branch.register_file {
        match BranchRegister::load(path) {
            Ok(entries) => println!("  [OK] Branch register loaded ({} branches)", entries.len()),
            Err(e) => {
                println!("  [FAIL] Branch register: {}", e);
                anyhow::bail!("branch register could not be loaded");
            }
        }
    }

    println!();
    println!("Configuration summary:");
    println!("  Listen        : {}", config.server.listen);
    println!("  Log level     : {}", config.server.log_level);
    println!("  Max batch     : {}", config.server.max_batch);
    println!("  GUID layout   : {}", config.branch.guid_layout);
    println!("  Claim header  : {}", config.branch.claim_header);
    println!(
        "  Register      : {}",
        config
            .branch
            .register_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none)".to_string())
    );

    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(header);
    table
}

/// Inclusive id range, bounded by [`MAX_TABLE_ROWS`].
fn legacy_range(from: i32, to: i32) -> Result<std::ops::RangeInclusive<i32>> {
    if from > to {
        anyhow::bail!("--from ({}) must not exceed --to ({})", from, to);
    }
    let rows = i64::from(to) - i64::from(from) + 1;
    if rows > MAX_TABLE_ROWS {
        anyhow::bail!(
            "range of {} ids exceeds the limit of {} rows",
            rows,
            MAX_TABLE_ROWS
        );
    }
    Ok(from..=to)
}
