//! # vmig
//!
//! Migrates a Markdown vault (front matter, wiki embeds, local attachments)
//! into a Notion database.
//!
//! ## Usage
//!
//! ```bash
//! vmig --config ./vmig.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `vmig migrate` | Upload attachments and create one page per document |
//! | `vmig migrate --dry-run` | Convert everything without calling the API |
//! | `vmig check` | Validate the configuration and reach the database |
//! | `vmig init <path>` | Write a commented sample configuration |
//! | `vmig completions <shell>` | Print shell completions |
//!
//! ## Examples
//!
//! ```bash
//! # Preview a migration without a config file
//! vmig migrate --dry-run --vault ~/Notes --output report.json
//!
//! # Migrate one folder of the vault
//! NOTION_TOKEN=secret_... vmig migrate --subfolder Projects
//! ```
//!
//! The process exits with status 1 when any page or upload failed.

use anyhow::Result;
use clap::{Args, CommandFactory, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use vault_migrate::client::NotionClient;
use vault_migrate::config::{self, Config};
use vault_migrate::logging;
use vault_migrate::migrate::Migrator;
use vault_migrate::progress::ProgressMode;

/// Migrate a Markdown vault with attachments into a Notion database.
#[derive(Parser)]
#[command(
    name = "vmig",
    about = "Migrate a Markdown vault with attachments into a Notion database",
    version
)]
struct Cli {
    /// Path to the configuration file (TOML).
    ///
    /// May be absent when `--vault` is given; every other setting then
    /// takes its default.
    #[arg(long, global = true, default_value = "./vmig.toml")]
    config: PathBuf,

    /// Log at debug level.
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Also append log output to this file.
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the migration.
    ///
    /// Scans the vault, uploads every referenced file once, then creates one
    /// database page per document.
    Migrate {
        /// Convert everything but send nothing to the API.
        #[arg(long)]
        dry_run: bool,

        /// Write the JSON report to this file.
        #[arg(long)]
        output: Option<PathBuf>,

        /// Progress display on stderr (default: human when stderr is a TTY).
        #[arg(long, value_enum)]
        progress: Option<ProgressMode>,

        #[command(flatten)]
        overrides: Overrides,
    },

    /// Validate the configuration and fetch the target database.
    Check {
        #[command(flatten)]
        overrides: Overrides,
    },

    /// Write a commented sample configuration file.
    Init {
        /// Where to write the file.
        #[arg(default_value = "./vmig.toml")]
        path: PathBuf,
    },

    /// Print shell completions to stdout.
    Completions {
        shell: clap_complete::Shell,
    },
}

/// Command-line values that replace configuration file values.
#[derive(Args, Default)]
struct Overrides {
    /// Vault root directory.
    #[arg(long)]
    vault: Option<PathBuf>,

    /// Target database id.
    #[arg(long)]
    database: Option<String>,

    /// Notion integration token (falls back to `NOTION_TOKEN`).
    #[arg(long)]
    token: Option<String>,

    /// Number of concurrent uploads.
    #[arg(long)]
    workers: Option<usize>,

    /// Only migrate documents under this folder of the vault.
    #[arg(long)]
    subfolder: Option<PathBuf>,
}

impl Overrides {
    fn apply(&self, cfg: &mut Config) {
        if let Some(vault) = &self.vault {
            let root = config::expand_home(vault);
            cfg.vault.root = root.canonicalize().unwrap_or(root);
        }
        if let Some(database) = &self.database {
            cfg.notion.database_id = database.clone();
        }
        if let Some(token) = &self.token {
            cfg.notion.token = Some(token.clone());
        }
        if let Some(workers) = self.workers {
            cfg.upload.max_workers = workers;
        }
        if let Some(subfolder) = &self.subfolder {
            cfg.vault.target_subfolder = Some(subfolder.clone());
        }
    }
}

/// Load the config file (or defaults when only `--vault` is given) and
/// apply the command-line overrides.
fn resolve_config(path: &Path, overrides: &Overrides) -> Result<Config> {
    let mut cfg = match &overrides.vault {
        Some(vault) if !path.exists() => Config::for_vault(vault),
        _ => config::load_config(path)?,
    };
    overrides.apply(&mut cfg);
    Ok(cfg)
}

fn notion_client(cfg: &Config) -> Result<Arc<NotionClient>> {
    let token = cfg
        .token()
        .ok_or_else(|| anyhow::anyhow!("Notion API token is required"))?;
    Ok(Arc::new(NotionClient::new(&cfg.notion, token)?))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose, cli.log_file.as_deref())?;

    match cli.command {
        Commands::Migrate {
            dry_run,
            output,
            progress,
            overrides,
        } => {
            let cfg = resolve_config(&cli.config, &overrides)?;
            cfg.validate(dry_run)?;

            let progress = progress.unwrap_or_else(ProgressMode::default_for_tty);
            let migrator = if dry_run {
                Migrator::dry_run(cfg)
            } else {
                let client = notion_client(&cfg)?;
                Migrator::new(cfg, client)
            };
            let migrator = migrator.with_progress(progress.reporter());

            let report = migrator.run().await?;
            report.print_summary();
            if let Some(path) = output {
                report.write_json(&path)?;
                println!("Report written to {}", path.display());
            }
            if report.has_failures() {
                std::process::exit(1);
            }
        }
        Commands::Check { overrides } => {
            let cfg = resolve_config(&cli.config, &overrides)?;
            cfg.validate(false)?;
            let migrator = Migrator::new(cfg.clone(), notion_client(&cfg)?);
            let title = migrator.preflight().await?.unwrap_or_default();
            println!("vault:    {}", cfg.vault.root.display());
            println!("database: {} ({})", title, cfg.notion.database_id);
            println!("ok");
        }
        Commands::Init { path } => {
            config::write_sample_config(&path)?;
            println!("Sample configuration written to {}", path.display());
            println!("Edit database_id and vault.root, then run `vmig check`.");
        }
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "vmig", &mut std::io::stdout());
        }
    }

    Ok(())
}
