// src/main.rs

use anyhow::Result;
use clap::{Parser, Subcommand};
use dpms::executor::{CancelToken, ExecuteEvent, ProgressSink};
use dpms::repository::{self, RepoConfig};
use dpms::solver::Request;
use dpms::version::parse_requirement;
use dpms::{Config, PackageManager};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "dpms")]
#[command(author, version, about = "Package manager with dependency resolution and atomic transactions", long_about = None)]
struct Cli {
    /// State directory (database, metadata cache, staging, journal)
    #[arg(long, default_value = "/var/lib/dpms", global = true)]
    state_dir: PathBuf,

    /// Root under which package files are installed
    #[arg(long, default_value = "/", global = true)]
    root: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the state directory and database
    Init {
        /// Repository to configure, as name=url (repeatable)
        #[arg(long = "repo")]
        repos: Vec<String>,
    },
    /// Refresh repository metadata
    Sync,
    /// Install packages, e.g. "app" or "app >=2.0"
    Install {
        /// Package requirements
        #[arg(required = true)]
        packages: Vec<String>,
        /// Show the plan without executing it
        #[arg(long)]
        dry_run: bool,
    },
    /// Remove installed packages
    Remove {
        /// Package names to remove
        #[arg(required = true)]
        packages: Vec<String>,
        /// Show the plan without executing it
        #[arg(long)]
        dry_run: bool,
    },
    /// Upgrade explicitly installed packages to their newest versions
    Upgrade {
        /// Show the plan without executing it
        #[arg(long)]
        dry_run: bool,
    },
    /// List installed packages
    List,
    /// Search available packages by name or description
    Search {
        /// Substring pattern
        pattern: String,
    },
    /// Show details for a package
    Info {
        /// Package name
        package: String,
    },
}

/// Prints transaction progress to stdout
struct ConsoleSink;

impl ProgressSink for ConsoleSink {
    fn on_event(&self, event: &ExecuteEvent) {
        match event {
            ExecuteEvent::Staging { package } => println!("  fetching {}", package),
            ExecuteEvent::Staged { package } => println!("  staged   {}", package),
            ExecuteEvent::Committing { step } => println!("  {}", step),
            ExecuteEvent::Committed => println!("Transaction committed"),
            ExecuteEvent::RolledBack => println!("Transaction rolled back; nothing was changed"),
        }
    }
}

fn open_engine(config: &Config) -> Result<PackageManager> {
    let providers = repository::load_providers(&config.repos_path())?;
    Ok(PackageManager::open(config.clone(), providers)?)
}

/// Plan, print, and (unless dry-run) execute a request
fn run_transaction(config: &Config, request: &Request, dry_run: bool) -> Result<()> {
    let mut pm = open_engine(config)?;
    let (store, warnings) = pm.load_store()?;
    for warning in &warnings {
        eprintln!("warning: {}", warning);
    }

    let plan = pm.plan_transaction(&store, request)?;
    if plan.is_empty() {
        println!("Nothing to do");
        return Ok(());
    }

    println!("Transaction plan: {}", plan);
    if dry_run {
        return Ok(());
    }

    pm.execute(&plan, request, &ConsoleSink, &CancelToken::new())?;
    Ok(())
}

fn main() -> Result<()> {
    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::new(cli.state_dir, cli.root);

    match cli.command {
        Commands::Init { repos } => {
            let mut configs = Vec::new();
            for spec in repos {
                let (name, url) = spec.split_once('=').ok_or_else(|| {
                    anyhow::anyhow!("Invalid repository spec '{}', expected name=url", spec)
                })?;
                configs.push(RepoConfig {
                    name: name.to_string(),
                    url: url.to_string(),
                });
            }

            info!("Initializing state at {}", config.state_dir.display());
            PackageManager::init(config.clone(), Vec::new())?;
            if !configs.is_empty() {
                repository::save_repo_configs(&config.repos_path(), &configs)?;
            }
            println!(
                "Initialized {} with {} repositories",
                config.state_dir.display(),
                configs.len()
            );
            Ok(())
        }
        Commands::Sync => {
            let pm = open_engine(&config)?;
            let (store, warnings) = pm.load_store()?;
            for warning in &warnings {
                eprintln!("warning: {}", warning);
            }
            println!("{} package names available", store.names().count());
            Ok(())
        }
        Commands::Install { packages, dry_run } => {
            let mut request = Request::new();
            for spec in &packages {
                let (name, constraint) = parse_requirement(spec)?;
                request = request.install(name, constraint);
            }
            run_transaction(&config, &request, dry_run)
        }
        Commands::Remove { packages, dry_run } => {
            let mut request = Request::new();
            for name in packages {
                request = request.remove(name);
            }
            run_transaction(&config, &request, dry_run)
        }
        Commands::Upgrade { dry_run } => {
            let pm = open_engine(&config)?;
            let request = pm.upgrade_request()?;
            drop(pm);
            if request.install.is_empty() {
                println!("No explicitly installed packages");
                return Ok(());
            }
            run_transaction(&config, &request, dry_run)
        }
        Commands::List => {
            let pm = open_engine(&config)?;
            let installed = pm.installed()?;
            if installed.is_empty() {
                println!("No packages installed");
                return Ok(());
            }
            for pkg in installed {
                let marker = if pkg.explicit { "" } else { " (dependency)" };
                println!("{} {}{}", pkg.name, pkg.version, marker);
            }
            Ok(())
        }
        Commands::Search { pattern } => {
            let pm = open_engine(&config)?;
            let (store, _) = pm.load_store()?;
            let hits = store.search(&pattern);
            if hits.is_empty() {
                println!("No packages matching '{}'", pattern);
                return Ok(());
            }
            for meta in hits {
                match &meta.description {
                    Some(desc) => println!("{} {} - {}", meta.name, meta.version, desc),
                    None => println!("{} {}", meta.name, meta.version),
                }
            }
            Ok(())
        }
        Commands::Info { package } => {
            let pm = open_engine(&config)?;
            let (store, _) = pm.load_store()?;

            let candidates = store.candidates(&package);
            let Some(newest) = candidates.first() else {
                anyhow::bail!("Package '{}' not found in any repository", package);
            };

            println!("Name:        {}", newest.name);
            println!("Version:     {}", newest.version);
            if let Some(desc) = &newest.description {
                println!("Description: {}", desc);
            }
            println!("Repository:  {}", newest.repository);
            if let Some(size) = newest.size {
                println!("Size:        {} bytes", size);
            }
            if !newest.depends.is_empty() {
                let deps: Vec<String> = newest
                    .depends
                    .iter()
                    .map(|d| format!("{} {}", d.name, d.constraint))
                    .collect();
                println!("Depends:     {}", deps.join(", "));
            }
            if !newest.conflicts.is_empty() {
                let conflicts: Vec<String> = newest
                    .conflicts
                    .iter()
                    .map(|c| format!("{} {}", c.name, c.constraint))
                    .collect();
                println!("Conflicts:   {}", conflicts.join(", "));
            }
            match pm.find_installed(&package)? {
                Some(row) => println!("Installed:   {}", row.version),
                None => println!("Installed:   no"),
            }
            Ok(())
        }
    }
}
