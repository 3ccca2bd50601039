//! Bundle Control - CLI for the over-the-air bundle updater.
//!
//! Drives the full lifecycle against the configured storage roots:
//! check the update endpoint, download or sideload a bundle, then
//! activate, delete, or reset.

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use bundle_common::{BundleUpdater, UpdaterConfig};

#[derive(Parser)]
#[command(name = "bundlectl")]
#[command(about = "Over-the-air bundle updater", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the updater config file
    #[arg(long, global = true, default_value = "bundle-updater.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask the update endpoint for the latest bundle descriptor
    Check,

    /// Download a bundle and install it into both storage roots
    Download {
        /// Archive URL; defaults to whatever the update endpoint advertises
        url: Option<String>,
    },

    /// Install a local archive into both storage roots
    Install {
        /// Path to a .tar.gz bundle
        archive: PathBuf,
    },

    /// List stored version identifiers
    List,

    /// Activate a stored version
    Activate {
        /// Version identifier returned by download/install
        identifier: String,
        /// Display name for the version
        name: String,
    },

    /// Delete a stored version from both roots
    Delete {
        /// Version identifier
        identifier: String,
        /// Display name for the version
        name: String,
    },

    /// Clear the activation pointer
    Reset,

    /// Show the currently active version
    Current,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let config = UpdaterConfig::load_or_default(&cli.config);
    let mut updater = BundleUpdater::new(config);

    match cli.command {
        Commands::Check => check(&updater),
        Commands::Download { url } => download(&mut updater, url),
        Commands::Install { archive } => {
            let id = updater.install_from_archive(&archive)?;
            println!("installed {}", id);
            Ok(())
        }
        Commands::List => {
            for id in updater.list() {
                println!("{}", id);
            }
            Ok(())
        }
        Commands::Activate { identifier, name } => {
            if updater.activate(&identifier, &name) {
                println!("active: {} ({})", identifier, name);
                Ok(())
            } else {
                bail!("{} is not complete in both roots", identifier);
            }
        }
        Commands::Delete { identifier, name } => {
            if updater.delete(&identifier, &name) {
                println!("deleted {}", identifier);
                Ok(())
            } else {
                bail!("could not delete {}", identifier);
            }
        }
        Commands::Reset => {
            updater.reset();
            println!("activation pointer cleared");
            Ok(())
        }
        Commands::Current => {
            let name = updater.active_version_name();
            if name.is_empty() {
                println!("no active version");
            } else {
                println!("name:    {}", name);
                println!("primary: {}", updater.active_primary_path());
                println!("durable: {}", updater.active_durable_path());
            }
            Ok(())
        }
    }
}

fn check(updater: &BundleUpdater) -> Result<()> {
    match updater.check_for_update() {
        Some(latest) => {
            println!("version: {}", latest.version);
            println!("url:     {}", latest.url);
            if latest.major {
                println!("major:   yes");
            }
            if let Some(message) = latest.message {
                println!("message: {}", message);
            }
        }
        None => println!("no update available"),
    }
    Ok(())
}

fn download(updater: &mut BundleUpdater, url: Option<String>) -> Result<()> {
    let url = match url {
        Some(url) => url,
        None => match updater.check_for_update() {
            Some(latest) => latest.url,
            None => bail!("no update available and no URL given"),
        },
    };

    updater.on_progress(|percent| println!("{:>3}%", percent));
    let id = updater.download(&url)?;
    println!("downloaded {}", id);
    Ok(())
}
