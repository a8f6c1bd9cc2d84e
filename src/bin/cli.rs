//! pt-intel CLI
//!
//! Local entry point for running the engine against the configured sites.
//! Results are printed to stdout as JSON; logs go to stderr.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use clap::{Parser, Subcommand};
use pt_intel::{
    client::HttpClientRegistry,
    config::{ProfileStore, load_config},
    engine::{IntelEngine, Repositories},
    error::{AppError, Result},
    models::{Config, IntelSiteProfile, TorrentSearchParams},
    parsers::ParserRegistry,
    pipeline,
    services::SyncMode,
    storage::LocalStorage,
    utils::http::ReqwestSiteClient,
};
use serde::Serialize;

/// pt-intel - Local Site Intelligence Engine
#[derive(Parser, Debug)]
#[command(
    name = "pt-intel",
    version,
    about = "HR tracking, inbox signals, site guard and catalogue indexing for private trackers"
)]
struct Cli {
    /// Path to the engine configuration file
    #[arg(short, long, default_value = "data/config.toml")]
    config: PathBuf,

    /// Directory of site profiles (overrides paths.sites_dir)
    #[arg(long)]
    sites_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Refresh HR and inbox state and print the resulting actions
    Refresh {
        /// Only refresh this site
        #[arg(long)]
        site: Option<String>,
    },

    /// Sync the torrent catalogue of a site
    Index {
        #[arg(long)]
        site: String,

        /// Full scan instead of the newest pages only
        #[arg(long)]
        full: bool,

        /// Page limit (defaults from config)
        #[arg(long)]
        max_pages: Option<u32>,
    },

    /// Search the local catalogue
    Search {
        keyword: Option<String>,

        #[arg(long)]
        site: Option<String>,

        #[arg(long, default_value_t = 20)]
        limit: usize,
    },

    /// Check whether a torrent's source files may be removed
    MoveSafe {
        #[arg(long)]
        site: String,

        #[arg(long)]
        torrent: String,
    },

    /// Show the current scan budget and latest block of a site
    Budget {
        #[arg(long)]
        site: String,
    },

    /// List loaded site profiles
    Profiles,

    /// Validate configuration and site profiles
    Validate,
}

/// Initialize logging; `RUST_LOG` overrides the given level.
fn init_logging(level: &str) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Session cookie for a site from `PT_INTEL_COOKIE_<SITE>`.
fn session_cookie(site: &str) -> Option<String> {
    let key = format!("PT_INTEL_COOKIE_{}", site.to_uppercase().replace('-', "_"));
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn build_engine(config: &Config, profiles: &[IntelSiteProfile]) -> Result<IntelEngine> {
    let storage = Arc::new(LocalStorage::new(&config.paths.storage_dir));
    log::debug!("Engine state stored in {}", storage.root_dir().display());
    let clients = Arc::new(HttpClientRegistry::new());

    for profile in profiles {
        match ReqwestSiteClient::for_profile(profile, &config.http)? {
            Some(client) => {
                let client = match session_cookie(&profile.site) {
                    Some(cookie) => client.with_cookie(cookie),
                    None => client,
                };
                clients.register(&profile.site, Arc::new(client));
            }
            None => log::debug!("[{}] no base_url, no client registered", profile.site),
        }
    }
    log::debug!("HTTP clients registered for {:?}", clients.sites());

    Ok(IntelEngine::new(
        config,
        Repositories::local(storage),
        clients,
        ParserRegistry::default(),
    ))
}

fn require_profile(store: &ProfileStore, site: &str) -> Result<IntelSiteProfile> {
    store
        .get(site)
        .ok_or_else(|| AppError::config(format!("No profile for site '{}'", site)))
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config(&cli.config)?;
    let level = if cli.verbose {
        "debug"
    } else {
        config.logging.level.as_str()
    };
    init_logging(level);

    let sites_dir = cli
        .sites_dir
        .clone()
        .unwrap_or_else(|| config.paths.sites_dir.clone());
    ProfileStore::init_global(&sites_dir);
    let store = ProfileStore::global();
    let now = Utc::now();

    match cli.command {
        Command::Refresh { site } => {
            let profiles = match site {
                Some(site) => vec![require_profile(store, &site)?],
                None => store.all(),
            };
            let engine = build_engine(&config, &profiles)?;
            let outcomes = pipeline::run_refresh(
                &engine,
                &profiles,
                config.engine.max_concurrent_sites,
                now,
            )
            .await;
            print_json(&outcomes)?;
        }

        Command::Index {
            site,
            full,
            max_pages,
        } => {
            let profile = require_profile(store, &site)?;
            let engine = build_engine(&config, std::slice::from_ref(&profile))?;
            let mode = if full {
                SyncMode::Full
            } else {
                SyncMode::Incremental
            };
            let reports =
                pipeline::run_index_sync(&engine, std::slice::from_ref(&profile), mode, max_pages, now)
                    .await;
            print_json(&reports)?;
        }

        Command::Search {
            keyword,
            site,
            limit,
        } => {
            let engine = build_engine(&config, &[])?;
            let params = TorrentSearchParams {
                keyword,
                site_ids: site.into_iter().collect(),
                limit,
                ..Default::default()
            };
            print_json(&engine.search(&params).await?)?;
        }

        Command::MoveSafe { site, torrent } => {
            let engine = build_engine(&config, &[])?;
            let safe = engine.is_move_safe(&site, &torrent, now).await;
            print_json(&serde_json::json!({
                "site": site,
                "torrent_id": torrent,
                "safe": safe,
            }))?;
        }

        Command::Budget { site } => {
            let profile = require_profile(store, &site)?;
            let engine = build_engine(&config, &[])?;
            let budget = engine.get_scan_budget(&profile, now).await?;
            let latest_block = engine.site_guard().get_latest_block(&site).await?;
            print_json(&serde_json::json!({
                "budget": budget,
                "latest_block": latest_block,
            }))?;
        }

        Command::Profiles => {
            let summary: Vec<_> = store
                .all()
                .into_iter()
                .map(|p| {
                    serde_json::json!({
                        "site": p.site,
                        "base_url": p.base_url,
                        "hr": p.hr.enabled,
                        "inbox": p.inbox.enabled,
                        "site_guard": p.site_guard.enabled,
                    })
                })
                .collect();
            print_json(&summary)?;
        }

        Command::Validate => {
            log::info!("Validating configuration...");
            log::info!("✓ Config OK ({})", cli.config.display());

            let count = store.reload()?;
            if count == 0 {
                log::warn!("No site profiles found in {}", sites_dir.display());
            } else {
                log::info!("✓ {} site profiles loaded from {}", count, sites_dir.display());
            }
            log::info!("All validations passed!");
        }
    }

    Ok(())
}
