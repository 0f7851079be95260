//! cardbox-watcher: keeps extracted flashcard sidecars in sync with a vault
//! of markdown notes and audits them on a schedule.
//!
//! Thin wrapper around `cardbox-core` — all extraction, integrity and repair
//! logic lives in the library; this binary only wires it to the filesystem.

mod store;
mod sweep;
mod watch;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cardbox_core::{CacheConfig, DegradationEngine, RepairAdvisor, TemplateCompiler};

use crate::store::{DocumentStore, FsDocumentStore};
use crate::sweep::IntegritySweeper;
use crate::watch::VaultWatcher;

/// Runtime configuration, read from the environment.
#[derive(Debug, Clone)]
struct AppConfig {
    vault_dir: PathBuf,
    sweep_interval: Duration,
    auto_fix: bool,
    cache_max_size: usize,
}

impl AppConfig {
    fn from_env() -> anyhow::Result<Self> {
        let vault_dir = match std::env::var("CARDBOX_VAULT") {
            Ok(dir) => PathBuf::from(dir),
            Err(_) => dirs::document_dir()
                .ok_or_else(|| anyhow::anyhow!("no documents directory; set CARDBOX_VAULT"))?
                .join("cardbox"),
        };

        let sweep_interval = std::env::var("CARDBOX_SWEEP_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(300));

        let auto_fix = std::env::var("CARDBOX_AUTO_FIX")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        let cache_max_size = std::env::var("CARDBOX_TEMPLATE_CACHE_SIZE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(64);

        Ok(Self {
            vault_dir,
            sweep_interval,
            auto_fix,
            cache_max_size,
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;
    std::fs::create_dir_all(&config.vault_dir)?;
    tracing::info!(vault = %config.vault_dir.display(), "starting cardbox watcher");

    let compiler = Arc::new(TemplateCompiler::new(CacheConfig {
        max_size: config.cache_max_size,
        ..CacheConfig::default()
    }));
    let engine = Arc::new(DegradationEngine::new(Arc::clone(&compiler)));
    let store: Arc<dyn DocumentStore> = Arc::new(FsDocumentStore::new());

    // Initial pass so the sidecars reflect the vault before watching starts.
    let markdown_files = store::collect_files(&config.vault_dir, "md");
    tracing::info!(files = markdown_files.len(), "initial extraction pass");
    for path in &markdown_files {
        if let Err(e) = watch::extract_file(&engine, store.as_ref(), path, None) {
            tracing::warn!(path = %path.display(), error = %e, "initial extraction failed");
        }
    }

    let mut watcher = VaultWatcher::new();
    watcher.start(
        &config.vault_dir,
        Arc::clone(&engine),
        Arc::clone(&store),
        None,
    )?;
    tracing::info!("file watcher running");

    let sweeper = Arc::new(IntegritySweeper::new(
        Arc::clone(&store),
        RepairAdvisor::new(Arc::clone(&compiler)),
        config.auto_fix,
    ));

    let sweep_vault = config.vault_dir.clone();
    let sweep_compiler = Arc::clone(&compiler);
    let sweep_handle = {
        let sweeper = Arc::clone(&sweeper);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(config.sweep_interval);
            // First tick fires immediately; skip it, the initial pass is fresh.
            interval.tick().await;
            loop {
                interval.tick().await;
                sweep_compiler.clear_expired();
                let sweeper = Arc::clone(&sweeper);
                let vault = sweep_vault.clone();
                // The sweep is blocking file IO; keep it off the runtime.
                let _ = tokio::task::spawn_blocking(move || sweeper.sweep(&vault)).await;
            }
        })
    };

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");
    sweep_handle.abort();
    watcher.stop();

    Ok(())
}
