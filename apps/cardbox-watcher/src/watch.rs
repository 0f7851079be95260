//! File system watcher for monitoring markdown note changes.
//!
//! Create/modify re-extracts the file and rewrites its sidecar; delete
//! removes the sidecar. Extraction never fails outright, so a malformed note
//! still produces a (protective) sidecar instead of an error.

use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use notify::{
    event::{CreateKind, ModifyKind, RemoveKind},
    Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher,
};

use cardbox_core::{DegradationEngine, Template};

use crate::store::{self, DocumentStore, Sidecar, StoredCard};

/// Watches a vault directory and keeps sidecars in sync with their sources.
pub struct VaultWatcher {
    watcher: Option<RecommendedWatcher>,
    stop_tx: Option<Sender<()>>,
}

impl VaultWatcher {
    pub fn new() -> Self {
        Self {
            watcher: None,
            stop_tx: None,
        }
    }

    pub fn is_started(&self) -> bool {
        self.watcher.is_some()
    }

    /// Start the watcher thread over `vault`.
    pub fn start(
        &mut self,
        vault: &Path,
        engine: Arc<DegradationEngine>,
        store: Arc<dyn DocumentStore>,
        template: Option<Template>,
    ) -> anyhow::Result<()> {
        if self.watcher.is_some() {
            return Ok(());
        }

        let (tx, rx) = channel();
        let (stop_tx, stop_rx) = channel::<()>();

        let mut watcher = RecommendedWatcher::new(
            move |result: Result<Event, notify::Error>| {
                if let Ok(event) = result {
                    let _ = tx.send(event);
                }
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;
        watcher.watch(vault, RecursiveMode::Recursive)?;

        self.watcher = Some(watcher);
        self.stop_tx = Some(stop_tx);

        thread::spawn(move || {
            Self::event_loop(rx, stop_rx, engine, store, template);
        });

        Ok(())
    }

    pub fn stop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        self.watcher = None;
    }

    fn event_loop(
        rx: Receiver<Event>,
        stop_rx: Receiver<()>,
        engine: Arc<DegradationEngine>,
        store: Arc<dyn DocumentStore>,
        template: Option<Template>,
    ) {
        loop {
            if stop_rx.try_recv().is_ok() {
                break;
            }

            match rx.recv_timeout(Duration::from_millis(100)) {
                Ok(event) => {
                    Self::handle_event(&event, &engine, &store, template.as_ref());
                }
                Err(std::sync::mpsc::RecvTimeoutError::Timeout) => {}
                Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => break,
            }
        }
    }

    fn handle_event(
        event: &Event,
        engine: &DegradationEngine,
        store: &Arc<dyn DocumentStore>,
        template: Option<&Template>,
    ) {
        let md_paths: Vec<&PathBuf> = event
            .paths
            .iter()
            .filter(|p| p.extension().map(|ext| ext == "md").unwrap_or(false))
            .collect();

        if md_paths.is_empty() {
            return;
        }

        let kind = match &event.kind {
            EventKind::Create(CreateKind::File) => "created",
            EventKind::Modify(ModifyKind::Data(_)) => "modified",
            EventKind::Modify(ModifyKind::Name(_)) => "renamed",
            EventKind::Remove(RemoveKind::File) => "deleted",
            _ => return,
        };

        for path in md_paths {
            tracing::debug!(path = %path.display(), kind, "markdown change");
            match kind {
                "created" | "modified" | "renamed" => {
                    if let Err(e) = extract_file(engine, store.as_ref(), path, template) {
                        tracing::warn!(path = %path.display(), error = %e, "failed to refresh sidecar");
                    }
                }
                "deleted" => {
                    if let Err(e) = store.remove(&store::sidecar_path(path)) {
                        tracing::warn!(path = %path.display(), error = %e, "failed to remove sidecar");
                    }
                }
                _ => {}
            }
        }
    }
}

impl Default for VaultWatcher {
    fn default() -> Self {
        Self::new()
    }
}

/// Extract one markdown file and persist its sidecar.
pub fn extract_file(
    engine: &DegradationEngine,
    store: &dyn DocumentStore,
    path: &Path,
    template: Option<&Template>,
) -> anyhow::Result<()> {
    let content = store.read(path)?;
    let extraction = engine.extract_document(&content, template);

    let cards: Vec<StoredCard> = extraction
        .blocks
        .iter()
        .zip(&extraction.cards)
        .map(|(block, card)| StoredCard::from_extraction(card, &block.text, block.start_line))
        .collect();

    let low_confidence = cards.iter().filter(|c| c.confidence < 0.5).count();
    if low_confidence > 0 {
        tracing::info!(
            path = %path.display(),
            low_confidence,
            total = cards.len(),
            "some cards extracted with low confidence; flagged for review"
        );
    }

    let sidecar = Sidecar {
        source_file: path.to_string_lossy().to_string(),
        extracted_at: chrono::Utc::now(),
        cards,
    };
    store::write_sidecar(store, path, &sidecar)?;

    tracing::debug!(
        path = %path.display(),
        cards = sidecar.cards.len(),
        "sidecar refreshed"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::FsDocumentStore;
    use pretty_assertions::assert_eq;

    #[test]
    fn extract_file_writes_sidecar_with_originals() {
        let dir = tempfile::tempdir().unwrap();
        let md = dir.path().join("notes.md");
        std::fs::write(
            &md,
            "## First?\nAnswer one.\n\n---\n\n## Second?\nAnswer two.",
        )
        .unwrap();

        let engine = DegradationEngine::default();
        let store = FsDocumentStore::new();
        extract_file(&engine, &store, &md, None).unwrap();

        let sidecar =
            store::load_sidecar(&store, &store::sidecar_path(&md)).unwrap();
        assert_eq!(sidecar.cards.len(), 2);
        assert!(sidecar.cards[0].original_content.starts_with("## First?"));
        assert_eq!(sidecar.cards[0].fields["notes"], sidecar.cards[0].original_content);
    }

    #[test]
    fn watcher_start_and_stop() {
        let dir = tempfile::tempdir().unwrap();
        let mut watcher = VaultWatcher::new();
        assert!(!watcher.is_started());

        watcher
            .start(
                dir.path(),
                Arc::new(DegradationEngine::default()),
                Arc::new(FsDocumentStore::new()),
                None,
            )
            .unwrap();
        assert!(watcher.is_started());

        watcher.stop();
        assert!(!watcher.is_started());
    }
}
