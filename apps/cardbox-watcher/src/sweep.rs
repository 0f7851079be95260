//! Periodic integrity sweep over stored sidecars.
//!
//! A sweep re-checks every stored card against its original content,
//! optionally applies auto-fixes, and logs repair suggestions for the rest.
//! An atomic guard prevents overlapping periodic sweeps; manual sweeps on a
//! separate sweeper value may run concurrently.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;

use cardbox_core::{HealthStatus, IntegrityChecker, RepairAdvisor, RepairSuggestion};

use crate::store::{self, DocumentStore};

/// Counters for one sweep run.
#[derive(Debug, Default, Clone, Serialize)]
pub struct SweepSummary {
    pub skipped: bool,
    pub files: usize,
    pub cards_checked: usize,
    pub unhealthy_cards: usize,
    pub fixes_applied: usize,
    pub suggestions_pending: usize,
    pub errors: usize,
}

/// Walks sidecars and audits their cards.
pub struct IntegritySweeper {
    checker: IntegrityChecker,
    advisor: RepairAdvisor,
    store: Arc<dyn DocumentStore>,
    auto_fix: bool,
    running: AtomicBool,
}

impl IntegritySweeper {
    pub fn new(store: Arc<dyn DocumentStore>, advisor: RepairAdvisor, auto_fix: bool) -> Self {
        Self {
            checker: IntegrityChecker::new(),
            advisor,
            store,
            auto_fix,
            running: AtomicBool::new(false),
        }
    }

    /// Run one sweep over every sidecar under `vault`.
    ///
    /// Reentrancy-safe: if a sweep is already in flight on this sweeper, the
    /// call returns immediately with `skipped = true`.
    pub fn sweep(&self, vault: &Path) -> SweepSummary {
        if self.running.swap(true, Ordering::SeqCst) {
            tracing::debug!("integrity sweep already running; skipping");
            return SweepSummary {
                skipped: true,
                ..SweepSummary::default()
            };
        }

        let summary = self.sweep_inner(vault);
        self.running.store(false, Ordering::SeqCst);

        tracing::info!(
            files = summary.files,
            cards = summary.cards_checked,
            unhealthy = summary.unhealthy_cards,
            fixed = summary.fixes_applied,
            pending = summary.suggestions_pending,
            "integrity sweep finished"
        );
        summary
    }

    fn sweep_inner(&self, vault: &Path) -> SweepSummary {
        let mut summary = SweepSummary::default();

        for sidecar_file in store::collect_files(vault, store::SIDECAR_SUFFIX) {
            summary.files += 1;
            let mut sidecar = match store::load_sidecar(self.store.as_ref(), &sidecar_file) {
                Ok(sidecar) => sidecar,
                Err(e) => {
                    // One bad sidecar never blocks the rest of the sweep.
                    tracing::warn!(path = %sidecar_file.display(), error = %e, "unreadable sidecar");
                    summary.errors += 1;
                    continue;
                }
            };

            let mut modified = false;
            for (idx, card) in sidecar.cards.iter_mut().enumerate() {
                summary.cards_checked += 1;
                let card_id = format!("{}#{}", sidecar.source_file, idx);

                let check =
                    self.checker
                        .check(&card_id, &card.fields, Some(&card.original_content));
                if check.status == HealthStatus::Healthy && check.issues.is_empty() {
                    continue;
                }
                if check.status != HealthStatus::Healthy {
                    summary.unhealthy_cards += 1;
                }

                if self.auto_fix {
                    let fixed = self
                        .checker
                        .apply_auto_fixes(&mut card.fields, &check.issues);
                    if !fixed.is_empty() {
                        summary.fixes_applied += fixed.len();
                        modified = true;
                        tracing::info!(card_id = %card_id, fixes = ?fixed, "auto-fixes applied");
                    }
                }

                // Whatever remains becomes reviewable suggestions.
                let analysis = self.advisor.analyze(
                    &card.original_content,
                    &card.fields,
                    None,
                    &check.issues,
                );
                let pending: Vec<&RepairSuggestion> = analysis
                    .all()
                    .filter(|s| !self.auto_fix || !s.auto_fixable)
                    .collect();
                if !pending.is_empty() {
                    summary.suggestions_pending += pending.len();
                    tracing::info!(
                        card_id = %card_id,
                        pending = pending.len(),
                        "repair suggestions awaiting review"
                    );
                }
            }

            if modified {
                if let Err(e) = write_back(self.store.as_ref(), &sidecar_file, &sidecar) {
                    tracing::warn!(path = %sidecar_file.display(), error = %e, "failed to persist fixes");
                    summary.errors += 1;
                }
            }
        }

        summary
    }
}

fn write_back(
    store: &dyn DocumentStore,
    sidecar_file: &Path,
    sidecar: &store::Sidecar,
) -> store::Result<()> {
    let json = serde_json::to_string_pretty(sidecar).map_err(|source| {
        store::StoreError::Json {
            path: sidecar_file.to_path_buf(),
            source,
        }
    })?;
    store.write(sidecar_file, &json)
}
