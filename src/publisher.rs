//! The publisher loop: synthesize, analyze, store, sleep, repeat.
//!
//! A cycle never fails as a whole. Remote-call errors become history entries
//! carrying the error text and the placeholder diagnosis; save errors are
//! logged and the next cycle runs on schedule.

use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, info, info_span, warn, Instrument};

use crate::analyzer::Analyzer;
use crate::models::HistoryEntry;
use crate::store::HistoryStore;
use crate::synthesizer::TelemetrySynthesizer;

// ---

pub struct Publisher {
    synthesizer: TelemetrySynthesizer,
    analyzer: Analyzer,
    store: HistoryStore,
    interval: Duration,
}

impl Publisher {
    pub fn new(
        synthesizer: TelemetrySynthesizer,
        analyzer: Analyzer,
        store: HistoryStore,
        interval: Duration,
    ) -> Self {
        Self {
            synthesizer,
            analyzer,
            store,
            interval,
        }
    }

    #[cfg(test)]
    pub fn store(&self) -> &HistoryStore {
        &self.store
    }

    /// Run one synthesize -> analyze -> store cycle and return its entry.
    pub async fn run_cycle(&mut self) -> HistoryEntry {
        // ---
        let snapshot = self.synthesizer.produce_snapshot();
        info!("Snapshot {} for {}", snapshot.timestamp, snapshot.site);

        let entry = match self.analyzer.analyze(&snapshot).await {
            Ok(diagnosis) if diagnosis.is_placeholder() => {
                warn!("Model reply unusable, storing placeholder diagnosis");
                HistoryEntry::diagnosed(snapshot, diagnosis)
            }
            Ok(diagnosis) => {
                info!(
                    abnormalities = diagnosis.abnormalities.len(),
                    recommendations = diagnosis.recommendations.len(),
                    "Diagnosis: {}",
                    diagnosis.summary
                );
                HistoryEntry::diagnosed(snapshot, diagnosis)
            }
            Err(e) => {
                error!("Error in cycle: {}", e);
                HistoryEntry::failed(snapshot, e.to_string())
            }
        };

        self.store.append(entry.clone());
        if let Err(e) = self.store.save().await {
            error!("Failed to save history: {}", e);
        }

        entry
    }

    /// Run cycles until `shutdown` changes (or its sender is dropped).
    ///
    /// The first cycle starts immediately; afterwards the loop sleeps for the
    /// configured interval after each cycle, so an overrunning cycle simply
    /// delays the next one. Returns the number of cycles completed.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> usize {
        // ---
        info!(
            "Publisher started for {}: every {:?}, history at {}",
            self.synthesizer.site(),
            self.interval,
            self.store.path().display()
        );

        let mut cycles = 0;
        loop {
            cycles += 1;
            self.run_cycle()
                .instrument(info_span!("cycle", n = cycles))
                .await;

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = shutdown.changed() => break,
            }
        }

        info!("Publisher stopped after {} cycles", cycles);
        cycles
    }
}
