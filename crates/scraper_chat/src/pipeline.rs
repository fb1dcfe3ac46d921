//! Source status pipeline.
//!
//! Drives a batch of sources through `loading -> success` over time:
//!
//! 1. every source moves to `loading`, snapshot 1 is emitted at once;
//! 2. for each index `i`, wait one jittered source delay, mark sources
//!    `0..=i` as `success` and emit snapshot `i + 2`.
//!
//! A batch of N sources therefore yields N + 1 snapshots of length N, in
//! input order, the last one fully terminal. A cancelled run stops emitting
//! and settles every unfinished source as `error`.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info};

use crate::config::PipelineTiming;
use crate::feed::{RunHandle, RunId, SnapshotSink, SourceSnapshot};
use crate::scheduler::Scheduler;
use crate::types::{ScrapedSource, SourceStatus};

/// Result of one pipeline run
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineRun {
    pub run_id: RunId,
    /// Final status of every source, in input order
    pub sources: Vec<ScrapedSource>,
    pub snapshots_emitted: usize,
    pub cancelled: bool,
}

impl PipelineRun {
    pub fn all_succeeded(&self) -> bool {
        self.sources.iter().all(|s| s.status == SourceStatus::Success)
    }
}

/// Simulates progressive retrieval of a source batch
pub struct SourceStatusPipeline {
    scheduler: Arc<dyn Scheduler>,
    timing: PipelineTiming,
    seed: Option<u64>,
}

impl SourceStatusPipeline {
    pub fn new(scheduler: Arc<dyn Scheduler>, timing: PipelineTiming) -> Self {
        Self {
            scheduler,
            timing,
            seed: None,
        }
    }

    /// Use a fixed seed for the delay jitter
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Run the batch to completion or until `run` is cancelled
    pub async fn run(
        &self,
        sources: Vec<ScrapedSource>,
        run: &RunHandle,
        sink: &mut dyn SnapshotSink,
    ) -> PipelineRun {
        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let mut current: Vec<ScrapedSource> = sources
            .iter()
            .map(|s| s.advanced(SourceStatus::Loading))
            .collect();
        let mut emitted = 0;

        info!(run_id = run.id(), sources = current.len(), "Source run started");

        if run.is_cancelled() {
            return Self::abandon(run.id(), current, emitted);
        }
        emitted += 1;
        sink.emit(SourceSnapshot {
            run_id: run.id(),
            sequence: emitted,
            sources: current.clone(),
        });

        for i in 0..current.len() {
            let delay = self.timing.source_delay(&mut rng);
            tokio::select! {
                _ = run.token().cancelled() => {
                    return Self::abandon(run.id(), current, emitted);
                }
                _ = self.scheduler.sleep(delay) => {}
            }

            for source in current.iter_mut().take(i + 1) {
                *source = source.advanced(SourceStatus::Success);
            }
            emitted += 1;
            debug!(run_id = run.id(), completed = i + 1, delay_ms = delay.as_millis() as u64, "Source finished");
            sink.emit(SourceSnapshot {
                run_id: run.id(),
                sequence: emitted,
                sources: current.clone(),
            });
        }

        info!(run_id = run.id(), snapshots = emitted, "Source run finished");
        PipelineRun {
            run_id: run.id(),
            sources: current,
            snapshots_emitted: emitted,
            cancelled: false,
        }
    }

    fn abandon(run_id: RunId, current: Vec<ScrapedSource>, emitted: usize) -> PipelineRun {
        let sources: Vec<ScrapedSource> = current
            .into_iter()
            .map(|s| s.advanced(SourceStatus::Error))
            .collect();
        info!(run_id, "Source run cancelled");
        PipelineRun {
            run_id,
            sources,
            snapshots_emitted: emitted,
            cancelled: true,
        }
    }
}
