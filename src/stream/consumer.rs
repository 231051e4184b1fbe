use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::external::correlation_provider::CorrelationProvider;
use crate::external::opportunity_sink::OpportunitySink;
use crate::services::analyzer::TrendAnalyzer;
use crate::services::opportunity_mapper::OpportunityMapper;
use crate::services::prediction_engine;
use crate::stream::event_log::EventLog;

/// Entries pulled per poll of the log.
const READ_BATCH: usize = 64;

/// Idle wait between polls when the log has nothing new.
const IDLE_POLL: Duration = Duration::from_millis(250);

/// Default forecast horizon fed to the prediction engine, hours.
const PREDICTION_HORIZON_HOURS: f64 = 48.0;

/// Consumer-group pipeline over the event log: every acknowledged entry
/// flows log → analyzer → prediction engine → opportunity mapper →
/// sink. Runs at its own pace, independent of the producer tasks; a
/// processing failure leaves the entry unacked for redelivery.
pub struct AnalysisConsumer {
    group: String,
    log: Arc<dyn EventLog>,
    analyzer: Arc<TrendAnalyzer>,
    correlations: Arc<dyn CorrelationProvider>,
    mapper: Arc<OpportunityMapper>,
    sink: Arc<dyn OpportunitySink>,
}

impl AnalysisConsumer {
    pub fn new(
        group: impl Into<String>,
        log: Arc<dyn EventLog>,
        analyzer: Arc<TrendAnalyzer>,
        correlations: Arc<dyn CorrelationProvider>,
        mapper: Arc<OpportunityMapper>,
        sink: Arc<dyn OpportunitySink>,
    ) -> Self {
        Self {
            group: group.into(),
            log,
            analyzer,
            correlations,
            mapper,
            sink,
        }
    }

    /// Spawn the consumer loop. Returns the task handle and a shutdown
    /// sender; send `true` (or drop the sender) to stop after the
    /// current batch.
    pub fn spawn(self) -> (JoinHandle<()>, watch::Sender<bool>) {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let join = tokio::spawn(async move {
            info!("🔁 [CONSUMER] group '{}' starting", self.group);
            loop {
                if *shutdown_rx.borrow() {
                    break;
                }

                let batch = self.log.read(&self.group, READ_BATCH);
                if batch.is_empty() {
                    tokio::select! {
                        _ = shutdown_rx.changed() => break,
                        _ = tokio::time::sleep(IDLE_POLL) => {}
                    }
                    continue;
                }

                for entry in batch {
                    self.process_entry(&entry).await;
                }
            }
            info!("👋 [CONSUMER] group '{}' exiting", self.group);
        });

        (join, shutdown_tx)
    }

    /// Run the full decisioning pass for one log entry, then ack it.
    /// Undecodable payloads are acked too — redelivering them can never
    /// succeed.
    async fn process_entry(&self, entry: &crate::stream::event_log::LogEntry) {
        let signal = match entry.signal() {
            Ok(signal) => signal,
            Err(e) => {
                warn!(
                    "🗑️ [CONSUMER] dropping undecodable entry at offset {}: {}",
                    entry.offset, e
                );
                self.log.ack(&self.group, entry.offset);
                return;
            }
        };

        let analysis = self.analyzer.observe(signal.clone());
        let history = self.analyzer.history(&analysis.keyword);
        let correlations = self.correlations.correlations_for(&analysis.keyword);

        // The four forecasts are advisory context; they never block the
        // mapping pass.
        let momentum = prediction_engine::predict_momentum(&history, PREDICTION_HORIZON_HOURS);
        let volume = prediction_engine::predict_volume_growth(&history, PREDICTION_HORIZON_HOURS);
        let transition = prediction_engine::predict_lifecycle_transition(
            &history,
            analysis.lifecycle_stage,
            PREDICTION_HORIZON_HOURS,
        );
        let peak =
            prediction_engine::predict_peak_timing(&history, &correlations, PREDICTION_HORIZON_HOURS);
        debug!(
            "🔮 [CONSUMER] {}: momentum {:.2}, volume {:.2}, transition {:.2}, peak {:.2} conf",
            analysis.keyword,
            momentum.confidence,
            volume.confidence,
            transition.confidence,
            peak.confidence
        );

        let opportunities = self.mapper.map_opportunities(&analysis, &correlations, &signal);
        for opportunity in &opportunities {
            self.sink.deliver(opportunity).await;
        }

        self.log.ack(&self.group, entry.offset);
    }
}
