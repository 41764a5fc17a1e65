// Fire-and-forget metric emission
//
// Models hold a MetricEmitter; samples travel over an unbounded channel to a
// background worker that updates the Prometheus registry and the JSONL sink.
// Emission never blocks and never fails the prediction path.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::registry::ServingMetrics;
use super::types::MetricRecord;

/// Cloneable handle for recording custom metrics
#[derive(Clone, Debug)]
pub struct MetricEmitter {
    tx: Option<mpsc::UnboundedSender<MetricRecord>>,
    model: Option<Arc<str>>,
}

impl MetricEmitter {
    /// An emitter that drops every sample
    pub fn disabled() -> Self {
        Self {
            tx: None,
            model: None,
        }
    }

    /// Same channel, with samples attributed to `model`
    pub fn for_model(&self, model: &str) -> Self {
        Self {
            tx: self.tx.clone(),
            model: Some(Arc::from(model)),
        }
    }

    /// Record a metric sample
    pub fn emit(&self, name: &str, value: f64) {
        let Some(tx) = &self.tx else {
            return;
        };
        let record = MetricRecord::new(self.model.as_deref().map(str::to_string), name, value);
        if tx.send(record).is_err() {
            tracing::warn!(metric = %name, "Telemetry worker stopped, dropping metric");
        }
    }
}

/// Start the telemetry worker
///
/// The worker exits once every emitter clone has been dropped.
pub fn spawn_telemetry(
    metrics: Arc<ServingMetrics>,
    metrics_dir: Option<PathBuf>,
) -> (MetricEmitter, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::unbounded_channel::<MetricRecord>();
    let sink = metrics_dir.map(|dir| dir.join("metrics.jsonl"));

    let handle = tokio::spawn(async move {
        while let Some(record) = rx.recv().await {
            metrics.record_custom(record.model.as_deref(), &record.name, record.value);
            tracing::debug!(
                model = record.model.as_deref().unwrap_or(""),
                metric = %record.name,
                value = record.value,
                "Recorded metric"
            );

            if let Some(path) = &sink {
                if let Err(e) = append_record(path, &record).await {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Failed to persist metric sample"
                    );
                }
            }
        }
        tracing::debug!("Telemetry worker stopped");
    });

    let emitter = MetricEmitter {
        tx: Some(tx),
        model: None,
    };
    (emitter, handle)
}

async fn append_record(path: &Path, record: &MetricRecord) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut line = serde_json::to_string(record)?;
    line.push('\n');

    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(line.as_bytes()).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_emitted_samples_reach_registry_and_sink() {
        let dir = TempDir::new().unwrap();
        let metrics = Arc::new(ServingMetrics::new().unwrap());
        let (emitter, handle) =
            spawn_telemetry(Arc::clone(&metrics), Some(dir.path().to_path_buf()));

        let scoped = emitter.for_model("iris");
        scoped.emit("my_kpi", 3.0);
        scoped.emit("my_kpi", 4.5);
        drop(scoped);
        drop(emitter);
        handle.await.unwrap();

        assert_eq!(metrics.custom_value(Some("iris"), "my_kpi"), 4.5);
        let contents = std::fs::read_to_string(dir.path().join("metrics.jsonl")).unwrap();
        assert_eq!(contents.lines().count(), 2);
        let last: MetricRecord = serde_json::from_str(contents.lines().last().unwrap()).unwrap();
        assert_eq!(last.model.as_deref(), Some("iris"));
    }

    #[tokio::test]
    async fn test_emit_after_worker_stops_is_noop() {
        let metrics = Arc::new(ServingMetrics::new().unwrap());
        let (emitter, handle) = spawn_telemetry(metrics, None);
        handle.abort();
        let _ = handle.await;

        // Must not panic or block
        emitter.emit("my_kpi", 1.0);
        MetricEmitter::disabled().emit("my_kpi", 1.0);
    }
}
