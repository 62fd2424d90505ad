use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{Level, warn};

const QUEUE_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub(crate) struct AlertEvent {
    pub(crate) level: Level,
    pub(crate) timestamp: DateTime<Utc>,
    pub(crate) service_name: String,
    pub(crate) stage: String,
    pub(crate) component: String,
    pub(crate) target: String,
    pub(crate) location: Option<String>,
    pub(crate) message: Option<String>,
    pub(crate) fields: BTreeMap<String, String>,
    /// Enclosing span names, outermost first.
    pub(crate) spans: Vec<String>,
}

#[async_trait]
pub(crate) trait AlertSink: Send + Sync {
    async fn deliver(&self, event: &AlertEvent) -> Result<()>;
    fn name(&self) -> &'static str;
}

/// Hands alert events to a background task so the logging call site never waits on I/O.
#[derive(Clone)]
pub(crate) struct AlertDispatcher {
    tx: mpsc::Sender<AlertEvent>,
}

impl AlertDispatcher {
    /// Must be called inside a tokio runtime.
    pub(crate) fn spawn(sinks: Vec<Arc<dyn AlertSink>>) -> Self {
        let (tx, mut rx) = mpsc::channel::<AlertEvent>(QUEUE_CAPACITY);

        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                for sink in &sinks {
                    if let Err(err) = sink.deliver(&event).await {
                        warn!(sink = sink.name(), error = %err, "ops alert: delivery failed");
                    }
                }
            }
        });

        Self { tx }
    }

    pub(crate) fn dispatch(&self, event: AlertEvent) {
        if let Err(err) = self.tx.try_send(event) {
            match err {
                mpsc::error::TrySendError::Full(_) => {
                    warn!("ops alert: queue full, dropping event")
                }
                mpsc::error::TrySendError::Closed(_) => {
                    warn!("ops alert: queue closed, dropping event")
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::Mutex;

    struct RecordingSink {
        seen: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl AlertSink for RecordingSink {
        async fn deliver(&self, event: &AlertEvent) -> Result<()> {
            self.seen
                .lock()
                .await
                .push(event.message.clone().unwrap_or_default());
            Ok(())
        }

        fn name(&self) -> &'static str {
            "recording"
        }
    }

    fn event(message: &str) -> AlertEvent {
        AlertEvent {
            level: Level::ERROR,
            timestamp: Utc::now(),
            service_name: "parkbay".into(),
            stage: "local".into(),
            component: "backend".into(),
            target: "backend::usecases".into(),
            location: None,
            message: Some(message.into()),
            fields: BTreeMap::new(),
            spans: Vec::new(),
        }
    }

    #[tokio::test]
    async fn dispatched_events_reach_every_sink() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let dispatcher = AlertDispatcher::spawn(vec![
            Arc::new(RecordingSink { seen: Arc::clone(&seen) }),
            Arc::new(RecordingSink { seen: Arc::clone(&seen) }),
        ]);

        dispatcher.dispatch(event("capture failed"));

        for _ in 0..50 {
            if seen.lock().await.len() == 2 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }

        assert_eq!(*seen.lock().await, vec!["capture failed", "capture failed"]);
    }
}
