//! # Exporter Module
//!
//! Sinks for items produced by callbacks.
//!
//! ## Overview
//!
//! Every registered `Exporter` runs in its own task and receives every item
//! through its own unbounded channel. `Crawler::export` serializes an item to
//! a `serde_json::Value` once and fans it out to all channels. When the crawl
//! drains, the channels are closed exactly once; each exporter sees the end
//! of its stream after the last buffered item and returns, and `run()` awaits
//! all of them before returning.

mod json_lines;

pub use json_lines::JsonLinesExporter;

use crate::error::SpiderError;
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

/// Consumes exported items until the stream ends.
#[async_trait]
pub trait Exporter: Send + Sync + 'static {
    fn name(&self) -> &str;

    /// Reads `items` until it yields `None`. The stream ends once the crawl
    /// is finished; an exporter must not return earlier unless it fails.
    async fn export(&self, items: UnboundedReceiver<Value>) -> Result<(), SpiderError>;
}

/// The fan-out from `Crawler::export` to every exporter task.
pub(crate) struct ExportChannels {
    exporters: Vec<Arc<dyn Exporter>>,
    senders: RwLock<Option<Vec<UnboundedSender<Value>>>>,
    receivers: Mutex<Option<Vec<UnboundedReceiver<Value>>>>,
}

impl ExportChannels {
    pub(crate) fn new(exporters: Vec<Arc<dyn Exporter>>) -> Self {
        let (senders, receivers): (Vec<_>, Vec<_>) =
            exporters.iter().map(|_| unbounded_channel()).unzip();
        Self {
            exporters,
            senders: RwLock::new(Some(senders)),
            receivers: Mutex::new(Some(receivers)),
        }
    }

    /// Spawns one task per exporter. Only the first call spawns anything.
    pub(crate) fn spawn(&self) -> Vec<JoinHandle<()>> {
        let Some(receivers) = self.receivers.lock().take() else {
            warn!("Exporters were already started");
            return Vec::new();
        };

        self.exporters
            .iter()
            .zip(receivers)
            .map(|(exporter, rx)| {
                let exporter = Arc::clone(exporter);
                tokio::spawn(async move {
                    debug!("Exporter {} started", exporter.name());
                    match exporter.export(rx).await {
                        Ok(()) => debug!("Exporter {} finished", exporter.name()),
                        Err(e) => error!("Exporter {} failed: {}", exporter.name(), e),
                    }
                })
            })
            .collect()
    }

    /// Sends `item` to every exporter. Returns `false` once the channels are closed.
    pub(crate) fn send<T: Serialize>(&self, item: &T) -> Result<bool, SpiderError> {
        let guard = self.senders.read();
        let Some(senders) = guard.as_ref() else {
            return Ok(false);
        };
        let value = serde_json::to_value(item)?;
        for sender in senders {
            if sender.send(value.clone()).is_err() {
                debug!("Dropping item for an exporter that already stopped");
            }
        }
        Ok(true)
    }

    /// Closes every channel. Later calls do nothing.
    pub(crate) fn close(&self) {
        if self.senders.write().take().is_some() {
            debug!("Export channels closed");
        }
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.senders.read().is_none()
    }

    pub(crate) fn len(&self) -> usize {
        self.exporters.len()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use futures_util::future::join_all;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Collects every item and records when its stream ended.
    #[derive(Default)]
    pub(crate) struct CollectingExporter {
        pub(crate) items: parking_lot::Mutex<Vec<Value>>,
        pub(crate) finished: AtomicBool,
    }

    #[async_trait]
    impl Exporter for CollectingExporter {
        fn name(&self) -> &str {
            "collecting"
        }

        async fn export(&self, mut items: UnboundedReceiver<Value>) -> Result<(), SpiderError> {
            while let Some(item) = items.recv().await {
                self.items.lock().push(item);
            }
            self.finished.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn fans_out_and_drains_before_finishing() {
        let first = Arc::new(CollectingExporter::default());
        let second = Arc::new(CollectingExporter::default());
        let exporters: Vec<Arc<dyn Exporter>> = vec![first.clone(), second.clone()];
        let channels = ExportChannels::new(exporters);
        assert_eq!(channels.len(), 2);

        // items sent before the tasks start are buffered
        assert!(channels.send(&json!({"n": 1})).unwrap());
        let handles = channels.spawn();
        assert!(channels.send(&json!({"n": 2})).unwrap());

        channels.close();
        channels.close();
        assert!(channels.is_closed());
        assert!(!channels.send(&json!({"n": 3})).unwrap());

        join_all(handles).await;
        for exporter in [&first, &second] {
            assert!(exporter.finished.load(Ordering::SeqCst));
            assert_eq!(*exporter.items.lock(), vec![json!({"n": 1}), json!({"n": 2})]);
        }
    }

    #[tokio::test]
    async fn spawn_is_one_shot() {
        let exporter: Arc<dyn Exporter> = Arc::new(CollectingExporter::default());
        let channels = ExportChannels::new(vec![exporter]);
        assert_eq!(channels.spawn().len(), 1);
        assert!(channels.spawn().is_empty());
        channels.close();
    }
}
