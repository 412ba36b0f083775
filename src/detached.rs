use parking_lot::Mutex;
use std::future::Future;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Fire-and-forget side effects. The caller never awaits them and their
/// failures are logged and dropped.
#[derive(Default)]
pub struct DetachedTasks {
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl DetachedTasks {
    pub fn spawn<F>(&self, label: &'static str, task: F)
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            match task.await {
                Ok(()) => debug!("🧵 Detached task '{}' finished", label),
                Err(e) => warn!("⚠️ Detached task '{}' failed: {:#}", label, e),
            }
        });
        let mut handles = self.handles.lock();
        handles.retain(|h| !h.is_finished());
        handles.push(handle);
    }

    pub fn pending(&self) -> usize {
        self.handles.lock().iter().filter(|h| !h.is_finished()).count()
    }

    /// Waits for everything spawned so far. Used at shutdown.
    pub async fn drain(&self) {
        let handles: Vec<JoinHandle<()>> = std::mem::take(&mut *self.handles.lock());
        for handle in handles {
            if let Err(e) = handle.await {
                warn!("⚠️ Detached task panicked: {}", e);
            }
        }
    }
}
