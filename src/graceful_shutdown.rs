use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tokio::time::timeout;
use tracing::{error, info, warn};

/// Graceful shutdown coordinator, grounded on the teacher's
/// `GracefulShutdown`. Cache/rule persistence is the external
/// `StorageManager` collaborator's concern (§6), so unlike the teacher
/// this coordinator has nothing of its own to save on the way out — it
/// only signals listeners and registered components to stop.
pub struct GracefulShutdown {
    shutdown_tx: broadcast::Sender<()>,
    components: Arc<Mutex<Vec<ShutdownComponent>>>,
}

type ShutdownResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;
type ShutdownFn = Box<dyn Fn() -> tokio::task::JoinHandle<ShutdownResult> + Send + Sync>;

struct ShutdownComponent {
    name: String,
    shutdown_fn: ShutdownFn,
}

impl Default for GracefulShutdown {
    fn default() -> Self {
        Self::new()
    }
}

impl GracefulShutdown {
    pub fn new() -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            shutdown_tx,
            components: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// A shutdown receiver for a listener or the subscription dispatcher
    /// to select on.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    pub async fn register_component<F, Fut>(&self, name: String, shutdown_fn: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = ShutdownResult> + Send + 'static,
    {
        let component = ShutdownComponent {
            name,
            shutdown_fn: Box::new(move || {
                let fut = shutdown_fn();
                tokio::spawn(fut)
            }),
        };
        self.components.lock().await.push(component);
    }

    pub async fn shutdown(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        info!("initiating graceful shutdown");

        if let Err(e) = self.shutdown_tx.send(()) {
            warn!("failed to send shutdown signal: {e}");
        }

        info!("waiting for in-flight requests to complete");
        tokio::time::sleep(Duration::from_millis(500)).await;

        let components = self.components.lock().await;
        let mut handles = Vec::new();
        for component in components.iter() {
            info!(component = %component.name, "shutting down component");
            handles.push((component.name.clone(), (component.shutdown_fn)()));
        }

        for (name, handle) in handles {
            match timeout(Duration::from_secs(5), handle).await {
                Ok(Ok(Ok(()))) => info!(component = %name, "component shut down successfully"),
                Ok(Ok(Err(e))) => error!(component = %name, error = %e, "component shutdown failed"),
                Ok(Err(e)) => error!(component = %name, error = %e, "component shutdown task panicked"),
                Err(_) => warn!(component = %name, "component shutdown timed out"),
            }
        }

        info!("graceful shutdown completed");
        Ok(())
    }
}
