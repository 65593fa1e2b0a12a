//! Runs one independent monitor task per target.

use crate::monitor::{MonitorContext, Target, TargetMonitor};

use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

#[derive(Error, Debug)]
pub enum SupervisorError {
    #[error("no valid targets (missing IPs or ports)")]
    NoTargets,
}

/// Owner of the monitor tasks.
pub struct Supervisor {
    stop_tx: broadcast::Sender<()>,
    handles: Vec<JoinHandle<()>>,
}

impl Supervisor {
    /// Spawn a monitor loop for every target and return once all are running.
    pub fn start(
        targets: Vec<Target>,
        context: Arc<MonitorContext>,
    ) -> Result<Self, SupervisorError> {
        if targets.is_empty() {
            return Err(SupervisorError::NoTargets);
        }

        let (stop_tx, _) = broadcast::channel(1);
        let handles = targets
            .into_iter()
            .map(|target| {
                tracing::info!("Supervisor: monitoring {}", target);
                let monitor = TargetMonitor::new(target, context.clone());
                tokio::spawn(monitor.run(stop_tx.subscribe()))
            })
            .collect();

        Ok(Self { stop_tx, handles })
    }

    /// Number of running monitor loops.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Signal every loop to stop and wait for them to finish.
    pub async fn shutdown(self) {
        let _ = self.stop_tx.send(());

        for handle in self.handles {
            if let Err(e) = handle.await {
                tracing::error!("Supervisor: monitor task failed: {}", e);
            }
        }
    }
}
