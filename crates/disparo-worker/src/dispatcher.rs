//! At-most-one-active host for send operations.

use std::sync::Arc;

use disparo_core::error::DisparoError;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::info;

use crate::control::{OperationControl, OperationStatus, StateSnapshot};
use crate::operation::{RunSummary, SendOperation};
use crate::registry::ProcessRegistry;

struct ActiveOperation {
    id: String,
    control: OperationControl,
    handle: JoinHandle<Result<RunSummary, DisparoError>>,
}

/// Hosts one operation at a time and exposes its control surface.
///
/// Starting while an operation is running or paused is rejected, never
/// merged. A finished operation stays queryable until the next start.
pub struct Dispatcher {
    active: Mutex<Option<ActiveOperation>>,
    registry: Option<Arc<ProcessRegistry>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self {
            active: Mutex::new(None),
            registry: None,
        }
    }

    /// Mirror status changes into a registry.
    pub fn with_registry(mut self, registry: Arc<ProcessRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Spawn an operation and return its control handle.
    pub async fn start(&self, operation: SendOperation) -> Result<OperationControl, DisparoError> {
        let mut active = self.active.lock().await;
        if let Some(current) = active.as_ref() {
            if current.control.snapshot().running {
                return Err(DisparoError::Config(format!(
                    "operation {} is still active",
                    current.id
                )));
            }
        }
        let id = operation.id().to_string();
        let control = operation.control();
        // Mark the operation active before the task is first polled, so a
        // second start arriving before the spawned run() gets scheduled
        // still sees a running operation and is rejected.
        control.set_status(OperationStatus::Running);
        let handle = tokio::spawn(operation.run());
        info!(operation = %id, "operation dispatched");
        *active = Some(ActiveOperation {
            id,
            control: control.clone(),
            handle,
        });
        Ok(control)
    }

    pub async fn pause(&self) {
        let active = self.active.lock().await;
        if let Some(op) = active.as_ref() {
            op.control.pause();
            if op.control.status() == OperationStatus::Paused {
                self.mirror_status(&op.id, OperationStatus::Paused).await;
            }
        }
    }

    pub async fn resume(&self) {
        let active = self.active.lock().await;
        if let Some(op) = active.as_ref() {
            op.control.resume();
            if op.control.status() == OperationStatus::Running {
                self.mirror_status(&op.id, OperationStatus::Running).await;
            }
        }
    }

    pub async fn stop(&self) {
        let active = self.active.lock().await;
        if let Some(op) = active.as_ref() {
            op.control.stop();
            self.mirror_status(&op.id, OperationStatus::Stopped).await;
        }
    }

    pub async fn state(&self) -> Option<StateSnapshot> {
        self.active
            .lock()
            .await
            .as_ref()
            .map(|op| op.control.snapshot())
    }

    /// Wait for the active operation to finish and hand back its result.
    pub async fn wait(&self) -> Option<Result<RunSummary, DisparoError>> {
        let taken = self.active.lock().await.take();
        let op = taken?;
        match op.handle.await {
            Ok(result) => Some(result),
            Err(e) => Some(Err(DisparoError::Config(format!(
                "operation task failed: {e}"
            )))),
        }
    }

    async fn mirror_status(&self, id: &str, status: OperationStatus) {
        if let Some(registry) = &self.registry {
            registry.set_status(id, status).await;
        }
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}
