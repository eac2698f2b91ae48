//! The execution-service seam.
//!
//! [`QuantumService`] is everything the core needs from the remote
//! execution service. The lifecycle it serves:
//!
//! ```text
//!   list_devices() ──→ create_task() ──→ get_task() ──→ get_result()
//!                           │               (poll)         (COMPLETED only)
//!                           └──→ cancel_task()
//! ```
//!
//! ## Method table
//!
//! | Method | Returns | Notes |
//! |--------|---------|-------|
//! | `name()` | `&str` | sync |
//! | `list_devices()` | `Vec<DeviceDescriptor>` | service order |
//! | `get_device()` | `DeviceDescriptor` | `NotFound` if unknown |
//! | `create_task()` | `ExecutionTask` | status `CREATED` |
//! | `get_task()` | `ExecutionTask` | current status |
//! | `get_result()` | `TaskResult` | `Rejected` unless `COMPLETED` |
//! | `cancel_task()` | `bool` | `false` if already terminal |
//! | `search_tasks()` | `Vec<TaskSummary>` | may over-return |
//!
//! The service is connected lazily: [`LazyService`] holds a [`Connector`]
//! and creates the handle on first use, then reuses it for the lifetime of
//! the process. A failed connection is not remembered; the next call tries
//! again.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::info;

use crate::config::Settings;
use crate::device::DeviceDescriptor;
use crate::error::{BraketResult, ServiceResult};
use crate::result::TaskResult;
use crate::task::{ExecutionTask, OutputLocation, TaskId, TaskQuery, TaskSummary};

/// A request to run a program on a device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRequest {
    /// Target device.
    pub device_arn: String,
    /// OpenQASM program text, already verified.
    pub program: String,
    /// Number of shots.
    pub shots: u32,
    /// Where raw output goes, if the caller chose.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_location: Option<OutputLocation>,
}

/// The remote quantum execution service.
///
/// # Contract
///
/// - `create_task()` MUST return a task in `CREATED` status and MUST NOT
///   wait for execution.
/// - Task status MUST only move forward (see
///   [`TaskStatus::can_transition_to`](crate::task::TaskStatus::can_transition_to)).
/// - `get_result()` MUST return counts summing to the executed shots.
/// - `search_tasks()` SHOULD honor the query; callers re-filter anyway.
#[async_trait]
pub trait QuantumService: Send + Sync {
    /// Name of the service, for logs.
    fn name(&self) -> &str;

    /// All devices, in service order.
    async fn list_devices(&self) -> ServiceResult<Vec<DeviceDescriptor>>;

    /// One device by ARN.
    async fn get_device(&self, device_arn: &str) -> ServiceResult<DeviceDescriptor>;

    /// Create a task. Returns once the service has accepted it.
    async fn create_task(&self, request: TaskRequest) -> ServiceResult<ExecutionTask>;

    /// Current state of a task.
    async fn get_task(&self, task_id: &TaskId) -> ServiceResult<ExecutionTask>;

    /// Measurement result of a completed task.
    async fn get_result(&self, task_id: &TaskId) -> ServiceResult<TaskResult>;

    /// Request cancellation. Returns whether the service accepted it.
    async fn cancel_task(&self, task_id: &TaskId) -> ServiceResult<bool>;

    /// Tasks matching a query, most recent first.
    async fn search_tasks(&self, query: &TaskQuery) -> ServiceResult<Vec<TaskSummary>>;
}

/// Creates service handles.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a connection using the current settings.
    async fn connect(&self, settings: &Settings) -> ServiceResult<Arc<dyn QuantumService>>;
}

/// A service handle created on first use.
pub struct LazyService {
    connector: Box<dyn Connector>,
    cell: OnceCell<Arc<dyn QuantumService>>,
}

impl LazyService {
    /// Wrap a connector. Nothing is connected yet.
    pub fn new(connector: impl Connector + 'static) -> Self {
        Self {
            connector: Box::new(connector),
            cell: OnceCell::new(),
        }
    }

    /// Wrap an existing handle.
    pub fn ready(service: Arc<dyn QuantumService>) -> Self {
        struct Never;

        #[async_trait]
        impl Connector for Never {
            async fn connect(&self, _: &Settings) -> ServiceResult<Arc<dyn QuantumService>> {
                Err(crate::error::ServiceError::Internal(
                    "service handle was provided up front".into(),
                ))
            }
        }

        Self {
            connector: Box::new(Never),
            cell: OnceCell::new_with(Some(service)),
        }
    }

    /// Whether a handle exists.
    pub fn is_connected(&self) -> bool {
        self.cell.initialized()
    }

    /// The handle, connecting first if needed.
    pub async fn get(&self, settings: &Settings) -> BraketResult<Arc<dyn QuantumService>> {
        let service = self
            .cell
            .get_or_try_init(|| async {
                let service = self.connector.connect(settings).await?;
                info!(
                    service = service.name(),
                    region = settings.region.as_deref().unwrap_or("default"),
                    "connected to quantum service"
                );
                Ok::<_, crate::error::ServiceError>(service)
            })
            .await?;
        Ok(Arc::clone(service))
    }
}

impl std::fmt::Debug for LazyService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LazyService")
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{BraketError, ServiceError};
    use crate::local::LocalService;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting {
        calls: Arc<AtomicUsize>,
        fail_first: bool,
    }

    #[async_trait]
    impl Connector for Counting {
        async fn connect(&self, _: &Settings) -> ServiceResult<Arc<dyn QuantumService>> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_first && n == 0 {
                return Err(ServiceError::Authentication("token expired".into()));
            }
            Ok(Arc::new(LocalService::new("us-east-1")))
        }
    }

    fn settings() -> Settings {
        Settings::from_lookup(|_| None)
    }

    #[tokio::test]
    async fn test_connects_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let lazy = LazyService::new(Counting {
            calls: Arc::clone(&calls),
            fail_first: false,
        });
        assert!(!lazy.is_connected());

        let a = lazy.get(&settings()).await.unwrap();
        let b = lazy.get(&settings()).await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(lazy.is_connected());
    }

    #[tokio::test]
    async fn test_failed_connection_is_retried() {
        let calls = Arc::new(AtomicUsize::new(0));
        let lazy = LazyService::new(Counting {
            calls: Arc::clone(&calls),
            fail_first: true,
        });

        let err = lazy.get(&settings()).await.err().expect("first connect should fail");
        assert!(matches!(err, BraketError::Backend(ServiceError::Authentication(_))));
        assert!(!lazy.is_connected());

        assert!(lazy.get(&settings()).await.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_ready_handle() {
        let lazy = LazyService::ready(Arc::new(LocalService::new("us-west-2")));
        assert!(lazy.is_connected());
        let service = lazy.get(&settings()).await.unwrap();
        assert!(!service.list_devices().await.unwrap().is_empty());
    }
}
