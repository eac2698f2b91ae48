//! Task submission and tracking.
//!
//! The registry keeps no state of its own: every read goes to the service,
//! so what it reports is what the service reported at call time. It never
//! polls and never waits for a task to finish. `get_result` and `cancel`
//! read the status first, so a service that steps tasks on reads (such as
//! [`LocalService`](crate::local::LocalService)) sees those reads too.
//!
//! | Operation | Non-terminal task | Terminal task |
//! |-----------|-------------------|---------------|
//! | `get_status` | current status | current status |
//! | `get_result` | `Pending` error | result (empty counts unless `COMPLETED`) |
//! | `cancel` | asks the service | `false`, nothing sent |

use std::sync::Arc;

use tracing::{info, warn};

use crate::catalog::{self, DeviceCatalog};
use crate::circuit::CircuitProgram;
use crate::error::{BraketError, BraketResult, ServiceError};
use crate::result::TaskResult;
use crate::service::{QuantumService, TaskRequest};
use crate::task::{ExecutionTask, OutputLocation, TaskId, TaskQuery, TaskStatus, TaskSummary};

/// Submits tasks and reads their state from the service.
#[derive(Clone)]
pub struct TaskRegistry {
    service: Arc<dyn QuantumService>,
    catalog: DeviceCatalog,
}

fn check_task_id(task_id: &TaskId) -> BraketResult<()> {
    if task_id.as_str().trim().is_empty() {
        return Err(BraketError::Validation("task_id must not be empty".into()));
    }
    Ok(())
}

impl TaskRegistry {
    /// Create a registry over a service.
    pub fn new(service: Arc<dyn QuantumService>) -> Self {
        Self {
            catalog: DeviceCatalog::new(Arc::clone(&service)),
            service,
        }
    }

    /// Submit a verified program.
    ///
    /// Returns as soon as the service has created the task.
    ///
    /// # Errors
    ///
    /// - `Validation` if `shots` is zero or above the device limit, or the
    ///   program does not fit the device
    /// - `InvalidDevice` if the device is not in the catalog
    pub async fn submit(
        &self,
        program: &CircuitProgram,
        device_arn: &str,
        shots: u32,
        output_location: Option<OutputLocation>,
    ) -> BraketResult<TaskId> {
        if shots == 0 {
            return Err(BraketError::Validation("shots must be at least 1".into()));
        }
        let device = match self.catalog.get_device_info(device_arn).await {
            Ok(device) => device,
            Err(BraketError::NotFound(_)) => {
                return Err(BraketError::InvalidDevice(device_arn.to_string()));
            }
            Err(err) => return Err(err),
        };
        if shots > device.capabilities.max_shots {
            return Err(BraketError::Validation(format!(
                "shots must be at most {} on {}",
                device.capabilities.max_shots, device.device_name
            )));
        }
        catalog::validate(program, &device).into_result(&device.device_arn)?;

        let task = self
            .service
            .create_task(TaskRequest {
                device_arn: device.device_arn.clone(),
                program: program.source().to_string(),
                shots,
                output_location,
            })
            .await?;
        info!(
            task_id = %task.task_id,
            device = %task.device_arn,
            shots,
            status = %task.status,
            "submitted quantum task"
        );
        Ok(task.task_id)
    }

    /// Current state of a task.
    pub async fn get_status(&self, task_id: &TaskId) -> BraketResult<ExecutionTask> {
        check_task_id(task_id)?;
        Ok(self.service.get_task(task_id).await?)
    }

    /// Result of a finished task.
    ///
    /// # Errors
    ///
    /// - `Pending` while the task is `CREATED`, `QUEUED` or `RUNNING`
    /// - `NotFound` for an unknown task
    /// - `Backend` if the service returns counts that do not add up
    pub async fn get_result(&self, task_id: &TaskId) -> BraketResult<TaskResult> {
        let task = self.get_status(task_id).await?;
        match task.status {
            TaskStatus::Completed => {
                let result = self.service.get_result(task_id).await?;
                if let Err(err) = result.check() {
                    warn!(task_id = %task_id, error = %err, "service returned a malformed result");
                    return Err(BraketError::Backend(ServiceError::Internal(format!(
                        "malformed result for task {task_id}: {err}"
                    ))));
                }
                Ok(result)
            }
            TaskStatus::Failed | TaskStatus::Cancelled => Ok(TaskResult::unfinished(&task)),
            status => Err(BraketError::Pending {
                task_id: task_id.to_string(),
                status,
            }),
        }
    }

    /// Request cancellation.
    ///
    /// Returns `false` without contacting the service for a terminal task.
    pub async fn cancel(&self, task_id: &TaskId) -> BraketResult<bool> {
        let task = self.get_status(task_id).await?;
        if task.status.is_terminal() {
            info!(
                task_id = %task_id,
                status = %task.status,
                "task already finished, not cancelling"
            );
            return Ok(false);
        }
        let accepted = self.service.cancel_task(task_id).await?;
        info!(task_id = %task_id, accepted, "cancellation requested");
        Ok(accepted)
    }

    /// Tasks matching every filter in `query`, at most `query.max_results`.
    pub async fn search(&self, query: &TaskQuery) -> BraketResult<Vec<TaskSummary>> {
        if query.max_results == 0 {
            return Err(BraketError::Validation("max_results must be at least 1".into()));
        }
        let found = self.service.search_tasks(query).await?;
        Ok(found
            .into_iter()
            .filter(|summary| query.matches(summary))
            .take(query.max_results)
            .collect())
    }
}

impl std::fmt::Debug for TaskRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskRegistry")
            .field("service", &self.service.name())
            .finish()
    }
}
