//! In-process execution service.
//!
//! [`LocalService`] implements [`QuantumService`] in memory. It serves the
//! standard device fleet, accepts verified OpenQASM programs and walks each
//! task through the lifecycle one step per status read:
//!
//! ```text
//!   create_task() → CREATED ─get_task()→ QUEUED ─get_task()→ RUNNING ─get_task()→ COMPLETED
//! ```
//!
//! Every `get_task` counts as a read, including the status reads
//! [`TaskRegistry`](crate::registry::TaskRegistry) makes before `cancel`
//! and `get_result`. A `get_task_result` on a fresh task therefore answers
//! `Pending` and moves it to `QUEUED`.
//!
//! In manual mode tasks stay where they are until [`LocalService::advance`]
//! or [`LocalService::fail`] moves them.
//!
//! Completed tasks report the two-outcome distribution of an ideal GHZ
//! state: half the shots all zeros, half all ones, over the measured qubits.
//!
//! All state sits behind one `std::sync::Mutex`. No method awaits while
//! holding it, so requests are serialized at the connection layer.

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::circuit;
use crate::config::Settings;
use crate::device::DeviceDescriptor;
use crate::error::{ServiceError, ServiceResult};
use crate::result::{self, Counts, TaskResult};
use crate::service::{Connector, QuantumService, TaskRequest};
use crate::task::{ExecutionTask, TaskId, TaskQuery, TaskStatus, TaskSummary};

const DEFAULT_REGION: &str = "us-east-1";

#[derive(Debug, Clone)]
struct LocalTask {
    task: ExecutionTask,
    measured_qubits: Vec<u32>,
}

#[derive(Debug)]
struct LocalState {
    devices: Vec<DeviceDescriptor>,
    tasks: Vec<LocalTask>,
    auto_advance: bool,
    injected: Option<ServiceError>,
}

impl LocalState {
    fn task_mut(&mut self, task_id: &TaskId) -> ServiceResult<&mut LocalTask> {
        self.tasks
            .iter_mut()
            .find(|t| t.task.task_id == *task_id)
            .ok_or_else(|| ServiceError::NotFound(format!("quantum task {task_id}")))
    }
}

/// In-memory execution service.
#[derive(Debug)]
pub struct LocalService {
    region: String,
    state: Mutex<LocalState>,
}

impl LocalService {
    /// A service with the standard fleet, advancing tasks on every read.
    pub fn new(region: impl Into<String>) -> Self {
        let region = region.into();
        let devices = DeviceDescriptor::braket_fleet(&region);
        Self::with_devices(region, devices)
    }

    /// A service with an explicit device list.
    pub fn with_devices(region: impl Into<String>, devices: Vec<DeviceDescriptor>) -> Self {
        Self {
            region: region.into(),
            state: Mutex::new(LocalState {
                devices,
                tasks: Vec::new(),
                auto_advance: true,
                injected: None,
            }),
        }
    }

    /// Stop advancing tasks on reads, including internal status reads.
    pub fn manual(self) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state.auto_advance = false;
        }
        self
    }

    fn state(&self) -> ServiceResult<MutexGuard<'_, LocalState>> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| ServiceError::Internal("local service state poisoned".into()))?;
        match state.injected.take() {
            Some(err) => Err(err),
            None => Ok(state),
        }
    }

    /// Make the next request fail with `err`.
    pub fn inject_error(&self, err: ServiceError) {
        if let Ok(mut state) = self.state.lock() {
            state.injected = Some(err);
        }
    }

    /// Move a task one step along its lifecycle. Returns the new status.
    pub fn advance(&self, task_id: &TaskId) -> ServiceResult<TaskStatus> {
        let mut state = self.state()?;
        let entry = state.task_mut(task_id)?;
        step(&mut entry.task);
        Ok(entry.task.status)
    }

    /// Mark a non-terminal task as failed.
    pub fn fail(&self, task_id: &TaskId, reason: impl Into<String>) -> ServiceResult<()> {
        let mut state = self.state()?;
        let task = &mut state.task_mut(task_id)?.task;
        if !task.status.can_transition_to(TaskStatus::Failed) {
            return Err(ServiceError::Rejected(format!(
                "task {task_id} is already {}",
                task.status
            )));
        }
        task.status = TaskStatus::Failed;
        task.ended_at = Some(Utc::now());
        task.failure_reason = Some(reason.into());
        Ok(())
    }

    /// Change a device's status.
    pub fn set_device_status(
        &self,
        device_arn: &str,
        status: crate::device::DeviceStatus,
    ) -> ServiceResult<()> {
        let mut state = self.state()?;
        let device = state
            .devices
            .iter_mut()
            .find(|d| d.device_arn == device_arn)
            .ok_or_else(|| ServiceError::NotFound(format!("device {device_arn}")))?;
        device.device_status = status;
        Ok(())
    }
}

/// Next lifecycle step of a non-terminal task.
fn step(task: &mut ExecutionTask) {
    let next = match task.status {
        TaskStatus::Created => TaskStatus::Queued,
        TaskStatus::Queued => TaskStatus::Running,
        TaskStatus::Running => TaskStatus::Completed,
        terminal => terminal,
    };
    if next != task.status {
        debug!(task_id = %task.task_id, from = %task.status, to = %next, "task advanced");
        task.status = next;
        if next.is_terminal() {
            task.ended_at = Some(Utc::now());
        }
    }
}

fn ghz_counts(width: usize, shots: u32) -> Counts {
    let ones = u64::from(shots / 2);
    let zeros = u64::from(shots) - ones;
    let mut counts = Counts::new();
    counts.insert("0".repeat(width), zeros);
    if ones > 0 {
        counts.insert("1".repeat(width), ones);
    }
    counts
}

#[async_trait]
impl QuantumService for LocalService {
    fn name(&self) -> &str {
        "local"
    }

    async fn list_devices(&self) -> ServiceResult<Vec<DeviceDescriptor>> {
        Ok(self.state()?.devices.clone())
    }

    async fn get_device(&self, device_arn: &str) -> ServiceResult<DeviceDescriptor> {
        self.state()?
            .devices
            .iter()
            .find(|d| d.device_arn == device_arn)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(format!("device {device_arn}")))
    }

    async fn create_task(&self, request: TaskRequest) -> ServiceResult<ExecutionTask> {
        let program = circuit::verify(&request.program)
            .map_err(|e| ServiceError::Rejected(e.to_string()))?;

        let mut state = self.state()?;
        let device = state
            .devices
            .iter()
            .find(|d| d.device_arn == request.device_arn)
            .ok_or_else(|| ServiceError::NotFound(format!("device {}", request.device_arn)))?;
        if !device.device_status.accepts_tasks() {
            return Err(ServiceError::Rejected(format!(
                "device {} is {}",
                device.device_arn, device.device_status
            )));
        }
        if request.shots == 0 || request.shots > device.capabilities.max_shots {
            return Err(ServiceError::Rejected(format!(
                "shots must be between 1 and {}",
                device.capabilities.max_shots
            )));
        }

        let mut measured_qubits = program.measured_qubits();
        if measured_qubits.is_empty() {
            measured_qubits = (0..program.qubit_count()).collect();
        }

        let task = ExecutionTask {
            task_id: TaskId::new(format!(
                "arn:aws:braket:{}:000000000000:quantum-task/{}",
                self.region,
                Uuid::new_v4()
            )),
            status: TaskStatus::Created,
            device_arn: request.device_arn,
            shots: request.shots,
            created_at: Utc::now(),
            ended_at: None,
            failure_reason: None,
            output_location: request.output_location,
        };
        info!(
            task_id = %task.task_id,
            device = %task.device_arn,
            shots = task.shots,
            "task created"
        );
        state.tasks.push(LocalTask {
            task: task.clone(),
            measured_qubits,
        });
        Ok(task)
    }

    async fn get_task(&self, task_id: &TaskId) -> ServiceResult<ExecutionTask> {
        let mut state = self.state()?;
        let auto = state.auto_advance;
        let entry = state.task_mut(task_id)?;
        let snapshot = entry.task.clone();
        if auto {
            step(&mut entry.task);
        }
        Ok(snapshot)
    }

    async fn get_result(&self, task_id: &TaskId) -> ServiceResult<TaskResult> {
        let mut state = self.state()?;
        let entry = state.task_mut(task_id)?;
        let task = &entry.task;
        if task.status != TaskStatus::Completed {
            return Err(ServiceError::Rejected(format!(
                "task {task_id} is {}, results exist only for COMPLETED tasks",
                task.status
            )));
        }
        let counts = ghz_counts(entry.measured_qubits.len(), task.shots);
        let mut result = TaskResult::completed(
            task.task_id.clone(),
            task.device_arn.clone(),
            counts,
            task.shots,
        )
        .with_measured_qubits(entry.measured_qubits.clone())
        .with_metadata(serde_json::json!({
            "service": "local",
            "output_location": task.output_location.as_ref().map(ToString::to_string),
        }));
        if let Some(ms) = result::duration_ms(task) {
            result = result.with_execution_duration(ms);
        }
        Ok(result)
    }

    async fn cancel_task(&self, task_id: &TaskId) -> ServiceResult<bool> {
        let mut state = self.state()?;
        let task = &mut state.task_mut(task_id)?.task;
        if task.status.is_terminal() {
            return Ok(false);
        }
        task.status = TaskStatus::Cancelled;
        task.ended_at = Some(Utc::now());
        info!(task_id = %task_id, "task cancelled");
        Ok(true)
    }

    async fn search_tasks(&self, query: &TaskQuery) -> ServiceResult<Vec<TaskSummary>> {
        let state = self.state()?;
        Ok(state
            .tasks
            .iter()
            .rev()
            .map(|t| t.task.summary())
            .filter(|s| query.matches(s))
            .take(query.max_results)
            .collect())
    }
}

/// Connects to a fresh [`LocalService`] in the configured region.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalConnector;

#[async_trait]
impl Connector for LocalConnector {
    async fn connect(&self, settings: &Settings) -> ServiceResult<Arc<dyn QuantumService>> {
        let region = settings.region.as_deref().unwrap_or(DEFAULT_REGION);
        Ok(Arc::new(LocalService::new(region)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::library;
    use crate::config::DEFAULT_DEVICE_ARN;
    use crate::device::DeviceStatus;

    fn bell_request(shots: u32) -> TaskRequest {
        TaskRequest {
            device_arn: DEFAULT_DEVICE_ARN.into(),
            program: library::bell_pair().to_qasm().unwrap(),
            shots,
            output_location: None,
        }
    }

    #[tokio::test]
    async fn test_lifecycle_advances_per_read() {
        let service = LocalService::new("us-east-1");
        let task = service.create_task(bell_request(1000)).await.unwrap();
        assert_eq!(task.status, TaskStatus::Created);
        assert!(task.task_id.as_str().contains(":quantum-task/"));

        let mut seen = Vec::new();
        for _ in 0..5 {
            seen.push(service.get_task(&task.task_id).await.unwrap().status);
        }
        assert_eq!(
            seen,
            vec![
                TaskStatus::Created,
                TaskStatus::Queued,
                TaskStatus::Running,
                TaskStatus::Completed,
                TaskStatus::Completed,
            ]
        );

        let result = service.get_result(&task.task_id).await.unwrap();
        assert_eq!(result.counts.total_shots(), 1000);
        assert_eq!(result.counts.get("00"), 500);
        assert_eq!(result.counts.get("11"), 500);
        assert_eq!(result.measured_qubits, vec![0, 1]);
        assert!(result.check().is_ok());
    }

    #[tokio::test]
    async fn test_registry_reads_advance_too() {
        let service = Arc::new(LocalService::new("us-east-1"));
        let registry = crate::registry::TaskRegistry::new(service.clone());
        let task = service.create_task(bell_request(10)).await.unwrap();

        let err = registry.get_result(&task.task_id).await.unwrap_err();
        assert!(matches!(
            err,
            crate::error::BraketError::Pending { status: TaskStatus::Created, .. }
        ));
        assert_eq!(service.get_task(&task.task_id).await.unwrap().status, TaskStatus::Queued);

        let manual = Arc::new(LocalService::new("us-east-1").manual());
        let registry = crate::registry::TaskRegistry::new(manual.clone());
        let task = manual.create_task(bell_request(10)).await.unwrap();
        assert!(registry.get_result(&task.task_id).await.is_err());
        assert_eq!(manual.get_task(&task.task_id).await.unwrap().status, TaskStatus::Created);
    }

    #[tokio::test]
    async fn test_odd_shots_still_sum() {
        let service = LocalService::new("us-east-1");
        let task = service.create_task(bell_request(1)).await.unwrap();
        for _ in 0..3 {
            service.advance(&task.task_id).unwrap();
        }
        let result = service.get_result(&task.task_id).await.unwrap();
        assert_eq!(result.counts.total_shots(), 1);
        assert_eq!(result.counts.len(), 1);
    }

    #[tokio::test]
    async fn test_manual_mode_and_cancel() {
        let service = LocalService::new("us-east-1").manual();
        let task = service.create_task(bell_request(10)).await.unwrap();

        assert_eq!(service.get_task(&task.task_id).await.unwrap().status, TaskStatus::Created);
        assert_eq!(service.get_task(&task.task_id).await.unwrap().status, TaskStatus::Created);
        assert!(service.get_result(&task.task_id).await.is_err());

        assert!(service.cancel_task(&task.task_id).await.unwrap());
        assert!(!service.cancel_task(&task.task_id).await.unwrap());
        let after = service.get_task(&task.task_id).await.unwrap();
        assert_eq!(after.status, TaskStatus::Cancelled);
        assert!(after.ended_at.is_some());
        assert_eq!(service.advance(&task.task_id).unwrap(), TaskStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_fail_sets_reason() {
        let service = LocalService::new("us-east-1").manual();
        let task = service.create_task(bell_request(10)).await.unwrap();
        service.fail(&task.task_id, "calibration drift").unwrap();
        let failed = service.get_task(&task.task_id).await.unwrap();
        assert_eq!(failed.status, TaskStatus::Failed);
        assert_eq!(failed.failure_reason.as_deref(), Some("calibration drift"));
        assert!(service.fail(&task.task_id, "again").is_err());
    }

    #[tokio::test]
    async fn test_rejections() {
        let service = LocalService::new("us-east-1");
        let mut bad = bell_request(10);
        bad.program = "qubit q; frobnicate q;".into();
        assert!(matches!(service.create_task(bad).await, Err(ServiceError::Rejected(_))));

        let mut unknown = bell_request(10);
        unknown.device_arn = "arn:aws:braket:::device/nope".into();
        assert!(matches!(service.create_task(unknown).await, Err(ServiceError::NotFound(_))));

        service
            .set_device_status(DEFAULT_DEVICE_ARN, DeviceStatus::Offline)
            .unwrap();
        assert!(matches!(
            service.create_task(bell_request(10)).await,
            Err(ServiceError::Rejected(_))
        ));

        assert!(matches!(
            service.get_task(&TaskId::new("missing")).await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_injected_error_is_one_shot() {
        let service = LocalService::new("us-east-1");
        service.inject_error(ServiceError::Throttled("rate exceeded".into()));
        assert!(matches!(service.list_devices().await, Err(ServiceError::Throttled(_))));
        assert!(service.list_devices().await.is_ok());
    }

    #[tokio::test]
    async fn test_search_most_recent_first() {
        let service = LocalService::new("us-east-1").manual();
        let first = service.create_task(bell_request(10)).await.unwrap();
        let second = service.create_task(bell_request(20)).await.unwrap();

        let all = service.search_tasks(&TaskQuery::new()).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].task_id, second.task_id);
        assert_eq!(all[1].task_id, first.task_id);

        let capped = service
            .search_tasks(&TaskQuery::new().with_max_results(1))
            .await
            .unwrap();
        assert_eq!(capped.len(), 1);
    }

    #[tokio::test]
    async fn test_connector_uses_region() {
        let settings = Settings::from_lookup(|key| {
            (key == crate::config::REGION_ENV).then(|| "eu-north-1".to_string())
        });
        let service = LocalConnector.connect(&settings).await.unwrap();
        let devices = service.list_devices().await.unwrap();
        assert!(devices.iter().any(|d| d.region == "eu-north-1"));
    }
}
