//! Tool dispatch.
//!
//! [`ToolRouter`] is the only entry point the tool transport needs. A call
//! goes through four steps:
//!
//! ```text
//!   name ──→ ToolName::parse ──→ schema::normalize ──→ decode::<Request> ──→ one core operation
//!                                (types, defaults)     (typed request)
//! ```
//!
//! Every response is a JSON object with a `success` flag. Failures carry
//! `error` (message) and `error_type` (see [`BraketError::kind`]):
//!
//! ```json
//! {"success": false, "error": "not found: quantum task ...", "error_type": "NotFoundError"}
//! ```
//!
//! This is the only place where errors become data. The service handle is
//! created on the first call that needs it and shared by every later call;
//! configuration is read again on every call.

pub mod schema;

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use thiserror::Error;
use tracing::{debug, warn};

use crate::catalog::{self, DeviceCatalog};
use crate::circuit::{self, CircuitDef, library};
use crate::config::Settings;
use crate::describe::{self, VisualizationFormat};
use crate::error::{BraketError, BraketResult};
use crate::local::LocalConnector;
use crate::registry::TaskRegistry;
use crate::result::TaskResult;
use crate::service::{Connector, LazyService, QuantumService};
use crate::task::{OutputLocation, TaskId, TaskQuery, TaskStatus};

pub use schema::{ToolDefinition, ToolName};

/// URI of the device list resource.
pub const DEVICES_RESOURCE: &str = "amazon-braket://devices";

/// Failures while routing a tool call.
#[derive(Debug, Error)]
pub enum ToolError {
    /// No tool with this name.
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    /// Arguments did not match the tool's schema.
    #[error("invalid arguments: {0}")]
    InvalidParams(String),

    /// No resource with this URI.
    #[error("unknown resource: {0}")]
    UnknownResource(String),

    /// The core operation failed.
    #[error(transparent)]
    Core(#[from] BraketError),

    /// A response could not be serialized.
    #[error("could not serialize response: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ToolError {
    /// Value of `error_type` in the failure envelope.
    pub fn kind(&self) -> &'static str {
        match self {
            ToolError::UnknownTool(_) => "UnknownToolError",
            ToolError::InvalidParams(_) => "ValidationError",
            ToolError::UnknownResource(_) => "NotFoundError",
            ToolError::Core(err) => err.kind(),
            ToolError::Serialization(_) => "InternalError",
        }
    }
}

fn decode<T: for<'de> Deserialize<'de>>(args: Map<String, Value>) -> Result<T, ToolError> {
    serde_json::from_value(Value::Object(args))
        .map_err(|err| ToolError::InvalidParams(err.to_string()))
}

fn success(body: Value) -> Value {
    match body {
        Value::Object(mut map) => {
            map.insert("success".into(), Value::Bool(true));
            Value::Object(map)
        }
        other => json!({"success": true, "data": other}),
    }
}

fn failure(err: &ToolError) -> Value {
    json!({
        "success": false,
        "error": err.to_string(),
        "error_type": err.kind(),
    })
}

fn to_u32(name: &str, value: i64) -> BraketResult<u32> {
    u32::try_from(value).map_err(|_| {
        BraketError::Validation(format!(
            "{name} must be between 0 and {}, got {value}",
            u32::MAX
        ))
    })
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[derive(Deserialize)]
struct CreateCircuitRequest {
    qasm_program: String,
    filename: Option<String>,
}

#[derive(Deserialize)]
struct RunTaskRequest {
    circuit: Option<CircuitDef>,
    qasm_program: Option<String>,
    device_arn: Option<String>,
    shots: i64,
    s3_bucket: Option<String>,
    s3_prefix: Option<String>,
}

#[derive(Deserialize)]
struct TaskIdRequest {
    task_id: String,
}

#[derive(Deserialize)]
struct DeviceRequest {
    device_arn: String,
}

#[derive(Deserialize)]
struct SearchRequest {
    device_arn: Option<String>,
    state: Option<String>,
    max_results: i64,
    days_ago: Option<i64>,
}

#[derive(Deserialize)]
struct FilenameRequest {
    filename: Option<String>,
}

#[derive(Deserialize)]
struct LibraryCircuitRequest {
    filename: Option<String>,
    num_qubits: i64,
}

#[derive(Deserialize)]
struct VisualizeCircuitRequest {
    circuit: CircuitDef,
}

#[derive(Deserialize)]
struct VisualizeResultsRequest {
    result: TaskResult,
    format: String,
}

#[derive(Deserialize)]
struct DescribeRequest {
    visualization_data: Map<String, Value>,
}

type SettingsSource = Box<dyn Fn() -> Settings + Send + Sync>;

/// Routes tool calls to the core components.
pub struct ToolRouter {
    service: LazyService,
    settings: SettingsSource,
}

impl ToolRouter {
    /// A router reading settings from the process environment.
    pub fn new(connector: impl Connector + 'static) -> Self {
        Self::with_settings(connector, Settings::from_env)
    }

    /// A router over the in-process service.
    pub fn local() -> Self {
        Self::new(LocalConnector)
    }

    /// A router with a custom settings source, called once per tool call.
    pub fn with_settings(
        connector: impl Connector + 'static,
        settings: impl Fn() -> Settings + Send + Sync + 'static,
    ) -> Self {
        Self {
            service: LazyService::new(connector),
            settings: Box::new(settings),
        }
    }

    /// A router over an existing service handle.
    pub fn with_service(
        service: Arc<dyn QuantumService>,
        settings: impl Fn() -> Settings + Send + Sync + 'static,
    ) -> Self {
        Self {
            service: LazyService::ready(service),
            settings: Box::new(settings),
        }
    }

    /// Definitions of every tool.
    pub fn list_tools(&self) -> Vec<ToolDefinition> {
        ToolName::ALL.iter().map(ToolName::definition).collect()
    }

    /// Run a tool call and wrap the outcome in the response envelope.
    ///
    /// Never fails: every error is returned as a failure envelope.
    pub async fn handle_tool_call(&self, name: &str, arguments: Value) -> Value {
        debug!(tool = name, "tool call");
        match self.dispatch(name, arguments).await {
            Ok(body) => success(body),
            Err(err) => {
                warn!(tool = name, error_type = err.kind(), error = %err, "tool call failed");
                failure(&err)
            }
        }
    }

    /// Read a resource by URI.
    pub async fn read_resource(&self, uri: &str) -> Result<Value, ToolError> {
        if uri != DEVICES_RESOURCE {
            return Err(ToolError::UnknownResource(uri.to_string()));
        }
        let devices = self.catalog(&(self.settings)()).await?.list_devices().await?;
        Ok(json!({
            "uri": DEVICES_RESOURCE,
            "mime_type": "application/json",
            "devices": serde_json::to_value(devices)?,
        }))
    }

    async fn service(&self, settings: &Settings) -> BraketResult<Arc<dyn QuantumService>> {
        self.service.get(settings).await
    }

    async fn catalog(&self, settings: &Settings) -> BraketResult<DeviceCatalog> {
        Ok(DeviceCatalog::new(self.service(settings).await?))
    }

    async fn registry(&self, settings: &Settings) -> BraketResult<TaskRegistry> {
        Ok(TaskRegistry::new(self.service(settings).await?))
    }

    async fn dispatch(&self, name: &str, arguments: Value) -> Result<Value, ToolError> {
        let tool = ToolName::parse(name).ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
        let args = schema::normalize(tool, arguments)?;
        let settings = (self.settings)();

        match tool {
            ToolName::CreateQuantumCircuit => {
                let req: CreateCircuitRequest = decode(args)?;
                Ok(create_circuit(&req.qasm_program, req.filename, &settings)?)
            }
            ToolName::RunQuantumTask => self.run_task(decode(args)?, &settings).await,
            ToolName::GetTaskStatus => {
                let req: TaskIdRequest = decode(args)?;
                let registry = self.registry(&settings).await?;
                let task = registry.get_status(&TaskId::new(req.task_id)).await?;
                Ok(serde_json::to_value(task)?)
            }
            ToolName::GetTaskResult => {
                let req: TaskIdRequest = decode(args)?;
                let registry = self.registry(&settings).await?;
                let result = registry.get_result(&TaskId::new(req.task_id)).await?;
                Ok(serde_json::to_value(result)?)
            }
            ToolName::ListDevices => {
                let devices = self.catalog(&settings).await?.list_devices().await?;
                Ok(json!({ "count": devices.len(), "devices": serde_json::to_value(devices)? }))
            }
            ToolName::GetDeviceInfo => {
                let req: DeviceRequest = decode(args)?;
                let device = self.catalog(&settings).await?.get_device_info(&req.device_arn).await?;
                Ok(serde_json::to_value(device)?)
            }
            ToolName::CancelQuantumTask => {
                let req: TaskIdRequest = decode(args)?;
                let task_id = TaskId::new(req.task_id);
                let registry = self.registry(&settings).await?;
                let cancelled = registry.cancel(&task_id).await?;
                let status = registry.get_status(&task_id).await?.status;
                Ok(json!({ "task_id": task_id, "cancelled": cancelled, "status": status }))
            }
            ToolName::SearchQuantumTasks => self.search(decode(args)?, &settings).await,
            ToolName::CreateBellPairCircuit => {
                let req: FilenameRequest = decode(args)?;
                Ok(library_circuit(&library::bell_pair(), req.filename, &settings)?)
            }
            ToolName::CreateGhzCircuit => {
                let req: LibraryCircuitRequest = decode(args)?;
                let circuit = library::ghz(to_u32("num_qubits", req.num_qubits)?)?;
                Ok(library_circuit(&circuit, req.filename, &settings)?)
            }
            ToolName::CreateQftCircuit => {
                let req: LibraryCircuitRequest = decode(args)?;
                let circuit = library::qft(to_u32("num_qubits", req.num_qubits)?)?;
                Ok(library_circuit(&circuit, req.filename, &settings)?)
            }
            ToolName::VisualizeCircuit => {
                let req: VisualizeCircuitRequest = decode(args)?;
                let program = circuit::verify(&req.circuit.to_qasm()?)?;
                let vis = describe::visualize_circuit(&program);
                Ok(json!({
                    "format": vis.format,
                    "circuit_diagram": vis.content,
                    "description": vis.description,
                }))
            }
            ToolName::VisualizeResults => {
                let req: VisualizeResultsRequest = decode(args)?;
                let format: VisualizationFormat = req.format.parse()?;
                let vis = describe::visualize(&req.result, format)?;
                Ok(serde_json::to_value(vis)?)
            }
            ToolName::DescribeVisualization => {
                let req: DescribeRequest = decode(args)?;
                describe_data(req.visualization_data)
            }
        }
    }

    async fn run_task(&self, req: RunTaskRequest, settings: &Settings) -> Result<Value, ToolError> {
        let text = match (req.circuit, non_blank(req.qasm_program)) {
            (Some(circuit), None) => circuit.to_qasm()?,
            (None, Some(text)) => text,
            (Some(_), Some(_)) => {
                return Err(ToolError::InvalidParams(
                    "pass either circuit or qasm_program, not both".into(),
                ));
            }
            (None, None) => {
                return Err(ToolError::InvalidParams(
                    "one of circuit or qasm_program is required".into(),
                ));
            }
        };
        let program = circuit::verify(&text)?;
        let shots = to_u32("shots", req.shots)?;
        let output_location = match (non_blank(req.s3_bucket), non_blank(req.s3_prefix)) {
            (Some(bucket), prefix) => Some(OutputLocation::new(bucket, prefix.unwrap_or_default())),
            (None, Some(_)) => {
                return Err(BraketError::Validation("s3_prefix needs s3_bucket".into()).into());
            }
            (None, None) => None,
        };

        let device_arn = catalog::resolve_device(req.device_arn.as_deref(), settings);
        let task_id = self
            .registry(settings)
            .await?
            .submit(&program, &device_arn, shots, output_location)
            .await?;
        Ok(json!({
            "task_id": task_id,
            "status": TaskStatus::Created,
            "device_arn": device_arn,
            "shots": shots,
        }))
    }

    async fn search(&self, req: SearchRequest, settings: &Settings) -> Result<Value, ToolError> {
        let max_results = usize::try_from(req.max_results).map_err(|_| {
            BraketError::Validation(format!(
                "max_results must be positive, got {}",
                req.max_results
            ))
        })?;
        let mut query = TaskQuery::new().with_max_results(max_results);
        if let Some(arn) = non_blank(req.device_arn) {
            query = query.with_device(arn);
        }
        if let Some(state) = non_blank(req.state) {
            query = query.with_status(state.parse()?);
        }
        if let Some(days) = req.days_ago {
            if days < 0 {
                let message = format!("days_ago must not be negative, got {days}");
                return Err(BraketError::Validation(message).into());
            }
            let since = Duration::try_days(days)
                .and_then(|d| Utc::now().checked_sub_signed(d))
                .ok_or_else(|| BraketError::Validation(format!("days_ago is too large: {days}")))?;
            query = query.created_after(since);
        }

        let tasks = self.registry(settings).await?.search(&query).await?;
        Ok(json!({ "count": tasks.len(), "tasks": serde_json::to_value(tasks)? }))
    }
}

impl std::fmt::Debug for ToolRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRouter")
            .field("service", &self.service)
            .finish_non_exhaustive()
    }
}

/// Verify, render and optionally save program text.
fn create_circuit(
    text: &str,
    filename: Option<String>,
    settings: &Settings,
) -> BraketResult<Value> {
    let program = circuit::verify(text)?;
    let mut body = json!({
        "num_qubits": program.qubit_count(),
        "num_operations": program.operation_count(),
        "depth": program.depth(),
        "circuit_diagram": circuit::render(&program),
    });
    let (file_path, message) = match non_blank(filename) {
        Some(name) => {
            let path = circuit::save(text, &name, &settings.workspace_dir)?;
            let message = format!("Circuit verified and saved to {}", path.display());
            (Some(path.display().to_string()), message)
        }
        None => (None, "Circuit verified successfully (not saved to file)".to_string()),
    };
    if let Some(map) = body.as_object_mut() {
        if let Some(path) = file_path {
            map.insert("file_path".into(), Value::String(path));
        }
        map.insert("message".into(), Value::String(message));
    }
    Ok(body)
}

fn library_circuit(
    circuit: &CircuitDef,
    filename: Option<String>,
    settings: &Settings,
) -> BraketResult<Value> {
    let text = circuit.to_qasm()?;
    let mut body = create_circuit(&text, filename, settings)?;
    if let Some(map) = body.as_object_mut() {
        map.insert("qasm_program".into(), Value::String(text));
    }
    Ok(body)
}

fn describe_data(mut data: Map<String, Value>) -> Result<Value, ToolError> {
    if let Some(circuit_def) = data.remove("circuit_def") {
        let circuit: CircuitDef = serde_json::from_value(circuit_def)
            .map_err(|err| ToolError::InvalidParams(format!("circuit_def: {err}")))?;
        let program = circuit::verify(&circuit.to_qasm()?)?;
        return Ok(json!({
            "type": "circuit_description",
            "description": describe::describe_circuit(&program),
        }));
    }
    if let Some(result) = data.remove("result") {
        let result: TaskResult = serde_json::from_value(result)
            .map_err(|err| ToolError::InvalidParams(format!("result: {err}")))?;
        return Ok(json!({
            "type": "results_description",
            "description": describe::describe_result(&result)?,
        }));
    }
    Err(ToolError::InvalidParams(
        "unknown visualization data format, expected circuit_def or result fields".into(),
    ))
}
