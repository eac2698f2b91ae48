//! Tool names, argument schemas and argument normalization.
//!
//! Each tool declares its arguments once, as a static [`ArgSpec`] table.
//! The same table produces the JSON Schema published by
//! [`ToolRouter::list_tools`](super::ToolRouter::list_tools) and drives
//! [`normalize`], which checks a call's arguments and fills in defaults
//! before they are decoded into a typed request.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use super::ToolError;

/// Every tool the router serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolName {
    /// `create_quantum_circuit`: verify, draw and optionally save OpenQASM text.
    CreateQuantumCircuit,
    /// `run_quantum_task`: submit a circuit without waiting for it.
    RunQuantumTask,
    /// `get_task_status`: current state of a task.
    GetTaskStatus,
    /// `get_task_result`: counts of a completed task.
    GetTaskResult,
    /// `list_devices`: the device catalog.
    ListDevices,
    /// `get_device_info`: one device descriptor by ARN.
    GetDeviceInfo,
    /// `cancel_quantum_task`: request cancellation of a task.
    CancelQuantumTask,
    /// `search_quantum_tasks`: filter known tasks by device, state and age.
    SearchQuantumTasks,
    /// `create_bell_pair_circuit`: the two-qubit Bell circuit.
    CreateBellPairCircuit,
    /// `create_ghz_circuit`: an n-qubit GHZ circuit.
    CreateGhzCircuit,
    /// `create_qft_circuit`: an n-qubit quantum Fourier transform.
    CreateQftCircuit,
    /// `visualize_circuit`: draw a structured circuit.
    VisualizeCircuit,
    /// `visualize_results`: histogram of a result, as text or SVG.
    VisualizeResults,
    /// `describe_visualization`: plain-language summary of a circuit or result.
    DescribeVisualization,
}

impl ToolName {
    /// All tools, in listing order.
    pub const ALL: [ToolName; 14] = [
        ToolName::CreateQuantumCircuit,
        ToolName::RunQuantumTask,
        ToolName::GetTaskStatus,
        ToolName::GetTaskResult,
        ToolName::ListDevices,
        ToolName::GetDeviceInfo,
        ToolName::CancelQuantumTask,
        ToolName::SearchQuantumTasks,
        ToolName::CreateBellPairCircuit,
        ToolName::CreateGhzCircuit,
        ToolName::CreateQftCircuit,
        ToolName::VisualizeCircuit,
        ToolName::VisualizeResults,
        ToolName::DescribeVisualization,
    ];

    /// Wire name of the tool.
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolName::CreateQuantumCircuit => "create_quantum_circuit",
            ToolName::RunQuantumTask => "run_quantum_task",
            ToolName::GetTaskStatus => "get_task_status",
            ToolName::GetTaskResult => "get_task_result",
            ToolName::ListDevices => "list_devices",
            ToolName::GetDeviceInfo => "get_device_info",
            ToolName::CancelQuantumTask => "cancel_quantum_task",
            ToolName::SearchQuantumTasks => "search_quantum_tasks",
            ToolName::CreateBellPairCircuit => "create_bell_pair_circuit",
            ToolName::CreateGhzCircuit => "create_ghz_circuit",
            ToolName::CreateQftCircuit => "create_qft_circuit",
            ToolName::VisualizeCircuit => "visualize_circuit",
            ToolName::VisualizeResults => "visualize_results",
            ToolName::DescribeVisualization => "describe_visualization",
        }
    }

    /// Look up a tool by wire name.
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tool| tool.as_str() == name)
    }

    /// One-line description shown to the agent.
    pub fn description(&self) -> &'static str {
        match self {
            ToolName::CreateQuantumCircuit => {
                "Verify an OpenQASM 3.0 program, draw its circuit diagram and optionally save it to a file."
            }
            ToolName::RunQuantumTask => {
                "Run a circuit (structured definition or OpenQASM text) on a device. Returns the task id without waiting."
            }
            ToolName::GetTaskStatus => "Get the current status of a quantum task.",
            ToolName::GetTaskResult => {
                "Get the measurement result of a finished quantum task. Fails with PendingError while it is still running."
            }
            ToolName::ListDevices => "List available quantum devices.",
            ToolName::GetDeviceInfo => "Get information about a specific quantum device.",
            ToolName::CancelQuantumTask => "Cancel a quantum task that has not finished.",
            ToolName::SearchQuantumTasks => "Search quantum tasks by device, state and age.",
            ToolName::CreateBellPairCircuit => "Create a Bell pair circuit (two entangled qubits).",
            ToolName::CreateGhzCircuit => "Create a GHZ state circuit.",
            ToolName::CreateQftCircuit => "Create a quantum Fourier transform circuit.",
            ToolName::VisualizeCircuit => "Draw a structured circuit definition as a text diagram.",
            ToolName::VisualizeResults => "Draw the measurement counts of a task result as a histogram.",
            ToolName::DescribeVisualization => {
                "Describe circuit or result visualization data in plain language."
            }
        }
    }

    /// Argument table of the tool.
    pub fn args(&self) -> &'static [ArgSpec] {
        match self {
            ToolName::CreateQuantumCircuit => CREATE_CIRCUIT,
            ToolName::RunQuantumTask => RUN_TASK,
            ToolName::GetTaskStatus
            | ToolName::GetTaskResult
            | ToolName::CancelQuantumTask => TASK_ID,
            ToolName::ListDevices => &[],
            ToolName::GetDeviceInfo => DEVICE_ARN,
            ToolName::SearchQuantumTasks => SEARCH,
            ToolName::CreateBellPairCircuit => FILENAME,
            ToolName::CreateGhzCircuit | ToolName::CreateQftCircuit => LIBRARY_CIRCUIT,
            ToolName::VisualizeCircuit => VISUALIZE_CIRCUIT,
            ToolName::VisualizeResults => VISUALIZE_RESULTS,
            ToolName::DescribeVisualization => DESCRIBE,
        }
    }

    /// Published definition of the tool.
    pub fn definition(&self) -> ToolDefinition {
        let args = self.args();
        let properties: Map<String, Value> = args
            .iter()
            .map(|arg| (arg.name.to_string(), arg.schema()))
            .collect();
        let required: Vec<&str> = args.iter().filter(|a| a.required).map(|a| a.name).collect();
        ToolDefinition {
            name: self.as_str().to_string(),
            description: self.description().to_string(),
            input_schema: json!({
                "type": "object",
                "properties": properties,
                "required": required,
                "additionalProperties": false,
            }),
        }
    }
}

impl std::fmt::Display for ToolName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tool as published to the agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Wire name.
    pub name: String,
    /// What the tool does.
    pub description: String,
    /// JSON Schema of the arguments object.
    pub input_schema: Value,
}

/// JSON type of an argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgType {
    /// A JSON string.
    String,
    /// A JSON integer, signed or unsigned.
    Integer,
    /// A JSON object, decoded later by the tool's request type.
    Object,
}

impl ArgType {
    fn name(&self) -> &'static str {
        match self {
            ArgType::String => "string",
            ArgType::Integer => "integer",
            ArgType::Object => "object",
        }
    }

    fn accepts(&self, value: &Value) -> bool {
        match self {
            ArgType::String => value.is_string(),
            ArgType::Integer => value.is_i64() || value.is_u64(),
            ArgType::Object => value.is_object(),
        }
    }
}

/// Default applied when an optional argument is absent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ArgDefault {
    /// An integer default.
    Integer(i64),
    /// A string default.
    String(&'static str),
}

impl ArgDefault {
    fn to_value(self) -> Value {
        match self {
            ArgDefault::Integer(n) => Value::from(n),
            ArgDefault::String(s) => Value::from(s),
        }
    }
}

/// One declared argument.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArgSpec {
    /// Key in the arguments object.
    pub name: &'static str,
    /// Expected JSON type.
    pub ty: ArgType,
    /// Whether a call without this argument is rejected.
    pub required: bool,
    /// Value filled in when an optional argument is absent or `null`.
    pub default: Option<ArgDefault>,
    /// Published in the tool's JSON Schema.
    pub description: &'static str,
}

impl ArgSpec {
    const fn required(name: &'static str, ty: ArgType, description: &'static str) -> Self {
        Self {
            name,
            ty,
            required: true,
            default: None,
            description,
        }
    }

    const fn optional(name: &'static str, ty: ArgType, description: &'static str) -> Self {
        Self {
            name,
            ty,
            required: false,
            default: None,
            description,
        }
    }

    const fn defaulted(
        name: &'static str,
        ty: ArgType,
        default: ArgDefault,
        description: &'static str,
    ) -> Self {
        Self {
            name,
            ty,
            required: false,
            default: Some(default),
            description,
        }
    }

    fn schema(&self) -> Value {
        let mut schema = json!({
            "type": self.ty.name(),
            "description": self.description,
        });
        if let (Some(default), Some(obj)) = (self.default, schema.as_object_mut()) {
            obj.insert("default".into(), default.to_value());
        }
        schema
    }
}

const FILENAME_ARG: ArgSpec = ArgSpec::optional(
    "filename",
    ArgType::String,
    "File to save the program to, relative to the workspace directory. Omit to only verify.",
);

const CREATE_CIRCUIT: &[ArgSpec] = &[
    ArgSpec::required("qasm_program", ArgType::String, "OpenQASM 3.0 program text."),
    FILENAME_ARG,
];

const RUN_TASK: &[ArgSpec] = &[
    ArgSpec::optional(
        "circuit",
        ArgType::Object,
        "Structured circuit: {num_qubits, gates: [{name, qubits, params}]}.",
    ),
    ArgSpec::optional("qasm_program", ArgType::String, "OpenQASM 3.0 program text."),
    ArgSpec::optional(
        "device_arn",
        ArgType::String,
        "Device to run on. Defaults to the configured device.",
    ),
    ArgSpec::defaulted("shots", ArgType::Integer, ArgDefault::Integer(1000), "Number of shots."),
    ArgSpec::optional("s3_bucket", ArgType::String, "Bucket for raw task output."),
    ArgSpec::optional("s3_prefix", ArgType::String, "Key prefix for raw task output."),
];

const TASK_ID: &[ArgSpec] = &[ArgSpec::required("task_id", ArgType::String, "Quantum task id.")];

const DEVICE_ARN: &[ArgSpec] = &[ArgSpec::required("device_arn", ArgType::String, "Device ARN.")];

const SEARCH: &[ArgSpec] = &[
    ArgSpec::optional("device_arn", ArgType::String, "Only tasks on this device."),
    ArgSpec::optional(
        "state",
        ArgType::String,
        "Only tasks in this state: CREATED, QUEUED, RUNNING, COMPLETED, FAILED or CANCELLED.",
    ),
    ArgSpec::defaulted(
        "max_results",
        ArgType::Integer,
        ArgDefault::Integer(10),
        "Maximum number of tasks.",
    ),
    ArgSpec::optional("days_ago", ArgType::Integer, "Only tasks created within this many days."),
];

const FILENAME: &[ArgSpec] = &[FILENAME_ARG];

const LIBRARY_CIRCUIT: &[ArgSpec] = &[
    FILENAME_ARG,
    ArgSpec::defaulted(
        "num_qubits",
        ArgType::Integer,
        ArgDefault::Integer(3),
        "Number of qubits (1 to 32).",
    ),
];

const VISUALIZE_CIRCUIT: &[ArgSpec] = &[ArgSpec::required(
    "circuit",
    ArgType::Object,
    "Structured circuit: {num_qubits, gates: [{name, qubits, params}]}.",
)];

const VISUALIZE_RESULTS: &[ArgSpec] = &[
    ArgSpec::required("result", ArgType::Object, "Task result as returned by get_task_result."),
    ArgSpec::defaulted(
        "format",
        ArgType::String,
        ArgDefault::String("text"),
        "Output format: text or svg.",
    ),
];

const DESCRIBE: &[ArgSpec] = &[ArgSpec::required(
    "visualization_data",
    ArgType::Object,
    "Either {circuit_def: ...} or {result: ...}.",
)];

/// Check call arguments against a tool's table and fill in defaults.
///
/// `null` counts as absent. Unknown names, wrong types and missing
/// required arguments are [`ToolError::InvalidParams`].
pub fn normalize(tool: ToolName, arguments: Value) -> Result<Map<String, Value>, ToolError> {
    let mut given = match arguments {
        Value::Null => Map::new(),
        Value::Object(map) => map,
        other => {
            return Err(ToolError::InvalidParams(format!(
                "arguments to {tool} must be an object, got {}",
                type_name(&other)
            )));
        }
    };
    let specs = tool.args();

    if let Some(unknown) = given.keys().find(|k| !specs.iter().any(|s| s.name == k.as_str())) {
        return Err(ToolError::InvalidParams(format!(
            "unknown argument '{unknown}' for {tool}"
        )));
    }

    let mut out = Map::new();
    for spec in specs {
        match given.remove(spec.name).filter(|v| !v.is_null()) {
            Some(value) if spec.ty.accepts(&value) => {
                out.insert(spec.name.to_string(), value);
            }
            Some(value) => {
                return Err(ToolError::InvalidParams(format!(
                    "argument '{}' of {tool} must be {}, got {}",
                    spec.name,
                    spec.ty.name(),
                    type_name(&value)
                )));
            }
            None if spec.required => {
                return Err(ToolError::InvalidParams(format!(
                    "missing required argument '{}' for {tool}",
                    spec.name
                )));
            }
            None => {
                if let Some(default) = spec.default {
                    out.insert(spec.name.to_string(), default.to_value());
                }
            }
        }
    }
    Ok(out)
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip() {
        for tool in ToolName::ALL {
            assert_eq!(ToolName::parse(tool.as_str()), Some(tool));
        }
        assert_eq!(ToolName::parse("rm_rf"), None);
    }

    #[test]
    fn test_defaults_applied() {
        let args = normalize(ToolName::CreateGhzCircuit, json!({})).unwrap();
        assert_eq!(args["num_qubits"], 3);
        assert!(!args.contains_key("filename"));

        let args = normalize(ToolName::SearchQuantumTasks, Value::Null).unwrap();
        assert_eq!(args["max_results"], 10);

        let args =
            normalize(ToolName::RunQuantumTask, json!({"qasm_program": "qubit q;"})).unwrap();
        assert_eq!(args["shots"], 1000);

        let args = normalize(ToolName::VisualizeResults, json!({"result": {}})).unwrap();
        assert_eq!(args["format"], "text");
    }

    #[test]
    fn test_null_is_absent() {
        let args = json!({"filename": null, "num_qubits": null});
        let args = normalize(ToolName::CreateGhzCircuit, args).unwrap();
        assert_eq!(args["num_qubits"], 3);
        assert!(!args.contains_key("filename"));
    }

    #[test]
    fn test_rejections() {
        let err = normalize(ToolName::GetTaskResult, json!({})).unwrap_err();
        assert!(err.to_string().contains("missing required argument 'task_id'"));

        let err = normalize(ToolName::GetTaskResult, json!({"task_id": 7})).unwrap_err();
        assert!(err.to_string().contains("must be string, got integer"));

        let err = normalize(ToolName::CreateGhzCircuit, json!({"num_qubits": 2.5})).unwrap_err();
        assert!(err.to_string().contains("got number"));

        let err = normalize(ToolName::ListDevices, json!({"verbose": true})).unwrap_err();
        assert!(err.to_string().contains("unknown argument 'verbose'"));

        assert!(normalize(ToolName::ListDevices, json!([1])).is_err());
    }

    #[test]
    fn test_definition_schema() {
        let def = ToolName::SearchQuantumTasks.definition();
        assert_eq!(def.name, "search_quantum_tasks");
        assert_eq!(def.input_schema["properties"]["max_results"]["default"], 10);
        assert_eq!(def.input_schema["properties"]["state"]["type"], "string");
        assert_eq!(def.input_schema["required"], json!([]));

        let def = ToolName::CreateQuantumCircuit.definition();
        assert_eq!(def.input_schema["required"], json!(["qasm_program"]));
    }
}
