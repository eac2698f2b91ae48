//! Braket Tools: a tool-call facade over quantum task execution
//!
//! This crate exposes a fixed set of named tools (JSON arguments in, JSON
//! envelope out) for building OpenQASM 3.0 circuits, running them as
//! quantum tasks on Amazon Braket devices, and explaining the results.
//!
//! # Overview
//!
//! - [`ToolRouter`] dispatches tool calls and wraps every outcome in a
//!   `{"success": ...}` envelope
//! - [`circuit`] verifies, draws and saves OpenQASM programs, and builds
//!   Bell, GHZ and QFT circuits
//! - [`DeviceCatalog`] lists devices and checks programs against their
//!   [`Capabilities`]
//! - [`TaskRegistry`] submits, tracks, cancels and searches tasks
//! - [`describe`] turns results and circuits into histograms and prose
//! - [`QuantumService`] is the seam to the remote service; [`LocalService`]
//!   implements it in process
//!
//! # Task lifecycle
//!
//! ```text
//!   verify() ──→ validate() ──→ submit() ──→ get_status() ──→ get_result()
//!    (sync)       (sync)        (async)       (async)          (async)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use braket_tools::ToolRouter;
//! use serde_json::json;
//!
//! let router = ToolRouter::local();
//! let bell = router.handle_tool_call("create_bell_pair_circuit", json!({})).await;
//! let task = router
//!     .handle_tool_call(
//!         "run_quantum_task",
//!         json!({"qasm_program": bell["qasm_program"], "shots": 100}),
//!     )
//!     .await;
//! assert_eq!(task["status"], "CREATED");
//! ```

pub mod capability;
pub mod catalog;
pub mod circuit;
pub mod config;
pub mod describe;
pub mod device;
pub mod error;
pub mod local;
pub mod registry;
pub mod result;
pub mod service;
pub mod task;
pub mod tools;

pub use capability::{Capabilities, GateSet, NoiseProfile, Topology, TopologyKind};
pub use catalog::{DeviceCatalog, ValidationResult};
pub use circuit::{CircuitDef, CircuitProgram, GateDef};
pub use config::Settings;
pub use describe::{Description, Visualization, VisualizationFormat};
pub use device::{DeviceDescriptor, DeviceStatus, DeviceType};
pub use error::{BraketError, BraketResult, ServiceError, ServiceResult};
pub use local::{LocalConnector, LocalService};
pub use registry::TaskRegistry;
pub use result::{Counts, TaskResult};
pub use service::{Connector, LazyService, QuantumService, TaskRequest};
pub use task::{ExecutionTask, OutputLocation, TaskId, TaskQuery, TaskStatus, TaskSummary};
pub use tools::{ToolDefinition, ToolError, ToolName, ToolRouter};
