//! End-to-end tool sessions against the in-process service.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use braket_tools::config::{REGION_ENV, WORKSPACE_DIR_ENV};
use braket_tools::{
    Connector, LocalConnector, QuantumService, ServiceError, ServiceResult, Settings, ToolRouter,
};
use serde_json::{Value, json};

fn settings_for(dir: PathBuf) -> impl Fn() -> Settings + Send + Sync + 'static {
    move || {
        let dir = dir.display().to_string();
        Settings::from_lookup(|key| match key {
            WORKSPACE_DIR_ENV => Some(dir.clone()),
            REGION_ENV => Some("eu-west-2".to_string()),
            _ => None,
        })
    }
}

async fn call(router: &ToolRouter, tool: &str, args: Value) -> Value {
    router.handle_tool_call(tool, args).await
}

#[tokio::test]
async fn bell_pair_session() {
    let dir = tempfile::tempdir().unwrap();
    let router = ToolRouter::with_settings(LocalConnector, settings_for(dir.path().to_path_buf()));

    let args = json!({"filename": "circuits/bell.qasm"});
    let bell = call(&router, "create_bell_pair_circuit", args).await;
    assert_eq!(bell["success"], true, "{bell}");
    assert_eq!(bell["num_qubits"], 2);
    assert!(dir.path().join("circuits/bell.qasm").exists());

    let task = call(
        &router,
        "run_quantum_task",
        json!({"qasm_program": bell["qasm_program"], "shots": 200, "s3_bucket": "results"}),
    )
    .await;
    assert_eq!(task["success"], true, "{task}");
    assert_eq!(task["status"], "CREATED");
    let task_id = task["task_id"].as_str().unwrap().to_string();
    assert!(task_id.starts_with("arn:aws:braket:eu-west-2:"));

    let mut status = String::new();
    for _ in 0..10 {
        let reply = call(&router, "get_task_status", json!({"task_id": task_id})).await;
        status = reply["status"].as_str().unwrap().to_string();
        if status == "COMPLETED" {
            break;
        }
    }
    assert_eq!(status, "COMPLETED");

    let result = call(&router, "get_task_result", json!({"task_id": task_id})).await;
    assert_eq!(result["success"], true, "{result}");
    assert_eq!(result["shots"], 200);
    assert_eq!(result["counts"]["00"], 100);
    assert_eq!(result["counts"]["11"], 100);

    let mut result_doc = result.clone();
    result_doc.as_object_mut().unwrap().remove("success");

    let chart = call(&router, "visualize_results", json!({"result": result_doc})).await;
    assert_eq!(chart["format"], "text");
    assert!(chart["content"].as_str().unwrap().contains("00 │"));

    let described = call(
        &router,
        "describe_visualization",
        json!({"visualization_data": {"result": result_doc}}),
    )
    .await;
    assert_eq!(described["type"], "results_description");
    assert_eq!(described["description"]["pattern"], "correlated");

    let found = call(&router, "search_quantum_tasks", json!({"state": "COMPLETED"})).await;
    assert_eq!(found["count"], 1);
    assert_eq!(found["tasks"][0]["task_id"], task_id.as_str());

    let late_cancel = call(&router, "cancel_quantum_task", json!({"task_id": task_id})).await;
    assert_eq!(late_cancel["cancelled"], false);
    assert_eq!(late_cancel["status"], "COMPLETED");
}

#[tokio::test]
async fn device_catalog_session() {
    let dir = tempfile::tempdir().unwrap();
    let router = ToolRouter::with_settings(LocalConnector, settings_for(dir.path().to_path_buf()));

    let devices = call(&router, "list_devices", json!({})).await;
    let listed = devices["devices"].as_array().unwrap();
    assert!(listed.iter().any(|d| d["device_name"] == "SV1"));

    let aquila = listed
        .iter()
        .find(|d| d["device_name"] == "Aquila")
        .unwrap()
        .clone();
    let info = call(&router, "get_device_info", json!({"device_arn": aquila["device_arn"]})).await;
    assert_eq!(info["device_status"], "OFFLINE");

    let rejected = call(
        &router,
        "run_quantum_task",
        json!({"qasm_program": "qubit q;\nh q;", "device_arn": aquila["device_arn"]}),
    )
    .await;
    assert_eq!(rejected["success"], false);
    assert_eq!(rejected["error_type"], "ValidationError");

    let resource = router.read_resource("amazon-braket://devices").await.unwrap();
    assert_eq!(resource["devices"].as_array().unwrap().len(), listed.len());
}

fn assert_rejected(reply: &Value, error_type: &str) {
    assert_eq!(reply["success"], false, "{reply}");
    assert_eq!(reply["error_type"], error_type, "{reply}");
}

#[tokio::test]
async fn oversized_inputs_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let router = ToolRouter::with_settings(LocalConnector, settings_for(dir.path().to_path_buf()));

    let args = json!({"qasm_program": "qubit[4000000000] q;"});
    assert_rejected(&call(&router, "create_quantum_circuit", args).await, "ValidationError");

    let huge = json!({"num_qubits": 4_000_000_000u32, "gates": [{"name": "h", "qubits": [0]}]});
    let args = json!({"circuit": huge});
    assert_rejected(&call(&router, "visualize_circuit", args).await, "ValidationError");
    let args = json!({"visualization_data": {"circuit_def": huge}});
    assert_rejected(&call(&router, "describe_visualization", args).await, "ValidationError");
    let args = json!({"circuit": huge, "shots": 10});
    assert_rejected(&call(&router, "run_quantum_task", args).await, "ValidationError");

    let result = json!({
        "task_id": "arn:aws:braket:eu-west-2:000000000000:quantum-task/overflow",
        "status": "COMPLETED",
        "counts": {"0": u64::MAX, "1": 1},
        "device_arn": "arn:aws:braket:::device/quantum-simulator/amazon/sv1",
        "shots": 1,
    });
    let args = json!({"result": result});
    assert_rejected(&call(&router, "visualize_results", args).await, "ValidationError");
    let args = json!({"result": result, "format": "svg"});
    assert_rejected(&call(&router, "visualize_results", args).await, "ValidationError");
    let args = json!({"visualization_data": {"result": result}});
    assert_rejected(&call(&router, "describe_visualization", args).await, "ValidationError");

    // Still serving after the rejections.
    let ghz = call(&router, "create_ghz_circuit", json!({"num_qubits": 3})).await;
    assert_eq!(ghz["success"], true, "{ghz}");
}

#[tokio::test]
async fn saved_files_stay_in_the_workspace() {
    let root = tempfile::tempdir().unwrap();
    let outside = tempfile::tempdir().unwrap();
    let workspace = root.path().join("workspace");
    let router = ToolRouter::with_settings(LocalConnector, settings_for(workspace.clone()));

    let absolute = outside.path().join("escaped.qasm");
    let filename = absolute.display().to_string();
    let args = json!({"qasm_program": "qubit q;\nh q;", "filename": filename});
    assert_rejected(&call(&router, "create_quantum_circuit", args).await, "ValidationError");
    assert!(!absolute.exists());

    let args = json!({"filename": "../escaped.qasm"});
    assert_rejected(&call(&router, "create_bell_pair_circuit", args).await, "ValidationError");
    assert!(!root.path().join("escaped.qasm").exists());

    let args = json!({"filename": "nested/../../escaped.qasm", "num_qubits": 2});
    assert_rejected(&call(&router, "create_ghz_circuit", args).await, "ValidationError");
    assert!(!root.path().join("escaped.qasm").exists());

    let args = json!({"filename": "nested/ghz.qasm", "num_qubits": 2});
    let saved = call(&router, "create_ghz_circuit", args).await;
    assert_eq!(saved["success"], true, "{saved}");
    assert!(workspace.join("nested/ghz.qasm").exists());
}

#[tokio::test]
async fn unknown_device_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let router = ToolRouter::with_settings(LocalConnector, settings_for(dir.path().to_path_buf()));

    let args = json!({"device_arn": "arn:aws:braket:::device/qpu/nobody/nothing"});
    assert_rejected(&call(&router, "get_device_info", args).await, "NotFoundError");
    let args = json!({"device_arn": "  "});
    assert_rejected(&call(&router, "get_device_info", args).await, "ValidationError");
}

struct FlakyConnector {
    attempts: AtomicUsize,
}

#[async_trait]
impl Connector for FlakyConnector {
    async fn connect(&self, settings: &Settings) -> ServiceResult<Arc<dyn QuantumService>> {
        if self.attempts.fetch_add(1, Ordering::SeqCst) == 0 {
            return Err(ServiceError::Unavailable("endpoint unreachable".into()));
        }
        LocalConnector.connect(settings).await
    }
}

#[tokio::test]
async fn connection_failure_is_reported_then_retried() {
    let dir = tempfile::tempdir().unwrap();
    let router = ToolRouter::with_settings(
        FlakyConnector { attempts: AtomicUsize::new(0) },
        settings_for(dir.path().to_path_buf()),
    );

    // Circuit tools never touch the service.
    let ghz = call(&router, "create_ghz_circuit", json!({"num_qubits": 4})).await;
    assert_eq!(ghz["success"], true);

    let first = call(&router, "list_devices", json!({})).await;
    assert_eq!(first["success"], false);
    assert_eq!(first["error_type"], "BackendError");

    let second = call(&router, "list_devices", json!({})).await;
    assert_eq!(second["success"], true);
}
