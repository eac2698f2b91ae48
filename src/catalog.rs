//! Device discovery and program/device compatibility.
//!
//! The catalog is a thin, uncached view over the service: each call asks
//! the service again, so a device that goes offline is seen on the next
//! read.
//!
//! [`validate`] answers whether a verified program can be submitted to a
//! device as written:
//!
//! | Outcome | When |
//! |---------|------|
//! | `Invalid` | device offline or retired, analog-only device, too few qubits |
//! | `RequiresTranspilation` | gates outside the device gate set, uncoupled qubit pairs |
//! | `Valid` | otherwise |

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::circuit::{CircuitProgram, OpKind};
use crate::config::Settings;
use crate::device::DeviceDescriptor;
use crate::error::{BraketError, BraketResult};
use crate::service::QuantumService;

/// Result of checking a program against a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ValidationResult {
    /// The program can be submitted as-is.
    Valid,
    /// The program cannot run on this device.
    Invalid {
        /// Reasons the program is rejected.
        reasons: Vec<String>,
    },
    /// The program could run after transpilation.
    RequiresTranspilation {
        /// What transpilation is needed.
        details: String,
    },
}

impl ValidationResult {
    /// Check if the program can be submitted as-is.
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationResult::Valid)
    }

    /// Convert anything but `Valid` into a validation error.
    pub fn into_result(self, device_arn: &str) -> BraketResult<()> {
        match self {
            ValidationResult::Valid => Ok(()),
            ValidationResult::Invalid { reasons } => Err(BraketError::Validation(format!(
                "program cannot run on {device_arn}: {}",
                reasons.join("; ")
            ))),
            ValidationResult::RequiresTranspilation { details } => Err(BraketError::Validation(
                format!("program needs transpilation for {device_arn}: {details}"),
            )),
        }
    }
}

/// Check a verified program against a device.
pub fn validate(program: &CircuitProgram, device: &DeviceDescriptor) -> ValidationResult {
    let caps = &device.capabilities;
    let mut reasons = Vec::new();

    if !device.device_status.accepts_tasks() {
        reasons.push(format!("device is {}", device.device_status));
    }
    if !caps.accepts_openqasm() {
        reasons.push(format!("{} does not run gate-model programs", device.device_name));
    } else if program.qubit_count() > caps.num_qubits {
        reasons.push(format!(
            "program uses {} qubits, device has {}",
            program.qubit_count(),
            caps.num_qubits
        ));
    }
    if !reasons.is_empty() {
        return ValidationResult::Invalid { reasons };
    }

    let unsupported: Vec<&str> = program
        .gate_names()
        .into_iter()
        .filter(|g| !caps.gate_set.contains(g))
        .collect();
    if !unsupported.is_empty() {
        return ValidationResult::RequiresTranspilation {
            details: format!(
                "gates not supported by {}: {}",
                device.device_name,
                unsupported.join(", ")
            ),
        };
    }

    if !caps.is_simulator {
        let uncoupled = program.operations().iter().find(|op| {
            op.kind == OpKind::Gate
                && op.qubits.len() == 2
                && !caps.topology.is_connected(op.qubits[0], op.qubits[1])
        });
        if let Some(op) = uncoupled {
            return ValidationResult::RequiresTranspilation {
                details: format!(
                    "{} acts on qubits {} and {}, which are not coupled",
                    op.name, op.qubits[0], op.qubits[1]
                ),
            };
        }
    }

    ValidationResult::Valid
}

/// Device to use: `explicit` if given and non-blank, else the configured default.
pub fn resolve_device(explicit: Option<&str>, settings: &Settings) -> String {
    match explicit.map(str::trim) {
        Some(arn) if !arn.is_empty() => arn.to_string(),
        _ => settings.default_device_arn(),
    }
}

/// Read-only view of the devices the service offers.
#[derive(Clone)]
pub struct DeviceCatalog {
    service: Arc<dyn QuantumService>,
}

impl DeviceCatalog {
    /// Create a catalog over a service.
    pub fn new(service: Arc<dyn QuantumService>) -> Self {
        Self { service }
    }

    /// All devices, in the order the service returned them.
    pub async fn list_devices(&self) -> BraketResult<Vec<DeviceDescriptor>> {
        Ok(self.service.list_devices().await?)
    }

    /// One device by ARN.
    pub async fn get_device_info(&self, device_arn: &str) -> BraketResult<DeviceDescriptor> {
        let device_arn = device_arn.trim();
        if device_arn.is_empty() {
            return Err(BraketError::Validation("device_arn must not be empty".into()));
        }
        Ok(self.service.get_device(device_arn).await?)
    }
}

impl std::fmt::Debug for DeviceCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceCatalog")
            .field("service", &self.service.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::Capabilities;
    use crate::circuit::verify;
    use crate::config::{DEFAULT_DEVICE_ARN, DEFAULT_DEVICE_ENV};
    use crate::device::DeviceStatus;
    use crate::local::LocalService;

    const BELL: &str = "qubit[2] q;\nbit[2] c;\nh q[0];\ncx q[0], q[1];\nc = measure q;";

    fn device(caps: Capabilities) -> DeviceDescriptor {
        DeviceDescriptor::new("arn:test", "Test", "Test", caps)
    }

    #[test]
    fn test_validate_simulator() {
        let program = verify(BELL).unwrap();
        assert!(validate(&program, &device(Capabilities::sv1())).is_valid());
    }

    #[test]
    fn test_validate_too_many_qubits() {
        let program = verify("qubit[20] q;\nh q;").unwrap();
        let result = validate(&program, &device(Capabilities::dm1()));
        assert!(matches!(
            result,
            ValidationResult::Invalid { ref reasons } if reasons[0].contains("20 qubits")
        ));
    }

    #[test]
    fn test_validate_offline_and_analog() {
        let program = verify(BELL).unwrap();
        let offline = device(Capabilities::sv1()).with_status(DeviceStatus::Retired);
        assert!(matches!(validate(&program, &offline), ValidationResult::Invalid { .. }));

        let analog = device(Capabilities::quera(256));
        let err = validate(&program, &analog).into_result("arn:test").unwrap_err();
        assert!(matches!(err, BraketError::Validation(ref m) if m.contains("gate-model")));
    }

    #[test]
    fn test_validate_needs_transpilation() {
        let program = verify("qubit[2] q;\nms(0, 0, pi/2) q[0], q[1];").unwrap();
        let result = validate(&program, &device(Capabilities::iqm(5)));
        assert!(matches!(
            result,
            ValidationResult::RequiresTranspilation { ref details } if details.contains("ms")
        ));

        // Qubits 0 and 4 are not neighbours on a 3x3 grid.
        let far = verify("qubit[5] q;\ncz q[0], q[4];").unwrap();
        let result = validate(&far, &device(Capabilities::iqm(5)));
        assert!(matches!(
            result,
            ValidationResult::RequiresTranspilation { ref details }
                if details.contains("not coupled")
        ));
    }

    #[test]
    fn test_resolve_device() {
        let defaults = Settings::from_lookup(|_| None);
        assert_eq!(resolve_device(None, &defaults), DEFAULT_DEVICE_ARN);
        assert_eq!(resolve_device(Some("  "), &defaults), DEFAULT_DEVICE_ARN);
        assert_eq!(resolve_device(Some("arn:x"), &defaults), "arn:x");

        let overridden =
            Settings::from_lookup(|k| (k == DEFAULT_DEVICE_ENV).then(|| "arn:dm1".to_string()));
        assert_eq!(resolve_device(None, &overridden), "arn:dm1");
    }

    #[tokio::test]
    async fn test_catalog_reads() {
        let service = Arc::new(LocalService::new("us-east-1"));
        let catalog = DeviceCatalog::new(service.clone());

        let devices = catalog.list_devices().await.unwrap();
        assert_eq!(devices.len(), 7);
        assert_eq!(devices[0].device_name, "SV1");

        let sv1 = catalog.get_device_info(DEFAULT_DEVICE_ARN).await.unwrap();
        assert_eq!(sv1.device_name, "SV1");

        assert!(matches!(
            catalog.get_device_info("arn:aws:braket:::device/unknown").await,
            Err(BraketError::NotFound(_))
        ));
        assert!(matches!(catalog.get_device_info(" ").await, Err(BraketError::Validation(_))));

        // Not cached: a status change is visible on the next read.
        service.set_device_status(DEFAULT_DEVICE_ARN, DeviceStatus::Offline).unwrap();
        let sv1 = catalog.get_device_info(DEFAULT_DEVICE_ARN).await.unwrap();
        assert_eq!(sv1.device_status, DeviceStatus::Offline);
    }

    #[tokio::test]
    async fn test_empty_catalog() {
        let empty = LocalService::with_devices("us-east-1", Vec::new());
        let catalog = DeviceCatalog::new(Arc::new(empty));
        assert!(catalog.list_devices().await.unwrap().is_empty());
    }
}
