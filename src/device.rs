//! Device descriptors.
//!
//! A [`DeviceDescriptor`] is a read-only snapshot of what the service
//! reports about one device. It is never mutated locally and never cached:
//! every catalog read goes back to the service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::capability::{Capabilities, NoiseProfile};

/// Simulator or physical hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeviceType {
    /// Managed simulator.
    Simulator,
    /// Quantum processing unit.
    Qpu,
}

/// Whether a device currently takes tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeviceStatus {
    /// Accepting tasks.
    Online,
    /// Temporarily unavailable.
    Offline,
    /// Permanently withdrawn.
    Retired,
}

impl DeviceStatus {
    /// Whether new tasks can be created on the device.
    pub fn accepts_tasks(&self) -> bool {
        matches!(self, DeviceStatus::Online)
    }
}

impl std::fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            DeviceStatus::Online => "ONLINE",
            DeviceStatus::Offline => "OFFLINE",
            DeviceStatus::Retired => "RETIRED",
        })
    }
}

/// Queue and scheduling information for a device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceAvailability {
    /// Tasks waiting ahead of a new submission, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queue_depth: Option<u32>,
    /// Estimated wait for a new task in seconds, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_wait_secs: Option<f64>,
    /// Next window in which the device executes tasks, for QPUs with fixed hours.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window: Option<AvailabilityWindow>,
}

impl DeviceAvailability {
    /// Always available: empty queue, no wait, no window.
    pub fn always() -> Self {
        Self {
            queue_depth: Some(0),
            estimated_wait_secs: Some(0.0),
            window: None,
        }
    }

    /// Nothing known about the queue.
    pub fn unknown() -> Self {
        Self {
            queue_depth: None,
            estimated_wait_secs: None,
            window: None,
        }
    }
}

/// A time window during which the device executes tasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityWindow {
    /// Window start.
    pub starts_at: DateTime<Utc>,
    /// Window end.
    pub ends_at: DateTime<Utc>,
}

/// What the service reports about a device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    /// Device ARN, the catalog key.
    pub device_arn: String,
    /// Short device name, e.g. `SV1`.
    pub device_name: String,
    /// Provider name, e.g. `Amazon Braket`.
    pub provider_name: String,
    /// Simulator or QPU.
    pub device_type: DeviceType,
    /// Current status.
    pub device_status: DeviceStatus,
    /// Region hosting the device. Empty for region-independent simulators.
    #[serde(default)]
    pub region: String,
    /// What the device can run.
    pub capabilities: Capabilities,
    /// Queue information.
    pub availability: DeviceAvailability,
}

impl DeviceDescriptor {
    /// Create a descriptor with `ONLINE` status and an empty queue.
    pub fn new(
        device_arn: impl Into<String>,
        device_name: impl Into<String>,
        provider_name: impl Into<String>,
        capabilities: Capabilities,
    ) -> Self {
        let device_type = if capabilities.is_simulator {
            DeviceType::Simulator
        } else {
            DeviceType::Qpu
        };
        Self {
            device_arn: device_arn.into(),
            device_name: device_name.into(),
            provider_name: provider_name.into(),
            device_type,
            device_status: DeviceStatus::Online,
            region: String::new(),
            capabilities,
            availability: DeviceAvailability::always(),
        }
    }

    /// Set the status.
    pub fn with_status(mut self, status: DeviceStatus) -> Self {
        self.device_status = status;
        self
    }

    /// Set the region.
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    /// Set the availability.
    pub fn with_availability(mut self, availability: DeviceAvailability) -> Self {
        self.availability = availability;
        self
    }

    /// The standard Braket fleet in one region: three managed simulators
    /// and one device per QPU family.
    pub fn braket_fleet(region: &str) -> Vec<DeviceDescriptor> {
        let qpu = |provider: &str, name: &str| {
            format!(
                "arn:aws:braket:{region}::device/qpu/{}/{name}",
                provider.to_ascii_lowercase()
            )
        };
        vec![
            Self::new(
                "arn:aws:braket:::device/quantum-simulator/amazon/sv1",
                "SV1",
                "Amazon Braket",
                Capabilities::sv1(),
            ),
            Self::new(
                "arn:aws:braket:::device/quantum-simulator/amazon/dm1",
                "DM1",
                "Amazon Braket",
                Capabilities::dm1(),
            ),
            Self::new(
                "arn:aws:braket:::device/quantum-simulator/amazon/tn1",
                "TN1",
                "Amazon Braket",
                Capabilities::tn1(),
            ),
            Self::new(
                qpu("IonQ", "Aria-1"),
                "Aria 1",
                "IonQ",
                Capabilities::ionq(25)
                    .with_noise_profile(NoiseProfile::fidelities(0.9998, 0.986, 0.9952)),
            )
                .with_region(region)
                .with_availability(DeviceAvailability {
                    queue_depth: Some(12),
                    estimated_wait_secs: Some(3_600.0),
                    window: None,
                }),
            Self::new(
                qpu("Rigetti", "Ankaa-3"),
                "Ankaa-3",
                "Rigetti",
                Capabilities::rigetti(84).with_noise_profile(
                    NoiseProfile::fidelities(0.999, 0.995, 0.97).with_coherence(22.0, 15.0),
                ),
            )
                .with_region(region)
                .with_availability(DeviceAvailability::unknown()),
            Self::new(
                qpu("IQM", "Garnet"),
                "Garnet",
                "IQM",
                Capabilities::iqm(20).with_noise_profile(
                    NoiseProfile::fidelities(0.9991, 0.9925, 0.978).with_coherence(43.0, 27.0),
                ),
            )
                .with_region(region)
                .with_availability(DeviceAvailability::unknown()),
            Self::new(qpu("QuEra", "Aquila"), "Aquila", "QuEra", Capabilities::quera(256))
                .with_region(region)
                .with_status(DeviceStatus::Offline),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_names() {
        assert_eq!(serde_json::to_value(DeviceType::Qpu).unwrap(), "QPU");
        assert_eq!(serde_json::to_value(DeviceType::Simulator).unwrap(), "SIMULATOR");
        assert_eq!(serde_json::to_value(DeviceStatus::Retired).unwrap(), "RETIRED");
    }

    #[test]
    fn test_type_follows_capabilities() {
        let sim = DeviceDescriptor::new("arn:sim", "Sim", "Test", Capabilities::sv1());
        assert_eq!(sim.device_type, DeviceType::Simulator);
        assert!(sim.device_status.accepts_tasks());

        let qpu = DeviceDescriptor::new("arn:qpu", "QPU", "Test", Capabilities::iqm(5));
        assert_eq!(qpu.device_type, DeviceType::Qpu);
    }

    #[test]
    fn test_fleet() {
        let fleet = DeviceDescriptor::braket_fleet("us-east-1");
        assert_eq!(fleet[0].device_arn, crate::config::DEFAULT_DEVICE_ARN);
        let aria = "arn:aws:braket:us-east-1::device/qpu/ionq/Aria-1";
        assert!(fleet.iter().any(|d| d.device_arn == aria));
        assert!(fleet.iter().any(|d| !d.device_status.accepts_tasks()));
    }

    #[test]
    fn test_fleet_noise_profiles() {
        let fleet = DeviceDescriptor::braket_fleet("us-east-1");
        for device in &fleet {
            let gate_model_qpu =
                device.device_type == DeviceType::Qpu && device.capabilities.accepts_openqasm();
            let has_noise = device.capabilities.noise_profile.is_some();
            assert_eq!(has_noise, gate_model_qpu, "{}", device.device_name);
        }
        let garnet = fleet.iter().find(|d| d.device_name == "Garnet").unwrap();
        let noise = garnet.capabilities.noise_profile.as_ref().unwrap();
        assert!(noise.t1.is_some());
        let fidelities = [
            noise.single_qubit_fidelity,
            noise.two_qubit_fidelity,
            noise.readout_fidelity,
        ];
        for fidelity in fidelities {
            assert!(fidelity.is_some_and(|f| (0.0..=1.0).contains(&f)));
        }

        let json = serde_json::to_value(garnet).unwrap();
        assert!(json["capabilities"]["noise_profile"]["two_qubit_fidelity"].is_number());
    }
}
