//! Device capability introspection.
//!
//! This module defines the types that describe what a Braket device can do:
//! qubit count, supported gates, connectivity topology, shot limits and
//! noise characteristics. The catalog uses them to decide whether a program
//! can be submitted to a device as written.
//!
//! Device families with presets:
//!
//! | Preset | Family | Gate model | Topology |
//! |--------|--------|------------|----------|
//! | [`Capabilities::sv1`] | on-demand state vector simulator | universal | full |
//! | [`Capabilities::dm1`] | on-demand density matrix simulator | universal | full |
//! | [`Capabilities::tn1`] | on-demand tensor network simulator | universal | full |
//! | [`Capabilities::ionq`] | trapped ion | `gpi`, `gpi2`, `ms` | full |
//! | [`Capabilities::rigetti`] | superconducting | `rx`, `rz`, `cz`, `iswap` | grid |
//! | [`Capabilities::iqm`] | superconducting | `prx`, `cz` | square lattice |
//! | [`Capabilities::quera`] | neutral atom, analog | none | none |
//!
//! Gate names are compared after alias folding ([`canonical_gate`]): a
//! program that writes `cnot` runs on a device that lists `cx`.
//!
//! All edges in [`Topology`] are bidirectional.

use serde::{Deserialize, Serialize};

/// Hardware capabilities of a device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Capabilities {
    /// Number of qubits available.
    pub num_qubits: u32,
    /// Supported gate set (canonical lowercase names).
    pub gate_set: GateSet,
    /// Qubit connectivity topology. All edges are bidirectional.
    pub topology: Topology,
    /// Maximum number of shots per task.
    pub max_shots: u32,
    /// Whether this is a simulator (not real hardware).
    pub is_simulator: bool,
    /// Action types the device accepts, e.g. `braket.ir.openqasm.program`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub features: Vec<String>,
    /// Device-wide noise averages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub noise_profile: Option<NoiseProfile>,
}

const OPENQASM_ACTION: &str = "braket.ir.openqasm.program";
const AHS_ACTION: &str = "braket.ir.ahs.program";

impl Capabilities {
    fn simulator(num_qubits: u32, extra: &str) -> Self {
        Self {
            num_qubits,
            gate_set: GateSet::universal(),
            topology: Topology::full(num_qubits),
            max_shots: 100_000,
            is_simulator: true,
            features: vec![OPENQASM_ACTION.into(), extra.into()],
            noise_profile: None,
        }
    }

    /// SV1: state vector simulator, up to 34 qubits.
    pub fn sv1() -> Self {
        Self::simulator(34, "statevector")
    }

    /// DM1: density matrix simulator with noise channels, up to 17 qubits.
    pub fn dm1() -> Self {
        Self::simulator(17, "density_matrix")
    }

    /// TN1: tensor network simulator, up to 50 qubits.
    pub fn tn1() -> Self {
        Self {
            max_shots: 1_000,
            ..Self::simulator(50, "tensor_network")
        }
    }

    /// IonQ trapped-ion devices (Aria, Forte). All-to-all connectivity.
    pub fn ionq(num_qubits: u32) -> Self {
        Self {
            num_qubits,
            gate_set: GateSet::ionq(),
            topology: Topology::full(num_qubits),
            max_shots: 10_000,
            is_simulator: false,
            features: vec![OPENQASM_ACTION.into()],
            noise_profile: None,
        }
    }

    /// Rigetti superconducting devices (Ankaa).
    pub fn rigetti(num_qubits: u32) -> Self {
        let side = (1..=num_qubits).find(|s| s * s >= num_qubits).unwrap_or(1);
        Self {
            num_qubits,
            gate_set: GateSet::rigetti(),
            topology: Topology::grid(side, side).restricted(num_qubits),
            max_shots: 100_000,
            is_simulator: false,
            features: vec![OPENQASM_ACTION.into()],
            noise_profile: None,
        }
    }

    /// IQM superconducting devices (Garnet).
    pub fn iqm(num_qubits: u32) -> Self {
        let side = (1..=num_qubits).find(|s| s * s >= num_qubits).unwrap_or(1);
        Self {
            num_qubits,
            gate_set: GateSet::iqm(),
            topology: Topology::grid(side, side).restricted(num_qubits),
            max_shots: 20_000,
            is_simulator: false,
            features: vec![OPENQASM_ACTION.into()],
            noise_profile: None,
        }
    }

    /// QuEra Aquila: analog Hamiltonian simulation, no gate model.
    pub fn quera(num_atoms: u32) -> Self {
        Self {
            num_qubits: num_atoms,
            gate_set: GateSet::empty(),
            topology: Topology::custom(Vec::new()),
            max_shots: 1_000,
            is_simulator: false,
            features: vec![AHS_ACTION.into()],
            noise_profile: None,
        }
    }

    /// Attach a noise profile.
    pub fn with_noise_profile(mut self, profile: NoiseProfile) -> Self {
        self.noise_profile = Some(profile);
        self
    }

    /// Whether the device accepts gate-model OpenQASM programs.
    pub fn accepts_openqasm(&self) -> bool {
        self.features.iter().any(|f| f == OPENQASM_ACTION)
    }
}

/// Fold a gate name onto its canonical OpenQASM 3 spelling.
///
/// Braket and OpenQASM 2 aliases (`cnot`, `phaseshift`, `ccnot`, `si`, `u3`,
/// ...) map to the stdgates name; unknown names pass through lowercased.
pub fn canonical_gate(name: &str) -> String {
    let lower = name.to_ascii_lowercase();
    let canonical = match lower.as_str() {
        "i" => "id",
        "cnot" => "cx",
        "ccnot" => "ccx",
        "si" => "sdg",
        "ti" => "tdg",
        "v" => "sx",
        "vi" => "sxdg",
        "phase" | "phaseshift" | "u1" => "p",
        "cphase" | "cphaseshift" | "cu1" => "cp",
        "u3" => "u",
        "xx" => "rxx",
        "yy" => "ryy",
        "zz" => "rzz",
        other => other,
    };
    canonical.to_string()
}

/// Gate set supported by a device.
///
/// The `native` list identifies gates that execute without decomposition.
/// If `native` is empty, all supported gates are considered native
/// (typical for simulators).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateSet {
    /// Single-qubit gates supported.
    pub single_qubit: Vec<String>,
    /// Two-qubit gates supported.
    pub two_qubit: Vec<String>,
    /// Three-qubit gates supported.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub three_qubit: Vec<String>,
    /// Native gates.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub native: Vec<String>,
}

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| (*s).to_string()).collect()
}

impl GateSet {
    /// No gates: analog devices.
    pub fn empty() -> Self {
        Self {
            single_qubit: Vec::new(),
            two_qubit: Vec::new(),
            three_qubit: Vec::new(),
            native: Vec::new(),
        }
    }

    /// Everything the simulators accept.
    pub fn universal() -> Self {
        Self {
            single_qubit: names(&[
                "id", "x", "y", "z", "h", "s", "sdg", "t", "tdg", "sx", "sxdg", "rx", "ry", "rz",
                "p", "u", "u2", "prx", "gpi", "gpi2",
            ]),
            two_qubit: names(&[
                "cx", "cy", "cz", "ch", "cv", "swap", "iswap", "pswap", "xy", "ecr", "crx", "cry",
                "crz", "cp", "cphaseshift00", "cphaseshift01", "cphaseshift10", "cu", "rxx",
                "ryy", "rzz", "ms",
            ]),
            three_qubit: names(&["ccx", "cswap"]),
            native: Vec::new(),
        }
    }

    /// IonQ: the standard set compiled to native `gpi`, `gpi2`, `ms`.
    pub fn ionq() -> Self {
        Self {
            single_qubit: names(&[
                "x", "y", "z", "h", "s", "sdg", "t", "tdg", "sx", "sxdg", "rx", "ry", "rz", "gpi",
                "gpi2",
            ]),
            two_qubit: names(&["cx", "swap", "rxx", "ryy", "rzz", "ms"]),
            three_qubit: Vec::new(),
            native: names(&["gpi", "gpi2", "ms"]),
        }
    }

    /// Rigetti: `rx`, `rz`, `cz`, `iswap` native.
    pub fn rigetti() -> Self {
        Self {
            single_qubit: names(&[
                "id", "x", "y", "z", "h", "s", "sdg", "t", "tdg", "rx", "ry", "rz", "p",
            ]),
            two_qubit: names(&[
                "cx",
                "cz",
                "cp",
                "swap",
                "iswap",
                "xy",
                "cphaseshift00",
                "cphaseshift01",
                "cphaseshift10",
            ]),
            three_qubit: names(&["ccx", "cswap"]),
            native: names(&["rx", "rz", "cz", "iswap"]),
        }
    }

    /// IQM: `prx`, `cz` native.
    pub fn iqm() -> Self {
        Self {
            single_qubit: names(&[
                "id", "x", "y", "z", "h", "s", "sdg", "t", "tdg", "rx", "ry", "rz", "p", "prx",
            ]),
            two_qubit: names(&["cx", "cz", "cp", "swap"]),
            three_qubit: names(&["ccx", "cswap"]),
            native: names(&["prx", "cz"]),
        }
    }

    /// Check if a gate is supported, after alias folding.
    pub fn contains(&self, gate: &str) -> bool {
        let gate = canonical_gate(gate);
        self.single_qubit
            .iter()
            .chain(&self.two_qubit)
            .chain(&self.three_qubit)
            .any(|g| *g == gate)
    }

    /// Check if a gate is native.
    ///
    /// If the `native` list is empty, all supported gates are considered native.
    pub fn is_native(&self, gate: &str) -> bool {
        if self.native.is_empty() {
            self.contains(gate)
        } else {
            let gate = canonical_gate(gate);
            self.native.iter().any(|g| *g == gate)
        }
    }

    /// Whether the set has no gates at all.
    pub fn is_empty(&self) -> bool {
        self.single_qubit.is_empty() && self.two_qubit.is_empty() && self.three_qubit.is_empty()
    }
}

/// Qubit connectivity topology. Edges are bidirectional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topology {
    /// Kind of topology.
    pub kind: TopologyKind,
    /// Coupling edges (pairs of connected qubits).
    pub edges: Vec<(u32, u32)>,
}

impl Topology {
    /// All-to-all.
    pub fn full(n: u32) -> Self {
        let mut edges = vec![];
        for i in 0..n {
            for j in (i + 1)..n {
                edges.push((i, j));
            }
        }
        Self {
            kind: TopologyKind::FullyConnected,
            edges,
        }
    }

    /// Row-major 2D grid.
    pub fn grid(rows: u32, cols: u32) -> Self {
        let mut edges = vec![];
        for r in 0..rows {
            for c in 0..cols {
                let idx = r * cols + c;
                if c + 1 < cols {
                    edges.push((idx, idx + 1));
                }
                if r + 1 < rows {
                    edges.push((idx, idx + cols));
                }
            }
        }
        Self {
            kind: TopologyKind::Grid { rows, cols },
            edges,
        }
    }

    /// Explicit coupling map.
    pub fn custom(edges: Vec<(u32, u32)>) -> Self {
        Self {
            kind: TopologyKind::Custom,
            edges,
        }
    }

    /// Drop edges touching qubits at or above `num_qubits`.
    pub fn restricted(mut self, num_qubits: u32) -> Self {
        self.edges.retain(|&(a, b)| a < num_qubits && b < num_qubits);
        self
    }

    /// Check if two qubits are connected.
    pub fn is_connected(&self, q1: u32, q2: u32) -> bool {
        if self.kind == TopologyKind::FullyConnected {
            return q1 != q2;
        }
        self.edges
            .iter()
            .any(|&(a, b)| (a == q1 && b == q2) || (a == q2 && b == q1))
    }
}

/// Kind of qubit topology.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum TopologyKind {
    /// Fully connected (all-to-all).
    FullyConnected,
    /// 2D grid.
    Grid { rows: u32, cols: u32 },
    /// Custom coupling map.
    Custom,
}

/// Device-wide noise averages reported by a device.
///
/// All fidelity values are in `[0.0, 1.0]`. Times are in microseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoiseProfile {
    /// T1 relaxation time (device average).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub t1: Option<f64>,
    /// T2 dephasing time (device average).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub t2: Option<f64>,
    /// Average single-qubit gate fidelity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub single_qubit_fidelity: Option<f64>,
    /// Average two-qubit gate fidelity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub two_qubit_fidelity: Option<f64>,
    /// Average readout fidelity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub readout_fidelity: Option<f64>,
}

impl NoiseProfile {
    /// Gate and readout fidelities only, as trapped-ion providers publish them.
    pub fn fidelities(single_qubit: f64, two_qubit: f64, readout: f64) -> Self {
        Self {
            t1: None,
            t2: None,
            single_qubit_fidelity: Some(single_qubit),
            two_qubit_fidelity: Some(two_qubit),
            readout_fidelity: Some(readout),
        }
    }

    /// Add coherence times in microseconds.
    pub fn with_coherence(mut self, t1: f64, t2: f64) -> Self {
        self.t1 = Some(t1);
        self.t2 = Some(t2);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simulator_presets() {
        let sv1 = Capabilities::sv1();
        assert!(sv1.is_simulator);
        assert_eq!(sv1.num_qubits, 34);
        assert!(sv1.gate_set.contains("h"));
        assert!(sv1.gate_set.contains("cnot"));
        assert!(sv1.topology.is_connected(0, 33));
        assert!(sv1.accepts_openqasm());

        assert_eq!(Capabilities::dm1().num_qubits, 17);
        assert_eq!(Capabilities::tn1().max_shots, 1_000);
    }

    #[test]
    fn test_iqm_gate_set() {
        let caps = Capabilities::iqm(20);
        assert!(!caps.is_simulator);
        assert!(caps.gate_set.is_native("prx"));
        assert!(caps.gate_set.is_native("cz"));
        assert!(!caps.gate_set.is_native("cx"));
        assert!(caps.gate_set.contains("cx"));
        assert!(!caps.gate_set.contains("ms"));
    }

    #[test]
    fn test_quera_is_analog() {
        let caps = Capabilities::quera(256);
        assert!(caps.gate_set.is_empty());
        assert!(!caps.accepts_openqasm());
    }

    #[test]
    fn test_canonical_gate_aliases() {
        assert_eq!(canonical_gate("CNOT"), "cx");
        assert_eq!(canonical_gate("phaseshift"), "p");
        assert_eq!(canonical_gate("cphaseshift"), "cp");
        assert_eq!(canonical_gate("rz"), "rz");
    }

    #[test]
    fn test_topology_custom() {
        let topo = Topology::custom(vec![(0, 1), (1, 2)]);
        assert!(topo.is_connected(2, 1));
        assert!(!topo.is_connected(0, 2));
    }

    #[test]
    fn test_topology_grid() {
        let topo = Topology::grid(2, 3);
        assert!(topo.is_connected(0, 1));
        assert!(topo.is_connected(0, 3));
        assert!(topo.is_connected(1, 4));
        assert!(!topo.is_connected(0, 4));
    }

    #[test]
    fn test_rigetti_grid_is_restricted() {
        let caps = Capabilities::rigetti(7);
        assert_eq!(caps.topology.kind, TopologyKind::Grid { rows: 3, cols: 3 });
        assert!(caps.topology.edges.iter().all(|&(a, b)| a < 7 && b < 7));
        assert!(caps.topology.is_connected(0, 1));
    }

    #[test]
    fn test_gate_set_native_fallback() {
        let gs = GateSet::universal();
        assert!(gs.native.is_empty());
        assert!(gs.is_native("h"));
        assert!(!gs.is_native("nonexistent"));
    }
}
