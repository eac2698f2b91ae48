//! Canonical circuits and structured circuit definitions.
//!
//! Every builder produces program text in one fixed form:
//!
//! ```text
//! OPENQASM 3.0;
//! include "stdgates.inc";
//! bit[2] meas;
//! qubit[2] q;
//! h q[0];
//! cx q[0], q[1];
//! barrier q[0], q[1];
//! meas[0] = measure q[0];
//! meas[1] = measure q[1];
//! ```
//!
//! `measure` and `barrier` are accepted as gate names in a [`CircuitDef`];
//! measurements write to consecutive bits of the `meas` register.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use super::MAX_QUBITS;
use crate::error::{BraketError, BraketResult};

/// Largest register the canonical builders accept.
pub const MAX_LIBRARY_QUBITS: u32 = 32;

/// One gate of a structured circuit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateDef {
    /// Lowercase gate name (`h`, `cx`, `rz`, `measure`, `barrier`, ...).
    pub name: String,
    /// Qubit operands.
    #[serde(default)]
    pub qubits: Vec<u32>,
    /// Gate parameters in radians.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Vec<f64>>,
}

impl GateDef {
    /// A gate without parameters.
    pub fn new(name: impl Into<String>, qubits: impl Into<Vec<u32>>) -> Self {
        Self {
            name: name.into(),
            qubits: qubits.into(),
            params: None,
        }
    }

    /// A parameterized gate.
    pub fn with_params(
        name: impl Into<String>,
        qubits: impl Into<Vec<u32>>,
        params: Vec<f64>,
    ) -> Self {
        Self {
            params: Some(params),
            ..Self::new(name, qubits)
        }
    }
}

/// A circuit as a list of gates over `num_qubits` qubits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitDef {
    /// Number of qubits in the `q` register.
    pub num_qubits: u32,
    /// Gates in program order.
    #[serde(default)]
    pub gates: Vec<GateDef>,
    /// Free-form metadata carried alongside the circuit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl CircuitDef {
    /// An empty circuit.
    pub fn new(num_qubits: u32) -> Self {
        Self {
            num_qubits,
            gates: Vec::new(),
            metadata: None,
        }
    }

    /// Append a gate.
    pub fn gate(mut self, name: &str, qubits: impl Into<Vec<u32>>) -> Self {
        self.gates.push(GateDef::new(name, qubits));
        self
    }

    /// Append a parameterized gate.
    pub fn gate_with_params(
        mut self,
        name: &str,
        qubits: impl Into<Vec<u32>>,
        params: Vec<f64>,
    ) -> Self {
        self.gates.push(GateDef::with_params(name, qubits, params));
        self
    }

    /// Barrier over every qubit, then measure each qubit in order.
    pub fn measure_all(self) -> Self {
        let all: Vec<u32> = (0..self.num_qubits).collect();
        self.gate("barrier", all.clone()).gate("measure", all)
    }

    /// Emit OpenQASM 3 program text.
    pub fn to_qasm(&self) -> BraketResult<String> {
        if self.num_qubits == 0 {
            return Err(BraketError::Validation(
                "circuit must have at least one qubit".into(),
            ));
        }
        if self.num_qubits > MAX_QUBITS {
            return Err(BraketError::Validation(format!(
                "circuit has {} qubits, at most {MAX_QUBITS} are supported",
                self.num_qubits
            )));
        }
        let measured: usize = self
            .gates
            .iter()
            .filter(|g| g.name == "measure")
            .map(|g| g.qubits.len())
            .sum();

        let mut lines = vec!["OPENQASM 3.0;".to_string(), "include \"stdgates.inc\";".to_string()];
        if measured > 0 {
            lines.push(format!("bit[{measured}] meas;"));
        }
        lines.push(format!("qubit[{}] q;", self.num_qubits));

        let mut next_bit = 0usize;
        for gate in &self.gates {
            check_gate_name(&gate.name)?;
            if let Some(&bad) = gate.qubits.iter().find(|&&q| q >= self.num_qubits) {
                return Err(BraketError::Validation(format!(
                    "gate '{}' uses qubit {bad} but the circuit has {} qubits",
                    gate.name, self.num_qubits
                )));
            }
            match gate.name.as_str() {
                "measure" => {
                    for &q in &gate.qubits {
                        lines.push(format!("meas[{next_bit}] = measure q[{q}];"));
                        next_bit += 1;
                    }
                }
                "reset" => {
                    for &q in &gate.qubits {
                        lines.push(format!("reset q[{q}];"));
                    }
                }
                "barrier" if gate.qubits.is_empty() => {
                    let all: Vec<u32> = (0..self.num_qubits).collect();
                    lines.push(format!("barrier {};", operands(&all)));
                }
                _ if gate.qubits.is_empty() => {
                    return Err(BraketError::Validation(format!(
                        "gate '{}' has no qubits",
                        gate.name
                    )));
                }
                name => {
                    let params = match gate.params.as_deref() {
                        Some(p) if !p.is_empty() => {
                            let args: Vec<String> = p.iter().map(|&v| format_angle(v)).collect();
                            format!("({})", args.join(", "))
                        }
                        _ => String::new(),
                    };
                    lines.push(format!("{name}{params} {};", operands(&gate.qubits)));
                }
            }
        }
        lines.push(String::new());
        Ok(lines.join("\n"))
    }
}

fn check_gate_name(name: &str) -> BraketResult<()> {
    let mut chars = name.chars();
    let valid = chars.next().is_some_and(|c| c.is_ascii_lowercase())
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(BraketError::Validation(format!("invalid gate name '{name}'")))
    }
}

fn operands(qubits: &[u32]) -> String {
    qubits
        .iter()
        .map(|q| format!("q[{q}]"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Format an angle, as a multiple of pi where that is exact.
///
/// `pi/2`, `-pi`, `3*pi/4`; anything else prints as a plain decimal.
pub fn format_angle(value: f64) -> String {
    if value == 0.0 {
        return "0".into();
    }
    for denom in [1u32, 2, 3, 4, 6, 8, 12, 16, 32, 64, 128, 256, 512, 1024] {
        let multiple = value * f64::from(denom) / PI;
        let rounded = multiple.round();
        if (multiple - rounded).abs() < 1e-9 && rounded.abs() <= 1e6 {
            #[allow(clippy::cast_possible_truncation)]
            let numerator = match rounded as i64 {
                1 => "pi".to_string(),
                -1 => "-pi".to_string(),
                n => format!("{n}*pi"),
            };
            return if denom == 1 {
                numerator
            } else {
                format!("{numerator}/{denom}")
            };
        }
    }
    format!("{value}")
}

fn check_size(kind: &str, num_qubits: u32) -> BraketResult<()> {
    if (1..=MAX_LIBRARY_QUBITS).contains(&num_qubits) {
        Ok(())
    } else {
        Err(BraketError::Validation(format!(
            "{kind} circuit needs 1 to {MAX_LIBRARY_QUBITS} qubits, got {num_qubits}"
        )))
    }
}

/// Two-qubit Bell pair, measured.
pub fn bell_pair() -> CircuitDef {
    CircuitDef::new(2)
        .gate("h", [0])
        .gate("cx", [0, 1])
        .measure_all()
}

/// GHZ state on `num_qubits` qubits: `h` then a chain of `cx`, measured.
pub fn ghz(num_qubits: u32) -> BraketResult<CircuitDef> {
    check_size("GHZ", num_qubits)?;
    let mut circuit = CircuitDef::new(num_qubits).gate("h", [0]);
    for i in 1..num_qubits {
        circuit = circuit.gate("cx", [i - 1, i]);
    }
    Ok(circuit.measure_all())
}

/// Quantum Fourier transform on `num_qubits` qubits, with the final swaps, measured.
pub fn qft(num_qubits: u32) -> BraketResult<CircuitDef> {
    check_size("QFT", num_qubits)?;
    let mut circuit = CircuitDef::new(num_qubits);
    for i in 0..num_qubits {
        circuit = circuit.gate("h", [i]);
        for j in (i + 1)..num_qubits {
            let angle = PI / f64::from(1u32 << (j - i).min(31));
            circuit = circuit.gate_with_params("cp", [j, i], vec![angle]);
        }
    }
    for i in 0..num_qubits / 2 {
        circuit = circuit.gate("swap", [i, num_qubits - i - 1]);
    }
    Ok(circuit.measure_all())
}
