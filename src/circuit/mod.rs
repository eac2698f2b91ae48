//! Circuit verification, rendering and persistence.
//!
//! Pipeline: program text → [`qasm`] lexer/parser → [`CircuitProgram`] →
//! [`render`] diagram.
//!
//! Verification never touches external state. Saving is a separate step
//! with its own error ([`BraketError::Persistence`]); a verified program
//! that could not be written is still a verified program.

pub mod library;
pub mod qasm;
pub mod render;

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{BraketError, BraketResult};

pub use library::{CircuitDef, GateDef};
pub use qasm::QasmError;
pub use render::render;

/// Largest number of qubits (or classical bits) a program may declare.
///
/// Matches the largest device in the fleet (QuEra Aquila, 256 atoms).
pub const MAX_QUBITS: u32 = 256;

/// What an operation does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpKind {
    /// Unitary gate.
    Gate,
    /// Computational-basis measurement of one qubit.
    Measure,
    /// Scheduling barrier across one or more qubits.
    Barrier,
    /// Reset of one qubit to |0⟩.
    Reset,
}

/// One operation of a verified program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    /// Kind of operation.
    pub kind: OpKind,
    /// Gate name as written in the program (`measure`, `barrier`, `reset` otherwise).
    pub name: String,
    /// Qubit operands, as indices into the flattened qubit space.
    pub qubits: Vec<u32>,
    /// Evaluated gate parameters in radians.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<f64>,
    /// Classical bits written by a measurement.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub clbits: Vec<u32>,
}

impl Operation {
    pub(crate) fn new(kind: OpKind, name: impl Into<String>, qubits: Vec<u32>) -> Self {
        Self {
            kind,
            name: name.into(),
            qubits,
            params: Vec::new(),
            clbits: Vec::new(),
        }
    }
}

/// A verified program: the source text plus what was derived from it.
#[derive(Debug, Clone, PartialEq)]
pub struct CircuitProgram {
    source: String,
    num_qubits: u32,
    num_clbits: u32,
    qubit_labels: Vec<String>,
    operations: Vec<Operation>,
}

impl CircuitProgram {
    /// The program text exactly as verified.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Number of declared qubits.
    pub fn qubit_count(&self) -> u32 {
        self.num_qubits
    }

    /// Number of declared classical bits.
    pub fn clbit_count(&self) -> u32 {
        self.num_clbits
    }

    /// Number of operations, with register broadcasts expanded.
    pub fn operation_count(&self) -> usize {
        self.operations.len()
    }

    /// The operations in program order.
    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    /// Display labels of the qubits, e.g. `q[0]`.
    pub fn qubit_labels(&self) -> &[String] {
        &self.qubit_labels
    }

    /// Circuit depth: the longest chain of operations sharing qubits.
    /// Barriers do not add depth.
    pub fn depth(&self) -> usize {
        let mut level = vec![0usize; self.num_qubits as usize];
        for op in self.operations.iter().filter(|op| op.kind != OpKind::Barrier) {
            let next = op
                .qubits
                .iter()
                .map(|&q| level[q as usize])
                .max()
                .unwrap_or(0)
                + 1;
            for &q in &op.qubits {
                level[q as usize] = next;
            }
        }
        level.into_iter().max().unwrap_or(0)
    }

    /// How often each operation name occurs, sorted by name.
    pub fn operation_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for op in &self.operations {
            *counts.entry(op.name.clone()).or_default() += 1;
        }
        counts
    }

    /// Qubits that are measured, in measurement order, without repeats.
    pub fn measured_qubits(&self) -> Vec<u32> {
        let mut measured = Vec::new();
        for op in self.operations.iter().filter(|op| op.kind == OpKind::Measure) {
            for &q in &op.qubits {
                if !measured.contains(&q) {
                    measured.push(q);
                }
            }
        }
        measured
    }

    /// Number of gates acting on two or more qubits.
    pub fn multi_qubit_gate_count(&self) -> usize {
        self.operations
            .iter()
            .filter(|op| op.kind == OpKind::Gate && op.qubits.len() > 1)
            .count()
    }

    /// Gate names used by the program (no measurements, barriers or resets).
    pub fn gate_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .operations
            .iter()
            .filter(|op| op.kind == OpKind::Gate)
            .map(|op| op.name.as_str())
            .collect();
        names.sort_unstable();
        names.dedup();
        names
    }
}

/// Parse and validate program text.
///
/// Deterministic and side-effect free. Any failure is a single
/// [`BraketError::Validation`] carrying the parser message.
pub fn verify(program_text: &str) -> BraketResult<CircuitProgram> {
    let parsed = qasm::parse(program_text)?;
    debug!(
        qubits = parsed.num_qubits,
        operations = parsed.operations.len(),
        "verified OpenQASM program"
    );
    Ok(CircuitProgram {
        source: program_text.to_string(),
        num_qubits: parsed.num_qubits,
        num_clbits: parsed.num_clbits,
        qubit_labels: parsed.qubit_labels,
        operations: parsed.operations,
    })
}

/// Verify then render program text.
pub fn render_source(program_text: &str) -> BraketResult<String> {
    verify(program_text).map(|program| render(&program))
}

/// Write program text verbatim (UTF-8) to `target`.
///
/// `target` must be a relative path that stays under `workspace_dir`:
/// absolute paths and `..` components are a `Validation` error. Parent
/// directories are created; an existing file is overwritten. Returns the
/// absolute path.
pub fn save(
    program_text: &str,
    target: impl AsRef<Path>,
    workspace_dir: &Path,
) -> BraketResult<PathBuf> {
    let target = target.as_ref();
    if target.as_os_str().is_empty() {
        return Err(BraketError::Validation("file name must not be empty".into()));
    }
    let escapes = target.is_absolute()
        || target.components().any(|c| {
            matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_))
        });
    if escapes {
        return Err(BraketError::Validation(format!(
            "file name '{}' must be a relative path inside the workspace",
            target.display()
        )));
    }
    let joined = workspace_dir.join(target);
    let path = std::path::absolute(&joined).map_err(|source| BraketError::Persistence {
        path: joined.clone(),
        source,
    })?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| BraketError::Persistence {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    std::fs::write(&path, program_text.as_bytes()).map_err(|source| BraketError::Persistence {
        path: path.clone(),
        source,
    })?;

    info!(path = %path.display(), bytes = program_text.len(), "saved OpenQASM program");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BELL: &str = "OPENQASM 3.0;\ninclude \"stdgates.inc\";\nbit[2] meas;\nqubit[2] q;\nh q[0];\ncx q[0], q[1];\nbarrier q[0], q[1];\nmeas[0] = measure q[0];\nmeas[1] = measure q[1];\n";

    #[test]
    fn test_verify_bell_pair() {
        let program = verify(BELL).unwrap();
        assert_eq!(program.qubit_count(), 2);
        assert!(program.operation_count() >= 3);
        assert_eq!(program.operation_count(), 5);
        assert_eq!(program.depth(), 3);
        assert_eq!(program.measured_qubits(), vec![0, 1]);
        assert_eq!(program.gate_names(), vec!["cx", "h"]);
        assert_eq!(program.operation_counts()["measure"], 2);
    }

    #[test]
    fn test_verify_is_deterministic() {
        let a = verify(BELL).unwrap();
        let b = verify(BELL).unwrap();
        assert_eq!(a, b);
        assert_eq!(render(&a), render(&b));
    }

    #[test]
    fn test_render_source() {
        let diagram = render_source(BELL).unwrap();
        assert_eq!(diagram, render(&verify(BELL).unwrap()));
        assert!(matches!(render_source("qubit q;\nfoo q;"), Err(BraketError::Validation(_))));
    }

    #[test]
    fn test_verify_rejects_oversized_registers() {
        let at_limit = format!("qubit[{MAX_QUBITS}] q;\nh q[0];");
        assert_eq!(verify(&at_limit).unwrap().qubit_count(), MAX_QUBITS);

        for program in [
            "OPENQASM 3.0;\nqubit[4000000000] q;\n",
            "qubit[200] a;\nqubit[200] b;",
            "qubit q;\nbit[4294967295] c;\nbit[2] d;",
        ] {
            let err = verify(program).unwrap_err();
            assert!(
                matches!(err, BraketError::Validation(ref m) if m.contains("more than")),
                "{program}"
            );
        }
    }

    #[test]
    fn test_verify_reports_validation_error() {
        let err = verify("qubit[1] q;\ncx q[0], q[1];").unwrap_err();
        assert!(matches!(err, BraketError::Validation(ref msg) if msg.contains("line 2")));
    }

    #[test]
    fn test_save_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let text = "// héllo ✓\nqubit q;\nh q;\n";
        let path = save(text, "nested/dir/bell.qasm", dir.path()).unwrap();

        assert!(path.is_absolute());
        assert!(path.ends_with("nested/dir/bell.qasm"));
        assert_eq!(std::fs::read(&path).unwrap(), text.as_bytes());

        // Overwrites.
        save("qubit q;", "nested/dir/bell.qasm", dir.path()).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "qubit q;");
    }

    #[test]
    fn test_save_stays_inside_workspace() {
        let workspace = tempfile::tempdir().unwrap();
        let elsewhere = tempfile::tempdir().unwrap();

        let absolute = elsewhere.path().join("outside.qasm");
        let err = save("qubit q;", &absolute, workspace.path()).unwrap_err();
        assert!(matches!(err, BraketError::Validation(_)));
        assert!(!absolute.exists());

        for target in ["../escaped.qasm", "nested/../../escaped.qasm"] {
            let err = save("qubit q;", target, workspace.path()).unwrap_err();
            assert!(matches!(
                err,
                BraketError::Validation(ref m) if m.contains("inside the workspace")
            ));
        }
        assert!(!workspace.path().join("../escaped.qasm").exists());
    }

    #[test]
    fn test_save_failure_is_persistence_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "not a directory").unwrap();

        let err = save("qubit q;", "blocker/inner.qasm", dir.path()).unwrap_err();
        assert!(matches!(err, BraketError::Persistence { .. }));
        assert_eq!(err.kind(), "PersistenceError");
    }
}
