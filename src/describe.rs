//! Human-readable descriptions and visualizations.
//!
//! Everything here is a pure function of its input: the same result or
//! program always produces the same text.
//!
//! | Input | Description | Visualization |
//! |-------|-------------|---------------|
//! | [`TaskResult`] | [`describe_result`] | [`visualize`] (text histogram, SVG bar chart) |
//! | [`CircuitProgram`] | [`describe_circuit`] | [`visualize_circuit`] (text diagram) |
//!
//! SVG output needs the `svg` cargo feature (on by default). Without it,
//! asking for SVG is a [`BraketError::Capability`] error.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::circuit::{self, CircuitProgram};
use crate::error::{BraketError, BraketResult};
use crate::result::TaskResult;

/// Outcomes listed individually in a result description.
const TOP_OUTCOMES: usize = 5;
/// Width of the longest histogram bar, in characters.
const BAR_WIDTH: usize = 40;

/// Shape of a measurement distribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pattern {
    /// A single outcome.
    Deterministic,
    /// Only all-zeros and all-ones: GHZ-like correlation.
    Correlated,
    /// Every outcome seen, with roughly equal frequency.
    Uniform,
    /// Anything else.
    Mixed,
}

impl Pattern {
    fn note(&self) -> &'static str {
        match self {
            Pattern::Deterministic => "every shot gave the same outcome",
            Pattern::Correlated => {
                "only all-zeros and all-ones were measured: the qubits are perfectly correlated, as in a GHZ state"
            }
            Pattern::Uniform => "outcomes are close to uniformly distributed",
            Pattern::Mixed => "outcomes follow a non-trivial distribution",
        }
    }
}

/// Plain-language description of a result or program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Description {
    /// One-sentence summary.
    pub summary: String,
    /// Supporting lines, most important first.
    pub details: Vec<String>,
    /// Distribution shape, for results with measurements.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<Pattern>,
}

/// Output format of a visualization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VisualizationFormat {
    /// Fixed-width text.
    Text,
    /// SVG document. Needs the `svg` feature (on by default).
    Svg,
}

impl FromStr for VisualizationFormat {
    type Err = BraketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "ascii" => Ok(Self::Text),
            "svg" => Ok(Self::Svg),
            other => Err(BraketError::Validation(format!(
                "unknown visualization format '{other}', expected 'text' or 'svg'"
            ))),
        }
    }
}

/// A rendered visualization with its description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Visualization {
    /// Format of `content`.
    pub format: VisualizationFormat,
    /// The rendered diagram or chart.
    pub content: String,
    /// What the visualization shows.
    pub description: Description,
}

#[allow(clippy::cast_precision_loss)]
fn percent(count: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 * 100.0 / total as f64
    }
}

fn classify(result: &TaskResult) -> Option<Pattern> {
    let counts = &result.counts;
    let width = counts.bit_width()?;
    if counts.len() == 1 {
        return Some(Pattern::Deterministic);
    }
    let zeros = "0".repeat(width);
    let ones = "1".repeat(width);
    if width >= 2 && counts.len() == 2 && counts.get(&zeros) > 0 && counts.get(&ones) > 0 {
        return Some(Pattern::Correlated);
    }
    if width <= 16 && counts.len() == 1 << width {
        let expected = 100.0 / counts.len() as f64;
        let total = counts.total_shots();
        let near = counts
            .iter()
            .all(|(_, &c)| (percent(c, total) - expected).abs() <= expected * 0.25);
        if near {
            return Some(Pattern::Uniform);
        }
    }
    Some(Pattern::Mixed)
}

/// Describe a task result.
///
/// Fails with `Validation` if the result is malformed.
pub fn describe_result(result: &TaskResult) -> BraketResult<Description> {
    result.check()?;
    let counts = &result.counts;

    if counts.is_empty() {
        let mut details = Vec::new();
        if let Some(reason) = result.metadata.get("failure_reason").and_then(|r| r.as_str()) {
            details.push(format!("failure reason: {reason}"));
        }
        if let Some(requested) = result.metadata.get("requested_shots").and_then(|r| r.as_u64()) {
            details.push(format!("{requested} shots were requested"));
        }
        return Ok(Description {
            summary: format!(
                "Task {} on {} ended {} without measurements.",
                result.task_id, result.device_arn, result.status
            ),
            details,
            pattern: None,
        });
    }

    let total = counts.total_shots();
    let pattern = classify(result);
    let mut details = Vec::new();
    if let Some((bits, count)) = counts.most_frequent() {
        details.push(format!(
            "most frequent outcome: {bits} ({count} shots, {:.1}%)",
            percent(*count, total)
        ));
    }
    for (bits, &count) in counts.sorted().into_iter().take(TOP_OUTCOMES) {
        details.push(format!("{bits}: {count} ({:.1}%)", percent(count, total)));
    }
    if counts.len() > TOP_OUTCOMES {
        details.push(format!("{} more outcomes not listed", counts.len() - TOP_OUTCOMES));
    }
    if let Some(p) = pattern {
        details.push(p.note().to_string());
    }
    if let Some(ms) = result.execution_duration_ms {
        details.push(format!("execution took {ms} ms"));
    }

    Ok(Description {
        summary: format!(
            "{} shots on {} produced {} distinct outcome{}.",
            result.shots,
            result.device_arn,
            counts.len(),
            if counts.len() == 1 { "" } else { "s" }
        ),
        details,
        pattern,
    })
}

/// Describe a verified program.
pub fn describe_circuit(program: &CircuitProgram) -> Description {
    let mut details = Vec::new();
    let gates: Vec<String> = program
        .operation_counts()
        .into_iter()
        .map(|(name, n)| format!("{name} x{n}"))
        .collect();
    if !gates.is_empty() {
        details.push(format!("operations: {}", gates.join(", ")));
    }

    let entangling = program.multi_qubit_gate_count();
    if entangling > 0 {
        details.push(format!(
            "{entangling} multi-qubit gate{} can entangle qubits",
            if entangling == 1 { "" } else { "s" }
        ));
    }

    let measured = program.measured_qubits();
    if measured.is_empty() {
        details.push("no measurements: the service measures every qubit".into());
    } else {
        let labels: Vec<&str> = measured
            .iter()
            .map(|&q| program.qubit_labels()[q as usize].as_str())
            .collect();
        details.push(format!("measures {}", labels.join(", ")));
    }

    Description {
        summary: format!(
            "Circuit on {} qubit{} with {} operations and depth {}.",
            program.qubit_count(),
            if program.qubit_count() == 1 { "" } else { "s" },
            program.operation_count(),
            program.depth()
        ),
        details,
        pattern: None,
    }
}

/// Visualize a task result.
pub fn visualize(result: &TaskResult, format: VisualizationFormat) -> BraketResult<Visualization> {
    let description = describe_result(result)?;
    let content = match format {
        VisualizationFormat::Text => histogram(result),
        VisualizationFormat::Svg => svg_chart(result)?,
    };
    Ok(Visualization {
        format,
        content,
        description,
    })
}

/// Visualize a verified program as a text diagram.
pub fn visualize_circuit(program: &CircuitProgram) -> Visualization {
    Visualization {
        format: VisualizationFormat::Text,
        content: circuit::render(program),
        description: describe_circuit(program),
    }
}

fn by_bitstring(result: &TaskResult) -> Vec<(&String, u64)> {
    let mut items: Vec<(&String, u64)> = result.counts.iter().map(|(k, &v)| (k, v)).collect();
    items.sort_by(|a, b| a.0.cmp(b.0));
    items
}

fn histogram(result: &TaskResult) -> String {
    let items = by_bitstring(result);
    if items.is_empty() {
        return format!("(no measurements: task {})", result.status);
    }
    let total = result.counts.total_shots();
    let max = items.iter().map(|&(_, c)| c).max().unwrap_or(1).max(1);
    let label_width = items.iter().map(|(k, _)| k.len()).max().unwrap_or(0);
    let count_width = max.to_string().len();

    items
        .into_iter()
        .map(|(bits, count)| {
            let len = usize::try_from(count * BAR_WIDTH as u64 / max).unwrap_or(BAR_WIDTH);
            format!(
                "{bits:>label_width$} │{:<BAR_WIDTH$}│ {count:>count_width$} ({:5.1}%)",
                "█".repeat(len),
                percent(count, total)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(feature = "svg")]
fn svg_chart(result: &TaskResult) -> BraketResult<String> {
    const HEIGHT: u64 = 200;
    const BAR: usize = 40;
    const GAP: usize = 20;
    const MARGIN: usize = 40;

    let items = by_bitstring(result);
    let total = result.counts.total_shots();
    let max = items.iter().map(|&(_, c)| c).max().unwrap_or(1).max(1);
    let width = 2 * MARGIN + items.len().max(1) * (BAR + GAP);
    let height = HEIGHT + 2 * MARGIN as u64;

    let baseline = MARGIN as u64 + HEIGHT;
    let mut lines = vec![
        format!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{width}" height="{height}" viewBox="0 0 {width} {height}">"#
        ),
        format!(
            r#"  <title>Measurement counts for task {}</title>"#,
            escape(result.task_id.as_str())
        ),
    ];
    for (i, (bits, count)) in items.iter().enumerate() {
        let bar_height = count * HEIGHT / max;
        let x = MARGIN + i * (BAR + GAP) + GAP / 2;
        lines.push(format!(
            r##"  <rect x="{x}" y="{}" width="{BAR}" height="{bar_height}" fill="#4a7bd0"><title>{bits}: {count} ({:.1}%)</title></rect>"##,
            baseline - bar_height,
            percent(*count, total)
        ));
        lines.push(format!(
            r#"  <text x="{}" y="{}" font-family="monospace" font-size="12" text-anchor="middle">{bits}</text>"#,
            x + BAR / 2,
            baseline + 16
        ));
    }
    lines.push(format!(
        r#"  <line x1="{MARGIN}" y1="{baseline}" x2="{}" y2="{baseline}" stroke="black"/>"#,
        width - MARGIN
    ));
    lines.push("</svg>".to_string());
    Ok(lines.join("\n"))
}

#[cfg(not(feature = "svg"))]
fn svg_chart(_: &TaskResult) -> BraketResult<String> {
    Err(BraketError::Capability(
        "SVG output is not available in this build (enable the `svg` feature)".into(),
    ))
}

#[cfg(feature = "svg")]
fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
