//! Fixed-width text diagrams.
//!
//! Operations are packed left into columns: an operation goes into the first
//! column where every wire between its lowest and highest qubit is free.
//! Each qubit gets one row; the rows in between carry vertical connectors.
//!
//! ```text
//! q[0]: ──H────■───░──M─────
//!              │   ░
//! q[1]: ───────X───░─────M──
//! ```
//!
//! Output depends only on the program, so it is stable across calls.

use super::library::format_angle;
use super::{CircuitProgram, OpKind, Operation};

const WIRE: char = '─';
const CROSS: char = '┼';
const LINK: char = '│';
const BARRIER: char = '░';
const CONTROL: &str = "■";
const SWAP: &str = "╳";

#[derive(Debug, Clone, PartialEq)]
enum Cell {
    Wire,
    Label(String),
    Cross,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Link {
    None,
    Vertical,
    Barrier,
}

#[derive(Debug, Clone)]
struct Column {
    cells: Vec<Cell>,
    links: Vec<Link>,
}

impl Column {
    fn new(num_qubits: usize) -> Self {
        Self {
            cells: vec![Cell::Wire; num_qubits],
            links: vec![Link::None; num_qubits.saturating_sub(1)],
        }
    }

    fn width(&self) -> usize {
        self.cells
            .iter()
            .map(|cell| match cell {
                Cell::Label(text) => text.chars().count().max(1),
                Cell::Wire | Cell::Cross => 1,
            })
            .max()
            .unwrap_or(1)
    }
}

/// Render a verified program as a text diagram.
pub fn render(program: &CircuitProgram) -> String {
    let n = program.qubit_count() as usize;
    let columns = layout(program.operations(), n);
    let widths: Vec<usize> = columns.iter().map(Column::width).collect();

    let labels = program.qubit_labels();
    let prefix_width = labels.iter().map(|l| l.chars().count()).max().unwrap_or(0) + 2;

    let mut lines = Vec::with_capacity(2 * n);
    for q in 0..n {
        let mut line = format!("{:<prefix_width$}", format!("{}: ", labels[q]));
        for (column, &width) in columns.iter().zip(&widths) {
            line.push_str(&wire_cell(&column.cells[q], width));
        }
        line.push(WIRE);
        lines.push(line);

        if q + 1 < n {
            let mut gap = " ".repeat(prefix_width);
            for (column, &width) in columns.iter().zip(&widths) {
                gap.push_str(&gap_cell(column.links[q], width));
            }
            lines.push(gap.trim_end().to_string());
        }
    }
    lines.join("\n")
}

fn layout(operations: &[Operation], n: usize) -> Vec<Column> {
    let mut columns: Vec<Column> = Vec::new();
    let mut next_free = vec![0usize; n];

    for op in operations {
        let (Some(&lo), Some(&hi)) = (op.qubits.iter().min(), op.qubits.iter().max()) else {
            continue;
        };
        let (lo, hi) = (lo as usize, hi as usize);
        let index = next_free[lo..=hi].iter().copied().max().unwrap_or(0);
        if columns.len() <= index {
            columns.resize_with(index + 1, || Column::new(n));
        }
        let column = &mut columns[index];

        for q in lo..=hi {
            next_free[q] = index + 1;
            column.cells[q] = match op.kind {
                OpKind::Barrier => Cell::Label(BARRIER.to_string()),
                _ => Cell::Cross,
            };
        }
        for (q, symbol) in symbols(op) {
            column.cells[q as usize] = Cell::Label(symbol);
        }
        let link = if op.kind == OpKind::Barrier {
            Link::Barrier
        } else {
            Link::Vertical
        };
        for gap in lo..hi {
            column.links[gap] = link;
        }
    }
    columns
}

/// Symbol drawn on each operand wire.
fn symbols(op: &Operation) -> Vec<(u32, String)> {
    let q = &op.qubits;
    match op.kind {
        OpKind::Measure => vec![(q[0], "M".into())],
        OpKind::Reset => vec![(q[0], "|0>".into())],
        OpKind::Barrier => q.iter().map(|&q| (q, BARRIER.to_string())).collect(),
        OpKind::Gate => {
            let controlled = |controls: usize, target: String| -> Vec<(u32, String)> {
                q.iter()
                    .enumerate()
                    .map(|(i, &qubit)| {
                        if i < controls {
                            (qubit, CONTROL.to_string())
                        } else {
                            (qubit, target.clone())
                        }
                    })
                    .collect()
            };
            match op.name.as_str() {
                "cx" | "CX" | "cnot" => controlled(1, "X".into()),
                "ccx" | "ccnot" => controlled(2, "X".into()),
                "cy" => controlled(1, "Y".into()),
                "ch" => controlled(1, "H".into()),
                "cv" => controlled(1, "V".into()),
                "cz" => controlled(2, String::new()),
                "cp" | "cphase" | "cphaseshift" | "cu1" => controlled(1, label("P", &op.params)),
                "crx" => controlled(1, label("RX", &op.params)),
                "cry" => controlled(1, label("RY", &op.params)),
                "crz" => controlled(1, label("RZ", &op.params)),
                "cu" | "cu3" => controlled(1, label("U", &op.params)),
                "swap" => controlled(0, SWAP.into()),
                "cswap" => controlled(1, SWAP.into()),
                name => {
                    let text = label(&name.to_uppercase(), &op.params);
                    q.iter().map(|&qubit| (qubit, text.clone())).collect()
                }
            }
        }
    }
}

fn label(name: &str, params: &[f64]) -> String {
    if params.is_empty() {
        return name.to_string();
    }
    let args: Vec<String> = params.iter().map(|&p| format_angle(p)).collect();
    format!("{name}({})", args.join(","))
}

/// A wire segment `width + 2` characters wide with the cell centered.
fn wire_cell(cell: &Cell, width: usize) -> String {
    let text = match cell {
        Cell::Wire => return WIRE.to_string().repeat(width + 2),
        Cell::Cross => CROSS.to_string(),
        // cz: a bare control dot on both wires
        Cell::Label(t) if t.is_empty() => CONTROL.to_string(),
        Cell::Label(t) => t.clone(),
    };
    let len = text.chars().count();
    let left = 1 + (width - len) / 2;
    let right = width + 2 - len - left;
    format!(
        "{}{}{}",
        WIRE.to_string().repeat(left),
        text,
        WIRE.to_string().repeat(right)
    )
}

fn gap_cell(link: Link, width: usize) -> String {
    let symbol = match link {
        Link::None => return " ".repeat(width + 2),
        Link::Vertical => LINK,
        Link::Barrier => BARRIER,
    };
    let left = 1 + (width - 1) / 2;
    let right = width + 1 - left;
    format!("{}{}{}", " ".repeat(left), symbol, " ".repeat(right))
}

#[cfg(test)]
mod tests {
    use super::super::verify;
    use super::*;

    #[test]
    fn test_render_bell() {
        let program = verify(
            "qubit[2] q;\nbit[2] c;\nh q[0];\ncx q[0], q[1];\nc[0] = measure q[0];\nc[1] = measure q[1];",
        )
        .unwrap();
        let diagram = render(&program);
        let lines: Vec<&str> = diagram.lines().collect();

        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("q[0]: "));
        assert!(lines[0].contains('H'));
        assert!(lines[0].contains(CONTROL));
        assert!(lines[1].contains(LINK));
        assert!(lines[2].contains('X'));
        assert!(lines[2].contains('M'));
        // Wire rows have the same width.
        assert_eq!(lines[0].chars().count(), lines[2].chars().count());
    }

    #[test]
    fn test_parallel_gates_share_a_column() {
        let program = verify("qubit[3] q;\nh q;").unwrap();
        let diagram = render(&program);
        let wires: Vec<&str> = diagram.lines().filter(|l| l.starts_with('q')).collect();
        assert_eq!(wires.len(), 3);
        for line in wires {
            assert!(line.ends_with("─H──"), "{line}");
        }
    }

    #[test]
    fn test_long_range_gate_crosses_middle_wire() {
        let program = verify("qubit[3] q;\ncx q[0], q[2];").unwrap();
        let diagram = render(&program);
        let lines: Vec<&str> = diagram.lines().collect();
        assert!(lines[2].contains(CROSS));
    }

    #[test]
    fn test_parameters_are_shown() {
        let program = verify("qubit q;\nrz(pi/4) q;").unwrap();
        assert!(render(&program).contains("RZ(pi/4)"));
    }
}
