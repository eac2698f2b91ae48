//! OpenQASM lexer and parser for the gate-level subset.
//!
//! Accepted statements:
//!
//! ```text
//!   OPENQASM 3.0;                 include "stdgates.inc";
//!   qubit[n] q;   qubit a;        qreg q[n];
//!   bit[n] c;     bit b;          creg c[n];
//!   h q[0];   rz(pi/2) q[1];   cx q[0], q[1];   h q;      (register broadcast)
//!   c[0] = measure q[0];   measure q[0] -> c[0];   c = measure q;   measure q;
//!   barrier q[0], q[1];    barrier;    reset q[0];
//! ```
//!
//! Parameter expressions: numbers, `pi`/`π`, `tau`/`τ`, `euler`/`e`,
//! unary `-`/`+`, `+ - * /`, parentheses.
//!
//! Errors carry the 1-based source line. Classical control flow, custom gate
//! definitions and subroutines are rejected.

use std::f64::consts;

use rustc_hash::FxHashMap;

use super::{MAX_QUBITS, OpKind, Operation};
use crate::error::BraketError;

/// A parse or validation failure with its source line.
#[derive(Debug, Clone, PartialEq)]
pub struct QasmError {
    /// 1-based line number.
    pub line: usize,
    /// What went wrong.
    pub message: String,
}

impl QasmError {
    fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for QasmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

impl std::error::Error for QasmError {}

impl From<QasmError> for BraketError {
    fn from(err: QasmError) -> Self {
        BraketError::Validation(format!("invalid OpenQASM program: {err}"))
    }
}

/// Output of a successful parse.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ParsedProgram {
    pub num_qubits: u32,
    pub num_clbits: u32,
    pub qubit_labels: Vec<String>,
    pub operations: Vec<Operation>,
}

// ── Gate table ────────────────────────────────────────────────────────────

/// Arity and parameter count of a known gate.
#[derive(Debug, Clone, Copy)]
struct GateSpec {
    qubits: usize,
    params: usize,
}

const fn spec(qubits: usize, params: usize) -> GateSpec {
    GateSpec { qubits, params }
}

/// Gates from `stdgates.inc`, `qelib1.inc` and the Braket native names.
fn gate_spec(name: &str) -> Option<GateSpec> {
    let s = match name {
        // Single-qubit, no parameters
        "id" | "i" | "x" | "y" | "z" | "h" | "s" | "sdg" | "si" | "t" | "tdg" | "ti" | "sx"
        | "sxdg" | "v" | "vi" => spec(1, 0),
        // Single-qubit, one parameter
        "rx" | "ry" | "rz" | "p" | "phase" | "phaseshift" | "u1" | "gpi" | "gpi2" => spec(1, 1),
        "u2" | "prx" => spec(1, 2),
        "u" | "U" | "u3" => spec(1, 3),
        // Two-qubit
        "cx" | "CX" | "cnot" | "cy" | "cz" | "ch" | "swap" | "iswap" | "ecr" | "cv" => spec(2, 0),
        "cp" | "cphase" | "cphaseshift" | "cphaseshift00" | "cphaseshift01" | "cphaseshift10"
        | "crx" | "cry" | "crz" | "cu1" | "rxx" | "ryy" | "rzz" | "xx" | "yy" | "zz" | "xy"
        | "pswap" => spec(2, 1),
        "ms" => spec(2, 3),
        "cu3" => spec(2, 3),
        "cu" => spec(2, 4),
        // Three-qubit
        "ccx" | "ccnot" | "cswap" => spec(3, 0),
        _ => return None,
    };
    Some(s)
}

/// Statements this parser recognizes but does not support.
const UNSUPPORTED: &[&str] = &[
    "gate", "def", "defcal", "cal", "if", "else", "for", "while", "switch", "let", "const",
    "input", "output", "box", "delay", "return", "break", "continue", "opaque", "extern",
    "int", "uint", "float", "angle", "bool", "complex", "duration", "stretch", "array",
];

// ── Lexer ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Int(u64),
    Float(f64),
    Str(String),
    LBracket,
    RBracket,
    LParen,
    RParen,
    LBrace,
    RBrace,
    Comma,
    Semicolon,
    Arrow,
    Assign,
    Plus,
    Minus,
    Star,
    Slash,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Ident(s) => format!("'{s}'"),
            Token::Int(n) => format!("'{n}'"),
            Token::Float(f) => format!("'{f}'"),
            Token::Str(s) => format!("\"{s}\""),
            Token::LBracket => "'['".into(),
            Token::RBracket => "']'".into(),
            Token::LParen => "'('".into(),
            Token::RParen => "')'".into(),
            Token::LBrace => "'{'".into(),
            Token::RBrace => "'}'".into(),
            Token::Comma => "','".into(),
            Token::Semicolon => "';'".into(),
            Token::Arrow => "'->'".into(),
            Token::Assign => "'='".into(),
            Token::Plus => "'+'".into(),
            Token::Minus => "'-'".into(),
            Token::Star => "'*'".into(),
            Token::Slash => "'/'".into(),
        }
    }
}

#[derive(Debug, Clone)]
struct Spanned {
    token: Token,
    line: usize,
}

fn tokenize(source: &str) -> Result<Vec<Spanned>, QasmError> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut line = 1;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '\n' => {
                line += 1;
                i += 1;
            }
            c if c.is_whitespace() => i += 1,
            '/' if chars.get(i + 1) == Some(&'/') => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            '/' if chars.get(i + 1) == Some(&'*') => {
                let start = line;
                i += 2;
                loop {
                    match chars.get(i) {
                        None => return Err(QasmError::new(start, "unterminated block comment")),
                        Some('*') if chars.get(i + 1) == Some(&'/') => {
                            i += 2;
                            break;
                        }
                        Some('\n') => {
                            line += 1;
                            i += 1;
                        }
                        Some(_) => i += 1,
                    }
                }
            }
            '"' => {
                let start = i + 1;
                let mut end = start;
                while end < chars.len() && chars[end] != '"' {
                    if chars[end] == '\n' {
                        return Err(QasmError::new(line, "unterminated string literal"));
                    }
                    end += 1;
                }
                if end == chars.len() {
                    return Err(QasmError::new(line, "unterminated string literal"));
                }
                let text: String = chars[start..end].iter().collect();
                tokens.push(Spanned {
                    token: Token::Str(text),
                    line,
                });
                i = end + 1;
            }
            c if c.is_ascii_digit()
                || (c == '.' && chars.get(i + 1).is_some_and(char::is_ascii_digit)) =>
            {
                let (token, next) = lex_number(&chars, i, line)?;
                tokens.push(Spanned { token, line });
                i = next;
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                tokens.push(Spanned {
                    token: Token::Ident(text),
                    line,
                });
            }
            _ => {
                let token = match c {
                    '[' => Token::LBracket,
                    ']' => Token::RBracket,
                    '(' => Token::LParen,
                    ')' => Token::RParen,
                    '{' => Token::LBrace,
                    '}' => Token::RBrace,
                    ',' => Token::Comma,
                    ';' => Token::Semicolon,
                    '+' => Token::Plus,
                    '*' => Token::Star,
                    '/' => Token::Slash,
                    '-' if chars.get(i + 1) == Some(&'>') => {
                        i += 1;
                        Token::Arrow
                    }
                    '-' => Token::Minus,
                    '=' if chars.get(i + 1) == Some(&'=') => {
                        return Err(QasmError::new(line, "comparisons are not supported"));
                    }
                    '=' => Token::Assign,
                    other => {
                        return Err(QasmError::new(line, format!("unexpected character '{other}'")));
                    }
                };
                tokens.push(Spanned { token, line });
                i += 1;
            }
        }
    }

    Ok(tokens)
}

/// Lex an integer or float literal starting at `start`.
fn lex_number(chars: &[char], start: usize, line: usize) -> Result<(Token, usize), QasmError> {
    let mut i = start;
    let mut is_float = false;
    while i < chars.len() && chars[i].is_ascii_digit() {
        i += 1;
    }
    if chars.get(i) == Some(&'.') {
        is_float = true;
        i += 1;
        while i < chars.len() && chars[i].is_ascii_digit() {
            i += 1;
        }
    }
    if matches!(chars.get(i), Some('e' | 'E')) {
        let mut j = i + 1;
        if matches!(chars.get(j), Some('+' | '-')) {
            j += 1;
        }
        if chars.get(j).is_some_and(char::is_ascii_digit) {
            is_float = true;
            i = j;
            while i < chars.len() && chars[i].is_ascii_digit() {
                i += 1;
            }
        }
    }
    let text: String = chars[start..i].iter().collect();
    let token = if is_float {
        Token::Float(
            text.parse()
                .map_err(|_| QasmError::new(line, format!("invalid number '{text}'")))?,
        )
    } else {
        Token::Int(
            text.parse()
                .map_err(|_| QasmError::new(line, format!("integer '{text}' is too large")))?,
        )
    };
    Ok((token, i))
}

// ── Parser ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct Register {
    offset: u32,
    size: u32,
    scalar: bool,
}

/// A resolved operand: one bit or a whole register.
#[derive(Debug, Clone)]
enum Operand {
    Single(u32),
    Register(Vec<u32>),
}

impl Operand {
    fn width(&self) -> Option<usize> {
        match self {
            Operand::Single(_) => None,
            Operand::Register(bits) => Some(bits.len()),
        }
    }

    fn at(&self, i: usize) -> u32 {
        match self {
            Operand::Single(b) => *b,
            Operand::Register(bits) => bits[i],
        }
    }

    fn bits(&self) -> Vec<u32> {
        match self {
            Operand::Single(b) => vec![*b],
            Operand::Register(bits) => bits.clone(),
        }
    }
}

const MAX_NESTING: usize = 64;

/// `declared + size`, if it stays within [`MAX_QUBITS`].
fn bounded_total(declared: u32, size: u32, what: &str, line: usize) -> Result<u32, QasmError> {
    declared
        .checked_add(size)
        .filter(|&total| total <= MAX_QUBITS)
        .ok_or_else(|| {
            QasmError::new(
                line,
                format!("program declares more than {MAX_QUBITS} {what}"),
            )
        })
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    qregs: FxHashMap<String, Register>,
    cregs: FxHashMap<String, Register>,
    qubit_labels: Vec<String>,
    num_qubits: u32,
    num_clbits: u32,
    operations: Vec<Operation>,
    nesting: usize,
}

/// Parse and validate a program.
pub(crate) fn parse(source: &str) -> Result<ParsedProgram, QasmError> {
    let tokens = tokenize(source)?;
    if tokens.is_empty() {
        return Err(QasmError::new(1, "empty program"));
    }
    let mut parser = Parser {
        tokens,
        pos: 0,
        qregs: FxHashMap::default(),
        cregs: FxHashMap::default(),
        qubit_labels: Vec::new(),
        num_qubits: 0,
        num_clbits: 0,
        operations: Vec::new(),
        nesting: 0,
    };
    parser.program()?;

    if parser.qubit_labels.is_empty() {
        return Err(QasmError::new(
            parser.last_line(),
            "program declares no qubits",
        ));
    }
    Ok(ParsedProgram {
        num_qubits: parser.num_qubits,
        num_clbits: parser.num_clbits,
        qubit_labels: parser.qubit_labels,
        operations: parser.operations,
    })
}

impl Parser {
    fn program(&mut self) -> Result<(), QasmError> {
        let mut first = true;
        while !self.at_end() {
            self.statement(first)?;
            first = false;
        }
        Ok(())
    }

    fn statement(&mut self, first: bool) -> Result<(), QasmError> {
        let line = self.line();
        let Some(Token::Ident(word)) = self.peek().cloned() else {
            let found = self.peek().map(Token::describe).unwrap_or_default();
            return Err(QasmError::new(line, format!("expected a statement, found {found}")));
        };

        match word.as_str() {
            "OPENQASM" => {
                if !first {
                    return Err(QasmError::new(
                        line,
                        "OPENQASM version must be the first statement",
                    ));
                }
                self.advance();
                let major = match self.next_token()? {
                    Token::Int(n) => n as f64,
                    Token::Float(f) => f,
                    other => {
                        return Err(QasmError::new(
                            line,
                            format!("expected a version number, found {}", other.describe()),
                        ));
                    }
                };
                if !(2.0..4.0).contains(&major) {
                    return Err(QasmError::new(
                        line,
                        format!("unsupported OpenQASM version {major}"),
                    ));
                }
                self.expect(&Token::Semicolon)
            }
            "include" => {
                self.advance();
                let file = match self.next_token()? {
                    Token::Str(s) => s,
                    other => {
                        return Err(QasmError::new(
                            line,
                            format!("expected a file name, found {}", other.describe()),
                        ));
                    }
                };
                if file != "stdgates.inc" && file != "qelib1.inc" {
                    return Err(QasmError::new(line, format!("cannot resolve include \"{file}\"")));
                }
                self.expect(&Token::Semicolon)
            }
            "qubit" => {
                self.advance();
                let size = self.optional_size()?;
                let name = self.ident()?;
                self.declare_qubits(&name, size, line)?;
                self.expect(&Token::Semicolon)
            }
            "qreg" => {
                self.advance();
                let name = self.ident()?;
                let size = self.required_size()?;
                self.declare_qubits(&name, Some(size), line)?;
                self.expect(&Token::Semicolon)
            }
            "bit" => {
                self.advance();
                let size = self.optional_size()?;
                let name = self.ident()?;
                self.declare_clbits(&name, size, line)?;
                self.expect(&Token::Semicolon)
            }
            "creg" => {
                self.advance();
                let name = self.ident()?;
                let size = self.required_size()?;
                self.declare_clbits(&name, Some(size), line)?;
                self.expect(&Token::Semicolon)
            }
            "measure" => {
                self.advance();
                let qubits = self.qubit_operand()?;
                let clbits = if self.eat(&Token::Arrow) {
                    Some(self.clbit_operand()?)
                } else {
                    None
                };
                self.expect(&Token::Semicolon)?;
                self.push_measure(qubits, clbits, line)
            }
            "barrier" => {
                self.advance();
                let mut qubits = Vec::new();
                if self.check(&Token::Semicolon) {
                    qubits.extend(0..self.num_qubits);
                } else {
                    loop {
                        qubits.extend(self.qubit_operand()?.bits());
                        if !self.eat(&Token::Comma) {
                            break;
                        }
                    }
                }
                self.expect(&Token::Semicolon)?;
                qubits.sort_unstable();
                qubits.dedup();
                self.operations.push(Operation::new(OpKind::Barrier, "barrier", qubits));
                Ok(())
            }
            "reset" => {
                self.advance();
                let target = self.qubit_operand()?;
                self.expect(&Token::Semicolon)?;
                for q in target.bits() {
                    self.operations.push(Operation::new(OpKind::Reset, "reset", vec![q]));
                }
                Ok(())
            }
            w if UNSUPPORTED.contains(&w) => {
                Err(QasmError::new(line, format!("'{w}' statements are not supported")))
            }
            w if self.cregs.contains_key(w) => {
                // c[0] = measure q[0];
                let clbits = self.clbit_operand()?;
                self.expect(&Token::Assign)?;
                match self.next_token()? {
                    Token::Ident(m) if m == "measure" => {}
                    other => {
                        return Err(QasmError::new(
                            line,
                            format!(
                                "only measurement results can be assigned, found {}",
                                other.describe()
                            ),
                        ));
                    }
                }
                let qubits = self.qubit_operand()?;
                self.expect(&Token::Semicolon)?;
                self.push_measure(qubits, Some(clbits), line)
            }
            _ => self.gate_call(line),
        }
    }

    fn gate_call(&mut self, line: usize) -> Result<(), QasmError> {
        let name = self.ident()?;
        let spec = gate_spec(&name)
            .ok_or_else(|| QasmError::new(line, format!("unknown gate '{name}'")))?;

        let mut params = Vec::new();
        if self.eat(&Token::LParen) {
            if !self.check(&Token::RParen) {
                loop {
                    params.push(self.expr()?);
                    if !self.eat(&Token::Comma) {
                        break;
                    }
                }
            }
            self.expect(&Token::RParen)?;
        }
        if params.len() != spec.params {
            return Err(QasmError::new(
                line,
                format!(
                    "gate '{name}' takes {} parameter(s), got {}",
                    spec.params,
                    params.len()
                ),
            ));
        }

        let mut operands = Vec::new();
        loop {
            operands.push(self.qubit_operand()?);
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        self.expect(&Token::Semicolon)?;

        if operands.len() != spec.qubits {
            return Err(QasmError::new(
                line,
                format!(
                    "gate '{name}' acts on {} qubit(s), got {}",
                    spec.qubits,
                    operands.len()
                ),
            ));
        }

        // Broadcast over registers; all register operands must agree in size.
        let mut width: Option<usize> = None;
        for w in operands.iter().filter_map(Operand::width) {
            match width {
                Some(existing) if existing != w => {
                    return Err(QasmError::new(
                        line,
                        format!(
                            "register operands of '{name}' have different sizes ({existing} and {w})"
                        ),
                    ));
                }
                _ => width = Some(w),
            }
        }

        for i in 0..width.unwrap_or(1) {
            let qubits: Vec<u32> = operands.iter().map(|op| op.at(i)).collect();
            if has_duplicates(&qubits) {
                return Err(QasmError::new(
                    line,
                    format!("gate '{name}' uses the same qubit more than once"),
                ));
            }
            self.operations.push(Operation {
                params: params.clone(),
                ..Operation::new(OpKind::Gate, name.clone(), qubits)
            });
        }
        Ok(())
    }

    fn push_measure(
        &mut self,
        qubits: Operand,
        clbits: Option<Operand>,
        line: usize,
    ) -> Result<(), QasmError> {
        let qs = qubits.bits();
        let cs = clbits.as_ref().map(Operand::bits);
        if let Some(cs) = &cs {
            if cs.len() != qs.len() {
                return Err(QasmError::new(
                    line,
                    format!("cannot measure {} qubit(s) into {} bit(s)", qs.len(), cs.len()),
                ));
            }
        }
        for (i, q) in qs.into_iter().enumerate() {
            let mut op = Operation::new(OpKind::Measure, "measure", vec![q]);
            if let Some(cs) = &cs {
                op.clbits = vec![cs[i]];
            }
            self.operations.push(op);
        }
        Ok(())
    }

    fn declare_qubits(
        &mut self,
        name: &str,
        size: Option<u32>,
        line: usize,
    ) -> Result<(), QasmError> {
        self.check_fresh(name, line)?;
        let offset = self.num_qubits;
        let (size, scalar) = match size {
            Some(n) => (n, false),
            None => (1, true),
        };
        self.num_qubits = bounded_total(offset, size, "qubits", line)?;
        if scalar {
            self.qubit_labels.push(name.to_string());
        } else {
            self.qubit_labels
                .extend((0..size).map(|i| format!("{name}[{i}]")));
        }
        self.qregs.insert(name.to_string(), Register { offset, size, scalar });
        Ok(())
    }

    fn declare_clbits(
        &mut self,
        name: &str,
        size: Option<u32>,
        line: usize,
    ) -> Result<(), QasmError> {
        self.check_fresh(name, line)?;
        let (size, scalar) = match size {
            Some(n) => (n, false),
            None => (1, true),
        };
        let total = bounded_total(self.num_clbits, size, "classical bits", line)?;
        self.cregs.insert(
            name.to_string(),
            Register {
                offset: self.num_clbits,
                size,
                scalar,
            },
        );
        self.num_clbits = total;
        Ok(())
    }

    fn check_fresh(&self, name: &str, line: usize) -> Result<(), QasmError> {
        if self.qregs.contains_key(name) || self.cregs.contains_key(name) {
            return Err(QasmError::new(line, format!("'{name}' is already declared")));
        }
        if gate_spec(name).is_some() || name == "measure" || name == "barrier" || name == "reset" {
            return Err(QasmError::new(line, format!("'{name}' is a reserved name")));
        }
        Ok(())
    }

    fn qubit_operand(&mut self) -> Result<Operand, QasmError> {
        let line = self.line();
        let name = self.ident()?;
        let reg = self
            .qregs
            .get(&name)
            .cloned()
            .ok_or_else(|| QasmError::new(line, format!("undeclared qubit register '{name}'")))?;
        self.operand(&name, &reg, line)
    }

    fn clbit_operand(&mut self) -> Result<Operand, QasmError> {
        let line = self.line();
        let name = self.ident()?;
        let reg = self
            .cregs
            .get(&name)
            .cloned()
            .ok_or_else(|| QasmError::new(line, format!("undeclared bit register '{name}'")))?;
        self.operand(&name, &reg, line)
    }

    fn operand(&mut self, name: &str, reg: &Register, line: usize) -> Result<Operand, QasmError> {
        if self.eat(&Token::LBracket) {
            if reg.scalar {
                return Err(QasmError::new(line, format!("'{name}' is not a register")));
            }
            let index = match self.next_token()? {
                Token::Int(n) => n,
                other => {
                    return Err(QasmError::new(
                        line,
                        format!("expected an index, found {}", other.describe()),
                    ));
                }
            };
            self.expect(&Token::RBracket)?;
            if index >= u64::from(reg.size) {
                return Err(QasmError::new(
                    line,
                    format!("index {index} is out of range for '{name}' of size {}", reg.size),
                ));
            }
            Ok(Operand::Single(reg.offset + index as u32))
        } else if reg.scalar {
            Ok(Operand::Single(reg.offset))
        } else {
            Ok(Operand::Register((reg.offset..reg.offset + reg.size).collect()))
        }
    }

    fn optional_size(&mut self) -> Result<Option<u32>, QasmError> {
        if self.check(&Token::LBracket) {
            self.required_size().map(Some)
        } else {
            Ok(None)
        }
    }

    fn required_size(&mut self) -> Result<u32, QasmError> {
        let line = self.line();
        self.expect(&Token::LBracket)?;
        let size = match self.next_token()? {
            Token::Int(n) => n,
            other => {
                return Err(QasmError::new(
                    line,
                    format!("expected a register size, found {}", other.describe()),
                ));
            }
        };
        self.expect(&Token::RBracket)?;
        if size == 0 {
            return Err(QasmError::new(line, "register size must be positive"));
        }
        u32::try_from(size)
            .map_err(|_| QasmError::new(line, format!("register size {size} is too large")))
    }

    // ── Parameter expressions ─────────────────────────────────────────────

    fn expr(&mut self) -> Result<f64, QasmError> {
        let line = self.line();
        let value = self.sum()?;
        if !value.is_finite() {
            return Err(QasmError::new(line, "parameter does not evaluate to a finite number"));
        }
        Ok(value)
    }

    fn sum(&mut self) -> Result<f64, QasmError> {
        let mut value = self.product()?;
        loop {
            if self.eat(&Token::Plus) {
                value += self.product()?;
            } else if self.eat(&Token::Minus) {
                value -= self.product()?;
            } else {
                return Ok(value);
            }
        }
    }

    fn product(&mut self) -> Result<f64, QasmError> {
        let mut value = self.unary()?;
        loop {
            if self.eat(&Token::Star) {
                value *= self.unary()?;
            } else if self.eat(&Token::Slash) {
                value /= self.unary()?;
            } else {
                return Ok(value);
            }
        }
    }

    fn unary(&mut self) -> Result<f64, QasmError> {
        let mut negate = false;
        loop {
            if self.eat(&Token::Minus) {
                negate = !negate;
            } else if !self.eat(&Token::Plus) {
                break;
            }
        }
        let value = self.primary()?;
        Ok(if negate { -value } else { value })
    }

    fn primary(&mut self) -> Result<f64, QasmError> {
        let line = self.line();
        match self.next_token()? {
            Token::Int(n) => Ok(n as f64),
            Token::Float(f) => Ok(f),
            Token::Ident(name) => match name.as_str() {
                "pi" | "π" => Ok(consts::PI),
                "tau" | "τ" => Ok(consts::TAU),
                "euler" | "e" | "ℇ" => Ok(consts::E),
                other => Err(QasmError::new(
                    line,
                    format!("unknown identifier '{other}' in expression"),
                )),
            },
            Token::LParen => {
                if self.nesting >= MAX_NESTING {
                    return Err(QasmError::new(
                        line,
                        format!("expression nests deeper than {MAX_NESTING} parentheses"),
                    ));
                }
                self.nesting += 1;
                let value = self.sum();
                self.nesting -= 1;
                let value = value?;
                self.expect(&Token::RParen)?;
                Ok(value)
            }
            other => Err(QasmError::new(
                line,
                format!("expected an expression, found {}", other.describe()),
            )),
        }
    }

    // ── Token helpers ─────────────────────────────────────────────────────

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|s| &s.token)
    }

    fn line(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map_or_else(|| self.last_line(), |s| s.line)
    }

    fn last_line(&self) -> usize {
        self.tokens.last().map_or(1, |s| s.line)
    }

    fn advance(&mut self) {
        self.pos += 1;
    }

    fn next_token(&mut self) -> Result<Token, QasmError> {
        let line = self.line();
        let token = self
            .tokens
            .get(self.pos)
            .map(|s| s.token.clone())
            .ok_or_else(|| QasmError::new(line, "unexpected end of program"))?;
        self.pos += 1;
        Ok(token)
    }

    fn check(&self, token: &Token) -> bool {
        self.peek() == Some(token)
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.check(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token) -> Result<(), QasmError> {
        let line = self.line();
        match self.next_token() {
            Ok(ref found) if found == token => Ok(()),
            Ok(found) => Err(QasmError::new(
                line,
                format!("expected {}, found {}", token.describe(), found.describe()),
            )),
            Err(_) => Err(QasmError::new(
                line,
                format!("expected {} before end of program", token.describe()),
            )),
        }
    }

    fn ident(&mut self) -> Result<String, QasmError> {
        let line = self.line();
        match self.next_token()? {
            Token::Ident(name) => Ok(name),
            other => Err(QasmError::new(
                line,
                format!("expected an identifier, found {}", other.describe()),
            )),
        }
    }
}

fn has_duplicates(qubits: &[u32]) -> bool {
    qubits
        .iter()
        .enumerate()
        .any(|(i, q)| qubits[i + 1..].contains(q))
}
