//! Source parsing: one statement per line.
//!
//! A line is an optional `label:`, then at most one directive or
//! instruction, then an optional `#` comment. Blank and comment-only
//! lines yield no statement. Every statement remembers its 1-based source
//! row and the section that was current when it was parsed.

use crate::error::{AsmError, Error};

pub mod directive;
pub mod operation;

pub use directive::{DirArg, Directive};
pub use operation::{Format, Instruction, OpSpec, Operand, RelFunc};

/// The section in effect before any section directive has been seen.
pub const INITIAL_SECTION: &str = ".text";

/// The body of a statement, when the line carries more than a label.
#[derive(Debug, Clone)]
pub enum StmtBody {
    Directive(Directive),
    Instruction(Instruction),
}

/// One parsed source line that contributes to the object file.
#[derive(Debug, Clone)]
pub struct Statement {
    pub label: Option<String>,
    pub body: Option<StmtBody>,
    pub row: u32,
    pub section: String,
}

/// Parse a whole translation unit into its statement sequence.
///
/// `file` is only used to prefix error messages.
pub fn parse_source(file: &str, source: &str) -> Result<Vec<Statement>, Error> {
    let mut section = INITIAL_SECTION.to_string();
    let mut stmts = Vec::new();
    for (idx, line) in source.lines().enumerate() {
        let row = (idx + 1) as u32;
        match parse_line(line, row, &mut section) {
            Ok(Some(stmt)) => stmts.push(stmt),
            Ok(None) => {}
            Err(kind) => return Err(Error::parse(file, row, kind)),
        }
    }
    Ok(stmts)
}

/// Parse a single line. `section` is the current-section register; section
/// directives update it in place.
pub fn parse_line(
    line: &str,
    row: u32,
    section: &mut String,
) -> Result<Option<Statement>, AsmError> {
    let chars: Vec<char> = line.chars().collect();
    let mut cur = Cursor::new(&chars);

    cur.skip_separators();
    if cur.at_eof() {
        return Ok(None);
    }

    let mut label = None;
    let mut tok = cur.next_token();
    if is_label(&tok) {
        label = Some(tok[..tok.len() - 1].to_string());
        cur.skip_separators();
        if cur.at_eof() {
            return Ok(Some(Statement {
                label,
                body: None,
                row,
                section: section.clone(),
            }));
        }
        tok = cur.next_token();
        if is_label(&tok) {
            return Err(AsmError::MultipleLabels);
        }
    }
    cur.skip_separators();

    let body = if let Some(spec) = directive::lookup(&tok) {
        let dir = directive::parse_directive(spec, &mut cur)?;
        apply_section_switch(&dir, section);
        StmtBody::Directive(dir)
    } else if let Some(spec) = operation::lookup(&tok) {
        StmtBody::Instruction(operation::parse_operation(spec, &mut cur)?)
    } else {
        // Neither a label, a directive, nor a mnemonic.
        let first = tok.chars().next().unwrap_or(' ');
        return Err(AsmError::Junk(first));
    };

    Ok(Some(Statement {
        label,
        body: Some(body),
        row,
        section: section.clone(),
    }))
}

fn apply_section_switch(dir: &Directive, section: &mut String) {
    match dir.name {
        ".text" | ".data" | ".rodata" | ".bss" => *section = dir.name.to_string(),
        ".section" => {
            if let Some(DirArg::Str(name)) = dir.args.get(0) {
                *section = name.clone();
            }
        }
        _ => {}
    }
}

/// A label is an identifier followed by `:`: either all digits, or a
/// leading letter/`_`/`.` followed by letters, digits, `_` and `.`.
fn is_label(tok: &str) -> bool {
    let ident = match tok.strip_suffix(':') {
        Some(ident) if !ident.is_empty() => ident,
        _ => return false,
    };
    if ident.chars().all(|c| c.is_ascii_digit()) {
        return true;
    }
    let mut chars = ident.chars();
    let head = chars.next().unwrap();
    if !(head.is_ascii_alphabetic() || head == '_' || head == '.') {
        return false;
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

/// Integer literal: optionally negative decimal, or `0x…` hex.
pub(crate) fn parse_int(tok: &str) -> Option<i64> {
    let (neg, body) = match tok.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, tok),
    };
    let value = if let Some(hex) = body.strip_prefix("0x") {
        if hex.is_empty() || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        i64::from_str_radix(hex, 16).ok()?
    } else {
        if body.is_empty() || !body.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        body.parse::<i64>().ok()?
    };
    Some(if neg { -value } else { value })
}

/// Scanning position within one line.
pub(crate) struct Cursor<'a> {
    src: &'a [char],
    idx: usize,
}

impl<'a> Cursor<'a> {
    fn new(src: &'a [char]) -> Self {
        Cursor { src, idx: 0 }
    }

    pub(crate) fn at_eof(&self) -> bool {
        self.idx >= self.src.len()
    }

    pub(crate) fn peek(&self) -> char {
        if self.at_eof() {
            ' '
        } else {
            self.src[self.idx]
        }
    }

    /// Skip token separators; a `#` abandons the rest of the line.
    pub(crate) fn skip_separators(&mut self) {
        while !self.at_eof() {
            match self.src[self.idx] {
                '#' => {
                    self.idx = self.src.len();
                    return;
                }
                ' ' | '\t' | '\x0b' | '\x0c' | ',' | '(' | ')' => self.idx += 1,
                _ => return,
            }
        }
    }

    /// Take the next token. Inside a `"` literal, separators and `,` do
    /// not split; no escape processing is done.
    pub(crate) fn next_token(&mut self) -> String {
        let start = self.idx;
        let mut in_literal = false;
        while !self.at_eof() {
            let c = self.src[self.idx];
            if c == '"' {
                in_literal = !in_literal;
                self.idx += 1;
                continue;
            }
            if in_literal {
                self.idx += 1;
                continue;
            }
            match c {
                ' ' | '\t' | '\x0b' | '\x0c' | ',' | '(' | ')' | '#' => break,
                _ => self.idx += 1,
            }
        }
        self.src[start..self.idx].iter().collect()
    }

    /// Take the next instruction operand. A `%name(` prefix is returned
    /// as its own token (`%name`) so relocation modifiers can be checked
    /// before the inner symbol is read.
    pub(crate) fn next_operand(&mut self) -> String {
        let start = self.idx;
        let mut rel_func = false;
        while !self.at_eof() {
            let c = self.src[self.idx];
            if c == '%' {
                rel_func = true;
                self.idx += 1;
                continue;
            }
            if rel_func {
                if c == '(' {
                    break;
                }
                self.idx += 1;
                continue;
            }
            match c {
                ' ' | '\t' | ',' | '(' | ')' | '#' => break,
                _ => self.idx += 1,
            }
        }
        self.src[start..self.idx].iter().collect()
    }
}
