//! Directive table and typed argument parsing.

use super::{parse_int, Cursor};
use crate::error::AsmError;

/// Argument slot types, combined as a bitmask per slot.
const INT: u8 = 1 << 0;
const STR: u8 = 1 << 1;

/// Signature of one directive: required slots, optional trailing slots,
/// and whether any further tokens are silently accepted (`.macro`
/// parameter lists).
#[derive(Debug)]
pub struct DirSpec {
    pub name: &'static str,
    req: &'static [u8],
    opt: &'static [u8],
    rest: bool,
}

const NO_ARGS: &[u8] = &[];

macro_rules! dir {
    ($name:expr, $req:expr) => {
        DirSpec { name: $name, req: $req, opt: NO_ARGS, rest: false }
    };
    ($name:expr, $req:expr, opt $opt:expr) => {
        DirSpec { name: $name, req: $req, opt: $opt, rest: false }
    };
    ($name:expr, $req:expr, rest) => {
        DirSpec { name: $name, req: $req, opt: NO_ARGS, rest: true }
    };
}

#[rustfmt::skip]
const DIRECTIVES: &[DirSpec] = &[
    dir!(".align", &[INT]),
    dir!(".file", &[STR]),
    dir!(".globl", &[STR]),
    dir!(".global", &[STR]),
    dir!(".local", &[STR]),
    dir!(".comm", &[STR, INT], opt &[INT]),
    dir!(".common", &[STR, INT], opt &[INT]),
    dir!(".ident", &[STR]),
    dir!(".section", &[STR]),
    dir!(".size", &[STR, INT]),
    dir!(".text", NO_ARGS),
    dir!(".data", NO_ARGS),
    dir!(".rodata", NO_ARGS),
    dir!(".bss", NO_ARGS),
    dir!(".string", &[STR]),
    dir!(".asciz", &[STR]),
    dir!(".equ", &[STR, INT]),
    dir!(".macro", &[STR], rest),
    dir!(".endm", NO_ARGS),
    dir!(".type", &[STR, INT | STR]),
    dir!(".byte", &[INT]),
    dir!(".2byte", &[INT]),
    dir!(".half", &[INT]),
    dir!(".short", &[INT]),
    dir!(".4byte", &[INT]),
    dir!(".word", &[INT]),
    dir!(".long", &[INT]),
    dir!(".zero", &[INT]),
    dir!(".variant_cc", &[STR]),
    dir!(".attribute", &[INT | STR, INT | STR]),
];

pub fn lookup(name: &str) -> Option<&'static DirSpec> {
    DIRECTIVES.iter().find(|spec| spec.name == name)
}

/// A directive argument: an integer literal or a (possibly quoted) name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirArg {
    Int(i64),
    Str(String),
}

/// One directive statement with its validated arguments.
#[derive(Debug, Clone)]
pub struct Directive {
    pub name: &'static str,
    pub args: Vec<DirArg>,
}

impl Directive {
    pub fn str_arg(&self, idx: usize) -> Option<&str> {
        match self.args.get(idx) {
            Some(DirArg::Str(s)) => Some(s),
            _ => None,
        }
    }

    pub fn int_arg(&self, idx: usize) -> Option<i64> {
        match self.args.get(idx) {
            Some(DirArg::Int(v)) => Some(*v),
            _ => None,
        }
    }
}

fn take_arg(cur: &mut Cursor<'_>, slot: u8) -> Result<DirArg, AsmError> {
    let tok = cur.next_token();
    let first = tok.chars().next().unwrap_or(' ');
    if let Some(value) = parse_int(&tok) {
        if slot & INT == 0 {
            return Err(AsmError::Junk(first));
        }
        return Ok(DirArg::Int(value));
    }
    if slot & STR == 0 {
        return Err(AsmError::Junk(first));
    }
    Ok(DirArg::Str(strip_quotes(&tok)))
}

fn strip_quotes(tok: &str) -> String {
    if tok.len() >= 2 && tok.starts_with('"') && tok.ends_with('"') {
        tok[1..tok.len() - 1].to_string()
    } else {
        tok.to_string()
    }
}

/// Parse the argument list for `spec` from the rest of the line.
pub(crate) fn parse_directive(
    spec: &'static DirSpec,
    cur: &mut Cursor<'_>,
) -> Result<Directive, AsmError> {
    let mut args = Vec::with_capacity(spec.req.len());

    for &slot in spec.req {
        cur.skip_separators();
        if cur.at_eof() {
            return Err(AsmError::MissingArgument);
        }
        args.push(take_arg(cur, slot)?);
    }
    for &slot in spec.opt {
        cur.skip_separators();
        if cur.at_eof() {
            break;
        }
        args.push(take_arg(cur, slot)?);
    }
    if spec.rest {
        // Macro parameter lists are tokenized and dropped.
        loop {
            cur.skip_separators();
            if cur.at_eof() {
                break;
            }
            cur.next_token();
        }
    }

    cur.skip_separators();
    if !cur.at_eof() {
        return Err(AsmError::Junk(cur.peek()));
    }

    Ok(Directive {
        name: spec.name,
        args,
    })
}
