//! Error types for the assembler.
//!
//! [`AsmError`] is the taxonomy of things that can go wrong in a single
//! statement; [`Error`] attaches the source location the way the GNU
//! assembler reports it, so the CLI can print the message verbatim under
//! its `Assembler messages:` banner.

/// A defect in one statement, without location information.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AsmError {
    /// A directive received fewer arguments than its signature requires.
    #[error("missing argument.")]
    MissingArgument,

    /// A token of the wrong type, or trailing tokens beyond a statement's
    /// signature. Carries the first character of the offending token.
    #[error("junk at end of line, first unrecognized character is `{0}'")]
    Junk(char),

    /// An instruction operand that does not fit its slot.
    #[error("illegal operand.")]
    IllegalOperand,

    #[error("Multiple labels found on the same line. Only one label is allowed per line.")]
    MultipleLabels,

    /// An instruction outside the `.text` section.
    #[error("unknown pseudo-op:{0}")]
    UnknownPseudoOp(String),

    /// The same label defined in two different sections.
    #[error("symbol `{0}' is already defined")]
    DuplicateSymbol(String),
}

/// An assembly failure tied to its source location.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Rejected while parsing a line.
    #[error("{file}:{row}: Error: {kind}")]
    Parse {
        file: String,
        row: u32,
        kind: AsmError,
    },

    /// Rejected while resolving symbols and sections.
    #[error("{row}: Error: {kind}")]
    Resolve { row: u32, kind: AsmError },

    /// The output stream failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn parse(file: &str, row: u32, kind: AsmError) -> Self {
        Error::Parse {
            file: file.to_string(),
            row,
            kind,
        }
    }

    pub(crate) fn resolve(row: u32, kind: AsmError) -> Self {
        Error::Resolve { row, kind }
    }
}
