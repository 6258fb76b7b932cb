//! An assembler for the RV32I base instruction set, producing
//! relocatable ELF32 object files for `EM_RISCV`.
//!
//! The pipeline runs in three stages: [`parse`] turns source lines into
//! statements, [`elf32`] resolves symbols, sections and relocations over
//! two passes, and the writer emits the little-endian ELF32 byte stream.
//! Extensions beyond base RV32I, pseudo-instruction expansion and macro
//! expansion are out of scope; the emitted object is meant to be handed
//! to a standard RISC-V linker.
//!
//! ```
//! # fn main() -> Result<(), rv32as::Error> {
//! let source = "  addi a0, a1, 42\n";
//! let object = rv32as::assemble_to_vec("demo.s", source)?;
//! assert_eq!(&object[0..4], b"\x7fELF");
//! # Ok(())
//! # }
//! ```

use std::io::{Cursor, Seek, Write};

pub mod elf32;
pub mod error;
pub mod parse;

pub use error::{AsmError, Error};

/// Assemble `source` and write the object file into `out`.
///
/// `file` names the translation unit in parse error messages.
pub fn assemble<W: Write + Seek>(file: &str, source: &str, out: &mut W) -> Result<(), Error> {
    let stmts = parse::parse_source(file, source)?;
    let object = elf32::Elf32::prepare(stmts)?;
    object.write_to(out)?;
    Ok(())
}

/// Assemble `source` and return the object file bytes.
pub fn assemble_to_vec(file: &str, source: &str) -> Result<Vec<u8>, Error> {
    let mut cursor = Cursor::new(Vec::new());
    assemble(file, source, &mut cursor)?;
    Ok(cursor.into_inner())
}
