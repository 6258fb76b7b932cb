//! Emission of the assembled object as one little-endian byte stream.
//!
//! File order: ELF header, `.text` words, `.data`, `.bss`, `.rodata`,
//! `.riscv.attributes`, `.symtab`, `.strtab`, `.shstrtab`, `.rela.text`,
//! then the section header table. Offsets were already pinned by layout;
//! the writer never seeks.

use std::io::{Result, Seek, Write};

use binbin::endian::Endian;
use log::debug;

use super::attrs;
use super::encode::encode_instruction;
use super::Elf32;
use crate::parse::StmtBody;

impl Elf32 {
    /// Write the finished object into `target`.
    pub fn write_to<W: Write + Seek>(&self, target: &mut W) -> Result<()> {
        debug!(
            "writing object: section header table at {:#x}",
            self.ehdr.shoff
        );
        binbin::write_le(target, |w| {
            self.write_ehdr(w)?;
            self.write_text(w)?;
            self.write_data(w, ".data")?;
            self.write_data(w, ".bss")?;
            self.write_data(w, ".rodata")?;
            w.write(&attrs::riscv_attributes()[..])?;
            self.write_symtab(w)?;
            w.write(self.strtab.data())?;
            w.write(self.shstrtab.data())?;
            self.write_rela(w)?;
            self.write_shdrs(w)?;
            Ok(())
        })
    }

    fn write_ehdr<W: Write + Seek, E: Endian>(
        &self,
        w: &mut binbin::Writer<'_, W, E>,
    ) -> Result<()> {
        w.write(&self.ehdr.ident[..])?;
        w.write(self.ehdr.etype)?;
        w.write(self.ehdr.machine)?;
        w.write(self.ehdr.version)?;
        w.write(self.ehdr.entry)?;
        w.write(self.ehdr.phoff)?;
        w.write(self.ehdr.shoff)?;
        w.write(self.ehdr.flags)?;
        w.write(self.ehdr.ehsize)?;
        w.write(self.ehdr.phentsize)?;
        w.write(self.ehdr.phnum)?;
        w.write(self.ehdr.shentsize)?;
        w.write(self.ehdr.shnum)?;
        w.write(self.ehdr.shstrndx)?;
        Ok(())
    }

    fn write_text<W: Write + Seek, E: Endian>(
        &self,
        w: &mut binbin::Writer<'_, W, E>,
    ) -> Result<()> {
        let bucket = match self.sections.get(".text") {
            Some(bucket) => bucket,
            None => return Ok(()),
        };
        for stmt in bucket.stmts() {
            if let Some(StmtBody::Instruction(ins)) = &stmt.body {
                w.write(encode_instruction(ins, &self.symtab))?;
            }
        }
        Ok(())
    }

    fn write_data<W: Write + Seek, E: Endian>(
        &self,
        w: &mut binbin::Writer<'_, W, E>,
        section: &str,
    ) -> Result<()> {
        let bucket = match self.sections.get(section) {
            Some(bucket) => bucket,
            None => return Ok(()),
        };
        for stmt in bucket.stmts() {
            let dir = match &stmt.body {
                Some(StmtBody::Directive(dir)) => dir,
                _ => continue,
            };
            match dir.name {
                ".string" | ".asciz" => {
                    if let Some(s) = dir.str_arg(0) {
                        w.write(s.as_bytes())?;
                        w.write(0_u8)?;
                    }
                }
                ".byte" => {
                    w.write(dir.int_arg(0).unwrap_or(0) as u8)?;
                }
                ".2byte" | ".half" | ".short" => {
                    w.write(dir.int_arg(0).unwrap_or(0) as u16)?;
                }
                ".4byte" | ".word" | ".long" => {
                    w.write(dir.int_arg(0).unwrap_or(0) as u32)?;
                }
                ".zero" => {
                    let count = dir.int_arg(0).unwrap_or(0).max(0);
                    for _ in 0..count {
                        w.write(0_u8)?;
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn write_symtab<W: Write + Seek, E: Endian>(
        &self,
        w: &mut binbin::Writer<'_, W, E>,
    ) -> Result<()> {
        for sym in self.symtab.entries() {
            w.write(sym.name)?;
            w.write(sym.value)?;
            w.write(sym.size)?;
            w.write(sym.info)?;
            w.write(sym.other)?;
            w.write(sym.shndx)?;
        }
        Ok(())
    }

    fn write_rela<W: Write + Seek, E: Endian>(
        &self,
        w: &mut binbin::Writer<'_, W, E>,
    ) -> Result<()> {
        for entry in &self.rela {
            w.write(entry.offset)?;
            w.write(entry.info)?;
            w.write(entry.addend as u32)?;
        }
        Ok(())
    }

    fn write_shdrs<W: Write + Seek, E: Endian>(
        &self,
        w: &mut binbin::Writer<'_, W, E>,
    ) -> Result<()> {
        for hdr in self.shdr.headers() {
            w.write(hdr.name)?;
            w.write(hdr.shtype)?;
            w.write(hdr.flags)?;
            w.write(hdr.addr)?;
            w.write(hdr.offset)?;
            w.write(hdr.size)?;
            w.write(hdr.link)?;
            w.write(hdr.info)?;
            w.write(hdr.addralign)?;
            w.write(hdr.entsize)?;
        }
        Ok(())
    }
}
