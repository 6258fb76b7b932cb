//! The ELF32 object model and the two-pass resolver.
//!
//! [`Elf32::prepare`] consumes the statement sequence from the parser.
//! Pass one builds the symbol table, routes statements into their section
//! buckets and advances per-section offsets; after a stable locals-first
//! partition of the symbol table, pass two walks `.text` synthesizing
//! relocation entries for symbolic operands. Layout then pins every
//! section's file offset and finalizes the ELF header.

pub mod attrs;
pub mod encode;
pub mod header;
pub mod rela;
pub mod shdr;
pub mod strtab;
pub mod symtab;
mod writer;

use std::collections::HashMap;

use log::debug;

use crate::error::{AsmError, Error};
use crate::parse::{Directive, Statement, StmtBody};
use header::Elf32Ehdr;
use rela::{reloc_type_for, RelaEntry, RelocType};
use shdr::{
    SectionHeader, SectionHeaderTable, SHF_ALLOC, SHF_EXECINSTR, SHF_WRITE, SHT_NOBITS,
    SHT_PROGBITS, SHT_RELA, SHT_RISCV_ATTRIBUTES, SHT_STRTAB, SHT_SYMTAB,
};
use strtab::StringTable;
use symtab::{
    st_bind, st_info, st_type, symbol_type_for, SymEntry, SymbolTable, SHN_ABS, SHN_UNDEF,
    STB_GLOBAL, STB_LOCAL, STT_FILE, STT_NOTYPE, STT_SECTION,
};

/// File offset of the first section body (the ELF header ends here).
const FIRST_SECTION_OFFSET: u32 = header::EHDR_SIZE as u32;

/// Size of one encoded symbol table entry.
const SYM_ENTSIZE: u32 = 16;
/// Size of one encoded relocation entry.
const RELA_ENTSIZE: u32 = 12;

/// Order in which section bodies appear in the file.
const FILE_ORDER: &[&str] = &[
    ".text",
    ".data",
    ".bss",
    ".rodata",
    ".riscv.attributes",
    ".symtab",
    ".strtab",
    ".shstrtab",
    ".rela.text",
];

/// Statements contributing bytes to one section, plus the running
/// in-section offset.
#[derive(Debug, Default)]
pub struct SectionBucket {
    stmts: Vec<Statement>,
    offset: u32,
}

impl SectionBucket {
    pub fn stmts(&self) -> &[Statement] {
        &self.stmts
    }

    pub fn size(&self) -> u32 {
        self.offset
    }
}

#[derive(Debug)]
struct Sections {
    entries: HashMap<String, SectionBucket>,
}

impl Sections {
    fn new() -> Self {
        let mut entries = HashMap::new();
        for &name in &[".text", ".data", ".bss", ".rodata"] {
            entries.insert(name.to_string(), SectionBucket::default());
        }
        Sections { entries }
    }

    fn offset(&self, name: &str) -> u32 {
        self.entries.get(name).map(|b| b.offset).unwrap_or(0)
    }

    fn push(&mut self, name: &str, stmt: Statement, size: u32) {
        let bucket = self.entries.entry(name.to_string()).or_default();
        bucket.stmts.push(stmt);
        bucket.offset += size;
    }

    fn get(&self, name: &str) -> Option<&SectionBucket> {
        self.entries.get(name)
    }
}

/// The assembled object, ready to be written.
#[derive(Debug)]
pub struct Elf32 {
    ehdr: Elf32Ehdr,
    symtab: SymbolTable,
    strtab: StringTable,
    shstrtab: StringTable,
    shdr: SectionHeaderTable,
    sections: Sections,
    rela: Vec<RelaEntry>,
}

impl Elf32 {
    fn new() -> Self {
        let mut shstrtab = StringTable::new();
        let mut shdr = SectionHeaderTable::new();

        shdr.add("", SectionHeader::default());
        let text = shstrtab.resolve(".text");
        shdr.add(
            ".text",
            SectionHeader {
                name: text,
                shtype: SHT_PROGBITS,
                flags: SHF_ALLOC | SHF_EXECINSTR,
                addralign: 4,
                ..SectionHeader::default()
            },
        );
        let data = shstrtab.resolve(".data");
        shdr.add(
            ".data",
            SectionHeader {
                name: data,
                shtype: SHT_PROGBITS,
                flags: SHF_WRITE | SHF_ALLOC,
                addralign: 4,
                ..SectionHeader::default()
            },
        );
        let bss = shstrtab.resolve(".bss");
        shdr.add(
            ".bss",
            SectionHeader {
                name: bss,
                shtype: SHT_NOBITS,
                flags: SHF_WRITE | SHF_ALLOC,
                addralign: 4,
                ..SectionHeader::default()
            },
        );
        let attributes = shstrtab.resolve(".riscv.attributes");
        shdr.add(
            ".riscv.attributes",
            SectionHeader {
                name: attributes,
                shtype: SHT_RISCV_ATTRIBUTES,
                addralign: 1,
                ..SectionHeader::default()
            },
        );
        let symtab = shstrtab.resolve(".symtab");
        shdr.add(
            ".symtab",
            SectionHeader {
                name: symtab,
                shtype: SHT_SYMTAB,
                addralign: 4,
                entsize: SYM_ENTSIZE,
                ..SectionHeader::default()
            },
        );
        let strtab = shstrtab.resolve(".strtab");
        shdr.add(
            ".strtab",
            SectionHeader {
                name: strtab,
                shtype: SHT_STRTAB,
                addralign: 1,
                ..SectionHeader::default()
            },
        );
        let shstrtab_name = shstrtab.resolve(".shstrtab");
        shdr.add(
            ".shstrtab",
            SectionHeader {
                name: shstrtab_name,
                shtype: SHT_STRTAB,
                addralign: 1,
                ..SectionHeader::default()
            },
        );

        Elf32 {
            ehdr: Elf32Ehdr::new(),
            symtab: SymbolTable::new(),
            strtab: StringTable::new(),
            shstrtab,
            shdr,
            sections: Sections::new(),
            rela: Vec::new(),
        }
    }

    /// Resolve a statement sequence into a complete object.
    pub fn prepare(stmts: Vec<Statement>) -> Result<Elf32, Error> {
        let mut e = Elf32::new();
        for stmt in stmts {
            e.scan(stmt)?;
        }
        e.symtab.sort_locals_first();
        e.resolve_text();
        e.finalize_symbols();
        e.layout();
        debug!(
            "resolved {} symbols ({} local), {} relocations, {} section headers",
            e.symtab.len(),
            e.symtab.first_non_local(),
            e.rela.len(),
            e.shdr.len()
        );
        Ok(e)
    }

    /// Pass 1, one statement: label definition, directive side effects,
    /// bucket routing.
    fn scan(&mut self, stmt: Statement) -> Result<(), Error> {
        if let Some(name) = stmt.label.clone() {
            self.define_label(&name, stmt.row, &stmt.section)?;
        }

        let contribution = match &stmt.body {
            Some(StmtBody::Directive(dir)) => {
                self.apply_directive(dir, &stmt.section);
                if is_data_section(&stmt.section) {
                    data_contribution(dir)
                } else {
                    None
                }
            }
            Some(StmtBody::Instruction(ins)) => {
                if stmt.section != ".text" {
                    return Err(Error::resolve(
                        stmt.row,
                        AsmError::UnknownPseudoOp(ins.mnemonic().to_string()),
                    ));
                }
                Some(4)
            }
            None => None,
        };

        if let Some(size) = contribution {
            let section = stmt.section.clone();
            self.sections.push(&section, stmt, size);
        }
        Ok(())
    }

    fn define_label(&mut self, name: &str, row: u32, section: &str) -> Result<(), Error> {
        let offset = self.sections.offset(section);
        if let Some(entry) = self.symtab.get_mut(name) {
            match &entry.section {
                None => {
                    entry.value = offset;
                    entry.section = Some(section.to_string());
                }
                Some(existing) if existing == section => {}
                Some(_) => {
                    return Err(Error::resolve(
                        row,
                        AsmError::DuplicateSymbol(name.to_string()),
                    ));
                }
            }
        } else {
            let name_idx = self.strtab.resolve(name);
            self.symtab.upsert(
                name,
                SymEntry {
                    name: name_idx,
                    value: offset,
                    size: 0,
                    info: st_info(STB_LOCAL, STT_NOTYPE),
                    other: 0,
                    shndx: SHN_UNDEF,
                    section: Some(section.to_string()),
                },
            );
        }
        Ok(())
    }

    fn apply_directive(&mut self, dir: &Directive, section: &str) {
        match dir.name {
            ".text" | ".data" | ".rodata" | ".bss" | ".section" => {
                // `section` already names the switched-to section.
                self.enter_section(section);
            }
            ".align" => {
                if let Some(n) = dir.int_arg(0) {
                    if let Some(hdr) = self.shdr.get_mut(section) {
                        hdr.addralign = if (0..32).contains(&n) { 1 << n } else { 0 };
                    }
                }
            }
            ".file" => {
                if let Some(name) = dir.str_arg(0) {
                    let name_idx = self.strtab.resolve(name);
                    self.symtab.upsert(
                        name,
                        SymEntry {
                            name: name_idx,
                            value: 0,
                            size: 0,
                            info: st_info(STB_LOCAL, STT_FILE),
                            other: 0,
                            shndx: SHN_ABS,
                            section: None,
                        },
                    );
                }
            }
            ".globl" | ".global" => self.set_binding(dir, STB_GLOBAL),
            ".local" => self.set_binding(dir, STB_LOCAL),
            ".equ" => {
                if let (Some(name), Some(value)) = (dir.str_arg(0), dir.int_arg(1)) {
                    if let Some(entry) = self.symtab.get_mut(name) {
                        entry.value = value as u32;
                    } else {
                        let name_idx = self.strtab.resolve(name);
                        self.symtab.upsert(
                            name,
                            SymEntry {
                                name: name_idx,
                                value: value as u32,
                                size: 0,
                                info: st_info(STB_LOCAL, STT_NOTYPE),
                                other: 0,
                                shndx: SHN_ABS,
                                section: None,
                            },
                        );
                    }
                }
            }
            ".type" => {
                if let (Some(name), Some(arg)) = (dir.str_arg(0), dir.args.get(1)) {
                    let typ = match symbol_type_for(arg) {
                        Some(typ) => typ,
                        None => return,
                    };
                    if let Some(entry) = self.symtab.get_mut(name) {
                        entry.info = st_info(st_bind(entry.info), typ);
                    } else {
                        let name_idx = self.strtab.resolve(name);
                        self.symtab.upsert(
                            name,
                            SymEntry {
                                name: name_idx,
                                value: 0,
                                size: 0,
                                info: st_info(STB_LOCAL, typ),
                                other: 0,
                                shndx: SHN_UNDEF,
                                section: None,
                            },
                        );
                    }
                }
            }
            // Recognized without resolver effect: .comm/.common, .ident,
            // .size, .macro/.endm, .attribute, .variant_cc; the data
            // directives contribute through their buckets.
            _ => {}
        }
    }

    fn set_binding(&mut self, dir: &Directive, bind: u8) {
        if let Some(name) = dir.str_arg(0) {
            if let Some(entry) = self.symtab.get_mut(name) {
                entry.info = st_info(bind, st_type(entry.info));
            } else {
                let name_idx = self.strtab.resolve(name);
                self.symtab.upsert(
                    name,
                    SymEntry {
                        name: name_idx,
                        value: 0,
                        size: 0,
                        info: st_info(bind, STT_NOTYPE),
                        other: 0,
                        shndx: SHN_UNDEF,
                        section: None,
                    },
                );
            }
        }
    }

    fn enter_section(&mut self, name: &str) {
        if name == ".rodata" && !self.shdr.contains(".rodata") {
            let sh_name = self.shstrtab.resolve(".rodata");
            self.shdr.add(
                ".rodata",
                SectionHeader {
                    name: sh_name,
                    shtype: SHT_PROGBITS,
                    flags: SHF_ALLOC,
                    addralign: 4,
                    ..SectionHeader::default()
                },
            );
        }
        if !self.symtab.contains(name) {
            let shndx = self.shdr.index_of(name).unwrap_or(SHN_UNDEF);
            self.symtab.upsert(
                name,
                SymEntry {
                    name: 0,
                    value: 0,
                    size: 0,
                    info: st_info(STB_LOCAL, STT_SECTION),
                    other: 0,
                    shndx,
                    section: None,
                },
            );
        }
    }

    /// Pass 2: walk `.text` in order, interning undefined operand symbols
    /// and emitting the relocation pair for every symbolic operand.
    fn resolve_text(&mut self) {
        let stmts = match self.sections.entries.get_mut(".text") {
            Some(bucket) => std::mem::replace(&mut bucket.stmts, Vec::new()),
            None => Vec::new(),
        };

        let mut offset = 0u32;
        for stmt in &stmts {
            let ins = match &stmt.body {
                Some(StmtBody::Instruction(ins)) => ins,
                _ => continue,
            };
            if let Some(sym) = ins.symbol_operand() {
                let idx = match self.symtab.index_of(sym) {
                    Some(idx) => idx,
                    None => {
                        let name_idx = self.strtab.resolve(sym);
                        self.symtab.upsert(
                            sym,
                            SymEntry {
                                name: name_idx,
                                value: 0,
                                size: 0,
                                info: st_info(STB_GLOBAL, STT_NOTYPE),
                                other: 0,
                                shndx: SHN_UNDEF,
                                section: None,
                            },
                        )
                    }
                };
                let typ = reloc_type_for(ins.spec.format, ins.rel_func);
                self.rela.push(RelaEntry::new(offset, idx as u32, typ));
                self.rela.push(RelaEntry::new(offset, 0, RelocType::Relax));
            }
            offset += 4;
        }

        if let Some(bucket) = self.sections.entries.get_mut(".text") {
            bucket.stmts = stmts;
        }
    }

    /// Replace every transient section tag with the section's header
    /// index.
    fn finalize_symbols(&mut self) {
        let shdr = &self.shdr;
        for entry in self.symtab.entries_mut() {
            if let Some(section) = &entry.section {
                entry.shndx = shdr.index_of(section).unwrap_or(SHN_UNDEF);
            }
        }
    }

    /// Assign section sizes and file offsets, synthesize `.rela.text`,
    /// and finalize the ELF header.
    fn layout(&mut self) {
        if !self.rela.is_empty() {
            let name = self.shstrtab.resolve(".rela.text");
            let symtab_idx = u32::from(self.shdr.index_of(".symtab").unwrap_or(0));
            let text_idx = u32::from(self.shdr.index_of(".text").unwrap_or(0));
            self.shdr.add(
                ".rela.text",
                SectionHeader {
                    name,
                    shtype: SHT_RELA,
                    flags: SHF_ALLOC | SHF_EXECINSTR,
                    link: symtab_idx,
                    info: text_idx,
                    addralign: 4,
                    entsize: RELA_ENTSIZE,
                    ..SectionHeader::default()
                },
            );
        }

        for &name in &[".text", ".data", ".bss", ".rodata"] {
            let size = self.sections.offset(name);
            if let Some(hdr) = self.shdr.get_mut(name) {
                hdr.size = size;
            }
        }
        if let Some(hdr) = self.shdr.get_mut(".riscv.attributes") {
            hdr.size = attrs::ATTRIBUTES_SIZE;
        }
        let symtab_size = self.symtab.len() as u32 * SYM_ENTSIZE;
        let strtab_link = u32::from(self.shdr.index_of(".strtab").unwrap_or(0));
        let first_non_local = self.symtab.first_non_local() as u32;
        if let Some(hdr) = self.shdr.get_mut(".symtab") {
            hdr.size = symtab_size;
            hdr.link = strtab_link;
            hdr.info = first_non_local;
        }
        let strtab_size = self.strtab.len();
        if let Some(hdr) = self.shdr.get_mut(".strtab") {
            hdr.size = strtab_size;
        }
        let shstrtab_size = self.shstrtab.len();
        if let Some(hdr) = self.shdr.get_mut(".shstrtab") {
            hdr.size = shstrtab_size;
        }
        let rela_size = self.rela.len() as u32 * RELA_ENTSIZE;
        if let Some(hdr) = self.shdr.get_mut(".rela.text") {
            hdr.size = rela_size;
        }

        let mut offset = FIRST_SECTION_OFFSET;
        for &name in FILE_ORDER {
            if let Some(hdr) = self.shdr.get_mut(name) {
                hdr.offset = offset;
                offset += hdr.size;
            }
        }

        self.ehdr.shoff = offset;
        self.ehdr.shnum = self.shdr.len() as u16;
        self.ehdr.shstrndx = self.shdr.index_of(".shstrtab").unwrap_or(0);
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symtab
    }

    pub fn section_headers(&self) -> &SectionHeaderTable {
        &self.shdr
    }

    pub fn relocations(&self) -> &[RelaEntry] {
        &self.rela
    }

    pub fn bucket(&self, name: &str) -> Option<&SectionBucket> {
        self.sections.get(name)
    }
}

fn is_data_section(name: &str) -> bool {
    matches!(name, ".data" | ".bss" | ".rodata")
}

/// Bytes a data directive contributes to its section, if it is one.
fn data_contribution(dir: &Directive) -> Option<u32> {
    match dir.name {
        ".byte" => Some(1),
        ".2byte" | ".half" | ".short" => Some(2),
        ".4byte" | ".word" | ".long" => Some(4),
        ".string" | ".asciz" => dir.str_arg(0).map(|s| s.len() as u32 + 1),
        ".zero" => dir.int_arg(0).map(|n| if n > 0 { n as u32 } else { 0 }),
        _ => None,
    }
}
