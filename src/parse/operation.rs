//! RV32I mnemonic table and instruction operand parsing.
//!
//! Each mnemonic maps to its format, its operand slot kinds, and the
//! fixed opcode/funct3/funct7 fields used later by the encoder, so the
//! parser and the encoder share one table.

use super::{parse_int, Cursor};
use crate::error::AsmError;

/// Operand slot kinds, combined as a bitmask per slot.
pub const REG: u8 = 1 << 0;
pub const IMM: u8 = 1 << 1;
pub const LAB: u8 = 1 << 2;

/// The six RV32I instruction formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    R,
    I,
    S,
    B,
    U,
    J,
}

/// Everything the assembler knows about one mnemonic.
#[derive(Debug)]
pub struct OpSpec {
    pub name: &'static str,
    pub format: Format,
    pub slots: &'static [u8],
    pub opcode: u32,
    pub funct3: u32,
    pub funct7: u32,
}

const R3: &[u8] = &[REG, REG, REG];
const RRI: &[u8] = &[REG, REG, IMM];
const RRIL: &[u8] = &[REG, REG, IMM | LAB];
const RILR: &[u8] = &[REG, IMM | LAB, REG];
const RIL: &[u8] = &[REG, IMM | LAB];
const NONE: &[u8] = &[];

#[rustfmt::skip]
const OPCODES: &[OpSpec] = &[
    // R format
    OpSpec { name: "add",  format: Format::R, slots: R3,   opcode: 0b0110011, funct3: 0b000, funct7: 0b0000000 },
    OpSpec { name: "sub",  format: Format::R, slots: R3,   opcode: 0b0110011, funct3: 0b000, funct7: 0b0100000 },
    OpSpec { name: "xor",  format: Format::R, slots: R3,   opcode: 0b0110011, funct3: 0b100, funct7: 0b0000000 },
    OpSpec { name: "or",   format: Format::R, slots: R3,   opcode: 0b0110011, funct3: 0b110, funct7: 0b0000000 },
    OpSpec { name: "and",  format: Format::R, slots: R3,   opcode: 0b0110011, funct3: 0b111, funct7: 0b0000000 },
    OpSpec { name: "sll",  format: Format::R, slots: R3,   opcode: 0b0110011, funct3: 0b001, funct7: 0b0000000 },
    OpSpec { name: "srl",  format: Format::R, slots: R3,   opcode: 0b0110011, funct3: 0b101, funct7: 0b0000000 },
    OpSpec { name: "sra",  format: Format::R, slots: R3,   opcode: 0b0110011, funct3: 0b101, funct7: 0b0100000 },
    OpSpec { name: "slt",  format: Format::R, slots: R3,   opcode: 0b0110011, funct3: 0b010, funct7: 0b0000000 },
    OpSpec { name: "sltu", format: Format::R, slots: R3,   opcode: 0b0110011, funct3: 0b011, funct7: 0b0000000 },
    // I format, register-immediate arithmetic
    OpSpec { name: "addi",  format: Format::I, slots: RRIL, opcode: 0b0010011, funct3: 0b000, funct7: 0 },
    OpSpec { name: "xori",  format: Format::I, slots: RRIL, opcode: 0b0010011, funct3: 0b100, funct7: 0 },
    OpSpec { name: "ori",   format: Format::I, slots: RRIL, opcode: 0b0010011, funct3: 0b110, funct7: 0 },
    OpSpec { name: "andi",  format: Format::I, slots: RRIL, opcode: 0b0010011, funct3: 0b111, funct7: 0 },
    OpSpec { name: "slli",  format: Format::I, slots: RRI,  opcode: 0b0010011, funct3: 0b001, funct7: 0b0000000 },
    OpSpec { name: "srli",  format: Format::I, slots: RRI,  opcode: 0b0010011, funct3: 0b101, funct7: 0b0000000 },
    OpSpec { name: "srai",  format: Format::I, slots: RRI,  opcode: 0b0010011, funct3: 0b101, funct7: 0b0100000 },
    OpSpec { name: "slti",  format: Format::I, slots: RRIL, opcode: 0b0010011, funct3: 0b010, funct7: 0 },
    OpSpec { name: "sltiu", format: Format::I, slots: RRIL, opcode: 0b0010011, funct3: 0b011, funct7: 0 },
    // I format, loads: written `rd, imm(rs1)`, parsed (rd, imm, rs1)
    OpSpec { name: "lb",  format: Format::I, slots: RILR, opcode: 0b0000011, funct3: 0b000, funct7: 0 },
    OpSpec { name: "lh",  format: Format::I, slots: RILR, opcode: 0b0000011, funct3: 0b001, funct7: 0 },
    OpSpec { name: "lw",  format: Format::I, slots: RILR, opcode: 0b0000011, funct3: 0b010, funct7: 0 },
    OpSpec { name: "lbu", format: Format::I, slots: RILR, opcode: 0b0000011, funct3: 0b100, funct7: 0 },
    OpSpec { name: "lhu", format: Format::I, slots: RILR, opcode: 0b0000011, funct3: 0b101, funct7: 0 },
    // I format, other
    OpSpec { name: "jalr",   format: Format::I, slots: RRIL, opcode: 0b1100111, funct3: 0b000, funct7: 0 },
    OpSpec { name: "ecall",  format: Format::I, slots: NONE, opcode: 0b1110011, funct3: 0b000, funct7: 0 },
    OpSpec { name: "ebreak", format: Format::I, slots: NONE, opcode: 0b1110011, funct3: 0b000, funct7: 0 },
    // S format: written `rs1, imm(rs2)`, parsed (rs1, imm, rs2)
    OpSpec { name: "sb", format: Format::S, slots: RILR, opcode: 0b0100011, funct3: 0b000, funct7: 0 },
    OpSpec { name: "sh", format: Format::S, slots: RILR, opcode: 0b0100011, funct3: 0b001, funct7: 0 },
    OpSpec { name: "sw", format: Format::S, slots: RILR, opcode: 0b0100011, funct3: 0b010, funct7: 0 },
    // B format
    OpSpec { name: "beq",  format: Format::B, slots: RRIL, opcode: 0b1100011, funct3: 0b000, funct7: 0 },
    OpSpec { name: "bne",  format: Format::B, slots: RRIL, opcode: 0b1100011, funct3: 0b001, funct7: 0 },
    OpSpec { name: "blt",  format: Format::B, slots: RRIL, opcode: 0b1100011, funct3: 0b100, funct7: 0 },
    OpSpec { name: "bge",  format: Format::B, slots: RRIL, opcode: 0b1100011, funct3: 0b101, funct7: 0 },
    OpSpec { name: "bltu", format: Format::B, slots: RRIL, opcode: 0b1100011, funct3: 0b110, funct7: 0 },
    OpSpec { name: "bgeu", format: Format::B, slots: RRIL, opcode: 0b1100011, funct3: 0b111, funct7: 0 },
    // U format
    OpSpec { name: "lui",   format: Format::U, slots: RIL, opcode: 0b0110111, funct3: 0, funct7: 0 },
    OpSpec { name: "auipc", format: Format::U, slots: RIL, opcode: 0b0010111, funct3: 0, funct7: 0 },
    // J format
    OpSpec { name: "jal", format: Format::J, slots: RIL, opcode: 0b1101111, funct3: 0, funct7: 0 },
];

pub fn lookup(mnemonic: &str) -> Option<&'static OpSpec> {
    OPCODES.iter().find(|spec| spec.name == mnemonic)
}

/// A parsed instruction operand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    Reg(u8),
    Imm(i64),
    Sym(String),
}

/// Relocation modifier written as `%name(symbol)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelFunc {
    Hi,
    Lo,
    PcrelHi,
    PcrelLo,
}

/// One instruction statement.
#[derive(Debug, Clone)]
pub struct Instruction {
    pub spec: &'static OpSpec,
    pub operands: Vec<Operand>,
    pub rel_func: Option<RelFunc>,
}

impl Instruction {
    pub fn mnemonic(&self) -> &'static str {
        self.spec.name
    }

    /// The symbol named by a LAB-capable slot, if any.
    pub fn symbol_operand(&self) -> Option<&str> {
        for (slot, operand) in self.spec.slots.iter().zip(self.operands.iter()) {
            if slot & LAB != 0 {
                if let Operand::Sym(name) = operand {
                    return Some(name);
                }
            }
        }
        None
    }
}

/// Map a register name (`x0..x31` or ABI alias) to its number.
pub fn register_number(name: &str) -> Option<u8> {
    let n = match name {
        "x0" | "zero" => 0,
        "x1" | "ra" => 1,
        "x2" | "sp" => 2,
        "x3" | "gp" => 3,
        "x4" | "tp" => 4,
        "x5" | "t0" => 5,
        "x6" | "t1" => 6,
        "x7" | "t2" => 7,
        "x8" | "s0" | "fp" => 8,
        "x9" | "s1" => 9,
        "x10" | "a0" => 10,
        "x11" | "a1" => 11,
        "x12" | "a2" => 12,
        "x13" | "a3" => 13,
        "x14" | "a4" => 14,
        "x15" | "a5" => 15,
        "x16" | "a6" => 16,
        "x17" | "a7" => 17,
        "x18" | "s2" => 18,
        "x19" | "s3" => 19,
        "x20" | "s4" => 20,
        "x21" | "s5" => 21,
        "x22" | "s6" => 22,
        "x23" | "s7" => 23,
        "x24" | "s8" => 24,
        "x25" | "s9" => 25,
        "x26" | "s10" => 26,
        "x27" | "s11" => 27,
        "x28" | "t3" => 28,
        "x29" | "t4" => 29,
        "x30" | "t5" => 30,
        "x31" | "t6" => 31,
        _ => return None,
    };
    Some(n)
}

fn rel_func_for(spec: &OpSpec, token: &str) -> Option<RelFunc> {
    match (spec.format, token) {
        (Format::U, "%hi") => Some(RelFunc::Hi),
        (Format::U, "%pcrel_hi") => Some(RelFunc::PcrelHi),
        (Format::I, "%lo") | (Format::S, "%lo") => Some(RelFunc::Lo),
        (Format::I, "%pcrel_lo") | (Format::S, "%pcrel_lo") => Some(RelFunc::PcrelLo),
        _ => None,
    }
}

/// Parse the operand list for `spec` from the rest of the line.
pub(crate) fn parse_operation(
    spec: &'static OpSpec,
    cur: &mut Cursor<'_>,
) -> Result<Instruction, AsmError> {
    let mut operands = Vec::with_capacity(spec.slots.len());
    let mut rel_func = None;
    let mut slot_idx = 0;

    cur.skip_separators();
    while !cur.at_eof() && slot_idx < spec.slots.len() {
        let tok = cur.next_operand();
        let slot = spec.slots[slot_idx];

        let operand = if let Some(reg) = register_number(&tok) {
            if slot & REG == 0 {
                return Err(AsmError::IllegalOperand);
            }
            Operand::Reg(reg)
        } else if let Some(value) = parse_int(&tok) {
            if slot & IMM == 0 {
                return Err(AsmError::IllegalOperand);
            }
            Operand::Imm(value)
        } else {
            if slot & LAB == 0 {
                return Err(AsmError::IllegalOperand);
            }
            if tok.starts_with('%') {
                // Relocation modifier; the operand itself follows inside
                // the parentheses.
                rel_func = Some(rel_func_for(spec, &tok).ok_or(AsmError::IllegalOperand)?);
                cur.skip_separators();
                continue;
            }
            Operand::Sym(tok)
        };

        operands.push(operand);
        slot_idx += 1;
        cur.skip_separators();
    }

    if slot_idx != spec.slots.len() {
        return Err(AsmError::IllegalOperand);
    }
    if !cur.at_eof() {
        return Err(AsmError::Junk(cur.peek()));
    }

    Ok(Instruction {
        spec,
        operands,
        rel_func,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_mnemonic_is_unique() {
        for (i, a) in OPCODES.iter().enumerate() {
            for b in &OPCODES[i + 1..] {
                assert_ne!(a.name, b.name);
            }
        }
    }

    #[test]
    fn lookup_finds_all_formats() {
        assert_eq!(lookup("add").unwrap().format, Format::R);
        assert_eq!(lookup("lw").unwrap().format, Format::I);
        assert_eq!(lookup("sw").unwrap().format, Format::S);
        assert_eq!(lookup("beq").unwrap().format, Format::B);
        assert_eq!(lookup("lui").unwrap().format, Format::U);
        assert_eq!(lookup("jal").unwrap().format, Format::J);
        assert!(lookup("mul").is_none());
    }

    #[test]
    fn register_aliases() {
        assert_eq!(register_number("zero"), Some(0));
        assert_eq!(register_number("x31"), Some(31));
        assert_eq!(register_number("fp"), register_number("s0"));
        assert_eq!(register_number("a7"), Some(17));
        assert_eq!(register_number("x32"), None);
        assert_eq!(register_number("b0"), None);
    }

    #[test]
    fn modifier_placement() {
        let lui = lookup("lui").unwrap();
        assert_eq!(rel_func_for(lui, "%hi"), Some(RelFunc::Hi));
        assert_eq!(rel_func_for(lui, "%lo"), None);
        let addi = lookup("addi").unwrap();
        assert_eq!(rel_func_for(addi, "%lo"), Some(RelFunc::Lo));
        assert_eq!(rel_func_for(addi, "%pcrel_hi"), None);
        let sw = lookup("sw").unwrap();
        assert_eq!(rel_func_for(sw, "%pcrel_lo"), Some(RelFunc::PcrelLo));
    }
}
