//! RV32I instruction word encoding.
//!
//! Each statement in `.text` becomes one little-endian 32-bit word. A
//! symbolic operand contributes the symbol's current value (zero for an
//! undefined external); the linker patches the final value through the
//! relocation entry emitted alongside.

use super::symtab::SymbolTable;
use crate::parse::{Format, Instruction, OpSpec, Operand};

const OPCODE_LOAD: u32 = 0b0000011;
const OPCODE_OP_IMM: u32 = 0b0010011;

fn operand_value(operand: &Operand, symtab: &SymbolTable) -> i64 {
    match operand {
        Operand::Reg(r) => i64::from(*r),
        Operand::Imm(v) => *v,
        Operand::Sym(name) => symtab.get(name).map(|e| i64::from(e.value)).unwrap_or(0),
    }
}

/// Encode one instruction against the current symbol table.
pub fn encode_instruction(ins: &Instruction, symtab: &SymbolTable) -> u32 {
    let spec = ins.spec;
    let val = |i: usize| operand_value(&ins.operands[i], symtab);

    match spec.format {
        Format::R => encode_r(spec, val(0) as u32, val(1) as u32, val(2) as u32),
        Format::I => {
            if ins.operands.is_empty() {
                // ecall/ebreak; ebreak is distinguished by immediate 1.
                let imm = if spec.name == "ebreak" { 1 } else { 0 };
                encode_i(spec, 0, 0, imm)
            } else if spec.opcode == OPCODE_LOAD {
                // Loads are written `rd, imm(rs1)` and parsed in that
                // order; the base register goes into the rs1 field.
                encode_i(spec, val(0) as u32, val(2) as u32, val(1))
            } else if spec.opcode == OPCODE_OP_IMM && (spec.funct3 == 0b001 || spec.funct3 == 0b101) {
                // Shifts carry funct7 above a 5-bit shift amount.
                encode_r(spec, val(0) as u32, val(1) as u32, val(2) as u32 & 0x1f)
            } else {
                encode_i(spec, val(0) as u32, val(1) as u32, val(2))
            }
        }
        Format::S => encode_s(spec, val(0) as u32, val(2) as u32, val(1)),
        Format::B => encode_b(spec, val(0) as u32, val(1) as u32, val(2)),
        Format::U => encode_u(spec, val(0) as u32, val(1)),
        Format::J => encode_j(spec, val(0) as u32, val(1)),
    }
}

pub fn encode_r(spec: &OpSpec, rd: u32, rs1: u32, rs2: u32) -> u32 {
    spec.funct7 << 25
        | rs2 << 20
        | rs1 << 15
        | spec.funct3 << 12
        | rd << 7
        | spec.opcode
}

pub fn encode_i(spec: &OpSpec, rd: u32, rs1: u32, imm: i64) -> u32 {
    (imm as u32 & 0xfff) << 20 | rs1 << 15 | spec.funct3 << 12 | rd << 7 | spec.opcode
}

pub fn encode_s(spec: &OpSpec, rs1: u32, rs2: u32, imm: i64) -> u32 {
    let imm = imm as u32;
    ((imm >> 5) & 0x7f) << 25
        | rs2 << 20
        | rs1 << 15
        | spec.funct3 << 12
        | (imm & 0x1f) << 7
        | spec.opcode
}

pub fn encode_b(spec: &OpSpec, rs1: u32, rs2: u32, imm: i64) -> u32 {
    let imm = imm as u32;
    ((imm >> 12) & 0x1) << 31
        | ((imm >> 5) & 0x3f) << 25
        | rs2 << 20
        | rs1 << 15
        | spec.funct3 << 12
        | ((imm >> 1) & 0xf) << 8
        | ((imm >> 11) & 0x1) << 7
        | spec.opcode
}

pub fn encode_u(spec: &OpSpec, rd: u32, imm: i64) -> u32 {
    (imm as u32 & 0xfffff) << 12 | rd << 7 | spec.opcode
}

pub fn encode_j(spec: &OpSpec, rd: u32, imm: i64) -> u32 {
    let imm = imm as u32;
    ((imm >> 20) & 0x1) << 31
        | ((imm >> 1) & 0x3ff) << 21
        | ((imm >> 11) & 0x1) << 20
        | ((imm >> 12) & 0xff) << 12
        | rd << 7
        | spec.opcode
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::{parse_line, StmtBody, INITIAL_SECTION};

    fn word(line: &str) -> u32 {
        let mut section = INITIAL_SECTION.to_string();
        let stmt = parse_line(line, 1, &mut section).unwrap().unwrap();
        let ins = match stmt.body {
            Some(StmtBody::Instruction(ins)) => ins,
            other => panic!("expected instruction, got {:?}", other),
        };
        encode_instruction(&ins, &SymbolTable::new())
    }

    #[test]
    fn r_format() {
        assert_eq!(word("add a0, a1, a2"), 0x00c5_8533);
        assert_eq!(word("sub a0, a1, a2"), 0x40c5_8533);
        assert_eq!(word("and t0, t1, t2"), 0x0073_72b3);
        assert_eq!(word("sra a0, a1, a2"), 0x40c5_d533);
    }

    #[test]
    fn i_format_arithmetic() {
        assert_eq!(word("addi a0, a1, 42"), 0x02a5_8513);
        assert_eq!(word("addi a0, a0, -1"), 0xfff5_0513);
        assert_eq!(word("sltiu a0, a1, 1"), 0x0015_b513);
    }

    #[test]
    fn i_format_shifts_carry_funct7() {
        assert_eq!(word("slli a0, a1, 3"), 0x0035_9513);
        assert_eq!(word("srli a0, a1, 2"), 0x0025_d513);
        assert_eq!(word("srai a0, a1, 2"), 0x4025_d513);
    }

    // One test per load mnemonic: the rd/imm/rs1 reorder is the classic
    // mistake here.
    #[test]
    fn load_lb() {
        assert_eq!(word("lb a0, 0(a1)"), 0x0005_8503);
    }

    #[test]
    fn load_lh() {
        assert_eq!(word("lh a0, 2(a1)"), 0x0025_9503);
    }

    #[test]
    fn load_lw() {
        assert_eq!(word("lw a0, 4(sp)"), 0x0041_2503);
    }

    #[test]
    fn load_lbu() {
        assert_eq!(word("lbu a0, 1(a1)"), 0x0015_c503);
    }

    #[test]
    fn load_lhu() {
        assert_eq!(word("lhu a0, 2(a1)"), 0x0025_d503);
    }

    #[test]
    fn store_sb() {
        assert_eq!(word("sb a0, 0(sp)"), 0x0025_0023);
    }

    #[test]
    fn store_sh() {
        assert_eq!(word("sh a0, 2(sp)"), 0x0025_1123);
    }

    #[test]
    fn store_sw() {
        assert_eq!(word("sw a0, 8(sp)"), 0x0025_2423);
    }

    #[test]
    fn b_format() {
        assert_eq!(word("beq a0, a1, 0"), 0x00b5_0063);
        assert_eq!(word("beq a0, a1, 8"), 0x00b5_0463);
        assert_eq!(word("bne a0, a1, 0"), 0x00b5_1063);
    }

    #[test]
    fn u_format() {
        assert_eq!(word("lui a0, 0x12345"), 0x1234_5537);
        assert_eq!(word("auipc a0, 0x12345"), 0x1234_5517);
    }

    #[test]
    fn j_format() {
        assert_eq!(word("jal ra, 0"), 0x0000_00ef);
        assert_eq!(word("jal ra, 0x800"), 0x0010_00ef);
        assert_eq!(word("jalr ra, a0, 0"), 0x0005_00e7);
    }

    #[test]
    fn environment_calls() {
        assert_eq!(word("ecall"), 0x0000_0073);
        assert_eq!(word("ebreak"), 0x0010_0073);
    }

    #[test]
    fn symbol_operand_uses_symbol_value() {
        use super::super::symtab::{st_info, SymEntry, SymbolTable, SHN_ABS, STB_LOCAL, STT_NOTYPE};

        let mut symtab = SymbolTable::new();
        symtab.upsert(
            "LOOPS",
            SymEntry {
                name: 0,
                value: 42,
                size: 0,
                info: st_info(STB_LOCAL, STT_NOTYPE),
                other: 0,
                shndx: SHN_ABS,
                section: None,
            },
        );

        let mut section = INITIAL_SECTION.to_string();
        let stmt = parse_line("addi a0, a1, LOOPS", 1, &mut section)
            .unwrap()
            .unwrap();
        let ins = match stmt.body {
            Some(StmtBody::Instruction(ins)) => ins,
            other => panic!("expected instruction, got {:?}", other),
        };
        assert_eq!(encode_instruction(&ins, &symtab), 0x02a5_8513);
    }
}
