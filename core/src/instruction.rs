use std::fmt;

use crate::error::{Result, VmError};
use crate::opcode::{Field, KK, N, NNN, X, Y};
use crate::operations::{self, Flow, Peripherals};
use crate::state::State;

/// # Instructions
/// One variant per entry in the OPCODE_TABLE, carrying the operands decoded from the opcode.
/// Register operands are indices 0..=F; `kk` and `n` are immediates.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Instruction {
    Cls,
    Ret,
    Jump { addr: u16 },
    Call { addr: u16 },
    SkipEqImm { x: u8, kk: u8 },
    SkipNeImm { x: u8, kk: u8 },
    SkipEqReg { x: u8, y: u8 },
    LoadImm { x: u8, kk: u8 },
    AddImm { x: u8, kk: u8 },
    Move { x: u8, y: u8 },
    Or { x: u8, y: u8 },
    And { x: u8, y: u8 },
    Xor { x: u8, y: u8 },
    AddReg { x: u8, y: u8 },
    Sub { x: u8, y: u8 },
    Shr { x: u8, y: u8 },
    Subn { x: u8, y: u8 },
    Shl { x: u8, y: u8 },
    SkipNeReg { x: u8, y: u8 },
    LoadI { addr: u16 },
    JumpV0 { addr: u16 },
    Rand { x: u8, kk: u8 },
    Draw { x: u8, y: u8, n: u8 },
    SkipPressed { x: u8 },
    SkipReleased { x: u8 },
    LoadDelay { x: u8 },
    WaitKey { x: u8 },
    SetDelay { x: u8 },
    SetSound { x: u8 },
    AddI { x: u8 },
    LoadFont { x: u8 },
    Bcd { x: u8 },
    Store { x: u8 },
    Read { x: u8 },
}

/// A decode rule: an opcode selects this descriptor when `op & mask == pattern`.
/// The operand fields are extracted in order and handed to `build`.
pub struct Descriptor {
    pub mnemonic: &'static str,
    pub mask: u16,
    pub pattern: u16,
    pub operands: &'static [Field],
    build: fn(&[u16]) -> Instruction,
}

impl Descriptor {
    pub fn matches(&self, op: u16) -> bool {
        op & self.mask == self.pattern
    }

    fn instantiate(&self, op: u16) -> Instruction {
        let mut operands = [0; 3];
        for (slot, field) in operands.iter_mut().zip(self.operands) {
            *slot = field.extract(op);
        }
        (self.build)(&operands[..self.operands.len()])
    }
}

impl fmt::Debug for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Descriptor")
            .field("mnemonic", &self.mnemonic)
            .field("mask", &format_args!("{:#06X}", self.mask))
            .field("pattern", &format_args!("{:#06X}", self.pattern))
            .finish()
    }
}

fn reg(operand: u16) -> u8 {
    operand as u8
}

/// Every instruction the machine understands.
///
/// Descriptors are tried in order. Exact matches (no operands) come before the broader masks of
/// their category, and no opcode matches more than one entry. Keep it that way when adding to it.
#[rustfmt::skip]
pub static OPCODE_TABLE: [Descriptor; 34] = [
    Descriptor { mnemonic: "CLS", mask: 0xFFFF, pattern: 0x00E0, operands: &[], build: |_| Instruction::Cls },
    Descriptor { mnemonic: "RET", mask: 0xFFFF, pattern: 0x00EE, operands: &[], build: |_| Instruction::Ret },
    Descriptor { mnemonic: "JMP_NNN", mask: 0xF000, pattern: 0x1000, operands: &[NNN], build: |a| Instruction::Jump { addr: a[0] } },
    Descriptor { mnemonic: "CALL_NNN", mask: 0xF000, pattern: 0x2000, operands: &[NNN], build: |a| Instruction::Call { addr: a[0] } },
    Descriptor { mnemonic: "SE_VX_NN", mask: 0xF000, pattern: 0x3000, operands: &[X, KK], build: |a| Instruction::SkipEqImm { x: reg(a[0]), kk: a[1] as u8 } },
    Descriptor { mnemonic: "SNE_VX_NN", mask: 0xF000, pattern: 0x4000, operands: &[X, KK], build: |a| Instruction::SkipNeImm { x: reg(a[0]), kk: a[1] as u8 } },
    Descriptor { mnemonic: "SE_VX_VY", mask: 0xF000, pattern: 0x5000, operands: &[X, Y], build: |a| Instruction::SkipEqReg { x: reg(a[0]), y: reg(a[1]) } },
    Descriptor { mnemonic: "LD_VX_NN", mask: 0xF000, pattern: 0x6000, operands: &[X, KK], build: |a| Instruction::LoadImm { x: reg(a[0]), kk: a[1] as u8 } },
    Descriptor { mnemonic: "ADD_VX_NN", mask: 0xF000, pattern: 0x7000, operands: &[X, KK], build: |a| Instruction::AddImm { x: reg(a[0]), kk: a[1] as u8 } },
    Descriptor { mnemonic: "LD_VX_VY", mask: 0xF00F, pattern: 0x8000, operands: &[X, Y], build: |a| Instruction::Move { x: reg(a[0]), y: reg(a[1]) } },
    Descriptor { mnemonic: "OR_VX_VY", mask: 0xF00F, pattern: 0x8001, operands: &[X, Y], build: |a| Instruction::Or { x: reg(a[0]), y: reg(a[1]) } },
    Descriptor { mnemonic: "AND_VX_VY", mask: 0xF00F, pattern: 0x8002, operands: &[X, Y], build: |a| Instruction::And { x: reg(a[0]), y: reg(a[1]) } },
    Descriptor { mnemonic: "XOR_VX_VY", mask: 0xF00F, pattern: 0x8003, operands: &[X, Y], build: |a| Instruction::Xor { x: reg(a[0]), y: reg(a[1]) } },
    Descriptor { mnemonic: "ADD_VX_VY", mask: 0xF00F, pattern: 0x8004, operands: &[X, Y], build: |a| Instruction::AddReg { x: reg(a[0]), y: reg(a[1]) } },
    Descriptor { mnemonic: "SUB_VX_VY", mask: 0xF00F, pattern: 0x8005, operands: &[X, Y], build: |a| Instruction::Sub { x: reg(a[0]), y: reg(a[1]) } },
    Descriptor { mnemonic: "SHR_VX_{VY}", mask: 0xF00F, pattern: 0x8006, operands: &[X, Y], build: |a| Instruction::Shr { x: reg(a[0]), y: reg(a[1]) } },
    Descriptor { mnemonic: "SUBN_VX_VY", mask: 0xF00F, pattern: 0x8007, operands: &[X, Y], build: |a| Instruction::Subn { x: reg(a[0]), y: reg(a[1]) } },
    Descriptor { mnemonic: "SHL_VX_{VY}", mask: 0xF00F, pattern: 0x800E, operands: &[X, Y], build: |a| Instruction::Shl { x: reg(a[0]), y: reg(a[1]) } },
    Descriptor { mnemonic: "SNE_VX_VY", mask: 0xF00F, pattern: 0x9000, operands: &[X, Y], build: |a| Instruction::SkipNeReg { x: reg(a[0]), y: reg(a[1]) } },
    Descriptor { mnemonic: "LD_I_NNN", mask: 0xF000, pattern: 0xA000, operands: &[NNN], build: |a| Instruction::LoadI { addr: a[0] } },
    Descriptor { mnemonic: "JMP_V0_NNN", mask: 0xF000, pattern: 0xB000, operands: &[NNN], build: |a| Instruction::JumpV0 { addr: a[0] } },
    Descriptor { mnemonic: "RND_VX_NN", mask: 0xF000, pattern: 0xC000, operands: &[X, KK], build: |a| Instruction::Rand { x: reg(a[0]), kk: a[1] as u8 } },
    Descriptor { mnemonic: "DRW_VX_VY_N", mask: 0xF000, pattern: 0xD000, operands: &[X, Y, N], build: |a| Instruction::Draw { x: reg(a[0]), y: reg(a[1]), n: a[2] as u8 } },
    Descriptor { mnemonic: "SKP_VX", mask: 0xF0FF, pattern: 0xE09E, operands: &[X], build: |a| Instruction::SkipPressed { x: reg(a[0]) } },
    Descriptor { mnemonic: "SKNP_VX", mask: 0xF0FF, pattern: 0xE0A1, operands: &[X], build: |a| Instruction::SkipReleased { x: reg(a[0]) } },
    Descriptor { mnemonic: "LD_VX_DT", mask: 0xF0FF, pattern: 0xF007, operands: &[X], build: |a| Instruction::LoadDelay { x: reg(a[0]) } },
    Descriptor { mnemonic: "LD_VX_K", mask: 0xF0FF, pattern: 0xF00A, operands: &[X], build: |a| Instruction::WaitKey { x: reg(a[0]) } },
    Descriptor { mnemonic: "LD_DT_VX", mask: 0xF0FF, pattern: 0xF015, operands: &[X], build: |a| Instruction::SetDelay { x: reg(a[0]) } },
    Descriptor { mnemonic: "LD_ST_VX", mask: 0xF0FF, pattern: 0xF018, operands: &[X], build: |a| Instruction::SetSound { x: reg(a[0]) } },
    Descriptor { mnemonic: "ADD_I_VX", mask: 0xF0FF, pattern: 0xF01E, operands: &[X], build: |a| Instruction::AddI { x: reg(a[0]) } },
    Descriptor { mnemonic: "LD_F_VX", mask: 0xF0FF, pattern: 0xF029, operands: &[X], build: |a| Instruction::LoadFont { x: reg(a[0]) } },
    Descriptor { mnemonic: "LD_B_VX", mask: 0xF0FF, pattern: 0xF033, operands: &[X], build: |a| Instruction::Bcd { x: reg(a[0]) } },
    Descriptor { mnemonic: "LD_[I]_VX", mask: 0xF0FF, pattern: 0xF055, operands: &[X], build: |a| Instruction::Store { x: reg(a[0]) } },
    Descriptor { mnemonic: "LD_VX_[I]", mask: 0xF0FF, pattern: 0xF065, operands: &[X], build: |a| Instruction::Read { x: reg(a[0]) } },
];

/// Finds the descriptor an opcode selects, if any
pub fn descriptor(op: u16) -> Option<&'static Descriptor> {
    OPCODE_TABLE.iter().find(|d| d.matches(op))
}

/// Selects the correct Instruction for a given opcode
pub fn decode(op: u16) -> Result<Instruction> {
    descriptor(op)
        .map(|d| d.instantiate(op))
        .ok_or(VmError::UnrecognizedOpcode(op))
}

impl Instruction {
    /// Applies the instruction to `state`, including its effect on the pc
    pub(crate) fn execute(self, state: &mut State, io: &Peripherals) -> Result<Flow> {
        use operations::*;
        use Instruction::*;

        match self {
            Cls => clr(state, io),
            Ret => rts(state, io)?,
            Jump { addr } => jump(state, addr),
            Call { addr } => call(state, addr)?,
            SkipEqImm { x, kk } => ske(state, x, kk),
            SkipNeImm { x, kk } => skne(state, x, kk),
            SkipEqReg { x, y } => skre(state, x, y),
            LoadImm { x, kk } => load(state, x, kk),
            AddImm { x, kk } => add(state, x, kk),
            Move { x, y } => mv(state, x, y),
            Or { x, y } => or(state, x, y),
            And { x, y } => and(state, x, y),
            Xor { x, y } => xor(state, x, y),
            AddReg { x, y } => addr(state, x, y),
            Sub { x, y } => sub(state, x, y),
            Shr { x, .. } => shr(state, x),
            Subn { x, y } => subn(state, x, y),
            Shl { x, .. } => shl(state, io, x),
            SkipNeReg { x, y } => skrne(state, x, y),
            LoadI { addr } => loadi(state, addr),
            JumpV0 { addr } => jumpi(state, addr),
            Rand { x, kk } => rand(state, x, kk),
            Draw { x, y, n } => draw(state, io, x, y, n)?,
            SkipPressed { x } => skpr(state, io, x)?,
            SkipReleased { x } => skup(state, io, x)?,
            LoadDelay { x } => moved(state, x),
            WaitKey { x } => return Ok(keyd(state, io, x)),
            SetDelay { x } => loads(state, x),
            SetSound { x } => ld(state, x),
            AddI { x } => addi(state, x),
            LoadFont { x } => ldspr(state, x),
            Bcd { x } => bcd(state, x)?,
            Store { x } => stor(state, x)?,
            Read { x } => read(state, x)?,
        }
        Ok(Flow::Next)
    }
}

/// Disassembly in conventional CHIP-8 assembler syntax
impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Instruction::*;

        match *self {
            Cls => write!(f, "CLS"),
            Ret => write!(f, "RET"),
            Jump { addr } => write!(f, "JP {:#05X}", addr),
            Call { addr } => write!(f, "CALL {:#05X}", addr),
            SkipEqImm { x, kk } => write!(f, "SE V{:X}, {:#04X}", x, kk),
            SkipNeImm { x, kk } => write!(f, "SNE V{:X}, {:#04X}", x, kk),
            SkipEqReg { x, y } => write!(f, "SE V{:X}, V{:X}", x, y),
            LoadImm { x, kk } => write!(f, "LD V{:X}, {:#04X}", x, kk),
            AddImm { x, kk } => write!(f, "ADD V{:X}, {:#04X}", x, kk),
            Move { x, y } => write!(f, "LD V{:X}, V{:X}", x, y),
            Or { x, y } => write!(f, "OR V{:X}, V{:X}", x, y),
            And { x, y } => write!(f, "AND V{:X}, V{:X}", x, y),
            Xor { x, y } => write!(f, "XOR V{:X}, V{:X}", x, y),
            AddReg { x, y } => write!(f, "ADD V{:X}, V{:X}", x, y),
            Sub { x, y } => write!(f, "SUB V{:X}, V{:X}", x, y),
            Shr { x, y } => write!(f, "SHR V{:X} {{, V{:X}}}", x, y),
            Subn { x, y } => write!(f, "SUBN V{:X}, V{:X}", x, y),
            Shl { x, y } => write!(f, "SHL V{:X} {{, V{:X}}}", x, y),
            SkipNeReg { x, y } => write!(f, "SNE V{:X}, V{:X}", x, y),
            LoadI { addr } => write!(f, "LD I, {:#05X}", addr),
            JumpV0 { addr } => write!(f, "JP V0, {:#05X}", addr),
            Rand { x, kk } => write!(f, "RND V{:X}, {:#04X}", x, kk),
            Draw { x, y, n } => write!(f, "DRW V{:X}, V{:X}, {}", x, y, n),
            SkipPressed { x } => write!(f, "SKP V{:X}", x),
            SkipReleased { x } => write!(f, "SKNP V{:X}", x),
            LoadDelay { x } => write!(f, "LD V{:X}, DT", x),
            WaitKey { x } => write!(f, "LD V{:X}, K", x),
            SetDelay { x } => write!(f, "LD DT, V{:X}", x),
            SetSound { x } => write!(f, "LD ST, V{:X}", x),
            AddI { x } => write!(f, "ADD I, V{:X}", x),
            LoadFont { x } => write!(f, "LD F, V{:X}", x),
            Bcd { x } => write!(f, "LD B, V{:X}", x),
            Store { x } => write!(f, "LD [I], V{:X}", x),
            Read { x } => write!(f, "LD V{:X}, [I]", x),
        }
    }
}
