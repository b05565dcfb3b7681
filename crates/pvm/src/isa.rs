//! PVM instruction codec: a compact format of one opcode byte followed by a packed operand
//! block whose shape depends on the opcode's instruction-type class. Semantics belong to the
//! PVM itself, treated here as an external contract; this module only guarantees that
//! `decode(encode(inst, args)) == (inst, args)` once `no_of_bytes_to_skip` is re-materialised.

use thiserror::Error;

/// Registers are clamped to `0..=12` on decode: there are 13 registers.
pub const NUM_REGISTERS: u8 = 13;
const MAX_REG_INDEX: u8 = NUM_REGISTERS - 1;

/// The closed set of instruction-type classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstructionClass {
    NoArgs,
    OneImm,
    OneRegOneImm,
    TwoReg,
    ThreeReg,
    TwoRegTwoImm,
    OneRegOneExtImm,
}

/// The closed opcode set this sandbox recognises. Each opcode belongs to
/// exactly one [`InstructionClass`]; opcode numbering is this crate's own
/// (the wire value, not a claim about any external PVM's numbering).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    Trap = 0,
    Fallthrough = 1,
    Ecalli = 2,
    Jump = 3,
    LoadImm = 4,
    Move = 5,
    Sbrk = 6,
    Add = 7,
    Sub = 8,
    Mul = 9,
    And = 10,
    Or = 11,
    Xor = 12,
    BranchEqImm = 13,
    StoreImmIndU32 = 14,
    LoadImm64 = 15,
}

impl Opcode {
    pub fn from_u8(byte: u8) -> Option<Self> {
        Some(match byte {
            0 => Self::Trap,
            1 => Self::Fallthrough,
            2 => Self::Ecalli,
            3 => Self::Jump,
            4 => Self::LoadImm,
            5 => Self::Move,
            6 => Self::Sbrk,
            7 => Self::Add,
            8 => Self::Sub,
            9 => Self::Mul,
            10 => Self::And,
            11 => Self::Or,
            12 => Self::Xor,
            13 => Self::BranchEqImm,
            14 => Self::StoreImmIndU32,
            15 => Self::LoadImm64,
            _ => return None,
        })
    }

    pub fn class(self) -> InstructionClass {
        match self {
            Self::Trap | Self::Fallthrough => InstructionClass::NoArgs,
            Self::Ecalli | Self::Jump => InstructionClass::OneImm,
            Self::LoadImm => InstructionClass::OneRegOneImm,
            Self::Move | Self::Sbrk => InstructionClass::TwoReg,
            Self::Add | Self::Sub | Self::Mul | Self::And | Self::Or | Self::Xor => InstructionClass::ThreeReg,
            Self::BranchEqImm | Self::StoreImmIndU32 => InstructionClass::TwoRegTwoImm,
            Self::LoadImm64 => InstructionClass::OneRegOneExtImm,
        }
    }
}

/// Decoded operand block, one variant per [`InstructionClass`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstructionArgs {
    NoArgs,
    OneImm { imm: i64 },
    OneRegOneImm { reg: u8, imm: i64 },
    TwoReg { reg_a: u8, reg_b: u8 },
    ThreeReg { reg_a: u8, reg_b: u8, reg_c: u8 },
    TwoRegTwoImm { reg_a: u8, reg_b: u8, imm1: i64, imm2: i64 },
    OneRegOneExtImm { reg: u8, imm: i64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum IsaError {
    #[error("instruction stream ended before an operand block could be read")]
    Truncated,
    #[error("unknown opcode {0}")]
    UnknownOpcode(u8),
    #[error("immediate length field out of range")]
    BadImmLength,
}

fn clamp_reg(nibble: u8) -> u8 {
    nibble.min(MAX_REG_INDEX)
}

/// Sign-extends the low `len` bytes of `bytes` (little-endian) to `i64`, per the convention
/// that immediates are sign-extended to 64 bits on decode.
fn sign_extend(bytes: &[u8]) -> i64 {
    if bytes.is_empty() {
        return 0;
    }
    let mut buf = [0u8; 8];
    buf[..bytes.len()].copy_from_slice(bytes);
    let negative = bytes[bytes.len() - 1] & 0x80 != 0;
    if negative {
        for b in buf.iter_mut().skip(bytes.len()) {
            *b = 0xFF;
        }
    }
    i64::from_le_bytes(buf)
}

/// Encodes the smallest little-endian byte count (0..=4) that represents `imm` without losing
/// its sign, capped at 4 bytes.
fn minimal_bytes(imm: i64) -> Vec<u8> {
    if imm == 0 {
        return Vec::new();
    }
    let full = imm.to_le_bytes();
    for len in 1..=4usize {
        if sign_extend(&full[..len]) == imm {
            return full[..len].to_vec();
        }
    }
    full[..4].to_vec()
}

/// One decoded instruction plus the byte count the decoder consumed, re-materialised so the
/// round-trip law holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decoded {
    pub opcode: Opcode,
    pub args: InstructionArgs,
    pub no_of_bytes_to_skip: usize,
}

/// Encodes `(opcode, args)` into the compact wire format.
pub fn encode(opcode: Opcode, args: &InstructionArgs) -> Vec<u8> {
    let mut out = vec![opcode as u8];
    match args {
        InstructionArgs::NoArgs => {}
        InstructionArgs::OneImm { imm } => {
            let bytes = minimal_bytes(*imm);
            out.push(bytes.len() as u8);
            out.extend_from_slice(&bytes);
        }
        InstructionArgs::OneRegOneImm { reg, imm } => {
            let bytes = minimal_bytes(*imm);
            out.push((clamp_reg(*reg) & 0x0F) | ((bytes.len() as u8) << 4));
            out.extend_from_slice(&bytes);
        }
        InstructionArgs::TwoReg { reg_a, reg_b } => {
            out.push((clamp_reg(*reg_a) & 0x0F) | (clamp_reg(*reg_b) << 4));
        }
        InstructionArgs::ThreeReg { reg_a, reg_b, reg_c } => {
            out.push((clamp_reg(*reg_a) & 0x0F) | (clamp_reg(*reg_b) << 4));
            out.push(clamp_reg(*reg_c) & 0x0F);
        }
        InstructionArgs::TwoRegTwoImm { reg_a, reg_b, imm1, imm2 } => {
            out.push((clamp_reg(*reg_a) & 0x0F) | (clamp_reg(*reg_b) << 4));
            let b1 = minimal_bytes(*imm1);
            let b2 = minimal_bytes(*imm2);
            out.push((b1.len() as u8 & 0x07) | ((b2.len() as u8 & 0x07) << 3));
            out.extend_from_slice(&b1);
            out.extend_from_slice(&b2);
        }
        InstructionArgs::OneRegOneExtImm { reg, imm } => {
            out.push(clamp_reg(*reg) & 0x0F);
            out.extend_from_slice(&imm.to_le_bytes());
        }
    }
    out
}

/// Decodes one instruction starting at `buf[0]` (the opcode byte).
pub fn decode(buf: &[u8]) -> Result<Decoded, IsaError> {
    let opcode_byte = *buf.first().ok_or(IsaError::Truncated)?;
    let opcode = Opcode::from_u8(opcode_byte).ok_or(IsaError::UnknownOpcode(opcode_byte))?;
    let rest = &buf[1..];

    let (args, consumed) = match opcode.class() {
        InstructionClass::NoArgs => (InstructionArgs::NoArgs, 0),
        InstructionClass::OneImm => {
            let len = *rest.first().ok_or(IsaError::Truncated)? as usize;
            if len > 4 {
                return Err(IsaError::BadImmLength);
            }
            let imm_bytes = rest.get(1..1 + len).ok_or(IsaError::Truncated)?;
            (InstructionArgs::OneImm { imm: sign_extend(imm_bytes) }, 1 + len)
        }
        InstructionClass::OneRegOneImm => {
            let header = *rest.first().ok_or(IsaError::Truncated)?;
            let reg = clamp_reg(header & 0x0F);
            let len = ((header >> 4) & 0x07) as usize;
            if len > 4 {
                return Err(IsaError::BadImmLength);
            }
            let imm_bytes = rest.get(1..1 + len).ok_or(IsaError::Truncated)?;
            (InstructionArgs::OneRegOneImm { reg, imm: sign_extend(imm_bytes) }, 1 + len)
        }
        InstructionClass::TwoReg => {
            let header = *rest.first().ok_or(IsaError::Truncated)?;
            (
                InstructionArgs::TwoReg {
                    reg_a: clamp_reg(header & 0x0F),
                    reg_b: clamp_reg(header >> 4),
                },
                1,
            )
        }
        InstructionClass::ThreeReg => {
            let header = *rest.first().ok_or(IsaError::Truncated)?;
            let third = *rest.get(1).ok_or(IsaError::Truncated)?;
            (
                InstructionArgs::ThreeReg {
                    reg_a: clamp_reg(header & 0x0F),
                    reg_b: clamp_reg(header >> 4),
                    reg_c: clamp_reg(third & 0x0F),
                },
                2,
            )
        }
        InstructionClass::TwoRegTwoImm => {
            let reg_header = *rest.first().ok_or(IsaError::Truncated)?;
            let len_header = *rest.get(1).ok_or(IsaError::Truncated)?;
            let len1 = (len_header & 0x07) as usize;
            let len2 = ((len_header >> 3) & 0x07) as usize;
            if len1 > 4 || len2 > 4 {
                return Err(IsaError::BadImmLength);
            }
            let imm1_bytes = rest.get(2..2 + len1).ok_or(IsaError::Truncated)?;
            let imm2_bytes = rest.get(2 + len1..2 + len1 + len2).ok_or(IsaError::Truncated)?;
            (
                InstructionArgs::TwoRegTwoImm {
                    reg_a: clamp_reg(reg_header & 0x0F),
                    reg_b: clamp_reg(reg_header >> 4),
                    imm1: sign_extend(imm1_bytes),
                    imm2: sign_extend(imm2_bytes),
                },
                2 + len1 + len2,
            )
        }
        InstructionClass::OneRegOneExtImm => {
            let header = *rest.first().ok_or(IsaError::Truncated)?;
            let imm_bytes = rest.get(1..9).ok_or(IsaError::Truncated)?;
            let mut buf8 = [0u8; 8];
            buf8.copy_from_slice(imm_bytes);
            (
                InstructionArgs::OneRegOneExtImm {
                    reg: clamp_reg(header & 0x0F),
                    imm: i64::from_le_bytes(buf8),
                },
                9,
            )
        }
    };

    Ok(Decoded {
        opcode,
        args,
        no_of_bytes_to_skip: 1 + consumed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(opcode: Opcode, args: InstructionArgs) {
        let bytes = encode(opcode, &args);
        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded.opcode as u8, opcode as u8);
        assert_eq!(decoded.args, args);
        assert_eq!(decoded.no_of_bytes_to_skip, bytes.len());
    }

    #[test]
    fn no_args_round_trips() {
        round_trip(Opcode::Trap, InstructionArgs::NoArgs);
        round_trip(Opcode::Fallthrough, InstructionArgs::NoArgs);
    }

    #[test]
    fn one_imm_round_trips_across_lengths() {
        for imm in [0i64, 1, -1, 127, -128, 70000, -70000, i32::MAX as i64, i32::MIN as i64] {
            round_trip(Opcode::Ecalli, InstructionArgs::OneImm { imm });
        }
    }

    #[test]
    fn one_reg_one_imm_clamps_register() {
        let bytes = encode(Opcode::LoadImm, &InstructionArgs::OneRegOneImm { reg: 15, imm: 42 });
        let decoded = decode(&bytes).unwrap();
        assert_eq!(
            decoded.args,
            InstructionArgs::OneRegOneImm { reg: MAX_REG_INDEX, imm: 42 }
        );
    }

    #[test]
    fn two_reg_round_trips() {
        round_trip(Opcode::Move, InstructionArgs::TwoReg { reg_a: 3, reg_b: 9 });
    }

    #[test]
    fn three_reg_round_trips() {
        round_trip(
            Opcode::Add,
            InstructionArgs::ThreeReg { reg_a: 1, reg_b: 2, reg_c: 3 },
        );
    }

    #[test]
    fn two_reg_two_imm_round_trips() {
        round_trip(
            Opcode::BranchEqImm,
            InstructionArgs::TwoRegTwoImm {
                reg_a: 4,
                reg_b: 5,
                imm1: -300,
                imm2: 90000,
            },
        );
    }

    #[test]
    fn one_reg_one_ext_imm_carries_full_width() {
        round_trip(
            Opcode::LoadImm64,
            InstructionArgs::OneRegOneExtImm { reg: 6, imm: i64::MIN },
        );
    }

    #[test]
    fn unknown_opcode_is_rejected() {
        assert_eq!(decode(&[255]), Err(IsaError::UnknownOpcode(255)));
    }

    #[test]
    fn truncated_operand_block_is_rejected() {
        assert_eq!(decode(&[Opcode::Ecalli as u8, 4, 1, 2]), Err(IsaError::Truncated));
    }

    proptest::proptest! {
        #[test]
        fn one_imm_round_trips_any_i32(imm in i32::MIN..=i32::MAX) {
            round_trip(Opcode::Jump, InstructionArgs::OneImm { imm: imm as i64 });
        }
    }
}
