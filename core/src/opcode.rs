//! # Opcodes
//!
//! Opcodes are 16 bits each, fetched big-endian. Which instruction an opcode encodes is decided by
//! masking it against the patterns in the opcode table; the bits left over carry operands.
//! - `[_nnn]` a 12-bit address
//! - `[__kk]` an 8-bit immediate that is assigned to and/or compared with Vx
//! - `[_x__]` the register Vx, or the inclusive upper bound of the range V0..=Vx
//! - `[__y_]` the register Vy
//! - `[___n]` a 4-bit immediate (sprite height)

/// An operand extraction rule: the operand is `(op & mask) >> shift`
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Field {
    pub mask: u16,
    pub shift: u16,
}

impl Field {
    pub const fn new(mask: u16, shift: u16) -> Self {
        Field { mask, shift }
    }

    pub fn extract(self, op: u16) -> u16 {
        (op & self.mask) >> self.shift
    }
}

/// `[_x__]`
pub const X: Field = Field::new(0x0F00, 8);
/// `[__y_]`
pub const Y: Field = Field::new(0x00F0, 4);
/// `[___n]`
pub const N: Field = Field::new(0x000F, 0);
/// `[__kk]`
pub const KK: Field = Field::new(0x00FF, 0);
/// `[_nnn]`
pub const NNN: Field = Field::new(0x0FFF, 0);

#[cfg(test)]
mod test_opcode {
    use super::*;

    #[test]
    fn test_x() {
        assert_eq!(X.extract(0xABCD), 0xB);
    }

    #[test]
    fn test_y() {
        assert_eq!(Y.extract(0xABCD), 0xC);
    }

    #[test]
    fn test_n() {
        assert_eq!(N.extract(0xABCD), 0xD);
    }

    #[test]
    fn test_kk() {
        assert_eq!(KK.extract(0xABCD), 0xCD);
    }

    #[test]
    fn test_nnn() {
        assert_eq!(NNN.extract(0xABCD), 0x0BCD);
    }

    #[test]
    fn test_custom_field() {
        let high_byte = Field::new(0xFF00, 8);
        assert_eq!(high_byte.extract(0xABCD), 0xAB);
    }
}
