//! Instruction classification and field extraction.
//!
//! The supported encodings overlap (a multiply is also a well-formed AND, a
//! branch-exchange also matches the data-processing tag), so classification
//! walks [`DECODE_ORDER`] and takes the first family whose predicate matches.

use std::fmt;

/// A register index. Always in `0..16` because it is built from a 4-bit field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Register(u8);

impl Register {
    pub const R0: Register = Register(0);
    pub const R1: Register = Register(1);
    #[cfg(test)]
    pub const R2: Register = Register(2);
    #[cfg(test)]
    pub const R3: Register = Register(3);
    pub const SP: Register = Register(13);
    pub const LR: Register = Register(14);
    pub const PC: Register = Register(15);

    /// Register named by the 4-bit field of `word` starting at bit `lsb`.
    #[inline]
    pub fn from_field(word: u32, lsb: u32) -> Self {
        Register(((word >> lsb) & 0xF) as u8)
    }

    /// Register from a raw number; only the low 4 bits are kept.
    #[cfg(test)]
    pub fn new(n: u8) -> Self {
        Register(n & 0xF)
    }

    #[inline]
    pub fn to_usize(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Register::SP => write!(f, "sp"),
            Register::LR => write!(f, "lr"),
            Register::PC => write!(f, "pc"),
            Register(n) => write!(f, "r{}", n),
        }
    }
}

/// Instruction families, in no particular order. See [`DECODE_ORDER`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    BranchExchange,
    Branch,
    Add,
    Mov,
    Sub,
    Mul,
    Cmp,
    Rsb,
    And,
    SingleDataTransfer,
}

#[inline]
fn dp_opcode(word: u32, opcode: u32) -> bool {
    (word >> 26) & 0b11 == 0b00 && (word >> 21) & 0xF == opcode
}

pub fn is_bx(word: u32) -> bool {
    (word >> 4) & 0xFF_FFFF == 0x12_FFF1
}

pub fn is_branch(word: u32) -> bool {
    (word >> 25) & 0b111 == 0b101
}

pub fn is_add(word: u32) -> bool {
    dp_opcode(word, 0b0100)
}

pub fn is_mov(word: u32) -> bool {
    dp_opcode(word, 0b1101)
}

pub fn is_sub(word: u32) -> bool {
    dp_opcode(word, 0b0010)
}

pub fn is_mul(word: u32) -> bool {
    (word >> 22) & 0b11_1111 == 0 && (word >> 4) & 0xF == 0b1001
}

pub fn is_cmp(word: u32) -> bool {
    dp_opcode(word, 0b1010)
}

pub fn is_rsb(word: u32) -> bool {
    dp_opcode(word, 0b0011)
}

pub fn is_and(word: u32) -> bool {
    dp_opcode(word, 0b0000)
}

pub fn is_sdt(word: u32) -> bool {
    (word >> 26) & 0b11 == 0b01
}

/// Predicates in priority order. More constrained encodings come first.
pub const DECODE_ORDER: [(Family, fn(u32) -> bool); 10] = [
    (Family::BranchExchange, is_bx),
    (Family::Branch, is_branch),
    (Family::Add, is_add),
    (Family::Mov, is_mov),
    (Family::Sub, is_sub),
    (Family::Mul, is_mul),
    (Family::Cmp, is_cmp),
    (Family::Rsb, is_rsb),
    (Family::And, is_and),
    (Family::SingleDataTransfer, is_sdt),
];

/// First family in priority order whose predicate accepts `word`.
pub fn classify(word: u32) -> Option<Family> {
    DECODE_ORDER
        .iter()
        .find(|(_, matches)| matches(word))
        .map(|(family, _)| *family)
}

/// Branch condition field (bits 31..28).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    Always,
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    /// Any other code. Never taken.
    Unsupported(u8),
}

impl Condition {
    pub fn from_bits(bits: u32) -> Self {
        match bits & 0xF {
            0b1110 => Condition::Always,
            0b0000 => Condition::Eq,
            0b0001 => Condition::Ne,
            0b1100 => Condition::Gt,
            0b1010 => Condition::Ge,
            0b1011 => Condition::Lt,
            0b1101 => Condition::Le,
            other => Condition::Unsupported(other as u8),
        }
    }

    /// Evaluate against the condition register, read as the signed result
    /// of the last compare.
    pub fn holds(self, condition: u32) -> bool {
        let diff = condition as i32;
        match self {
            Condition::Always => true,
            Condition::Eq => diff == 0,
            Condition::Ne => diff != 0,
            Condition::Gt => diff > 0,
            Condition::Ge => diff >= 0,
            Condition::Lt => diff < 0,
            Condition::Le => diff <= 0,
            Condition::Unsupported(_) => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShiftKind {
    Lsl,
    Lsr,
    Asr,
    /// Decoded but not executable.
    Ror,
}

impl ShiftKind {
    fn from_bits(bits: u32) -> Self {
        match bits & 0b11 {
            0b00 => ShiftKind::Lsl,
            0b01 => ShiftKind::Lsr,
            0b10 => ShiftKind::Asr,
            _ => ShiftKind::Ror,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShiftAmount {
    /// 5-bit immediate amount.
    Imm(u32),
    /// Low byte of a register.
    Reg(Register),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shift {
    pub kind: ShiftKind,
    pub amount: ShiftAmount,
}

/// Second operand of a data-processing instruction, or the offset of a
/// register-addressed transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand2 {
    Imm(u32),
    /// `shift` is `None` when the whole 8-bit shift field is zero.
    Reg { rm: Register, shift: Option<Shift> },
}

/// Decode the shifted-register form. Register-specified amounts (bit 4) are
/// only honoured when `reg_amount` is set; otherwise the amount always comes
/// from bits 11..7.
fn decode_shifted(word: u32, reg_amount: bool) -> Operand2 {
    let rm = Register::from_field(word, 0);
    if (word >> 4) & 0xFF == 0 {
        return Operand2::Reg { rm, shift: None };
    }
    let kind = ShiftKind::from_bits(word >> 5);
    let amount = if reg_amount && (word >> 4) & 1 == 1 {
        ShiftAmount::Reg(Register::from_field(word, 8))
    } else {
        ShiftAmount::Imm((word >> 7) & 0b1_1111)
    };
    Operand2::Reg {
        rm,
        shift: Some(Shift { kind, amount }),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataProc {
    pub rd: Register,
    pub rn: Register,
    pub op2: Operand2,
}

impl DataProc {
    fn decode(word: u32, reg_amount: bool) -> Self {
        let op2 = if (word >> 25) & 1 == 1 {
            Operand2::Imm(word & 0xFF)
        } else {
            decode_shifted(word, reg_amount)
        };
        Self {
            rd: Register::from_field(word, 12),
            rn: Register::from_field(word, 16),
            op2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transfer {
    pub load: bool,
    /// Byte quantity. Only meaningful for register addressing.
    pub byte: bool,
    pub rd: Register,
    pub rn: Register,
    pub offset: Operand2,
}

/// A decoded instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Bx {
        rm: Register,
    },
    Branch {
        cond: Condition,
        link: bool,
        /// Sign-extended byte offset.
        offset: u32,
    },
    Add(DataProc),
    Mov(DataProc),
    Sub(DataProc),
    Mul {
        rd: Register,
        rm: Register,
        rs: Register,
    },
    Cmp(DataProc),
    Rsb(DataProc),
    And(DataProc),
    Sdt(Transfer),
}

impl Op {
    pub fn family(&self) -> Family {
        match self {
            Op::Bx { .. } => Family::BranchExchange,
            Op::Branch { .. } => Family::Branch,
            Op::Add(_) => Family::Add,
            Op::Mov(_) => Family::Mov,
            Op::Sub(_) => Family::Sub,
            Op::Mul { .. } => Family::Mul,
            Op::Cmp(_) => Family::Cmp,
            Op::Rsb(_) => Family::Rsb,
            Op::And(_) => Family::And,
            Op::Sdt(_) => Family::SingleDataTransfer,
        }
    }
}

/// Sign-extend the 24-bit word offset of a branch and scale it to bytes.
#[inline]
pub fn branch_offset(word: u32) -> u32 {
    (((word << 8) as i32) >> 6) as u32
}

/// Decode `word`, or `None` if no supported family matches.
pub fn decode(word: u32) -> Option<Op> {
    let op = match classify(word)? {
        Family::BranchExchange => Op::Bx {
            rm: Register::from_field(word, 0),
        },
        Family::Branch => Op::Branch {
            cond: Condition::from_bits(word >> 28),
            link: (word >> 24) & 1 == 1,
            offset: branch_offset(word),
        },
        Family::Add => Op::Add(DataProc::decode(word, false)),
        Family::Mov => Op::Mov(DataProc::decode(word, true)),
        Family::Sub => Op::Sub(DataProc::decode(word, false)),
        Family::Mul => Op::Mul {
            rd: Register::from_field(word, 16),
            rm: Register::from_field(word, 0),
            rs: Register::from_field(word, 8),
        },
        Family::Cmp => Op::Cmp(DataProc::decode(word, false)),
        Family::Rsb => Op::Rsb(DataProc::decode(word, false)),
        Family::And => Op::And(DataProc::decode(word, false)),
        Family::SingleDataTransfer => {
            // Bit 25 clear selects the 12-bit immediate offset.
            let offset = if (word >> 25) & 1 == 0 {
                Operand2::Imm(word & 0xFFF)
            } else {
                decode_shifted(word, false)
            };
            Op::Sdt(Transfer {
                load: (word >> 20) & 1 == 1,
                byte: (word >> 22) & 1 == 1,
                rd: Register::from_field(word, 12),
                rn: Register::from_field(word, 16),
                offset,
            })
        }
    };
    Some(op)
}
