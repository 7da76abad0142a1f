use super::types::NUM_REGS;
use crate::decoder::Register;

/// Architectural register state.
///
/// `condition` is not a flags register: it holds the raw difference written
/// by the last compare, and branches read it as a signed value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cpu {
    pub regs: [u32; NUM_REGS],
    pub condition: u32,
}

impl Cpu {
    pub fn new() -> Self {
        Self::default()
    }

    /// Zero every register and the condition register.
    pub fn reset(&mut self) {
        self.regs = [0; NUM_REGS];
        self.condition = 0;
    }

    #[inline]
    pub fn read_reg(&self, reg: Register) -> u32 {
        self.regs[reg.to_usize()]
    }

    #[inline]
    pub fn write_reg(&mut self, reg: Register, val: u32) {
        self.regs[reg.to_usize()] = val;
    }

    #[inline]
    pub fn pc(&self) -> u32 {
        self.regs[Register::PC.to_usize()]
    }

    #[inline]
    pub fn set_pc(&mut self, pc: u32) {
        self.regs[Register::PC.to_usize()] = pc;
    }

    /// Move past the current instruction unless it wrote `rd == pc`, in which
    /// case the written value is the next PC.
    #[inline]
    pub(super) fn advance_unless_pc(&mut self, rd: Register) {
        if rd != Register::PC {
            self.set_pc(self.pc().wrapping_add(4));
        }
    }
}
