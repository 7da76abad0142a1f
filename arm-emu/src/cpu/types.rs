use crate::memory::MemoryError;
use thiserror::Error;

/// Number of general-purpose registers, including SP, LR and PC.
pub const NUM_REGS: usize = 16;

/// Fatal run-time conditions. Every one of these ends the run; none is
/// retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EmuError {
    #[error("Invalid instruction {word:#010x} at pc={pc:#010x}")]
    InvalidInstruction { word: u32, pc: u32 },

    #[error("Rotate-right shift is not supported: instruction {word:#010x} at pc={pc:#010x}")]
    UnsupportedShift { word: u32, pc: u32 },

    #[error("Memory fault at pc={pc:#010x}: {source}")]
    Memory {
        pc: u32,
        #[source]
        source: MemoryError,
    },
}

impl EmuError {
    /// Program counter of the instruction that faulted.
    pub fn pc(&self) -> u32 {
        match *self {
            EmuError::InvalidInstruction { pc, .. }
            | EmuError::UnsupportedShift { pc, .. }
            | EmuError::Memory { pc, .. } => pc,
        }
    }
}
