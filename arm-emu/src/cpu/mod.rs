pub mod core;
pub mod execution;
pub mod types;

pub use self::core::Cpu;
pub use self::types::{EmuError, NUM_REGS};
