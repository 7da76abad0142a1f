use crate::config::ConfigError;
use crate::memory::{Memory, MemoryError};

/// Default top of the emulated stack. The stack grows down from here.
pub const STACK_TOP: u32 = 0x0010_0000;

/// Default stack size in bytes.
pub const STACK_SIZE: usize = 4 * 1024;

/// Guest memory access.
///
/// This is the single boundary every guest load, store and instruction fetch
/// goes through; nothing in the emulator dereferences guest addresses
/// directly.
pub trait Bus {
    fn read8(&self, addr: u32) -> Result<u8, MemoryError>;
    fn read32(&self, addr: u32) -> Result<u32, MemoryError>;

    fn write8(&mut self, addr: u32, val: u8) -> Result<(), MemoryError>;
    fn write32(&mut self, addr: u32, val: u32) -> Result<(), MemoryError>;

    /// Fetch an instruction word. Same as `read32`; kept separate so a bus
    /// can distinguish fetches from data reads.
    fn fetch_u32(&self, addr: u32) -> Result<u32, MemoryError> {
        self.read32(addr)
    }
}

/// Flat guest address space: one program region holding code and data, and
/// one stack region.
#[derive(Debug, Clone)]
pub struct SystemBus {
    pub program: Memory,
    pub stack: Memory,
}

impl SystemBus {
    /// Build a bus from a program region and a stack of `stack_size` bytes
    /// ending at `stack_top` (exclusive).
    pub fn new(program: Memory, stack_top: u32, stack_size: usize) -> Result<Self, ConfigError> {
        if stack_size == 0 || stack_size % 4 != 0 || stack_top % 4 != 0 {
            return Err(ConfigError::StackGeometry {
                top: stack_top,
                size: stack_size,
            });
        }
        let stack_base = (stack_top as u64)
            .checked_sub(stack_size as u64)
            .ok_or(ConfigError::StackGeometry {
                top: stack_top,
                size: stack_size,
            })?;
        let stack = Memory::new(stack_base as u32, stack_size);

        let program_base = program.base() as u64;
        if program_base < stack.end() && stack_base < program.end() {
            return Err(ConfigError::RegionOverlap {
                program_base: program.base(),
                program_size: program.size(),
                stack_base: stack_base as u32,
                stack_size,
            });
        }

        log::debug!(
            "Bus: program {:#010x}..{:#x}, stack {:#010x}..{:#x}",
            program.base(),
            program.end(),
            stack.base(),
            stack.end()
        );

        Ok(Self { program, stack })
    }

    /// Address one past the highest stack word; the initial stack pointer.
    pub fn stack_top(&self) -> u32 {
        self.stack.end() as u32
    }

    #[inline]
    fn region(&self, addr: u32) -> Result<&Memory, MemoryError> {
        if self.program.contains(addr) {
            Ok(&self.program)
        } else if self.stack.contains(addr) {
            Ok(&self.stack)
        } else {
            Err(MemoryError::Unmapped(addr))
        }
    }

    #[inline]
    fn region_mut(&mut self, addr: u32) -> Result<&mut Memory, MemoryError> {
        if self.program.contains(addr) {
            Ok(&mut self.program)
        } else if self.stack.contains(addr) {
            Ok(&mut self.stack)
        } else {
            Err(MemoryError::Unmapped(addr))
        }
    }
}

impl Bus for SystemBus {
    fn read8(&self, addr: u32) -> Result<u8, MemoryError> {
        self.region(addr)?.load_8(addr)
    }

    fn read32(&self, addr: u32) -> Result<u32, MemoryError> {
        self.region(addr)?.load_32(addr)
    }

    fn write8(&mut self, addr: u32, val: u8) -> Result<(), MemoryError> {
        self.region_mut(addr)?.store_8(addr, val)
    }

    fn write32(&mut self, addr: u32, val: u32) -> Result<(), MemoryError> {
        self.region_mut(addr)?.store_32(addr, val)
    }
}

/// A single region is itself a bus; handy for code-only images.
impl Bus for Memory {
    fn read8(&self, addr: u32) -> Result<u8, MemoryError> {
        self.load_8(addr)
    }

    fn read32(&self, addr: u32) -> Result<u32, MemoryError> {
        self.load_32(addr)
    }

    fn write8(&mut self, addr: u32, val: u8) -> Result<(), MemoryError> {
        self.store_8(addr, val)
    }

    fn write32(&mut self, addr: u32, val: u32) -> Result<(), MemoryError> {
        self.store_32(addr, val)
    }
}
