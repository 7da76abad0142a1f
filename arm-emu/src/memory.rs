use thiserror::Error;

/// Memory access errors.
///
/// Addresses in these errors are full guest addresses, not region offsets.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemoryError {
    #[error("Out-of-bounds memory access at {0:#010x}")]
    OutOfBounds(u32),

    #[error("Misaligned word access at {0:#010x}")]
    InvalidAlignment(u32),

    #[error("No memory region mapped at {0:#010x}")]
    Unmapped(u32),
}

/// A contiguous, zero-initialised, byte-addressable guest memory region.
///
/// The region covers `[base, base + size)`. Every accessor takes a guest
/// address and bounds-checks it before touching the backing buffer; word
/// accesses are little-endian and must be 4-byte aligned.
#[derive(Debug, Clone)]
pub struct Memory {
    base: u32,
    data: Vec<u8>,
}

impl Memory {
    /// Create a new region of `size` bytes starting at `base`.
    pub fn new(base: u32, size: usize) -> Self {
        Self {
            base,
            data: vec![0; size],
        }
    }

    #[inline]
    pub fn base(&self) -> u32 {
        self.base
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// One past the last address of the region, computed in 64 bits so a
    /// region ending at the top of the address space does not wrap.
    #[inline]
    pub fn end(&self) -> u64 {
        self.base as u64 + self.data.len() as u64
    }

    #[inline]
    pub fn contains(&self, addr: u32) -> bool {
        self.offset(addr).is_some()
    }

    /// Translate a guest address into an offset within this region.
    #[inline]
    pub fn offset(&self, addr: u32) -> Option<usize> {
        let off = addr.wrapping_sub(self.base) as usize;
        if addr >= self.base && off < self.data.len() {
            Some(off)
        } else {
            None
        }
    }

    /// Bounds-checked offset for an access of `len` bytes at `addr`.
    #[inline]
    fn span(&self, addr: u32, len: usize) -> Result<usize, MemoryError> {
        let off = self.offset(addr).ok_or(MemoryError::OutOfBounds(addr))?;
        if off + len > self.data.len() {
            return Err(MemoryError::OutOfBounds(addr));
        }
        Ok(off)
    }

    // ========== READ METHODS ==========

    #[inline]
    pub fn load_8(&self, addr: u32) -> Result<u8, MemoryError> {
        let off = self.span(addr, 1)?;
        Ok(self.data[off])
    }

    #[inline]
    pub fn load_32(&self, addr: u32) -> Result<u32, MemoryError> {
        if addr % 4 != 0 {
            return Err(MemoryError::InvalidAlignment(addr));
        }
        let off = self.span(addr, 4)?;
        let bytes = [
            self.data[off],
            self.data[off + 1],
            self.data[off + 2],
            self.data[off + 3],
        ];
        Ok(u32::from_le_bytes(bytes))
    }

    // ========== WRITE METHODS ==========

    #[inline]
    pub fn store_8(&mut self, addr: u32, value: u8) -> Result<(), MemoryError> {
        let off = self.span(addr, 1)?;
        self.data[off] = value;
        Ok(())
    }

    #[inline]
    pub fn store_32(&mut self, addr: u32, value: u32) -> Result<(), MemoryError> {
        if addr % 4 != 0 {
            return Err(MemoryError::InvalidAlignment(addr));
        }
        let off = self.span(addr, 4)?;
        self.data[off..off + 4].copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    // ========== BULK HELPERS ==========

    /// Copy `bytes` into the region starting at guest address `addr`.
    pub fn write_bytes(&mut self, addr: u32, bytes: &[u8]) -> Result<(), MemoryError> {
        if bytes.is_empty() {
            return Ok(());
        }
        let off = self.span(addr, bytes.len())?;
        self.data[off..off + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    /// Store a sequence of words starting at `addr`. Used to place small
    /// hand-assembled programs.
    pub fn write_words(&mut self, addr: u32, words: &[u32]) -> Result<(), MemoryError> {
        for (i, word) in words.iter().enumerate() {
            self.store_32(addr.wrapping_add(4 * i as u32), *word)?;
        }
        Ok(())
    }

    pub fn zero_range(&mut self, addr: u32, len: usize) -> Result<(), MemoryError> {
        if len == 0 {
            return Ok(());
        }
        let off = self.span(addr, len)?;
        self.data[off..off + len].fill(0);
        Ok(())
    }

    /// Zero the whole region.
    pub fn clear(&mut self) {
        self.data.fill(0);
    }

    #[cfg(test)]
    pub fn read_range(&self, addr: u32, len: usize) -> Result<&[u8], MemoryError> {
        let off = self.span(addr, len)?;
        Ok(&self.data[off..off + len])
    }
}
