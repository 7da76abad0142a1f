//! Binary and ELF loading utilities.

use crate::memory::{Memory, MemoryError};
use goblin::elf::header::EM_ARM;
use goblin::elf::{program_header::PT_LOAD, Elf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("ELF parse error: {0}")]
    Elf(#[from] goblin::error::Error),

    #[error("ELF machine {0} is not ARM")]
    NotArm(u16),

    #[error("Segment {addr:#x}+{size:#x} is outside the program region")]
    SegmentOutOfRange { addr: u64, size: u64 },

    #[error("Segment exceeds file bounds")]
    SegmentTruncated,

    #[error("Symbol `{0}` not found")]
    SymbolNotFound(String),

    #[error(transparent)]
    Memory(#[from] MemoryError),
}

/// A program image ready to be handed to the emulator.
#[derive(Debug)]
pub struct Program {
    pub memory: Memory,
    /// Address of the function to call.
    pub entry: u32,
}

/// Load `buffer` into a fresh program region `[base, base + size)`.
///
/// ELF images are detected by their magic; anything else is treated as a
/// flat little-endian binary placed at `base`. For ELF images `function`
/// names the symbol to call (default: the ELF entry point). For flat
/// binaries the entry is `base`.
pub fn load_program(
    buffer: &[u8],
    base: u32,
    size: usize,
    function: Option<&str>,
) -> Result<Program, LoadError> {
    let mut memory = Memory::new(base, size);
    let entry = if buffer.starts_with(b"\x7FELF") {
        load_elf(buffer, &mut memory, function)?
    } else {
        if function.is_some() {
            log::warn!("Flat binary has no symbols; calling the load address");
        }
        memory.write_bytes(base, buffer)?;
        log::debug!("Flat binary loaded: {} bytes at {:#010x}", buffer.len(), base);
        base
    };
    Ok(Program { memory, entry })
}

/// Copy the `PT_LOAD` segments of an ARM ELF image into `memory` and return
/// the address to call.
pub fn load_elf(buffer: &[u8], memory: &mut Memory, function: Option<&str>) -> Result<u32, LoadError> {
    let elf = Elf::parse(buffer)?;
    if elf.header.e_machine != EM_ARM {
        return Err(LoadError::NotArm(elf.header.e_machine));
    }

    let region_start = memory.base() as u64;
    let region_end = memory.end();

    for ph in &elf.program_headers {
        if ph.p_type != PT_LOAD || ph.p_memsz == 0 {
            continue;
        }

        let file_size = ph.p_filesz as usize;
        let mem_size = ph.p_memsz;
        let file_offset = ph.p_offset as usize;

        if file_offset + file_size > buffer.len() {
            return Err(LoadError::SegmentTruncated);
        }

        let target = if ph.p_paddr != 0 { ph.p_paddr } else { ph.p_vaddr };
        if target < region_start || target + mem_size > region_end {
            return Err(LoadError::SegmentOutOfRange {
                addr: target,
                size: mem_size,
            });
        }

        let addr = target as u32;
        memory.write_bytes(addr, &buffer[file_offset..file_offset + file_size])?;
        if mem_size as usize > file_size {
            memory.zero_range(addr + file_size as u32, mem_size as usize - file_size)?;
        }
    }

    let entry = match function {
        Some(name) => elf
            .syms
            .iter()
            .find(|sym| elf.strtab.get_at(sym.st_name) == Some(name))
            .map(|sym| sym.st_value)
            .ok_or_else(|| LoadError::SymbolNotFound(name.to_string()))?,
        None => elf.entry,
    };
    // Clear the Thumb interworking bit.
    let entry = (entry as u32) & !1;

    log::debug!(
        "ELF loaded: entry={:#010x}, segments={}",
        entry,
        elf.program_headers.len()
    );

    Ok(entry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flat_binary() {
        let bytes = [0x1E, 0xFF, 0x2F, 0xE1]; // bx lr
        let program = load_program(&bytes, 0x8000, 0x100, None).unwrap();
        assert_eq!(program.entry, 0x8000);
        assert_eq!(program.memory.load_32(0x8000).unwrap(), 0xE12F_FF1E);
    }

    #[test]
    fn test_flat_binary_too_large() {
        let bytes = [0u8; 0x200];
        let err = load_program(&bytes, 0x8000, 0x100, None).unwrap_err();
        assert!(matches!(err, LoadError::Memory(_)));
    }

    const EM_386: u16 = 3;

    /// Minimal little-endian ELF32 executable: one `PT_LOAD` segment holding
    /// `code` at `vaddr` (`memsz` bytes in memory), and a symbol table with a
    /// single Thumb-tagged function `func` at `vaddr + 4`.
    fn build_elf(machine: u16, entry: u32, vaddr: u32, code: &[u8], memsz: u32) -> Vec<u8> {
        fn align4(n: usize) -> usize {
            (n + 3) & !3
        }
        fn put16(buf: &mut Vec<u8>, v: u16) {
            buf.extend_from_slice(&v.to_le_bytes());
        }
        fn put32(buf: &mut Vec<u8>, v: u32) {
            buf.extend_from_slice(&v.to_le_bytes());
        }

        let code_off = 52 + 32;
        let symtab_off = align4(code_off + code.len());
        let strtab = b"\0func\0";
        let strtab_off = symtab_off + 32;
        let shoff = align4(strtab_off + strtab.len());

        let mut buf = Vec::new();
        // ELF header
        buf.extend_from_slice(&[0x7F, b'E', b'L', b'F', 1, 1, 1, 0]);
        buf.extend_from_slice(&[0; 8]);
        put16(&mut buf, 2); // ET_EXEC
        put16(&mut buf, machine);
        put32(&mut buf, 1);
        put32(&mut buf, entry);
        put32(&mut buf, 52); // e_phoff
        put32(&mut buf, shoff as u32);
        put32(&mut buf, 0x0500_0000);
        put16(&mut buf, 52);
        put16(&mut buf, 32);
        put16(&mut buf, 1);
        put16(&mut buf, 40);
        put16(&mut buf, 3);
        put16(&mut buf, 2); // e_shstrndx

        // Program header
        put32(&mut buf, PT_LOAD);
        put32(&mut buf, code_off as u32);
        put32(&mut buf, vaddr);
        put32(&mut buf, vaddr);
        put32(&mut buf, code.len() as u32);
        put32(&mut buf, memsz);
        put32(&mut buf, 0b101); // R+X
        put32(&mut buf, 4);

        buf.extend_from_slice(code);
        buf.resize(symtab_off, 0);

        // Symbols: null, then func
        buf.extend_from_slice(&[0; 16]);
        put32(&mut buf, 1);
        put32(&mut buf, (vaddr + 4) | 1);
        put32(&mut buf, 4);
        buf.push(0x12); // STB_GLOBAL, STT_FUNC
        buf.push(0);
        put16(&mut buf, 1);

        buf.extend_from_slice(strtab);
        buf.resize(shoff, 0);

        // Section headers: null, .symtab, .strtab
        buf.extend_from_slice(&[0; 40]);
        for v in [0, 2, 0, 0, symtab_off as u32, 32, 2, 1, 4, 16] {
            put32(&mut buf, v);
        }
        for v in [0, 3, 0, 0, strtab_off as u32, strtab.len() as u32, 0, 0, 1, 0] {
            put32(&mut buf, v);
        }
        buf
    }

    // bx lr ; mov r0, r0
    const CODE: [u8; 8] = [0x1E, 0xFF, 0x2F, 0xE1, 0x00, 0x00, 0xA0, 0xE1];

    fn dirty_region() -> Memory {
        let mut memory = Memory::new(0x8000, 0x100);
        memory.write_bytes(0x8000, &[0xFF; 0x100]).unwrap();
        memory
    }

    #[test]
    fn test_elf_segment_copied_and_bss_zeroed() {
        let image = build_elf(EM_ARM, 0x8000, 0x8000, &CODE, 16);
        let mut memory = dirty_region();

        let entry = load_elf(&image, &mut memory, None).unwrap();
        assert_eq!(entry, 0x8000);
        assert_eq!(memory.load_32(0x8000).unwrap(), 0xE12F_FF1E);
        assert_eq!(memory.load_32(0x8004).unwrap(), 0xE1A0_0000);
        assert_eq!(memory.load_32(0x8008).unwrap(), 0);
        assert_eq!(memory.load_32(0x800C).unwrap(), 0);
        // Past the segment's memory size nothing is touched.
        assert_eq!(memory.load_32(0x8010).unwrap(), 0xFFFF_FFFF);
    }

    #[test]
    fn test_elf_symbol_lookup_clears_thumb_bit() {
        let image = build_elf(EM_ARM, 0x8000, 0x8000, &CODE, 8);
        let mut memory = dirty_region();
        assert_eq!(load_elf(&image, &mut memory, Some("func")).unwrap(), 0x8004);

        let err = load_elf(&image, &mut memory, Some("missing")).unwrap_err();
        assert!(matches!(err, LoadError::SymbolNotFound(ref name) if name == "missing"));
    }

    #[test]
    fn test_elf_entry_clears_thumb_bit() {
        let image = build_elf(EM_ARM, 0x8005, 0x8000, &CODE, 8);
        let program = load_program(&image, 0x8000, 0x100, None).unwrap();
        assert_eq!(program.entry, 0x8004);
        assert_eq!(program.memory.load_32(0x8000).unwrap(), 0xE12F_FF1E);
    }

    #[test]
    fn test_elf_segment_outside_region() {
        let image = build_elf(EM_ARM, 0x9000, 0x9000, &CODE, 16);
        let err = load_program(&image, 0x8000, 0x100, None).unwrap_err();
        assert!(matches!(
            err,
            LoadError::SegmentOutOfRange {
                addr: 0x9000,
                size: 16
            }
        ));

        // Fits at the start but the zeroed tail runs past the end.
        let image = build_elf(EM_ARM, 0x80F8, 0x80F8, &CODE, 16);
        let err = load_program(&image, 0x8000, 0x100, None).unwrap_err();
        assert!(matches!(err, LoadError::SegmentOutOfRange { addr: 0x80F8, .. }));
    }

    #[test]
    fn test_elf_for_other_machine_is_rejected() {
        let image = build_elf(EM_386, 0x8000, 0x8000, &CODE, 8);
        let err = load_program(&image, 0x8000, 0x100, None).unwrap_err();
        assert!(matches!(err, LoadError::NotArm(EM_386)));
    }

    #[test]
    fn test_truncated_elf_is_rejected() {
        let bytes = b"\x7FELF\x01\x01\x01";
        assert!(load_program(bytes, 0x8000, 0x100, None).is_err());
    }
}
