//! Instruction cache simulator.
//!
//! Sits between the fetch stage and guest memory. Three modes share one
//! statistics block:
//!
//! - `Disabled`: every fetch goes straight to memory and nothing is counted.
//! - `DirectMapped`: one slot per index.
//! - `SetAssociative`: the slot array is split into contiguous sets of `ways`
//!   slots with least-recently-used replacement, using `refs` as the clock.

use crate::bus::Bus;
use crate::config::ConfigError;
use crate::memory::MemoryError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default number of cache slots.
pub const DEFAULT_CACHE_SLOTS: usize = 16;

/// Default associativity of the set-associative cache.
pub const DEFAULT_WAYS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CacheKind {
    Disabled,
    DirectMapped,
    SetAssociative,
}

impl fmt::Display for CacheKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKind::Disabled => write!(f, "disabled"),
            CacheKind::DirectMapped => write!(f, "direct mapped"),
            CacheKind::SetAssociative => write!(f, "set associative"),
        }
    }
}

/// Cache geometry supplied by the caller before a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    pub kind: CacheKind,
    /// Total number of slots (one word each).
    pub size: usize,
    /// Slots per set. Forced to 1 for the direct-mapped cache.
    pub ways: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self::disabled()
    }
}

/// Smallest `k` with `k * k >= n`.
fn ceil_sqrt(n: usize) -> u32 {
    let mut k = 0u32;
    while (k as usize) * (k as usize) < n {
        k += 1;
    }
    k
}

impl CacheConfig {
    pub fn disabled() -> Self {
        Self {
            kind: CacheKind::Disabled,
            size: DEFAULT_CACHE_SLOTS,
            ways: 1,
        }
    }

    pub fn direct_mapped(size: usize) -> Self {
        Self {
            kind: CacheKind::DirectMapped,
            size,
            ways: 1,
        }
    }

    pub fn set_associative(size: usize, ways: usize) -> Self {
        Self {
            kind: CacheKind::SetAssociative,
            size,
            ways,
        }
    }

    /// Effective associativity.
    pub fn ways(&self) -> usize {
        match self.kind {
            CacheKind::SetAssociative => self.ways,
            _ => 1,
        }
    }

    pub fn num_sets(&self) -> usize {
        match self.ways() {
            0 => 0,
            ways => self.size / ways,
        }
    }

    /// Mask applied to `addr >> 2` to select the slot (direct-mapped) or the
    /// set (set-associative).
    ///
    /// The set-associative mask has `ceil(sqrt(num_sets))` low bits rather
    /// than `log2(num_sets)`, so it is only a standard power-of-two index for
    /// 4 and 16 sets. `validate` rejects geometries where it would address a
    /// missing set.
    pub fn index_mask(&self) -> u32 {
        match self.kind {
            CacheKind::Disabled => 0,
            CacheKind::DirectMapped => self.size.saturating_sub(1) as u32,
            CacheKind::SetAssociative => {
                let bits = ceil_sqrt(self.num_sets());
                if bits >= 32 {
                    u32::MAX
                } else {
                    (1u32 << bits) - 1
                }
            }
        }
    }

    /// Number of contiguous low set bits of the index mask.
    pub fn index_bits(&self) -> u32 {
        self.index_mask().trailing_ones()
    }

    fn geometry_error(&self, reason: &'static str) -> ConfigError {
        ConfigError::CacheGeometry {
            kind: self.kind,
            size: self.size,
            ways: self.ways,
            reason,
        }
    }

    /// Check that every index the geometry can produce lands inside the slot
    /// array.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.kind {
            CacheKind::Disabled => Ok(()),
            CacheKind::DirectMapped => {
                if !self.size.is_power_of_two() {
                    return Err(self.geometry_error("size must be a non-zero power of two"));
                }
                Ok(())
            }
            CacheKind::SetAssociative => {
                if self.ways == 0 {
                    return Err(self.geometry_error("ways must be non-zero"));
                }
                if self.size == 0 || self.size % self.ways != 0 {
                    return Err(self.geometry_error("size must be a non-zero multiple of ways"));
                }
                if self.index_mask() as usize >= self.num_sets() {
                    return Err(self.geometry_error("set index mask exceeds the number of sets"));
                }
                Ok(())
            }
        }
    }
}

/// One cached word.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheSlot {
    pub valid: bool,
    pub tag: u32,
    pub data: u32,
    /// Value of `refs` at the last access. Set-associative mode only.
    pub timestamp: u64,
}

/// Cache statistics.
///
/// `hits + misses == refs` and `misses_cold + misses_hot == misses` hold after
/// every lookup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub refs: u64,
    pub hits: u64,
    pub misses: u64,
    pub misses_cold: u64,
    pub misses_hot: u64,
}

/// Outcome of a single cache access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheAccess {
    Hit,
    /// Miss into a slot that held no valid data.
    ColdMiss,
    /// Miss that evicted a valid line.
    HotMiss,
    /// Cache disabled; read straight from memory.
    Uncached,
}

/// Instruction cache.
pub struct Cache {
    config: CacheConfig,
    slots: Vec<CacheSlot>,
    index_mask: u32,
    index_bits: u32,
    stats: CacheStats,
}

impl Cache {
    pub fn new(config: CacheConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let slots = match config.kind {
            CacheKind::Disabled => Vec::new(),
            _ => vec![CacheSlot::default(); config.size],
        };
        Ok(Self {
            index_mask: config.index_mask(),
            index_bits: config.index_bits(),
            config,
            slots,
            stats: CacheStats::default(),
        })
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    #[cfg(test)]
    pub fn slots(&self) -> &[CacheSlot] {
        &self.slots
    }

    pub fn index_mask(&self) -> u32 {
        self.index_mask
    }

    pub fn index_bits(&self) -> u32 {
        self.index_bits
    }

    /// Number of slots currently holding valid data. Slots are never
    /// invalidated during a run, so this is also the number ever used.
    pub fn slots_used(&self) -> usize {
        self.slots.iter().filter(|s| s.valid).count()
    }

    /// Invalidate every slot and zero the statistics.
    pub fn reset(&mut self) {
        self.slots.fill(CacheSlot::default());
        self.stats = CacheStats::default();
    }

    #[inline]
    fn index_and_tag(&self, addr: u32) -> (usize, u32) {
        let index = ((addr >> 2) & self.index_mask) as usize;
        let tag = addr.checked_shr(self.index_bits + 2).unwrap_or(0);
        (index, tag)
    }

    /// Return the word at `addr`, going through the cache.
    pub fn lookup(&mut self, bus: &dyn Bus, addr: u32) -> Result<u32, MemoryError> {
        self.access(bus, addr).map(|(data, _)| data)
    }

    /// Like [`Cache::lookup`] but also reports how the access was served.
    ///
    /// A failed memory read leaves the cache and its statistics untouched.
    pub fn access(&mut self, bus: &dyn Bus, addr: u32) -> Result<(u32, CacheAccess), MemoryError> {
        match self.config.kind {
            CacheKind::Disabled => Ok((bus.fetch_u32(addr)?, CacheAccess::Uncached)),
            CacheKind::DirectMapped => self.access_direct(bus, addr),
            CacheKind::SetAssociative => self.access_associative(bus, addr),
        }
    }

    fn access_direct(&mut self, bus: &dyn Bus, addr: u32) -> Result<(u32, CacheAccess), MemoryError> {
        let (index, tag) = self.index_and_tag(addr);
        let slot = self.slots[index];

        if slot.valid && slot.tag == tag {
            self.stats.refs += 1;
            self.stats.hits += 1;
            log::trace!("icache hit: index={} tag={:#x} addr={:#010x}", index, tag, addr);
            return Ok((slot.data, CacheAccess::Hit));
        }

        let data = bus.fetch_u32(addr)?;
        self.stats.refs += 1;
        let outcome = self.record_miss(&slot, index, tag, addr);
        self.slots[index] = CacheSlot {
            valid: true,
            tag,
            data,
            timestamp: slot.timestamp,
        };
        Ok((data, outcome))
    }

    fn access_associative(
        &mut self,
        bus: &dyn Bus,
        addr: u32,
    ) -> Result<(u32, CacheAccess), MemoryError> {
        let (set, tag) = self.index_and_tag(addr);
        let ways = self.config.ways;
        let begin = set * ways;
        let now = self.stats.refs + 1;

        let lines = &mut self.slots[begin..begin + ways];
        if let Some(line) = lines.iter_mut().find(|s| s.valid && s.tag == tag) {
            line.timestamp = now;
            let data = line.data;
            self.stats.refs = now;
            self.stats.hits += 1;
            log::trace!("icache hit: set={} tag={:#x} addr={:#010x}", set, tag, addr);
            return Ok((data, CacheAccess::Hit));
        }

        // Least recently used line; invalid lines carry timestamp 0 and so
        // are taken first. Ties go to the lowest way.
        let mut victim = 0;
        for (way, line) in lines.iter().enumerate() {
            if line.timestamp < lines[victim].timestamp {
                victim = way;
            }
        }

        let data = bus.fetch_u32(addr)?;
        self.stats.refs = now;
        let evicted = self.slots[begin + victim];
        let outcome = self.record_miss(&evicted, set, tag, addr);
        self.slots[begin + victim] = CacheSlot {
            valid: true,
            tag,
            data,
            timestamp: now,
        };
        Ok((data, outcome))
    }

    fn record_miss(&mut self, victim: &CacheSlot, index: usize, tag: u32, addr: u32) -> CacheAccess {
        self.stats.misses += 1;
        if victim.valid {
            self.stats.misses_hot += 1;
            log::trace!(
                "icache miss (hot): index={} old_tag={:#x} tag={:#x} addr={:#010x}",
                index,
                victim.tag,
                tag,
                addr
            );
            CacheAccess::HotMiss
        } else {
            self.stats.misses_cold += 1;
            log::trace!(
                "icache miss (cold): index={} tag={:#x} addr={:#010x}",
                index,
                tag,
                addr
            );
            CacheAccess::ColdMiss
        }
    }
}
