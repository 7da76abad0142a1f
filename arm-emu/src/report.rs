//! Final statistics snapshot and its text rendering.
//!
//! Percentages whose denominator is zero (no instructions, no branches, no
//! cache references) are reported as 0.00%.

use crate::analysis::Analysis;
use crate::cache::{Cache, CacheConfig, CacheKind, CacheStats};
use serde::{Deserialize, Serialize};
use std::fmt;

/// `part` as a percentage of `whole`, or 0 when `whole` is 0.
pub fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    part as f64 / whole as f64 * 100.0
}

/// Cache statistics plus the geometry needed to interpret them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CacheReport {
    pub config: CacheConfig,
    pub stats: CacheStats,
    /// Slots that hold valid data at the end of the run.
    pub slots_used: usize,
}

impl CacheReport {
    pub fn from_cache(cache: &Cache) -> Self {
        Self {
            config: *cache.config(),
            stats: cache.stats(),
            slots_used: cache.slots_used(),
        }
    }

    pub fn hit_ratio(&self) -> f64 {
        percent(self.stats.hits, self.stats.refs)
    }

    pub fn miss_ratio(&self) -> f64 {
        percent(self.stats.misses, self.stats.refs)
    }

    pub fn used_ratio(&self) -> f64 {
        percent(self.slots_used as u64, self.config.size as u64)
    }
}

/// Everything a caller may want to print after a run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub analysis: Analysis,
    /// `None` when the cache simulator is disabled.
    pub cache: Option<CacheReport>,
}

impl RunReport {
    pub fn new(analysis: &Analysis, cache: &Cache) -> Self {
        let cache = match cache.config().kind {
            CacheKind::Disabled => None,
            _ => Some(CacheReport::from_cache(cache)),
        };
        Self {
            analysis: *analysis,
            cache,
        }
    }
}

impl fmt::Display for Analysis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let total = self.instructions;
        writeln!(f, "=== Analysis")?;
        writeln!(f, "I_count       = {}", total)?;
        writeln!(
            f,
            "DP_count      = {} ({:.2}%)",
            self.data_processing,
            percent(self.data_processing, total)
        )?;
        writeln!(
            f,
            "SDT_count     = {} ({:.2}%)",
            self.memory,
            percent(self.memory, total)
        )?;
        writeln!(
            f,
            "B_count       = {} ({:.2}%)",
            self.branches,
            percent(self.branches, total)
        )?;
        writeln!(
            f,
            "B_taken       = {} ({:.2}%)",
            self.taken,
            percent(self.taken, self.branches)
        )?;
        writeln!(
            f,
            "B_not_taken   = {} ({:.2}%)",
            self.not_taken,
            percent(self.not_taken, self.branches)
        )
    }
}

impl fmt::Display for CacheReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stats = &self.stats;
        writeln!(f, "=== Cache")?;
        match self.config.kind {
            CacheKind::SetAssociative => writeln!(
                f,
                "Type          = {}-way {}",
                self.config.ways(),
                self.config.kind
            )?,
            kind => writeln!(f, "Type          = {}", kind)?,
        }
        writeln!(f, "Size          = {} slots", self.config.size)?;
        writeln!(f, "References    = {}", stats.refs)?;
        writeln!(
            f,
            "Hits          = {} ({:.2}% hit ratio)",
            stats.hits,
            self.hit_ratio()
        )?;
        writeln!(
            f,
            "Misses        = {} ({:.2}% miss ratio)",
            stats.misses,
            self.miss_ratio()
        )?;
        writeln!(f, "Misses (cold) = {}", stats.misses_cold)?;
        writeln!(f, "Misses (hot)  = {}", stats.misses_hot)?;
        writeln!(f, "% Used        = {:.2}%", self.used_ratio())
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.analysis)?;
        if let Some(cache) = &self.cache {
            write!(f, "{}", cache)?;
        }
        Ok(())
    }
}
