//! Emulator configuration and configuration errors.

use crate::bus::{STACK_SIZE, STACK_TOP};
use crate::cache::{CacheConfig, CacheKind};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors detected before a run starts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Invalid {kind} cache geometry (size={size}, ways={ways}): {reason}")]
    CacheGeometry {
        kind: CacheKind,
        size: usize,
        ways: usize,
        reason: &'static str,
    },

    #[error("Invalid stack geometry: top={top:#010x}, size={size}")]
    StackGeometry { top: u32, size: usize },

    #[error(
        "Program region {program_base:#010x}+{program_size:#x} overlaps stack {stack_base:#010x}+{stack_size:#x}"
    )]
    RegionOverlap {
        program_base: u32,
        program_size: usize,
        stack_base: u32,
        stack_size: usize,
    },
}

/// Everything needed to build an [`crate::Emulator`] besides the program
/// image itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmulatorConfig {
    pub cache: CacheConfig,
    /// Address one past the highest stack byte; the initial SP.
    pub stack_top: u32,
    /// Stack size in bytes.
    pub stack_size: usize,
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            stack_top: STACK_TOP,
            stack_size: STACK_SIZE,
        }
    }
}

impl EmulatorConfig {
    /// Default layout with the given cache configuration.
    pub fn with_cache(cache: CacheConfig) -> Self {
        Self {
            cache,
            ..Self::default()
        }
    }

    /// Convenience constructor for a cache-less configuration.
    pub fn without_cache() -> Self {
        Self::with_cache(CacheConfig::disabled())
    }
}
