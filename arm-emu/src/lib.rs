pub mod analysis;
pub mod bus;
pub mod cache;
pub mod config;
pub mod cpu;
pub mod decoder;
pub mod emulator;
pub mod loader;
pub mod memory;
pub mod report;

pub use analysis::Analysis;
pub use cache::{Cache, CacheConfig, CacheKind, CacheStats};
pub use config::{ConfigError, EmulatorConfig};
pub use cpu::EmuError;
pub use emulator::Emulator;
pub use loader::{load_program, LoadError, Program};
pub use memory::{Memory, MemoryError};
pub use report::RunReport;
