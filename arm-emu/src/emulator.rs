use crate::analysis::Analysis;
use crate::bus::SystemBus;
use crate::cache::Cache;
use crate::config::{ConfigError, EmulatorConfig};
use crate::cpu::{Cpu, EmuError};
use crate::decoder::{decode, Register};
use crate::memory::Memory;
use crate::report::RunReport;

/// Number of arguments passed in registers.
pub const MAX_ARGS: usize = 4;

/// One emulated call: register state, guest memory, instruction cache and
/// counters, owned together and never shared between runs.
///
/// ```ignore
/// let mut emu = Emulator::new(program, &EmulatorConfig::default())?;
/// let result = emu.call(entry, &[5, 0, 0, 0])?;
/// println!("{}", emu.report());
/// ```
pub struct Emulator {
    pub cpu: Cpu,
    pub bus: SystemBus,
    pub cache: Cache,
    pub analysis: Analysis,
}

impl Emulator {
    /// Build an emulator around a loaded program region.
    pub fn new(program: Memory, config: &EmulatorConfig) -> Result<Self, ConfigError> {
        let bus = SystemBus::new(program, config.stack_top, config.stack_size)?;
        let cache = Cache::new(config.cache)?;
        Ok(Self {
            cpu: Cpu::new(),
            bus,
            cache,
            analysis: Analysis::new(),
        })
    }

    /// Prepare a call to the function at `entry`.
    ///
    /// Registers, stack, counters and cache start empty. The first four
    /// `args` go to r0-r3, LR holds the return sentinel 0 and SP points one
    /// past the top stack word.
    pub fn bootstrap(&mut self, entry: u32, args: &[u32]) {
        if args.len() > MAX_ARGS {
            log::warn!(
                "{} arguments supplied, only the first {} are passed",
                args.len(),
                MAX_ARGS
            );
        }

        self.cpu.reset();
        self.bus.stack.clear();
        self.cpu.set_pc(entry);
        self.cpu.write_reg(Register::LR, 0);
        self.cpu.write_reg(Register::SP, self.bus.stack_top());
        for (i, &arg) in args.iter().take(MAX_ARGS).enumerate() {
            self.cpu.regs[i] = arg;
        }

        self.analysis.reset();
        self.cache.reset();

        log::debug!(
            "bootstrap: entry={:#010x} sp={:#010x} args={:x?}",
            entry,
            self.bus.stack_top(),
            &self.cpu.regs[..MAX_ARGS]
        );
    }

    /// Whether the emulated call has returned.
    pub fn finished(&self) -> bool {
        self.cpu.pc() == 0
    }

    /// One fetch-decode-execute cycle.
    pub fn step(&mut self) -> Result<(), EmuError> {
        let pc = self.cpu.pc();
        self.analysis.instructions += 1;

        let word = self
            .cache
            .lookup(&self.bus, pc)
            .map_err(|source| EmuError::Memory { pc, source })?;
        let op = decode(word).ok_or(EmuError::InvalidInstruction { word, pc })?;

        log::trace!("{:#010x}: {:08x} {:?}", pc, word, op);

        self.cpu.execute(op, word, &mut self.bus, &mut self.analysis)
    }

    /// Run until the program counter reaches the sentinel 0 and return r0.
    pub fn run(&mut self) -> Result<u32, EmuError> {
        while !self.finished() {
            self.step()?;
        }
        let result = self.cpu.read_reg(Register::R0);
        log::info!(
            "run finished: result={} ({:#x}) after {} instructions",
            result as i32,
            result,
            self.analysis.instructions
        );
        Ok(result)
    }

    /// Bootstrap a call to `entry` and run it to completion.
    pub fn call(&mut self, entry: u32, args: &[u32]) -> Result<u32, EmuError> {
        self.bootstrap(entry, args);
        self.run()
    }

    /// Snapshot of the counters for reporting.
    pub fn report(&self) -> RunReport {
        RunReport::new(&self.analysis, &self.cache)
    }
}
