use arm_emu::cache::{DEFAULT_CACHE_SLOTS, DEFAULT_WAYS};
use arm_emu::emulator::MAX_ARGS;
use arm_emu::{load_program, CacheConfig, Emulator, EmulatorConfig};
use clap::{Parser, ValueEnum};
use std::fs::File;
use std::io::Read;
use std::path::PathBuf;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum CacheMode {
    Off,
    Direct,
    Assoc,
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Emulate one ARM function call", long_about = None)]
struct Args {
    /// Flat binary or ARM ELF image to load
    binary: PathBuf,

    /// Up to four integer arguments passed in r0-r3 (decimal or 0x hex)
    #[arg(value_parser = parse_word, allow_negative_numbers = true)]
    args: Vec<u32>,

    /// ELF symbol to call instead of the ELF entry point
    #[arg(short, long)]
    function: Option<String>,

    /// Entry address override
    #[arg(long, value_parser = parse_word)]
    entry: Option<u32>,

    /// Base address of the program region
    #[arg(long, value_parser = parse_word, default_value = "0x8000")]
    load_addr: u32,

    /// Program region size in KiB
    #[arg(long, default_value_t = 64)]
    mem_kib: usize,

    /// Instruction cache simulation mode
    #[arg(long, value_enum, default_value_t = CacheMode::Off)]
    cache: CacheMode,

    /// Number of cache slots
    #[arg(long, default_value_t = DEFAULT_CACHE_SLOTS)]
    cache_size: usize,

    /// Slots per set for the set-associative cache
    #[arg(long, default_value_t = DEFAULT_WAYS)]
    ways: usize,

    /// Initial stack pointer (one past the highest stack byte)
    #[arg(long, value_parser = parse_word)]
    stack_top: Option<u32>,

    /// Stack size in bytes
    #[arg(long)]
    stack_size: Option<usize>,

    /// Print instruction analysis counters
    #[arg(short, long)]
    analyze: bool,

    /// Print the result and statistics as JSON
    #[arg(long)]
    json: bool,
}

impl Args {
    fn config(&self) -> EmulatorConfig {
        let cache = match self.cache {
            CacheMode::Off => CacheConfig::disabled(),
            CacheMode::Direct => CacheConfig::direct_mapped(self.cache_size),
            CacheMode::Assoc => CacheConfig::set_associative(self.cache_size, self.ways),
        };
        let mut config = EmulatorConfig::with_cache(cache);
        if let Some(top) = self.stack_top {
            config.stack_top = top;
        }
        if let Some(size) = self.stack_size {
            config.stack_size = size;
        }
        config
    }
}

/// Parse a 32-bit word written as decimal (optionally negative) or `0x` hex.
fn parse_word(s: &str) -> Result<u32, String> {
    let s = s.trim();
    let parsed = if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|e| e.to_string())
    } else if s.starts_with('-') {
        s.parse::<i32>().map(|v| v as u32).map_err(|e| e.to_string())
    } else {
        s.parse::<u32>().map_err(|e| e.to_string())
    };
    parsed.map_err(|e| format!("`{}`: {}", s, e))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args = Args::parse();
    if args.args.len() > MAX_ARGS {
        return Err(format!("At most {} arguments are supported", MAX_ARGS).into());
    }

    let mem_size = args
        .mem_kib
        .checked_mul(1024)
        .ok_or("Requested memory size is too large")?;

    let mut file = File::open(&args.binary)?;
    let mut buffer = Vec::new();
    file.read_to_end(&mut buffer)?;
    log::debug!("Read {} bytes from {}", buffer.len(), args.binary.display());

    let program = load_program(&buffer, args.load_addr, mem_size, args.function.as_deref())?;
    let entry = args.entry.unwrap_or(program.entry);

    let mut emu = Emulator::new(program.memory, &args.config())?;
    let result = match emu.call(entry, &args.args) {
        Ok(result) => result,
        Err(e) => {
            log::error!("{}", e);
            std::process::exit(1);
        }
    };

    let report = emu.report();
    if args.json {
        let value = serde_json::json!({
            "result": result as i32,
            "analysis": report.analysis,
            "cache": report.cache,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("Result: {} ({:#x})", result as i32, result);
    if args.analyze {
        print!("{}", report.analysis);
    }
    if let Some(cache) = &report.cache {
        print!("{}", cache);
    }

    Ok(())
}
