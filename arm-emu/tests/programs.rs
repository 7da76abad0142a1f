//! Whole-program runs through the public API.

use arm_emu::{Analysis, CacheConfig, EmuError, Emulator, EmulatorConfig, Memory};

const BASE: u32 = 0x8000;

fn emulator(words: &[u32], config: EmulatorConfig) -> Emulator {
    let mut program = Memory::new(BASE, 0x1000);
    program.write_words(BASE, words).unwrap();
    Emulator::new(program, &config).unwrap()
}

fn run(words: &[u32], args: &[u32]) -> (u32, Analysis) {
    let mut emu = emulator(words, EmulatorConfig::without_cache());
    let result = emu.call(BASE, args).unwrap();
    (result, emu.analysis)
}

const IDENTITY: [u32; 2] = [
    0xE1A0_0000, // mov r0, r0
    0xE12F_FF1E, // bx lr
];

const ADD_TWO: [u32; 2] = [
    0xE080_0001, // add r0, r0, r1
    0xE12F_FF1E, // bx lr
];

/// Sum of 1..=r0.
const SUM_LOOP: [u32; 8] = [
    0xE3A0_1000, // 0x00: mov r1, #0
    0xE350_0000, // 0x04: cmp r0, #0
    0x0A00_0002, // 0x08: beq 0x18
    0xE081_1000, // 0x0c: add r1, r1, r0
    0xE240_0001, // 0x10: sub r0, r0, #1
    0xEAFF_FFFA, // 0x14: b 0x04
    0xE1A0_0001, // 0x18: mov r0, r1
    0xE12F_FF1E, // 0x1c: bx lr
];

/// r0 factorial.
const FACTORIAL: [u32; 8] = [
    0xE1A0_1000, // 0x00: mov r1, r0
    0xE3A0_0001, // 0x04: mov r0, #1
    0xE351_0001, // 0x08: cmp r1, #1
    0xBA00_0002, // 0x0c: blt 0x1c
    0xE000_0190, // 0x10: mul r0, r0, r1
    0xE241_1001, // 0x14: sub r1, r1, #1
    0xEAFF_FFFA, // 0x18: b 0x08
    0xE12F_FF1E, // 0x1c: bx lr
];

/// Saves LR on the stack around a call to a helper returning r0 + r1.
const NESTED_CALL: [u32; 8] = [
    0xE24D_D004, // 0x00: sub sp, sp, #4
    0xE58D_E000, // 0x04: str lr, [sp]
    0xEB00_0002, // 0x08: bl 0x18
    0xE59D_E000, // 0x0c: ldr lr, [sp]
    0xE28D_D004, // 0x10: add sp, sp, #4
    0xE12F_FF1E, // 0x14: bx lr
    0xE080_0001, // 0x18: add r0, r0, r1
    0xE12F_FF1E, // 0x1c: bx lr
];

#[test]
fn test_identity() {
    let (result, analysis) = run(&IDENTITY, &[5]);
    assert_eq!(result, 5);
    assert_eq!(analysis.instructions, 2);
    assert_eq!(analysis.data_processing, 1);
    assert_eq!(analysis.branches, 1);
    assert_eq!(analysis.taken, 1);
}

#[test]
fn test_add_arguments() {
    let (result, analysis) = run(&ADD_TWO, &[2, 3]);
    assert_eq!(result, 5);
    assert_eq!(analysis.data_processing, 1);
    assert_eq!(analysis.branches, 1);
    assert_eq!(analysis.taken, 1);
    assert_eq!(analysis.not_taken, 0);
}

#[test]
fn test_negative_result() {
    let (result, _) = run(&ADD_TWO, &[3, (-10i32) as u32]);
    assert_eq!(result as i32, -7);
}

#[test]
fn test_false_condition_falls_through() {
    let words = [
        0xE350_0000, // cmp r0, #0
        0x0A00_0000, // beq +8 (skip next)
        0xE280_0001, // add r0, r0, #1
        0xE12F_FF1E, // bx lr
    ];
    let (result, analysis) = run(&words, &[1]);
    assert_eq!(result, 2);
    assert_eq!(analysis.not_taken, 1);

    let (result, analysis) = run(&words, &[0]);
    assert_eq!(result, 0);
    assert_eq!(analysis.taken, 2);
    assert_eq!(analysis.not_taken, 0);
}

#[test]
fn test_compare_with_pc_rd_field_returns() {
    let words = [
        0xE350_F000, // cmp r0, #0 (Rd field = 1111)
        0xE12F_FF1E, // bx lr
    ];
    let (result, analysis) = run(&words, &[9]);
    assert_eq!(result, 9);
    assert_eq!(analysis.instructions, 2);
    assert_eq!(analysis.data_processing, 1);
}

#[test]
fn test_sum_loop_counters() {
    let (result, analysis) = run(&SUM_LOOP, &[4]);
    assert_eq!(result, 10);
    assert_eq!(
        analysis,
        Analysis {
            instructions: 25,
            data_processing: 15,
            memory: 0,
            branches: 10,
            taken: 6,
            not_taken: 4,
        }
    );
}

#[test]
fn test_factorial() {
    assert_eq!(run(&FACTORIAL, &[0]).0, 1);
    assert_eq!(run(&FACTORIAL, &[5]).0, 120);
    assert_eq!(run(&FACTORIAL, &[10]).0, 3_628_800);
}

#[test]
fn test_nested_call_uses_stack() {
    let (result, analysis) = run(&NESTED_CALL, &[3, 4]);
    assert_eq!(result, 7);
    assert_eq!(analysis.instructions, 8);
    assert_eq!(analysis.memory, 2);
    assert_eq!(analysis.data_processing, 3);
    assert_eq!(analysis.branches, 3);
    assert_eq!(analysis.taken, 3);
}

#[test]
fn test_branch_counts_balance() {
    for n in 0..6 {
        let (_, analysis) = run(&SUM_LOOP, &[n]);
        assert_eq!(analysis.taken + analysis.not_taken, analysis.branches);
        assert!(analysis.data_processing + analysis.memory + analysis.branches <= analysis.instructions);
    }
}

#[test]
fn test_direct_mapped_cache_run() {
    let mut emu = emulator(&SUM_LOOP, EmulatorConfig::with_cache(CacheConfig::direct_mapped(16)));
    assert_eq!(emu.call(BASE, &[4]).unwrap(), 10);

    let report = emu.report();
    let cache = report.cache.expect("cache enabled");
    assert_eq!(cache.stats.refs, report.analysis.instructions);
    assert_eq!(cache.stats.misses_cold, 8);
    assert_eq!(cache.stats.misses_hot, 0);
    assert_eq!(cache.stats.hits, 17);
    assert_eq!(cache.slots_used, 8);
}

#[test]
fn test_direct_mapped_conflicts() {
    // Eight instructions through four slots: every loop pass evicts.
    let mut emu = emulator(&SUM_LOOP, EmulatorConfig::with_cache(CacheConfig::direct_mapped(4)));
    assert_eq!(emu.call(BASE, &[4]).unwrap(), 10);

    let stats = emu.cache.stats();
    assert_eq!(stats.refs, 25);
    assert_eq!(stats.misses_cold, 4);
    assert!(stats.misses_hot > 0);
    assert_eq!(stats.hits + stats.misses, stats.refs);
}

#[test]
fn test_set_associative_cache_run() {
    let config = EmulatorConfig::with_cache(CacheConfig::set_associative(16, 4));
    let mut emu = emulator(&SUM_LOOP, config);
    assert_eq!(emu.call(BASE, &[4]).unwrap(), 10);

    let stats = emu.cache.stats();
    assert_eq!(stats.refs, 25);
    assert_eq!(stats.misses_cold, 8);
    assert_eq!(stats.misses_hot, 0);
    assert_eq!(stats.hits, 17);

    let text = emu.report().to_string();
    assert!(text.contains("Type          = 4-way set associative"));
    assert!(text.contains("% Used        = 50.00%"));
}

#[test]
fn test_cache_does_not_change_results() {
    let configs = [
        EmulatorConfig::without_cache(),
        EmulatorConfig::with_cache(CacheConfig::direct_mapped(2)),
        EmulatorConfig::with_cache(CacheConfig::set_associative(16, 4)),
    ];
    for config in configs {
        let mut emu = emulator(&FACTORIAL, config);
        assert_eq!(emu.call(BASE, &[6]).unwrap(), 720);
        assert_eq!(emu.analysis.instructions, 2 + 6 * 5 + 2 + 1);
    }
}

#[test]
fn test_unsupported_instruction_stops_run() {
    let words = [
        0xE280_0001, // add r0, r0, #1
        0xE180_0001, // orr r0, r0, r1
        0xE12F_FF1E,
    ];
    let mut emu = emulator(&words, EmulatorConfig::without_cache());
    let err = emu.call(BASE, &[0]).unwrap_err();
    assert_eq!(
        err,
        EmuError::InvalidInstruction {
            word: 0xE180_0001,
            pc: BASE + 4
        }
    );
    assert_eq!(err.pc(), BASE + 4);
    assert_eq!(emu.cpu.regs[0], 1);
}

#[test]
fn test_load_outside_memory_is_fatal() {
    let words = [
        0xE590_0000, // ldr r0, [r0]
        0xE12F_FF1E,
    ];
    let mut emu = emulator(&words, EmulatorConfig::without_cache());
    let err = emu.call(BASE, &[0x4000_0000]).unwrap_err();
    assert!(matches!(err, EmuError::Memory { pc: BASE, .. }));
}

#[test]
fn test_report_json() {
    let mut emu = emulator(&ADD_TWO, EmulatorConfig::with_cache(CacheConfig::direct_mapped(16)));
    emu.call(BASE, &[1, 1]).unwrap();
    let json = serde_json::to_value(emu.report()).unwrap();
    assert_eq!(json["analysis"]["instructions"], 2);
    assert_eq!(json["cache"]["stats"]["misses_cold"], 2);
    assert_eq!(json["cache"]["config"]["kind"], "direct-mapped");
}
