use lift_core::dump::module_to_string;
use lift_core::{verify_function, InstKind, Intrinsic};
use lift_frontend::{LiftError, VisitState, Worklist};

use super::*;

#[test]
fn straight_line_returns_once() {
    // mov eax, 1 ; ret
    let (m, lifted) = lift(&[0xb8, 0x01, 0x00, 0x00, 0x00, 0xc3]);
    let f = func(&m, &lifted);
    let text = dump(&m, &lifted);

    assert_eq!(lifted.implemented, [0x1000, 0x1005]);
    assert!(lifted.invalid.is_empty());
    assert!(lifted.unresolved.is_empty(), "{text}");
    assert_eq!(count_kind(f, "ret"), 1, "{text}");
    assert_eq!(count_kind(f, "call"), 0, "{text}");
    assert_eq!(count_kind(f, "unreachable"), 0, "{text}");
    assert!(!text.contains("jump_intrin"), "{text}");
    assert!(!text.contains("ret_intrin"), "{text}");
    assert!(verify_function(f).is_ok());

    let entry = f.entry_block().unwrap();
    assert_eq!(f.block(entry).name, "entry");
    assert_eq!(branch_target(f, entry), block_named(f, "asm_1000"));
}

#[test]
fn module_carries_config_and_details() {
    let (m, _) = lift(&[0x90, 0xc3]);
    assert!(m.find_global("x86_64_config").is_some());
    assert!(m.find_global("insn_1000").is_some());
    assert!(m.find_global("insn_1001").is_some());
    let config = &m.global(m.find_global("x86_64_config").unwrap()).init;
    assert_eq!(config.field(0).and_then(|c| c.as_int()), Some(8));
}

#[test]
fn truncated_instruction_becomes_marker() {
    // mov eax, imm32 cut short after one immediate byte.
    let (m, lifted) = lift(&[0xb8, 0x01]);
    let f = func(&m, &lifted);

    assert_eq!(lifted.invalid, [0x1000]);
    assert!(lifted.unresolved.is_empty());
    let marker = block_named(f, "invalid_1000").unwrap();
    let term = f.terminator(marker).unwrap();
    assert_eq!(f.inst(term).kind, InstKind::Unreachable);
    assert_eq!(branch_target(f, f.entry_block().unwrap()), Some(marker));
}

#[test]
fn run_stops_at_bad_encoding() {
    // nop ; (invalid in 64-bit mode: push es)
    let (m, lifted) = lift(&[0x90, 0x06, 0xc3]);
    let f = func(&m, &lifted);

    assert_eq!(lifted.implemented, [0x1000, 0x1001]);
    assert_eq!(lifted.invalid, [0x1001]);
    let nop = block_named(f, "asm_1000").unwrap();
    assert_eq!(branch_target(f, nop), block_named(f, "invalid_1001"));
}

#[test]
fn backward_jump_reuses_block() {
    // 1000: xor eax, eax
    // 1002: je 1006
    // 1004: jmp 1000
    // 1006: ret
    let code = [0x31, 0xc0, 0x74, 0x02, 0xeb, 0xfa, 0xc3];
    let (m, lifted) = lift(&code);
    let f = func(&m, &lifted);
    let text = dump(&m, &lifted);

    assert_eq!(lifted.implemented, [0x1000, 0x1002, 0x1004, 0x1006]);
    assert!(lifted.unresolved.is_empty(), "{text}");
    assert!(!text.contains("dest_"), "{text}");

    let head = block_named(f, "asm_1000").unwrap();
    let back = block_named(f, "asm_1004").unwrap();
    assert_eq!(branch_target(f, back), Some(head));
    assert!(f.predecessors(head).contains(&back));

    let taken = block_named(f, "asm_1002.taken").unwrap();
    assert_eq!(branch_target(f, taken), block_named(f, "asm_1006"));
    let fall = block_named(f, "asm_1002.fallthrough").unwrap();
    assert_eq!(branch_target(f, fall), Some(back));
    assert!(verify_function(f).is_ok());
}

#[test]
fn discovery_follows_jumps_not_bytes() {
    // jmp +1 ; (garbage byte) ; ret
    let (m, lifted) = lift(&[0xeb, 0x01, 0xff, 0xc3]);
    assert_eq!(lifted.implemented, [0x1000, 0x1003]);
    assert!(lifted.invalid.is_empty());
    assert!(block_named(func(&m, &lifted), "asm_1002").is_none());
}

#[test]
fn self_loop_terminates() {
    // jmp $
    let (m, lifted) = lift(&[0xeb, 0xfe]);
    let f = func(&m, &lifted);
    let b = block_named(f, "asm_1000").unwrap();
    assert_eq!(lifted.implemented, [0x1000]);
    assert_eq!(branch_target(f, b), Some(b));
}

#[test]
fn jump_outside_code_is_invalid() {
    // jmp 0x2005
    let (_, lifted) = lift(&[0xe9, 0x00, 0x10, 0x00, 0x00]);
    assert_eq!(lifted.invalid, [0x2005]);
    assert_eq!(lifted.implemented, [0x1000, 0x2005]);
}

#[test]
fn entry_inside_code() {
    // 1000: ud2 ; 1002: ret
    let mut ctx = context64();
    let lifted = ctx
        .create_function_at("tail", BASE, &[0x0f, 0x0b, 0xc3], 0x1002)
        .unwrap();
    assert_eq!(lifted.implemented, [0x1002]);
}

#[test]
fn lifting_is_deterministic() {
    let code = [
        0x55, // push rbp
        0x48, 0x89, 0xe5, // mov rbp, rsp
        0x8b, 0x45, 0xfc, // mov eax, [rbp-4]
        0x85, 0xc0, // test eax, eax
        0x75, 0x03, // jne +3
        0x83, 0xc0, 0x01, // add eax, 1
        0x5d, // pop rbp
        0xc3, // ret
    ];
    let (a, _) = lift(&code);
    let (b, _) = lift(&code);
    assert_eq!(module_to_string(&a), module_to_string(&b));
}

#[test]
fn addresses_are_implemented_once() {
    // Two branches into the same join point.
    // 1000: test eax, eax
    // 1002: je 1008
    // 1004: jne 1008
    // 1006: nop ; nop
    // 1008: ret
    let code = [0x85, 0xc0, 0x74, 0x04, 0x75, 0x02, 0x90, 0x90, 0xc3];
    let (m, lifted) = lift(&code);
    let f = func(&m, &lifted);

    let mut sorted = lifted.implemented.clone();
    sorted.dedup();
    assert_eq!(sorted, lifted.implemented);
    let asm_blocks: Vec<&str> = f
        .blocks()
        .iter()
        .map(|&b| f.block(b).name.as_str())
        .filter(|n| *n == "asm_1008")
        .collect();
    assert_eq!(asm_blocks.len(), 1);
    assert_eq!(f.predecessors(block_named(f, "asm_1008").unwrap()).len(), 3);
}

#[test]
fn calls_are_recorded_not_followed() {
    // 1000: call 100a ; 1005: ret
    let (m, lifted) = lift(&[0xe8, 0x05, 0x00, 0x00, 0x00, 0xc3]);
    let f = func(&m, &lifted);

    assert_eq!(lifted.call_targets, [0x100a]);
    assert_eq!(lifted.implemented, [0x1000, 0x1005]);
    assert_eq!(lifted.unresolved.len(), 1);
    let site = lifted.unresolved[0];
    assert_eq!(site.intrinsic, Intrinsic::Call);
    assert_eq!(site.address, 0x1000);
    // The return address push became a store.
    assert!(count_kind(f, "store") > 0);
    assert!(!dump(&m, &lifted).contains("write_mem"));
}

#[test]
fn indirect_jump_stays_outstanding() {
    // jmp rax
    let (_, lifted) = lift(&[0xff, 0xe0]);
    assert_eq!(lifted.unresolved.len(), 1);
    assert_eq!(lifted.unresolved[0].intrinsic, Intrinsic::Jump);
    assert_eq!(lifted.unresolved[0].address, 0x1000);
}

#[test]
fn missing_semantics_is_an_error() {
    // cpuid
    let err = try_lift(&[0x0f, 0xa2]).unwrap_err();
    match err {
        LiftError::MissingSemantics { mnemonic, address } => {
            assert_eq!(mnemonic, "cpuid");
            assert_eq!(address, 0x1000);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn context_is_reusable_after_error() {
    let mut ctx = context64();
    assert!(ctx.create_function("bad", BASE, &[0x0f, 0xa2]).is_err());
    let ok = ctx.create_function("good", BASE, &[0xc3]).unwrap();
    assert_eq!(ctx.module().function(ok.id).name(), "good");
}

#[test]
fn failed_routine_leaves_no_globals() {
    let mut ctx = context64();
    let before = ctx.module().globals().len();
    // nop; mov es, ax
    let err = ctx.create_function("bad", BASE, &[0x90, 0x8e, 0xc0]);
    assert!(matches!(err, Err(LiftError::UnsupportedOperand { .. })));
    assert_eq!(ctx.module().globals().len(), before);
    assert!(ctx.module().find_global("insn_1000").is_none());

    ctx.create_function("good", BASE, &[0x90, 0xc3]).unwrap();
    assert!(ctx.module().find_global("insn_1000").is_some());
    assert!(ctx.module().find_global("insn_1000.1").is_none());
}

#[test]
fn several_routines_share_a_module() {
    let mut ctx = context64();
    let a = ctx.create_function("a", BASE, &[0x90, 0xc3]).unwrap();
    let b = ctx.create_function("b", BASE, &[0x90, 0xc3]).unwrap();
    let m = ctx.take();
    assert_ne!(a.id, b.id);
    assert!(m.find_function("a").is_some());
    assert!(m.find_function("b").is_some());
    // Instruction details are not shadowed.
    assert!(m.find_global("insn_1000").is_some());
    assert!(m.find_global("insn_1000.1").is_some());
    assert!(ctx.module().functions().is_empty());
}

/// xorshift64: deterministic pseudo-random code bytes.
fn noise(seed: u64, len: usize) -> Vec<u8> {
    let mut x = seed | 1;
    (0..len)
        .map(|_| {
            x ^= x << 13;
            x ^= x >> 7;
            x ^= x << 17;
            x as u8
        })
        .collect()
}

#[test]
fn arbitrary_bytes_terminate() {
    for seed in 0..64u64 {
        let code = noise(seed.wrapping_mul(0x9e37_79b9_7f4a_7c15), 48);
        for mut ctx in [context64(), context32()] {
            match ctx.create_function("noise", BASE, &code) {
                Ok(lifted) => {
                    let f = ctx.module().function(lifted.id);
                    assert!(verify_function(f).is_ok());
                    for addr in &lifted.invalid {
                        assert!(lifted.implemented.contains(addr));
                    }
                }
                Err(LiftError::MissingSemantics { .. })
                | Err(LiftError::UnsupportedOperand { .. }) => {}
                Err(other) => panic!("seed {seed}: {other}"),
            }
        }
    }
}

#[test]
fn every_truncation_terminates() {
    let code = [
        0x48, 0x8b, 0x44, 0x24, 0x08, // mov rax, [rsp+8]
        0x48, 0x05, 0x78, 0x56, 0x34, 0x12, // add rax, 0x12345678
        0xc3,
    ];
    for len in 0..=code.len() {
        let mut ctx = context64();
        let lifted = ctx.create_function("cut", BASE, &code[..len]).unwrap();
        if len < code.len() {
            assert_eq!(lifted.invalid.len(), 1, "len {len}");
        } else {
            assert!(lifted.invalid.is_empty());
        }
    }
}

#[test]
fn worklist_deduplicates() {
    let mut wl = Worklist::new();
    assert!(wl.push(0x10));
    assert!(!wl.push(0x10));
    assert!(wl.push(0x20));
    assert_eq!(wl.len(), 2);

    assert_eq!(wl.pop(), Some(0x10));
    assert_eq!(wl.state(0x10), Some(VisitState::InProgress));
    wl.mark(0x10, VisitState::Implemented);
    assert!(!wl.push(0x10));
    assert_eq!(wl.pop(), Some(0x20));
    assert!(wl.is_empty());
    assert_eq!(wl.pop(), None);
}
