use lift_core::*;
use lift_frontend::intrinsics::resolve_intrinsics;
use lift_frontend::x86::cpu::{CONFIG_32, CONFIG_64};
use lift_frontend::{ResultFunction, Substitution, Worklist};

fn fragment(name: &str) -> Function {
    let mut f = Function::new(name, vec![Type::Ptr(AddrSpace::Emulator)]);
    f.add_block("entry");
    f
}

/// `asm_2000`: `regs[0] = read_mem(0x3000, size)`.
fn read_fragment(size: Value) -> Function {
    let mut f = fragment("asm_2000");
    let mut ir = IrBuilder::new(&mut f);
    let v = ir.gen_intrinsic(
        Intrinsic::ReadMem,
        Type::I64,
        vec![Value::const_int(Type::I64, 0x3000), size],
    );
    let slot = ir.gen_field_ptr(Value::Param(0), 0);
    ir.gen_store(slot, v);
    ir.gen_ret();
    f
}

fn find(f: &Function, pred: impl Fn(&InstKind) -> bool) -> Option<InstId> {
    f.insts().find(|&i| pred(&f.inst(i).kind))
}

#[test]
fn read_mem_becomes_guest_load() {
    let mut rf = ResultFunction::new("f");
    rf.eat(&read_fragment(Value::const_int(Type::I64, 4)), 0x2000);
    let mut wl = Worklist::new();

    let stats = resolve_intrinsics(&mut rf, &CONFIG_64, &mut wl);
    assert_eq!(stats.resolved, 1);
    assert_eq!(stats.unresolved, 0);
    assert!(rf.outstanding().is_empty());

    let f = rf.func();
    assert!(find(f, |k| k.intrinsic().is_some()).is_none());

    let load = find(f, |k| matches!(k, InstKind::Load { .. })).unwrap();
    assert_eq!(f.inst(load).ty, Type::I32);
    let InstKind::Load { ptr } = f.inst(load).kind else {
        unreachable!()
    };
    assert_eq!(f.value_type(ptr), Type::Ptr(AddrSpace::Guest));

    let zext = find(f, |k| {
        matches!(k, InstKind::Cast { op: CastOp::ZExt, .. })
    })
    .unwrap();
    assert_eq!(f.inst(zext).ty, Type::I64);
    assert_eq!(f.users(load), vec![zext]);

    let store = find(f, |k| matches!(k, InstKind::Store { .. })).unwrap();
    let InstKind::Store { value, .. } = f.inst(store).kind else {
        unreachable!()
    };
    assert_eq!(value, Value::Inst(zext));
    assert!(verify_function(f).is_ok());
}

#[test]
fn full_width_read_needs_no_extension() {
    let mut rf = ResultFunction::new("f");
    rf.eat(&read_fragment(Value::const_int(Type::I64, 8)), 0x2000);
    resolve_intrinsics(&mut rf, &CONFIG_64, &mut Worklist::new());

    let f = rf.func();
    let load = find(f, |k| matches!(k, InstKind::Load { .. })).unwrap();
    assert_eq!(f.inst(load).ty, Type::I64);
    let is_zext = |k: &InstKind| {
        matches!(k, InstKind::Cast { op: CastOp::ZExt, .. })
    };
    assert!(find(f, is_zext).is_none());
}

#[test]
fn unsupported_widths_stay_outstanding() {
    // Wider than the register file's address size.
    let mut rf = ResultFunction::new("f");
    rf.eat(&read_fragment(Value::const_int(Type::I64, 8)), 0x2000);
    let stats = resolve_intrinsics(&mut rf, &CONFIG_32, &mut Worklist::new());
    assert_eq!(stats.resolved, 0);
    assert_eq!(stats.unresolved, 1);

    // Not a power of two.
    let mut rf = ResultFunction::new("f");
    rf.eat(&read_fragment(Value::const_int(Type::I64, 3)), 0x2000);
    resolve_intrinsics(&mut rf, &CONFIG_64, &mut Worklist::new());
    assert_eq!(rf.outstanding().len(), 1);

    // Unknown at translation time.
    let mut rf = ResultFunction::new("f");
    let mut frag = fragment("asm_2000");
    let mut ir = IrBuilder::new(&mut frag);
    let size = ir.gen_load(Type::I64, Value::Param(0));
    ir.gen_intrinsic(
        Intrinsic::ReadMem,
        Type::I64,
        vec![Value::const_int(Type::I64, 0x3000), size],
    );
    ir.gen_ret();
    rf.eat(&frag, 0x2000);
    resolve_intrinsics(&mut rf, &CONFIG_64, &mut Worklist::new());
    let left = rf.outstanding();
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].intrinsic, Intrinsic::ReadMem);
    assert_eq!(left[0].address, 0x2000);
}

#[test]
fn write_mem_truncates_to_access_width() {
    let mut frag = fragment("asm_2000");
    let mut ir = IrBuilder::new(&mut frag);
    let value = ir.gen_load(Type::I64, Value::Param(0));
    ir.gen_intrinsic(
        Intrinsic::WriteMem,
        Type::Void,
        vec![
            Value::const_int(Type::I64, 0x3000),
            Value::const_int(Type::I64, 2),
            value,
        ],
    );
    ir.gen_ret();

    let mut rf = ResultFunction::new("f");
    rf.eat(&frag, 0x2000);
    resolve_intrinsics(&mut rf, &CONFIG_64, &mut Worklist::new());

    let f = rf.func();
    assert!(rf.outstanding().is_empty());
    let guest_store = f
        .insts()
        .filter(|&i| matches!(f.inst(i).kind, InstKind::Store { .. }))
        .find_map(|i| match f.inst(i).kind {
            InstKind::Store { ptr, value } => {
                (f.value_type(ptr) == Type::Ptr(AddrSpace::Guest))
                    .then_some(value)
            }
            _ => None,
        })
        .unwrap();
    assert_eq!(f.value_type(guest_store), Type::I16);
}

/// `asm_<address>`: jump placeholder to `dest`.
fn jump_fragment(address: u64, dest: Value) -> Function {
    let mut f = fragment(&format!("asm_{address:x}"));
    let mut ir = IrBuilder::new(&mut f);
    ir.gen_intrinsic(
        Intrinsic::Jump,
        Type::Void,
        vec![Value::Param(0), Value::Param(0), dest],
    );
    ir.gen_unreachable();
    f
}

#[test]
fn jump_to_unknown_address_is_queued() {
    let mut rf = ResultFunction::new("f");
    rf.eat(&jump_fragment(0x10, Value::const_int(Type::I64, 0x40)), 0x10);
    let mut wl = Worklist::new();

    let stats = resolve_intrinsics(&mut rf, &CONFIG_64, &mut wl);
    assert_eq!(stats.discovered, 1);
    assert_eq!(wl.pop(), Some(0x40));

    let f = rf.func();
    let src = rf.get_implemented_block(0x10).unwrap();
    let term = f.terminator(src).unwrap();
    let InstKind::Br { dest } = f.inst(term).kind else {
        panic!("expected a branch");
    };
    assert_eq!(f.block(dest).name, "dest_40");

    // Implementing the address later redirects the branch.
    let mut target = fragment("asm_40");
    IrBuilder::new(&mut target).gen_ret();
    rf.eat(&target, 0x40);
    let f = rf.func();
    let InstKind::Br { dest } = f.inst(f.terminator(src).unwrap()).kind else {
        panic!("expected a branch");
    };
    assert_eq!(Some(dest), rf.get_implemented_block(0x40));
    assert_eq!(f.num_blocks(), 2);
    assert!(verify_function(f).is_ok());
}

#[test]
fn jump_to_known_address_is_not_queued() {
    let mut rf = ResultFunction::new("f");
    rf.eat(&jump_fragment(0x10, Value::const_int(Type::I64, 0x10)), 0x10);
    let mut wl = Worklist::new();
    let stats = resolve_intrinsics(&mut rf, &CONFIG_64, &mut wl);
    assert_eq!(stats.discovered, 0);
    assert!(wl.is_empty());
    let b = rf.get_implemented_block(0x10).unwrap();
    assert_eq!(rf.func().successors(b), vec![b]);
}

#[test]
fn cursor_survives_mutation() {
    let mut rf = ResultFunction::new("f");
    let mut frag = fragment("asm_10");
    let mut ir = IrBuilder::new(&mut frag);
    ir.gen_intrinsic(
        Intrinsic::WriteMem,
        Type::Void,
        vec![
            Value::const_int(Type::I64, 0x3000),
            Value::const_int(Type::I64, 8),
            Value::const_int(Type::I64, 7),
        ],
    );
    ir.gen_intrinsic(
        Intrinsic::Ret,
        Type::Void,
        vec![Value::Param(0), Value::Param(0)],
    );
    ir.gen_unreachable();
    rf.eat(&frag, 0x10);

    let first = rf.next_intrinsic(None).unwrap();
    assert_eq!(first.intrinsic, Intrinsic::WriteMem);
    let second = rf.skip(first).unwrap();
    assert_eq!(second.intrinsic, Intrinsic::Ret);

    let next = rf.substitute(second, Substitution::Return);
    assert!(next.is_none());
    let next = rf.substitute(first, Substitution::Erase);
    assert!(next.is_none());
    assert!(rf.outstanding().is_empty());

    let f = rf.finalize();
    assert_eq!(f.num_insts(), 1);
    assert!(verify_function(&f).is_ok());
}

#[test]
fn placeholder_reached_from_two_fragments() {
    let mut rf = ResultFunction::new("f");
    let start = jump_fragment(0, Value::const_int(Type::I64, 0x10));
    let entry = rf.eat_entry(&start);
    assert_eq!(rf.entry(), entry.entry);
    assert_eq!(rf.entry(), rf.func().entry_block());

    let dest = Value::const_int(Type::I64, 0x40);
    rf.eat(&jump_fragment(0x10, dest), 0x10);
    rf.eat(&jump_fragment(0x20, dest), 0x20);
    let mut wl = Worklist::new();
    let stats = resolve_intrinsics(&mut rf, &CONFIG_64, &mut wl);
    assert_eq!(stats.discovered, 1);
    assert_eq!(rf.func().num_blocks(), 4);

    let mut target = fragment("asm_40");
    IrBuilder::new(&mut target).gen_ret();
    rf.eat(&target, 0x40);

    let f = rf.func();
    let implemented = rf.get_implemented_block(0x40);
    for src in [0x10, 0x20] {
        let b = rf.get_implemented_block(src).unwrap();
        assert_eq!(f.successors(b).first().copied(), implemented);
    }
    assert!(f.blocks().iter().all(|&b| f.block(b).name != "dest_40"));
    assert!(verify_function(f).is_ok());
}

#[test]
fn read_result_is_rewired_in_its_own_fragment() {
    let mut rf = ResultFunction::new("f");
    rf.eat(&read_fragment(Value::const_int(Type::I64, 8)), 0x2000);
    let mut other = fragment("asm_3000");
    let mut ir = IrBuilder::new(&mut other);
    let slot = ir.gen_field_ptr(Value::Param(0), 8);
    ir.gen_store(slot, Value::const_int(Type::I64, 1));
    ir.gen_ret();
    rf.eat(&other, 0x3000);

    resolve_intrinsics(&mut rf, &CONFIG_64, &mut Worklist::new());
    let f = rf.func();
    let load = find(f, |k| matches!(k, InstKind::Load { .. })).unwrap();
    let block = rf.get_implemented_block(0x2000).unwrap();
    assert_eq!(f.inst(load).block, block);
    assert_eq!(f.users(load).len(), 1);
    assert!(verify_function(f).is_ok());
}
