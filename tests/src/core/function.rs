use lift_core::dump::function_to_string;
use lift_core::*;

fn regs_param() -> Vec<Type> {
    vec![Type::Ptr(AddrSpace::Emulator)]
}

/// `frag(regs)`: store 42 into regs[8] and return.
fn store_fragment() -> Function {
    let mut f = Function::new("frag", regs_param());
    f.add_block("entry");
    let mut ir = IrBuilder::new(&mut f);
    let ptr = ir.gen_field_ptr(Value::Param(0), 8);
    ir.gen_store(ptr, Value::const_int(Type::I64, 42));
    ir.gen_ret();
    f
}

#[test]
fn block_names_are_unique() {
    let mut f = Function::new("f", regs_param());
    let a = f.add_block("bb");
    let b = f.add_block("bb");
    assert_ne!(f.block(a).name, f.block(b).name);
    assert_eq!(f.entry_block(), Some(a));
}

#[test]
fn builder_emits_in_order() {
    let f = store_fragment();
    let kinds: Vec<&str> = f.insts().map(|i| f.inst(i).kind.name()).collect();
    assert_eq!(kinds.len(), 3);
    assert!(matches!(
        f.inst(f.terminator(f.blocks()[0]).unwrap()).kind,
        InstKind::Ret
    ));
    assert!(verify_function(&f).is_ok());
}

#[test]
fn splice_maps_params_and_names_entry() {
    let frag = store_fragment();
    let mut host = Function::new("host", regs_param());
    let map = host.splice(&frag, &[Value::Param(0)]);

    let entry = map.entry.unwrap();
    assert_eq!(host.block(entry).name, "frag");
    assert_eq!(host.num_insts(), 3);
    for id in host.insts() {
        for op in host.inst(id).kind.operands() {
            if let Value::Inst(used) = op {
                assert!(host.is_live(used));
                assert_eq!(host.inst(used).block, entry);
            }
        }
    }
    assert!(verify_function(&host).is_ok());
}

#[test]
fn splice_turns_captures_into_instructions() {
    let mut host = Function::new("host", regs_param());
    host.add_block("entry");
    let slot = {
        let mut ir = IrBuilder::new(&mut host);
        let slot = ir.gen_alloca(8);
        ir.gen_unreachable();
        slot.as_inst().unwrap()
    };

    let mut frag = Function::new("frag", regs_param());
    frag.add_block("entry");
    let mut ir = IrBuilder::new(&mut frag);
    let captured = Value::Capture {
        inst: slot,
        ty: Type::Ptr(AddrSpace::Emulator),
    };
    ir.gen_store(captured, Value::const_int(Type::I8, 1));
    ir.gen_unreachable();
    assert!(matches!(
        verify_function(&frag),
        Err(VerifyError::StrayCapture { .. })
    ));

    host.splice(&frag, &[Value::Param(0)]);
    let store = host
        .insts()
        .find(|&i| matches!(host.inst(i).kind, InstKind::Store { .. }))
        .unwrap();
    let InstKind::Store { ptr, .. } = host.inst(store).kind else {
        unreachable!()
    };
    assert_eq!(ptr, Value::Inst(slot));
    assert!(verify_function(&host).is_ok());
}

#[test]
fn splice_keeps_internal_branches() {
    let mut frag = Function::new("frag", regs_param());
    frag.add_block("entry");
    let mut ir = IrBuilder::new(&mut frag);
    let taken = ir.create_block("taken");
    let other = ir.create_block("other");
    ir.gen_cond_br(Value::bool(true), taken, other);
    ir.position_at_end(taken);
    ir.gen_ret();
    ir.position_at_end(other);
    ir.gen_unreachable();

    let mut host = Function::new("host", regs_param());
    let map = host.splice(&frag, &[Value::Param(0)]);
    let entry = map.entry.unwrap();
    let succs: Vec<String> = host
        .successors(entry)
        .into_iter()
        .map(|b| host.block(b).name.clone())
        .collect();
    assert_eq!(succs, ["frag.taken", "frag.other"]);
}

#[test]
fn truncate_and_replace_uses() {
    let mut f = Function::new("f", regs_param());
    f.add_block("entry");
    let mut ir = IrBuilder::new(&mut f);
    let a = ir.gen_add(
        Value::const_int(Type::I32, 1),
        Value::const_int(Type::I32, 2),
    );
    let b = ir.gen_mul(a, Value::const_int(Type::I32, 3));
    let tail = ir.gen_unreachable();

    let a_id = a.as_inst().unwrap();
    f.replace_all_uses(a, Value::const_int(Type::I32, 3));
    assert!(f.users(a_id).is_empty());

    let removed = f.truncate_block_at(tail);
    assert_eq!(removed, vec![tail]);
    assert!(!f.is_live(tail));
    assert!(f.is_live(b.as_inst().unwrap()));
    assert!(matches!(
        verify_function(&f),
        Err(VerifyError::Unterminated { .. })
    ));
}

#[test]
fn verifier_rejects_dangling_successor() {
    let mut f = Function::new("f", regs_param());
    let entry = f.add_block("entry");
    let gone = f.add_block("gone");
    f.push_inst(entry, InstKind::Br { dest: gone }, Type::Void);
    f.push_inst(gone, InstKind::Ret, Type::Void);
    assert!(verify_function(&f).is_ok());

    f.remove_block(gone);
    assert!(matches!(
        verify_function(&f),
        Err(VerifyError::DanglingSuccessor { .. })
    ));
}

#[test]
fn dump_is_stable() {
    let f = store_fragment();
    let text = function_to_string(&f, None);
    assert!(text.starts_with("define void @frag(ptr %arg0) {"), "{text}");
    assert!(text.contains("field_ptr ptr %arg0, 8"), "{text}");
    assert!(text.contains("store i64 0x2a"), "{text}");
    assert!(text.contains("ret void"), "{text}");
    assert_eq!(text, function_to_string(&f, None));
}

#[test]
fn verifier_checks_operand_types() {
    let mismatched = |kind: InstKind, ty: Type| {
        let mut f = Function::new("f", vec![Type::I32, Type::I1]);
        let entry = f.add_block("entry");
        f.push_inst(entry, kind, ty);
        f.push_inst(entry, InstKind::Ret, Type::Void);
        verify_function(&f)
    };
    let x = Value::Param(0);
    let wide = Value::const_int(Type::I64, 1);

    let add = InstKind::Binary { op: BinOp::Add, lhs: x, rhs: wide };
    assert!(matches!(
        mismatched(add, Type::I32),
        Err(VerifyError::TypeMismatch { .. })
    ));
    let zext = InstKind::Cast { op: CastOp::ZExt, value: wide };
    assert!(matches!(
        mismatched(zext, Type::I32),
        Err(VerifyError::TypeMismatch { .. })
    ));
    let load = InstKind::Load { ptr: x };
    assert!(matches!(
        mismatched(load, Type::I32),
        Err(VerifyError::TypeMismatch { .. })
    ));
    let select = InstKind::Select { cond: x, if_true: x, if_false: x };
    assert!(matches!(
        mismatched(select, Type::I32),
        Err(VerifyError::TypeMismatch { .. })
    ));

    let ok = InstKind::Cast { op: CastOp::SExt, value: x };
    assert!(mismatched(ok, Type::I64).is_ok());
    let ok = InstKind::Select { cond: Value::Param(1), if_true: x, if_false: x };
    assert!(mismatched(ok, Type::I32).is_ok());
}

#[test]
fn verifier_rejects_non_boolean_branch() {
    let mut f = Function::new("f", vec![Type::I8]);
    let entry = f.add_block("entry");
    let next = f.add_block("next");
    let cond = Value::Param(0);
    f.push_inst(
        entry,
        InstKind::CondBr { cond, then_dest: next, else_dest: next },
        Type::Void,
    );
    f.push_inst(next, InstKind::Ret, Type::Void);
    assert_eq!(
        verify_function(&f),
        Err(VerifyError::TypeMismatch {
            func: "f".into(),
            inst: 0,
            what: "branch condition is not i1",
        })
    );
}

#[test]
fn scoped_rewrites_touch_only_listed_blocks() {
    let mut f = Function::new("f", vec![Type::I32]);
    let a = f.add_block("a");
    let b = f.add_block("b");
    let c = f.add_block("c");
    let x = Value::Param(0);
    let in_a = f.push_inst(
        a,
        InstKind::Binary { op: BinOp::Add, lhs: x, rhs: x },
        Type::I32,
    );
    f.push_inst(a, InstKind::Br { dest: c }, Type::Void);
    let in_b = f.push_inst(
        b,
        InstKind::Binary { op: BinOp::Sub, lhs: x, rhs: x },
        Type::I32,
    );
    f.push_inst(b, InstKind::Br { dest: c }, Type::Void);
    f.push_inst(c, InstKind::Ret, Type::Void);

    let one = Value::const_int(Type::I32, 1);
    f.replace_uses_in(&[a], x, one);
    assert_eq!(f.inst(in_a).kind.operands(), vec![one, one]);
    assert_eq!(f.inst(in_b).kind.operands(), vec![x, x]);

    let d = f.add_block("d");
    f.push_inst(d, InstKind::Ret, Type::Void);
    f.retarget_from(&[b], c, d);
    assert_eq!(f.successors(a), vec![c]);
    assert_eq!(f.successors(b), vec![d]);
}
