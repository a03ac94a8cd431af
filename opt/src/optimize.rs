// Single-pass constant folding and algebraic simplification over one
// function, followed by dead-code elimination. Folded instructions
// are replaced by their value and erased on the spot.

use lift_core::{BinOp, CastOp, Cond, Function, InstId, InstKind, Type, Value};

/// Fold every foldable instruction. Returns the number of
/// instructions removed.
pub fn optimize(f: &mut Function) -> usize {
    let ids: Vec<InstId> = f.insts().collect();
    let mut folded = 0;

    for id in ids {
        if !f.is_live(id) {
            continue;
        }
        let data = f.inst(id);
        let ty = data.ty;
        let result = match data.kind {
            InstKind::Binary { op, lhs, rhs } => fold_binary(op, ty, lhs, rhs),
            InstKind::ICmp { cond, lhs, rhs } => {
                fold_icmp(f, cond, lhs, rhs)
            }
            InstKind::Cast { op, value } => fold_cast(f, op, value, ty),
            InstKind::Select {
                cond,
                if_true,
                if_false,
            } => fold_select(cond, if_true, if_false),
            _ => None,
        };
        if let Some(v) = result {
            f.replace_all_uses(Value::Inst(id), v);
            f.remove_inst(id);
            folded += 1;
        }
    }
    folded
}

/// Remove instructions without side effects whose result is unused.
/// Iterates to a fixed point. Returns the number removed.
pub fn eliminate_dead_code(f: &mut Function) -> usize {
    let mut removed = 0;
    loop {
        let ids: Vec<InstId> = f.insts().collect();
        let mut used = std::collections::HashSet::new();
        for &id in &ids {
            for op in f.inst(id).kind.operands() {
                if let Value::Inst(src) = op {
                    used.insert(src);
                }
            }
        }
        let dead: Vec<InstId> = ids
            .into_iter()
            .filter(|id| {
                !used.contains(id) && !f.inst(*id).kind.has_side_effects()
            })
            .collect();
        if dead.is_empty() {
            return removed;
        }
        removed += dead.len();
        for id in dead {
            f.remove_inst(id);
        }
    }
}

// ---- Per-kind fold functions ----

/// Binary arithmetic/logic ops.
fn fold_binary(op: BinOp, ty: Type, lhs: Value, rhs: Value) -> Option<Value> {
    // Both constant → fold.
    if let (Some(a), Some(b)) = (lhs.as_const(), rhs.as_const()) {
        // Division by zero traps at run time; keep it visible.
        if b == 0 && op.is_division() {
            return None;
        }
        return Some(Value::const_int(ty, op.eval(ty, a, b)));
    }

    if let Some(v) = try_simplify(op, ty, lhs, rhs) {
        return Some(v);
    }
    if op.is_commutative() && lhs.is_const() {
        if let Some(v) = try_simplify(op, ty, rhs, lhs) {
            return Some(v);
        }
    }

    // Same-operand identities: x & x → x, x | x → x,
    // x ^ x → 0, x - x → 0.
    if lhs == rhs {
        match op {
            BinOp::And | BinOp::Or => return Some(lhs),
            BinOp::Xor | BinOp::Sub => return Some(Value::const_int(ty, 0)),
            _ => {}
        }
    }
    None
}

/// Algebraic simplification when `b` is constant.
fn try_simplify(op: BinOp, ty: Type, a: Value, b: Value) -> Option<Value> {
    let b = b.as_const()?;
    let all_ones = ty.mask();
    match op {
        // x + 0, x - 0, x | 0, x ^ 0, x << 0, x >> 0 → x
        BinOp::Add
        | BinOp::Sub
        | BinOp::Or
        | BinOp::Xor
        | BinOp::Shl
        | BinOp::LShr
        | BinOp::AShr
            if b == 0 =>
        {
            Some(a)
        }
        // x * 0, x & 0 → 0
        BinOp::Mul | BinOp::And if b == 0 => Some(Value::const_int(ty, 0)),
        // x * 1, x / 1 → x
        BinOp::Mul | BinOp::UDiv | BinOp::SDiv if b == 1 => Some(a),
        // x % 1 → 0
        BinOp::URem | BinOp::SRem if b == 1 => Some(Value::const_int(ty, 0)),
        // x & -1 → x
        BinOp::And if b == all_ones => Some(a),
        // x | -1 → -1
        BinOp::Or if b == all_ones => Some(Value::const_int(ty, all_ones)),
        _ => None,
    }
}

fn fold_icmp(f: &Function, cond: Cond, lhs: Value, rhs: Value) -> Option<Value> {
    let ty = f.value_type(lhs);
    if let (Some(a), Some(b)) = (lhs.as_const(), rhs.as_const()) {
        return Some(Value::bool(cond.eval(ty, a, b)));
    }
    if lhs == rhs && !matches!(lhs, Value::Undef(_)) {
        let r = matches!(
            cond,
            Cond::Eq | Cond::Ule | Cond::Uge | Cond::Sle | Cond::Sge
        );
        return Some(Value::bool(r));
    }
    None
}

fn fold_cast(f: &Function, op: CastOp, value: Value, ty: Type) -> Option<Value> {
    let from = f.value_type(value);
    if let Some(c) = value.as_const() {
        let val = match op {
            CastOp::ZExt | CastOp::Trunc => c,
            CastOp::SExt => from.sign_extend(c) as u64,
            CastOp::IntToPtr | CastOp::PtrToInt => return None,
        };
        return Some(Value::const_int(ty, val));
    }
    // trunc (zext x) → x when the widths line up.
    if op == CastOp::Trunc {
        let src = value.as_inst()?;
        if let InstKind::Cast {
            op: CastOp::ZExt | CastOp::SExt,
            value: inner,
        } = f.inst(src).kind
        {
            if f.value_type(inner) == ty {
                return Some(inner);
            }
        }
    }
    None
}

fn fold_select(cond: Value, if_true: Value, if_false: Value) -> Option<Value> {
    if if_true == if_false {
        return Some(if_true);
    }
    match cond.as_const()? {
        0 => Some(if_false),
        _ => Some(if_true),
    }
}
