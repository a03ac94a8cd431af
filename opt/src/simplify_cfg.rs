// Trivial control-flow simplification: constant branch folding,
// unreachable block removal and straight-line block merging.

use std::collections::HashSet;

use lift_core::{BlockId, Function, InstKind, Type};

/// Run all CFG simplifications until nothing changes. Returns true
/// if the function was modified.
pub fn simplify_cfg(f: &mut Function) -> bool {
    let mut changed = false;
    loop {
        let mut round = fold_branches(f);
        round |= remove_unreachable_blocks(f);
        round |= merge_blocks(f);
        if !round {
            return changed;
        }
        changed = true;
    }
}

/// `condbr` on a constant, or with both edges to the same block,
/// becomes `br`.
pub fn fold_branches(f: &mut Function) -> bool {
    let mut changed = false;
    for b in f.blocks().to_vec() {
        let Some(term) = f.terminator(b) else {
            continue;
        };
        let InstKind::CondBr {
            cond,
            then_dest,
            else_dest,
        } = f.inst(term).kind
        else {
            continue;
        };
        let dest = if then_dest == else_dest {
            then_dest
        } else {
            match cond.as_const() {
                Some(0) => else_dest,
                Some(_) => then_dest,
                None => continue,
            }
        };
        f.remove_inst(term);
        f.push_inst(b, InstKind::Br { dest }, Type::Void);
        changed = true;
    }
    changed
}

/// Delete blocks not reachable from the entry.
pub fn remove_unreachable_blocks(f: &mut Function) -> bool {
    let Some(entry) = f.entry_block() else {
        return false;
    };
    let mut seen: HashSet<BlockId> = HashSet::new();
    let mut stack = vec![entry];
    while let Some(b) = stack.pop() {
        if seen.insert(b) {
            stack.extend(f.successors(b));
        }
    }
    let dead: Vec<BlockId> = f
        .blocks()
        .iter()
        .copied()
        .filter(|b| !seen.contains(b))
        .collect();
    for &b in &dead {
        f.remove_block(b);
    }
    !dead.is_empty()
}

/// Fold a block into its only predecessor when that predecessor
/// branches to it unconditionally.
pub fn merge_blocks(f: &mut Function) -> bool {
    let mut changed = false;
    let entry = f.entry_block();
    for a in f.blocks().to_vec() {
        if !f.is_block_live(a) {
            continue;
        }
        let Some(term) = f.terminator(a) else {
            continue;
        };
        let InstKind::Br { dest: b } = f.inst(term).kind else {
            continue;
        };
        if b == a || Some(b) == entry || f.predecessors(b) != [a] {
            continue;
        }
        f.remove_inst(term);
        f.merge_into(a, b);
        changed = true;
    }
    changed
}
