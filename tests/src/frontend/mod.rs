//! Lifting tests: feed raw x86 bytes through the discovery loop and
//! inspect the produced module.

mod discovery;
mod resolve;

use lift_core::dump::function_to_string;
use lift_core::{BlockId, Function, InstKind, Module};
use lift_frontend::{
    LiftError, LiftedFunction, TranslationContext, X86Isa,
};

const BASE: u64 = 0x1000;

// ── Helpers ───────────────────────────────────────────────────

fn context64() -> TranslationContext<X86Isa> {
    TranslationContext::new(X86Isa::x86_64().unwrap(), "test")
}

fn context32() -> TranslationContext<X86Isa> {
    TranslationContext::new(X86Isa::x86_32().unwrap(), "test")
}

/// Lift `code` at `BASE` in 64-bit mode.
fn lift(code: &[u8]) -> (Module, LiftedFunction) {
    try_lift(code).unwrap()
}

fn try_lift(code: &[u8]) -> Result<(Module, LiftedFunction), LiftError> {
    let mut ctx = context64();
    let lifted = ctx.create_function("f", BASE, code)?;
    Ok((ctx.take(), lifted))
}

fn func<'m>(m: &'m Module, lifted: &LiftedFunction) -> &'m Function {
    m.function(lifted.id)
}

fn dump(m: &Module, lifted: &LiftedFunction) -> String {
    function_to_string(func(m, lifted), Some(m))
}

fn count_kind(f: &Function, name: &str) -> usize {
    f.insts().filter(|&i| f.inst(i).kind.name() == name).count()
}

fn block_named(f: &Function, name: &str) -> Option<BlockId> {
    f.blocks().iter().copied().find(|&b| f.block(b).name == name)
}

fn branch_target(f: &Function, b: BlockId) -> Option<BlockId> {
    match f.inst(f.terminator(b)?).kind {
        InstKind::Br { dest } => Some(dest),
        _ => None,
    }
}
