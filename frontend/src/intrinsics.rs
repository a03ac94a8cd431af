//! Placeholder resolution.
//!
//! Walks the outstanding placeholder calls of a result function with
//! a substitute-and-advance cursor and replaces every one that has
//! enough context: constant jumps become branches, returns become
//! `ret`, and fixed-width memory accesses become loads and stores in
//! the guest address space. Anything else stays outstanding and is
//! retried after the next linear run.

use lift_core::{AddrSpace, Intrinsic, IrBuilder, Type, Value};

use crate::config::TranslationConfig;
use crate::result_fn::{IntrinsicSite, ResultFunction, Substitution};
use crate::worklist::Worklist;

/// Outcome of one resolution pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ResolveStats {
    pub resolved: usize,
    pub unresolved: usize,
    /// Destinations newly queued for discovery.
    pub discovered: usize,
}

/// Resolve every outstanding placeholder that can be resolved.
pub fn resolve_intrinsics(
    result: &mut ResultFunction,
    config: &TranslationConfig,
    worklist: &mut Worklist,
) -> ResolveStats {
    let mut stats = ResolveStats::default();
    let mut cursor = result.next_intrinsic(None);

    while let Some(site) = cursor {
        if !site.intrinsic.is_resolvable() {
            stats.unresolved += 1;
            cursor = result.skip(site);
            continue;
        }
        let substitution = match site.intrinsic {
            Intrinsic::Jump => {
                resolve_jump(result, &site, worklist, &mut stats)
            }
            Intrinsic::Ret => Some(Substitution::Return),
            Intrinsic::ReadMem => {
                resolve_read_mem(result, &site, config)
            }
            Intrinsic::WriteMem => {
                resolve_write_mem(result, &site, config)
            }
            Intrinsic::Call => None,
        };
        cursor = match substitution {
            Some(s) => {
                stats.resolved += 1;
                result.substitute(site, s)
            }
            None => {
                stats.unresolved += 1;
                result.skip(site)
            }
        };
    }

    log::debug!(
        "{}: resolved {}, unresolved {}, discovered {}",
        result.func().name(),
        stats.resolved,
        stats.unresolved,
        stats.discovered
    );
    stats
}

/// `jump_intrin(config, regs, dest)` with a constant `dest`.
fn resolve_jump(
    result: &mut ResultFunction,
    site: &IntrinsicSite,
    worklist: &mut Worklist,
    stats: &mut ResolveStats,
) -> Option<Substitution> {
    let dest = result.intrinsic_args(site).get(2)?.as_const()?;
    if result.get_implemented_block(dest).is_none() && worklist.push(dest) {
        stats.discovered += 1;
    }
    Some(Substitution::Branch(result.get_destination(dest)))
}

/// Access width in bytes, if it is one the register file can hold.
fn access_type(size: Value, config: &TranslationConfig) -> Option<Type> {
    let size = size.as_const()?;
    if size > config.address_size as u64 {
        return None;
    }
    Type::int_bytes(size)
}

/// `read_mem(addr, size)`: load from guest memory and zero-extend to
/// the native width.
fn resolve_read_mem(
    result: &mut ResultFunction,
    site: &IntrinsicSite,
    config: &TranslationConfig,
) -> Option<Substitution> {
    let args = result.intrinsic_args(site);
    let (addr, size) = (*args.first()?, *args.get(1)?);
    let ty = access_type(size, config)?;

    let mut ir = IrBuilder::new(result.func_mut());
    ir.position_before(site.inst);
    let ptr = ir.gen_int_to_ptr(addr, AddrSpace::Guest);
    let loaded = ir.gen_load(ty, ptr);
    let value = ir.gen_zext_or_trunc(loaded, config.native_type());
    Some(Substitution::Value(value))
}

/// `write_mem(addr, size, value)`: truncating store to guest memory.
fn resolve_write_mem(
    result: &mut ResultFunction,
    site: &IntrinsicSite,
    config: &TranslationConfig,
) -> Option<Substitution> {
    let args = result.intrinsic_args(site);
    let (addr, size, value) = (*args.first()?, *args.get(1)?, *args.get(2)?);
    let ty = access_type(size, config)?;

    let mut ir = IrBuilder::new(result.func_mut());
    ir.position_before(site.inst);
    let ptr = ir.gen_int_to_ptr(addr, AddrSpace::Guest);
    let value = ir.gen_zext_or_trunc(value, ty);
    ir.gen_store(ptr, value);
    Some(Substitution::Erase)
}
