//! Local simplification pipeline run over each single-instruction
//! fragment before it is spliced into the routine being lifted.

pub mod optimize;
pub mod simplify_cfg;

use lift_core::Function;

pub use optimize::{eliminate_dead_code, optimize};
pub use simplify_cfg::simplify_cfg;

/// Fold constants, simplify control flow and drop dead code so that
/// constant branch targets are visible to placeholder resolution.
pub fn simplify_fragment(f: &mut Function) {
    let mut folded = optimize(f);
    if simplify_cfg(f) {
        folded += optimize(f);
    }
    let dead = eliminate_dead_code(f);
    log::trace!("{}: folded {folded}, removed {dead} dead", f.name());
}
