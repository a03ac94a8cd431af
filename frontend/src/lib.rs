//! Lifting frontend: machine code to IR.
//!
//! Provides the architecture-independent lifting protocol
//! (`Isa` trait, single-instruction translator, result function
//! accumulator, placeholder resolution and the discovery loop in
//! `TranslationContext`) plus the x86 decoder and semantics.

pub mod config;
pub mod context;
pub mod intrinsics;
pub mod result_fn;
pub mod translate;
pub mod worklist;
pub mod x86;

use std::sync::Arc;

use lift_core::{ConstData, RegistryError, TargetInfo, VerifyError};
use thiserror::Error;

pub use config::TranslationConfig;
pub use context::{LiftedFunction, TranslationContext};
pub use result_fn::{IntrinsicSite, ResultFunction, Substitution};
pub use translate::{translate_insn, SemCtx};
pub use worklist::{VisitState, Worklist};
pub use x86::X86Isa;

// ---------------------------------------------------------------
// Errors
// ---------------------------------------------------------------

/// Why an address could not be decoded. Recoverable: the address
/// becomes an unreachable marker.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("invalid encoding at {0:#x}")]
    InvalidEncoding(u64),
    #[error("truncated instruction at {0:#x}")]
    Truncated(u64),
    #[error("address {0:#x} is outside the code range")]
    OutOfRange(u64),
}

/// Errors that abort the lifting of a routine.
#[derive(Debug, Error)]
pub enum LiftError {
    #[error("no semantics for `{mnemonic}` at {address:#x}")]
    MissingSemantics { mnemonic: String, address: u64 },
    #[error("`{mnemonic}` at {address:#x}: unsupported operand ({what})")]
    UnsupportedOperand {
        mnemonic: String,
        address: u64,
        what: String,
    },
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error("lifted function is malformed: {0}")]
    Verify(#[from] VerifyError),
}

// ---------------------------------------------------------------
// Architecture interface
// ---------------------------------------------------------------

/// A decoded machine instruction.
pub trait MachineInsn {
    fn address(&self) -> u64;

    /// Encoded length in bytes.
    fn size(&self) -> usize;

    fn next_address(&self) -> u64 {
        self.address().wrapping_add(self.size() as u64)
    }

    /// Lower-case mnemonic, for diagnostics.
    fn mnemonic_name(&self) -> String;

    /// Unconditional transfers (jump, return, traps) end a linear
    /// decoding run.
    fn ends_linear_run(&self) -> bool;
}

/// Semantics generator for one mnemonic. Emits IR at the current
/// insertion point of `ctx.ir` and may terminate the block.
pub type Generator<I> =
    fn(&mut SemCtx<'_>, &<I as Isa>::Insn) -> Result<(), LiftError>;

/// One target architecture: decoder, register file and generator
/// table.
pub trait Isa {
    type Insn: MachineInsn;

    /// Short target name, used for global symbol names.
    fn name(&self) -> &str;

    fn config(&self) -> TranslationConfig;

    fn target_info(&self) -> Arc<TargetInfo>;

    /// Size in bytes of the flags area allocated per routine.
    fn flags_size(&self) -> u32;

    /// Decode one instruction from `code`, which starts at `address`.
    fn decode(&self, code: &[u8], address: u64)
        -> Result<Self::Insn, DecodeError>;

    /// Generator for `insn`'s mnemonic, if one exists.
    fn generator(&self, insn: &Self::Insn) -> Option<Generator<Self>>
    where
        Self: Sized;

    /// Constant embedding of the decoded instruction detail.
    fn describe(&self, insn: &Self::Insn) -> ConstData;
}
