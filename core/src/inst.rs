use crate::types::{BinOp, CastOp, Cond, Type};
use crate::value::{BlockId, Value};

/// Abstract placeholder operations emitted by instruction semantics.
///
/// Generators use these wherever the IR shape depends on context that
/// only the translation loop has (where a jump lands, how guest memory
/// is addressed). The translation loop later replaces them with real
/// control flow, loads and stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Intrinsic {
    /// `jump_intrin(config, regs, dest)`: transfer control to `dest`.
    Jump,
    /// `ret_intrin(config, regs)`: return from the routine.
    Ret,
    /// `read_mem(addr, size) -> word`: zero-extended guest load.
    ReadMem,
    /// `write_mem(addr, size, value)`: truncating guest store.
    WriteMem,
    /// `call_intrin(config, regs, dest)`: call into another routine.
    Call,
}

impl Intrinsic {
    pub fn name(self) -> &'static str {
        match self {
            Intrinsic::Jump => "jump_intrin",
            Intrinsic::Ret => "ret_intrin",
            Intrinsic::ReadMem => "read_mem",
            Intrinsic::WriteMem => "write_mem",
            Intrinsic::Call => "call_intrin",
        }
    }

    /// Number of operands the placeholder takes.
    pub fn arity(self) -> usize {
        match self {
            Intrinsic::Jump | Intrinsic::Call | Intrinsic::WriteMem => 3,
            Intrinsic::Ret | Intrinsic::ReadMem => 2,
        }
    }

    /// Whether the translation loop tries to replace this placeholder.
    pub fn is_resolvable(self) -> bool {
        !matches!(self, Intrinsic::Call)
    }
}

/// Instruction payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstKind {
    /// Stack slot of `size` bytes in the emulator address space.
    Alloca { size: u32 },
    /// Pointer to the byte at `offset` inside the structure at `base`.
    FieldPtr { base: Value, offset: u32 },
    Load { ptr: Value },
    Store { ptr: Value, value: Value },
    Binary { op: BinOp, lhs: Value, rhs: Value },
    ICmp { cond: Cond, lhs: Value, rhs: Value },
    Cast { op: CastOp, value: Value },
    Select { cond: Value, if_true: Value, if_false: Value },
    Intrinsic { intrinsic: Intrinsic, args: Vec<Value> },

    // -- Terminators --
    Br { dest: BlockId },
    CondBr {
        cond: Value,
        then_dest: BlockId,
        else_dest: BlockId,
    },
    Ret,
    Unreachable,
}

impl InstKind {
    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            InstKind::Br { .. }
                | InstKind::CondBr { .. }
                | InstKind::Ret
                | InstKind::Unreachable
        )
    }

    /// Instructions that must be kept even when their result is
    /// unused.
    pub fn has_side_effects(&self) -> bool {
        matches!(
            self,
            InstKind::Store { .. }
                | InstKind::Intrinsic { .. }
                | InstKind::Alloca { .. }
        ) || self.is_terminator()
    }

    pub fn intrinsic(&self) -> Option<Intrinsic> {
        match self {
            InstKind::Intrinsic { intrinsic, .. } => Some(*intrinsic),
            _ => None,
        }
    }

    /// Value operands in order.
    pub fn operands(&self) -> Vec<Value> {
        match self {
            InstKind::Alloca { .. }
            | InstKind::Br { .. }
            | InstKind::Ret
            | InstKind::Unreachable => Vec::new(),
            InstKind::FieldPtr { base, .. } => vec![*base],
            InstKind::Load { ptr } => vec![*ptr],
            InstKind::Store { ptr, value } => vec![*ptr, *value],
            InstKind::Binary { lhs, rhs, .. }
            | InstKind::ICmp { lhs, rhs, .. } => vec![*lhs, *rhs],
            InstKind::Cast { value, .. } => vec![*value],
            InstKind::Select {
                cond,
                if_true,
                if_false,
            } => vec![*cond, *if_true, *if_false],
            InstKind::Intrinsic { args, .. } => args.clone(),
            InstKind::CondBr { cond, .. } => vec![*cond],
        }
    }

    pub fn operands_mut(&mut self) -> Vec<&mut Value> {
        match self {
            InstKind::Alloca { .. }
            | InstKind::Br { .. }
            | InstKind::Ret
            | InstKind::Unreachable => Vec::new(),
            InstKind::FieldPtr { base, .. } => vec![base],
            InstKind::Load { ptr } => vec![ptr],
            InstKind::Store { ptr, value } => vec![ptr, value],
            InstKind::Binary { lhs, rhs, .. }
            | InstKind::ICmp { lhs, rhs, .. } => vec![lhs, rhs],
            InstKind::Cast { value, .. } => vec![value],
            InstKind::Select {
                cond,
                if_true,
                if_false,
            } => vec![cond, if_true, if_false],
            InstKind::Intrinsic { args, .. } => args.iter_mut().collect(),
            InstKind::CondBr { cond, .. } => vec![cond],
        }
    }

    /// Successor blocks of a terminator (empty for other instructions).
    pub fn successors(&self) -> Vec<BlockId> {
        match self {
            InstKind::Br { dest } => vec![*dest],
            InstKind::CondBr {
                then_dest,
                else_dest,
                ..
            } => vec![*then_dest, *else_dest],
            _ => Vec::new(),
        }
    }

    pub fn successors_mut(&mut self) -> Vec<&mut BlockId> {
        match self {
            InstKind::Br { dest } => vec![dest],
            InstKind::CondBr {
                then_dest,
                else_dest,
                ..
            } => vec![then_dest, else_dest],
            _ => Vec::new(),
        }
    }

    /// Short mnemonic used by the IR dump.
    pub fn name(&self) -> &'static str {
        match self {
            InstKind::Alloca { .. } => "alloca",
            InstKind::FieldPtr { .. } => "field_ptr",
            InstKind::Load { .. } => "load",
            InstKind::Store { .. } => "store",
            InstKind::Binary { op, .. } => op.name(),
            InstKind::ICmp { .. } => "icmp",
            InstKind::Cast { op, .. } => op.name(),
            InstKind::Select { .. } => "select",
            InstKind::Intrinsic { .. } => "call",
            InstKind::Br { .. } => "br",
            InstKind::CondBr { .. } => "condbr",
            InstKind::Ret => "ret",
            InstKind::Unreachable => "unreachable",
        }
    }
}

/// One instruction in a function arena.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstData {
    pub kind: InstKind,
    /// Result type (`Void` for instructions without a result).
    pub ty: Type,
    /// Block currently holding the instruction.
    pub block: BlockId,
}
