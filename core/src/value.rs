use crate::types::Type;

/// Index into a function's instruction arena.
///
/// Ids stay valid for the lifetime of the function: erasing an
/// instruction leaves a tombstone instead of shifting the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstId(pub u32);

/// Index into a function's block arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub u32);

/// Index into a module's global table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GlobalId(pub u32);

/// Index into a module's function table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FuncId(pub u32);

/// An IR operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Value {
    /// The n-th function parameter.
    Param(u32),
    /// Result of an instruction in the same function.
    Inst(InstId),
    /// Integer constant, always stored masked to `ty`.
    Const { ty: Type, val: u64 },
    /// Address of a module global.
    Global(GlobalId),
    /// Result of an instruction owned by the function a fragment
    /// will be spliced into. Turns into `Inst` on splicing.
    Capture { inst: InstId, ty: Type },
    Undef(Type),
}

impl Value {
    pub fn const_int(ty: Type, val: u64) -> Value {
        Value::Const {
            ty,
            val: val & ty.mask(),
        }
    }

    pub fn bool(b: bool) -> Value {
        Value::const_int(Type::I1, b as u64)
    }

    /// Constant payload, if this is a constant.
    pub fn as_const(&self) -> Option<u64> {
        match *self {
            Value::Const { val, .. } => Some(val),
            _ => None,
        }
    }

    pub fn as_inst(&self) -> Option<InstId> {
        match *self {
            Value::Inst(id) => Some(id),
            _ => None,
        }
    }

    pub fn is_const(&self) -> bool {
        matches!(self, Value::Const { .. })
    }
}
