//! Structural verifier for IR functions.

use thiserror::Error;

use crate::function::Function;
use crate::inst::InstKind;
use crate::types::{CastOp, Type};
use crate::value::{BlockId, InstId, Value};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum VerifyError {
    #[error("{func}: function has no blocks")]
    Empty { func: String },
    #[error("{func}: block {block} is not terminated")]
    Unterminated { func: String, block: String },
    #[error("{func}: block {block} has a terminator before its end")]
    EarlyTerminator { func: String, block: String },
    #[error("{func}: block {block} branches to a deleted block")]
    DanglingSuccessor { func: String, block: String },
    #[error("{func}: %v{inst} uses a deleted or foreign value")]
    DanglingOperand { func: String, inst: u32 },
    #[error("{func}: %v{inst} still holds a captured value")]
    StrayCapture { func: String, inst: u32 },
    #[error("{func}: %v{inst} reads parameter {index} of {count}")]
    ParamOutOfRange {
        func: String,
        inst: u32,
        index: u32,
        count: usize,
    },
    #[error("{func}: %v{inst} is listed in the wrong block")]
    WrongBlock { func: String, inst: u32 },
    #[error("{func}: %v{inst}: {what}")]
    TypeMismatch {
        func: String,
        inst: u32,
        what: &'static str,
    },
}

/// Check that `f` is structurally valid: every block ends in exactly
/// one terminator, every branch target and operand is live, no
/// unspliced captured values remain and operand types agree with
/// each instruction's kind.
pub fn verify_function(f: &Function) -> Result<(), VerifyError> {
    let func = || f.name().to_string();
    if f.blocks().is_empty() {
        return Err(VerifyError::Empty { func: func() });
    }

    for &b in f.blocks() {
        let data = f.block(b);
        let block = || data.name.clone();
        let Some((&last, body)) = data.insts.split_last() else {
            return Err(VerifyError::Unterminated {
                func: func(),
                block: block(),
            });
        };
        if !f.inst(last).kind.is_terminator() {
            return Err(VerifyError::Unterminated {
                func: func(),
                block: block(),
            });
        }
        if body.iter().any(|&i| f.inst(i).kind.is_terminator()) {
            return Err(VerifyError::EarlyTerminator {
                func: func(),
                block: block(),
            });
        }
        for succ in f.inst(last).kind.successors() {
            if !f.is_block_live(succ) {
                return Err(VerifyError::DanglingSuccessor {
                    func: func(),
                    block: block(),
                });
            }
        }
        for &id in &data.insts {
            check_inst(f, b, id)?;
        }
    }
    Ok(())
}

fn check_inst(f: &Function, b: BlockId, id: InstId) -> Result<(), VerifyError> {
    let func = || f.name().to_string();
    let data = f.inst(id);
    if data.block != b {
        return Err(VerifyError::WrongBlock {
            func: func(),
            inst: id.0,
        });
    }
    for op in data.kind.operands() {
        match op {
            Value::Inst(src) if !f.is_live(src) => {
                return Err(VerifyError::DanglingOperand {
                    func: func(),
                    inst: id.0,
                });
            }
            Value::Capture { .. } => {
                return Err(VerifyError::StrayCapture {
                    func: func(),
                    inst: id.0,
                });
            }
            Value::Param(index) if index as usize >= f.params().len() => {
                return Err(VerifyError::ParamOutOfRange {
                    func: func(),
                    inst: id.0,
                    index,
                    count: f.params().len(),
                });
            }
            _ => {}
        }
    }
    check_types(f, id).map_err(|what| VerifyError::TypeMismatch {
        func: func(),
        inst: id.0,
        what,
    })
}

/// Operand and result types of one instruction. Operands are known
/// to be live.
fn check_types(f: &Function, id: InstId) -> Result<(), &'static str> {
    let data = f.inst(id);
    let ty = |v: Value| f.value_type(v);
    let ensure = |ok: bool, what| if ok { Ok(()) } else { Err(what) };
    match data.kind {
        InstKind::Alloca { .. } => ensure(data.ty.is_ptr(), "alloca result"),
        InstKind::FieldPtr { base, .. } => {
            ensure(ty(base).is_ptr(), "field_ptr base is not a pointer")?;
            ensure(data.ty == ty(base), "field_ptr changes address space")
        }
        InstKind::Load { ptr } => {
            ensure(ty(ptr).is_ptr(), "load from a non-pointer")
        }
        InstKind::Store { ptr, value } => {
            ensure(ty(ptr).is_ptr(), "store to a non-pointer")?;
            ensure(ty(value) != Type::Void, "store of void")
        }
        InstKind::Binary { lhs, rhs, .. } => {
            ensure(ty(lhs).is_int(), "binary operand is not an integer")?;
            ensure(
                ty(lhs) == ty(rhs) && ty(lhs) == data.ty,
                "binary operand widths differ",
            )
        }
        InstKind::ICmp { lhs, rhs, .. } => {
            ensure(ty(lhs) == ty(rhs), "icmp operand types differ")?;
            ensure(data.ty == Type::I1, "icmp result is not i1")
        }
        InstKind::Cast { op, value } => {
            let (from, to) = (ty(value), data.ty);
            let ok = match op {
                CastOp::ZExt | CastOp::SExt => {
                    int_widths(from, to).is_some_and(|(a, b)| a < b)
                }
                CastOp::Trunc => int_widths(from, to).is_some_and(|(a, b)| a > b),
                CastOp::IntToPtr => from.is_int() && to.is_ptr(),
                CastOp::PtrToInt => from.is_ptr() && to.is_int(),
            };
            ensure(ok, "cast between incompatible types")
        }
        InstKind::Select {
            cond,
            if_true,
            if_false,
        } => {
            ensure(ty(cond) == Type::I1, "select condition is not i1")?;
            ensure(
                ty(if_true) == data.ty && ty(if_false) == data.ty,
                "select arm types differ",
            )
        }
        InstKind::CondBr { cond, .. } => {
            ensure(ty(cond) == Type::I1, "branch condition is not i1")
        }
        _ => Ok(()),
    }
}

fn int_widths(from: Type, to: Type) -> Option<(u32, u32)> {
    (from.is_int() && to.is_int()).then(|| (from.size_bits(), to.size_bits()))
}
