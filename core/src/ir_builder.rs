use crate::function::Function;
use crate::inst::{InstKind, Intrinsic};
use crate::types::{AddrSpace, BinOp, CastOp, Cond, Type};
use crate::value::{BlockId, InstId, Value};

/// Where the builder places new instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertPoint {
    End(BlockId),
    Before(InstId),
}

/// Emits instructions into a borrowed function.
pub struct IrBuilder<'f> {
    func: &'f mut Function,
    point: Option<InsertPoint>,
}

impl<'f> IrBuilder<'f> {
    pub fn new(func: &'f mut Function) -> Self {
        let point = func.entry_block().map(InsertPoint::End);
        Self { func, point }
    }

    pub fn func(&self) -> &Function {
        self.func
    }

    pub fn func_mut(&mut self) -> &mut Function {
        self.func
    }

    // -- Positioning --

    pub fn create_block(&mut self, name: &str) -> BlockId {
        self.func.add_block(name)
    }

    pub fn position_at_end(&mut self, b: BlockId) {
        self.point = Some(InsertPoint::End(b));
    }

    pub fn position_before(&mut self, inst: InstId) {
        self.point = Some(InsertPoint::Before(inst));
    }

    pub fn current_block(&self) -> Option<BlockId> {
        match self.point? {
            InsertPoint::End(b) => Some(b),
            InsertPoint::Before(i) => Some(self.func.inst(i).block),
        }
    }

    /// Whether the current block already ends in a terminator.
    pub fn is_terminated(&self) -> bool {
        self.current_block()
            .is_some_and(|b| self.func.terminator(b).is_some())
    }

    pub fn value_type(&self, v: Value) -> Type {
        self.func.value_type(v)
    }

    // -- Internal helpers --

    fn emit(&mut self, kind: InstKind, ty: Type) -> InstId {
        match self.point.expect("IrBuilder: no insertion point") {
            InsertPoint::End(b) => {
                debug_assert!(
                    self.func.terminator(b).is_none(),
                    "emit after terminator in {}",
                    self.func.block(b).name
                );
                self.func.push_inst(b, kind, ty)
            }
            InsertPoint::Before(at) => {
                self.func.insert_inst_before(at, kind, ty)
            }
        }
    }

    fn emit_value(&mut self, kind: InstKind, ty: Type) -> Value {
        Value::Inst(self.emit(kind, ty))
    }

    // -- Memory --

    /// Stack slot of `size` bytes.
    pub fn gen_alloca(&mut self, size: u32) -> Value {
        let ty = Type::Ptr(AddrSpace::Emulator);
        self.emit_value(InstKind::Alloca { size }, ty)
    }

    /// Pointer to byte `offset` of the structure at `base`.
    pub fn gen_field_ptr(&mut self, base: Value, offset: u32) -> Value {
        let ty = self.value_type(base);
        assert!(ty.is_ptr(), "field_ptr on non-pointer {ty}");
        self.emit_value(InstKind::FieldPtr { base, offset }, ty)
    }

    pub fn gen_load(&mut self, ty: Type, ptr: Value) -> Value {
        debug_assert!(self.value_type(ptr).is_ptr());
        self.emit_value(InstKind::Load { ptr }, ty)
    }

    pub fn gen_store(&mut self, ptr: Value, value: Value) -> InstId {
        debug_assert!(self.value_type(ptr).is_ptr());
        self.emit(InstKind::Store { ptr, value }, Type::Void)
    }

    // -- Integer arithmetic --

    pub fn gen_binary(&mut self, op: BinOp, lhs: Value, rhs: Value) -> Value {
        let ty = self.value_type(lhs);
        debug_assert_eq!(
            ty,
            self.value_type(rhs),
            "{} operand type mismatch",
            op.name()
        );
        self.emit_value(InstKind::Binary { op, lhs, rhs }, ty)
    }

    pub fn gen_add(&mut self, a: Value, b: Value) -> Value {
        self.gen_binary(BinOp::Add, a, b)
    }

    pub fn gen_sub(&mut self, a: Value, b: Value) -> Value {
        self.gen_binary(BinOp::Sub, a, b)
    }

    pub fn gen_mul(&mut self, a: Value, b: Value) -> Value {
        self.gen_binary(BinOp::Mul, a, b)
    }

    pub fn gen_and(&mut self, a: Value, b: Value) -> Value {
        self.gen_binary(BinOp::And, a, b)
    }

    pub fn gen_or(&mut self, a: Value, b: Value) -> Value {
        self.gen_binary(BinOp::Or, a, b)
    }

    pub fn gen_xor(&mut self, a: Value, b: Value) -> Value {
        self.gen_binary(BinOp::Xor, a, b)
    }

    pub fn gen_shl(&mut self, a: Value, b: Value) -> Value {
        self.gen_binary(BinOp::Shl, a, b)
    }

    pub fn gen_lshr(&mut self, a: Value, b: Value) -> Value {
        self.gen_binary(BinOp::LShr, a, b)
    }

    pub fn gen_ashr(&mut self, a: Value, b: Value) -> Value {
        self.gen_binary(BinOp::AShr, a, b)
    }

    pub fn gen_not(&mut self, a: Value) -> Value {
        let ty = self.value_type(a);
        self.gen_xor(a, Value::const_int(ty, u64::MAX))
    }

    pub fn gen_neg(&mut self, a: Value) -> Value {
        let ty = self.value_type(a);
        self.gen_sub(Value::const_int(ty, 0), a)
    }

    pub fn gen_icmp(&mut self, cond: Cond, lhs: Value, rhs: Value) -> Value {
        debug_assert_eq!(self.value_type(lhs), self.value_type(rhs));
        self.emit_value(InstKind::ICmp { cond, lhs, rhs }, Type::I1)
    }

    pub fn gen_select(
        &mut self,
        cond: Value,
        if_true: Value,
        if_false: Value,
    ) -> Value {
        let ty = self.value_type(if_true);
        self.emit_value(
            InstKind::Select {
                cond,
                if_true,
                if_false,
            },
            ty,
        )
    }

    // -- Casts --

    pub fn gen_cast(&mut self, op: CastOp, value: Value, ty: Type) -> Value {
        self.emit_value(InstKind::Cast { op, value }, ty)
    }

    pub fn gen_zext(&mut self, value: Value, ty: Type) -> Value {
        debug_assert!(self.value_type(value).size_bits() < ty.size_bits());
        self.gen_cast(CastOp::ZExt, value, ty)
    }

    pub fn gen_sext(&mut self, value: Value, ty: Type) -> Value {
        debug_assert!(self.value_type(value).size_bits() < ty.size_bits());
        self.gen_cast(CastOp::SExt, value, ty)
    }

    pub fn gen_trunc(&mut self, value: Value, ty: Type) -> Value {
        debug_assert!(self.value_type(value).size_bits() > ty.size_bits());
        self.gen_cast(CastOp::Trunc, value, ty)
    }

    /// Zero-extend, truncate or pass through so the result has type `ty`.
    pub fn gen_zext_or_trunc(&mut self, value: Value, ty: Type) -> Value {
        let from = self.value_type(value).size_bits();
        let to = ty.size_bits();
        if from < to {
            self.gen_zext(value, ty)
        } else if from > to {
            self.gen_trunc(value, ty)
        } else {
            value
        }
    }

    /// Sign-extend, truncate or pass through so the result has type `ty`.
    pub fn gen_sext_or_trunc(&mut self, value: Value, ty: Type) -> Value {
        let from = self.value_type(value).size_bits();
        let to = ty.size_bits();
        if from < to {
            self.gen_sext(value, ty)
        } else if from > to {
            self.gen_trunc(value, ty)
        } else {
            value
        }
    }

    pub fn gen_int_to_ptr(&mut self, value: Value, space: AddrSpace) -> Value {
        self.gen_cast(CastOp::IntToPtr, value, Type::Ptr(space))
    }

    // -- Placeholders --

    pub fn gen_intrinsic(
        &mut self,
        intrinsic: Intrinsic,
        ty: Type,
        args: Vec<Value>,
    ) -> Value {
        debug_assert_eq!(
            args.len(),
            intrinsic.arity(),
            "{}",
            intrinsic.name()
        );
        self.emit_value(InstKind::Intrinsic { intrinsic, args }, ty)
    }

    // -- Terminators --

    pub fn gen_br(&mut self, dest: BlockId) -> InstId {
        self.emit(InstKind::Br { dest }, Type::Void)
    }

    pub fn gen_cond_br(
        &mut self,
        cond: Value,
        then_dest: BlockId,
        else_dest: BlockId,
    ) -> InstId {
        debug_assert_eq!(self.value_type(cond), Type::I1);
        self.emit(
            InstKind::CondBr {
                cond,
                then_dest,
                else_dest,
            },
            Type::Void,
        )
    }

    pub fn gen_ret(&mut self) -> InstId {
        self.emit(InstKind::Ret, Type::Void)
    }

    pub fn gen_unreachable(&mut self) -> InstId {
        self.emit(InstKind::Unreachable, Type::Void)
    }
}
