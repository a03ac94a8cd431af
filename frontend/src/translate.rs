//! Single-instruction translator.
//!
//! Every decoded instruction becomes a standalone fragment function
//! `asm_<address>(ptr regs)` with a single entry. The fragment
//! records the instruction address in the register file, runs the
//! semantics generator and, if the generator falls through, ends with
//! a jump placeholder to the next instruction.

use lift_core::{
    AddrSpace, Function, GlobalId, Intrinsic, IrBuilder, Module, Type, Value,
};

use crate::config::TranslationConfig;
use crate::{Isa, LiftError, MachineInsn};

/// Everything a semantics generator may touch.
pub struct SemCtx<'a> {
    pub ir: IrBuilder<'a>,
    pub config: &'a TranslationConfig,
    /// Address of the module-level config constant.
    pub config_value: Value,
    /// Register file pointer (fragment parameter 0).
    pub regs: Value,
    /// Flags area owned by the enclosing routine.
    pub flags: Value,
    /// Address of the constant embedding this instruction's detail.
    pub detail: Value,
}

impl SemCtx<'_> {
    pub fn native(&self) -> Type {
        self.config.native_type()
    }

    pub fn const_native(&self, val: u64) -> Value {
        Value::const_int(self.native(), val)
    }

    // -- Register file --

    pub fn reg_ptr(&mut self, offset: u32) -> Value {
        self.ir.gen_field_ptr(self.regs, offset)
    }

    pub fn load_reg(&mut self, offset: u32, ty: Type) -> Value {
        let ptr = self.reg_ptr(offset);
        self.ir.gen_load(ty, ptr)
    }

    pub fn store_reg(&mut self, offset: u32, value: Value) {
        let ptr = self.reg_ptr(offset);
        self.ir.gen_store(ptr, value);
    }

    // -- Flags (one byte per flag, 0 or 1) --

    pub fn load_flag(&mut self, offset: u32) -> Value {
        let ptr = self.ir.gen_field_ptr(self.flags, offset);
        let byte = self.ir.gen_load(Type::I8, ptr);
        self.ir.gen_trunc(byte, Type::I1)
    }

    pub fn store_flag(&mut self, offset: u32, bit: Value) {
        let byte = match self.ir.value_type(bit) {
            Type::I8 => bit,
            _ => self.ir.gen_zext(bit, Type::I8),
        };
        let ptr = self.ir.gen_field_ptr(self.flags, offset);
        self.ir.gen_store(ptr, byte);
    }

    // -- Placeholders --

    /// `jump_intrin(config, regs, dest)`.
    pub fn jump(&mut self, dest: Value) {
        let dest = self.ir.gen_zext_or_trunc(dest, self.native());
        self.ir.gen_intrinsic(
            Intrinsic::Jump,
            Type::Void,
            vec![self.config_value, self.regs, dest],
        );
    }

    /// `call_intrin(config, regs, dest)`.
    pub fn call(&mut self, dest: Value) {
        let dest = self.ir.gen_zext_or_trunc(dest, self.native());
        self.ir.gen_intrinsic(
            Intrinsic::Call,
            Type::Void,
            vec![self.config_value, self.regs, dest],
        );
    }

    /// `ret_intrin(config, regs)`.
    pub fn ret(&mut self) {
        self.ir.gen_intrinsic(
            Intrinsic::Ret,
            Type::Void,
            vec![self.config_value, self.regs],
        );
    }

    /// `read_mem(addr, size)`; the result is native-width and
    /// zero-extended.
    pub fn read_mem(&mut self, addr: Value, size: u32) -> Value {
        let native = self.native();
        let addr = self.ir.gen_zext_or_trunc(addr, native);
        self.ir.gen_intrinsic(
            Intrinsic::ReadMem,
            native,
            vec![addr, Value::const_int(Type::I64, size as u64)],
        )
    }

    /// `write_mem(addr, size, value)`.
    pub fn write_mem(&mut self, addr: Value, size: u32, value: Value) {
        let native = self.native();
        let addr = self.ir.gen_zext_or_trunc(addr, native);
        self.ir.gen_intrinsic(
            Intrinsic::WriteMem,
            Type::Void,
            vec![addr, Value::const_int(Type::I64, size as u64), value],
        );
    }
}

/// Translate one instruction into a fragment function.
///
/// `flags` is the routine's flags area, captured from the function
/// the fragment will be spliced into. The instruction detail is added
/// to `module` as a private constant.
pub fn translate_insn<I: Isa>(
    isa: &I,
    module: &mut Module,
    config: &TranslationConfig,
    config_global: GlobalId,
    flags: Value,
    insn: &I::Insn,
) -> Result<Function, LiftError> {
    let address = insn.address();
    let generator =
        isa.generator(insn)
            .ok_or_else(|| LiftError::MissingSemantics {
                mnemonic: insn.mnemonic_name(),
                address,
            })?;

    let detail = module.add_global(
        &format!("insn_{address:x}"),
        isa.describe(insn),
        true,
    );

    let mut func = Function::new(
        format!("asm_{address:x}"),
        vec![Type::Ptr(AddrSpace::Emulator)],
    );
    func.add_block("entry");

    let mut ctx = SemCtx {
        ir: IrBuilder::new(&mut func),
        config,
        config_value: Value::Global(config_global),
        regs: Value::Param(0),
        flags,
        detail: Value::Global(detail),
    };

    // The address is recorded before the semantics run so that
    // placeholders observe it.
    let pc = ctx.const_native(address);
    ctx.store_reg(config.ip, pc);

    generator(&mut ctx, insn)?;

    if !ctx.ir.is_terminated() {
        let next = ctx.const_native(insn.next_address());
        ctx.jump(next);
        ctx.ir.gen_unreachable();
    }
    drop(ctx);

    log::trace!(
        "{address:#x}: {} -> {} insts",
        insn.mnemonic_name(),
        func.num_insts()
    );
    Ok(func)
}
