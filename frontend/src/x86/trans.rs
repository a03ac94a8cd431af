//! x86 instruction semantics: IR generation per mnemonic.
//!
//! Repetitive operand and flag handling is factored into helpers
//! (`read_operand`, `write_operand`, `set_add_flags`, `gen_shift`,
//! ...). Memory and control transfers are emitted as placeholders
//! through `SemCtx`.

use iced_x86::{ConditionCode, Mnemonic, OpKind, Register};
use lift_core::{BinOp, Cond, Type, Value};

use super::cpu::{AF, CF, DF, FS_BASE_OFFSET, GS_BASE_OFFSET, OF, PF, SF, ZF};
use super::decode::{is_immediate, X86Insn};
use super::X86Isa;
use crate::{Generator, LiftError, MachineInsn, SemCtx};

type X86Gen = Generator<X86Isa>;
type GenResult = Result<(), LiftError>;

/// Semantics generator for `m`, if implemented.
pub(super) fn lookup(m: Mnemonic) -> Option<X86Gen> {
    use Mnemonic::*;
    let g: X86Gen = match m {
        Nop | Pause | Endbr32 | Endbr64 | Lfence | Mfence | Sfence => {
            trans_nop
        }
        Mov => trans_mov,
        Movzx => trans_movzx,
        Movsx | Movsxd => trans_movsx,
        Lea => trans_lea,
        Xchg => trans_xchg,
        Add => trans_add,
        Adc => trans_adc,
        Sub => trans_sub,
        Sbb => trans_sbb,
        Cmp => trans_cmp,
        And => trans_and,
        Or => trans_or,
        Xor => trans_xor,
        Test => trans_test,
        Inc => trans_inc,
        Dec => trans_dec,
        Neg => trans_neg,
        Not => trans_not,
        Shl | Sal => trans_shl,
        Shr => trans_shr,
        Sar => trans_sar,
        Rol => trans_rol,
        Ror => trans_ror,
        Rcl => trans_rcl,
        Rcr => trans_rcr,
        Bt | Bts | Btr | Btc => trans_bit_test,
        Bswap => trans_bswap,
        Xadd => trans_xadd,
        Cmpxchg => trans_cmpxchg,
        Mul => trans_mul,
        Imul => trans_imul,
        Div => trans_div,
        Idiv => trans_idiv,
        Cbw | Cwde | Cdqe => trans_sign_extend_acc,
        Cwd | Cdq | Cqo => trans_sign_fill,
        Push => trans_push,
        Pop => trans_pop,
        Leave => trans_leave,
        Jmp => trans_jmp,
        Ja | Jae | Jb | Jbe | Je | Jne | Jg | Jge | Jl | Jle | Jo | Jno | Jp
        | Jnp | Js | Jns => trans_jcc,
        Jcxz | Jecxz | Jrcxz => trans_jcxz,
        Loop | Loope | Loopne => trans_loop,
        Movsb | Movsw | Movsd | Movsq | Stosb | Stosw | Stosd | Stosq
        | Lodsb | Lodsw | Lodsd | Lodsq | Cmpsb | Cmpsw | Cmpsd | Cmpsq
        | Scasb | Scasw | Scasd | Scasq => trans_string,
        Call => trans_call,
        Ret => trans_ret,
        Seta | Setae | Setb | Setbe | Sete | Setne | Setg | Setge | Setl
        | Setle | Seto | Setno | Setp | Setnp | Sets | Setns => trans_setcc,
        Cmova | Cmovae | Cmovb | Cmovbe | Cmove | Cmovne | Cmovg | Cmovge
        | Cmovl | Cmovle | Cmovo | Cmovno | Cmovp | Cmovnp | Cmovs
        | Cmovns => trans_cmovcc,
        Clc | Stc | Cmc | Cld | Std => trans_flag_op,
        Hlt | Ud2 | Int3 => trans_trap,
        _ => return None,
    };
    Some(g)
}

// ── Helpers ────────────────────────────────────────────────────

fn unsupported(x: &X86Insn, what: impl Into<String>) -> LiftError {
    LiftError::UnsupportedOperand {
        mnemonic: x.mnemonic_name(),
        address: x.address(),
        what: what.into(),
    }
}

fn is_long_mode(ctx: &SemCtx<'_>) -> bool {
    ctx.config.address_size == 8
}

// -- Registers -----------------------------------------------

/// `(offset, size)` of a general-purpose register in the file.
fn gpr_slot(reg: Register) -> Option<(u32, u32)> {
    if !reg.is_gpr() {
        return None;
    }
    let index = reg.full_register().number() as u32;
    let high = matches!(
        reg,
        Register::AH | Register::CH | Register::DH | Register::BH
    );
    Some((index * 8 + high as u32, reg.size() as u32))
}

fn int_type(bytes: usize) -> Option<Type> {
    Type::int_bytes(bytes as u64)
}

fn read_gpr(
    ctx: &mut SemCtx<'_>,
    x: &X86Insn,
    reg: Register,
) -> Result<Value, LiftError> {
    let (offset, size) =
        gpr_slot(reg).ok_or_else(|| unsupported(x, format!("{reg:?}")))?;
    let ty = int_type(size as usize).ok_or_else(|| unsupported(x, "width"))?;
    Ok(ctx.load_reg(offset, ty))
}

/// Write a general-purpose register. 32-bit writes clear the upper
/// half in long mode.
fn write_gpr(
    ctx: &mut SemCtx<'_>,
    x: &X86Insn,
    reg: Register,
    value: Value,
) -> GenResult {
    let (offset, size) =
        gpr_slot(reg).ok_or_else(|| unsupported(x, format!("{reg:?}")))?;
    let ty = int_type(size as usize).ok_or_else(|| unsupported(x, "width"))?;
    let value = ctx.ir.gen_zext_or_trunc(value, ty);
    if size == 4 && is_long_mode(ctx) {
        let wide = ctx.ir.gen_zext(value, Type::I64);
        ctx.store_reg(offset, wide);
    } else {
        ctx.store_reg(offset, value);
    }
    Ok(())
}

// -- Operands ------------------------------------------------

/// Value type of operand `n`. Immediates take the type of the
/// destination operand.
fn operand_type(x: &X86Insn, n: u32) -> Result<Type, LiftError> {
    let insn = &x.insn;
    let bytes = match insn.op_kind(n) {
        OpKind::Register => insn.op_register(n).size(),
        OpKind::Memory => insn.memory_size().size(),
        kind if is_immediate(kind) && n > 0 => return operand_type(x, 0),
        OpKind::Immediate8 => 1,
        OpKind::Immediate16 | OpKind::Immediate8to16 => 2,
        OpKind::Immediate32 | OpKind::Immediate8to32 => 4,
        OpKind::Immediate64
        | OpKind::Immediate8to64
        | OpKind::Immediate32to64 => 8,
        other => return Err(unsupported(x, format!("{other:?}"))),
    };
    int_type(bytes)
        .ok_or_else(|| unsupported(x, format!("{bytes}-byte operand")))
}

/// Address of the memory operand.
fn effective_address(
    ctx: &mut SemCtx<'_>,
    x: &X86Insn,
) -> Result<Value, LiftError> {
    let insn = &x.insn;
    let native = ctx.native();
    if insn.is_ip_rel_memory_operand() {
        return Ok(ctx.const_native(insn.ip_rel_memory_address()));
    }

    let mut addr = ctx.const_native(insn.memory_displacement64());
    let base = insn.memory_base();
    if base != Register::None {
        let b = read_gpr(ctx, x, base)?;
        let b = ctx.ir.gen_zext_or_trunc(b, native);
        addr = ctx.ir.gen_add(b, addr);
    }
    let index = insn.memory_index();
    if index != Register::None {
        let i = read_gpr(ctx, x, index)?;
        let mut i = ctx.ir.gen_zext_or_trunc(i, native);
        let scale = insn.memory_index_scale();
        if scale > 1 {
            let scale = ctx.const_native(scale as u64);
            i = ctx.ir.gen_mul(i, scale);
        }
        addr = ctx.ir.gen_add(addr, i);
    }

    Ok(with_segment_base(ctx, insn.memory_segment(), addr))
}

/// Add the fs / gs base to `addr`; other segments are flat.
fn with_segment_base(
    ctx: &mut SemCtx<'_>,
    seg: Register,
    addr: Value,
) -> Value {
    let offset = match seg {
        Register::FS => FS_BASE_OFFSET,
        Register::GS => GS_BASE_OFFSET,
        _ => return addr,
    };
    let native = ctx.native();
    let base = ctx.load_reg(offset, native);
    ctx.ir.gen_add(addr, base)
}

/// Read operand `n` as a value of type `ty` (zero-extended or
/// truncated as needed; immediates are sign-extended by the decoder).
fn read_operand(
    ctx: &mut SemCtx<'_>,
    x: &X86Insn,
    n: u32,
    ty: Type,
) -> Result<Value, LiftError> {
    let insn = &x.insn;
    match insn.op_kind(n) {
        OpKind::Register => {
            let v = read_gpr(ctx, x, insn.op_register(n))?;
            Ok(ctx.ir.gen_zext_or_trunc(v, ty))
        }
        OpKind::Memory => {
            let addr = effective_address(ctx, x)?;
            let size = insn.memory_size().size() as u32;
            let v = ctx.read_mem(addr, size);
            Ok(ctx.ir.gen_zext_or_trunc(v, ty))
        }
        OpKind::NearBranch16 | OpKind::NearBranch32 | OpKind::NearBranch64 => {
            Ok(Value::const_int(ty, insn.near_branch_target()))
        }
        kind if is_immediate(kind) => {
            Ok(Value::const_int(ty, insn.immediate(n)))
        }
        other => Err(unsupported(x, format!("{other:?}"))),
    }
}

fn write_operand(
    ctx: &mut SemCtx<'_>,
    x: &X86Insn,
    n: u32,
    value: Value,
) -> GenResult {
    let insn = &x.insn;
    match insn.op_kind(n) {
        OpKind::Register => write_gpr(ctx, x, insn.op_register(n), value),
        OpKind::Memory => {
            let addr = effective_address(ctx, x)?;
            let size = insn.memory_size().size() as u32;
            ctx.write_mem(addr, size, value);
            Ok(())
        }
        other => Err(unsupported(x, format!("{other:?}"))),
    }
}

/// Destination type plus both source operands of a two-operand ALU
/// instruction.
fn alu_operands(
    ctx: &mut SemCtx<'_>,
    x: &X86Insn,
) -> Result<(Type, Value, Value), LiftError> {
    let ty = operand_type(x, 0)?;
    let a = read_operand(ctx, x, 0, ty)?;
    let b = read_operand(ctx, x, 1, ty)?;
    Ok((ty, a, b))
}

// -- Flags ---------------------------------------------------

fn sign_bit(ctx: &mut SemCtx<'_>, v: Value) -> Value {
    let ty = ctx.ir.value_type(v);
    ctx.ir.gen_icmp(Cond::Slt, v, Value::const_int(ty, 0))
}

/// PF: set when the low byte has an even number of set bits.
fn parity(ctx: &mut SemCtx<'_>, r: Value) -> Value {
    let mut b = ctx.ir.gen_zext_or_trunc(r, Type::I8);
    for sh in [4, 2, 1] {
        let s = ctx.ir.gen_lshr(b, Value::const_int(Type::I8, sh));
        b = ctx.ir.gen_xor(b, s);
    }
    let low = ctx.ir.gen_and(b, Value::const_int(Type::I8, 1));
    ctx.ir.gen_icmp(Cond::Eq, low, Value::const_int(Type::I8, 0))
}

/// ZF, SF and PF from a result.
fn set_result_flags(ctx: &mut SemCtx<'_>, r: Value) {
    let ty = ctx.ir.value_type(r);
    let zf = ctx.ir.gen_icmp(Cond::Eq, r, Value::const_int(ty, 0));
    ctx.store_flag(ZF, zf);
    let sf = sign_bit(ctx, r);
    ctx.store_flag(SF, sf);
    let pf = parity(ctx, r);
    ctx.store_flag(PF, pf);
}

/// AF: carry out of bit 3.
fn set_aux_flag(ctx: &mut SemCtx<'_>, a: Value, b: Value, r: Value) {
    let ty = ctx.ir.value_type(r);
    let t = ctx.ir.gen_xor(a, b);
    let t = ctx.ir.gen_xor(t, r);
    let t = ctx.ir.gen_and(t, Value::const_int(ty, 0x10));
    let af = ctx.ir.gen_icmp(Cond::Ne, t, Value::const_int(ty, 0));
    ctx.store_flag(AF, af);
}

/// OF, AF, ZF, SF and PF for `r = a + b (+ carry)`.
fn set_add_flags(ctx: &mut SemCtx<'_>, a: Value, b: Value, r: Value) {
    let ar = ctx.ir.gen_xor(a, r);
    let br = ctx.ir.gen_xor(b, r);
    let both = ctx.ir.gen_and(ar, br);
    let of = sign_bit(ctx, both);
    ctx.store_flag(OF, of);
    set_aux_flag(ctx, a, b, r);
    set_result_flags(ctx, r);
}

/// OF, AF, ZF, SF and PF for `r = a - b (- borrow)`.
fn set_sub_flags(ctx: &mut SemCtx<'_>, a: Value, b: Value, r: Value) {
    let ab = ctx.ir.gen_xor(a, b);
    let ar = ctx.ir.gen_xor(a, r);
    let both = ctx.ir.gen_and(ab, ar);
    let of = sign_bit(ctx, both);
    ctx.store_flag(OF, of);
    set_aux_flag(ctx, a, b, r);
    set_result_flags(ctx, r);
}

/// Flags of `cmp a, b`.
fn compare(ctx: &mut SemCtx<'_>, a: Value, b: Value) {
    let r = ctx.ir.gen_sub(a, b);
    let cf = ctx.ir.gen_icmp(Cond::Ult, a, b);
    ctx.store_flag(CF, cf);
    set_sub_flags(ctx, a, b, r);
}

fn set_logic_flags(ctx: &mut SemCtx<'_>, r: Value) {
    ctx.store_flag(CF, Value::bool(false));
    ctx.store_flag(OF, Value::bool(false));
    set_result_flags(ctx, r);
}

/// Evaluate a condition code over the stored flags.
fn condition(ctx: &mut SemCtx<'_>, cc: ConditionCode) -> Option<Value> {
    use ConditionCode as C;
    let v = match cc {
        C::o => ctx.load_flag(OF),
        C::b => ctx.load_flag(CF),
        C::e => ctx.load_flag(ZF),
        C::s => ctx.load_flag(SF),
        C::p => ctx.load_flag(PF),
        C::be => {
            let cf = ctx.load_flag(CF);
            let zf = ctx.load_flag(ZF);
            ctx.ir.gen_or(cf, zf)
        }
        C::l => {
            let sf = ctx.load_flag(SF);
            let of = ctx.load_flag(OF);
            ctx.ir.gen_xor(sf, of)
        }
        C::le => {
            let sf = ctx.load_flag(SF);
            let of = ctx.load_flag(OF);
            let lt = ctx.ir.gen_xor(sf, of);
            let zf = ctx.load_flag(ZF);
            ctx.ir.gen_or(zf, lt)
        }
        // Odd codes are the negation of the preceding even one.
        C::no => return condition(ctx, C::o).map(|v| ctx.ir.gen_not(v)),
        C::ae => return condition(ctx, C::b).map(|v| ctx.ir.gen_not(v)),
        C::ne => return condition(ctx, C::e).map(|v| ctx.ir.gen_not(v)),
        C::ns => return condition(ctx, C::s).map(|v| ctx.ir.gen_not(v)),
        C::np => return condition(ctx, C::p).map(|v| ctx.ir.gen_not(v)),
        C::a => return condition(ctx, C::be).map(|v| ctx.ir.gen_not(v)),
        C::ge => return condition(ctx, C::l).map(|v| ctx.ir.gen_not(v)),
        C::g => return condition(ctx, C::le).map(|v| ctx.ir.gen_not(v)),
        _ => return None,
    };
    Some(v)
}

fn insn_condition(
    ctx: &mut SemCtx<'_>,
    x: &X86Insn,
) -> Result<Value, LiftError> {
    condition(ctx, x.insn.condition_code())
        .ok_or_else(|| unsupported(x, "condition code"))
}

// -- Stack ---------------------------------------------------

fn push_value(ctx: &mut SemCtx<'_>, value: Value, size: u32) {
    let native = ctx.native();
    let sp_off = ctx.config.sp;
    let sp = ctx.load_reg(sp_off, native);
    let size_v = ctx.const_native(size as u64);
    let sp = ctx.ir.gen_sub(sp, size_v);
    ctx.write_mem(sp, size, value);
    ctx.store_reg(sp_off, sp);
}

fn pop_value(ctx: &mut SemCtx<'_>, size: u32) -> Value {
    let native = ctx.native();
    let sp_off = ctx.config.sp;
    let sp = ctx.load_reg(sp_off, native);
    let value = ctx.read_mem(sp, size);
    let size_v = ctx.const_native(size as u64);
    let sp = ctx.ir.gen_add(sp, size_v);
    ctx.store_reg(sp_off, sp);
    value
}

/// Push/pop width of operand 0: its own size, or the native word for
/// immediates.
fn stack_size(ctx: &SemCtx<'_>, x: &X86Insn) -> Result<Type, LiftError> {
    match x.insn.op_kind(0) {
        OpKind::Register | OpKind::Memory => operand_type(x, 0),
        _ => Ok(ctx.native()),
    }
}

// ── Data movement ──────────────────────────────────────────────

fn trans_nop(_ctx: &mut SemCtx<'_>, _x: &X86Insn) -> GenResult {
    Ok(())
}

fn trans_mov(ctx: &mut SemCtx<'_>, x: &X86Insn) -> GenResult {
    let ty = operand_type(x, 0)?;
    let v = read_operand(ctx, x, 1, ty)?;
    write_operand(ctx, x, 0, v)
}

fn trans_movzx(ctx: &mut SemCtx<'_>, x: &X86Insn) -> GenResult {
    let ty = operand_type(x, 0)?;
    let src_ty = operand_type(x, 1)?;
    let v = read_operand(ctx, x, 1, src_ty)?;
    let v = ctx.ir.gen_zext_or_trunc(v, ty);
    write_operand(ctx, x, 0, v)
}

fn trans_movsx(ctx: &mut SemCtx<'_>, x: &X86Insn) -> GenResult {
    let ty = operand_type(x, 0)?;
    let src_ty = operand_type(x, 1)?;
    let v = read_operand(ctx, x, 1, src_ty)?;
    let v = ctx.ir.gen_sext_or_trunc(v, ty);
    write_operand(ctx, x, 0, v)
}

fn trans_lea(ctx: &mut SemCtx<'_>, x: &X86Insn) -> GenResult {
    if x.insn.op_kind(1) != OpKind::Memory {
        return Err(unsupported(x, "lea without memory operand"));
    }
    let ty = operand_type(x, 0)?;
    let addr = effective_address(ctx, x)?;
    let v = ctx.ir.gen_zext_or_trunc(addr, ty);
    write_operand(ctx, x, 0, v)
}

fn trans_xchg(ctx: &mut SemCtx<'_>, x: &X86Insn) -> GenResult {
    let (_, a, b) = alu_operands(ctx, x)?;
    write_operand(ctx, x, 0, b)?;
    write_operand(ctx, x, 1, a)
}

/// cbw / cwde / cdqe: sign-extend the low half of the accumulator.
fn trans_sign_extend_acc(ctx: &mut SemCtx<'_>, x: &X86Insn) -> GenResult {
    let (src, dst) = match x.insn.mnemonic() {
        Mnemonic::Cbw => (Register::AL, Register::AX),
        Mnemonic::Cwde => (Register::AX, Register::EAX),
        _ => (Register::EAX, Register::RAX),
    };
    let ty = int_type(dst.size()).ok_or_else(|| unsupported(x, "width"))?;
    let v = read_gpr(ctx, x, src)?;
    let v = ctx.ir.gen_sext(v, ty);
    write_gpr(ctx, x, dst, v)
}

/// cwd / cdq / cqo: fill the data register with the accumulator's
/// sign.
fn trans_sign_fill(ctx: &mut SemCtx<'_>, x: &X86Insn) -> GenResult {
    let (src, dst) = match x.insn.mnemonic() {
        Mnemonic::Cwd => (Register::AX, Register::DX),
        Mnemonic::Cdq => (Register::EAX, Register::EDX),
        _ => (Register::RAX, Register::RDX),
    };
    let v = read_gpr(ctx, x, src)?;
    let bits = ctx.ir.value_type(v).size_bits() as u64;
    let ty = ctx.ir.value_type(v);
    let fill = ctx.ir.gen_ashr(v, Value::const_int(ty, bits - 1));
    write_gpr(ctx, x, dst, fill)
}

// ── Arithmetic and logic ───────────────────────────────────────

fn trans_add(ctx: &mut SemCtx<'_>, x: &X86Insn) -> GenResult {
    let (_, a, b) = alu_operands(ctx, x)?;
    let r = ctx.ir.gen_add(a, b);
    let cf = ctx.ir.gen_icmp(Cond::Ult, r, a);
    ctx.store_flag(CF, cf);
    set_add_flags(ctx, a, b, r);
    write_operand(ctx, x, 0, r)
}

fn trans_adc(ctx: &mut SemCtx<'_>, x: &X86Insn) -> GenResult {
    let (ty, a, b) = alu_operands(ctx, x)?;
    let cin = ctx.load_flag(CF);
    let c = ctx.ir.gen_zext(cin, ty);
    let sum = ctx.ir.gen_add(a, b);
    let r = ctx.ir.gen_add(sum, c);
    // Carry out: r < a, or r == a with a carry in.
    let lt = ctx.ir.gen_icmp(Cond::Ult, r, a);
    let eq = ctx.ir.gen_icmp(Cond::Eq, r, a);
    let eq_c = ctx.ir.gen_and(eq, cin);
    let cf = ctx.ir.gen_or(lt, eq_c);
    ctx.store_flag(CF, cf);
    set_add_flags(ctx, a, b, r);
    write_operand(ctx, x, 0, r)
}

fn gen_sub(ctx: &mut SemCtx<'_>, x: &X86Insn, write_back: bool) -> GenResult {
    let (_, a, b) = alu_operands(ctx, x)?;
    let r = ctx.ir.gen_sub(a, b);
    let cf = ctx.ir.gen_icmp(Cond::Ult, a, b);
    ctx.store_flag(CF, cf);
    set_sub_flags(ctx, a, b, r);
    if write_back {
        write_operand(ctx, x, 0, r)?;
    }
    Ok(())
}

fn trans_sub(ctx: &mut SemCtx<'_>, x: &X86Insn) -> GenResult {
    gen_sub(ctx, x, true)
}

fn trans_cmp(ctx: &mut SemCtx<'_>, x: &X86Insn) -> GenResult {
    gen_sub(ctx, x, false)
}

fn trans_sbb(ctx: &mut SemCtx<'_>, x: &X86Insn) -> GenResult {
    let (ty, a, b) = alu_operands(ctx, x)?;
    let bin = ctx.load_flag(CF);
    let c = ctx.ir.gen_zext(bin, ty);
    let diff = ctx.ir.gen_sub(a, b);
    let r = ctx.ir.gen_sub(diff, c);
    let lt = ctx.ir.gen_icmp(Cond::Ult, a, b);
    let eq = ctx.ir.gen_icmp(Cond::Eq, a, b);
    let eq_b = ctx.ir.gen_and(eq, bin);
    let cf = ctx.ir.gen_or(lt, eq_b);
    ctx.store_flag(CF, cf);
    set_sub_flags(ctx, a, b, r);
    write_operand(ctx, x, 0, r)
}

fn gen_logic(
    ctx: &mut SemCtx<'_>,
    x: &X86Insn,
    op: BinOp,
    write_back: bool,
) -> GenResult {
    let (_, a, b) = alu_operands(ctx, x)?;
    let r = ctx.ir.gen_binary(op, a, b);
    set_logic_flags(ctx, r);
    if write_back {
        write_operand(ctx, x, 0, r)?;
    }
    Ok(())
}

fn trans_and(ctx: &mut SemCtx<'_>, x: &X86Insn) -> GenResult {
    gen_logic(ctx, x, BinOp::And, true)
}

fn trans_or(ctx: &mut SemCtx<'_>, x: &X86Insn) -> GenResult {
    gen_logic(ctx, x, BinOp::Or, true)
}

fn trans_xor(ctx: &mut SemCtx<'_>, x: &X86Insn) -> GenResult {
    gen_logic(ctx, x, BinOp::Xor, true)
}

fn trans_test(ctx: &mut SemCtx<'_>, x: &X86Insn) -> GenResult {
    gen_logic(ctx, x, BinOp::And, false)
}

/// inc / dec leave CF alone.
fn gen_inc_dec(ctx: &mut SemCtx<'_>, x: &X86Insn, op: BinOp) -> GenResult {
    let ty = operand_type(x, 0)?;
    let a = read_operand(ctx, x, 0, ty)?;
    let one = Value::const_int(ty, 1);
    let r = ctx.ir.gen_binary(op, a, one);
    if op == BinOp::Add {
        set_add_flags(ctx, a, one, r);
    } else {
        set_sub_flags(ctx, a, one, r);
    }
    write_operand(ctx, x, 0, r)
}

fn trans_inc(ctx: &mut SemCtx<'_>, x: &X86Insn) -> GenResult {
    gen_inc_dec(ctx, x, BinOp::Add)
}

fn trans_dec(ctx: &mut SemCtx<'_>, x: &X86Insn) -> GenResult {
    gen_inc_dec(ctx, x, BinOp::Sub)
}

fn trans_neg(ctx: &mut SemCtx<'_>, x: &X86Insn) -> GenResult {
    let ty = operand_type(x, 0)?;
    let a = read_operand(ctx, x, 0, ty)?;
    let zero = Value::const_int(ty, 0);
    let r = ctx.ir.gen_neg(a);
    let cf = ctx.ir.gen_icmp(Cond::Ne, a, zero);
    ctx.store_flag(CF, cf);
    set_sub_flags(ctx, zero, a, r);
    write_operand(ctx, x, 0, r)
}

fn trans_not(ctx: &mut SemCtx<'_>, x: &X86Insn) -> GenResult {
    let ty = operand_type(x, 0)?;
    let a = read_operand(ctx, x, 0, ty)?;
    let r = ctx.ir.gen_not(a);
    write_operand(ctx, x, 0, r)
}

/// Accumulator and data register for a `ty`-sized operand. Byte
/// operands pair `al` with `ah`.
fn acc_pair(ty: Type) -> (Register, Register) {
    match ty {
        Type::I8 => (Register::AL, Register::AH),
        Type::I16 => (Register::AX, Register::DX),
        Type::I32 => (Register::EAX, Register::EDX),
        _ => (Register::RAX, Register::RDX),
    }
}

/// Low and high halves of the 128-bit product of two 64-bit values,
/// built from 32-bit partial products.
fn mul_wide64(
    ctx: &mut SemCtx<'_>,
    a: Value,
    b: Value,
    signed: bool,
) -> (Value, Value) {
    let c = |v| Value::const_int(Type::I64, v);
    let half = c(32);
    let low = c(0xffff_ffff);
    let a_lo = ctx.ir.gen_and(a, low);
    let a_hi = ctx.ir.gen_lshr(a, half);
    let b_lo = ctx.ir.gen_and(b, low);
    let b_hi = ctx.ir.gen_lshr(b, half);
    let ll = ctx.ir.gen_mul(a_lo, b_lo);
    let lh = ctx.ir.gen_mul(a_lo, b_hi);
    let hl = ctx.ir.gen_mul(a_hi, b_lo);
    let hh = ctx.ir.gen_mul(a_hi, b_hi);

    // Carries out of the middle column.
    let ll_hi = ctx.ir.gen_lshr(ll, half);
    let lh_lo = ctx.ir.gen_and(lh, low);
    let hl_lo = ctx.ir.gen_and(hl, low);
    let mid = ctx.ir.gen_add(ll_hi, lh_lo);
    let mid = ctx.ir.gen_add(mid, hl_lo);

    let mut hi = hh;
    for part in [lh, hl, mid] {
        let carry = ctx.ir.gen_lshr(part, half);
        hi = ctx.ir.gen_add(hi, carry);
    }
    if signed {
        // Two's complement correction of the unsigned high half.
        for (x, y) in [(a, b), (b, a)] {
            let neg = ctx.ir.gen_icmp(Cond::Slt, x, c(0));
            let fix = ctx.ir.gen_select(neg, y, c(0));
            hi = ctx.ir.gen_sub(hi, fix);
        }
    }
    let lo = ctx.ir.gen_mul(a, b);
    (lo, hi)
}

/// Two- and three-operand imul truncate the product; the one-operand
/// form widens it. CF and OF report signed overflow.
fn trans_imul(ctx: &mut SemCtx<'_>, x: &X86Insn) -> GenResult {
    let ty = operand_type(x, 0)?;
    let (a, b) = match x.insn.op_count() {
        1 => return gen_widening_mul(ctx, x, true),
        2 => (read_operand(ctx, x, 0, ty)?, read_operand(ctx, x, 1, ty)?),
        3 => (read_operand(ctx, x, 1, ty)?, read_operand(ctx, x, 2, ty)?),
        _ => return Err(unsupported(x, "operand count")),
    };
    let (r, ovf) = if ty == Type::I64 {
        let (lo, hi) = mul_wide64(ctx, a, b, true);
        let sign = ctx.ir.gen_ashr(lo, Value::const_int(ty, 63));
        (lo, ctx.ir.gen_icmp(Cond::Ne, hi, sign))
    } else {
        let r = ctx.ir.gen_mul(a, b);
        let wa = ctx.ir.gen_sext(a, Type::I64);
        let wb = ctx.ir.gen_sext(b, Type::I64);
        let wide = ctx.ir.gen_mul(wa, wb);
        let back = ctx.ir.gen_sext(r, Type::I64);
        (r, ctx.ir.gen_icmp(Cond::Ne, wide, back))
    };
    ctx.store_flag(CF, ovf);
    ctx.store_flag(OF, ovf);
    write_operand(ctx, x, 0, r)
}

fn trans_mul(ctx: &mut SemCtx<'_>, x: &X86Insn) -> GenResult {
    gen_widening_mul(ctx, x, false)
}

/// mul / one-operand imul: the double-width product of the
/// accumulator and the operand goes to the data:accumulator pair.
/// CF and OF are set when the high half is significant.
fn gen_widening_mul(
    ctx: &mut SemCtx<'_>,
    x: &X86Insn,
    signed: bool,
) -> GenResult {
    let ty = operand_type(x, 0)?;
    let bits = ty.size_bits() as u64;
    let (acc, data) = acc_pair(ty);
    let a = read_gpr(ctx, x, acc)?;
    let b = read_operand(ctx, x, 0, ty)?;
    let (lo, hi) = if ty == Type::I64 {
        mul_wide64(ctx, a, b, signed)
    } else {
        let (wa, wb) = if signed {
            (ctx.ir.gen_sext(a, Type::I64), ctx.ir.gen_sext(b, Type::I64))
        } else {
            (ctx.ir.gen_zext(a, Type::I64), ctx.ir.gen_zext(b, Type::I64))
        };
        let wide = ctx.ir.gen_mul(wa, wb);
        let high = ctx.ir.gen_lshr(wide, Value::const_int(Type::I64, bits));
        (ctx.ir.gen_trunc(wide, ty), ctx.ir.gen_trunc(high, ty))
    };
    write_gpr(ctx, x, acc, lo)?;
    write_gpr(ctx, x, data, hi)?;

    let expected = if signed {
        ctx.ir.gen_ashr(lo, Value::const_int(ty, bits - 1))
    } else {
        Value::const_int(ty, 0)
    };
    let ovf = ctx.ir.gen_icmp(Cond::Ne, hi, expected);
    ctx.store_flag(CF, ovf);
    ctx.store_flag(OF, ovf);
    Ok(())
}

// ── Division ───────────────────────────────────────────────────

/// Branch to a trap block unless `ok`, then continue in a new block.
fn trap_unless(ctx: &mut SemCtx<'_>, ok: Value) {
    let cont = ctx.ir.create_block("div_ok");
    let trap = ctx.ir.create_block("div_error");
    ctx.ir.gen_cond_br(ok, cont, trap);
    ctx.ir.position_at_end(trap);
    ctx.ir.gen_unreachable();
    ctx.ir.position_at_end(cont);
}

/// `(select(neg, -v, v), neg)` for a signed `v`.
fn magnitude(ctx: &mut SemCtx<'_>, v: Value) -> (Value, Value) {
    let neg = sign_bit(ctx, v);
    let minus = ctx.ir.gen_neg(v);
    (ctx.ir.gen_select(neg, minus, v), neg)
}

/// Unsigned 128-by-64-bit division of `hi:lo` by `d`, for `hi < d`.
/// Restoring shift-and-subtract, unrolled. Returns the quotient and
/// the remainder.
fn long_divide(
    ctx: &mut SemCtx<'_>,
    hi: Value,
    lo: Value,
    d: Value,
) -> (Value, Value) {
    let c = |v| Value::const_int(Type::I64, v);
    let (mut rem, mut quo) = (hi, lo);
    for _ in 0..64 {
        let carry = sign_bit(ctx, rem);
        let up = ctx.ir.gen_shl(rem, c(1));
        let next = ctx.ir.gen_lshr(quo, c(63));
        rem = ctx.ir.gen_or(up, next);
        quo = ctx.ir.gen_shl(quo, c(1));
        let fits = ctx.ir.gen_icmp(Cond::Uge, rem, d);
        let ge = ctx.ir.gen_or(carry, fits);
        let diff = ctx.ir.gen_sub(rem, d);
        rem = ctx.ir.gen_select(ge, diff, rem);
        let bit = ctx.ir.gen_zext(ge, Type::I64);
        quo = ctx.ir.gen_or(quo, bit);
    }
    (quo, rem)
}

/// div / idiv: divide the data:accumulator pair by the operand. The
/// quotient goes to the accumulator and the remainder to the data
/// register. A zero divisor or a quotient that does not fit raises
/// #DE, lifted as a trap. Flags are left alone.
fn gen_divide(ctx: &mut SemCtx<'_>, x: &X86Insn, signed: bool) -> GenResult {
    let ty = operand_type(x, 0)?;
    let bits = ty.size_bits() as u64;
    let (acc, data) = acc_pair(ty);
    let lo = read_gpr(ctx, x, acc)?;
    let hi = read_gpr(ctx, x, data)?;
    let divisor = read_operand(ctx, x, 0, ty)?;
    let c = |v| Value::const_int(Type::I64, v);

    // Unsigned quotient and remainder of the magnitudes, with the
    // signs of the dividend and the divisor.
    let (q, r, d_neg, s_neg) = if ty == Type::I64 {
        let (mag_hi, mag_lo, d_neg) = if signed {
            let d_neg = sign_bit(ctx, hi);
            let neg_lo = ctx.ir.gen_neg(lo);
            let borrow = ctx.ir.gen_icmp(Cond::Eq, lo, c(0));
            let borrow = ctx.ir.gen_zext(borrow, Type::I64);
            let not_hi = ctx.ir.gen_not(hi);
            let neg_hi = ctx.ir.gen_add(not_hi, borrow);
            let mag_hi = ctx.ir.gen_select(d_neg, neg_hi, hi);
            let mag_lo = ctx.ir.gen_select(d_neg, neg_lo, lo);
            (mag_hi, mag_lo, d_neg)
        } else {
            (hi, lo, Value::bool(false))
        };
        let (mag_s, s_neg) = if signed {
            magnitude(ctx, divisor)
        } else {
            (divisor, Value::bool(false))
        };
        let ok = ctx.ir.gen_icmp(Cond::Ult, mag_hi, mag_s);
        trap_unless(ctx, ok);
        let (q, r) = long_divide(ctx, mag_hi, mag_lo, mag_s);
        (q, r, d_neg, s_neg)
    } else {
        let wide_hi = ctx.ir.gen_zext(hi, Type::I64);
        let wide_hi = ctx.ir.gen_shl(wide_hi, c(bits));
        let wide_lo = ctx.ir.gen_zext(lo, Type::I64);
        let dividend = ctx.ir.gen_or(wide_hi, wide_lo);
        let (mag_d, mag_s, d_neg, s_neg, ok) = if signed {
            let dividend = if bits == 32 {
                dividend
            } else {
                let pad = c(64 - 2 * bits);
                let up = ctx.ir.gen_shl(dividend, pad);
                ctx.ir.gen_ashr(up, pad)
            };
            let (mag_d, d_neg) = magnitude(ctx, dividend);
            let s = ctx.ir.gen_sext(divisor, Type::I64);
            let (mag_s, s_neg) = magnitude(ctx, s);
            let ok = ctx.ir.gen_icmp(Cond::Ne, mag_s, c(0));
            (mag_d, mag_s, d_neg, s_neg, ok)
        } else {
            let s = ctx.ir.gen_zext(divisor, Type::I64);
            let ok = ctx.ir.gen_icmp(Cond::Ult, hi, divisor);
            let f = Value::bool(false);
            (dividend, s, f, f, ok)
        };
        trap_unless(ctx, ok);
        let q = ctx.ir.gen_binary(BinOp::UDiv, mag_d, mag_s);
        let r = ctx.ir.gen_binary(BinOp::URem, mag_d, mag_s);
        (q, r, d_neg, s_neg)
    };

    let (q, r) = if signed {
        let q_neg = ctx.ir.gen_xor(d_neg, s_neg);
        let q_neg_w = ctx.ir.gen_zext(q_neg, Type::I64);
        let limit = ctx.ir.gen_add(c((1 << (bits - 1)) - 1), q_neg_w);
        let fits = ctx.ir.gen_icmp(Cond::Ule, q, limit);
        trap_unless(ctx, fits);
        let neg_q = ctx.ir.gen_neg(q);
        let neg_r = ctx.ir.gen_neg(r);
        let q = ctx.ir.gen_select(q_neg, neg_q, q);
        let r = ctx.ir.gen_select(d_neg, neg_r, r);
        (q, r)
    } else {
        (q, r)
    };
    let q = ctx.ir.gen_zext_or_trunc(q, ty);
    let r = ctx.ir.gen_zext_or_trunc(r, ty);
    write_gpr(ctx, x, acc, q)?;
    write_gpr(ctx, x, data, r)
}

fn trans_div(ctx: &mut SemCtx<'_>, x: &X86Insn) -> GenResult {
    gen_divide(ctx, x, false)
}

fn trans_idiv(ctx: &mut SemCtx<'_>, x: &X86Insn) -> GenResult {
    gen_divide(ctx, x, true)
}

// ── Shifts and rotates ─────────────────────────────────────────

/// Shift count operand masked to 5 bits, or 6 for 64-bit operands.
fn masked_count(
    ctx: &mut SemCtx<'_>,
    x: &X86Insn,
    ty: Type,
) -> Result<Value, LiftError> {
    let count = read_operand(ctx, x, 1, ty)?;
    let mask = if ty == Type::I64 { 0x3f } else { 0x1f };
    Ok(ctx.ir.gen_and(count, Value::const_int(ty, mask)))
}

/// Store each flag only when the masked count is non-zero.
fn store_flags_if_shifted(
    ctx: &mut SemCtx<'_>,
    count: Value,
    flags: &[(u32, Value)],
) {
    let ty = ctx.ir.value_type(count);
    let changed = ctx.ir.gen_icmp(Cond::Ne, count, Value::const_int(ty, 0));
    for &(flag, new) in flags {
        let old = ctx.load_flag(flag);
        let v = ctx.ir.gen_select(changed, new, old);
        ctx.store_flag(flag, v);
    }
}

/// shl / shr / sar. Byte and word operands are shifted at 32 bits,
/// so a count past their width drains them (or fills them with the
/// sign) and CF sees the bits that left.
fn gen_shift(ctx: &mut SemCtx<'_>, x: &X86Insn, op: BinOp) -> GenResult {
    let ty = operand_type(x, 0)?;
    let a = read_operand(ctx, x, 0, ty)?;
    let count = masked_count(ctx, x, ty)?;

    let wty = if ty.size_bits() < 32 { Type::I32 } else { ty };
    let wa = if op == BinOp::AShr {
        ctx.ir.gen_sext_or_trunc(a, wty)
    } else {
        ctx.ir.gen_zext_or_trunc(a, wty)
    };
    let wc = ctx.ir.gen_zext_or_trunc(count, wty);
    let wide = ctx.ir.gen_binary(op, wa, wc);
    let r = ctx.ir.gen_zext_or_trunc(wide, ty);
    write_operand(ctx, x, 0, r)?;

    let one = Value::const_int(wty, 1);
    let last_out = match op {
        BinOp::Shl if wty != ty => {
            let width = Value::const_int(wty, ty.size_bits() as u64);
            ctx.ir.gen_lshr(wide, width)
        }
        BinOp::Shl => {
            let bits = Value::const_int(ty, ty.size_bits() as u64);
            let back = ctx.ir.gen_sub(bits, count);
            ctx.ir.gen_lshr(a, back)
        }
        _ => {
            let back = ctx.ir.gen_sub(wc, one);
            ctx.ir.gen_binary(op, wa, back)
        }
    };
    let last_out = ctx.ir.gen_and(last_out, one);
    let cf = ctx.ir.gen_icmp(Cond::Ne, last_out, Value::const_int(wty, 0));
    let of = match op {
        BinOp::Shl => {
            let sign = sign_bit(ctx, r);
            ctx.ir.gen_xor(sign, cf)
        }
        BinOp::LShr => sign_bit(ctx, a),
        _ => Value::bool(false),
    };
    let zf = ctx.ir.gen_icmp(Cond::Eq, r, Value::const_int(ty, 0));
    let sf = sign_bit(ctx, r);
    let pf = parity(ctx, r);
    let flags = [(CF, cf), (OF, of), (ZF, zf), (SF, sf), (PF, pf)];
    store_flags_if_shifted(ctx, count, &flags);
    Ok(())
}

fn trans_shl(ctx: &mut SemCtx<'_>, x: &X86Insn) -> GenResult {
    gen_shift(ctx, x, BinOp::Shl)
}

fn trans_shr(ctx: &mut SemCtx<'_>, x: &X86Insn) -> GenResult {
    gen_shift(ctx, x, BinOp::LShr)
}

fn trans_sar(ctx: &mut SemCtx<'_>, x: &X86Insn) -> GenResult {
    gen_shift(ctx, x, BinOp::AShr)
}

/// OF after a rotate: the top bit of the result against CF (left) or
/// against the bit below it (right).
fn rotate_overflow(
    ctx: &mut SemCtx<'_>,
    r: Value,
    cf: Value,
    left: bool,
) -> Value {
    let msb = sign_bit(ctx, r);
    if left {
        return ctx.ir.gen_xor(msb, cf);
    }
    let ty = ctx.ir.value_type(r);
    let below = ctx.ir.gen_shl(r, Value::const_int(ty, 1));
    let below = sign_bit(ctx, below);
    ctx.ir.gen_xor(msb, below)
}

/// rol / ror. Only CF and OF change.
fn gen_rotate(ctx: &mut SemCtx<'_>, x: &X86Insn, left: bool) -> GenResult {
    let ty = operand_type(x, 0)?;
    let bits = ty.size_bits() as u64;
    let a = read_operand(ctx, x, 0, ty)?;
    let count = masked_count(ctx, x, ty)?;
    let wrap = Value::const_int(ty, bits - 1);
    let n = ctx.ir.gen_and(count, wrap);
    let rest = ctx.ir.gen_sub(Value::const_int(ty, bits), n);
    let rest = ctx.ir.gen_and(rest, wrap);
    let (fwd, back) = if left {
        (BinOp::Shl, BinOp::LShr)
    } else {
        (BinOp::LShr, BinOp::Shl)
    };
    let hi = ctx.ir.gen_binary(fwd, a, n);
    let lo = ctx.ir.gen_binary(back, a, rest);
    let r = ctx.ir.gen_or(hi, lo);
    write_operand(ctx, x, 0, r)?;

    let cf = if left {
        let lsb = ctx.ir.gen_and(r, Value::const_int(ty, 1));
        ctx.ir.gen_icmp(Cond::Ne, lsb, Value::const_int(ty, 0))
    } else {
        sign_bit(ctx, r)
    };
    let of = rotate_overflow(ctx, r, cf, left);
    store_flags_if_shifted(ctx, count, &[(CF, cf), (OF, of)]);
    Ok(())
}

fn trans_rol(ctx: &mut SemCtx<'_>, x: &X86Insn) -> GenResult {
    gen_rotate(ctx, x, true)
}

fn trans_ror(ctx: &mut SemCtx<'_>, x: &X86Insn) -> GenResult {
    gen_rotate(ctx, x, false)
}

/// rcl / rcr: rotate the operand with CF as an extra top bit.
/// Narrow operands rotate the `bits + 1`-bit value inside 64 bits.
fn gen_rotate_carry(
    ctx: &mut SemCtx<'_>,
    x: &X86Insn,
    left: bool,
) -> GenResult {
    let ty = operand_type(x, 0)?;
    let bits = ty.size_bits() as u64;
    let a = read_operand(ctx, x, 0, ty)?;
    let count = masked_count(ctx, x, ty)?;
    let cin = ctx.load_flag(CF);
    let c = |v| Value::const_int(Type::I64, v);

    let (r, carry) = if bits < 64 {
        let width = bits + 1;
        let n = ctx.ir.gen_zext_or_trunc(count, Type::I64);
        let n = ctx.ir.gen_binary(BinOp::URem, n, c(width));
        let top = ctx.ir.gen_zext(cin, Type::I64);
        let top = ctx.ir.gen_shl(top, c(bits));
        let low = ctx.ir.gen_zext(a, Type::I64);
        let v = ctx.ir.gen_or(top, low);
        let rest = ctx.ir.gen_sub(c(width), n);
        let (fwd, back) = if left {
            (BinOp::Shl, BinOp::LShr)
        } else {
            (BinOp::LShr, BinOp::Shl)
        };
        let hi = ctx.ir.gen_binary(fwd, v, n);
        let lo = ctx.ir.gen_binary(back, v, rest);
        let rot = ctx.ir.gen_or(hi, lo);
        let carry = ctx.ir.gen_lshr(rot, c(bits));
        (ctx.ir.gen_trunc(rot, ty), carry)
    } else {
        // Valid for counts 1..63; a zero count keeps the operand.
        let n = count;
        let inv = ctx.ir.gen_sub(c(64), n);
        let n1 = ctx.ir.gen_sub(n, c(1));
        let cin = ctx.ir.gen_zext(cin, Type::I64);
        let (main, carried, wrapped, carry) = if left {
            let main = ctx.ir.gen_shl(a, n);
            let carried = ctx.ir.gen_shl(cin, n1);
            let half = ctx.ir.gen_lshr(a, c(1));
            let wrapped = ctx.ir.gen_lshr(half, inv);
            (main, carried, wrapped, ctx.ir.gen_lshr(a, inv))
        } else {
            let main = ctx.ir.gen_lshr(a, n);
            let carried = ctx.ir.gen_shl(cin, inv);
            let dbl = ctx.ir.gen_shl(a, c(1));
            let wrapped = ctx.ir.gen_shl(dbl, inv);
            (main, carried, wrapped, ctx.ir.gen_lshr(a, n1))
        };
        let r = ctx.ir.gen_or(main, carried);
        let r = ctx.ir.gen_or(r, wrapped);
        let changed = ctx.ir.gen_icmp(Cond::Ne, n, c(0));
        (ctx.ir.gen_select(changed, r, a), carry)
    };
    write_operand(ctx, x, 0, r)?;

    let carry = ctx.ir.gen_and(carry, c(1));
    let cf = ctx.ir.gen_icmp(Cond::Ne, carry, c(0));
    let of = rotate_overflow(ctx, r, cf, left);
    store_flags_if_shifted(ctx, count, &[(CF, cf), (OF, of)]);
    Ok(())
}

fn trans_rcl(ctx: &mut SemCtx<'_>, x: &X86Insn) -> GenResult {
    gen_rotate_carry(ctx, x, true)
}

fn trans_rcr(ctx: &mut SemCtx<'_>, x: &X86Insn) -> GenResult {
    gen_rotate_carry(ctx, x, false)
}

// ── Bit operations ─────────────────────────────────────────────

/// bt / bts / btr / btc: CF receives the selected bit, which the
/// writing forms then set, clear or flip. A register offset into
/// memory is signed and addresses the byte it falls in.
fn trans_bit_test(ctx: &mut SemCtx<'_>, x: &X86Insn) -> GenResult {
    let ty = operand_type(x, 0)?;
    let in_memory = x.insn.op_kind(0) == OpKind::Memory
        && x.insn.op_kind(1) == OpKind::Register;
    let (addr, a, bit) = if in_memory {
        let native = ctx.native();
        let off = read_operand(ctx, x, 1, ty)?;
        let wide = ctx.ir.gen_sext_or_trunc(off, native);
        let byte = ctx.ir.gen_ashr(wide, Value::const_int(native, 3));
        let ea = effective_address(ctx, x)?;
        let addr = ctx.ir.gen_add(ea, byte);
        let v = ctx.read_mem(addr, 1);
        let v = ctx.ir.gen_trunc(v, Type::I8);
        let bit = ctx.ir.gen_trunc(off, Type::I8);
        let bit = ctx.ir.gen_and(bit, Value::const_int(Type::I8, 7));
        (Some(addr), v, bit)
    } else {
        let a = read_operand(ctx, x, 0, ty)?;
        let b = read_operand(ctx, x, 1, ty)?;
        let wrap = Value::const_int(ty, ty.size_bits() as u64 - 1);
        (None, a, ctx.ir.gen_and(b, wrap))
    };

    let vty = ctx.ir.value_type(a);
    let mask = ctx.ir.gen_shl(Value::const_int(vty, 1), bit);
    let hit = ctx.ir.gen_and(a, mask);
    let cf = ctx.ir.gen_icmp(Cond::Ne, hit, Value::const_int(vty, 0));
    ctx.store_flag(CF, cf);

    let r = match x.insn.mnemonic() {
        Mnemonic::Bts => ctx.ir.gen_or(a, mask),
        Mnemonic::Btr => {
            let keep = ctx.ir.gen_not(mask);
            ctx.ir.gen_and(a, keep)
        }
        Mnemonic::Btc => ctx.ir.gen_xor(a, mask),
        _ => return Ok(()),
    };
    match addr {
        Some(addr) => {
            ctx.write_mem(addr, 1, r);
            Ok(())
        }
        None => write_operand(ctx, x, 0, r),
    }
}

fn trans_bswap(ctx: &mut SemCtx<'_>, x: &X86Insn) -> GenResult {
    let ty = operand_type(x, 0)?;
    if ty.size_bits() < 32 {
        return Err(unsupported(x, "16-bit bswap"));
    }
    let a = read_operand(ctx, x, 0, ty)?;
    let n = ty.size_bytes() as u64;
    let c = |v| Value::const_int(ty, v);
    let mut r = c(0);
    for i in 0..n {
        let byte = ctx.ir.gen_lshr(a, c(8 * i));
        let byte = ctx.ir.gen_and(byte, c(0xff));
        let byte = ctx.ir.gen_shl(byte, c(8 * (n - 1 - i)));
        r = ctx.ir.gen_or(r, byte);
    }
    write_operand(ctx, x, 0, r)
}

// ── Atomics ────────────────────────────────────────────────────

/// xadd: the sum goes to the destination and the old destination to
/// the source register.
fn trans_xadd(ctx: &mut SemCtx<'_>, x: &X86Insn) -> GenResult {
    let (_, d, s) = alu_operands(ctx, x)?;
    let r = ctx.ir.gen_add(d, s);
    let cf = ctx.ir.gen_icmp(Cond::Ult, r, d);
    ctx.store_flag(CF, cf);
    set_add_flags(ctx, d, s, r);
    write_operand(ctx, x, 1, d)?;
    write_operand(ctx, x, 0, r)
}

/// cmpxchg: compare the accumulator with the destination; on a match
/// the source is stored, otherwise the destination is loaded into the
/// accumulator. Flags follow `cmp acc, dest`.
fn trans_cmpxchg(ctx: &mut SemCtx<'_>, x: &X86Insn) -> GenResult {
    let (ty, d, s) = alu_operands(ctx, x)?;
    let (acc, _) = acc_pair(ty);
    let a = read_gpr(ctx, x, acc)?;
    compare(ctx, a, d);
    let eq = ctx.ir.gen_icmp(Cond::Eq, a, d);

    // A matching 32-bit compare leaves the upper half of rax alone.
    if ty == Type::I32 && is_long_mode(ctx) {
        let (offset, _) =
            gpr_slot(Register::RAX).ok_or_else(|| unsupported(x, "rax"))?;
        let old = ctx.load_reg(offset, Type::I64);
        let loaded = ctx.ir.gen_zext(d, Type::I64);
        let v = ctx.ir.gen_select(eq, old, loaded);
        ctx.store_reg(offset, v);
    } else {
        let v = ctx.ir.gen_select(eq, a, d);
        write_gpr(ctx, x, acc, v)?;
    }
    let v = ctx.ir.gen_select(eq, s, d);
    write_operand(ctx, x, 0, v)
}

// ── String operations ──────────────────────────────────────────

/// Counter, source and destination index registers of a string
/// instruction, all of the address size.
struct StringRegs {
    counter: Register,
    si: Register,
    di: Register,
}

fn string_regs(x: &X86Insn) -> Result<StringRegs, LiftError> {
    let regs = |counter, si, di| StringRegs { counter, si, di };
    for n in 0..x.insn.op_count() {
        match x.insn.op_kind(n) {
            OpKind::MemorySegSI | OpKind::MemoryESDI => {
                return Ok(regs(Register::CX, Register::SI, Register::DI))
            }
            OpKind::MemorySegESI | OpKind::MemoryESEDI => {
                return Ok(regs(Register::ECX, Register::ESI, Register::EDI))
            }
            OpKind::MemorySegRSI | OpKind::MemoryESRDI => {
                return Ok(regs(Register::RCX, Register::RSI, Register::RDI))
            }
            _ => {}
        }
    }
    Err(unsupported(x, "string operands"))
}

/// Add the direction-scaled element size to an index register.
fn advance_index(
    ctx: &mut SemCtx<'_>,
    x: &X86Insn,
    reg: Register,
    delta: Value,
) -> GenResult {
    let v = read_gpr(ctx, x, reg)?;
    let v = ctx.ir.gen_add(v, delta);
    write_gpr(ctx, x, reg, v)
}

/// One iteration of a string instruction. Returns whether it compares
/// (cmps / scas), in which case the repeat prefix also tests ZF.
fn string_step(
    ctx: &mut SemCtx<'_>,
    x: &X86Insn,
    regs: &StringRegs,
    ty: Type,
) -> Result<bool, LiftError> {
    let size = ty.size_bytes();
    let native = ctx.native();
    let df = ctx.load_flag(DF);
    let index_ty = int_type(regs.si.size())
        .ok_or_else(|| unsupported(x, "index width"))?;
    let up = Value::const_int(index_ty, size as u64);
    let down = Value::const_int(index_ty, (size as u64).wrapping_neg());
    let delta = ctx.ir.gen_select(df, down, up);

    let si = read_gpr(ctx, x, regs.si)?;
    let src = ctx.ir.gen_zext_or_trunc(si, native);
    let src = with_segment_base(ctx, x.insn.memory_segment(), src);
    let di = read_gpr(ctx, x, regs.di)?;
    let dst = ctx.ir.gen_zext_or_trunc(di, native);
    let (acc, _) = acc_pair(ty);

    let (uses_si, uses_di, compares) = match x.insn.mnemonic() {
        Mnemonic::Movsb | Mnemonic::Movsw | Mnemonic::Movsd
        | Mnemonic::Movsq => {
            let v = ctx.read_mem(src, size);
            let v = ctx.ir.gen_zext_or_trunc(v, ty);
            ctx.write_mem(dst, size, v);
            (true, true, false)
        }
        Mnemonic::Stosb | Mnemonic::Stosw | Mnemonic::Stosd
        | Mnemonic::Stosq => {
            let v = read_gpr(ctx, x, acc)?;
            ctx.write_mem(dst, size, v);
            (false, true, false)
        }
        Mnemonic::Lodsb | Mnemonic::Lodsw | Mnemonic::Lodsd
        | Mnemonic::Lodsq => {
            let v = ctx.read_mem(src, size);
            write_gpr(ctx, x, acc, v)?;
            (true, false, false)
        }
        Mnemonic::Cmpsb | Mnemonic::Cmpsw | Mnemonic::Cmpsd
        | Mnemonic::Cmpsq => {
            let a = ctx.read_mem(src, size);
            let a = ctx.ir.gen_zext_or_trunc(a, ty);
            let b = ctx.read_mem(dst, size);
            let b = ctx.ir.gen_zext_or_trunc(b, ty);
            compare(ctx, a, b);
            (true, true, true)
        }
        _ => {
            let a = read_gpr(ctx, x, acc)?;
            let b = ctx.read_mem(dst, size);
            let b = ctx.ir.gen_zext_or_trunc(b, ty);
            compare(ctx, a, b);
            (false, true, true)
        }
    };
    if uses_si {
        advance_index(ctx, x, regs.si, delta)?;
    }
    if uses_di {
        advance_index(ctx, x, regs.di, delta)?;
    }
    Ok(compares)
}

/// movs / stos / lods / cmps / scas, optionally repeated. A repeated
/// form runs one iteration per pass and branches back to its own
/// address while the counter (and, for compares, ZF) allows.
fn trans_string(ctx: &mut SemCtx<'_>, x: &X86Insn) -> GenResult {
    let regs = string_regs(x)?;
    let bytes = x.insn.memory_size().size();
    let ty = int_type(bytes)
        .ok_or_else(|| unsupported(x, format!("{bytes}-byte element")))?;
    if !x.insn.has_repe_prefix() && !x.insn.has_repne_prefix() {
        string_step(ctx, x, &regs, ty)?;
        return Ok(());
    }

    let count = read_gpr(ctx, x, regs.counter)?;
    let cty = ctx.ir.value_type(count);
    let zero = Value::const_int(cty, 0);
    let empty = ctx.ir.gen_icmp(Cond::Eq, count, zero);
    let body = ctx.ir.create_block("rep_body");
    let done = ctx.ir.create_block("rep_done");
    ctx.ir.gen_cond_br(empty, done, body);

    ctx.ir.position_at_end(body);
    let compares = string_step(ctx, x, &regs, ty)?;
    let left = ctx.ir.gen_sub(count, Value::const_int(cty, 1));
    write_gpr(ctx, x, regs.counter, left)?;
    let mut more = ctx.ir.gen_icmp(Cond::Ne, left, zero);
    if compares {
        let mut zf = ctx.load_flag(ZF);
        if x.insn.has_repne_prefix() {
            zf = ctx.ir.gen_not(zf);
        }
        more = ctx.ir.gen_and(more, zf);
    }
    let again = ctx.ir.create_block("rep_again");
    ctx.ir.gen_cond_br(more, again, done);

    ctx.ir.position_at_end(again);
    let this = ctx.const_native(x.address());
    ctx.jump(this);
    ctx.ir.gen_unreachable();

    ctx.ir.position_at_end(done);
    Ok(())
}

// ── Stack ──────────────────────────────────────────────────────

fn trans_push(ctx: &mut SemCtx<'_>, x: &X86Insn) -> GenResult {
    let ty = stack_size(ctx, x)?;
    let v = read_operand(ctx, x, 0, ty)?;
    push_value(ctx, v, ty.size_bytes());
    Ok(())
}

fn trans_pop(ctx: &mut SemCtx<'_>, x: &X86Insn) -> GenResult {
    let ty = stack_size(ctx, x)?;
    let v = pop_value(ctx, ty.size_bytes());
    let v = ctx.ir.gen_zext_or_trunc(v, ty);
    write_operand(ctx, x, 0, v)
}

fn trans_leave(ctx: &mut SemCtx<'_>, _x: &X86Insn) -> GenResult {
    let native = ctx.native();
    let fp_off = ctx.config.fp;
    let fp = ctx.load_reg(fp_off, native);
    let sp_off = ctx.config.sp;
    ctx.store_reg(sp_off, fp);
    let saved = pop_value(ctx, native.size_bytes());
    ctx.store_reg(fp_off, saved);
    Ok(())
}

// ── Control transfer ───────────────────────────────────────────

fn trans_jmp(ctx: &mut SemCtx<'_>, x: &X86Insn) -> GenResult {
    let native = ctx.native();
    let dest = read_operand(ctx, x, 0, native)?;
    ctx.jump(dest);
    ctx.ir.gen_unreachable();
    Ok(())
}

fn trans_jcc(ctx: &mut SemCtx<'_>, x: &X86Insn) -> GenResult {
    let cond = insn_condition(ctx, x)?;
    gen_branch(ctx, x, cond)
}

/// Jump to the branch target when `cond` holds, else to the next
/// instruction.
fn gen_branch(ctx: &mut SemCtx<'_>, x: &X86Insn, cond: Value) -> GenResult {
    let taken = ctx.ir.create_block("taken");
    let fallthrough = ctx.ir.create_block("fallthrough");
    ctx.ir.gen_cond_br(cond, taken, fallthrough);

    ctx.ir.position_at_end(taken);
    let target = ctx.const_native(x.insn.near_branch_target());
    ctx.jump(target);
    ctx.ir.gen_unreachable();

    ctx.ir.position_at_end(fallthrough);
    let next = ctx.const_native(x.next_address());
    ctx.jump(next);
    ctx.ir.gen_unreachable();
    Ok(())
}

fn trans_jcxz(ctx: &mut SemCtx<'_>, x: &X86Insn) -> GenResult {
    let reg = match x.insn.mnemonic() {
        Mnemonic::Jcxz => Register::CX,
        Mnemonic::Jecxz => Register::ECX,
        _ => Register::RCX,
    };
    let count = read_gpr(ctx, x, reg)?;
    let ty = ctx.ir.value_type(count);
    let zero = ctx.ir.gen_icmp(Cond::Eq, count, Value::const_int(ty, 0));
    gen_branch(ctx, x, zero)
}

/// Counter register selected by the address size.
fn count_register(ctx: &SemCtx<'_>, x: &X86Insn) -> Register {
    match x.insn.op_code().address_size() {
        16 => Register::CX,
        32 => Register::ECX,
        64 => Register::RCX,
        _ if is_long_mode(ctx) => Register::RCX,
        _ => Register::ECX,
    }
}

/// loop / loope / loopne: decrement the counter and branch while it
/// is non-zero (and ZF agrees).
fn trans_loop(ctx: &mut SemCtx<'_>, x: &X86Insn) -> GenResult {
    let reg = count_register(ctx, x);
    let count = read_gpr(ctx, x, reg)?;
    let ty = ctx.ir.value_type(count);
    let left = ctx.ir.gen_sub(count, Value::const_int(ty, 1));
    write_gpr(ctx, x, reg, left)?;
    let mut cond = ctx.ir.gen_icmp(Cond::Ne, left, Value::const_int(ty, 0));
    match x.insn.mnemonic() {
        Mnemonic::Loope => {
            let zf = ctx.load_flag(ZF);
            cond = ctx.ir.gen_and(cond, zf);
        }
        Mnemonic::Loopne => {
            let zf = ctx.load_flag(ZF);
            let nz = ctx.ir.gen_not(zf);
            cond = ctx.ir.gen_and(cond, nz);
        }
        _ => {}
    }
    gen_branch(ctx, x, cond)
}

/// Push the return address and emit a call placeholder; execution
/// continues at the next instruction.
fn trans_call(ctx: &mut SemCtx<'_>, x: &X86Insn) -> GenResult {
    let native = ctx.native();
    let dest = read_operand(ctx, x, 0, native)?;
    let ret = ctx.const_native(x.next_address());
    push_value(ctx, ret, native.size_bytes());
    ctx.call(dest);
    Ok(())
}

fn trans_ret(ctx: &mut SemCtx<'_>, x: &X86Insn) -> GenResult {
    let native = ctx.native();
    let extra = if x.insn.op_count() > 0 {
        x.insn.immediate(0)
    } else {
        0
    };
    let sp_off = ctx.config.sp;
    let sp = ctx.load_reg(sp_off, native);
    let pop = ctx.const_native(native.size_bytes() as u64 + extra);
    let sp = ctx.ir.gen_add(sp, pop);
    ctx.store_reg(sp_off, sp);
    ctx.ret();
    ctx.ir.gen_unreachable();
    Ok(())
}

fn trans_setcc(ctx: &mut SemCtx<'_>, x: &X86Insn) -> GenResult {
    let cond = insn_condition(ctx, x)?;
    let v = ctx.ir.gen_zext(cond, Type::I8);
    write_operand(ctx, x, 0, v)
}

fn trans_cmovcc(ctx: &mut SemCtx<'_>, x: &X86Insn) -> GenResult {
    let cond = insn_condition(ctx, x)?;
    let (_, a, b) = alu_operands(ctx, x)?;
    let r = ctx.ir.gen_select(cond, b, a);
    write_operand(ctx, x, 0, r)
}

fn trans_flag_op(ctx: &mut SemCtx<'_>, x: &X86Insn) -> GenResult {
    match x.insn.mnemonic() {
        Mnemonic::Clc => ctx.store_flag(CF, Value::bool(false)),
        Mnemonic::Stc => ctx.store_flag(CF, Value::bool(true)),
        Mnemonic::Cmc => {
            let cf = ctx.load_flag(CF);
            let cf = ctx.ir.gen_not(cf);
            ctx.store_flag(CF, cf);
        }
        Mnemonic::Cld => ctx.store_flag(DF, Value::bool(false)),
        _ => ctx.store_flag(DF, Value::bool(true)),
    }
    Ok(())
}

/// hlt / ud2 / int3: execution does not continue.
fn trans_trap(ctx: &mut SemCtx<'_>, _x: &X86Insn) -> GenResult {
    ctx.ir.gen_unreachable();
    Ok(())
}
