//! x86 instruction decoding through iced-x86.

use iced_x86::{
    Decoder, DecoderError, DecoderOptions, Instruction, Mnemonic, OpKind,
};
use lift_core::ConstData;

use crate::{DecodeError, MachineInsn};

/// Operand slots embedded in the instruction detail constant.
const DETAIL_OPERANDS: u32 = 4;

/// A decoded x86 instruction and its encoding.
#[derive(Debug, Clone)]
pub struct X86Insn {
    pub insn: Instruction,
    pub bytes: Vec<u8>,
}

impl MachineInsn for X86Insn {
    fn address(&self) -> u64 {
        self.insn.ip()
    }

    fn size(&self) -> usize {
        self.insn.len()
    }

    fn mnemonic_name(&self) -> String {
        format!("{:?}", self.insn.mnemonic()).to_lowercase()
    }

    fn ends_linear_run(&self) -> bool {
        matches!(
            self.insn.mnemonic(),
            Mnemonic::Jmp
                | Mnemonic::Ret
                | Mnemonic::Retf
                | Mnemonic::Iret
                | Mnemonic::Iretd
                | Mnemonic::Iretq
                | Mnemonic::Ud2
                | Mnemonic::Hlt
                | Mnemonic::Int3
        )
    }
}

/// Decode one instruction at the start of `code`.
pub fn decode(
    bitness: u32,
    code: &[u8],
    address: u64,
) -> Result<X86Insn, DecodeError> {
    let mut decoder =
        Decoder::with_ip(bitness, code, address, DecoderOptions::NONE);
    let mut insn = Instruction::default();
    decoder.decode_out(&mut insn);
    if insn.is_invalid() {
        return Err(match decoder.last_error() {
            DecoderError::NoMoreBytes => DecodeError::Truncated(address),
            _ => DecodeError::InvalidEncoding(address),
        });
    }
    let bytes = code[..insn.len()].to_vec();
    Ok(X86Insn { insn, bytes })
}

pub(super) fn is_immediate(kind: OpKind) -> bool {
    matches!(
        kind,
        OpKind::Immediate8
            | OpKind::Immediate8_2nd
            | OpKind::Immediate16
            | OpKind::Immediate32
            | OpKind::Immediate64
            | OpKind::Immediate8to16
            | OpKind::Immediate8to32
            | OpKind::Immediate8to64
            | OpKind::Immediate32to64
    )
}

/// `{ i8 kind, i16 reg, i16 base, i16 index, i8 scale, i64 disp,
///    i64 imm, i8 size }` for operand `n`; zeroed past `op_count`.
fn describe_operand(insn: &Instruction, n: u32) -> ConstData {
    if n >= insn.op_count() {
        return ConstData::Struct(vec![
            ConstData::i8(0xff),
            ConstData::i16(0),
            ConstData::i16(0),
            ConstData::i16(0),
            ConstData::i8(0),
            ConstData::i64(0),
            ConstData::i64(0),
            ConstData::i8(0),
        ]);
    }
    let kind = insn.op_kind(n);
    let (base, index, scale, disp, size) = if kind == OpKind::Memory {
        (
            insn.memory_base() as u64,
            insn.memory_index() as u64,
            insn.memory_index_scale() as u64,
            insn.memory_displacement64(),
            insn.memory_size().size() as u64,
        )
    } else {
        (0, 0, 0, 0, 0)
    };
    let reg = if kind == OpKind::Register {
        insn.op_register(n)
    } else {
        iced_x86::Register::None
    };
    let size = if kind == OpKind::Register {
        reg.size() as u64
    } else {
        size
    };
    let imm = if is_immediate(kind) {
        insn.try_immediate(n).unwrap_or(0)
    } else if matches!(
        kind,
        OpKind::NearBranch16 | OpKind::NearBranch32 | OpKind::NearBranch64
    ) {
        insn.near_branch_target()
    } else {
        0
    };
    ConstData::Struct(vec![
        ConstData::i8(kind as u64),
        ConstData::i16(reg as u64),
        ConstData::i16(base),
        ConstData::i16(index),
        ConstData::i8(scale),
        ConstData::i64(disp),
        ConstData::i64(imm),
        ConstData::i8(size),
    ])
}

/// Constant embedding of an instruction:
/// `{ i32 code, i16 mnemonic, i8 len, i8 op_count, i8 prefixes,
///    i16 segment, [4 x operand], bytes }`.
///
/// Prefix bits: 1 = rep, 2 = repne, 4 = lock.
pub fn describe(x: &X86Insn) -> ConstData {
    let insn = &x.insn;
    let prefixes = insn.has_rep_prefix() as u64
        | (insn.has_repne_prefix() as u64) << 1
        | (insn.has_lock_prefix() as u64) << 2;
    let operands = (0..DETAIL_OPERANDS)
        .map(|n| describe_operand(insn, n))
        .collect();
    ConstData::Struct(vec![
        ConstData::i32(insn.code() as u64),
        ConstData::i16(insn.mnemonic() as u64),
        ConstData::i8(insn.len() as u64),
        ConstData::i8(insn.op_count() as u64),
        ConstData::i8(prefixes),
        ConstData::i16(insn.memory_segment() as u64),
        ConstData::Array(operands),
        ConstData::Bytes(x.bytes.clone()),
    ])
}
