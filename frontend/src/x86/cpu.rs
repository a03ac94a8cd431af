//! x86 register file layout.

use lift_core::{RegisterDescriptor, RegistryError, TargetInfo};

use crate::config::TranslationConfig;

/// Number of general-purpose registers (rax-r15).
pub const NUM_GPRS: usize = 16;

/// x86 register file as seen by lifted code.
///
/// Layout must be `#[repr(C)]`: lifted code addresses fields by byte
/// offset from the register file pointer.
#[repr(C)]
pub struct X86Cpu {
    /// rax, rcx, rdx, rbx, rsp, rbp, rsi, rdi, r8-r15 (encoding order).
    pub gpr: [u64; NUM_GPRS],
    pub rip: u64,
    pub fs_base: u64,
    pub gs_base: u64,
}

/// Arithmetic flags, one byte each (0 or 1). Lives in a per-routine
/// stack slot rather than in the register file.
#[repr(C)]
pub struct X86Flags {
    pub cf: u8,
    pub pf: u8,
    pub af: u8,
    pub zf: u8,
    pub sf: u8,
    pub of: u8,
    pub df: u8,
    _pad: u8,
}

// Field offsets (bytes) from the start of X86Cpu.

/// Byte offset of `gpr[i]`: `i * 8`.
pub const fn gpr_offset(i: usize) -> u32 {
    (i * 8) as u32
}

pub const RIP_OFFSET: u32 = (NUM_GPRS * 8) as u32; // 128
pub const FS_BASE_OFFSET: u32 = RIP_OFFSET + 8; // 136
pub const GS_BASE_OFFSET: u32 = FS_BASE_OFFSET + 8; // 144
pub const REGS_SIZE: u32 = GS_BASE_OFFSET + 8; // 152

pub const RSP: usize = 4;
pub const RBP: usize = 5;

// Flag offsets from the start of X86Flags.
pub const CF: u32 = 0;
pub const PF: u32 = 1;
pub const AF: u32 = 2;
pub const ZF: u32 = 3;
pub const SF: u32 = 4;
pub const OF: u32 = 5;
pub const DF: u32 = 6;
pub const FLAGS_SIZE: u32 = 8;

/// 64-bit mode configuration.
pub const CONFIG_64: TranslationConfig =
    TranslationConfig::new(8, RIP_OFFSET, gpr_offset(RSP), gpr_offset(RBP));

/// 32-bit (protected mode) configuration.
pub const CONFIG_32: TranslationConfig =
    TranslationConfig::new(4, RIP_OFFSET, gpr_offset(RSP), gpr_offset(RBP));

const NAMES_64: [&str; NUM_GPRS] = [
    "rax", "rcx", "rdx", "rbx", "rsp", "rbp", "rsi", "rdi", "r8", "r9", "r10",
    "r11", "r12", "r13", "r14", "r15",
];
const NAMES_32: [&str; NUM_GPRS] = [
    "eax", "ecx", "edx", "ebx", "esp", "ebp", "esi", "edi", "r8d", "r9d",
    "r10d", "r11d", "r12d", "r13d", "r14d", "r15d",
];
const NAMES_16: [&str; NUM_GPRS] = [
    "ax", "cx", "dx", "bx", "sp", "bp", "si", "di", "r8w", "r9w", "r10w",
    "r11w", "r12w", "r13w", "r14w", "r15w",
];
const NAMES_8: [&str; NUM_GPRS] = [
    "al", "cl", "dl", "bl", "spl", "bpl", "sil", "dil", "r8b", "r9b", "r10b",
    "r11b", "r12b", "r13b", "r14b", "r15b",
];
const NAMES_8_HIGH: [&str; 4] = ["ah", "ch", "dh", "bh"];

/// Every named register of the file, in no particular order.
pub fn register_descriptors() -> Vec<RegisterDescriptor> {
    let mut regs = Vec::with_capacity(NUM_GPRS * 4 + 10);
    for i in 0..NUM_GPRS {
        let off = gpr_offset(i);
        let path = vec![0, i as u32];
        regs.push(RegisterDescriptor::new(NAMES_64[i], off, 8, path.clone()));
        regs.push(RegisterDescriptor::new(NAMES_32[i], off, 4, path.clone()));
        regs.push(RegisterDescriptor::new(NAMES_16[i], off, 2, path.clone()));
        regs.push(RegisterDescriptor::new(NAMES_8[i], off, 1, path));
    }
    for (i, name) in NAMES_8_HIGH.iter().enumerate() {
        let off = gpr_offset(i) + 1;
        regs.push(RegisterDescriptor::new(*name, off, 1, vec![0, i as u32]));
    }
    regs.push(RegisterDescriptor::new("rip", RIP_OFFSET, 8, vec![1]));
    regs.push(RegisterDescriptor::new("eip", RIP_OFFSET, 4, vec![1]));
    regs.push(RegisterDescriptor::new("ip", RIP_OFFSET, 2, vec![1]));
    regs.push(RegisterDescriptor::new("fs_base", FS_BASE_OFFSET, 8, vec![2]));
    regs.push(RegisterDescriptor::new("gs_base", GS_BASE_OFFSET, 8, vec![3]));
    regs
}

/// Register table for `bitness`-bit code. The stack pointer is `rsp` in
/// long mode and `esp` in protected mode, sized to the address width.
pub fn target_info(bitness: u32) -> Result<TargetInfo, RegistryError> {
    let (name, sp, size) = if bitness == 64 {
        ("x86_64", "rsp", 8)
    } else {
        ("x86", "esp", 4)
    };
    let mut info = TargetInfo::new(name, register_descriptors())?;
    let path = vec![0, RSP as u32];
    let sp = RegisterDescriptor::new(sp, gpr_offset(RSP), size, path);
    info.set_stack_pointer(&sp);
    Ok(info)
}
