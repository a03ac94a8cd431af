//! x86 (32- and 64-bit) lifting support.

pub mod cpu;
mod decode;
mod trans;

use std::sync::Arc;

use lift_core::{ConstData, RegistryError, TargetInfo};

pub use decode::X86Insn;

use crate::config::TranslationConfig;
use crate::{DecodeError, Generator, Isa};

/// x86 in either 32-bit protected mode or 64-bit long mode.
pub struct X86Isa {
    bitness: u32,
    config: TranslationConfig,
    target: Arc<TargetInfo>,
}

impl X86Isa {
    pub fn new(bitness: u32) -> Result<Self, RegistryError> {
        assert!(
            bitness == 32 || bitness == 64,
            "unsupported x86 bitness {bitness}"
        );
        let config = if bitness == 64 {
            cpu::CONFIG_64
        } else {
            cpu::CONFIG_32
        };
        Ok(Self {
            bitness,
            config,
            target: Arc::new(cpu::target_info(bitness)?),
        })
    }

    pub fn x86_64() -> Result<Self, RegistryError> {
        Self::new(64)
    }

    pub fn x86_32() -> Result<Self, RegistryError> {
        Self::new(32)
    }

    pub fn bitness(&self) -> u32 {
        self.bitness
    }
}

impl Isa for X86Isa {
    type Insn = X86Insn;

    fn name(&self) -> &str {
        if self.bitness == 64 {
            "x86_64"
        } else {
            "x86"
        }
    }

    fn config(&self) -> TranslationConfig {
        self.config
    }

    fn target_info(&self) -> Arc<TargetInfo> {
        Arc::clone(&self.target)
    }

    fn flags_size(&self) -> u32 {
        cpu::FLAGS_SIZE
    }

    fn decode(&self, code: &[u8], address: u64) -> Result<X86Insn, DecodeError> {
        decode::decode(self.bitness, code, address)
    }

    fn generator(&self, insn: &X86Insn) -> Option<Generator<Self>> {
        trans::lookup(insn.insn.mnemonic())
    }

    fn describe(&self, insn: &X86Insn) -> ConstData {
        decode::describe(insn)
    }
}
