use lift_core::{ConstData, Type};

/// Register-file layout facts the translator needs: address width
/// and the offsets of the instruction, stack and frame pointers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TranslationConfig {
    /// Address width in bytes (4 or 8).
    pub address_size: u32,
    pub ip: u32,
    pub sp: u32,
    pub fp: u32,
}

impl TranslationConfig {
    pub const fn new(address_size: u32, ip: u32, sp: u32, fp: u32) -> Self {
        Self {
            address_size,
            ip,
            sp,
            fp,
        }
    }

    /// Native word type of the register file.
    pub fn native_type(&self) -> Type {
        match self.address_size {
            4 => Type::I32,
            _ => Type::I64,
        }
    }

    /// Module-level constant passed to generators and placeholders:
    /// `{ i64 address_size, i32 ip, i32 sp, i32 fp }`.
    pub fn to_const(&self) -> ConstData {
        ConstData::Struct(vec![
            ConstData::i64(self.address_size as u64),
            ConstData::i32(self.ip as u64),
            ConstData::i32(self.sp as u64),
            ConstData::i32(self.fp as u64),
        ])
    }
}
