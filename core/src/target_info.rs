//! Register descriptor registry.
//!
//! Describes how a flat, offset-addressed register file maps onto named
//! architectural registers. Registers may overlap (`al` lives inside
//! `eax`, which lives inside `rax`); the registry answers naming and
//! overlap queries over that layout and remembers which entry is the
//! stack pointer.

use thiserror::Error;

use crate::function::Function;
use crate::inst::InstKind;
use crate::ir_builder::IrBuilder;
use crate::value::Value;

/// One architectural register inside the register file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RegisterDescriptor {
    /// Byte offset into the register file.
    pub offset: u32,
    /// Size in bytes.
    pub size: u32,
    /// Field path through the register-file layout.
    pub struct_path: Vec<u32>,
    pub name: String,
}

impl RegisterDescriptor {
    pub fn new(
        name: impl Into<String>,
        offset: u32,
        size: u32,
        struct_path: Vec<u32>,
    ) -> Self {
        Self {
            offset,
            size,
            struct_path,
            name: name.into(),
        }
    }

    pub fn end(&self) -> u32 {
        self.offset + self.size
    }

    /// Whether this register's byte range contains `other`'s.
    pub fn contains(&self, other: &RegisterDescriptor) -> bool {
        self.offset <= other.offset && other.end() <= self.end()
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("duplicate register {name} at offset {offset} size {size}")]
    Duplicate { name: String, offset: u32, size: u32 },
    #[error("duplicate register name {0}")]
    DuplicateName(String),
    #[error("no register at offset {offset} with size {size}")]
    NotFound { offset: u32, size: u32 },
    #[error("unknown register {0}")]
    UnknownName(String),
}

/// Immutable register table for one target.
///
/// Descriptors are kept in canonical order: ascending offset, then
/// descending size, so a wider register sorts before the narrower ones
/// sharing its base offset.
#[derive(Debug, Clone)]
pub struct TargetInfo {
    name: String,
    registers: Vec<RegisterDescriptor>,
    sp: Option<usize>,
}

impl TargetInfo {
    pub fn new(
        name: impl Into<String>,
        mut registers: Vec<RegisterDescriptor>,
    ) -> Result<Self, RegistryError> {
        registers.sort_by(|a, b| {
            a.offset.cmp(&b.offset).then(b.size.cmp(&a.size))
        });
        for pair in registers.windows(2) {
            if pair[0].offset == pair[1].offset && pair[0].size == pair[1].size
            {
                return Err(RegistryError::Duplicate {
                    name: pair[1].name.clone(),
                    offset: pair[1].offset,
                    size: pair[1].size,
                });
            }
        }
        for (i, r) in registers.iter().enumerate() {
            let clash = registers[..i]
                .iter()
                .any(|o| o.name.eq_ignore_ascii_case(&r.name));
            if clash {
                return Err(RegistryError::DuplicateName(r.name.clone()));
            }
        }
        Ok(Self {
            name: name.into(),
            registers,
            sp: None,
        })
    }

    pub fn target_name(&self) -> &str {
        &self.name
    }

    /// All descriptors in canonical order.
    pub fn registers(&self) -> &[RegisterDescriptor] {
        &self.registers
    }

    fn index_of(&self, name: &str) -> Option<usize> {
        self.registers
            .iter()
            .position(|r| r.name.eq_ignore_ascii_case(name))
    }

    /// Descriptor for `name` (case-insensitive).
    pub fn descriptor(&self, name: &str) -> Option<&RegisterDescriptor> {
        self.index_of(name).map(|i| &self.registers[i])
    }

    /// The table's own spelling of `name`.
    pub fn key_name(&self, name: &str) -> Option<&str> {
        self.descriptor(name).map(|r| r.name.as_str())
    }

    /// Exact lookup by byte range.
    pub fn register_name(
        &self,
        offset: u32,
        size: u32,
    ) -> Result<&str, RegistryError> {
        self.registers
            .iter()
            .find(|r| r.offset == offset && r.size == size)
            .map(|r| r.name.as_str())
            .ok_or(RegistryError::NotFound { offset, size })
    }

    /// The largest register whose byte range contains `name`'s range.
    ///
    /// Equal-sized candidates resolve to the first one in canonical
    /// order. Unknown names yield `None`.
    pub fn largest_overlapping_register(&self, name: &str) -> Option<&str> {
        let target = self.descriptor(name)?;
        let mut best: Option<&RegisterDescriptor> = None;
        for r in &self.registers {
            if r.offset > target.offset {
                break;
            }
            if r.contains(target) && best.map_or(true, |b| r.size > b.size) {
                best = Some(r);
            }
        }
        best.map(|r| r.name.as_str())
    }

    /// Designate the stack pointer by matching `desc`'s offset and
    /// size. Leaves the registry unchanged when nothing matches.
    pub fn set_stack_pointer(&mut self, desc: &RegisterDescriptor) {
        if let Some(i) = self
            .registers
            .iter()
            .position(|r| r.offset == desc.offset && r.size == desc.size)
        {
            self.sp = Some(i);
        } else {
            log::warn!(
                "{}: no register at offset {} size {} for stack pointer",
                self.name,
                desc.offset,
                desc.size
            );
        }
    }

    pub fn stack_pointer(&self) -> Option<&RegisterDescriptor> {
        self.sp.map(|i| &self.registers[i])
    }

    // -- IR helpers --

    /// Emit a pointer to register `name` inside the register file `regs`.
    pub fn register_ptr(
        &self,
        ir: &mut IrBuilder<'_>,
        regs: Value,
        name: &str,
    ) -> Result<Value, RegistryError> {
        let r = self
            .descriptor(name)
            .ok_or_else(|| RegistryError::UnknownName(name.to_string()))?;
        Ok(ir.gen_field_ptr(regs, r.offset))
    }

    /// Name the register a `size`-byte access through `ptr` touches,
    /// when `ptr` is a field pointer into a register file.
    pub fn register_name_of(
        &self,
        func: &Function,
        ptr: Value,
        size: u32,
    ) -> Option<&str> {
        let id = ptr.as_inst()?;
        match func.inst(id).kind {
            InstKind::FieldPtr { offset, .. } => {
                self.register_name(offset, size).ok()
            }
            _ => None,
        }
    }
}
