use std::collections::HashMap;
use std::fmt;

use crate::function::Function;
use crate::types::Type;
use crate::value::{FuncId, GlobalId};

/// Initializer of a module global.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConstData {
    Int { ty: Type, val: u64 },
    Bytes(Vec<u8>),
    Array(Vec<ConstData>),
    Struct(Vec<ConstData>),
}

impl ConstData {
    pub fn int(ty: Type, val: u64) -> ConstData {
        ConstData::Int {
            ty,
            val: val & ty.mask(),
        }
    }

    pub fn i8(val: u64) -> ConstData {
        ConstData::int(Type::I8, val)
    }

    pub fn i16(val: u64) -> ConstData {
        ConstData::int(Type::I16, val)
    }

    pub fn i32(val: u64) -> ConstData {
        ConstData::int(Type::I32, val)
    }

    pub fn i64(val: u64) -> ConstData {
        ConstData::int(Type::I64, val)
    }

    /// Field `i` of a struct initializer.
    pub fn field(&self, i: usize) -> Option<&ConstData> {
        match self {
            ConstData::Struct(fields) | ConstData::Array(fields) => fields.get(i),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<u64> {
        match *self {
            ConstData::Int { val, .. } => Some(val),
            _ => None,
        }
    }
}

impl fmt::Display for ConstData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstData::Int { ty, val } => write!(f, "{ty} 0x{val:x}"),
            ConstData::Bytes(bytes) => {
                write!(f, "[{} x i8] c\"", bytes.len())?;
                for b in bytes {
                    write!(f, "\\{b:02x}")?;
                }
                write!(f, "\"")
            }
            ConstData::Array(elems) => {
                write!(f, "[")?;
                for (i, e) in elems.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{e}")?;
                }
                write!(f, "]")
            }
            ConstData::Struct(fields) => {
                write!(f, "{{ ")?;
                for (i, e) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{e}")?;
                }
                write!(f, " }}")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Global {
    pub name: String,
    pub init: ConstData,
    pub constant: bool,
}

/// A translation unit: lifted functions plus the globals they
/// reference.
#[derive(Debug, Clone, Default)]
pub struct Module {
    name: String,
    functions: Vec<Function>,
    globals: Vec<Global>,
    global_names: HashMap<String, GlobalId>,
}

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    // -- Functions --

    pub fn add_function(&mut self, f: Function) -> FuncId {
        let id = FuncId(self.functions.len() as u32);
        self.functions.push(f);
        id
    }

    pub fn function(&self, id: FuncId) -> &Function {
        &self.functions[id.0 as usize]
    }

    pub fn functions(&self) -> &[Function] {
        &self.functions
    }

    pub fn find_function(&self, name: &str) -> Option<FuncId> {
        self.functions
            .iter()
            .position(|f| f.name() == name)
            .map(|i| FuncId(i as u32))
    }

    // -- Globals --

    /// Add a private global. A name that is already taken gets a
    /// numeric suffix.
    pub fn add_global(
        &mut self,
        name: &str,
        init: ConstData,
        constant: bool,
    ) -> GlobalId {
        let mut unique = name.to_string();
        let mut n = 1;
        while self.global_names.contains_key(&unique) {
            unique = format!("{name}.{n}");
            n += 1;
        }
        let id = GlobalId(self.globals.len() as u32);
        self.global_names.insert(unique.clone(), id);
        self.globals.push(Global {
            name: unique,
            init,
            constant,
        });
        id
    }

    pub fn global(&self, id: GlobalId) -> &Global {
        &self.globals[id.0 as usize]
    }

    pub fn globals(&self) -> &[Global] {
        &self.globals
    }

    pub fn find_global(&self, name: &str) -> Option<GlobalId> {
        self.global_names.get(name).copied()
    }

    /// Drop every global added after the first `len`. Ids at or above
    /// `len` become invalid.
    pub fn truncate_globals(&mut self, len: usize) {
        for g in self.globals.drain(len.min(self.globals.len())..) {
            self.global_names.remove(&g.name);
        }
    }
}
