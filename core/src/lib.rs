pub mod dump;
pub mod function;
pub mod inst;
pub mod ir_builder;
pub mod module;
pub mod target_info;
pub mod types;
pub mod value;
pub mod verify;

pub use function::{BlockData, Function, SpliceMap};
pub use inst::{InstData, InstKind, Intrinsic};
pub use ir_builder::{InsertPoint, IrBuilder};
pub use module::{ConstData, Global, Module};
pub use target_info::{RegisterDescriptor, RegistryError, TargetInfo};
pub use types::{AddrSpace, BinOp, CastOp, Cond, Type};
pub use value::{BlockId, FuncId, GlobalId, InstId, Value};
pub use verify::{verify_function, VerifyError};
