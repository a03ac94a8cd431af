/// Address space of a pointer.
///
/// Emulated guest memory lives in its own space so that loads and
/// stores through guest pointers can never be assumed to alias the
/// register file, the flags or any other emulator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum AddrSpace {
    /// Register file, flags, locals and constant globals.
    Emulator = 0,
    /// Emulated guest memory.
    Guest = 1,
}

impl AddrSpace {
    pub fn number(self) -> u8 {
        self as u8
    }
}

/// IR value types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Type {
    Void,
    I1,
    I8,
    I16,
    I32,
    I64,
    Ptr(AddrSpace),
}

impl Type {
    /// Integer type of `bytes` bytes (1, 2, 4 or 8).
    pub fn int_bytes(bytes: u64) -> Option<Type> {
        match bytes {
            1 => Some(Type::I8),
            2 => Some(Type::I16),
            4 => Some(Type::I32),
            8 => Some(Type::I64),
            _ => None,
        }
    }

    pub fn is_int(self) -> bool {
        matches!(self, Type::I1 | Type::I8 | Type::I16 | Type::I32 | Type::I64)
    }

    pub fn is_ptr(self) -> bool {
        matches!(self, Type::Ptr(_))
    }

    /// Width in bits. Pointers are 64 bits wide, `void` is 0.
    pub fn size_bits(self) -> u32 {
        match self {
            Type::Void => 0,
            Type::I1 => 1,
            Type::I8 => 8,
            Type::I16 => 16,
            Type::I32 => 32,
            Type::I64 | Type::Ptr(_) => 64,
        }
    }

    /// Storage size in bytes (`i1` occupies one byte).
    pub fn size_bytes(self) -> u32 {
        match self {
            Type::Void => 0,
            Type::I1 => 1,
            other => other.size_bits() / 8,
        }
    }

    /// Mask selecting the significant bits of a value of this type.
    pub fn mask(self) -> u64 {
        match self.size_bits() {
            0 => 0,
            64 => u64::MAX,
            n => (1u64 << n) - 1,
        }
    }

    /// Sign-extend a (masked) constant of this type to 64 bits.
    pub fn sign_extend(self, val: u64) -> i64 {
        let bits = self.size_bits();
        if bits == 0 || bits >= 64 {
            return val as i64;
        }
        let shift = 64 - bits;
        ((val << shift) as i64) >> shift
    }

    pub fn address_space(self) -> Option<AddrSpace> {
        match self {
            Type::Ptr(space) => Some(space),
            _ => None,
        }
    }
}

impl std::fmt::Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Type::Void => write!(f, "void"),
            Type::I1 => write!(f, "i1"),
            Type::I8 => write!(f, "i8"),
            Type::I16 => write!(f, "i16"),
            Type::I32 => write!(f, "i32"),
            Type::I64 => write!(f, "i64"),
            Type::Ptr(AddrSpace::Emulator) => write!(f, "ptr"),
            Type::Ptr(space) => {
                write!(f, "ptr addrspace({})", space.number())
            }
        }
    }
}

/// Two-operand integer operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    And,
    Or,
    Xor,
    Shl,
    LShr,
    AShr,
    /// Division and remainder. A zero divisor yields 0 when folded;
    /// lifted code guards division before it executes.
    UDiv,
    SDiv,
    URem,
    SRem,
}

impl BinOp {
    pub fn name(self) -> &'static str {
        match self {
            BinOp::Add => "add",
            BinOp::Sub => "sub",
            BinOp::Mul => "mul",
            BinOp::And => "and",
            BinOp::Or => "or",
            BinOp::Xor => "xor",
            BinOp::Shl => "shl",
            BinOp::LShr => "lshr",
            BinOp::AShr => "ashr",
            BinOp::UDiv => "udiv",
            BinOp::SDiv => "sdiv",
            BinOp::URem => "urem",
            BinOp::SRem => "srem",
        }
    }

    pub fn is_commutative(self) -> bool {
        matches!(
            self,
            BinOp::Add | BinOp::Mul | BinOp::And | BinOp::Or | BinOp::Xor
        )
    }

    pub fn is_division(self) -> bool {
        matches!(self, BinOp::UDiv | BinOp::SDiv | BinOp::URem | BinOp::SRem)
    }

    /// Evaluate on two constants of type `ty`. Shift amounts are
    /// taken modulo the type width.
    pub fn eval(self, ty: Type, a: u64, b: u64) -> u64 {
        let mask = ty.mask();
        let bits = ty.size_bits().max(1);
        let a = a & mask;
        let b = b & mask;
        let r = match self {
            BinOp::Add => a.wrapping_add(b),
            BinOp::Sub => a.wrapping_sub(b),
            BinOp::Mul => a.wrapping_mul(b),
            BinOp::And => a & b,
            BinOp::Or => a | b,
            BinOp::Xor => a ^ b,
            BinOp::Shl => a.wrapping_shl((b % bits as u64) as u32),
            BinOp::LShr => a.wrapping_shr((b % bits as u64) as u32),
            BinOp::AShr => {
                let sh = (b % bits as u64) as u32;
                (ty.sign_extend(a) >> sh) as u64
            }
            _ if b == 0 => 0,
            BinOp::UDiv => a / b,
            BinOp::URem => a % b,
            BinOp::SDiv => {
                ty.sign_extend(a).wrapping_div(ty.sign_extend(b)) as u64
            }
            BinOp::SRem => {
                ty.sign_extend(a).wrapping_rem(ty.sign_extend(b)) as u64
            }
        };
        r & mask
    }
}

/// Cast operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CastOp {
    ZExt,
    SExt,
    Trunc,
    IntToPtr,
    PtrToInt,
}

impl CastOp {
    pub fn name(self) -> &'static str {
        match self {
            CastOp::ZExt => "zext",
            CastOp::SExt => "sext",
            CastOp::Trunc => "trunc",
            CastOp::IntToPtr => "inttoptr",
            CastOp::PtrToInt => "ptrtoint",
        }
    }
}

/// Integer comparison predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cond {
    Eq,
    Ne,
    Ult,
    Ule,
    Ugt,
    Uge,
    Slt,
    Sle,
    Sgt,
    Sge,
}

impl Cond {
    pub fn name(self) -> &'static str {
        match self {
            Cond::Eq => "eq",
            Cond::Ne => "ne",
            Cond::Ult => "ult",
            Cond::Ule => "ule",
            Cond::Ugt => "ugt",
            Cond::Uge => "uge",
            Cond::Slt => "slt",
            Cond::Sle => "sle",
            Cond::Sgt => "sgt",
            Cond::Sge => "sge",
        }
    }

    pub fn invert(self) -> Cond {
        match self {
            Cond::Eq => Cond::Ne,
            Cond::Ne => Cond::Eq,
            Cond::Ult => Cond::Uge,
            Cond::Ule => Cond::Ugt,
            Cond::Ugt => Cond::Ule,
            Cond::Uge => Cond::Ult,
            Cond::Slt => Cond::Sge,
            Cond::Sle => Cond::Sgt,
            Cond::Sgt => Cond::Sle,
            Cond::Sge => Cond::Slt,
        }
    }

    /// Evaluate on two constants of type `ty`.
    pub fn eval(self, ty: Type, a: u64, b: u64) -> bool {
        let mask = ty.mask();
        let (a, b) = (a & mask, b & mask);
        let (sa, sb) = (ty.sign_extend(a), ty.sign_extend(b));
        match self {
            Cond::Eq => a == b,
            Cond::Ne => a != b,
            Cond::Ult => a < b,
            Cond::Ule => a <= b,
            Cond::Ugt => a > b,
            Cond::Uge => a >= b,
            Cond::Slt => sa < sb,
            Cond::Sle => sa <= sb,
            Cond::Sgt => sa > sb,
            Cond::Sge => sa >= sb,
        }
    }
}
