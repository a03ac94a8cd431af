//! IR dump: LLVM-flavoured text output for functions and modules.

use std::io::Write;

use crate::function::Function;
use crate::inst::InstKind;
use crate::module::Module;
use crate::types::Type;
use crate::value::{BlockId, Value};

/// Format a value reference. Globals print by name when the owning
/// module is known.
fn fmt_value(v: Value, module: Option<&Module>, buf: &mut String) {
    use std::fmt::Write as FmtWrite;
    match v {
        Value::Param(i) => write!(buf, "%arg{i}").unwrap(),
        Value::Inst(id) => write!(buf, "%v{}", id.0).unwrap(),
        Value::Const { ty, val } => {
            if ty == Type::I1 {
                buf.push_str(if val != 0 { "true" } else { "false" });
            } else {
                write!(buf, "0x{val:x}").unwrap();
            }
        }
        Value::Global(g) => match module {
            Some(m) => write!(buf, "@{}", m.global(g).name).unwrap(),
            None => write!(buf, "@g{}", g.0).unwrap(),
        },
        Value::Capture { inst, .. } => write!(buf, "%cap{}", inst.0).unwrap(),
        Value::Undef(_) => buf.push_str("undef"),
    }
}

fn fmt_typed(f: &Function, v: Value, module: Option<&Module>, buf: &mut String) {
    use std::fmt::Write as FmtWrite;
    write!(buf, "{} ", f.value_type(v)).unwrap();
    fmt_value(v, module, buf);
}

fn block_label(f: &Function, b: BlockId) -> String {
    format!("%{}", f.block(b).name)
}

fn fmt_inst(
    f: &Function,
    kind: &InstKind,
    ty: Type,
    module: Option<&Module>,
    buf: &mut String,
) {
    use std::fmt::Write as FmtWrite;
    match kind {
        InstKind::Alloca { size } => write!(buf, "alloca {size}").unwrap(),
        InstKind::FieldPtr { base, offset } => {
            buf.push_str("field_ptr ");
            fmt_typed(f, *base, module, buf);
            write!(buf, ", {offset}").unwrap();
        }
        InstKind::Load { ptr } => {
            write!(buf, "load {ty}, ").unwrap();
            fmt_typed(f, *ptr, module, buf);
        }
        InstKind::Store { ptr, value } => {
            buf.push_str("store ");
            fmt_typed(f, *value, module, buf);
            buf.push_str(", ");
            fmt_typed(f, *ptr, module, buf);
        }
        InstKind::Binary { op, lhs, rhs } => {
            write!(buf, "{} ", op.name()).unwrap();
            fmt_typed(f, *lhs, module, buf);
            buf.push_str(", ");
            fmt_value(*rhs, module, buf);
        }
        InstKind::ICmp { cond, lhs, rhs } => {
            write!(buf, "icmp {} ", cond.name()).unwrap();
            fmt_typed(f, *lhs, module, buf);
            buf.push_str(", ");
            fmt_value(*rhs, module, buf);
        }
        InstKind::Cast { op, value } => {
            write!(buf, "{} ", op.name()).unwrap();
            fmt_typed(f, *value, module, buf);
            write!(buf, " to {ty}").unwrap();
        }
        InstKind::Select {
            cond,
            if_true,
            if_false,
        } => {
            buf.push_str("select ");
            fmt_typed(f, *cond, module, buf);
            buf.push_str(", ");
            fmt_typed(f, *if_true, module, buf);
            buf.push_str(", ");
            fmt_typed(f, *if_false, module, buf);
        }
        InstKind::Intrinsic { intrinsic, args } => {
            write!(buf, "call {ty} @{}(", intrinsic.name()).unwrap();
            for (i, a) in args.iter().enumerate() {
                if i > 0 {
                    buf.push_str(", ");
                }
                fmt_typed(f, *a, module, buf);
            }
            buf.push(')');
        }
        InstKind::Br { dest } => {
            write!(buf, "br label {}", block_label(f, *dest)).unwrap();
        }
        InstKind::CondBr {
            cond,
            then_dest,
            else_dest,
        } => {
            buf.push_str("br ");
            fmt_typed(f, *cond, module, buf);
            write!(
                buf,
                ", label {}, label {}",
                block_label(f, *then_dest),
                block_label(f, *else_dest)
            )
            .unwrap();
        }
        InstKind::Ret => buf.push_str("ret void"),
        InstKind::Unreachable => buf.push_str("unreachable"),
    }
}

/// Dump one function.
pub fn dump_function(
    f: &Function,
    module: Option<&Module>,
    w: &mut impl Write,
) -> std::io::Result<()> {
    let mut buf = String::with_capacity(128);

    write!(w, "define void @{}(", f.name())?;
    for (i, ty) in f.params().iter().enumerate() {
        if i > 0 {
            write!(w, ", ")?;
        }
        write!(w, "{ty} %arg{i}")?;
    }
    writeln!(w, ") {{")?;

    for (n, &b) in f.blocks().iter().enumerate() {
        if n > 0 {
            writeln!(w)?;
        }
        writeln!(w, "{}:", f.block(b).name)?;
        for &id in &f.block(b).insts {
            let data = f.inst(id);
            buf.clear();
            if data.ty != Type::Void {
                use std::fmt::Write as FmtWrite;
                write!(buf, "%v{} = ", id.0).unwrap();
            }
            fmt_inst(f, &data.kind, data.ty, module, &mut buf);
            writeln!(w, "  {buf}")?;
        }
    }
    writeln!(w, "}}")
}

/// Dump globals followed by every function of `m`.
pub fn dump_module(m: &Module, w: &mut impl Write) -> std::io::Result<()> {
    writeln!(w, "; module {}", m.name())?;
    for g in m.globals() {
        let kind = if g.constant { "constant" } else { "global" };
        writeln!(w, "@{} = private {kind} {}", g.name, g.init)?;
    }
    for f in m.functions() {
        writeln!(w)?;
        dump_function(f, Some(m), w)?;
    }
    Ok(())
}

/// Render a function as a string.
pub fn function_to_string(f: &Function, module: Option<&Module>) -> String {
    let mut out = Vec::new();
    // Writing to a Vec cannot fail.
    let _ = dump_function(f, module, &mut out);
    String::from_utf8_lossy(&out).into_owned()
}

/// Render a module as a string.
pub fn module_to_string(m: &Module) -> String {
    let mut out = Vec::new();
    let _ = dump_module(m, &mut out);
    String::from_utf8_lossy(&out).into_owned()
}
