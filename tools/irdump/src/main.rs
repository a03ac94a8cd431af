//! lift-irdump: lift a raw code file and print the IR.
//!
//! The file is treated as a flat code image loaded at `--base`.
//! The routine entered at `--entry` (default: the base address) is
//! lifted into a module which is printed in textual form.

use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::process;

use clap::Parser;
use lift_core::dump::module_to_string;
use lift_frontend::{TranslationContext, X86Isa};

#[derive(Parser, Debug)]
#[command(name = "lift-irdump")]
#[command(about = "Lift x86 machine code into IR and print it")]
struct Args {
    /// Raw code image
    file: PathBuf,

    /// Load address of the first byte (hex)
    #[arg(long, value_parser = parse_hex)]
    base: u64,

    /// Routine entry address (hex, default: base)
    #[arg(long, value_parser = parse_hex)]
    entry: Option<u64>,

    /// Name of the lifted function
    #[arg(long, default_value = "lifted")]
    name: String,

    /// Decoder mode
    #[arg(long, default_value_t = 64, value_parser = parse_bitness)]
    bitness: u32,

    /// Print a disassembly listing before the IR
    #[arg(long)]
    listing: bool,

    /// Output file (stdout if not specified)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn parse_hex(s: &str) -> Result<u64, String> {
    let digits = s.trim_start_matches("0x").trim_start_matches("0X");
    u64::from_str_radix(digits, 16)
        .map_err(|e| format!("invalid hex address `{s}`: {e}"))
}

fn parse_bitness(s: &str) -> Result<u32, String> {
    match s {
        "32" => Ok(32),
        "64" => Ok(64),
        _ => Err(format!("bitness must be 32 or 64, got `{s}`")),
    }
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let code = fs::read(&args.file)
        .map_err(|e| format!("failed to read {}: {e}", args.file.display()))?;
    let entry = args.entry.unwrap_or(args.base);
    log::info!(
        "{}: {} bytes at {:#x}, entry {entry:#x}",
        args.file.display(),
        code.len(),
        args.base
    );

    let isa = X86Isa::new(args.bitness)?;
    let mut ctx = TranslationContext::new(isa, &args.name);
    let lifted = ctx.create_function_at(&args.name, args.base, &code, entry)?;
    for addr in &lifted.invalid {
        eprintln!("warning: undecodable instruction at {addr:#x}");
    }
    if !lifted.unresolved.is_empty() {
        eprintln!(
            "note: {} placeholder(s) left unresolved",
            lifted.unresolved.len()
        );
    }

    let mut out: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(BufWriter::new(fs::File::create(path)?)),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };
    if args.listing {
        for line in lift_disas::listing_x86(args.base, &code, args.bitness) {
            writeln!(out, "; {line}")?;
        }
        writeln!(out)?;
    }
    write!(out, "{}", module_to_string(ctx.module()))?;
    out.flush()?;
    Ok(())
}

fn main() {
    env_logger::init();
    let args = Args::parse();
    if let Err(e) = run(&args) {
        eprintln!("lift-irdump: {e}");
        process::exit(1);
    }
}
