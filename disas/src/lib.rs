//! Disassembler for listings.
//!
//! Each architecture provides a `print_insn_*` entry point that
//! decodes raw bytes at a given PC and returns a human-readable
//! string plus the instruction length.

pub mod x86;

pub use x86::{listing_x86, print_insn_x86};
