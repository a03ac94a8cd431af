//! x86 disassembly through the iced-x86 Intel formatter.

use iced_x86::{Decoder, DecoderOptions, Formatter, Instruction, IntelFormatter};

/// Disassemble one x86 instruction at `pc`.
///
/// `bitness` is 16, 32 or 64. Returns `(assembly_text, length)`;
/// undecodable bytes yield `(".byte 0x..", 0)`.
pub fn print_insn_x86(pc: u64, data: &[u8], bitness: u32) -> (String, usize) {
    let Some(&first) = data.first() else {
        return (".byte ???".into(), 0);
    };
    let mut decoder = Decoder::with_ip(bitness, data, pc, DecoderOptions::NONE);
    let mut insn = Instruction::default();
    decoder.decode_out(&mut insn);
    if insn.is_invalid() {
        return (format!(".byte 0x{first:02x}"), 0);
    }
    let mut text = String::new();
    let mut formatter = IntelFormatter::new();
    formatter.options_mut().set_first_operand_char_index(8);
    formatter.format(&insn, &mut text);
    (text, insn.len())
}

/// Linear listing of `data` loaded at `base`: one line per
/// instruction with address, bytes and text. Undecodable bytes are
/// listed one at a time.
pub fn listing_x86(base: u64, data: &[u8], bitness: u32) -> Vec<String> {
    let mut lines = Vec::new();
    let mut off = 0usize;
    while off < data.len() {
        let pc = base + off as u64;
        let (text, len) = print_insn_x86(pc, &data[off..], bitness);
        let len = len.max(1);
        let bytes: Vec<String> = data[off..off + len]
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect();
        lines.push(format!("{pc:016x}  {:<24} {text}", bytes.join(" ")));
        off += len;
    }
    lines
}
