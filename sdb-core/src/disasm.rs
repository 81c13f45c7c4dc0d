//! 逆アセンブル機能
//!
//! 実行トレース表示用に、1命令をRV64の命令列として逆アセンブルします。

use crate::Result;
use capstone::prelude::*;

/// `pc` にある命令語 `raw` を逆アセンブルする
///
/// # Returns
/// `"addi a0, zero, 1"` のような文字列
pub fn disassemble(pc: u64, raw: u32) -> Result<String> {
    let cs = Capstone::new()
        .riscv()
        .mode(arch::riscv::ArchMode::RiscV64)
        .detail(false)
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to create Capstone: {}", e))?;

    let code = raw.to_le_bytes();
    let insns = cs
        .disasm_count(&code, pc, 1)
        .map_err(|e| anyhow::anyhow!("Failed to disassemble: {}", e))?;

    let insn = insns
        .as_ref()
        .first()
        .ok_or_else(|| anyhow::anyhow!("No instruction at 0x{:x}", pc))?;

    let mnemonic = insn.mnemonic().unwrap_or("");
    Ok(match insn.op_str() {
        Some(ops) if !ops.is_empty() => format!("{} {}", mnemonic, ops),
        _ => mnemonic.to_string(),
    })
}

/// トレース1行を整形する（逆アセンブルに失敗したら命令語のみ）
pub fn format_trace_line(pc: u64, raw: u32) -> String {
    match disassemble(pc, raw) {
        Ok(text) => format!("0x{:016x}: {:08x}  {}", pc, raw, text),
        Err(_) => format!("0x{:016x}: {:08x}", pc, raw),
    }
}
