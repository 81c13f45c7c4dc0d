//! エミュレートされたマシン

use crate::cpu::{Effect, Instruction};
use crate::{Memory, Registers, Result, MEMORY_BASE};
use anyhow::Context as _;
use tracing::trace;

/// イメージ未指定時に読み込む組み込みプログラム
///
/// `auipc t0,0; sb zero,16(t0); lbu a0,16(t0); ebreak; .word 0xdeadbeef`
pub const DEFAULT_IMAGE: [u32; 5] = [
    0x0000_0297,
    0x0002_8823,
    0x0102_c503,
    0x0010_0073,
    0xdead_beef,
];

/// 1命令実行した結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepEvent {
    /// 命令を実行した
    Executed { pc: u64, raw: u32 },
    /// EBREAK で停止した（`code` は a0 の値）
    Halted { pc: u64, raw: u32, code: u64 },
}

impl StepEvent {
    /// 実行した命令のアドレス
    pub fn pc(&self) -> u64 {
        match self {
            StepEvent::Executed { pc, .. } | StepEvent::Halted { pc, .. } => *pc,
        }
    }

    /// 実行した命令語
    pub fn raw(&self) -> u32 {
        match self {
            StepEvent::Executed { raw, .. } | StepEvent::Halted { raw, .. } => *raw,
        }
    }
}

/// デバッグ対象のマシン
pub struct Machine {
    registers: Registers,
    memory: Memory,
}

impl Machine {
    /// メモリのベースアドレスから実行を開始するマシンを作成する
    pub fn new(memory: Memory) -> Self {
        Self {
            registers: Registers::new(memory.base()),
            memory,
        }
    }

    /// 組み込みイメージを読み込んだマシンを作成する
    pub fn with_default_image(memory_size: usize) -> Result<Self> {
        let image: Vec<u8> = DEFAULT_IMAGE.iter().flat_map(|w| w.to_le_bytes()).collect();
        let mut machine = Self::new(Memory::new(MEMORY_BASE, memory_size));
        machine.load_image(&image)?;
        Ok(machine)
    }

    /// イメージをメモリのベースアドレスに読み込む
    pub fn load_image(&mut self, image: &[u8]) -> Result<()> {
        let base = self.memory.base();
        self.memory
            .load(base, image)
            .with_context(|| format!("image of {} bytes does not fit in guest memory", image.len()))?;
        Ok(())
    }

    /// 1命令をフェッチ・デコード・実行する
    pub fn step(&mut self) -> Result<StepEvent> {
        let pc = self.registers.pc();
        let raw = self
            .memory
            .read_u32(pc)
            .with_context(|| format!("instruction fetch failed at pc = 0x{:x}", pc))?;
        let inst = Instruction::decode(raw).with_context(|| format!("at pc = 0x{:x}", pc))?;

        trace!("0x{:x}: {:08x} {:?}", pc, raw, inst);

        let effect = inst
            .execute(&mut self.registers, &mut self.memory)
            .with_context(|| format!("at pc = 0x{:x}", pc))?;

        Ok(match effect {
            Effect::Continue => StepEvent::Executed { pc, raw },
            Effect::Halt => StepEvent::Halted {
                pc,
                raw,
                code: self.registers.gpr(10),
            },
        })
    }

    /// レジスタを取得する
    pub fn registers(&self) -> &Registers {
        &self.registers
    }

    /// レジスタを可変参照で取得する
    pub fn registers_mut(&mut self) -> &mut Registers {
        &mut self.registers
    }

    /// メモリを取得する
    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    /// メモリを可変参照で取得する
    pub fn memory_mut(&mut self) -> &mut Memory {
        &mut self.memory
    }
}
