//! sdb エミュレートされたターゲットマシン
//!
//! このクレートは、デバッグ対象となるエミュレートされたRV64マシンを提供します。
//! レジスタファイル、ゲストメモリ、命令の解釈実行、
//! および式評価器が利用するレジスタ／メモリ読み取りのインターフェースを定義します。

pub mod cpu;
pub mod machine;
pub mod memory;
pub mod registers;

pub use cpu::Instruction;
pub use machine::{Machine, StepEvent, DEFAULT_IMAGE};
pub use memory::{Memory, MemoryError, DEFAULT_MEMORY_SIZE, MEMORY_BASE};
pub use registers::Registers;

/// ターゲット制御の結果型
pub type Result<T> = anyhow::Result<T>;

/// 名前でレジスタ値を読み取るインターフェース
///
/// 名前には式中の先頭の `$` を含みません。
pub trait RegisterReader {
    /// レジスタ値を取得する（未知のレジスタ名なら `None`）
    fn read_register(&self, name: &str) -> Option<u64>;
}

/// ゲストメモリを読み取るインターフェース
pub trait MemoryReader {
    /// `address` から `len` バイトをリトルエンディアンで読み取る
    fn read_memory(&self, address: u64, len: usize) -> std::result::Result<u64, MemoryError>;
}
