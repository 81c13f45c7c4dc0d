//! レジスタファイル

use crate::RegisterReader;

/// 汎用レジスタのABI名（x0..x31の順）
pub const GPR_NAMES: [&str; 32] = [
    "zero", "ra", "sp", "gp", "tp", "t0", "t1", "t2",
    "s0", "s1", "a0", "a1", "a2", "a3", "a4", "a5",
    "a6", "a7", "s2", "s3", "s4", "s5", "s6", "s7",
    "s8", "s9", "s10", "s11", "t3", "t4", "t5", "t6",
];

/// RV64 レジスタファイル
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registers {
    gpr: [u64; 32],
    pc: u64,
}

impl Registers {
    /// 全レジスタを0にし、PCを `pc` に設定したレジスタファイルを作成する
    pub fn new(pc: u64) -> Self {
        Self { gpr: [0; 32], pc }
    }

    /// 汎用レジスタを読み取る（x0は常に0）
    pub fn gpr(&self, index: usize) -> u64 {
        if index == 0 {
            0
        } else {
            self.gpr[index & 0x1f]
        }
    }

    /// 汎用レジスタに書き込む（x0への書き込みは無視される）
    pub fn set_gpr(&mut self, index: usize, value: u64) {
        if index != 0 {
            self.gpr[index & 0x1f] = value;
        }
    }

    /// プログラムカウンタを取得する
    pub fn pc(&self) -> u64 {
        self.pc
    }

    /// プログラムカウンタを設定する
    pub fn set_pc(&mut self, pc: u64) {
        self.pc = pc;
    }

    /// レジスタ名からインデックスを解決する
    ///
    /// ABI名、`fp`、`0`（式中では `$0`）、`x0`..`x31` を受け付けます。
    pub fn index_of(name: &str) -> Option<usize> {
        match name {
            "0" => return Some(0),
            "fp" => return Some(8),
            _ => {}
        }

        if let Some(index) = GPR_NAMES.iter().position(|n| *n == name) {
            return Some(index);
        }

        let digits = name.strip_prefix('x')?;
        // "x01" のような表記は受け付けない
        if digits.len() > 1 && digits.starts_with('0') {
            return None;
        }
        digits.parse::<usize>().ok().filter(|i| *i < 32)
    }

    /// 名前でレジスタ値を取得する（`pc` を含む）
    pub fn lookup(&self, name: &str) -> Option<u64> {
        if name == "pc" {
            return Some(self.pc);
        }
        Self::index_of(name).map(|i| self.gpr(i))
    }

    /// `info r` 用に (名前, 値) を列挙する
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, u64)> + '_ {
        GPR_NAMES
            .iter()
            .enumerate()
            .map(move |(i, name)| (*name, self.gpr(i)))
            .chain(std::iter::once(("pc", self.pc)))
    }
}

impl RegisterReader for Registers {
    fn read_register(&self, name: &str) -> Option<u64> {
        self.lookup(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_x0_is_hardwired() {
        let mut regs = Registers::new(0x8000_0000);
        regs.set_gpr(0, 42);
        assert_eq!(regs.gpr(0), 0);
        assert_eq!(regs.lookup("zero"), Some(0));
    }

    #[test]
    fn test_lookup_names() {
        let mut regs = Registers::new(0x8000_0000);
        regs.set_gpr(2, 0x1000);
        regs.set_gpr(8, 7);

        assert_eq!(regs.lookup("sp"), Some(0x1000));
        assert_eq!(regs.lookup("x2"), Some(0x1000));
        assert_eq!(regs.lookup("fp"), Some(7));
        assert_eq!(regs.lookup("s0"), Some(7));
        assert_eq!(regs.lookup("0"), Some(0));
        assert_eq!(regs.lookup("pc"), Some(0x8000_0000));
    }

    #[test]
    fn test_lookup_unknown() {
        let regs = Registers::new(0);
        assert_eq!(regs.lookup("x32"), None);
        assert_eq!(regs.lookup("x01"), None);
        assert_eq!(regs.lookup("rax"), None);
    }

    #[test]
    fn test_iter_includes_pc() {
        let regs = Registers::new(0x80);
        let all: Vec<_> = regs.iter().collect();
        assert_eq!(all.len(), 33);
        assert_eq!(all[0], ("zero", 0));
        assert_eq!(all[32], ("pc", 0x80));
    }
}
