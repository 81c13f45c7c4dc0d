//! デバッガのメインロジック

use crate::errors::{EvalError, WatchError};
use crate::expr_eval::evaluate_expression;
use crate::token::Lexer;
use crate::watchpoint::{WatchHit, WatchpointId, WatchpointPool};
use crate::Result;
use sdb_target::{Machine, Registers, StepEvent};
use tracing::{error, info, warn};

/// この命令数未満の実行では、実行した命令を記録する
pub const MAX_INST_TO_PRINT: u64 = 10;

/// `x` コマンドで読み取る1要素のバイト数
pub const EXAMINE_UNIT: usize = 4;

/// マシンの実行状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecState {
    /// 停止中（実行を再開できる）
    Stopped,
    /// EBREAK によりプログラムが終了した
    Ended { pc: u64, code: u64 },
    /// 命令実行やウォッチポイント再評価の失敗により中断した
    Aborted { pc: u64 },
}

/// 実行が停止した理由
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// 指定された命令数を実行した
    StepsDone,
    /// ウォッチポイントの値が変化した
    Watchpoint(Vec<WatchHit>),
    /// プログラムが終了した
    Exited { pc: u64, code: u64 },
    /// 既に終了しているため実行しなかった
    AlreadyEnded,
}

/// 実行した命令
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceEntry {
    pub pc: u64,
    pub raw: u32,
}

/// `execute` の結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecReport {
    pub reason: StopReason,
    /// 実行命令数が `MAX_INST_TO_PRINT` 未満のときのみ記録される
    pub trace: Vec<TraceEntry>,
}

/// デバッガ
pub struct Debugger {
    /// デバッグ対象マシン
    machine: Machine,
    /// 式の字句解析器
    lexer: Lexer,
    /// ウォッチポイント管理
    watchpoints: WatchpointPool,
    /// 実行状態
    state: ExecState,
}

impl Debugger {
    /// 新しいデバッガを作成する
    pub fn new(machine: Machine) -> Result<Self> {
        Ok(Self {
            machine,
            lexer: Lexer::new()?,
            watchpoints: WatchpointPool::new(),
            state: ExecState::Stopped,
        })
    }

    /// 式を評価する
    pub fn evaluate_expression(&self, text: &str) -> std::result::Result<u64, EvalError> {
        evaluate_expression(
            &self.lexer,
            text,
            self.machine.registers(),
            self.machine.memory(),
        )
    }

    /// 式を評価し、現在の値でウォッチポイントを作成する
    pub fn create_watchpoint(&mut self, text: &str) -> std::result::Result<WatchpointId, WatchError> {
        let value = self.evaluate_expression(text)?;
        self.watchpoints.create(text, value)
    }

    /// ウォッチポイントを削除する
    pub fn delete_watchpoint(&mut self, id: WatchpointId) -> std::result::Result<(), WatchError> {
        self.watchpoints.delete(id)
    }

    /// ウォッチポイントを (ID, 式) で列挙する（新しい順）
    pub fn list_watchpoints(&self) -> impl Iterator<Item = (WatchpointId, &str)> + '_ {
        self.watchpoints.list()
    }

    /// ウォッチポイントの最後に観測した値を取得する
    pub fn watchpoint_value(&self, id: WatchpointId) -> Option<u64> {
        self.watchpoints.last_value(id)
    }

    /// 1ステップの実行後に呼び出し、ウォッチポイントを検査する
    ///
    /// 値が変化したウォッチポイントを返します。空でなければ停止要求です。
    pub fn on_step_completed(&mut self) -> std::result::Result<Vec<WatchHit>, WatchError> {
        let Self {
            machine,
            lexer,
            watchpoints,
            ..
        } = self;

        watchpoints.check_all(|text| {
            evaluate_expression(lexer, text, machine.registers(), machine.memory())
        })
    }

    /// 最大 `steps` 命令を実行する（`u64::MAX` で終了まで継続）
    ///
    /// 各命令の実行後にウォッチポイントを検査し、値が変化したら停止します。
    pub fn execute(&mut self, steps: u64) -> Result<ExecReport> {
        if matches!(self.state, ExecState::Ended { .. } | ExecState::Aborted { .. }) {
            return Ok(ExecReport {
                reason: StopReason::AlreadyEnded,
                trace: Vec::new(),
            });
        }

        let record = steps < MAX_INST_TO_PRINT;
        let mut trace = Vec::new();

        for _ in 0..steps {
            let pc = self.machine.registers().pc();
            let event = match self.machine.step() {
                Ok(event) => event,
                Err(e) => {
                    error!("machine aborted at pc = 0x{:x}: {:#}", pc, e);
                    self.state = ExecState::Aborted { pc };
                    return Err(e);
                }
            };

            if record {
                trace.push(TraceEntry {
                    pc: event.pc(),
                    raw: event.raw(),
                });
            }

            if let StepEvent::Halted { pc, code, .. } = event {
                if code == 0 {
                    info!("HIT GOOD TRAP at pc = 0x{:x}", pc);
                } else {
                    warn!("HIT BAD TRAP at pc = 0x{:x} (code {})", pc, code);
                }
                self.state = ExecState::Ended { pc, code };
                return Ok(ExecReport {
                    reason: StopReason::Exited { pc, code },
                    trace,
                });
            }

            match self.on_step_completed() {
                Ok(hits) if hits.is_empty() => {}
                Ok(hits) => {
                    return Ok(ExecReport {
                        reason: StopReason::Watchpoint(hits),
                        trace,
                    });
                }
                Err(e) => {
                    self.state = ExecState::Aborted {
                        pc: self.machine.registers().pc(),
                    };
                    return Err(e.into());
                }
            }
        }

        Ok(ExecReport {
            reason: StopReason::StepsDone,
            trace,
        })
    }

    /// 式をアドレスとして評価し、`count` 個の4バイト値を読み取る
    pub fn examine(&self, count: u64, text: &str) -> Result<Vec<(u64, u32)>> {
        let base = self.evaluate_expression(text)?;
        (0..count)
            .map(|i| -> Result<(u64, u32)> {
                let address = base.wrapping_add(i * EXAMINE_UNIT as u64);
                let value = self.machine.memory().read_u32(address)?;
                Ok((address, value))
            })
            .collect()
    }

    /// 実行状態を取得する
    pub fn state(&self) -> ExecState {
        self.state
    }

    /// レジスタを取得する
    pub fn registers(&self) -> &Registers {
        self.machine.registers()
    }

    /// マシンを可変参照で取得する
    pub fn machine_mut(&mut self) -> &mut Machine {
        &mut self.machine
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdb_target::MEMORY_BASE;

    fn debugger() -> Debugger {
        Debugger::new(Machine::with_default_image(0x1000).unwrap()).unwrap()
    }

    #[test]
    fn test_run_default_image() {
        let mut dbg = debugger();
        let report = dbg.execute(u64::MAX).unwrap();

        assert_eq!(
            report.reason,
            StopReason::Exited {
                pc: MEMORY_BASE + 12,
                code: 0
            }
        );
        assert!(report.trace.is_empty());
        assert_eq!(
            dbg.state(),
            ExecState::Ended {
                pc: MEMORY_BASE + 12,
                code: 0
            }
        );

        let again = dbg.execute(1).unwrap();
        assert_eq!(again.reason, StopReason::AlreadyEnded);
    }

    #[test]
    fn test_step_records_trace() {
        let mut dbg = debugger();
        let report = dbg.execute(2).unwrap();

        assert_eq!(report.reason, StopReason::StepsDone);
        assert_eq!(
            report.trace,
            vec![
                TraceEntry { pc: MEMORY_BASE, raw: 0x0000_0297 },
                TraceEntry { pc: MEMORY_BASE + 4, raw: 0x0002_8823 },
            ]
        );
        assert_eq!(dbg.registers().pc(), MEMORY_BASE + 8);
    }

    #[test]
    fn test_watchpoint_stops_execution() {
        let mut dbg = debugger();
        let id = dbg.create_watchpoint("$t0").unwrap();

        let report = dbg.execute(u64::MAX).unwrap();
        assert_eq!(
            report.reason,
            StopReason::Watchpoint(vec![WatchHit {
                id,
                expression: "$t0".to_string(),
                old_value: 0,
                new_value: MEMORY_BASE,
            }])
        );
        assert_eq!(dbg.state(), ExecState::Stopped);
        assert_eq!(dbg.watchpoint_value(id), Some(MEMORY_BASE));

        // 変化がなければ終了まで進む
        let report = dbg.execute(u64::MAX).unwrap();
        assert!(matches!(report.reason, StopReason::Exited { code: 0, .. }));
    }

    #[test]
    fn test_memory_watchpoint() {
        let mut dbg = debugger();
        dbg.create_watchpoint("*0x80000010").unwrap();

        // auipc では変化しない
        assert_eq!(dbg.execute(1).unwrap().reason, StopReason::StepsDone);
        // sb zero,16(t0) で下位バイトが0になる
        match dbg.execute(1).unwrap().reason {
            StopReason::Watchpoint(hits) => {
                assert_eq!(hits.len(), 1);
                assert_eq!(hits[0].old_value & 0xff, 0xef);
                assert_eq!(hits[0].new_value & 0xff, 0);
            }
            other => panic!("Expected watchpoint hit, got {:?}", other),
        }
    }

    #[test]
    fn test_create_watchpoint_invalid_expression() {
        let mut dbg = debugger();
        assert_eq!(
            dbg.create_watchpoint("1/0"),
            Err(WatchError::InvalidExpression(EvalError::DivideByZero))
        );
        assert_eq!(dbg.list_watchpoints().count(), 0);
    }

    #[test]
    fn test_examine() {
        let dbg = debugger();
        let words = dbg.examine(2, "$pc + 12").unwrap();
        assert_eq!(
            words,
            vec![(MEMORY_BASE + 12, 0x0010_0073), (MEMORY_BASE + 16, 0xdead_beef)]
        );
        assert!(dbg.examine(1, "0").is_err());
    }

    #[test]
    fn test_invalid_instruction_aborts() {
        let mut dbg = debugger();
        // 組み込みイメージの末尾の後は0で埋まっている
        dbg.machine_mut().registers_mut().set_pc(MEMORY_BASE + 20);
        assert!(dbg.execute(1).is_err());
        assert_eq!(dbg.state(), ExecState::Aborted { pc: MEMORY_BASE + 20 });
        assert_eq!(dbg.execute(1).unwrap().reason, StopReason::AlreadyEnded);
    }
}
