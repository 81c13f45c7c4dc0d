//! sdb デバッガのコア機能
//!
//! このクレートは、エミュレータ用デバッガの中核となるロジックを提供します。
//! レジスタやメモリを参照する式の字句解析と評価、ウォッチポイントの管理、
//! および命令実行の制御を行います。

pub mod command;
pub mod debugger;
pub mod disasm;
pub mod errors;
pub mod expr_eval;
pub mod parse;
pub mod token;
pub mod watchpoint;

pub use command::{Command, InfoTarget};
pub use debugger::{Debugger, ExecReport, ExecState, StopReason, TraceEntry};
pub use errors::{CommandError, EvalError, ParseError, WatchError};
pub use expr_eval::{evaluate_expression, ExpressionEvaluator};
pub use token::{Lexer, Token, TokenKind};
pub use watchpoint::{WatchHit, WatchpointId, WatchpointPool};

// 他のクレートから使用するために再エクスポート
pub use sdb_target::{Machine, StepEvent};

/// デバッガの結果型
pub type Result<T> = anyhow::Result<T>;
