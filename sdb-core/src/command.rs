//! モニタコマンド

use crate::errors::CommandError;
use crate::parse::parse_count;
use crate::watchpoint::WatchpointId;

/// コマンド名と説明の一覧（`help` 用）
pub const COMMANDS: &[(&str, &str)] = &[
    ("help", "Display information about all supported commands"),
    ("c", "Continue the execution of the program"),
    ("q", "Exit the debugger"),
    ("si", "Step [N] instructions (default 1)"),
    ("info", "Display registers (info r) or watchpoints (info w)"),
    ("x", "Examine N 4-byte words starting at the address EXPR evaluates to"),
    ("p", "Evaluate EXPR and print its value"),
    ("w", "Set a watchpoint on EXPR"),
    ("d", "Delete watchpoint N"),
];

/// `info` コマンドの対象
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfoTarget {
    Registers,
    Watchpoints,
}

/// デバッガコマンド
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// ヘルプ表示（引数があればそのコマンドのみ）
    Help(Option<String>),
    /// 実行継続
    Continue,
    /// 終了
    Quit,
    /// N命令ステップ実行
    Step(u64),
    /// レジスタ／ウォッチポイント表示
    Info(InfoTarget),
    /// メモリ表示
    Examine { count: u64, expression: String },
    /// 式の評価
    Print(String),
    /// ウォッチポイント設定
    Watch(String),
    /// ウォッチポイント削除
    Delete(WatchpointId),
}

impl Command {
    /// コマンド文字列をパースする
    pub fn parse(input: &str) -> Result<Self, CommandError> {
        let input = input.trim();
        let (name, args) = match input.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, Some(rest.trim()).filter(|a| !a.is_empty())),
            None => (input, None),
        };

        match name {
            "" => Err(CommandError::Empty),
            "help" | "h" | "?" => Ok(Command::Help(args.map(str::to_string))),
            "c" | "continue" => Ok(Command::Continue),
            "q" | "quit" | "exit" => Ok(Command::Quit),
            "si" => {
                let steps = match args {
                    None => 1,
                    Some(arg) => parse_number_arg(arg)?,
                };
                if steps == 0 {
                    return Err(CommandError::Usage("si [N]  (N > 0)"));
                }
                Ok(Command::Step(steps))
            }
            "info" => match args {
                Some("r") => Ok(Command::Info(InfoTarget::Registers)),
                Some("w") => Ok(Command::Info(InfoTarget::Watchpoints)),
                _ => Err(CommandError::Usage("info r|w")),
            },
            "x" => {
                let (count, expression) = args
                    .and_then(|a| a.split_once(char::is_whitespace))
                    .ok_or(CommandError::Usage("x N EXPR"))?;
                Ok(Command::Examine {
                    count: parse_number_arg(count)?,
                    expression: expression.trim().to_string(),
                })
            }
            "p" | "print" => args
                .map(|a| Command::Print(a.to_string()))
                .ok_or(CommandError::Usage("p EXPR")),
            "w" | "watch" => args
                .map(|a| Command::Watch(a.to_string()))
                .ok_or(CommandError::Usage("w EXPR")),
            "d" | "delete" => {
                let arg = args.ok_or(CommandError::Usage("d N"))?;
                Ok(Command::Delete(parse_number_arg(arg)? as WatchpointId))
            }
            other => Err(CommandError::Unknown(other.to_string())),
        }
    }
}

fn parse_number_arg(arg: &str) -> Result<u64, CommandError> {
    parse_count(arg).map_err(|_| CommandError::BadNumber(arg.to_string()))
}
