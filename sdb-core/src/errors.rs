//! エラー型

use thiserror::Error;

/// 字句解析のエラー
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("no match at position {position}")]
    UnexpectedCharacter { position: usize },

    #[error("expression has more than {limit} tokens")]
    TooManyTokens { limit: usize },
}

/// 式評価のエラー
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EvalError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("empty expression")]
    EmptyRange,

    #[error("'{lexeme}' at position {position} is not a value")]
    NotAValue { lexeme: String, position: usize },

    #[error("unbalanced parentheses at position {position}")]
    UnbalancedParens { position: usize },

    #[error("no operator found in expression starting at position {position}")]
    NoDominantOperator { position: usize },

    #[error("unknown register '${name}'")]
    UnknownRegister { name: String },

    #[error("division by zero")]
    DivideByZero,

    #[error("invalid number '{lexeme}' at position {position}")]
    InvalidNumber { lexeme: String, position: usize },

    #[error("cannot read memory at 0x{address:x}: {reason}")]
    BadAddress { address: u64, reason: String },
}

/// ウォッチポイント操作のエラー
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WatchError {
    #[error("no free watchpoint left (capacity {capacity})")]
    PoolExhausted { capacity: usize },

    #[error("watchpoint {id} does not exist")]
    NotFound { id: usize },

    #[error("expression is {len} characters long, at most {max} allowed")]
    ExpressionTooLong { len: usize, max: usize },

    #[error("invalid expression: {0}")]
    InvalidExpression(#[from] EvalError),

    #[error("watchpoint {id} ({expression}) failed to re-evaluate: {source}")]
    Reevaluation {
        id: usize,
        expression: String,
        source: EvalError,
    },
}

/// モニタコマンドのパースエラー
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("empty command")]
    Empty,

    #[error("Unknown command '{0}'")]
    Unknown(String),

    #[error("Usage: {0}")]
    Usage(&'static str),

    #[error("'{0}' is not a valid count")]
    BadNumber(String),
}
