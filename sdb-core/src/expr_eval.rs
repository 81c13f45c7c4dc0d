//! 式評価エンジン
//!
//! デバッガで使用する式を評価します（`p`、`x`、`w` コマンド等）。
//! トークン列の範囲を支配的な演算子で左右に分割し、再帰的に評価します。

use crate::errors::EvalError;
use crate::parse::parse_number;
use crate::token::{disambiguate, Lexer, Token, TokenKind};
use sdb_target::{MemoryReader, RegisterReader};
use tracing::debug;

/// デリファレンスで読み取るワードのバイト数
pub const WORD_SIZE: usize = 8;

/// 式評価器
pub struct ExpressionEvaluator<'a, R, M> {
    registers: &'a R,
    memory: &'a M,
}

impl<'a, R: RegisterReader, M: MemoryReader> ExpressionEvaluator<'a, R, M> {
    /// 新しい式評価器を作成する
    pub fn new(registers: &'a R, memory: &'a M) -> Self {
        Self { registers, memory }
    }

    /// デリファレンス判別済みのトークン列全体を評価する
    pub fn evaluate(&self, tokens: &[Token]) -> Result<u64, EvalError> {
        self.eval_range(tokens)
    }

    fn eval_range(&self, tokens: &[Token]) -> Result<u64, EvalError> {
        match tokens {
            [] => Err(EvalError::EmptyRange),
            [token] => self.eval_operand(token),
            _ if is_parenthesized(tokens) => self.eval_range(&tokens[1..tokens.len() - 1]),
            _ => {
                let op = find_dominant_operator(tokens)?;

                // 右オペランドを先に評価する
                let right = self.eval_range(&tokens[op + 1..])?;
                if tokens[op].kind == TokenKind::Deref {
                    return self.read_word(right);
                }
                let left = self.eval_range(&tokens[..op])?;

                apply_binary(tokens[op].kind, left, right)
            }
        }
    }

    /// 単一トークン（数値またはレジスタ）を評価する
    fn eval_operand(&self, token: &Token) -> Result<u64, EvalError> {
        match token.kind {
            TokenKind::Number => parse_number(&token.lexeme).map_err(|_| EvalError::InvalidNumber {
                lexeme: token.lexeme.clone(),
                position: token.position,
            }),
            TokenKind::Register => {
                let name = token.lexeme.trim_start_matches('$');
                self.registers
                    .read_register(name)
                    .ok_or_else(|| EvalError::UnknownRegister {
                        name: name.to_string(),
                    })
            }
            _ => Err(EvalError::NotAValue {
                lexeme: token.lexeme.clone(),
                position: token.position,
            }),
        }
    }

    fn read_word(&self, address: u64) -> Result<u64, EvalError> {
        let value = self
            .memory
            .read_memory(address, WORD_SIZE)
            .map_err(|e| EvalError::BadAddress {
                address,
                reason: e.to_string(),
            })?;
        debug!("dereference 0x{:x} -> 0x{:x}", address, value);
        Ok(value)
    }
}

/// 範囲全体が対応する括弧で囲まれているか
fn is_parenthesized(tokens: &[Token]) -> bool {
    let last = tokens.len() - 1;
    if tokens[0].kind != TokenKind::LParen || tokens[last].kind != TokenKind::RParen {
        return false;
    }

    let mut depth = 0usize;
    for (i, token) in tokens.iter().enumerate() {
        match token.kind {
            TokenKind::LParen => depth += 1,
            TokenKind::RParen => {
                depth -= 1;
                // 先頭の `(` が末尾より前で閉じた
                if depth == 0 && i != last {
                    return false;
                }
            }
            _ => {}
        }
    }
    depth == 0
}

/// 支配的な演算子（最後に評価される演算子）のインデックスを探す
///
/// 括弧の外にある演算子のうち、最も結合の弱いものを選びます。
/// 同じ強さなら右側を優先しますが、デリファレンスは左側が優先されます。
fn find_dominant_operator(tokens: &[Token]) -> Result<usize, EvalError> {
    let mut open_parens: Vec<usize> = Vec::new();
    let mut dominant: Option<(usize, u8)> = None;

    for (i, token) in tokens.iter().enumerate() {
        match token.kind {
            TokenKind::LParen => open_parens.push(token.position),
            TokenKind::RParen => {
                open_parens.pop().ok_or(EvalError::UnbalancedParens {
                    position: token.position,
                })?;
            }
            kind if open_parens.is_empty() => {
                let Some(prec) = kind.precedence() else {
                    continue;
                };
                let take = match dominant {
                    None => true,
                    Some((_, current)) => {
                        prec > current || (prec == current && kind != TokenKind::Deref)
                    }
                };
                if take {
                    dominant = Some((i, prec));
                }
            }
            _ => {}
        }
    }

    if let Some(position) = open_parens.last() {
        return Err(EvalError::UnbalancedParens {
            position: *position,
        });
    }

    dominant
        .map(|(i, _)| i)
        .ok_or(EvalError::NoDominantOperator {
            position: tokens[0].position,
        })
}

fn apply_binary(op: TokenKind, left: u64, right: u64) -> Result<u64, EvalError> {
    let value = match op {
        TokenKind::Plus => left.wrapping_add(right),
        TokenKind::Minus => left.wrapping_sub(right),
        TokenKind::Star => left.wrapping_mul(right),
        TokenKind::Slash => left.checked_div(right).ok_or(EvalError::DivideByZero)?,
        TokenKind::Eq => (left == right) as u64,
        TokenKind::Neq => (left != right) as u64,
        _ => unreachable!("{:?} is not a binary operator", op),
    };
    Ok(value)
}

/// 式文字列を評価する
///
/// 字句解析、デリファレンスの判別、評価を順に行います。
/// トークン列は呼び出しごとに新しく作られます。
pub fn evaluate_expression<R, M>(
    lexer: &Lexer,
    text: &str,
    registers: &R,
    memory: &M,
) -> Result<u64, EvalError>
where
    R: RegisterReader,
    M: MemoryReader,
{
    let tokens = disambiguate(lexer.tokenize(text)?);
    ExpressionEvaluator::new(registers, memory).evaluate(&tokens)
}
