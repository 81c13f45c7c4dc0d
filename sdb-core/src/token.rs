//! 式の字句解析
//!
//! 式文字列をトークン列に変換し、単項デリファレンス `*` を乗算と区別します。

use crate::errors::ParseError;
use crate::Result;
use regex::Regex;
use tracing::trace;

/// 1つの式が持てるトークン数の上限
pub const MAX_TOKENS: usize = 32;

/// トークンの種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// 10進数または `0x` 付き16進数
    Number,
    /// `$` で始まるレジスタ参照
    Register,
    Plus,
    Minus,
    /// 二項の乗算（字句解析直後はすべての `*` がこれになる）
    Star,
    Slash,
    LParen,
    RParen,
    Eq,
    Neq,
    /// 単項デリファレンス `*`
    Deref,
}

impl TokenKind {
    /// 演算子の結合の弱さ（大きいほど外側で評価される）
    ///
    /// 演算子でなければ `None`
    pub fn precedence(self) -> Option<u8> {
        match self {
            TokenKind::Deref => Some(0),
            TokenKind::Star | TokenKind::Slash => Some(1),
            TokenKind::Plus | TokenKind::Minus => Some(2),
            TokenKind::Eq | TokenKind::Neq => Some(3),
            _ => None,
        }
    }

    /// 値（オペランド）として単独で評価できるか
    pub fn is_operand(self) -> bool {
        matches!(self, TokenKind::Number | TokenKind::Register)
    }
}

/// トークン
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    /// マッチした部分文字列（数値は `0x`、レジスタは `$` を含む）
    pub lexeme: String,
    /// 式文字列中のバイト位置
    pub position: usize,
}

/// 字句規則（試行順）
///
/// `None` は空白で、トークンを生成しない。
const RULES: &[(&str, Option<TokenKind>)] = &[
    (r"^\s+", None),
    (r"^\+", Some(TokenKind::Plus)),
    (r"^==", Some(TokenKind::Eq)),
    (r"^-", Some(TokenKind::Minus)),
    (r"^\*", Some(TokenKind::Star)),
    (r"^/", Some(TokenKind::Slash)),
    (r"^0x[0-9a-fA-F]{1,16}", Some(TokenKind::Number)),
    (r"^[0-9]{1,20}", Some(TokenKind::Number)),
    (r"^\(", Some(TokenKind::LParen)),
    (r"^\)", Some(TokenKind::RParen)),
    (r"^\$[a-z0-9]{1,31}", Some(TokenKind::Register)),
    (r"^!=", Some(TokenKind::Neq)),
];

/// 字句解析器
///
/// 規則の正規表現は生成時に一度だけコンパイルします。
pub struct Lexer {
    rules: Vec<(Regex, Option<TokenKind>)>,
}

impl Lexer {
    /// 字句解析器を作成する
    pub fn new() -> Result<Self> {
        let rules = RULES
            .iter()
            .map(|(pattern, kind)| Ok((Regex::new(pattern)?, *kind)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { rules })
    }

    /// 式文字列をトークン列に変換する
    ///
    /// 各位置で規則を順に試し、最初にマッチした規則を採用します。
    pub fn tokenize(&self, text: &str) -> std::result::Result<Vec<Token>, ParseError> {
        let mut tokens = Vec::new();
        let mut position = 0;

        while position < text.len() {
            let rest = &text[position..];
            let (index, len, kind) = self
                .rules
                .iter()
                .enumerate()
                .find_map(|(i, (re, kind))| re.find(rest).map(|m| (i, m.end(), *kind)))
                .ok_or(ParseError::UnexpectedCharacter { position })?;

            trace!(
                "match rules[{}] = \"{}\" at position {} with len {}: {}",
                index,
                RULES[index].0,
                position,
                len,
                &rest[..len]
            );

            if let Some(kind) = kind {
                if tokens.len() == MAX_TOKENS {
                    return Err(ParseError::TooManyTokens { limit: MAX_TOKENS });
                }
                tokens.push(Token {
                    kind,
                    lexeme: rest[..len].to_string(),
                    position,
                });
            }

            position += len;
        }

        Ok(tokens)
    }
}

/// 単項デリファレンスを判別する
///
/// 先頭の `*`、または直前が数値・レジスタ・`)` でない `*` をデリファレンスとして扱います。
pub fn disambiguate(mut tokens: Vec<Token>) -> Vec<Token> {
    for i in 0..tokens.len() {
        if tokens[i].kind != TokenKind::Star {
            continue;
        }
        let unary = match i.checked_sub(1).map(|p| tokens[p].kind) {
            None => true,
            Some(prev) => !(prev.is_operand() || prev == TokenKind::RParen),
        };
        if unary {
            tokens[i].kind = TokenKind::Deref;
        }
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(tokens: &[Token]) -> Vec<TokenKind> {
        tokens.iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_tokenize_simple() {
        let lexer = Lexer::new().unwrap();
        let tokens = lexer.tokenize("1 + 2").unwrap();

        assert_eq!(kinds(&tokens), vec![TokenKind::Number, TokenKind::Plus, TokenKind::Number]);
        assert_eq!(tokens[0].lexeme, "1");
        assert_eq!(tokens[2].lexeme, "2");
        assert_eq!(tokens[2].position, 4);
    }

    #[test]
    fn test_tokenize_empty() {
        let lexer = Lexer::new().unwrap();
        assert!(lexer.tokenize("").unwrap().is_empty());
        assert!(lexer.tokenize("   ").unwrap().is_empty());
    }

    #[test]
    fn test_tokenize_numbers_and_registers() {
        let lexer = Lexer::new().unwrap();
        let tokens = lexer.tokenize("0x1F+$sp-$0").unwrap();

        assert_eq!(
            kinds(&tokens),
            vec![
                TokenKind::Number,
                TokenKind::Plus,
                TokenKind::Register,
                TokenKind::Minus,
                TokenKind::Register,
            ]
        );
        assert_eq!(tokens[0].lexeme, "0x1F");
        assert_eq!(tokens[2].lexeme, "$sp");
        assert_eq!(tokens[4].lexeme, "$0");
    }

    #[test]
    fn test_tokenize_comparisons() {
        let lexer = Lexer::new().unwrap();
        let tokens = lexer.tokenize("1==2!=3").unwrap();
        assert_eq!(
            kinds(&tokens),
            vec![
                TokenKind::Number,
                TokenKind::Eq,
                TokenKind::Number,
                TokenKind::Neq,
                TokenKind::Number,
            ]
        );
    }

    #[test]
    fn test_tokenize_long_decimal_splits() {
        let lexer = Lexer::new().unwrap();
        // 数字は最大20桁で1トークン
        let tokens = lexer.tokenize("1234567890123456789012").unwrap();
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].lexeme, "12345678901234567890");
        assert_eq!(tokens[1].lexeme, "12");
    }

    #[test]
    fn test_tokenize_unexpected_character() {
        let lexer = Lexer::new().unwrap();
        assert_eq!(
            lexer.tokenize("@"),
            Err(ParseError::UnexpectedCharacter { position: 0 })
        );
        assert_eq!(
            lexer.tokenize("1 + $A"),
            Err(ParseError::UnexpectedCharacter { position: 4 })
        );
        assert_eq!(
            lexer.tokenize("1 = 1"),
            Err(ParseError::UnexpectedCharacter { position: 2 })
        );
    }

    #[test]
    fn test_tokenize_too_many_tokens() {
        let lexer = Lexer::new().unwrap();
        let ok = vec!["1"; 16].join("+");
        assert_eq!(lexer.tokenize(&ok).unwrap().len(), 31);

        let too_long = vec!["1"; 17].join("+");
        assert_eq!(
            lexer.tokenize(&too_long),
            Err(ParseError::TooManyTokens { limit: MAX_TOKENS })
        );
    }

    #[test]
    fn test_disambiguate_deref() {
        let lexer = Lexer::new().unwrap();

        let tokens = disambiguate(lexer.tokenize("*0").unwrap());
        assert_eq!(kinds(&tokens), vec![TokenKind::Deref, TokenKind::Number]);

        let tokens = disambiguate(lexer.tokenize("4*2").unwrap());
        assert_eq!(kinds(&tokens)[1], TokenKind::Star);

        let tokens = disambiguate(lexer.tokenize("($sp)*2 + **$a0").unwrap());
        assert_eq!(
            kinds(&tokens),
            vec![
                TokenKind::LParen,
                TokenKind::Register,
                TokenKind::RParen,
                TokenKind::Star,
                TokenKind::Number,
                TokenKind::Plus,
                TokenKind::Deref,
                TokenKind::Deref,
                TokenKind::Register,
            ]
        );
    }
}
