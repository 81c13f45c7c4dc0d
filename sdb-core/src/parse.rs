//! パース関連のユーティリティ関数

use anyhow::Result;

/// 数値リテラルをu64にパース
///
/// `0x` プレフィックス付きなら16進数、それ以外は10進数として解釈します。
///
/// # Examples
/// ```
/// use sdb_core::parse::parse_number;
///
/// assert_eq!(parse_number("0x1234").unwrap(), 0x1234);
/// assert_eq!(parse_number("1234").unwrap(), 1234);
/// ```
pub fn parse_number(s: &str) -> Result<u64> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16)
            .map_err(|e| anyhow::anyhow!("Invalid hexadecimal number '{}': {}", s, e))
    } else {
        s.parse::<u64>()
            .map_err(|e| anyhow::anyhow!("Invalid number '{}': {}", s, e))
    }
}

/// コマンド引数の回数・番号をパース
///
/// 10進数または16進数を受け付け、前後の空白は無視します。
pub fn parse_count(s: &str) -> Result<u64> {
    parse_number(s.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_number_hex() {
        assert_eq!(parse_number("0x1234").unwrap(), 0x1234);
        assert_eq!(parse_number("0X1234").unwrap(), 0x1234);
        assert_eq!(parse_number("0xabcd").unwrap(), 0xabcd);
        assert_eq!(parse_number("0xFFFFFFFFFFFFFFFF").unwrap(), u64::MAX);
    }

    #[test]
    fn test_parse_number_dec() {
        assert_eq!(parse_number("1234").unwrap(), 1234);
        assert_eq!(parse_number("18446744073709551615").unwrap(), u64::MAX);
    }

    #[test]
    fn test_parse_number_invalid() {
        assert!(parse_number("xyz").is_err());
        assert!(parse_number("0xghij").is_err());
        assert!(parse_number("18446744073709551616").is_err());
    }

    #[test]
    fn test_parse_count() {
        assert_eq!(parse_count(" 10 ").unwrap(), 10);
        assert!(parse_count("-1").is_err());
    }
}
