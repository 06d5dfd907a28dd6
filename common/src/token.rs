use alloy_primitives::{I256, U256};
use serde_json::Value;

use crate::address::Address;
use crate::error::{AbiError, Result};
use crate::hash::{from_hex, to_hex};
use crate::types::ParamType;

/// A typed value that can be encoded into, or was decoded from, call data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Uint(U256),
    /// Signed integer, sign-extended to 256 bits.
    Int(I256),
    Address(Address),
    Bool(bool),
    Bytes(Vec<u8>),
    /// Exactly as many bytes as the type's declared length.
    FixedBytes(Vec<u8>),
    String(String),
    Array(Vec<Token>),
    FixedArray(Vec<Token>),
}

impl Token {
    pub fn uint(value: u128) -> Self {
        Token::Uint(U256::from(value))
    }

    pub fn int(value: i128) -> Self {
        Token::Int(i256_from_i128(value))
    }

    /// Whether this value is encoded out of line.
    pub fn is_dynamic(&self) -> bool {
        match self {
            Token::Bytes(_) | Token::String(_) | Token::Array(_) => true,
            Token::FixedArray(items) => items.iter().any(Token::is_dynamic),
            _ => false,
        }
    }

    /// Whether this value is acceptable for a parameter of type `kind`.
    pub fn matches(&self, kind: &ParamType) -> bool {
        match (self, kind) {
            (Token::Uint(v), ParamType::Uint(bits)) => fits_uint(v, *bits),
            (Token::Int(v), ParamType::Int(bits)) => fits_int(v, *bits),
            (Token::Address(_), ParamType::Address)
            | (Token::Bool(_), ParamType::Bool)
            | (Token::Bytes(_), ParamType::Bytes)
            | (Token::String(_), ParamType::String) => true,
            (Token::FixedBytes(b), ParamType::FixedBytes(len)) => b.len() == *len,
            (Token::Array(items), ParamType::Array(inner)) => {
                items.iter().all(|t| t.matches(inner))
            }
            (Token::FixedArray(items), ParamType::FixedArray(inner, len)) => {
                items.len() == *len && items.iter().all(|t| t.matches(inner))
            }
            _ => false,
        }
    }

    /// Build a token of type `kind` from its JSON representation.
    ///
    /// Integers accept JSON numbers or decimal / `0x` hex strings. Addresses
    /// and byte values are `0x` hex. Fixed byte values also accept plain
    /// text no longer than the declared length, which is how fixed-size
    /// strings like `string32` are written. Text may not start with `0x`.
    pub fn from_json(kind: &ParamType, value: &Value) -> Result<Token> {
        let mismatch = || AbiError::InvalidArgument(format!("expected {kind}, got {value}"));

        match kind {
            ParamType::Uint(bits) => {
                let v = match value {
                    Value::Number(n) => U256::from(n.as_u64().ok_or_else(mismatch)?),
                    Value::String(s) => parse_unsigned(s).ok_or_else(mismatch)?,
                    _ => return Err(mismatch()),
                };
                if !fits_uint(&v, *bits) {
                    return Err(AbiError::InvalidArgument(format!(
                        "{value} does not fit in uint{bits}"
                    )));
                }
                Ok(Token::Uint(v))
            }
            ParamType::Int(bits) => {
                let v = match value {
                    Value::Number(n) => i256_from_i128(n.as_i64().ok_or_else(mismatch)?.into()),
                    Value::String(s) => parse_signed(s).ok_or_else(mismatch)?,
                    _ => return Err(mismatch()),
                };
                if !fits_int(&v, *bits) {
                    return Err(AbiError::InvalidArgument(format!(
                        "{value} does not fit in int{bits}"
                    )));
                }
                Ok(Token::Int(v))
            }
            ParamType::Address => {
                let s = value.as_str().ok_or_else(mismatch)?;
                Ok(Token::Address(s.parse()?))
            }
            ParamType::Bool => value.as_bool().map(Token::Bool).ok_or_else(mismatch),
            ParamType::Bytes => {
                let s = value.as_str().ok_or_else(mismatch)?;
                Ok(Token::Bytes(from_hex(s)?))
            }
            ParamType::String => value
                .as_str()
                .map(|s| Token::String(s.to_string()))
                .ok_or_else(mismatch),
            ParamType::FixedBytes(len) => {
                let s = value.as_str().ok_or_else(mismatch)?;
                let mut bytes = match s.strip_prefix("0x") {
                    Some(digits) => hex::decode(digits).map_err(|e| {
                        AbiError::InvalidArgument(format!("{value} is not valid hex: {e}"))
                    })?,
                    None => s.as_bytes().to_vec(),
                };
                if bytes.len() > *len {
                    return Err(AbiError::InvalidArgument(format!(
                        "{value} is longer than {len} bytes"
                    )));
                }
                bytes.resize(*len, 0);
                Ok(Token::FixedBytes(bytes))
            }
            ParamType::Array(inner) => {
                let items = value.as_array().ok_or_else(mismatch)?;
                let tokens = items
                    .iter()
                    .map(|v| Token::from_json(inner, v))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Token::Array(tokens))
            }
            ParamType::FixedArray(inner, len) => {
                let items = value.as_array().ok_or_else(mismatch)?;
                if items.len() != *len {
                    return Err(AbiError::InvalidArgument(format!(
                        "expected {len} elements for {kind}, got {}",
                        items.len()
                    )));
                }
                let tokens = items
                    .iter()
                    .map(|v| Token::from_json(inner, v))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Token::FixedArray(tokens))
            }
        }
    }

    /// JSON form of this value. Integers become decimal strings so that
    /// 256-bit values survive a round trip through JavaScript clients.
    pub fn to_json(&self) -> Value {
        match self {
            Token::Uint(v) => Value::String(v.to_string()),
            Token::Int(v) => Value::String(v.to_string()),
            Token::Address(a) => Value::String(a.to_string()),
            Token::Bool(b) => Value::Bool(*b),
            Token::Bytes(b) | Token::FixedBytes(b) => Value::String(to_hex(b)),
            Token::String(s) => Value::String(s.clone()),
            Token::Array(items) | Token::FixedArray(items) => {
                Value::Array(items.iter().map(Token::to_json).collect())
            }
        }
    }
}

fn i256_from_i128(value: i128) -> I256 {
    let magnitude = I256::from_raw(U256::from(value.unsigned_abs()));
    if value < 0 {
        magnitude.wrapping_neg()
    } else {
        magnitude
    }
}

/// Decimal, or hex with a `0x` prefix.
fn parse_unsigned(s: &str) -> Option<U256> {
    match s.strip_prefix("0x") {
        Some(digits) if !digits.is_empty() => U256::from_str_radix(digits, 16).ok(),
        Some(_) => None,
        None if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) => {
            U256::from_str_radix(s, 10).ok()
        }
        None => None,
    }
}

/// An optional leading `-` followed by an unsigned literal.
fn parse_signed(s: &str) -> Option<I256> {
    let (negative, digits) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s),
    };
    let magnitude = parse_unsigned(digits)?;
    if negative {
        // -2^255 is the one value whose magnitude has the sign bit set.
        if magnitude > I256::MIN.into_raw() {
            return None;
        }
        Some(I256::from_raw(magnitude).wrapping_neg())
    } else {
        let v = I256::from_raw(magnitude);
        (!v.is_negative()).then_some(v)
    }
}

/// True when `v` is below 2^bits.
pub(crate) fn fits_uint(v: &U256, bits: usize) -> bool {
    v.bit_len() <= bits
}

/// True when `v` lies within the range of a `bits`-wide signed integer.
pub(crate) fn fits_int(v: &I256, bits: usize) -> bool {
    if bits >= 256 {
        return true;
    }
    // Everything above the value bits must repeat the sign bit.
    let high = v.into_raw() >> (bits - 1);
    high == U256::ZERO || high == U256::MAX >> (bits - 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn uint_from_number_and_strings() {
        let t = Token::from_json(&ParamType::Uint(256), &json!(1000)).unwrap();
        assert_eq!(t, Token::uint(1000));
        let t = Token::from_json(&ParamType::Uint(256), &json!("1000")).unwrap();
        assert_eq!(t, Token::uint(1000));
        let t = Token::from_json(&ParamType::Uint(256), &json!("0x3e8")).unwrap();
        assert_eq!(t, Token::uint(1000));
    }

    #[test]
    fn uint_overflow_is_rejected() {
        assert!(Token::from_json(&ParamType::Uint(8), &json!(256)).is_err());
        assert!(Token::from_json(&ParamType::Uint(8), &json!(255)).is_ok());
        assert!(Token::from_json(&ParamType::Uint(256), &json!(-1)).is_err());
        let too_big = format!("1{}", "0".repeat(78));
        assert!(Token::from_json(&ParamType::Uint(256), &json!(too_big)).is_err());
    }

    #[test]
    fn max_uint256_round_trips_as_decimal() {
        let max = "115792089237316195423570985008687907853269984665640564039457584007913129639935";
        let t = Token::from_json(&ParamType::Uint(256), &json!(max)).unwrap();
        assert_eq!(t, Token::Uint(U256::MAX));
        assert_eq!(t.to_json(), json!(max));
    }

    #[test]
    fn signed_bounds() {
        assert_eq!(Token::from_json(&ParamType::Int(8), &json!(-128)).unwrap(), Token::int(-128));
        assert!(Token::from_json(&ParamType::Int(8), &json!(-129)).is_err());
        assert!(Token::from_json(&ParamType::Int(8), &json!(128)).is_err());
        assert_eq!(Token::from_json(&ParamType::Int(8), &json!("-128")).unwrap(), Token::int(-128));
        assert!(Token::from_json(&ParamType::Int(8), &json!("-129")).is_err());
        assert!(Token::from_json(&ParamType::Int(8), &json!("128")).is_err());
        assert_eq!(Token::int(-42).to_json(), json!("-42"));
    }

    #[test]
    fn fixed_bytes_accept_text_or_hex() {
        let t = Token::from_json(&ParamType::FixedBytes(32), &json!("out")).unwrap();
        let Token::FixedBytes(bytes) = &t else { panic!("expected fixed bytes") };
        assert_eq!(&bytes[..3], b"out");
        assert!(bytes[3..].iter().all(|b| *b == 0));

        let t = Token::from_json(&ParamType::FixedBytes(2), &json!("0xbeef")).unwrap();
        assert_eq!(t, Token::FixedBytes(vec![0xbe, 0xef]));
        assert!(Token::from_json(&ParamType::FixedBytes(2), &json!("abc")).is_err());
    }

    #[test]
    fn fixed_bytes_reject_bad_hex_after_prefix() {
        let err = Token::from_json(&ParamType::FixedBytes(32), &json!("0xzz")).unwrap_err();
        assert!(matches!(err, AbiError::InvalidArgument(_)));
        assert!(err.to_string().contains("not valid hex"));
        assert!(Token::from_json(&ParamType::FixedBytes(4), &json!("0xabc")).is_err());
    }

    #[test]
    fn signed_extremes_of_int256() {
        let min = "-57896044618658097711785492504343953926634992332820282019728792003956564819968";
        let max = "57896044618658097711785492504343953926634992332820282019728792003956564819967";
        let t = Token::from_json(&ParamType::Int(256), &json!(min)).unwrap();
        assert_eq!(t, Token::Int(I256::MIN));
        assert_eq!(t.to_json(), json!(min));
        let t = Token::from_json(&ParamType::Int(256), &json!(max)).unwrap();
        assert_eq!(t, Token::Int(I256::MAX));
        let past_min = "-57896044618658097711785492504343953926634992332820282019728792003956564819969";
        assert!(Token::from_json(&ParamType::Int(256), &json!(past_min)).is_err());
        assert_eq!(Token::from_json(&ParamType::Int(16), &json!("-0x10")).unwrap(), Token::int(-16));
    }

    #[test]
    fn arrays_check_length_and_elements() {
        let kind: ParamType = "uint8[2]".parse().unwrap();
        assert!(Token::from_json(&kind, &json!([1, 2])).is_ok());
        assert!(Token::from_json(&kind, &json!([1])).is_err());
        assert!(Token::from_json(&kind, &json!([1, 300])).is_err());
    }

    #[test]
    fn wrong_json_kind_is_rejected() {
        assert!(Token::from_json(&ParamType::Bool, &json!("true")).is_err());
        assert!(Token::from_json(&ParamType::Address, &json!(5)).is_err());
    }

    #[test]
    fn matches_respects_widths() {
        assert!(Token::uint(255).matches(&ParamType::Uint(8)));
        assert!(!Token::uint(256).matches(&ParamType::Uint(8)));
        assert!(Token::int(-1).matches(&ParamType::Int(16)));
        assert!(!Token::Bool(true).matches(&ParamType::Uint(8)));
    }
}
