//! Contract call-data encoding.
//!
//! Values are laid out as a head of 32-byte words followed by a tail.
//! Static values sit in the head. Dynamic values (`bytes`, `string`, `T[]`,
//! and fixed arrays of dynamic values) put an offset in the head and their
//! length-prefixed contents in the tail. Offsets are relative to the start
//! of the enclosing sequence.

use alloy_primitives::{I256, U256};

use crate::address::Address;
use crate::error::{AbiError, Result};
use crate::token::{fits_int, fits_uint, Token};
use crate::types::ParamType;

/// A 256-bit big-endian machine word.
pub type Word = [u8; 32];

/// Encode a sequence of tokens as one tuple.
pub fn encode(tokens: &[Token]) -> Vec<u8> {
    encode_sequence(tokens)
}

/// Decode a tuple of `types` from `data`.
pub fn decode(types: &[ParamType], data: &[u8]) -> Result<Vec<Token>> {
    let mut tokens = Vec::with_capacity(types.len());
    let mut cursor = 0usize;
    for kind in types {
        tokens.push(decode_slot(kind, data, 0, cursor)?);
        cursor = cursor.saturating_add(kind.head_size());
    }
    Ok(tokens)
}

/// Decode a single static value from one 32-byte word, as found in a log topic.
pub fn decode_word(kind: &ParamType, word: &Word) -> Result<Token> {
    if kind.is_dynamic() || kind.head_size() != 32 {
        return Err(AbiError::Decode(format!("{kind} does not fit in one word")));
    }
    decode_static(kind, word, 0)
}

fn head_len(token: &Token) -> usize {
    match token {
        Token::FixedArray(items) if !token.is_dynamic() => items.iter().map(head_len).sum(),
        _ => 32,
    }
}

fn encode_sequence(tokens: &[Token]) -> Vec<u8> {
    let heads: usize = tokens.iter().map(head_len).sum();
    let mut head = Vec::with_capacity(heads);
    let mut tail = Vec::new();

    for token in tokens {
        if token.is_dynamic() {
            head.extend_from_slice(&usize_word(heads + tail.len()));
            tail.extend(encode_dynamic(token));
        } else {
            encode_static(token, &mut head);
        }
    }

    head.extend(tail);
    head
}

fn encode_static(token: &Token, out: &mut Vec<u8>) {
    match token {
        Token::Uint(v) => out.extend_from_slice(&v.to_be_bytes::<32>()),
        Token::Int(v) => out.extend_from_slice(&v.into_raw().to_be_bytes::<32>()),
        Token::Address(a) => out.extend_from_slice(&a.to_word()),
        Token::Bool(b) => out.extend_from_slice(&usize_word(usize::from(*b))),
        Token::FixedBytes(bytes) => out.extend(right_pad(bytes)),
        Token::FixedArray(items) => {
            for item in items {
                encode_static(item, out);
            }
        }
        Token::Bytes(_) | Token::String(_) | Token::Array(_) => {
            out.extend(encode_dynamic(token));
        }
    }
}

fn encode_dynamic(token: &Token) -> Vec<u8> {
    match token {
        Token::Bytes(bytes) => encode_bytes(bytes),
        Token::String(s) => encode_bytes(s.as_bytes()),
        Token::Array(items) => {
            let mut out = usize_word(items.len()).to_vec();
            out.extend(encode_sequence(items));
            out
        }
        Token::FixedArray(items) => encode_sequence(items),
        other => {
            let mut out = Vec::with_capacity(32);
            encode_static(other, &mut out);
            out
        }
    }
}

fn encode_bytes(bytes: &[u8]) -> Vec<u8> {
    let mut out = usize_word(bytes.len()).to_vec();
    out.extend(right_pad(bytes));
    out
}

fn right_pad(bytes: &[u8]) -> Vec<u8> {
    let padded = bytes.len().div_ceil(32) * 32;
    let mut out = bytes.to_vec();
    out.resize(padded, 0);
    out
}

fn usize_word(n: usize) -> Word {
    U256::from(n).to_be_bytes::<32>()
}

fn read_word(data: &[u8], at: usize) -> Result<Word> {
    at.checked_add(32)
        .and_then(|end| data.get(at..end))
        .and_then(|word| word.try_into().ok())
        .ok_or_else(|| AbiError::Decode(format!("word at offset {at}: data is {} bytes", data.len())))
}

fn read_usize(data: &[u8], at: usize) -> Result<usize> {
    let word = U256::from_be_bytes(read_word(data, at)?);
    usize::try_from(word)
        .map_err(|_| AbiError::Decode(format!("offset or length at {at} is too large")))
}

/// Fail unless `count` slots of `slot` bytes fit in `data` from `at` on.
fn ensure_room(data: &[u8], at: usize, count: usize, slot: usize) -> Result<()> {
    let needed = count.checked_mul(slot);
    let available = data.len().saturating_sub(at);
    match needed {
        Some(n) if n <= available => Ok(()),
        _ => Err(AbiError::Decode(format!(
            "{count} elements at offset {at}: data is {} bytes",
            data.len()
        ))),
    }
}

/// Decode the value whose head slot sits at `cursor` in a sequence starting at `base`.
fn decode_slot(kind: &ParamType, data: &[u8], base: usize, cursor: usize) -> Result<Token> {
    if kind.is_dynamic() {
        let offset = read_usize(data, cursor)?;
        let at = base
            .checked_add(offset)
            .ok_or_else(|| AbiError::Decode("offset overflow".into()))?;
        decode_dynamic(kind, data, at)
    } else {
        decode_static(kind, data, cursor)
    }
}

/// Decode `count` values of `inner` laid out as a sequence starting at `base`.
fn decode_repeated(inner: &ParamType, count: usize, data: &[u8], base: usize) -> Result<Vec<Token>> {
    let slot = inner.head_size();
    ensure_room(data, base, count, slot.max(1))?;

    let mut tokens = Vec::with_capacity(count);
    let mut cursor = base;
    for _ in 0..count {
        tokens.push(decode_slot(inner, data, base, cursor)?);
        cursor += slot;
    }
    Ok(tokens)
}

fn decode_dynamic(kind: &ParamType, data: &[u8], at: usize) -> Result<Token> {
    match kind {
        ParamType::Bytes | ParamType::String => {
            let len = read_usize(data, at)?;
            let start = at + 32;
            let bytes = start
                .checked_add(len)
                .and_then(|end| data.get(start..end))
                .ok_or_else(|| AbiError::Decode(format!("{len} bytes at offset {start}")))?;
            if *kind == ParamType::String {
                let s = String::from_utf8(bytes.to_vec())
                    .map_err(|_| AbiError::Decode("string is not valid UTF-8".into()))?;
                Ok(Token::String(s))
            } else {
                Ok(Token::Bytes(bytes.to_vec()))
            }
        }
        ParamType::Array(inner) => {
            let len = read_usize(data, at)?;
            Ok(Token::Array(decode_repeated(inner, len, data, at + 32)?))
        }
        ParamType::FixedArray(inner, len) => {
            Ok(Token::FixedArray(decode_repeated(inner, *len, data, at)?))
        }
        _ => decode_static(kind, data, at),
    }
}

fn decode_static(kind: &ParamType, data: &[u8], at: usize) -> Result<Token> {
    if let ParamType::FixedArray(inner, len) = kind {
        return Ok(Token::FixedArray(decode_repeated(inner, *len, data, at)?));
    }

    let word = read_word(data, at)?;

    match kind {
        ParamType::Uint(bits) => {
            let v = U256::from_be_bytes(word);
            if !fits_uint(&v, *bits) {
                return Err(AbiError::Decode(format!("uint{bits} at offset {at} has dirty padding")));
            }
            Ok(Token::Uint(v))
        }
        ParamType::Int(bits) => {
            let v = I256::from_raw(U256::from_be_bytes(word));
            if !fits_int(&v, *bits) {
                return Err(AbiError::Decode(format!("int{bits} at offset {at} is not sign-extended")));
            }
            Ok(Token::Int(v))
        }
        ParamType::Address => {
            if word[..12].iter().any(|b| *b != 0) {
                return Err(AbiError::Decode(format!("address at offset {at} has dirty padding")));
            }
            let mut addr = [0u8; 20];
            addr.copy_from_slice(&word[12..]);
            Ok(Token::Address(Address(addr)))
        }
        ParamType::Bool => match (word[..31].iter().all(|b| *b == 0), word[31]) {
            (true, 0) => Ok(Token::Bool(false)),
            (true, 1) => Ok(Token::Bool(true)),
            _ => Err(AbiError::Decode(format!("bool at offset {at} is not 0 or 1"))),
        },
        ParamType::FixedBytes(len) => Ok(Token::FixedBytes(word[..*len].to_vec())),
        other => Err(AbiError::Decode(format!("{other} is not a static type"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(hex_words: &[&str]) -> Vec<u8> {
        hex_words
            .iter()
            .flat_map(|w| hex::decode(format!("{w:0>64}")).unwrap())
            .collect()
    }

    #[test]
    fn static_values_fill_single_words() {
        let addr = Address([0x11; 20]);
        let data = encode(&[Token::Address(addr), Token::uint(69), Token::Bool(true)]);
        assert_eq!(
            data,
            words(&["1111111111111111111111111111111111111111", "45", "1"])
        );
    }

    #[test]
    fn dynamic_bytes_go_to_the_tail() {
        // execute(address,uint256,bytes) arguments
        let addr = Address([0x22; 20]);
        let data = encode(&[
            Token::Address(addr),
            Token::uint(1),
            Token::Bytes(vec![0xde, 0xad, 0xbe, 0xef]),
        ]);
        let expected = words(&[
            "2222222222222222222222222222222222222222",
            "1",
            "60",
            "4",
            "deadbeef00000000000000000000000000000000000000000000000000000000",
        ]);
        assert_eq!(data, expected);
    }

    #[test]
    fn dynamic_array_of_strings() {
        let data = encode(&[Token::Array(vec![
            Token::String("one".into()),
            Token::String("two".into()),
        ])]);
        let expected = words(&[
            "20",
            "2",
            "40",
            "80",
            "3",
            "6f6e650000000000000000000000000000000000000000000000000000000000",
            "3",
            "74776f0000000000000000000000000000000000000000000000000000000000",
        ]);
        assert_eq!(data, expected);

        let kind: ParamType = "string[]".parse().unwrap();
        let decoded = decode(&[kind], &data).unwrap();
        assert_eq!(
            decoded,
            vec![Token::Array(vec![
                Token::String("one".into()),
                Token::String("two".into())
            ])]
        );
    }

    #[test]
    fn static_fixed_array_is_inline() {
        let kind: ParamType = "uint8[2]".parse().unwrap();
        let tokens = vec![
            Token::FixedArray(vec![Token::uint(1), Token::uint(2)]),
            Token::Bool(false),
        ];
        let data = encode(&tokens);
        assert_eq!(data, words(&["1", "2", "0"]));
        assert_eq!(decode(&[kind, ParamType::Bool], &data).unwrap(), tokens);
    }

    #[test]
    fn decodes_mixed_outputs() {
        let types = vec![ParamType::FixedBytes(32), ParamType::String, ParamType::Int(256)];
        let tokens = vec![
            Token::FixedBytes(vec![0xab; 32]),
            Token::String("hello".into()),
            Token::int(-5),
        ];
        assert_eq!(decode(&types, &encode(&tokens)).unwrap(), tokens);
    }

    #[test]
    fn rejects_truncated_data() {
        assert!(decode(&[ParamType::Uint(256)], &[0u8; 31]).is_err());
        let mut data = encode(&[Token::Bytes(vec![1; 40])]);
        data.truncate(data.len() - 32);
        assert!(decode(&[ParamType::Bytes], &data).is_err());
    }

    #[test]
    fn rejects_dirty_padding() {
        let data = words(&["100"]);
        assert!(decode(&[ParamType::Uint(8)], &data).is_err());
        assert!(decode(&[ParamType::Bool], &words(&["2"])).is_err());
        let data = words(&["ff1111111111111111111111111111111111111111"]);
        assert!(decode(&[ParamType::Address], &data).is_err());
    }

    #[test]
    fn rejects_absurd_array_length() {
        let data = words(&["20", "ffffffff"]);
        let kind: ParamType = "uint256[]".parse().unwrap();
        assert!(decode(&[kind], &data).is_err());
    }

    #[test]
    fn topic_word_decoding() {
        let addr = Address([0x33; 20]);
        let token = decode_word(&ParamType::Address, &addr.to_word()).unwrap();
        assert_eq!(token, Token::Address(addr));
        assert!(decode_word(&ParamType::String, &[0u8; 32]).is_err());
    }

    #[test]
    fn oversized_fixed_array_is_an_error_not_a_panic() {
        // Built directly, bypassing the size limit applied when parsing type names.
        let kind = ParamType::FixedArray(Box::new(ParamType::Uint(8)), usize::MAX / 2);
        assert!(decode(&[kind], &[0u8; 32]).is_err());

        let kind = ParamType::FixedArray(Box::new(ParamType::String), 1 << 60);
        assert!(decode(&[kind], &words(&["20", "0"])).is_err());
    }

    #[test]
    fn nested_static_arrays_decode_in_place() {
        let kind: ParamType = "uint8[2][2]".parse().unwrap();
        let data = words(&["1", "2", "3", "4"]);
        let decoded = decode(&[kind], &data).unwrap();
        assert_eq!(
            decoded,
            vec![Token::FixedArray(vec![
                Token::FixedArray(vec![Token::uint(1), Token::uint(2)]),
                Token::FixedArray(vec![Token::uint(3), Token::uint(4)]),
            ])]
        );
        assert_eq!(encode(&decoded), data);
    }
}
