use std::fmt;
use std::str::FromStr;

use crate::error::AbiError;

/// A parameter type from the interface type vocabulary.
///
/// Legacy spellings are accepted on input and folded into their canonical
/// form: `hashN` is a fixed `N / 8` byte value and `stringN` is a fixed
/// `N` byte value, so both become `FixedBytes`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ParamType {
    /// Unsigned integer with the given bit width.
    Uint(usize),
    /// Signed integer with the given bit width.
    Int(usize),
    Address,
    Bool,
    /// Dynamic byte sequence.
    Bytes,
    /// Dynamic UTF-8 string.
    String,
    /// Fixed byte sequence of the given length (1..=32).
    FixedBytes(usize),
    Array(Box<ParamType>),
    FixedArray(Box<ParamType>, usize),
}

/// Longest accepted type name.
pub const MAX_TYPE_NAME_LEN: usize = 256;

/// Deepest accepted array nesting, e.g. `uint8[][]` has depth two.
pub const MAX_ARRAY_DEPTH: usize = 8;

/// Upper bound on the head size of a fixed array, in bytes (4096 words).
pub const MAX_FIXED_ARRAY_HEAD: usize = 32 * 4096;

impl ParamType {
    /// Whether values of this type are encoded out of line (head holds an offset).
    pub fn is_dynamic(&self) -> bool {
        match self {
            ParamType::Bytes | ParamType::String | ParamType::Array(_) => true,
            ParamType::FixedArray(inner, _) => inner.is_dynamic(),
            _ => false,
        }
    }

    /// Number of bytes this type occupies in the head section of an encoding.
    pub fn head_size(&self) -> usize {
        match self {
            ParamType::FixedArray(inner, len) if !inner.is_dynamic() => {
                inner.head_size().saturating_mul(*len)
            }
            _ => 32,
        }
    }

    /// The canonical spelling used in member signatures.
    pub fn canonical(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamType::Uint(bits) => write!(f, "uint{bits}"),
            ParamType::Int(bits) => write!(f, "int{bits}"),
            ParamType::Address => f.write_str("address"),
            ParamType::Bool => f.write_str("bool"),
            ParamType::Bytes => f.write_str("bytes"),
            ParamType::String => f.write_str("string"),
            ParamType::FixedBytes(len) => write!(f, "bytes{len}"),
            ParamType::Array(inner) => write!(f, "{inner}[]"),
            ParamType::FixedArray(inner, len) => write!(f, "{inner}[{len}]"),
        }
    }
}

impl FromStr for ParamType {
    type Err = AbiError;

    /// Array suffixes are read left to right, so `address[3][]` is a
    /// dynamic array of `address[3]`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() > MAX_TYPE_NAME_LEN {
            let prefix: String = s.chars().take(32).collect();
            return Err(AbiError::UnknownType(format!("{prefix}... ({} bytes)", s.len())));
        }
        let unknown = || AbiError::UnknownType(s.to_string());

        let base_end = s.find('[').unwrap_or(s.len());
        let mut kind = parse_elementary(&s[..base_end]).ok_or_else(unknown)?;

        let mut rest = &s[base_end..];
        let mut depth = 0;
        while let Some(after_open) = rest.strip_prefix('[') {
            depth += 1;
            if depth > MAX_ARRAY_DEPTH {
                return Err(unknown());
            }
            let close = after_open.find(']').ok_or_else(unknown)?;
            let dim = &after_open[..close];
            rest = &after_open[close + 1..];

            if dim.is_empty() {
                kind = ParamType::Array(Box::new(kind));
                continue;
            }
            if !dim.bytes().all(|b| b.is_ascii_digit()) {
                return Err(unknown());
            }
            let len: usize = dim.parse().map_err(|_| unknown())?;
            let fits = len > 0
                && kind
                    .head_size()
                    .checked_mul(len)
                    .is_some_and(|size| size <= MAX_FIXED_ARRAY_HEAD);
            if !fits {
                return Err(unknown());
            }
            kind = ParamType::FixedArray(Box::new(kind), len);
        }

        if !rest.is_empty() {
            return Err(unknown());
        }
        Ok(kind)
    }
}

fn parse_elementary(s: &str) -> Option<ParamType> {
    match s {
        "address" => return Some(ParamType::Address),
        "bool" => return Some(ParamType::Bool),
        "bytes" => return Some(ParamType::Bytes),
        "string" => return Some(ParamType::String),
        "uint" => return Some(ParamType::Uint(256)),
        "int" => return Some(ParamType::Int(256)),
        _ => {}
    }

    // Sized spellings. `bytes` and `string` take a byte count, the others a bit count.
    let sized = [
        ("uint", SizeRule::Bits),
        ("int", SizeRule::Bits),
        ("hash", SizeRule::Bits),
        ("bytes", SizeRule::Bytes),
        ("string", SizeRule::Bytes),
    ];
    for (prefix, rule) in sized {
        let Some(digits) = s.strip_prefix(prefix) else {
            continue;
        };
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            continue;
        }
        let n: usize = digits.parse().ok()?;
        if !rule.accepts(n) {
            return None;
        }
        return Some(match prefix {
            "uint" => ParamType::Uint(n),
            "int" => ParamType::Int(n),
            "hash" => ParamType::FixedBytes(n / 8),
            _ => ParamType::FixedBytes(n),
        });
    }

    None
}

#[derive(Clone, Copy)]
enum SizeRule {
    Bits,
    Bytes,
}

impl SizeRule {
    fn accepts(self, n: usize) -> bool {
        match self {
            SizeRule::Bits => n > 0 && n <= 256 && n % 8 == 0,
            SizeRule::Bytes => n > 0 && n <= 32,
        }
    }
}
