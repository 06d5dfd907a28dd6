use thiserror::Error;

/// Errors produced while parsing, validating, encoding or decoding contract
/// interfaces.
#[derive(Debug, Error)]
pub enum AbiError {
    #[error("malformed interface at line {line}, column {column}: {message}")]
    Parse {
        line: usize,
        column: usize,
        message: String,
    },

    #[error("invalid interface entry #{index}: {reason}")]
    InvalidEntry { index: usize, reason: String },

    #[error("unknown parameter type `{0}`")]
    UnknownType(String),

    #[error("duplicate member signature `{0}`")]
    DuplicateMember(String),

    #[error("unknown function `{0}`")]
    UnknownFunction(String),

    #[error("unknown event: {0}")]
    UnknownEvent(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("cannot decode {0}")]
    Decode(String),

    #[error("invalid address `{0}`")]
    InvalidAddress(String),

    #[error("invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),
}

impl From<serde_json::Error> for AbiError {
    fn from(e: serde_json::Error) -> Self {
        AbiError::Parse {
            line: e.line(),
            column: e.column(),
            message: e.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AbiError>;
