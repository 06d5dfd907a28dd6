pub mod address;
pub mod binder;
pub mod codec;
pub mod entry;
pub mod error;
pub mod hash;
pub mod interface;
pub mod literal;
pub mod log;
pub mod token;
pub mod types;
pub mod valkey;

pub use address::Address;
pub use binder::{bind, BoundContract, CallRequest};
pub use entry::{Event, EventParam, Function, InterfaceEntry, Param};
pub use error::AbiError;
pub use interface::ContractInterface;
pub use log::{DecodedEvent, DecodedParam, Log};
pub use token::Token;
pub use types::ParamType;
