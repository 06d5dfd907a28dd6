//! The bundled wallet interface literal.
//!
//! Four state-changing functions (`confirm`, `execute`, `kill`,
//! `changeOwner`) and three events (`CashIn`, `SingleTransact`,
//! `MultiTransact`), kept in declaration order.

use crate::error::Result;
use crate::interface::ContractInterface;

/// Name the bundled interface is registered under.
pub const COIN_CONTRACT_NAME: &str = "coin";

/// Raw JSON of the bundled interface.
pub const COIN_INTERFACE_JSON: &str = include_str!("../assets/coin.abi.json");

/// Parse the bundled interface.
pub fn coin_interface() -> Result<ContractInterface> {
    ContractInterface::from_json(COIN_INTERFACE_JSON)
}
