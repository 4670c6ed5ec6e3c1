//! Identifier generation

use crate::error::{Result, TradeError};
use bech32::Bech32m;
use uuid7::uuid7;

pub const TRADE_HRP: &str = "trade_";

// construct a unique, time-ordered id then encode using bech32m
pub fn new_uuid_to_bech32(hrp: &str) -> Result<String> {
    let hrp = bech32::Hrp::parse(hrp).map_err(|e| TradeError::Identifier(e.to_string()))?;
    bech32::encode::<Bech32m>(hrp, uuid7().as_bytes())
        .map_err(|e| TradeError::Identifier(e.to_string()))
}

pub fn new_trade_id() -> Result<String> {
    new_uuid_to_bech32(TRADE_HRP)
}
