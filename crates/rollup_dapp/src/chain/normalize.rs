//! Normalization of chain ids and hex payloads.

use crate::chain::wallet::ChainId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NormalizeError {
    #[error("invalid chain id: {0}")]
    InvalidChainId(String),
    #[error("invalid hex payload: {0}")]
    InvalidHex(#[from] hex::FromHexError),
    #[error("payload is not utf-8: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),
}

/// Parse a chain id written either as `0x`-prefixed hex (wallet style, e.g. `0x7a69`)
/// or as a decimal number (`31337`).
pub fn parse_chain_id(s: &str) -> Result<ChainId, NormalizeError> {
    let s = s.trim();
    let parsed = if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        ChainId::from_str_radix(hex, 16)
    } else {
        s.parse::<ChainId>()
    };
    parsed.map_err(|_| NormalizeError::InvalidChainId(s.to_string()))
}

/// Format a chain id the way wallets report it: lowercase hex with `0x`.
pub fn format_chain_id(chain_id: ChainId) -> String {
    format!("{:#x}", chain_id)
}

/// Decode a hex payload as returned by the notice index. The `0x` prefix is optional.
pub fn decode_hex_payload(payload: &str) -> Result<Vec<u8>, NormalizeError> {
    let s = payload.trim();
    let s = s.strip_prefix("0x").unwrap_or(s);
    Ok(hex::decode(s)?)
}

/// Decode a hex payload into UTF-8 text.
pub fn decode_utf8_payload(payload: &str) -> Result<String, NormalizeError> {
    let bytes = decode_hex_payload(payload)?;
    Ok(String::from_utf8(bytes)?)
}
