//! On-chain side: contract bindings, receipts, wallet connection, and parsing helpers.

mod contracts;
mod normalize;
mod receipt;
mod wallet;

pub use contracts::{AlloyRollups, ChainError, InputFacet, OutputFacet, RollupsBackend, RollupsFacet};
pub use normalize::{
    decode_hex_payload, decode_utf8_payload, format_chain_id, parse_chain_id, NormalizeError,
};
pub use receipt::{ConfirmedReceipt, InputTransaction, ReceiptEvent};
pub use wallet::{ChainId, Connector, LocalWallet, WalletConnection, WalletError};
