//! Input transactions and their confirmation receipts, with decoded rollups events.

use crate::chain::contracts::InputFacet::InputAdded;
use alloy::network::ReceiptResponse;
use alloy::primitives::{Address, Bytes, Log, B256, U256};
use alloy::rpc::types::TransactionReceipt;
use alloy::sol_types::SolEvent;
use time::OffsetDateTime;

/// A submitted `addInput` transaction.
#[derive(Clone, Debug, PartialEq)]
pub struct InputTransaction {
    pub hash: B256,
    /// Dapp address the input was sent to.
    pub to: Address,
    /// Raw input bytes (UTF-8 of the submitted text).
    pub input: Bytes,
}

/// Event found in a receipt's logs, in log order.
#[derive(Clone, Debug, PartialEq)]
pub enum ReceiptEvent {
    InputAdded {
        epoch_number: U256,
        input_index: U256,
        sender: Address,
        timestamp: U256,
        input: Bytes,
    },
    Unknown {
        address: Address,
        topic0: Option<B256>,
    },
}

impl ReceiptEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ReceiptEvent::InputAdded { .. } => "InputAdded",
            ReceiptEvent::Unknown { .. } => "Unknown",
        }
    }

    /// Decode a log. Logs that are not a well-formed `InputAdded` become `Unknown`.
    pub fn from_log(log: &Log) -> Self {
        let topic0 = log.data.topics().first().copied();
        if topic0 == Some(InputAdded::SIGNATURE_HASH) {
            if let Ok(ev) = InputAdded::decode_log_data(&log.data) {
                return ReceiptEvent::InputAdded {
                    epoch_number: ev.epochNumber,
                    input_index: ev.inputIndex,
                    sender: ev.sender,
                    timestamp: ev.timestamp,
                    input: ev.input,
                };
            }
        }
        ReceiptEvent::Unknown {
            address: log.address,
            topic0,
        }
    }

    /// Block timestamp recorded by `InputAdded`, if this is one and it fits.
    pub fn added_at(&self) -> Option<OffsetDateTime> {
        match self {
            ReceiptEvent::InputAdded { timestamp, .. } => {
                let secs: u64 = (*timestamp).try_into().ok()?;
                OffsetDateTime::from_unix_timestamp(i64::try_from(secs).ok()?).ok()
            }
            ReceiptEvent::Unknown { .. } => None,
        }
    }
}

/// Receipt of a confirmed transaction.
#[derive(Clone, Debug, PartialEq)]
pub struct ConfirmedReceipt {
    pub transaction_hash: B256,
    pub block_number: Option<u64>,
    pub success: bool,
    pub events: Vec<ReceiptEvent>,
}

impl ConfirmedReceipt {
    pub fn from_rpc(receipt: &TransactionReceipt) -> Self {
        let events = receipt
            .inner
            .logs()
            .iter()
            .map(|log| ReceiptEvent::from_log(&log.inner))
            .collect();
        Self {
            transaction_hash: receipt.transaction_hash(),
            block_number: receipt.block_number(),
            success: receipt.status(),
            events,
        }
    }

    /// First event with the given name.
    pub fn find_event(&self, name: &str) -> Option<&ReceiptEvent> {
        self.events.iter().find(|e| e.name() == name)
    }
}
