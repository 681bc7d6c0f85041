//! Rollup session: binds a wallet connection to the dapp's contracts, submits inputs, and
//! hands back a background poll for each input's notice.

mod address_book;

pub use address_book::{AddressBook, ConfigError, DappConfig, LOCAL_CHAIN_ID};

use crate::chain::{
    format_chain_id, ChainError, ChainId, ConfirmedReceipt, Connector, InputTransaction,
    ReceiptEvent, RollupsBackend, WalletConnection,
};
use crate::index::{NoticeIndexClient, NoticeKeys, NoticeResponse, PollConfig};
use alloy::primitives::{Address, Bytes, B256, U256};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// Confirmations awaited before the receipt is trusted.
const CONFIRMATIONS: u64 = 1;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("no wallet connected")]
    NoWallet,
    #[error("no chain connected")]
    NoChain,
    #[error("no dapp address known for chain {}", format_chain_id(*.0))]
    UnknownChain(ChainId),
    #[error("rollups session is not set up")]
    NotSetUp,
    #[error("InputAdded event not found in receipt of transaction {0}")]
    MissingInputAdded(B256),
    #[error("chain: {0}")]
    Chain(#[from] ChainError),
}

/// Contracts bound to one chain and dapp address.
pub struct BoundContracts<C> {
    pub chain_id: ChainId,
    pub address: Address,
    pub contracts: C,
}

/// Result of [`RollupSession::add_input`]. The transaction and receipt are final; the
/// notice arrives later through `response`.
pub struct InputSubmission {
    pub transaction: InputTransaction,
    pub receipt: ConfirmedReceipt,
    pub keys: NoticeKeys,
    pub response: NoticeResponse,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RollupStatus {
    pub chain_id: ChainId,
    pub address: Address,
    pub current_epoch: U256,
    pub input_count: U256,
    pub finalized_epochs: U256,
}

pub struct RollupSession<C> {
    address_book: AddressBook,
    index: Arc<NoticeIndexClient>,
    poll: PollConfig,
    bound: Option<BoundContracts<C>>,
}

impl<C: RollupsBackend> RollupSession<C> {
    pub fn new(address_book: AddressBook, index: NoticeIndexClient, poll: PollConfig) -> Self {
        Self {
            address_book,
            index: Arc::new(index),
            poll,
            bound: None,
        }
    }

    pub fn address_book(&self) -> &AddressBook {
        &self.address_book
    }

    pub fn index(&self) -> &Arc<NoticeIndexClient> {
        &self.index
    }

    pub fn binding(&self) -> Option<&BoundContracts<C>> {
        self.bound.as_ref()
    }

    pub fn is_set_up(&self) -> bool {
        self.bound.is_some()
    }

    /// Bind to the connection's chain. A session that is already bound is left as is;
    /// use [`rebind`](Self::rebind) to follow a wallet or chain switch.
    pub fn setup<W>(&mut self, connection: &WalletConnection<W>) -> Result<(), SessionError>
    where
        W: Connector<Contracts = C>,
    {
        if let Some(bound) = &self.bound {
            debug!(
                chain = %format_chain_id(bound.chain_id),
                address = %bound.address,
                "already set up"
            );
            return Ok(());
        }
        self.bound = Some(self.bind(connection)?);
        Ok(())
    }

    /// Replace the binding with one for `connection`. The old binding survives a failure.
    pub fn rebind<W>(&mut self, connection: &WalletConnection<W>) -> Result<(), SessionError>
    where
        W: Connector<Contracts = C>,
    {
        let bound = self.bind(connection)?;
        if let Some(old) = self.bound.replace(bound) {
            debug!(chain = %format_chain_id(old.chain_id), address = %old.address, "dropped binding");
        }
        Ok(())
    }

    fn bind<W>(&self, connection: &WalletConnection<W>) -> Result<BoundContracts<C>, SessionError>
    where
        W: Connector<Contracts = C>,
    {
        let wallet = connection.wallet.as_ref().ok_or(SessionError::NoWallet)?;
        let chain_id = connection.chain_id.ok_or(SessionError::NoChain)?;
        let address = self
            .address_book
            .get(chain_id)
            .ok_or(SessionError::UnknownChain(chain_id))?;
        let contracts = wallet.connect(address);
        info!(chain = %format_chain_id(chain_id), %address, "rollups contracts bound");
        Ok(BoundContracts {
            chain_id,
            address,
            contracts,
        })
    }

    fn contracts(&self) -> Result<&BoundContracts<C>, SessionError> {
        self.bound.as_ref().ok_or(SessionError::NotSetUp)
    }

    /// Submit `input` and wait for one confirmation. Polling for the notice starts in the
    /// background and is reachable through the returned `response`.
    pub async fn add_input(&self, input: &str) -> Result<InputSubmission, SessionError> {
        let bound = self.contracts()?;
        let payload = Bytes::copy_from_slice(input.as_bytes());
        let transaction = bound.contracts.add_input(payload).await?;
        let receipt = bound
            .contracts
            .wait_for_receipt(&transaction, CONFIRMATIONS)
            .await?;
        let keys = find_notice_keys(&receipt)?;
        info!(
            tx = %transaction.hash,
            block = ?receipt.block_number,
            epoch = %keys.epoch_index,
            input = %keys.input_index,
            "input confirmed"
        );
        let response = NoticeResponse::spawn(self.index.clone(), keys.clone(), self.poll.clone());
        Ok(InputSubmission {
            transaction,
            receipt,
            keys,
            response,
        })
    }

    /// Epoch and input counters read from the three facets.
    pub async fn status(&self) -> Result<RollupStatus, SessionError> {
        let bound = self.contracts()?;
        let c = &bound.contracts;
        let (current_epoch, input_count, finalized_epochs) =
            tokio::try_join!(c.current_epoch(), c.input_count(), c.finalized_epochs())?;
        Ok(RollupStatus {
            chain_id: bound.chain_id,
            address: bound.address,
            current_epoch,
            input_count,
            finalized_epochs,
        })
    }
}

/// Notice keys of the first `InputAdded` event in `receipt`.
pub fn find_notice_keys(receipt: &ConfirmedReceipt) -> Result<NoticeKeys, SessionError> {
    match receipt.find_event("InputAdded") {
        Some(ReceiptEvent::InputAdded {
            epoch_number,
            input_index,
            ..
        }) => Ok(NoticeKeys {
            epoch_index: epoch_number.to_string(),
            input_index: input_index.to_string(),
        }),
        _ => Err(SessionError::MissingInputAdded(receipt.transaction_hash)),
    }
}
