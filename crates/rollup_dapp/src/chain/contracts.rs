//! Rollups facet bindings and the backend the session drives.

use crate::chain::receipt::{ConfirmedReceipt, InputTransaction};
use alloy::primitives::{Address, Bytes, B256, U256};
use alloy::providers::{DynProvider, PendingTransactionBuilder, PendingTransactionError, Provider};
use alloy::sol;
use std::future::Future;
use thiserror::Error;
use tracing::{debug, info};

sol! {
    #[derive(Debug)]
    #[sol(rpc)]
    interface RollupsFacet {
        function getCurrentEpoch() external view returns (uint256);
    }

    #[derive(Debug)]
    #[sol(rpc)]
    interface InputFacet {
        event InputAdded(
            uint256 indexed epochNumber,
            uint256 indexed inputIndex,
            address sender,
            uint256 timestamp,
            bytes input
        );

        function addInput(bytes calldata input) external returns (bytes32);
        function getNumberOfInputs() external view returns (uint256);
    }

    #[derive(Debug)]
    #[sol(rpc)]
    interface OutputFacet {
        function getNumberOfFinalizedEpochs() external view returns (uint256);
    }
}

#[derive(Error, Debug)]
pub enum ChainError {
    #[error("contract: {0}")]
    Contract(#[from] alloy::contract::Error),
    #[error("pending transaction: {0}")]
    Pending(#[from] PendingTransactionError),
    #[error("transaction {0} reverted")]
    Reverted(B256),
}

/// The three rollups facets bound to one dapp address.
///
/// Implemented over alloy by [`AlloyRollups`]; tests provide in-memory doubles.
pub trait RollupsBackend: Send + Sync {
    /// Dapp address the facets are bound to.
    fn address(&self) -> Address;

    /// Send `InputFacet.addInput(input)`. Returns once the node accepted the transaction.
    fn add_input(
        &self,
        input: Bytes,
    ) -> impl Future<Output = Result<InputTransaction, ChainError>> + Send;

    /// Wait until `tx` has `confirmations` confirmations and return its receipt.
    fn wait_for_receipt(
        &self,
        tx: &InputTransaction,
        confirmations: u64,
    ) -> impl Future<Output = Result<ConfirmedReceipt, ChainError>> + Send;

    fn current_epoch(&self) -> impl Future<Output = Result<U256, ChainError>> + Send;

    fn input_count(&self) -> impl Future<Output = Result<U256, ChainError>> + Send;

    fn finalized_epochs(&self) -> impl Future<Output = Result<U256, ChainError>> + Send;
}

/// Facet handles over a signing alloy provider.
#[derive(Clone)]
pub struct AlloyRollups {
    rollups: RollupsFacet::RollupsFacetInstance<DynProvider>,
    input: InputFacet::InputFacetInstance<DynProvider>,
    output: OutputFacet::OutputFacetInstance<DynProvider>,
}

impl AlloyRollups {
    pub fn new(address: Address, provider: DynProvider) -> Self {
        Self {
            rollups: RollupsFacet::new(address, provider.clone()),
            input: InputFacet::new(address, provider.clone()),
            output: OutputFacet::new(address, provider),
        }
    }
}

impl RollupsBackend for AlloyRollups {
    fn address(&self) -> Address {
        *self.input.address()
    }

    async fn add_input(&self, input: Bytes) -> Result<InputTransaction, ChainError> {
        let pending = self.input.addInput(input.clone()).send().await?;
        let hash = *pending.tx_hash();
        info!(tx = %hash, bytes = input.len(), "addInput sent");
        Ok(InputTransaction {
            hash,
            to: self.address(),
            input,
        })
    }

    async fn wait_for_receipt(
        &self,
        tx: &InputTransaction,
        confirmations: u64,
    ) -> Result<ConfirmedReceipt, ChainError> {
        let root = self.input.provider().root().clone();
        let receipt = PendingTransactionBuilder::new(root, tx.hash)
            .with_required_confirmations(confirmations)
            .get_receipt()
            .await?;
        let receipt = ConfirmedReceipt::from_rpc(&receipt);
        if !receipt.success {
            return Err(ChainError::Reverted(receipt.transaction_hash));
        }
        debug!(
            tx = %receipt.transaction_hash,
            block = ?receipt.block_number,
            events = receipt.events.len(),
            "receipt"
        );
        Ok(receipt)
    }

    async fn current_epoch(&self) -> Result<U256, ChainError> {
        Ok(self.rollups.getCurrentEpoch().call().await?)
    }

    async fn input_count(&self) -> Result<U256, ChainError> {
        Ok(self.input.getNumberOfInputs().call().await?)
    }

    async fn finalized_epochs(&self) -> Result<U256, ChainError> {
        Ok(self.output.getNumberOfFinalizedEpochs().call().await?)
    }
}
