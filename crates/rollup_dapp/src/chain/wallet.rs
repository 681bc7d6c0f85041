//! Wallet connection: the selected chain plus a signer able to bind the rollups facets.

use crate::chain::contracts::{AlloyRollups, RollupsBackend};
use alloy::network::EthereumWallet;
use alloy::primitives::Address;
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::signers::local::{LocalSignerError, PrivateKeySigner};
use thiserror::Error;
use tracing::{info, warn};
use url::Url;

pub type ChainId = u64;

#[derive(Error, Debug)]
pub enum WalletError {
    #[error("rpc url: {0}")]
    Url(#[from] url::ParseError),
    #[error("private key: {0}")]
    Key(#[from] LocalSignerError),
}

/// Something holding a signer that can bind the three rollups facets at an address.
pub trait Connector {
    type Contracts: RollupsBackend;

    fn connect(&self, address: Address) -> Self::Contracts;
}

/// Snapshot of a wallet connection. Either part may be missing.
#[derive(Clone, Debug)]
pub struct WalletConnection<W> {
    pub wallet: Option<W>,
    pub chain_id: Option<ChainId>,
}

impl<W> WalletConnection<W> {
    pub fn new(wallet: Option<W>, chain_id: Option<ChainId>) -> Self {
        Self { wallet, chain_id }
    }

    pub fn disconnected() -> Self {
        Self {
            wallet: None,
            chain_id: None,
        }
    }
}

/// A local private key signing through a JSON-RPC node.
#[derive(Clone)]
pub struct LocalWallet {
    provider: DynProvider,
    address: Address,
}

impl LocalWallet {
    pub fn new(rpc_url: Url, signer: PrivateKeySigner) -> Self {
        let address = signer.address();
        let provider = ProviderBuilder::new()
            .wallet(EthereumWallet::from(signer))
            .connect_http(rpc_url)
            .erased();
        Self { provider, address }
    }

    pub fn signer_address(&self) -> Address {
        self.address
    }

    /// Connect to the node at `rpc_url`. Without `private_key` the connection has no
    /// wallet; if the node does not answer `eth_chainId` it has no chain.
    pub async fn connection(
        rpc_url: &str,
        private_key: Option<&str>,
    ) -> Result<WalletConnection<LocalWallet>, WalletError> {
        let url = Url::parse(rpc_url)?;
        let (wallet, provider) = match private_key {
            Some(key) => {
                let signer: PrivateKeySigner = key.trim().parse()?;
                let wallet = Self::new(url, signer);
                let provider = wallet.provider.clone();
                (Some(wallet), provider)
            }
            None => (None, ProviderBuilder::new().connect_http(url).erased()),
        };
        let chain_id = match provider.get_chain_id().await {
            Ok(id) => Some(id),
            Err(e) => {
                warn!(error = %e, "eth_chainId failed");
                None
            }
        };
        info!(
            wallet = ?wallet.as_ref().map(LocalWallet::signer_address),
            ?chain_id,
            "connection"
        );
        Ok(WalletConnection::new(wallet, chain_id))
    }
}

impl Connector for LocalWallet {
    type Contracts = AlloyRollups;

    fn connect(&self, address: Address) -> AlloyRollups {
        AlloyRollups::new(address, self.provider.clone())
    }
}
