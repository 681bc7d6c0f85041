//! Dapp addresses per chain, and the JSON config file that can extend them.
//!
//! The table is seeded with the local development chain (`0x7a69`). Its address comes from
//! `ROLLUP_DAPP_ADDRESS` at build time, falling back to the default local deployment.
//!
//! Config is loaded from: env `ROLLUP_DAPP_CONFIG_PATH`, or `./config/rollup_dapp.json`,
//! or `./rollup_dapp.json`.

use crate::chain::{format_chain_id, parse_chain_id, ChainId, NormalizeError};
use alloy::primitives::{address, Address};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, warn};

/// Local hardhat / anvil chain.
pub const LOCAL_CHAIN_ID: ChainId = 0x7a69;

const DEFAULT_LOCAL_DAPP_ADDRESS: Address = address!("f8c694fd58360de278d5ff2276b7130bfdc0192a");

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("chain id: {0}")]
    ChainId(#[from] NormalizeError),
    #[error("invalid address for chain {chain}: {value}")]
    Address { chain: String, value: String },
}

/// Static table `chain id → dapp address`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AddressBook {
    entries: BTreeMap<ChainId, Address>,
}

impl Default for AddressBook {
    fn default() -> Self {
        Self::seeded()
    }
}

impl AddressBook {
    pub fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Table with the single local development entry.
    pub fn seeded() -> Self {
        let local = match option_env!("ROLLUP_DAPP_ADDRESS") {
            Some(s) => Address::from_str(s.trim()).unwrap_or_else(|_| {
                warn!(value = s, "ROLLUP_DAPP_ADDRESS is not an address, using default");
                DEFAULT_LOCAL_DAPP_ADDRESS
            }),
            None => DEFAULT_LOCAL_DAPP_ADDRESS,
        };
        Self::empty().with_entry(LOCAL_CHAIN_ID, local)
    }

    pub fn with_entry(mut self, chain_id: ChainId, address: Address) -> Self {
        self.insert(chain_id, address);
        self
    }

    /// Insert or replace; returns the previous address.
    pub fn insert(&mut self, chain_id: ChainId, address: Address) -> Option<Address> {
        self.entries.insert(chain_id, address)
    }

    pub fn get(&self, chain_id: ChainId) -> Option<Address> {
        self.entries.get(&chain_id).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ChainId, Address)> + '_ {
        self.entries.iter().map(|(c, a)| (*c, *a))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// On-disk configuration. Every field is optional.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DappConfig {
    /// Chain id (hex `0x7a69` or decimal `31337`) → dapp address.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub addresses: BTreeMap<String, String>,

    /// JSON-RPC endpoint of the node.
    #[serde(default)]
    pub rpc_url: Option<String>,

    /// GraphQL endpoint of the notice index.
    #[serde(default)]
    pub graphql_url: Option<String>,
}

impl DappConfig {
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&content)?;
        debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Load config: env ROLLUP_DAPP_CONFIG_PATH, then ./config/rollup_dapp.json, then
    /// ./rollup_dapp.json. No file is not an error; a malformed file is.
    pub fn load() -> Result<Self, ConfigError> {
        if let Ok(path) = std::env::var("ROLLUP_DAPP_CONFIG_PATH") {
            let p = Path::new(&path);
            if p.exists() {
                return Self::load_from_path(p);
            }
            warn!(path = %path, "ROLLUP_DAPP_CONFIG_PATH does not exist");
        }
        for candidate in [
            Path::new("./config/rollup_dapp.json"),
            Path::new("./rollup_dapp.json"),
        ] {
            if candidate.exists() {
                return Self::load_from_path(candidate);
            }
        }
        Ok(Self::default())
    }

    /// Seeded table with the configured addresses merged over it.
    pub fn address_book(&self) -> Result<AddressBook, ConfigError> {
        let mut book = AddressBook::seeded();
        for (chain, value) in &self.addresses {
            let chain_id = parse_chain_id(chain)?;
            let address = Address::from_str(value.trim()).map_err(|_| ConfigError::Address {
                chain: format_chain_id(chain_id),
                value: value.clone(),
            })?;
            book.insert(chain_id, address);
        }
        Ok(book)
    }
}
