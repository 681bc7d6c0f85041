//! Client side of a rollup dapp.
//!
//! Binds a wallet connection to the rollups contracts, submits inputs on-chain and
//! resolves the notice computed for each input from the GraphQL notice index.

pub mod chain;
pub mod index;
pub mod session;

pub use chain::{
    AlloyRollups, ChainError, ChainId, ConfirmedReceipt, Connector, InputTransaction, LocalWallet,
    ReceiptEvent, RollupsBackend, WalletConnection,
};
pub use index::{IndexConfig, IndexError, Notice, NoticeIndexClient, NoticeKeys};
pub use index::{NoticeResponse, PollConfig, PollError, PollOutcome};
pub use session::{
    find_notice_keys, AddressBook, ConfigError, DappConfig, InputSubmission, RollupSession,
    RollupStatus, SessionError,
};
