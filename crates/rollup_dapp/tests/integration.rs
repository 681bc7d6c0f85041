//! Integration tests: in-memory rollups contracts plus a mocked notice index.

use alloy::primitives::{Address, Bytes, B256, U256};
use rollup_dapp::chain::{ChainError, ConfirmedReceipt, InputTransaction, ReceiptEvent};
use rollup_dapp::{
    AddressBook, Connector, IndexConfig, NoticeIndexClient, PollConfig, PollError, PollOutcome,
    RollupSession, RollupsBackend, SessionError, WalletConnection,
};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use wiremock::matchers::{body_partial_json, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

const LOCAL: u64 = 31337;
const OTHER: u64 = 11_155_111;

fn load_fixture(path: &str) -> serde_json::Value {
    let root = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../testdata");
    let full = root.join(path);
    let s =
        std::fs::read_to_string(&full).unwrap_or_else(|e| panic!("read {}: {}", full.display(), e));
    serde_json::from_str(&s).unwrap_or_else(|e| panic!("parse {}: {}", path, e))
}

fn input_added(epoch: u64, index: u64) -> ReceiptEvent {
    ReceiptEvent::InputAdded {
        epoch_number: U256::from(epoch),
        input_index: U256::from(index),
        sender: Address::with_last_byte(0xaa),
        timestamp: U256::from(1_700_000_000u64),
        input: Bytes::new(),
    }
}

/// Wallet double. Every contract bound from it shares the same call log.
#[derive(Clone, Default)]
struct MockWallet {
    events: Vec<ReceiptEvent>,
    submitted: Arc<Mutex<Vec<Bytes>>>,
    connects: Arc<AtomicUsize>,
}

impl MockWallet {
    fn emitting(events: Vec<ReceiptEvent>) -> Self {
        Self {
            events,
            ..Default::default()
        }
    }
}

impl Connector for MockWallet {
    type Contracts = MockRollups;

    fn connect(&self, address: Address) -> MockRollups {
        self.connects.fetch_add(1, Ordering::SeqCst);
        MockRollups {
            address,
            events: self.events.clone(),
            submitted: self.submitted.clone(),
        }
    }
}

struct MockRollups {
    address: Address,
    events: Vec<ReceiptEvent>,
    submitted: Arc<Mutex<Vec<Bytes>>>,
}

impl RollupsBackend for MockRollups {
    fn address(&self) -> Address {
        self.address
    }

    async fn add_input(&self, input: Bytes) -> Result<InputTransaction, ChainError> {
        self.submitted.lock().unwrap().push(input.clone());
        Ok(InputTransaction {
            hash: B256::repeat_byte(0xab),
            to: self.address,
            input,
        })
    }

    async fn wait_for_receipt(
        &self,
        tx: &InputTransaction,
        confirmations: u64,
    ) -> Result<ConfirmedReceipt, ChainError> {
        assert_eq!(confirmations, 1);
        Ok(ConfirmedReceipt {
            transaction_hash: tx.hash,
            block_number: Some(7),
            success: true,
            events: self.events.clone(),
        })
    }

    async fn current_epoch(&self) -> Result<U256, ChainError> {
        Ok(U256::from(4))
    }

    async fn input_count(&self) -> Result<U256, ChainError> {
        Ok(U256::from(2))
    }

    async fn finalized_epochs(&self) -> Result<U256, ChainError> {
        Ok(U256::from(3))
    }
}

fn address_book() -> AddressBook {
    AddressBook::seeded().with_entry(OTHER, Address::with_last_byte(0x22))
}

fn session(base_url: &str, poll: PollConfig) -> RollupSession<MockRollups> {
    let index = NoticeIndexClient::new(IndexConfig {
        base_url: base_url.to_string(),
        rate_limit_ms: 0,
        max_retries: 0,
        retry_backoff_ms: 1,
        ..Default::default()
    })
    .unwrap();
    RollupSession::new(address_book(), index, poll)
}

fn fast_poll() -> PollConfig {
    PollConfig::fixed(Duration::from_millis(20)).with_max_duration(Duration::from_secs(10))
}

fn connected(wallet: &MockWallet, chain: u64) -> WalletConnection<MockWallet> {
    WalletConnection::new(Some(wallet.clone()), Some(chain))
}

#[tokio::test]
async fn integration_setup_twice_keeps_first_binding() {
    let mut s = session("http://127.0.0.1:1", fast_poll());
    let first = MockWallet::default();
    let second = MockWallet::default();

    s.setup(&connected(&first, LOCAL)).unwrap();
    let bound_address = s.binding().unwrap().address;
    s.setup(&connected(&second, OTHER)).unwrap();

    let bound = s.binding().unwrap();
    assert_eq!(bound.chain_id, LOCAL);
    assert_eq!(bound.address, bound_address);
    assert_eq!(bound.contracts.address(), bound_address);
    assert_eq!(second.connects.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn integration_rebind_follows_chain_switch() {
    let mut s = session("http://127.0.0.1:1", fast_poll());
    let wallet = MockWallet::default();
    s.setup(&connected(&wallet, LOCAL)).unwrap();

    s.rebind(&connected(&wallet, OTHER)).unwrap();
    let bound = s.binding().unwrap();
    assert_eq!(bound.chain_id, OTHER);
    assert_eq!(bound.address, Address::with_last_byte(0x22));

    // A failed rebind keeps the current binding.
    let err = s.rebind(&connected(&wallet, 1)).unwrap_err();
    assert!(matches!(err, SessionError::UnknownChain(1)));
    assert_eq!(s.binding().unwrap().chain_id, OTHER);
}

#[tokio::test]
async fn integration_setup_requires_wallet_then_chain() {
    let mut s = session("http://127.0.0.1:1", fast_poll());
    let wallet = MockWallet::default();

    let err = s
        .setup(&WalletConnection::<MockWallet>::disconnected())
        .unwrap_err();
    assert!(matches!(err, SessionError::NoWallet));

    let err = s
        .setup(&WalletConnection::new(Some(wallet.clone()), None))
        .unwrap_err();
    assert!(matches!(err, SessionError::NoChain));

    let err = s
        .setup(&WalletConnection::<MockWallet>::new(None, Some(LOCAL)))
        .unwrap_err();
    assert!(matches!(err, SessionError::NoWallet));

    assert!(!s.is_set_up());
    assert_eq!(wallet.connects.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn integration_add_input_before_setup_fails() {
    let s = session("http://127.0.0.1:1", fast_poll());
    let err = s.add_input("hello").await.err().unwrap();
    assert!(matches!(err, SessionError::NotSetUp));
    assert!(matches!(s.status().await, Err(SessionError::NotSetUp)));
}

#[tokio::test]
async fn integration_end_to_end_hello() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(serde_json::json!({
            "variables": { "epochIndex": "0", "inputIndex": "0" }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(load_fixture("get_notice_hello.json")))
        .expect(1)
        .mount(&server)
        .await;

    let mut s = session(&server.uri(), fast_poll());
    let wallet = MockWallet::emitting(vec![input_added(0, 0)]);
    s.setup(&connected(&wallet, LOCAL)).unwrap();

    let submission = s.add_input("hello").await.unwrap();
    assert_eq!(submission.transaction.hash, B256::repeat_byte(0xab));
    assert_eq!(submission.transaction.input.as_ref(), b"hello");
    assert_eq!(submission.receipt.transaction_hash, submission.transaction.hash);
    assert_eq!(submission.keys.epoch_index, "0");
    assert_eq!(submission.keys.input_index, "0");
    assert_eq!(
        wallet.submitted.lock().unwrap().as_slice(),
        &[Bytes::from_static(b"hello")]
    );

    let outcome = submission.response.wait().await.unwrap();
    assert_eq!(outcome, PollOutcome::Resolved("hello".to_string()));
}

#[tokio::test]
async fn integration_response_waits_for_non_empty_notice_and_stops() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(load_fixture("get_notice_empty.json")))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(load_fixture("get_notice_hello.json")))
        .mount(&server)
        .await;

    let mut s = session(&server.uri(), fast_poll());
    let wallet = MockWallet::emitting(vec![input_added(3, 7)]);
    s.setup(&connected(&wallet, LOCAL)).unwrap();

    let submission = s.add_input("hello").await.unwrap();
    // Transaction and receipt are available before the first query goes out.
    assert!(!submission.response.is_finished());
    assert_eq!(submission.response.keys().epoch_index, "3");
    assert_eq!(submission.response.keys().input_index, "7");

    let outcome = submission.response.wait().await.unwrap();
    assert_eq!(outcome, PollOutcome::Resolved("hello".to_string()));
    assert_eq!(server.received_requests().await.unwrap().len(), 3);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
    assert_eq!(s.index().request_count(), 3);
}

#[tokio::test]
async fn integration_missing_input_added_fails_without_polling() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(load_fixture("get_notice_hello.json")))
        .expect(0)
        .mount(&server)
        .await;

    let mut s = session(&server.uri(), fast_poll());
    let wallet = MockWallet::emitting(vec![ReceiptEvent::Unknown {
        address: Address::ZERO,
        topic0: None,
    }]);
    s.setup(&connected(&wallet, LOCAL)).unwrap();

    let err = s.add_input("hello").await.err().unwrap();
    assert!(matches!(err, SessionError::MissingInputAdded(h) if h == B256::repeat_byte(0xab)));
    tokio::time::sleep(Duration::from_millis(60)).await;
}

#[tokio::test]
async fn integration_poll_times_out_after_max_attempts() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(load_fixture("get_notice_empty.json")))
        .expect(3)
        .mount(&server)
        .await;

    let poll = PollConfig::fixed(Duration::from_millis(10)).with_max_attempts(3);
    let mut s = session(&server.uri(), poll);
    s.setup(&connected(&MockWallet::emitting(vec![input_added(0, 1)]), LOCAL))
        .unwrap();

    let submission = s.add_input("slow").await.unwrap();
    match submission.response.wait().await.unwrap() {
        PollOutcome::TimedOut { attempts, .. } => assert_eq!(attempts, 3),
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn integration_poll_cancel() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(load_fixture("get_notice_empty.json")))
        .mount(&server)
        .await;

    let mut s = session(&server.uri(), fast_poll());
    s.setup(&connected(&MockWallet::emitting(vec![input_added(0, 2)]), LOCAL))
        .unwrap();

    let submission = s.add_input("never").await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    submission.response.cancel();
    let outcome = submission.response.wait().await.unwrap();
    assert_eq!(outcome, PollOutcome::Cancelled);

    let seen = server.received_requests().await.unwrap().len();
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(server.received_requests().await.unwrap().len(), seen);
}

#[tokio::test]
async fn integration_dropped_submission_stops_polling() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(load_fixture("get_notice_empty.json")))
        .mount(&server)
        .await;

    let poll = PollConfig::fixed(Duration::from_millis(10));
    let mut s = session(&server.uri(), poll);
    s.setup(&connected(&MockWallet::emitting(vec![input_added(0, 3)]), LOCAL))
        .unwrap();

    let submission = s.add_input("forgotten").await.unwrap();
    let token = submission.response.cancellation_token();
    tokio::time::sleep(Duration::from_millis(50)).await;
    drop(submission);
    assert!(token.is_cancelled());

    tokio::time::sleep(Duration::from_millis(30)).await;
    let seen = server.received_requests().await.unwrap().len();
    assert!(seen > 0);
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(server.received_requests().await.unwrap().len(), seen);
}

#[tokio::test]
async fn integration_poll_times_out_at_deadline() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(load_fixture("get_notice_empty.json")))
        .mount(&server)
        .await;

    let poll = PollConfig::fixed(Duration::from_millis(15)).with_max_duration(Duration::from_millis(100));
    let mut s = session(&server.uri(), poll);
    s.setup(&connected(&MockWallet::emitting(vec![input_added(0, 4)]), LOCAL))
        .unwrap();

    let submission = s.add_input("late").await.unwrap();
    match submission.response.wait().await.unwrap() {
        PollOutcome::TimedOut { attempts, elapsed } => {
            assert!(attempts > 0);
            assert!(elapsed >= Duration::from_millis(100));
        }
        other => panic!("unexpected {other:?}"),
    }
    let seen = server.received_requests().await.unwrap().len();
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(server.received_requests().await.unwrap().len(), seen);
}

#[tokio::test]
async fn integration_index_failure_rejects_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("down"))
        .mount(&server)
        .await;

    let mut s = session(&server.uri(), fast_poll());
    s.setup(&connected(&MockWallet::emitting(vec![input_added(0, 0)]), LOCAL))
        .unwrap();

    let submission = s.add_input("hello").await.unwrap();
    let err = submission.response.wait().await.unwrap_err();
    assert!(matches!(err, PollError::Index(_)));
}

#[tokio::test]
async fn integration_bad_payload_rejects_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(load_fixture("get_notice_bad_payload.json")),
        )
        .mount(&server)
        .await;

    let mut s = session(&server.uri(), fast_poll());
    s.setup(&connected(&MockWallet::emitting(vec![input_added(0, 0)]), LOCAL))
        .unwrap();

    let submission = s.add_input("hello").await.unwrap();
    let err = submission.response.wait().await.unwrap_err();
    assert!(matches!(err, PollError::Decode(_)));
}

#[tokio::test]
async fn integration_status_reads_all_facets() {
    let mut s = session("http://127.0.0.1:1", fast_poll());
    s.setup(&connected(&MockWallet::default(), OTHER)).unwrap();

    let status = s.status().await.unwrap();
    assert_eq!(status.chain_id, OTHER);
    assert_eq!(status.address, Address::with_last_byte(0x22));
    assert_eq!(status.current_epoch, U256::from(4));
    assert_eq!(status.input_count, U256::from(2));
    assert_eq!(status.finalized_epochs, U256::from(3));
}
