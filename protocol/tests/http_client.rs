//! Contract tests for `HttpLedgerClient` against a scripted JSON-RPC node,
//! plus a full issuance and verification run over the wire.
//!
//! ## Methods Tested
//!
//! | Method | Test |
//! |--------|------|
//! | `eth_chainId` | `chain_id_*` |
//! | `eth_getBlockByNumber` | `latest_block_*` |
//! | `eth_call` | `call_*` |
//! | `eth_getTransactionReceipt` | `receipt_*` |
//! | (pipeline) | `issue_and_verify_*` |

use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::{Address, Bytes, B256, U256};
use alloy_sol_types::{SolCall, SolValue};
use serde_json::{json, Value};
use wiremock::matchers::{body_partial_json, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

use credchain_protocol::contract::abi::{authorizedIssuersCall, issueCredentialCall};
use credchain_protocol::crypto::credential_issued_topic;
use credchain_protocol::network::{CallRequest, LedgerClient, RpcClientError};
use credchain_protocol::transaction::decode_signed_transaction;
use credchain_protocol::{
    CredentialId, CredentialPipeline, HttpLedgerClient, IssuanceRequest, IssuerSecret,
    LedgerConfig, PipelineError,
};

const DEV_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
const DEV_ADDRESS: &str = "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266";
const CONTRACT: &str = "0x5FbDB2315678afecb367f032d93F642f64180aa3";

fn client(server: &MockServer) -> HttpLedgerClient {
    HttpLedgerClient::new(server.uri().parse().unwrap(), Duration::from_secs(5)).unwrap()
}

fn ok(result: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "jsonrpc": "2.0",
        "id": 1,
        "result": result,
    }))
}

fn rpc_error(code: i64, message: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "jsonrpc": "2.0",
        "id": 1,
        "error": { "code": code, "message": message },
    }))
}

async fn answer(server: &MockServer, rpc_method: &str, response: ResponseTemplate) {
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "method": rpc_method })))
        .respond_with(response)
        .mount(server)
        .await;
}

fn hex_of(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

// ── eth_chainId ─────────────────────────────────────────────────────

#[tokio::test]
async fn chain_id_decodes_hex_quantity() {
    let server = MockServer::start().await;
    answer(&server, "eth_chainId", ok(json!("0x7a69"))).await;

    assert_eq!(client(&server).chain_id().await.unwrap(), 31337);
}

#[tokio::test]
async fn chain_id_http_failure_carries_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream down"))
        .mount(&server)
        .await;

    match client(&server).chain_id().await.unwrap_err() {
        RpcClientError::Http { status, body, .. } => {
            assert_eq!(status, 503);
            assert_eq!(body, "upstream down");
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn chain_id_slow_node_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ok(json!("0x1")).set_delay(Duration::from_millis(500)))
        .mount(&server)
        .await;

    let client =
        HttpLedgerClient::new(server.uri().parse().unwrap(), Duration::from_millis(50)).unwrap();
    assert!(matches!(
        client.chain_id().await.unwrap_err(),
        RpcClientError::Timeout { .. }
    ));
}

// ── eth_getBlockByNumber ────────────────────────────────────────────

#[tokio::test]
async fn latest_block_with_and_without_base_fee() {
    let server = MockServer::start().await;
    answer(
        &server,
        "eth_getBlockByNumber",
        ok(json!({
            "number": "0x64",
            "baseFeePerGas": "0x174876e800",
            "timestamp": "0x6553f100",
            "hash": "0x00",
        })),
    )
    .await;

    let head = client(&server).latest_block().await.unwrap();
    assert_eq!(head.number, 100);
    assert_eq!(head.base_fee_per_gas, Some(U256::from(100_000_000_000u64)));

    let legacy = MockServer::start().await;
    answer(
        &legacy,
        "eth_getBlockByNumber",
        ok(json!({ "number": "0x1", "timestamp": "0x0" })),
    )
    .await;
    assert_eq!(client(&legacy).latest_block().await.unwrap().base_fee_per_gas, None);
}

// ── eth_call ────────────────────────────────────────────────────────

#[tokio::test]
async fn call_revert_is_recognised() {
    let server = MockServer::start().await;
    answer(&server, "eth_call", rpc_error(3, "execution reverted")).await;

    let request = CallRequest::new(Address::repeat_byte(1), Bytes::from_static(&[1, 2, 3, 4]));
    let err = client(&server).call(&request).await.unwrap_err();
    assert!(err.is_revert(), "{err}");
    assert!(!err.is_insufficient_funds());
}

#[tokio::test]
async fn call_returns_raw_bytes() {
    let server = MockServer::start().await;
    answer(&server, "eth_call", ok(json!(hex_of(&true.abi_encode())))).await;

    let request = CallRequest::new(Address::repeat_byte(1), Bytes::new());
    let data = client(&server).call(&request).await.unwrap();
    assert_eq!(data.len(), 32);
    assert_eq!(data[31], 1);
}

// ── eth_getTransactionReceipt ───────────────────────────────────────

#[tokio::test]
async fn receipt_pending_is_none() {
    let server = MockServer::start().await;
    answer(&server, "eth_getTransactionReceipt", ok(Value::Null)).await;

    let receipt = client(&server)
        .transaction_receipt(B256::repeat_byte(9))
        .await
        .unwrap();
    assert!(receipt.is_none());
}

// ── Full pipeline over HTTP ─────────────────────────────────────────

async fn scripted_node(credential: B256, tx_hash: B256) -> MockServer {
    let server = MockServer::start().await;
    let contract: Address = CONTRACT.parse().unwrap();

    answer(&server, "eth_getCode", ok(json!("0x6080604052"))).await;
    answer(
        &server,
        "eth_getBlockByNumber",
        ok(json!({ "number": "0x64", "baseFeePerGas": "0x3b9aca00", "timestamp": "0x0" })),
    )
    .await;
    answer(&server, "eth_estimateGas", ok(json!("0x30d40"))).await;
    answer(&server, "eth_getBalance", ok(json!("0xde0b6b3a7640000"))).await;
    answer(&server, "eth_chainId", ok(json!("0x539"))).await;
    answer(&server, "eth_getTransactionCount", ok(json!("0x2"))).await;
    answer(&server, "eth_sendRawTransaction", ok(json!(tx_hash))).await;
    answer(
        &server,
        "eth_getTransactionReceipt",
        ok(json!({
            "status": "0x1",
            "transactionHash": tx_hash,
            "blockNumber": "0x65",
            "gasUsed": "0x2dc6c",
            "logs": [{
                "address": contract,
                "topics": [credential_issued_topic(), credential],
                "data": "0x",
                "blockNumber": "0x65",
                "transactionHash": tx_hash,
                "logIndex": "0x0",
            }],
        })),
    )
    .await;

    // Both registry reads go through eth_call; tell them apart by selector.
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "method": "eth_call" })))
        .and(CallSelector(hex::encode(authorizedIssuersCall::SELECTOR)))
        .respond_with(ok(json!(hex_of(&true.abi_encode()))))
        .with_priority(1)
        .mount(&server)
        .await;
    let record = (
        "Alice".to_string(),
        "B.Tech".to_string(),
        "Computer Science".to_string(),
        U256::from(1_700_000_000u64),
        true,
    )
        .abi_encode_params();
    answer(&server, "eth_call", ok(json!(hex_of(&record)))).await;

    server
}

/// Matches `eth_call` requests whose data starts with the given selector.
struct CallSelector(String);

impl wiremock::Match for CallSelector {
    fn matches(&self, request: &wiremock::Request) -> bool {
        serde_json::from_slice::<Value>(&request.body)
            .ok()
            .and_then(|body| body["params"][0]["data"].as_str().map(str::to_owned))
            .map(|data| data.trim_start_matches("0x").starts_with(&self.0))
            .unwrap_or(false)
    }
}

#[tokio::test]
async fn issue_and_verify_over_json_rpc() {
    let credential = B256::repeat_byte(0x5c);
    let tx_hash = B256::repeat_byte(0xee);
    let server = scripted_node(credential, tx_hash).await;

    let config = LedgerConfig::new(
        &server.uri(),
        CONTRACT,
        DEV_ADDRESS,
        IssuerSecret::new(DEV_KEY),
    )
    .unwrap()
    .with_receipt_poll_interval(Duration::from_millis(10));
    let http = Arc::new(HttpLedgerClient::from_config(&config).unwrap());
    let pipeline = CredentialPipeline::new(http, config);

    let request = IssuanceRequest {
        student_id: "STU001".into(),
        student_name: "Alice".into(),
        degree: "B.Tech".into(),
        major: "Computer Science".into(),
        content_address: "QmYwAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPbdG".into(),
    };
    let issued = pipeline.issue_on_chain(&request).await.unwrap();
    assert_eq!(issued.credential_id, CredentialId::from(credential));
    assert_eq!(issued.transaction_hash, tx_hash);
    assert_eq!(issued.block_number, 101);

    // The broadcast transaction is a dynamic-fee call from the issuer.
    let requests = server.received_requests().await.unwrap();
    let raw = requests
        .iter()
        .filter_map(|r| serde_json::from_slice::<Value>(&r.body).ok())
        .find(|body| body["method"] == "eth_sendRawTransaction")
        .and_then(|body| body["params"][0].as_str().map(str::to_owned))
        .unwrap();
    let signed = decode_signed_transaction(&hex::decode(raw.trim_start_matches("0x")).unwrap())
        .unwrap();
    assert_eq!(signed.raw[0], 0x02);
    assert_eq!(signed.envelope.nonce, 2);
    assert_eq!(signed.envelope.chain_id, 1337);
    assert_eq!(signed.envelope.gas_limit, 200_000);
    let call = issueCredentialCall::abi_decode(&signed.envelope.data, true).unwrap();
    assert_eq!(call.studentName, "Alice");

    let record = pipeline.verify_on_chain(&issued.credential_id).await.unwrap();
    assert_eq!(record.student_name, "Alice");
    assert_eq!(record.degree, "B.Tech");
    assert_eq!(record.major, "Computer Science");
    assert!(record.is_valid);
}

#[tokio::test]
async fn issue_against_unreachable_node_is_a_network_error() {
    let config = LedgerConfig::new(
        "http://127.0.0.1:9",
        CONTRACT,
        DEV_ADDRESS,
        IssuerSecret::new(DEV_KEY),
    )
    .unwrap();
    let http = Arc::new(
        HttpLedgerClient::new(config.ledger_url.clone(), Duration::from_secs(2)).unwrap(),
    );
    let pipeline = CredentialPipeline::new(http, config);

    let request = IssuanceRequest {
        student_id: "STU002".into(),
        student_name: "Bob".into(),
        degree: "M.Sc".into(),
        major: "Physics".into(),
        content_address: "QmHash".into(),
    };
    let err = pipeline.issue_on_chain(&request).await.unwrap_err();
    assert!(matches!(err, PipelineError::Network(_)), "{err}");
}
