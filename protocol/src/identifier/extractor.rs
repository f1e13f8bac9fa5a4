//! Recovering the credential identifier from a confirmed receipt.
//!
//! The registry returns the identifier from `issueCredential`, but a
//! transaction's return value is not observable after the fact. What is
//! observable is the `CredentialIssued` event, and where it shows up depends
//! on the client: some bindings pre-decode events into the receipt, a plain
//! JSON-RPC node only has raw logs, and a receipt fetched from a lagging or
//! pruned node may have neither. Each [`ExtractionStrategy`] covers one of
//! those shapes; they run in order and the first hit wins.

use std::fmt;

use alloy_primitives::{Address, B256};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::{CREDENTIAL_ID_FIELD, CREDENTIAL_ISSUED_EVENT, HISTORICAL_QUERY_SPAN};
use crate::crypto::credential_issued_topic;
use crate::error::PipelineError;
use crate::identifier::id::CredentialId;
use crate::network::{LedgerClient, LogFilter};
use crate::transaction::receipt::{LogEntry, TransactionReceipt};

/// One way of finding the identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionStrategy {
    /// Pre-decoded `CredentialIssued` event on the receipt.
    StructuredEvent,
    /// `topics[1]` of the registry's raw `CredentialIssued` log.
    RawLogScan,
    /// `eth_getLogs` around the receipt's block.
    HistoricalQuery,
}

impl ExtractionStrategy {
    /// The order strategies are tried in.
    pub const ORDER: [ExtractionStrategy; 3] = [
        ExtractionStrategy::StructuredEvent,
        ExtractionStrategy::RawLogScan,
        ExtractionStrategy::HistoricalQuery,
    ];
}

impl fmt::Display for ExtractionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractionStrategy::StructuredEvent => write!(f, "structured_event"),
            ExtractionStrategy::RawLogScan => write!(f, "raw_log_scan"),
            ExtractionStrategy::HistoricalQuery => write!(f, "historical_query"),
        }
    }
}

/// Runs every strategy in [`ExtractionStrategy::ORDER`] until one yields an
/// identifier. Returns the identifier and the strategy that found it.
pub async fn extract_credential_id<C>(
    client: &C,
    contract: Address,
    receipt: &TransactionReceipt,
) -> Result<(CredentialId, ExtractionStrategy), PipelineError>
where
    C: LedgerClient + ?Sized,
{
    for strategy in ExtractionStrategy::ORDER {
        let found = match strategy {
            ExtractionStrategy::StructuredEvent => from_decoded_events(receipt),
            ExtractionStrategy::RawLogScan => from_raw_logs(receipt, contract),
            ExtractionStrategy::HistoricalQuery => from_history(client, receipt, contract).await,
        };
        if let Some(id) = found {
            debug!(credential_id = %id, %strategy, "credential id extracted");
            return Ok((id, strategy));
        }
    }

    Err(PipelineError::IdentifierExtraction(
        ExtractionDiagnostics::new(receipt, contract).to_string(),
    ))
}

/// Strategy 1: the `CredentialIssued` entry of the decoded events map, or
/// failing that, the first decoded event that carries a `credentialId`.
pub fn from_decoded_events(receipt: &TransactionReceipt) -> Option<CredentialId> {
    let named = receipt
        .events
        .get(CREDENTIAL_ISSUED_EVENT)
        .and_then(|event| event.return_values.get(CREDENTIAL_ID_FIELD));

    let value = named.or_else(|| {
        receipt
            .events
            .values()
            .find_map(|event| event.return_values.get(CREDENTIAL_ID_FIELD))
    })?;

    parse_value(value)
}

/// Strategy 2: the registry's raw log whose first topic is the event hash.
pub fn from_raw_logs(receipt: &TransactionReceipt, contract: Address) -> Option<CredentialId> {
    let topic = credential_issued_topic();
    receipt
        .logs
        .iter()
        .filter(|log| log.address == contract)
        .find_map(|log| indexed_id(log, &topic))
}

/// Strategy 3: query the event around the receipt's block and match it to
/// the transaction.
///
/// If no returned log names the transaction (some nodes omit
/// `transactionHash` on filtered logs), the last event in the window is
/// taken. In a busy block that may belong to a different issuance, so the
/// fallback is logged at `warn`. Query failures count as "not found".
pub async fn from_history<C>(
    client: &C,
    receipt: &TransactionReceipt,
    contract: Address,
) -> Option<CredentialId>
where
    C: LedgerClient + ?Sized,
{
    let topic = credential_issued_topic();
    let filter = LogFilter {
        address: contract,
        topics: vec![topic],
        from_block: receipt.block_number.saturating_sub(HISTORICAL_QUERY_SPAN),
        to_block: receipt.block_number.saturating_add(HISTORICAL_QUERY_SPAN),
    };

    let logs = match client.logs(&filter).await {
        Ok(logs) => logs,
        Err(e) => {
            warn!(
                tx_hash = %receipt.transaction_hash,
                error = %e,
                "historical credential event query failed"
            );
            return None;
        }
    };

    let events: Vec<&LogEntry> = logs
        .iter()
        .filter(|log| indexed_id(log, &topic).is_some())
        .collect();

    if let Some(log) = events
        .iter()
        .find(|log| log.transaction_hash == Some(receipt.transaction_hash))
    {
        return indexed_id(log, &topic);
    }

    let last = events.last()?;
    warn!(
        tx_hash = %receipt.transaction_hash,
        candidates = events.len(),
        from_block = filter.from_block,
        to_block = filter.to_block,
        "no event matched the transaction hash, using the latest CredentialIssued in range"
    );
    indexed_id(last, &topic)
}

fn indexed_id(log: &LogEntry, topic: &B256) -> Option<CredentialId> {
    match log.topics.as_slice() {
        [first, id, ..] if first == topic => Some(CredentialId::new(*id)),
        _ => None,
    }
}

fn parse_value(value: &Value) -> Option<CredentialId> {
    let raw = value.as_str()?;
    match CredentialId::parse(raw) {
        Ok(id) => Some(id),
        Err(e) => {
            debug!(value = raw, error = %e, "decoded credentialId is not a 32-byte hex string");
            None
        }
    }
}

/// What the receipt looked like when every strategy came up empty.
#[derive(Debug, Clone)]
pub struct ExtractionDiagnostics {
    pub log_count: usize,
    pub topics: Vec<Vec<B256>>,
    pub contract: Address,
    pub transaction_hash: B256,
    pub block_number: u64,
}

impl ExtractionDiagnostics {
    pub fn new(receipt: &TransactionReceipt, contract: Address) -> Self {
        Self {
            log_count: receipt.logs.len(),
            topics: receipt.logs.iter().map(|log| log.topics.clone()).collect(),
            contract,
            transaction_hash: receipt.transaction_hash,
            block_number: receipt.block_number,
        }
    }
}

impl fmt::Display for ExtractionDiagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "no CredentialIssued event for tx {} in block {} (contract {}, {} receipt logs",
            self.transaction_hash, self.block_number, self.contract, self.log_count
        )?;
        for (i, topics) in self.topics.iter().enumerate() {
            let rendered: Vec<String> = topics.iter().map(|t| t.to_string()).collect();
            write!(f, "; log {i} topics [{}]", rendered.join(", "))?;
        }
        write!(
            f,
            "); expected topic {} from the registry address",
            credential_issued_topic()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::mock::MockLedger;
    use crate::network::{RpcClientError, RpcMethod};
    use crate::transaction::receipt::{DecodedEvent, StatusValue};
    use std::collections::BTreeMap;

    fn contract() -> Address {
        Address::repeat_byte(0xcc)
    }

    fn id_bytes() -> B256 {
        let mut bytes = [0xaa; 32];
        bytes[31] = 0xbb;
        B256::from(bytes)
    }

    fn receipt(logs: Vec<LogEntry>) -> TransactionReceipt {
        TransactionReceipt {
            status: Some(StatusValue::Bool(true)),
            transaction_hash: B256::repeat_byte(0x11),
            block_number: 50,
            logs,
            events: BTreeMap::new(),
            gas_used: Some(90_000),
        }
    }

    fn issued_log(address: Address, id: B256, tx: Option<B256>) -> LogEntry {
        LogEntry {
            address,
            topics: vec![credential_issued_topic(), id],
            data: Default::default(),
            block_number: Some(50),
            transaction_hash: tx,
            log_index: Some(0),
        }
    }

    #[test]
    fn structured_event_is_read_by_name() {
        let mut r = receipt(vec![]);
        let mut values = BTreeMap::new();
        values.insert(
            CREDENTIAL_ID_FIELD.to_string(),
            Value::String(format!("0x{}", "12".repeat(32))),
        );
        r.events.insert(
            CREDENTIAL_ISSUED_EVENT.to_string(),
            DecodedEvent {
                event: Some(CREDENTIAL_ISSUED_EVENT.into()),
                return_values: values,
            },
        );
        let id = from_decoded_events(&r).unwrap();
        assert_eq!(id.to_string(), format!("0x{}", "12".repeat(32)));
    }

    #[test]
    fn structured_event_falls_back_to_any_event_with_the_field() {
        let mut r = receipt(vec![]);
        let mut values = BTreeMap::new();
        // Bare hex gains its prefix.
        values.insert(CREDENTIAL_ID_FIELD.to_string(), Value::String("34".repeat(32)));
        r.events.insert(
            "0".to_string(),
            DecodedEvent {
                event: None,
                return_values: values,
            },
        );
        let id = from_decoded_events(&r).unwrap();
        assert_eq!(id.to_string(), format!("0x{}", "34".repeat(32)));
    }

    #[test]
    fn raw_log_tier_returns_topic_unchanged() {
        let r = receipt(vec![issued_log(contract(), id_bytes(), None)]);
        let id = from_raw_logs(&r, contract()).unwrap();
        assert_eq!(id.to_string(), format!("0x{}bb", "aa".repeat(31)));
    }

    #[test]
    fn raw_log_tier_ignores_other_contracts_and_topics() {
        let foreign = issued_log(Address::repeat_byte(0x01), id_bytes(), None);
        let mut other_event = issued_log(contract(), id_bytes(), None);
        other_event.topics[0] = B256::repeat_byte(0x99);
        let r = receipt(vec![foreign, other_event]);
        assert!(from_raw_logs(&r, contract()).is_none());
    }

    #[tokio::test]
    async fn history_matches_transaction_hash() {
        let mine = B256::repeat_byte(0x11);
        let ledger = MockLedger::new().with_logs(Ok(vec![
            issued_log(contract(), B256::repeat_byte(0x01), Some(mine)),
            issued_log(contract(), B256::repeat_byte(0x02), Some(B256::repeat_byte(0x22))),
        ]));
        let (id, strategy) = extract_credential_id(&ledger, contract(), &receipt(vec![]))
            .await
            .unwrap();
        assert_eq!(strategy, ExtractionStrategy::HistoricalQuery);
        assert_eq!(*id.as_b256(), B256::repeat_byte(0x01));

        let filter = &ledger.log_filters()[0];
        assert_eq!((filter.from_block, filter.to_block), (49, 51));
        assert_eq!(filter.topics, vec![credential_issued_topic()]);
    }

    #[tokio::test]
    async fn history_without_hash_match_takes_last_event() {
        let ledger = MockLedger::new().with_logs(Ok(vec![
            issued_log(contract(), B256::repeat_byte(0x01), None),
            issued_log(contract(), B256::repeat_byte(0x02), None),
        ]));
        let id = from_history(&ledger, &receipt(vec![]), contract()).await.unwrap();
        assert_eq!(*id.as_b256(), B256::repeat_byte(0x02));
    }

    #[tokio::test]
    async fn history_window_is_clamped_at_genesis() {
        let ledger = MockLedger::new();
        let mut r = receipt(vec![]);
        r.block_number = 0;
        assert!(from_history(&ledger, &r, contract()).await.is_none());
        let filter = &ledger.log_filters()[0];
        assert_eq!((filter.from_block, filter.to_block), (0, 1));
    }

    #[tokio::test]
    async fn history_query_failure_counts_as_not_found() {
        let ledger = MockLedger::new().with_logs(Err(RpcClientError::Transport {
            method: RpcMethod::GetLogs,
            reason: "connection reset".into(),
        }));
        assert!(from_history(&ledger, &receipt(vec![]), contract()).await.is_none());
    }

    #[tokio::test]
    async fn earlier_tiers_skip_the_network() {
        let ledger = MockLedger::new();
        let r = receipt(vec![issued_log(contract(), id_bytes(), None)]);
        let (_, strategy) = extract_credential_id(&ledger, contract(), &r).await.unwrap();
        assert_eq!(strategy, ExtractionStrategy::RawLogScan);
        assert_eq!(ledger.calls("eth_getLogs"), 0);
    }

    #[tokio::test]
    async fn exhaustion_reports_diagnostics() {
        let ledger = MockLedger::new();
        let err = extract_credential_id(&ledger, contract(), &receipt(vec![]))
            .await
            .unwrap_err();
        match err {
            PipelineError::IdentifierExtraction(msg) => {
                assert!(msg.contains("0 receipt logs"), "{msg}");
                assert!(msg.contains("block 50"), "{msg}");
                assert!(msg.contains(&contract().to_string()), "{msg}");
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
