//! Building, signing, broadcasting, and confirming the issuance transaction.
//!
//! The submitter owns the part of the pipeline with side effects. Everything
//! before `eth_sendRawTransaction` can fail without consequence; everything
//! after it leaves a transaction on the network whether we see its receipt
//! or not. Errors after broadcast therefore always carry the hash.

use std::time::Duration;

use alloy_primitives::{Bytes, B256};
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::config::LedgerConfig;
use crate::crypto::keys::IssuerKey;
use crate::error::PipelineError;
use crate::fee::units::{format_ether, format_gwei};
use crate::fee::{ensure_sufficient_balance, FeeQuote};
use crate::network::{CallRequest, LedgerClient};
use crate::transaction::builder::EnvelopeBuilder;
use crate::transaction::receipt::TransactionReceipt;
use crate::transaction::signing::sign_envelope;

/// Submits contract calls on behalf of the configured issuer.
pub struct TransactionSubmitter<'a, C: ?Sized> {
    client: &'a C,
    config: &'a LedgerConfig,
}

impl<'a, C> TransactionSubmitter<'a, C>
where
    C: LedgerClient + ?Sized,
{
    pub fn new(client: &'a C, config: &'a LedgerConfig) -> Self {
        Self { client, config }
    }

    /// Sends `call_data` to the registry and waits for the receipt.
    ///
    /// Order matters: the gas estimate feeds the balance guard, and the
    /// nonce is read as late as possible so that a concurrent submission
    /// from the same account is less likely to collide with it.
    pub async fn submit(
        &self,
        call_data: Bytes,
        quote: &FeeQuote,
    ) -> Result<TransactionReceipt, PipelineError> {
        let issuer = self.config.issuer_address;
        let contract = self.config.contract_address;

        let request = CallRequest::new(contract, call_data.clone()).with_sender(issuer);
        let gas_limit = self
            .client
            .estimate_gas(&request)
            .await
            .map_err(|e| PipelineError::GasEstimation(e.to_string()))?;

        let balance = self
            .client
            .balance(issuer)
            .await
            .map_err(|e| PipelineError::Network(format!("failed to read issuer balance: {e}")))?;
        let check = ensure_sufficient_balance(issuer, balance, gas_limit, quote)?;
        debug!(
            gas_limit,
            strategy = %quote.strategy,
            cost_eth = %format_ether(&check.cost),
            balance_eth = %format_ether(&check.balance),
            "balance covers quoted cost"
        );

        let chain_id = self.chain_id().await?;

        let nonce = self
            .client
            .pending_nonce(issuer)
            .await
            .map_err(|e| PipelineError::Network(format!("failed to read pending nonce: {e}")))?;

        let envelope = EnvelopeBuilder::new(issuer, contract)
            .data(call_data)
            .gas_limit(gas_limit)
            .nonce(nonce)
            .chain_id(chain_id)
            .fee_quote(quote)
            .build()
            .map_err(|e| PipelineError::Configuration(e.to_string()))?;

        let signed = {
            let key = IssuerKey::from_hex_for(self.config.issuer_secret.expose(), issuer)
                .map_err(|e| PipelineError::Configuration(format!("issuer key: {e}")))?;
            sign_envelope(&envelope, &key)
                .map_err(|e| PipelineError::Configuration(format!("signing failed: {e}")))?
        };

        let tx_hash = self
            .client
            .send_raw_transaction(&signed.raw)
            .await
            .map_err(|e| {
                if e.is_insufficient_funds() {
                    PipelineError::Network(format!(
                        "node rejected the transaction for insufficient funds in {issuer}: {e}"
                    ))
                } else {
                    PipelineError::Network(format!("broadcast failed: {e}"))
                }
            })?;
        if tx_hash != signed.hash {
            warn!(
                node_hash = %tx_hash,
                local_hash = %signed.hash,
                "node reported a different transaction hash than computed locally"
            );
        }

        info!(
            %tx_hash,
            nonce,
            format = %envelope.format(),
            price_ceiling_gwei = %format_gwei(&envelope.fee.price_ceiling()),
            "issuance transaction broadcast"
        );

        self.wait_for_receipt(tx_hash).await
    }

    async fn chain_id(&self) -> Result<u64, PipelineError> {
        match self.config.chain_id {
            Some(id) => Ok(id),
            None => self
                .client
                .chain_id()
                .await
                .map_err(|e| PipelineError::Network(format!("failed to read chain id: {e}"))),
        }
    }

    /// Polls for the receipt until it appears or the confirmation timeout
    /// elapses. A poll that errors aborts the wait; the transaction itself
    /// may still be mined.
    pub async fn wait_for_receipt(&self, tx_hash: B256) -> Result<TransactionReceipt, PipelineError> {
        let timeout = self.config.confirmation_timeout;
        let interval = self.config.receipt_poll_interval.max(Duration::from_millis(1));
        let deadline = Instant::now().checked_add(timeout).ok_or_else(|| {
            PipelineError::Configuration(format!(
                "confirmation timeout of {}s is out of range",
                timeout.as_secs()
            ))
        })?;

        loop {
            let polled = self.client.transaction_receipt(tx_hash).await.map_err(|e| {
                PipelineError::Network(format!(
                    "failed to fetch receipt for {tx_hash}; it may still be mined: {e}"
                ))
            })?;
            if let Some(receipt) = polled {
                info!(
                    %tx_hash,
                    block = receipt.block_number,
                    gas_used = receipt.gas_used,
                    logs = receipt.logs.len(),
                    "issuance transaction mined"
                );
                return Ok(receipt);
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(PipelineError::Network(format!(
                    "transaction {tx_hash} was not mined within {}s; it may still be \
                     pending, check it before resubmitting",
                    timeout.as_secs()
                )));
            }
            sleep(interval.min(deadline - now)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IssuerSecret;
    use crate::network::mock::MockLedger;
    use crate::network::{RpcClientError, RpcError, RpcMethod};
    use crate::transaction::receipt::StatusValue;
    use crate::transaction::signing::decode_signed_transaction;
    use crate::transaction::types::TxFormat;
    use alloy_primitives::U256;
    use std::collections::BTreeMap;

    const DEV_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const DEV_ADDRESS: &str = "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266";
    const CONTRACT: &str = "0x5FbDB2315678afecb367f032d93F642f64180aa3";

    fn config() -> LedgerConfig {
        LedgerConfig::new(
            "http://127.0.0.1:8545",
            CONTRACT,
            DEV_ADDRESS,
            IssuerSecret::new(DEV_KEY),
        )
        .unwrap()
        .with_confirmation_timeout(Duration::from_secs(3))
        .with_receipt_poll_interval(Duration::from_millis(100))
    }

    fn mined(hash: B256) -> TransactionReceipt {
        TransactionReceipt {
            status: Some(StatusValue::Text("0x1".into())),
            transaction_hash: hash,
            block_number: 101,
            logs: vec![],
            events: BTreeMap::new(),
            gas_used: Some(80_000),
        }
    }

    fn quote() -> FeeQuote {
        FeeQuote::dynamic(U256::from(1_000_000_000u64))
    }

    #[tokio::test]
    async fn happy_path_signs_with_pending_nonce_and_chain_id() {
        let hash = B256::repeat_byte(0xab);
        let ledger = MockLedger::new()
            .with_nonce(5)
            .with_receipts(vec![None, Some(mined(hash))]);
        let cfg = config();

        let receipt = TransactionSubmitter::new(&ledger, &cfg)
            .submit(Bytes::from_static(&[0x12, 0x34]), &quote())
            .await
            .unwrap();
        assert_eq!(receipt.block_number, 101);
        assert_eq!(ledger.calls("eth_getTransactionReceipt"), 2);
        assert_eq!(ledger.calls("eth_chainId"), 1);

        let sent = ledger.sent_transactions();
        let decoded = decode_signed_transaction(&sent[0]).unwrap();
        assert_eq!(decoded.envelope.nonce, 5);
        assert_eq!(decoded.envelope.chain_id, 1337);
        assert_eq!(decoded.envelope.gas_limit, 100_000);
        assert_eq!(decoded.envelope.format(), TxFormat::Eip1559);
        assert_eq!(decoded.envelope.from, cfg.issuer_address);
    }

    #[tokio::test]
    async fn configured_chain_id_skips_the_query() {
        let hash = B256::repeat_byte(0xab);
        let ledger = MockLedger::new().with_receipts(vec![Some(mined(hash))]);
        let cfg = config().with_chain_id(31337);
        TransactionSubmitter::new(&ledger, &cfg)
            .submit(Bytes::new(), &quote())
            .await
            .unwrap();
        assert_eq!(ledger.calls("eth_chainId"), 0);
        let decoded = decode_signed_transaction(&ledger.sent_transactions()[0]).unwrap();
        assert_eq!(decoded.envelope.chain_id, 31337);
    }

    #[tokio::test]
    async fn failed_estimate_stops_before_nonce_and_broadcast() {
        let ledger = MockLedger::new().with_estimate(Err(RpcClientError::Rpc {
            method: RpcMethod::EstimateGas,
            error: RpcError::execution_reverted(),
        }));
        let cfg = config();
        let err = TransactionSubmitter::new(&ledger, &cfg)
            .submit(Bytes::new(), &quote())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::GasEstimation(_)));
        assert_eq!(ledger.calls("eth_getTransactionCount"), 0);
        assert_eq!(ledger.calls("eth_sendRawTransaction"), 0);
    }

    #[tokio::test]
    async fn underfunded_issuer_never_broadcasts() {
        let ledger = MockLedger::new().with_balance(U256::from(1_000u64));
        let cfg = config();
        let err = TransactionSubmitter::new(&ledger, &cfg)
            .submit(Bytes::new(), &quote())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::InsufficientFunds { .. }));
        assert_eq!(ledger.calls("eth_sendRawTransaction"), 0);
    }

    #[tokio::test]
    async fn key_for_another_account_is_a_configuration_error() {
        let ledger = MockLedger::new();
        let mut cfg = config();
        cfg.issuer_secret = IssuerSecret::new(format!("0x{}", "11".repeat(32)));
        let err = TransactionSubmitter::new(&ledger, &cfg)
            .submit(Bytes::new(), &quote())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Configuration(_)));
        assert!(!err.to_string().contains(&"11".repeat(32)));
        assert_eq!(ledger.calls("eth_sendRawTransaction"), 0);
    }

    #[tokio::test]
    async fn node_insufficient_funds_rejection_is_named() {
        let ledger = MockLedger::new().with_send(Err(RpcClientError::Rpc {
            method: RpcMethod::SendRawTransaction,
            error: RpcError::server_error("insufficient funds for gas * price + value"),
        }));
        let cfg = config();
        let err = TransactionSubmitter::new(&ledger, &cfg)
            .submit(Bytes::new(), &quote())
            .await
            .unwrap_err();
        match err {
            PipelineError::Network(msg) => assert!(msg.contains("insufficient funds"), "{msg}"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn confirmation_timeout_reports_the_hash() {
        let ledger = MockLedger::new();
        let cfg = config();
        let err = TransactionSubmitter::new(&ledger, &cfg)
            .submit(Bytes::new(), &quote())
            .await
            .unwrap_err();
        match err {
            PipelineError::Network(msg) => {
                assert!(msg.contains(&B256::repeat_byte(0xab).to_string()), "{msg}");
                assert!(msg.contains("not mined within 3s"), "{msg}");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(ledger.calls("eth_getTransactionReceipt") >= 30);
    }

    #[tokio::test]
    async fn unrepresentable_confirmation_timeout_is_a_configuration_error() {
        let ledger = MockLedger::new();
        let cfg = config().with_confirmation_timeout(Duration::MAX);
        let err = TransactionSubmitter::new(&ledger, &cfg)
            .wait_for_receipt(B256::repeat_byte(0xab))
            .await
            .unwrap_err();
        match err {
            PipelineError::Configuration(msg) => assert!(msg.contains("out of range"), "{msg}"),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(ledger.calls("eth_getTransactionReceipt"), 0);
    }
}
