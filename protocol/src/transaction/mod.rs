//! # Transaction Module
//!
//! Construction, signing, submission, and receipt interpretation for the
//! registry's state-changing calls.
//!
//! ## Architecture
//!
//! ```text
//! types.rs      — Envelope format and fee field vocabulary (TxFormat, FeeFields)
//! builder.rs    — Fluent EnvelopeBuilder for unsigned envelopes and their signing hashes
//! signing.rs    — secp256k1 signing, raw encoding, and raw decoding with sender recovery
//! submitter.rs  — Gas estimate, balance guard, nonce, broadcast, and confirmation wait
//! receipt.rs    — Receipt shapes and status normalisation
//! ```
//!
//! ## Transaction Lifecycle
//!
//! 1. **Estimate** — `eth_estimateGas` from the issuer; the result is the gas limit.
//! 2. **Guard** — the balance must cover the worst-case cost plus buffer.
//! 3. **Build** — [`EnvelopeBuilder`] with the pending nonce and chain id.
//! 4. **Sign** — [`sign_envelope`] with the issuer key, parsed just in time.
//! 5. **Broadcast** — `eth_sendRawTransaction`.
//! 6. **Confirm** — poll for the receipt, then [`interpret_receipt_status`].
//!
//! ## Design Decisions
//!
//! - All amounts are `U256` wei. Gwei and ether exist only in log output.
//! - Value is always zero; the registry is not payable.
//! - Nothing is retried. A resubmission after an ambiguous failure could
//!   issue the same credential twice.

pub mod builder;
pub mod receipt;
pub mod signing;
pub mod submitter;
pub mod types;

pub use builder::{EnvelopeBuilder, EnvelopeError, TransactionEnvelope};
pub use receipt::{
    interpret_receipt_status, DecodedEvent, LogEntry, ReceiptStatus, StatusValue,
    TransactionReceipt,
};
pub use signing::{decode_signed_transaction, sign_envelope, SignedTransaction, TxDecodeError};
pub use submitter::TransactionSubmitter;
pub use types::{FeeFields, TxFormat};
