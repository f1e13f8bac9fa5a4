//! # Credential Registry Contract
//!
//! An executable model of the `CredentialRegistry` Solidity contract the
//! pipeline talks to. It exists so the whole issuance path can run against
//! a ledger that behaves like the real deployment without a real node.
//!
//! ## Rules
//!
//! - The deployer becomes `admin` and is authorized from the start.
//! - Only the admin can authorize further issuers.
//! - Only authorized issuers can issue.
//! - Each issuance gets a fresh identifier:
//!   `keccak256(issuer ‖ studentId ‖ ipfsHash ‖ timestamp ‖ sequence)`.
//!   The sequence number keeps two identical requests in one block apart.
//! - `verifyCredential` reverts for identifiers it has never issued.
//!
//! Calls arrive as ABI-encoded calldata through [`CredentialRegistry::execute`],
//! the same bytes the pipeline signs and broadcasts.

use std::collections::{HashMap, HashSet};

use alloy_primitives::{Address, Bytes, B256, U256};
use alloy_sol_types::{SolInterface, SolValue};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use credchain_protocol::contract::abi::ICredentialRegistry::ICredentialRegistryCalls;
use credchain_protocol::contract::abi::{issueCredentialCall, CredentialIssued};
use credchain_protocol::crypto::keccak_concat;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Reasons the registry reverts.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// A privileged call from someone other than the admin.
    #[error("only admin: {caller} is not {admin}")]
    NotAdmin {
        /// Account that made the call.
        caller: Address,
        /// The registry's admin.
        admin: Address,
    },

    /// `issueCredential` from an account that was never authorized.
    #[error("not authorized: {0} cannot issue credentials")]
    NotAuthorized(Address),

    /// `verifyCredential` for an identifier the registry never issued.
    #[error("credential does not exist: {0}")]
    UnknownCredential(B256),

    /// Calldata that matches no function in the interface.
    #[error("unrecognised calldata: {0}")]
    BadCalldata(String),
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// One stored credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRecord {
    pub student_id: String,
    pub student_name: String,
    pub degree: String,
    pub major: String,
    /// Content address of the credential document.
    pub ipfs_hash: String,
    /// Account that issued it.
    pub issuer: Address,
    /// Block timestamp of issuance, unix seconds.
    pub issue_date: u64,
    pub is_valid: bool,
}

/// Effects of one successful call.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Execution {
    /// ABI-encoded return data.
    pub output: Bytes,
    /// Events emitted, in order.
    pub events: Vec<CredentialIssued>,
    /// Execution cost on top of the intrinsic transaction cost.
    pub gas: u64,
}

// Execution gas by call. Rough figures for the Solidity build, close enough
// for estimates and balance checks to behave like the real thing.
const GAS_VIEW: u64 = 2_400;
const GAS_AUTHORIZE: u64 = 24_000;
const GAS_ISSUE_BASE: u64 = 110_000;
const GAS_PER_STORED_BYTE: u64 = 700;

/// In-memory `CredentialRegistry` state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialRegistry {
    admin: Address,
    authorized_issuers: HashSet<Address>,
    credentials: HashMap<B256, CredentialRecord>,
    sequence: u64,
}

impl CredentialRegistry {
    /// Deploys a registry administered by `admin`.
    pub fn deploy(admin: Address) -> Self {
        let mut authorized_issuers = HashSet::new();
        authorized_issuers.insert(admin);
        Self {
            admin,
            authorized_issuers,
            credentials: HashMap::new(),
            sequence: 0,
        }
    }

    pub fn admin(&self) -> Address {
        self.admin
    }

    pub fn is_authorized(&self, issuer: Address) -> bool {
        self.authorized_issuers.contains(&issuer)
    }

    /// Number of credentials issued so far.
    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }

    /// Adds `issuer` to the authorized list. Admin only.
    pub fn authorize_issuer(&mut self, caller: Address, issuer: Address) -> Result<(), RegistryError> {
        if caller != self.admin {
            return Err(RegistryError::NotAdmin {
                caller,
                admin: self.admin,
            });
        }
        self.authorized_issuers.insert(issuer);
        Ok(())
    }

    /// Stores a credential and returns its identifier with the emitted event.
    pub fn issue_credential(
        &mut self,
        caller: Address,
        call: issueCredentialCall,
        timestamp: u64,
    ) -> Result<(B256, CredentialIssued), RegistryError> {
        if !self.is_authorized(caller) {
            return Err(RegistryError::NotAuthorized(caller));
        }

        let id = keccak_concat(&[
            caller.as_slice(),
            call.studentId.as_bytes(),
            call.ipfsHash.as_bytes(),
            &timestamp.to_be_bytes(),
            &self.sequence.to_be_bytes(),
        ]);
        self.sequence += 1;

        let event = CredentialIssued {
            credentialId: id,
            studentId: call.studentId.clone(),
        };
        self.credentials.insert(
            id,
            CredentialRecord {
                student_id: call.studentId,
                student_name: call.studentName,
                degree: call.degree,
                major: call.major,
                ipfs_hash: call.ipfsHash,
                issuer: caller,
                issue_date: timestamp,
                is_valid: true,
            },
        );
        Ok((id, event))
    }

    pub fn verify_credential(&self, id: &B256) -> Result<&CredentialRecord, RegistryError> {
        self.credentials
            .get(id)
            .ok_or(RegistryError::UnknownCredential(*id))
    }

    /// Decodes `calldata` and runs the matching function as `caller` in a
    /// block stamped `timestamp`.
    ///
    /// State is only modified on success. Callers that need simulation
    /// (`eth_call`, `eth_estimateGas`) run this on a clone.
    pub fn execute(
        &mut self,
        caller: Address,
        calldata: &[u8],
        timestamp: u64,
    ) -> Result<Execution, RegistryError> {
        let call = ICredentialRegistryCalls::abi_decode(calldata, true)
            .map_err(|e| RegistryError::BadCalldata(e.to_string()))?;

        let execution = match call {
            ICredentialRegistryCalls::admin(_) => Execution {
                output: self.admin.abi_encode().into(),
                events: Vec::new(),
                gas: GAS_VIEW,
            },
            ICredentialRegistryCalls::authorizedIssuers(c) => Execution {
                output: self.is_authorized(c.issuer).abi_encode().into(),
                events: Vec::new(),
                gas: GAS_VIEW,
            },
            ICredentialRegistryCalls::authorizeIssuer(c) => {
                self.authorize_issuer(caller, c.issuer)?;
                Execution {
                    output: Bytes::new(),
                    events: Vec::new(),
                    gas: GAS_AUTHORIZE,
                }
            }
            ICredentialRegistryCalls::issueCredential(c) => {
                let stored = [&c.studentId, &c.studentName, &c.degree, &c.major, &c.ipfsHash]
                    .iter()
                    .map(|s| s.len() as u64)
                    .sum::<u64>();
                let (id, event) = self.issue_credential(caller, c, timestamp)?;
                Execution {
                    output: id.abi_encode().into(),
                    events: vec![event],
                    gas: GAS_ISSUE_BASE + stored * GAS_PER_STORED_BYTE,
                }
            }
            ICredentialRegistryCalls::verifyCredential(c) => {
                let record = self.verify_credential(&c.credentialId)?;
                let output = (
                    record.student_name.clone(),
                    record.degree.clone(),
                    record.major.clone(),
                    U256::from(record.issue_date),
                    record.is_valid,
                )
                    .abi_encode_params();
                Execution {
                    output: output.into(),
                    events: Vec::new(),
                    gas: GAS_VIEW,
                }
            }
        };
        Ok(execution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_sol_types::SolCall;
    use credchain_protocol::contract::abi::{authorizeIssuerCall, verifyCredentialCall};

    fn admin() -> Address {
        Address::repeat_byte(0xad)
    }

    fn university() -> Address {
        Address::repeat_byte(0x01)
    }

    fn issue_call(student: &str) -> issueCredentialCall {
        issueCredentialCall {
            studentId: student.into(),
            studentName: "John Doe".into(),
            degree: "Bachelor of Technology".into(),
            major: "Computer Science".into(),
            ipfsHash: "QmHash123".into(),
        }
    }

    #[test]
    fn admin_authorizes_issuer() {
        let mut registry = CredentialRegistry::deploy(admin());
        assert!(registry.is_authorized(admin()));
        assert!(!registry.is_authorized(university()));

        registry.authorize_issuer(admin(), university()).unwrap();
        assert!(registry.is_authorized(university()));
    }

    #[test]
    fn non_admin_cannot_authorize() {
        let mut registry = CredentialRegistry::deploy(admin());
        let err = registry
            .authorize_issuer(university(), university())
            .unwrap_err();
        assert!(matches!(err, RegistryError::NotAdmin { .. }));
    }

    #[test]
    fn unauthorized_issue_reverts_and_stores_nothing() {
        let mut registry = CredentialRegistry::deploy(admin());
        let err = registry
            .issue_credential(university(), issue_call("STU001"), 100)
            .unwrap_err();
        assert_eq!(err, RegistryError::NotAuthorized(university()));
        assert!(registry.is_empty());
    }

    #[test]
    fn identical_requests_get_distinct_ids() {
        let mut registry = CredentialRegistry::deploy(admin());
        let (a, _) = registry
            .issue_credential(admin(), issue_call("STU001"), 100)
            .unwrap();
        let (b, _) = registry
            .issue_credential(admin(), issue_call("STU001"), 100)
            .unwrap();
        assert_ne!(a, b);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn issued_event_names_the_credential() {
        let mut registry = CredentialRegistry::deploy(admin());
        let (id, event) = registry
            .issue_credential(admin(), issue_call("STU007"), 100)
            .unwrap();
        assert_eq!(event.credentialId, id);
        assert_eq!(event.studentId, "STU007");
        assert_eq!(registry.verify_credential(&id).unwrap().issue_date, 100);
    }

    #[test]
    fn execute_dispatches_calldata() {
        let mut registry = CredentialRegistry::deploy(admin());
        let auth = authorizeIssuerCall {
            issuer: university(),
        }
        .abi_encode();
        registry.execute(admin(), &auth, 1).unwrap();

        let issued = registry
            .execute(university(), &issue_call("STU002").abi_encode(), 50)
            .unwrap();
        let id = B256::abi_decode(&issued.output, true).unwrap();
        assert_eq!(issued.events.len(), 1);

        let verify = verifyCredentialCall { credentialId: id }.abi_encode();
        let out = registry.execute(Address::ZERO, &verify, 60).unwrap();
        let record = verifyCredentialCall::abi_decode_returns(&out.output, true).unwrap();
        assert_eq!(record.studentName, "John Doe");
        assert_eq!(record.issueDate, U256::from(50u64));
        assert!(record.isValid);
    }

    #[test]
    fn verify_unknown_reverts() {
        let mut registry = CredentialRegistry::deploy(admin());
        let verify = verifyCredentialCall {
            credentialId: B256::repeat_byte(7),
        }
        .abi_encode();
        assert_eq!(
            registry.execute(Address::ZERO, &verify, 1).unwrap_err(),
            RegistryError::UnknownCredential(B256::repeat_byte(7))
        );
    }

    #[test]
    fn garbage_calldata_is_rejected() {
        let mut registry = CredentialRegistry::deploy(admin());
        assert!(matches!(
            registry.execute(admin(), &[0xde, 0xad, 0xbe, 0xef], 1),
            Err(RegistryError::BadCalldata(_))
        ));
    }
}
