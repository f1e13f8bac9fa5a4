//! ABI bindings for the `CredentialRegistry` contract.
//!
//! Generated at compile time by `sol!`, so selectors, event topics, and
//! encodings are derived from the Solidity signatures below and cannot
//! drift from them.

use alloy_sol_types::sol;

sol! {
    #![sol(all_derives)]

    interface ICredentialRegistry {
        event CredentialIssued(bytes32 indexed credentialId, string studentId);

        function admin() external view returns (address);

        function authorizedIssuers(address issuer) external view returns (bool);

        function authorizeIssuer(address issuer) external;

        function issueCredential(
            string studentId,
            string studentName,
            string degree,
            string major,
            string ipfsHash
        ) external returns (bytes32);

        function verifyCredential(bytes32 credentialId)
            external
            view
            returns (
                string studentName,
                string degree,
                string major,
                uint256 issueDate,
                bool isValid
            );
    }
}

pub use ICredentialRegistry::{
    adminCall, authorizeIssuerCall, authorizedIssuersCall, issueCredentialCall,
    verifyCredentialCall, CredentialIssued,
};
