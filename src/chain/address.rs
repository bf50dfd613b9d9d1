//! Bech32 address validation
//!
//! Prefixes are always passed in by the caller, so networks with different
//! prefixes can be validated side by side without shared state.

use bech32::Hrp;

use crate::error::{Error, Result};

/// Suffix the SDK appends to the account prefix for operator addresses
const VALOPER_SUFFIX: &str = "valoper";

/// Byte lengths accepted for an address payload (regular and module accounts)
const VALID_PAYLOAD_LENGTHS: [usize; 2] = [20, 32];

/// Role an address plays in a withdrawal, used for error messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressRole {
    Granter,
    Grantee,
    FeePayer,
    Validator,
}

impl std::fmt::Display for AddressRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AddressRole::Granter => write!(f, "granter"),
            AddressRole::Grantee => write!(f, "grantee"),
            AddressRole::FeePayer => write!(f, "fee payer"),
            AddressRole::Validator => write!(f, "validator"),
        }
    }
}

/// Operator address prefix for an account prefix (`cosmos` -> `cosmosvaloper`)
pub fn validator_prefix(account_prefix: &str) -> String {
    format!("{}{}", account_prefix, VALOPER_SUFFIX)
}

/// Validate that `address` is well-formed bech32 with the human-readable
/// part `expected_prefix`.
pub fn validate(address: &str, expected_prefix: &str) -> Result<()> {
    let expected = Hrp::parse(expected_prefix).map_err(|e| {
        Error::TransactionBuild(format!("Invalid address prefix '{}': {}", expected_prefix, e))
    })?;

    let (hrp, payload) = bech32::decode(address)
        .map_err(|e| Error::TransactionBuild(format!("Invalid bech32 address '{}': {}", address, e)))?;

    if !hrp.as_str().eq_ignore_ascii_case(expected.as_str()) {
        return Err(Error::TransactionBuild(format!(
            "Address '{}' has prefix '{}', expected '{}'",
            address,
            hrp.as_str(),
            expected.as_str()
        )));
    }

    if !VALID_PAYLOAD_LENGTHS.contains(&payload.len()) {
        return Err(Error::TransactionBuild(format!(
            "Address '{}' has a {}-byte payload, expected 20 or 32",
            address,
            payload.len()
        )));
    }

    Ok(())
}

/// Validate an address for the given role on a network with `account_prefix`
pub fn validate_role(address: &str, role: AddressRole, account_prefix: &str) -> Result<()> {
    let prefix = match role {
        AddressRole::Validator => validator_prefix(account_prefix),
        _ => account_prefix.to_string(),
    };

    validate(address, &prefix).map_err(|e| match e {
        Error::TransactionBuild(msg) => Error::TransactionBuild(format!("{}: {}", role, msg)),
        other => other,
    })
}
