//! Authz withdrawal transaction building
//!
//! A harvest is one `MsgExec` carrying two distribution messages:
//! reward withdrawal for the granter's delegation and commission withdrawal
//! for the validator. The grantee executes it and the fee payer covers the
//! fee through a fee grant, so either both withdrawals land or neither does.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use crate::chain::address::{self, AddressRole};
use crate::chain::balance::Coin;
use crate::config::NetworkConfig;
use crate::error::{Error, Result};

pub const MSG_EXEC_TYPE_URL: &str = "/cosmos.authz.v1beta1.MsgExec";
pub const MSG_WITHDRAW_DELEGATOR_REWARD_TYPE_URL: &str =
    "/cosmos.distribution.v1beta1.MsgWithdrawDelegatorReward";
pub const MSG_WITHDRAW_VALIDATOR_COMMISSION_TYPE_URL: &str =
    "/cosmos.distribution.v1beta1.MsgWithdrawValidatorCommission";

/// Distribution messages executed on the granter's behalf
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "@type")]
pub enum DistributionMsg {
    #[serde(rename = "/cosmos.distribution.v1beta1.MsgWithdrawDelegatorReward")]
    WithdrawDelegatorReward {
        delegator_address: String,
        validator_address: String,
    },
    #[serde(rename = "/cosmos.distribution.v1beta1.MsgWithdrawValidatorCommission")]
    WithdrawValidatorCommission { validator_address: String },
}

/// `MsgExec` envelope: the grantee runs `msgs` under its authz grants
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgExec {
    #[serde(rename = "@type")]
    pub type_url: String,
    pub grantee: String,
    pub msgs: Vec<DistributionMsg>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxBody {
    pub messages: Vec<MsgExec>,
    pub memo: String,
    pub timeout_height: String,
    pub extension_options: Vec<serde_json::Value>,
    pub non_critical_extension_options: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fee {
    pub amount: Vec<Coin>,
    pub gas_limit: String,
    pub payer: String,
    /// Fee grant issuer; the fee is deducted from this account
    pub granter: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthInfo {
    pub signer_infos: Vec<serde_json::Value>,
    pub fee: Fee,
}

/// Unsigned transaction in the JSON layout `<binary> tx sign` accepts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsignedTx {
    pub body: TxBody,
    pub auth_info: AuthInfo,
    pub signatures: Vec<String>,
}

/// A validated, ready-to-sign withdrawal for one network
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WithdrawalTx {
    pub chain_id: String,
    pub granter: String,
    pub grantee: String,
    pub fee_payer: String,
    pub validator: String,
    pub tx: UnsignedTx,
}

impl WithdrawalTx {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.tx)?)
    }

    /// The inner distribution messages
    pub fn messages(&self) -> &[DistributionMsg] {
        self.tx
            .body
            .messages
            .first()
            .map(|exec| exec.msgs.as_slice())
            .unwrap_or(&[])
    }
}

/// Build the withdrawal for `network`.
///
/// Every participant address is checked against the network's prefix first;
/// nothing is composed if any of them is malformed.
pub fn build_withdrawal(network: &NetworkConfig) -> Result<WithdrawalTx> {
    let prefix = network.account_prefix.as_str();
    address::validate_role(&network.granter, AddressRole::Granter, prefix)?;
    address::validate_role(&network.grantee, AddressRole::Grantee, prefix)?;
    address::validate_role(&network.fee_payer, AddressRole::FeePayer, prefix)?;
    address::validate_role(&network.validator, AddressRole::Validator, prefix)?;

    if network.gas == 0 {
        return Err(Error::TransactionBuild("Gas limit must be positive".to_string()));
    }
    let fee_amount = parse_fee(&network.fees)?;

    let msgs = vec![
        DistributionMsg::WithdrawDelegatorReward {
            delegator_address: network.granter.clone(),
            validator_address: network.validator.clone(),
        },
        DistributionMsg::WithdrawValidatorCommission {
            validator_address: network.validator.clone(),
        },
    ];

    let exec = MsgExec {
        type_url: MSG_EXEC_TYPE_URL.to_string(),
        grantee: network.grantee.clone(),
        msgs,
    };

    let tx = UnsignedTx {
        body: TxBody {
            messages: vec![exec],
            memo: String::new(),
            timeout_height: "0".to_string(),
            extension_options: vec![],
            non_critical_extension_options: vec![],
        },
        auth_info: AuthInfo {
            signer_infos: vec![],
            fee: Fee {
                amount: fee_amount,
                gas_limit: network.gas.to_string(),
                payer: String::new(),
                granter: network.fee_payer.clone(),
            },
        },
        signatures: vec![],
    };

    Ok(WithdrawalTx {
        chain_id: network.chain_id.clone(),
        granter: network.granter.clone(),
        grantee: network.grantee.clone(),
        fee_payer: network.fee_payer.clone(),
        validator: network.validator.clone(),
        tx,
    })
}

fn coin_regex() -> &'static Regex {
    static COIN: OnceLock<Regex> = OnceLock::new();
    COIN.get_or_init(|| {
        Regex::new(r"^([0-9]+)([a-zA-Z][a-zA-Z0-9/:._-]{2,127})$").expect("valid coin regex")
    })
}

/// Parse an SDK coin string like `200uatom` or `200uatom,10uosmo`
pub fn parse_fee(fees: &str) -> Result<Vec<Coin>> {
    let mut coins = Vec::new();
    for part in fees.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let caps = coin_regex()
            .captures(part)
            .ok_or_else(|| Error::TransactionBuild(format!("Invalid fee coin '{}'", part)))?;
        coins.push(Coin::new(&caps[2], &caps[1]));
    }
    if coins.is_empty() {
        return Err(Error::TransactionBuild("Fee must contain at least one coin".to_string()));
    }
    Ok(coins)
}
