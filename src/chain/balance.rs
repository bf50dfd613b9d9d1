//! Multi-denomination account balances

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{Error, Result};

/// A single coin as the SDK serializes it (amount is a decimal string)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coin {
    pub denom: String,
    pub amount: String,
}

impl Coin {
    pub fn new(denom: impl Into<String>, amount: impl ToString) -> Self {
        Self {
            denom: denom.into(),
            amount: amount.to_string(),
        }
    }
}

/// Largest amount a balance holds per denomination, so any two balances
/// differ by a value that fits in `i128`
pub const MAX_AMOUNT: u128 = i128::MAX as u128;

/// Balance of one account, keyed by denomination in smallest units.
///
/// Denominations with a zero amount are never stored, so an absent
/// denomination and a zero one are the same thing. No amount exceeds
/// [`MAX_AMOUNT`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "Vec<Coin>", try_from = "Vec<Coin>")]
pub struct Balance {
    coins: BTreeMap<String, u128>,
}

impl Balance {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a list of SDK coins. Repeated denominations are summed.
    pub fn from_coins(coins: &[Coin]) -> Result<Self> {
        let mut balance = Self::new();
        for coin in coins {
            let amount = parse_amount(&coin.amount).map_err(|e| {
                Error::Serialization(format!("Invalid amount for {}: {}", coin.denom, e))
            })?;
            balance.credit(&coin.denom, amount)?;
        }
        Ok(balance)
    }

    /// Add `amount` of `denom` to the balance
    pub fn credit(&mut self, denom: &str, amount: u128) -> Result<()> {
        if denom.is_empty() {
            return Err(Error::Serialization("Empty denomination".to_string()));
        }
        if amount == 0 {
            return Ok(());
        }
        let total = self
            .amount_of(denom)
            .checked_add(amount)
            .filter(|total| *total <= MAX_AMOUNT)
            .ok_or_else(|| {
                Error::Serialization(format!("Amount of {} exceeds {}", denom, MAX_AMOUNT))
            })?;
        self.coins.insert(denom.to_string(), total);
        Ok(())
    }

    /// Amount held of `denom` (zero when absent)
    pub fn amount_of(&self, denom: &str) -> u128 {
        self.coins.get(denom).copied().unwrap_or(0)
    }

    pub fn denoms(&self) -> impl Iterator<Item = &str> {
        self.coins.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u128)> {
        self.coins.iter().map(|(d, a)| (d.as_str(), *a))
    }

    pub fn len(&self) -> usize {
        self.coins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coins.is_empty()
    }

    pub fn to_coins(&self) -> Vec<Coin> {
        self.iter().map(|(denom, amount)| Coin::new(denom, amount)).collect()
    }
}

impl<S: Into<String>> FromIterator<(S, u128)> for Balance {
    /// Totals saturate at [`MAX_AMOUNT`]
    fn from_iter<I: IntoIterator<Item = (S, u128)>>(iter: I) -> Self {
        let mut coins = BTreeMap::new();
        for (denom, amount) in iter {
            if amount > 0 {
                let entry = coins.entry(denom.into()).or_insert(0u128);
                *entry = entry.saturating_add(amount).min(MAX_AMOUNT);
            }
        }
        Self { coins }
    }
}

impl From<Balance> for Vec<Coin> {
    fn from(balance: Balance) -> Self {
        balance.to_coins()
    }
}

impl TryFrom<Vec<Coin>> for Balance {
    type Error = Error;

    fn try_from(coins: Vec<Coin>) -> Result<Self> {
        Balance::from_coins(&coins)
    }
}

/// SDK string form: `1000uatom,50uosmo`
impl fmt::Display for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .iter()
            .map(|(denom, amount)| format!("{}{}", amount, denom))
            .collect();
        write!(f, "{}", parts.join(","))
    }
}

/// Parse a non-negative integer amount as the SDK encodes it
pub fn parse_amount(raw: &str) -> std::result::Result<u128, String> {
    let raw = raw.trim();
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(format!("'{}' is not a non-negative integer", raw));
    }
    raw.parse::<u128>().map_err(|e| format!("'{}': {}", raw, e))
}
