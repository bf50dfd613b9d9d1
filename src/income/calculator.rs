//! Per-denomination income between two balance snapshots

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::chain::balance::{Balance, Coin};
use crate::error::{Error, Result};

/// Signed change per denomination (smallest units).
///
/// Negative entries are legitimate: the same account may have paid fees or
/// moved funds between the two snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "Vec<Coin>", try_from = "Vec<Coin>")]
pub struct Income {
    deltas: BTreeMap<String, i128>,
}

impl Income {
    /// Delta for `denom` (zero when the denomination was never seen)
    pub fn delta_of(&self, denom: &str) -> i128 {
        self.deltas.get(denom).copied().unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, i128)> {
        self.deltas.iter().map(|(d, v)| (d.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.deltas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deltas.is_empty()
    }

    /// True when every delta is zero
    pub fn is_zero(&self) -> bool {
        self.deltas.values().all(|v| *v == 0)
    }

    /// Same denominations with every delta negated
    pub fn negated(&self) -> Income {
        Income {
            deltas: self.deltas.iter().map(|(d, v)| (d.clone(), -v)).collect(),
        }
    }
}

impl<S: Into<String>> FromIterator<(S, i128)> for Income {
    fn from_iter<I: IntoIterator<Item = (S, i128)>>(iter: I) -> Self {
        Income {
            deltas: iter.into_iter().map(|(d, v)| (d.into(), v)).collect(),
        }
    }
}

impl From<Income> for Vec<Coin> {
    fn from(income: Income) -> Self {
        income.iter().map(|(denom, delta)| Coin::new(denom, delta)).collect()
    }
}

impl TryFrom<Vec<Coin>> for Income {
    type Error = Error;

    fn try_from(coins: Vec<Coin>) -> Result<Self> {
        let mut deltas = BTreeMap::new();
        for coin in coins {
            let delta = coin.amount.trim().parse::<i128>().map_err(|e| {
                Error::Serialization(format!("Invalid income amount for {}: {}", coin.denom, e))
            })?;
            deltas.insert(coin.denom, delta);
        }
        Ok(Income { deltas })
    }
}

impl fmt::Display for Income {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .iter()
            .map(|(denom, delta)| format!("{}{}", delta, denom))
            .collect();
        write!(f, "{}", parts.join(","))
    }
}

/// Income from `before` to `after`: `after[d] - before[d]` for every
/// denomination present in either snapshot, missing amounts counting as zero.
pub fn calculate_income(before: &Balance, after: &Balance) -> Income {
    let mut deltas = BTreeMap::new();

    for denom in before.denoms().chain(after.denoms()) {
        if deltas.contains_key(denom) {
            continue;
        }
        let delta = signed(after.amount_of(denom)) - signed(before.amount_of(denom));
        deltas.insert(denom.to_string(), delta);
    }

    Income { deltas }
}

/// Balances never hold more than `i128::MAX`, so this is exact
fn signed(amount: u128) -> i128 {
    i128::try_from(amount).unwrap_or(i128::MAX)
}
