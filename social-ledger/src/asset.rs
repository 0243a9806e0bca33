//! Ledger asset amounts.
//!
//! The ledger serialises every amount as a string holding a decimal value followed by its
//! symbol, eg/ `"1.234 STEEM"` or `"25000.000000 VESTS"`.

use crate::error::LedgerError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use smol_str::SmolStr;
use std::str::FromStr;

/// Parsed ledger amount.
///
/// `precision` is the number of decimals the amount is written with. It only affects
/// formatting, two assets compare equal on amount and symbol alone.
#[derive(Clone, Debug)]
pub struct Asset {
    pub amount: f64,
    pub symbol: SmolStr,
    pub precision: usize,
}

/// Decimals the ledger writes liquid amounts with.
pub const TOKEN_PRECISION: usize = 3;

/// Decimals the ledger writes vesting share amounts with.
pub const VESTS_PRECISION: usize = 6;

impl Asset {
    /// Amount written with the ledger's precision for `symbol`.
    pub fn new(amount: f64, symbol: impl Into<SmolStr>) -> Self {
        let symbol = symbol.into();
        let precision = match symbol.as_str() {
            "VESTS" | "GESTS" => VESTS_PRECISION,
            _ => TOKEN_PRECISION,
        };
        Self {
            amount,
            symbol,
            precision,
        }
    }

    pub fn with_precision(mut self, precision: usize) -> Self {
        self.precision = precision;
        self
    }
}

impl std::fmt::Display for Asset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.*} {}", self.precision, self.amount, self.symbol)
    }
}

impl PartialEq for Asset {
    fn eq(&self, other: &Self) -> bool {
        self.amount == other.amount && self.symbol == other.symbol
    }
}

impl PartialOrd for Asset {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        match self.amount.partial_cmp(&other.amount) {
            Some(std::cmp::Ordering::Equal) => self.symbol.partial_cmp(&other.symbol),
            ordering => ordering,
        }
    }
}

impl FromStr for Asset {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split_whitespace();
        let (Some(raw_amount), symbol, None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(LedgerError::InvalidAsset(s.to_string()));
        };

        let amount = raw_amount
            .parse::<f64>()
            .ok()
            .filter(|amount| amount.is_finite())
            .ok_or_else(|| LedgerError::InvalidAsset(s.to_string()))?;

        let precision = raw_amount
            .split_once('.')
            .map_or(0, |(_, decimals)| decimals.len());

        Ok(Self::new(amount, symbol.unwrap_or_default()).with_precision(precision))
    }
}

impl Serialize for Asset {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Asset {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Parse the numeric part of a ledger amount string, ignoring its symbol.
pub fn parse_amount(raw: &str) -> Result<f64, LedgerError> {
    raw.parse::<Asset>().map(|asset| asset.amount)
}

/// Deserialise an integer the ledger may encode either as a JSON number or as a string
/// (large values such as reputation and rshares are strings).
pub(crate) fn de_i64_lenient<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().map(|value| value as i64))
            .ok_or_else(|| serde::de::Error::custom(format!("invalid integer: {number}"))),
        serde_json::Value::String(raw) => {
            raw.trim().parse::<i64>().map_err(serde::de::Error::custom)
        }
        other => Err(serde::de::Error::custom(format!("invalid integer: {other}"))),
    }
}

/// Deserialise a potentially huge unsigned integer (eg/ `total_reward_shares2`, which
/// exceeds `u64`) into an `f64`.
pub(crate) fn de_f64_lenient<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Number(number) => number
            .as_f64()
            .ok_or_else(|| serde::de::Error::custom(format!("invalid number: {number}"))),
        serde_json::Value::String(raw) => {
            raw.trim().parse::<f64>().map_err(serde::de::Error::custom)
        }
        other => Err(serde::de::Error::custom(format!("invalid number: {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_asset() {
        struct TestCase {
            input: &'static str,
            expected: Result<Asset, LedgerError>,
        }

        let tests = vec![
            TestCase {
                // TC0: token amount
                input: "1.234 STEEM",
                expected: Ok(Asset::new(1.234, "STEEM")),
            },
            TestCase {
                // TC1: vesting amount
                input: "25000.000000 GESTS",
                expected: Ok(Asset::new(25000.0, "GESTS")),
            },
            TestCase {
                // TC2: bare amount without symbol
                input: "0.508",
                expected: Ok(Asset::new(0.508, "")),
            },
            TestCase {
                // TC3: not a number
                input: "abc SBD",
                expected: Err(LedgerError::InvalidAsset("abc SBD".to_string())),
            },
            TestCase {
                // TC4: empty
                input: "",
                expected: Err(LedgerError::InvalidAsset("".to_string())),
            },
            TestCase {
                // TC5: trailing garbage
                input: "1.000 SBD extra",
                expected: Err(LedgerError::InvalidAsset("1.000 SBD extra".to_string())),
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = test.input.parse::<Asset>();
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_asset_keeps_written_precision() {
        struct TestCase {
            input: &'static str,
            expected: &'static str,
        }

        let tests = vec![
            TestCase {
                // TC0: trailing zeros survive
                input: "1.000 STEEM",
                expected: "\"1.000 STEEM\"",
            },
            TestCase {
                // TC1: vesting precision
                input: "25000.000000 VESTS",
                expected: "\"25000.000000 VESTS\"",
            },
            TestCase {
                // TC2: integer amount
                input: "42 SBD",
                expected: "\"42 SBD\"",
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let asset = test.input.parse::<Asset>().unwrap();
            let actual = serde_json::to_string(&asset).unwrap();
            assert_eq!(actual, test.expected, "TC{} failed", index);

            let round_trip: Asset = serde_json::from_str(&actual).unwrap();
            assert_eq!(round_trip.precision, asset.precision, "TC{} failed", index);
        }

        assert_eq!(Asset::new(0.5, "GBG").to_string(), "0.500 GBG");
        assert_eq!(Asset::new(2.0, "GESTS").to_string(), "2.000000 GESTS");
    }

    #[test]
    fn test_de_lenient_integers() {
        #[derive(Deserialize)]
        struct Wrapper {
            #[serde(deserialize_with = "de_i64_lenient")]
            reputation: i64,
            #[serde(deserialize_with = "de_f64_lenient")]
            shares2: f64,
        }

        let wrapper: Wrapper = serde_json::from_str(
            r#"{"reputation": "-1234567890",
                "shares2": "340282366920938463463374607431768211455"}"#,
        )
        .unwrap();
        assert_eq!(wrapper.reputation, -1_234_567_890);
        assert!(wrapper.shares2 > 3.4e38);

        let wrapper: Wrapper = serde_json::from_str(r#"{"reputation": 42, "shares2": 7}"#).unwrap();
        assert_eq!(wrapper.reputation, 42);
        assert_eq!(wrapper.shares2, 7.0);
    }
}
