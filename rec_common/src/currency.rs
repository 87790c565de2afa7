use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

pub const DEFAULT_CURRENCY_CODE: &str = "USD";

//--------------------------------------     CurrencyCode       -------------------------------------------------------
/// An ISO-4217 style currency code. Always stored in upper case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(try_from = "String", into = "String")]
pub struct CurrencyCode(String);

#[derive(Debug, Clone, Error)]
#[error("Invalid currency code: {0}")]
pub struct CurrencyCodeError(String);

impl CurrencyCode {
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Default for CurrencyCode {
    fn default() -> Self {
        Self(DEFAULT_CURRENCY_CODE.to_string())
    }
}

impl FromStr for CurrencyCode {
    type Err = CurrencyCodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim();
        if code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic()) {
            Ok(Self(code.to_ascii_uppercase()))
        } else {
            Err(CurrencyCodeError(s.to_string()))
        }
    }
}

impl TryFrom<String> for CurrencyCode {
    type Error = CurrencyCodeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CurrencyCode> for String {
    fn from(value: CurrencyCode) -> Self {
        value.0
    }
}

impl Display for CurrencyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_currency_codes() {
        assert_eq!("usd".parse::<CurrencyCode>().unwrap().as_str(), "USD");
        assert_eq!(" Eur ".parse::<CurrencyCode>().unwrap().as_str(), "EUR");
        assert!("dollars".parse::<CurrencyCode>().is_err());
        assert!("U5D".parse::<CurrencyCode>().is_err());
        assert_eq!(CurrencyCode::default().as_str(), DEFAULT_CURRENCY_CODE);
    }

    #[test]
    fn serde_round_trip_is_validated() {
        let code: CurrencyCode = serde_json::from_str("\"zar\"").unwrap();
        assert_eq!(code.to_string(), "ZAR");
        assert!(serde_json::from_str::<CurrencyCode>("\"rand\"").is_err());
    }
}
