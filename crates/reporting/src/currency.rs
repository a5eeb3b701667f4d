//! Currency normalization against a static, versioned rate table.

use campaign_core::config::CurrencyConfig;
use campaign_core::error::{CampaignError, CampaignResult};
use std::collections::BTreeMap;

/// USD conversion table. Codes are matched case-insensitively.
#[derive(Debug, Clone)]
pub struct CurrencyTable {
    version: String,
    /// Upper-cased code -> USD per unit.
    rates: BTreeMap<String, f64>,
}

impl CurrencyTable {
    pub fn new(config: &CurrencyConfig) -> Self {
        let rates = config
            .rates
            .iter()
            .map(|(code, rate)| (code.trim().to_ascii_uppercase(), *rate))
            .collect();
        Self {
            version: config.version.clone(),
            rates,
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Convert `amount` to USD. An unknown code is an error; it is never
    /// treated as USD.
    pub fn to_usd(&self, amount: f64, currency: &str) -> CampaignResult<f64> {
        let code = currency.trim().to_ascii_uppercase();
        match self.rates.get(&code) {
            Some(rate) => Ok(amount * rate),
            None => Err(CampaignError::UnknownCurrency {
                code: currency.to_string(),
                table_version: self.version.clone(),
            }),
        }
    }
}

impl Default for CurrencyTable {
    fn default() -> Self {
        Self::new(&CurrencyConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_cny_conversion() {
        let table = CurrencyTable::default();
        let usd = table.to_usd(100.0, "cny").unwrap();
        assert!((usd - 14.0).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_currency_is_error() {
        let table = CurrencyTable::default();
        match table.to_usd(10.0, "XYZ") {
            Err(CampaignError::UnknownCurrency { code, table_version }) => {
                assert_eq!(code, "XYZ");
                assert_eq!(table_version, table.version());
            }
            other => panic!("expected UnknownCurrency, got {:?}", other),
        }
        assert!(table.to_usd(10.0, "").is_err());
    }

    proptest! {
        #[test]
        fn usd_is_identity(amount in -1.0e9f64..1.0e9) {
            let table = CurrencyTable::default();
            prop_assert_eq!(table.to_usd(amount, "USD").unwrap(), amount);
        }

        #[test]
        fn conversion_is_monotonic(a in 0.0f64..1.0e7, b in 0.0f64..1.0e7) {
            let table = CurrencyTable::default();
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(table.to_usd(lo, "CNY").unwrap() <= table.to_usd(hi, "CNY").unwrap());
        }
    }
}
