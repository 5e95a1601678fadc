//! Ledger monetary system
//!
//! Amounts are counted in indivisible base units. Users think in coins, so the
//! conversions below translate decimal coin strings to base units exactly,
//! without going through floating point.

use crate::error::{LedgerError, Result};

/// Amount of value, in base units
pub type Amount = u64;

/// Number of base units in one coin
pub const UNITS_PER_COIN: Amount = 100_000_000;

/// Number of fractional digits a coin amount may carry
pub const COIN_DECIMALS: usize = 8;

/// Default reward credited to the miner of a reward-mode block (50 coins)
pub const DEFAULT_MINING_REWARD: Amount = 50 * UNITS_PER_COIN;

/// Utility functions for monetary conversions
pub mod conversions {
    use super::*;

    /// Parse a positive decimal coin amount such as `"12.5"` into base units
    ///
    /// # Examples
    /// ```
    /// use fastchain::core::monetary::conversions::parse_coins;
    /// assert_eq!(parse_coins("1").unwrap(), 100_000_000);
    /// assert_eq!(parse_coins("0.5").unwrap(), 50_000_000);
    /// ```
    pub fn parse_coins(input: &str) -> Result<Amount> {
        let input = input.trim();
        let (whole, fraction) = match input.split_once('.') {
            Some((whole, fraction)) => (whole, fraction),
            None => (input, ""),
        };

        let all_digits = |s: &str| s.chars().all(|c| c.is_ascii_digit());
        if (whole.is_empty() && fraction.is_empty()) || !all_digits(whole) || !all_digits(fraction)
        {
            return Err(LedgerError::Rejected(format!(
                "Amount must be a positive decimal number, got '{input}'"
            )));
        }
        if fraction.len() > COIN_DECIMALS {
            return Err(LedgerError::Rejected(format!(
                "Amount '{input}' has more than {COIN_DECIMALS} decimal places"
            )));
        }

        let whole_units = if whole.is_empty() {
            0
        } else {
            whole
                .parse::<Amount>()
                .ok()
                .and_then(|w| w.checked_mul(UNITS_PER_COIN))
                .ok_or_else(|| LedgerError::Rejected(format!("Amount '{input}' is too large")))?
        };
        let fraction_units = if fraction.is_empty() {
            0
        } else {
            let padded = format!("{fraction:0<width$}", width = COIN_DECIMALS);
            padded
                .parse::<Amount>()
                .map_err(|e| LedgerError::Rejected(format!("Invalid amount '{input}': {e}")))?
        };

        let units = whole_units
            .checked_add(fraction_units)
            .ok_or_else(|| LedgerError::Rejected(format!("Amount '{input}' is too large")))?;
        if units == 0 {
            return Err(LedgerError::Rejected(
                "Amount must be greater than zero".to_string(),
            ));
        }
        Ok(units)
    }

    /// Format base units as a human-readable coin string
    ///
    /// # Examples
    /// ```
    /// use fastchain::core::monetary::conversions::format_units;
    /// assert_eq!(format_units(100_000_000), "1.00000000 coins");
    /// assert_eq!(format_units(1_000), "0.00001000 coins");
    /// ```
    pub fn format_units(units: Amount) -> String {
        format!(
            "{}.{:0width$} coins",
            units / UNITS_PER_COIN,
            units % UNITS_PER_COIN,
            width = COIN_DECIMALS
        )
    }
}
