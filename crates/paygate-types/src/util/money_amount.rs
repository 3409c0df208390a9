//! Human-readable price parsing.
//!
//! Routes are priced in dollars (`"$0.10"`), while x402 requirements carry the
//! amount in the token's atomic units (`"100000"` for 6-decimal USDC).
//! [`MoneyAmount`] bridges the two.
//!
//! Accepted inputs: plain numbers (`"0.01"`), with a currency symbol (`"$10.50"`),
//! and with thousand separators (`"1,000.50"`).
//!
//! ```rust
//! use paygate_types::util::MoneyAmount;
//!
//! let amount = MoneyAmount::parse("$0.10").unwrap();
//! assert_eq!(amount.to_token_units(6).unwrap(), "100000");
//! ```

use regex::Regex;
use rust_decimal::Decimal;
use std::fmt;
use std::fmt::Display;
use std::str::FromStr;
use std::sync::LazyLock;

/// A parsed, non-negative monetary amount that keeps its input precision.
#[derive(Debug, Clone, PartialEq)]
pub struct MoneyAmount(pub Decimal);

/// Errors that can occur when parsing or converting a monetary amount.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MoneyAmountParseError {
    #[error("Invalid number format")]
    InvalidFormat,
    #[error("Amount must be between {} and {}", MIN_STR, MAX_STR)]
    OutOfRange,
    #[error("Negative value is not allowed")]
    Negative,
    /// The input has more decimal places than the token supports.
    #[error("Too big of a precision: {money} vs {token} on token")]
    WrongPrecision { money: u32, token: u32 },
}

const MIN_STR: &str = "0.000000001";
const MAX_STR: &str = "999999999";

static MIN: LazyLock<Decimal> =
    LazyLock::new(|| Decimal::from_str(MIN_STR).expect("valid decimal"));
static MAX: LazyLock<Decimal> =
    LazyLock::new(|| Decimal::from_str(MAX_STR).expect("valid decimal"));
static NOT_NUMERIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\d\.\-]+").expect("valid regex"));

impl MoneyAmount {
    /// Parses a human-readable currency string.
    ///
    /// Currency symbols, thousand separators and whitespace are stripped first.
    ///
    /// # Errors
    ///
    /// Returns an error if the rest is not a number, is negative, or falls outside
    /// the allowed range.
    pub fn parse(input: &str) -> Result<Self, MoneyAmountParseError> {
        let cleaned = NOT_NUMERIC.replace_all(input, "");
        let parsed =
            Decimal::from_str(&cleaned).map_err(|_| MoneyAmountParseError::InvalidFormat)?;

        if parsed.is_sign_negative() {
            return Err(MoneyAmountParseError::Negative);
        }
        if parsed < *MIN || parsed > *MAX {
            return Err(MoneyAmountParseError::OutOfRange);
        }
        Ok(MoneyAmount(parsed))
    }

    /// Number of decimal places in the original input.
    pub fn scale(&self) -> u32 {
        self.0.scale()
    }

    /// The value without its decimal point, e.g. `1234` for `"12.34"`.
    pub fn mantissa(&self) -> u128 {
        self.0.mantissa().unsigned_abs()
    }

    /// Converts the amount into atomic units of a token with `decimals` places.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyAmountParseError::WrongPrecision`] if the amount is more precise
    /// than the token, and [`MoneyAmountParseError::OutOfRange`] on overflow.
    pub fn to_token_units(&self, decimals: u32) -> Result<String, MoneyAmountParseError> {
        let scale = self.scale();
        if scale > decimals {
            return Err(MoneyAmountParseError::WrongPrecision {
                money: scale,
                token: decimals,
            });
        }
        let multiplier = 10u128
            .checked_pow(decimals - scale)
            .ok_or(MoneyAmountParseError::OutOfRange)?;
        let units = self
            .mantissa()
            .checked_mul(multiplier)
            .ok_or(MoneyAmountParseError::OutOfRange)?;
        Ok(units.to_string())
    }
}

impl FromStr for MoneyAmount {
    type Err = MoneyAmountParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MoneyAmount::parse(s)
    }
}

impl Display for MoneyAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.normalize())
    }
}
