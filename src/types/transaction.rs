//! Transaction intake and the validated feature vector

use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Boolean flag as it arrives on the wire.
///
/// JSON clients send `true`/`false` or `0`/`1`; HTML forms send strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FlagValue {
    Bool(bool),
    Int(i64),
    Text(String),
}

impl FlagValue {
    fn parse(&self, field: &'static str) -> Result<bool, ValidationError> {
        match self {
            FlagValue::Bool(b) => Ok(*b),
            FlagValue::Int(0) => Ok(false),
            FlagValue::Int(1) => Ok(true),
            FlagValue::Int(other) => Err(ValidationError::InvalidFlag {
                field,
                value: other.to_string(),
            }),
            FlagValue::Text(text) => match text.trim().to_ascii_lowercase().as_str() {
                "0" | "false" | "no" => Ok(false),
                "1" | "true" | "yes" => Ok(true),
                _ => Err(ValidationError::InvalidFlag {
                    field,
                    value: text.clone(),
                }),
            },
        }
    }
}

impl From<bool> for FlagValue {
    fn from(value: bool) -> Self {
        FlagValue::Bool(value)
    }
}

/// Raw transaction payload, as submitted by the JSON API, the form
/// endpoint or the NATS intake. Nothing here is trusted yet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionInput {
    pub amount: f64,
    pub balance: f64,
    pub hour: i64,
    pub day_of_week: i64,
    pub is_weekend: FlagValue,
    #[serde(alias = "is_international")]
    pub is_international_flag: FlagValue,
    pub age: i64,
    pub txns_per_account: i64,
    pub avg_amount_account: f64,
    pub txn_type: String,
    pub channel: String,
    pub account_type: String,
    pub gender: String,
    pub city: String,
    pub state: String,
}

/// Transaction type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxnType {
    #[serde(rename = "ATM")]
    Atm,
    #[serde(rename = "POS")]
    Pos,
    Online,
    Transfer,
}

impl TxnType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxnType::Atm => "ATM",
            TxnType::Pos => "POS",
            TxnType::Online => "Online",
            TxnType::Transfer => "Transfer",
        }
    }
}

impl FromStr for TxnType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "atm" => Ok(TxnType::Atm),
            "pos" => Ok(TxnType::Pos),
            "online" => Ok(TxnType::Online),
            "transfer" => Ok(TxnType::Transfer),
            _ => Err(ValidationError::UnknownCategory {
                field: "txn_type",
                value: s.to_string(),
            }),
        }
    }
}

/// Channel the transaction came through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Channel {
    Branch,
    #[serde(rename = "ATM")]
    Atm,
    Online,
    Mobile,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Branch => "Branch",
            Channel::Atm => "ATM",
            Channel::Online => "Online",
            Channel::Mobile => "Mobile",
        }
    }
}

impl FromStr for Channel {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "branch" => Ok(Channel::Branch),
            "atm" => Ok(Channel::Atm),
            "online" => Ok(Channel::Online),
            "mobile" => Ok(Channel::Mobile),
            _ => Err(ValidationError::UnknownCategory {
                field: "channel",
                value: s.to_string(),
            }),
        }
    }
}

/// Account category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    Savings,
    Current,
    CreditCard,
}

impl AccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Savings => "savings",
            AccountType::Current => "current",
            AccountType::CreditCard => "credit_card",
        }
    }
}

impl FromStr for AccountType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "savings" => Ok(AccountType::Savings),
            "current" => Ok(AccountType::Current),
            "credit_card" => Ok(AccountType::CreditCard),
            _ => Err(ValidationError::UnknownCategory {
                field: "account_type",
                value: s.to_string(),
            }),
        }
    }
}

macro_rules! display_as_str {
    ($($ty:ty),*) => {
        $(impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        })*
    };
}

display_as_str!(TxnType, Channel, AccountType);

/// Validated, immutable inputs of one transaction.
///
/// Only obtainable through `TryFrom<TransactionInput>`, so every instance
/// satisfies the range and vocabulary constraints.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureVector {
    amount: f64,
    balance: f64,
    hour: u8,
    day_of_week: u8,
    is_weekend: bool,
    is_international: bool,
    age: u32,
    txns_per_account: u32,
    avg_amount_account: f64,
    txn_type: TxnType,
    channel: Channel,
    account_type: AccountType,
    gender: String,
    city: String,
    state: String,
}

impl FeatureVector {
    pub fn amount(&self) -> f64 {
        self.amount
    }

    pub fn balance(&self) -> f64 {
        self.balance
    }

    pub fn hour(&self) -> u8 {
        self.hour
    }

    pub fn day_of_week(&self) -> u8 {
        self.day_of_week
    }

    pub fn is_weekend(&self) -> bool {
        self.is_weekend
    }

    pub fn is_international(&self) -> bool {
        self.is_international
    }

    pub fn age(&self) -> u32 {
        self.age
    }

    pub fn txns_per_account(&self) -> u32 {
        self.txns_per_account
    }

    pub fn avg_amount_account(&self) -> f64 {
        self.avg_amount_account
    }

    pub fn txn_type(&self) -> TxnType {
        self.txn_type
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    pub fn account_type(&self) -> AccountType {
        self.account_type
    }

    pub fn gender(&self) -> &str {
        &self.gender
    }

    pub fn city(&self) -> &str {
        &self.city
    }

    pub fn state(&self) -> &str {
        &self.state
    }

    /// Look up a numeric feature by its training column name.
    pub fn numeric(&self, name: &str) -> Option<f64> {
        let value = match name {
            "amount" => self.amount,
            "balance" => self.balance,
            "hour" => self.hour as f64,
            "day_of_week" => self.day_of_week as f64,
            "is_weekend" => bool_to_f64(self.is_weekend),
            "is_international_flag" | "is_international" => bool_to_f64(self.is_international),
            "age" => self.age as f64,
            "txns_per_account" => self.txns_per_account as f64,
            "avg_amount_account" => self.avg_amount_account,
            _ => return None,
        };
        Some(value)
    }

    /// Look up a categorical feature by its training column name.
    pub fn categorical(&self, name: &str) -> Option<&str> {
        match name {
            "txn_type" => Some(self.txn_type.as_str()),
            "channel" => Some(self.channel.as_str()),
            "account_type" => Some(self.account_type.as_str()),
            "gender" => Some(&self.gender),
            "city" => Some(&self.city),
            "state" => Some(&self.state),
            _ => None,
        }
    }
}

fn bool_to_f64(flag: bool) -> f64 {
    if flag {
        1.0
    } else {
        0.0
    }
}

fn check_range(field: &'static str, value: i64, min: i64, max: i64) -> Result<u8, ValidationError> {
    if (min..=max).contains(&value) {
        Ok(value as u8)
    } else {
        Err(ValidationError::OutOfRange {
            field,
            min,
            max,
            value,
        })
    }
}

fn check_amount(field: &'static str, value: f64) -> Result<f64, ValidationError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(ValidationError::InvalidAmount { field, value })
    }
}

fn check_count(field: &'static str, value: i64) -> Result<u32, ValidationError> {
    if value < 0 {
        return Err(ValidationError::Negative { field, value });
    }
    u32::try_from(value).map_err(|_| ValidationError::OutOfRange {
        field,
        min: 0,
        max: i64::from(u32::MAX),
        value,
    })
}

fn check_text(field: &'static str, value: String) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(ValidationError::Empty { field })
    } else {
        Ok(trimmed.to_string())
    }
}

impl TryFrom<TransactionInput> for FeatureVector {
    type Error = ValidationError;

    fn try_from(input: TransactionInput) -> Result<Self, Self::Error> {
        Ok(Self {
            amount: check_amount("amount", input.amount)?,
            balance: check_amount("balance", input.balance)?,
            hour: check_range("hour", input.hour, 0, 23)?,
            day_of_week: check_range("day_of_week", input.day_of_week, 0, 6)?,
            is_weekend: input.is_weekend.parse("is_weekend")?,
            is_international: input
                .is_international_flag
                .parse("is_international_flag")?,
            age: check_count("age", input.age)?,
            txns_per_account: check_count("txns_per_account", input.txns_per_account)?,
            avg_amount_account: check_amount("avg_amount_account", input.avg_amount_account)?,
            txn_type: input.txn_type.parse()?,
            channel: input.channel.parse()?,
            account_type: input.account_type.parse()?,
            gender: check_text("gender", input.gender)?,
            city: check_text("city", input.city)?,
            state: check_text("state", input.state)?,
        })
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_valid_input_converts() {
        let vector = FeatureVector::try_from(safe_input()).unwrap();

        assert_eq!(vector.hour(), 14);
        assert_eq!(vector.txn_type(), TxnType::Pos);
        assert_eq!(vector.account_type(), AccountType::Savings);
        assert!(!vector.is_weekend());
        assert_eq!(vector.numeric("is_international_flag"), Some(0.0));
        assert_eq!(vector.categorical("channel"), Some("Branch"));
    }

    #[test]
    fn test_hour_out_of_range() {
        let mut input = safe_input();
        input.hour = 24;

        let err = FeatureVector::try_from(input).unwrap_err();
        assert!(matches!(err, ValidationError::OutOfRange { field: "hour", .. }));
    }

    #[test]
    fn test_day_of_week_out_of_range() {
        let mut input = safe_input();
        input.day_of_week = -1;

        assert!(FeatureVector::try_from(input).is_err());
    }

    #[test]
    fn test_negative_amount_rejected() {
        let mut input = safe_input();
        input.balance = -1.0;

        let err = FeatureVector::try_from(input).unwrap_err();
        assert_eq!(
            err,
            ValidationError::InvalidAmount {
                field: "balance",
                value: -1.0
            }
        );
    }

    #[test]
    fn test_transaction_count_bounds() {
        let mut input = safe_input();
        input.txns_per_account = -3;
        assert_eq!(
            FeatureVector::try_from(input).unwrap_err(),
            ValidationError::Negative {
                field: "txns_per_account",
                value: -3
            }
        );

        let mut input = safe_input();
        input.txns_per_account = 5_000_000_000;
        let err = FeatureVector::try_from(input).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::OutOfRange {
                field: "txns_per_account",
                max: 4_294_967_295,
                ..
            }
        ));
        assert!(!err.to_string().contains("non-negative"));
    }

    #[test]
    fn test_unknown_category_rejected() {
        let mut input = safe_input();
        input.account_type = "brokerage".to_string();

        let err = FeatureVector::try_from(input).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::UnknownCategory {
                field: "account_type",
                ..
            }
        ));
    }

    #[test]
    fn test_flag_forms() {
        assert_eq!(FlagValue::Bool(true).parse("f"), Ok(true));
        assert_eq!(FlagValue::Int(0).parse("f"), Ok(false));
        assert_eq!(FlagValue::Text("1".to_string()).parse("f"), Ok(true));
        assert!(FlagValue::Int(2).parse("f").is_err());
        assert!(FlagValue::Text("maybe".to_string()).parse("f").is_err());
    }

    #[test]
    fn test_json_with_alias_and_bool_flags() {
        let json = r#"{
            "amount": 10.0, "balance": 100.0, "hour": 9, "day_of_week": 0,
            "is_weekend": false, "is_international": true, "age": 40,
            "txns_per_account": 12, "avg_amount_account": 20.0,
            "txn_type": "ATM", "channel": "ATM", "account_type": "credit_card",
            "gender": "M", "city": "Delhi", "state": "Delhi", "country": "India"
        }"#;

        let input: TransactionInput = serde_json::from_str(json).unwrap();
        let vector = FeatureVector::try_from(input).unwrap();

        assert!(vector.is_international());
        assert_eq!(vector.channel(), Channel::Atm);
        assert_eq!(vector.account_type(), AccountType::CreditCard);
    }

    #[test]
    fn test_blank_city_rejected() {
        let mut input = safe_input();
        input.city = "   ".to_string();

        assert_eq!(
            FeatureVector::try_from(input).unwrap_err(),
            ValidationError::Empty { field: "city" }
        );
    }
}
