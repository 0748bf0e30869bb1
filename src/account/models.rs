//! Data models for customer accounts

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("Unknown account type id: {0}")]
pub struct UnknownAccountType(pub i16);

/// Account type; each type keeps its balance in a distinct column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(i16)]
pub enum AccountType {
    Checking = 1,
    Savings = 2,
}

impl AccountType {
    #[inline]
    pub fn id(&self) -> i16 {
        *self as i16
    }

    /// Column in `accounts_tb` holding this type's balance
    pub fn balance_column(&self) -> &'static str {
        match self {
            AccountType::Checking => "checking_balance",
            AccountType::Savings => "savings_balance",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Checking => "checking",
            AccountType::Savings => "savings",
        }
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AccountType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "checking" | "1" => Ok(AccountType::Checking),
            "savings" | "2" => Ok(AccountType::Savings),
            _ => Err(format!("Invalid account type: {}", s)),
        }
    }
}

impl TryFrom<i16> for AccountType {
    type Error = UnknownAccountType;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(AccountType::Checking),
            2 => Ok(AccountType::Savings),
            other => Err(UnknownAccountType(other)),
        }
    }
}

/// Customer account row
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct Account {
    pub account_id: i64,
    pub owner_id: i64,
    #[sqlx(try_from = "i16")]
    pub account_type: AccountType,
    pub checking_balance: Decimal,
    pub savings_balance: Decimal,
    /// Display number, 10 digits
    pub account_number: String,
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// Balance of the field selected by the account type
    pub fn balance(&self) -> Decimal {
        match self.account_type {
            AccountType::Checking => self.checking_balance,
            AccountType::Savings => self.savings_balance,
        }
    }

    pub(crate) fn balance_mut(&mut self) -> &mut Decimal {
        match self.account_type {
            AccountType::Checking => &mut self.checking_balance,
            AccountType::Savings => &mut self.savings_balance,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(account_type: AccountType) -> Account {
        Account {
            account_id: 1,
            owner_id: 1001,
            account_type,
            checking_balance: Decimal::new(10000, 2),
            savings_balance: Decimal::new(2500, 2),
            account_number: "0000000001".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_balance_follows_account_type() {
        assert_eq!(account(AccountType::Checking).balance(), Decimal::new(10000, 2));
        assert_eq!(account(AccountType::Savings).balance(), Decimal::new(2500, 2));
    }

    #[test]
    fn test_balance_mut_touches_one_field() {
        let mut acc = account(AccountType::Savings);
        *acc.balance_mut() += Decimal::ONE;
        assert_eq!(acc.savings_balance, Decimal::new(2600, 2));
        assert_eq!(acc.checking_balance, Decimal::new(10000, 2));
    }

    #[test]
    fn test_balance_column() {
        assert_eq!(AccountType::Checking.balance_column(), "checking_balance");
        assert_eq!(AccountType::Savings.balance_column(), "savings_balance");
    }

    #[test]
    fn test_account_type_parse() {
        assert_eq!("Checking".parse::<AccountType>(), Ok(AccountType::Checking));
        assert_eq!("2".parse::<AccountType>(), Ok(AccountType::Savings));
        assert!("brokerage".parse::<AccountType>().is_err());
        assert!(AccountType::try_from(9).is_err());
    }
}
