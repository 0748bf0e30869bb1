//! Caller-side prechecks
//!
//! Pure functions over the values the caller already holds. They never touch
//! a backend; the balance check uses the caller's (possibly stale) view and
//! is re-validated by the conditional debit.

use rust_decimal::Decimal;

use super::error::ValidationError;
use crate::account::Account;
use crate::card::{Card, CardStatus};
use crate::money::validate_amount;
use crate::session::Session;

/// Check a card funding request; returns the normalized amount
pub fn precheck_card_funding(
    session: &Session,
    account: Option<&Account>,
    card: Option<&Card>,
    amount: Decimal,
) -> Result<Decimal, ValidationError> {
    let account = account.ok_or(ValidationError::NoAccountSelected)?;
    let card = card.ok_or(ValidationError::NoCardSelected)?;

    if account.owner_id != session.user_id || card.owner_id != session.user_id {
        return Err(ValidationError::Forbidden);
    }
    if card.frozen {
        return Err(ValidationError::CardFrozen);
    }
    if card.status != CardStatus::Active {
        return Err(ValidationError::CardInactive);
    }

    check_available(account, amount)
}

/// Check an account-to-account wire; returns the normalized amount
pub fn precheck_wire(
    session: &Session,
    from: &Account,
    to: &Account,
    amount: Decimal,
) -> Result<Decimal, ValidationError> {
    if from.owner_id != session.user_id {
        return Err(ValidationError::Forbidden);
    }
    if from.account_id == to.account_id {
        return Err(ValidationError::SameAccount);
    }

    check_available(from, amount)
}

/// Amount format, then cached balance of the field selected by the account type
fn check_available(account: &Account, amount: Decimal) -> Result<Decimal, ValidationError> {
    let amount = validate_amount(amount)?;
    if amount > account.balance() {
        return Err(ValidationError::InsufficientBalance);
    }
    Ok(amount)
}
