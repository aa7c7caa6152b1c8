//! Per-user state: wallet accounts plus the book-side ledger.
//!
//! The wallets are the user's own holdings outside the book; the ledger
//! fields track what the user has deposited with the book and how much of it
//! the book has locked. Ledger fields are mutated only through `LendingBook`
//! methods.

use crate::collateral::CollateralAccount;
use crate::types::UserId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub wallet_cash: CollateralAccount,
    pub wallet_collateral: CollateralAccount,
    // cash credited to the user inside the book (lendable balance)
    pub book_cash: Decimal,
    // collateral deposited with the book; locked portion backs pool rollovers
    pub collateral_deposited: Decimal,
    pub collateral_locked: Decimal,
    // outstanding face value backed by deposited collateral rather than by
    // other loans' future cashflows
    pub debt_covered_by_real_collateral: Decimal,
}

impl User {
    pub fn new(id: UserId) -> Self {
        Self {
            id,
            wallet_cash: CollateralAccount::default(),
            wallet_collateral: CollateralAccount::default(),
            book_cash: Decimal::ZERO,
            collateral_deposited: Decimal::ZERO,
            collateral_locked: Decimal::ZERO,
            debt_covered_by_real_collateral: Decimal::ZERO,
        }
    }

    pub fn with_wallet(id: UserId, cash: Decimal, collateral: Decimal) -> Self {
        Self {
            wallet_cash: CollateralAccount::new(cash),
            wallet_collateral: CollateralAccount::new(collateral),
            ..Self::new(id)
        }
    }

    /// Deposited collateral not locked by the book.
    pub fn free_collateral(&self) -> Decimal {
        self.collateral_deposited - self.collateral_locked
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn new_user_starts_empty() {
        let user = User::new(UserId(1));
        assert_eq!(user.book_cash, dec!(0));
        assert_eq!(user.free_collateral(), dec!(0));
        assert_eq!(user.debt_covered_by_real_collateral, dec!(0));
    }

    #[test]
    fn free_collateral_excludes_locked() {
        let mut user = User::with_wallet(UserId(1), dec!(100), dec!(50));
        user.collateral_deposited = dec!(40);
        user.collateral_locked = dec!(15);
        assert_eq!(user.free_collateral(), dec!(25));
        assert_eq!(user.wallet_cash.free(), dec!(100));
    }
}
