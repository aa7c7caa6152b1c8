//! Free/locked balance pairs.
//!
//! Every asset movement in the engine bottoms out in one of the three
//! primitives here: lock, unlock, transfer. Each has a feasibility twin
//! (`can_*`) so multi-step operations can validate everything they touch
//! before committing anything.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollateralAccount {
    free: Decimal,
    locked: Decimal,
}

impl CollateralAccount {
    pub fn new(free: Decimal) -> Self {
        debug_assert!(free >= Decimal::ZERO);
        Self {
            free,
            locked: Decimal::ZERO,
        }
    }

    pub fn free(&self) -> Decimal {
        self.free
    }

    pub fn locked(&self) -> Decimal {
        self.locked
    }

    pub fn total(&self) -> Decimal {
        self.free + self.locked
    }

    pub fn can_lock(&self, amount: Decimal) -> bool {
        amount >= Decimal::ZERO && amount <= self.free
    }

    pub fn lock(&mut self, amount: Decimal) -> Result<(), CollateralError> {
        if amount < Decimal::ZERO {
            return Err(CollateralError::NegativeAmount { amount });
        }
        if amount > self.free {
            return Err(CollateralError::InsufficientFree {
                requested: amount,
                available: self.free,
            });
        }
        let total_before = self.total();
        self.free -= amount;
        self.locked += amount;
        debug_assert_eq!(self.total(), total_before);
        Ok(())
    }

    pub fn can_unlock(&self, amount: Decimal) -> bool {
        amount >= Decimal::ZERO && amount <= self.locked
    }

    pub fn unlock(&mut self, amount: Decimal) -> Result<(), CollateralError> {
        if amount < Decimal::ZERO {
            return Err(CollateralError::NegativeAmount { amount });
        }
        if amount > self.locked {
            return Err(CollateralError::InsufficientLocked {
                requested: amount,
                available: self.locked,
            });
        }
        let total_before = self.total();
        self.locked -= amount;
        self.free += amount;
        debug_assert_eq!(self.total(), total_before);
        Ok(())
    }

    pub fn can_transfer(&self, amount: Decimal) -> bool {
        amount >= Decimal::ZERO && amount <= self.free
    }

    /// Move free balance to another account's free balance. No intermediate
    /// lock step; value across the two parties is conserved.
    pub fn transfer(
        &mut self,
        to: &mut CollateralAccount,
        amount: Decimal,
    ) -> Result<(), CollateralError> {
        if amount < Decimal::ZERO {
            return Err(CollateralError::NegativeAmount { amount });
        }
        if amount > self.free {
            return Err(CollateralError::InsufficientFree {
                requested: amount,
                available: self.free,
            });
        }
        let combined_before = self.total() + to.total();
        self.free -= amount;
        to.free += amount;
        debug_assert_eq!(self.total() + to.total(), combined_before);
        Ok(())
    }
}

impl CollateralAccount {
    // external funding boundary: the out-of-scope actor that funds and
    // drains accounts. not reachable from outside the crate, so in-engine
    // flows still conserve value.
    pub(crate) fn credit_free(&mut self, amount: Decimal) {
        debug_assert!(amount >= Decimal::ZERO);
        self.free += amount;
    }

    pub(crate) fn debit_free(&mut self, amount: Decimal) -> Result<(), CollateralError> {
        if amount < Decimal::ZERO {
            return Err(CollateralError::NegativeAmount { amount });
        }
        if amount > self.free {
            return Err(CollateralError::InsufficientFree {
                requested: amount,
                available: self.free,
            });
        }
        self.free -= amount;
        Ok(())
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum CollateralError {
    #[error("insufficient free balance: requested {requested}, available {available}")]
    InsufficientFree {
        requested: Decimal,
        available: Decimal,
    },

    #[error("insufficient locked balance: requested {requested}, available {available}")]
    InsufficientLocked {
        requested: Decimal,
        available: Decimal,
    },

    #[error("negative amount: {amount}")]
    NegativeAmount { amount: Decimal },
}
