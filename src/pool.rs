//! Variable-rate lending pool.
//!
//! Overdue fixed loans roll in here, and borrowers can also draw from the
//! pool directly against wallet collateral. Debt accrues linearly in elapsed
//! ticks at a pool-wide utilization-based rate; there is no per-loan rate.

use crate::collateral::{CollateralAccount, CollateralError};
use crate::context::Context;
use crate::types::{Time, UserId, VarLoanId};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolParams {
    // rate per tick at zero utilization
    pub base_rate: Decimal,
    // extra rate per tick at full utilization
    pub utilization_slope: Decimal,
    pub min_collateral_ratio: Decimal,
}

impl Default for PoolParams {
    fn default() -> Self {
        Self {
            base_rate: dec!(0.005),
            utilization_slope: dec!(0.05),
            min_collateral_ratio: dec!(1.3),
        }
    }
}

/// Where a variable loan's collateral sits: locked in the borrower's own
/// wallet (direct pool borrow) or locked in the order book's ledger
/// (fixed-loan rollover). Repayment must release the right one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CollateralVenue {
    Wallet,
    Book,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariableLoan {
    pub id: VarLoanId,
    pub borrower: UserId,
    pub principal: Decimal,
    pub collateral_amount: Decimal,
    pub start_time: Time,
    pub venue: CollateralVenue,
    pub repaid: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariablePool {
    pub params: PoolParams,
    pub cash: CollateralAccount,
    pub collateral: CollateralAccount,
    loans: BTreeMap<VarLoanId, VariableLoan>,
    next_id: u64,
    // aggregate outstanding principal, drives the utilization rate
    lent_out: Decimal,
}

impl VariablePool {
    pub fn new(params: PoolParams) -> Self {
        Self {
            params,
            cash: CollateralAccount::default(),
            collateral: CollateralAccount::default(),
            loans: BTreeMap::new(),
            next_id: 0,
            lent_out: Decimal::ZERO,
        }
    }

    /// External reserve injection.
    pub fn fund(&mut self, amount: Decimal) {
        self.cash.credit_free(amount);
    }

    pub fn lent_out(&self) -> Decimal {
        self.lent_out
    }

    pub fn utilization(&self) -> Decimal {
        let total = self.lent_out + self.cash.free();
        if total == Decimal::ZERO {
            Decimal::ZERO
        } else {
            self.lent_out / total
        }
    }

    pub fn rate_per_tick(&self) -> Decimal {
        self.params.base_rate + self.params.utilization_slope * self.utilization()
    }

    pub fn loan(&self, id: VarLoanId) -> Option<&VariableLoan> {
        self.loans.get(&id)
    }

    pub fn loans_iter(&self) -> impl Iterator<Item = &VariableLoan> {
        self.loans.values()
    }

    pub fn active_loan_count(&self) -> usize {
        self.loans.values().filter(|l| !l.repaid).count()
    }

    /// Debt accrued on a loan as of `now`, at the pool's current rate.
    pub fn current_debt(&self, id: VarLoanId, now: Time) -> Result<Decimal, PoolError> {
        let loan = self.loans.get(&id).ok_or(PoolError::LoanNotFound(id))?;
        let elapsed = Decimal::from(now.delta(loan.start_time));
        Ok(loan.principal * (Decimal::ONE + self.rate_per_tick() * elapsed))
    }

    /// Direct variable borrow against wallet collateral: reserves flow to
    /// the borrower's wallet, collateral locks in the borrower's wallet.
    pub fn take_loan(
        &mut self,
        ctx: &Context,
        borrower: UserId,
        wallet_cash: &mut CollateralAccount,
        wallet_collateral: &mut CollateralAccount,
        amount_cash: Decimal,
        amount_collateral: Decimal,
    ) -> Result<VarLoanId, PoolError> {
        if !self.cash.can_transfer(amount_cash) {
            return Err(PoolError::InsufficientReserves {
                requested: amount_cash,
                available: self.cash.free(),
            });
        }
        if !wallet_collateral.can_lock(amount_collateral) {
            return Err(PoolError::Collateral(CollateralError::InsufficientFree {
                requested: amount_collateral,
                available: wallet_collateral.free(),
            }));
        }
        let collateral_value = amount_collateral * ctx.price.value();
        if collateral_value < amount_cash * self.params.min_collateral_ratio {
            return Err(PoolError::CollateralShortfall {
                debt: amount_cash,
                collateral_value,
                min_ratio: self.params.min_collateral_ratio,
            });
        }

        self.cash.transfer(wallet_cash, amount_cash)?;
        wallet_collateral.lock(amount_collateral)?;
        let id = self.record_loan(
            borrower,
            amount_cash,
            amount_collateral,
            ctx.time,
            CollateralVenue::Wallet,
        );
        Ok(id)
    }

    /// Repay a wallet-collateral loan: the accrued debt returns to the pool
    /// and the wallet collateral unlocks. Book-ledger loans are settled
    /// through the order book instead.
    pub fn repay(
        &mut self,
        ctx: &Context,
        id: VarLoanId,
        wallet_cash: &mut CollateralAccount,
        wallet_collateral: &mut CollateralAccount,
    ) -> Result<Decimal, PoolError> {
        let debt = self.current_debt(id, ctx.time)?;
        let loan = self.loans.get(&id).ok_or(PoolError::LoanNotFound(id))?;
        if loan.repaid {
            return Err(PoolError::AlreadyRepaid(id));
        }
        if loan.venue != CollateralVenue::Wallet {
            return Err(PoolError::WrongVenue(id));
        }
        let collateral_amount = loan.collateral_amount;

        if !wallet_cash.can_transfer(debt) {
            return Err(PoolError::Collateral(CollateralError::InsufficientFree {
                requested: debt,
                available: wallet_cash.free(),
            }));
        }
        if !wallet_collateral.can_unlock(collateral_amount) {
            return Err(PoolError::Collateral(CollateralError::InsufficientLocked {
                requested: collateral_amount,
                available: wallet_collateral.locked(),
            }));
        }

        wallet_cash.transfer(&mut self.cash, debt)?;
        wallet_collateral.unlock(collateral_amount)?;
        self.mark_repaid(id);
        Ok(debt)
    }

    /// Entry point for fixed-loan rollovers. The cash leg (pool -> book)
    /// is settled by the caller; this only records the loan.
    pub(crate) fn open_rollover(
        &mut self,
        borrower: UserId,
        principal: Decimal,
        collateral_amount: Decimal,
        start_time: Time,
    ) -> VarLoanId {
        self.record_loan(
            borrower,
            principal,
            collateral_amount,
            start_time,
            CollateralVenue::Book,
        )
    }

    pub(crate) fn mark_repaid(&mut self, id: VarLoanId) {
        if let Some(loan) = self.loans.get_mut(&id) {
            debug_assert!(!loan.repaid);
            loan.repaid = true;
            self.lent_out -= loan.principal;
            debug_assert!(self.lent_out >= Decimal::ZERO);
        }
    }

    fn record_loan(
        &mut self,
        borrower: UserId,
        principal: Decimal,
        collateral_amount: Decimal,
        start_time: Time,
        venue: CollateralVenue,
    ) -> VarLoanId {
        let id = VarLoanId(self.next_id);
        self.next_id += 1;
        self.loans.insert(
            id,
            VariableLoan {
                id,
                borrower,
                principal,
                collateral_amount,
                start_time,
                venue,
                repaid: false,
            },
        );
        self.lent_out += principal;
        id
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum PoolError {
    #[error("variable loan {0} not found")]
    LoanNotFound(VarLoanId),

    #[error("variable loan {0} already repaid")]
    AlreadyRepaid(VarLoanId),

    #[error("insufficient pool reserves: requested {requested}, available {available}")]
    InsufficientReserves {
        requested: Decimal,
        available: Decimal,
    },

    #[error("collateral shortfall: debt {debt}, collateral value {collateral_value}, minimum ratio {min_ratio}")]
    CollateralShortfall {
        debt: Decimal,
        collateral_value: Decimal,
        min_ratio: Decimal,
    },

    #[error("variable loan {0} collateral is not held at this venue")]
    WrongVenue(VarLoanId),

    #[error(transparent)]
    Collateral(#[from] CollateralError),
}
