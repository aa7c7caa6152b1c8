//! Repayment, claiming, and the fixed-to-variable rollover.

use super::core::LendingBook;
use super::results::{BookError, RolloverResult};
use crate::context::Context;
use crate::events::{
    ClaimedEvent, EventPayload, RepaidEvent, RolledToVariablePoolEvent, VariableLoanOpenedEvent,
    VariableLoanRepaidEvent,
};
use crate::loan::LoanKind;
use crate::pool::{CollateralVenue, PoolError};
use crate::types::{LoanId, UserId, VarLoanId};
use rust_decimal::Decimal;

impl LendingBook {
    /// Settle a FOL at face value: borrower wallet cash flows into the
    /// book, the covered debt unwinds, and every claim on the loan's tree
    /// becomes claimable. Valid once, on FOLs only.
    pub fn repay(&mut self, ctx: &Context, loan_id: LoanId) -> Result<(), BookError> {
        let (borrower, face_value) = {
            let loan = self.loans.get(&loan_id).ok_or(BookError::UnknownLoan(loan_id))?;
            match loan.kind {
                LoanKind::Fol { repaid, .. } => {
                    if repaid {
                        return Err(BookError::AlreadyRepaid(loan_id));
                    }
                }
                LoanKind::Sol { .. } => return Err(BookError::NotAFol(loan_id)),
            }
            (loan.borrower, loan.face_value)
        };

        // the transfer is the first mutation; a shortfall aborts cleanly
        {
            let b = self.users.get_mut(&borrower).ok_or(BookError::UnknownUser(borrower))?;
            b.wallet_cash.transfer(&mut self.cash, face_value)?;
            b.debt_covered_by_real_collateral -= face_value;
            debug_assert!(b.debt_covered_by_real_collateral >= Decimal::ZERO);
        }
        if let Some(LoanKind::Fol { repaid, .. }) =
            self.loans.get_mut(&loan_id).map(|l| &mut l.kind)
        {
            *repaid = true;
        }

        self.emit_event(
            ctx.time,
            EventPayload::Repaid(RepaidEvent {
                loan_id,
                borrower,
                face_value,
            }),
        );
        self.check_invariants();
        Ok(())
    }

    /// Collect a resolved claim: credits the lender's book cash with the
    /// loan's remaining credit. Requires the root to be repaid; succeeds at
    /// most once per loan.
    pub fn claim(&mut self, ctx: &Context, loan_id: LoanId) -> Result<Decimal, BookError> {
        let (lender, amount) = {
            let loan = self.loans.get(&loan_id).ok_or(BookError::UnknownLoan(loan_id))?;
            if !self.root_repaid(loan) {
                return Err(BookError::NotRepaid(loan_id));
            }
            if loan.claimed {
                return Err(BookError::AlreadyClaimed(loan_id));
            }
            (loan.lender, loan.credit())
        };

        if let Some(loan) = self.loans.get_mut(&loan_id) {
            loan.claimed = true;
        }
        self.user_mut(lender)?.book_cash += amount;

        self.emit_event(
            ctx.time,
            EventPayload::Claimed(ClaimedEvent {
                loan_id,
                lender,
                amount,
            }),
        );
        self.check_invariants();
        Ok(amount)
    }

    /// Roll an overdue, unpaid FOL into the variable pool. The pool buys
    /// out the fixed claim at face value (so lenders claim normally) and
    /// takes over the borrower's debt at the pool rate, against the
    /// collateral assigned pro-rata to this loan — locked in the book
    /// ledger from here on.
    pub fn move_to_variable_pool(
        &mut self,
        ctx: &Context,
        loan_id: LoanId,
    ) -> Result<RolloverResult, BookError> {
        let (borrower, face_value, due_date) = {
            let loan = self.loans.get(&loan_id).ok_or(BookError::UnknownLoan(loan_id))?;
            match loan.kind {
                LoanKind::Fol { due_date, repaid } => {
                    if repaid {
                        return Err(BookError::AlreadyRepaid(loan_id));
                    }
                    (loan.borrower, loan.face_value, due_date)
                }
                LoanKind::Sol { .. } => return Err(BookError::NotAFol(loan_id)),
            }
        };
        if ctx.time <= due_date {
            return Err(BookError::NotOverdue {
                loan: loan_id,
                due_date,
                now: ctx.time,
            });
        }

        let assigned = self.assigned_collateral(loan_id)?;
        let required = (face_value / ctx.price.value()) * self.config.risk.cr_opening;
        if assigned < required {
            return Err(BookError::OpeningCollateralShortfall {
                required,
                available: assigned,
            });
        }
        if !self.pool.cash.can_transfer(face_value) {
            return Err(BookError::Pool(PoolError::InsufficientReserves {
                requested: face_value,
                available: self.pool.cash.free(),
            }));
        }

        // all checks passed; commit
        self.lock_collateral(borrower, assigned)?;
        self.pool.cash.transfer(&mut self.cash, face_value)?;
        if let Some(LoanKind::Fol { repaid, .. }) =
            self.loans.get_mut(&loan_id).map(|l| &mut l.kind)
        {
            *repaid = true;
        }
        {
            let b = self.user_mut(borrower)?;
            b.debt_covered_by_real_collateral -= face_value;
            debug_assert!(b.debt_covered_by_real_collateral >= Decimal::ZERO);
        }
        let var_loan_id = self.pool.open_rollover(borrower, face_value, assigned, ctx.time);

        self.emit_event(
            ctx.time,
            EventPayload::RolledToVariablePool(RolledToVariablePoolEvent {
                loan_id,
                var_loan_id,
                borrower,
                principal: face_value,
                collateral_assigned: assigned,
            }),
        );
        self.check_invariants();
        Ok(RolloverResult {
            var_loan_id,
            principal: face_value,
            collateral_assigned: assigned,
        })
    }

    /// Direct variable borrow from the pool against wallet collateral.
    pub fn take_variable_loan(
        &mut self,
        ctx: &Context,
        user: UserId,
        amount_cash: Decimal,
        amount_collateral: Decimal,
    ) -> Result<VarLoanId, BookError> {
        if amount_cash <= Decimal::ZERO {
            return Err(BookError::NonPositiveAmount { amount: amount_cash });
        }
        let u = self.users.get_mut(&user).ok_or(BookError::UnknownUser(user))?;
        let var_loan_id = self.pool.take_loan(
            ctx,
            user,
            &mut u.wallet_cash,
            &mut u.wallet_collateral,
            amount_cash,
            amount_collateral,
        )?;
        self.emit_event(
            ctx.time,
            EventPayload::VariableLoanOpened(VariableLoanOpenedEvent {
                var_loan_id,
                borrower: user,
                principal: amount_cash,
                collateral_amount: amount_collateral,
            }),
        );
        self.check_invariants();
        Ok(var_loan_id)
    }

    /// Settle a variable loan at its accrued debt and release its
    /// collateral, wherever that collateral is held.
    pub fn repay_variable_loan(
        &mut self,
        ctx: &Context,
        var_loan_id: VarLoanId,
    ) -> Result<Decimal, BookError> {
        let (borrower, collateral_amount, venue) = {
            let loan = self
                .pool
                .loan(var_loan_id)
                .ok_or(BookError::Pool(PoolError::LoanNotFound(var_loan_id)))?;
            if loan.repaid {
                return Err(BookError::Pool(PoolError::AlreadyRepaid(var_loan_id)));
            }
            (loan.borrower, loan.collateral_amount, loan.venue)
        };
        let debt = self.pool.current_debt(var_loan_id, ctx.time)?;

        // validate both legs, then commit
        {
            let b = self.user_ref(borrower)?;
            if !b.wallet_cash.can_transfer(debt) {
                return Err(BookError::InsufficientBookCash {
                    user: borrower,
                    requested: debt,
                    available: b.wallet_cash.free(),
                });
            }
            match venue {
                CollateralVenue::Book => {
                    if b.collateral_locked < collateral_amount {
                        return Err(BookError::InsufficientBookCollateral {
                            user: borrower,
                            requested: collateral_amount,
                            available: b.collateral_locked,
                        });
                    }
                }
                CollateralVenue::Wallet => {
                    if !b.wallet_collateral.can_unlock(collateral_amount) {
                        return Err(BookError::InsufficientBookCollateral {
                            user: borrower,
                            requested: collateral_amount,
                            available: b.wallet_collateral.locked(),
                        });
                    }
                }
            }
        }

        {
            let b = self.users.get_mut(&borrower).ok_or(BookError::UnknownUser(borrower))?;
            b.wallet_cash.transfer(&mut self.pool.cash, debt)?;
            match venue {
                CollateralVenue::Book => b.collateral_locked -= collateral_amount,
                CollateralVenue::Wallet => b.wallet_collateral.unlock(collateral_amount)?,
            }
        }
        self.pool.mark_repaid(var_loan_id);

        self.emit_event(
            ctx.time,
            EventPayload::VariableLoanRepaid(VariableLoanRepaidEvent {
                var_loan_id,
                borrower,
                debt,
            }),
        );
        self.check_invariants();
        Ok(debt)
    }
}
