//! Liquidation queries and the collateral waterfall.

use super::core::LendingBook;
use super::results::{BookError, LiquidationOutcome};
use crate::context::Context;
use crate::events::{EventPayload, LiquidatedEvent};
use crate::loan::LoanKind;
use crate::types::{LoanId, UserId};
use rust_decimal::Decimal;

impl LendingBook {
    /// Free-collateral value over real-collateral-covered debt. `None`
    /// when the borrower has no covered debt (never liquidatable).
    pub fn borrower_collateral_ratio(
        &self,
        ctx: &Context,
        borrower: UserId,
    ) -> Result<Option<Decimal>, BookError> {
        let u = self.user_ref(borrower)?;
        if u.debt_covered_by_real_collateral == Decimal::ZERO {
            return Ok(None);
        }
        Ok(Some(
            u.free_collateral() * ctx.price.value() / u.debt_covered_by_real_collateral,
        ))
    }

    pub fn is_borrower_liquidatable(
        &self,
        ctx: &Context,
        borrower: UserId,
    ) -> Result<bool, BookError> {
        Ok(self
            .borrower_collateral_ratio(ctx, borrower)?
            .is_some_and(|ratio| ratio < self.config.risk.cr_liquidation))
    }

    pub fn is_loan_liquidatable(&self, ctx: &Context, loan_id: LoanId) -> Result<bool, BookError> {
        let loan = self.loans.get(&loan_id).ok_or(BookError::UnknownLoan(loan_id))?;
        self.is_borrower_liquidatable(ctx, loan.borrower)
    }

    /// Unwind an under-collateralized FOL in one atomic settlement.
    ///
    /// The liquidator pays the face value in cash (making the loan's tree
    /// claimable) and takes the debt's collateral equivalent plus a premium.
    /// The surplus over the debt coverage splits protocol/liquidator/
    /// borrower by the configured percentages. Positions whose assigned
    /// collateral no longer covers the debt are left alone: no liquidation
    /// at a loss.
    pub fn liquidate_loan(
        &mut self,
        ctx: &Context,
        liquidator: UserId,
        loan_id: LoanId,
    ) -> Result<LiquidationOutcome, BookError> {
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

        match self.borrower_collateral_ratio(ctx, borrower)? {
            Some(ratio) if ratio < self.config.risk.cr_liquidation => {}
            ratio => {
                return Err(BookError::NotLiquidatable {
                    loan: loan_id,
                    ratio: ratio.unwrap_or(Decimal::MAX),
                    threshold: self.config.risk.cr_liquidation,
                })
            }
        }

        let assigned = self.assigned_collateral(loan_id)?;
        let coverage = face_value / ctx.price.value();
        if assigned < coverage {
            return Err(BookError::UnderwaterLiquidation { assigned, coverage });
        }

        // split the surplus; the protocol takes the residual so the three
        // parts always sum exactly
        let surplus = assigned - coverage;
        let liquidator_premium = surplus * self.config.split.liquidator_premium;
        let borrower_rebate = surplus * self.config.split.borrower_rebate;
        let protocol_share = surplus - liquidator_premium - borrower_rebate;
        let seized = coverage + liquidator_premium;

        // dry-run every leg before touching anything
        {
            let liq = self.user_ref(liquidator)?;
            if !liq.wallet_cash.can_transfer(face_value) {
                return Err(BookError::LiquidatorCashShortfall {
                    required: face_value,
                    available: liq.wallet_cash.free(),
                });
            }
        }
        if !self.collateral.can_transfer(seized) {
            return Err(BookError::InsufficientBookCollateral {
                user: borrower,
                requested: seized,
                available: self.collateral.free(),
            });
        }

        // commit: cash leg, collateral leg, ledger updates
        {
            let liq = self.users.get_mut(&liquidator).ok_or(BookError::UnknownUser(liquidator))?;
            liq.wallet_cash.transfer(&mut self.cash, face_value)?;
            self.collateral.transfer(&mut liq.wallet_collateral, seized)?;
        }
        {
            let b = self.users.get_mut(&borrower).ok_or(BookError::UnknownUser(borrower))?;
            b.collateral_deposited -= assigned - borrower_rebate;
            b.debt_covered_by_real_collateral -= face_value;
            debug_assert!(b.collateral_deposited >= b.collateral_locked);
            debug_assert!(b.debt_covered_by_real_collateral >= Decimal::ZERO);
        }
        self.liquidation_profit_collateral += protocol_share;
        if let Some(LoanKind::Fol { repaid, .. }) =
            self.loans.get_mut(&loan_id).map(|l| &mut l.kind)
        {
            *repaid = true;
        }

        self.emit_event(
            ctx.time,
            EventPayload::Liquidated(LiquidatedEvent {
                loan_id,
                borrower,
                liquidator,
                debt_repaid: face_value,
                collateral_seized: seized,
                protocol_share,
                liquidator_premium,
                borrower_rebate,
            }),
        );
        self.check_invariants();
        Ok(LiquidationOutcome {
            loan_id,
            debt_repaid: face_value,
            collateral_seized: seized,
            protocol_share,
            liquidator_premium,
            borrower_rebate,
        })
    }
}
