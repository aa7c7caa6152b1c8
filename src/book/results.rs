// result types and errors for book operations.

use crate::collateral::CollateralError;
use crate::curve::CurveError;
use crate::loan::LoanError;
use crate::pool::PoolError;
use crate::types::{LoanId, OfferId, Time, UserId, VarLoanId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Outcome of a market-order match: the SOLs carved from virtual
/// collateral, the FOL covering the remainder (if any), and the cash that
/// changed hands.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchResult {
    pub sol_ids: Vec<LoanId>,
    pub fol_id: Option<LoanId>,
    pub cash_transferred: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExitResult {
    pub sol_ids: Vec<LoanId>,
    pub filled: Decimal,
    pub remainder: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RolloverResult {
    pub var_loan_id: VarLoanId,
    pub principal: Decimal,
    pub collateral_assigned: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidationOutcome {
    pub loan_id: LoanId,
    pub debt_repaid: Decimal,
    // collateral delivered to the liquidator: debt coverage plus premium
    pub collateral_seized: Decimal,
    pub protocol_share: Decimal,
    pub liquidator_premium: Decimal,
    pub borrower_rebate: Decimal,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum BookError {
    #[error("unknown {0}")]
    UnknownUser(UserId),

    #[error("unknown {0}")]
    UnknownLoan(LoanId),

    #[error("{0} has no resting loan offer")]
    NoRestingOffer(UserId),

    #[error("unknown borrow {0}")]
    UnknownBorrowOffer(OfferId),

    #[error("amount must be positive, got {amount}")]
    NonPositiveAmount { amount: Decimal },

    #[error("due date {due_date} is not in the future (now {now})")]
    DueDateNotInFuture { due_date: Time, now: Time },

    #[error("due date {due_date} past the offer limit {max_due_date}")]
    DueDatePastOfferLimit { due_date: Time, max_due_date: Time },

    #[error("requested {requested} exceeds offer capacity {available}")]
    AmountExceedsOfferCapacity {
        requested: Decimal,
        available: Decimal,
    },

    #[error("{user} book cash too low: requested {requested}, available {available}")]
    InsufficientBookCash {
        user: UserId,
        requested: Decimal,
        available: Decimal,
    },

    #[error("{user} book collateral too low: requested {requested}, available {available}")]
    InsufficientBookCollateral {
        user: UserId,
        requested: Decimal,
        available: Decimal,
    },

    #[error("opening collateral shortfall: required {required}, available {available}")]
    OpeningCollateralShortfall {
        required: Decimal,
        available: Decimal,
    },

    #[error("{0} is not an origination loan")]
    NotAFol(LoanId),

    #[error("{0} already repaid")]
    AlreadyRepaid(LoanId),

    #[error("{0} not repaid yet")]
    NotRepaid(LoanId),

    #[error("{0} already claimed")]
    AlreadyClaimed(LoanId),

    #[error("{user} is not the lender of {loan}")]
    NotLoanLender { loan: LoanId, user: UserId },

    #[error("exit amount {requested} exceeds credit {available} on the loan")]
    ExitExceedsCredit {
        requested: Decimal,
        available: Decimal,
    },

    #[error("{loan} not overdue: due {due_date}, now {now}")]
    NotOverdue {
        loan: LoanId,
        due_date: Time,
        now: Time,
    },

    #[error("{loan} not liquidatable: borrower collateral ratio {ratio} above threshold {threshold}")]
    NotLiquidatable {
        loan: LoanId,
        ratio: Decimal,
        threshold: Decimal,
    },

    #[error("underwater position: assigned collateral {assigned} below debt coverage {coverage}")]
    UnderwaterLiquidation { assigned: Decimal, coverage: Decimal },

    #[error("liquidator cash too low: required {required}, available {available}")]
    LiquidatorCashShortfall {
        required: Decimal,
        available: Decimal,
    },

    #[error("curve error: {0}")]
    Curve(#[from] CurveError),

    #[error("collateral error: {0}")]
    Collateral(#[from] CollateralError),

    #[error("loan error: {0}")]
    Loan(#[from] LoanError),

    #[error("pool error: {0}")]
    Pool(#[from] PoolError),
}
