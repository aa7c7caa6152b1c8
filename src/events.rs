// 9.0: every state change in the book produces an event. used for audit
// trails and state reconstruction by a driving harness.

use crate::types::{LoanId, OfferId, Time, UserId, VarLoanId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(pub u64);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub time: Time,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(id: EventId, time: Time, payload: EventPayload) -> Self {
        Self { id, time, payload }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    // funds
    Deposit(DepositEvent),
    Withdrawal(WithdrawalEvent),
    WithdrawalRejected(WithdrawalRejectedEvent),

    // resting orders
    LendOfferPlaced(LendOfferPlacedEvent),
    BorrowOfferPlaced(BorrowOfferPlacedEvent),

    // loan lifecycle
    LoanOriginated(LoanOriginatedEvent),
    CreditCarved(CreditCarvedEvent),
    Exited(ExitedEvent),
    Repaid(RepaidEvent),
    Claimed(ClaimedEvent),

    // variable pool
    RolledToVariablePool(RolledToVariablePoolEvent),
    VariableLoanOpened(VariableLoanOpenedEvent),
    VariableLoanRepaid(VariableLoanRepaidEvent),

    // risk
    Liquidated(LiquidatedEvent),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepositEvent {
    pub user: UserId,
    pub token: crate::types::Token,
    pub amount: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawalEvent {
    pub user: UserId,
    pub token: crate::types::Token,
    pub amount: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawalRejectedEvent {
    pub user: UserId,
    pub token: crate::types::Token,
    pub amount: Decimal,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LendOfferPlacedEvent {
    pub lender: UserId,
    pub max_amount: Decimal,
    pub max_due_date: Time,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BorrowOfferPlacedEvent {
    pub offer_id: OfferId,
    pub borrower: UserId,
    pub max_amount: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoanOriginatedEvent {
    pub loan_id: LoanId,
    pub lender: UserId,
    pub borrower: UserId,
    pub face_value: Decimal,
    pub due_date: Time,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditCarvedEvent {
    pub loan_id: LoanId,
    pub source_loan_id: LoanId,
    pub lender: UserId,
    pub face_value: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExitedEvent {
    pub loan_id: LoanId,
    pub exiting_lender: UserId,
    pub filled: Decimal,
    pub remainder: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepaidEvent {
    pub loan_id: LoanId,
    pub borrower: UserId,
    pub face_value: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimedEvent {
    pub loan_id: LoanId,
    pub lender: UserId,
    pub amount: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RolledToVariablePoolEvent {
    pub loan_id: LoanId,
    pub var_loan_id: VarLoanId,
    pub borrower: UserId,
    pub principal: Decimal,
    pub collateral_assigned: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariableLoanOpenedEvent {
    pub var_loan_id: VarLoanId,
    pub borrower: UserId,
    pub principal: Decimal,
    pub collateral_amount: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariableLoanRepaidEvent {
    pub var_loan_id: VarLoanId,
    pub borrower: UserId,
    pub debt: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidatedEvent {
    pub loan_id: LoanId,
    pub borrower: UserId,
    pub liquidator: UserId,
    pub debt_repaid: Decimal,
    pub collateral_seized: Decimal,
    pub protocol_share: Decimal,
    pub liquidator_premium: Decimal,
    pub borrower_rebate: Decimal,
}
