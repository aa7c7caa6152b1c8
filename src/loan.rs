//! Loan records: FOLs and the SOLs carved out of them.
//!
//! A FOL (fixed origination loan) is the root claim/debt record created when
//! a borrow is matched. A SOL is a slice of a FOL's future face value
//! reassigned to a different lender; no principal moves when one is carved.
//! SOLs always reference their root FOL directly, even when carved from
//! another SOL, so due date and repayment status resolve in one hop.

use crate::types::{LoanId, Time, UserId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Loan {
    pub id: LoanId,
    pub lender: UserId,
    pub borrower: UserId,
    // amount owed at maturity, interest included
    pub face_value: Decimal,
    // portion of the face value reassigned to SOL holders
    pub amount_exited: Decimal,
    // each lender claims their own slice exactly once
    pub claimed: bool,
    pub kind: LoanKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LoanKind {
    Fol { due_date: Time, repaid: bool },
    Sol { fol: LoanId },
}

impl Loan {
    pub fn new_fol(
        id: LoanId,
        lender: UserId,
        borrower: UserId,
        face_value: Decimal,
        due_date: Time,
    ) -> Self {
        debug_assert!(face_value > Decimal::ZERO);
        Self {
            id,
            lender,
            borrower,
            face_value,
            amount_exited: Decimal::ZERO,
            claimed: false,
            kind: LoanKind::Fol {
                due_date,
                repaid: false,
            },
        }
    }

    pub fn new_sol(
        id: LoanId,
        fol: LoanId,
        lender: UserId,
        borrower: UserId,
        face_value: Decimal,
    ) -> Self {
        debug_assert!(face_value > Decimal::ZERO);
        Self {
            id,
            lender,
            borrower,
            face_value,
            amount_exited: Decimal::ZERO,
            claimed: false,
            kind: LoanKind::Sol { fol },
        }
    }

    pub fn is_fol(&self) -> bool {
        matches!(self.kind, LoanKind::Fol { .. })
    }

    /// Id of the root FOL: self for a FOL, the stored reference for a SOL.
    pub fn fol_id(&self) -> LoanId {
        match self.kind {
            LoanKind::Fol { .. } => self.id,
            LoanKind::Sol { fol } => fol,
        }
    }

    /// Unassigned portion of the face value, available to back new SOLs
    /// or to be claimed once the root is repaid.
    pub fn credit(&self) -> Decimal {
        self.face_value - self.amount_exited
    }

    /// Reserve `amount` of this loan's credit for a newly carved SOL.
    pub fn lock_credit(&mut self, amount: Decimal) -> Result<(), LoanError> {
        if amount < Decimal::ZERO || amount > self.credit() {
            return Err(LoanError::CreditExceeded {
                loan: self.id,
                requested: amount,
                available: self.credit(),
            });
        }
        self.amount_exited += amount;
        debug_assert!(self.amount_exited <= self.face_value);
        Ok(())
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum LoanError {
    #[error("{loan}: credit exceeded, requested {requested}, available {available}")]
    CreditExceeded {
        loan: LoanId,
        requested: Decimal,
        available: Decimal,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn credit_shrinks_as_locked() {
        let mut fol = Loan::new_fol(LoanId(0), UserId(1), UserId(2), dec!(103), Time(6));
        assert_eq!(fol.credit(), dec!(103));

        fol.lock_credit(dec!(10.3)).unwrap();
        assert_eq!(fol.credit(), dec!(92.7));
        assert_eq!(fol.amount_exited, dec!(10.3));
    }

    #[test]
    fn lock_beyond_credit_fails() {
        let mut fol = Loan::new_fol(LoanId(0), UserId(1), UserId(2), dec!(100), Time(6));
        fol.lock_credit(dec!(90)).unwrap();

        let result = fol.lock_credit(dec!(11));
        assert!(matches!(result, Err(LoanError::CreditExceeded { .. })));
        assert_eq!(fol.credit(), dec!(10));
    }

    #[test]
    fn sol_resolves_root_fol() {
        let fol = Loan::new_fol(LoanId(0), UserId(1), UserId(2), dec!(100), Time(6));
        let sol = Loan::new_sol(LoanId(1), fol.id, UserId(3), UserId(1), dec!(40));

        assert_eq!(fol.fol_id(), LoanId(0));
        assert_eq!(sol.fol_id(), LoanId(0));
        assert!(!sol.is_fol());
    }
}
