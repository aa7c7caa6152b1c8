// resting orders. a LoanOffer is a lender's standing quote (one per lender,
// keyed by their id); a BorrowOffer is a borrower's standing request, keyed
// by OfferId. both expose a yield curve and a depletable notional cap.

use crate::curve::YieldCurve;
use crate::types::{LoanId, Time, UserId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoanOffer {
    pub lender: UserId,
    pub max_amount: Decimal,
    pub max_due_date: Time,
    pub curve: YieldCurve,
}

impl LoanOffer {
    pub fn new(lender: UserId, max_amount: Decimal, max_due_date: Time, curve: YieldCurve) -> Self {
        debug_assert!(max_amount >= Decimal::ZERO);
        Self {
            lender,
            max_amount,
            max_due_date,
            curve,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.max_amount == Decimal::ZERO
    }

    // capacity only ever shrinks; exceeding it is an engine bug, not an
    // operation failure
    pub(crate) fn consume(&mut self, amount: Decimal) {
        debug_assert!(amount >= Decimal::ZERO && amount <= self.max_amount);
        self.max_amount -= amount;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BorrowOffer {
    pub borrower: UserId,
    pub max_amount: Decimal,
    pub curve: YieldCurve,
    // loans the borrower holds as lender, offered up as virtual collateral
    pub virtual_collateral_loan_ids: Vec<LoanId>,
}

impl BorrowOffer {
    pub fn new(
        borrower: UserId,
        max_amount: Decimal,
        curve: YieldCurve,
        virtual_collateral_loan_ids: Vec<LoanId>,
    ) -> Self {
        debug_assert!(max_amount >= Decimal::ZERO);
        Self {
            borrower,
            max_amount,
            curve,
            virtual_collateral_loan_ids,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.max_amount == Decimal::ZERO
    }

    pub(crate) fn consume(&mut self, amount: Decimal) {
        debug_assert!(amount >= Decimal::ZERO && amount <= self.max_amount);
        self.max_amount -= amount;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn capacity_depletes_to_zero() {
        let curve = YieldCurve::flat(dec!(0.03), &[0, 10]).unwrap();
        let mut offer = LoanOffer::new(UserId(1), dec!(100), Time(10), curve);

        offer.consume(dec!(60));
        assert_eq!(offer.max_amount, dec!(40));
        assert!(!offer.is_exhausted());

        offer.consume(dec!(40));
        assert!(offer.is_exhausted());
    }
}
