//! Exit: selling part of a claim's future face value to resting lenders.
//!
//! A spot sale of exact amount in, where the exiting lender is the taker and
//! each candidate lender's resting offer is a liquidity tick. No principal
//! on the underlying loan moves; the buyers acquire SOLs and the seller is
//! paid discounted cash today.

use super::core::LendingBook;
use super::results::{BookError, ExitResult};
use crate::context::Context;
use crate::events::{CreditCarvedEvent, EventPayload, ExitedEvent};
use crate::types::{LoanId, Time, UserId};
use rust_decimal::Decimal;

impl LendingBook {
    /// Sell up to `amount` of the caller's unassigned credit on `loan_id`
    /// to `candidate_lenders`, walked strictly in order. Candidates without
    /// a live offer, without capacity, or without a rate for the due date
    /// are skipped. Returns the unfilled remainder (zero on a full fill).
    pub fn exit(
        &mut self,
        ctx: &Context,
        exiting_lender: UserId,
        loan_id: LoanId,
        amount: Decimal,
        candidate_lenders: &[UserId],
        due_date: Option<Time>,
    ) -> Result<ExitResult, BookError> {
        if amount <= Decimal::ZERO {
            return Err(BookError::NonPositiveAmount { amount });
        }
        let (root, credit) = {
            let loan = self.loans.get(&loan_id).ok_or(BookError::UnknownLoan(loan_id))?;
            if loan.lender != exiting_lender {
                return Err(BookError::NotLoanLender {
                    loan: loan_id,
                    user: exiting_lender,
                });
            }
            if self.root_repaid(loan) {
                // a repaid claim is settled by `claim`, not resold
                return Err(BookError::AlreadyRepaid(loan_id));
            }
            (loan.fol_id(), loan.credit())
        };
        if amount > credit {
            return Err(BookError::ExitExceedsCredit {
                requested: amount,
                available: credit,
            });
        }
        let due_date = match due_date {
            Some(d) => d,
            None => self.loan_due_date(loan_id)?,
        };

        let mut in_left = amount;
        let mut sol_ids = Vec::new();

        for &candidate in candidate_lenders {
            if in_left == Decimal::ZERO {
                break;
            }
            let Some(offer) = self.loan_offers.get(&candidate) else {
                continue;
            };
            let Ok(rate) = offer.curve.rate(due_date, ctx.time) else {
                continue;
            };
            let r = Decimal::ONE + rate;
            // a tick can only pay out cash it actually has in the book
            let capacity = offer.max_amount.min(self.user_book_cash(candidate));
            if capacity <= Decimal::ZERO {
                continue;
            }

            let delta_in = (r * capacity).min(in_left);
            let delta_out = delta_in / r;

            let sol_id = self.create_sol(root, candidate, exiting_lender, delta_in);
            self.loans
                .get_mut(&loan_id)
                .ok_or(BookError::UnknownLoan(loan_id))?
                .lock_credit(delta_in)?;
            self.lend_cash(candidate, exiting_lender, delta_out)?;
            if let Some(offer) = self.loan_offers.get_mut(&candidate) {
                offer.consume(delta_out);
            }
            self.emit_event(
                ctx.time,
                EventPayload::CreditCarved(CreditCarvedEvent {
                    loan_id: sol_id,
                    source_loan_id: loan_id,
                    lender: candidate,
                    face_value: delta_in,
                }),
            );
            sol_ids.push(sol_id);
            in_left -= delta_in;
        }

        self.emit_event(
            ctx.time,
            EventPayload::Exited(ExitedEvent {
                loan_id,
                exiting_lender,
                filled: amount - in_left,
                remainder: in_left,
            }),
        );
        self.check_invariants();
        Ok(ExitResult {
            sol_ids,
            filled: amount - in_left,
            remainder: in_left,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::book::BookConfig;
    use crate::curve::YieldCurve;
    use crate::offer::LoanOffer;
    use crate::types::{Price, Token};
    use rust_decimal_macros::dec;

    fn ctx() -> Context {
        Context::new(Time(0), Price::new_unchecked(dec!(100)))
    }

    fn flat_offer(lender: UserId, max_amount: Decimal, rate: Decimal) -> LoanOffer {
        let curve = YieldCurve::flat(rate, &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11]).unwrap();
        LoanOffer::new(lender, max_amount, Time(10), curve)
    }

    // lender funds a 50-cash loan to the borrower; a second lender rests a
    // 5% offer to exit into
    fn setup() -> (LendingBook, Context, UserId, UserId, LoanId) {
        let mut book = LendingBook::new(BookConfig::default());
        let ctx = ctx();
        let lender = book.create_funded_user(dec!(100), dec!(0));
        let second = book.create_funded_user(dec!(100), dec!(0));
        let borrower = book.create_funded_user(dec!(0), dec!(50));

        book.deposit(&ctx, lender, Token::Cash, dec!(100)).unwrap();
        book.deposit(&ctx, second, Token::Cash, dec!(100)).unwrap();
        book.deposit(&ctx, borrower, Token::Collateral, dec!(50)).unwrap();

        book.lend_as_limit_order(&ctx, flat_offer(lender, dec!(100), dec!(0.03)))
            .unwrap();
        book.lend_as_limit_order(&ctx, flat_offer(second, dec!(100), dec!(0.05)))
            .unwrap();

        let result = book
            .borrow_as_market_order(&ctx, borrower, lender, Time(6), dec!(50), &[])
            .unwrap();
        (book, ctx, lender, second, result.fol_id.unwrap())
    }

    #[test]
    fn partial_exit_carves_sol_and_pays_seller() {
        let (mut book, ctx, lender, second, fol_id) = setup();
        let fv = book.loan(fol_id).unwrap().face_value; // 51.5

        let to_exit = fv * dec!(0.1);
        let result = book
            .exit(&ctx, lender, fol_id, to_exit, &[second], None)
            .unwrap();

        assert_eq!(result.remainder, dec!(0));
        assert_eq!(result.filled, to_exit);
        assert_eq!(result.sol_ids.len(), 1);

        let sol = book.loan(result.sol_ids[0]).unwrap();
        assert_eq!(sol.face_value, to_exit);
        assert_eq!(sol.lender, second);
        assert_eq!(book.loan_credit(fol_id).unwrap(), fv - to_exit);

        // seller got the discounted cash in their wallet; buyer's book cash
        // and offer capacity both shrank by the same amount
        let paid = to_exit / dec!(1.05);
        assert_eq!(book.user(lender).unwrap().wallet_cash.free(), paid);
        assert_eq!(book.user_book_cash(second), dec!(100) - paid);
        assert_eq!(
            book.loan_offer(second).unwrap().max_amount,
            dec!(100) - paid
        );
    }

    #[test]
    fn exit_preconditions_abort_before_mutation() {
        let (mut book, ctx, lender, second, fol_id) = setup();
        let loans_before = book.loan_count();

        // not the lender
        let not_lender = book.exit(&ctx, second, fol_id, dec!(10), &[second], None);
        assert!(matches!(not_lender, Err(BookError::NotLoanLender { .. })));

        // more than the credit
        let too_much = book.exit(&ctx, lender, fol_id, dec!(100), &[second], None);
        assert!(matches!(too_much, Err(BookError::ExitExceedsCredit { .. })));

        assert_eq!(book.loan_count(), loans_before);
    }

    #[test]
    fn exhausted_candidates_leave_a_remainder() {
        let (mut book, ctx, lender, second, fol_id) = setup();

        // drain the second lender's capacity with another borrower first
        let other = book.create_funded_user(dec!(0), dec!(200));
        book.deposit(&ctx, other, Token::Collateral, dec!(200)).unwrap();
        book.borrow_as_market_order(&ctx, other, second, Time(6), dec!(100), &[])
            .unwrap();

        let result = book
            .exit(&ctx, lender, fol_id, dec!(20), &[second], None)
            .unwrap();
        assert_eq!(result.remainder, dec!(20));
        assert!(result.sol_ids.is_empty());
    }

    #[test]
    fn candidate_without_rate_is_skipped() {
        let (mut book, ctx, lender, _second, fol_id) = setup();

        // a candidate whose curve starts after the loan's maturity
        let narrow = book.create_funded_user(dec!(100), dec!(0));
        book.deposit(&ctx, narrow, Token::Cash, dec!(100)).unwrap();
        let curve = YieldCurve::flat(dec!(0.01), &[8, 12]).unwrap();
        book.lend_as_limit_order(&ctx, LoanOffer::new(narrow, dec!(100), Time(12), curve))
            .unwrap();

        let result = book
            .exit(&ctx, lender, fol_id, dec!(10), &[narrow], None)
            .unwrap();
        assert_eq!(result.remainder, dec!(10));
    }

    #[test]
    fn exit_chains_through_multiple_candidates() {
        let (mut book, ctx, lender, second, fol_id) = setup();

        // second lender only has 4 cash in the book; a third picks up the rest
        book.withdraw(&ctx, second, Token::Cash, dec!(96)).unwrap();
        let third = book.create_funded_user(dec!(100), dec!(0));
        book.deposit(&ctx, third, Token::Cash, dec!(100)).unwrap();
        book.lend_as_limit_order(&ctx, flat_offer(third, dec!(100), dec!(0.05)))
            .unwrap();

        let result = book
            .exit(&ctx, lender, fol_id, dec!(21), &[second, third], None)
            .unwrap();

        assert_eq!(result.remainder, dec!(0));
        assert_eq!(result.sol_ids.len(), 2);
        // first tick capped by the second lender's 4 book cash
        let first = book.loan(result.sol_ids[0]).unwrap();
        assert_eq!(first.face_value, dec!(4) * dec!(1.05));
        let chained = book.loan(result.sol_ids[1]).unwrap();
        assert_eq!(chained.face_value, dec!(21) - dec!(4) * dec!(1.05));
    }
}
