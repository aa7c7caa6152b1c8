//! Resting-offer management and market-order matching.
//!
//! Matching runs in two phases: a read-only planning walk over the virtual
//! collateral sources computes every SOL slice and the real-collateral
//! remainder, and only once every precondition (including the remainder's
//! opening-collateral check) has passed does an infallible commit apply the
//! plan. A failed match mutates nothing.

use super::core::LendingBook;
use super::results::{BookError, MatchResult};
use crate::context::Context;
use crate::events::{
    BorrowOfferPlacedEvent, CreditCarvedEvent, EventPayload, LendOfferPlacedEvent,
    LoanOriginatedEvent,
};
use crate::offer::{BorrowOffer, LoanOffer};
use crate::types::{LoanId, OfferId, Time, UserId};
use rust_decimal::Decimal;

// one SOL to be carved during commit
struct PlannedSlice {
    source: LoanId,
    root: LoanId,
    face_value: Decimal,
    cash_out: Decimal,
}

struct CreditPlan {
    slices: Vec<PlannedSlice>,
    // notional still to be sourced from real collateral
    remainder: Decimal,
}

impl LendingBook {
    /// Rest a lender's standing quote. One per lender; replaces any
    /// previous offer.
    pub fn lend_as_limit_order(&mut self, ctx: &Context, offer: LoanOffer) -> Result<(), BookError> {
        if offer.max_amount < Decimal::ZERO {
            return Err(BookError::NonPositiveAmount {
                amount: offer.max_amount,
            });
        }
        if !self.users.contains_key(&offer.lender) {
            return Err(BookError::UnknownUser(offer.lender));
        }
        self.emit_event(
            ctx.time,
            EventPayload::LendOfferPlaced(LendOfferPlacedEvent {
                lender: offer.lender,
                max_amount: offer.max_amount,
                max_due_date: offer.max_due_date,
            }),
        );
        self.loan_offers.insert(offer.lender, offer);
        self.check_invariants();
        Ok(())
    }

    /// Rest a borrower's standing request.
    pub fn borrow_as_limit_order(
        &mut self,
        ctx: &Context,
        offer: BorrowOffer,
    ) -> Result<OfferId, BookError> {
        if offer.max_amount < Decimal::ZERO {
            return Err(BookError::NonPositiveAmount {
                amount: offer.max_amount,
            });
        }
        if !self.users.contains_key(&offer.borrower) {
            return Err(BookError::UnknownUser(offer.borrower));
        }
        let id = self.next_offer_id();
        self.emit_event(
            ctx.time,
            EventPayload::BorrowOfferPlaced(BorrowOfferPlacedEvent {
                offer_id: id,
                borrower: offer.borrower,
                max_amount: offer.max_amount,
            }),
        );
        self.borrow_offers.insert(id, offer);
        self.check_invariants();
        Ok(id)
    }

    /// Borrow `amount` against a lender's resting offer, due at `due_date`.
    ///
    /// Virtual collateral first: loans the borrower holds as lender
    /// (`prior_loan_ids`, consumed strictly in the given order) are carved
    /// into SOLs assigned to the lender. Whatever they do not cover is
    /// backed by deposited collateral under the opening ratio and becomes a
    /// new FOL.
    pub fn borrow_as_market_order(
        &mut self,
        ctx: &Context,
        borrower: UserId,
        lender: UserId,
        due_date: Time,
        amount: Decimal,
        prior_loan_ids: &[LoanId],
    ) -> Result<MatchResult, BookError> {
        if amount <= Decimal::ZERO {
            return Err(BookError::NonPositiveAmount { amount });
        }
        if !self.users.contains_key(&borrower) {
            return Err(BookError::UnknownUser(borrower));
        }

        let offer = self
            .loan_offers
            .get(&lender)
            .ok_or(BookError::NoRestingOffer(lender))?;
        if due_date <= ctx.time {
            return Err(BookError::DueDateNotInFuture {
                due_date,
                now: ctx.time,
            });
        }
        if due_date > offer.max_due_date {
            return Err(BookError::DueDatePastOfferLimit {
                due_date,
                max_due_date: offer.max_due_date,
            });
        }
        if amount > offer.max_amount {
            return Err(BookError::AmountExceedsOfferCapacity {
                requested: amount,
                available: offer.max_amount,
            });
        }
        let rate = offer.curve.rate(due_date, ctx.time)?;
        let r = Decimal::ONE + rate;

        let lender_cash = self.user_ref(lender)?.book_cash;
        if lender_cash < amount {
            return Err(BookError::InsufficientBookCash {
                user: lender,
                requested: amount,
                available: lender_cash,
            });
        }

        let plan = self.plan_credit_walk(borrower, due_date, amount, r, prior_loan_ids)?;
        let result = self.commit_match(ctx, lender, borrower, due_date, amount, r, plan)?;
        if let Some(offer) = self.loan_offers.get_mut(&lender) {
            offer.consume(amount);
        }
        self.check_invariants();
        Ok(result)
    }

    /// Lend `amount` into a resting borrow offer: the mirror of
    /// `borrow_as_market_order`, walking the virtual collateral the offer
    /// itself pledged.
    pub fn lend_as_market_order(
        &mut self,
        ctx: &Context,
        lender: UserId,
        offer_id: OfferId,
        due_date: Time,
        amount: Decimal,
    ) -> Result<MatchResult, BookError> {
        if amount <= Decimal::ZERO {
            return Err(BookError::NonPositiveAmount { amount });
        }
        if !self.users.contains_key(&lender) {
            return Err(BookError::UnknownUser(lender));
        }

        let offer = self
            .borrow_offers
            .get(&offer_id)
            .ok_or(BookError::UnknownBorrowOffer(offer_id))?;
        let borrower = offer.borrower;
        if due_date <= ctx.time {
            return Err(BookError::DueDateNotInFuture {
                due_date,
                now: ctx.time,
            });
        }
        if amount > offer.max_amount {
            return Err(BookError::AmountExceedsOfferCapacity {
                requested: amount,
                available: offer.max_amount,
            });
        }
        let rate = offer.curve.rate(due_date, ctx.time)?;
        let r = Decimal::ONE + rate;
        let prior_loan_ids = offer.virtual_collateral_loan_ids.clone();

        let lender_cash = self.user_ref(lender)?.book_cash;
        if lender_cash < amount {
            return Err(BookError::InsufficientBookCash {
                user: lender,
                requested: amount,
                available: lender_cash,
            });
        }

        let plan = self.plan_credit_walk(borrower, due_date, amount, r, &prior_loan_ids)?;
        let result = self.commit_match(ctx, lender, borrower, due_date, amount, r, plan)?;
        if let Some(offer) = self.borrow_offers.get_mut(&offer_id) {
            offer.consume(amount);
        }
        self.check_invariants();
        Ok(result)
    }

    // read-only pass: decide how much of `amount` the borrower's prior
    // loans can source, and how much falls through to real collateral.
    fn plan_credit_walk(
        &self,
        borrower: UserId,
        due_date: Time,
        amount: Decimal,
        r: Decimal,
        prior_loan_ids: &[LoanId],
    ) -> Result<CreditPlan, BookError> {
        let mut out_left = amount;
        let mut slices = Vec::new();

        for &loan_id in prior_loan_ids {
            if out_left == Decimal::ZERO {
                break;
            }
            let loan = self
                .loans
                .get(&loan_id)
                .ok_or(BookError::UnknownLoan(loan_id))?;
            // only the borrower's own claims count, and only ones maturing
            // no later than the new loan
            if loan.lender != borrower {
                continue;
            }
            if self.root_repaid(loan) {
                continue;
            }
            if due_date < self.loan_due_date(loan_id)? {
                continue;
            }
            let delta_in = (r * out_left).min(loan.credit());
            if delta_in <= Decimal::ZERO {
                continue;
            }
            let delta_out = delta_in / r;
            slices.push(PlannedSlice {
                source: loan_id,
                root: loan.fol_id(),
                face_value: delta_in,
                cash_out: delta_out,
            });
            out_left -= delta_out;
        }

        Ok(CreditPlan {
            slices,
            remainder: out_left,
        })
    }

    // infallible once the plan and the remainder's opening-collateral check
    // pass; performs every mutation of a match.
    fn commit_match(
        &mut self,
        ctx: &Context,
        lender: UserId,
        borrower: UserId,
        due_date: Time,
        amount: Decimal,
        r: Decimal,
        plan: CreditPlan,
    ) -> Result<MatchResult, BookError> {
        let fol_face_value = plan.remainder * r;
        if plan.remainder > Decimal::ZERO {
            let required =
                (fol_face_value / ctx.price.value()) * self.config.risk.cr_opening;
            let free = self.user_ref(borrower)?.free_collateral();
            if free < required {
                return Err(BookError::OpeningCollateralShortfall {
                    required,
                    available: free,
                });
            }
        }

        let mut sol_ids = Vec::with_capacity(plan.slices.len());
        for slice in &plan.slices {
            let sol_id = self.create_sol(slice.root, lender, borrower, slice.face_value);
            self.loans
                .get_mut(&slice.source)
                .ok_or(BookError::UnknownLoan(slice.source))?
                .lock_credit(slice.face_value)?;
            self.lend_cash(lender, borrower, slice.cash_out)?;
            self.emit_event(
                ctx.time,
                EventPayload::CreditCarved(CreditCarvedEvent {
                    loan_id: sol_id,
                    source_loan_id: slice.source,
                    lender,
                    face_value: slice.face_value,
                }),
            );
            sol_ids.push(sol_id);
        }

        let fol_id = if plan.remainder > Decimal::ZERO {
            self.lend_cash(lender, borrower, plan.remainder)?;
            self.user_mut(borrower)?.debt_covered_by_real_collateral += fol_face_value;
            let id = self.create_fol(lender, borrower, fol_face_value, due_date);
            self.emit_event(
                ctx.time,
                EventPayload::LoanOriginated(LoanOriginatedEvent {
                    loan_id: id,
                    lender,
                    borrower,
                    face_value: fol_face_value,
                    due_date,
                }),
            );
            Some(id)
        } else {
            None
        };

        Ok(MatchResult {
            sol_ids,
            fol_id,
            cash_transferred: amount,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::book::BookConfig;
    use crate::curve::YieldCurve;
    use crate::types::{Price, Token};
    use rust_decimal_macros::dec;

    fn ctx() -> Context {
        Context::new(Time(0), Price::new_unchecked(dec!(100)))
    }

    fn flat_offer(lender: UserId, max_amount: Decimal, rate: Decimal) -> LoanOffer {
        let curve = YieldCurve::flat(rate, &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11]).unwrap();
        LoanOffer::new(lender, max_amount, Time(10), curve)
    }

    fn setup() -> (LendingBook, Context, UserId, UserId) {
        let mut book = LendingBook::new(BookConfig::default());
        let ctx = ctx();
        let lender = book.create_funded_user(dec!(100), dec!(0));
        let borrower = book.create_funded_user(dec!(0), dec!(50));
        book.deposit(&ctx, lender, Token::Cash, dec!(100)).unwrap();
        book.deposit(&ctx, borrower, Token::Collateral, dec!(50)).unwrap();
        book.lend_as_limit_order(&ctx, flat_offer(lender, dec!(100), dec!(0.03)))
            .unwrap();
        (book, ctx, lender, borrower)
    }

    #[test]
    fn borrow_creates_fol_with_interest() {
        let (mut book, ctx, lender, borrower) = setup();

        let result = book
            .borrow_as_market_order(&ctx, borrower, lender, Time(6), dec!(100), &[])
            .unwrap();

        let fol_id = result.fol_id.unwrap();
        let fol = book.loan(fol_id).unwrap();
        assert_eq!(fol.face_value, dec!(103));
        assert_eq!(fol.credit(), dec!(103));
        assert_eq!(fol.lender, lender);
        assert_eq!(fol.borrower, borrower);
        assert!(result.sol_ids.is_empty());

        // cash flowed book-ledger -> borrower wallet
        assert_eq!(book.user_book_cash(lender), dec!(0));
        assert_eq!(book.user(borrower).unwrap().wallet_cash.free(), dec!(100));
        // offer capacity depleted
        assert!(book.loan_offer(lender).unwrap().is_exhausted());
        // debt registered against real collateral
        assert_eq!(
            book.user(borrower).unwrap().debt_covered_by_real_collateral,
            dec!(103)
        );
    }

    #[test]
    fn borrow_rejects_bad_due_dates() {
        let (mut book, ctx, lender, borrower) = setup();

        let past = book.borrow_as_market_order(&ctx, borrower, lender, Time(0), dec!(10), &[]);
        assert!(matches!(past, Err(BookError::DueDateNotInFuture { .. })));

        let beyond = book.borrow_as_market_order(&ctx, borrower, lender, Time(11), dec!(10), &[]);
        assert!(matches!(beyond, Err(BookError::DueDatePastOfferLimit { .. })));

        assert_eq!(book.loan_count(), 0);
    }

    #[test]
    fn borrow_rejects_oversized_amount() {
        let (mut book, ctx, lender, borrower) = setup();
        let result = book.borrow_as_market_order(&ctx, borrower, lender, Time(6), dec!(101), &[]);
        assert!(matches!(
            result,
            Err(BookError::AmountExceedsOfferCapacity { .. })
        ));
    }

    #[test]
    fn borrow_rejects_collateral_shortfall_without_partial_fill() {
        let (mut book, ctx, lender, borrower) = setup();

        // 50 collateral at price 100 = 5000 value; fine for 100 borrowed.
        // drop the price so the opening check fails.
        let poor_ctx = Context::new(Time(0), Price::new_unchecked(dec!(3)));
        let result =
            book.borrow_as_market_order(&poor_ctx, borrower, lender, Time(6), dec!(100), &[]);
        assert!(matches!(
            result,
            Err(BookError::OpeningCollateralShortfall { .. })
        ));

        // nothing moved: no loans, full offer capacity, lender cash intact
        assert_eq!(book.loan_count(), 0);
        assert_eq!(book.loan_offer(lender).unwrap().max_amount, dec!(100));
        assert_eq!(book.user_book_cash(lender), dec!(100));
    }

    #[test]
    fn borrow_with_virtual_collateral_carves_sol() {
        let (mut book, ctx, lender, borrower) = setup();

        // borrower takes the first loan; lender now holds a claim they can
        // borrow against in turn
        book.borrow_as_market_order(&ctx, borrower, lender, Time(6), dec!(100), &[])
            .unwrap();

        let second_lender = book.create_funded_user(dec!(100), dec!(0));
        book.deposit(&ctx, second_lender, Token::Cash, dec!(100)).unwrap();
        book.lend_as_limit_order(&ctx, flat_offer(second_lender, dec!(100), dec!(0.02)))
            .unwrap();

        // the original lender borrows from the second using loan 0 as
        // virtual collateral; no real collateral needed
        let result = book
            .borrow_as_market_order(&ctx, lender, second_lender, Time(6), dec!(100), &[LoanId(0)])
            .unwrap();

        assert!(result.fol_id.is_none());
        assert_eq!(result.sol_ids.len(), 1);

        let sol = book.loan(result.sol_ids[0]).unwrap();
        assert!(!sol.is_fol());
        assert_eq!(sol.lender, second_lender);
        assert_eq!(sol.borrower, lender);
        assert_eq!(sol.face_value, dec!(102)); // 100 * 1.02

        // source credit shrank by the carved face value
        assert_eq!(book.loan_credit(LoanId(0)).unwrap(), dec!(103) - dec!(102));
        // lender received the cash in their wallet
        assert_eq!(book.user(lender).unwrap().wallet_cash.free(), dec!(100));
        // no new covered debt for the virtual-collateral borrower
        assert_eq!(
            book.user(lender).unwrap().debt_covered_by_real_collateral,
            dec!(0)
        );
    }

    #[test]
    fn virtual_collateral_skips_later_maturities() {
        let (mut book, ctx, lender, borrower) = setup();
        book.borrow_as_market_order(&ctx, borrower, lender, Time(8), dec!(100), &[])
            .unwrap();

        let second_lender = book.create_funded_user(dec!(100), dec!(0));
        book.deposit(&ctx, second_lender, Token::Cash, dec!(100)).unwrap();
        book.lend_as_limit_order(&ctx, flat_offer(second_lender, dec!(100), dec!(0.02)))
            .unwrap();

        // loan 0 matures at 8, the request at 6: the source is skipped and
        // the lender has no real collateral deposited
        let result =
            book.borrow_as_market_order(&ctx, lender, second_lender, Time(6), dec!(50), &[LoanId(0)]);
        assert!(matches!(
            result,
            Err(BookError::OpeningCollateralShortfall { .. })
        ));
    }

    #[test]
    fn lend_as_market_order_matches_resting_borrow() {
        let mut book = LendingBook::new(BookConfig::default());
        let ctx = ctx();
        let lender = book.create_funded_user(dec!(100), dec!(0));
        let borrower = book.create_funded_user(dec!(0), dec!(50));
        book.deposit(&ctx, lender, Token::Cash, dec!(100)).unwrap();
        book.deposit(&ctx, borrower, Token::Collateral, dec!(50)).unwrap();

        let curve = YieldCurve::flat(dec!(0.04), &[0, 12]).unwrap();
        let offer_id = book
            .borrow_as_limit_order(&ctx, BorrowOffer::new(borrower, dec!(80), curve, vec![]))
            .unwrap();

        let result = book
            .lend_as_market_order(&ctx, lender, offer_id, Time(6), dec!(80))
            .unwrap();

        let fol = book.loan(result.fol_id.unwrap()).unwrap();
        assert_eq!(fol.face_value, dec!(80) * dec!(1.04));
        assert_eq!(fol.lender, lender);
        assert_eq!(fol.borrower, borrower);
        assert!(book.borrow_offer(offer_id).unwrap().is_exhausted());
        assert_eq!(book.user(borrower).unwrap().wallet_cash.free(), dec!(80));
    }
}
