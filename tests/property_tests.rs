//! Property-based tests for the core accounting invariants.
//!
//! These verify conservation and monotonicity hold under random inputs.

use credit_core::*;
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

// Strategies for generating test data
fn amount_strategy() -> impl Strategy<Value = Decimal> {
    (1i64..1_000_000i64).prop_map(|x| Decimal::new(x, 2)) // 0.01 to 10,000.00
}

fn small_amount_strategy() -> impl Strategy<Value = Decimal> {
    (1i64..5_000i64).prop_map(|x| Decimal::new(x, 2)) // 0.01 to 50.00
}

fn rate_strategy() -> impl Strategy<Value = Decimal> {
    (1i64..=2_000i64).prop_map(|x| Decimal::new(x, 4)) // 0.01% to 20%
}

fn flat_curve(rate: Decimal) -> YieldCurve {
    YieldCurve::flat(rate, &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11]).unwrap()
}

fn ctx_at(time: i64, price: Decimal) -> Context {
    Context::new(Time(time), Price::new_unchecked(price))
}

proptest! {
    /// free + locked is invariant under any lock/unlock sequence, and the
    /// two-party total is invariant under transfers, whether or not the
    /// individual operations succeed.
    #[test]
    fn account_operations_conserve_value(
        initial in amount_strategy(),
        ops in prop::collection::vec((0u8..3u8, amount_strategy()), 1..20),
    ) {
        let mut a = CollateralAccount::new(initial);
        let mut b = CollateralAccount::new(Decimal::ZERO);
        let combined = a.total() + b.total();

        for (op, amount) in ops {
            match op {
                0 => { let _ = a.lock(amount); }
                1 => { let _ = a.unlock(amount); }
                _ => { let _ = a.transfer(&mut b, amount); }
            }
            prop_assert!(a.free() >= Decimal::ZERO);
            prop_assert!(a.locked() >= Decimal::ZERO);
            prop_assert!(b.free() >= Decimal::ZERO);
            prop_assert_eq!(a.total() + b.total(), combined);
        }
    }

    /// An interpolated rate never leaves the band of its bracketing buckets.
    #[test]
    fn interpolated_rate_stays_in_band(
        r0 in rate_strategy(),
        r1 in rate_strategy(),
        delta in 0i64..=10i64,
    ) {
        let curve = YieldCurve::new(vec![(0, r0), (10, r1)]).unwrap();
        let rate = curve.rate(Time(delta), Time(0)).unwrap();
        let (lo, hi) = if r0 <= r1 { (r0, r1) } else { (r1, r0) };
        prop_assert!(rate >= lo && rate <= hi);
    }

    /// Outside the curve domain the rate is unavailable, never extrapolated.
    #[test]
    fn rate_unavailable_outside_domain(
        r in rate_strategy(),
        delta in 11i64..100i64,
    ) {
        let curve = YieldCurve::new(vec![(2, r), (10, r)]).unwrap();
        prop_assert!(curve.rate(Time(delta), Time(0)).is_err());
        prop_assert!(curve.rate(Time(1), Time(0)).is_err());
    }

    /// Offer capacity only ever shrinks and never goes negative, no matter
    /// which market orders succeed or fail.
    #[test]
    fn offer_capacity_is_non_increasing(
        amounts in prop::collection::vec(small_amount_strategy(), 1..10),
    ) {
        let mut book = LendingBook::new(BookConfig::default());
        let ctx = ctx_at(0, dec!(100));
        let lender = book.create_funded_user(dec!(100), dec!(0));
        let borrower = book.create_funded_user(dec!(0), dec!(1_000));
        book.deposit(&ctx, lender, Token::Cash, dec!(100)).unwrap();
        book.deposit(&ctx, borrower, Token::Collateral, dec!(1_000)).unwrap();
        book.lend_as_limit_order(
            &ctx,
            LoanOffer::new(lender, dec!(100), Time(10), flat_curve(dec!(0.03))),
        )
        .unwrap();

        let mut last = dec!(100);
        for amount in amounts {
            let _ = book.borrow_as_market_order(&ctx, borrower, lender, Time(6), amount, &[]);
            let capacity = book.loan_offer(lender).unwrap().max_amount;
            prop_assert!(capacity >= Decimal::ZERO);
            prop_assert!(capacity <= last);
            last = capacity;
        }
    }

    /// However a claim is sliced up, the exited amount stays within the
    /// face value and the carved SOLs account for it exactly.
    #[test]
    fn exits_stay_within_face_value(
        amounts in prop::collection::vec(small_amount_strategy(), 1..10),
    ) {
        let mut book = LendingBook::new(BookConfig::default());
        let ctx = ctx_at(0, dec!(100));
        let lender = book.create_funded_user(dec!(100), dec!(0));
        let buyer = book.create_funded_user(dec!(1_000), dec!(0));
        let borrower = book.create_funded_user(dec!(0), dec!(50));
        book.deposit(&ctx, lender, Token::Cash, dec!(100)).unwrap();
        book.deposit(&ctx, buyer, Token::Cash, dec!(1_000)).unwrap();
        book.deposit(&ctx, borrower, Token::Collateral, dec!(50)).unwrap();
        book.lend_as_limit_order(
            &ctx,
            LoanOffer::new(lender, dec!(100), Time(10), flat_curve(dec!(0.03))),
        )
        .unwrap();
        book.lend_as_limit_order(
            &ctx,
            LoanOffer::new(buyer, dec!(1_000), Time(10), flat_curve(dec!(0.05))),
        )
        .unwrap();

        let fol_id = book
            .borrow_as_market_order(&ctx, borrower, lender, Time(6), dec!(100), &[])
            .unwrap()
            .fol_id
            .unwrap();

        let mut sol_total = Decimal::ZERO;
        for amount in amounts {
            if let Ok(result) = book.exit(&ctx, lender, fol_id, amount, &[buyer], None) {
                sol_total += result.filled;
            }
            let fol = book.loan(fol_id).unwrap();
            prop_assert!(fol.amount_exited >= Decimal::ZERO);
            prop_assert!(fol.amount_exited <= fol.face_value);
            prop_assert_eq!(fol.amount_exited, sol_total);
            prop_assert_eq!(fol.credit(), fol.face_value - sol_total);
        }
    }

    /// claim succeeds exactly once per loan regardless of how often it is
    /// retried.
    #[test]
    fn claim_succeeds_at_most_once(attempts in 2usize..6usize) {
        let mut book = LendingBook::new(BookConfig::default());
        let ctx = ctx_at(0, dec!(100));
        let lender = book.create_funded_user(dec!(100), dec!(0));
        let borrower = book.create_funded_user(dec!(200), dec!(50));
        book.deposit(&ctx, lender, Token::Cash, dec!(100)).unwrap();
        book.deposit(&ctx, borrower, Token::Collateral, dec!(50)).unwrap();
        book.lend_as_limit_order(
            &ctx,
            LoanOffer::new(lender, dec!(100), Time(10), flat_curve(dec!(0.03))),
        )
        .unwrap();
        let fol_id = book
            .borrow_as_market_order(&ctx, borrower, lender, Time(6), dec!(100), &[])
            .unwrap()
            .fol_id
            .unwrap();
        book.repay(&ctx, fol_id).unwrap();

        let mut successes = 0;
        for _ in 0..attempts {
            if book.claim(&ctx, fol_id).is_ok() {
                successes += 1;
            }
        }
        prop_assert_eq!(successes, 1);
        prop_assert_eq!(book.user_book_cash(lender), dec!(103));
    }

    /// Pool debt accrual is monotone in elapsed time.
    #[test]
    fn pool_debt_grows_with_time(
        principal in small_amount_strategy(),
        t1 in 1i64..50i64,
        t2 in 51i64..100i64,
    ) {
        let mut book = LendingBook::new(BookConfig::default());
        book.fund_pool(dec!(100_000));
        let user = book.create_funded_user(dec!(0), dec!(1_000));
        let ctx = ctx_at(0, dec!(100));

        let id = book
            .take_variable_loan(&ctx, user, principal, dec!(1_000))
            .unwrap();

        let d0 = book.pool().current_debt(id, Time(0)).unwrap();
        let d1 = book.pool().current_debt(id, Time(t1)).unwrap();
        let d2 = book.pool().current_debt(id, Time(t2)).unwrap();
        prop_assert_eq!(d0, principal);
        prop_assert!(d1 < d2);
        prop_assert!(d0 < d1);
    }
}
