//! Credit Market Core Simulation.
//!
//! Drives the engine through full lifecycles: matching, credit chains,
//! exits, repayment, rollover into the variable pool, and liquidation.

use credit_core::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn main() {
    println!("Credit Market Core Engine Simulation");
    println!("Fixed-Rate Order Book, Variable Pool, Full Lifecycle\n");

    scenario_1_borrow_and_repay();
    scenario_2_virtual_collateral_chain();
    scenario_3_exit();
    scenario_4_rollover();
    scenario_5_liquidation();

    println!("\nAll simulations completed successfully.");
}

fn flat_curve(rate: Decimal) -> YieldCurve {
    YieldCurve::flat(rate, &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11]).unwrap()
}

/// Basic lifecycle: deposit, rest an offer, borrow, repay, claim.
fn scenario_1_borrow_and_repay() {
    println!("Scenario 1: Borrow and Repay\n");

    let mut book = LendingBook::new(BookConfig::default());
    let ctx = Context::new(Time(0), Price::new_unchecked(dec!(100)));

    let alice = book.create_funded_user(dec!(100), dec!(0));
    let james = book.create_funded_user(dec!(100), dec!(50));

    book.deposit(&ctx, alice, Token::Cash, dec!(100)).unwrap();
    book.deposit(&ctx, james, Token::Collateral, dec!(50)).unwrap();
    println!("  Alice deposits 100 cash, James deposits 50 collateral");

    book.lend_as_limit_order(
        &ctx,
        LoanOffer::new(alice, dec!(100), Time(10), flat_curve(dec!(0.03))),
    )
    .unwrap();
    println!("  Alice rests 100 at a flat 3% to maturity 10");

    let result = book
        .borrow_as_market_order(&ctx, james, alice, Time(6), dec!(100), &[])
        .unwrap();
    let fol_id = result.fol_id.unwrap();
    let fol = book.loan(fol_id).unwrap();
    println!("  James borrows 100 due at 6: FV = {}", fol.face_value);

    book.repay(&ctx, fol_id).unwrap();
    let claimed = book.claim(&ctx, fol_id).unwrap();
    println!("  James repays; Alice claims {}\n", claimed);
}

/// A lender borrows against their own claim instead of posting collateral.
fn scenario_2_virtual_collateral_chain() {
    println!("Scenario 2: Virtual Collateral Chain\n");

    let mut book = LendingBook::new(BookConfig::default());
    let ctx = Context::new(Time(0), Price::new_unchecked(dec!(100)));

    let bob = book.create_funded_user(dec!(100), dec!(0));
    let james = book.create_funded_user(dec!(100), dec!(0));
    let alice = book.create_funded_user(dec!(0), dec!(50));

    book.deposit(&ctx, bob, Token::Cash, dec!(100)).unwrap();
    book.deposit(&ctx, james, Token::Cash, dec!(100)).unwrap();
    book.deposit(&ctx, alice, Token::Collateral, dec!(50)).unwrap();

    book.lend_as_limit_order(
        &ctx,
        LoanOffer::new(bob, dec!(100), Time(10), flat_curve(dec!(0.03))),
    )
    .unwrap();
    book.lend_as_limit_order(
        &ctx,
        LoanOffer::new(james, dec!(100), Time(12), flat_curve(dec!(0.05))),
    )
    .unwrap();

    let first = book
        .borrow_as_market_order(&ctx, alice, bob, Time(5), dec!(70), &[])
        .unwrap();
    let fol_id = first.fol_id.unwrap();
    println!(
        "  Alice borrows 70 from Bob against real collateral: FV = {}",
        book.loan(fol_id).unwrap().face_value
    );

    let second = book
        .borrow_as_market_order(&ctx, bob, james, Time(10), dec!(35), &[fol_id])
        .unwrap();
    let sol = book.loan(second.sol_ids[0]).unwrap();
    println!(
        "  Bob borrows 35 from James against that claim: SOL FV = {}",
        sol.face_value
    );
    println!(
        "  Bob wallet cash: {}, remaining credit on the source: {}\n",
        book.user(bob).unwrap().wallet_cash.free(),
        book.loan_credit(fol_id).unwrap()
    );
}

/// Selling part of a claim to another resting lender before maturity.
fn scenario_3_exit() {
    println!("Scenario 3: Exit\n");

    let mut book = LendingBook::new(BookConfig::default());
    let ctx = Context::new(Time(0), Price::new_unchecked(dec!(100)));

    let bob = book.create_funded_user(dec!(100), dec!(0));
    let candy = book.create_funded_user(dec!(100), dec!(0));
    let alice = book.create_funded_user(dec!(0), dec!(50));

    book.deposit(&ctx, bob, Token::Cash, dec!(100)).unwrap();
    book.deposit(&ctx, candy, Token::Cash, dec!(100)).unwrap();
    book.deposit(&ctx, alice, Token::Collateral, dec!(50)).unwrap();

    book.lend_as_limit_order(
        &ctx,
        LoanOffer::new(bob, dec!(100), Time(10), flat_curve(dec!(0.03))),
    )
    .unwrap();
    book.lend_as_limit_order(
        &ctx,
        LoanOffer::new(candy, dec!(100), Time(10), flat_curve(dec!(0.05))),
    )
    .unwrap();

    let result = book
        .borrow_as_market_order(&ctx, alice, bob, Time(6), dec!(50), &[])
        .unwrap();
    let fol_id = result.fol_id.unwrap();
    let fv = book.loan(fol_id).unwrap().face_value;
    println!("  Bob lends 50 to Alice: FV = {}", fv);

    let to_exit = fv * dec!(0.1);
    let exit = book
        .exit(&ctx, bob, fol_id, to_exit, &[candy], None)
        .unwrap();
    println!(
        "  Bob exits {} of face value to Candy: filled {}, remainder {}",
        to_exit, exit.filled, exit.remainder
    );
    println!(
        "  Bob's remaining credit: {}, wallet cash from the sale: {}\n",
        book.loan_credit(fol_id).unwrap(),
        book.user(bob).unwrap().wallet_cash.free()
    );
}

/// An overdue loan rolls into the variable pool instead of defaulting.
fn scenario_4_rollover() {
    println!("Scenario 4: Rollover to the Variable Pool\n");

    let mut book = LendingBook::new(BookConfig::default());
    book.fund_pool(dec!(100_000));
    let mut ctx = Context::new(Time(0), Price::new_unchecked(dec!(100)));

    let bob = book.create_funded_user(dec!(100), dec!(0));
    let alice = book.create_funded_user(dec!(200), dec!(50));

    book.deposit(&ctx, bob, Token::Cash, dec!(100)).unwrap();
    book.deposit(&ctx, alice, Token::Collateral, dec!(50)).unwrap();
    book.lend_as_limit_order(
        &ctx,
        LoanOffer::new(bob, dec!(100), Time(10), flat_curve(dec!(0.03))),
    )
    .unwrap();

    let result = book
        .borrow_as_market_order(&ctx, alice, bob, Time(5), dec!(70), &[])
        .unwrap();
    let fol_id = result.fol_id.unwrap();
    println!("  Alice borrows 70 due at 5");

    ctx.update(Time(6), Price::new_unchecked(dec!(100))).unwrap();
    let rollover = book.move_to_variable_pool(&ctx, fol_id).unwrap();
    println!(
        "  At t=6 the loan is overdue; rolled into the pool: principal {}, collateral locked {}",
        rollover.principal, rollover.collateral_assigned
    );
    println!(
        "  Pool utilization {}, rate per tick {}",
        book.pool().utilization(),
        book.pool().rate_per_tick()
    );

    ctx.update(Time(9), Price::new_unchecked(dec!(100))).unwrap();
    let debt = book.repay_variable_loan(&ctx, rollover.var_loan_id).unwrap();
    println!("  Alice settles the variable loan at t=9 for {}\n", debt);
}

/// A price crash makes a borrower liquidatable; the liquidator converts
/// the seized collateral back to cash through the swap facility.
fn scenario_5_liquidation() {
    println!("Scenario 5: Liquidation\n");

    let mut book = LendingBook::new(BookConfig::default());
    let mut ctx = Context::new(Time(0), Price::new_unchecked(dec!(100)));

    let bob = book.create_funded_user(dec!(100), dec!(0));
    let alice = book.create_funded_user(dec!(0), dec!(2));
    let liquidator = book.create_funded_user(dec!(10_000), dec!(0));

    book.deposit(&ctx, bob, Token::Cash, dec!(100)).unwrap();
    book.deposit(&ctx, alice, Token::Collateral, dec!(2)).unwrap();
    book.lend_as_limit_order(
        &ctx,
        LoanOffer::new(bob, dec!(100), Time(10), flat_curve(dec!(0.03))),
    )
    .unwrap();

    let result = book
        .borrow_as_market_order(&ctx, alice, bob, Time(6), dec!(100), &[])
        .unwrap();
    let fol_id = result.fol_id.unwrap();
    let ratio = book.borrower_collateral_ratio(&ctx, alice).unwrap().unwrap();
    println!("  Alice borrows 100 against 2 collateral; CR = {:.4}", ratio);

    ctx.update(Time(1), Price::new_unchecked(dec!(60))).unwrap();
    let ratio = book.borrower_collateral_ratio(&ctx, alice).unwrap().unwrap();
    println!("  Price drops to 60; CR = {:.4}, liquidatable: {}", ratio,
        book.is_loan_liquidatable(&ctx, fol_id).unwrap());

    let outcome = book.liquidate_loan(&ctx, liquidator, fol_id).unwrap();
    println!(
        "  Liquidated: debt {} repaid, {} collateral seized (premium {})",
        outcome.debt_repaid, outcome.collateral_seized, outcome.liquidator_premium
    );
    println!(
        "  Split: protocol {}, liquidator {}, borrower rebate {}",
        outcome.protocol_share, outcome.liquidator_premium, outcome.borrower_rebate
    );

    // convert the seized collateral back to the debt currency
    let mut amm = Amm::with_fixed_price(dec!(50_000), dec!(500), Price::new_unchecked(dec!(60)));
    let seized = book.user(liquidator).unwrap().wallet_collateral.free();
    let (liq_cash, liq_coll) = book.wallets_mut(liquidator).unwrap();
    let proceeds = amm.swap_collateral_for_cash(liq_cash, liq_coll, seized).unwrap();
    println!(
        "  Liquidator swaps {} collateral for {} cash via the AMM",
        seized, proceeds
    );

    println!("  Events recorded: {}\n", book.events().len());
}
