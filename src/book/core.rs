// 8.0 book/core.rs: the order book itself. pooled accounts, users, offers,
// loans, the variable pool and the audit log all live here, along with the
// accounting helpers every operation builds on.

use super::config::BookConfig;
use super::results::BookError;
use crate::account::User;
use crate::collateral::CollateralAccount;
use crate::context::Context;
use crate::events::{
    DepositEvent, Event, EventId, EventPayload, WithdrawalEvent, WithdrawalRejectedEvent,
};
use crate::loan::{Loan, LoanKind};
use crate::offer::{BorrowOffer, LoanOffer};
use crate::pool::VariablePool;
use crate::types::{LoanId, OfferId, Time, Token, UserId};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};

/** 8.1: main book struct. all engine state lives here */
#[derive(Debug)]
pub struct LendingBook {
    pub(super) config: BookConfig,
    // pooled accounts holding everything users have deposited
    pub(super) cash: CollateralAccount,
    pub(super) collateral: CollateralAccount,
    pub(super) users: HashMap<UserId, User>,
    // one resting loan offer per lender
    pub(super) loan_offers: HashMap<UserId, LoanOffer>,
    pub(super) borrow_offers: BTreeMap<OfferId, BorrowOffer>,
    pub(super) loans: BTreeMap<LoanId, Loan>,
    pub(super) pool: VariablePool,
    pub(super) liquidation_profit_collateral: Decimal,
    pub(super) events: Vec<Event>,
    next_event_id: u64,
    next_loan_id: u64,
    next_offer_id: u64,
}

impl LendingBook {
    pub fn new(config: BookConfig) -> Self {
        let pool = VariablePool::new(config.pool.clone());
        Self {
            config,
            cash: CollateralAccount::default(),
            collateral: CollateralAccount::default(),
            users: HashMap::new(),
            loan_offers: HashMap::new(),
            borrow_offers: BTreeMap::new(),
            loans: BTreeMap::new(),
            pool,
            liquidation_profit_collateral: Decimal::ZERO,
            events: Vec::new(),
            next_event_id: 1,
            next_loan_id: 0,
            next_offer_id: 0,
        }
    }

    // ---- users ----------------------------------------------------------

    pub fn create_user(&mut self) -> UserId {
        let id = UserId(self.users.len() as u64 + 1);
        self.users.insert(id, User::new(id));
        id
    }

    /// Create a user whose wallets start funded (the external funding actor
    /// at work).
    pub fn create_funded_user(&mut self, cash: Decimal, collateral: Decimal) -> UserId {
        let id = UserId(self.users.len() as u64 + 1);
        self.users.insert(id, User::with_wallet(id, cash, collateral));
        id
    }

    pub fn user(&self, id: UserId) -> Option<&User> {
        self.users.get(&id)
    }

    pub(super) fn user_ref(&self, id: UserId) -> Result<&User, BookError> {
        self.users.get(&id).ok_or(BookError::UnknownUser(id))
    }

    pub(super) fn user_mut(&mut self, id: UserId) -> Result<&mut User, BookError> {
        self.users.get_mut(&id).ok_or(BookError::UnknownUser(id))
    }

    /// Mutable access to a user's wallet accounts (cash, collateral): the
    /// boundary the external world — funding actor, swap facility —
    /// interacts with. Book-ledger fields stay private to book methods.
    pub fn wallets_mut(
        &mut self,
        user: UserId,
    ) -> Result<(&mut CollateralAccount, &mut CollateralAccount), BookError> {
        let u = self.users.get_mut(&user).ok_or(BookError::UnknownUser(user))?;
        Ok((&mut u.wallet_cash, &mut u.wallet_collateral))
    }

    /// External wallet top-up.
    pub fn fund_wallet(&mut self, user: UserId, token: Token, amount: Decimal) -> Result<(), BookError> {
        if amount <= Decimal::ZERO {
            return Err(BookError::NonPositiveAmount { amount });
        }
        let u = self.user_mut(user)?;
        match token {
            Token::Cash => u.wallet_cash.credit_free(amount),
            Token::Collateral => u.wallet_collateral.credit_free(amount),
        }
        Ok(())
    }

    /// External wallet drain.
    pub fn drain_wallet(&mut self, user: UserId, token: Token, amount: Decimal) -> Result<(), BookError> {
        if amount <= Decimal::ZERO {
            return Err(BookError::NonPositiveAmount { amount });
        }
        let u = self.user_mut(user)?;
        match token {
            Token::Cash => u.wallet_cash.debit_free(amount)?,
            Token::Collateral => u.wallet_collateral.debit_free(amount)?,
        }
        Ok(())
    }

    // ---- pool -----------------------------------------------------------

    pub fn pool(&self) -> &VariablePool {
        &self.pool
    }

    pub fn fund_pool(&mut self, amount: Decimal) {
        self.pool.fund(amount);
    }

    // ---- deposits & withdrawals -----------------------------------------

    pub fn deposit(
        &mut self,
        ctx: &Context,
        user: UserId,
        token: Token,
        amount: Decimal,
    ) -> Result<(), BookError> {
        if amount <= Decimal::ZERO {
            return Err(BookError::NonPositiveAmount { amount });
        }
        let u = self.users.get_mut(&user).ok_or(BookError::UnknownUser(user))?;
        match token {
            Token::Cash => {
                u.wallet_cash.transfer(&mut self.cash, amount)?;
                u.book_cash += amount;
            }
            Token::Collateral => {
                u.wallet_collateral.transfer(&mut self.collateral, amount)?;
                u.collateral_deposited += amount;
            }
        }
        self.emit_event(
            ctx.time,
            EventPayload::Deposit(DepositEvent { user, token, amount }),
        );
        self.check_invariants();
        Ok(())
    }

    pub fn withdraw(
        &mut self,
        ctx: &Context,
        user: UserId,
        token: Token,
        amount: Decimal,
    ) -> Result<(), BookError> {
        if amount <= Decimal::ZERO {
            return Err(BookError::NonPositiveAmount { amount });
        }
        let available = {
            let u = self.user_ref(user)?;
            match token {
                Token::Cash => u.book_cash,
                Token::Collateral => u.free_collateral(),
            }
        };
        if available < amount {
            // rejected withdrawals are still worth an audit record
            self.emit_event(
                ctx.time,
                EventPayload::WithdrawalRejected(WithdrawalRejectedEvent {
                    user,
                    token,
                    amount,
                    reason: format!("available {available}"),
                }),
            );
            return Err(match token {
                Token::Cash => BookError::InsufficientBookCash {
                    user,
                    requested: amount,
                    available,
                },
                Token::Collateral => BookError::InsufficientBookCollateral {
                    user,
                    requested: amount,
                    available,
                },
            });
        }
        let u = self.users.get_mut(&user).ok_or(BookError::UnknownUser(user))?;
        match token {
            Token::Cash => {
                self.cash.transfer(&mut u.wallet_cash, amount)?;
                u.book_cash -= amount;
            }
            Token::Collateral => {
                self.collateral.transfer(&mut u.wallet_collateral, amount)?;
                u.collateral_deposited -= amount;
            }
        }
        self.emit_event(
            ctx.time,
            EventPayload::Withdrawal(WithdrawalEvent { user, token, amount }),
        );
        self.check_invariants();
        Ok(())
    }

    // ---- internal accounting --------------------------------------------

    /// Move lendable book cash from a lender to a borrower's wallet: the
    /// lender's ledger balance shrinks and the pooled cash pays out.
    pub(super) fn lend_cash(
        &mut self,
        lender: UserId,
        borrower: UserId,
        amount: Decimal,
    ) -> Result<(), BookError> {
        if !self.users.contains_key(&borrower) {
            return Err(BookError::UnknownUser(borrower));
        }
        {
            let l = self.user_ref(lender)?;
            if l.book_cash < amount {
                return Err(BookError::InsufficientBookCash {
                    user: lender,
                    requested: amount,
                    available: l.book_cash,
                });
            }
        }
        if !self.cash.can_transfer(amount) {
            // the pooled account always covers the ledger; a miss here is a
            // bookkeeping bug, surfaced by the invariant sweep
            return Err(BookError::InsufficientBookCash {
                user: lender,
                requested: amount,
                available: self.cash.free(),
            });
        }
        self.users
            .get_mut(&lender)
            .ok_or(BookError::UnknownUser(lender))?
            .book_cash -= amount;
        let b = self.users.get_mut(&borrower).ok_or(BookError::UnknownUser(borrower))?;
        self.cash.transfer(&mut b.wallet_cash, amount)?;
        Ok(())
    }

    pub(super) fn lock_collateral(&mut self, user: UserId, amount: Decimal) -> Result<(), BookError> {
        let u = self.user_mut(user)?;
        let free = u.free_collateral();
        if amount > free {
            return Err(BookError::InsufficientBookCollateral {
                user: u.id,
                requested: amount,
                available: free,
            });
        }
        u.collateral_locked += amount;
        Ok(())
    }

    pub(super) fn unlock_collateral(&mut self, user: UserId, amount: Decimal) -> Result<(), BookError> {
        let u = self.user_mut(user)?;
        if amount > u.collateral_locked {
            return Err(BookError::InsufficientBookCollateral {
                user: u.id,
                requested: amount,
                available: u.collateral_locked,
            });
        }
        u.collateral_locked -= amount;
        Ok(())
    }

    // ---- loans ----------------------------------------------------------

    pub(super) fn create_fol(
        &mut self,
        lender: UserId,
        borrower: UserId,
        face_value: Decimal,
        due_date: Time,
    ) -> LoanId {
        let id = LoanId(self.next_loan_id);
        self.next_loan_id += 1;
        self.loans
            .insert(id, Loan::new_fol(id, lender, borrower, face_value, due_date));
        id
    }

    pub(super) fn create_sol(
        &mut self,
        fol: LoanId,
        lender: UserId,
        borrower: UserId,
        face_value: Decimal,
    ) -> LoanId {
        let id = LoanId(self.next_loan_id);
        self.next_loan_id += 1;
        self.loans
            .insert(id, Loan::new_sol(id, fol, lender, borrower, face_value));
        id
    }

    pub(super) fn next_offer_id(&mut self) -> OfferId {
        let id = OfferId(self.next_offer_id);
        self.next_offer_id += 1;
        id
    }

    pub fn loan(&self, id: LoanId) -> Option<&Loan> {
        self.loans.get(&id)
    }

    pub fn loan_count(&self) -> usize {
        self.loans.len()
    }

    pub fn loan_credit(&self, id: LoanId) -> Result<Decimal, BookError> {
        Ok(self.loans.get(&id).ok_or(BookError::UnknownLoan(id))?.credit())
    }

    /// Due date of a loan, resolved through the root FOL for SOLs.
    pub fn loan_due_date(&self, id: LoanId) -> Result<Time, BookError> {
        let loan = self.loans.get(&id).ok_or(BookError::UnknownLoan(id))?;
        let root_id = loan.fol_id();
        let root = self.loans.get(&root_id).ok_or(BookError::UnknownLoan(root_id))?;
        match root.kind {
            LoanKind::Fol { due_date, .. } => Ok(due_date),
            LoanKind::Sol { .. } => Err(BookError::NotAFol(root_id)),
        }
    }

    /// Repayment status, resolved through the root FOL for SOLs.
    pub fn loan_is_repaid(&self, id: LoanId) -> Result<bool, BookError> {
        let loan = self.loans.get(&id).ok_or(BookError::UnknownLoan(id))?;
        Ok(self.root_repaid(loan))
    }

    pub fn loan_is_overdue(&self, ctx: &Context, id: LoanId) -> Result<bool, BookError> {
        Ok(ctx.time > self.loan_due_date(id)?)
    }

    pub(super) fn root_repaid(&self, loan: &Loan) -> bool {
        match loan.kind {
            LoanKind::Fol { repaid, .. } => repaid,
            LoanKind::Sol { fol } => matches!(
                self.loans.get(&fol),
                Some(Loan {
                    kind: LoanKind::Fol { repaid: true, .. },
                    ..
                })
            ),
        }
    }

    // ---- queries --------------------------------------------------------

    pub fn user_book_cash(&self, user: UserId) -> Decimal {
        self.users.get(&user).map_or(Decimal::ZERO, |u| u.book_cash)
    }

    pub fn user_collateral_deposited(&self, user: UserId) -> Decimal {
        self.users
            .get(&user)
            .map_or(Decimal::ZERO, |u| u.collateral_deposited)
    }

    pub fn user_collateral_locked(&self, user: UserId) -> Decimal {
        self.users
            .get(&user)
            .map_or(Decimal::ZERO, |u| u.collateral_locked)
    }

    pub fn user_free_collateral(&self, user: UserId) -> Decimal {
        self.users
            .get(&user)
            .map_or(Decimal::ZERO, |u| u.free_collateral())
    }

    pub fn loan_offer(&self, lender: UserId) -> Option<&LoanOffer> {
        self.loan_offers.get(&lender)
    }

    pub fn borrow_offer(&self, id: OfferId) -> Option<&BorrowOffer> {
        self.borrow_offers.get(&id)
    }

    pub fn liquidation_profit_collateral(&self) -> Decimal {
        self.liquidation_profit_collateral
    }

    /// Future cashflow a user could pledge as virtual collateral for a loan
    /// due at `due_date`: the credit of every live loan they hold as lender
    /// maturing at or before that date.
    pub fn virtual_collateral_at(&self, user: UserId, due_date: Time) -> Decimal {
        self.loans
            .values()
            .filter(|loan| loan.lender == user && !self.root_repaid(loan))
            .filter(|loan| {
                self.loan_due_date(loan.id)
                    .map(|d| d <= due_date)
                    .unwrap_or(false)
            })
            .map(|loan| loan.credit())
            .sum()
    }

    /// Collateral assignable to one loan: the borrower's free book
    /// collateral, pro-rata by this loan's share of their covered debt.
    pub fn assigned_collateral(&self, loan_id: LoanId) -> Result<Decimal, BookError> {
        let loan = self.loans.get(&loan_id).ok_or(BookError::UnknownLoan(loan_id))?;
        let borrower = self.user_ref(loan.borrower)?;
        if borrower.debt_covered_by_real_collateral == Decimal::ZERO {
            return Ok(Decimal::ZERO);
        }
        Ok(borrower.free_collateral() * loan.face_value
            / borrower.debt_covered_by_real_collateral)
    }

    // ---- events ---------------------------------------------------------

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn recent_events(&self, count: usize) -> &[Event] {
        let start = self.events.len().saturating_sub(count);
        &self.events[start..]
    }

    pub(super) fn emit_event(&mut self, time: Time, payload: EventPayload) {
        let event = Event::new(EventId(self.next_event_id), time, payload);
        self.next_event_id += 1;

        if self.config.verbose {
            println!("[Event {}] {:?}", event.id.0, event.payload);
        }

        self.events.push(event);

        if self.events.len() > self.config.max_events {
            let drain_count = self.events.len() - self.config.max_events;
            self.events.drain(0..drain_count);
        }
    }

    // ---- invariant sweep ------------------------------------------------

    /// Postcondition check run after every mutating operation in debug and
    /// test builds. A failure here is an engine bug, and fatal.
    pub(super) fn check_invariants(&self) {
        #[cfg(debug_assertions)]
        {
            let mut book_cash_total = Decimal::ZERO;
            let mut deposited_total = Decimal::ZERO;
            for u in self.users.values() {
                assert!(u.book_cash >= Decimal::ZERO, "{} negative book cash", u.id);
                assert!(
                    u.collateral_deposited >= Decimal::ZERO,
                    "{} negative deposited collateral",
                    u.id
                );
                assert!(
                    u.collateral_locked >= Decimal::ZERO
                        && u.collateral_locked <= u.collateral_deposited,
                    "{} locked collateral out of range",
                    u.id
                );
                assert!(
                    u.debt_covered_by_real_collateral >= Decimal::ZERO,
                    "{} negative covered debt",
                    u.id
                );
                book_cash_total += u.book_cash;
                deposited_total += u.collateral_deposited;
            }

            let mut claimable = Decimal::ZERO;
            let mut tree_credit: BTreeMap<LoanId, Decimal> = BTreeMap::new();
            for loan in self.loans.values() {
                assert!(
                    loan.amount_exited >= Decimal::ZERO && loan.amount_exited <= loan.face_value,
                    "{} exited amount out of range",
                    loan.id
                );
                if !loan.claimed && self.root_repaid(loan) {
                    claimable += loan.credit();
                }
                *tree_credit.entry(loan.fol_id()).or_default() += loan.credit();
            }

            // every pooled unit is spoken for: lendable balances plus
            // resolved-but-unclaimed lender slices
            assert_eq!(
                self.cash.free(),
                book_cash_total + claimable,
                "pooled cash does not match the ledger"
            );
            assert_eq!(
                self.collateral.free(),
                deposited_total + self.liquidation_profit_collateral,
                "pooled collateral does not match the ledger"
            );

            // no cashflow is ever issued twice: each FOL tree's credit sums
            // back to the original face value
            for (fol_id, total) in tree_credit {
                let fol = &self.loans[&fol_id];
                assert!(fol.is_fol(), "{} used as a SOL root", fol_id);
                assert_eq!(
                    total, fol.face_value,
                    "{} tree credit diverged from face value",
                    fol_id
                );
            }

            for offer in self.loan_offers.values() {
                assert!(offer.max_amount >= Decimal::ZERO, "loan offer capacity negative");
            }
            for offer in self.borrow_offers.values() {
                assert!(offer.max_amount >= Decimal::ZERO, "borrow offer capacity negative");
            }
        }
    }
}
