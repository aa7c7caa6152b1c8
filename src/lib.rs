// credit-core: fixed/variable-rate credit market engine.
// ledger-first architecture: conservation and atomicity take priority.
// all computation is deterministic with no external I/O; the caller owns
// the clock and the price.
//
// file map (search X.0 for structs, X.1+ for logic):
//   1.x  types.rs: primitives: UserId, LoanId, Time, Price, Token
//   2.x  context.rs: caller-owned clock/price context
//   3.x  collateral.rs: free/locked accounts, lock/unlock/transfer
//   4.x  curve.rs: piecewise-linear yield curves
//   5.x  account.rs: per-user wallets + book ledger
//   6.x  offer.rs: resting loan/borrow offers
//   7.x  loan.rs: FOL/SOL records, credit accounting
//   7.5  pool.rs: variable-rate pool, utilization pricing
//   7.6  amm.rs: minimal swap facility
//   8.x  book/: the lending order book: matching, exit, lifecycle,
//        liquidation, invariant sweep
//   9.x  events.rs: state transition events for audit

// data model
pub mod account;
pub mod collateral;
pub mod context;
pub mod curve;
pub mod loan;
pub mod offer;
pub mod types;

// engine
pub mod amm;
pub mod book;
pub mod events;
pub mod pool;

// re exports for convenience
pub use account::*;
pub use amm::*;
pub use book::*;
pub use collateral::*;
pub use context::*;
pub use curve::*;
pub use events::*;
pub use loan::*;
pub use offer::*;
pub use pool::*;
pub use types::*;
