// knobs for the lending book. risk thresholds, the liquidation split,
// pool parameters, engine settings.

use crate::pool::PoolParams;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskParams {
    // collateral ratio required to open real-collateral debt
    pub cr_opening: Decimal,
    // collateral ratio below which a borrower is liquidatable
    pub cr_liquidation: Decimal,
}

impl Default for RiskParams {
    fn default() -> Self {
        Self {
            cr_opening: dec!(1.5),
            cr_liquidation: dec!(1.3),
        }
    }
}

/// How the collateral surplus of a liquidation is divided. The protocol
/// keeps whatever the liquidator premium and borrower rebate leave behind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidationSplit {
    pub liquidator_premium: Decimal,
    pub borrower_rebate: Decimal,
}

impl LiquidationSplit {
    pub fn protocol_share(&self) -> Decimal {
        Decimal::ONE - self.liquidator_premium - self.borrower_rebate
    }
}

impl Default for LiquidationSplit {
    fn default() -> Self {
        Self {
            liquidator_premium: dec!(0.3),
            borrower_rebate: dec!(0.1),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookConfig {
    pub risk: RiskParams,
    pub split: LiquidationSplit,
    pub pool: PoolParams,
    // echo events to stdout as they are emitted
    pub verbose: bool,
    // audit log cap; oldest events are dropped past this
    pub max_events: usize,
}

impl Default for BookConfig {
    fn default() -> Self {
        Self {
            risk: RiskParams::default(),
            split: LiquidationSplit::default(),
            pool: PoolParams::default(),
            verbose: false,
            max_events: 10_000,
        }
    }
}
