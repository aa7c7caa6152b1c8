// minimal swap facility. quotes off the reserve ratio (or a pinned price)
// and settles collateral-for-cash swaps; liquidators use it to convert
// seized collateral back into the debt currency.

use crate::collateral::{CollateralAccount, CollateralError};
use crate::types::Price;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Amm {
    pub cash: CollateralAccount,
    pub collateral: CollateralAccount,
    fixed_price: Option<Price>,
}

impl Amm {
    pub fn new(cash_reserve: Decimal, collateral_reserve: Decimal) -> Self {
        Self {
            cash: CollateralAccount::new(cash_reserve),
            collateral: CollateralAccount::new(collateral_reserve),
            fixed_price: None,
        }
    }

    pub fn with_fixed_price(cash_reserve: Decimal, collateral_reserve: Decimal, price: Price) -> Self {
        Self {
            cash: CollateralAccount::new(cash_reserve),
            collateral: CollateralAccount::new(collateral_reserve),
            fixed_price: Some(price),
        }
    }

    /// Cash per unit of collateral: the pinned price if set, otherwise the
    /// reserve ratio.
    pub fn instant_price(&self) -> Result<Price, AmmError> {
        if let Some(price) = self.fixed_price {
            return Ok(price);
        }
        if self.collateral.free() == Decimal::ZERO {
            return Err(AmmError::NoLiquidity);
        }
        Price::new(self.cash.free() / self.collateral.free()).ok_or(AmmError::NoLiquidity)
    }

    /// Cash out for an exact collateral amount in.
    pub fn quote_collateral_for_cash(&self, amount_in: Decimal) -> Result<Decimal, AmmError> {
        Ok(amount_in * self.instant_price()?.value())
    }

    /// Exact-input swap: caller's collateral for the facility's cash.
    /// Both legs are validated before either moves.
    pub fn swap_collateral_for_cash(
        &mut self,
        caller_cash: &mut CollateralAccount,
        caller_collateral: &mut CollateralAccount,
        amount_in: Decimal,
    ) -> Result<Decimal, AmmError> {
        let amount_out = self.quote_collateral_for_cash(amount_in)?;
        if !self.cash.can_transfer(amount_out) {
            return Err(AmmError::InsufficientReserves {
                requested: amount_out,
                available: self.cash.free(),
            });
        }
        if !caller_collateral.can_transfer(amount_in) {
            return Err(AmmError::Collateral(CollateralError::InsufficientFree {
                requested: amount_in,
                available: caller_collateral.free(),
            }));
        }

        self.cash.transfer(caller_cash, amount_out)?;
        caller_collateral.transfer(&mut self.collateral, amount_in)?;
        Ok(amount_out)
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum AmmError {
    #[error("no liquidity to quote against")]
    NoLiquidity,

    #[error("insufficient swap reserves: requested {requested}, available {available}")]
    InsufficientReserves {
        requested: Decimal,
        available: Decimal,
    },

    #[error(transparent)]
    Collateral(#[from] CollateralError),
}
