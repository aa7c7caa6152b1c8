// 2.0: the clock/price context. owned by the driving caller and passed by
// reference into every book operation, so time and price are explicit,
// auditable inputs rather than ambient state.

use crate::types::{Price, Time};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Context {
    pub time: Time,
    pub price: Price,
}

impl Context {
    pub fn new(time: Time, price: Price) -> Self {
        Self { time, price }
    }

    /// Advance the clock and set a new price. Time must strictly increase.
    pub fn update(&mut self, new_time: Time, new_price: Price) -> Result<(), ContextError> {
        if new_time <= self.time {
            return Err(ContextError::NonMonotonicTime {
                current: self.time,
                requested: new_time,
            });
        }
        self.time = new_time;
        self.price = new_price;
        Ok(())
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ContextError {
    #[error("time must strictly increase: current {current}, requested {requested}")]
    NonMonotonicTime { current: Time, requested: Time },
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn update_advances_time_and_price() {
        let mut ctx = Context::new(Time(0), Price::new_unchecked(dec!(100)));
        ctx.update(Time(5), Price::new_unchecked(dec!(80))).unwrap();
        assert_eq!(ctx.time, Time(5));
        assert_eq!(ctx.price.value(), dec!(80));
    }

    #[test]
    fn update_rejects_stale_time() {
        let mut ctx = Context::new(Time(5), Price::new_unchecked(dec!(100)));

        let same = ctx.update(Time(5), Price::new_unchecked(dec!(90)));
        assert!(matches!(same, Err(ContextError::NonMonotonicTime { .. })));

        let past = ctx.update(Time(3), Price::new_unchecked(dec!(90)));
        assert!(matches!(past, Err(ContextError::NonMonotonicTime { .. })));

        // failed updates leave the context untouched
        assert_eq!(ctx.time, Time(5));
        assert_eq!(ctx.price.value(), dec!(100));
    }
}
