//! Cost model: commission and slippage on traded lots.
//!
//! Slippage is a price offset that always works against the trader, so it is
//! charged as a cost on every traded lot regardless of direction.

use super::CommissionType;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostModel {
    pub commission_type: CommissionType,
    pub c_rate: f64,
    pub multiplier: f64,
}

impl CostModel {
    pub fn new(commission_type: CommissionType, c_rate: f64, multiplier: f64) -> Self {
        Self {
            commission_type,
            c_rate,
            multiplier,
        }
    }

    pub fn frictionless(multiplier: f64) -> Self {
        Self::new(CommissionType::Percent, 0.0, multiplier)
    }

    /// Commission for trading `lots` (unsigned) at `price`.
    ///
    /// Percent: `c_rate · lots · price · multiplier`. Absolute: `c_rate · lots`.
    pub fn commission(&self, lots: f64, price: f64) -> f64 {
        match self.commission_type {
            CommissionType::Percent => self.c_rate * lots * price * self.multiplier,
            CommissionType::Absolute => self.c_rate * lots,
        }
    }

    /// Slippage cost for trading `lots` with an adverse price `offset`.
    pub fn slippage(&self, lots: f64, offset: f64) -> f64 {
        lots * self.multiplier * offset
    }

    /// Total friction of one execution.
    pub fn trade_cost(&self, lots: f64, price: f64, offset: f64) -> f64 {
        self.commission(lots, price) + self.slippage(lots, offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frictionless_costs_nothing() {
        let cost = CostModel::frictionless(10.0);
        assert_eq!(cost.trade_cost(5.0, 100.0, 0.0), 0.0);
    }

    #[test]
    fn percent_commission_scales_with_notional() {
        let cost = CostModel::new(CommissionType::Percent, 3e-4, 10.0);
        // 20 lots * 100 * 10 * 3e-4
        assert!((cost.commission(20.0, 100.0) - 6.0).abs() < 1e-10);
    }

    #[test]
    fn absolute_commission_is_per_lot() {
        let cost = CostModel::new(CommissionType::Absolute, 2.5, 10.0);
        assert_eq!(cost.commission(4.0, 3000.0), 10.0);
    }

    #[test]
    fn slippage_is_price_offset_per_lot() {
        let cost = CostModel::new(CommissionType::Absolute, 0.0, 10.0);
        // 3 lots * 10 * 0.4
        assert!((cost.slippage(3.0, 0.4) - 12.0).abs() < 1e-10);
        assert!((cost.trade_cost(3.0, 50.0, 0.4) - 12.0).abs() < 1e-10);
    }
}
