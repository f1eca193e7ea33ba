//! AccountState: scratch accumulator carried bar to bar by the simulators.
//!
//! Lives only for the duration of one pass over the input. `lots` is signed
//! (negative = short) so that the held exposure is a single number.

/// Cash and exposure after a bar has been processed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AccountState {
    pub cash: f64,
    /// Target position (signal) the current lots were sized from.
    pub position: f64,
    /// Signed lot count actually held.
    pub lots: f64,
    /// Cost reference of the current exposure. NaN when flat.
    pub entry_price: f64,
    /// Terminal flag: once set the account stays flat with frozen cash.
    pub blown_up: bool,
}

impl AccountState {
    pub fn new(init_cash: f64) -> Self {
        Self {
            cash: init_cash,
            position: 0.0,
            lots: 0.0,
            entry_price: f64::NAN,
            blown_up: false,
        }
    }

    pub fn is_flat(&self) -> bool {
        self.lots == 0.0
    }

    /// Apply the bankruptcy rule after a bar. Returns true on the bar the account dies.
    ///
    /// With `enabled` off the account may run negative and keeps trading.
    pub fn check_blowup(&mut self, enabled: bool) -> bool {
        if !enabled || self.blown_up || self.cash > 0.0 {
            return false;
        }
        self.cash = 0.0;
        self.position = 0.0;
        self.lots = 0.0;
        self.entry_price = f64::NAN;
        self.blown_up = true;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_account_is_flat() {
        let acc = AccountState::new(10_000.0);
        assert_eq!(acc.cash, 10_000.0);
        assert!(acc.is_flat());
        assert!(acc.entry_price.is_nan());
        assert!(!acc.blown_up);
    }

    #[test]
    fn blowup_clamps_and_flattens() {
        let mut acc = AccountState::new(100.0);
        acc.lots = -3.0;
        acc.position = -1.0;
        acc.cash = -12.5;
        assert!(acc.check_blowup(true));
        assert_eq!(acc.cash, 0.0);
        assert!(acc.is_flat());
        assert!(acc.blown_up);
        // terminal: a second check reports nothing new
        assert!(!acc.check_blowup(true));
    }

    #[test]
    fn negative_cash_allowed_without_blowup() {
        let mut acc = AccountState::new(100.0);
        acc.lots = 2.0;
        acc.cash = -5.0;
        assert!(!acc.check_blowup(false));
        assert_eq!(acc.cash, -5.0);
        assert_eq!(acc.lots, 2.0);
    }
}
