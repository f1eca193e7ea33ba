//! Domain types shared by the signal generators and the simulators.

pub mod account;
pub mod position;
pub mod trade;

pub use account::AccountState;
pub use position::{signum, Side};
pub use trade::Trade;
