// Order sizing and exchange filter validation
pub mod filters;
pub mod sizing;

pub use filters::{floor_to_step, OrderFilterValidator, ValidatedOrder};
pub use sizing::{OrderIntent, OrderSizer};
