pub mod clock;
pub mod config;
pub mod error;
pub mod ids;

pub use clock::{NANOS_PER_SEC, Nanos, SimTime};
pub use error::*;
pub use ids::*;
