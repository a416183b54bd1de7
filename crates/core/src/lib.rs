#![forbid(unsafe_code)]

pub mod calendar;
pub mod catalog;
pub mod error;
pub mod model;
pub mod stats;
pub mod time;

pub use catalog::Catalog;
pub use error::Error;
pub use time::Clock;
