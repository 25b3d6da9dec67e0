pub mod calendar;
pub mod capacity;
pub mod error;
pub mod generator;
pub mod handlers;
pub mod models;

pub use calendar::*;
pub use capacity::*;
pub use error::*;
pub use generator::*;
pub use models::*;
