//! Domain records

pub mod scan;
pub mod store;
pub mod user;

pub use scan::*;
pub use store::*;
pub use user::*;
