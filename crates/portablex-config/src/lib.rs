//! Section-keyed settings store shared by the Portable X catalog and security crates.

pub mod keys;
mod store;
mod value;

pub use store::*;
pub use value::*;
