//! Password protection for Portable X: salted credentials, trusted devices and access gates.

mod device;
mod gate;
mod manager;
mod password;

pub use device::*;
pub use gate::*;
pub use manager::*;
pub use password::*;
