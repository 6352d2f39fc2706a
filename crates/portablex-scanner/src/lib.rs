//! Background catalog refresh for Portable X: cache-first hydration and single-flight rescans.

mod scan;
mod source;

pub use scan::*;
pub use source::*;
