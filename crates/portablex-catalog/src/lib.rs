//! Application discovery, overlay merging and the portable catalog cache used by Portable X.

pub mod category;
mod appinfo;
mod cache;
mod entry;
mod overlay;
mod paths;
mod repair;
mod scan;

pub use appinfo::*;
pub use cache::*;
pub use entry::*;
pub use overlay::*;
pub use paths::*;
pub use repair::*;
pub use scan::*;
