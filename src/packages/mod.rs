//! Crate lists and crate sources.

pub mod list;
pub mod resolver;

pub use list::load_package_list;
pub use resolver::{ensure_source, CommandFetcher, SourceFetcher};
