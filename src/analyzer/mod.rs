//! External analyzer invocation and its output protocol.

pub mod invoke;
pub mod protocol;

pub use invoke::{Analyzer, CommandAnalyzer};
pub use protocol::parse;
