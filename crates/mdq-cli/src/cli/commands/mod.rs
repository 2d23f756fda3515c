//! CLI command handlers, one per file.

mod analyze;
mod download;
mod serve;

pub use analyze::run_analyze;
pub use download::run_download;
pub use serve::{run_serve, ServeOverrides};
