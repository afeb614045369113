//! Command Handlers 实现

mod download_handler;
mod finalize_handler;
mod submit_handler;

pub use download_handler::*;
pub use finalize_handler::*;
pub use submit_handler::*;
