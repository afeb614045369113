//! 应用层 - 命令
//!
//! 提交、最终登记、下载三个一次性请求。轮询本身由 infrastructure/worker 驱动。

mod generation_commands;

pub mod handlers;

pub use generation_commands::*;
