//! Backend Adapter - 生成服务后端客户端实现

mod fake_generation_client;
mod http_generation_client;

pub use fake_generation_client::{FakeGenerationBackend, FakeReply};
pub use http_generation_client::*;
