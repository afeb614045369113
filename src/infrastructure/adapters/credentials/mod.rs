//! Credential Adapters - 凭据来源实现

mod file_provider;
mod static_provider;

pub use file_provider::FileCredentialProvider;
pub use static_provider::StaticCredentialProvider;
