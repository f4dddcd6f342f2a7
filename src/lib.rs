pub mod config;
pub mod endpoint;
pub mod keyset;
pub mod migrate;
pub mod report;
pub mod transfer;

#[cfg(test)]
pub(crate) mod testutil;

pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Result<T> = std::result::Result<T, Error>;
