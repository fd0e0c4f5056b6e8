/// Trademark Search - Korean trademark search over Elasticsearch
///
/// Core library providing chosung (leading consonant) and phonetic matching,
/// document normalization, query building and the HTTP API.

pub mod config;
pub mod core;
pub mod server;

#[cfg(test)]
mod tests;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
