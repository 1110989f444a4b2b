//! Remote execution-listing clients.

pub mod http;
