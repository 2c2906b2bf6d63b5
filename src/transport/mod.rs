//! Transport layer for the browser UI and the command line

pub mod cli;
pub mod http;
mod page;

pub use http::{router, run_http_server};
