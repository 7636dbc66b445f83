pub mod admin;
pub mod client;
pub mod config;
pub mod erp;
pub mod error;
pub mod proxy;
pub mod server;
pub mod session;

pub use error::{Error, Result};
