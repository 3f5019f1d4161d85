pub mod cmd;
pub mod config;
pub mod coordinator;
pub mod database;
pub mod error;
pub mod models;
pub mod rbac;
pub mod remote;
pub mod server;
#[cfg(test)]
pub mod tests;

pub use error::Error;
