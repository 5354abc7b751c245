pub mod config;
pub mod error;
pub mod id;
pub mod identity;
pub mod message;
pub mod provider;
pub mod session;
