//! Connection secrets and the authenticated platform session

pub mod client;
pub mod credentials;

pub use client::Session;
pub use credentials::Credentials;
