pub mod aggregate;
pub mod auth;
pub mod config;
pub mod domain;
pub mod error;
pub mod mail;
pub mod report;
pub mod store;
pub mod sync;
