pub mod access;
pub mod config;
pub mod domain;
pub mod error;
pub mod metrics;
pub mod models;
pub mod payment;
pub mod pricing;
pub mod services;
pub mod store;
pub mod utils;

pub use error::{CommerceError, CommerceResult, ErrorKind};
pub use services::Services;
