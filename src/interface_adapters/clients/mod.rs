// Outbound adapters for the identity service and account storage.

pub mod auth;
pub mod identity;
pub mod stats;
