//! HTTP handlers for vpn-admin-service.

pub mod identity;
pub mod metrics;
pub mod routing;
pub mod server;
