pub mod action;
pub mod identity;
pub mod operator;
pub mod routing;

pub use action::Action;
pub use identity::{
    AccountStatus, ConnectionState, CreateIdentityOptions, Identity, IdentityRecord, IssuedCredential,
};
pub use operator::{Module, ModuleSet, OperatorContext, ServerRole};
pub use routing::{CustomRoute, RoutingPolicy};
