pub mod validation;

pub use validation::{
    validate_identity_name, validate_password, validate_routing_policy, ValidatedJson,
    MIN_PASSWORD_LENGTH,
};
