//! Services layer for vpn-admin-service.
//!
//! Holds the identity lifecycle core (store, classifier, aggregator,
//! capability matrix, creation serializer, replication state) and the
//! adapters for the certificate authority, CCD directory and management
//! interface it drives.

pub mod authority;
pub mod capability;
pub mod ccd;
pub mod clock;
pub mod creation;
pub mod easyrsa;
pub mod error;
pub mod identity;
pub mod lifecycle;
pub mod management;
pub mod metrics;
pub mod replication;
pub mod routing_store;
pub mod stats;
pub mod store;

pub use authority::{CertificateAuthority, MockCertificateAuthority};
pub use ccd::CcdDirectory;
pub use clock::{Clock, FixedClock, SystemClock};
pub use easyrsa::{EasyRsaAuthority, PasswordDatabase, RemoteEndpoint};
pub use error::IdentityError;
pub use identity::{IdentityFilter, IdentityService, ServerInfo};
pub use management::{ConnectionSource, ManagementClient, StaticConnections};
pub use replication::ReplicationState;
pub use routing_store::{InMemoryRoutingStore, RoutingPolicyStore};
pub use stats::DashboardStats;
pub use store::IdentityStore;
