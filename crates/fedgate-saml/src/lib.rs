//! SAML trust validation and cross-service logout for the fedgate gateway
//!
//! Two halves:
//!
//! - **Trust**: [`TrustValidator`] decides whether an inbound `Response`
//!   and its assertion are authentic, fresh and addressed to us, using
//!   [`CertificateResolver`] to find the peer's verification key.
//! - **Logout**: [`AssociationStore`] remembers which local session each
//!   accepted assertion opened; [`LogoutCoordinator`] and
//!   [`SloOrchestrator`] use it to end every session of a principal when a
//!   logout arrives, tolerating partial failure.
//!
//! Metadata is consumed as an already-parsed [`Metadata`] object; protocol
//! messages arrive as the structures in [`models`].

pub mod config;
pub mod error;
pub mod logging;
pub mod metadata;
pub mod models;
pub mod services;
pub mod session;

pub use config::{ConfigError, GatewayConfig, StoreKind};
pub use error::{SamlError, SamlResult};
pub use metadata::Metadata;
pub use services::{
    BackChannelDispatcher, BackChannelLogout, CertificateResolver, LocalSessionDispatcher,
    LogoutCoordinator, LogoutDispatcher, LogoutOutcome, LogoutTarget, SloBuilder,
    SloOrchestrator, TargetStatus, TrustValidator,
};
pub use session::{
    AssociationBackend, AssociationStore, InMemoryAssociationBackend, InMemorySessionRegistry,
    KeyValueAssociationBackend, PostgresAssociationBackend, PurgePolicy, Session,
    SessionResolver, StoreError,
};
