//! The dorm design board: concepts for accounts, sessions, posts, engagement
//! and room templates, and the synchronizations that expose their protected
//! operations through `Requesting`.
//!
//! `Requesting` itself belongs to the transport and is registered by the
//! server.

pub mod concepts;
pub mod syncs;

use concord_core::{ConceptRegistry, Config, Result};
use std::sync::Arc;

use concepts::{
    Authentication, DesignPost, Directory, Engagement, RoomTemplate, Session, UserAccount,
};

pub use syncs::all_syncs;

/// Register every application concept into `registry`.
///
/// `UserAccount` and `Authentication` share one user directory.
pub fn register_concepts(registry: &mut ConceptRegistry, config: &Config) -> Result<()> {
    let directory = Directory::shared();
    registry.register(Arc::new(UserAccount::new(directory.clone())))?;
    registry.register(Arc::new(Authentication::new(directory)))?;
    registry.register(Arc::new(Session::with_ttl_hours(config.sessions.ttl_hours)))?;
    registry.register(Arc::new(DesignPost::new()))?;
    registry.register(Arc::new(Engagement::new()))?;
    registry.register(Arc::new(RoomTemplate::new()))?;
    tracing::debug!("registered application concepts");
    Ok(())
}
