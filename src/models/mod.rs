//! Data models
//!
//! This module contains the data structures shared across layers:
//! - Database entities (DesktopSession)
//! - Identities resolved by the external auth service
//! - Insert inputs

mod desktop_session;
mod identity;

pub use desktop_session::{
    desktop_session_ttl, DesktopSession, DesktopSessionStatus, NewDesktopSession, DEFAULT_APP_ID,
    MAX_APP_ID_LEN,
};
pub use identity::AuthenticatedUser;
