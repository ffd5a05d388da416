//! Repository layer
//!
//! Data access behind traits so services can be tested against any store.

pub mod desktop_session;

pub use desktop_session::{DesktopSessionRepository, SqlxDesktopSessionRepository};
