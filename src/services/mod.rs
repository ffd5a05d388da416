//! Services layer - Business logic
//!
//! This module contains the desktop pairing services:
//! - Token codec (signing and checking desktop tokens)
//! - Identity resolution against the hosted auth service
//! - Issuance, verification and management of desktop sessions
//! - Background cleanup of expired sessions

pub mod cleanup;
pub mod desktop_session;
pub mod error;
pub mod identity;
pub mod issuance;
pub mod token;
pub mod verification;

pub use desktop_session::DesktopSessionService;
pub use error::DesktopAuthError;
pub use identity::{authenticate, IdentityProvider, RemoteIdentityProvider};
pub use issuance::{normalize_app_id, IssuanceService, IssuedToken, TokenIssuer};
pub use token::{DesktopClaims, MintedToken, TokenCodec};
pub use verification::{VerificationService, VerifiedToken};
