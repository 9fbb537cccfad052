//! Shared auth building blocks for boardside.
//!
//! This crate is pure: no HTTP calls and no DB access. It holds the
//! signed-cookie codec, the PKCE challenge generator, and the Lichess
//! OAuth protocol helpers (URL builders, response types, identity
//! extraction). The backend adapters that actually talk to Lichess and
//! SQLite live in `boardside-server`.

mod error;
pub mod lichess;
pub mod pkce;
pub mod token;

pub use error::AuthError;
