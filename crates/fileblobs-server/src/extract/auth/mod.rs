//! Authentication and authorization.
//!
//! - [`AuthState`] resolves the session cookie into a [`Principal`].
//! - [`Capabilities`] lists what that principal may do.
//! - [`IdentityClaims`] reads identity tokens handed over after an external
//!   sign-in.

mod auth_state;
mod capability;
mod identity_token;
mod principal;

pub use self::auth_state::{AuthState, SESSION_COOKIE};
pub use self::capability::{Capabilities, Capability, Role};
pub use self::identity_token::IdentityClaims;
pub use self::principal::{AuthSource, Principal};
