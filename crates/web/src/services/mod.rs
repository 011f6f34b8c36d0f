//! External service clients.
//!
//! - `identity` - hosted identity provider (sign-in, sign-out)

pub mod identity;
