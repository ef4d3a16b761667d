//! `stockbook-auth`: password hashing, bearer tokens and user accounts.
//!
//! Decoupled from HTTP and storage; the api crate wires it to routes.

pub mod claims;
pub mod error;
pub mod password;
pub mod roles;
pub mod token;
pub mod user;

pub use claims::{JwtClaims, TokenValidationError, validate_claims};
pub use error::AuthError;
pub use password::{hash_password, verify_password};
pub use roles::Role;
pub use token::{Hs256Jwt, JwtValidator};
pub use user::{NewUser, UserAccount};
