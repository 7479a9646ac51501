pub mod auth;

pub use auth::{auth_middleware, Claims, JwtVerifier, OrgContext};
