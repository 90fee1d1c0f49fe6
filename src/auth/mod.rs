//! Authentication and authorization module

pub mod jwt;
pub mod middleware;
pub mod password;
pub mod social;

pub use jwt::{Claims, TokenError, TokenKind, TokenService};
pub use middleware::{
    extract_token, logout_session_middleware, session_auth_middleware, AuthContext,
    UnverifiedToken,
};
pub use password::PasswordHasher;
pub use social::{PlaceholderCodeExchange, SocialCodeExchange};
