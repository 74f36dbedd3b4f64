pub mod auth;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod server;
pub mod ws;

pub use auth::{Authenticator, Identity, JwtAuthenticator};
pub use error::ApiError;
pub use server::{AppState, build_router, serve};
