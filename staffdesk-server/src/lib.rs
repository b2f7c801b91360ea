pub mod client;
pub mod routes;
pub mod session;

pub use client::{ApiError, BackendClient, DEFAULT_API_URL};
pub use routes::{router, AppState, SESSION_COOKIE};
pub use session::{Session, SessionStore};
