/// ROTA media service
///
/// Storage and document-caching core of the ROTA admin backend, plus the thin
/// HTTP surface that exposes it.

pub mod api;
pub mod config;
pub mod context;
pub mod error;
pub mod media;
pub mod server;

pub use config::MediaConfig;
pub use context::AppContext;
pub use error::{MediaError, MediaResult};
