// matterlink-server: HTTP boundary and SQLite mirror over matterlink-core.

pub mod config;
pub mod error;
pub mod mirror;
pub mod routes;
pub mod state;

pub use config::ServerConfig;
pub use error::ApiError;
pub use mirror::Mirror;
pub use state::AppState;
