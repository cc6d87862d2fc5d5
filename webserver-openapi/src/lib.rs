mod config;
mod handlers;
mod server;

pub use config::{DatabaseBackend, ErrorPolicy, ServiceConfig};
pub use handlers::{ApiDoc, AppState};
pub use server::{build_state, create_router, run_server, run_server_with_listener};
