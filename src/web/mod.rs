pub mod api;
pub mod server;

pub use api::AppState;
pub use server::run_server;
