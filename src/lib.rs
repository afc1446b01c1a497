pub mod config;
pub mod entities;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod state;
pub mod utils;

pub use routes::create_routes;
pub use state::AppState;
