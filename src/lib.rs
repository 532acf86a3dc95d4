pub mod app;
pub mod beds;
pub mod comparison;
pub mod config;
pub mod errors;
pub mod groups;
pub mod handlers;
pub mod models;
pub mod movements;
pub mod rows;
pub mod session;
pub mod state;
pub mod stats;
pub mod storage;

pub use app::router;
pub use config::Config;
pub use session::Session;
pub use state::AppState;
pub use storage::load_data;
