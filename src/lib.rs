pub mod aggregator;
pub mod app;
pub mod coerce;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod state;
pub mod storage;
pub mod ui;

pub use app::router;
pub use state::AppState;
pub use storage::{load_snapshot, resolve_data_path};
