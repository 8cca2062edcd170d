pub mod config;
pub mod error;
pub mod event;
pub mod graph_config;
pub mod traits;
pub mod types;

pub use config::AppConfig;
pub use error::{CadreError, Result};
pub use event::EventBus;
pub use graph_config::GraphConfig;
pub use types::*;
