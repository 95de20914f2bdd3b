pub mod api;
pub mod config;
pub mod error;
pub mod logic;
pub mod model;
pub mod store;

// Export API types
pub use api::handlers;
pub use api::routes;

pub use error::{AppError, AppResult};

// Export logic types
pub use logic::{Collection, MergePatch, Resource, SetInstruction};

// Export all model types
pub use model::*;

// Export store types
pub use store::{MemoryStore, PostgresSettings, PostgresStore, Store};
