pub mod form_extractor;
pub mod handlers;
pub mod recordings;
pub mod routes;

pub use handlers::*;
pub use recordings::*;
pub use routes::*;
