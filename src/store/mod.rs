pub mod memory;
pub mod postgres;
pub mod session;
pub mod traits;

pub use memory::*;
pub use postgres::*;
pub use session::*;
pub use traits::*;
