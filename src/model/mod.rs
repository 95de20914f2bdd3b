pub mod appointment;
pub mod document;
pub mod form;
pub mod object_id;
pub mod question;
pub mod recording;

pub use appointment::*;
pub use document::*;
pub use form::*;
pub use object_id::*;
pub use question::*;
pub use recording::*;
