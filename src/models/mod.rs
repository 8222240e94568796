pub mod segment;
pub mod session;

pub use segment::*;
pub use session::*;
