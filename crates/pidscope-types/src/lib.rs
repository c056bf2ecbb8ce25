pub mod error;
pub mod flight;
pub mod header;
pub mod progress;
pub mod trace;

pub use error::{Error, Result};
pub use flight::*;
pub use header::*;
pub use progress::*;
pub use trace::*;
