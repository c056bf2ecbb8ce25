pub mod event;
pub mod status;
pub mod steps;

pub use event::*;
pub use status::*;
pub use steps::*;
