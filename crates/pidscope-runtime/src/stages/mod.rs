mod analyze;
mod split;

pub use analyze::AnalyzeStage;
pub use split::{SplitFlight, SplitStage};
