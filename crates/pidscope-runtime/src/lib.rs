pub mod codec;
pub mod config;
pub mod error;
pub mod protocol;
pub mod sandbox;
pub mod scripts;
pub mod stages;

pub use codec::{BlackboxDecoder, CodecAdapter, DecodedTable, primary_table};
pub use config::{PackageSpec, RuntimeConfig};
pub use error::{Error, Result};
pub use sandbox::{
    ComputationSandbox, ExecutionOutcome, ExecutionSlot, SandboxSession, ScriptEngine, SlotGuard,
    StatusRelay, StatusReporter, VirtualFs,
};
pub use scripts::{Script, ScriptLibrary, ScriptName};
pub use stages::{AnalyzeStage, SplitFlight, SplitStage};
