pub mod fakes;
pub mod helpers;
pub mod memory;

pub use fakes::{AnalyzerReply, Outbound, RecordingSender, StaticAnalyzer};
pub use helpers::{mod_item, ManualClock};
pub use memory::InMemoryLedger;
