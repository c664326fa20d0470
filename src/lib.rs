pub mod cache;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod holders;
pub mod rpc;
pub mod supply;
pub mod testing; // Scripted RPC network and page stubs
pub mod utils;

pub use dashboard::{CycleReport, Dashboard, DisplaySink, LogSink, RecordingSink, Slot, SlotValue};
pub use error::{DashboardError, Result};
