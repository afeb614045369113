//! Poll Context - 轮询会话

mod state;

pub use state::{PollConfig, PollState, TickOutcome, TickTally};
