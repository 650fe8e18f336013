pub mod reaper;
pub mod store;
pub mod types;

pub use reaper::Reaper;
pub use store::SessionStore;
pub use types::{SessionSnapshot, SessionSummary, Turn, TurnRole};
