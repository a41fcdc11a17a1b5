pub mod events;
pub mod offline;
pub mod replay;
pub mod session;

pub use events::{IntentError, SessionEvent};
pub use offline::OfflineSession;
pub use replay::{ReplayCursor, REPLAY_STEP_MILLIS};
pub use session::OnlineSession;
