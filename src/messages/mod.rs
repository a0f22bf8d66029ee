pub mod storage;
pub mod types;

pub use storage::UtteranceLog;
pub use types::{Outcome, SpokenUtterance};
