pub mod error;
pub mod modification;
pub mod result;
pub mod window;

pub use error::ConfigError;
pub use modification::{FileAction, Modification, ModifiedFile};
pub use result::{BuildResult, LogEntry, Severity};
pub use window::PollWindow;
