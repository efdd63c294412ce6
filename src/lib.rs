pub mod cancel;
pub mod conf;
pub mod detectors;
pub mod error;
pub mod reporter;
pub mod structures;
pub mod summary;

pub use cancel::CancelToken;
pub use error::{ProbeError, ProbeErrorKind, Result, SessionError};
pub use summary::{summarize, Summary};
