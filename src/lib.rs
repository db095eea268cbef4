// Module declarations
pub mod cli;
mod codec;
pub mod config;
mod data;
mod error;
pub mod logging;
mod operations;
pub mod probe;
mod session;
pub mod status;
mod types;

// Public API exports
pub use config::{ListingMode, ProbeConfig};
pub use error::{FtpError, FtpResult};
pub use probe::{ProbeFailure, ProbeReport, ProbeStep};
pub use session::FtpSession;
pub use types::{FileMetadata, FileType, Mode, Reply, SessionOption, TransferType};

// Re-export commonly used external types for convenience
pub use tokio_util::sync::CancellationToken;
