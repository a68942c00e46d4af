//! Attribute the HEAD commit of a git repository to the AI coding tools that
//! produced it.
//!
//! Evidence comes from three independent signals, strongest first: session
//! artifacts whose written files overlap the commit, running tool processes,
//! and `Co-authored-by:` trailers. [`detector::Detector`] fuses them into at
//! most one [`Detection`] per tool.

pub mod config;
pub mod detector;
pub mod error;
pub mod git;
pub mod model;
pub mod paths;
pub mod process;
pub mod readers;
pub mod store;
pub mod trailer;

pub use config::DetectConfig;
pub use detector::{detect, Detector};
pub use error::{DetectError, GitError, ReadError, StoreError};
pub use model::{Attribution, Confidence, Detection, Method, SessionInfo, Tool};
pub use store::StoreBackend;
