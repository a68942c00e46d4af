pub mod attribution;
pub mod serde_utils;
pub mod session_info;
pub mod tool;

pub use attribution::{Attribution, Detection};
pub use session_info::SessionInfo;
pub use tool::{Confidence, Method, Tool};
