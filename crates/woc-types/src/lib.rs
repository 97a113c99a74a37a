//! Foundation types for the WoC archive reader.
//!
//! Every other `woc-*` crate depends on `woc-types`.
//!
//! # Key Types
//!
//! - [`ObjectKey`] -- 20-byte content hash of a git object, interchangeable
//!   with its 40-character hex form
//! - [`CommitTime`] -- authored/committed instant with its original UTC offset

pub mod error;
pub mod key;
pub mod time;

pub use error::TypeError;
pub use key::{ObjectKey, KEY_LEN, HEX_KEY_LEN};
pub use time::{parse_commit_time, parse_commit_time_at, unknown_time_sentinel, CommitTime};
