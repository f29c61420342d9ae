//! Data models for topic selection.
//!
//! Field names serialize in camelCase to match the admin client.

mod category;
mod period;
mod question;
mod student;
mod topic;

pub use category::*;
pub use period::*;
pub use question::*;
pub use student::*;
pub use topic::*;

use serde::{Deserialize, Deserializer};

/// Entity identifier as issued by the store.
pub type Id = String;

/// Reads a clearable patch field: a missing field stays `None` (unchanged)
/// while an explicit `null` becomes `Some(None)` (cleared).
pub(crate) fn clearable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
