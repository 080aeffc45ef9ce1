//! Partial updates for hotels and customers.

use serde::{Deserialize, Serialize};

/// How provided-but-empty update values are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdatePolicy {
    /// An empty string or a zero is treated as "leave unchanged", which is
    /// how existing tooling behaves.
    #[default]
    IgnoreEmpty,
    /// Every provided value is written, including empty strings and zero.
    Explicit,
}

impl UpdatePolicy {
    /// Resolve a text field: `Some` when the stored value must change.
    pub fn text(self, value: Option<&str>) -> Option<String> {
        match (self, value) {
            (_, None) => None,
            (UpdatePolicy::IgnoreEmpty, Some("")) => None,
            (_, Some(text)) => Some(text.to_string()),
        }
    }

    /// Resolve a numeric field: `Some` when the stored value must change.
    pub fn number(self, value: Option<u32>) -> Option<u32> {
        match (self, value) {
            (UpdatePolicy::IgnoreEmpty, Some(0)) => None,
            (_, value) => value,
        }
    }
}

/// Fields a hotel update may carry. Absent fields stay unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HotelUpdate {
    /// New name.
    pub name: Option<String>,
    /// New room count.
    pub room_count: Option<u32>,
}

impl HotelUpdate {
    /// Set the name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the room count.
    pub fn room_count(mut self, room_count: u32) -> Self {
        self.room_count = Some(room_count);
        self
    }
}

/// Fields a customer update may carry. Absent fields stay unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CustomerUpdate {
    /// New name.
    pub name: Option<String>,
    /// New age.
    pub age: Option<u32>,
}

impl CustomerUpdate {
    /// Set the name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the age.
    pub fn age(mut self, age: u32) -> Self {
        self.age = Some(age);
        self
    }
}
