//! Domain model: the tracked [`StatusThing`] and its [`Status`]
//!
//! Statuses have two stable encodings:
//! - a string code (`STATUS_RED`, ...) used on the wire
//! - an integer ordinal (`Unknown = 0`, `Red = 1`, ...) used in storage
//!
//! Decoding is permissive in both directions: anything unrecognized becomes
//! [`Status::Unknown`] instead of an error.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

const RED_CODE: &str = "STATUS_RED";
const GREEN_CODE: &str = "STATUS_GREEN";
const YELLOW_CODE: &str = "STATUS_YELLOW";
const UNKNOWN_CODE: &str = "STATUS_UNKNOWN";

/// Health state of a [`StatusThing`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[repr(i64)]
pub enum Status {
    /// No status; the default value, never valid as creation input
    #[default]
    Unknown = 0,
    /// Generally the bad status
    Red = 1,
    /// Generally the good status
    Green = 2,
    /// Generally the warning/remediation status
    Yellow = 3,
}

impl Status {
    /// Decode a status from its string code
    ///
    /// # Example
    ///
    /// ```rust
    /// use statusthing::model::Status;
    ///
    /// assert_eq!(Status::from_code("STATUS_GREEN"), Status::Green);
    /// assert_eq!(Status::from_code("green"), Status::Unknown);
    /// ```
    pub fn from_code(code: &str) -> Self {
        match code {
            RED_CODE => Self::Red,
            GREEN_CODE => Self::Green,
            YELLOW_CODE => Self::Yellow,
            _ => Self::Unknown,
        }
    }

    /// Decode a status from its stored ordinal
    pub fn from_ordinal(ordinal: i64) -> Self {
        match ordinal {
            1 => Self::Red,
            2 => Self::Green,
            3 => Self::Yellow,
            _ => Self::Unknown,
        }
    }

    /// The stable string code for this status
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Red => RED_CODE,
            Self::Green => GREEN_CODE,
            Self::Yellow => YELLOW_CODE,
            Self::Unknown => UNKNOWN_CODE,
        }
    }

    /// The integer stored in the `status` column
    pub const fn ordinal(&self) -> i64 {
        *self as i64
    }

    /// Whether this is one of the real statuses (anything but `Unknown`)
    pub const fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for Status {
    fn from(code: &str) -> Self {
        Self::from_code(code)
    }
}

impl Serialize for Status {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Status {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = String::deserialize(deserializer)?;
        Ok(Self::from_code(&code))
    }
}

/// A "thing" that has a status
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusThing {
    /// Opaque identifier assigned at creation
    #[serde(default)]
    pub id: String,
    /// Unique name
    #[serde(default)]
    pub name: String,
    /// Free-text description
    #[serde(default)]
    pub description: String,
    /// Current status
    #[serde(default)]
    pub status: Status,
}

/// Caller-supplied values for creating a [`StatusThing`]
///
/// Carries no id; the provider assigns one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewStatusThing {
    /// Unique name
    pub name: String,
    /// Free-text description
    pub description: String,
    /// Initial status
    pub status: Status,
}

impl NewStatusThing {
    /// Create a new set of creation parameters
    pub fn new(name: impl Into<String>, description: impl Into<String>, status: Status) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            status,
        }
    }
}
