//! Update filters: validated partial-update requests
//!
//! An [`UpdateFilter`] describes which fields of a
//! [`StatusThing`](crate::model::StatusThing) an update should change. Filters
//! are assembled from [`UpdateOption`]s, applied in order with the last option
//! for a field winning, and validated as they are applied.
//!
//! ```rust
//! use statusthing::filter::UpdateFilter;
//! use statusthing::model::Status;
//!
//! let filter = UpdateFilter::builder()
//!     .with_status(Status::Red)
//!     .with_status(Status::Green)
//!     .build()
//!     .unwrap();
//! assert_eq!(filter.status(), Status::Green);
//!
//! assert!(UpdateFilter::builder().with_status(Status::Unknown).build().is_err());
//! ```

use crate::error::{Error, Result};
use crate::model::Status;

/// A single requested change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOption {
    /// Set the status; `Unknown` is rejected
    Status(Status),
}

impl UpdateOption {
    fn apply(self, filter: &mut UpdateFilter) -> Result<()> {
        match self {
            Self::Status(status) => {
                if !status.is_known() {
                    return Err(Error::RequiredValueMissing(
                        "a valid status must be provided".to_string(),
                    ));
                }
                filter.status = status;
            }
        }
        Ok(())
    }
}

/// A validated, immutable partial-update request
///
/// `Status::Unknown` is the "no change" sentinel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateFilter {
    status: Status,
}

impl UpdateFilter {
    /// Build a filter from options, applied in order
    ///
    /// The first option that fails validation aborts the build.
    pub fn new(options: impl IntoIterator<Item = UpdateOption>) -> Result<Self> {
        let mut filter = Self::default();
        for option in options {
            option.apply(&mut filter)?;
        }
        Ok(filter)
    }

    /// Start a chainable builder
    pub fn builder() -> UpdateFilterBuilder {
        UpdateFilterBuilder::default()
    }

    /// Requested status, or `Status::Unknown` when no change was requested
    pub fn status(&self) -> Status {
        self.status
    }

    /// Whether the filter requests any change at all
    pub fn has_changes(&self) -> bool {
        self.status.is_known()
    }
}

/// Chainable builder for [`UpdateFilter`]
///
/// Options are recorded as given and only validated by [`build`](Self::build).
#[derive(Debug, Clone, Default)]
pub struct UpdateFilterBuilder {
    options: Vec<UpdateOption>,
}

impl UpdateFilterBuilder {
    /// Request a status change
    #[must_use]
    pub fn with_status(mut self, status: Status) -> Self {
        self.options.push(UpdateOption::Status(status));
        self
    }

    /// Apply the recorded options and validate them
    pub fn build(self) -> Result<UpdateFilter> {
        UpdateFilter::new(self.options)
    }
}
