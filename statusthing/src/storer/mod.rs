//! Persistence for status things
//!
//! [`StatusThingStorer`] is the seam between business rules and storage.
//! Implementations translate backend failures into the crate's domain errors:
//! a missing row becomes [`Error::NotFound`], a duplicate name becomes
//! [`Error::AlreadyExists`], and anything else stays an opaque
//! [`Error::Storage`].
//!
//! Every mutation is a single all-or-nothing transaction.

mod sqlite;

pub use sqlite::{SqliteStorer, StorerOptions, TABLE_NAME};

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::filter::UpdateFilter;
use crate::model::StatusThing;

/// Storage backend for status things
#[async_trait]
pub trait StatusThingStorer: Send + Sync {
    /// Fetch one thing by id
    ///
    /// Returns [`Error::NotFound`] when no row matches.
    async fn get(&self, id: &str) -> Result<StatusThing>;

    /// Fetch every stored thing; empty when the table is empty
    async fn get_all(&self) -> Result<Vec<StatusThing>>;

    /// Persist a new thing and return it as stored
    ///
    /// Returns [`Error::AlreadyExists`] when the name is taken.
    async fn insert(&self, thing: StatusThing) -> Result<StatusThing>;

    /// Apply a partial update to one thing and return its new state
    ///
    /// Returns [`Error::NotFound`] when no row matches. A filter without
    /// changes returns the current state untouched.
    async fn update(&self, id: &str, filter: UpdateFilter) -> Result<StatusThing>;

    /// Remove one thing; removing an absent id is a no-op
    async fn delete(&self, id: &str) -> Result<()>;
}

/// A storer that supports nothing
///
/// Every method returns [`Error::Unsupported`]. Useful as a placeholder when
/// wiring components that never reach storage.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnimplementedStorer;

impl UnimplementedStorer {
    fn unsupported<T>(operation: &str) -> Result<T> {
        Err(Error::Unsupported(format!("storer operation '{}'", operation)))
    }
}

#[async_trait]
impl StatusThingStorer for UnimplementedStorer {
    async fn get(&self, _id: &str) -> Result<StatusThing> {
        Self::unsupported("get")
    }

    async fn get_all(&self) -> Result<Vec<StatusThing>> {
        Self::unsupported("get_all")
    }

    async fn insert(&self, _thing: StatusThing) -> Result<StatusThing> {
        Self::unsupported("insert")
    }

    async fn update(&self, _id: &str, _filter: UpdateFilter) -> Result<StatusThing> {
        Self::unsupported("update")
    }

    async fn delete(&self, _id: &str) -> Result<()> {
        Self::unsupported("delete")
    }
}
