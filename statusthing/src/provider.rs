//! Business rules for status things
//!
//! The [`Provider`] validates caller input, assigns identifiers and hands off
//! to a [`StatusThingStorer`]. It holds no state of its own beyond the storer
//! and the id generator, so one instance can be shared by every request.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, instrument};

use crate::error::{Error, Result};
use crate::filter::UpdateFilter;
use crate::ids::ThingId;
use crate::model::{NewStatusThing, Status, StatusThing};
use crate::storer::StatusThingStorer;

/// Produces identifiers for new status things
pub type IdGenerator = Arc<dyn Fn() -> String + Send + Sync>;

/// Operations the HTTP layer can perform on status things
#[async_trait]
pub trait Provider: Send + Sync {
    /// Every stored thing
    async fn all(&self) -> Result<Vec<StatusThing>>;

    /// One thing by id
    async fn get(&self, id: &str) -> Result<StatusThing>;

    /// Validate and persist a new thing, returning it with its assigned id
    async fn add(&self, new: NewStatusThing) -> Result<StatusThing>;

    /// Remove a thing; unknown ids are not an error
    async fn remove(&self, id: &str) -> Result<()>;

    /// Change the status of an existing thing
    async fn set_status(&self, id: &str, status: Status) -> Result<()>;
}

/// The default [`Provider`], backed by any [`StatusThingStorer`]
#[derive(Clone)]
pub struct StatusThingProvider {
    storer: Arc<dyn StatusThingStorer>,
    id_generator: IdGenerator,
}

impl StatusThingProvider {
    /// Create a provider that assigns [`ThingId`]s
    pub fn new(storer: Arc<dyn StatusThingStorer>) -> Self {
        Self {
            storer,
            id_generator: Arc::new(|| ThingId::new().into()),
        }
    }

    /// Replace the id generator
    ///
    /// ```rust
    /// use std::sync::Arc;
    /// use statusthing::provider::StatusThingProvider;
    /// use statusthing::storer::UnimplementedStorer;
    ///
    /// let provider = StatusThingProvider::new(Arc::new(UnimplementedStorer))
    ///     .with_id_generator(|| "fixed-id".to_string());
    /// ```
    #[must_use]
    pub fn with_id_generator<F>(mut self, generator: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        self.id_generator = Arc::new(generator);
        self
    }

    fn validate(new: &NewStatusThing) -> Result<()> {
        if !new.status.is_known() {
            return Err(Error::RequiredValueMissing("status".to_string()));
        }
        if new.name.is_empty() {
            return Err(Error::RequiredValueMissing("name".to_string()));
        }
        if new.description.is_empty() {
            return Err(Error::RequiredValueMissing("description".to_string()));
        }
        Ok(())
    }
}

impl fmt::Debug for StatusThingProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatusThingProvider").finish_non_exhaustive()
    }
}

#[async_trait]
impl Provider for StatusThingProvider {
    async fn all(&self) -> Result<Vec<StatusThing>> {
        self.storer.get_all().await
    }

    async fn get(&self, id: &str) -> Result<StatusThing> {
        self.storer.get(id).await
    }

    #[instrument(skip(self, new), fields(name = %new.name))]
    async fn add(&self, new: NewStatusThing) -> Result<StatusThing> {
        Self::validate(&new)?;

        let thing = StatusThing {
            id: (self.id_generator)(),
            name: new.name,
            description: new.description,
            status: new.status,
        };
        debug!(id = %thing.id, "adding status thing");
        self.storer.insert(thing).await
    }

    async fn remove(&self, id: &str) -> Result<()> {
        self.storer.delete(id).await
    }

    #[instrument(skip(self))]
    async fn set_status(&self, id: &str, status: Status) -> Result<()> {
        let filter = UpdateFilter::builder().with_status(status).build()?;
        self.storer.update(id, filter).await?;
        Ok(())
    }
}

/// A provider that supports nothing
///
/// Every method returns [`Error::Unsupported`].
#[derive(Debug, Clone, Copy, Default)]
pub struct UnimplementedProvider;

impl UnimplementedProvider {
    fn unsupported<T>(operation: &str) -> Result<T> {
        Err(Error::Unsupported(format!("provider operation '{}'", operation)))
    }
}

#[async_trait]
impl Provider for UnimplementedProvider {
    async fn all(&self) -> Result<Vec<StatusThing>> {
        Self::unsupported("all")
    }

    async fn get(&self, _id: &str) -> Result<StatusThing> {
        Self::unsupported("get")
    }

    async fn add(&self, _new: NewStatusThing) -> Result<StatusThing> {
        Self::unsupported("add")
    }

    async fn remove(&self, _id: &str) -> Result<()> {
        Self::unsupported("remove")
    }

    async fn set_status(&self, _id: &str, _status: Status) -> Result<()> {
        Self::unsupported("set_status")
    }
}
