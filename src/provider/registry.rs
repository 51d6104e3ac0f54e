use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::{ProviderDescriptor, ProviderFactory};
use crate::error::{ProviderComponent, SqlExecError};
use crate::types::ProviderTag;

/// Strategy map from provider tag to factory.
#[derive(Clone)]
pub struct ProviderRegistry {
    factories: HashMap<ProviderTag, Arc<dyn ProviderFactory>>,
}

impl ProviderRegistry {
    /// A registry with nothing registered.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register (or replace) the factory for `tag`.
    pub fn register(&mut self, tag: ProviderTag, factory: Arc<dyn ProviderFactory>) -> &mut Self {
        self.factories.insert(tag, factory);
        self
    }

    #[must_use]
    pub fn contains(&self, tag: ProviderTag) -> bool {
        self.factories.contains_key(&tag)
    }

    #[must_use]
    pub fn get(&self, tag: ProviderTag) -> Option<Arc<dyn ProviderFactory>> {
        self.factories.get(&tag).cloned()
    }

    /// Resolve a descriptor to a factory. Custom factories never touch the map.
    ///
    /// # Errors
    /// Returns `SqlExecError::ProviderResolution` if the tag is not registered.
    pub fn resolve(
        &self,
        descriptor: &ProviderDescriptor,
    ) -> Result<Arc<dyn ProviderFactory>, SqlExecError> {
        match descriptor {
            ProviderDescriptor::Custom(factory) => Ok(Arc::clone(factory)),
            ProviderDescriptor::Tag(tag) => {
                self.get(*tag)
                    .ok_or_else(|| SqlExecError::ProviderResolution {
                        provider: tag.to_string(),
                        component: ProviderComponent::Factory,
                    })
            }
        }
    }
}

impl Default for ProviderRegistry {
    /// Registry holding the built-in providers enabled at compile time.
    fn default() -> Self {
        #[allow(unused_mut)]
        let mut registry = Self::empty();
        #[cfg(feature = "sqlite")]
        registry.register(
            ProviderTag::Sqlite,
            Arc::new(crate::sqlite::SqliteProviderFactory),
        );
        registry
    }
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut tags: Vec<_> = self.factories.keys().map(ToString::to_string).collect();
        tags.sort();
        f.debug_struct("ProviderRegistry")
            .field("providers", &tags)
            .finish()
    }
}
