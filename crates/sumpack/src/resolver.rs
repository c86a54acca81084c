//! Formatter resolution and caching.
//!
//! A [`Resolver`] owns the formatter cache. Asking it for the formatter of a
//! type returns the cached instance when there is one, and otherwise builds
//! it through [`Formattable::build_formatter`] and publishes the result.
//! Built formatters are kept for the lifetime of the resolver.
//!
//! Field formatters are looked up when a value is encoded or decoded, not
//! when the enclosing formatter is built, so recursive sum types resolve
//! without recursing at build time.
//!
//! # Example
//!
//! ```ignore
//! use sumpack::{Resolver, Union};
//!
//! #[derive(Debug, PartialEq, Union)]
//! enum Shape {
//!     Circle { radius: f64 },
//!     Square { side: f64 },
//! }
//!
//! let resolver = Resolver::new();
//! let bytes = resolver.serialize(&Shape::Circle { radius: 2.5 })?;
//! let shape: Shape = resolver.deserialize(&bytes)?;
//! ```

use std::{
    any::{Any, TypeId, type_name},
    sync::Arc,
};

use dashmap::DashMap;
use fxhash::FxBuildHasher;
use tracing::debug;

use crate::{
    config::ResolverConfig,
    error::{Error, FormatError},
    formatter::{Formattable, Formatter},
    msgpack::{Reader, Writer},
    single_flight::SingleFlight,
};

/// Hands out formatters and caches them by type.
///
/// Each entry holds an `Arc<dyn Formatter<T>>` keyed by `TypeId::of::<T>()`,
/// so every generic instantiation has its own entry. The resolver is `Send`
/// and `Sync`; concurrent resolutions of one type either share a single
/// build (when the build guard is enabled) or race and publish equivalent
/// formatters with the last write winning.
pub struct Resolver {
    config: ResolverConfig,
    formatters: DashMap<TypeId, Arc<dyn Any + Send + Sync>, FxBuildHasher>,
    in_flight: Option<SingleFlight<TypeId>>,
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("config", &self.config)
            .field("formatters", &self.formatters.len())
            .finish_non_exhaustive()
    }
}

impl Default for Resolver {
    fn default() -> Self { Self::new() }
}

impl Resolver {
    /// Creates a resolver with the default configuration.
    #[must_use]
    pub fn new() -> Self { Self::with_config(ResolverConfig::default()) }

    #[must_use]
    pub fn with_config(config: ResolverConfig) -> Self {
        Self {
            formatters: DashMap::with_hasher_and_shard_amount(
                FxBuildHasher::default(),
                config.shard_amount(),
            ),
            in_flight: config
                .build_guard()
                .then(|| SingleFlight::new(config.shard_amount())),
            config,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &ResolverConfig { &self.config }

    /// Installs `formatter` as the formatter of `T`, replacing any cached
    /// one. Registered formatters take precedence over built ones.
    pub fn register<T: 'static, F: Formatter<T> + 'static>(
        &self,
        formatter: F,
    ) {
        let formatter: Arc<dyn Formatter<T>> = Arc::new(formatter);
        self.formatters.insert(TypeId::of::<T>(), Arc::new(formatter));

        debug!(type_name = type_name::<T>(), "registered formatter");
    }

    /// Returns the formatter of `T`, building and caching it on first use.
    ///
    /// A failed build is not cached; asking again retries it.
    pub fn formatter<T: Formattable>(
        &self,
    ) -> Result<Arc<dyn Formatter<T>>, Error> {
        if let Some(formatter) = self.cached::<T>() {
            return Ok(formatter);
        }

        let Some(in_flight) = &self.in_flight else {
            return self.build::<T>();
        };

        let key = TypeId::of::<T>();
        match in_flight.wait_or_work(&key, || self.build::<T>()) {
            Some(result) => result,

            // the other build may have failed, in which case we try ourselves
            None => self.cached::<T>().map_or_else(|| self.build::<T>(), Ok),
        }
    }

    /// Returns whether a formatter of `T` is cached.
    #[must_use]
    pub fn contains<T: 'static>(&self) -> bool {
        self.formatters.contains_key(&TypeId::of::<T>())
    }

    /// The number of cached formatters.
    #[must_use]
    pub fn len(&self) -> usize { self.formatters.len() }

    #[must_use]
    pub fn is_empty(&self) -> bool { self.formatters.is_empty() }

    /// Encodes `value` into a new buffer.
    pub fn serialize<T: Formattable>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, Error> {
        let mut writer = Writer::new();
        value.serialize_field(&mut writer, self)?;
        Ok(writer.into_inner())
    }

    /// Decodes a `T` that must span all of `bytes`.
    pub fn deserialize<T: Formattable>(
        &self,
        bytes: &[u8],
    ) -> Result<T, Error> {
        let mut reader = Reader::new(bytes);
        let value = T::deserialize_field(&mut reader, self)?;

        if !reader.is_empty() {
            return Err(
                FormatError::TrailingBytes(reader.remaining().len()).into()
            );
        }

        Ok(value)
    }

    fn cached<T: 'static>(&self) -> Option<Arc<dyn Formatter<T>>> {
        self.formatters.get(&TypeId::of::<T>()).and_then(|entry| {
            entry.value().downcast_ref::<Arc<dyn Formatter<T>>>().cloned()
        })
    }

    fn build<T: Formattable>(&self) -> Result<Arc<dyn Formatter<T>>, Error> {
        let formatter = T::build_formatter(self)?;

        // last write wins when two builds race
        self.formatters
            .insert(TypeId::of::<T>(), Arc::new(formatter.clone()));

        debug!(type_name = type_name::<T>(), "built and published formatter");

        Ok(formatter)
    }
}
