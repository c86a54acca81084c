//! Formatters for standard containers and pointers.
//!
//! Every adapter here delegates element encoding back to the resolver (or,
//! for primitives, straight to the writer), so a `Vec<Shape>` or an
//! `Option<Box<Expr>>` works as soon as the element type is resolvable.
//!
//! Sequences are MessagePack arrays and maps are MessagePack maps. `Option`
//! writes `None` as nil and defers `Some` to the element formatter's own
//! optional handling, which is where sum types apply their nil semantics.
//! A `OnceLock` is a deferred value: it is written as its contents, or nil
//! while uninitialised, and always decodes already initialised unless the
//! input is nil.

use std::{
    collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque},
    hash::{BuildHasher, Hash},
    marker::PhantomData,
    sync::{Arc, OnceLock},
};

use crate::{
    error::Error,
    formatter::{Formattable, Formatter},
    msgpack::{Reader, Writer},
    resolver::Resolver,
};

// =============================================================================
// Option
// =============================================================================

/// Formats `Option<T>` through the element formatter's optional methods.
pub struct OptionFormatter<T> {
    inner: Arc<dyn Formatter<T>>,
}

impl<T> OptionFormatter<T> {
    #[must_use]
    pub fn new(inner: Arc<dyn Formatter<T>>) -> Self { Self { inner } }
}

impl<T> std::fmt::Debug for OptionFormatter<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OptionFormatter").finish_non_exhaustive()
    }
}

impl<T> Formatter<Option<T>> for OptionFormatter<T> {
    fn serialize(
        &self,
        writer: &mut Writer,
        value: &Option<T>,
        resolver: &Resolver,
    ) -> Result<(), Error> {
        self.inner.serialize_optional(writer, value.as_ref(), resolver)
    }

    fn deserialize(
        &self,
        reader: &mut Reader<'_>,
        resolver: &Resolver,
    ) -> Result<Option<T>, Error> {
        self.inner.deserialize_optional(reader, resolver)
    }
}

impl<T: Formattable> Formattable for Option<T> {
    fn build_formatter(
        resolver: &Resolver,
    ) -> Result<Arc<dyn Formatter<Self>>, Error> {
        Ok(Arc::new(OptionFormatter::new(resolver.formatter::<T>()?)))
    }

    fn default_value() -> Option<Self> { Some(None) }
}

// =============================================================================
// Sequences
// =============================================================================

/// Formats a sequence collection as a MessagePack array.
pub struct SequenceFormatter<C>(PhantomData<fn() -> C>);

impl<C> SequenceFormatter<C> {
    #[must_use]
    pub const fn new() -> Self { Self(PhantomData) }
}

impl<C> Default for SequenceFormatter<C> {
    fn default() -> Self { Self::new() }
}

impl<C> std::fmt::Debug for SequenceFormatter<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SequenceFormatter")
            .field("type", &std::any::type_name::<C>())
            .finish()
    }
}

fn write_sequence<'a, T: Formattable>(
    writer: &mut Writer,
    len: usize,
    items: impl IntoIterator<Item = &'a T>,
    resolver: &Resolver,
) -> Result<(), Error> {
    writer.write_array_header(len)?;
    for item in items {
        item.serialize_field(writer, resolver)?;
    }
    Ok(())
}

fn read_sequence<T: Formattable, C: FromIterator<T>>(
    reader: &mut Reader<'_>,
    resolver: &Resolver,
) -> Result<C, Error> {
    let len = reader.read_array_header()?;
    (0..len).map(|_| T::deserialize_field(reader, resolver)).collect()
}

macro_rules! impl_sequence {
    ($(
        $collection:ident<T $(, $hasher:ident)?>
            where [$($bound:tt)*]
    ),* $(,)?) => {
        $(
            impl<T $(, $hasher)?> Formatter<$collection<T $(, $hasher)?>>
                for SequenceFormatter<$collection<T $(, $hasher)?>>
            where
                $($bound)*
            {
                fn serialize(
                    &self,
                    writer: &mut Writer,
                    value: &$collection<T $(, $hasher)?>,
                    resolver: &Resolver,
                ) -> Result<(), Error> {
                    write_sequence(writer, value.len(), value, resolver)
                }

                fn deserialize(
                    &self,
                    reader: &mut Reader<'_>,
                    resolver: &Resolver,
                ) -> Result<$collection<T $(, $hasher)?>, Error> {
                    read_sequence(reader, resolver)
                }
            }

            impl<T $(, $hasher)?> Formattable for $collection<T $(, $hasher)?>
            where
                $($bound)*
            {
                fn build_formatter(
                    _: &Resolver,
                ) -> Result<Arc<dyn Formatter<Self>>, Error> {
                    Ok(Arc::new(SequenceFormatter::<Self>::new()))
                }

                fn default_value() -> Option<Self> { Some(Self::default()) }
            }
        )*
    };
}

impl_sequence! {
    Vec<T> where [T: Formattable],
    VecDeque<T> where [T: Formattable],
    BTreeSet<T> where [T: Formattable + Ord],
    HashSet<T, S> where [
        T: Formattable + Eq + Hash,
        S: BuildHasher + Default + Send + 'static,
    ],
}

// =============================================================================
// Maps
// =============================================================================

/// Formats a map collection as a MessagePack map.
pub struct MapFormatter<M>(PhantomData<fn() -> M>);

impl<M> MapFormatter<M> {
    #[must_use]
    pub const fn new() -> Self { Self(PhantomData) }
}

impl<M> Default for MapFormatter<M> {
    fn default() -> Self { Self::new() }
}

impl<M> std::fmt::Debug for MapFormatter<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapFormatter")
            .field("type", &std::any::type_name::<M>())
            .finish()
    }
}

fn write_map<'a, K: Formattable, V: Formattable>(
    writer: &mut Writer,
    len: usize,
    entries: impl IntoIterator<Item = (&'a K, &'a V)>,
    resolver: &Resolver,
) -> Result<(), Error> {
    writer.write_map_header(len)?;
    for (key, value) in entries {
        key.serialize_field(writer, resolver)?;
        value.serialize_field(writer, resolver)?;
    }
    Ok(())
}

fn read_map<K: Formattable, V: Formattable, M: FromIterator<(K, V)>>(
    reader: &mut Reader<'_>,
    resolver: &Resolver,
) -> Result<M, Error> {
    let len = reader.read_map_header()?;
    (0..len)
        .map(|_| {
            let key = K::deserialize_field(reader, resolver)?;
            let value = V::deserialize_field(reader, resolver)?;
            Ok((key, value))
        })
        .collect()
}

macro_rules! impl_map {
    ($(
        $collection:ident<K, V $(, $hasher:ident)?>
            where [$($bound:tt)*]
    ),* $(,)?) => {
        $(
            impl<K, V $(, $hasher)?> Formatter<$collection<K, V $(, $hasher)?>>
                for MapFormatter<$collection<K, V $(, $hasher)?>>
            where
                $($bound)*
            {
                fn serialize(
                    &self,
                    writer: &mut Writer,
                    value: &$collection<K, V $(, $hasher)?>,
                    resolver: &Resolver,
                ) -> Result<(), Error> {
                    write_map(writer, value.len(), value, resolver)
                }

                fn deserialize(
                    &self,
                    reader: &mut Reader<'_>,
                    resolver: &Resolver,
                ) -> Result<$collection<K, V $(, $hasher)?>, Error> {
                    read_map(reader, resolver)
                }
            }

            impl<K, V $(, $hasher)?> Formattable
                for $collection<K, V $(, $hasher)?>
            where
                $($bound)*
            {
                fn build_formatter(
                    _: &Resolver,
                ) -> Result<Arc<dyn Formatter<Self>>, Error> {
                    Ok(Arc::new(MapFormatter::<Self>::new()))
                }

                fn default_value() -> Option<Self> { Some(Self::default()) }
            }
        )*
    };
}

impl_map! {
    BTreeMap<K, V> where [K: Formattable + Ord, V: Formattable],
    HashMap<K, V, S> where [
        K: Formattable + Eq + Hash,
        V: Formattable,
        S: BuildHasher + Default + Send + 'static,
    ],
}

// =============================================================================
// Pointers
// =============================================================================

/// Formats `Box<T>` and `Arc<T>` exactly as their pointee.
///
/// The optional methods forward too, so `Option<Box<T>>` keeps the nil
/// semantics of `T`.
pub struct PointerFormatter<T> {
    inner: Arc<dyn Formatter<T>>,
}

impl<T> PointerFormatter<T> {
    #[must_use]
    pub fn new(inner: Arc<dyn Formatter<T>>) -> Self { Self { inner } }
}

impl<T> std::fmt::Debug for PointerFormatter<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PointerFormatter").finish_non_exhaustive()
    }
}

macro_rules! impl_pointer {
    ($($pointer:ident where [$($bound:tt)*]),* $(,)?) => {
        $(
            impl<T> Formatter<$pointer<T>> for PointerFormatter<T>
            where
                $($bound)*
            {
                fn serialize(
                    &self,
                    writer: &mut Writer,
                    value: &$pointer<T>,
                    resolver: &Resolver,
                ) -> Result<(), Error> {
                    self.inner.serialize(writer, value, resolver)
                }

                fn deserialize(
                    &self,
                    reader: &mut Reader<'_>,
                    resolver: &Resolver,
                ) -> Result<$pointer<T>, Error> {
                    self.inner.deserialize(reader, resolver).map($pointer::new)
                }

                fn serialize_optional(
                    &self,
                    writer: &mut Writer,
                    value: Option<&$pointer<T>>,
                    resolver: &Resolver,
                ) -> Result<(), Error> {
                    self.inner.serialize_optional(
                        writer,
                        value.map(|pointer| &**pointer),
                        resolver,
                    )
                }

                fn deserialize_optional(
                    &self,
                    reader: &mut Reader<'_>,
                    resolver: &Resolver,
                ) -> Result<Option<$pointer<T>>, Error> {
                    self.inner
                        .deserialize_optional(reader, resolver)
                        .map(|value| value.map($pointer::new))
                }
            }

            impl<T> Formattable for $pointer<T>
            where
                $($bound)*
            {
                fn build_formatter(
                    resolver: &Resolver,
                ) -> Result<Arc<dyn Formatter<Self>>, Error> {
                    Ok(Arc::new(PointerFormatter::new(
                        resolver.formatter::<T>()?,
                    )))
                }

                fn default_value() -> Option<Self> {
                    T::default_value().map($pointer::new)
                }
            }
        )*
    };
}

impl_pointer! {
    Box where [T: Formattable],
    Arc where [T: Formattable + Sync],
}

// =============================================================================
// Deferred values
// =============================================================================

/// Formats `OnceLock<T>` as its value, with nil for an empty cell.
pub struct DeferredFormatter<T> {
    inner: Arc<dyn Formatter<T>>,
}

impl<T> DeferredFormatter<T> {
    #[must_use]
    pub fn new(inner: Arc<dyn Formatter<T>>) -> Self { Self { inner } }
}

impl<T> std::fmt::Debug for DeferredFormatter<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeferredFormatter").finish_non_exhaustive()
    }
}

impl<T> Formatter<OnceLock<T>> for DeferredFormatter<T> {
    fn serialize(
        &self,
        writer: &mut Writer,
        value: &OnceLock<T>,
        resolver: &Resolver,
    ) -> Result<(), Error> {
        self.inner.serialize_optional(writer, value.get(), resolver)
    }

    fn deserialize(
        &self,
        reader: &mut Reader<'_>,
        resolver: &Resolver,
    ) -> Result<OnceLock<T>, Error> {
        Ok(self
            .inner
            .deserialize_optional(reader, resolver)?
            .map_or_else(OnceLock::new, OnceLock::from))
    }
}

impl<T: Formattable> Formattable for OnceLock<T> {
    fn build_formatter(
        resolver: &Resolver,
    ) -> Result<Arc<dyn Formatter<Self>>, Error> {
        Ok(Arc::new(DeferredFormatter::new(resolver.formatter::<T>()?)))
    }

    fn default_value() -> Option<Self> { Some(Self::new()) }
}
