//! The formatter abstraction and its leaf implementations.
//!
//! A [`Formatter<T>`] is the encoder/decoder pair for one concrete type. The
//! [`Resolver`] hands formatters out and caches them; a type takes part in
//! resolution by implementing [`Formattable`], which says how its formatter
//! is built and how the type is written when it appears as a field of a sum
//! type case.
//!
//! Leaf formatters for the primitive allow-list, `String`, [`Bytes`] and the
//! unit type live here. Container and pointer adapters live in
//! [`crate::adapter`] and the sum type formatter in [`crate::union`].

use std::{any::type_name, marker::PhantomData, sync::Arc};

use bytes::Bytes;

use crate::{
    error::{Error, MetadataError},
    msgpack::{Primitive, Reader, Writer},
    resolver::Resolver,
};

/// Encodes and decodes values of `T` as MessagePack.
///
/// Formatters are immutable once built and shared across threads through
/// `Arc<dyn Formatter<T>>`.
pub trait Formatter<T>: Send + Sync {
    /// Writes `value` as exactly one MessagePack value.
    fn serialize(
        &self,
        writer: &mut Writer,
        value: &T,
        resolver: &Resolver,
    ) -> Result<(), Error>;

    /// Reads exactly one MessagePack value as `T`.
    fn deserialize(
        &self,
        reader: &mut Reader<'_>,
        resolver: &Resolver,
    ) -> Result<T, Error>;

    /// Writes an optional value. `None` is written as nil.
    fn serialize_optional(
        &self,
        writer: &mut Writer,
        value: Option<&T>,
        resolver: &Resolver,
    ) -> Result<(), Error> {
        match value {
            Some(value) => self.serialize(writer, value, resolver),
            None => writer.write_nil(),
        }
    }

    /// Reads an optional value. Nil decodes to `None`.
    fn deserialize_optional(
        &self,
        reader: &mut Reader<'_>,
        resolver: &Resolver,
    ) -> Result<Option<T>, Error> {
        if reader.try_read_nil()? {
            return Ok(None);
        }
        self.deserialize(reader, resolver).map(Some)
    }
}

/// A type that can take part in formatter resolution.
///
/// Implementations exist for the primitive allow-list, strings, byte
/// buffers, the unit type, the standard containers and pointers, and every
/// `#[derive(Union)]` type. A type whose formatter is only ever supplied
/// through [`Resolver::register`] can implement this trait with an empty
/// body.
///
/// # Example
///
/// ```ignore
/// struct Celsius(f64);
///
/// impl Formattable for Celsius {}
///
/// let resolver = Resolver::new();
/// resolver.register::<Celsius, _>(CelsiusFormatter);
/// ```
pub trait Formattable: Sized + Send + 'static {
    /// Builds the formatter for this type on a cache miss.
    ///
    /// The default reports that no formatter is available.
    fn build_formatter(
        resolver: &Resolver,
    ) -> Result<Arc<dyn Formatter<Self>>, Error> {
        let _ = resolver;
        Err(MetadataError::NoFormatter { type_name: type_name::<Self>() }
            .into())
    }

    /// Writes `self` as a field value.
    ///
    /// The default fetches the formatter from the resolver. Primitives
    /// override this to write the value directly.
    fn serialize_field(
        &self,
        writer: &mut Writer,
        resolver: &Resolver,
    ) -> Result<(), Error> {
        resolver.formatter::<Self>()?.serialize(writer, self, resolver)
    }

    /// Reads a field value.
    fn deserialize_field(
        reader: &mut Reader<'_>,
        resolver: &Resolver,
    ) -> Result<Self, Error> {
        resolver.formatter::<Self>()?.deserialize(reader, resolver)
    }

    /// The value a field of this type takes when the input does not carry
    /// it, or `None` when absence is an error.
    fn default_value() -> Option<Self> { None }
}

// =============================================================================
// Primitives
// =============================================================================

/// The formatter for the primitive allow-list.
///
/// Only used when a primitive is resolved directly; as a field a primitive
/// is written straight through the [`Writer`].
pub struct PrimitiveFormatter<P>(PhantomData<fn() -> P>);

impl<P> PrimitiveFormatter<P> {
    #[must_use]
    pub const fn new() -> Self { Self(PhantomData) }
}

impl<P> Default for PrimitiveFormatter<P> {
    fn default() -> Self { Self::new() }
}

impl<P> std::fmt::Debug for PrimitiveFormatter<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrimitiveFormatter")
            .field("type", &type_name::<P>())
            .finish()
    }
}

impl<P: Primitive> Formatter<P> for PrimitiveFormatter<P> {
    fn serialize(
        &self,
        writer: &mut Writer,
        value: &P,
        _: &Resolver,
    ) -> Result<(), Error> {
        writer.write_primitive(*value)
    }

    fn deserialize(
        &self,
        reader: &mut Reader<'_>,
        _: &Resolver,
    ) -> Result<P, Error> {
        reader.read_primitive()
    }
}

macro_rules! impl_formattable_primitive {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Formattable for $ty {
                fn build_formatter(
                    _: &Resolver,
                ) -> Result<Arc<dyn Formatter<Self>>, Error> {
                    Ok(Arc::new(PrimitiveFormatter::<$ty>::new()))
                }

                fn serialize_field(
                    &self,
                    writer: &mut Writer,
                    _: &Resolver,
                ) -> Result<(), Error> {
                    writer.write_primitive(*self)
                }

                fn deserialize_field(
                    reader: &mut Reader<'_>,
                    _: &Resolver,
                ) -> Result<Self, Error> {
                    reader.read_primitive()
                }

                fn default_value() -> Option<Self> { Some(Self::default()) }
            }
        )*
    };
}

impl_formattable_primitive!(
    i8, u8, i16, u16, i32, u32, i64, u64, f32, f64, bool, char,
);

// =============================================================================
// Strings, bytes and unit
// =============================================================================

/// Writes `String` as a MessagePack `str`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StringFormatter;

impl Formatter<String> for StringFormatter {
    fn serialize(
        &self,
        writer: &mut Writer,
        value: &String,
        _: &Resolver,
    ) -> Result<(), Error> {
        writer.write_str(value)
    }

    fn deserialize(
        &self,
        reader: &mut Reader<'_>,
        _: &Resolver,
    ) -> Result<String, Error> {
        reader.read_str().map(str::to_owned)
    }
}

impl Formattable for String {
    fn build_formatter(
        _: &Resolver,
    ) -> Result<Arc<dyn Formatter<Self>>, Error> {
        Ok(Arc::new(StringFormatter))
    }

    fn default_value() -> Option<Self> { Some(Self::new()) }
}

/// Writes [`Bytes`] as a MessagePack `bin`.
#[derive(Debug, Clone, Copy, Default)]
pub struct BytesFormatter;

impl Formatter<Bytes> for BytesFormatter {
    fn serialize(
        &self,
        writer: &mut Writer,
        value: &Bytes,
        _: &Resolver,
    ) -> Result<(), Error> {
        writer.write_bin(value)
    }

    fn deserialize(
        &self,
        reader: &mut Reader<'_>,
        _: &Resolver,
    ) -> Result<Bytes, Error> {
        reader.read_bin().map(Bytes::copy_from_slice)
    }
}

impl Formattable for Bytes {
    fn build_formatter(
        _: &Resolver,
    ) -> Result<Arc<dyn Formatter<Self>>, Error> {
        Ok(Arc::new(BytesFormatter))
    }

    fn default_value() -> Option<Self> { Some(Self::new()) }
}

/// Writes `()` as nil.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnitFormatter;

impl Formatter<()> for UnitFormatter {
    fn serialize(
        &self,
        writer: &mut Writer,
        _: &(),
        _: &Resolver,
    ) -> Result<(), Error> {
        writer.write_nil()
    }

    fn deserialize(
        &self,
        reader: &mut Reader<'_>,
        _: &Resolver,
    ) -> Result<(), Error> {
        reader.read_nil()
    }
}

impl Formattable for () {
    fn build_formatter(
        _: &Resolver,
    ) -> Result<Arc<dyn Formatter<Self>>, Error> {
        Ok(Arc::new(UnitFormatter))
    }

    fn default_value() -> Option<Self> { Some(()) }
}
