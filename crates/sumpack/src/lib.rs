//! MessagePack codecs for Rust sum types.
//!
//! This crate builds encoder/decoder pairs ("formatters") for sum types from
//! their case metadata and converts values to and from MessagePack. Encoded
//! data follows a small set of schema-evolution rules, so a reader and a
//! writer built from different versions of a type still interoperate.
//!
//! # Overview
//!
//! - [`Union`]: the metadata of a sum type, usually derived.
//! - [`Formatter`]: the encoder/decoder of one type.
//! - [`Formattable`]: how a type takes part in formatter resolution.
//! - [`Resolver`]: hands out and caches formatters.
//!
//! # Derive Macro
//!
//! ```ignore
//! use sumpack::{Resolver, Union};
//!
//! #[derive(Debug, PartialEq, Union)]
//! enum Shape {
//!     Circle { radius: f64 },
//!     Rectangle { width: f64, height: f64 },
//!     Empty,
//! }
//!
//! let resolver = Resolver::new();
//! let bytes = resolver.serialize(&Shape::Circle { radius: 2.5 })?;
//!
//! // [0, {"radius": 2.5}]
//! assert_eq!(&bytes[..3], &[0x92, 0x00, 0x81]);
//! assert_eq!(resolver.deserialize::<Shape>(&bytes)?, Shape::Circle {
//!     radius: 2.5
//! });
//! ```
//!
//! ## Container Attributes
//!
//! - `#[sumpack(int_keys)]` / `#[sumpack(string_keys)]` pin the wire layout.
//!   Without either, the resolver's configured default applies.
//! - `#[sumpack(value_kind)]` makes the type value-kind: it has no null
//!   instance, so nil and unknown case tags are decode errors.
//! - `#[sumpack(default)]` lets a missing field of this type decode to
//!   `Default::default()`.
//!
//! ## Field Attributes
//!
//! `#[sumpack(skip)]` keeps a field off the wire. The field type must have a
//! default value, which it takes on decode.

extern crate self as sumpack;

pub mod adapter;
pub mod config;
pub mod error;
pub mod formatter;
pub mod msgpack;
pub mod resolver;
mod single_flight;
pub mod union;

pub use config::ResolverConfig;
pub use error::{Error, FormatError, MetadataError};
pub use formatter::{Formattable, Formatter};
pub use msgpack::{Reader, Writer};
pub use resolver::Resolver;
pub use sumpack_derive::Union;
pub use union::{
    Arguments, CaseDescriptor, Constructor, FieldDescriptor, LayoutMode,
    Parameter, Union, UnionDescriptor, UnionKind,
};
