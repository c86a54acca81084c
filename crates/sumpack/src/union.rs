//! Formatters for sum types.
//!
//! A sum type (a Rust `enum`, or anything else with a closed set of tagged
//! cases) is described by a [`UnionDescriptor`]. From it the resolver builds
//! a [`UnionFormatter`] in three steps:
//!
//! 1. the [`registry`] validates the cases and matches every constructor
//!    parameter to a field,
//! 2. the [`layout`] planner fixes how each case's fields are laid out on the
//!    wire,
//! 3. the [`codec`] interprets that plan when encoding and decoding.
//!
//! # Wire Format
//!
//! Every non-nil value is a two-element array `[tag, payload]`. Under
//! [`LayoutMode::IntKeyed`] the payload is an array indexed by field
//! position; under [`LayoutMode::StringKeyed`] it is a map keyed by field
//! name:
//!
//! ```text
//! Circle { radius: 2.5 }   int keys:    [0, [2.5]]
//!                          string keys: [0, {"radius": 2.5}]
//! ```
//!
//! Decoders tolerate extra array slots, unknown map keys, reordered keys and
//! (for [`UnionKind::Reference`] types) case tags they do not know, so data
//! written by a newer schema still decodes.
//!
//! [`UnionFormatter`]: codec::UnionFormatter

use std::sync::Arc;

use crate::{error::Error, formatter::Formatter, resolver::Resolver};

pub mod codec;
pub mod descriptor;
pub mod layout;
pub mod registry;

pub use codec::UnionFormatter;
pub use descriptor::{
    Arguments, CaseDescriptor, Constructor, FieldDescriptor, FieldType,
    Parameter, UnionDescriptor,
};

/// A type with a closed set of tagged cases.
///
/// Usually implemented with `#[derive(Union)]`.
pub trait Union: Sized + Send + 'static {
    /// Describes the cases of this type, in tag order.
    fn descriptor() -> UnionDescriptor<Self>;

    /// Returns the tag of the case `self` belongs to.
    fn case_tag(&self) -> i32;
}

/// Whether a sum type has a null instance.
///
/// A reference-kind type is nullable: `None` in an `Option` slot encodes as
/// nil, and nil or an unknown case tag decodes to `None`. A value-kind type
/// has no null instance, so both are errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum UnionKind {
    #[default]
    Reference,
    Value,
}

/// How the fields of a case are laid out on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LayoutMode {
    /// Fields are array slots at their declaration index.
    IntKeyed,

    /// Fields are map entries keyed by name.
    #[default]
    StringKeyed,
}

/// Builds the formatter of `U`.
///
/// The layout comes from the descriptor when it pins one, otherwise from
/// [`ResolverConfig::default_layout`].
///
/// [`ResolverConfig::default_layout`]: crate::config::ResolverConfig::default_layout
pub fn build_formatter<U: Union>(
    resolver: &Resolver,
) -> Result<Arc<dyn Formatter<U>>, Error> {
    let descriptor = U::descriptor();
    let mode = layout::plan_mode(
        descriptor.layout,
        resolver.config().default_layout(),
    );

    Ok(Arc::new(UnionFormatter::new(descriptor, mode)?))
}

#[cfg(test)]
mod test;
