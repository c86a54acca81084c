//! Case descriptors: the metadata a sum type hands to the formatter builder.
//!
//! `#[derive(Union)]` produces these; a hand-written [`Union`] impl builds
//! them with the same builder methods.
//!
//! [`Union`]: crate::union::Union

use std::{
    any::{Any, TypeId, type_name},
    fmt::Debug,
};

use crate::{
    error::{Error, MetadataError},
    formatter::Formattable,
    msgpack::{Reader, Writer},
    resolver::Resolver,
    union::{LayoutMode, UnionKind},
};

type WriteFn = fn(&dyn Any, &mut Writer, &Resolver) -> Result<(), Error>;
type ReadFn =
    fn(&mut Reader<'_>, &Resolver) -> Result<Box<dyn Any + Send>, Error>;
type DefaultFn = fn() -> Option<Box<dyn Any + Send>>;

pub(crate) type Deconstruct<U> = Box<
    dyn for<'a> Fn(&'a U) -> Option<Vec<&'a dyn Any>> + Send + Sync + 'static,
>;
pub(crate) type Factory<U> =
    Box<dyn Fn(&mut Arguments) -> Result<U, Error> + Send + Sync + 'static>;
pub(crate) type Singleton<U> = Box<dyn Fn() -> U + Send + Sync + 'static>;

fn write_erased<F: Formattable>(
    value: &dyn Any,
    writer: &mut Writer,
    resolver: &Resolver,
) -> Result<(), Error> {
    let value = value.downcast_ref::<F>().ok_or(
        MetadataError::FieldValueMismatch { expected: type_name::<F>() },
    )?;
    value.serialize_field(writer, resolver)
}

fn read_erased<F: Formattable>(
    reader: &mut Reader<'_>,
    resolver: &Resolver,
) -> Result<Box<dyn Any + Send>, Error> {
    Ok(Box::new(F::deserialize_field(reader, resolver)?))
}

fn default_erased<F: Formattable>() -> Option<Box<dyn Any + Send>> {
    F::default_value().map(|value| Box::new(value) as Box<dyn Any + Send>)
}

/// The type of a field or constructor parameter, with its encode, decode and
/// default operations erased behind function pointers.
#[derive(Clone, Copy)]
pub struct FieldType {
    id: TypeId,
    name: &'static str,
    write: WriteFn,
    read: ReadFn,
    default: DefaultFn,
}

impl FieldType {
    #[must_use]
    pub fn of<F: Formattable>() -> Self {
        Self {
            id: TypeId::of::<F>(),
            name: type_name::<F>(),
            write: write_erased::<F>,
            read: read_erased::<F>,
            default: default_erased::<F>,
        }
    }

    #[must_use]
    pub const fn id(&self) -> TypeId { self.id }

    #[must_use]
    pub const fn name(&self) -> &'static str { self.name }

    pub(crate) fn write(
        &self,
        value: &dyn Any,
        writer: &mut Writer,
        resolver: &Resolver,
    ) -> Result<(), Error> {
        (self.write)(value, writer, resolver)
    }

    pub(crate) fn read(
        &self,
        reader: &mut Reader<'_>,
        resolver: &Resolver,
    ) -> Result<Box<dyn Any + Send>, Error> {
        (self.read)(reader, resolver)
    }

    pub(crate) fn default_value(&self) -> Option<Box<dyn Any + Send>> {
        (self.default)()
    }
}

impl Debug for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("FieldType").field(&self.name).finish()
    }
}

impl PartialEq for FieldType {
    fn eq(&self, other: &Self) -> bool { self.id == other.id }
}

impl Eq for FieldType {}

/// One declared field of a case, in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDescriptor {
    name: &'static str,
    ty: FieldType,
    skip: bool,
}

impl FieldDescriptor {
    #[must_use]
    pub fn new<F: Formattable>(name: &'static str) -> Self {
        Self { name, ty: FieldType::of::<F>(), skip: false }
    }

    /// Marks the field as never written; it always decodes to its default.
    #[must_use]
    pub const fn skipped(mut self) -> Self {
        self.skip = true;
        self
    }

    #[must_use]
    pub const fn name(&self) -> &'static str { self.name }

    #[must_use]
    pub const fn ty(&self) -> FieldType { self.ty }

    #[must_use]
    pub const fn is_skipped(&self) -> bool { self.skip }
}

/// One parameter of a case factory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Parameter {
    name: &'static str,
    ty: FieldType,
}

impl Parameter {
    #[must_use]
    pub fn new<F: Formattable>(name: &'static str) -> Self {
        Self { name, ty: FieldType::of::<F>() }
    }

    #[must_use]
    pub const fn name(&self) -> &'static str { self.name }

    #[must_use]
    pub const fn ty(&self) -> FieldType { self.ty }
}

/// Decoded field values handed to a case factory, indexed by parameter
/// position.
pub struct Arguments {
    values: Vec<Option<Box<dyn Any + Send>>>,
}

impl Arguments {
    pub(crate) fn new(values: Vec<Option<Box<dyn Any + Send>>>) -> Self {
        Self { values }
    }

    #[must_use]
    pub fn len(&self) -> usize { self.values.len() }

    #[must_use]
    pub fn is_empty(&self) -> bool { self.values.is_empty() }

    /// Moves the argument at `position` out as a `T`.
    ///
    /// Each position can be taken once.
    pub fn take<T: 'static>(&mut self, position: usize) -> Result<T, Error> {
        let mismatch = || MetadataError::FieldValueMismatch {
            expected: type_name::<T>(),
        };

        let value = self
            .values
            .get_mut(position)
            .and_then(Option::take)
            .ok_or_else(mismatch)?;

        value.downcast::<T>().map(|value| *value).map_err(|_| mismatch().into())
    }
}

impl Debug for Arguments {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Arguments")
            .field("len", &self.values.len())
            .finish_non_exhaustive()
    }
}

/// How a case value is rebuilt from decoded fields.
pub enum Constructor<U> {
    /// Builds the value from arguments matched to its fields.
    Factory { parameters: Vec<Parameter>, build: Factory<U> },

    /// Returns the value of a case without fields.
    Singleton(Singleton<U>),
}

impl<U> Constructor<U> {
    pub fn factory(
        parameters: Vec<Parameter>,
        build: impl Fn(&mut Arguments) -> Result<U, Error>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        Self::Factory { parameters, build: Box::new(build) }
    }

    pub fn singleton(accessor: impl Fn() -> U + Send + Sync + 'static) -> Self {
        Self::Singleton(Box::new(accessor))
    }
}

impl<U> Debug for Constructor<U> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Factory { parameters, .. } => f
                .debug_struct("Factory")
                .field("parameters", parameters)
                .finish_non_exhaustive(),
            Self::Singleton(_) => f.write_str("Singleton"),
        }
    }
}

fn no_fields<U>(_: &U) -> Option<Vec<&dyn Any>> { Some(Vec::new()) }

/// Metadata of one case of a sum type.
pub struct CaseDescriptor<U> {
    pub(crate) tag: i32,
    pub(crate) name: &'static str,
    pub(crate) fields: Vec<FieldDescriptor>,
    pub(crate) deconstruct: Deconstruct<U>,
    pub(crate) constructor: Option<Constructor<U>>,
}

impl<U: 'static> CaseDescriptor<U> {
    /// Starts a case with no fields and no constructor.
    #[must_use]
    pub fn new(tag: i32, name: &'static str) -> Self {
        Self {
            tag,
            name,
            fields: Vec::new(),
            deconstruct: Box::new(no_fields::<U>),
            constructor: None,
        }
    }

    /// Appends the next field in declaration order.
    #[must_use]
    pub fn field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    /// Sets the accessor that yields the field values, in declaration order,
    /// of a value of this case, or `None` for a value of another case.
    #[must_use]
    pub fn deconstruct(
        mut self,
        deconstruct: impl for<'a> Fn(&'a U) -> Option<Vec<&'a dyn Any>>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        self.deconstruct = Box::new(deconstruct);
        self
    }

    #[must_use]
    pub fn constructor(mut self, constructor: Constructor<U>) -> Self {
        self.constructor = Some(constructor);
        self
    }

    #[must_use]
    pub const fn tag(&self) -> i32 { self.tag }

    #[must_use]
    pub const fn name(&self) -> &'static str { self.name }

    #[must_use]
    pub fn fields(&self) -> &[FieldDescriptor] { &self.fields }
}

impl<U> Debug for CaseDescriptor<U> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaseDescriptor")
            .field("tag", &self.tag)
            .field("name", &self.name)
            .field("fields", &self.fields)
            .field("constructor", &self.constructor)
            .finish_non_exhaustive()
    }
}

/// Metadata of a whole sum type.
///
/// # Example
///
/// ```ignore
/// UnionDescriptor::new("Shape", UnionKind::Reference)
///     .layout(LayoutMode::IntKeyed)
///     .case(
///         CaseDescriptor::new(0, "Circle")
///             .field(FieldDescriptor::new::<f64>("radius"))
///             .deconstruct(|shape| match shape {
///                 Shape::Circle { radius } => Some(vec![radius as &dyn Any]),
///                 _ => None,
///             })
///             .constructor(Constructor::factory(
///                 vec![Parameter::new::<f64>("radius")],
///                 |args| Ok(Shape::Circle { radius: args.take(0)? }),
///             )),
///     )
/// ```
pub struct UnionDescriptor<U> {
    pub(crate) name: &'static str,
    pub(crate) kind: UnionKind,
    pub(crate) layout: Option<LayoutMode>,
    pub(crate) cases: Vec<CaseDescriptor<U>>,
}

impl<U> UnionDescriptor<U> {
    #[must_use]
    pub const fn new(name: &'static str, kind: UnionKind) -> Self {
        Self { name, kind, layout: None, cases: Vec::new() }
    }

    /// Pins the wire layout instead of using the resolver's default.
    #[must_use]
    pub const fn layout(mut self, layout: LayoutMode) -> Self {
        self.layout = Some(layout);
        self
    }

    /// Appends the next case; cases must be added in tag order.
    #[must_use]
    pub fn case(mut self, case: CaseDescriptor<U>) -> Self {
        self.cases.push(case);
        self
    }

    #[must_use]
    pub const fn name(&self) -> &'static str { self.name }

    #[must_use]
    pub const fn kind(&self) -> UnionKind { self.kind }

    #[must_use]
    pub fn cases(&self) -> &[CaseDescriptor<U>] { &self.cases }
}

impl<U> Debug for UnionDescriptor<U> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnionDescriptor")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("layout", &self.layout)
            .field("cases", &self.cases)
            .finish()
    }
}
