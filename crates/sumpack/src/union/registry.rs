//! Validation of case descriptors and constructor parameter matching.

use std::any::Any;

use crate::{
    error::{Error, MetadataError},
    union::{
        LayoutMode, UnionDescriptor,
        descriptor::{
            Arguments, CaseDescriptor, Constructor, Deconstruct, Factory,
            FieldDescriptor, FieldType, Parameter, Singleton,
        },
    },
};

/// A validated field. Both keys are always computed; the layout decides
/// which one reaches the wire.
#[derive(Debug, Clone, Copy)]
pub struct Field {
    pub name: &'static str,
    pub int_key: usize,
    pub string_key: &'static str,
    pub ty: FieldType,
    pub skip: bool,
}

pub(crate) enum Build<U> {
    Factory(Factory<U>),
    Singleton(Singleton<U>),
}

/// A validated case whose constructor parameters are bound to fields.
pub struct Case<U> {
    pub(crate) tag: i32,
    pub(crate) name: &'static str,
    pub(crate) fields: Vec<Field>,
    pub(crate) parameter_fields: Vec<usize>,
    pub(crate) deconstruct: Deconstruct<U>,
    pub(crate) build: Build<U>,
}

impl<U> Case<U> {
    #[must_use]
    pub const fn tag(&self) -> i32 { self.tag }

    #[must_use]
    pub const fn name(&self) -> &'static str { self.name }

    #[must_use]
    pub fn fields(&self) -> &[Field] { &self.fields }

    /// The field index bound to each constructor parameter, in parameter
    /// order.
    #[must_use]
    pub fn parameter_fields(&self) -> &[usize] { &self.parameter_fields }

    pub(crate) fn deconstruct<'a>(
        &self,
        value: &'a U,
    ) -> Option<Vec<&'a dyn Any>> {
        (self.deconstruct)(value)
    }

    /// Rebuilds a value from decoded field values, indexed by field.
    pub(crate) fn construct(
        &self,
        mut values: Vec<Option<Box<dyn Any + Send>>>,
    ) -> Result<U, Error> {
        match &self.build {
            Build::Singleton(accessor) => Ok(accessor()),
            Build::Factory(build) => {
                let mut arguments = Arguments::new(
                    self.parameter_fields
                        .iter()
                        .map(|&field| {
                            values.get_mut(field).and_then(Option::take)
                        })
                        .collect(),
                );
                build(&mut arguments)
            }
        }
    }
}

impl<U> std::fmt::Debug for Case<U> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Case")
            .field("tag", &self.tag)
            .field("name", &self.name)
            .field("fields", &self.fields)
            .field("parameter_fields", &self.parameter_fields)
            .finish_non_exhaustive()
    }
}

/// Validates every case of `descriptor` under `mode`.
///
/// Tags must run densely from zero in declaration order. A case with fields
/// needs a factory whose parameters each bind to exactly one field of the
/// same type; a case without fields needs a singleton accessor or a factory
/// without parameters.
pub fn extract<U>(
    descriptor: UnionDescriptor<U>,
    mode: LayoutMode,
) -> Result<Vec<Case<U>>, MetadataError> {
    let union = descriptor.name;

    descriptor
        .cases
        .into_iter()
        .enumerate()
        .map(|(position, case)| extract_case(union, position, case, mode))
        .collect()
}

fn extract_case<U>(
    union: &'static str,
    position: usize,
    case: CaseDescriptor<U>,
    mode: LayoutMode,
) -> Result<Case<U>, MetadataError> {
    let CaseDescriptor { tag, name, fields, deconstruct, constructor } = case;

    let expected = i32::try_from(position).unwrap_or(i32::MAX);
    if tag != expected {
        return Err(MetadataError::NonDenseTag {
            union,
            case: name,
            tag,
            expected,
        });
    }

    let fields = fields
        .iter()
        .enumerate()
        .map(|(int_key, field)| to_field(int_key, field))
        .collect::<Vec<_>>();

    for field in &fields {
        if field.skip && field.ty.default_value().is_none() {
            return Err(MetadataError::SkippedFieldWithoutDefault {
                union,
                case: name,
                field: field.name,
            });
        }
    }

    if mode == LayoutMode::StringKeyed {
        for (index, field) in fields.iter().enumerate() {
            let duplicate = fields[..index]
                .iter()
                .any(|prior| prior.string_key == field.string_key);

            if duplicate {
                return Err(MetadataError::DuplicateField {
                    union,
                    case: name,
                    field: field.name,
                });
            }
        }
    }

    let (parameter_fields, build) = match constructor {
        Some(Constructor::Factory { parameters, build }) => {
            let parameter_fields = parameters
                .iter()
                .enumerate()
                .map(|(position, parameter)| {
                    bind_parameter(
                        union, name, &fields, position, parameter, mode,
                    )
                })
                .collect::<Result<Vec<_>, _>>()?;

            (parameter_fields, Build::Factory(build))
        }

        Some(Constructor::Singleton(accessor)) if fields.is_empty() => {
            (Vec::new(), Build::Singleton(accessor))
        }

        Some(Constructor::Singleton(_)) | None => {
            return Err(MetadataError::MissingConstructor {
                union,
                case: name,
                expected: if fields.is_empty() {
                    "singleton accessor"
                } else {
                    "factory"
                },
            });
        }
    };

    Ok(Case { tag, name, fields, parameter_fields, deconstruct, build })
}

const fn to_field(int_key: usize, field: &FieldDescriptor) -> Field {
    Field {
        name: field.name(),
        int_key,
        string_key: field.name(),
        ty: field.ty(),
        skip: field.is_skipped(),
    }
}

fn bind_parameter(
    union: &'static str,
    case: &'static str,
    fields: &[Field],
    position: usize,
    parameter: &Parameter,
    mode: LayoutMode,
) -> Result<usize, MetadataError> {
    let unmatched = MetadataError::UnmatchedParameter {
        union,
        case,
        parameter: parameter.name(),
        position,
    };

    let index = match mode {
        LayoutMode::IntKeyed => fields
            .iter()
            .position(|field| field.int_key == position)
            .ok_or(unmatched)?,

        LayoutMode::StringKeyed => {
            let mut matches = fields
                .iter()
                .enumerate()
                .filter(|(_, field)| {
                    eq_ignore_case(field.string_key, parameter.name())
                })
                .map(|(index, _)| index);

            let index = matches.next().ok_or(unmatched)?;
            if matches.next().is_some() {
                return Err(MetadataError::AmbiguousParameter {
                    union,
                    case,
                    parameter: parameter.name(),
                });
            }
            index
        }
    };

    let field = &fields[index];
    if field.ty != parameter.ty() {
        return Err(MetadataError::ParameterTypeMismatch {
            union,
            case,
            parameter: parameter.name(),
            expected: field.ty.name(),
            found: parameter.ty().name(),
        });
    }

    Ok(index)
}

fn eq_ignore_case(lhs: &str, rhs: &str) -> bool {
    lhs.chars()
        .flat_map(char::to_lowercase)
        .eq(rhs.chars().flat_map(char::to_lowercase))
}
