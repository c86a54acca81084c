//! The tag-dispatch encoder and decoder of sum types.

use std::any::Any;

use tracing::debug;

use crate::{
    error::{Error, FormatError, MetadataError},
    formatter::Formatter,
    msgpack::{Reader, Writer},
    resolver::Resolver,
    union::{
        LayoutMode, Union, UnionDescriptor, UnionKind,
        layout::CaseLayout,
        registry::{self, Case},
    },
};

struct Planned<U> {
    case: Case<U>,
    layout: CaseLayout,
}

/// The formatter of a sum type, interpreting its validated case metadata.
///
/// Cases are indexed by tag, so dispatch in both directions is a slice
/// lookup.
pub struct UnionFormatter<U> {
    name: &'static str,
    kind: UnionKind,
    mode: LayoutMode,
    cases: Vec<Planned<U>>,
}

impl<U> std::fmt::Debug for UnionFormatter<U> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnionFormatter")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("mode", &self.mode)
            .field("cases", &self.cases.len())
            .finish()
    }
}

impl<U> UnionFormatter<U> {
    /// Validates `descriptor` and plans every case under `mode`.
    pub fn new(
        descriptor: UnionDescriptor<U>,
        mode: LayoutMode,
    ) -> Result<Self, Error> {
        let name = descriptor.name;
        let kind = descriptor.kind;

        let cases = registry::extract(descriptor, mode)?
            .into_iter()
            .map(|case| {
                let layout = CaseLayout::plan(&case, mode)?;
                Ok(Planned { case, layout })
            })
            .collect::<Result<Vec<_>, Error>>()?;

        debug!(
            union = name,
            ?kind,
            ?mode,
            cases = cases.len(),
            "planned union layout"
        );

        Ok(Self { name, kind, mode, cases })
    }

    #[must_use]
    pub const fn kind(&self) -> UnionKind { self.kind }

    #[must_use]
    pub const fn mode(&self) -> LayoutMode { self.mode }

    /// Returns the validated case with the given tag.
    #[must_use]
    pub fn case(&self, tag: i32) -> Option<&Case<U>> {
        self.planned(tag).map(|planned| &planned.case)
    }

    fn planned(&self, tag: i32) -> Option<&Planned<U>> {
        usize::try_from(tag).ok().and_then(|index| self.cases.get(index))
    }

    fn inconsistent(&self, case: &'static str, reason: &'static str) -> Error {
        MetadataError::InconsistentCase { union: self.name, case, reason }
            .into()
    }
}

impl<U: Union> UnionFormatter<U> {
    fn write_case(
        &self,
        writer: &mut Writer,
        value: &U,
        resolver: &Resolver,
    ) -> Result<(), Error> {
        let tag = value.case_tag();
        let Planned { case, layout } = self
            .planned(tag)
            .ok_or(MetadataError::UnknownCaseTag { union: self.name, tag })?;

        let values = case.deconstruct(value).ok_or_else(|| {
            self.inconsistent(case.name, "value does not belong to its tag")
        })?;

        if values.len() != case.fields.len() {
            return Err(self.inconsistent(
                case.name,
                "deconstructed value count differs from the declared fields",
            ));
        }

        writer.write_array_header(2)?;
        writer.write_i32(tag)?;

        match layout {
            CaseLayout::IntKeyed { slots } => {
                writer.write_array_header(slots.len())?;

                for slot in slots {
                    match slot {
                        Some(index) => {
                            case.fields[*index].ty.write(
                                values[*index],
                                writer,
                                resolver,
                            )?;
                        }
                        None => writer.write_nil()?,
                    }
                }
            }

            CaseLayout::StringKeyed { keys, .. } => {
                writer.write_map_header(keys.len())?;

                for (index, key) in keys {
                    writer.write_raw_bytes(key)?;
                    case.fields[*index].ty.write(
                        values[*index],
                        writer,
                        resolver,
                    )?;
                }
            }
        }

        Ok(())
    }

    fn read_case(
        &self,
        reader: &mut Reader<'_>,
        resolver: &Resolver,
    ) -> Result<Option<U>, Error> {
        let len = reader.read_array_header()?;
        if len != 2 {
            return Err(FormatError::InvalidEnvelope {
                union: self.name,
                found: len,
            }
            .into());
        }

        let tag = reader.read_i32()?;
        let Some(Planned { case, layout }) = self.planned(tag) else {
            return match self.kind {
                UnionKind::Reference => {
                    debug!(union = self.name, tag, "skipping unknown case tag");
                    reader.skip()?;
                    Ok(None)
                }
                UnionKind::Value => Err(FormatError::UnknownTagForValueKind {
                    union: self.name,
                    tag,
                }
                .into()),
            };
        };

        let mut values: Vec<Option<Box<dyn Any + Send>>> =
            case.fields.iter().map(|_| None).collect();

        match layout {
            CaseLayout::IntKeyed { slots } => {
                let len = reader.read_array_header()?;

                for position in 0..len {
                    let slot = usize::try_from(position)
                        .ok()
                        .and_then(|position| slots.get(position).copied())
                        .flatten();

                    match slot {
                        Some(index) => {
                            let value =
                                case.fields[index].ty.read(reader, resolver)?;
                            values[index] = Some(value);
                        }
                        None => reader.skip()?,
                    }
                }
            }

            CaseLayout::StringKeyed { lookup, .. } => {
                let len = reader.read_map_header()?;

                for _ in 0..len {
                    let key = reader.read_string_span()?;

                    match lookup.get(key) {
                        Some(&index) => {
                            let value =
                                case.fields[index].ty.read(reader, resolver)?;
                            values[index] = Some(value);
                        }
                        None => reader.skip()?,
                    }
                }
            }
        }

        for (slot, field) in values.iter_mut().zip(&case.fields) {
            if slot.is_none() {
                *slot = Some(field.ty.default_value().ok_or(
                    FormatError::MissingField {
                        union: self.name,
                        case: case.name,
                        field: field.name,
                    },
                )?);
            }
        }

        case.construct(values).map(Some)
    }
}

impl<U: Union> Formatter<U> for UnionFormatter<U> {
    fn serialize(
        &self,
        writer: &mut Writer,
        value: &U,
        resolver: &Resolver,
    ) -> Result<(), Error> {
        self.write_case(writer, value, resolver)
    }

    /// Reads a required value. Nil has no meaning for a value-kind type and
    /// is reported as such; for a reference-kind type it is a missing value.
    fn deserialize(
        &self,
        reader: &mut Reader<'_>,
        resolver: &Resolver,
    ) -> Result<U, Error> {
        if reader.try_read_nil()? {
            return Err(match self.kind {
                UnionKind::Reference => {
                    FormatError::NoValue { type_name: self.name }
                }
                UnionKind::Value => {
                    FormatError::NilForValueKind { union: self.name }
                }
            }
            .into());
        }

        self.read_case(reader, resolver)?.ok_or_else(|| {
            FormatError::NoValue { type_name: self.name }.into()
        })
    }

    // `serialize_optional` keeps the default: `None` is nil for both kinds,
    // since the nil belongs to the enclosing `Option` slot.

    /// Nil decodes to `None` for both kinds. A reference-kind type also
    /// reads an unknown case tag as `None`.
    fn deserialize_optional(
        &self,
        reader: &mut Reader<'_>,
        resolver: &Resolver,
    ) -> Result<Option<U>, Error> {
        if reader.try_read_nil()? {
            return Ok(None);
        }

        self.read_case(reader, resolver)
    }
}
