use std::any::Any;

use super::*;
use crate::{
    FormatError, LayoutMode, MetadataError, ResolverConfig, Union,
    msgpack::Writer, union::layout::CaseLayout,
};

#[derive(Debug, Clone, PartialEq, Union)]
#[sumpack(string_keys)]
enum Shape {
    Circle { radius: f64 },
    Rectangle { width: f64, height: f64 },
    Empty,
}

#[derive(Debug, Clone, PartialEq, Union)]
#[sumpack(int_keys)]
enum Packed {
    Circle { radius: f64 },
    Rectangle { width: f64, height: f64 },
    Empty,
}

#[derive(Debug, Clone, PartialEq, Union)]
#[sumpack(int_keys, value_kind)]
enum Strict {
    Unit,
    Pair(i32, i32),
}

#[derive(Debug, Clone, PartialEq, Union)]
#[sumpack(int_keys)]
enum Holder {
    Optional { inner: Option<Strict> },
    Required { inner: Strict },
}

// no layout directive, so the resolver default decides
#[derive(Debug, Clone, PartialEq, Union)]
enum Loose {
    Point { x: i32 },
}

const F64_2_5: [u8; 9] = [0xcb, 0x40, 0x04, 0, 0, 0, 0, 0, 0];
const F64_3_0: [u8; 9] = [0xcb, 0x40, 0x08, 0, 0, 0, 0, 0, 0];
const F64_4_0: [u8; 9] = [0xcb, 0x40, 0x10, 0, 0, 0, 0, 0, 0];

fn concat(parts: &[&[u8]]) -> Vec<u8> { parts.concat() }

fn written(f: impl FnOnce(&mut Writer) -> Result<(), Error>) -> Vec<u8> {
    let mut writer = Writer::new();
    f(&mut writer).unwrap();
    writer.into_inner()
}

// =============================================================================
// String-keyed layout
// =============================================================================

#[test]
fn string_keyed_circle_bytes() {
    let resolver = Resolver::new();
    let bytes = resolver.serialize(&Shape::Circle { radius: 2.5 }).unwrap();

    let expected =
        concat(&[&[0x92, 0x00, 0x81, 0xa6], b"radius", &F64_2_5]);
    assert_eq!(bytes, expected);
}

#[test]
fn string_keyed_empty_case_is_empty_map() {
    let resolver = Resolver::new();
    let bytes = resolver.serialize(&Shape::Empty).unwrap();

    assert_eq!(bytes, [0x92, 0x02, 0x80]);
    assert_eq!(resolver.deserialize::<Shape>(&bytes).unwrap(), Shape::Empty);
}

#[test]
fn string_keyed_reordered_keys() {
    let resolver = Resolver::new();
    let bytes = concat(&[
        &[0x92, 0x01, 0x82, 0xa6],
        b"height",
        &F64_4_0,
        &[0xa5],
        b"width",
        &F64_3_0,
    ]);

    let shape = resolver.deserialize::<Shape>(&bytes).unwrap();
    assert_eq!(shape, Shape::Rectangle { width: 3.0, height: 4.0 });
}

#[test]
fn string_keyed_unknown_keys_are_skipped() {
    let resolver = Resolver::new();
    let bytes = written(|w| {
        w.write_array_header(2)?;
        w.write_i32(0)?;
        w.write_map_header(3)?;
        w.write_str("color")?;
        w.write_array_header(2)?;
        w.write_str("red")?;
        w.write_nil()?;
        w.write_str("radius")?;
        w.write_primitive(2.5f64)?;
        w.write_str("z")?;
        w.write_i32(9)
    });

    let shape = resolver.deserialize::<Shape>(&bytes).unwrap();
    assert_eq!(shape, Shape::Circle { radius: 2.5 });
}

#[test]
fn string_keyed_keys_match_exactly() {
    let resolver = Resolver::new();
    // "Radius" is not "radius", so the field falls back to its default
    let bytes = written(|w| {
        w.write_array_header(2)?;
        w.write_i32(0)?;
        w.write_map_header(1)?;
        w.write_str("Radius")?;
        w.write_primitive(2.5f64)
    });

    let shape = resolver.deserialize::<Shape>(&bytes).unwrap();
    assert_eq!(shape, Shape::Circle { radius: 0.0 });
}

// =============================================================================
// Int-keyed layout
// =============================================================================

#[test]
fn int_keyed_bytes() {
    let resolver = Resolver::new();

    let bytes = resolver.serialize(&Packed::Circle { radius: 2.5 }).unwrap();
    assert_eq!(bytes, concat(&[&[0x92, 0x00, 0x91], &F64_2_5]));

    let bytes = resolver
        .serialize(&Packed::Rectangle { width: 3.0, height: 4.0 })
        .unwrap();
    assert_eq!(bytes, concat(&[&[0x92, 0x01, 0x92], &F64_3_0, &F64_4_0]));
}

#[test]
fn int_keyed_empty_case_has_one_hole() {
    let resolver = Resolver::new();
    let bytes = resolver.serialize(&Packed::Empty).unwrap();

    assert_eq!(bytes, [0x92, 0x02, 0x91, 0xc0]);
    assert_eq!(resolver.deserialize::<Packed>(&bytes).unwrap(), Packed::Empty);

    // an empty payload array decodes just as well
    let bytes = [0x92, 0x02, 0x90];
    assert_eq!(resolver.deserialize::<Packed>(&bytes).unwrap(), Packed::Empty);
}

#[test]
fn int_keyed_extra_slots_are_skipped() {
    let resolver = Resolver::new();
    let bytes = written(|w| {
        w.write_array_header(2)?;
        w.write_i32(0)?;
        w.write_array_header(3)?;
        w.write_primitive(2.5f64)?;
        w.write_str("newer field")?;
        w.write_map_header(1)?;
        w.write_i32(1)?;
        w.write_nil()
    });

    let shape = resolver.deserialize::<Packed>(&bytes).unwrap();
    assert_eq!(shape, Packed::Circle { radius: 2.5 });
}

#[test]
fn int_keyed_missing_slots_take_defaults() {
    let resolver = Resolver::new();
    let bytes = concat(&[&[0x92, 0x01, 0x91], &F64_3_0]);

    let shape = resolver.deserialize::<Packed>(&bytes).unwrap();
    assert_eq!(shape, Packed::Rectangle { width: 3.0, height: 0.0 });
}

// =============================================================================
// Tags, nil and envelope
// =============================================================================

#[test]
fn tag_is_declaration_index() {
    let resolver = Resolver::new();

    for (shape, tag) in [
        (Shape::Circle { radius: 1.0 }, 0u8),
        (Shape::Rectangle { width: 1.0, height: 2.0 }, 1),
        (Shape::Empty, 2),
    ] {
        let bytes = resolver.serialize(&shape).unwrap();
        assert_eq!(bytes[..2], [0x92, tag]);
        assert_eq!(shape.case_tag(), i32::from(tag));
    }
}

#[test]
fn unknown_tag_of_reference_kind_is_absent() {
    let resolver = Resolver::new();
    let bytes = written(|w| {
        w.write_array_header(2)?;
        w.write_i32(7)?;
        w.write_map_header(1)?;
        w.write_str("sides")?;
        w.write_i32(5)
    });

    let shape = resolver.deserialize::<Option<Shape>>(&bytes).unwrap();
    assert_eq!(shape, None);

    // the payload was skipped whole, so a following value still decodes
    let pair = concat(&[&[0x92], &bytes, &[0x92, 0x02, 0x80]]);
    let shapes = resolver.deserialize::<Vec<Option<Shape>>>(&pair).unwrap();
    assert_eq!(shapes, vec![None, Some(Shape::Empty)]);
}

#[test]
fn unknown_tag_in_required_slot_is_no_value() {
    let resolver = Resolver::new();
    let bytes = [0x92, 0x07, 0x80];

    let err = resolver.deserialize::<Shape>(&bytes).unwrap_err();
    assert!(matches!(err.as_format(), Some(FormatError::NoValue { .. })));
}

#[test]
fn unknown_tag_of_value_kind_fails() {
    let resolver = Resolver::new();
    let bytes = [0x92, 0x05, 0x90];

    let err = resolver.deserialize::<Strict>(&bytes).unwrap_err();
    assert_eq!(
        err.as_format(),
        Some(&FormatError::UnknownTagForValueKind { union: "Strict", tag: 5 })
    );
}

#[test]
fn nil_handling_by_kind() {
    let resolver = Resolver::new();

    let bytes = resolver.serialize::<Option<Shape>>(&None).unwrap();
    assert_eq!(bytes, [0xc0]);
    assert_eq!(resolver.deserialize::<Option<Shape>>(&bytes).unwrap(), None);

    let err = resolver.deserialize::<Strict>(&[0xc0]).unwrap_err();
    assert_eq!(
        err.as_format(),
        Some(&FormatError::NilForValueKind { union: "Strict" })
    );

    // an `Option` slot owns its nil, whatever the kind of its element
    let bytes = resolver.serialize::<Option<Strict>>(&None).unwrap();
    assert_eq!(bytes, [0xc0]);
    assert_eq!(resolver.deserialize::<Option<Strict>>(&bytes).unwrap(), None);
}

#[test]
fn optional_value_kind_field() {
    let resolver = Resolver::new();

    let absent = Holder::Optional { inner: None };
    let bytes = resolver.serialize(&absent).unwrap();
    assert_eq!(bytes, [0x92, 0x00, 0x91, 0xc0]);
    assert_eq!(resolver.deserialize::<Holder>(&bytes).unwrap(), absent);

    let present = Holder::Optional { inner: Some(Strict::Unit) };
    let bytes = resolver.serialize(&present).unwrap();
    assert_eq!(bytes, [0x92, 0x00, 0x91, 0x92, 0x00, 0x91, 0xc0]);
    assert_eq!(resolver.deserialize::<Holder>(&bytes).unwrap(), present);

    // a required value-kind slot still rejects nil
    let err =
        resolver.deserialize::<Holder>(&[0x92, 0x01, 0x91, 0xc0]).unwrap_err();
    assert_eq!(
        err.as_format(),
        Some(&FormatError::NilForValueKind { union: "Strict" })
    );
}

#[test]
fn envelope_must_have_two_elements() {
    let resolver = Resolver::new();

    for bytes in [&[0x93, 0x00, 0x80, 0xc0][..], &[0x91, 0x00][..]] {
        let err = resolver.deserialize::<Shape>(bytes).unwrap_err();
        assert!(matches!(
            err.as_format(),
            Some(FormatError::InvalidEnvelope { union: "Shape", .. })
        ));
    }
}

#[test]
fn value_kind_round_trip() {
    let resolver = Resolver::new();

    for value in [Strict::Unit, Strict::Pair(-3, 400)] {
        let bytes = resolver.serialize(&value).unwrap();
        assert_eq!(resolver.deserialize::<Strict>(&bytes).unwrap(), value);
    }
}

// =============================================================================
// Layout selection
// =============================================================================

#[test]
fn default_layout_comes_from_config() {
    let string_keyed = Resolver::new();
    let bytes = string_keyed.serialize(&Loose::Point { x: 1 }).unwrap();
    assert_eq!(bytes, concat(&[&[0x92, 0x00, 0x81, 0xa1], b"x", &[0x01]]));

    let int_keyed = Resolver::with_config(
        ResolverConfig::default().with_default_layout(LayoutMode::IntKeyed),
    );
    let bytes = int_keyed.serialize(&Loose::Point { x: 1 }).unwrap();
    assert_eq!(bytes, [0x92, 0x00, 0x91, 0x01]);
}

#[test]
fn directive_overrides_config() {
    let resolver = Resolver::with_config(
        ResolverConfig::default().with_default_layout(LayoutMode::IntKeyed),
    );

    let bytes = resolver.serialize(&Shape::Empty).unwrap();
    assert_eq!(bytes, [0x92, 0x02, 0x80]);
}

#[test]
fn formatter_reports_layout() {
    let resolver = Resolver::new();
    let formatter =
        UnionFormatter::new(Packed::descriptor(), LayoutMode::IntKeyed)
            .unwrap();

    assert_eq!(formatter.kind(), UnionKind::Reference);
    assert_eq!(formatter.mode(), LayoutMode::IntKeyed);

    let case = formatter.case(1).unwrap();
    assert_eq!(case.name(), "Rectangle");
    assert_eq!(case.parameter_fields(), [0, 1]);
    assert!(formatter.case(3).is_none());
    assert!(formatter.case(-1).is_none());

    let empty = formatter.case(2).unwrap();
    for (case, mode, len) in [
        (case, LayoutMode::IntKeyed, 2),
        (case, LayoutMode::StringKeyed, 2),
        (empty, LayoutMode::IntKeyed, 1),
        (empty, LayoutMode::StringKeyed, 0),
    ] {
        assert_eq!(CaseLayout::plan(case, mode).unwrap().wire_len(), len);
    }

    // building by hand does not touch the cache
    assert!(!resolver.contains::<Packed>());
}

// =============================================================================
// Hand-written descriptors that contradict their values
// =============================================================================

#[derive(Debug, PartialEq)]
enum Liar {
    Only(i32),
}

impl Union for Liar {
    fn descriptor() -> UnionDescriptor<Self> {
        UnionDescriptor::new("Liar", UnionKind::Reference).case(
            CaseDescriptor::new(0, "Only")
                .field(FieldDescriptor::new::<i32>("0"))
                // reports no field values at all
                .deconstruct(|_| Some(Vec::new()))
                .constructor(Constructor::factory(
                    vec![Parameter::new::<i32>("0")],
                    |arguments| Ok(Self::Only(arguments.take(0)?)),
                )),
        )
    }

    fn case_tag(&self) -> i32 { 3 }
}

impl crate::Formattable for Liar {
    fn build_formatter(
        resolver: &Resolver,
    ) -> Result<Arc<dyn Formatter<Self>>, Error> {
        build_formatter::<Self>(resolver)
    }
}

#[test]
fn undeclared_case_tag_fails_to_encode() {
    let resolver = Resolver::new();

    let err = resolver.serialize(&Liar::Only(1)).unwrap_err();
    assert_eq!(
        err.as_metadata(),
        Some(&MetadataError::UnknownCaseTag { union: "Liar", tag: 3 })
    );
}

#[derive(Debug, PartialEq)]
enum Hollow {
    Pair(i32, i32),
    Other,
}

impl Union for Hollow {
    fn descriptor() -> UnionDescriptor<Self> {
        UnionDescriptor::new("Hollow", UnionKind::Reference)
            .case(
                CaseDescriptor::new(0, "Pair")
                    .field(FieldDescriptor::new::<i32>("0"))
                    .field(FieldDescriptor::new::<i32>("1"))
                    // drops the second field
                    .deconstruct(|value| match value {
                        Self::Pair(first, _) => Some(vec![first as &dyn Any]),
                        Self::Other => None,
                    })
                    .constructor(Constructor::factory(
                        vec![
                            Parameter::new::<i32>("0"),
                            Parameter::new::<i32>("1"),
                        ],
                        |arguments| {
                            let first = arguments.take(0)?;
                            Ok(Self::Pair(first, arguments.take(1)?))
                        },
                    )),
            )
            .case(
                CaseDescriptor::new(1, "Other")
                    // claims every value belongs to another case
                    .deconstruct(|_| None)
                    .constructor(Constructor::singleton(|| Self::Other)),
            )
    }

    fn case_tag(&self) -> i32 {
        match self {
            Self::Pair(..) => 0,
            Self::Other => 1,
        }
    }
}

#[test]
fn inconsistent_deconstruction_fails_to_encode() {
    let resolver = Resolver::new();
    let formatter =
        UnionFormatter::new(Hollow::descriptor(), LayoutMode::IntKeyed)
            .unwrap();

    for value in [Hollow::Pair(1, 2), Hollow::Other] {
        let mut writer = Writer::new();
        let err =
            Formatter::serialize(&formatter, &mut writer, &value, &resolver)
                .unwrap_err();

        assert!(matches!(
            err.as_metadata(),
            Some(MetadataError::InconsistentCase { union: "Hollow", .. })
        ));
        assert!(writer.is_empty());
    }
}
