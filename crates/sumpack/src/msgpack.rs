//! MessagePack primitive writer and reader.
//!
//! [`Writer`] and [`Reader`] are the lowest layer of the crate: they emit and
//! consume single MessagePack tokens (nil, integers, floats, strings, binary
//! blobs, and array/map headers) and know nothing about formatters or sum
//! types. Both are built on the [`rmp`] crate.
//!
//! # Format Overview
//!
//! - **Nil**: the single byte `0xc0`.
//! - **Integers**: the most compact MessagePack representation that holds the
//!   value (positive/negative fixint, then 8/16/32/64-bit forms).
//! - **Floating-point**: `f32` as `0xca`, `f64` as `0xcb`, big-endian IEEE 754.
//! - **Characters**: the Unicode scalar value as an unsigned integer.
//! - **Strings/bytes**: length-prefixed `str`/`bin` families.
//! - **Arrays/maps**: a header carrying the element (or pair) count, followed
//!   by the elements themselves.
//!
//! A writer or reader is owned by exactly one encode or decode operation.

use rmp::{Marker, encode::ValueWriteError};

use crate::error::{Error, FormatError};

const NIL: u8 = 0xc0;

fn write_failed(err: ValueWriteError) -> Error {
    match err {
        ValueWriteError::InvalidMarkerWrite(err)
        | ValueWriteError::InvalidDataWrite(err) => Error::Io(err),
    }
}

fn header_len(len: usize) -> Result<u32, Error> {
    u32::try_from(len).map_err(|_| FormatError::LengthOverflow(len).into())
}

// =============================================================================
// Writer
// =============================================================================

/// An append-only MessagePack writer backed by a byte vector.
///
/// # Example
///
/// ```ignore
/// use sumpack::msgpack::Writer;
///
/// let mut writer = Writer::new();
/// writer.write_array_header(2)?;
/// writer.write_i32(0)?;
/// writer.write_nil()?;
/// assert_eq!(writer.into_inner(), vec![0x92, 0x00, 0xc0]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Writer {
    buffer: Vec<u8>,
}

impl Writer {
    #[must_use]
    pub const fn new() -> Self { Self { buffer: Vec::new() } }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self { buffer: Vec::with_capacity(capacity) }
    }

    /// Returns the bytes written so far.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] { &self.buffer }

    #[must_use]
    pub fn len(&self) -> usize { self.buffer.len() }

    #[must_use]
    pub fn is_empty(&self) -> bool { self.buffer.is_empty() }

    #[must_use]
    pub fn into_inner(self) -> Vec<u8> { self.buffer }

    /// Writes the nil marker.
    pub fn write_nil(&mut self) -> Result<(), Error> {
        rmp::encode::write_nil(&mut self.buffer).map_err(Error::Io)
    }

    /// Writes a signed 32-bit integer in its most compact form.
    pub fn write_i32(&mut self, v: i32) -> Result<(), Error> {
        self.write_sint(i64::from(v))
    }

    /// Writes an array header announcing `len` elements.
    pub fn write_array_header(&mut self, len: usize) -> Result<(), Error> {
        rmp::encode::write_array_len(&mut self.buffer, header_len(len)?)
            .map(drop)
            .map_err(write_failed)
    }

    /// Writes a map header announcing `len` key/value pairs.
    pub fn write_map_header(&mut self, len: usize) -> Result<(), Error> {
        rmp::encode::write_map_len(&mut self.buffer, header_len(len)?)
            .map(drop)
            .map_err(write_failed)
    }

    /// Appends bytes that already hold one or more encoded tokens.
    pub fn write_raw_bytes(&mut self, bytes: &[u8]) -> Result<(), Error> {
        self.buffer.extend_from_slice(bytes);
        Ok(())
    }

    /// Writes a `str` token.
    pub fn write_str(&mut self, v: &str) -> Result<(), Error> {
        rmp::encode::write_str(&mut self.buffer, v).map_err(write_failed)
    }

    /// Writes a `bin` token.
    pub fn write_bin(&mut self, v: &[u8]) -> Result<(), Error> {
        rmp::encode::write_bin(&mut self.buffer, v).map_err(write_failed)
    }

    /// Writes a value of one of the allow-listed primitive kinds.
    pub fn write_primitive<P: Primitive>(&mut self, v: P) -> Result<(), Error> {
        v.write(self)
    }

    fn write_sint(&mut self, v: i64) -> Result<(), Error> {
        rmp::encode::write_sint(&mut self.buffer, v)
            .map(drop)
            .map_err(write_failed)
    }

    fn write_uint(&mut self, v: u64) -> Result<(), Error> {
        rmp::encode::write_uint(&mut self.buffer, v)
            .map(drop)
            .map_err(write_failed)
    }

    fn write_bool(&mut self, v: bool) -> Result<(), Error> {
        rmp::encode::write_bool(&mut self.buffer, v).map_err(Error::Io)
    }

    fn write_f32(&mut self, v: f32) -> Result<(), Error> {
        rmp::encode::write_f32(&mut self.buffer, v).map_err(write_failed)
    }

    fn write_f64(&mut self, v: f64) -> Result<(), Error> {
        rmp::encode::write_f64(&mut self.buffer, v).map_err(write_failed)
    }
}

/// Returns the complete MessagePack `str` encoding of `key`.
pub(crate) fn encode_str(key: &str) -> Result<Vec<u8>, Error> {
    let mut writer = Writer::with_capacity(key.len() + 5);
    writer.write_str(key)?;
    Ok(writer.into_inner())
}

// =============================================================================
// Reader
// =============================================================================

/// A MessagePack reader over a borrowed byte slice.
///
/// Strings are returned as borrowed spans of the input; nothing is copied
/// unless a formatter asks for an owned value.
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    input: &'a [u8],
}

impl<'a> Reader<'a> {
    #[must_use]
    pub const fn new(input: &'a [u8]) -> Self { Self { input } }

    /// Returns the unread part of the input.
    #[must_use]
    pub const fn remaining(&self) -> &'a [u8] { self.input }

    #[must_use]
    pub const fn is_empty(&self) -> bool { self.input.is_empty() }

    /// Returns the marker of the next token without consuming it.
    pub fn peek_marker(&self) -> Result<Marker, Error> {
        self.input
            .first()
            .map(|byte| Marker::from_u8(*byte))
            .ok_or_else(|| {
                FormatError::malformed("unexpected end of input").into()
            })
    }

    /// Consumes the next token if it is nil.
    ///
    /// Returns `false` (consuming nothing) for any other token, including at
    /// the end of the input.
    pub fn try_read_nil(&mut self) -> Result<bool, Error> {
        match self.input.split_first() {
            Some((&NIL, rest)) => {
                self.input = rest;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Consumes a nil token, failing on anything else.
    pub fn read_nil(&mut self) -> Result<(), Error> {
        rmp::decode::read_nil(&mut self.input)
            .map_err(|err| FormatError::malformed(err).into())
    }

    pub fn read_array_header(&mut self) -> Result<u32, Error> {
        rmp::decode::read_array_len(&mut self.input)
            .map_err(|err| FormatError::malformed(err).into())
    }

    pub fn read_map_header(&mut self) -> Result<u32, Error> {
        rmp::decode::read_map_len(&mut self.input)
            .map_err(|err| FormatError::malformed(err).into())
    }

    /// Reads any integer token that fits in an `i32`.
    pub fn read_i32(&mut self) -> Result<i32, Error> {
        rmp::decode::read_int::<i32, _>(&mut self.input)
            .map_err(|err| FormatError::malformed(err).into())
    }

    /// Reads a `str` token and returns its raw UTF-8 bytes.
    pub fn read_string_span(&mut self) -> Result<&'a [u8], Error> {
        let len = rmp::decode::read_str_len(&mut self.input)
            .map_err(FormatError::malformed)?;
        self.take(to_usize(len)?)
    }

    /// Reads a `str` token as a borrowed `&str`.
    pub fn read_str(&mut self) -> Result<&'a str, Error> {
        let span = self.read_string_span()?;
        std::str::from_utf8(span)
            .map_err(|err| FormatError::malformed(err).into())
    }

    /// Reads a `bin` token as a borrowed span.
    pub fn read_bin(&mut self) -> Result<&'a [u8], Error> {
        let len = rmp::decode::read_bin_len(&mut self.input)
            .map_err(FormatError::malformed)?;
        self.take(to_usize(len)?)
    }

    /// Reads a value of one of the allow-listed primitive kinds.
    pub fn read_primitive<P: Primitive>(&mut self) -> Result<P, Error> {
        P::read(self)
    }

    /// Advances past exactly one complete value without decoding it.
    ///
    /// Nested arrays and maps are walked iteratively, so deeply nested input
    /// cannot exhaust the stack. Every token consumes at least one byte, which
    /// bounds the walk by the input length even when headers lie.
    pub fn skip(&mut self) -> Result<(), Error> {
        let mut pending: u64 = 1;

        while pending > 0 {
            pending -= 1;

            let marker = Marker::from_u8(self.take_u8()?);
            let (body, children) = match marker {
                Marker::FixPos(_)
                | Marker::FixNeg(_)
                | Marker::Null
                | Marker::True
                | Marker::False => (0, 0),
                Marker::U8 | Marker::I8 => (1, 0),
                Marker::U16 | Marker::I16 => (2, 0),
                Marker::U32 | Marker::I32 | Marker::F32 => (4, 0),
                Marker::U64 | Marker::I64 | Marker::F64 => (8, 0),
                Marker::FixStr(len) => (usize::from(len), 0),
                Marker::Str8 | Marker::Bin8 => {
                    (usize::from(self.take_u8()?), 0)
                }
                Marker::Str16 | Marker::Bin16 => {
                    (usize::from(self.take_u16()?), 0)
                }
                Marker::Str32 | Marker::Bin32 => {
                    (to_usize(self.take_u32()?)?, 0)
                }
                Marker::FixArray(len) => (0, u64::from(len)),
                Marker::Array16 => (0, u64::from(self.take_u16()?)),
                Marker::Array32 => (0, u64::from(self.take_u32()?)),
                Marker::FixMap(len) => (0, 2 * u64::from(len)),
                Marker::Map16 => (0, 2 * u64::from(self.take_u16()?)),
                Marker::Map32 => (0, 2 * u64::from(self.take_u32()?)),
                // ext payloads carry one extra type byte
                Marker::FixExt1 => (2, 0),
                Marker::FixExt2 => (3, 0),
                Marker::FixExt4 => (5, 0),
                Marker::FixExt8 => (9, 0),
                Marker::FixExt16 => (17, 0),
                Marker::Ext8 => (usize::from(self.take_u8()?) + 1, 0),
                Marker::Ext16 => (usize::from(self.take_u16()?) + 1, 0),
                Marker::Ext32 => (to_usize(self.take_u32()?)? + 1, 0),
                Marker::Reserved => {
                    return Err(FormatError::malformed(
                        "reserved marker 0xc1",
                    )
                    .into());
                }
            };

            self.take(body)?;
            pending += children;
        }

        Ok(())
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], Error> {
        let Some((head, rest)) = self.input.split_at_checked(len) else {
            return Err(FormatError::malformed(format!(
                "unexpected end of input: needed {len} bytes, {} left",
                self.input.len()
            ))
            .into());
        };
        self.input = rest;
        Ok(head)
    }

    fn take_u8(&mut self) -> Result<u8, Error> { Ok(self.take(1)?[0]) }

    fn take_u16(&mut self) -> Result<u16, Error> {
        let bytes = self.take(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    fn take_u32(&mut self) -> Result<u32, Error> {
        let bytes = self.take(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn read_bool(&mut self) -> Result<bool, Error> {
        rmp::decode::read_bool(&mut self.input)
            .map_err(|err| FormatError::malformed(err).into())
    }

    fn read_f32(&mut self) -> Result<f32, Error> {
        rmp::decode::read_f32(&mut self.input)
            .map_err(|err| FormatError::malformed(err).into())
    }

    /// Accepts both float widths; `f32` input widens losslessly.
    fn read_f64(&mut self) -> Result<f64, Error> {
        if matches!(self.peek_marker()?, Marker::F32) {
            return self.read_f32().map(f64::from);
        }
        rmp::decode::read_f64(&mut self.input)
            .map_err(|err| FormatError::malformed(err).into())
    }
}

fn to_usize(len: u32) -> Result<usize, Error> {
    usize::try_from(len).map_err(|_| {
        FormatError::malformed(format!(
            "length {len} is out of range for this platform"
        ))
        .into()
    })
}

// =============================================================================
// Primitive allow-list
// =============================================================================

mod sealed {
    pub trait Sealed {}
}

/// The fixed set of primitive kinds that formatters write and read directly,
/// bypassing the resolver.
///
/// This trait is sealed: the allow-list is `i8`, `u8`, `i16`, `u16`, `i32`,
/// `u32`, `i64`, `u64`, `f32`, `f64`, `bool` and `char`.
pub trait Primitive:
    sealed::Sealed + Copy + Default + Send + Sync + 'static
{
    /// Writes `self` as one MessagePack token.
    fn write(self, writer: &mut Writer) -> Result<(), Error>;

    /// Reads one MessagePack token as `Self`.
    fn read(reader: &mut Reader<'_>) -> Result<Self, Error>;
}

macro_rules! impl_primitive_int {
    ($($ty:ty => $write:ident),* $(,)?) => {
        $(
            impl sealed::Sealed for $ty {}

            impl Primitive for $ty {
                fn write(self, writer: &mut Writer) -> Result<(), Error> {
                    writer.$write(self.into())
                }

                fn read(reader: &mut Reader<'_>) -> Result<Self, Error> {
                    rmp::decode::read_int::<$ty, _>(&mut reader.input)
                        .map_err(|err| FormatError::malformed(err).into())
                }
            }
        )*
    };
}

impl_primitive_int! {
    i8 => write_sint,
    i16 => write_sint,
    i32 => write_sint,
    i64 => write_sint,
    u8 => write_uint,
    u16 => write_uint,
    u32 => write_uint,
    u64 => write_uint,
}

impl sealed::Sealed for bool {}

impl Primitive for bool {
    fn write(self, writer: &mut Writer) -> Result<(), Error> {
        writer.write_bool(self)
    }

    fn read(reader: &mut Reader<'_>) -> Result<Self, Error> {
        reader.read_bool()
    }
}

impl sealed::Sealed for f32 {}

impl Primitive for f32 {
    fn write(self, writer: &mut Writer) -> Result<(), Error> {
        writer.write_f32(self)
    }

    fn read(reader: &mut Reader<'_>) -> Result<Self, Error> {
        reader.read_f32()
    }
}

impl sealed::Sealed for f64 {}

impl Primitive for f64 {
    fn write(self, writer: &mut Writer) -> Result<(), Error> {
        writer.write_f64(self)
    }

    fn read(reader: &mut Reader<'_>) -> Result<Self, Error> {
        reader.read_f64()
    }
}

impl sealed::Sealed for char {}

impl Primitive for char {
    fn write(self, writer: &mut Writer) -> Result<(), Error> {
        writer.write_uint(u64::from(u32::from(self)))
    }

    fn read(reader: &mut Reader<'_>) -> Result<Self, Error> {
        let code = rmp::decode::read_int::<u32, _>(&mut reader.input)
            .map_err(FormatError::malformed)?;
        char::from_u32(code).ok_or_else(|| {
            FormatError::malformed(format!(
                "invalid Unicode scalar value: {code}"
            ))
            .into()
        })
    }
}
