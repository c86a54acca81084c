//! Wire layout planning for validated cases.
//!
//! Planning happens once, when the formatter is built. The codec then only
//! walks the resulting tables.

use fxhash::FxHashMap;

use crate::{
    error::Error,
    msgpack,
    union::{LayoutMode, registry::Case},
};

/// Picks the layout of a sum type: its own directive when present, else the
/// configured default. All cases of one type share the result.
#[must_use]
pub const fn plan_mode(
    directive: Option<LayoutMode>,
    default: LayoutMode,
) -> LayoutMode {
    match directive {
        Some(mode) => mode,
        None => default,
    }
}

/// The planned wire shape of one case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaseLayout {
    /// One array slot per int key up to the largest written key. Each slot
    /// holds the index of the field written there, or `None` for a nil hole.
    IntKeyed { slots: Vec<Option<usize>> },

    /// One map entry per written field, in declaration order.
    StringKeyed {
        /// The field index and its complete pre-encoded `str` key token.
        keys: Vec<(usize, Vec<u8>)>,

        /// Raw key bytes to field index, matched exactly on decode.
        lookup: FxHashMap<&'static [u8], usize>,
    },
}

impl CaseLayout {
    /// Plans `case` under `mode`. Skipped fields never reach the wire.
    pub fn plan<U>(case: &Case<U>, mode: LayoutMode) -> Result<Self, Error> {
        let written = case
            .fields()
            .iter()
            .enumerate()
            .filter(|(_, field)| !field.skip);

        match mode {
            LayoutMode::IntKeyed => {
                // a case with nothing to write still gets one hole
                let len = written
                    .clone()
                    .map(|(_, field)| field.int_key + 1)
                    .max()
                    .unwrap_or(1);

                let mut slots = vec![None; len];
                for (index, field) in written {
                    slots[field.int_key] = Some(index);
                }

                Ok(Self::IntKeyed { slots })
            }

            LayoutMode::StringKeyed => {
                let mut keys = Vec::new();
                let mut lookup = FxHashMap::default();

                for (index, field) in written {
                    keys.push((index, msgpack::encode_str(field.string_key)?));
                    lookup.insert(field.string_key.as_bytes(), index);
                }

                Ok(Self::StringKeyed { keys, lookup })
            }
        }
    }

    /// The number of array slots or map entries written for the case.
    #[must_use]
    pub fn wire_len(&self) -> usize {
        match self {
            Self::IntKeyed { slots } => slots.len(),
            Self::StringKeyed { keys, .. } => keys.len(),
        }
    }
}
