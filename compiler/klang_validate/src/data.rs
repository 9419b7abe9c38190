//! The static data segment builder.
//!
//! An append-only byte buffer holding string literals and parameter-info
//! structs. All offsets handed out are relative to the segment start; the
//! code generator adds the segment's absolute placement when lowering
//! them to addresses.

use klang_ir::{Primitive, StructField, StructType};
use rustc_hash::FxHashMap;

/// Strings are stored with a one-byte length prefix, capping them at 255
/// bytes. Validation rejects longer literals before they reach the
/// builder; the builder truncates as a backstop.
pub(crate) const MAX_STRING_LEN: usize = 255;

/// The fixed layout of one parameter-info struct.
///
/// The string fields hold segment-relative offsets; the runtime resolves
/// them against `pointer_of_static_data`.
pub fn param_info_layout() -> StructType {
    StructType {
        fields: vec![
            StructField {
                name: "name",
                ty: Primitive::Int32,
                offset: 0,
            },
            StructField {
                name: "defaultValue",
                ty: Primitive::Float32,
                offset: 4,
            },
            StructField {
                name: "minValue",
                ty: Primitive::Float32,
                offset: 8,
            },
            StructField {
                name: "maxValue",
                ty: Primitive::Float32,
                offset: 12,
            },
            StructField {
                name: "automationRate",
                ty: Primitive::Int32,
                offset: 16,
            },
        ],
    }
}

/// Append-only builder for the static data segment.
#[derive(Clone, Debug, Default)]
pub struct DataBuilder {
    bytes: Vec<u8>,
    /// Literal de-duplication: content to segment-relative offset.
    strings: FxHashMap<String, u32>,
}

impl DataBuilder {
    pub fn new() -> Self {
        DataBuilder::default()
    }

    /// Append a length-prefixed string, returning its segment-relative
    /// offset. Identical content is stored once.
    pub fn string(&mut self, s: &str) -> u32 {
        if let Some(&offset) = self.strings.get(s) {
            return offset;
        }
        let offset = self.bytes.len() as u32;
        let content = &s.as_bytes()[..s.len().min(MAX_STRING_LEN)];
        self.bytes.push(content.len() as u8);
        self.bytes.extend_from_slice(content);
        self.strings.insert(s.to_string(), offset);
        offset
    }

    /// Append one parameter-info struct, returning its segment-relative
    /// offset. Values are stored little-endian in the fixed field order.
    pub fn param_info(
        &mut self,
        name_offset: u32,
        default_value: f32,
        min_value: f32,
        max_value: f32,
        rate_offset: u32,
    ) -> u32 {
        let offset = self.bytes.len() as u32;
        self.bytes.extend_from_slice(&name_offset.to_le_bytes());
        self.bytes.extend_from_slice(&default_value.to_le_bytes());
        self.bytes.extend_from_slice(&min_value.to_le_bytes());
        self.bytes.extend_from_slice(&max_value.to_le_bytes());
        self.bytes.extend_from_slice(&rate_offset.to_le_bytes());
        debug_assert_eq!(
            self.bytes.len() as u32 - offset,
            param_info_layout().byte_size()
        );
        offset
    }

    pub fn len(&self) -> u32 {
        self.bytes.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}
