//! Field layout of emitted records.

use std::fmt;

use serde::Serialize;

use crate::data::ExampleKind;

/// Logical type of one emitted field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    /// UTF-8 text.
    String,
    /// Signed 64-bit integer.
    Int64,
    /// 32-bit float.
    Float32,
    /// Image payload (`path` + `bytes`).
    Image,
}

impl FieldType {
    /// Type name as printed in field listings.
    pub const fn as_str(self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Int64 => "int64",
            FieldType::Float32 => "float32",
            FieldType::Image => "image",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Name and type of one emitted field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct FieldSpec {
    /// Field name.
    pub name: &'static str,
    /// Field type.
    pub dtype: FieldType,
}

const fn field(name: &'static str, dtype: FieldType) -> FieldSpec {
    FieldSpec { name, dtype }
}

const IMAGE_FEATURES: &[FieldSpec] = &[
    field("image", FieldType::Image),
    field("prompt", FieldType::String),
    field("seed", FieldType::Int64),
    field("step", FieldType::Int64),
    field("cfg", FieldType::Float32),
    field("sampler", FieldType::String),
];

const TEXT_FEATURES: &[FieldSpec] = &[
    field("image_name", FieldType::String),
    field("prompt", FieldType::String),
    field("part_id", FieldType::Int64),
    field("seed", FieldType::Int64),
    field("step", FieldType::Int64),
    field("cfg", FieldType::Float32),
    field("sampler", FieldType::String),
];

/// Fields emitted for a record kind, in declaration order.
pub fn features(kind: ExampleKind) -> &'static [FieldSpec] {
    match kind {
        ExampleKind::Image => IMAGE_FEATURES,
        ExampleKind::Text => TEXT_FEATURES,
    }
}
