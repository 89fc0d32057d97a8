//! The closed palette of scalar wire types.
//!
//! One immutable table maps every [`WireType`] to its wire name and
//! capabilities. It is built once and never mutated.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

/// Scalar type allowed on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireType {
    Void,
    String,
    Bool,
    Float,
    Double,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
}

/// Numeric category of a wire type, used to validate limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericCategory {
    Int,
    Float,
    None,
}

impl NumericCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            NumericCategory::Int => "int",
            NumericCategory::Float => "float",
            NumericCategory::None => "non-numeric",
        }
    }
}

/// Static description of one wire type.
#[derive(Debug)]
pub struct TypeInfo {
    pub wire_type: WireType,
    pub name: &'static str,
    pub graph_allowed: bool,
    pub category: NumericCategory,
}

const fn entry(
    wire_type: WireType,
    name: &'static str,
    graph_allowed: bool,
    category: NumericCategory,
) -> TypeInfo {
    TypeInfo {
        wire_type,
        name,
        graph_allowed,
        category,
    }
}

// Indexed by discriminant; keep in declaration order.
static TYPE_TABLE: [TypeInfo; 12] = [
    entry(WireType::Void, "void", false, NumericCategory::None),
    entry(WireType::String, "string", false, NumericCategory::None),
    entry(WireType::Bool, "bool", false, NumericCategory::None),
    entry(WireType::Float, "float", true, NumericCategory::Float),
    entry(WireType::Double, "double", true, NumericCategory::Float),
    entry(WireType::Int8, "int8", true, NumericCategory::Int),
    entry(WireType::Int16, "int16", true, NumericCategory::Int),
    entry(WireType::Int32, "int32", true, NumericCategory::Int),
    entry(WireType::Int64, "int64", true, NumericCategory::Int),
    entry(WireType::UInt8, "uint8", true, NumericCategory::Int),
    entry(WireType::UInt16, "uint16", true, NumericCategory::Int),
    entry(WireType::UInt32, "uint32", true, NumericCategory::Int),
];

static NAME_TO_TYPE: LazyLock<HashMap<&'static str, WireType>> = LazyLock::new(|| {
    TYPE_TABLE
        .iter()
        .map(|info| (info.name, info.wire_type))
        .collect()
});

impl WireType {
    /// Every wire type, in table order.
    pub const ALL: [WireType; 12] = [
        WireType::Void,
        WireType::String,
        WireType::Bool,
        WireType::Float,
        WireType::Double,
        WireType::Int8,
        WireType::Int16,
        WireType::Int32,
        WireType::Int64,
        WireType::UInt8,
        WireType::UInt16,
        WireType::UInt32,
    ];

    /// Table entry for this type.
    pub fn info(self) -> &'static TypeInfo {
        &TYPE_TABLE[self as usize]
    }

    /// Wire name, e.g. `"int32"`.
    pub fn name(self) -> &'static str {
        self.info().name
    }

    /// Resolve a wire name.
    pub fn from_name(name: &str) -> Option<Self> {
        NAME_TO_TYPE.get(name).copied()
    }

    /// All known wire names.
    pub fn names() -> impl Iterator<Item = &'static str> {
        TYPE_TABLE.iter().map(|info| info.name)
    }

    /// Whether `show_graph` may be set on a property of this type.
    pub fn is_graph_allowed(self) -> bool {
        self.info().graph_allowed
    }

    pub fn category(self) -> NumericCategory {
        self.info().category
    }

    pub fn is_int(self) -> bool {
        self.category() == NumericCategory::Int
    }

    pub fn is_float(self) -> bool {
        self.category() == NumericCategory::Float
    }
}

impl fmt::Display for WireType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
