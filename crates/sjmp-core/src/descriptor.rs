//! Immutable descriptions of properties and actions.
//!
//! Descriptors are produced once per registered object and serialized into
//! the schema document. Names are carried as map keys on the wire, so they are
//! skipped by the field serializers and restored by [`named_map`].

use crate::error::{Result, SjmpError};
use crate::types::{NumericCategory, WireType};
use crate::value::WireValue;
use serde::{Deserialize, Serialize};

/// Inclusive numeric validity range of a property.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Limits {
    Int { min: i64, max: i64 },
    Float { min: f64, max: f64 },
}

impl Limits {
    pub fn int(min: i64, max: i64) -> Self {
        Limits::Int { min, max }
    }

    pub fn float(min: f64, max: f64) -> Self {
        Limits::Float { min, max }
    }

    pub fn category(&self) -> NumericCategory {
        match self {
            Limits::Int { .. } => NumericCategory::Int,
            Limits::Float { .. } => NumericCategory::Float,
        }
    }

    /// Check the declaration: min must not exceed max.
    pub fn validate(&self) -> Result<()> {
        let ordered = match *self {
            Limits::Int { min, max } => min <= max,
            Limits::Float { min, max } => min <= max,
        };
        if ordered {
            Ok(())
        } else {
            let (min, max) = self.bounds_text();
            Err(SjmpError::InvalidLimits { min, max })
        }
    }

    /// Check a coerced value against the range.
    ///
    /// Float limits are compared at the width of the value so a `float`
    /// property accepts its own rounding of the declared bounds.
    pub fn check(&self, value: &WireValue) -> Result<()> {
        let (below, above) = match (*self, value) {
            (Limits::Int { min, max }, v) => match v.as_i64() {
                Some(v) => (v < min, v > max),
                None => return Err(self.mismatch(value)),
            },
            (Limits::Float { min, max }, WireValue::Float(v)) => {
                (*v < min as f32, *v > max as f32)
            }
            (Limits::Float { min, max }, WireValue::Double(v)) => (*v < min, *v > max),
            (Limits::Float { .. }, _) => return Err(self.mismatch(value)),
        };

        let (min, max) = self.bounds_text();
        if below {
            return Err(SjmpError::BelowMinimum {
                value: value.to_string(),
                min,
            });
        }
        if above {
            return Err(SjmpError::AboveMaximum {
                value: value.to_string(),
                max,
            });
        }
        Ok(())
    }

    fn mismatch(&self, value: &WireValue) -> SjmpError {
        SjmpError::TypeMismatch {
            expected: match self {
                Limits::Int { .. } => WireType::Int64,
                Limits::Float { .. } => WireType::Double,
            },
            found: value.wire_type().to_string(),
        }
    }

    fn bounds_text(&self) -> (String, String) {
        match *self {
            Limits::Int { min, max } => (min.to_string(), max.to_string()),
            Limits::Float { min, max } => (min.to_string(), max.to_string()),
        }
    }
}

/// Description of one property or field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyDescriptor {
    #[serde(skip)]
    pub name: String,
    #[serde(rename = "type")]
    pub wire_type: WireType,
    pub readonly: bool,
    pub description: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub show_graph: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limits: Option<Limits>,
}

impl PropertyDescriptor {
    /// Validate the capability flags against the wire type.
    pub fn validate(&self) -> Result<()> {
        if self.show_graph && !self.wire_type.is_graph_allowed() {
            return Err(SjmpError::GraphNotAllowed {
                property: self.name.clone(),
                wire_type: self.wire_type,
            });
        }
        if let Some(limits) = &self.limits {
            limits.validate()?;
            if limits.category() != self.wire_type.category() {
                return Err(SjmpError::LimitsNotAllowed {
                    property: self.name.clone(),
                    wire_type: self.wire_type,
                    category: limits.category().as_str(),
                });
            }
        }
        Ok(())
    }
}

/// Description of one action parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDescriptor {
    #[serde(skip)]
    pub name: String,
    #[serde(rename = "type")]
    pub wire_type: WireType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Position in the handler's argument list.
    #[serde(skip)]
    pub index: usize,
}

/// Description of one invokable action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionDescriptor {
    #[serde(skip)]
    pub name: String,
    pub result: WireType,
    pub description: String,
    pub require_confirm: bool,
    #[serde(with = "named_map")]
    pub parameters: Vec<ParameterDescriptor>,
}

impl ActionDescriptor {
    pub fn parameter(&self, name: &str) -> Option<&ParameterDescriptor> {
        self.parameters.iter().find(|p| p.name == name)
    }

    pub fn validate(&self) -> Result<()> {
        for (index, parameter) in self.parameters.iter().enumerate() {
            if parameter.wire_type == WireType::Void {
                return Err(SjmpError::VoidParameter {
                    action: self.name.clone(),
                    parameter: parameter.name.clone(),
                });
            }
            if self.parameters[..index]
                .iter()
                .any(|other| other.name == parameter.name)
            {
                return Err(SjmpError::DuplicateMember {
                    kind: "parameter",
                    name: format!("{}.{}", self.name, parameter.name),
                });
            }
        }
        Ok(())
    }
}

/// Items serialized as a JSON object keyed by their name.
pub(crate) trait Named {
    fn name(&self) -> &str;
    fn assign_name(&mut self, name: String, index: usize);
}

impl Named for PropertyDescriptor {
    fn name(&self) -> &str {
        &self.name
    }

    fn assign_name(&mut self, name: String, _index: usize) {
        self.name = name;
    }
}

impl Named for ParameterDescriptor {
    fn name(&self) -> &str {
        &self.name
    }

    fn assign_name(&mut self, name: String, index: usize) {
        self.name = name;
        self.index = index;
    }
}

impl Named for ActionDescriptor {
    fn name(&self) -> &str {
        &self.name
    }

    fn assign_name(&mut self, name: String, _index: usize) {
        self.name = name;
    }
}

/// Serialize a `Vec` of named items as an ordered JSON object.
pub(crate) mod named_map {
    use super::Named;
    use serde::de::{Deserialize, Deserializer, MapAccess, Visitor};
    use serde::ser::{Serialize, SerializeMap, Serializer};
    use std::fmt;
    use std::marker::PhantomData;

    #[allow(clippy::ptr_arg)]
    pub fn serialize<S, T>(items: &Vec<T>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        T: Named + Serialize,
    {
        let mut map = serializer.serialize_map(Some(items.len()))?;
        for item in items {
            map.serialize_entry(item.name(), item)?;
        }
        map.end()
    }

    pub fn deserialize<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: Named + Deserialize<'de>,
    {
        struct NamedVisitor<T>(PhantomData<T>);

        impl<'de, T: Named + Deserialize<'de>> Visitor<'de> for NamedVisitor<T> {
            type Value = Vec<T>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an object keyed by name")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut items = Vec::new();
                while let Some((name, mut item)) = access.next_entry::<String, T>()? {
                    item.assign_name(name, items.len());
                    items.push(item);
                }
                Ok(items)
            }
        }

        deserializer.deserialize_map(NamedVisitor(PhantomData))
    }
}
