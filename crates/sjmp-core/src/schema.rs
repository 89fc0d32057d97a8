//! The schema document served to clients and pushed to registrars.

use crate::config::ProtocolConfig;
use crate::descriptor::{named_map, ActionDescriptor, Named, PropertyDescriptor};
use serde::{Deserialize, Serialize};

/// Identity of the serving process, as it appears in the schema.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerInfo {
    pub name: String,
    pub description: String,
    pub group: String,
}

impl ServerInfo {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        group: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            group: group.into(),
        }
    }
}

/// Public description of one registered object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectSchema {
    #[serde(skip)]
    pub name: String,
    pub description: String,
    pub group: String,
    #[serde(with = "named_map")]
    pub properties: Vec<PropertyDescriptor>,
    #[serde(with = "named_map")]
    pub actions: Vec<ActionDescriptor>,
}

impl ObjectSchema {
    pub fn property(&self, name: &str) -> Option<&PropertyDescriptor> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn action(&self, name: &str) -> Option<&ActionDescriptor> {
        self.actions.iter().find(|a| a.name == name)
    }
}

impl Named for ObjectSchema {
    fn name(&self) -> &str {
        &self.name
    }

    fn assign_name(&mut self, name: String, _index: usize) {
        self.name = name;
    }
}

/// The full schema document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    pub result: String,
    #[serde(rename = "type")]
    pub schema_type: String,
    pub version: String,
    pub name: String,
    pub description: String,
    pub group: String,
    pub port: u16,
    pub schema_version: String,
    #[serde(with = "named_map")]
    pub objects: Vec<ObjectSchema>,
}

impl Schema {
    pub fn new(info: &ServerInfo, port: u16, schema_version: String, objects: Vec<ObjectSchema>) -> Self {
        Self {
            result: "ok".to_string(),
            schema_type: ProtocolConfig::SCHEMA_TYPE.to_string(),
            version: ProtocolConfig::VERSION.to_string(),
            name: info.name.clone(),
            description: info.description.clone(),
            group: info.group.clone(),
            port,
            schema_version,
            objects,
        }
    }

    pub fn object(&self, name: &str) -> Option<&ObjectSchema> {
        self.objects.iter().find(|o| o.name == name)
    }
}
