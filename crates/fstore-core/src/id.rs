//! Identifiers for fstore resources and materializations.
//!
//! A [`ResourceId`] is the join key between the metadata catalog, offline
//! materializations, and online tables. It is immutable once created.
//!
//! # Example
//!
//! ```rust
//! use fstore_core::id::{MaterializationId, ResourceId, ResourceType};
//!
//! let feature = ResourceId::feature("avg_txn", "v1");
//! assert_eq!(feature.resource_type, ResourceType::Feature);
//!
//! let materialization = MaterializationId::for_resource(&feature);
//! assert_eq!(materialization.to_string(), "Materialization/avg_txn/v1");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// The namespace a resource lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResourceType {
    /// A feature served from the online store.
    Feature,
    /// A label used for training.
    Label,
    /// A training set joining features and a label.
    TrainingSet,
    /// A primary (source) table.
    Primary,
    /// A derived transformation.
    Transformation,
}

impl ResourceType {
    /// Returns the stable wire name of the resource type.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Feature => "FEATURE",
            Self::Label => "LABEL",
            Self::TrainingSet => "TRAINING_SET",
            Self::Primary => "PRIMARY",
            Self::Transformation => "TRANSFORMATION",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "FEATURE" => Ok(Self::Feature),
            "LABEL" => Ok(Self::Label),
            "TRAINING_SET" => Ok(Self::TrainingSet),
            "PRIMARY" => Ok(Self::Primary),
            "TRANSFORMATION" => Ok(Self::Transformation),
            other => Err(Error::InvalidId {
                message: format!("unknown resource type '{other}'"),
            }),
        }
    }
}

/// Identity of a feature, label, or other resource.
///
/// Unique per `(name, variant)` within a [`ResourceType`] namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceId {
    /// Resource name.
    pub name: String,
    /// Resource variant.
    pub variant: String,
    /// Resource namespace.
    #[serde(rename = "type")]
    pub resource_type: ResourceType,
}

impl ResourceId {
    /// Creates a new resource identifier.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        variant: impl Into<String>,
        resource_type: ResourceType,
    ) -> Self {
        Self {
            name: name.into(),
            variant: variant.into(),
            resource_type,
        }
    }

    /// Creates a feature resource identifier.
    #[must_use]
    pub fn feature(name: impl Into<String>, variant: impl Into<String>) -> Self {
        Self::new(name, variant, ResourceType::Feature)
    }

    /// Validates that the identifier can address a table.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidId`] if the name is empty or either component
    /// contains a `/`, which is reserved as a path separator by backends.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::InvalidId {
                message: "resource name cannot be empty".into(),
            });
        }
        if self.name.contains('/') || self.variant.contains('/') {
            return Err(Error::InvalidId {
                message: format!("resource '{self}' cannot contain '/'"),
            });
        }
        Ok(())
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}.{}", self.resource_type, self.name, self.variant)
    }
}

/// Stable identifier of an offline materialization.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MaterializationId(String);

impl MaterializationId {
    const PREFIX: &'static str = "Materialization";

    /// Returns the materialization identifier for a resource.
    #[must_use]
    pub fn for_resource(id: &ResourceId) -> Self {
        Self(format!("{}/{}/{}", Self::PREFIX, id.name, id.variant))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MaterializationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for MaterializationId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.splitn(3, '/');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(Self::PREFIX), Some(name), Some(_variant)) if !name.is_empty() => {
                Ok(Self(s.to_string()))
            }
            _ => Err(Error::InvalidId {
                message: format!("invalid materialization ID '{s}'"),
            }),
        }
    }
}
