//! Self-describing backend connection configs.
//!
//! A backend is addressed by a `(ProviderType, SerializedConfig)` pair. The
//! pair must be enough for a process with no shared memory to rebuild a
//! working client, so the serialized bytes carry a versioned envelope:
//!
//! ```json
//! { "version": 1, "config": { ... } }
//! ```
//!
//! Decoding rejects unknown envelope versions and ignores unknown fields
//! inside `config`, so older readers keep working when fields are added.

use std::borrow::Cow;
use std::fmt;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};

/// Current version of the config envelope.
pub const CONFIG_VERSION: u32 = 1;

/// Type tag naming a concrete backend implementation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProviderType(Cow<'static, str>);

impl ProviderType {
    /// In-process map online store.
    pub const LOCAL_ONLINE: Self = Self(Cow::Borrowed("LOCAL_ONLINE"));
    /// In-process vector search online store.
    pub const VECTOR_MEMORY_ONLINE: Self = Self(Cow::Borrowed("VECTOR_MEMORY_ONLINE"));
    /// Blob-backed online store.
    pub const BLOB_ONLINE: Self = Self(Cow::Borrowed("BLOB_ONLINE"));
    /// In-process offline store.
    pub const MEMORY_OFFLINE: Self = Self(Cow::Borrowed("MEMORY_OFFLINE"));

    /// Creates a provider type from a static tag, usable in constants.
    #[must_use]
    pub const fn from_static(tag: &'static str) -> Self {
        Self(Cow::Borrowed(tag))
    }

    /// Creates a provider type from an arbitrary tag.
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self(Cow::Owned(tag.into()))
    }

    /// Returns the tag as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProviderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque serialized backend config.
///
/// Serialized as a base64 string when embedded in JSON payloads.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SerializedConfig(Vec<u8>);

impl SerializedConfig {
    /// Wraps raw config bytes.
    #[must_use]
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Returns the raw bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Returns true if no config bytes are present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for SerializedConfig {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(&self.0))
    }
}

impl<'de> Deserialize<'de> for SerializedConfig {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map(Self)
            .map_err(serde::de::Error::custom)
    }
}

#[derive(Serialize)]
struct EnvelopeRef<'a, T> {
    version: u32,
    config: &'a T,
}

#[derive(Deserialize)]
struct Envelope {
    version: u32,
    config: serde_json::Value,
}

/// A backend connection config that can cross process boundaries.
///
/// Implementors only derive `Serialize`/`Deserialize`; the envelope
/// handling is provided.
pub trait ProviderConfig: Serialize + DeserializeOwned {
    /// Encodes the config into a versioned envelope.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Serialization`] if the config cannot be encoded.
    fn serialize_config(&self) -> Result<SerializedConfig> {
        let envelope = EnvelopeRef {
            version: CONFIG_VERSION,
            config: self,
        };
        serde_json::to_vec(&envelope)
            .map(SerializedConfig)
            .map_err(|e| Error::serialization(format!("failed to encode config: {e}")))
    }

    /// Decodes a config from a versioned envelope.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the bytes are not a valid envelope,
    /// carry an unsupported version, or do not match this config's schema.
    fn deserialize_config(config: &SerializedConfig) -> Result<Self> {
        if config.is_empty() {
            return Err(Error::configuration("config payload is empty"));
        }
        let envelope: Envelope = serde_json::from_slice(config.as_bytes())
            .map_err(|e| Error::configuration(format!("malformed config envelope: {e}")))?;
        if envelope.version != CONFIG_VERSION {
            return Err(Error::configuration(format!(
                "unsupported config version {} (expected {CONFIG_VERSION})",
                envelope.version
            )));
        }
        serde_json::from_value(envelope.config)
            .map_err(|e| Error::configuration(format!("invalid config: {e}")))
    }
}
