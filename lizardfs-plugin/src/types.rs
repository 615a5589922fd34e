//! Request and response bodies of the Docker volume plugin protocol.

use std::collections::HashMap;
use std::path::Path;

use libvolume::{Capabilities, Volume};
use serde::{Deserialize, Serialize};

pub const PLUGIN_CONTENT_TYPE: &str = "application/vnd.docker.plugins.v1+json";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub options: Option<HashMap<String, String>>,
}

/// Body of `Get`, `Remove` and `Path`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NameRequest {
    #[serde(default)]
    pub name: String,
}

/// Body of `Mount` and `Unmount`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MountRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "ID")]
    pub id: String,
}

/// `List` and `Capabilities` carry no fields; unknown ones are ignored.
#[derive(Debug, Default, Deserialize)]
pub struct EmptyRequest {}

#[derive(Debug, Default, Serialize, PartialEq, Eq)]
pub struct EmptyResponse {}

#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct ActivateResponse {
    pub implements: Vec<String>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct VolumeEntry {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mountpoint: Option<String>,
}

impl From<Volume> for VolumeEntry {
    fn from(volume: Volume) -> Self {
        VolumeEntry {
            name: volume.name,
            mountpoint: volume.mountpoint.as_deref().map(display),
        }
    }
}

#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct ListResponse {
    pub volumes: Vec<VolumeEntry>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct GetResponse {
    pub volume: VolumeEntry,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct PathResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mountpoint: Option<String>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct MountResponse {
    pub mountpoint: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct CapabilityEntry {
    pub scope: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct CapabilitiesResponse {
    pub capabilities: CapabilityEntry,
}

impl From<Capabilities> for CapabilitiesResponse {
    fn from(capabilities: Capabilities) -> Self {
        CapabilitiesResponse {
            capabilities: CapabilityEntry {
                scope: capabilities.scope.as_str().to_string(),
            },
        }
    }
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct ErrorResponse {
    #[serde(rename = "Err")]
    pub err: String,
}

pub fn display(path: &Path) -> String {
    path.display().to_string()
}
