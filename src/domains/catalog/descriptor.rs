//! Catalog descriptors.
//!
//! Descriptors are immutable once built. An update replaces the whole
//! descriptor in the catalog; nothing mutates one in place.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use serde_json::{Map, Value, json};

use super::classify;
use crate::domains::tools::ToolHandle;

/// The kind of data source backing a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    File,
    Database,
    Api,
    Unknown,
}

/// The execution model of a tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolType {
    /// In-process shared library.
    NativePlugin,
    /// Script run by an external interpreter.
    InterpretedScript,
    Unknown,
}

impl fmt::Display for ToolType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::NativePlugin => "native_plugin",
            Self::InterpretedScript => "interpreted_script",
            Self::Unknown => "unknown",
        };
        f.write_str(label)
    }
}

/// A named, file-backed data source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceDescriptor {
    pub name: String,
    pub file_path: PathBuf,
    #[serde(rename = "type")]
    pub resource_type: ResourceType,
    pub mime_type: String,
}

impl ResourceDescriptor {
    /// Build a descriptor, classifying the file by its extension.
    pub fn new(name: impl Into<String>, file_path: impl Into<PathBuf>) -> Self {
        let file_path = file_path.into();
        Self {
            name: name.into(),
            resource_type: classify::resource_type(&file_path),
            mime_type: classify::mime_type(&file_path),
            file_path,
        }
    }

    /// The `file://` URI under which the resource is served.
    pub fn uri(&self) -> String {
        format!("file://{}", self.file_path.display())
    }
}

/// A named, invocable procedure together with its loaded handle.
///
/// The handle is runtime state and never appears in serialized output.
#[derive(Clone, Serialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub file_path: PathBuf,
    #[serde(rename = "type")]
    pub tool_type: ToolType,
    pub input_schema: Map<String, Value>,
    #[serde(skip)]
    pub handle: ToolHandle,
}

impl ToolDescriptor {
    /// Assemble a descriptor around an already loaded handle.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        file_path: impl Into<PathBuf>,
        handle: ToolHandle,
    ) -> Self {
        let file_path = file_path.into();
        let tool_type = classify::tool_type(&file_path);
        debug_assert_eq!(
            tool_type,
            handle.tool_type(),
            "handle for {} does not match its file type",
            file_path.display()
        );
        Self {
            name: name.into(),
            description: description.into(),
            input_schema: input_schema(tool_type),
            tool_type,
            file_path,
            handle,
        }
    }
}

impl fmt::Debug for ToolDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolDescriptor")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("file_path", &self.file_path)
            .field("tool_type", &self.tool_type)
            .field("handle", &self.handle.kind())
            .finish()
    }
}

/// Input schema advertised for a tool.
///
/// Every tool type currently gets the same generic template: an object with
/// a free-form `arguments` object.
pub fn input_schema(_tool_type: ToolType) -> Map<String, Value> {
    let schema = json!({
        "type": "object",
        "properties": {
            "arguments": {
                "type": "object",
                "description": "Tool arguments"
            }
        }
    });

    match schema {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}
