//! Typed job graphs in the engine's API wire format.
//!
//! A job graph maps node ids to node definitions:
//!
//! ```json
//! {"7": {"class_type": "LoadImage", "inputs": {"image": "pose.png"}, "_meta": {"title": "ControlNetImage"}}}
//! ```
//!
//! Graphs are validated when they are built or parsed, and every update
//! returns a new graph instead of mutating shared state. Nodes keep the
//! order they were given in, so title lookups and re-serialization follow
//! the template.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::CoreError;

/// Display metadata attached to a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeMeta {
    pub title: String,
    /// Any other metadata keys, preserved verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One node of a job graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDefinition {
    /// Engine operation, e.g. `"KSampler"`.
    pub class_type: String,
    /// Literal values and `[node_id, output_index]` links, keyed by input name.
    pub inputs: Map<String, Value>,
    #[serde(rename = "_meta")]
    pub meta: NodeMeta,
    /// Class-specific fields the engine may attach, preserved verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl NodeDefinition {
    pub fn new(class_type: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            class_type: class_type.into(),
            inputs: Map::new(),
            meta: NodeMeta {
                title: title.into(),
                extra: Map::new(),
            },
            extra: Map::new(),
        }
    }

    /// Builder-style input setter.
    pub fn with_input(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.inputs.insert(name.into(), value.into());
        self
    }

    pub fn title(&self) -> &str {
        &self.meta.title
    }

    fn validate(&self, id: &str) -> Result<(), CoreError> {
        if self.class_type.trim().is_empty() {
            return Err(CoreError::Validation(format!(
                "node '{id}' has an empty class_type"
            )));
        }
        if self.meta.title.trim().is_empty() {
            return Err(CoreError::Validation(format!(
                "node '{id}' has an empty title"
            )));
        }
        Ok(())
    }
}

/// A validated mapping of node id to node definition.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "IndexMap<String, NodeDefinition>")]
pub struct JobGraph {
    nodes: IndexMap<String, NodeDefinition>,
}

impl JobGraph {
    /// Build a graph from `(id, definition)` pairs.
    pub fn new<I, K>(nodes: I) -> Result<Self, CoreError>
    where
        I: IntoIterator<Item = (K, NodeDefinition)>,
        K: Into<String>,
    {
        let nodes: IndexMap<String, NodeDefinition> =
            nodes.into_iter().map(|(id, def)| (id.into(), def)).collect();
        Self::try_from(nodes)
    }

    /// Parse and validate a graph from JSON text.
    pub fn from_json_str(json: &str) -> Result<Self, CoreError> {
        serde_json::from_str(json).map_err(|e| CoreError::Validation(e.to_string()))
    }

    /// Parse and validate a graph from an already-decoded JSON value.
    pub fn from_value(value: Value) -> Result<Self, CoreError> {
        serde_json::from_value(value).map_err(|e| CoreError::Validation(e.to_string()))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: &str) -> Option<&NodeDefinition> {
        self.nodes.get(id)
    }

    /// Title of the node with the given id.
    pub fn node_title(&self, id: &str) -> Option<&str> {
        self.nodes.get(id).map(NodeDefinition::title)
    }

    /// First node (in template order) carrying `title`.
    pub fn find_by_title(&self, title: &str) -> Option<(&str, &NodeDefinition)> {
        self.nodes
            .iter()
            .find(|(_, def)| def.meta.title == title)
            .map(|(id, def)| (id.as_str(), def))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &NodeDefinition)> {
        self.nodes.iter().map(|(id, def)| (id.as_str(), def))
    }

    /// Copy of this graph with `input` of the node titled `title` set to
    /// `value`.
    pub fn with_input(
        &self,
        title: &str,
        input: &str,
        value: impl Into<Value>,
    ) -> Result<Self, CoreError> {
        let (id, def) = self
            .find_by_title(title)
            .ok_or_else(|| CoreError::NodeNotFound {
                title: title.to_string(),
            })?;
        let updated = def.clone().with_input(input, value);
        let id = id.to_string();
        self.with_node(id, updated)
    }

    /// Copy of this graph with node `id` replaced in place, or appended
    /// when new.
    pub fn with_node(
        &self,
        id: impl Into<String>,
        definition: NodeDefinition,
    ) -> Result<Self, CoreError> {
        let id = id.into();
        validate_id(&id)?;
        definition.validate(&id)?;
        let mut nodes = self.nodes.clone();
        nodes.insert(id, definition);
        Ok(Self { nodes })
    }
}

impl TryFrom<IndexMap<String, NodeDefinition>> for JobGraph {
    type Error = CoreError;

    fn try_from(nodes: IndexMap<String, NodeDefinition>) -> Result<Self, Self::Error> {
        if nodes.is_empty() {
            return Err(CoreError::Validation("job graph has no nodes".into()));
        }
        for (id, def) in &nodes {
            validate_id(id)?;
            def.validate(id)?;
        }
        Ok(Self { nodes })
    }
}

impl Serialize for JobGraph {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.nodes.serialize(serializer)
    }
}

fn validate_id(id: &str) -> Result<(), CoreError> {
    if id.trim().is_empty() {
        return Err(CoreError::Validation("node id must not be empty".into()));
    }
    Ok(())
}
