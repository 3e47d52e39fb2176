use crate::graph_state::{IntegrityError, Link, Node, NodeId};
use crate::store::{GraphStore, NodeAttributes};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeField {
    Id,
    Group,
    Layer,
    Value,
    ActivationFn,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("{field} expects {expected}, got {text:?}")]
    InvalidNumber {
        field: &'static str,
        expected: &'static str,
        text: String,
    },
    #[error(transparent)]
    Integrity(#[from] IntegrityError),
    #[error("no editor is open")]
    NotOpen,
}

/// Editable snapshot of a node, one string per field.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeForm {
    /// Id of the node when the form was opened.
    pub original_id: NodeId,
    pub id: String,
    pub group: String,
    pub layer: String,
    pub value: String,
    pub activation_fn: String,
}

impl NodeForm {
    fn from_node(node: &Node) -> Self {
        Self {
            original_id: node.id.clone(),
            id: node.id.clone(),
            group: node.group.to_string(),
            layer: node.layer.to_string(),
            value: node.value.map(|v| v.to_string()).unwrap_or_default(),
            activation_fn: node.activation_fn.clone().unwrap_or_default(),
        }
    }

    fn field_mut(&mut self, field: NodeField) -> &mut String {
        match field {
            NodeField::Id => &mut self.id,
            NodeField::Group => &mut self.group,
            NodeField::Layer => &mut self.layer,
            NodeField::Value => &mut self.value,
            NodeField::ActivationFn => &mut self.activation_fn,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LinkForm {
    pub source: NodeId,
    pub target: NodeId,
    pub weight: String,
}

/// Result of a successful node commit.
#[derive(Debug, Clone)]
pub struct NodeCommit {
    pub previous_id: NodeId,
    pub node: Node,
}

impl NodeCommit {
    pub fn renamed(&self) -> bool {
        self.previous_id != self.node.id
    }
}

/// At most one node form and one link form are open at a time.
#[derive(Debug, Clone, Default)]
pub struct EditorSession {
    node: Option<NodeForm>,
    link: Option<LinkForm>,
}

impl EditorSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node_form(&self) -> Option<&NodeForm> {
        self.node.as_ref()
    }

    pub fn link_form(&self) -> Option<&LinkForm> {
        self.link.as_ref()
    }

    /// Open the node form, replacing any open one without saving.
    pub fn open_node(
        &mut self,
        store: &GraphStore,
        id: &str,
    ) -> Result<(), ValidationError> {
        let node = store
            .node(id)
            .ok_or_else(|| IntegrityError::UnknownNode(id.to_string()))?;
        self.node = Some(NodeForm::from_node(node));
        Ok(())
    }

    pub fn open_link(
        &mut self,
        store: &GraphStore,
        source: &str,
        target: &str,
    ) -> Result<(), ValidationError> {
        let link = store.find_link(source, target).ok_or_else(|| {
            IntegrityError::UnknownLink {
                from: source.to_string(),
                to: target.to_string(),
            }
        })?;
        self.link = Some(LinkForm {
            source: link.source.id().to_string(),
            target: link.target.id().to_string(),
            weight: link.weight.to_string(),
        });
        Ok(())
    }

    pub fn set_node_field(
        &mut self,
        field: NodeField,
        text: impl Into<String>,
    ) -> Result<(), ValidationError> {
        let form = self.node.as_mut().ok_or(ValidationError::NotOpen)?;
        *form.field_mut(field) = text.into();
        Ok(())
    }

    pub fn set_link_weight(
        &mut self,
        text: impl Into<String>,
    ) -> Result<(), ValidationError> {
        let form = self.link.as_mut().ok_or(ValidationError::NotOpen)?;
        form.weight = text.into();
        Ok(())
    }

    /// Validate the node form and apply it to the store.
    ///
    /// Nothing is written unless every field validates. A changed id is
    /// propagated through every link before the attributes are applied.
    /// On failure the form stays open.
    pub fn commit_node(
        &mut self,
        store: &mut GraphStore,
    ) -> Result<NodeCommit, ValidationError> {
        let form = self.node.as_ref().ok_or(ValidationError::NotOpen)?;

        let id = form.id.trim().to_string();
        let attributes = NodeAttributes {
            group: parse_positive("group", &form.group)?,
            layer: parse_positive("layer", &form.layer)?,
            value: parse_optional_number("value", &form.value)?,
            activation_fn: non_empty(&form.activation_fn),
        };
        let previous_id = form.original_id.clone();

        if id.is_empty() {
            return Err(IntegrityError::EmptyId.into());
        }
        if !store.contains(&previous_id) {
            return Err(IntegrityError::UnknownNode(previous_id).into());
        }
        if id != previous_id && store.contains(&id) {
            return Err(IntegrityError::DuplicateId(id).into());
        }

        store.rename_node(&previous_id, &id)?;
        store.set_attributes(&id, attributes)?;
        let node = store
            .node(&id)
            .cloned()
            .ok_or_else(|| IntegrityError::UnknownNode(id.clone()))?;

        self.node = None;
        Ok(NodeCommit { previous_id, node })
    }

    /// Validate the weight and apply it. Returns the updated link with
    /// plain endpoints.
    pub fn commit_link(
        &mut self,
        store: &mut GraphStore,
    ) -> Result<Link, ValidationError> {
        let form = self.link.as_ref().ok_or(ValidationError::NotOpen)?;
        let weight = parse_number("weight", &form.weight)?;

        store.set_link_weight(&form.source, &form.target, weight)?;
        let mut link = store
            .find_link(&form.source, &form.target)
            .cloned()
            .ok_or_else(|| IntegrityError::UnknownLink {
                from: form.source.clone(),
                to: form.target.clone(),
            })?;
        link.normalize();

        self.link = None;
        Ok(link)
    }

    pub fn cancel_node(&mut self) -> bool {
        self.node.take().is_some()
    }

    pub fn cancel_link(&mut self) -> bool {
        self.link.take().is_some()
    }
}

fn parse_number(field: &'static str, text: &str) -> Result<f64, ValidationError> {
    text.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| ValidationError::InvalidNumber {
            field,
            expected: "a number",
            text: text.to_string(),
        })
}

fn parse_optional_number(
    field: &'static str,
    text: &str,
) -> Result<Option<f64>, ValidationError> {
    if text.trim().is_empty() {
        return Ok(None);
    }
    parse_number(field, text).map(Some)
}

fn parse_positive(field: &'static str, text: &str) -> Result<u32, ValidationError> {
    text.trim()
        .parse::<u32>()
        .ok()
        .filter(|v| *v >= 1)
        .ok_or_else(|| ValidationError::InvalidNumber {
            field,
            expected: "a positive integer",
            text: text.to_string(),
        })
}

fn non_empty(text: &str) -> Option<String> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
