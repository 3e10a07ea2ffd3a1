//! The instance tree.
//!
//! Instances live in an arena owned by [`InstanceTree`] and are addressed by
//! [`InstanceId`]. Ownership edges run only from a payload [`Value`] to the
//! instances it contains; the parent back-reference is an id. The root is
//! [`InstanceId::ROOT`] and is its own parent.

use std::fmt;
use std::sync::Arc;

use helios_ccda_xpath::Item;
use roxmltree::{Document, NodeId};

use crate::error::Issue;
use crate::schema::Schema;
use crate::value::{Fields, Value};

/// Index of an instance in its tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InstanceId(usize);

impl InstanceId {
    pub const ROOT: InstanceId = InstanceId(0);

    pub fn new(index: usize) -> Self {
        InstanceId(index)
    }

    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What kind of node an instance was matched against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Element,
    /// Attribute at the given index of the owning element.
    Attribute(usize),
    Text,
}

/// A document node, detached from the document's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MatchedNode {
    pub element: NodeId,
    pub kind: NodeKind,
}

impl MatchedNode {
    pub fn from_item(item: &Item<'_, '_>) -> Self {
        match item {
            Item::Attribute { owner, position } => MatchedNode {
                element: owner.id(),
                kind: NodeKind::Attribute(*position),
            },
            Item::Node(node) if node.is_text() => MatchedNode {
                element: node.id(),
                kind: NodeKind::Text,
            },
            Item::Node(node) => MatchedNode {
                element: node.id(),
                kind: NodeKind::Element,
            },
        }
    }

    /// Re-attaches the node to the document it was matched in.
    pub fn resolve<'a, 'input>(&self, document: &'a Document<'input>) -> Option<Item<'a, 'input>> {
        let node = document.get_node(self.element)?;
        Some(match self.kind {
            NodeKind::Attribute(position) => Item::Attribute {
                owner: node,
                position,
            },
            NodeKind::Element | NodeKind::Text => Item::Node(node),
        })
    }

    /// A stable position within the document, used when nothing better
    /// identifies an instance.
    pub fn position(&self) -> String {
        match self.kind {
            NodeKind::Attribute(index) => format!("{}@{}", self.element.get_usize(), index),
            NodeKind::Element | NodeKind::Text => self.element.get_usize().to_string(),
        }
    }
}

/// A runtime node bound to one schema and one matched document node.
#[derive(Debug)]
pub struct Instance {
    schema: Arc<Schema>,
    node: Option<MatchedNode>,
    parent: InstanceId,
    payload: Value,
    hidden: Fields,
    issues: Vec<Issue>,
}

impl Instance {
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn node(&self) -> Option<MatchedNode> {
        self.node
    }

    pub fn parent(&self) -> InstanceId {
        self.parent
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    pub fn payload_mut(&mut self) -> &mut Value {
        &mut self.payload
    }

    pub fn set_payload(&mut self, payload: Value) {
        self.payload = payload;
    }

    /// The payload as a field mapping, if it is one.
    pub fn fields(&self) -> Option<&Fields> {
        self.payload.as_fields()
    }

    pub fn fields_mut(&mut self) -> Option<&mut Fields> {
        self.payload.as_fields_mut()
    }

    /// Fields staged out of the payload during cleanup. Never exported.
    pub fn hidden(&self) -> &Fields {
        &self.hidden
    }

    pub fn hidden_mut(&mut self) -> &mut Fields {
        &mut self.hidden
    }

    /// Looks a field up in the payload, then in the hidden side-channel.
    pub fn field_or_hidden(&self, name: &str) -> Option<&Value> {
        self.fields()
            .and_then(|f| f.get(name))
            .or_else(|| self.hidden.get(name))
    }

    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    pub fn record(&mut self, issue: Issue) {
        tracing::warn!(schema = %self.schema.name(), "{}", issue);
        self.issues.push(issue);
    }
}

/// Arena of instances for one parsed document.
#[derive(Debug)]
pub struct InstanceTree {
    instances: Vec<Instance>,
    patient_id: String,
}

impl InstanceTree {
    /// Creates a tree holding only the root instance.
    pub fn new(schema: Arc<Schema>, node: Option<MatchedNode>, patient_id: impl Into<String>) -> Self {
        let root = Instance {
            schema,
            node,
            parent: InstanceId::ROOT,
            payload: Value::Mapping(Fields::new()),
            hidden: Fields::new(),
            issues: Vec::new(),
        };
        Self {
            instances: vec![root],
            patient_id: patient_id.into(),
        }
    }

    pub fn root(&self) -> InstanceId {
        InstanceId::ROOT
    }

    pub fn patient_id(&self) -> &str {
        &self.patient_id
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Adds an instance with an empty payload under `parent`.
    pub fn add(&mut self, schema: Arc<Schema>, node: Option<MatchedNode>, parent: InstanceId) -> InstanceId {
        let id = InstanceId(self.instances.len());
        self.instances.push(Instance {
            schema,
            node,
            parent,
            payload: Value::Mapping(Fields::new()),
            hidden: Fields::new(),
            issues: Vec::new(),
        });
        id
    }

    /// # Panics
    ///
    /// Panics if `id` was not issued by this tree.
    pub fn get(&self, id: InstanceId) -> &Instance {
        &self.instances[id.0]
    }

    /// # Panics
    ///
    /// Panics if `id` was not issued by this tree.
    pub fn get_mut(&mut self, id: InstanceId) -> &mut Instance {
        &mut self.instances[id.0]
    }

    /// Ancestors of `id` from its parent up to the root. Empty for the root.
    pub fn ancestors(&self, id: InstanceId) -> Ancestors<'_> {
        Ancestors {
            tree: self,
            current: id,
        }
    }

    /// Every recorded issue, in instance creation order.
    pub fn issues(&self) -> Vec<Issue> {
        self.instances
            .iter()
            .flat_map(|i| i.issues.iter().cloned())
            .collect()
    }
}

/// Iterator over an instance's ancestor chain.
pub struct Ancestors<'t> {
    tree: &'t InstanceTree,
    current: InstanceId,
}

impl Iterator for Ancestors<'_> {
    type Item = InstanceId;

    fn next(&mut self) -> Option<InstanceId> {
        let parent = self.tree.get(self.current).parent;
        if parent == self.current {
            return None;
        }
        self.current = parent;
        Some(parent)
    }
}
