//! Traversal of an instance tree.
//!
//! Every traversal unwraps an instance into its payload before descending, so
//! visitors and the exporter never see the instance wrapper itself.

use serde_json::Map;

use crate::instance::{InstanceId, InstanceTree};
use crate::value::Value;

/// Callbacks for [`walk`].
pub trait TreeVisitor {
    /// Called before the instance's children are visited.
    fn pre(&mut self, _tree: &InstanceTree, _id: InstanceId) {}

    /// Called after every child instance has been visited.
    fn post(&mut self, tree: &mut InstanceTree, id: InstanceId);
}

/// Visits `id` and every instance reachable from its payload, children first.
pub fn walk<V>(tree: &mut InstanceTree, id: InstanceId, visitor: &mut V)
where
    V: TreeVisitor + ?Sized,
{
    visitor.pre(tree, id);
    for child in tree.get(id).payload().instance_ids() {
        walk(tree, child, visitor);
    }
    visitor.post(tree, id);
}

/// Converts a payload value to JSON, replacing instances by their payloads.
pub fn export(tree: &InstanceTree, value: &Value) -> serde_json::Value {
    match value {
        Value::Instance(id) => export(tree, tree.get(*id).payload()),
        Value::Sequence(items) => {
            serde_json::Value::Array(items.iter().map(|v| export(tree, v)).collect())
        }
        Value::Mapping(fields) => {
            let object: Map<String, serde_json::Value> = fields
                .iter()
                .map(|(k, v)| (k.to_string(), export(tree, v)))
                .collect();
            serde_json::Value::Object(object)
        }
        Value::Scalar(scalar) => scalar.to_json(),
    }
}

/// Exports the root instance.
pub fn export_tree(tree: &InstanceTree) -> serde_json::Value {
    export(tree, tree.get(tree.root()).payload())
}
