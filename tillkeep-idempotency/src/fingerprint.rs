//! Canonical serialization and fingerprints of structured input.
//!
//! Input is held in a [`ValueGraph`]: an arena of [`Node`]s where sequences
//! and mappings refer to their children by [`NodeId`]. Because children are
//! references rather than owned values, a graph may share a node between
//! several parents or even contain a cycle. [`canonical_serialize`] walks the
//! graph with an explicit "currently visiting" set, so a node that refers
//! back to one of its own ancestors is omitted instead of recursing forever.
//!
//! Canonical form:
//!
//! - mapping keys are sorted by Unicode code point, recursively;
//! - sequences keep their order;
//! - scalars are written as JSON (`null`, `true`, `1`, `1.5`, `"text"`);
//! - an integral float is written as the integer it equals, so `1.0` and `1`
//!   (and `-0.0` and `0`) fingerprint the same;
//! - non-finite floats are written as `null`;
//! - a cyclic reference inside a mapping drops that entry, inside a
//!   sequence it is written as `null`.
//!
//! ```
//! use serde_json::json;
//! use tillkeep_idempotency::fingerprint::{canonical_json, derive_id, hash};
//!
//! let a = canonical_json(&json!({"b": 2, "a": 1}));
//! let b = canonical_json(&json!({"a": 1, "b": 2}));
//! assert_eq!(a, r#"{"a":1,"b":2}"#);
//! assert_eq!(a, b);
//!
//! let id = derive_id("BATCH", &hash(&a));
//! assert!(id.starts_with("BATCH-"));
//! assert_eq!(id.len(), "BATCH-".len() + 10);
//! ```

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Number of hash characters kept by [`derive_id`].
pub const DERIVED_ID_HASH_LEN: usize = 10;

/// Floats below 2^53 in magnitude hold integers exactly.
const MAX_EXACT_INT: f64 = 9_007_199_254_740_992.0;

/// Index of a node inside a [`ValueGraph`].
pub type NodeId = usize;

/// One value in the arena.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    String(String),
    Seq(Vec<NodeId>),
    Map(Vec<(String, NodeId)>),
}

/// Arena of [`Node`]s.
#[derive(Debug, Clone, Default)]
pub struct ValueGraph {
    nodes: Vec<Node>,
}

impl ValueGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a node and return its id.
    pub fn push(&mut self, node: Node) -> NodeId {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    /// Reserve an id to fill in later with [`set`](Self::set). Needed to
    /// build a node that refers to itself or to a later sibling.
    pub fn reserve(&mut self) -> NodeId {
        self.push(Node::Null)
    }

    /// Replace the node at `id`. Returns `false` if `id` is out of range.
    pub fn set(&mut self, id: NodeId, node: Node) -> bool {
        match self.nodes.get_mut(id) {
            Some(slot) => {
                *slot = node;
                true
            }
            None => false,
        }
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Build a graph from a JSON tree. Returns the graph and its root id.
    pub fn from_json(value: &Value) -> (Self, NodeId) {
        let mut graph = Self::new();
        let root = graph.insert_json(value);
        (graph, root)
    }

    /// Insert a JSON tree into this graph and return the id of its root.
    pub fn insert_json(&mut self, value: &Value) -> NodeId {
        let node = match value {
            Value::Null => Node::Null,
            Value::Bool(b) => Node::Bool(*b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Node::Int(i)
                } else if let Some(u) = n.as_u64() {
                    Node::UInt(u)
                } else {
                    Node::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            Value::String(s) => Node::String(s.clone()),
            Value::Array(items) => {
                let children = items.iter().map(|item| self.insert_json(item)).collect();
                Node::Seq(children)
            }
            Value::Object(map) => {
                let entries = map
                    .iter()
                    .map(|(key, item)| (key.clone(), self.insert_json(item)))
                    .collect();
                Node::Map(entries)
            }
        };
        self.push(node)
    }
}

/// Serialize the graph reachable from `root` in canonical form.
pub fn canonical_serialize(graph: &ValueGraph, root: NodeId) -> String {
    let mut out = String::new();
    let mut visiting = vec![false; graph.len()];
    if !write_node(graph, root, &mut visiting, &mut out) {
        out.push_str("null");
    }
    out
}

/// Canonical form of a JSON tree.
pub fn canonical_json(value: &Value) -> String {
    let (graph, root) = ValueGraph::from_json(value);
    canonical_serialize(&graph, root)
}

/// Lowercase hex SHA-256 digest of `text`.
pub fn hash(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

/// `prefix-XXXXXXXXXX`: the prefix joined to the first ten hash characters,
/// uppercased.
pub fn derive_id(prefix: &str, hash: &str) -> String {
    let head: String = hash.chars().take(DERIVED_ID_HASH_LEN).collect();
    format!("{}-{}", prefix, head.to_uppercase())
}

/// Hash of the canonical form of any serializable value.
pub fn fingerprint<T: Serialize + ?Sized>(value: &T) -> Result<String, serde_json::Error> {
    let value = serde_json::to_value(value)?;
    Ok(hash(&canonical_json(&value)))
}

/// Stable identifier for a serializable value, e.g. a batch id derived from
/// the batch's contents.
pub fn derive_id_for<T: Serialize + ?Sized>(
    prefix: &str,
    value: &T,
) -> Result<String, serde_json::Error> {
    Ok(derive_id(prefix, &fingerprint(value)?))
}

/// Write `id` into `out`. Returns `false`, writing nothing, when the node is
/// already on the current path (a cycle).
fn write_node(graph: &ValueGraph, id: NodeId, visiting: &mut [bool], out: &mut String) -> bool {
    let Some(node) = graph.node(id) else {
        out.push_str("null");
        return true;
    };

    match node {
        Node::Null => out.push_str("null"),
        Node::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Node::Int(i) => out.push_str(&i.to_string()),
        Node::UInt(u) => out.push_str(&u.to_string()),
        Node::Float(f) if f.fract() == 0.0 && f.abs() < MAX_EXACT_INT => {
            out.push_str(&(*f as i64).to_string())
        }
        Node::Float(f) => match serde_json::Number::from_f64(*f) {
            Some(n) => out.push_str(&n.to_string()),
            None => out.push_str("null"),
        },
        Node::String(s) => out.push_str(&Value::String(s.clone()).to_string()),
        Node::Seq(children) => {
            if visiting[id] {
                return false;
            }
            visiting[id] = true;
            out.push('[');
            for (i, child) in children.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                if !write_node(graph, *child, visiting, out) {
                    out.push_str("null");
                }
            }
            out.push(']');
            visiting[id] = false;
        }
        Node::Map(entries) => {
            if visiting[id] {
                return false;
            }
            visiting[id] = true;
            let mut sorted: Vec<&(String, NodeId)> = entries.iter().collect();
            sorted.sort_by(|a, b| a.0.cmp(&b.0));

            out.push('{');
            let mut first = true;
            for (key, child) in sorted {
                let mut entry = String::new();
                entry.push_str(&Value::String(key.clone()).to_string());
                entry.push(':');
                if !write_node(graph, *child, visiting, &mut entry) {
                    continue;
                }
                if !first {
                    out.push(',');
                }
                out.push_str(&entry);
                first = false;
            }
            out.push('}');
            visiting[id] = false;
        }
    }
    true
}
