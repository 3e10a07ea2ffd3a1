//! Abstract syntax tree for parsed location expressions.

use std::fmt;

/// A parsed expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Or(Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Compare(Box<Expr>, CompareOp, Box<Expr>),
    Union(Box<Expr>, Box<Expr>),
    /// A location path evaluated from the context node (or the root if absolute).
    Path(LocationPath),
    /// A primary expression narrowed by predicates, e.g. `(a | b)[@x='1']`.
    Filter {
        base: Box<Expr>,
        predicates: Vec<Expr>,
    },
    /// A filter expression followed by further steps, e.g. `(a | b)/h:value`.
    PathFrom { base: Box<Expr>, steps: Vec<Step> },
    Literal(String),
    Number(f64),
    Function { name: String, args: Vec<Expr> },
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CompareOp::Eq => "=",
            CompareOp::NotEq => "!=",
            CompareOp::Lt => "<",
            CompareOp::LtEq => "<=",
            CompareOp::Gt => ">",
            CompareOp::GtEq => ">=",
        };
        f.write_str(s)
    }
}

/// A sequence of steps, optionally anchored at the document root.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationPath {
    pub absolute: bool,
    pub steps: Vec<Step>,
}

/// One location step: `axis::test[predicate]*`.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub axis: Axis,
    pub test: NodeTest,
    pub predicates: Vec<Expr>,
}

impl Step {
    pub(crate) fn new(axis: Axis, test: NodeTest) -> Self {
        Self {
            axis,
            test,
            predicates: Vec::new(),
        }
    }

    /// The implicit step `//` expands to.
    pub(crate) fn descendant_or_self() -> Self {
        Step::new(Axis::DescendantOrSelf, NodeTest::Node)
    }
}

/// Supported axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Child,
    Descendant,
    DescendantOrSelf,
    Parent,
    SelfNode,
    Attribute,
}

impl Axis {
    pub(crate) fn from_name(name: &str) -> Option<Self> {
        match name {
            "child" => Some(Axis::Child),
            "descendant" => Some(Axis::Descendant),
            "descendant-or-self" => Some(Axis::DescendantOrSelf),
            "parent" => Some(Axis::Parent),
            "self" => Some(Axis::SelfNode),
            "attribute" => Some(Axis::Attribute),
            _ => None,
        }
    }
}

/// Node tests.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeTest {
    /// `prefix:local` or `local`.
    Name {
        prefix: Option<String>,
        local: String,
    },
    /// `*` or `prefix:*`.
    Wildcard { prefix: Option<String> },
    /// `text()`
    Text,
    /// `node()`
    Node,
}

impl NodeTest {
    /// A name test from its optional prefix and local part. A local part of
    /// `*` is a wildcard.
    pub(crate) fn qualified(prefix: Option<&str>, local: &str) -> Self {
        let prefix = prefix.map(str::to_string);
        if local == "*" {
            NodeTest::Wildcard { prefix }
        } else {
            NodeTest::Name {
                prefix,
                local: local.to_string(),
            }
        }
    }
}
