//! Evaluation of parsed expressions against a `roxmltree` document.

use std::collections::BTreeMap;

use roxmltree::Node;

use crate::ast::{Axis, CompareOp, Expr, NodeTest, Step};
use crate::error::{QueryError, Result};
use crate::namespaces::Namespaces;

/// A node selected by an expression.
///
/// `roxmltree` does not model attributes as nodes, so an attribute is
/// addressed by its owning element and its index in the attribute list.
#[derive(Debug, Clone, Copy)]
pub enum Item<'a, 'input> {
    Node(Node<'a, 'input>),
    Attribute {
        owner: Node<'a, 'input>,
        position: usize,
    },
}

impl<'a, 'input> Item<'a, 'input> {
    /// Sort key that reproduces document order. Attributes sort after their
    /// owner and before its first child.
    pub fn order_key(&self) -> (usize, usize) {
        match self {
            Item::Node(node) => (node.id().get_usize(), 0),
            Item::Attribute { owner, position } => (owner.id().get_usize(), position + 1),
        }
    }

    /// The element or text node, or the owning element for an attribute.
    pub fn node(&self) -> Node<'a, 'input> {
        match self {
            Item::Node(node) => *node,
            Item::Attribute { owner, .. } => *owner,
        }
    }

    pub fn is_attribute(&self) -> bool {
        matches!(self, Item::Attribute { .. })
    }

    pub fn is_text(&self) -> bool {
        matches!(self, Item::Node(node) if node.is_text())
    }

    /// The XPath string-value: attribute value, text content, or the
    /// concatenated descendant text of an element.
    pub fn string_value(&self) -> String {
        match self {
            Item::Attribute { owner, position } => owner
                .attributes()
                .nth(*position)
                .map(|a| a.value().to_string())
                .unwrap_or_default(),
            Item::Node(node) if node.is_element() || node.is_root() => node
                .descendants()
                .filter(|d| d.is_text())
                .filter_map(|d| d.text())
                .collect(),
            Item::Node(node) => node.text().unwrap_or_default().to_string(),
        }
    }

    pub fn local_name(&self) -> String {
        match self {
            Item::Attribute { owner, position } => owner
                .attributes()
                .nth(*position)
                .map(|a| a.name().to_string())
                .unwrap_or_default(),
            Item::Node(node) if node.is_element() => node.tag_name().name().to_string(),
            Item::Node(_) => String::new(),
        }
    }

    pub fn same_as(&self, other: &Item<'_, '_>) -> bool {
        self.order_key() == other.order_key()
    }
}

/// The result of evaluating an expression.
#[derive(Debug, Clone)]
pub enum XValue<'a, 'input> {
    /// A node-set in document order without duplicates.
    Nodes(Vec<Item<'a, 'input>>),
    Str(String),
    Num(f64),
    Bool(bool),
}

impl<'a, 'input> XValue<'a, 'input> {
    pub fn to_bool(&self) -> bool {
        match self {
            XValue::Nodes(items) => !items.is_empty(),
            XValue::Str(s) => !s.is_empty(),
            XValue::Num(n) => *n != 0.0 && !n.is_nan(),
            XValue::Bool(b) => *b,
        }
    }

    pub fn to_number(&self) -> f64 {
        match self {
            XValue::Nodes(_) => string_to_number(&self.to_text()),
            XValue::Str(s) => string_to_number(s),
            XValue::Num(n) => *n,
            XValue::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }

    /// The XPath string conversion. A node-set converts to the string-value
    /// of its first node.
    pub fn to_text(&self) -> String {
        match self {
            XValue::Nodes(items) => items.first().map(Item::string_value).unwrap_or_default(),
            XValue::Str(s) => s.clone(),
            XValue::Num(n) => number_to_string(*n),
            XValue::Bool(b) => b.to_string(),
        }
    }
}

fn string_to_number(s: &str) -> f64 {
    let trimmed = s.trim();
    let well_formed = !trimmed.is_empty()
        && trimmed
            .chars()
            .enumerate()
            .all(|(i, c)| c.is_ascii_digit() || c == '.' || (i == 0 && c == '-'));
    if well_formed {
        trimmed.parse().unwrap_or(f64::NAN)
    } else {
        f64::NAN
    }
}

fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

#[derive(Clone, Copy)]
struct Context<'a, 'input> {
    item: Item<'a, 'input>,
    position: usize,
    size: usize,
}

/// Evaluates expressions with a fixed set of namespace bindings.
pub struct Evaluator<'n> {
    namespaces: &'n Namespaces,
}

impl<'n> Evaluator<'n> {
    pub fn new(namespaces: &'n Namespaces) -> Self {
        Self { namespaces }
    }

    /// Evaluates `expr` with `item` as the context node.
    pub fn evaluate<'a, 'input>(
        &self,
        expr: &Expr,
        item: Item<'a, 'input>,
    ) -> Result<XValue<'a, 'input>> {
        let context = Context {
            item,
            position: 1,
            size: 1,
        };
        self.eval(expr, &context)
    }

    fn eval<'a, 'input>(
        &self,
        expr: &Expr,
        ctx: &Context<'a, 'input>,
    ) -> Result<XValue<'a, 'input>> {
        match expr {
            Expr::Or(left, right) => {
                if self.eval(left, ctx)?.to_bool() {
                    return Ok(XValue::Bool(true));
                }
                Ok(XValue::Bool(self.eval(right, ctx)?.to_bool()))
            }
            Expr::And(left, right) => {
                if !self.eval(left, ctx)?.to_bool() {
                    return Ok(XValue::Bool(false));
                }
                Ok(XValue::Bool(self.eval(right, ctx)?.to_bool()))
            }
            Expr::Compare(left, op, right) => {
                let l = self.eval(left, ctx)?;
                let r = self.eval(right, ctx)?;
                Ok(XValue::Bool(compare(&l, *op, &r)))
            }
            Expr::Union(left, right) => {
                let l = self.node_set(left, ctx, "union operand")?;
                let r = self.node_set(right, ctx, "union operand")?;
                Ok(XValue::Nodes(merge(l.into_iter().chain(r))))
            }
            Expr::Path(path) => {
                let start = if path.absolute {
                    Item::Node(ctx.item.node().document().root())
                } else {
                    ctx.item
                };
                Ok(XValue::Nodes(self.apply_steps(vec![start], &path.steps)?))
            }
            Expr::Filter { base, predicates } => {
                let items = self.node_set(base, ctx, "filter base")?;
                Ok(XValue::Nodes(self.apply_predicates(items, predicates)?))
            }
            Expr::PathFrom { base, steps } => {
                let items = self.node_set(base, ctx, "path base")?;
                Ok(XValue::Nodes(self.apply_steps(items, steps)?))
            }
            Expr::Literal(s) => Ok(XValue::Str(s.clone())),
            Expr::Number(n) => Ok(XValue::Num(*n)),
            Expr::Function { name, args } => self.call(name, args, ctx),
        }
    }

    fn node_set<'a, 'input>(
        &self,
        expr: &Expr,
        ctx: &Context<'a, 'input>,
        role: &str,
    ) -> Result<Vec<Item<'a, 'input>>> {
        match self.eval(expr, ctx)? {
            XValue::Nodes(items) => Ok(items),
            _ => Err(QueryError::type_error(format!(
                "{} must be a node-set",
                role
            ))),
        }
    }

    fn apply_steps<'a, 'input>(
        &self,
        start: Vec<Item<'a, 'input>>,
        steps: &[Step],
    ) -> Result<Vec<Item<'a, 'input>>> {
        let mut current = start;
        for step in steps {
            let mut next = Vec::new();
            for item in &current {
                let candidates = self.axis_items(*item, step)?;
                next.extend(self.apply_predicates(candidates, &step.predicates)?);
            }
            current = merge(next);
        }
        Ok(current)
    }

    fn apply_predicates<'a, 'input>(
        &self,
        items: Vec<Item<'a, 'input>>,
        predicates: &[Expr],
    ) -> Result<Vec<Item<'a, 'input>>> {
        let mut current = items;
        for predicate in predicates {
            let size = current.len();
            let mut kept = Vec::with_capacity(size);
            for (index, item) in current.into_iter().enumerate() {
                let ctx = Context {
                    item,
                    position: index + 1,
                    size,
                };
                let keep = match self.eval(predicate, &ctx)? {
                    XValue::Num(n) => n == (index + 1) as f64,
                    other => other.to_bool(),
                };
                if keep {
                    kept.push(item);
                }
            }
            current = kept;
        }
        Ok(current)
    }

    fn axis_items<'a, 'input>(
        &self,
        item: Item<'a, 'input>,
        step: &Step,
    ) -> Result<Vec<Item<'a, 'input>>> {
        let test = &step.test;
        let mut out = Vec::new();
        match (step.axis, item) {
            (Axis::Child, Item::Node(node)) => {
                for child in node.children() {
                    if self.matches_node(child, test)? {
                        out.push(Item::Node(child));
                    }
                }
            }
            (Axis::Descendant, Item::Node(node)) => {
                for d in node.descendants().skip(1) {
                    if self.matches_node(d, test)? {
                        out.push(Item::Node(d));
                    }
                }
            }
            (Axis::DescendantOrSelf, Item::Node(node)) => {
                for d in node.descendants() {
                    if self.matches_node(d, test)? {
                        out.push(Item::Node(d));
                    }
                }
            }
            (Axis::SelfNode, Item::Node(node)) => {
                if self.matches_node(node, test)? {
                    out.push(item);
                }
            }
            (Axis::SelfNode | Axis::DescendantOrSelf, Item::Attribute { .. }) => {
                if *test == NodeTest::Node {
                    out.push(item);
                }
            }
            (Axis::Parent, Item::Node(node)) => {
                if let Some(parent) = node.parent() {
                    if self.matches_node(parent, test)? {
                        out.push(Item::Node(parent));
                    }
                }
            }
            (Axis::Parent, Item::Attribute { owner, .. }) => {
                if self.matches_node(owner, test)? {
                    out.push(Item::Node(owner));
                }
            }
            (Axis::Attribute, Item::Node(node)) if node.is_element() => {
                for (position, attr) in node.attributes().enumerate() {
                    if self.matches_attribute(attr.namespace(), attr.name(), test)? {
                        out.push(Item::Attribute {
                            owner: node,
                            position,
                        });
                    }
                }
            }
            _ => {}
        }
        Ok(out)
    }

    fn resolve(&self, prefix: &Option<String>) -> Result<Option<&str>> {
        match prefix {
            Some(p) => self.namespaces.resolve(p).map(Some),
            None => Ok(None),
        }
    }

    fn matches_node(&self, node: Node<'_, '_>, test: &NodeTest) -> Result<bool> {
        Ok(match test {
            NodeTest::Name { prefix, local } => {
                node.is_element()
                    && node.tag_name().name() == local
                    && node.tag_name().namespace() == self.resolve(prefix)?
            }
            NodeTest::Wildcard { prefix: None } => node.is_element(),
            NodeTest::Wildcard { prefix } => {
                node.is_element() && node.tag_name().namespace() == self.resolve(prefix)?
            }
            NodeTest::Text => node.is_text(),
            NodeTest::Node => true,
        })
    }

    fn matches_attribute(
        &self,
        namespace: Option<&str>,
        name: &str,
        test: &NodeTest,
    ) -> Result<bool> {
        Ok(match test {
            NodeTest::Name { prefix, local } => {
                name == local && namespace == self.resolve(prefix)?
            }
            NodeTest::Wildcard { prefix: None } => true,
            NodeTest::Wildcard { prefix } => namespace == self.resolve(prefix)?,
            NodeTest::Text => false,
            NodeTest::Node => true,
        })
    }

    fn call<'a, 'input>(
        &self,
        name: &str,
        args: &[Expr],
        ctx: &Context<'a, 'input>,
    ) -> Result<XValue<'a, 'input>> {
        let arg_text = |index: usize| -> Result<String> {
            match args.get(index) {
                Some(expr) => Ok(self.eval(expr, ctx)?.to_text()),
                None => Ok(ctx.item.string_value()),
            }
        };

        match name {
            "not" => Ok(XValue::Bool(!self.eval(first_arg(name, args)?, ctx)?.to_bool())),
            "true" => Ok(XValue::Bool(true)),
            "false" => Ok(XValue::Bool(false)),
            "count" => {
                let items = self.node_set(first_arg(name, args)?, ctx, "count() argument")?;
                Ok(XValue::Num(items.len() as f64))
            }
            "string" => Ok(XValue::Str(arg_text(0)?)),
            "contains" => Ok(XValue::Bool(arg_text(0)?.contains(arg_text(1)?.as_str()))),
            "starts-with" => Ok(XValue::Bool(
                arg_text(0)?.starts_with(arg_text(1)?.as_str()),
            )),
            "normalize-space" => Ok(XValue::Str(
                arg_text(0)?.split_whitespace().collect::<Vec<_>>().join(" "),
            )),
            "position" => Ok(XValue::Num(ctx.position as f64)),
            "last" => Ok(XValue::Num(ctx.size as f64)),
            "local-name" => {
                let name = match args.first() {
                    Some(expr) => self
                        .node_set(expr, ctx, "local-name() argument")?
                        .first()
                        .map(Item::local_name)
                        .unwrap_or_default(),
                    None => ctx.item.local_name(),
                };
                Ok(XValue::Str(name))
            }
            other => Err(QueryError::UnknownFunction {
                name: other.to_string(),
            }),
        }
    }
}

fn first_arg<'e>(name: &str, args: &'e [Expr]) -> Result<&'e Expr> {
    args.first().ok_or_else(|| QueryError::Arity {
        name: name.to_string(),
        expected: "1".to_string(),
        found: 0,
    })
}

/// Sorts items into document order and removes duplicates.
fn merge<'a, 'input>(
    items: impl IntoIterator<Item = Item<'a, 'input>>,
) -> Vec<Item<'a, 'input>> {
    let ordered: BTreeMap<(usize, usize), Item<'a, 'input>> = items
        .into_iter()
        .map(|item| (item.order_key(), item))
        .collect();
    ordered.into_values().collect()
}

fn compare(left: &XValue<'_, '_>, op: CompareOp, right: &XValue<'_, '_>) -> bool {
    match (left, right) {
        (XValue::Nodes(_), XValue::Bool(b)) => {
            compare_atoms(&XValue::Bool(left.to_bool()), op, &XValue::Bool(*b))
        }
        (XValue::Bool(b), XValue::Nodes(_)) => {
            compare_atoms(&XValue::Bool(*b), op, &XValue::Bool(right.to_bool()))
        }
        (XValue::Nodes(l), XValue::Nodes(r)) => l.iter().any(|a| {
            let a = XValue::Str(a.string_value());
            r.iter()
                .any(|b| compare_atoms(&a, op, &XValue::Str(b.string_value())))
        }),
        (XValue::Nodes(l), atom) => l
            .iter()
            .any(|a| compare_atoms(&XValue::Str(a.string_value()), op, atom)),
        (atom, XValue::Nodes(r)) => r
            .iter()
            .any(|b| compare_atoms(atom, op, &XValue::Str(b.string_value()))),
        (l, r) => compare_atoms(l, op, r),
    }
}

fn compare_atoms(left: &XValue<'_, '_>, op: CompareOp, right: &XValue<'_, '_>) -> bool {
    match op {
        CompareOp::Eq | CompareOp::NotEq => {
            let equal = match (left, right) {
                (XValue::Bool(_), _) | (_, XValue::Bool(_)) => left.to_bool() == right.to_bool(),
                (XValue::Num(_), _) | (_, XValue::Num(_)) => left.to_number() == right.to_number(),
                _ => left.to_text() == right.to_text(),
            };
            if op == CompareOp::Eq { equal } else { !equal }
        }
        CompareOp::Lt => left.to_number() < right.to_number(),
        CompareOp::LtEq => left.to_number() <= right.to_number(),
        CompareOp::Gt => left.to_number() > right.to_number(),
        CompareOp::GtEq => left.to_number() >= right.to_number(),
    }
}
