//! Comparison of canonical forms
//!
//! Two canonical programs are compared in three steps:
//! 1. anything the comparison cannot reason about (pointer types, `&x`, `*p`)
//!    yields [`Verdict::Unsupported`];
//! 2. differing fingerprints yield [`Verdict::NotEquivalent`] with the path to
//!    the first differing node;
//! 3. equal fingerprints are confirmed by a full structural comparison, so a
//!    hash collision can never produce a false `Equivalent`.

pub mod fingerprint;

use crate::engine::CanonicalForm;
use crate::parser::ast::*;
use fingerprint::fingerprint;
use serde::{Serialize, Serializer};
use std::fmt;
use tracing::debug;

pub use fingerprint::{program_fingerprint, Fingerprint};

/// Outcome of comparing two programs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "verdict", content = "detail", rename_all = "snake_case")]
pub enum Verdict {
    Equivalent,
    NotEquivalent(DivergencePath),
    Unsupported(String),
}

impl Verdict {
    pub fn is_equivalent(&self) -> bool {
        matches!(self, Verdict::Equivalent)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Equivalent => f.write_str("equivalent"),
            Verdict::NotEquivalent(path) => write!(f, "not equivalent (diverges at {})", path),
            Verdict::Unsupported(reason) => write!(f, "unsupported: {}", reason),
        }
    }
}

/// One step from a node to one of its children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    /// A top-level function, by name
    Function(String),
    /// A named child such as `condition` or `left`
    Field(&'static str),
    /// Position inside the preceding list (statements, arguments)
    Index(usize),
}

/// Positions from the program root down to the first point of divergence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DivergencePath(pub Vec<PathSegment>);

impl DivergencePath {
    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for DivergencePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("<root>");
        }
        for (i, segment) in self.0.iter().enumerate() {
            match segment {
                PathSegment::Index(index) => write!(f, "[{}]", index)?,
                PathSegment::Function(name) => {
                    if i > 0 {
                        f.write_str("/")?;
                    }
                    f.write_str(name)?;
                }
                PathSegment::Field(field) => {
                    if i > 0 {
                        f.write_str("/")?;
                    }
                    f.write_str(field)?;
                }
            }
        }
        Ok(())
    }
}

impl Serialize for DivergencePath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

// ===== Unsupported constructs =====

/// Describe the first construct the comparison cannot handle soundly.
fn unsupported_construct(program: &Program) -> Option<String> {
    program.nodes.iter().find_map(unsupported_in)
}

fn unsupported_in(node: &AstNode) -> Option<String> {
    let pointer = |what: &str, name: &str, ty: &Type| {
        ty.is_pointer()
            .then(|| format!("pointer {} '{}' of type '{}'", what, name, ty))
    };
    match node {
        AstNode::FunctionDecl {
            name,
            return_type,
            params,
            body,
            ..
        } => pointer("return value of", name, return_type)
            .or_else(|| {
                params
                    .iter()
                    .find_map(|p| pointer("parameter", &p.name, &p.param_type))
            })
            .or_else(|| unsupported_in(body)),
        AstNode::VarDecl {
            name,
            var_type,
            init,
            ..
        } => pointer("variable", name, var_type)
            .or_else(|| init.as_deref().and_then(unsupported_in)),
        AstNode::UnaryOp {
            op: op @ (UnOp::Deref | UnOp::AddrOf),
            location,
            ..
        } => Some(format!(
            "'{}' operator at line {}, column {}",
            op.symbol(),
            location.line,
            location.column
        )),
        _ => children(node).into_iter().find_map(|child| unsupported_in(child.node)),
    }
}

// ===== Lock-step walk =====

/// A child of a node together with how to get there.
struct Child<'a> {
    field: &'static str,
    index: Option<usize>,
    node: &'a AstNode,
}

fn children(node: &AstNode) -> Vec<Child<'_>> {
    fn one<'a>(field: &'static str, node: &'a AstNode) -> Child<'a> {
        Child {
            field,
            index: None,
            node,
        }
    }
    fn list<'a>(field: &'static str, nodes: &'a [AstNode]) -> impl Iterator<Item = Child<'a>> {
        nodes.iter().enumerate().map(move |(i, node)| Child {
            field,
            index: Some(i),
            node,
        })
    }

    let mut out = Vec::new();
    match node {
        AstNode::FunctionDecl { body, .. } => out.extend(list("body", body.statements())),
        AstNode::VarDecl { init, .. } => out.extend(init.as_deref().map(|i| one("init", i))),
        AstNode::Assign { value, .. } => out.push(one("value", value)),
        AstNode::BinaryOp { left, right, .. } => {
            out.push(one("left", left));
            out.push(one("right", right));
        }
        AstNode::UnaryOp { operand, .. } => out.push(one("operand", operand)),
        AstNode::Literal(..) | AstNode::Identifier(..) => {}
        AstNode::ForLoop {
            init,
            condition,
            step,
            body,
            ..
        } => {
            out.extend(init.as_deref().map(|n| one("init", n)));
            out.extend(condition.as_deref().map(|n| one("condition", n)));
            out.extend(step.as_deref().map(|n| one("step", n)));
            out.extend(list("body", body.statements()));
        }
        AstNode::If {
            condition,
            then_branch,
            else_branch,
            ..
        } => {
            out.push(one("condition", condition));
            out.extend(list("then", then_branch.statements()));
            if let Some(else_branch) = else_branch {
                out.extend(list("else", else_branch.statements()));
            }
        }
        AstNode::Return { value, .. } => out.extend(value.as_deref().map(|n| one("value", n))),
        AstNode::Block { statements, .. } => out.extend(list("block", statements)),
        AstNode::Call { args, .. } => out.extend(list("args", args)),
    }
    out
}

/// Compare everything about two nodes except their children.
fn same_head(a: &AstNode, b: &AstNode) -> bool {
    match (a, b) {
        (
            AstNode::FunctionDecl {
                name: n1,
                return_type: r1,
                params: p1,
                ..
            },
            AstNode::FunctionDecl {
                name: n2,
                return_type: r2,
                params: p2,
                ..
            },
        ) => n1 == n2 && r1 == r2 && p1 == p2,
        (
            AstNode::VarDecl {
                name: n1,
                var_type: t1,
                init: i1,
                ..
            },
            AstNode::VarDecl {
                name: n2,
                var_type: t2,
                init: i2,
                ..
            },
        ) => n1 == n2 && t1 == t2 && i1.is_some() == i2.is_some(),
        (AstNode::Assign { target: t1, .. }, AstNode::Assign { target: t2, .. }) => t1 == t2,
        (AstNode::BinaryOp { op: o1, .. }, AstNode::BinaryOp { op: o2, .. }) => o1 == o2,
        (AstNode::UnaryOp { op: o1, .. }, AstNode::UnaryOp { op: o2, .. }) => o1 == o2,
        (AstNode::Literal(l1, _), AstNode::Literal(l2, _)) => l1 == l2,
        (AstNode::Identifier(n1, _), AstNode::Identifier(n2, _)) => n1 == n2,
        (
            AstNode::ForLoop {
                init: i1,
                condition: c1,
                step: s1,
                ..
            },
            AstNode::ForLoop {
                init: i2,
                condition: c2,
                step: s2,
                ..
            },
        ) => {
            i1.is_some() == i2.is_some()
                && c1.is_some() == c2.is_some()
                && s1.is_some() == s2.is_some()
        }
        (AstNode::If { else_branch: e1, .. }, AstNode::If { else_branch: e2, .. }) => {
            e1.is_some() == e2.is_some()
        }
        (AstNode::Return { value: v1, .. }, AstNode::Return { value: v2, .. }) => {
            v1.is_some() == v2.is_some()
        }
        (AstNode::Block { .. }, AstNode::Block { .. }) => true,
        (AstNode::Call { name: n1, .. }, AstNode::Call { name: n2, .. }) => n1 == n2,
        _ => false,
    }
}

fn push_child(path: &mut Vec<PathSegment>, child: &Child<'_>) {
    path.push(PathSegment::Field(child.field));
    if let Some(index) = child.index {
        path.push(PathSegment::Index(index));
    }
}

/// Descend from `a`/`b` into the first child pair for which `differ` holds.
fn walk(
    a: &AstNode,
    b: &AstNode,
    differ: &dyn Fn(&AstNode, &AstNode) -> bool, path: &mut Vec<PathSegment>,
) {
    if !same_head(a, b) {
        return;
    }
    let (left, right) = (children(a), children(b));
    for (ca, cb) in left.iter().zip(&right) {
        if ca.field != cb.field || ca.index != cb.index {
            push_child(path, ca);
            return;
        }
        if differ(ca.node, cb.node) {
            push_child(path, ca);
            walk(ca.node, cb.node, differ, path);
            return;
        }
    }
    // All shared children agree: the first extra one is the divergence
    let shared = left.len().min(right.len());
    if let Some(extra) = left.get(shared).or_else(|| right.get(shared)) {
        push_child(path, extra);
    }
}

fn divergence(
    a: &Program,
    b: &Program,
    differ: &dyn Fn(&AstNode, &AstNode) -> bool,
) -> Option<DivergencePath> {
    if a.nodes.len() != b.nodes.len() {
        return Some(DivergencePath::default());
    }
    a.nodes.iter().zip(&b.nodes).find(|(x, y)| differ(x, y)).map(|(x, y)| {
        let mut path = match x {
            AstNode::FunctionDecl { name, .. } => vec![PathSegment::Function(name.clone())],
            _ => Vec::new(),
        };
        walk(x, y, differ, &mut path);
        DivergencePath(path)
    })
}

/// Compare two canonical forms.
pub fn compare_forms(a: &CanonicalForm, b: &CanonicalForm) -> Verdict {
    if let Some(reason) =
        unsupported_construct(&a.program).or_else(|| unsupported_construct(&b.program))
    {
        debug!(%reason, "comparison unsupported");
        return Verdict::Unsupported(reason);
    }

    if a.fingerprint != b.fingerprint {
        let by_fingerprint = |x: &AstNode, y: &AstNode| fingerprint(x) != fingerprint(y);
        let path = divergence(&a.program, &b.program, &by_fingerprint).unwrap_or_default();
        return Verdict::NotEquivalent(path);
    }

    let structurally = |x: &AstNode, y: &AstNode| !x.same_as(y);
    match divergence(&a.program, &b.program, &structurally) {
        Some(path) => {
            debug!(fingerprint = %a.fingerprint, "fingerprint collision");
            Verdict::NotEquivalent(path)
        }
        None => Verdict::Equivalent,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::canonicalize;

    fn verdict(a: &str, b: &str) -> Verdict {
        compare_forms(&canonicalize(a).unwrap(), &canonicalize(b).unwrap())
    }

    #[test]
    fn test_equivalent() {
        assert_eq!(
            verdict(
                "int f(int x) { int y = 2; return x + 0; }",
                "int f(int q) { return q; }"
            ),
            Verdict::Equivalent
        );
    }

    #[test]
    fn test_divergence_path() {
        let result = verdict(
            "int f(int x) { int y; y = x + 1; return y; }",
            "int f(int x) { int y; y = x + 2; return y; }",
        );
        let Verdict::NotEquivalent(path) = result else {
            panic!("expected divergence, got {result:?}");
        };
        assert_eq!(path.to_string(), "f/body[1]/value/right");
    }

    #[test]
    fn test_extra_statement() {
        let result = verdict(
            "int f(int x) { g(x); return x; }",
            "int f(int x) { g(x); g(x); return x; }",
        );
        let Verdict::NotEquivalent(path) = result else {
            panic!("expected divergence, got {result:?}");
        };
        assert_eq!(path.to_string(), "f/body[1]");
    }

    #[test]
    fn test_function_count_diverges_at_root() {
        let result = verdict(
            "int f(int x) { return x; }",
            "int f(int x) { return x; } int g(int x) { return x; }",
        );
        assert_eq!(result, Verdict::NotEquivalent(DivergencePath::default()));
        assert_eq!(DivergencePath::default().to_string(), "<root>");
    }

    #[test]
    fn test_pointers_unsupported() {
        let result = verdict(
            "int f(int *p) { return *p; }",
            "int f(int *p) { return *p; }",
        );
        assert!(matches!(result, Verdict::Unsupported(reason) if reason.contains("parameter")));

        let result = verdict("int f(int x) { g(&x); return x; }", "int f(int x) { return x; }");
        assert!(matches!(result, Verdict::Unsupported(reason) if reason.contains("'&'")));
    }

    #[test]
    fn test_verdict_json() {
        let json = serde_json::to_string(&Verdict::Equivalent).unwrap();
        assert_eq!(json, r#"{"verdict":"equivalent"}"#);
        let path = DivergencePath(vec![
            PathSegment::Function("fib".into()),
            PathSegment::Field("body"),
            PathSegment::Index(3),
        ]);
        let json = serde_json::to_string(&Verdict::NotEquivalent(path)).unwrap();
        assert_eq!(json, r#"{"verdict":"not_equivalent","detail":"fib/body[3]"}"#);
    }
}
