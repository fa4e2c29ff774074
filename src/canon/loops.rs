//! Pass 4: loop direction normalization
//!
//! A counting-down loop whose counter is only used for counting runs the same
//! number of times as the matching counting-up loop:
//!
//! ```text
//! for (v = S; v != E; v = v - 1)   →   for (v = E; v != S; v = v + 1)
//! for (v = S; E < v; v = v - 1)    →   for (v = E; v < S; v = v + 1)
//! ```
//!
//! The rewrite only fires when `S` and `E` are pure and independent of `v`,
//! the body neither mentions `v` nor writes anything `S` or `E` read, and `v`
//! appears nowhere else in the function. Counters narrower than `int` are
//! left alone.

use super::{map_functions, CanonicalizationError, Function};
use crate::parser::ast::*;
use tracing::debug;

pub fn run(program: Program) -> Result<Program, CanonicalizationError> {
    map_functions(program, |function| {
        let original = function.body.clone();
        let scope = Scope {
            body: &original,
            params: &function.params,
        };
        let mut reversed = 0;
        let body = normalize(function.body, &scope, &mut reversed);
        if reversed > 0 {
            debug!(function = %function.name, reversed, "normalized loop direction");
        }
        Ok(Function { body, ..function })
    })
}

/// The function a loop sits in, before any loop was rewritten.
struct Scope<'a> {
    body: &'a [AstNode],
    params: &'a [Param],
}

impl Scope<'_> {
    /// Declared type of `name`. Declarations are all at the top after flattening.
    fn declared_type(&self, name: &str) -> Option<&Type> {
        let param = self.params.iter().find(|p| p.name == name);
        param.map(|p| &p.param_type).or_else(|| {
            self.body.iter().find_map(|stmt| match stmt {
                AstNode::VarDecl { name: n, var_type, .. } if n == name => Some(var_type),
                _ => None,
            })
        })
    }
}

/// Comparison between the counter and its bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bound {
    /// `v != E`
    NotEqual,
    /// `E < v`
    Above,
}

/// A counting-down loop header taken apart.
struct Countdown<'a> {
    counter: &'a str,
    start: &'a AstNode,
    end: &'a AstNode,
    bound: Bound,
}

fn is_counter(node: &AstNode, counter: &str) -> bool {
    matches!(node, AstNode::Identifier(name, _) if name == counter)
}

/// Match `v = S`, a `v != E` / `E != v` / `E < v` condition and `v = v - 1`.
fn countdown<'a>(
    init: &'a AstNode,
    condition: &'a AstNode,
    step: &'a AstNode,
) -> Option<Countdown<'a>> {
    let AstNode::Assign {
        target: counter,
        value: start,
        ..
    } = init
    else {
        return None;
    };

    let AstNode::Assign { target, value, .. } = step else {
        return None;
    };
    let decrements = target == counter
        && matches!(
            value.as_ref(),
            AstNode::BinaryOp { op: BinOp::Sub, left, right, .. }
                if is_counter(left, counter) && right.as_int() == Some(1)
        );
    if !decrements {
        return None;
    }

    let AstNode::BinaryOp {
        op, left, right, ..
    } = condition
    else {
        return None;
    };
    let (end, bound) = match op {
        BinOp::Ne if is_counter(left, counter) => (right.as_ref(), Bound::NotEqual),
        BinOp::Ne if is_counter(right, counter) => (left.as_ref(), Bound::NotEqual),
        BinOp::Lt if is_counter(right, counter) => (left.as_ref(), Bound::Above),
        _ => return None,
    };

    Some(Countdown {
        counter,
        start,
        end,
        bound,
    })
}

/// Number of places `node` reads or writes `name`. Declarations don't count.
fn occurrences(node: &AstNode, name: &str) -> usize {
    fn sum<'a>(nodes: impl Iterator<Item = &'a AstNode>, name: &str) -> usize {
        nodes.map(|n| occurrences(n, name)).sum()
    }
    match node {
        AstNode::Identifier(ident, _) => usize::from(ident == name),
        AstNode::Literal(..) => 0,
        AstNode::VarDecl { init, .. } => sum(init.as_deref().into_iter(), name),
        AstNode::Assign { target, value, .. } => {
            usize::from(target == name) + occurrences(value, name)
        }
        AstNode::BinaryOp { left, right, .. } => occurrences(left, name) + occurrences(right, name),
        AstNode::UnaryOp { operand, .. } => occurrences(operand, name),
        AstNode::Call { args, .. } => sum(args.iter(), name),
        AstNode::Return { value, .. } => sum(value.as_deref().into_iter(), name),
        AstNode::Block { statements, .. } => sum(statements.iter(), name),
        AstNode::If {
            condition,
            then_branch,
            else_branch,
            ..
        } => {
            occurrences(condition, name)
                + occurrences(then_branch, name)
                + sum(else_branch.as_deref().into_iter(), name)
        }
        AstNode::ForLoop {
            init,
            condition,
            step,
            body,
            ..
        } => {
            let header = [init, condition, step].into_iter().filter_map(|part| part.as_deref());
            sum(header, name) + occurrences(body, name)
        }
        AstNode::FunctionDecl { body, .. } => occurrences(body, name),
    }
}

fn can_reverse(
    header: &Countdown<'_>,
    loop_node: &AstNode,
    body: &AstNode,
    scope: &Scope<'_>,
) -> bool {
    let Countdown {
        counter,
        start,
        end,
        ..
    } = header;

    if !start.is_pure() || !end.is_pure() || start.mentions(counter) || end.mentions(counter) {
        return false;
    }
    // A counter narrower than int wraps before it reaches a wide bound, so
    // the two directions can run a different number of times. Bounds are
    // assumed to fit in an int-or-wider counter.
    let wide = scope
        .declared_type(counter)
        .is_some_and(|ty| !ty.is_pointer() && ty.bit_width() >= 32);
    if !wide {
        return false;
    }
    if body.mentions(counter) {
        return false;
    }
    let written = body.writes();
    if start.reads().iter().chain(end.reads().iter()).any(|v| written.contains(v)) {
        return false;
    }
    let total: usize = scope.body.iter().map(|s| occurrences(s, counter)).sum();
    total == occurrences(loop_node, counter)
}

fn reverse(header: &Countdown<'_>, location: SourceLocation) -> (AstNode, AstNode, AstNode) {
    let counter = || AstNode::ident(header.counter, location);
    let init = AstNode::assign(header.counter, header.end.clone(), location);
    let op = match header.bound {
        Bound::NotEqual => BinOp::Ne,
        Bound::Above => BinOp::Lt,
    };
    let condition = AstNode::binary(op, counter(), header.start.clone(), location);
    let step = AstNode::assign(
        header.counter,
        AstNode::binary(BinOp::Add, counter(), AstNode::int(1, location), location),
        location,
    );
    (init, condition, step)
}

fn normalize(statements: Vec<AstNode>, scope: &Scope<'_>, reversed: &mut usize) -> Vec<AstNode> {
    statements
        .into_iter()
        .map(|stmt| normalize_statement(stmt, scope, reversed))
        .collect()
}

fn normalize_block(node: AstNode, scope: &Scope<'_>, reversed: &mut usize) -> AstNode {
    match node {
        AstNode::Block {
            statements,
            location,
        } => AstNode::block(normalize(statements, scope, reversed), location),
        other => normalize_statement(other, scope, reversed),
    }
}

fn normalize_statement(stmt: AstNode, scope: &Scope<'_>, reversed: &mut usize) -> AstNode {
    match stmt {
        AstNode::ForLoop {
            init: Some(init),
            condition: Some(condition),
            step: Some(step),
            body,
            location,
        } => {
            let rewritten = {
                let loop_node = AstNode::ForLoop {
                    init: Some(init.clone()),
                    condition: Some(condition.clone()),
                    step: Some(step.clone()),
                    body: body.clone(),
                    location,
                };
                countdown(&init, &condition, &step)
                    .filter(|header| can_reverse(header, &loop_node, &body, scope))
                    .map(|header| reverse(&header, init.location()))
            };
            let body = Box::new(normalize_block(*body, scope, reversed));
            match rewritten {
                Some((init, condition, step)) => {
                    *reversed += 1;
                    AstNode::ForLoop {
                        init: Some(Box::new(init)),
                        condition: Some(Box::new(condition)),
                        step: Some(Box::new(step)),
                        body,
                        location,
                    }
                }
                None => AstNode::ForLoop {
                    init: Some(init),
                    condition: Some(condition),
                    step: Some(step),
                    body,
                    location,
                },
            }
        }
        AstNode::ForLoop {
            init,
            condition,
            step,
            body,
            location,
        } => AstNode::ForLoop {
            init,
            condition,
            step,
            body: Box::new(normalize_block(*body, scope, reversed)),
            location,
        },
        AstNode::If {
            condition,
            then_branch,
            else_branch,
            location,
        } => AstNode::If {
            condition,
            then_branch: Box::new(normalize_block(*then_branch, scope, reversed)),
            else_branch: else_branch.map(|e| Box::new(normalize_block(*e, scope, reversed))),
            location,
        },
        AstNode::Block {
            statements,
            location,
        } => AstNode::block(normalize(statements, scope, reversed), location),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canon::test_support::{parse, printed};
    use crate::canon::{dse, flatten, fold};
    use crate::engine::CompareOptions;
    use pretty_assertions::assert_eq;

    fn normalized(source: &str) -> Vec<String> {
        let options = CompareOptions::default();
        let program = flatten::run(parse(source)).unwrap();
        let program = fold::run(program, &options).unwrap();
        let program = dse::run(program, &options).unwrap();
        printed(&run(program).unwrap())
    }

    fn loop_header(body: &[String]) -> String {
        body.iter()
            .find(|s| s.starts_with("for"))
            .and_then(|s| s.lines().next())
            .map(str::to_string)
            .unwrap_or_default()
    }

    #[test]
    fn test_reverses_countdown() {
        let body = normalized(
            "unsigned long fib(unsigned long n) { int a = 1, b = 1, c; \
             for (int j = n; j != 0; --j) { c = a + b; a = b; b = c; } return c; }",
        );
        assert_eq!(loop_header(&body), "for (j = 0; j != n; j = j + 1) {");
    }

    #[test]
    fn test_reverses_strict_bound() {
        let body = normalized(
            "int f(int n) { int s = 0; for (int i = n; i > 0; i--) { s = s + 2; } return s; }",
        );
        assert_eq!(loop_header(&body), "for (i = 0; i < n; i = i + 1) {");
    }

    #[test]
    fn test_counter_read_in_body() {
        let body = normalized(
            "int f(int n) { int s = 0; for (int i = n; i != 0; i--) { s = s + i; } return s; }",
        );
        assert_eq!(loop_header(&body), "for (i = n; i != 0; i = i - 1) {");
    }

    #[test]
    fn test_counter_used_after_loop() {
        let body = normalized(
            "int f(int n) { int s = 0; int i; for (i = n; i != 0; i--) { s = s + 1; } return s + i; }",
        );
        assert_eq!(loop_header(&body), "for (i = n; i != 0; i = i - 1) {");
    }

    #[test]
    fn test_body_writes_bound() {
        let body = normalized(
            "int f(int n, int m) { int s = 0; for (int i = n; i != m; i--) { m = m + 1; s = s + m; } return s; }",
        );
        assert_eq!(loop_header(&body), "for (i = n; i != m; i = i - 1) {");
    }

    #[test]
    fn test_narrow_counter_kept() {
        let body = normalized(
            "int f(long n) { int s = 0; for (char j = n; j != 0; --j) { s = s + 1; } return s; }",
        );
        assert_eq!(loop_header(&body), "for (j = n; j != 0; j = j - 1) {");

        let body = normalized(
            "int f(long n) { int s = 0; for (long j = n; j != 0; --j) { s = s + 1; } return s; }",
        );
        assert_eq!(loop_header(&body), "for (j = 0; j != n; j = j + 1) {");
    }

    #[test]
    fn test_counting_up_untouched() {
        let body = normalized(
            "int f(int n) { int s = 0; for (int i = 0; i != n; i++) { s = s + 2; } return s; }",
        );
        assert_eq!(loop_header(&body), "for (i = 0; i != n; i = i + 1) {");
    }
}
