//! Pass 2: constant folding and algebraic simplification
//!
//! Rules, applied bottom-up until nothing changes:
//!
//! - operators on literals are evaluated with 64-bit wrapping arithmetic
//!   (division and remainder only by non-zero divisors, shifts only by 0..=63,
//!   comparisons and logical operators yield 0 or 1);
//! - `-(-x)`, `~(~x)` and `+x` collapse;
//! - additive chains made of pure terms are normalized: terms with opposite
//!   signs cancel, and the chain is rebuilt as positive terms, then negative
//!   terms, then one constant;
//! - identities: `x*1, x/1, x|0, x^0, x<<0, x>>0 → x` and, for pure `x`,
//!   `x*0, x&0, x%1, x^x → 0` and `x&x, x|x → x`;
//! - literals move to the right operand of commutative operators;
//! - `x > y` becomes `y < x` and `x >= y` becomes `y <= x` for pure operands.

use super::{map_functions, CanonicalizationError, Function};
use crate::engine::CompareOptions;
use crate::parser::ast::*;
use tracing::debug;

/// Deepest expression nesting the pass accepts.
pub const MAX_EXPRESSION_DEPTH: usize = 256;

pub fn run(program: Program, options: &CompareOptions) -> Result<Program, CanonicalizationError> {
    let cap = options.max_fixed_point_iterations;
    map_functions(program, |function| fold_function(function, cap))
}

fn fold_function(function: Function, cap: usize) -> Result<Function, CanonicalizationError> {
    for stmt in &function.body {
        check_depth(stmt, 0)?;
    }

    let mut body = function.body;
    let mut iterations = 0;
    loop {
        let next: Vec<AstNode> = body.iter().cloned().map(fold_statement).collect();
        let stable = next.len() == body.len() && next.iter().zip(&body).all(|(a, b)| a.same_as(b));
        body = next;
        iterations += 1;
        if stable {
            break;
        }
        if iterations >= cap {
            return Err(CanonicalizationError::FixedPointCapExceeded {
                pass: "constant folding",
                function: function.name,
                limit: cap,
            });
        }
    }

    debug!(function = %function.name, iterations, "folded constants");
    Ok(Function { body, ..function })
}

/// Reject expressions nested deeper than [`MAX_EXPRESSION_DEPTH`].
fn check_depth(node: &AstNode, depth: usize) -> Result<(), CanonicalizationError> {
    if depth > MAX_EXPRESSION_DEPTH {
        return Err(CanonicalizationError::TooDeep {
            limit: MAX_EXPRESSION_DEPTH,
            location: node.location(),
        });
    }
    let next = depth + 1;
    match node {
        AstNode::BinaryOp { left, right, .. } => {
            check_depth(left, next)?;
            check_depth(right, next)
        }
        AstNode::UnaryOp { operand, .. } => check_depth(operand, next),
        AstNode::Assign { value, .. } => check_depth(value, next),
        AstNode::Call { args, .. } => args.iter().try_for_each(|a| check_depth(a, next)),
        AstNode::VarDecl { init, .. } => init.iter().try_for_each(|i| check_depth(i, next)),
        AstNode::Return { value, .. } => value.iter().try_for_each(|v| check_depth(v, next)),
        AstNode::Block { statements, .. } => {
            statements.iter().try_for_each(|s| check_depth(s, depth))
        }
        AstNode::If {
            condition,
            then_branch,
            else_branch,
            ..
        } => {
            check_depth(condition, next)?;
            check_depth(then_branch, depth)?;
            else_branch.iter().try_for_each(|e| check_depth(e, depth))
        }
        AstNode::ForLoop {
            init,
            condition,
            step,
            body,
            ..
        } => {
            for part in [init, condition, step].into_iter().flatten() {
                check_depth(part, next)?;
            }
            check_depth(body, depth)
        }
        AstNode::FunctionDecl { body, .. } => check_depth(body, depth),
        AstNode::Literal(..) | AstNode::Identifier(..) => Ok(()),
    }
}

fn fold_boxed(node: Box<AstNode>) -> Box<AstNode> {
    Box::new(fold_statement(*node))
}

/// Fold every expression inside a statement.
fn fold_statement(stmt: AstNode) -> AstNode {
    match stmt {
        AstNode::Block {
            statements,
            location,
        } => AstNode::block(statements.into_iter().map(fold_statement).collect(), location),
        AstNode::If {
            condition,
            then_branch,
            else_branch,
            location,
        } => AstNode::If {
            condition: fold_boxed(condition),
            then_branch: fold_boxed(then_branch),
            else_branch: else_branch.map(fold_boxed),
            location,
        },
        AstNode::ForLoop {
            init,
            condition,
            step,
            body,
            location,
        } => AstNode::ForLoop {
            init: init.map(fold_boxed),
            condition: condition.map(fold_boxed),
            step: step.map(fold_boxed),
            body: fold_boxed(body),
            location,
        },
        AstNode::Return { value, location } => AstNode::Return {
            value: value.map(fold_boxed),
            location,
        },
        AstNode::VarDecl {
            name,
            var_type,
            init,
            location,
        } => AstNode::VarDecl {
            name,
            var_type,
            init: init.map(fold_boxed),
            location,
        },
        AstNode::FunctionDecl {
            name,
            return_type,
            params,
            body,
            location,
        } => AstNode::FunctionDecl {
            name,
            return_type,
            params,
            body: fold_boxed(body),
            location,
        },
        expr => fold_expr(expr),
    }
}

/// Fold one expression, children first.
pub fn fold_expr(expr: AstNode) -> AstNode {
    match expr {
        AstNode::BinaryOp {
            op,
            left,
            right,
            location,
        } => {
            let left = fold_expr(*left);
            let right = fold_expr(*right);
            simplify_binary(op, left, right, location)
        }
        AstNode::UnaryOp {
            op,
            operand,
            location,
        } => simplify_unary(op, fold_expr(*operand), location),
        AstNode::Assign {
            target,
            value,
            location,
        } => AstNode::assign(target, fold_expr(*value), location),
        AstNode::Call {
            name,
            args,
            location,
        } => AstNode::Call {
            name,
            args: args.into_iter().map(fold_expr).collect(),
            location,
        },
        other => other,
    }
}

/// Evaluate `left op right` on literals, or `None` when the operation has no
/// defined result (division by zero, oversized shift).
pub fn eval_binary(op: BinOp, l: i64, r: i64) -> Option<i64> {
    Some(match op {
        BinOp::Add => l.wrapping_add(r),
        BinOp::Sub => l.wrapping_sub(r),
        BinOp::Mul => l.wrapping_mul(r),
        BinOp::Div if r != 0 => l.wrapping_div(r),
        BinOp::Mod if r != 0 => l.wrapping_rem(r),
        BinOp::Div | BinOp::Mod => return None,
        BinOp::Eq => i64::from(l == r),
        BinOp::Ne => i64::from(l != r),
        BinOp::Lt => i64::from(l < r),
        BinOp::Le => i64::from(l <= r),
        BinOp::Gt => i64::from(l > r),
        BinOp::Ge => i64::from(l >= r),
        BinOp::And => i64::from(l != 0 && r != 0),
        BinOp::Or => i64::from(l != 0 || r != 0),
        BinOp::BitAnd => l & r,
        BinOp::BitOr => l | r,
        BinOp::BitXor => l ^ r,
        BinOp::BitShl if (0..64).contains(&r) => l.wrapping_shl(r as u32),
        BinOp::BitShr if (0..64).contains(&r) => l >> r,
        BinOp::BitShl | BinOp::BitShr => return None,
    })
}

fn simplify_unary(op: UnOp, operand: AstNode, location: SourceLocation) -> AstNode {
    if let Some(n) = operand.as_int() {
        match op {
            UnOp::Neg => return AstNode::int(n.wrapping_neg(), location),
            UnOp::BitNot => return AstNode::int(!n, location),
            UnOp::Not => return AstNode::int(i64::from(n == 0), location),
            UnOp::Plus => return AstNode::int(n, location),
            _ => {}
        }
    }

    match (op, operand) {
        (UnOp::Plus, inner) => inner,
        (
            UnOp::Neg,
            AstNode::UnaryOp {
                op: UnOp::Neg,
                operand: inner,
                ..
            },
        )
        | (
            UnOp::BitNot,
            AstNode::UnaryOp {
                op: UnOp::BitNot,
                operand: inner,
                ..
            },
        ) => *inner,
        (UnOp::Neg, operand @ AstNode::BinaryOp { op: BinOp::Add | BinOp::Sub, .. })
            if operand.is_pure() =>
        {
            normalize_chain(AstNode::UnaryOp {
                op: UnOp::Neg,
                operand: Box::new(operand),
                location,
            })
        }
        (op, operand) => AstNode::UnaryOp {
            op,
            operand: Box::new(operand),
            location,
        },
    }
}

fn simplify_binary(op: BinOp, left: AstNode, right: AstNode, location: SourceLocation) -> AstNode {
    if let (Some(l), Some(r)) = (left.as_int(), right.as_int()) {
        if let Some(value) = eval_binary(op, l, r) {
            return AstNode::int(value, location);
        }
    }

    if matches!(op, BinOp::Add | BinOp::Sub) && left.is_pure() && right.is_pure() {
        return normalize_chain(AstNode::binary(op, left, right, location));
    }

    let zero = || AstNode::int(0, location);

    match (op, left.as_int(), right.as_int()) {
        // x*1, 1*x, x/1, x|0, x^0, x<<0, x>>0
        (BinOp::Mul, _, Some(1)) | (BinOp::Div, _, Some(1)) => return left,
        (BinOp::Mul, Some(1), _) => return right,
        (BinOp::BitOr | BinOp::BitXor | BinOp::BitShl | BinOp::BitShr, _, Some(0)) => {
            return left
        }
        (BinOp::BitOr | BinOp::BitXor, Some(0), _) => return right,
        // x*0, 0*x, x&0, 0&x, x%1 for pure x
        (BinOp::Mul | BinOp::BitAnd, _, Some(0)) if left.is_pure() => return zero(),
        (BinOp::Mul | BinOp::BitAnd, Some(0), _) if right.is_pure() => return zero(),
        (BinOp::Mod, _, Some(1)) if left.is_pure() => return zero(),
        // Short circuit on a literal left operand
        (BinOp::And, Some(0), _) => return zero(),
        (BinOp::Or, Some(n), _) if n != 0 => return AstNode::int(1, location),
        _ => {}
    }

    if left.is_pure() && left.same_as(&right) {
        match op {
            BinOp::BitXor => return zero(),
            BinOp::BitAnd | BinOp::BitOr => return left,
            _ => {}
        }
    }

    // Literal to the right of commutative operators
    if op.is_commutative() && left.as_int().is_some() && right.as_int().is_none() {
        return AstNode::binary(op, right, left, location);
    }

    let pure = left.is_pure() && right.is_pure();
    match op {
        BinOp::Gt if pure => AstNode::binary(BinOp::Lt, right, left, location),
        BinOp::Ge if pure => AstNode::binary(BinOp::Le, right, left, location),
        _ => AstNode::binary(op, left, right, location),
    }
}

/// Signed terms of an additive chain plus its constant part.
struct Chain {
    terms: Vec<(bool, AstNode)>, // (negative, term)
    constant: i64,
}

impl Chain {
    fn collect(&mut self, node: AstNode, negative: bool) {
        match node {
            AstNode::BinaryOp {
                op: op @ (BinOp::Add | BinOp::Sub),
                left,
                right,
                ..
            } => {
                self.collect(*left, negative);
                self.collect(*right, negative ^ (op == BinOp::Sub));
            }
            AstNode::UnaryOp {
                op: UnOp::Neg,
                operand,
                ..
            } => self.collect(*operand, !negative),
            AstNode::UnaryOp {
                op: UnOp::Plus,
                operand,
                ..
            } => self.collect(*operand, negative),
            AstNode::Literal(Literal::Int(n), _) => {
                self.constant = if negative {
                    self.constant.wrapping_sub(n)
                } else {
                    self.constant.wrapping_add(n)
                };
            }
            term => self.terms.push((negative, term)),
        }
    }

    /// Drop pairs of identical terms with opposite signs.
    fn cancel(&mut self) {
        let mut kept: Vec<(bool, AstNode)> = Vec::with_capacity(self.terms.len());
        for (negative, term) in self.terms.drain(..) {
            let partner = kept
                .iter()
                .position(|(n, t)| *n != negative && t.same_as(&term));
            match partner {
                Some(index) => {
                    kept.remove(index);
                }
                None => kept.push((negative, term)),
            }
        }
        self.terms = kept;
    }

    fn rebuild(self, location: SourceLocation) -> AstNode {
        let (negatives, positives): (Vec<_>, Vec<_>) =
            self.terms.into_iter().partition(|(negative, _)| *negative);
        let mut constant_used = false;

        let mut acc: Option<AstNode> = None;
        for (_, term) in positives {
            acc = Some(match acc {
                None => term,
                Some(a) => AstNode::binary(BinOp::Add, a, term, location),
            });
        }
        if acc.is_none() && self.constant != 0 {
            acc = Some(AstNode::int(self.constant, location));
            constant_used = true;
        }
        for (_, term) in negatives {
            acc = Some(match acc {
                None => AstNode::UnaryOp {
                    op: UnOp::Neg,
                    operand: Box::new(term),
                    location,
                },
                Some(a) => AstNode::binary(BinOp::Sub, a, term, location),
            });
        }

        match acc {
            None => AstNode::int(self.constant, location),
            Some(a) if constant_used || self.constant == 0 => a,
            Some(a) if self.constant < 0 && self.constant != i64::MIN => AstNode::binary(
                BinOp::Sub,
                a,
                AstNode::int(self.constant.wrapping_neg(), location),
                location,
            ),
            Some(a) => {
                AstNode::binary(BinOp::Add, a, AstNode::int(self.constant, location), location)
            }
        }
    }
}

/// Normalize an additive chain. Every term must be pure.
fn normalize_chain(node: AstNode) -> AstNode {
    let location = node.location();
    let mut chain = Chain {
        terms: Vec::new(),
        constant: 0,
    };
    chain.collect(node, false);
    chain.cancel();
    chain.rebuild(location)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canon::test_support::{parse, printed};
    use pretty_assertions::assert_eq;

    /// Fold the expression returned by a one-line function.
    fn folded(expr: &str) -> String {
        let source = format!("int f(int a, int b, int c, int x, int y) {{ return {}; }}", expr);
        let program = run(parse(&source), &CompareOptions::default()).unwrap();
        let body = printed(&program);
        body[0]
            .trim_start_matches("return ")
            .trim_end_matches(';')
            .to_string()
    }

    #[test]
    fn test_literal_arithmetic() {
        assert_eq!(folded("2 + 3 * 4"), "14");
        assert_eq!(folded("7 / 2"), "3");
        assert_eq!(folded("-7 % 3"), "-1");
        assert_eq!(folded("1 << 4"), "16");
        assert_eq!(folded("3 < 4"), "1");
        assert_eq!(folded("!5"), "0");
        assert_eq!(folded("~0"), "-1");
        assert_eq!(folded("0xdead - 0xdead"), "0");
        // No folding for undefined operations
        assert_eq!(folded("1 / 0"), "1 / 0");
        assert_eq!(folded("1 << 64"), "1 << 64");
    }

    #[test]
    fn test_additive_chain() {
        assert_eq!(folded("a + b + 0xdead - 0xdead"), "a + b");
        assert_eq!(folded("a - b + c"), "a + c - b");
        assert_eq!(folded("x - x"), "0");
        assert_eq!(folded("a + 1 - 3"), "a - 2");
        assert_eq!(folded("-a + 3"), "3 - a");
        assert_eq!(folded("-a - b"), "-a - b");
        assert_eq!(folded("-(a - b)"), "b - a");
    }

    #[test]
    fn test_identities() {
        assert_eq!(folded("x * 1"), "x");
        assert_eq!(folded("1 * x"), "x");
        assert_eq!(folded("x / 1"), "x");
        assert_eq!(folded("x | 0"), "x");
        assert_eq!(folded("x ^ 0"), "x");
        assert_eq!(folded("x << 0"), "x");
        assert_eq!(folded("x * 0"), "0");
        assert_eq!(folded("x & 0"), "0");
        assert_eq!(folded("x % 1"), "0");
        assert_eq!(folded("x ^ x"), "0");
        assert_eq!(folded("x & x"), "x");
        assert_eq!(folded("-(-x)"), "x");
        assert_eq!(folded("~(~x)"), "x");
        assert_eq!(folded("+x"), "x");
        // Side effects are never dropped
        assert_eq!(folded("g(x) * 0"), "g(x) * 0");
    }

    #[test]
    fn test_orientation() {
        assert_eq!(folded("3 * x"), "x * 3");
        assert_eq!(folded("0 == x"), "x == 0");
        assert_eq!(folded("x > y"), "y < x");
        assert_eq!(folded("x >= 1"), "1 <= x");
        // Non-literal operands keep their order
        assert_eq!(folded("y * x"), "y * x");
    }

    #[test]
    fn test_folding_is_stable() {
        for expr in ["a + c - b", "3 - a", "-a - b", "a - 2", "y < x"] {
            assert_eq!(folded(expr), expr);
        }
    }

    #[test]
    fn test_too_deep() {
        let expr = format!("{}x", "~".repeat(300));
        let source = format!("int f(int x) {{ return {}; }}", expr);
        let err = run(parse(&source), &CompareOptions::default()).unwrap_err();
        assert!(matches!(err, CanonicalizationError::TooDeep { limit: 256, .. }));
    }
}
