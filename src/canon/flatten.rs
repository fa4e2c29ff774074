//! Pass 1: declaration flattening
//!
//! - resolves identifiers against block scopes and gives shadowing
//!   declarations fresh names, so every variable in a function has one name;
//! - hoists every declaration to the top of the function as an
//!   initializer-less `VarDecl`, in source order, and turns initializers into
//!   assignments where the declaration stood;
//! - lowers statements: chained assignments are split, statement-level
//!   `++`/`--` become `x = x ± 1`, nested blocks are spliced into their parent,
//!   `if`/`for` bodies are always blocks and a `for` init holds at most one
//!   assignment.
//!
//! Assignments and increments nested inside larger expressions are rejected.

use super::{map_functions, CanonicalizationError, Function};
use crate::parser::ast::*;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

pub fn run(program: Program) -> Result<Program, CanonicalizationError> {
    map_functions(program, flatten_function)
}

fn flatten_function(function: Function) -> Result<Function, CanonicalizationError> {
    let mut flattener = Flattener::new(&function.params);
    let mut statements = Vec::new();
    for stmt in function.body {
        flattener.statement(stmt, &mut statements)?;
    }

    debug!(
        function = %function.name,
        hoisted = flattener.hoisted.len(),
        statements = statements.len(),
        "flattened declarations"
    );

    let mut body = flattener.hoisted;
    body.extend(statements);
    Ok(Function { body, ..function })
}

struct Flattener {
    /// Innermost scope last: source name → unique name
    scopes: Vec<FxHashMap<String, String>>,
    /// Every unique name handed out so far, parameters included
    taken: FxHashSet<String>,
    hoisted: Vec<AstNode>,
    /// Declared type of every unique name
    types: FxHashMap<String, Type>,
}

impl Flattener {
    fn new(params: &[Param]) -> Self {
        let mut scope = FxHashMap::default();
        let mut taken = FxHashSet::default();
        let mut types = FxHashMap::default();
        for param in params {
            scope.insert(param.name.clone(), param.name.clone());
            taken.insert(param.name.clone());
            types.insert(param.name.clone(), param.param_type.clone());
        }
        Flattener {
            scopes: vec![scope],
            taken,
            hoisted: Vec::new(),
            types,
        }
    }

    fn push_scope(&mut self) {
        self.scopes.push(FxHashMap::default());
    }

    fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    /// Bind `name` in the innermost scope and hoist its declaration.
    fn declare(
        &mut self,
        name: &str,
        var_type: Type,
        location: SourceLocation,
    ) -> Result<String, CanonicalizationError> {
        let innermost = self.scopes.len() - 1;
        if self.scopes[innermost].contains_key(name) {
            return Err(CanonicalizationError::Redeclaration {
                name: name.to_string(),
                location,
            });
        }

        let mut unique = name.to_string();
        let mut suffix = 1;
        while self.taken.contains(&unique) {
            unique = format!("{}_{}", name, suffix);
            suffix += 1;
        }
        self.taken.insert(unique.clone());
        self.types.insert(unique.clone(), var_type.clone());
        self.scopes[innermost].insert(name.to_string(), unique.clone());

        self.hoisted.push(AstNode::VarDecl {
            name: unique.clone(),
            var_type,
            init: None,
            location,
        });
        Ok(unique)
    }

    fn lookup(
        &self,
        name: &str,
        location: SourceLocation,
    ) -> Result<String, CanonicalizationError> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name))
            .cloned()
            .ok_or_else(|| CanonicalizationError::UndeclaredIdentifier {
                name: name.to_string(),
                location,
            })
    }

    /// Rename every variable reference inside `expr` to its unique name.
    fn resolve(&self, expr: AstNode) -> Result<AstNode, CanonicalizationError> {
        Ok(match expr {
            AstNode::Identifier(name, loc) => AstNode::Identifier(self.lookup(&name, loc)?, loc),
            literal @ AstNode::Literal(..) => literal,
            AstNode::Assign {
                target,
                value,
                location,
            } => AstNode::Assign {
                target: self.lookup(&target, location)?,
                value: Box::new(self.resolve(*value)?),
                location,
            },
            AstNode::BinaryOp {
                op,
                left,
                right,
                location,
            } => AstNode::BinaryOp {
                op,
                left: Box::new(self.resolve(*left)?),
                right: Box::new(self.resolve(*right)?),
                location,
            },
            AstNode::UnaryOp {
                op,
                operand,
                location,
            } => AstNode::UnaryOp {
                op,
                operand: Box::new(self.resolve(*operand)?),
                location,
            },
            AstNode::Call {
                name,
                args,
                location,
            } => AstNode::Call {
                name,
                args: args
                    .into_iter()
                    .map(|a| self.resolve(a))
                    .collect::<Result<_, _>>()?,
                location,
            },
            // Statements never reach expression position after parsing
            other => other,
        })
    }

    /// Lower one source statement, appending the results to `out`.
    fn statement(
        &mut self,
        stmt: AstNode,
        out: &mut Vec<AstNode>,
    ) -> Result<(), CanonicalizationError> {
        match stmt {
            AstNode::VarDecl {
                name,
                var_type,
                init,
                location,
            } => {
                let unique = self.declare(&name, var_type, location)?;
                if let Some(init) = init {
                    let value = self.resolve(*init)?;
                    lower_assignment(unique, value, location, &self.types, out)?;
                }
            }
            AstNode::Block { statements, .. } => {
                self.push_scope();
                for inner in statements {
                    self.statement(inner, out)?;
                }
                self.pop_scope();
            }
            AstNode::If {
                condition,
                then_branch,
                else_branch,
                location,
            } => {
                let condition = self.expression(*condition)?;
                let then_branch = self.branch(*then_branch)?;
                let else_branch = match else_branch {
                    Some(e) => Some(Box::new(self.branch(*e)?)),
                    None => None,
                };
                out.push(AstNode::If {
                    condition: Box::new(condition),
                    then_branch: Box::new(then_branch),
                    else_branch,
                    location,
                });
            }
            AstNode::ForLoop {
                init,
                condition,
                step,
                body,
                location,
            } => self.for_loop(init, condition, step, *body, location, out)?,
            AstNode::Return { value, location } => {
                let value = match value {
                    Some(v) => Some(Box::new(self.expression(*v)?)),
                    None => None,
                };
                out.push(AstNode::Return { value, location });
            }
            expr @ (AstNode::Assign { .. }
            | AstNode::BinaryOp { .. }
            | AstNode::UnaryOp { .. }
            | AstNode::Literal(..)
            | AstNode::Identifier(..)
            | AstNode::Call { .. }) => {
                let resolved = self.resolve(expr)?;
                lower_expression_statement(resolved, &self.types, out)?;
            }
            AstNode::FunctionDecl { name, location, .. } => {
                return Err(CanonicalizationError::EmbeddedSideEffect {
                    construct: format!("nested function '{}'", name),
                    location,
                });
            }
        }
        Ok(())
    }

    /// Resolve an expression that must be free of assignments and increments.
    fn expression(&self, expr: AstNode) -> Result<AstNode, CanonicalizationError> {
        let resolved = self.resolve(expr)?;
        reject_side_effects(&resolved)?;
        Ok(resolved)
    }

    /// Lower an `if`/`for` body in its own scope, always producing a block.
    fn branch(&mut self, body: AstNode) -> Result<AstNode, CanonicalizationError> {
        let location = body.location();
        let mut statements = Vec::new();
        self.push_scope();
        let result = self.statement(body, &mut statements);
        self.pop_scope();
        result?;
        Ok(AstNode::block(statements, location))
    }

    fn for_loop(
        &mut self,
        init: Option<Box<AstNode>>,
        condition: Option<Box<AstNode>>,
        step: Option<Box<AstNode>>,
        body: AstNode,
        location: SourceLocation,
        out: &mut Vec<AstNode>,
    ) -> Result<(), CanonicalizationError> {
        self.push_scope();
        let result = self.for_loop_in_scope(init, condition, step, body, location, out);
        self.pop_scope();
        result
    }

    fn for_loop_in_scope(
        &mut self,
        init: Option<Box<AstNode>>,
        condition: Option<Box<AstNode>>,
        step: Option<Box<AstNode>>,
        body: AstNode,
        location: SourceLocation,
        out: &mut Vec<AstNode>,
    ) -> Result<(), CanonicalizationError> {
        // Init: declarations are hoisted like any other; the last resulting
        // assignment stays in the header, everything before it runs first.
        let mut init_statements = Vec::new();
        if let Some(init) = init {
            match *init {
                AstNode::Block { statements, .. } => {
                    for decl in statements {
                        self.statement(decl, &mut init_statements)?;
                    }
                }
                other => self.statement(other, &mut init_statements)?,
            }
        }
        let init = match init_statements.pop() {
            Some(last @ AstNode::Assign { .. }) => Some(Box::new(last)),
            Some(other) => {
                init_statements.push(other);
                None
            }
            None => None,
        };
        out.extend(init_statements);

        let condition = match condition {
            Some(c) => Some(Box::new(self.expression(*c)?)),
            None => None,
        };

        let mut step_statements = Vec::new();
        if let Some(step) = step {
            let resolved = self.resolve(*step)?;
            lower_expression_statement(resolved, &self.types, &mut step_statements)?;
        }

        let mut body = self.branch(body)?;

        // A step that lowers to several statements runs at the end of the body
        let step = if step_statements.len() <= 1 {
            step_statements.pop().map(Box::new)
        } else {
            if let AstNode::Block { statements, .. } = &mut body {
                statements.extend(step_statements);
            }
            None
        };

        out.push(AstNode::ForLoop {
            init,
            condition,
            step,
            body: Box::new(body),
            location,
        });
        Ok(())
    }
}

/// Lower an expression in statement position.
fn lower_expression_statement(
    expr: AstNode,
    types: &FxHashMap<String, Type>,
    out: &mut Vec<AstNode>,
) -> Result<(), CanonicalizationError> {
    match expr {
        AstNode::Assign {
            target,
            value,
            location,
        } => lower_assignment(target, *value, location, types, out),
        AstNode::UnaryOp {
            op,
            operand,
            location,
        } if op.is_increment() => {
            let AstNode::Identifier(name, name_loc) = *operand else {
                return Err(CanonicalizationError::EmbeddedSideEffect {
                    construct: format!("'{}' applied to a non-variable", op.symbol()),
                    location,
                });
            };
            let delta = match op {
                UnOp::PreInc | UnOp::PostInc => BinOp::Add,
                _ => BinOp::Sub,
            };
            let value = AstNode::binary(
                delta,
                AstNode::ident(name.clone(), name_loc),
                AstNode::int(1, location),
                location,
            );
            out.push(AstNode::assign(name, value, location));
            Ok(())
        }
        other => {
            reject_side_effects(&other)?;
            out.push(other);
            Ok(())
        }
    }
}

/// Lower `target = value`, splitting assignment chains.
///
/// `a = b = e` becomes `a = e; b = e;` when `e` is pure, mentions none of
/// the targets and every target has the same type, and `b = e; a = b;`
/// otherwise. `a` receives `e` converted to `b`'s type, so targets of
/// different types always take the second form.
fn lower_assignment(
    target: String,
    value: AstNode,
    location: SourceLocation,
    types: &FxHashMap<String, Type>,
    out: &mut Vec<AstNode>,
) -> Result<(), CanonicalizationError> {
    let mut targets = vec![(target, location)];
    let mut value = value;
    while let AstNode::Assign {
        target,
        value: inner,
        location,
    } = value
    {
        targets.push((target, location));
        value = *inner;
    }
    reject_side_effects(&value)?;

    if targets.len() == 1 {
        let (target, location) = targets.remove(0);
        out.push(AstNode::assign(target, value, location));
        return Ok(());
    }

    let first_type = types.get(&targets[0].0);
    let same_type = targets.iter().all(|(t, _)| types.get(t) == first_type);
    let independent =
        same_type && value.is_pure() && targets.iter().all(|(t, _)| !value.mentions(t));
    if independent {
        for (target, location) in targets {
            out.push(AstNode::assign(target, value.clone(), location));
        }
    } else {
        let mut source = value;
        for (target, location) in targets.into_iter().rev() {
            let next = AstNode::ident(target.clone(), location);
            out.push(AstNode::assign(target, source, location));
            source = next;
        }
    }
    Ok(())
}

/// Fail on any assignment or increment inside `expr`.
fn reject_side_effects(expr: &AstNode) -> Result<(), CanonicalizationError> {
    match expr {
        AstNode::Assign { target, location, .. } => {
            Err(CanonicalizationError::EmbeddedSideEffect {
                construct: format!("assignment to '{}'", target),
                location: *location,
            })
        }
        AstNode::UnaryOp {
            op,
            operand,
            location,
        } => {
            if op.is_increment() {
                return Err(CanonicalizationError::EmbeddedSideEffect {
                    construct: format!("'{}' inside an expression", op.symbol()),
                    location: *location,
                });
            }
            reject_side_effects(operand)
        }
        AstNode::BinaryOp { left, right, .. } => {
            reject_side_effects(left)?;
            reject_side_effects(right)
        }
        AstNode::Call { args, .. } => args.iter().try_for_each(reject_side_effects),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canon::test_support::{parse, printed};
    use pretty_assertions::assert_eq;

    fn flatten(source: &str) -> Vec<String> {
        printed(&run(parse(source)).unwrap())
    }

    fn flatten_err(source: &str) -> CanonicalizationError {
        run(parse(source)).unwrap_err()
    }

    #[test]
    fn test_hoists_and_splits_initializers() {
        let body = flatten(
            "unsigned long fib(unsigned long n) { int a = 1, b = 1, c; \
             for (int j = 0; j != n; ++j) { c = a + b; a = b; b = c; } return c; }",
        );
        assert_eq!(
            body,
            vec![
                "int a;",
                "int b;",
                "int c;",
                "int j;",
                "a = 1;",
                "b = 1;",
                "for (j = 0; j != n; j = j + 1) {\n    c = a + b;\n    a = b;\n    b = c;\n}",
                "return c;",
            ]
        );
    }

    #[test]
    fn test_chained_assignment() {
        let body = flatten("int f() { int a; int b; a = b = 1; return a + b; }");
        assert_eq!(&body[2..4], &["a = 1;", "b = 1;"]);

        let body = flatten("int f(int x) { int a; int b; a = b = x + b; return a; }");
        assert_eq!(&body[2..4], &["b = x + b;", "a = b;"]);

        let body = flatten("int f(int x) { int a; int b; a = b = g(x); return a; }");
        assert_eq!(&body[2..4], &["b = g(x);", "a = b;"]);
    }

    #[test]
    fn test_chained_assignment_through_narrower_type() {
        // `a` gets 300 truncated to char, so it must read `b`
        let body = flatten("int f() { char b; int a; a = b = 300; return a; }");
        assert_eq!(&body[2..4], &["b = 300;", "a = b;"]);

        let body = flatten("int f() { long a; long b; a = b = 300; return a; }");
        assert_eq!(&body[2..4], &["a = 300;", "b = 300;"]);
    }

    #[test]
    fn test_shadowing_gets_fresh_names() {
        let body = flatten("int f(int x) { int y = x; { int x = 2; y = y + x; } return y + x; }");
        assert_eq!(
            body,
            vec!["int y;", "int x_1;", "y = x;", "x_1 = 2;", "y = y + x_1;", "return y + x;"]
        );
    }

    #[test]
    fn test_increments_and_bodies() {
        let body = flatten("int f(int n) { int i = 0; while (i < n) i++; if (n) --n; return i; }");
        assert_eq!(
            body,
            vec![
                "int i;",
                "i = 0;",
                "while (i < n) {\n    i = i + 1;\n}",
                "if (n) {\n    n = n - 1;\n}",
                "return i;",
            ]
        );
    }

    #[test]
    fn test_for_init_keeps_one_assignment() {
        let body = flatten(
            "int f(int n) { int s = 0; for (int i = 0, k = 1; i < n; i++) s = s + k; return s; }",
        );
        assert_eq!(
            body,
            vec![
                "int s;",
                "int i;",
                "int k;",
                "s = 0;",
                "i = 0;",
                "for (k = 1; i < n; i = i + 1) {\n    s = s + k;\n}",
                "return s;",
            ]
        );
    }

    #[test]
    fn test_errors() {
        assert!(matches!(
            flatten_err("int f() { return y; }"),
            CanonicalizationError::UndeclaredIdentifier { ref name, .. } if name == "y"
        ));
        assert!(matches!(
            flatten_err("int f() { int x = 1; int x = 2; return x; }"),
            CanonicalizationError::Redeclaration { .. }
        ));
        assert!(matches!(
            flatten_err("int f(int x) { int y = x++ + 1; return y; }"),
            CanonicalizationError::EmbeddedSideEffect { .. }
        ));
        assert!(matches!(
            flatten_err("int f(int x) { return (x = 2) + 1; }"),
            CanonicalizationError::EmbeddedSideEffect { .. }
        ));
        // Out of scope after the block closes
        assert!(matches!(
            flatten_err("int f() { { int t = 1; } return t; }"),
            CanonicalizationError::UndeclaredIdentifier { .. }
        ));
    }
}
