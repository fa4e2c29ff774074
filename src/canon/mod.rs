//! Canonicalization pipeline
//!
//! Rewrites a parsed [`Program`] into a canonical form in which programs that
//! differ only by declaration style, redundant arithmetic, dead stores, loop
//! direction or variable names become structurally identical.
//!
//! Passes run per function, in order:
//! 1. [`flatten`]: scope resolution, declaration hoisting, statement lowering
//! 2. [`fold`]: constant folding and algebraic simplification
//! 3. [`dse`]: dead-store elimination
//! 4. [`loops`]: loop direction normalization
//! 5. [`rename`]: variables become `v<slot>`
//!
//! Each pass is a `Program → Program` rewrite exposed as `run`.

pub mod dse;
pub mod flatten;
pub mod fold;
pub mod loops;
pub mod rename;

use crate::engine::CompareOptions;
use crate::parser::ast::*;
use thiserror::Error;
use tracing::debug;

/// Errors raised while canonicalizing a program.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CanonicalizationError {
    #[error(
        "Undeclared identifier '{name}' at line {}, column {}",
        .location.line,
        .location.column
    )]
    UndeclaredIdentifier {
        name: String,
        location: SourceLocation,
    },

    #[error("Redeclaration of '{name}' at line {}, column {}", .location.line, .location.column)]
    Redeclaration {
        name: String,
        location: SourceLocation,
    },

    #[error(
        "Side effect inside an expression ({construct}) at line {}, column {}",
        .location.line,
        .location.column
    )]
    EmbeddedSideEffect {
        construct: String,
        location: SourceLocation,
    },

    #[error(
        "Expression nested deeper than {limit} levels at line {}, column {}",
        .location.line,
        .location.column
    )]
    TooDeep {
        limit: usize,
        location: SourceLocation,
    },

    #[error("{pass} did not reach a fixed point in '{function}' within {limit} iterations")]
    FixedPointCapExceeded {
        pass: &'static str,
        function: String,
        limit: usize,
    },
}

/// A function definition taken apart for rewriting.
#[derive(Debug, Clone)]
pub(crate) struct Function {
    pub name: String,
    pub return_type: Type,
    pub params: Vec<Param>,
    pub body: Vec<AstNode>,
    pub body_location: SourceLocation,
    pub location: SourceLocation,
}

impl Function {
    /// Take a `FunctionDecl` apart; any other node is handed back.
    pub fn from_node(node: AstNode) -> Result<Function, AstNode> {
        match node {
            AstNode::FunctionDecl {
                name,
                return_type,
                params,
                body,
                location,
            } => {
                let body_location = body.location();
                let body = match *body {
                    AstNode::Block { statements, .. } => statements,
                    other => vec![other],
                };
                Ok(Function {
                    name,
                    return_type,
                    params,
                    body,
                    body_location,
                    location,
                })
            }
            other => Err(other),
        }
    }

    pub fn into_node(self) -> AstNode {
        AstNode::FunctionDecl {
            name: self.name,
            return_type: self.return_type,
            params: self.params,
            body: Box::new(AstNode::block(self.body, self.body_location)),
            location: self.location,
        }
    }
}

/// Apply `pass` to every function of `program`, leaving other nodes as they are.
pub(crate) fn map_functions<F>(
    program: Program,
    mut pass: F,
) -> Result<Program, CanonicalizationError>
where
    F: FnMut(Function) -> Result<Function, CanonicalizationError>,
{
    let nodes = program
        .nodes
        .into_iter()
        .map(|node| match Function::from_node(node) {
            Ok(function) => pass(function).map(Function::into_node),
            Err(other) => Ok(other),
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Program { nodes })
}

/// Rewrite every statement list reachable from `body` (nested blocks, branch
/// and loop bodies included), innermost first.
pub(crate) fn rewrite_blocks<F>(body: Vec<AstNode>, f: &mut F) -> Vec<AstNode>
where
    F: FnMut(Vec<AstNode>) -> Vec<AstNode>,
{
    let inner = body
        .into_iter()
        .map(|stmt| match stmt {
            AstNode::Block {
                statements,
                location,
            } => AstNode::block(rewrite_blocks(statements, f), location),
            AstNode::If {
                condition,
                then_branch,
                else_branch,
                location,
            } => AstNode::If {
                condition,
                then_branch: Box::new(rewrite_block_node(*then_branch, f)),
                else_branch: else_branch.map(|e| Box::new(rewrite_block_node(*e, f))),
                location,
            },
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
                body: Box::new(rewrite_block_node(*body, f)),
                location,
            },
            other => other,
        })
        .collect();
    f(inner)
}

fn rewrite_block_node<F>(node: AstNode, f: &mut F) -> AstNode
where
    F: FnMut(Vec<AstNode>) -> Vec<AstNode>,
{
    let location = node.location();
    let statements = match node {
        AstNode::Block { statements, .. } => statements,
        other => vec![other],
    };
    AstNode::block(rewrite_blocks(statements, f), location)
}

/// Run the full pipeline over `program`.
pub fn canonicalize_program(
    program: Program,
    options: &CompareOptions,
) -> Result<Program, CanonicalizationError> {
    let program = flatten::run(program)?;
    let program = fold::run(program, options)?;
    let program = dse::run(program, options)?;
    let program = loops::run(program)?;
    let program = rename::run(program)?;
    debug!(functions = program.nodes.len(), "canonicalization finished");
    Ok(program)
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::parser::ast::*;
    use crate::parser::parse::Parser;
    use crate::parser::printer::statement_to_string;

    pub fn parse(source: &str) -> Program {
        Parser::new(source)
            .and_then(|mut p| p.parse_program())
            .unwrap_or_else(|e| panic!("{e}\n{source}"))
    }

    /// Body statements of the first function.
    pub fn body(program: &Program) -> &[AstNode] {
        match &program.nodes[0] {
            AstNode::FunctionDecl { body, .. } => body.statements(),
            other => panic!("Expected function, got {:?}", other),
        }
    }

    /// Printed body statements of the first function, one per entry.
    pub fn printed(program: &Program) -> Vec<String> {
        body(program).iter().map(statement_to_string).collect()
    }
}
