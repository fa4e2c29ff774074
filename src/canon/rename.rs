//! Pass 5: identifier canonicalization
//!
//! Parameters take slots `0..p` and hoisted locals follow in declaration
//! order; every variable is renamed `v<slot>`. Function names are left alone.

use super::{map_functions, CanonicalizationError, Function};
use crate::parser::ast::*;
use rustc_hash::FxHashMap;
use tracing::debug;

pub fn run(program: Program) -> Result<Program, CanonicalizationError> {
    map_functions(program, |function| Ok(rename_function(function)))
}

fn slot_name(slot: usize) -> String {
    format!("v{}", slot)
}

fn rename_function(function: Function) -> Function {
    let mut slots: FxHashMap<String, String> = FxHashMap::default();
    for param in &function.params {
        let slot = slot_name(slots.len());
        slots.insert(param.name.clone(), slot);
    }
    for stmt in &function.body {
        if let AstNode::VarDecl { name, .. } = stmt {
            let slot = slot_name(slots.len());
            slots.entry(name.clone()).or_insert(slot);
        }
    }
    debug!(function = %function.name, slots = slots.len(), "assigned variable slots");

    let params = function
        .params
        .into_iter()
        .map(|param| Param {
            name: renamed(&slots, param.name),
            ..param
        })
        .collect();
    let body = function
        .body
        .into_iter()
        .map(|stmt| rename(stmt, &slots))
        .collect();

    Function {
        params,
        body,
        ..function
    }
}

fn renamed(slots: &FxHashMap<String, String>, name: String) -> String {
    slots.get(&name).cloned().unwrap_or(name)
}

fn rename(node: AstNode, slots: &FxHashMap<String, String>) -> AstNode {
    let boxed = |node: Box<AstNode>| Box::new(rename(*node, slots));
    match node {
        AstNode::Identifier(name, location) => AstNode::Identifier(renamed(slots, name), location),
        literal @ AstNode::Literal(..) => literal,
        AstNode::VarDecl {
            name,
            var_type,
            init,
            location,
        } => AstNode::VarDecl {
            name: renamed(slots, name),
            var_type,
            init: init.map(boxed),
            location,
        },
        AstNode::Assign {
            target,
            value,
            location,
        } => AstNode::Assign {
            target: renamed(slots, target),
            value: boxed(value),
            location,
        },
        AstNode::BinaryOp {
            op,
            left,
            right,
            location,
        } => AstNode::BinaryOp {
            op,
            left: boxed(left),
            right: boxed(right),
            location,
        },
        AstNode::UnaryOp {
            op,
            operand,
            location,
        } => AstNode::UnaryOp {
            op,
            operand: boxed(operand),
            location,
        },
        AstNode::Call {
            name,
            args,
            location,
        } => AstNode::Call {
            name,
            args: args.into_iter().map(|a| rename(a, slots)).collect(),
            location,
        },
        AstNode::Return { value, location } => AstNode::Return {
            value: value.map(boxed),
            location,
        },
        AstNode::Block {
            statements,
            location,
        } => AstNode::block(
            statements.into_iter().map(|s| rename(s, slots)).collect(),
            location,
        ),
        AstNode::If {
            condition,
            then_branch,
            else_branch,
            location,
        } => AstNode::If {
            condition: boxed(condition),
            then_branch: boxed(then_branch),
            else_branch: else_branch.map(boxed),
            location,
        },
        AstNode::ForLoop {
            init,
            condition,
            step,
            body,
            location,
        } => AstNode::ForLoop {
            init: init.map(boxed),
            condition: condition.map(boxed),
            step: step.map(boxed),
            body: boxed(body),
            location,
        },
        // Functions don't nest
        decl @ AstNode::FunctionDecl { .. } => decl,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canon::test_support::{parse, printed};
    use crate::canon::flatten;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_slots_follow_declaration_order() {
        let program = flatten::run(parse(
            "int f(int n, int m) { int x = n; int y = m; return x + y; }",
        ))
        .unwrap();
        let program = run(program).unwrap();
        assert_eq!(
            printed(&program),
            vec!["int v2;", "int v3;", "v2 = v0;", "v3 = v1;", "return v2 + v3;"]
        );
        assert_eq!(
            program.to_string().lines().next(),
            Some("int f(int v0, int v1)")
        );
    }

    #[test]
    fn test_call_names_kept() {
        let program = flatten::run(parse("int f(int n) { return g(n); }")).unwrap();
        assert_eq!(printed(&run(program).unwrap()), vec!["return g(v0);"]);
    }

    #[test]
    fn test_names_do_not_matter() {
        let a = flatten::run(parse("int f(int n) { int a = n; return a; }")).unwrap();
        let b = flatten::run(parse("int f(int k) { int z = k; return z; }")).unwrap();
        assert!(run(a).unwrap().same_as(&run(b).unwrap()));
    }
}
