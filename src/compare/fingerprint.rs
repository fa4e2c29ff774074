//! Structural fingerprints
//!
//! A fingerprint is a 64-bit FxHash over a node's tag byte, its operator,
//! literal value, names and types, followed by the fingerprints of its
//! children in order. Source locations never participate, so two trees have
//! equal fingerprints whenever they are `same_as` (and, barring collisions,
//! only then).

use crate::parser::ast::*;
use rustc_hash::FxHasher;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Fingerprint of a node or a whole program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(pub u64);

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

mod tags {
    pub const PROGRAM: u8 = 0x00;
    pub const FUNCTION: u8 = 0x01;
    pub const VAR_DECL: u8 = 0x02;
    pub const ASSIGN: u8 = 0x03;
    pub const BINARY: u8 = 0x04;
    pub const UNARY: u8 = 0x05;
    pub const INT_LIT: u8 = 0x06;
    pub const STR_LIT: u8 = 0x07;
    pub const IDENT: u8 = 0x08;
    pub const FOR: u8 = 0x09;
    pub const IF: u8 = 0x0a;
    pub const RETURN: u8 = 0x0b;
    pub const BLOCK: u8 = 0x0c;
    pub const CALL: u8 = 0x0d;
}

fn write_child(hasher: &mut FxHasher, child: &AstNode) {
    hasher.write_u64(fingerprint(child).0);
}

fn write_optional(hasher: &mut FxHasher, child: Option<&AstNode>) {
    match child {
        Some(child) => {
            hasher.write_u8(1);
            write_child(hasher, child);
        }
        None => hasher.write_u8(0),
    }
}

fn write_list(hasher: &mut FxHasher, children: &[AstNode]) {
    hasher.write_usize(children.len());
    for child in children {
        write_child(hasher, child);
    }
}

/// Fingerprint of a single node and everything below it.
pub fn fingerprint(node: &AstNode) -> Fingerprint {
    let mut hasher = FxHasher::default();
    match node {
        AstNode::FunctionDecl {
            name,
            return_type,
            params,
            body,
            ..
        } => {
            hasher.write_u8(tags::FUNCTION);
            name.hash(&mut hasher);
            return_type.hash(&mut hasher);
            hasher.write_usize(params.len());
            for param in params {
                param.name.hash(&mut hasher);
                param.param_type.hash(&mut hasher);
            }
            write_child(&mut hasher, body);
        }
        AstNode::VarDecl {
            name,
            var_type,
            init,
            ..
        } => {
            hasher.write_u8(tags::VAR_DECL);
            name.hash(&mut hasher);
            var_type.hash(&mut hasher);
            write_optional(&mut hasher, init.as_deref());
        }
        AstNode::Assign { target, value, .. } => {
            hasher.write_u8(tags::ASSIGN);
            target.hash(&mut hasher);
            write_child(&mut hasher, value);
        }
        AstNode::BinaryOp {
            op, left, right, ..
        } => {
            hasher.write_u8(tags::BINARY);
            op.hash(&mut hasher);
            write_child(&mut hasher, left);
            write_child(&mut hasher, right);
        }
        AstNode::UnaryOp { op, operand, .. } => {
            hasher.write_u8(tags::UNARY);
            op.hash(&mut hasher);
            write_child(&mut hasher, operand);
        }
        AstNode::Literal(Literal::Int(value), _) => {
            hasher.write_u8(tags::INT_LIT);
            hasher.write_i64(*value);
        }
        AstNode::Literal(Literal::Str(value), _) => {
            hasher.write_u8(tags::STR_LIT);
            value.hash(&mut hasher);
        }
        AstNode::Identifier(name, _) => {
            hasher.write_u8(tags::IDENT);
            name.hash(&mut hasher);
        }
        AstNode::ForLoop {
            init,
            condition,
            step,
            body,
            ..
        } => {
            hasher.write_u8(tags::FOR);
            write_optional(&mut hasher, init.as_deref());
            write_optional(&mut hasher, condition.as_deref());
            write_optional(&mut hasher, step.as_deref());
            write_child(&mut hasher, body);
        }
        AstNode::If {
            condition,
            then_branch,
            else_branch,
            ..
        } => {
            hasher.write_u8(tags::IF);
            write_child(&mut hasher, condition);
            write_child(&mut hasher, then_branch);
            write_optional(&mut hasher, else_branch.as_deref());
        }
        AstNode::Return { value, .. } => {
            hasher.write_u8(tags::RETURN);
            write_optional(&mut hasher, value.as_deref());
        }
        AstNode::Block { statements, .. } => {
            hasher.write_u8(tags::BLOCK);
            write_list(&mut hasher, statements);
        }
        AstNode::Call { name, args, .. } => {
            hasher.write_u8(tags::CALL);
            name.hash(&mut hasher);
            write_list(&mut hasher, args);
        }
    }
    Fingerprint(hasher.finish())
}

/// Fingerprint of a whole program: its top-level nodes in order.
pub fn program_fingerprint(program: &Program) -> Fingerprint {
    let mut hasher = FxHasher::default();
    hasher.write_u8(tags::PROGRAM);
    write_list(&mut hasher, &program.nodes);
    Fingerprint(hasher.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse::Parser;

    fn program(source: &str) -> Program {
        Parser::new(source).unwrap().parse_program().unwrap()
    }

    #[test]
    fn test_locations_ignored() {
        let a = program("int f(int x) { return x + 1; }");
        let b = program("int f(int x)\n{\n\n    return x   +   1;\n}");
        assert_eq!(program_fingerprint(&a), program_fingerprint(&b));
    }

    #[test]
    fn test_literal_spelling_ignored() {
        let a = program("int f() { return 0x10; }");
        let b = program("int f() { return 16; }");
        assert_eq!(program_fingerprint(&a), program_fingerprint(&b));
    }

    #[test]
    fn test_differences_detected() {
        let base = program_fingerprint(&program("int f(int x) { return x + 1; }"));
        for other in [
            "int f(int x) { return x - 1; }",
            "int f(int x) { return x + 2; }",
            "int f(int y) { return y + 1; }",
            "long f(int x) { return x + 1; }",
            "int f(unsigned int x) { return x + 1; }",
            "int g(int x) { return x + 1; }",
        ] {
            assert_ne!(base, program_fingerprint(&program(other)), "{other}");
        }
    }

    #[test]
    fn test_display_is_hex() {
        assert_eq!(Fingerprint(0xdead).to_string(), "000000000000dead");
    }
}
