//! C source rendering for the AST
//!
//! `Display` for [`Program`], [`AstNode`] and [`Type`] prints source that the
//! parser accepts again and that parses back to the same tree (up to the
//! folding of negative literals, which print as `-N`). Parentheses are emitted
//! only where operator precedence requires them.

use crate::parser::ast::*;
use std::fmt::{self, Write};

const INDENT: &str = "    ";

/// Binding strength of an expression node, for parenthesization.
fn precedence(node: &AstNode) -> u8 {
    match node {
        AstNode::Assign { .. } => 0,
        AstNode::BinaryOp { op, .. } => op.precedence(),
        AstNode::UnaryOp { op, .. } => match op {
            UnOp::PostInc | UnOp::PostDec => 13,
            _ => 12,
        },
        AstNode::Literal(Literal::Int(n), _) if *n < 0 => 12,
        _ => 14,
    }
}

impl fmt::Display for BaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BaseType::Void => "void",
            BaseType::Char => "char",
            BaseType::Short => "short",
            BaseType::Int => "int",
            BaseType::Long => "long",
            BaseType::LongLong => "long long",
        })
    }
}

impl Type {
    /// The type without its pointer stars, e.g. `const unsigned long`.
    fn write_specifiers(&self, f: &mut impl Write) -> fmt::Result {
        if self.is_const {
            f.write_str("const ")?;
        }
        if !self.signed {
            f.write_str("unsigned ")?;
        }
        write!(f, "{}", self.base)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_specifiers(f)?;
        for _ in 0..self.pointer_depth {
            f.write_char('*')?;
        }
        Ok(())
    }
}

fn write_escaped(f: &mut impl Write, s: &str) -> fmt::Result {
    f.write_char('"')?;
    for ch in s.chars() {
        match ch {
            '\n' => f.write_str("\\n")?,
            '\t' => f.write_str("\\t")?,
            '\r' => f.write_str("\\r")?,
            '\\' => f.write_str("\\\\")?,
            '"' => f.write_str("\\\"")?,
            '\0' => f.write_str("\\0")?,
            c if c.is_ascii_graphic() || c == ' ' => f.write_char(c)?,
            c => write!(f, "\\x{:02x}", c as u32 & 0xff)?,
        }
    }
    f.write_char('"')
}

/// Write `node` as an expression, wrapped in parentheses when it binds
/// looser than `min`.
fn write_operand(f: &mut impl Write, node: &AstNode, min: u8) -> fmt::Result {
    if precedence(node) < min {
        f.write_char('(')?;
        write_expr(f, node)?;
        f.write_char(')')
    } else {
        write_expr(f, node)
    }
}

fn write_expr(f: &mut impl Write, node: &AstNode) -> fmt::Result {
    match node {
        AstNode::Literal(Literal::Int(n), _) => write!(f, "{}", n),
        AstNode::Literal(Literal::Str(s), _) => write_escaped(f, s),
        AstNode::Identifier(name, _) => f.write_str(name),
        AstNode::BinaryOp {
            op, left, right, ..
        } => {
            let prec = op.precedence();
            write_operand(f, left, prec)?;
            write!(f, " {} ", op.symbol())?;
            // Left-associative: an equal-precedence right operand needs parens
            write_operand(f, right, prec + 1)
        }
        AstNode::UnaryOp { op, operand, .. } => match op {
            UnOp::PostInc | UnOp::PostDec => {
                write_operand(f, operand, 13)?;
                f.write_str(op.symbol())
            }
            _ => {
                f.write_str(op.symbol())?;
                // Avoid `--x` / `++x` / `&&x` when nesting unary operators
                let nested = matches!(operand.as_ref(), AstNode::UnaryOp { .. })
                    || operand.as_int().is_some_and(|n| n < 0);
                if nested {
                    f.write_char('(')?;
                    write_expr(f, operand)?;
                    f.write_char(')')
                } else {
                    write_operand(f, operand, 12)
                }
            }
        },
        AstNode::Assign { target, value, .. } => {
            write!(f, "{} = ", target)?;
            write_operand(f, value, 0)
        }
        AstNode::Call { name, args, .. } => {
            write!(f, "{}(", name)?;
            for (i, arg) in args.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write_operand(f, arg, 1)?;
            }
            f.write_char(')')
        }
        // Statement forms in expression position only occur in `for` headers
        AstNode::VarDecl { .. } | AstNode::Block { .. } => write_declarations(f, node),
        AstNode::FunctionDecl { .. }
        | AstNode::ForLoop { .. }
        | AstNode::If { .. }
        | AstNode::Return { .. } => write_statement(f, node, 0),
    }
}

/// `int a = 1, *p` for a declaration or a block of declarations.
fn write_declarations(f: &mut impl Write, node: &AstNode) -> fmt::Result {
    for (i, decl) in node.statements().iter().enumerate() {
        let AstNode::VarDecl {
            name,
            var_type,
            init,
            ..
        } = decl
        else {
            return write_expr(f, decl);
        };
        if i == 0 {
            var_type.write_specifiers(f)?;
            f.write_char(' ')?;
        } else {
            f.write_str(", ")?;
        }
        for _ in 0..var_type.pointer_depth {
            f.write_char('*')?;
        }
        f.write_str(name)?;
        if let Some(init) = init {
            f.write_str(" = ")?;
            write_operand(f, init, 1)?;
        }
    }
    Ok(())
}

fn write_indent(f: &mut impl Write, indent: usize) -> fmt::Result {
    for _ in 0..indent {
        f.write_str(INDENT)?;
    }
    Ok(())
}

/// Body of an `if`/`for`: blocks open on the same line, anything else is
/// indented on its own line.
fn write_body(f: &mut impl Write, body: &AstNode, indent: usize) -> fmt::Result {
    if let AstNode::Block { .. } = body {
        f.write_char(' ')?;
        write_block(f, body, indent)
    } else {
        f.write_char('\n')?;
        write_indent(f, indent + 1)?;
        write_statement(f, body, indent + 1)
    }
}

fn write_block(f: &mut impl Write, block: &AstNode, indent: usize) -> fmt::Result {
    f.write_str("{\n")?;
    for statement in block.statements() {
        write_indent(f, indent + 1)?;
        write_statement(f, statement, indent + 1)?;
        f.write_char('\n')?;
    }
    write_indent(f, indent)?;
    f.write_char('}')
}

/// Write a statement; the caller has already indented the first line.
fn write_statement(f: &mut impl Write, node: &AstNode, indent: usize) -> fmt::Result {
    match node {
        AstNode::FunctionDecl {
            name,
            return_type,
            params,
            body,
            ..
        } => {
            write!(f, "{} {}(", return_type, name)?;
            for (i, param) in params.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{} {}", param.param_type, param.name)?;
            }
            f.write_str(")\n")?;
            write_indent(f, indent)?;
            write_block(f, body, indent)
        }
        AstNode::VarDecl { .. } => {
            write_declarations(f, node)?;
            f.write_char(';')
        }
        AstNode::Block { .. } => write_block(f, node, indent),
        AstNode::If {
            condition,
            then_branch,
            else_branch,
            ..
        } => {
            f.write_str("if (")?;
            write_expr(f, condition)?;
            f.write_char(')')?;
            write_body(f, then_branch, indent)?;
            if let Some(else_branch) = else_branch {
                if let AstNode::Block { .. } = then_branch.as_ref() {
                    f.write_char(' ')?;
                } else {
                    f.write_char('\n')?;
                    write_indent(f, indent)?;
                }
                f.write_str("else")?;
                write_body(f, else_branch, indent)?;
            }
            Ok(())
        }
        AstNode::ForLoop {
            init: None,
            condition: Some(condition),
            step: None,
            body,
            ..
        } => {
            f.write_str("while (")?;
            write_expr(f, condition)?;
            f.write_char(')')?;
            write_body(f, body, indent)
        }
        AstNode::ForLoop {
            init,
            condition,
            step,
            body,
            ..
        } => {
            f.write_str("for (")?;
            if let Some(init) = init {
                write_expr(f, init)?;
            }
            f.write_char(';')?;
            if let Some(condition) = condition {
                f.write_char(' ')?;
                write_expr(f, condition)?;
            }
            f.write_char(';')?;
            if let Some(step) = step {
                f.write_char(' ')?;
                write_expr(f, step)?;
            }
            f.write_char(')')?;
            write_body(f, body, indent)
        }
        AstNode::Return { value, .. } => match value {
            Some(value) => {
                f.write_str("return ")?;
                write_expr(f, value)?;
                f.write_char(';')
            }
            None => f.write_str("return;"),
        },
        AstNode::Assign { .. }
        | AstNode::BinaryOp { .. }
        | AstNode::UnaryOp { .. }
        | AstNode::Literal(..)
        | AstNode::Identifier(..)
        | AstNode::Call { .. } => {
            write_expr(f, node)?;
            f.write_char(';')
        }
    }
}

/// Render `node` as a statement: expressions get their trailing `;`.
pub fn statement_to_string(node: &AstNode) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail
    let _ = write_statement(&mut out, node, 0);
    out
}

impl fmt::Display for AstNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AstNode::Assign { .. }
            | AstNode::BinaryOp { .. }
            | AstNode::UnaryOp { .. }
            | AstNode::Literal(..)
            | AstNode::Identifier(..)
            | AstNode::Call { .. } => write_expr(f, self),
            _ => write_statement(f, self, 0),
        }
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, node) in self.nodes.iter().enumerate() {
            if i > 0 {
                f.write_char('\n')?;
            }
            write_statement(f, node, 0)?;
            f.write_char('\n')?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::parser::ast::*;
    use crate::parser::parse::Parser;
    use pretty_assertions::assert_eq;

    fn parse(source: &str) -> Program {
        Parser::new(source).unwrap().parse_program().unwrap()
    }

    #[test]
    fn test_prints_function() {
        let program = parse(
            "unsigned long fib(unsigned long n) { int a = 1, b = 1, c; \
             for (int j = 0; j != n; ++j) { c = a + b; a = b; b = c; } return c; }",
        );
        let expected = "\
unsigned long fib(unsigned long n)
{
    int a = 1;
    int b = 1;
    int c;
    for (int j = 0; j != n; ++j) {
        c = a + b;
        a = b;
        b = c;
    }
    return c;
}
";
        assert_eq!(program.to_string(), expected);
    }

    #[test]
    fn test_parenthesizes_only_where_needed() {
        let program = parse(
            "int f(int a, int b, int c, int d) { return (d + 5 & 6 + c - a) ^ b; }",
        );
        let AstNode::FunctionDecl { body, .. } = &program.nodes[0] else {
            panic!("Expected function");
        };
        assert_eq!(body.statements()[0].to_string(), "return d + 5 & 6 + c - a ^ b;");

        let program = parse("int f(int a, int b, int c) { return a - (b - c) * -(-a); }");
        let AstNode::FunctionDecl { body, .. } = &program.nodes[0] else {
            panic!("Expected function");
        };
        assert_eq!(body.statements()[0].to_string(), "return a - (b - c) * -(-a);");
    }

    #[test]
    fn test_output_reparses_to_same_tree() {
        let source = "int main() { int n = 20; while (n > 0) n -= 1; \
                      if (n == 0) { printf(\"%d\\n\", n); } else n = 1; return 0; }";
        let program = parse(source);
        let reparsed = parse(&program.to_string());
        assert!(program.same_as(&reparsed));
    }

    #[test]
    fn test_type_display() {
        let ty = Type::new(BaseType::LongLong).with_unsigned().with_const().with_pointer();
        assert_eq!(ty.to_string(), "const unsigned long long*");
    }
}
