//! Expression parsing implementation
//!
//! This module handles parsing of C expressions using one recursive-descent
//! level per precedence tier.
//!
//! # Supported Expressions
//!
//! - Literals: integers, characters (as integers), strings
//! - Identifiers and function calls on identifiers
//! - Binary operators: arithmetic, comparison, logical, bitwise
//! - Unary operators: `-`, `+`, `!`, `~`, `&`, `*`, `++`, `--`
//! - Postfix: `++`, `--`, `()`
//! - Assignment: `=` and the compound forms, which desugar to `x = x op (e)`
//!
//! Ternaries, casts, `sizeof`, subscripts and member access are rejected.
//!
//! # Precedence (low to high)
//!
//! ```text
//! assignment  = += -= *= /= %= &= |= ^= <<= >>=   (right-assoc)
//! ||  &&  |  ^  &  == !=  < <= > >=  << >>  + -  * / %
//! unary       - + ! ~ ++ -- & *
//! postfix     ++ -- ()
//! ```
//!
//! All parsing methods are implemented as `pub(crate)` methods on the [`Parser`] struct.

use crate::parser::ast::*;
use crate::parser::lexer::TokenKind;
use crate::parser::parse::{ParseError, Parser};

type Level = fn(&mut Parser) -> Result<AstNode, ParseError>;

impl Parser {
    /// Parse expression (top-level entry point)
    pub(crate) fn parse_expression(&mut self) -> Result<AstNode, ParseError> {
        self.parse_assignment()
    }

    /// Parse assignment (right-associative)
    pub(crate) fn parse_assignment(&mut self) -> Result<AstNode, ParseError> {
        let expr = self.parse_logical_or()?;

        if self.check(&TokenKind::Question) {
            return Err(self.error_here("Ternary expressions are not supported"));
        }

        let loc = self.current_location();
        let compound = match self.peek().kind {
            TokenKind::Eq => None,
            TokenKind::PlusEq => Some(BinOp::Add),
            TokenKind::MinusEq => Some(BinOp::Sub),
            TokenKind::StarEq => Some(BinOp::Mul),
            TokenKind::SlashEq => Some(BinOp::Div),
            TokenKind::PercentEq => Some(BinOp::Mod),
            TokenKind::AmpEq => Some(BinOp::BitAnd),
            TokenKind::PipeEq => Some(BinOp::BitOr),
            TokenKind::CaretEq => Some(BinOp::BitXor),
            TokenKind::LtLtEq => Some(BinOp::BitShl),
            TokenKind::GtGtEq => Some(BinOp::BitShr),
            _ => return Ok(expr),
        };
        self.advance();

        let (target, target_loc) = match expr {
            AstNode::Identifier(name, target_loc) => (name, target_loc),
            other => {
                return Err(ParseError::new(
                    "Assignment target must be a variable",
                    other.location(),
                ));
            }
        };

        let rhs = self.parse_assignment()?;
        let value = match compound {
            None => rhs,
            Some(op) => AstNode::binary(op, AstNode::ident(target.clone(), target_loc), rhs, loc),
        };

        Ok(AstNode::assign(target, value, loc))
    }

    /// One left-associative binary level: `next (op next)*`.
    fn parse_binary_level(
        &mut self,
        next: Level,
        ops: &[(TokenKind, BinOp)],
    ) -> Result<AstNode, ParseError> {
        let mut left = next(self)?;

        loop {
            let loc = self.current_location();
            let Some(op) = ops
                .iter()
                .find(|(kind, _)| self.check(kind))
                .map(|(_, op)| *op)
            else {
                break;
            };
            self.advance();

            let right = next(self)?;
            left = AstNode::binary(op, left, right, loc);
        }

        Ok(left)
    }

    /// Parse logical OR (||)
    fn parse_logical_or(&mut self) -> Result<AstNode, ParseError> {
        self.parse_binary_level(Self::parse_logical_and, &[(TokenKind::OrOr, BinOp::Or)])
    }

    /// Parse logical AND (&&)
    fn parse_logical_and(&mut self) -> Result<AstNode, ParseError> {
        self.parse_binary_level(Self::parse_bitwise_or, &[(TokenKind::AndAnd, BinOp::And)])
    }

    /// Parse bitwise OR (|)
    fn parse_bitwise_or(&mut self) -> Result<AstNode, ParseError> {
        self.parse_binary_level(Self::parse_bitwise_xor, &[(TokenKind::Pipe, BinOp::BitOr)])
    }

    /// Parse bitwise XOR (^)
    fn parse_bitwise_xor(&mut self) -> Result<AstNode, ParseError> {
        self.parse_binary_level(Self::parse_bitwise_and, &[(TokenKind::Caret, BinOp::BitXor)])
    }

    /// Parse bitwise AND (&)
    fn parse_bitwise_and(&mut self) -> Result<AstNode, ParseError> {
        self.parse_binary_level(Self::parse_equality, &[(TokenKind::Amp, BinOp::BitAnd)])
    }

    /// Parse equality (== !=)
    fn parse_equality(&mut self) -> Result<AstNode, ParseError> {
        self.parse_binary_level(
            Self::parse_relational,
            &[(TokenKind::EqEq, BinOp::Eq), (TokenKind::NotEq, BinOp::Ne)],
        )
    }

    /// Parse relational (< <= > >=)
    fn parse_relational(&mut self) -> Result<AstNode, ParseError> {
        self.parse_binary_level(
            Self::parse_shift,
            &[
                (TokenKind::Lt, BinOp::Lt),
                (TokenKind::Le, BinOp::Le),
                (TokenKind::Gt, BinOp::Gt),
                (TokenKind::Ge, BinOp::Ge),
            ],
        )
    }

    /// Parse bitwise shift (<< >>)
    fn parse_shift(&mut self) -> Result<AstNode, ParseError> {
        self.parse_binary_level(
            Self::parse_additive,
            &[(TokenKind::LtLt, BinOp::BitShl), (TokenKind::GtGt, BinOp::BitShr)],
        )
    }

    /// Parse additive (+ -)
    fn parse_additive(&mut self) -> Result<AstNode, ParseError> {
        self.parse_binary_level(
            Self::parse_multiplicative,
            &[(TokenKind::Plus, BinOp::Add), (TokenKind::Minus, BinOp::Sub)],
        )
    }

    /// Parse multiplicative (* / %)
    fn parse_multiplicative(&mut self) -> Result<AstNode, ParseError> {
        self.parse_binary_level(
            Self::parse_unary,
            &[
                (TokenKind::Star, BinOp::Mul),
                (TokenKind::Slash, BinOp::Div),
                (TokenKind::Percent, BinOp::Mod),
            ],
        )
    }

    /// Parse unary (! ~ - + & * ++ --)
    fn parse_unary(&mut self) -> Result<AstNode, ParseError> {
        let loc = self.current_location();

        let op = match self.peek().kind {
            TokenKind::Bang => UnOp::Not,
            TokenKind::Tilde => UnOp::BitNot,
            TokenKind::Minus => UnOp::Neg,
            TokenKind::Plus => UnOp::Plus,
            TokenKind::Amp => UnOp::AddrOf,
            TokenKind::Star => UnOp::Deref,
            TokenKind::PlusPlus => UnOp::PreInc,
            TokenKind::MinusMinus => UnOp::PreDec,
            TokenKind::Sizeof => return Err(self.error_here("'sizeof' is not supported")),
            _ => return self.parse_postfix(),
        };
        self.advance();

        let operand = self.parse_unary()?;
        Ok(AstNode::UnaryOp {
            op,
            operand: Box::new(operand),
            location: loc,
        })
    }

    /// Parse postfix (++ -- ())
    fn parse_postfix(&mut self) -> Result<AstNode, ParseError> {
        let mut expr = self.parse_primary()?;

        loop {
            let loc = self.current_location();

            if self.match_token(&TokenKind::PlusPlus) {
                expr = AstNode::UnaryOp {
                    op: UnOp::PostInc,
                    operand: Box::new(expr),
                    location: loc,
                };
            } else if self.match_token(&TokenKind::MinusMinus) {
                expr = AstNode::UnaryOp {
                    op: UnOp::PostDec,
                    operand: Box::new(expr),
                    location: loc,
                };
            } else if self.check(&TokenKind::LParen) {
                // Function call
                let AstNode::Identifier(name, name_loc) = expr else {
                    return Err(ParseError::new("Function call must be on identifier", loc));
                };
                self.advance();
                let args = self.parse_argument_list()?;
                self.expect_rparen("after function arguments")?;

                expr = AstNode::Call {
                    name,
                    args,
                    location: name_loc,
                };
            } else if self.check(&TokenKind::LBracket) {
                return Err(self.error_here("Arrays are not supported"));
            } else if self.check(&TokenKind::Dot) || self.check(&TokenKind::Arrow) {
                return Err(self.error_here("Struct member access is not supported"));
            } else {
                break;
            }
        }

        Ok(expr)
    }

    /// Parse argument list: (expr, expr, ...)
    fn parse_argument_list(&mut self) -> Result<Vec<AstNode>, ParseError> {
        let mut args = Vec::new();

        if self.check(&TokenKind::RParen) {
            return Ok(args);
        }

        loop {
            args.push(self.parse_assignment()?);

            if !self.match_token(&TokenKind::Comma) {
                break;
            }
        }

        Ok(args)
    }

    /// Parse primary (literals, variables, parenthesized expressions)
    fn parse_primary(&mut self) -> Result<AstNode, ParseError> {
        let token = self.peek().clone();
        let loc = token.location;

        match token.kind {
            TokenKind::IntLiteral(n) => {
                self.advance();
                Ok(AstNode::int(n, loc))
            }
            TokenKind::StringLiteral(s) => {
                self.advance();
                Ok(AstNode::Literal(Literal::Str(s), loc))
            }
            TokenKind::Ident => {
                self.advance();
                Ok(AstNode::Identifier(token.text, loc))
            }
            TokenKind::LParen => {
                self.advance();
                if self.is_type_keyword() {
                    return Err(self.error_here("Casts are not supported"));
                }
                let expr = self.parse_expression()?;
                self.expect_rparen("after expression")?;
                Ok(expr)
            }
            _ => Err(ParseError::new(
                format!("Unexpected token: {}", token),
                loc,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::parser::ast::*;
    use crate::parser::parse::Parser;

    /// Parse `source` as the value of `return` inside a function.
    fn expr(source: &str) -> AstNode {
        let text = format!("int f(int a, int b, int c, int d) {{ return {}; }}", source);
        let mut parser = Parser::new(&text).unwrap();
        let program = parser.parse_program().unwrap();
        let AstNode::FunctionDecl { body, .. } = &program.nodes[0] else {
            panic!("Expected function");
        };
        match &body.statements()[0] {
            AstNode::Return { value: Some(v), .. } => (**v).clone(),
            other => panic!("Expected return, got {:?}", other),
        }
    }

    fn statement(source: &str) -> AstNode {
        let text = format!("int f(int x, int y) {{ {} }}", source);
        let mut parser = Parser::new(&text).unwrap();
        let program = parser.parse_program().unwrap();
        let AstNode::FunctionDecl { body, .. } = &program.nodes[0] else {
            panic!("Expected function");
        };
        body.statements()[0].clone()
    }

    fn op(node: &AstNode) -> BinOp {
        match node {
            AstNode::BinaryOp { op, .. } => *op,
            other => panic!("Expected binary op, got {:?}", other),
        }
    }

    fn children(node: &AstNode) -> (&AstNode, &AstNode) {
        match node {
            AstNode::BinaryOp { left, right, .. } => (left, right),
            other => panic!("Expected binary op, got {:?}", other),
        }
    }

    #[test]
    fn test_precedence_of_mixed_bitwise_chain() {
        // ((d + 5) & ((6 + c) - a)) ^ b
        let e = expr("d + 5 & 6 + c - a^b");
        assert_eq!(op(&e), BinOp::BitXor);
        let (and, b) = children(&e);
        assert!(matches!(b, AstNode::Identifier(n, _) if n == "b"));
        assert_eq!(op(and), BinOp::BitAnd);
        let (lhs, rhs) = children(and);
        assert_eq!(op(lhs), BinOp::Add);
        assert_eq!(op(rhs), BinOp::Sub);
        let (six_plus_c, a) = children(rhs);
        assert_eq!(op(six_plus_c), BinOp::Add);
        assert!(matches!(a, AstNode::Identifier(n, _) if n == "a"));
    }

    #[test]
    fn test_multiplicative_binds_tighter() {
        let e = expr("a + b * c");
        assert_eq!(op(&e), BinOp::Add);
        assert_eq!(op(children(&e).1), BinOp::Mul);
    }

    #[test]
    fn test_compound_assignment_desugars() {
        match statement("x += y * 2;") {
            AstNode::Assign { target, value, .. } => {
                assert_eq!(target, "x");
                assert_eq!(op(&value), BinOp::Add);
                let (lhs, rhs) = children(&value);
                assert!(matches!(lhs, AstNode::Identifier(n, _) if n == "x"));
                assert_eq!(op(rhs), BinOp::Mul);
            }
            other => panic!("Expected assignment, got {:?}", other),
        }
    }

    #[test]
    fn test_assignment_is_right_associative() {
        match statement("x = y = 1;") {
            AstNode::Assign { target, value, .. } => {
                assert_eq!(target, "x");
                assert!(matches!(*value, AstNode::Assign { ref target, .. } if target == "y"));
            }
            other => panic!("Expected assignment, got {:?}", other),
        }
    }

    #[test]
    fn test_unary_and_postfix() {
        match statement("++(x);") {
            AstNode::UnaryOp { op, operand, .. } => {
                assert_eq!(op, UnOp::PreInc);
                assert!(matches!(*operand, AstNode::Identifier(ref n, _) if n == "x"));
            }
            other => panic!("Expected unary op, got {:?}", other),
        }
        assert!(matches!(
            statement("x--;"),
            AstNode::UnaryOp {
                op: UnOp::PostDec,
                ..
            }
        ));
        assert!(matches!(
            expr("-a"),
            AstNode::UnaryOp { op: UnOp::Neg, .. }
        ));
    }

    #[test]
    fn test_call_arguments() {
        match statement("printf(\"%d\\n\", x + 1);") {
            AstNode::Call { name, args, .. } => {
                assert_eq!(name, "printf");
                assert_eq!(args.len(), 2);
                assert!(matches!(&args[0], AstNode::Literal(Literal::Str(s), _) if s == "%d\n"));
            }
            other => panic!("Expected call, got {:?}", other),
        }
    }

    #[test]
    fn test_rejected_expressions() {
        for body in [
            "return x ? 1 : 2;",
            "return (int) x;",
            "return sizeof(x);",
            "x + 1 = 2;",
            "return x[0];",
            "return x.y;",
        ] {
            let text = format!("int f(int x) {{ {} }}", body);
            let result = Parser::new(&text).and_then(|mut p| p.parse_program());
            assert!(result.is_err(), "expected parse error for {body}");
        }
    }

    #[test]
    fn test_cast_and_grouping() {
        assert!(matches!(
            expr("(a) + (b)"),
            AstNode::BinaryOp { op: BinOp::Add, .. }
        ));
        for source in ["(int) a", "(unsigned long) a + b", "-(const char) a"] {
            let text = format!("int f(int a, int b) {{ return {}; }}", source);
            let err = Parser::new(&text)
                .and_then(|mut p| p.parse_program())
                .expect_err(source);
            assert_eq!(err.message, "Casts are not supported");
        }
    }
}
