//! Statement parsing implementation
//!
//! This module handles parsing of all C statement types in the subset:
//!
//! - Variable declarations: `int x = 42, y;`
//! - Control flow: `if`/`else`, `while`, `for`
//! - `return`
//! - Compound statements: `{ ... }`
//! - Expression statements: function calls, assignments, increments
//!
//! A statement parses to a `Vec<AstNode>` so that a declaration with several
//! declarators contributes one sibling per declarator to the enclosing block.
//! `while (c) s` is represented as `for (; c;) s`.
//!
//! # Grammar
//!
//! ```text
//! statement ::= var_decl | if_stmt | while_stmt | for_stmt
//!             | return_stmt | block | expr_stmt | ";"
//! ```
//!
//! `do`, `switch`, `break`, `continue` and `goto` are rejected with a parse error.
//!
//! All parsing methods are implemented as `pub(crate)` methods on the [`Parser`] struct.

use crate::parser::ast::*;
use crate::parser::lexer::TokenKind;
use crate::parser::parse::{ParseError, Parser};

impl Parser {
    /// Parse block statements (inside braces, excluding the braces themselves)
    pub(crate) fn parse_block_statements(&mut self) -> Result<Vec<AstNode>, ParseError> {
        let mut statements = Vec::new();

        while !self.check(&TokenKind::RBrace) && !self.is_at_end() {
            statements.extend(self.parse_statement()?);
        }

        Ok(statements)
    }

    /// Parse a statement
    pub(crate) fn parse_statement(&mut self) -> Result<Vec<AstNode>, ParseError> {
        let loc = self.current_location();

        match self.peek().kind {
            TokenKind::Return => {
                self.advance();
                return Ok(vec![self.parse_return_statement(loc)?]);
            }
            TokenKind::If => {
                self.advance();
                return Ok(vec![self.parse_if_statement(loc)?]);
            }
            TokenKind::While => {
                self.advance();
                return Ok(vec![self.parse_while_statement(loc)?]);
            }
            TokenKind::For => {
                self.advance();
                return Ok(vec![self.parse_for_statement(loc)?]);
            }
            TokenKind::LBrace => {
                self.advance();
                let statements = self.parse_block_statements()?;
                self.expect_rbrace("after block")?;
                return Ok(vec![AstNode::block(statements, loc)]);
            }
            TokenKind::Semicolon => {
                // Empty statement
                self.advance();
                return Ok(Vec::new());
            }
            TokenKind::Do
            | TokenKind::Switch
            | TokenKind::Case
            | TokenKind::Default
            | TokenKind::Break
            | TokenKind::Continue
            | TokenKind::Goto => {
                return Err(self.error_here(format!(
                    "'{}' statements are not supported",
                    self.peek().text
                )));
            }
            _ => {}
        }

        // Check for variable declaration (type followed by declarator)
        if self.is_type_keyword() {
            return self.parse_variable_declaration();
        }

        // Otherwise, it's an expression statement
        let expr = self.parse_expression()?;
        if matches!(expr, AstNode::Identifier(..)) && self.check(&TokenKind::Colon) {
            return Err(ParseError::new("Labels are not supported", expr.location()));
        }
        self.expect_semicolon("after expression")?;
        Ok(vec![expr])
    }

    /// Parse return statement
    fn parse_return_statement(&mut self, loc: SourceLocation) -> Result<AstNode, ParseError> {
        let value = if self.check(&TokenKind::Semicolon) {
            None
        } else {
            Some(Box::new(self.parse_expression()?))
        };

        self.expect_semicolon("after return")?;

        Ok(AstNode::Return {
            value,
            location: loc,
        })
    }

    /// Parse if statement
    fn parse_if_statement(&mut self, loc: SourceLocation) -> Result<AstNode, ParseError> {
        self.expect_lparen("after 'if'")?;
        let condition = Box::new(self.parse_expression()?);
        self.expect_rparen("after if condition")?;

        let then_branch = Box::new(self.parse_statement_or_block()?);

        let else_branch = if self.match_token(&TokenKind::Else) {
            Some(Box::new(self.parse_statement_or_block()?))
        } else {
            None
        };

        Ok(AstNode::If {
            condition,
            then_branch,
            else_branch,
            location: loc,
        })
    }

    /// Parse while statement as a `for` without init and step
    fn parse_while_statement(&mut self, loc: SourceLocation) -> Result<AstNode, ParseError> {
        self.expect_lparen("after 'while'")?;
        let condition = Box::new(self.parse_expression()?);
        self.expect_rparen("after while condition")?;

        let body = Box::new(self.parse_statement_or_block()?);

        Ok(AstNode::ForLoop {
            init: None,
            condition: Some(condition),
            step: None,
            body,
            location: loc,
        })
    }

    /// Parse for statement
    fn parse_for_statement(&mut self, loc: SourceLocation) -> Result<AstNode, ParseError> {
        self.expect_lparen("after 'for'")?;

        // Init (optional)
        let init = if self.match_token(&TokenKind::Semicolon) {
            None
        } else if self.is_type_keyword() {
            // Declaration includes the semicolon
            let init_loc = self.current_location();
            let mut decls = self.parse_variable_declaration()?;
            if decls.len() == 1 {
                decls.pop().map(Box::new)
            } else {
                Some(Box::new(AstNode::block(decls, init_loc)))
            }
        } else {
            let expr = self.parse_expression()?;
            self.expect_semicolon("after for init")?;
            Some(Box::new(expr))
        };

        // Condition (optional)
        let condition = if self.check(&TokenKind::Semicolon) {
            None
        } else {
            Some(Box::new(self.parse_expression()?))
        };
        self.expect_semicolon("after for condition")?;

        // Step (optional)
        let step = if self.check(&TokenKind::RParen) {
            None
        } else {
            Some(Box::new(self.parse_expression()?))
        };

        self.expect_rparen("after for clauses")?;

        let body = Box::new(self.parse_statement_or_block()?);

        Ok(AstNode::ForLoop {
            init,
            condition,
            step,
            body,
            location: loc,
        })
    }

    /// Parse the body of an `if`/`while`/`for`. A braced body becomes a
    /// [`AstNode::Block`]; a single statement is kept as is unless it expands
    /// to several nodes, in which case it is wrapped.
    pub(crate) fn parse_statement_or_block(&mut self) -> Result<AstNode, ParseError> {
        let loc = self.current_location();
        let mut statements = self.parse_statement()?;
        if statements.len() == 1 {
            if let Some(statement) = statements.pop() {
                return Ok(statement);
            }
        }
        Ok(AstNode::block(statements, loc))
    }
}

#[cfg(test)]
mod tests {
    use crate::parser::ast::*;
    use crate::parser::parse::Parser;

    fn body(source: &str) -> Vec<AstNode> {
        let text = format!("int f(int n) {{ {} }}", source);
        let mut parser = Parser::new(&text).unwrap();
        let program = parser.parse_program().unwrap();
        let AstNode::FunctionDecl { body, .. } = &program.nodes[0] else {
            panic!("Expected function");
        };
        body.statements().to_vec()
    }

    #[test]
    fn test_while_becomes_for() {
        let stmts = body("while (n) n = n - 1; return n;");
        match &stmts[0] {
            AstNode::ForLoop {
                init,
                condition,
                step,
                ..
            } => {
                assert!(init.is_none());
                assert!(condition.is_some());
                assert!(step.is_none());
            }
            other => panic!("Expected loop, got {:?}", other),
        }
    }

    #[test]
    fn test_for_with_declaration() {
        let stmts = body("for (int j = 0; j != n; ++j) { n = n; } return 0;");
        match &stmts[0] {
            AstNode::ForLoop { init, body, .. } => {
                assert!(
                    matches!(init.as_deref(), Some(AstNode::VarDecl { name, .. }) if name == "j")
                );
                assert!(matches!(**body, AstNode::Block { .. }));
            }
            other => panic!("Expected loop, got {:?}", other),
        }
    }

    #[test]
    fn test_for_with_multi_declaration() {
        let stmts = body("for (int i = 0, k = 1; i < n; i++) ; return 0;");
        match &stmts[0] {
            AstNode::ForLoop { init, body, .. } => {
                assert_eq!(init.as_deref().map(|i| i.statements().len()), Some(2));
                assert!(
                    matches!(**body, AstNode::Block { ref statements, .. } if statements.is_empty())
                );
            }
            other => panic!("Expected loop, got {:?}", other),
        }
    }

    #[test]
    fn test_if_else() {
        let stmts = body("if (n < 2) return n; else { return 1; }");
        match &stmts[0] {
            AstNode::If {
                then_branch,
                else_branch,
                ..
            } => {
                assert!(matches!(**then_branch, AstNode::Return { .. }));
                assert!(matches!(else_branch.as_deref(), Some(AstNode::Block { .. })));
            }
            other => panic!("Expected if, got {:?}", other),
        }
    }

    #[test]
    fn test_unsupported_statements() {
        for source in [
            "do { n = 1; } while (n);",
            "switch (n) { default: return 0; }",
            "for (;;) { break; }",
            "for (;;) { continue; }",
            "goto end;",
            "end: return 0;",
        ] {
            let text = format!("int f(int n) {{ {} }}", source);
            let result = Parser::new(&text).and_then(|mut p| p.parse_program());
            let err = result.expect_err(source);
            assert!(err.message.contains("not supported"), "{}", err.message);
        }
    }

    #[test]
    fn test_label_versus_expression() {
        let stmts = body("n; return n;");
        assert!(matches!(&stmts[0], AstNode::Identifier(name, _) if name == "n"));

        let text = "int f(int n) {\n  done: return n;\n}";
        let err = Parser::new(text)
            .and_then(|mut p| p.parse_program())
            .unwrap_err();
        assert_eq!(err.message, "Labels are not supported");
        assert_eq!((err.location.line, err.location.column), (2, 3));
    }
}
