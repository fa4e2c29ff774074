//! Declaration parsing implementation
//!
//! This module handles parsing of declarations in C programs:
//!
//! - Function definitions: `type name(params) { ... }`
//! - Type specifiers: `int`, `char`, `short`, `long`, `long long`, `void`,
//!   `signed`/`unsigned` and `const`, in any order
//! - Declarators: pointers and parenthesized names (`int (j)`, `int *p`)
//! - Variable declarations, including several declarators per statement
//!
//! # Grammar
//!
//! ```text
//! program       ::= function_def*
//! function_def  ::= type declarator "(" params ")" "{" statements "}"
//! params        ::= "void" | param ("," param)* | ε
//! param         ::= type declarator
//! var_decl      ::= type init_decl ("," init_decl)* ";"
//! init_decl     ::= declarator ("=" assignment)?
//! declarator    ::= "*"* (identifier | "(" declarator ")")
//! type          ::= (specifier | "const")+
//! ```
//!
//! Global variables, structs and arrays are outside the supported subset and
//! are reported as parse errors.
//!
//! All parsing methods are implemented as `pub(crate)` methods on the [`Parser`] struct.

use crate::parser::ast::*;
use crate::parser::lexer::TokenKind;
use crate::parser::parse::{ParseError, Parser};

impl Parser {
    /// Parse function definition: type name(params) { body }
    pub(crate) fn parse_function_definition(&mut self) -> Result<AstNode, ParseError> {
        let base_type = self.parse_type()?;
        let (name, return_type, loc) = self.parse_declarator(base_type)?;

        if !self.check(&TokenKind::LParen) {
            return Err(ParseError::new(
                format!(
                    "Global variable '{}' is not supported; expected a function definition",
                    name
                ),
                loc,
            ));
        }
        self.expect_lparen("after function name")?;

        let params = self.parse_parameter_list()?;

        self.expect_rparen("after parameters")?;
        if self.check(&TokenKind::Semicolon) {
            return Err(self.error_here(format!(
                "Function prototype for '{}' is not supported; expected a function body",
                name
            )));
        }
        let body_loc = self.current_location();
        self.expect_lbrace("before function body")?;

        let statements = self.parse_block_statements()?;

        self.expect_rbrace("after function body")?;

        Ok(AstNode::FunctionDecl {
            name,
            return_type,
            params,
            body: Box::new(AstNode::block(statements, body_loc)),
            location: loc,
        })
    }

    /// Parse parameter list: (type name, type name, ...)
    pub(crate) fn parse_parameter_list(&mut self) -> Result<Vec<Param>, ParseError> {
        let mut params = Vec::new();

        if self.check(&TokenKind::RParen) {
            return Ok(params);
        }

        loop {
            let base_type = self.parse_type()?;
            // Special case: (void) means no parameters in C
            if params.is_empty()
                && base_type == Type::new(BaseType::Void)
                && self.check(&TokenKind::RParen)
            {
                return Ok(params);
            }
            let (name, param_type, loc) = self.parse_declarator(base_type)?;
            if params.iter().any(|p: &Param| p.name == name) {
                return Err(ParseError::new(
                    format!("Duplicate parameter '{}'", name),
                    loc,
                ));
            }
            params.push(Param { name, param_type });

            if !self.match_token(&TokenKind::Comma) {
                break;
            }
        }

        Ok(params)
    }

    /// Parse a type made of specifiers and qualifiers, e.g. `unsigned long`,
    /// `const int`, `long long`, `signed char`.
    pub(crate) fn parse_type(&mut self) -> Result<Type, ParseError> {
        let loc = self.current_location();
        let mut is_const = false;
        let mut signedness: Option<bool> = None;
        let mut longs = 0;
        let mut base: Option<BaseType> = None;
        let mut seen_any = false;

        loop {
            let kind = self.peek().kind.clone();
            match kind {
                TokenKind::Const => is_const = true,
                TokenKind::Signed | TokenKind::Unsigned => {
                    let signed = kind == TokenKind::Signed;
                    if signedness.is_some_and(|s| s != signed) {
                        return Err(self.error_here("Conflicting 'signed' and 'unsigned'"));
                    }
                    signedness = Some(signed);
                }
                TokenKind::Long => {
                    longs += 1;
                    if longs > 2 {
                        return Err(self.error_here("Type 'long long long' is too long"));
                    }
                }
                TokenKind::Int | TokenKind::Char | TokenKind::Short | TokenKind::Void => {
                    let next = match kind {
                        TokenKind::Char => BaseType::Char,
                        TokenKind::Short => BaseType::Short,
                        TokenKind::Void => BaseType::Void,
                        _ => BaseType::Int,
                    };
                    // `short int` and `long int` are fine; anything else doubled is not
                    match (base, next) {
                        (None, _) => base = Some(next),
                        (Some(BaseType::Short), BaseType::Int) => {}
                        (Some(BaseType::Int), BaseType::Short) => base = Some(BaseType::Short),
                        _ => {
                            return Err(
                                self.error_here(format!("Unexpected {} in type", self.peek()))
                            );
                        }
                    }
                }
                TokenKind::Struct => {
                    return Err(self.error_here("Struct types are not supported"));
                }
                _ => break,
            }
            seen_any = true;
            self.advance();
        }

        if !seen_any {
            return Err(ParseError::new(
                format!("Expected type, found {}", self.peek()),
                loc,
            ));
        }

        let base = match (base, longs) {
            (None | Some(BaseType::Int), 0) => BaseType::Int,
            (None | Some(BaseType::Int), 1) => BaseType::Long,
            (None | Some(BaseType::Int), _) => BaseType::LongLong,
            (Some(other), 0) => other,
            (Some(_), _) => return Err(ParseError::new("Invalid use of 'long' in type", loc)),
        };
        if base == BaseType::Void && signedness.is_some() {
            return Err(ParseError::new("'void' cannot be signed or unsigned", loc));
        }

        let mut ty = Type::new(base);
        if signedness == Some(false) {
            ty = ty.with_unsigned();
        }
        if is_const {
            ty = ty.with_const();
        }
        Ok(ty)
    }

    /// Parse a declarator on top of `base`: pointer stars, then a name that
    /// may be wrapped in parentheses. Returns the name, its full type and the
    /// location of the name.
    pub(crate) fn parse_declarator(
        &mut self,
        base: Type,
    ) -> Result<(String, Type, SourceLocation), ParseError> {
        let mut ty = base;
        while self.match_token(&TokenKind::Star) {
            ty = ty.with_pointer();
            // `int * const p`
            self.match_token(&TokenKind::Const);
        }

        let (name, loc) = if self.match_token(&TokenKind::LParen) {
            let (name, inner, loc) = self.parse_declarator(ty)?;
            self.expect_rparen("after parenthesized declarator")?;
            ty = inner;
            (name, loc)
        } else {
            let loc = self.current_location();
            (self.expect_identifier()?, loc)
        };

        if self.check(&TokenKind::LBracket) {
            return Err(self.error_here("Arrays are not supported"));
        }

        Ok((name, ty, loc))
    }

    /// Parse a declaration statement: `int a = 1, b, c;`.
    ///
    /// Every declarator becomes its own [`AstNode::VarDecl`], in source order.
    pub(crate) fn parse_variable_declaration(&mut self) -> Result<Vec<AstNode>, ParseError> {
        let base_type = self.parse_type()?;
        let mut decls = Vec::new();

        loop {
            let (name, var_type, loc) = self.parse_declarator(base_type.clone())?;
            if var_type.base == BaseType::Void && !var_type.is_pointer() {
                return Err(ParseError::new(
                    format!("Variable '{}' declared void", name),
                    loc,
                ));
            }

            let init = if self.match_token(&TokenKind::Eq) {
                Some(Box::new(self.parse_assignment()?))
            } else {
                None
            };

            decls.push(AstNode::VarDecl {
                name,
                var_type,
                init,
                location: loc,
            });

            if !self.match_token(&TokenKind::Comma) {
                break;
            }
        }

        self.expect_semicolon("after variable declaration")?;
        Ok(decls)
    }
}

#[cfg(test)]
mod tests {
    use crate::parser::ast::*;
    use crate::parser::parse::Parser;

    fn function(source: &str) -> AstNode {
        let mut parser = Parser::new(source).unwrap();
        let mut program = parser.parse_program().unwrap();
        program.nodes.remove(0)
    }

    #[test]
    fn test_type_specifiers() {
        let AstNode::FunctionDecl {
            return_type,
            params,
            ..
        } = function("unsigned long fib(unsigned long n, long long m, short int s) { return n; }")
        else {
            panic!("Expected function definition");
        };
        assert_eq!(return_type, Type::new(BaseType::Long).with_unsigned());
        assert_eq!(params[0].name, "n");
        assert_eq!(params[1].param_type, Type::new(BaseType::LongLong));
        assert_eq!(params[2].param_type, Type::new(BaseType::Short));
    }

    #[test]
    fn test_void_params() {
        let AstNode::FunctionDecl { params, .. } = function("int main(void) { return 0; }") else {
            panic!("Expected function definition");
        };
        assert!(params.is_empty());

        let AstNode::FunctionDecl { params, .. } = function("int f(void *p) { return 0; }") else {
            panic!("Expected function definition");
        };
        assert_eq!(params.len(), 1);
        assert!(params[0].param_type.is_pointer());
    }

    #[test]
    fn test_multi_declaration_siblings() {
        let AstNode::FunctionDecl { body, .. } =
            function("int f() { int a = 1, b = 1, c; return c; }")
        else {
            panic!("Expected function definition");
        };
        let names: Vec<_> = body
            .statements()
            .iter()
            .filter_map(|s| match s {
                AstNode::VarDecl { name, init, .. } => Some((name.as_str(), init.is_some())),
                _ => None,
            })
            .collect();
        assert_eq!(names, vec![("a", true), ("b", true), ("c", false)]);
    }

    #[test]
    fn test_parenthesized_and_pointer_declarators() {
        let AstNode::FunctionDecl { body, .. } =
            function("int f() { int (j) = 0; int *p; return j; }")
        else {
            panic!("Expected function definition");
        };
        match &body.statements()[0] {
            AstNode::VarDecl { name, .. } => assert_eq!(name, "j"),
            other => panic!("Expected declaration, got {:?}", other),
        }
        match &body.statements()[1] {
            AstNode::VarDecl { var_type, .. } => assert_eq!(var_type.pointer_depth, 1),
            other => panic!("Expected declaration, got {:?}", other),
        }
    }

    #[test]
    fn test_rejected_declarations() {
        for source in [
            "int g = 1; int main() { return g; }",
            "int main() { int a[3]; return 0; }",
            "struct P { int x; };",
            "int f(int x);",
            "int main() { void v; return 0; }",
        ] {
            let result = Parser::new(source).and_then(|mut p| p.parse_program());
            assert!(result.is_err(), "expected parse error for {source}");
        }
    }
}
