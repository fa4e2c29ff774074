//! Lexer (tokenizer) for C source code
//!
//! Converts raw source text into a flat [`Token`] stream consumed by the parser.
//! Tokenizing happens in two phases:
//!
//! 1. A scan over the characters produces raw tokens and, from `#define`
//!    lines, the [`MacroTable`]. `#include` and `#pragma` lines are skipped;
//!    every other directive is rejected because ignoring it could change the
//!    program's meaning.
//! 2. Macro invocations in the raw stream are expanded inline (see
//!    [`crate::parser::macros`]).
//!
//! The macro table belongs to one `Lexer` and is never shared between inputs.

use super::ast::SourceLocation;
use super::macros::{MacroRule, MacroTable, DEFAULT_MAX_EXPANSION_DEPTH};
use std::fmt;
use thiserror::Error;
use tracing::debug;

/// All token kinds produced by the lexer.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Literals
    IntLiteral(i64),
    StringLiteral(String),

    // Identifiers
    Ident,

    // Keywords
    Int,
    Char,
    Void,
    Short,
    Long,
    Signed,
    Unsigned,
    Const,
    If,
    Else,
    While,
    For,
    Return,
    // Keywords outside the subset, lexed so the parser can reject them by name
    Do,
    Switch,
    Case,
    Default,
    Break,
    Continue,
    Goto,
    Struct,
    Sizeof,

    // Arithmetic
    Plus,    // +
    Minus,   // -
    Star,    // *
    Slash,   // /
    Percent, // %

    // Comparison
    EqEq,  // ==
    NotEq, // !=
    Lt,    // <
    Le,    // <=
    Gt,    // >
    Ge,    // >=

    // Logical
    AndAnd, // &&
    OrOr,   // ||
    Bang,   // !

    // Bitwise
    Amp,   // &
    Pipe,  // |
    Caret, // ^
    Tilde, // ~
    LtLt,  // <<
    GtGt,  // >>

    // Assignment
    Eq,        // =
    PlusEq,    // +=
    MinusEq,   // -=
    StarEq,    // *=
    SlashEq,   // /=
    PercentEq, // %=
    AmpEq,     // &=
    PipeEq,    // |=
    CaretEq,   // ^=
    LtLtEq,    // <<=
    GtGtEq,    // >>=

    // Increment/Decrement
    PlusPlus,   // ++
    MinusMinus, // --

    // Member access
    Dot,   // .
    Arrow, // ->

    // Ternary
    Question, // ?
    Colon,    // :

    // Punctuation
    LParen,    // (
    RParen,    // )
    LBrace,    // {
    RBrace,    // }
    LBracket,  // [
    RBracket,  // ]
    Semicolon, // ;
    Comma,     // ,

    // End of file
    Eof,
}

/// A single token: its kind, its spelling in the source and where it starts.
///
/// Tokens produced by a macro expansion carry the location of the invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub location: SourceLocation,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, location: SourceLocation) -> Self {
        Token {
            kind,
            text: text.into(),
            location,
        }
    }

    pub fn is_ident(&self) -> bool {
        self.kind == TokenKind::Ident
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            TokenKind::IntLiteral(_) => write!(f, "int literal {}", self.text),
            TokenKind::StringLiteral(s) => write!(f, "string literal \"{}\"", s.escape_default()),
            TokenKind::Ident => write!(f, "identifier '{}'", self.text),
            TokenKind::Eof => write!(f, "end of file"),
            _ => write!(f, "'{}'", self.text),
        }
    }
}

/// Broad classification of lexer failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LexErrorKind {
    /// A malformed or illegal token.
    Token,
    /// A malformed, redefined or misused macro.
    Macro,
    /// Macro expansion nested deeper than the configured limit.
    MacroDepthExceeded,
    /// A preprocessor directive outside the supported subset.
    Directive,
}

/// Lexer error type
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Lexer error at line {}, column {}: {}", .location.line, .location.column, .message)]
pub struct LexError {
    pub kind: LexErrorKind,
    pub message: String,
    pub location: SourceLocation,
}

impl LexError {
    pub(crate) fn new(
        kind: LexErrorKind,
        message: impl Into<String>,
        location: SourceLocation,
    ) -> Self {
        LexError {
            kind,
            message: message.into(),
            location,
        }
    }

    fn token(message: impl Into<String>, location: SourceLocation) -> Self {
        Self::new(LexErrorKind::Token, message, location)
    }
}

/// Lexer for C source code
pub struct Lexer {
    input: Vec<char>,
    position: usize,
    line: usize,
    column: usize,
    line_start: usize,
    allow_directives: bool,
    max_expansion_depth: usize,
    macros: MacroTable,
}

impl Lexer {
    /// Create a new lexer for the given source string.
    pub fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            position: 0,
            line: 1,
            column: 1,
            line_start: 0,
            allow_directives: true,
            max_expansion_depth: DEFAULT_MAX_EXPANSION_DEPTH,
            macros: MacroTable::new(),
        }
    }

    /// Limit how deeply macro expansions may nest.
    pub fn with_max_expansion_depth(mut self, depth: usize) -> Self {
        self.max_expansion_depth = depth;
        self
    }

    /// Macros defined by the source, available after [`Lexer::tokenize`].
    pub fn macros(&self) -> &MacroTable {
        &self.macros
    }

    /// Tokenize the entire input, expanding macros.
    pub fn tokenize(&mut self) -> Result<Vec<Token>, LexError> {
        let raw = self.scan()?;
        if self.macros.is_empty() {
            return Ok(raw);
        }
        debug!(macros = self.macros.len(), "expanding macro invocations");
        self.macros.expand(&raw, self.max_expansion_depth)
    }

    /// First phase: raw tokens plus the macro table.
    fn scan(&mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();

        loop {
            self.skip_whitespace_and_comments()?;

            if self.is_at_end() {
                tokens.push(Token::new(TokenKind::Eof, "", self.current_location()));
                break;
            }

            if self.allow_directives && self.peek() == Some('#') && self.at_line_start() {
                self.preprocessor_directive()?;
                continue;
            }

            tokens.push(self.next_token()?);
        }

        Ok(tokens)
    }

    /// Get next token
    fn next_token(&mut self) -> Result<Token, LexError> {
        use TokenKind as T;

        let loc = self.current_location();
        let ch = self
            .advance()
            .ok_or_else(|| LexError::token("Unexpected end of file", loc))?;

        let (kind, text): (TokenKind, &str) = match ch {
            // String literals
            '"' => return self.string_literal(loc),

            // Character literals
            '\'' => return self.char_literal(loc),

            // Numeric literals
            '0'..='9' => return self.number_literal(ch, loc),

            // Identifiers and keywords
            'a'..='z' | 'A'..='Z' | '_' => return Ok(self.identifier_or_keyword(ch, loc)),

            // Operators and punctuation
            '+' => {
                if self.eat('+') {
                    (T::PlusPlus, "++")
                } else if self.eat('=') {
                    (T::PlusEq, "+=")
                } else {
                    (T::Plus, "+")
                }
            }
            '-' => {
                if self.eat('-') {
                    (T::MinusMinus, "--")
                } else if self.eat('=') {
                    (T::MinusEq, "-=")
                } else if self.eat('>') {
                    (T::Arrow, "->")
                } else {
                    (T::Minus, "-")
                }
            }
            '*' => {
                if self.eat('=') {
                    (T::StarEq, "*=")
                } else {
                    (T::Star, "*")
                }
            }
            '/' => {
                if self.eat('=') {
                    (T::SlashEq, "/=")
                } else {
                    (T::Slash, "/")
                }
            }
            '%' => {
                if self.eat('=') {
                    (T::PercentEq, "%=")
                } else {
                    (T::Percent, "%")
                }
            }
            '=' => {
                if self.eat('=') {
                    (T::EqEq, "==")
                } else {
                    (T::Eq, "=")
                }
            }
            '!' => {
                if self.eat('=') {
                    (T::NotEq, "!=")
                } else {
                    (T::Bang, "!")
                }
            }
            '<' => {
                if self.eat('=') {
                    (T::Le, "<=")
                } else if self.eat('<') {
                    if self.eat('=') {
                        (T::LtLtEq, "<<=")
                    } else {
                        (T::LtLt, "<<")
                    }
                } else {
                    (T::Lt, "<")
                }
            }
            '>' => {
                if self.eat('=') {
                    (T::Ge, ">=")
                } else if self.eat('>') {
                    if self.eat('=') {
                        (T::GtGtEq, ">>=")
                    } else {
                        (T::GtGt, ">>")
                    }
                } else {
                    (T::Gt, ">")
                }
            }
            '&' => {
                if self.eat('&') {
                    (T::AndAnd, "&&")
                } else if self.eat('=') {
                    (T::AmpEq, "&=")
                } else {
                    (T::Amp, "&")
                }
            }
            '|' => {
                if self.eat('|') {
                    (T::OrOr, "||")
                } else if self.eat('=') {
                    (T::PipeEq, "|=")
                } else {
                    (T::Pipe, "|")
                }
            }
            '^' => {
                if self.eat('=') {
                    (T::CaretEq, "^=")
                } else {
                    (T::Caret, "^")
                }
            }
            '~' => (T::Tilde, "~"),
            '.' => (T::Dot, "."),
            '?' => (T::Question, "?"),
            ':' => (T::Colon, ":"),
            '(' => (T::LParen, "("),
            ')' => (T::RParen, ")"),
            '{' => (T::LBrace, "{"),
            '}' => (T::RBrace, "}"),
            '[' => (T::LBracket, "["),
            ']' => (T::RBracket, "]"),
            ';' => (T::Semicolon, ";"),
            ',' => (T::Comma, ","),

            '#' => {
                return Err(LexError::new(
                    LexErrorKind::Macro,
                    "Unexpected '#': stringizing and token pasting are not supported",
                    loc,
                ));
            }

            _ => {
                return Err(LexError::token(
                    format!("Unexpected character: '{}'", ch),
                    loc,
                ));
            }
        };

        Ok(Token::new(kind, text, loc))
    }

    fn escape(&mut self, context: &str) -> Result<char, LexError> {
        let escaped = self.advance().ok_or_else(|| {
            LexError::token(
                format!("Unexpected end of file in {}", context),
                self.current_location(),
            )
        })?;

        let unescaped = match escaped {
            'n' => '\n',
            't' => '\t',
            'r' => '\r',
            '\\' => '\\',
            '\'' => '\'',
            '"' => '"',
            '0' => '\0',
            'x' => {
                // Hex escape: \xHH
                let mut hex = String::new();
                while let Some(c) = self.peek().filter(|c| c.is_ascii_hexdigit()) {
                    hex.push(c);
                    self.advance();
                }
                let value = u8::from_str_radix(&hex, 16).map_err(|_| {
                    LexError::token(
                        format!("Invalid hex escape sequence: \\x{}", hex),
                        self.current_location(),
                    )
                })?;
                char::from(value)
            }
            _ => {
                return Err(LexError::token(
                    format!("Unknown escape sequence: \\{}", escaped),
                    self.current_location(),
                ));
            }
        };
        Ok(unescaped)
    }

    /// Parse string literal
    fn string_literal(&mut self, loc: SourceLocation) -> Result<Token, LexError> {
        let start = self.position - 1;
        let mut string = String::new();

        while let Some(ch) = self.peek() {
            match ch {
                '"' => {
                    self.advance(); // consume closing quote
                    let text: String = self.input[start..self.position].iter().collect();
                    return Ok(Token::new(TokenKind::StringLiteral(string), text, loc));
                }
                '\n' => break,
                '\\' => {
                    self.advance();
                    string.push(self.escape("string literal")?);
                }
                _ => {
                    string.push(ch);
                    self.advance();
                }
            }
        }

        Err(LexError::token("Unterminated string literal", loc))
    }

    /// Parse character literal into its integer value
    fn char_literal(&mut self, loc: SourceLocation) -> Result<Token, LexError> {
        let start = self.position - 1;
        let ch = match self.advance() {
            None | Some('\n') => {
                return Err(LexError::token("Unterminated character literal", loc));
            }
            Some('\\') => self.escape("character literal")?,
            Some(ch) => ch,
        };

        // Expect closing quote
        if self.advance() != Some('\'') {
            return Err(LexError::token(
                "Expected closing quote in character literal",
                loc,
            ));
        }

        let text: String = self.input[start..self.position].iter().collect();
        Ok(Token::new(
            TokenKind::IntLiteral(i64::from(ch as u32 as u8 as i8)),
            text,
            loc,
        ))
    }

    /// Parse numeric literal (decimal, octal or hex integers with optional u/l suffixes)
    fn number_literal(
        &mut self,
        first_digit: char,
        loc: SourceLocation,
    ) -> Result<Token, LexError> {
        let start = self.position - 1;
        let mut digits = String::new();
        let radix = if first_digit == '0' && matches!(self.peek(), Some('x' | 'X')) {
            self.advance();
            16
        } else if first_digit == '0' {
            8
        } else {
            digits.push(first_digit);
            10
        };

        while let Some(ch) = self.peek().filter(|c| c.is_ascii_alphanumeric()) {
            if ch.is_digit(radix) {
                digits.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        // Suffixes: u, l, ul, lu, ll, ull ...
        while matches!(self.peek(), Some('u' | 'U' | 'l' | 'L')) {
            self.advance();
        }

        let text: String = self.input[start..self.position].iter().collect();

        if let Some(ch) = self
            .peek()
            .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '.')
        {
            let message = if ch == '.' {
                format!("Floating point literals are not supported: {}", text)
            } else {
                format!("Invalid integer literal: {}{}", text, ch)
            };
            return Err(LexError::token(message, loc));
        }

        if radix == 16 && digits.is_empty() {
            return Err(LexError::token(
                format!("Invalid integer literal: {}", text),
                loc,
            ));
        }

        let value = if digits.is_empty() {
            0
        } else {
            u64::from_str_radix(&digits, radix).map_err(|_| {
                LexError::token(format!("Integer literal out of range: {}", text), loc)
            })?
        };

        // Values above i64::MAX keep their two's-complement bit pattern
        Ok(Token::new(TokenKind::IntLiteral(value as i64), text, loc))
    }

    /// Parse identifier or keyword
    fn identifier_or_keyword(&mut self, first_char: char, loc: SourceLocation) -> Token {
        let mut ident = String::new();
        ident.push(first_char);

        while let Some(ch) = self.peek() {
            if ch.is_ascii_alphanumeric() || ch == '_' {
                ident.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        // Check if it's a keyword
        let kind = match ident.as_str() {
            "int" => TokenKind::Int,
            "char" => TokenKind::Char,
            "void" => TokenKind::Void,
            "short" => TokenKind::Short,
            "long" => TokenKind::Long,
            "signed" => TokenKind::Signed,
            "unsigned" => TokenKind::Unsigned,
            "const" => TokenKind::Const,
            "if" => TokenKind::If,
            "else" => TokenKind::Else,
            "while" => TokenKind::While,
            "for" => TokenKind::For,
            "return" => TokenKind::Return,
            "do" => TokenKind::Do,
            "switch" => TokenKind::Switch,
            "case" => TokenKind::Case,
            "default" => TokenKind::Default,
            "break" => TokenKind::Break,
            "continue" => TokenKind::Continue,
            "goto" => TokenKind::Goto,
            "struct" => TokenKind::Struct,
            "sizeof" => TokenKind::Sizeof,
            _ => TokenKind::Ident,
        };

        Token::new(kind, ident, loc)
    }

    /// Handle a preprocessor line starting at `#`.
    fn preprocessor_directive(&mut self) -> Result<(), LexError> {
        let loc = self.current_location();
        self.advance(); // skip '#'
        while matches!(self.peek(), Some(' ' | '\t')) {
            self.advance();
        }

        let mut name = String::new();
        while let Some(ch) = self.peek().filter(|c| c.is_ascii_alphanumeric() || *c == '_') {
            name.push(ch);
            self.advance();
        }

        let rest = self.directive_line();

        match name.as_str() {
            // Null directive, headers and pragmas carry no meaning for the subset
            "" | "include" | "pragma" => Ok(()),
            "define" => {
                let rule = Self::parse_define(&rest, loc)?;
                debug!(
                    name = %rule.name,
                    function_like = rule.params.is_some(),
                    "macro defined"
                );
                self.macros.define(rule, loc)
            }
            other => Err(LexError::new(
                LexErrorKind::Directive,
                format!("Unsupported preprocessor directive '#{}'", other),
                loc,
            )),
        }
    }

    /// Consume the rest of a directive line, joining backslash continuations.
    fn directive_line(&mut self) -> String {
        let mut text = String::new();
        while let Some(ch) = self.peek() {
            if ch == '\\' && self.peek_ahead(1) == Some('\n') {
                self.advance();
                self.advance();
                text.push(' ');
                continue;
            }
            if ch == '\n' {
                self.advance();
                break;
            }
            text.push(ch);
            self.advance();
        }
        text
    }

    /// Parse the text after `#define` into a [`MacroRule`].
    fn parse_define(text: &str, loc: SourceLocation) -> Result<MacroRule, LexError> {
        let macro_error = |message: String| LexError::new(LexErrorKind::Macro, message, loc);
        // `text` still starts with the blanks that followed `define`
        let chars: Vec<char> = text.trim_start().chars().collect();
        let mut i = 0;

        let mut name = String::new();
        while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
            name.push(chars[i]);
            i += 1;
        }
        if name.is_empty() || name.starts_with(|c: char| c.is_ascii_digit()) {
            return Err(macro_error("Expected macro name after '#define'".to_string()));
        }

        // Function-like only when '(' follows the name with no whitespace
        let params = if chars.get(i) == Some(&'(') {
            let close = chars[i..]
                .iter()
                .position(|&c| c == ')')
                .map(|offset| i + offset)
                .ok_or_else(|| {
                    macro_error(format!("Missing ')' in parameter list of macro '{}'", name))
                })?;
            let list: String = chars[i + 1..close].iter().collect();
            i = close + 1;

            let mut params = Vec::new();
            if !list.trim().is_empty() {
                for param in list.split(',').map(str::trim) {
                    let valid = param
                        .chars()
                        .next()
                        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
                        && param.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
                    if !valid {
                        return Err(macro_error(format!(
                            "Invalid parameter '{}' in macro '{}'",
                            param, name
                        )));
                    }
                    if params.iter().any(|p| p == param) {
                        return Err(macro_error(format!(
                            "Duplicate parameter '{}' in macro '{}'",
                            param, name
                        )));
                    }
                    params.push(param.to_string());
                }
            }
            Some(params)
        } else {
            None
        };

        let body_text: String = chars[i..].iter().collect();
        let mut body_lexer = Lexer::new(&body_text);
        body_lexer.allow_directives = false;
        let mut body = body_lexer.scan().map_err(|e| LexError {
            location: loc,
            ..e
        })?;
        body.pop(); // Eof
        for token in &mut body {
            token.location = loc;
        }

        Ok(MacroRule { name, params, body })
    }

    /// Skip whitespace and comments
    fn skip_whitespace_and_comments(&mut self) -> Result<(), LexError> {
        loop {
            match self.peek() {
                Some(' ') | Some('\t') | Some('\r') | Some('\n') => {
                    self.advance();
                }
                Some('\\') if self.peek_ahead(1) == Some('\n') => {
                    self.advance();
                    self.advance();
                }
                Some('/') => {
                    if self.peek_ahead(1) == Some('/') {
                        // Single-line comment
                        self.skip_line_comment();
                    } else if self.peek_ahead(1) == Some('*') {
                        // Multi-line comment
                        self.skip_block_comment()?;
                    } else {
                        break;
                    }
                }
                _ => break,
            }
        }
        Ok(())
    }

    /// Skip single-line comment (// ...)
    fn skip_line_comment(&mut self) {
        while let Some(ch) = self.peek() {
            self.advance();
            if ch == '\n' {
                break;
            }
        }
    }

    /// Skip multi-line comment (/* ... */)
    fn skip_block_comment(&mut self) -> Result<(), LexError> {
        let start_loc = self.current_location();
        self.advance(); // skip '/'
        self.advance(); // skip '*'

        while !self.is_at_end() {
            if self.peek() == Some('*') && self.peek_ahead(1) == Some('/') {
                self.advance(); // skip '*'
                self.advance(); // skip '/'
                return Ok(());
            }
            self.advance();
        }

        Err(LexError::token("Unterminated block comment", start_loc))
    }

    /// True when only whitespace precedes the cursor on the current line.
    fn at_line_start(&self) -> bool {
        self.input[self.line_start..self.position]
            .iter()
            .all(|c| c.is_whitespace())
    }

    /// Peek at current character without consuming
    fn peek(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    /// Peek ahead n characters
    fn peek_ahead(&self, n: usize) -> Option<char> {
        self.input.get(self.position + n).copied()
    }

    /// Consume the next character if it equals `expected`.
    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Advance to next character
    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.position += 1;

        if ch == '\n' {
            self.line += 1;
            self.column = 1;
            self.line_start = self.position;
        } else {
            self.column += 1;
        }

        Some(ch)
    }

    /// Check if at end of input
    fn is_at_end(&self) -> bool {
        self.position >= self.input.len()
    }

    /// Get current source location
    fn current_location(&self) -> SourceLocation {
        SourceLocation::new(self.line, self.column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        Lexer::new(source)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_simple_tokens() {
        let mut lexer = Lexer::new("int main() { return 0; }");
        let tokens = lexer.tokenize().unwrap();

        assert_eq!(tokens[0].kind, TokenKind::Int);
        assert!(tokens[1].is_ident() && tokens[1].text == "main");
        assert_eq!(tokens[2].kind, TokenKind::LParen);
        assert_eq!(tokens[3].kind, TokenKind::RParen);
        assert_eq!(tokens[4].kind, TokenKind::LBrace);
        assert_eq!(tokens[5].kind, TokenKind::Return);
        assert_eq!(tokens[6].kind, TokenKind::IntLiteral(0));
        assert_eq!(tokens[7].kind, TokenKind::Semicolon);
        assert_eq!(tokens[8].kind, TokenKind::RBrace);
        assert_eq!(tokens[9].kind, TokenKind::Eof);
    }

    #[test]
    fn test_operators() {
        use TokenKind as T;
        assert_eq!(
            kinds("++ -- += -= == != && || <<= >> ^"),
            vec![
                T::PlusPlus,
                T::MinusMinus,
                T::PlusEq,
                T::MinusEq,
                T::EqEq,
                T::NotEq,
                T::AndAnd,
                T::OrOr,
                T::LtLtEq,
                T::GtGt,
                T::Caret,
                T::Eof
            ]
        );
    }

    #[test]
    fn test_number_forms() {
        use TokenKind as T;
        assert_eq!(
            kinds("0xdead 017 42ul 0 'a'"),
            vec![
                T::IntLiteral(0xdead),
                T::IntLiteral(0o17),
                T::IntLiteral(42),
                T::IntLiteral(0),
                T::IntLiteral(97),
                T::Eof
            ]
        );
    }

    #[test]
    fn test_positions() {
        let tokens = Lexer::new("int x;\n  x = 1;").tokenize().unwrap();
        assert_eq!(tokens[3].location, SourceLocation::new(2, 3));
        assert_eq!(tokens[3].text, "x");
    }

    #[test]
    fn test_comments() {
        let tokens = Lexer::new("int x; // comment\nint y; /* block\ncomment */ int z;")
            .tokenize()
            .unwrap();
        let idents: Vec<_> = tokens
            .iter()
            .filter(|t| t.is_ident())
            .map(|t| t.text.as_str())
            .collect();
        assert_eq!(idents, vec!["x", "y", "z"]);
    }

    #[test]
    fn test_string_literal() {
        let tokens = Lexer::new(r#""%d\n""#).tokenize().unwrap();
        assert_eq!(tokens[0].kind, TokenKind::StringLiteral("%d\n".to_string()));
        assert_eq!(tokens[0].text, r#""%d\n""#);
    }

    #[test]
    fn test_preprocessor_skip() {
        let tokens = Lexer::new("#include <stdio.h>\n#include <string.h>\nint x;")
            .tokenize()
            .unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Int);
        assert!(tokens[1].is_ident() && tokens[1].text == "x");
    }

    #[test]
    fn test_define_directive() {
        let mut lexer = Lexer::new("#define ONE 1\n#\tdefine  TWICE(x) ((x) + (x))\nint y = ONE;");
        let tokens = lexer.tokenize().unwrap();
        assert_eq!(lexer.macros().len(), 2);
        assert!(lexer.macros().get("ONE").is_some_and(|m| m.params.is_none()));
        assert_eq!(
            lexer.macros().get("TWICE").and_then(|m| m.params.clone()),
            Some(vec!["x".to_string()])
        );
        assert_eq!(tokens[3].kind, TokenKind::IntLiteral(1));

        let err = Lexer::new("#define   \nint y;").tokenize().unwrap_err();
        assert_eq!(err.kind, LexErrorKind::Macro);
    }

    #[test]
    fn test_errors() {
        let err = Lexer::new("int x = \"abc;").tokenize().unwrap_err();
        assert!(err.message.contains("Unterminated string"));
        assert_eq!(err.location, SourceLocation::new(1, 9));

        let err = Lexer::new("int x = 1 @ 2;").tokenize().unwrap_err();
        assert_eq!(err.kind, LexErrorKind::Token);
        assert!(err.message.contains('@'));

        let err = Lexer::new("/* never closed").tokenize().unwrap_err();
        assert!(err.message.contains("Unterminated block comment"));

        let err = Lexer::new("#ifdef X\n#endif\n").tokenize().unwrap_err();
        assert_eq!(err.kind, LexErrorKind::Directive);

        let err = Lexer::new("double d = 1.5;").tokenize().unwrap_err();
        assert!(err.message.contains("Floating point"));
    }
}
