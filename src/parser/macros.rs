//! Macro table and expansion
//!
//! `#define` lines are collected into a [`MacroTable`] during the raw scan;
//! [`MacroTable::expand`] then replaces every invocation in the token stream.
//!
//! Expansion is plain token substitution: arguments are split on top-level
//! commas, pasted into the body in place of the parameters, and the result is
//! rescanned. Nesting is bounded by a depth limit, so a macro that refers to
//! itself fails with [`LexErrorKind::MacroDepthExceeded`] instead of looping.

use super::ast::SourceLocation;
use super::lexer::{LexError, LexErrorKind, Token, TokenKind};
use rustc_hash::FxHashMap;

/// Default limit on nested macro expansions.
pub const DEFAULT_MAX_EXPANSION_DEPTH: usize = 32;

/// One `#define`. Object-like when `params` is `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct MacroRule {
    pub name: String,
    pub params: Option<Vec<String>>,
    pub body: Vec<Token>,
}

impl MacroRule {
    /// Two definitions of the same name are compatible when their parameter
    /// lists and body tokens agree (locations aside).
    fn same_definition(&self, other: &MacroRule) -> bool {
        self.params == other.params
            && self.body.len() == other.body.len()
            && self
                .body
                .iter()
                .zip(&other.body)
                .all(|(a, b)| a.kind == b.kind && a.text == b.text)
    }
}

/// Macros defined by one source file.
#[derive(Debug, Clone, Default)]
pub struct MacroTable {
    rules: FxHashMap<String, MacroRule>,
}

impl MacroTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a rule. Redefining a name with a different body is an error.
    pub fn define(&mut self, rule: MacroRule, location: SourceLocation) -> Result<(), LexError> {
        if let Some(existing) = self.rules.get(&rule.name) {
            if existing.same_definition(&rule) {
                return Ok(());
            }
            return Err(LexError::new(
                LexErrorKind::Macro,
                format!("Macro '{}' redefined with a different body", rule.name),
                location,
            ));
        }
        self.rules.insert(rule.name.clone(), rule);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&MacroRule> {
        self.rules.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Expand every macro invocation in `tokens`.
    pub fn expand(&self, tokens: &[Token], max_depth: usize) -> Result<Vec<Token>, LexError> {
        let mut out = Vec::with_capacity(tokens.len());
        self.expand_seq(tokens, 0, max_depth, &mut out)?;
        Ok(out)
    }

    fn expand_seq(
        &self,
        tokens: &[Token],
        depth: usize,
        max_depth: usize,
        out: &mut Vec<Token>,
    ) -> Result<(), LexError> {
        let mut i = 0;
        while i < tokens.len() {
            let token = &tokens[i];
            let rule = match token.kind {
                TokenKind::Ident => self.rules.get(&token.text),
                _ => None,
            };
            let Some(rule) = rule else {
                out.push(token.clone());
                i += 1;
                continue;
            };

            let replacement = match &rule.params {
                None => {
                    i += 1;
                    relocate(&rule.body, token.location)
                }
                Some(params) => {
                    if tokens.get(i + 1).map(|t| &t.kind) != Some(&TokenKind::LParen) {
                        // Name of a function-like macro without arguments
                        out.push(token.clone());
                        i += 1;
                        continue;
                    }
                    let (args, next) = collect_args(tokens, i + 1, token)?;
                    i = next;
                    substitute(rule, params, args, token)?
                }
            };

            if depth >= max_depth {
                return Err(LexError::new(
                    LexErrorKind::MacroDepthExceeded,
                    format!(
                        "Macro expansion of '{}' exceeds the depth limit of {}",
                        rule.name, max_depth
                    ),
                    token.location,
                ));
            }
            self.expand_seq(&replacement, depth + 1, max_depth, out)?;
        }
        Ok(())
    }
}

/// Copy a body, moving every token to the invocation site.
fn relocate(body: &[Token], location: SourceLocation) -> Vec<Token> {
    body.iter()
        .map(|t| Token {
            location,
            ..t.clone()
        })
        .collect()
}

/// Gather the arguments of an invocation whose `(` is at `open`.
/// Returns the arguments and the index just past the closing `)`.
fn collect_args(
    tokens: &[Token],
    open: usize,
    invocation: &Token,
) -> Result<(Vec<Vec<Token>>, usize), LexError> {
    let mut args = vec![Vec::new()];
    let mut depth = 0usize;
    let mut i = open + 1;

    while let Some(token) = tokens.get(i) {
        match token.kind {
            TokenKind::LParen => depth += 1,
            TokenKind::RParen if depth == 0 => {
                if args.len() == 1 && args[0].is_empty() {
                    args.clear();
                }
                return Ok((args, i + 1));
            }
            TokenKind::RParen => depth -= 1,
            TokenKind::Comma if depth == 0 => {
                args.push(Vec::new());
                i += 1;
                continue;
            }
            TokenKind::Eof => break,
            _ => {}
        }
        if let Some(current) = args.last_mut() {
            current.push(token.clone());
        }
        i += 1;
    }

    Err(LexError::new(
        LexErrorKind::Macro,
        format!(
            "Unterminated argument list for macro '{}'",
            invocation.text
        ),
        invocation.location,
    ))
}

/// Paste `args` into the body of a function-like macro.
fn substitute(
    rule: &MacroRule,
    params: &[String],
    args: Vec<Vec<Token>>,
    invocation: &Token,
) -> Result<Vec<Token>, LexError> {
    if args.len() != params.len() {
        return Err(LexError::new(
            LexErrorKind::Macro,
            format!(
                "Macro '{}' expects {} argument(s), got {}",
                rule.name,
                params.len(),
                args.len()
            ),
            invocation.location,
        ));
    }

    let mut out = Vec::new();
    for token in &rule.body {
        let param = match token.kind {
            TokenKind::Ident => params.iter().position(|p| *p == token.text),
            _ => None,
        };
        match param {
            Some(index) => out.extend(relocate(&args[index], invocation.location)),
            None => out.push(Token {
                location: invocation.location,
                ..token.clone()
            }),
        }
    }
    Ok(out)
}
