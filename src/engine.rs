//! Engine entry points
//!
//! [`compare`] takes two source strings through the whole pipeline:
//!
//! ```text
//! source → Lexer (+ macros) → Parser → canonicalize_program → CanonicalForm
//!                                                       └──► compare_forms → Verdict
//! ```
//!
//! Both inputs are lexed and parsed before either is canonicalized, so a
//! syntax error in either input is always reported ahead of a
//! canonicalization error.

use crate::canon::{canonicalize_program, CanonicalizationError};
use crate::compare::{compare_forms, program_fingerprint, Fingerprint, Verdict};
use crate::parser::ast::Program;
use crate::parser::lexer::{LexError, Lexer};
use crate::parser::macros::DEFAULT_MAX_EXPANSION_DEPTH;
use crate::parser::parse::{ParseError, Parser};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::{debug, info, info_span, warn};

/// Default cap on fixed-point iterations of the canonicalization passes.
pub const DEFAULT_MAX_FIXED_POINT_ITERATIONS: usize = 1000;

/// Knobs for a comparison. Missing fields deserialize to their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompareOptions {
    pub max_macro_expansion_depth: usize,
    pub max_fixed_point_iterations: usize,
    /// Report `Unsupported` comparisons as `Equivalent`
    pub treat_unsupported_as_equivalent: bool,
}

impl Default for CompareOptions {
    fn default() -> Self {
        CompareOptions {
            max_macro_expansion_depth: DEFAULT_MAX_EXPANSION_DEPTH,
            max_fixed_point_iterations: DEFAULT_MAX_FIXED_POINT_ITERATIONS,
            treat_unsupported_as_equivalent: false,
        }
    }
}

impl CompareOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_macro_expansion_depth(mut self, depth: usize) -> Self {
        self.max_macro_expansion_depth = depth;
        self
    }

    pub fn with_max_fixed_point_iterations(mut self, iterations: usize) -> Self {
        self.max_fixed_point_iterations = iterations;
        self
    }

    pub fn with_treat_unsupported_as_equivalent(mut self, enabled: bool) -> Self {
        self.treat_unsupported_as_equivalent = enabled;
        self
    }
}

/// Which of the two compared sources an error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Input {
    A,
    B,
}

impl fmt::Display for Input {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Input::A => "A",
            Input::B => "B",
        })
    }
}

/// Errors surfaced by [`compare`] and [`canonicalize`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("input {input}: {source}")]
    Lex {
        input: Input,
        #[source]
        source: LexError,
    },

    #[error("input {input}: {source}")]
    Parse {
        input: Input,
        #[source]
        source: ParseError,
    },

    #[error("input {input}: {source}")]
    Canonicalization {
        input: Input,
        #[source]
        source: CanonicalizationError,
    },
}

impl EngineError {
    /// The input the error was raised for.
    pub fn input(&self) -> Input {
        match self {
            EngineError::Lex { input, .. }
            | EngineError::Parse { input, .. }
            | EngineError::Canonicalization { input, .. } => *input,
        }
    }
}

/// A program in canonical form together with its structural fingerprint.
#[derive(Debug, Clone)]
pub struct CanonicalForm {
    pub program: Program,
    pub fingerprint: Fingerprint,
}

impl CanonicalForm {
    fn new(program: Program) -> Self {
        let fingerprint = program_fingerprint(&program);
        CanonicalForm {
            program,
            fingerprint,
        }
    }
}

/// Lex and parse one source.
fn parse_source(
    source: &str,
    input: Input,
    options: &CompareOptions,
) -> Result<Program, EngineError> {
    let tokens = Lexer::new(source)
        .with_max_expansion_depth(options.max_macro_expansion_depth)
        .tokenize()
        .map_err(|source| EngineError::Lex { input, source })?;
    let program = Parser::from_tokens(tokens)
        .parse_program()
        .map_err(|source| EngineError::Parse { input, source })?;
    debug!(%input, functions = program.nodes.len(), "parsed");
    Ok(program)
}

fn canonical_form(
    program: Program,
    input: Input,
    options: &CompareOptions,
) -> Result<CanonicalForm, EngineError> {
    let program = canonicalize_program(program, options)
        .map_err(|source| EngineError::Canonicalization { input, source })?;
    Ok(CanonicalForm::new(program))
}

/// Canonicalize a single source with default options.
pub fn canonicalize(source: &str) -> Result<CanonicalForm, EngineError> {
    canonicalize_with(source, &CompareOptions::default())
}

pub fn canonicalize_with(
    source: &str,
    options: &CompareOptions,
) -> Result<CanonicalForm, EngineError> {
    let program = parse_source(source, Input::A, options)?;
    canonical_form(program, Input::A, options)
}

/// Decide whether two sources are equivalent.
pub fn compare(a: &str, b: &str, options: &CompareOptions) -> Result<Verdict, EngineError> {
    let span = info_span!("compare", len_a = a.len(), len_b = b.len());
    let _enter = span.enter();

    let program_a = parse_source(a, Input::A, options)?;
    let program_b = parse_source(b, Input::B, options)?;
    let form_a = canonical_form(program_a, Input::A, options)?;
    let form_b = canonical_form(program_b, Input::B, options)?;

    let verdict = match compare_forms(&form_a, &form_b) {
        Verdict::Unsupported(reason) if options.treat_unsupported_as_equivalent => {
            warn!(%reason, "treating unsupported comparison as equivalent");
            Verdict::Equivalent
        }
        verdict => verdict,
    };
    info!(
        %verdict,
        fingerprint_a = %form_a.fingerprint,
        fingerprint_b = %form_b.fingerprint,
        "compared"
    );
    Ok(verdict)
}
