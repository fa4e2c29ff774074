//! # Introduction
//!
//! cequiv decides whether two programs written in a small imperative subset
//! of C compute the same thing. Both programs are rewritten into a canonical
//! form that erases declaration style, redundant arithmetic, dead stores,
//! loop direction and variable names; the canonical forms are then compared
//! structurally.
//!
//! ## Pipeline
//!
//! ```text
//! Source → Lexer (+ macros) → Parser → AST → Canonicalizer → Comparator → Verdict
//! ```
//!
//! 1. [`parser`] tokenises the source, expands `#define` macros and builds an
//!    AST. The AST prints back as C.
//! 2. [`canon`] runs the five canonicalization passes.
//! 3. [`compare`] fingerprints canonical forms and reports the first point of
//!    divergence.
//! 4. [`engine`] ties the stages together behind [`compare()`] and
//!    [`canonicalize()`].
//! 5. [`interpreter`] executes a program, raw or canonical, so the two can be
//!    checked to behave alike.
//!
//! ## Supported C subset
//!
//! Types: `void`, `char`, `short`, `int`, `long`, `long long` with
//! `signed`/`unsigned`/`const`; pointers parse but make a comparison
//! `Unsupported`.
//! Control flow: `if/else`, `while`, `for`, `return`.
//! Built-ins: `printf` (interpreter only).

pub mod canon;
pub mod compare;
pub mod engine;
pub mod interpreter;
pub mod parser;

pub use compare::{DivergencePath, Fingerprint, PathSegment, Verdict};
pub use engine::{
    canonicalize, canonicalize_with, compare, CanonicalForm, CompareOptions, EngineError,
};
