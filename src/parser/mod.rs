//! C source parser
//!
//! This module transforms C source text into an Abstract Syntax Tree (AST):
//! - [`lexer`]: Tokenization (source text → tokens), including `#define` handling
//! - [`macros`]: Macro table and expansion
//! - [`parse`]: Parsing (tokens → AST)
//! - [`ast`]: AST node definitions
//! - [`printer`]: AST → C source
//!
//! # Supported C Subset
//!
//! - Types: `void`, `char`, `short`, `int`, `long`, `long long`, with
//!   `signed`/`unsigned`/`const` and pointer declarators
//! - Statements: declarations, assignments, `if`/`else`, `while`, `for`, `return`
//! - Expressions: arithmetic, logical, bitwise, increments, function calls
//! - Preprocessor: `#define` (object-like and function-like); `#include` and
//!   `#pragma` are skipped
//!
//! # Parser Implementation
//!
//! Hand-written recursive descent parser with one function per precedence level.
//! No external parser generator dependencies.

pub mod ast;
mod declarations;
mod expressions;
pub mod lexer;
pub mod macros;
pub mod parse;
pub mod printer;
mod statements;
