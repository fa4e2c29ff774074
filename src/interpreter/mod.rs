//! AST-walking interpreter
//!
//! Runs a [`Program`](crate::parser::ast::Program), raw or canonical, so that
//! equivalent programs can be checked to behave the same:
//! - [`engine`]: interpreter state, call frames and entry points
//! - [`errors`]: runtime error types
//! - [`value`]: runtime values
//!
//! # Execution Model
//!
//! Statements run one at a time against a stack of frames, each holding a
//! stack of block scopes. A step budget stops programs that never terminate.
//!
//! # Built-in Functions
//!
//! `printf` is implemented directly on the interpreter and writes into a
//! captured output buffer.

mod builtins;
pub mod engine;
pub mod errors;
mod expressions;
mod statements;
pub mod value;

pub use engine::Interpreter;
pub use errors::RuntimeError;
