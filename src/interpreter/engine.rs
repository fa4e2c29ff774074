//! Interpreter state and entry points
//!
//! [`Interpreter`] executes a parsed (or canonicalized) [`Program`] by walking
//! its AST. Each call gets a [`StackFrame`] holding a stack of block scopes.
//! Statement and expression execution live in `statements.rs` and
//! `expressions.rs`; `printf` lives in `builtins.rs`.

use crate::interpreter::errors::RuntimeError;
use crate::interpreter::value::Value;
use crate::parser::ast::*;
use rustc_hash::FxHashMap;
use tracing::debug;

/// Default number of statements and loop iterations a run may take.
pub const DEFAULT_STEP_LIMIT: u64 = 10_000_000;

/// Maximum nesting of user function calls.
pub const MAX_CALL_DEPTH: usize = 256;

/// Signal raised by `return`, checked after every statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ControlFlow {
    Normal,
    Return,
}

/// A user function, indexed by name.
#[derive(Debug, Clone)]
pub(crate) struct FunctionDef {
    pub return_type: Type,
    pub params: Vec<Param>,
    pub body: Vec<AstNode>,
    pub location: SourceLocation,
}

/// A local variable with its declared type
#[derive(Debug, Clone)]
pub(crate) struct LocalVar {
    pub var_type: Type,
    pub value: Value,
}

/// A single function's activation record
#[derive(Debug)]
pub(crate) struct StackFrame {
    pub function: String,
    pub scopes: Vec<FxHashMap<String, LocalVar>>,
}

impl StackFrame {
    fn new(function: &str) -> Self {
        StackFrame {
            function: function.to_string(),
            scopes: vec![FxHashMap::default()],
        }
    }
}

/// The interpreter that executes a C program
pub struct Interpreter {
    /// Function definitions (name -> FunctionDef)
    pub(crate) function_defs: FxHashMap<String, FunctionDef>,

    /// Call stack
    pub(crate) frames: Vec<StackFrame>,

    /// Text written by `printf`
    pub(crate) output: String,

    /// Current source location being executed
    pub(crate) current_location: SourceLocation,

    pub(crate) control_flow: ControlFlow,

    /// Value of the `return` that set `control_flow`
    pub(crate) return_value: Option<Value>,

    steps: u64,
    step_limit: u64,
}

impl Interpreter {
    /// Create an interpreter for `program`; function bodies are copied out of it.
    pub fn new(program: &Program) -> Self {
        let mut function_defs = FxHashMap::default();
        for node in &program.nodes {
            if let AstNode::FunctionDecl {
                name,
                return_type,
                params,
                body,
                location,
            } = node
            {
                function_defs.insert(
                    name.clone(),
                    FunctionDef {
                        return_type: return_type.clone(),
                        params: params.clone(),
                        body: body.statements().to_vec(),
                        location: *location,
                    },
                );
            }
        }

        Interpreter {
            function_defs,
            frames: Vec::new(),
            output: String::new(),
            current_location: SourceLocation::new(1, 1),
            control_flow: ControlFlow::Normal,
            return_value: None,
            steps: 0,
            step_limit: DEFAULT_STEP_LIMIT,
        }
    }

    pub fn with_step_limit(mut self, limit: u64) -> Self {
        self.step_limit = limit;
        self
    }

    /// Run `main()` and return its exit status.
    pub fn run(&mut self) -> Result<i64, RuntimeError> {
        if !self.function_defs.contains_key("main") {
            return Err(RuntimeError::NoMainFunction);
        }
        self.call("main", &[])
    }

    /// Call the function `name` with integer arguments.
    pub fn call(&mut self, name: &str, args: &[i64]) -> Result<i64, RuntimeError> {
        let args = args.iter().map(|&n| Value::Int(n)).collect();
        let location = self.current_location;
        match self.call_function(name, args, location)? {
            Value::Int(n) => Ok(n),
            other => Err(RuntimeError::TypeError {
                expected: "integer".to_string(),
                got: other.kind().to_string(),
                location,
            }),
        }
    }

    /// Everything `printf` has written so far.
    pub fn output(&self) -> &str {
        &self.output
    }

    /// Steps taken so far.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Count one unit of work against the step budget.
    pub(crate) fn tick(&mut self) -> Result<(), RuntimeError> {
        self.steps += 1;
        if self.steps > self.step_limit {
            return Err(RuntimeError::StepLimitExceeded {
                limit: self.step_limit,
            });
        }
        Ok(())
    }

    pub(crate) fn call_function(
        &mut self,
        name: &str,
        args: Vec<Value>,
        location: SourceLocation,
    ) -> Result<Value, RuntimeError> {
        let func_def = self
            .function_defs
            .get(name)
            .cloned()
            .ok_or_else(|| RuntimeError::UndefinedFunction {
                name: name.to_string(),
                location,
            })?;

        if args.len() != func_def.params.len() {
            return Err(RuntimeError::ArgumentCountMismatch {
                function: name.to_string(),
                expected: func_def.params.len(),
                got: args.len(),
                location,
            });
        }
        if self.frames.len() >= MAX_CALL_DEPTH {
            return Err(RuntimeError::CallDepthExceeded {
                limit: MAX_CALL_DEPTH,
                location,
            });
        }

        self.frames.push(StackFrame::new(name));
        for (param, value) in func_def.params.iter().zip(args) {
            let value = Self::coerce_value_to_type(value, &param.param_type, location)?;
            self.declare_var(&param.name, &param.param_type, value);
        }

        self.current_location = func_def.location;
        let saved_return_value = self.return_value.take();
        let result = self.execute_function_body(&func_def.body);
        let return_value = self.return_value.take();
        self.return_value = saved_return_value;
        self.control_flow = ControlFlow::Normal;
        let frame = self.frames.pop();
        result?;

        if let Some(frame) = frame {
            debug!(function = %frame.function, steps = self.steps, "returned");
        }
        self.current_location = location;

        match (func_def.return_type.base, return_value) {
            (BaseType::Void, _) if !func_def.return_type.is_pointer() => Ok(Value::Int(0)),
            (_, Some(value)) => Self::coerce_value_to_type(value, &func_def.return_type, location),
            (_, None) => Ok(Value::Int(0)),
        }
    }

    fn execute_function_body(&mut self, body: &[AstNode]) -> Result<(), RuntimeError> {
        for stmt in body {
            self.execute_statement(stmt)?;
            if self.control_flow == ControlFlow::Return {
                break;
            }
        }
        Ok(())
    }

    /// Truncate an integer to `ty`'s width; strings pass through untouched.
    pub(crate) fn coerce_value_to_type(
        value: Value,
        ty: &Type,
        location: SourceLocation,
    ) -> Result<Value, RuntimeError> {
        match value {
            Value::Int(n) => Ok(Value::Int(ty.wrap(n))),
            Value::Str(_) if ty.is_pointer() => Ok(value),
            Value::Str(_) => Err(RuntimeError::TypeError {
                expected: ty.to_string(),
                got: value.kind().to_string(),
                location,
            }),
            Value::Uninitialized => Ok(Value::Uninitialized),
        }
    }

    // ===== Scopes =====

    pub(crate) fn enter_scope(&mut self) {
        if let Some(frame) = self.frames.last_mut() {
            frame.scopes.push(FxHashMap::default());
        }
    }

    pub(crate) fn exit_scope(&mut self) {
        if let Some(frame) = self.frames.last_mut() {
            frame.scopes.pop();
        }
    }

    pub(crate) fn declare_var(&mut self, name: &str, var_type: &Type, value: Value) {
        if let Some(scope) = self.frames.last_mut().and_then(|f| f.scopes.last_mut()) {
            scope.insert(
                name.to_string(),
                LocalVar {
                    var_type: var_type.clone(),
                    value,
                },
            );
        }
    }

    fn lookup_var_mut(&mut self, name: &str) -> Option<&mut LocalVar> {
        self.frames
            .last_mut()?
            .scopes
            .iter_mut()
            .rev()
            .find_map(|scope| scope.get_mut(name))
    }

    pub(crate) fn read_var(
        &mut self,
        name: &str,
        location: SourceLocation,
    ) -> Result<Value, RuntimeError> {
        let var = self
            .lookup_var_mut(name)
            .ok_or_else(|| RuntimeError::UndefinedVariable {
                name: name.to_string(),
                location,
            })?;
        if !var.value.is_initialized() {
            return Err(RuntimeError::UninitializedRead {
                var: name.to_string(),
                location,
            });
        }
        Ok(var.value.clone())
    }

    /// Store `value` into `name`, returning what was actually stored.
    pub(crate) fn write_var(
        &mut self,
        name: &str,
        value: Value,
        location: SourceLocation,
    ) -> Result<Value, RuntimeError> {
        let var = self
            .lookup_var_mut(name)
            .ok_or_else(|| RuntimeError::UndefinedVariable {
                name: name.to_string(),
                location,
            })?;
        let stored = Self::coerce_value_to_type(value, &var.var_type, location)?;
        var.value = stored.clone();
        Ok(stored)
    }
}
