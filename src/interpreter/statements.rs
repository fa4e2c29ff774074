//! Statement execution
//!
//! Adds `impl Interpreter` methods for declarations, `if`, `for` (which also
//! covers `while`), `return` and blocks. Every statement and every loop
//! iteration counts against the step budget.

use crate::interpreter::engine::{ControlFlow, Interpreter};
use crate::interpreter::errors::RuntimeError;
use crate::interpreter::value::Value;
use crate::parser::ast::*;

impl Interpreter {
    pub(crate) fn execute_statement(&mut self, stmt: &AstNode) -> Result<(), RuntimeError> {
        self.tick()?;
        self.current_location = stmt.location();

        match stmt {
            AstNode::VarDecl {
                name,
                var_type,
                init,
                location,
            } => self.execute_var_decl(name, var_type, init.as_deref(), *location),

            AstNode::Return { value, .. } => self.execute_return(value.as_deref()),

            AstNode::If {
                condition,
                then_branch,
                else_branch,
                ..
            } => self.execute_if(condition, then_branch, else_branch.as_deref()),

            AstNode::ForLoop {
                init,
                condition,
                step,
                body,
                ..
            } => self.execute_for(init.as_deref(), condition.as_deref(), step.as_deref(), body),

            AstNode::Block { statements, .. } => self.execute_block(statements),

            AstNode::Assign { .. }
            | AstNode::BinaryOp { .. }
            | AstNode::UnaryOp { .. }
            | AstNode::Literal(..)
            | AstNode::Identifier(..)
            | AstNode::Call { .. } => {
                self.evaluate_expr(stmt)?;
                Ok(())
            }

            AstNode::FunctionDecl { name, location, .. } => Err(RuntimeError::UnsupportedOperation {
                message: format!("nested function '{}'", name),
                location: *location,
            }),
        }
    }

    fn execute_var_decl(
        &mut self,
        name: &str,
        var_type: &Type,
        init: Option<&AstNode>,
        location: SourceLocation,
    ) -> Result<(), RuntimeError> {
        let value = match init {
            Some(init) => {
                let value = self.evaluate_expr(init)?;
                Self::coerce_value_to_type(value, var_type, location)?
            }
            None => Value::Uninitialized,
        };
        self.declare_var(name, var_type, value);
        Ok(())
    }

    fn execute_return(&mut self, value: Option<&AstNode>) -> Result<(), RuntimeError> {
        self.return_value = match value {
            Some(expr) => Some(self.evaluate_expr(expr)?),
            None => None,
        };
        self.control_flow = ControlFlow::Return;
        Ok(())
    }

    pub(crate) fn value_to_bool(
        value: &Value,
        location: SourceLocation,
    ) -> Result<bool, RuntimeError> {
        match value {
            Value::Int(n) => Ok(*n != 0),
            other => Err(RuntimeError::TypeError {
                expected: "integer condition".to_string(),
                got: other.kind().to_string(),
                location,
            }),
        }
    }

    fn execute_if(
        &mut self,
        condition: &AstNode,
        then_branch: &AstNode,
        else_branch: Option<&AstNode>,
    ) -> Result<(), RuntimeError> {
        let cond_val = self.evaluate_expr(condition)?;
        if Self::value_to_bool(&cond_val, condition.location())? {
            self.execute_branch(then_branch)
        } else if let Some(else_branch) = else_branch {
            self.execute_branch(else_branch)
        } else {
            Ok(())
        }
    }

    /// Run a branch or loop body in its own scope.
    fn execute_branch(&mut self, body: &AstNode) -> Result<(), RuntimeError> {
        self.execute_block(body.statements())
    }

    fn execute_block(&mut self, statements: &[AstNode]) -> Result<(), RuntimeError> {
        self.enter_scope();
        for stmt in statements {
            if let Err(e) = self.execute_statement(stmt) {
                self.exit_scope();
                return Err(e);
            }
            if self.control_flow != ControlFlow::Normal {
                break;
            }
        }
        self.exit_scope();
        Ok(())
    }

    fn execute_for(
        &mut self,
        init: Option<&AstNode>,
        condition: Option<&AstNode>,
        step: Option<&AstNode>,
        body: &AstNode,
    ) -> Result<(), RuntimeError> {
        // A declaration in the header is scoped to the loop
        self.enter_scope();
        let result = self.run_loop(init, condition, step, body);
        self.exit_scope();
        result
    }

    fn run_loop(
        &mut self,
        init: Option<&AstNode>,
        condition: Option<&AstNode>,
        step: Option<&AstNode>,
        body: &AstNode,
    ) -> Result<(), RuntimeError> {
        // `int a = 0, b = 1` arrives as a block; its declarations belong to the loop scope
        for stmt in init.map(AstNode::statements).unwrap_or_default() {
            self.execute_statement(stmt)?;
        }

        loop {
            self.tick()?;
            if let Some(cond) = condition {
                let cond_val = self.evaluate_expr(cond)?;
                if !Self::value_to_bool(&cond_val, cond.location())? {
                    break;
                }
            }

            self.execute_branch(body)?;
            if self.control_flow == ControlFlow::Return {
                break;
            }

            if let Some(step) = step {
                self.evaluate_expr(step)?;
            }
        }
        Ok(())
    }
}
