//! Expression evaluation
//!
//! Integer arithmetic is 64-bit two's complement with wrapping, exactly the
//! arithmetic constant folding uses; results are truncated to the target's
//! C type only when stored. `&&` and `||` short-circuit.

use crate::canon::fold::eval_binary;
use crate::interpreter::engine::Interpreter;
use crate::interpreter::errors::RuntimeError;
use crate::interpreter::value::Value;
use crate::parser::ast::*;

impl Interpreter {
    /// Evaluate an expression and return its value
    pub(crate) fn evaluate_expr(&mut self, expr: &AstNode) -> Result<Value, RuntimeError> {
        let location = expr.location();

        match expr {
            AstNode::Literal(Literal::Int(n), _) => Ok(Value::Int(*n)),
            AstNode::Literal(Literal::Str(s), _) => Ok(Value::Str(s.clone())),

            AstNode::Identifier(name, _) => self.read_var(name, location),

            AstNode::Assign { target, value, .. } => {
                let value = self.evaluate_expr(value)?;
                self.write_var(target, value, location)
            }

            AstNode::BinaryOp {
                op: op @ (BinOp::And | BinOp::Or),
                left,
                right,
                ..
            } => {
                let left_val = self.evaluate_int(left)?;
                let short_circuit = match op {
                    BinOp::And => left_val == 0,
                    _ => left_val != 0,
                };
                if short_circuit {
                    return Ok(Value::Int(i64::from(*op == BinOp::Or)));
                }
                let right_val = self.evaluate_int(right)?;
                Ok(Value::Int(i64::from(right_val != 0)))
            }

            AstNode::BinaryOp {
                op, left, right, ..
            } => {
                let left_val = self.evaluate_int(left)?;
                let right_val = self.evaluate_int(right)?;
                self.evaluate_binary_op(*op, left_val, right_val, location)
            }

            AstNode::UnaryOp { op, operand, .. } => self.evaluate_unary_op(*op, operand, location),

            AstNode::Call { name, args, .. } => {
                let mut arg_values = Vec::with_capacity(args.len());
                for arg in args {
                    arg_values.push(self.evaluate_expr(arg)?);
                }
                self.execute_function_call(name, arg_values, location)
            }

            _ => Err(RuntimeError::UnsupportedOperation {
                message: "statement used as an expression".to_string(),
                location,
            }),
        }
    }

    /// Evaluate an expression that must produce an integer.
    fn evaluate_int(&mut self, expr: &AstNode) -> Result<i64, RuntimeError> {
        match self.evaluate_expr(expr)? {
            Value::Int(n) => Ok(n),
            other => Err(RuntimeError::TypeError {
                expected: "integer".to_string(),
                got: other.kind().to_string(),
                location: expr.location(),
            }),
        }
    }

    pub(crate) fn evaluate_binary_op(
        &self,
        op: BinOp,
        left: i64,
        right: i64,
        location: SourceLocation,
    ) -> Result<Value, RuntimeError> {
        match eval_binary(op, left, right) {
            Some(n) => Ok(Value::Int(n)),
            None => Err(match op {
                BinOp::Div => RuntimeError::DivisionError {
                    operation: "Division by zero".to_string(),
                    location,
                },
                BinOp::Mod => RuntimeError::DivisionError {
                    operation: "Modulo by zero".to_string(),
                    location,
                },
                _ => RuntimeError::UnsupportedOperation {
                    message: format!("shift by {} bits", right),
                    location,
                },
            }),
        }
    }

    pub(crate) fn evaluate_unary_op(
        &mut self,
        op: UnOp,
        operand: &AstNode,
        location: SourceLocation,
    ) -> Result<Value, RuntimeError> {
        match op {
            UnOp::Neg => Ok(Value::Int(self.evaluate_int(operand)?.wrapping_neg())),
            UnOp::Plus => Ok(Value::Int(self.evaluate_int(operand)?)),
            UnOp::Not => Ok(Value::Int(i64::from(self.evaluate_int(operand)? == 0))),
            UnOp::BitNot => Ok(Value::Int(!self.evaluate_int(operand)?)),
            UnOp::PreInc | UnOp::PreDec | UnOp::PostInc | UnOp::PostDec => {
                let AstNode::Identifier(name, _) = operand else {
                    return Err(RuntimeError::UnsupportedOperation {
                        message: format!("'{}' on a non-variable", op.symbol()),
                        location,
                    });
                };
                let old = match self.read_var(name, location)? {
                    Value::Int(n) => n,
                    other => {
                        return Err(RuntimeError::TypeError {
                            expected: "integer".to_string(),
                            got: other.kind().to_string(),
                            location,
                        })
                    }
                };
                let delta = if matches!(op, UnOp::PreInc | UnOp::PostInc) { 1 } else { -1 };
                let new = self.write_var(name, Value::Int(old.wrapping_add(delta)), location)?;
                match op {
                    UnOp::PreInc | UnOp::PreDec => Ok(new),
                    _ => Ok(Value::Int(old)),
                }
            }
            UnOp::Deref | UnOp::AddrOf => Err(RuntimeError::UnsupportedOperation {
                message: format!("pointer operator '{}'", op.symbol()),
                location,
            }),
        }
    }

    pub(crate) fn execute_function_call(
        &mut self,
        name: &str,
        args: Vec<Value>,
        location: SourceLocation,
    ) -> Result<Value, RuntimeError> {
        match name {
            "printf" => self.builtin_printf(&args, location),
            _ => self.call_function(name, args, location),
        }
    }
}
