//! Built-in function implementations
//!
//! Only `printf` is built in. Output is appended to the interpreter's output
//! buffer instead of going to stdout.
//!
//! # Format specifiers
//!
//! `%d`, `%i`, `%u`, `%x`, `%c`, `%s` and `%%`. The integer conversions take
//! an optional `l` or `ll` length modifier; without one the argument is
//! treated as a 32-bit `int`.

use crate::interpreter::engine::Interpreter;
use crate::interpreter::errors::RuntimeError;
use crate::interpreter::value::Value;
use crate::parser::ast::SourceLocation;
use tracing::trace;

impl Interpreter {
    pub(crate) fn builtin_printf(
        &mut self,
        args: &[Value],
        location: SourceLocation,
    ) -> Result<Value, RuntimeError> {
        let Some((format, rest)) = args.split_first() else {
            return Err(RuntimeError::InvalidPrintfFormat {
                message: "printf requires at least one argument".to_string(),
                location,
            });
        };
        let Value::Str(format) = format else {
            return Err(RuntimeError::InvalidPrintfFormat {
                message: "printf format must be a string literal".to_string(),
                location,
            });
        };

        let text = format_printf(format, rest, location)?;
        trace!(%text, "printf");
        self.output.push_str(&text);
        Ok(Value::Int(text.len() as i64))
    }
}

fn format_printf(
    format: &str,
    args: &[Value],
    location: SourceLocation,
) -> Result<String, RuntimeError> {
    let mut output = String::new();
    let mut chars = format.chars().peekable();
    let mut args = args.iter();

    let mut next_arg = |spec: char| {
        args.next().ok_or_else(|| RuntimeError::InvalidPrintfFormat {
            message: format!("Not enough arguments for %{}", spec),
            location,
        })
    };

    while let Some(ch) = chars.next() {
        if ch != '%' {
            output.push(ch);
            continue;
        }

        // Length modifier: none, `l` or `ll`
        let mut long = false;
        while chars.peek() == Some(&'l') {
            chars.next();
            long = true;
        }

        let Some(spec) = chars.next() else {
            return Err(RuntimeError::InvalidPrintfFormat {
                message: "Format string ends in '%'".to_string(),
                location,
            });
        };

        match spec {
            '%' => output.push('%'),
            'd' | 'i' | 'u' | 'x' | 'c' => {
                let n = match next_arg(spec)? {
                    Value::Int(n) => *n,
                    other => {
                        return Err(RuntimeError::InvalidPrintfFormat {
                            message: format!("%{} expects an integer, got {}", spec, other.kind()),
                            location,
                        })
                    }
                };
                match (spec, long) {
                    ('d' | 'i', false) => output.push_str(&(n as i32).to_string()),
                    ('d' | 'i', true) => output.push_str(&n.to_string()),
                    ('u', false) => output.push_str(&(n as u32).to_string()),
                    ('u', true) => output.push_str(&(n as u64).to_string()),
                    ('x', false) => output.push_str(&format!("{:x}", n as u32)),
                    ('x', true) => output.push_str(&format!("{:x}", n as u64)),
                    _ => output.push(n as u8 as char),
                }
            }
            's' => match next_arg(spec)? {
                Value::Str(s) => output.push_str(s),
                other => {
                    return Err(RuntimeError::InvalidPrintfFormat {
                        message: format!("%s expects a string, got {}", other.kind()),
                        location,
                    })
                }
            },
            other => {
                return Err(RuntimeError::InvalidPrintfFormat {
                    message: format!("Unsupported format specifier: %{}", other),
                    location,
                });
            }
        }
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn format(spec: &str, args: &[Value]) -> String {
        format_printf(spec, args, SourceLocation::default()).unwrap()
    }

    #[test]
    fn test_integer_conversions() {
        assert_eq!(format("%d\n", &[Value::Int(17711)]), "17711\n");
        assert_eq!(format("%i", &[Value::Int(-3)]), "-3");
        assert_eq!(format("%u", &[Value::Int(-1)]), "4294967295");
        assert_eq!(format("%lu", &[Value::Int(-1)]), "18446744073709551615");
        assert_eq!(format("%x", &[Value::Int(255)]), "ff");
        assert_eq!(format("%lld", &[Value::Int(1 << 40)]), "1099511627776");
        assert_eq!(format("%d", &[Value::Int(1 << 32)]), "0");
    }

    #[test]
    fn test_other_conversions() {
        assert_eq!(format("%c%c", &[Value::Int(104), Value::Int(105)]), "hi");
        assert_eq!(format("%s!", &[Value::Str("hey".into())]), "hey!");
        assert_eq!(format("100%%", &[]), "100%");
    }

    #[test]
    fn test_format_errors() {
        let location = SourceLocation::default();
        assert!(format_printf("%d", &[], location).is_err());
        assert!(format_printf("%f", &[Value::Int(1)], location).is_err());
        assert!(format_printf("%s", &[Value::Int(1)], location).is_err());
        assert!(format_printf("50%", &[], location).is_err());
    }
}
