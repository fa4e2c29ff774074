// Integration tests for the C interpreter

use cequiv::canonicalize;
use cequiv::interpreter::{Interpreter, RuntimeError};
use cequiv::parser::ast::Program;
use cequiv::parser::parse::Parser;
use pretty_assertions::assert_eq;

const FIXTURES: [&str; 7] = [
    include_str!("fixtures/fib.c"),
    include_str!("fixtures/fib_var_renamed.c"),
    include_str!("fixtures/fib_loop_reversed.c"),
    include_str!("fixtures/fib_macro.c"),
    include_str!("fixtures/fib_redundant_expressions.c"),
    include_str!("fixtures/fib_redundant_var.c"),
    include_str!("fixtures/fib_singular_decl.c"),
];

fn parse(source: &str) -> Program {
    let mut parser = Parser::new(source).expect("Parser creation failed");
    parser.parse_program().expect("Parsing failed")
}

#[test]
fn test_simple_arithmetic() {
    let source = r#"
        int main() {
            int x = 5;
            int y = 10;
            int z = x + y;
            return z;
        }
    "#;

    let program = parse(source);
    let mut interpreter = Interpreter::new(&program);
    let result = interpreter.run();

    assert_eq!(result, Ok(15));
}

#[test]
fn test_function_call() {
    let source = r#"
        int add(int a, int b) {
            return a + b;
        }

        int main() {
            int result = add(3, 4);
            return result;
        }
    "#;

    let program = parse(source);
    let mut interpreter = Interpreter::new(&program);
    assert_eq!(interpreter.run(), Ok(7));
}

#[test]
fn test_recursion() {
    let source = r#"
        int factorial(int n) {
            if (n <= 1) {
                return 1;
            }
            return n * factorial(n - 1);
        }

        int main() {
            return factorial(5);
        }
    "#;

    let program = parse(source);
    let mut interpreter = Interpreter::new(&program);
    assert_eq!(interpreter.run(), Ok(120));
}

#[test]
fn test_while_and_if_else() {
    let source = r#"
        int main() {
            int i = 0;
            int evens = 0;
            int odds = 0;
            while (i < 10) {
                if (i % 2 == 0) {
                    evens++;
                } else {
                    odds += 1;
                }
                i++;
            }
            return evens * 100 + odds;
        }
    "#;

    let program = parse(source);
    let mut interpreter = Interpreter::new(&program);
    assert_eq!(interpreter.run(), Ok(505));
}

#[test]
fn test_short_circuit() {
    let source = r#"
        int main() {
            int zero = 0;
            int ok = 0;
            if (zero != 0 && 10 / zero > 1) {
                ok = 1;
            }
            if (zero == 0 || 10 / zero > 1) {
                ok = ok + 2;
            }
            return ok;
        }
    "#;

    let program = parse(source);
    let mut interpreter = Interpreter::new(&program);
    assert_eq!(interpreter.run(), Ok(2));
}

#[test]
fn test_integer_truncation() {
    let source = r#"
        int main() {
            char c = 300;
            unsigned char u = 255;
            u = u + 1;
            return c + u;
        }
    "#;

    let program = parse(source);
    let mut interpreter = Interpreter::new(&program);
    assert_eq!(interpreter.run(), Ok(44));
}

#[test]
fn test_block_scoping() {
    let source = r#"
        int main() {
            int x = 1;
            {
                int x = 2;
                x = x + 1;
            }
            return x;
        }
    "#;

    let program = parse(source);
    let mut interpreter = Interpreter::new(&program);
    assert_eq!(interpreter.run(), Ok(1));
}

#[test]
fn test_printf_output() {
    let source = r#"
        int main() {
            printf("%d-%x %s%c\n", 42, 255, "ok", 33);
            return 0;
        }
    "#;

    let program = parse(source);
    let mut interpreter = Interpreter::new(&program);
    assert_eq!(interpreter.run(), Ok(0));
    assert_eq!(interpreter.output(), "42-ff ok!\n");
}

#[test]
fn test_fib_fixtures_run() {
    for source in FIXTURES {
        let program = parse(source);
        let mut interpreter = Interpreter::new(&program);
        assert_eq!(interpreter.run(), Ok(0));
        assert_eq!(interpreter.output(), "17711\n");
    }
}

#[test]
fn test_canonical_forms_behave_the_same() {
    for source in FIXTURES {
        let raw = parse(source);
        let canonical = canonicalize(source).expect("Canonicalization failed").program;

        for n in [1, 2, 10, 20, 40] {
            let expected = Interpreter::new(&raw).call("fib", &[n]);
            let actual = Interpreter::new(&canonical).call("fib", &[n]);
            assert_eq!(actual, expected, "fib({})", n);
        }

        let mut interpreter = Interpreter::new(&canonical);
        assert_eq!(interpreter.run(), Ok(0));
        assert_eq!(interpreter.output(), "17711\n");
    }
}

#[test]
fn test_canonical_forms_keep_narrowing() {
    let sources = [
        "int f(int n) { char b; int a; a = b = n; return a; }",
        "int f(int n) { int s = 0; for (char j = n; j != 0; --j) { s = s + 1; } return s; }",
    ];
    for source in sources {
        let raw = parse(source);
        let canonical = canonicalize(source).expect("Canonicalization failed").program;
        let expected = Interpreter::new(&raw).call("f", &[300]);
        assert_eq!(expected, Ok(44));
        assert_eq!(Interpreter::new(&canonical).call("f", &[300]), expected);
    }
}

#[test]
fn test_fib_of_zero_reads_uninitialized() {
    let program = parse(FIXTURES[0]);
    let result = Interpreter::new(&program).call("fib", &[0]);
    assert!(
        matches!(result, Err(RuntimeError::UninitializedRead { ref var, .. }) if var == "c"),
        "{:?}",
        result
    );
}

#[test]
fn test_division_by_zero() {
    let source = r#"
        int main() {
            int zero = 0;
            return 10 / zero;
        }
    "#;

    let program = parse(source);
    let result = Interpreter::new(&program).run();
    assert!(matches!(result, Err(RuntimeError::DivisionError { .. })), "{:?}", result);
}

#[test]
fn test_step_limit() {
    let source = r#"
        int main() {
            int i = 0;
            while (1) {
                i = i + 1;
            }
            return i;
        }
    "#;

    let program = parse(source);
    let mut interpreter = Interpreter::new(&program).with_step_limit(1000);
    let result = interpreter.run();
    assert_eq!(result, Err(RuntimeError::StepLimitExceeded { limit: 1000 }));
}

#[test]
fn test_call_errors() {
    let source = r#"
        int one(int x) {
            return 1;
        }

        int main() {
            return missing(2);
        }
    "#;

    let program = parse(source);
    let result = Interpreter::new(&program).run();
    assert!(matches!(result, Err(RuntimeError::UndefinedFunction { .. })), "{:?}", result);

    let result = Interpreter::new(&program).call("one", &[1, 2]);
    assert!(
        matches!(result, Err(RuntimeError::ArgumentCountMismatch { expected: 1, got: 2, .. })),
        "{:?}",
        result
    );

    let program = parse("int helper() { return 0; }");
    assert_eq!(Interpreter::new(&program).run(), Err(RuntimeError::NoMainFunction));
}
