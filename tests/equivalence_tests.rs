// Integration tests for program equivalence

use cequiv::{canonicalize, compare, CompareOptions, EngineError, Verdict};
use pretty_assertions::assert_eq;

const FIB: &str = include_str!("fixtures/fib.c");

const VARIANTS: [(&str, &str); 6] = [
    ("var renamed", include_str!("fixtures/fib_var_renamed.c")),
    ("loop reversed", include_str!("fixtures/fib_loop_reversed.c")),
    ("macro", include_str!("fixtures/fib_macro.c")),
    ("redundant expressions", include_str!("fixtures/fib_redundant_expressions.c")),
    ("redundant var", include_str!("fixtures/fib_redundant_var.c")),
    ("singular decl", include_str!("fixtures/fib_singular_decl.c")),
];

fn verdict(a: &str, b: &str) -> Verdict {
    compare(a, b, &CompareOptions::new()).unwrap_or_else(|e| panic!("comparison failed: {e}"))
}

#[test]
fn test_fib_variants_are_equivalent() {
    let base = canonicalize(FIB).expect("Canonicalization failed");
    for (name, source) in VARIANTS {
        assert_eq!(verdict(FIB, source), Verdict::Equivalent, "fib vs fib {}", name);

        let form = canonicalize(source).expect("Canonicalization failed");
        assert_eq!(form.fingerprint, base.fingerprint, "fingerprint of fib {}", name);
    }
}

#[test]
fn test_variants_pairwise() {
    for (name_a, a) in VARIANTS {
        for (name_b, b) in VARIANTS {
            assert_eq!(verdict(a, b), Verdict::Equivalent, "fib {} vs fib {}", name_a, name_b);
        }
    }
}

#[test]
fn test_reflexive() {
    assert_eq!(verdict(FIB, FIB), Verdict::Equivalent);
    let source = "int f(int *p) { return 1; }";
    assert!(matches!(verdict(source, source), Verdict::Unsupported(_)));
}

#[test]
fn test_canonical_form_is_a_fixed_point() {
    let sources = std::iter::once(FIB).chain(VARIANTS.iter().map(|(_, s)| *s));
    for source in sources {
        let form = canonicalize(source).expect("Canonicalization failed");
        let printed = form.program.to_string();
        let again = canonicalize(&printed).unwrap_or_else(|e| panic!("{e}\n{printed}"));
        assert_eq!(again.program.to_string(), printed);
        assert_eq!(again.fingerprint, form.fingerprint);
    }
}

#[test]
fn test_canonical_fib_text() {
    let form = canonicalize(FIB).expect("Canonicalization failed");
    let printed = form.program.to_string();
    assert!(printed.contains("unsigned long fib(unsigned long v0)"), "{printed}");
    assert!(printed.contains("for (v4 = 0; v4 != v0; v4 = v4 + 1) {"), "{printed}");
    assert!(printed.contains("v3 = v1 + v2;"), "{printed}");
    assert!(printed.contains("return v3;"), "{printed}");
}

#[test]
fn test_rename_invariance() {
    let a = "int add(int x, int y) { int s = x + y; return s; }";
    let b = "int add(int left, int right) { int total = left + right; return total; }";
    assert_eq!(verdict(a, b), Verdict::Equivalent);
}

#[test]
fn test_parameter_order_matters() {
    let a = "int sub(int x, int y) { return x - y; }";
    let b = "int sub(int x, int y) { return y - x; }";
    assert!(matches!(verdict(a, b), Verdict::NotEquivalent(_)));
}

#[test]
fn test_constant_cancellation() {
    let a = "int f(int x) { int y; y = x + 17 - 17; return y * 1; }";
    let b = "int f(int x) { int y; y = x; return y; }";
    assert_eq!(verdict(a, b), Verdict::Equivalent);
}

#[test]
fn test_dead_stores_removed() {
    let a = "int f(int x) { int t = x * 3; int u; u = t + 1; t = 4; return x; }";
    let b = "int f(int x) { return x; }";
    assert_eq!(verdict(a, b), Verdict::Equivalent);
}

#[test]
fn test_chained_assignment_through_char() {
    let chained = "int f() { char b; int a; a = b = 300; return a; }";
    let split = "int f() { char b; int a; a = 300; b = 300; return a; }";
    assert!(matches!(verdict(chained, split), Verdict::NotEquivalent(_)));

    let via_b = "int f() { char b; int a; b = 300; a = b; return a; }";
    assert_eq!(verdict(chained, via_b), Verdict::Equivalent);
}

#[test]
fn test_dead_store_with_call_is_not_dropped() {
    let a = "int g(int x) { return x; } int f(int x) { int t = g(x); return x; }";
    let b = "int g(int x) { return x; } int f(int x) { return x; }";
    assert!(matches!(verdict(a, b), Verdict::NotEquivalent(_)));
}

#[test]
fn test_loop_direction_requires_unused_counter() {
    let up = r#"
        int f(int n) {
            int s = 0;
            for (int j = 0; j != n; ++j) { s = s + j; }
            return s;
        }
    "#;
    let down = r#"
        int f(int n) {
            int s = 0;
            for (int j = n; j != 0; --j) { s = s + j; }
            return s;
        }
    "#;
    assert!(matches!(verdict(up, down), Verdict::NotEquivalent(_)));
}

#[test]
fn test_reversed_fixture_reading_counter_is_not_equivalent() {
    let reversed = VARIANTS[1].1;
    assert_eq!(verdict(FIB, reversed), Verdict::Equivalent);

    let read_counter = |source: &str| source.replace("c = a + b;", "c = a + b + j;");
    let (up, down) = (read_counter(FIB), read_counter(reversed));
    assert!(matches!(verdict(&up, &down), Verdict::NotEquivalent(_)));
    // Each mutated program still matches itself
    assert_eq!(verdict(&down, &down), Verdict::Equivalent);
}

#[test]
fn test_narrow_counter_direction_matters() {
    // A char counter started from n = 300 wraps to 44 and counts down to 0,
    // while counting up from 0 never reaches 300
    let down = "int f(long n) { int s = 0; for (char j = n; j != 0; --j) s = s + 1; return s; }";
    let up = "int f(long n) { int s = 0; for (char j = 0; j != n; ++j) s = s + 1; return s; }";
    assert!(matches!(verdict(down, up), Verdict::NotEquivalent(_)));

    let wide_down = down.replace("char j", "long j");
    let wide_up = up.replace("char j", "long j");
    assert_eq!(verdict(&wide_down, &wide_up), Verdict::Equivalent);
}

#[test]
fn test_loop_direction_with_while() {
    let up = "int f(int n) { int s = 0; for (int j = 0; j != n; j++) { s = s + 2; } return s; }";
    let down =
        "int f(int n) { int s = 0; int j = n; while (j != 0) { s = s + 2; j = j - 1; } return s; }";
    // Only `for` headers are normalized; the counter lives in the body here
    assert!(matches!(verdict(up, down), Verdict::NotEquivalent(_)));
}

#[test]
fn test_mutation_is_detected() {
    let mutated = FIB.replace("c = a + b;", "c = a + b + 1;");
    match verdict(FIB, &mutated) {
        Verdict::NotEquivalent(path) => {
            assert!(path.to_string().starts_with("fib/body["), "{}", path);
        }
        other => panic!("Expected NotEquivalent, got {:?}", other),
    }
}

#[test]
fn test_extra_function_diverges_at_root() {
    let extra = format!("{}\nint unused() {{ return 0; }}\n", FIB);
    match verdict(FIB, &extra) {
        Verdict::NotEquivalent(path) => assert!(path.is_root()),
        other => panic!("Expected NotEquivalent, got {:?}", other),
    }
}

#[test]
fn test_pointers_are_unsupported() {
    let a = "int f(int x) { int *p = &x; return *p; }";
    let b = "int f(int x) { return x; }";
    assert!(matches!(verdict(a, b), Verdict::Unsupported(_)));
}

#[test]
fn test_verdict_json() {
    let json = serde_json::to_string(&verdict(FIB, FIB)).unwrap();
    assert_eq!(json, r#"{"verdict":"equivalent"}"#);
}

#[test]
fn test_errors() {
    let options = CompareOptions::new();

    let err = compare(FIB, "int main() { return 0 }", &options).unwrap_err();
    assert!(matches!(err, EngineError::Parse { .. }), "{err}");

    let err = compare("int f() { return y; }", FIB, &options).unwrap_err();
    assert!(matches!(err, EngineError::Canonicalization { .. }), "{err}");

    let err = compare(FIB, "int f() { int x; int x; return 0; }", &options).unwrap_err();
    assert!(matches!(err, EngineError::Canonicalization { .. }), "{err}");

    let err = compare("int f() { return 1 @ 2; }", FIB, &options).unwrap_err();
    assert!(matches!(err, EngineError::Lex { .. }), "{err}");
}

#[test]
fn test_embedded_side_effect_rejected() {
    let err = compare("int f(int x) { return x++; }", FIB, &CompareOptions::new()).unwrap_err();
    assert!(matches!(err, EngineError::Canonicalization { .. }), "{err}");
}
