//! Property-based tests for the challenge sandbox.
//!
//! Run with: cargo test --release prop_sandbox

#![allow(clippy::unwrap_used)]

use proptest::prelude::*;

use code_quest::script::{Interpreter, Limits, Value, parse};
use code_quest::{Catalog, Evaluator};

fn call(source: &str, entry: &str, args: Vec<Value>) -> Value {
    let module = parse(source).unwrap();
    let mut interp = Interpreter::new(Limits::default());
    interp.load(&module).unwrap();
    let def = interp.function(entry).unwrap();
    interp.invoke(&def, args).unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    /// Grading arbitrary text never panics and always yields a verdict.
    #[test]
    fn prop_evaluator_total(code in "\\PC{0,160}", slot in 0usize..3) {
        let catalog = Catalog::builtin();
        let results = Evaluator::default().evaluate(catalog.by_index(slot), &code);
        prop_assert!(!results.is_empty());
    }

    /// Grading code-shaped noise never panics either.
    #[test]
    fn prop_evaluator_total_on_code(
        body in prop::collection::vec(
            prop_oneof![
                Just("    x = [i * 2 for i in range(n)]"),
                Just("    while n > 0:"),
                Just("        n -= 1"),
                Just("    return x"),
                Just("    return n // 0"),
                Just("    if n:"),
                Just("        print(n)"),
                Just("    x = x[1:]"),
                Just("  pass"),
            ],
            0..8,
        )
    ) {
        let code = format!("def count_down(n):\n{}", body.join("\n"));
        let catalog = Catalog::builtin();
        let results = Evaluator::default().evaluate(catalog.by_id("find-bug").unwrap(), &code);
        prop_assert!(!results.is_empty());
    }

    /// Floor division and modulo agree with each other for any signs.
    #[test]
    fn prop_divmod_identity(a in -10_000i64..10_000, b in -100i64..100) {
        prop_assume!(b != 0);
        let q = call("def f(a, b):\n    return a // b\n", "f", vec![Value::Int(a), Value::Int(b)]);
        let r = call("def f(a, b):\n    return a % b\n", "f", vec![Value::Int(a), Value::Int(b)]);
        let (Value::Int(q), Value::Int(r)) = (q, r) else {
            panic!("non-int result");
        };
        prop_assert_eq!(q * b + r, a);
        prop_assert!(r == 0 || (r < 0) == (b < 0));
    }

    /// The array-sum solution agrees with Rust's sum.
    #[test]
    fn prop_sum_matches(xs in prop::collection::vec(-1000i64..1000, 0..50)) {
        let list = Value::List(xs.iter().copied().map(Value::Int).collect());
        let got = call("def array_sum(numbers):\n    return sum(numbers)\n", "array_sum", vec![list]);
        prop_assert_eq!(got, Value::Int(xs.iter().sum()));
    }
}
