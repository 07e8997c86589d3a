//! Mocks driven through the harness, the way test code uses them

mod common;

use rstest::rstest;
use serde_json::{json, Value};
use std::sync::Arc;
use tally::{CallExpectation, Mockable, Replacement, TestError, TestResult, PASSTHROUGH};

/// `foo` delegates to `bar`, so overriding `bar` changes what `foo` returns
fn test_module() -> Mockable {
    Mockable::new("testMod")
        .with_function("foo", |this, args| this.call("bar", args))
        .with_function("bar", |_, args| Ok(json!(int(&args[0]) + int(&args[1]))))
}

fn int(v: &Value) -> i64 {
    v.as_i64().unwrap_or_default()
}

#[rstest]
#[case::with_a_function(
    Replacement::function(|_, args| Ok(json!(int(&args[0]) * int(&args[1])))),
    json!(12)
)]
#[case::with_a_value(Replacement::value(42), json!(42))]
#[case::with_passthrough(PASSTHROUGH, json!(7))]
fn test_mock_bar(#[case] replacement: Replacement, #[case] expected: Value) {
    let (mut h, out) = common::harness();
    let module = test_module();

    let m = module.clone();
    h.suite("mock a module", move |s| {
        let setup = m.clone();
        s.before_each(move |t| {
            t.mock().new_mock(&setup);
            Ok(())
        });
        let teardown = m.clone();
        s.after_each(move |t| {
            t.mock().unload(&teardown);
            Ok(())
        });
        s.test("mock testMod.bar", move |t| {
            t.mock().expect(&m, "bar", replacement)?;

            let r = m.call("foo", &[json!(3), json!(4)])?;

            t.assert_equal(r, expected)?;
            t.assert_call(&m, "bar", 1)?;
            t.assert_call(&m, "bar", json!([3, 4]))
        });
    });

    assert_eq!(out.markers(), ".");
    assert_eq!(h.assertions(), 3);
    assert!(h.failures().is_empty());
    // unloaded by afterEach: the real bar is back
    assert_eq!(module.call("foo", &[json!(3), json!(4)]).unwrap(), json!(7));
}

#[test]
fn test_call_counts_are_exact() {
    let (mut h, _) = common::harness();
    let module = test_module();

    let m = module.clone();
    h.suite("counting", move |s| {
        let n = 3;
        let counted = m.clone();
        s.test("n calls", move |t| {
            t.mock().new_mock(&counted);
            t.mock().expect(&counted, "bar", json!(0))?;
            for i in 0..n {
                counted.call("bar", &[json!(i), json!(i)])?;
            }
            t.assert_call(&counted, "bar", n)
        });
        let over = m.clone();
        s.test("n + 1 calls", move |t| t.assert_call(&over, "bar", n + 1));
    });

    let failures = h.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].test, "n + 1 calls");
    assert_eq!(failures[0].expected.as_deref(), Some("4"));
    assert_eq!(failures[0].actual.as_deref(), Some("3"));
}

#[test]
fn test_unload_restores_the_original_reference() {
    let (mut h, _) = common::harness();
    let module = test_module();
    let original = module.function("bar").unwrap();

    let m = module.clone();
    h.suite("unload", move |s| {
        s.test("restores", move |t| {
            t.mock().new_mock(&m);
            t.mock().expect(&m, "bar", PASSTHROUGH)?;
            m.call("bar", &[json!(1), json!(2)])?;
            t.mock().unload(&m);

            m.call("bar", &[json!(1), json!(2)])?;

            t.assert_false(t.mock().is_mocked(&m))?;
            // a fresh ledger starts empty: the call after unload went nowhere
            t.mock().new_mock(&m);
            t.assert_call(&m, "bar", 0)?;
            t.mock().unload(&m);
            Ok(())
        });
    });

    assert!(h.failures().is_empty());
    assert!(Arc::ptr_eq(&module.function("bar").unwrap(), &original));
}

#[test]
fn test_argument_match_failure_is_an_assertion_mismatch() {
    let (mut h, _) = common::harness();
    let module = test_module();

    h.suite("arguments", move |s| {
        s.test("wrong args", move |t| {
            t.mock().new_mock(&module);
            t.mock().expect(&module, "bar", PASSTHROUGH)?;
            module.call("foo", &[json!(1), json!(2)])?;
            let checked = t.assert_call(&module, "bar", vec![json!(2), json!(1)]);
            t.mock().unload(&module);
            checked
        });
    });

    let failure = &h.failures()[0];
    assert_eq!(failure.expected.as_deref(), Some("[2,1]"));
    assert_eq!(failure.actual.as_deref(), Some("[[1,2]]"));
    assert!(failure.stacktrace.contains("assertCall"));
}

#[rstest]
#[case::text(json!("once"))]
#[case::object(json!({"times": 1}))]
#[case::negative(json!(-2))]
fn test_invalid_expectation_is_rejected(#[case] expectation: Value) {
    let ctx = tally::TestContext::new();
    let module = test_module();
    ctx.mock().new_mock(&module);

    let err = ctx
        .assert_call(&module, "bar", CallExpectation::from(expectation))
        .unwrap_err();

    assert!(matches!(err, TestError::InvalidParameter(_)));
    assert_eq!(ctx.assertions(), 1);
}

#[test]
fn test_mocking_requires_new_mock_first() {
    let (mut h, _) = common::harness();
    let module = test_module();

    h.suite("not mocked", move |s| {
        s.test("expect", move |t| -> TestResult {
            t.mock().expect(&module, "bar", json!(1))?;
            Ok(())
        });
    });

    let failure = &h.failures()[0];
    assert!(failure.expected.is_none());
    assert_eq!(failure.stacktrace, "Error: module not mocked: testMod");
}
