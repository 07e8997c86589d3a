//! Built-in suites exercised by `tally-selftest`

use serde_json::{json, Value};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tally::{Harness, Mockable, Replacement, TestError, TestOptions, PASSTHROUGH};

/// Which demo suites to run
#[derive(Debug, Clone, Default)]
pub struct Selection {
    /// Only suites whose name contains this text
    pub filter: Option<String>,
    /// Also run the suite whose tests fail on purpose
    pub include_failing: bool,
}

impl Selection {
    fn wants(&self, suite: &str) -> bool {
        self.filter
            .as_deref()
            .map_or(true, |pattern| suite.contains(pattern))
    }
}

pub fn run(harness: &mut Harness, selection: &Selection) {
    type Demo = fn(&mut Harness, &str);
    let mut demos: Vec<(&str, Demo)> = vec![
        ("mock a module", mock_module),
        ("hook lifecycle", hook_lifecycle),
        ("assertions", assertions),
        ("pending work", pending_work),
    ];
    if selection.include_failing {
        demos.push(("failing showcase", failing_showcase));
    }

    for (name, demo) in demos {
        if selection.wants(name) {
            demo(harness, name);
        }
    }
}

fn int(v: &Value) -> i64 {
    v.as_i64().unwrap_or_default()
}

/// `foo` calls `bar`, so mocking `bar` is visible through `foo`
fn calculator() -> Mockable {
    Mockable::new("calculator")
        .with_function("foo", |this, args| this.call("bar", args))
        .with_function("bar", |_, args| Ok(json!(int(&args[0]) + int(&args[1]))))
}

fn mock_module(harness: &mut Harness, name: &str) {
    let calc = calculator();

    harness.suite(name, move |s| {
        let setup = calc.clone();
        s.before_each(move |t| {
            t.mock().new_mock(&setup);
            Ok(())
        });
        let teardown = calc.clone();
        s.after_each(move |t| {
            t.mock().unload(&teardown);
            Ok(())
        });

        let cases: [(&str, Replacement, i64); 3] = [
            (
                "mock bar with a function",
                Replacement::function(|_, args| Ok(json!(int(&args[0]) * int(&args[1])))),
                12,
            ),
            ("mock bar with a value", Replacement::value(42), 42),
            ("mock bar and allow passthrough", PASSTHROUGH, 7),
        ];
        for (description, replacement, expected) in cases {
            let calc = calc.clone();
            s.test(description, move |t| {
                t.mock().expect(&calc, "bar", replacement)?;

                let r = calc.call("foo", &[json!(3), json!(4)])?;

                t.assert_equal(r, json!(expected))?;
                t.assert_call(&calc, "bar", 1)?;
                t.assert_call(&calc, "bar", json!([3, 4]))
            });
        }
    });
}

fn hook_lifecycle(harness: &mut Harness, name: &str) {
    let x = Arc::new(AtomicI64::new(0));

    harness.suite(name, move |s| {
        let v = Arc::clone(&x);
        s.before_all(move |t| {
            t.assert_equal(v.load(Ordering::SeqCst), 0)?;
            v.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        let v = Arc::clone(&x);
        s.after_all(move |t| {
            v.fetch_sub(1, Ordering::SeqCst);
            t.assert_equal(v.load(Ordering::SeqCst), 0)
        });
        let v = Arc::clone(&x);
        s.before_each(move |_| {
            v.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        let v = Arc::clone(&x);
        s.after_each(move |_| {
            v.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        });

        for description in ["true is true", "false is false"] {
            let v = Arc::clone(&x);
            s.test(description, move |t| t.assert_equal(v.load(Ordering::SeqCst), 2));
        }
    });
}

fn assertions(harness: &mut Harness, name: &str) {
    harness.suite(name, |s| {
        s.test("booleans", |t| {
            t.assert_true(1 < 2)?;
            t.assert_false(2 < 1)
        });
        s.test("deep equality", |t| {
            t.assert_equal(json!({"a": [1, 2]}), json!({"a": [1, 2]}))?;
            t.assert_not_equal(json!({"a": 1}), json!({"b": 2}))
        });
        s.test("errors", |t| {
            t.assert_throws(|| "x".parse::<u32>())?;
            t.assert_throws_matching(
                || std::fs::read_to_string("/no/such/tally/fixture"),
                regex_matcher(r"(?i)no such file|not found|cannot find")?,
                None,
            )
        });
        s.test("results and options", |t| {
            let n = t.assert_ok("42".parse::<u32>())?;
            t.assert_equal(n, 42u32)?;
            t.assert_err("forty-two".parse::<u32>())?;
            let first = t.assert_some([3, 1, 2].iter().min().copied())?;
            t.assert_contains(&[1, 2, 3], &first)?;
            t.assert_none(Vec::<u8>::new().pop())
        });
    });
}

fn regex_matcher(pattern: &str) -> Result<tally::ErrorMatcher, TestError> {
    regex::Regex::new(pattern)
        .map(tally::ErrorMatcher::from)
        .map_err(|e| TestError::InvalidParameter(e.to_string()))
}

fn pending_work(harness: &mut Harness, name: &str) {
    harness.xsuite(name, |s| {
        s.test("not written yet", |t| t.assert_true(false));
    });
}

fn failing_showcase(harness: &mut Harness, name: &str) {
    harness.suite(name, |s| {
        s.test("one is two", |t| t.assert_equal(1, 2));
        s.test_with(
            "never finishes in time",
            TestOptions::with_timeout(Duration::from_millis(50)),
            |t| {
                thread::sleep(Duration::from_millis(250));
                t.assert_true(true)
            },
        );
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally::HarnessConfig;

    fn run_selection(selection: Selection) -> tally::RunSummary {
        let mut harness = Harness::new(HarnessConfig::plain())
            .unwrap()
            .with_output(std::io::sink());
        run(&mut harness, &selection);
        harness.terminate()
    }

    #[test]
    fn test_default_demos_pass() {
        let summary = run_selection(Selection::default());
        assert!(summary.is_success(), "{:?}", summary.failures);
        assert_eq!(summary.passed, 9);
        assert_eq!(summary.skipped, 1);
    }

    #[test]
    fn test_filter_selects_suites_by_name() {
        let summary = run_selection(Selection {
            filter: Some("mock".to_string()),
            include_failing: false,
        });
        assert_eq!(summary.passed, 3);
        assert_eq!(summary.assertions, 9);
    }

    #[test]
    fn test_failing_showcase_fails_twice() {
        let summary = run_selection(Selection {
            filter: Some("failing".to_string()),
            include_failing: true,
        });
        assert_eq!(summary.exit_status(), 2);
        assert!(summary.failures[1].stacktrace.contains("timeout"));
    }
}
