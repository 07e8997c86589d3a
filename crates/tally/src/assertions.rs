//! Assertion primitives
//!
//! Every assertion counts itself on the [`TestContext`] before it checks
//! anything, so failing assertions are counted too. A failed check comes back
//! as [`TestError::AssertionMismatch`] pointing at the caller's source line,
//! ready to be propagated out of the test body with `?`.
//!
//! # API
//!
//! ## Basic
//! - `assert_true(value)` / `assert_false(value)`
//!
//! ## Equality
//! - `assert_equal(actual, expected)` / `assert_not_equal(actual, expected)`
//!
//! ## Errors
//! - `assert_throws(action)`: passes when the action returns `Err` or panics
//! - `assert_throws_matching(action, matcher, message)`
//!
//! ## Result / Option / collections
//! - `assert_ok`, `assert_err`, `assert_some`, `assert_none`, `assert_contains`
//!
//! ## Mocks
//! - `assert_call(mockable, name, count_or_args)`

use crate::context::TestContext;
use crate::error::{panic_message, TestError, TestResult};
use crate::mock::{CallExpectation, Mockable};
use regex::Regex;
use std::fmt::{Debug, Display};
use std::panic::{self, AssertUnwindSafe};

/// Which errors satisfy `assert_throws_matching`
#[derive(Debug, Clone)]
pub enum ErrorMatcher {
    /// Any error or panic
    Any,
    /// The error message contains this text
    Contains(String),
    /// The error message matches this pattern
    Pattern(Regex),
}

impl ErrorMatcher {
    pub fn matches(&self, message: &str) -> bool {
        match self {
            ErrorMatcher::Any => true,
            ErrorMatcher::Contains(needle) => message.contains(needle.as_str()),
            ErrorMatcher::Pattern(re) => re.is_match(message),
        }
    }

    fn describe(&self) -> String {
        match self {
            ErrorMatcher::Any => "an error".to_string(),
            ErrorMatcher::Contains(needle) => format!("an error containing {:?}", needle),
            ErrorMatcher::Pattern(re) => format!("an error matching /{}/", re.as_str()),
        }
    }
}

impl From<&str> for ErrorMatcher {
    fn from(needle: &str) -> Self {
        ErrorMatcher::Contains(needle.to_string())
    }
}

impl From<String> for ErrorMatcher {
    fn from(needle: String) -> Self {
        ErrorMatcher::Contains(needle)
    }
}

impl From<Regex> for ErrorMatcher {
    fn from(re: Regex) -> Self {
        ErrorMatcher::Pattern(re)
    }
}

impl TestContext {
    // ========================================================================
    // Basic assertions
    // ========================================================================

    #[track_caller]
    pub fn assert_true(&self, value: bool) -> TestResult {
        self.add_assert();
        if !value {
            return Err(TestError::mismatch("assertTrue", "true", "false"));
        }
        Ok(())
    }

    #[track_caller]
    pub fn assert_false(&self, value: bool) -> TestResult {
        self.add_assert();
        if value {
            return Err(TestError::mismatch("assertFalse", "false", "true"));
        }
        Ok(())
    }

    // ========================================================================
    // Equality assertions
    // ========================================================================

    /// Deep equality through `PartialEq`; both sides are rendered with `Debug`
    /// on failure.
    #[track_caller]
    pub fn assert_equal<A, E>(&self, actual: A, expected: E) -> TestResult
    where
        A: PartialEq<E> + Debug,
        E: Debug,
    {
        self.add_assert();
        if actual != expected {
            return Err(TestError::mismatch(
                "assertEqual",
                format!("{:?}", expected),
                format!("{:?}", actual),
            ));
        }
        Ok(())
    }

    #[track_caller]
    pub fn assert_not_equal<A, E>(&self, actual: A, expected: E) -> TestResult
    where
        A: PartialEq<E> + Debug,
        E: Debug,
    {
        self.add_assert();
        if actual == expected {
            return Err(TestError::mismatch(
                "assertNotEqual",
                format!("anything but {:?}", expected),
                format!("{:?}", actual),
            ));
        }
        Ok(())
    }

    // ========================================================================
    // Error assertions
    // ========================================================================

    /// Passes when `action` returns `Err` or panics
    #[track_caller]
    pub fn assert_throws<T, E, F>(&self, action: F) -> TestResult
    where
        F: FnOnce() -> Result<T, E>,
        E: Display,
    {
        self.assert_throws_matching(action, ErrorMatcher::Any, None)
    }

    /// Passes when `action` fails with an error (or panic) accepted by `matcher`.
    ///
    /// `message`, when given, replaces the matcher description as the expected
    /// side of the mismatch.
    #[track_caller]
    pub fn assert_throws_matching<T, E, F>(
        &self,
        action: F,
        matcher: impl Into<ErrorMatcher>,
        message: Option<&str>,
    ) -> TestResult
    where
        F: FnOnce() -> Result<T, E>,
        E: Display,
    {
        self.add_assert();
        let matcher = matcher.into();
        let expected = message
            .map(str::to_string)
            .unwrap_or_else(|| matcher.describe());

        let raised = match panic::catch_unwind(AssertUnwindSafe(action)) {
            Ok(Ok(_)) => None,
            Ok(Err(err)) => Some(err.to_string()),
            Err(payload) => Some(panic_message(payload.as_ref())),
        };

        match raised {
            None => Err(TestError::mismatch("assertThrows", expected, "no error")),
            Some(msg) if matcher.matches(&msg) => Ok(()),
            Some(msg) => Err(TestError::mismatch(
                "assertThrows",
                expected,
                format!("error {:?}", msg),
            )),
        }
    }

    // ========================================================================
    // Result / Option assertions
    // ========================================================================

    /// Asserts `Ok` and hands back the value
    #[track_caller]
    pub fn assert_ok<T, E: Debug>(&self, result: Result<T, E>) -> TestResult<T> {
        self.add_assert();
        match result {
            Ok(value) => Ok(value),
            Err(err) => Err(TestError::mismatch(
                "assertOk",
                "Ok(..)",
                format!("Err({:?})", err),
            )),
        }
    }

    /// Asserts `Err` and hands back the error
    #[track_caller]
    pub fn assert_err<T: Debug, E>(&self, result: Result<T, E>) -> TestResult<E> {
        self.add_assert();
        match result {
            Ok(value) => Err(TestError::mismatch(
                "assertErr",
                "Err(..)",
                format!("Ok({:?})", value),
            )),
            Err(err) => Ok(err),
        }
    }

    #[track_caller]
    pub fn assert_some<T>(&self, option: Option<T>) -> TestResult<T> {
        self.add_assert();
        option.ok_or_else(|| TestError::mismatch("assertSome", "Some(..)", "None"))
    }

    #[track_caller]
    pub fn assert_none<T: Debug>(&self, option: Option<T>) -> TestResult {
        self.add_assert();
        match option {
            None => Ok(()),
            Some(value) => Err(TestError::mismatch(
                "assertNone",
                "None",
                format!("Some({:?})", value),
            )),
        }
    }

    #[track_caller]
    pub fn assert_contains<T: PartialEq + Debug>(&self, items: &[T], value: &T) -> TestResult {
        self.add_assert();
        if !items.contains(value) {
            return Err(TestError::mismatch(
                "assertContains",
                format!("a collection containing {:?}", value),
                format!("{:?}", items),
            ));
        }
        Ok(())
    }

    // ========================================================================
    // Mock assertions
    // ========================================================================

    /// Check the calls recorded for `name` on a mocked `target`.
    ///
    /// A count checks the exact number of calls; an argument list passes if any
    /// recorded call had exactly those arguments.
    #[track_caller]
    pub fn assert_call(
        &self,
        target: &Mockable,
        name: &str,
        expectation: impl Into<CallExpectation>,
    ) -> TestResult {
        self.add_assert();
        self.mock().check_calls(target, name, expectation.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json::json;

    fn expect_mismatch<T: std::fmt::Debug>(result: TestResult<T>, operator: &str) -> (String, String) {
        match result {
            Err(TestError::AssertionMismatch {
                operator: op,
                expected,
                actual,
                ..
            }) => {
                assert_eq!(op, operator);
                (expected, actual)
            }
            other => panic!("expected a mismatch from {operator}, got {other:?}"),
        }
    }

    #[test]
    fn test_assert_true_and_false() {
        let ctx = TestContext::new();
        assert!(ctx.assert_true(true).is_ok());
        assert!(ctx.assert_false(false).is_ok());
        expect_mismatch(ctx.assert_true(false), "assertTrue");
        expect_mismatch(ctx.assert_false(true), "assertFalse");
        assert_eq!(ctx.assertions(), 4);
    }

    #[test]
    fn test_assert_equal_reports_both_sides() {
        let ctx = TestContext::new();
        let (expected, actual) = expect_mismatch(ctx.assert_equal(1, 2), "assertEqual");
        assert_eq!(expected, "2");
        assert_eq!(actual, "1");
    }

    #[test]
    fn test_assert_equal_is_deep() {
        let ctx = TestContext::new();
        assert!(ctx.assert_equal(vec![json!({"a": 1})], vec![json!({"a": 1})]).is_ok());
        assert!(ctx.assert_equal(String::from("x"), "x").is_ok());
        assert!(ctx.assert_not_equal(json!({"a": 1}), json!({"b": 2})).is_ok());
        expect_mismatch(ctx.assert_not_equal(3, 3), "assertNotEqual");
    }

    #[test]
    fn test_mismatch_points_at_caller() {
        let ctx = TestContext::new();
        match ctx.assert_true(false) {
            Err(TestError::AssertionMismatch {
                location: Some(loc),
                ..
            }) => assert!(loc.file().ends_with("assertions.rs")),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[rstest]
    #[case::any_error(ErrorMatcher::Any, true)]
    #[case::substring("not defined".into(), true)]
    #[case::wrong_substring("permission".into(), false)]
    #[case::pattern(Regex::new(r"^\w+ is not defined$").unwrap().into(), true)]
    fn test_assert_throws_matching(#[case] matcher: ErrorMatcher, #[case] passes: bool) {
        let ctx = TestContext::new();
        let result = ctx.assert_throws_matching(
            || Err::<(), _>("missing_fn is not defined"),
            matcher,
            None,
        );
        assert_eq!(result.is_ok(), passes);
    }

    #[test]
    fn test_assert_throws_catches_panics() {
        let ctx = TestContext::new();
        let result = ctx.assert_throws_matching(
            || -> Result<(), String> { panic!("exploded") },
            "explo",
            None,
        );
        assert!(result.is_ok());
    }

    #[test]
    fn test_assert_throws_without_error() {
        let ctx = TestContext::new();
        let (expected, actual) = expect_mismatch(
            ctx.assert_throws(|| Ok::<_, String>(5)),
            "assertThrows",
        );
        assert_eq!(expected, "an error");
        assert_eq!(actual, "no error");

        let (expected, _) = expect_mismatch(
            ctx.assert_throws_matching(|| Ok::<_, String>(5), "x", Some("should reject")),
            "assertThrows",
        );
        assert_eq!(expected, "should reject");
    }

    #[test]
    fn test_result_and_option_helpers() {
        let ctx = TestContext::new();
        assert_eq!(ctx.assert_ok(Ok::<_, String>(7)).unwrap(), 7);
        assert_eq!(ctx.assert_err(Err::<u8, _>("bad")).unwrap(), "bad");
        assert_eq!(ctx.assert_some(Some('a')).unwrap(), 'a');
        assert!(ctx.assert_none::<u8>(None).is_ok());

        expect_mismatch(ctx.assert_ok(Err::<u8, _>("bad")), "assertOk");
        expect_mismatch(ctx.assert_err(Ok::<_, String>(1)), "assertErr");
        expect_mismatch(ctx.assert_some::<u8>(None), "assertSome");
        expect_mismatch(ctx.assert_none(Some(1)), "assertNone");
        assert_eq!(ctx.assertions(), 8);
    }

    #[test]
    fn test_assert_contains() {
        let ctx = TestContext::new();
        assert!(ctx.assert_contains(&[1, 2, 3], &2).is_ok());
        let (_, actual) = expect_mismatch(ctx.assert_contains(&[1, 2, 3], &9), "assertContains");
        assert_eq!(actual, "[1, 2, 3]");
    }

    #[test]
    fn test_assert_call_counts_even_when_not_mocked() {
        let ctx = TestContext::new();
        let target = Mockable::new("fs");

        let err = ctx.assert_call(&target, "stat", 1).unwrap_err();

        assert!(matches!(err, TestError::ModuleNotMocked { .. }));
        assert_eq!(ctx.assertions(), 1);
    }
}
