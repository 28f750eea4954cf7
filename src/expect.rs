//! The `expect(value)` assertion entry point and its verbs.
//!
//! Verbs are explicit methods rather than a dynamic grammar: each one
//! computes a pass/fail verdict plus a failure message pair, and
//! [`Assertion::not`] flips both. Every verb returns `Result`, so a failing
//! assertion propagates with `?` like any other error.

use regex::Regex;

use crate::{Error, ErrorKind, Result, Value, ValueKind};

/// Starts an assertion chain over a value.
///
/// ```
/// use monomi::expect;
///
/// expect(2 + 2).to_equal(4).unwrap();
/// expect("monomi").not().to_match("^lust").unwrap();
/// expect(0.1 + 0.2).to_be_approximately(0.3, 1e-9).unwrap();
/// ```
pub fn expect(value: impl Into<Value>) -> Assertion {
    Assertion {
        val: value.into(),
        negated: false,
    }
}

/// An in-flight assertion: the subject value and the negation flag.
///
/// Terminal verb methods consume the chain and return `Result`. Wrong-typed
/// subjects (e.g. `to_match` on a non-string) are `Usage` errors, not
/// assertion failures — they indicate a broken test, and negation does not
/// rescue them.
#[derive(Debug, Clone)]
pub struct Assertion {
    val: Value,
    negated: bool,
}

impl Assertion {
    /// Flips the chain's polarity: the following verb must fail to hold.
    #[allow(clippy::should_implement_trait)]
    pub fn not(mut self) -> Self {
        self.negated = !self.negated;
        self
    }

    fn verdict(&self, holds: bool, failure: String, negated_failure: String) -> Result {
        if holds != self.negated {
            Ok(())
        } else if self.negated {
            Err(Error::assertion(negated_failure))
        } else {
            Err(Error::assertion(failure))
        }
    }

    fn numeric(&self, verb: &str) -> Result<f64> {
        self.val.as_float().ok_or_else(|| {
            Error::usage(format!("{verb} requires a number, got {}", self.val.kind()))
        })
    }

    fn string(&self, verb: &str) -> Result<String> {
        self.val
            .as_str()
            .map(str::to_owned)
            .ok_or_else(|| {
                Error::usage(format!("{verb} requires a string, got {}", self.val.kind()))
            })
    }

    // ==================== Equality & Existence ====================

    /// Deep structural equality; composite mismatches include a path diff.
    pub fn to_equal(self, expected: impl Into<Value>) -> Result {
        let expected = expected.into();
        let holds = self.val.deep_eq(&expected);
        let failure = match expected {
            Value::List(_) | Value::Map(_) if !holds => format!(
                "expected values to be equal\n{}",
                expected.diff(&self.val)
            ),
            _ => format!("expected {} to equal {}", self.val, expected),
        };
        let negated = format!("expected {} to not equal {}", self.val, expected);
        self.verdict(holds, failure, negated)
    }

    /// Deep equality with a numeric tolerance applied at every numeric leaf.
    pub fn to_equal_approx(self, expected: impl Into<Value>, epsilon: f64) -> Result {
        let expected = expected.into();
        let holds = self.val.deep_eq_approx(&expected, epsilon);
        self.verdict(
            holds,
            format!(
                "expected {} to equal {} (within {epsilon})",
                self.val, expected
            ),
            format!(
                "expected {} to not equal {} (within {epsilon})",
                self.val, expected
            ),
        )
    }

    /// Holds unless the subject is nil.
    pub fn to_exist(self) -> Result {
        let holds = !self.val.is_nil();
        self.verdict(
            holds,
            "expected a value, got nil".into(),
            format!("expected nil, got {}", self.val),
        )
    }

    /// Holds for anything but nil and false.
    pub fn to_be_truthy(self) -> Result {
        let holds = self.val.is_truthy();
        self.verdict(
            holds,
            format!("expected {} to be truthy", self.val),
            format!("expected {} to not be truthy", self.val),
        )
    }

    /// Type check against a [`ValueKind`].
    pub fn to_be_a(self, kind: ValueKind) -> Result {
        let holds = self.val.kind() == kind;
        self.verdict(
            holds,
            format!("expected a {kind}, got {} ({})", self.val.kind(), self.val),
            format!("expected {} to not be a {kind}", self.val),
        )
    }

    // ==================== Strings ====================

    /// Regex match over a string subject. Invalid patterns and non-string
    /// subjects are `Usage` errors.
    pub fn to_match(self, pattern: &str) -> Result {
        let subject = self.string("to_match")?;
        let re = Regex::new(pattern)
            .map_err(|e| Error::usage(format!("invalid pattern `{pattern}`: {e}")))?;
        let holds = re.is_match(&subject);
        self.verdict(
            holds,
            format!("expected {subject:?} to match /{pattern}/"),
            format!("expected {subject:?} to not match /{pattern}/"),
        )
    }

    pub fn to_start_with(self, prefix: &str) -> Result {
        let subject = self.string("to_start_with")?;
        let holds = subject.starts_with(prefix);
        self.verdict(
            holds,
            format!("expected {subject:?} to start with {prefix:?}"),
            format!("expected {subject:?} to not start with {prefix:?}"),
        )
    }

    pub fn to_end_with(self, suffix: &str) -> Result {
        let subject = self.string("to_end_with")?;
        let holds = subject.ends_with(suffix);
        self.verdict(
            holds,
            format!("expected {subject:?} to end with {suffix:?}"),
            format!("expected {subject:?} to not end with {suffix:?}"),
        )
    }

    // ==================== Containers ====================

    /// Structural containment: list element, map entry value, or substring.
    pub fn to_contain(self, needle: impl Into<Value>) -> Result {
        let needle = needle.into();
        let holds = self.val.contains(&needle);
        self.verdict(
            holds,
            format!("expected {} to contain {needle}", self.val),
            format!("expected {} to not contain {needle}", self.val),
        )
    }

    /// Map entry-value presence. `Usage` error for non-map subjects.
    pub fn to_contain_value(self, needle: impl Into<Value>) -> Result {
        if !matches!(self.val, Value::Map(_)) {
            return Err(Error::usage(format!(
                "to_contain_value requires a map, got {}",
                self.val.kind()
            )));
        }
        let needle = needle.into();
        let holds = self.val.contains(&needle);
        self.verdict(
            holds,
            format!("expected {} to contain value {needle}", self.val),
            format!("expected {} to not contain value {needle}", self.val),
        )
    }

    /// Map key presence. `Usage` error for non-map subjects.
    pub fn to_have_key(self, key: &str) -> Result {
        if !matches!(self.val, Value::Map(_)) {
            return Err(Error::usage(format!(
                "to_have_key requires a map, got {}",
                self.val.kind()
            )));
        }
        let holds = self.val.has_key(key);
        self.verdict(
            holds,
            format!("expected {} to have key {key:?}", self.val),
            format!("expected {} to not have key {key:?}", self.val),
        )
    }

    /// All of the given keys must be present.
    pub fn to_have_keys(self, keys: &[&str]) -> Result {
        if !matches!(self.val, Value::Map(_)) {
            return Err(Error::usage(format!(
                "to_have_keys requires a map, got {}",
                self.val.kind()
            )));
        }
        let missing: Vec<&str> = keys
            .iter()
            .copied()
            .filter(|k| !self.val.has_key(k))
            .collect();
        let holds = missing.is_empty();
        self.verdict(
            holds,
            format!("expected {} to have keys {missing:?}", self.val),
            format!("expected {} to not have all keys {keys:?}", self.val),
        )
    }

    /// Every entry of `subset` must appear, deep-equal, in the subject map.
    pub fn to_contain_subset(self, subset: impl Into<Value>) -> Result {
        let subset = subset.into();
        let (Value::Map(want), Value::Map(got)) = (&subset, &self.val) else {
            return Err(Error::usage(format!(
                "to_contain_subset requires maps, got {} and {}",
                self.val.kind(),
                subset.kind()
            )));
        };
        let holds = want
            .iter()
            .all(|(k, v)| got.get(k).map_or(false, |w| v.deep_eq(w)));
        self.verdict(
            holds,
            format!("expected {} to contain subset {subset}", self.val),
            format!("expected {} to not contain subset {subset}", self.val),
        )
    }

    /// The subject list must hold exactly the given elements, in any order.
    pub fn to_contain_exactly(self, expected: Vec<Value>) -> Result {
        let Value::List(actual) = &self.val else {
            return Err(Error::usage(format!(
                "to_contain_exactly requires a list, got {}",
                self.val.kind()
            )));
        };
        let mut remaining: Vec<&Value> = actual.iter().collect();
        let mut holds = actual.len() == expected.len();
        if holds {
            for want in &expected {
                match remaining.iter().position(|v| v.deep_eq(want)) {
                    Some(i) => {
                        remaining.remove(i);
                    }
                    None => {
                        holds = false;
                        break;
                    }
                }
            }
        }
        let rendered = Value::List(expected);
        self.verdict(
            holds,
            format!("expected {} to contain exactly {rendered}", self.val),
            format!("expected {} to not contain exactly {rendered}", self.val),
        )
    }

    // ==================== Numeric Comparisons ====================

    pub fn to_be_greater_than(self, bound: impl Into<Value>) -> Result {
        let bound = bound.into();
        let subject = self.numeric("to_be_greater_than")?;
        let bound_n = bound
            .as_float()
            .ok_or_else(|| Error::usage("to_be_greater_than requires a numeric bound"))?;
        let holds = subject > bound_n;
        self.verdict(
            holds,
            format!("expected {subject} to be greater than {bound}"),
            format!("expected {subject} to not be greater than {bound}"),
        )
    }

    pub fn to_be_less_than(self, bound: impl Into<Value>) -> Result {
        let bound = bound.into();
        let subject = self.numeric("to_be_less_than")?;
        let bound_n = bound
            .as_float()
            .ok_or_else(|| Error::usage("to_be_less_than requires a numeric bound"))?;
        let holds = subject < bound_n;
        self.verdict(
            holds,
            format!("expected {subject} to be less than {bound}"),
            format!("expected {subject} to not be less than {bound}"),
        )
    }

    /// Inclusive range check.
    pub fn to_be_between(self, low: impl Into<Value>, high: impl Into<Value>) -> Result {
        let (low, high) = (low.into(), high.into());
        let subject = self.numeric("to_be_between")?;
        let (lo, hi) = match (low.as_float(), high.as_float()) {
            (Some(lo), Some(hi)) => (lo, hi),
            _ => return Err(Error::usage("to_be_between requires numeric bounds")),
        };
        let holds = subject >= lo && subject <= hi;
        self.verdict(
            holds,
            format!("expected {subject} to be between {low} and {high}"),
            format!("expected {subject} to not be between {low} and {high}"),
        )
    }

    pub fn to_be_approximately(self, target: impl Into<Value>, epsilon: f64) -> Result {
        let target = target.into();
        let subject = self.numeric("to_be_approximately")?;
        let target_n = target
            .as_float()
            .ok_or_else(|| Error::usage("to_be_approximately requires a numeric target"))?;
        let holds = (subject - target_n).abs() <= epsilon;
        self.verdict(
            holds,
            format!("expected {subject} to be approximately {target} (±{epsilon})"),
            format!("expected {subject} to not be approximately {target} (±{epsilon})"),
        )
    }
}

/// Runs a fallible closure and captures its error for failure-side verbs.
///
/// ```
/// use monomi::{expect_throw, Error, ErrorKind};
///
/// expect_throw(|| -> monomi::Result<()> {
///     Err(Error::Usage("bad input".into()))
/// })
/// .matching("bad input")
/// .unwrap();
/// ```
pub fn expect_throw<T>(f: impl FnOnce() -> Result<T>) -> ThrowAssertion {
    ThrowAssertion {
        error: f().err(),
    }
}

/// Assertion over the error (if any) captured by [`expect_throw`].
#[derive(Debug, Clone)]
pub struct ThrowAssertion {
    error: Option<Error>,
}

impl ThrowAssertion {
    /// The closure must have returned an error.
    pub fn to_throw(self) -> Result {
        match self.error {
            Some(_) => Ok(()),
            None => Err(Error::assertion(
                "expected an error, but the call succeeded",
            )),
        }
    }

    /// The closure must have succeeded.
    pub fn to_not_throw(self) -> Result {
        match self.error {
            None => Ok(()),
            Some(e) => Err(Error::assertion(format!(
                "expected no error, but the call failed with: {e}"
            ))),
        }
    }

    /// The closure must have failed with an error whose message matches the
    /// pattern.
    pub fn matching(self, pattern: &str) -> Result {
        let re = Regex::new(pattern)
            .map_err(|e| Error::usage(format!("invalid pattern `{pattern}`: {e}")))?;
        match self.error {
            None => Err(Error::assertion(format!(
                "expected an error matching /{pattern}/, but the call succeeded"
            ))),
            Some(e) => {
                let message = e.to_string();
                if re.is_match(&message) {
                    Ok(())
                } else {
                    Err(Error::assertion(format!(
                        "expected error matching /{pattern}/, got: {message}"
                    )))
                }
            }
        }
    }

    /// The closure must have failed with an error of the given kind.
    pub fn with_kind(self, kind: ErrorKind) -> Result {
        match self.error {
            None => Err(Error::assertion(format!(
                "expected a {kind:?} error, but the call succeeded"
            ))),
            Some(e) if e.kind() == kind => Ok(()),
            Some(e) => Err(Error::assertion(format!(
                "expected a {kind:?} error, got {:?}: {e}",
                e.kind()
            ))),
        }
    }
}
