//! Argument matching for spy queries and mock expectations.

use std::fmt;
use std::rc::Rc;

use crate::{Value, ValueKind};

type MatchFn = Rc<dyn Fn(&Value) -> bool>;

/// A reusable predicate-plus-description for comparing call arguments.
///
/// `Matcher` is accepted anywhere arguments are compared: `Spy::called_with`,
/// `ExpectationBuilder::with_args`, `SequenceStep::with_args`. Literals
/// convert into deep-equality matchers, so plain values and matchers mix
/// freely in one pattern.
///
/// # Example
///
/// ```
/// use monomi::{Matcher, ValueKind};
///
/// // Deep equality
/// let m = Matcher::eq(42);
///
/// // Any value at this position
/// let m = Matcher::any();
///
/// // Type check
/// let m = Matcher::of_kind(ValueKind::Str);
///
/// // Structural containment
/// let m = Matcher::containing("fragment");
///
/// // Custom predicate with a description for failure messages
/// let m = Matcher::predicate(|v| v.as_int().is_some_and(|n| n > 0), "positive int");
/// ```
#[derive(Clone)]
pub struct Matcher {
    matcher: MatchFn,
    description: String,
}

impl fmt::Debug for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Matcher")
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

impl Matcher {
    /// Match values deep-equal to the given one.
    pub fn eq(value: impl Into<Value>) -> Self {
        let value = value.into();
        let description = value.to_string();
        Self {
            matcher: Rc::new(move |v| v.deep_eq(&value)),
            description,
        }
    }

    /// Match any value.
    pub fn any() -> Self {
        Self {
            matcher: Rc::new(|_| true),
            description: "_".into(),
        }
    }

    /// Match values of the given kind.
    pub fn of_kind(kind: ValueKind) -> Self {
        Self {
            matcher: Rc::new(move |v| v.kind() == kind),
            description: format!("<{kind}>"),
        }
    }

    /// Match values structurally containing the given one
    /// (list element, map entry value, or substring).
    pub fn containing(needle: impl Into<Value>) -> Self {
        let needle = needle.into();
        let description = format!("containing({needle})");
        Self {
            matcher: Rc::new(move |v| v.contains(&needle)),
            description,
        }
    }

    /// Match values satisfying a custom predicate. The description appears
    /// in expectation failure messages.
    pub fn predicate<F>(predicate: F, description: impl Into<String>) -> Self
    where
        F: Fn(&Value) -> bool + 'static,
    {
        Self {
            matcher: Rc::new(predicate),
            description: description.into(),
        }
    }

    /// Returns true if the given value satisfies this matcher.
    pub fn matches(&self, value: &Value) -> bool {
        (self.matcher)(value)
    }

    /// The description used when rendering patterns in failure messages.
    pub fn description(&self) -> &str {
        &self.description
    }
}

/// Renders a matcher pattern as `(a, b, c)` for failure messages.
pub(crate) fn describe_pattern(pattern: &[Matcher]) -> String {
    let parts: Vec<&str> = pattern.iter().map(Matcher::description).collect();
    format!("({})", parts.join(", "))
}

// Literals used in argument patterns become deep-equality matchers.

impl From<Value> for Matcher {
    fn from(value: Value) -> Self {
        Matcher::eq(value)
    }
}

impl From<bool> for Matcher {
    fn from(b: bool) -> Self {
        Matcher::eq(b)
    }
}

impl From<i32> for Matcher {
    fn from(n: i32) -> Self {
        Matcher::eq(n)
    }
}

impl From<i64> for Matcher {
    fn from(n: i64) -> Self {
        Matcher::eq(n)
    }
}

impl From<f64> for Matcher {
    fn from(x: f64) -> Self {
        Matcher::eq(x)
    }
}

impl From<&str> for Matcher {
    fn from(s: &str) -> Self {
        Matcher::eq(s)
    }
}

impl From<String> for Matcher {
    fn from(s: String) -> Self {
        Matcher::eq(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vals;

    #[test]
    fn eq_uses_deep_equality() {
        let m = Matcher::eq(Value::List(vals![1, 2]));
        assert!(m.matches(&Value::List(vals![1, 2])));
        assert!(!m.matches(&Value::List(vals![2, 1])));
    }

    #[test]
    fn any_matches_everything() {
        let m = Matcher::any();
        assert!(m.matches(&Value::Nil));
        assert!(m.matches(&42.into()));
        assert_eq!(m.description(), "_");
    }

    #[test]
    fn of_kind_checks_the_discriminant() {
        let m = Matcher::of_kind(ValueKind::Str);
        assert!(m.matches(&"x".into()));
        assert!(!m.matches(&1.into()));
    }

    #[test]
    fn containing_checks_structure() {
        let m = Matcher::containing(2);
        assert!(m.matches(&Value::List(vals![1, 2, 3])));
        assert!(!m.matches(&Value::List(vals![1, 3])));
    }

    #[test]
    fn predicate_uses_custom_logic() {
        let m = Matcher::predicate(|v| v.as_int().is_some_and(|n| n % 2 == 0), "even");
        assert!(m.matches(&4.into()));
        assert!(!m.matches(&3.into()));
        assert_eq!(m.description(), "even");
    }

    #[test]
    fn literals_convert_to_eq_matchers() {
        let m: Matcher = 5.into();
        assert!(m.matches(&5.into()));
        let m: Matcher = "hi".into();
        assert!(m.matches(&"hi".into()));
    }

    #[test]
    fn pattern_description_joins_parts() {
        let pattern = [Matcher::eq(1), Matcher::any(), Matcher::eq("x")];
        assert_eq!(describe_pattern(&pattern), r#"(1, _, "x")"#);
    }
}
