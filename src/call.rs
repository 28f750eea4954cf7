use std::fmt;

use crate::{Matcher, SequenceNo, Value};

/// A single recorded invocation of a spy: the arguments and the position the
/// call drew from the context's [`SequenceClock`](crate::SequenceClock).
///
/// Immutable once recorded; owned by the spy that recorded it.
#[derive(Debug, Clone, PartialEq)]
pub struct CallRecord {
    args: Vec<Value>,
    sequence: SequenceNo,
}

impl CallRecord {
    pub(crate) fn new(args: Vec<Value>, sequence: SequenceNo) -> Self {
        Self { args, sequence }
    }

    /// The arguments the spy was called with.
    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// The `index`-th argument (0-based), if present.
    pub fn arg(&self, index: usize) -> Option<&Value> {
        self.args.get(index)
    }

    /// The call's position in the context-wide total order.
    pub fn sequence(&self) -> SequenceNo {
        self.sequence
    }

    /// Returns true if the arguments pairwise satisfy the pattern.
    /// Lengths must match exactly.
    pub fn matches(&self, pattern: &[Matcher]) -> bool {
        self.args.len() == pattern.len()
            && self.args.iter().zip(pattern).all(|(v, m)| m.matches(v))
    }
}

impl fmt::Display for CallRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, v) in self.args.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{v}")?;
        }
        f.write_str(")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vals;

    fn record(args: Vec<Value>, seq: u64) -> CallRecord {
        CallRecord::new(args, seq.into())
    }

    #[test]
    fn matches_requires_equal_length() {
        let call = record(vals![1, 2], 1);
        assert!(call.matches(&[Matcher::eq(1), Matcher::eq(2)]));
        assert!(!call.matches(&[Matcher::eq(1)]));
        assert!(!call.matches(&[Matcher::eq(1), Matcher::eq(2), Matcher::any()]));
    }

    #[test]
    fn matches_is_pairwise() {
        let call = record(vals![1, "x"], 1);
        assert!(call.matches(&[Matcher::any(), Matcher::eq("x")]));
        assert!(!call.matches(&[Matcher::eq(2), Matcher::eq("x")]));
    }

    #[test]
    fn display_renders_argument_tuple() {
        let call = record(vals![1, "x"], 1);
        assert_eq!(call.to_string(), r#"(1, "x")"#);
        assert_eq!(record(vals![], 2).to_string(), "()");
    }
}
