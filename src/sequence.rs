use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

/// Position of a recorded call in the context-wide total order.
///
/// No two calls recorded through the same [`TestContext`](crate::TestContext)
/// ever share a `SequenceNo`, and later calls always compare greater. This is
/// what makes call ordering comparable across unrelated spies and mocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SequenceNo(u64);

impl SequenceNo {
    pub fn value(self) -> u64 {
        self.0
    }
}

impl From<u64> for SequenceNo {
    fn from(value: u64) -> Self {
        SequenceNo(value)
    }
}

impl fmt::Display for SequenceNo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Monotonic counter handing out strictly increasing [`SequenceNo`]s.
///
/// One clock per [`TestContext`](crate::TestContext); every spy created by
/// the context shares it (cheap clone). Single-threaded `Cell` increment —
/// the cooperative execution model means no two calls can race.
#[derive(Clone)]
pub struct SequenceClock {
    next: Rc<Cell<u64>>,
}

impl SequenceClock {
    pub(crate) fn new() -> Self {
        Self {
            next: Rc::new(Cell::new(1)),
        }
    }

    /// Returns a sequence number strictly greater than any handed out before.
    pub fn next(&self) -> SequenceNo {
        let n = self.next.get();
        self.next.set(n + 1);
        SequenceNo(n)
    }

    /// The number of sequence numbers handed out so far.
    pub fn issued(&self) -> u64 {
        self.next.get() - 1
    }
}

impl fmt::Debug for SequenceClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SequenceClock")
            .field("issued", &self.issued())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_is_strictly_increasing() {
        let clock = SequenceClock::new();
        let a = clock.next();
        let b = clock.next();
        let c = clock.next();
        assert!(a < b && b < c);
    }

    #[test]
    fn clones_share_the_counter() {
        let clock = SequenceClock::new();
        let other = clock.clone();
        let a = clock.next();
        let b = other.next();
        assert!(a < b);
        assert_eq!(clock.issued(), 2);
    }

    #[test]
    fn display_shows_position() {
        let clock = SequenceClock::new();
        assert_eq!(clock.next().to_string(), "#1");
    }
}
