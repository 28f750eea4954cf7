use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::target::MethodFn;
use crate::{CallRecord, Matcher, SequenceClock, Target, Value};

/// An invocation recorder: wraps a callable, or replaces a named method on a
/// [`Target`].
///
/// Every call is recorded as a [`CallRecord`] stamped by the context's
/// [`SequenceClock`](crate::SequenceClock), which makes call order comparable
/// across unrelated spies ([`called_before`](Self::called_before) /
/// [`called_after`](Self::called_after)).
///
/// `Spy` is a cheap-clone handle; clones observe the same call log.
/// Create spies through [`TestContext`](crate::TestContext):
///
/// ```
/// use monomi::{vals, TestContext, Value};
///
/// let ctx = TestContext::new();
/// let doubler = ctx.spy(|args| Value::Int(args[0].as_int().unwrap_or(0) * 2));
/// assert_eq!(doubler.call(vals![3]), Value::Int(6));
/// assert_eq!(doubler.call_count(), 1);
/// assert_eq!(doubler.calls()[0].arg(0), Some(&Value::Int(3)));
/// ```
#[derive(Clone)]
pub struct Spy {
    inner: Rc<SpyInner>,
}

struct SpyInner {
    clock: SequenceClock,
    wrapped: Option<MethodFn>,
    calls: RefCell<Vec<CallRecord>>,
    attachment: RefCell<Option<Attachment>>,
}

/// Non-owning back-reference to the patched method, kept only for restore.
struct Attachment {
    target: Target,
    method: String,
    original: Option<MethodFn>,
}

impl fmt::Debug for Spy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Spy")
            .field("call_count", &self.call_count())
            .field("is_attached", &self.is_attached())
            .finish_non_exhaustive()
    }
}

impl Spy {
    pub(crate) fn wrapping(clock: SequenceClock, wrapped: Option<MethodFn>) -> Self {
        Self {
            inner: Rc::new(SpyInner {
                clock,
                wrapped,
                calls: RefCell::new(Vec::new()),
                attachment: RefCell::new(None),
            }),
        }
    }

    /// Builds a spy, installs it as `target[method]`, and remembers the
    /// original callable for [`restore`](Self::restore). Calls delegate to
    /// `wrapped` (usually the original itself, or a stub implementation).
    pub(crate) fn attach(
        clock: SequenceClock,
        target: &Target,
        method: &str,
        wrapped: Option<MethodFn>,
        original: Option<MethodFn>,
    ) -> Self {
        let spy = Self {
            inner: Rc::new(SpyInner {
                clock,
                wrapped,
                calls: RefCell::new(Vec::new()),
                attachment: RefCell::new(Some(Attachment {
                    target: target.clone(),
                    method: method.to_owned(),
                    original,
                })),
            }),
        };
        let handle = spy.clone();
        target.install(method, Rc::new(move |args| handle.call(args.to_vec())));
        spy
    }

    /// Records the call, then delegates to the wrapped callable (returns
    /// `Nil` when wrapping nothing).
    pub fn call(&self, args: Vec<Value>) -> Value {
        let sequence = self.inner.clock.next();
        self.inner
            .calls
            .borrow_mut()
            .push(CallRecord::new(args.clone(), sequence));
        match &self.inner.wrapped {
            Some(f) => f(&args),
            None => Value::Nil,
        }
    }

    // ==================== Call Log Queries ====================

    /// The number of recorded calls.
    pub fn call_count(&self) -> usize {
        self.inner.calls.borrow().len()
    }

    /// A snapshot of all recorded calls, in call order.
    pub fn calls(&self) -> Vec<CallRecord> {
        self.inner.calls.borrow().clone()
    }

    /// The most recent call, if any.
    pub fn last_call(&self) -> Option<CallRecord> {
        self.inner.calls.borrow().last().cloned()
    }

    /// Returns true if the spy was called at least once.
    pub fn called(&self) -> bool {
        self.call_count() > 0
    }

    /// Returns true if the spy was never called.
    pub fn not_called(&self) -> bool {
        self.call_count() == 0
    }

    /// Returns true if the spy was called exactly once.
    pub fn called_once(&self) -> bool {
        self.call_count() == 1
    }

    /// Returns true if the spy was called exactly `n` times.
    pub fn called_times(&self, n: usize) -> bool {
        self.call_count() == n
    }

    /// Returns true if some recorded call satisfies the pattern pairwise
    /// (equal length required; literals convert to deep-equality matchers).
    pub fn called_with(&self, pattern: &[Matcher]) -> bool {
        self.inner.calls.borrow().iter().any(|c| c.matches(pattern))
    }

    /// Alias of [`called_with`](Self::called_with), matching the query-helper
    /// naming of the lookup pair below.
    pub fn has_calls_with(&self, pattern: &[Matcher]) -> bool {
        self.called_with(pattern)
    }

    /// The index (0-based) of the first call satisfying the pattern.
    pub fn find_call_index(&self, pattern: &[Matcher]) -> Option<usize> {
        self.inner
            .calls
            .borrow()
            .iter()
            .position(|c| c.matches(pattern))
    }

    // ==================== Cross-Spy Ordering ====================

    /// Returns true if this spy's first call happened before `other`'s first
    /// call. False when either spy has no calls.
    pub fn called_before(&self, other: &Spy) -> bool {
        self.called_before_call(other, 0)
    }

    /// Returns true if this spy's first call happened before `other`'s
    /// `index`-th call (0-based). False when out of range or uncalled.
    pub fn called_before_call(&self, other: &Spy, index: usize) -> bool {
        let other_calls = other.inner.calls.borrow();
        let Some(anchor) = other_calls.get(index) else {
            return false;
        };
        let calls = self.inner.calls.borrow();
        let Some(first) = calls.first() else {
            return false;
        };
        first.sequence() < anchor.sequence()
    }

    /// Returns true if this spy's last call happened after `other`'s first
    /// call. False when either spy has no calls.
    pub fn called_after(&self, other: &Spy) -> bool {
        self.called_after_call(other, 0)
    }

    /// Returns true if this spy's last call happened after `other`'s
    /// `index`-th call (0-based). False when out of range or uncalled.
    pub fn called_after_call(&self, other: &Spy, index: usize) -> bool {
        let other_calls = other.inner.calls.borrow();
        let Some(anchor) = other_calls.get(index) else {
            return false;
        };
        let calls = self.inner.calls.borrow();
        let Some(last) = calls.last() else {
            return false;
        };
        last.sequence() > anchor.sequence()
    }

    // ==================== Restoration ====================

    /// Returns true while the spy still replaces a target method.
    pub fn is_attached(&self) -> bool {
        self.inner.attachment.borrow().is_some()
    }

    /// Puts the original callable back on the target (or removes the slot if
    /// the method did not exist before). Idempotent; a no-op for bare spies.
    pub fn restore(&self) {
        if let Some(attachment) = self.inner.attachment.borrow_mut().take() {
            match attachment.original {
                Some(original) => attachment.target.install(&attachment.method, original),
                None => attachment.target.remove(&attachment.method),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{vals, TestContext};

    #[test]
    fn call_records_args_and_delegates() {
        let ctx = TestContext::new();
        let spy = ctx.spy(|args| Value::Int(args[0].as_int().unwrap_or(0) * 2));

        assert_eq!(spy.call(vals![3]), Value::Int(6));
        assert_eq!(spy.call_count(), 1);
        assert_eq!(spy.calls()[0].args(), &[Value::Int(3)]);
    }

    #[test]
    fn noop_spy_returns_nil() {
        let ctx = TestContext::new();
        let spy = ctx.spy_noop();
        assert_eq!(spy.call(vals![1]), Value::Nil);
        assert!(spy.called_once());
    }

    #[test]
    fn clones_share_the_call_log() {
        let ctx = TestContext::new();
        let spy = ctx.spy_noop();
        let view = spy.clone();
        spy.call(vals![]);
        assert_eq!(view.call_count(), 1);
    }

    #[test]
    fn count_queries() {
        let ctx = TestContext::new();
        let spy = ctx.spy_noop();
        assert!(spy.not_called());
        spy.call(vals![]);
        assert!(spy.called() && spy.called_once() && spy.called_times(1));
        spy.call(vals![]);
        assert!(spy.called_times(2) && !spy.called_once());
    }

    #[test]
    fn called_with_requires_some_matching_record() {
        let ctx = TestContext::new();
        let spy = ctx.spy_noop();
        spy.call(vals![1, "x"]);
        spy.call(vals![2, "y"]);

        assert!(spy.called_with(&[Matcher::eq(2), Matcher::any()]));
        assert!(!spy.called_with(&[Matcher::eq(3), Matcher::any()]));
        assert!(!spy.called_with(&[Matcher::eq(1)])); // length mismatch
        assert_eq!(spy.find_call_index(&[Matcher::eq(2), Matcher::eq("y")]), Some(1));
        assert_eq!(spy.find_call_index(&[Matcher::eq(9)]), None);
    }

    #[test]
    fn last_call_is_the_most_recent() {
        let ctx = TestContext::new();
        let spy = ctx.spy_noop();
        spy.call(vals![1]);
        spy.call(vals![2]);
        assert_eq!(spy.last_call().unwrap().arg(0), Some(&Value::Int(2)));
    }

    #[test]
    fn ordering_across_independent_spies() {
        let ctx = TestContext::new();
        let a = ctx.spy_noop();
        let b = ctx.spy_noop();
        a.call(vals![]);
        b.call(vals![]);

        assert!(b.called_after(&a));
        assert!(!a.called_after(&b));
        assert!(a.called_before(&b));
        assert!(!b.called_before(&a));
    }

    #[test]
    fn ordering_is_false_without_calls() {
        let ctx = TestContext::new();
        let a = ctx.spy_noop();
        let b = ctx.spy_noop();
        assert!(!a.called_before(&b));
        assert!(!a.called_after(&b));
        a.call(vals![]);
        assert!(!a.called_before(&b)); // b still uncalled
        assert!(!a.called_before_call(&b, 5)); // out of range
    }

    #[test]
    fn attached_spy_records_target_invocations() {
        let ctx = TestContext::new();
        let target = Target::new();
        target.define_value("ping", "pong");

        let spy = ctx.spy_on(&target, "ping").unwrap();
        assert_eq!(target.invoke("ping", vals![]).unwrap(), Value::from("pong"));
        assert_eq!(spy.call_count(), 1);
        assert!(spy.is_attached());
    }

    #[test]
    fn spy_on_missing_method_is_a_usage_error() {
        let ctx = TestContext::new();
        let target = Target::new();
        assert!(ctx.spy_on(&target, "ghost").is_err());
    }

    #[test]
    fn restore_reinstates_the_exact_original() {
        let ctx = TestContext::new();
        let target = Target::new();
        target.define_value("m", 1);
        let original = target.get("m").unwrap();

        let spy = ctx.spy_on(&target, "m").unwrap();
        assert!(!Rc::ptr_eq(&target.get("m").unwrap(), &original));

        spy.restore();
        assert!(Rc::ptr_eq(&target.get("m").unwrap(), &original));
        assert!(!spy.is_attached());

        // Idempotent
        spy.restore();
        assert!(Rc::ptr_eq(&target.get("m").unwrap(), &original));
    }
}
