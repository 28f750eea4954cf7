//! Mocks: stub management over a [`Target`] plus verifiable expectations.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::matcher::describe_pattern;
use crate::target::MethodFn;
use crate::{
    CallRecord, Error, Matcher, Result, SequenceClock, Spy, Target, Value,
};

/// Options controlling [`Mock::verify`].
#[derive(Debug, Clone, Copy)]
pub struct MockOptions {
    /// When true (the default), [`Mock::verify`] fails if any stub was never
    /// invoked.
    pub verify_all_stubs_called: bool,
}

impl Default for MockOptions {
    fn default() -> Self {
        Self {
            verify_all_stubs_called: true,
        }
    }
}

/// Owner of the stubs installed on one [`Target`], and of the expectations
/// declared against them.
///
/// A mock is the unit of restoration: [`restore`](Self::restore) puts every
/// patched method back atomically. Expectations are checked only when
/// [`verify`](Self::verify) / [`verify_expectations`](Self::verify_expectations)
/// are called explicitly — never as a side effect of normal calls.
///
/// Create mocks through [`TestContext`](crate::TestContext):
///
/// ```
/// use monomi::{vals, TestContext, Target, Value};
///
/// let ctx = TestContext::new();
/// let api = Target::new();
/// api.define_value("fetch", "live");
///
/// let mock = ctx.mock(&api);
/// mock.stub_value("fetch", "cached");
/// mock.expect("fetch").times(2);
///
/// api.invoke("fetch", vals![]).unwrap();
/// api.invoke("fetch", vals![]).unwrap();
/// mock.verify_expectations().unwrap();
///
/// mock.restore();
/// assert_eq!(api.invoke("fetch", vals![]).unwrap(), Value::from("live"));
/// ```
#[derive(Clone)]
pub struct Mock {
    inner: Rc<MockInner>,
}

struct MockInner {
    clock: SequenceClock,
    target: Target,
    stubs: RefCell<BTreeMap<String, Spy>>,
    expectations: RefCell<Vec<ExpectationRule>>,
    options: MockOptions,
}

/// One declared rule about how a stubbed method must be called.
struct ExpectationRule {
    method: String,
    exact: Option<usize>,
    min: Option<usize>,
    max: Option<usize>,
    args: Option<Vec<Matcher>>,
    after: Option<String>,
}

impl ExpectationRule {
    fn new(method: String) -> Self {
        Self {
            method,
            exact: None,
            min: None,
            max: None,
            args: None,
            after: None,
        }
    }

    fn has_count_rule(&self) -> bool {
        self.exact.is_some() || self.min.is_some() || self.max.is_some()
    }
}

impl fmt::Debug for Mock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mock")
            .field("stubs", &self.inner.stubs.borrow().len())
            .field("expectations", &self.inner.expectations.borrow().len())
            .finish_non_exhaustive()
    }
}

fn times_word(n: usize) -> String {
    if n == 1 {
        "1 time".into()
    } else {
        format!("{n} times")
    }
}

impl Mock {
    pub(crate) fn new(clock: SequenceClock, target: &Target, options: MockOptions) -> Self {
        Self {
            inner: Rc::new(MockInner {
                clock,
                target: target.clone(),
                stubs: RefCell::new(BTreeMap::new()),
                expectations: RefCell::new(Vec::new()),
                options,
            }),
        }
    }

    /// The target this mock patches.
    pub fn target(&self) -> &Target {
        &self.inner.target
    }

    // ==================== Stubbing ====================

    /// Replaces `target[name]` with a recording stub backed by `f`, keeping
    /// the original callable for restore. Returns the stub's spy.
    pub fn stub<F>(&self, name: &str, f: F) -> Spy
    where
        F: Fn(&[Value]) -> Value + 'static,
    {
        self.install_stub(name, Some(Rc::new(f) as MethodFn))
    }

    /// Replaces `target[name]` with a stub returning a constant value.
    pub fn stub_value(&self, name: &str, value: impl Into<Value>) -> Spy {
        let value = value.into();
        self.stub(name, move |_| value.clone())
    }

    /// Replaces `target[name]` with a recording stub that delegates to the
    /// original method. Used to track calls without changing behavior.
    pub fn stub_passthrough(&self, name: &str) -> Spy {
        let original = self.inner.target.get(name);
        self.install_stub(name, original)
    }

    fn install_stub(&self, name: &str, wrapped: Option<MethodFn>) -> Spy {
        // Re-stubbing: restore the previous stub first so the captured
        // original is the real method, not the old stub wrapper.
        if let Some(previous) = self.inner.stubs.borrow_mut().remove(name) {
            previous.restore();
        }
        let original = self.inner.target.get(name);
        let spy = Spy::attach(
            self.inner.clock.clone(),
            &self.inner.target,
            name,
            wrapped,
            original,
        );
        self.inner
            .stubs
            .borrow_mut()
            .insert(name.to_owned(), spy.clone());
        spy
    }

    /// The spy recording calls to the named stub, if stubbed.
    pub fn stub_spy(&self, name: &str) -> Option<Spy> {
        self.inner.stubs.borrow().get(name).cloned()
    }

    /// Restores one stubbed method to its original.
    pub fn restore_stub(&self, name: &str) {
        if let Some(spy) = self.inner.stubs.borrow_mut().remove(name) {
            spy.restore();
        }
    }

    /// Restores every stubbed method to its original. Idempotent.
    pub fn restore(&self) {
        let stubs = std::mem::take(&mut *self.inner.stubs.borrow_mut());
        for spy in stubs.into_values() {
            spy.restore();
        }
    }

    // ==================== Expectations ====================

    /// Declares an expectation against the named method and returns the
    /// fluent builder for its rules.
    pub fn expect(&self, method: &str) -> ExpectationBuilder {
        let index = {
            let mut expectations = self.inner.expectations.borrow_mut();
            expectations.push(ExpectationRule::new(method.to_owned()));
            expectations.len() - 1
        };
        ExpectationBuilder {
            mock: self.clone(),
            index,
        }
    }

    /// Fails if any stub was never invoked (unless
    /// [`MockOptions::verify_all_stubs_called`] is off). All unmet stubs are
    /// aggregated into one error.
    pub fn verify(&self) -> Result {
        if !self.inner.options.verify_all_stubs_called {
            return Ok(());
        }
        let unmet: Vec<String> = self
            .inner
            .stubs
            .borrow()
            .iter()
            .filter(|(_, spy)| spy.not_called())
            .map(|(name, _)| format!("`{name}`"))
            .collect();
        if unmet.is_empty() {
            Ok(())
        } else {
            Err(Error::expectation(format!(
                "stubs never called: {}",
                unmet.join(", ")
            )))
        }
    }

    /// Checks every declared expectation in declaration order, failing on the
    /// first violation. For each expectation the rules are checked in a fixed
    /// order: call counts, then argument pattern, then `after` ordering.
    ///
    /// A method that was expected but never explicitly stubbed gets a
    /// tracking stub created lazily, so its call count reads as zero.
    pub fn verify_expectations(&self) -> Result {
        let count = self.inner.expectations.borrow().len();
        for index in 0..count {
            self.verify_expectation(index)?;
        }
        Ok(())
    }

    fn verify_expectation(&self, index: usize) -> Result {
        let method = self.inner.expectations.borrow()[index].method.clone();
        if self.stub_spy(&method).is_none() {
            self.stub_passthrough(&method);
        }
        let spy = self.stub_spy(&method).expect("stub just installed");
        let count = spy.call_count();

        let expectations = self.inner.expectations.borrow();
        let rule = &expectations[index];

        if let Some(exact) = rule.exact {
            if count != exact {
                return Err(Error::expectation(format!(
                    "expected `{method}` to be called exactly {}, but it was called {}",
                    times_word(exact),
                    times_word(count)
                )));
            }
        }
        if let Some(min) = rule.min {
            if count < min {
                return Err(Error::expectation(format!(
                    "expected `{method}` to be called at least {}, but it was called {}",
                    times_word(min),
                    times_word(count)
                )));
            }
        }
        if let Some(max) = rule.max {
            if count > max {
                return Err(Error::expectation(format!(
                    "expected `{method}` to be called at most {}, but it was called {}",
                    times_word(max),
                    times_word(count)
                )));
            }
        }
        if !rule.has_count_rule() && count == 0 {
            return Err(Error::expectation(format!(
                "expected `{method}` to be called, but it was never called"
            )));
        }

        if let Some(pattern) = &rule.args {
            if !spy.has_calls_with(pattern) {
                let actual: Vec<String> =
                    spy.calls().iter().map(|c| c.to_string()).collect();
                return Err(Error::expectation(format!(
                    "expected `{method}` to be called with {}, but recorded calls were: {}",
                    describe_pattern(pattern),
                    if actual.is_empty() {
                        "(none)".into()
                    } else {
                        actual.join(", ")
                    }
                )));
            }
        }

        if let Some(prerequisite) = &rule.after {
            self.verify_after(&method, prerequisite, &spy)?;
        }
        Ok(())
    }

    /// The `after` rule compares the *last* call of the dependent method
    /// against the *first* call of the prerequisite, so an early dependent
    /// call interleaved before the prerequisite still passes.
    fn verify_after(&self, method: &str, prerequisite: &str, spy: &Spy) -> Result {
        let prereq_spy = self.stub_spy(prerequisite);
        let prereq_first = prereq_spy.as_ref().and_then(|s| {
            s.calls().first().map(|c| c.sequence())
        });
        let Some(prereq_first) = prereq_first else {
            return Err(Error::expectation(format!(
                "expected `{method}` to be called after `{prerequisite}`, \
                 but `{prerequisite}` was never called"
            )));
        };
        let Some(last) = spy.last_call() else {
            return Err(Error::expectation(format!(
                "expected `{method}` to be called after `{prerequisite}`, \
                 but `{method}` was never called"
            )));
        };
        if last.sequence() < prereq_first {
            return Err(Error::expectation(format!(
                "expected `{method}` to be called after `{prerequisite}`, \
                 but its last call ({}) precedes `{prerequisite}`'s first call ({})",
                last.sequence(),
                prereq_first
            )));
        }
        Ok(())
    }

    // ==================== Sequence Verification ====================

    /// Flattens every stub's call log into the context-wide order and checks
    /// the expected steps positionally from the front. On mismatch the error
    /// prints the full actual ordering.
    pub fn verify_sequence(&self, expected: &[SequenceStep]) -> Result {
        let mut actual: Vec<(String, CallRecord)> = Vec::new();
        for (name, spy) in self.inner.stubs.borrow().iter() {
            for call in spy.calls() {
                actual.push((name.clone(), call));
            }
        }
        actual.sort_by_key(|(_, call)| call.sequence());

        for (i, step) in expected.iter().enumerate() {
            let Some((name, call)) = actual.get(i) else {
                return Err(Error::SequenceMismatch(format!(
                    "expected at least {} calls, but only {} were recorded\n{}",
                    expected.len(),
                    actual.len(),
                    render_sequence(&actual)
                )));
            };
            let step_matches = *name == step.method
                && step.args.as_ref().map_or(true, |p| call.matches(p));
            if !step_matches {
                return Err(Error::SequenceMismatch(format!(
                    "step {i}: expected `{}`{}, but call {i} was `{name}{call}`\n{}",
                    step.method,
                    step.args
                        .as_deref()
                        .map(|p| format!(" with {}", describe_pattern(p)))
                        .unwrap_or_default(),
                    render_sequence(&actual)
                )));
            }
        }
        Ok(())
    }
}

fn render_sequence(actual: &[(String, CallRecord)]) -> String {
    if actual.is_empty() {
        return "actual sequence: (no calls)".into();
    }
    let lines: Vec<String> = actual
        .iter()
        .enumerate()
        .map(|(i, (name, call))| format!("  {i}: {name}{call}"))
        .collect();
    format!("actual sequence:\n{}", lines.join("\n"))
}

/// One step of a [`Mock::verify_sequence`] check: a method name and an
/// optional argument pattern.
#[derive(Debug, Clone)]
pub struct SequenceStep {
    method: String,
    args: Option<Vec<Matcher>>,
}

impl SequenceStep {
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            args: None,
        }
    }

    /// Also require the call's arguments to satisfy the pattern.
    pub fn with_args(mut self, args: Vec<Matcher>) -> Self {
        self.args = Some(args);
        self
    }
}

impl From<&str> for SequenceStep {
    fn from(method: &str) -> Self {
        SequenceStep::new(method)
    }
}

/// Fluent builder returned by [`Mock::expect`]; every method refines the
/// declared expectation and returns the builder for chaining.
#[derive(Debug)]
pub struct ExpectationBuilder {
    mock: Mock,
    index: usize,
}

impl ExpectationBuilder {
    fn update(self, f: impl FnOnce(&mut ExpectationRule)) -> Self {
        f(&mut self.mock.inner.expectations.borrow_mut()[self.index]);
        self
    }

    /// Require exactly `n` calls.
    pub fn times(self, n: usize) -> Self {
        self.update(|rule| rule.exact = Some(n))
    }

    /// Require exactly one call.
    pub fn once(self) -> Self {
        self.times(1)
    }

    /// Require the method to never be called.
    pub fn never(self) -> Self {
        self.times(0)
    }

    /// Require at least `n` calls.
    pub fn at_least(self, n: usize) -> Self {
        self.update(|rule| rule.min = Some(n))
    }

    /// Require at most `n` calls.
    pub fn at_most(self, n: usize) -> Self {
        self.update(|rule| rule.max = Some(n))
    }

    /// Require at least one recorded call to satisfy the pattern.
    pub fn with_args(self, args: Vec<Matcher>) -> Self {
        self.update(|rule| rule.args = Some(args))
    }

    /// Require this method's last call to come after the first call of
    /// `prerequisite`.
    pub fn after(self, prerequisite: &str) -> Self {
        let prerequisite = prerequisite.to_owned();
        self.update(|rule| rule.after = Some(prerequisite))
    }

    /// Stub the method to return `value` immediately, in addition to the
    /// declared rules.
    pub fn returns(self, value: impl Into<Value>) -> Self {
        let method = self.mock.inner.expectations.borrow()[self.index]
            .method
            .clone();
        self.mock.stub_value(&method, value);
        self
    }
}
