use std::cell::{Cell, RefCell};
use std::fmt;
use std::future::Future;
use std::rc::Rc;
use std::time::Duration;

use crate::sched::{TaskStatus, DEFAULT_ASYNC_TIMEOUT};
use crate::target::MethodFn;
use crate::{Error, Mock, MockOptions, Result, SequenceClock, Spy, Target, Value};

/// Per-test home of the spies, mocks, sequence clock and the async runner.
///
/// One context per test. Everything created through it shares the same
/// [`SequenceClock`](crate::SequenceClock), so call order is comparable
/// across all of the test's spies and mocks. `TestContext` is a cheap-clone
/// handle; types created from it use `Rc` internally and are `!Send` — this
/// is intentional, they are designed for single-threaded test contexts only.
///
/// # Example
///
/// ```
/// use monomi::{vals, with_mocks, Value};
///
/// with_mocks(|ctx| {
///     let first = ctx.spy_noop();
///     let second = ctx.spy_noop();
///     first.call(vals![]);
///     second.call(vals![]);
///     assert!(second.called_after(&first));
///     Ok(())
/// })
/// .unwrap();
/// ```
#[derive(Clone)]
pub struct TestContext {
    pub(crate) inner: Rc<CtxInner>,
}

pub(crate) struct CtxInner {
    clock: SequenceClock,
    frames: RefCell<Vec<Frame>>,
    pub(crate) async_active: Cell<bool>,
    pub(crate) task_status: Cell<TaskStatus>,
    pub(crate) default_timeout: Cell<Duration>,
}

/// One registry frame: the doubles created while it was the top of the
/// stack, in creation order. Restored strictly in reverse when popped, so a
/// double layered on top of an earlier one unwinds first and the earlier
/// double's original comes back last.
#[derive(Default)]
struct Frame {
    doubles: Vec<Double>,
}

enum Double {
    Mock(Mock),
    Spy(Spy),
}

impl fmt::Debug for TestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestContext")
            .field("clock", &self.inner.clock)
            .field("frames", &self.inner.frames.borrow().len())
            .finish()
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl TestContext {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(CtxInner {
                clock: SequenceClock::new(),
                // The root frame catches doubles created outside any scope;
                // those are only restored manually.
                frames: RefCell::new(vec![Frame::default()]),
                async_active: Cell::new(false),
                task_status: Cell::new(TaskStatus::Pending),
                default_timeout: Cell::new(DEFAULT_ASYNC_TIMEOUT),
            }),
        }
    }

    /// The clock stamping every call recorded through this context.
    pub fn clock(&self) -> SequenceClock {
        self.inner.clock.clone()
    }

    // ==================== Creating Doubles ====================

    /// A spy wrapping a callable: calls are recorded, then delegated.
    pub fn spy<F>(&self, f: F) -> Spy
    where
        F: Fn(&[Value]) -> Value + 'static,
    {
        let spy = Spy::wrapping(self.inner.clock.clone(), Some(Rc::new(f) as MethodFn));
        self.register_spy(spy.clone());
        spy
    }

    /// A spy wrapping nothing: calls are recorded and return nil.
    pub fn spy_noop(&self) -> Spy {
        let spy = Spy::wrapping(self.inner.clock.clone(), None);
        self.register_spy(spy.clone());
        spy
    }

    /// Replaces `target[method]` with a recording wrapper that delegates to
    /// the original. `Usage` error if the method does not exist.
    pub fn spy_on(&self, target: &Target, method: &str) -> Result<Spy> {
        let Some(original) = target.get(method) else {
            return Err(Error::usage(format!(
                "cannot spy on `{method}`: target has no such method"
            )));
        };
        let spy = Spy::attach(
            self.inner.clock.clone(),
            target,
            method,
            Some(original.clone()),
            Some(original),
        );
        self.register_spy(spy.clone());
        Ok(spy)
    }

    /// A mock over the target with default options.
    pub fn mock(&self, target: &Target) -> Mock {
        self.mock_with(target, MockOptions::default())
    }

    /// A mock over the target with explicit options.
    pub fn mock_with(&self, target: &Target, options: MockOptions) -> Mock {
        let mock = Mock::new(self.inner.clock.clone(), target, options);
        self.current_frame(|frame| frame.doubles.push(Double::Mock(mock.clone())));
        mock
    }

    fn register_spy(&self, spy: Spy) {
        self.current_frame(|frame| frame.doubles.push(Double::Spy(spy)));
    }

    fn current_frame(&self, f: impl FnOnce(&mut Frame)) {
        let mut frames = self.inner.frames.borrow_mut();
        let frame = frames.last_mut().expect("root frame always present");
        f(frame);
    }

    // ==================== Lifecycle ====================

    /// Runs `body` inside a fresh registry frame. Every mock and spy created
    /// during the body is restored when the frame pops — on success, failure
    /// or panic — and only then does the body's error propagate.
    pub fn scope<T>(&self, body: impl FnOnce() -> Result<T>) -> Result<T> {
        let _guard = FrameGuard::push(self);
        body()
    }

    /// Async form of [`scope`](Self::scope); cleanup runs when the future
    /// completes or is dropped.
    pub async fn scope_async<T, F>(&self, body: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let _guard = FrameGuard::push(self);
        body.await
    }

    fn pop_and_restore(&self) {
        let frame = self.inner.frames.borrow_mut().pop();
        if let Some(frame) = frame {
            for double in frame.doubles.iter().rev() {
                match double {
                    Double::Mock(mock) => mock.restore(),
                    Double::Spy(spy) => spy.restore(),
                }
            }
        }
    }
}

/// Pops the frame and restores its doubles on drop, so cleanup survives
/// early returns and panics alike.
struct FrameGuard {
    ctx: TestContext,
}

impl FrameGuard {
    fn push(ctx: &TestContext) -> Self {
        ctx.inner.frames.borrow_mut().push(Frame::default());
        Self { ctx: ctx.clone() }
    }
}

impl Drop for FrameGuard {
    fn drop(&mut self) {
        self.ctx.pop_and_restore();
    }
}

/// Runs `body` with a fresh context and an isolated registry frame,
/// restoring every mock and spy created inside — even on error or panic.
pub fn with_mocks<T>(body: impl FnOnce(&TestContext) -> Result<T>) -> Result<T> {
    let ctx = TestContext::new();
    ctx.scope(|| body(&ctx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vals;

    #[test]
    fn scope_restores_mocks_on_success() {
        let ctx = TestContext::new();
        let target = Target::new();
        target.define_value("m", "original");

        ctx.scope(|| {
            let mock = ctx.mock(&target);
            mock.stub_value("m", "stubbed");
            assert_eq!(target.invoke("m", vals![]).unwrap(), Value::from("stubbed"));
            Ok(())
        })
        .unwrap();

        assert_eq!(target.invoke("m", vals![]).unwrap(), Value::from("original"));
    }

    #[test]
    fn scope_restores_on_failure_and_rethrows() {
        let ctx = TestContext::new();
        let target = Target::new();
        target.define_value("m", 1);

        let err = ctx
            .scope(|| {
                ctx.mock(&target).stub_value("m", 2);
                Err::<(), _>(Error::assertion("body failed"))
            })
            .unwrap_err();

        assert!(matches!(err, Error::Assertion(_)));
        assert_eq!(target.invoke("m", vals![]).unwrap(), Value::Int(1));
    }

    #[test]
    fn scope_restores_on_panic() {
        let ctx = TestContext::new();
        let target = Target::new();
        target.define_value("m", 1);

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            ctx.scope(|| -> Result<()> {
                ctx.mock(&target).stub_value("m", 2);
                panic!("unexpected");
            })
        }));

        assert!(result.is_err());
        assert_eq!(target.invoke("m", vals![]).unwrap(), Value::Int(1));
    }

    #[test]
    fn nested_scopes_restore_in_layers() {
        let ctx = TestContext::new();
        let target = Target::new();
        target.define_value("m", 0);

        ctx.scope(|| {
            ctx.mock(&target).stub_value("m", 1);
            ctx.scope(|| {
                ctx.mock(&target).stub_value("m", 2);
                assert_eq!(target.invoke("m", vals![]).unwrap(), Value::Int(2));
                Ok(())
            })?;
            // Inner frame popped: back to the outer stub.
            assert_eq!(target.invoke("m", vals![]).unwrap(), Value::Int(1));
            Ok(())
        })
        .unwrap();

        assert_eq!(target.invoke("m", vals![]).unwrap(), Value::Int(0));
    }

    #[test]
    fn attached_spies_are_restored_with_the_frame() {
        let ctx = TestContext::new();
        let target = Target::new();
        target.define_value("m", 1);
        let original = target.get("m").unwrap();

        ctx.scope(|| {
            let spy = ctx.spy_on(&target, "m")?;
            target.invoke("m", vals![]).unwrap();
            assert!(spy.called_once());
            Ok(())
        })
        .unwrap();

        assert!(Rc::ptr_eq(&target.get("m").unwrap(), &original));
    }

    #[test]
    fn stub_then_spy_on_the_same_method_unwinds_to_the_original() {
        let ctx = TestContext::new();
        let target = Target::new();
        target.define_value("m", 1);

        // The spy wraps the stub, so it must unwind before the mock does.
        ctx.scope(|| {
            ctx.mock(&target).stub_value("m", 2);
            let spy = ctx.spy_on(&target, "m")?;
            assert_eq!(target.invoke("m", vals![]).unwrap(), Value::Int(2));
            assert!(spy.called_once());
            Ok(())
        })
        .unwrap();

        assert_eq!(target.invoke("m", vals![]).unwrap(), Value::Int(1));
    }

    #[test]
    fn spy_on_then_stub_of_the_same_method_unwinds_to_the_original() {
        let ctx = TestContext::new();
        let target = Target::new();
        target.define_value("m", 1);

        ctx.scope(|| {
            let spy = ctx.spy_on(&target, "m")?;
            ctx.mock(&target).stub_value("m", 2);
            assert_eq!(target.invoke("m", vals![]).unwrap(), Value::Int(2));
            assert!(spy.not_called()); // the stub shadows the spy wrapper
            Ok(())
        })
        .unwrap();

        assert_eq!(target.invoke("m", vals![]).unwrap(), Value::Int(1));
    }

    #[test]
    fn with_mocks_gives_an_isolated_context() {
        let target = Target::new();
        target.define_value("m", 1);

        with_mocks(|ctx| {
            ctx.mock(&target).stub_value("m", 2);
            assert_eq!(target.invoke("m", vals![]).unwrap(), Value::Int(2));
            Ok(())
        })
        .unwrap();

        assert_eq!(target.invoke("m", vals![]).unwrap(), Value::Int(1));
    }

    #[tokio::test]
    async fn scope_async_restores_after_the_future() {
        let ctx = TestContext::new();
        let target = Target::new();
        target.define_value("m", 1);

        ctx.scope_async(async {
            ctx.mock(&target).stub_value("m", 2);
            ctx.run_async(async {
                ctx.pause(5).await?;
                assert_eq!(target.invoke("m", vals![]).unwrap(), Value::Int(2));
                Ok(())
            })
            .await
        })
        .await
        .unwrap();

        assert_eq!(target.invoke("m", vals![]).unwrap(), Value::Int(1));
    }

    #[test]
    fn manual_restore_composes_with_frame_cleanup() {
        let ctx = TestContext::new();
        let target = Target::new();
        target.define_value("m", 1);

        ctx.scope(|| {
            let mock = ctx.mock(&target);
            mock.stub_value("m", 2);
            mock.restore(); // early
            assert_eq!(target.invoke("m", vals![]).unwrap(), Value::Int(1));
            Ok(())
        })
        .unwrap();

        assert_eq!(target.invoke("m", vals![]).unwrap(), Value::Int(1));
    }
}
