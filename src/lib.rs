#![cfg_attr(docsrs, feature(doc_cfg))]
//! # Monomi
//!
//! A spy/mock verification and cooperative async testing toolkit.
//!
//! Monomi records every call made through its test doubles against one
//! strictly-increasing sequence clock, so call order is comparable across
//! unrelated spies and mocks. On top of that it provides fluent
//! expectations, an assertion chain, and a single-threaded cooperative
//! async runner with timeout cancellation at await points.
//!
//! ## Quick Start
//!
//! ```rust
//! use monomi::{expect, vals, with_mocks, Target, Value};
//!
//! fn main() -> monomi::Result {
//!     let api = Target::new();
//!     api.define_value("fetch", "live");
//!
//!     with_mocks(|ctx| {
//!         let mock = ctx.mock(&api);
//!         mock.expect("fetch")
//!             .times(2)
//!             .with_args(vec![monomi::Matcher::eq("users")])
//!             .returns("cached");
//!
//!         api.invoke("fetch", vals!["users"])?;
//!         api.invoke("fetch", vals!["users"])?;
//!
//!         mock.verify_expectations()?;
//!         expect(api.invoke("fetch", vals!["users"])?).to_equal("cached")?;
//!         Ok(())
//!     })?;
//!
//!     // The frame popped: the original method is back.
//!     assert_eq!(api.invoke("fetch", vals![])?, Value::from("live"));
//!     Ok(())
//! }
//! ```
//!
//! ## Core Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`TestContext`] | Per-test owner of the clock, registry and async runner |
//! | [`Value`] | Dynamic value: spy arguments, stub returns, patterns |
//! | [`Spy`] | Invocation recorder wrapping a callable or a [`Target`] method |
//! | [`Mock`] | Stub owner over a [`Target`], with verifiable expectations |
//! | [`Matcher`] | Reusable predicate-plus-description for argument patterns |
//! | [`Target`] | Dynamic object with named callable methods |
//! | [`Assertion`] | The [`expect`] chain: verbs plus a negation flag |
//! | [`SequenceNo`] | A call's position in the context-wide total order |
//! | [`TaskStatus`] | State machine of the async runner's current body |
//!
//! ## Ordering Guarantees
//!
//! Every recorded call draws its position from the context's
//! [`SequenceClock`], giving a strict total order across all doubles —
//! usable through [`Spy::called_before`] / [`Spy::called_after`], expectation
//! [`after`](ExpectationBuilder::after) rules and
//! [`Mock::verify_sequence`]. The order stays meaningful inside
//! [`TestContext::run_async`] bodies because execution is still
//! single-threaded.
//!
//! ## Cooperative Async
//!
//! [`TestContext::run_async`] drives a body future under a wall-clock
//! timeout. [`TestContext::pause`] and [`TestContext::wait_until`] are the
//! only suspension points; a timeout is detected at the next one, so a body
//! that never awaits cannot be cancelled.
//!
//! ## Note
//!
//! Test-double types use `Rc` internally and are `!Send`. This is
//! intentional — they are designed for single-threaded test contexts only.
//!
//! ## Features
//!
//! - **`serde`** - `Serialize`/`Deserialize` for [`Value`]

mod call;
mod context;
mod error;
mod expect;
mod matcher;
mod mock;
mod sched;
mod sequence;
mod spy;
mod target;
mod value;

pub use call::CallRecord;
pub use context::{with_mocks, TestContext};
pub use error::{Error, ErrorKind};
pub use expect::{expect, expect_throw, Assertion, ThrowAssertion};
pub use matcher::Matcher;
pub use mock::{ExpectationBuilder, Mock, MockOptions, SequenceStep};
pub use sched::{TaskStatus, DEFAULT_ASYNC_TIMEOUT, DEFAULT_POLL_INTERVAL};
pub use sequence::{SequenceClock, SequenceNo};
pub use spy::Spy;
pub use target::Target;
pub use value::{Value, ValueKind};

/// Convenience alias for `Result<T, monomi::Error>`.
pub type Result<T = ()> = std::result::Result<T, Error>;
