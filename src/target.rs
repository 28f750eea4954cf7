use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::{Error, Result, Value};

/// A callable slot on a [`Target`].
pub(crate) type MethodFn = Rc<dyn Fn(&[Value]) -> Value>;

/// A dynamic object with named callable methods — the thing a [`Mock`](crate::Mock)
/// patches and a spy attaches to.
///
/// `Target` is a cheap-clone handle over shared slots; production code holds
/// one clone and calls [`invoke`](Self::invoke), while the test stubs and
/// restores methods through another clone. Restoration puts back the exact
/// original callable, observable by reference identity.
///
/// # Example
///
/// ```
/// use monomi::{vals, Target, Value};
///
/// let api = Target::new();
/// api.define("status", |_| Value::from("ok"));
/// assert_eq!(api.invoke("status", vals![]).unwrap(), Value::from("ok"));
/// ```
#[derive(Clone, Default)]
pub struct Target {
    methods: Rc<RefCell<HashMap<String, MethodFn>>>,
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Target")
            .field("methods", &self.methods.borrow().len())
            .finish()
    }
}

impl Target {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defines (or replaces) a method.
    pub fn define<F>(&self, name: impl Into<String>, method: F)
    where
        F: Fn(&[Value]) -> Value + 'static,
    {
        self.methods.borrow_mut().insert(name.into(), Rc::new(method));
    }

    /// Defines a method that ignores its arguments and returns a constant.
    pub fn define_value(&self, name: impl Into<String>, value: impl Into<Value>) {
        let value = value.into();
        self.define(name, move |_| value.clone());
    }

    /// Calls the named method. `Usage` error if no such method exists.
    pub fn invoke(&self, name: &str, args: Vec<Value>) -> Result<Value> {
        let method = self.methods.borrow().get(name).cloned().ok_or_else(|| {
            Error::usage(format!("target has no method `{name}`"))
        })?;
        Ok(method(&args))
    }

    /// Returns true if the named method exists.
    pub fn has_method(&self, name: &str) -> bool {
        self.methods.borrow().contains_key(name)
    }

    pub(crate) fn get(&self, name: &str) -> Option<MethodFn> {
        self.methods.borrow().get(name).cloned()
    }

    pub(crate) fn install(&self, name: &str, method: MethodFn) {
        self.methods.borrow_mut().insert(name.to_owned(), method);
    }

    pub(crate) fn remove(&self, name: &str) {
        self.methods.borrow_mut().remove(name);
    }
}
