//! Native functions stored as property values.

use std::fmt;
use std::sync::Arc;

use super::Value;
use crate::error::Result;

/// A function body. Receives the receiver (`this`) and the arguments.
pub type NativeFn = Arc<dyn Fn(&Value, &[Value]) -> Result<Value> + Send + Sync>;

/// A callable value with reference identity.
#[derive(Clone)]
pub struct Function {
    inner: Arc<FunctionInner>,
}

struct FunctionInner {
    name: Arc<str>,
    body: NativeFn,
    /// Receiver fixed by [`Function::bind`]; overrides the call-site `this`.
    bound_this: Option<Value>,
}

impl Function {
    pub fn new<F>(name: impl Into<Arc<str>>, body: F) -> Self
    where
        F: Fn(&Value, &[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        Self::from_native(name, Arc::new(body))
    }

    pub fn from_native(name: impl Into<Arc<str>>, body: NativeFn) -> Self {
        Self {
            inner: Arc::new(FunctionInner {
                name: name.into(),
                body,
                bound_this: None,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Invoke the function. A bound function ignores `this`.
    pub fn call(&self, this: &Value, args: &[Value]) -> Result<Value> {
        let this = self.inner.bound_this.as_ref().unwrap_or(this);
        (self.inner.body)(this, args)
    }

    /// A new function with the same body and a fixed receiver.
    pub fn bind(&self, this: Value) -> Function {
        Self {
            inner: Arc::new(FunctionInner {
                name: self.inner.name.clone(),
                body: self.inner.body.clone(),
                bound_this: Some(this),
            }),
        }
    }

    pub fn is_bound(&self) -> bool {
        self.inner.bound_this.is_some()
    }

    pub fn ptr_eq(&self, other: &Function) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Address of the function allocation, stable for its lifetime.
    pub fn addr(&self) -> usize {
        Arc::as_ptr(&self.inner) as *const () as usize
    }

    /// Number of live handles to this function.
    pub(crate) fn handle_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("name", &self.inner.name)
            .field("bound", &self.is_bound())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn receiver_name() -> Function {
        Function::new("receiverName", |this, _args| Ok(this.get("name")))
    }

    #[test]
    fn call_passes_receiver_and_args() {
        let add = Function::new("add", |_this, args| {
            let sum: f64 = args.iter().filter_map(Value::as_f64).sum();
            Ok(Value::from(sum))
        });

        let result = add.call(&Value::Undefined, &[Value::from(2), Value::from(3)]).unwrap();
        assert_eq!(result, Value::from(5));
    }

    #[test]
    fn bound_function_ignores_call_site_receiver() {
        let owner = Value::from_json(serde_json::json!({ "name": "owner" }));
        let other = Value::from_json(serde_json::json!({ "name": "other" }));
        let bound = receiver_name().bind(owner);

        assert!(bound.is_bound());
        assert_eq!(bound.call(&other, &[]).unwrap(), Value::from("owner"));
    }

    #[test]
    fn bind_creates_new_identity() {
        let f = receiver_name();
        let g = f.bind(Value::Null);
        assert!(!f.ptr_eq(&g));
        assert!(f.ptr_eq(&f.clone()));
    }
}
