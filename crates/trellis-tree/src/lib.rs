//! Declarative tree reconciliation for trellis.
//!
//! A [`RenderNode`] snapshot describes what should exist; the [`Reconciler`]
//! maps snapshot transitions onto a mutable [`LiveRef`] tree and a concrete
//! host through the [`HostAdapter`] boundary. Component instances glue render
//! functions to the reactive graph in `trellis-core` and schedule coalesced
//! re-renders on its runtime.

use std::fmt;
use std::rc::Rc;

pub mod adapter;
pub mod instance;
pub mod node;
pub mod reconciler;

pub use adapter::{HostAdapter, HostSpec};
pub use instance::{Context, HookRegistration, Instance, LifecycleEvent};
pub use node::{
    ChildList, Component, ComponentSpec, Element, Handler, Key, Leaf, PropValue, Props, RenderFn,
    RenderNode,
};
pub use reconciler::{LiveRef, Reconciler};

pub use trellis_core::reactive::EvalError;

/// Failure of a component render function.
///
/// Cloneable so one failure can be delivered to every registered error hook;
/// recovered at the nearest ancestor instance with an error hook, otherwise
/// fatal to the render pass that produced it.
#[derive(Clone)]
pub struct RenderError {
    inner: Rc<RenderErrorRepr>,
}

struct RenderErrorRepr {
    message: String,
    component: Option<Rc<str>>,
    source: Option<Rc<dyn std::error::Error + 'static>>,
}

impl RenderError {
    pub fn msg(message: impl Into<String>) -> Self {
        Self {
            inner: Rc::new(RenderErrorRepr {
                message: message.into(),
                component: None,
                source: None,
            }),
        }
    }

    pub fn caused_by(
        message: impl Into<String>,
        source: impl std::error::Error + 'static,
    ) -> Self {
        Self {
            inner: Rc::new(RenderErrorRepr {
                message: message.into(),
                component: None,
                source: Some(Rc::new(source)),
            }),
        }
    }

    /// Tags the error with the component it escaped from; the message and
    /// source chain carry over.
    pub fn in_component(self, name: impl Into<Rc<str>>) -> Self {
        Self {
            inner: Rc::new(RenderErrorRepr {
                message: self.inner.message.clone(),
                component: Some(name.into()),
                source: self.inner.source.clone(),
            }),
        }
    }

    pub fn message(&self) -> &str {
        &self.inner.message
    }

    pub fn component(&self) -> Option<&str> {
        self.inner.component.as_deref()
    }
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner.component {
            Some(component) => write!(f, "render failed in `{component}`: {}", self.inner.message),
            None => write!(f, "render failed: {}", self.inner.message),
        }
    }
}

impl fmt::Debug for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderError")
            .field("message", &self.inner.message)
            .field("component", &self.inner.component)
            .finish()
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.inner.source.as_deref()
    }
}

impl From<EvalError> for RenderError {
    fn from(err: EvalError) -> Self {
        Self::caused_by(err.message().to_owned(), err)
    }
}
