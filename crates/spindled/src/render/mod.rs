//! Response-building stages and the pipeline that orders them.

mod errors;
mod pipeline;

use std::cell::Cell;
use std::fmt;
use std::sync::Arc;

use crate::request::Request;
use crate::response::Response;

pub use self::errors::PipelineError;
pub use self::pipeline::RenderPipeline;

/// One stage of the response chain.
pub trait Render: Send + Sync {
    /// Name the stage is registered under by default.
    fn name(&self) -> &str;

    /// Names of stages that must run before this one.
    ///
    /// When `Some`, these replace any dependencies supplied at registration.
    fn dependencies(&self) -> Option<Vec<String>> {
        None
    }

    /// Renders `request`, optionally mutating the current response.
    ///
    /// A returned response replaces the current one. Calling
    /// [`StopToken::stop`] ends the chain after this stage for the current
    /// request only.
    fn render(
        &self,
        request: &Request,
        response: Option<&mut Response>,
        stop: &StopToken,
    ) -> Option<Response>;

    /// Whether the chain always ends after this stage.
    fn is_propagation_stopped(&self) -> bool {
        false
    }
}

impl<T> Render for Arc<T>
where
    T: Render + ?Sized,
{
    fn name(&self) -> &str {
        (**self).name()
    }

    fn dependencies(&self) -> Option<Vec<String>> {
        (**self).dependencies()
    }

    fn render(
        &self,
        request: &Request,
        response: Option<&mut Response>,
        stop: &StopToken,
    ) -> Option<Response> {
        (**self).render(request, response, stop)
    }

    fn is_propagation_stopped(&self) -> bool {
        (**self).is_propagation_stopped()
    }
}

/// Stop switch handed to each render during one dispatch.
///
/// A fresh token is created for every request, so a stop never leaks into
/// later dispatches through the shared pipeline.
#[derive(Debug, Default)]
pub struct StopToken {
    stopped: Cell<bool>,
}

impl StopToken {
    /// Creates an unset token.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            stopped: Cell::new(false),
        }
    }

    /// Ends the chain after the current render.
    pub fn stop(&self) {
        self.stopped.set(true);
    }

    /// Whether a render asked to end the chain.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.stopped.get()
    }
}

/// Adapts a closure into a [`Render`].
///
/// The closure receives the dispatch's [`StopToken`] and may end the chain
/// for the request it is handling:
///
/// ```rust
/// use spindled::{CallbackRender, Render, Request, Response, StopToken};
///
/// let gate = CallbackRender::new("gate", |request: &Request, _, stop: &StopToken| {
///     if request.command() == "shutdown" {
///         stop.stop();
///         return Some(Response::text("denied"));
///     }
///     None
/// });
/// assert_eq!(gate.name(), "gate");
/// ```
pub struct CallbackRender<F> {
    name: String,
    dependencies: Option<Vec<String>>,
    stop_propagation: bool,
    callback: F,
}

impl<F> CallbackRender<F>
where
    F: Fn(&Request, Option<&mut Response>, &StopToken) -> Option<Response> + Send + Sync,
{
    /// Wraps `callback` under `name`.
    pub fn new(name: impl Into<String>, callback: F) -> Self {
        Self {
            name: name.into(),
            dependencies: None,
            stop_propagation: false,
            callback,
        }
    }

    /// Declares stages that must run first.
    #[must_use]
    pub fn with_dependencies<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = Some(dependencies.into_iter().map(Into::into).collect());
        self
    }

    /// Ends the chain after this stage for every request when `stop` is set.
    #[must_use]
    pub fn stop_propagation(mut self, stop: bool) -> Self {
        self.stop_propagation = stop;
        self
    }
}

impl<F> fmt::Debug for CallbackRender<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackRender")
            .field("name", &self.name)
            .field("dependencies", &self.dependencies)
            .field("stop_propagation", &self.stop_propagation)
            .finish_non_exhaustive()
    }
}

impl<F> Render for CallbackRender<F>
where
    F: Fn(&Request, Option<&mut Response>, &StopToken) -> Option<Response> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn dependencies(&self) -> Option<Vec<String>> {
        self.dependencies.clone()
    }

    fn render(
        &self,
        request: &Request,
        response: Option<&mut Response>,
        stop: &StopToken,
    ) -> Option<Response> {
        (self.callback)(request, response, stop)
    }

    fn is_propagation_stopped(&self) -> bool {
        self.stop_propagation
    }
}
