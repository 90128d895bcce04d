//! Per-request context and interceptor-based dispatch.
//!
//! A host builds one [`WebContext`] per request, sets the controller and
//! method names it routed to, and runs an [`InterceptorChain`] ending in a
//! [`FinalInterceptor`]. Rendering and transport stay with the host.

pub mod context;
pub mod controller;
pub mod error;
pub mod interceptor;

pub use context::{Accept, WebContext};
pub use controller::{Action, ActionFn, Controller, FinalInterceptor};
pub use error::WebError;
pub use interceptor::{Interceptor, InterceptorChain};
