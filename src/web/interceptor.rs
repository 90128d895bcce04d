use super::{WebContext, WebError};
use std::sync::Arc;

/// One link of the request-handling chain.
///
/// An interceptor either calls `chain.proceed(ctx)` to hand the request on,
/// or returns without doing so to short-circuit everything after it.
pub trait Interceptor: Send + Sync {
    fn intercept(&self, ctx: &mut WebContext, chain: &mut InterceptorChain) -> Result<(), WebError>;
}

/// Ordered interceptors for one request.
pub struct InterceptorChain {
    interceptors: Vec<Arc<dyn Interceptor>>,
    index: usize,
}

impl InterceptorChain {
    pub fn new(interceptors: Vec<Arc<dyn Interceptor>>) -> Self {
        Self {
            interceptors,
            index: 0,
        }
    }

    pub fn add(&mut self, interceptor: Arc<dyn Interceptor>) -> &mut Self {
        self.interceptors.push(interceptor);
        self
    }

    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }

    /// Invokes the next interceptor; a no-op once the chain is exhausted.
    pub fn proceed(&mut self, ctx: &mut WebContext) -> Result<(), WebError> {
        let Some(next) = self.interceptors.get(self.index).cloned() else {
            return Ok(());
        };
        self.index += 1;
        next.intercept(ctx, self)
    }

    /// Runs the chain from the start.
    pub fn run(mut self, ctx: &mut WebContext) -> Result<(), WebError> {
        self.index = 0;
        self.proceed(ctx)
    }
}
