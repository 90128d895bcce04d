use super::{Interceptor, InterceptorChain, WebContext, WebError};
use crate::transaction::{DaoManager, Session};
use http::Method;
use log::debug;
use std::sync::Mutex;

/// Signature of a controller action.
pub type ActionFn<C> = fn(&mut C, &mut WebContext, &mut Session) -> Result<(), WebError>;

/// A dispatchable controller method and the rules around calling it.
pub struct Action<C> {
    pub handler: ActionFn<C>,
    /// Only this HTTP method may invoke the action.
    pub allow: Option<Method>,
    /// Run the action inside a transaction.
    pub transactional: bool,
}

impl<C> Action<C> {
    pub fn new(handler: ActionFn<C>) -> Self {
        Self {
            handler,
            allow: None,
            transactional: false,
        }
    }

    pub fn allow(mut self, method: Method) -> Self {
        self.allow = Some(method);
        self
    }

    pub fn transactional(mut self) -> Self {
        self.transactional = true;
        self
    }
}

pub trait Controller: Send + 'static {
    /// Looks up the action for a method name.
    fn action(&self, name: &str) -> Option<Action<Self>>
    where
        Self: Sized;

    /// Selects a view when no action handles the method.
    fn render(&mut self, ctx: &mut WebContext, template: &str) {
        ctx.render(template);
    }
}

/// Where a [`FinalInterceptor`] gets the controller it dispatches to.
enum ControllerSource<C> {
    /// One instance behind a lock; requests through the chain run one at a time.
    Shared(Mutex<C>),
    /// A fresh instance per request; no lock is held across the action.
    PerRequest(fn() -> C),
}

/// Last interceptor of a chain: invokes the controller action named by
/// the context's method name.
///
/// Without a matching action the view `<method><suffix>` is rendered.
///
/// [`FinalInterceptor::new`] wraps a single controller and is meant for a
/// chain built per request. A chain shared between threads should use
/// [`FinalInterceptor::per_request`], otherwise its actions serialize.
pub struct FinalInterceptor<C> {
    source: ControllerSource<C>,
    dao: DaoManager,
    view_suffix: String,
}

impl<C: Controller> FinalInterceptor<C> {
    pub fn new(controller: C, dao: DaoManager) -> Self {
        Self::with_source(ControllerSource::Shared(Mutex::new(controller)), dao)
    }

    /// Builds a new controller from `factory` for every request.
    pub fn per_request(factory: fn() -> C, dao: DaoManager) -> Self {
        Self::with_source(ControllerSource::PerRequest(factory), dao)
    }

    fn with_source(source: ControllerSource<C>, dao: DaoManager) -> Self {
        Self {
            source,
            dao,
            view_suffix: ".html".to_string(),
        }
    }

    pub fn with_view_suffix(mut self, suffix: &str) -> Self {
        self.view_suffix = suffix.to_string();
        self
    }

    /// Hands back the controller, e.g. to inspect it after dispatch.
    pub fn into_controller(self) -> Result<C, WebError> {
        match self.source {
            ControllerSource::Shared(controller) => Ok(controller.into_inner()?),
            ControllerSource::PerRequest(_) => Err(WebError::Controller(
                "per-request interceptor does not own a controller".to_string(),
            )),
        }
    }

    fn dispatch(&self, controller: &mut C, ctx: &mut WebContext) -> Result<(), WebError> {
        let method_name = ctx.method_name().to_string();
        debug!("Execute method {}.{}", ctx.controller_name(), method_name);

        let Some(action) = controller.action(&method_name) else {
            let template = format!("{}{}", method_name, self.view_suffix);
            controller.render(ctx, &template);
            return Ok(());
        };

        if let Some(allowed) = &action.allow {
            if ctx.method() != allowed {
                return Err(WebError::MethodNotAllowed(ctx.method().clone()));
            }
        }

        let mut session = self.dao.session();
        if action.transactional {
            debug!(
                "Use transaction on method {}.{}",
                ctx.controller_name(),
                method_name
            );
            session.run_in_transaction(|session| (action.handler)(&mut *controller, ctx, session))
        } else {
            (action.handler)(controller, ctx, &mut session)
        }
    }
}

impl<C: Controller> Interceptor for FinalInterceptor<C> {
    fn intercept(&self, ctx: &mut WebContext, _chain: &mut InterceptorChain) -> Result<(), WebError> {
        match &self.source {
            ControllerSource::Shared(controller) => {
                let mut controller = controller.lock()?;
                self.dispatch(&mut *controller, ctx)
            }
            ControllerSource::PerRequest(factory) => {
                let mut controller = factory();
                self.dispatch(&mut controller, ctx)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::config::ConnectionConfig;
    use http::Request;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    #[derive(Default)]
    struct Counter {
        hits: usize,
        in_transaction: bool,
    }

    impl Counter {
        fn hit(&mut self, _ctx: &mut WebContext, session: &mut Session) -> Result<(), WebError> {
            self.hits += 1;
            self.in_transaction = session.in_transaction();
            Ok(())
        }
    }

    impl Controller for Counter {
        fn action(&self, name: &str) -> Option<Action<Self>> {
            match name {
                "hit" => Some(Action::new(Counter::hit)),
                "save" => Some(Action::new(Counter::hit).allow(Method::POST).transactional()),
                _ => None,
            }
        }
    }

    fn dispatch(method: Method, name: &str) -> (Result<(), WebError>, WebContext, Counter) {
        let dao = DaoManager::sqlite(ConnectionConfig::default()).unwrap();
        let request = Request::builder().method(method).uri("/").body(()).unwrap();
        let mut ctx = WebContext::new(&request, "");
        ctx.set_controller_name("counter");
        ctx.set_method_name(name);

        let last = Arc::new(FinalInterceptor::new(Counter::default(), dao));
        let erased: Arc<dyn Interceptor> = last.clone();
        let chain = InterceptorChain::new(vec![erased]);
        let result = chain.run(&mut ctx);

        let controller = Arc::into_inner(last).unwrap().into_controller().unwrap();
        (result, ctx, controller)
    }

    #[test]
    fn test_plain_action() {
        let (result, ctx, counter) = dispatch(Method::GET, "hit");
        result.unwrap();
        assert_eq!(counter.hits, 1);
        assert!(!counter.in_transaction);
        assert_eq!(ctx.view(), None);
    }

    #[test]
    fn test_transactional_action() {
        let (result, _, counter) = dispatch(Method::POST, "save");
        result.unwrap();
        assert!(counter.in_transaction);
    }

    #[test]
    fn test_disallowed_method() {
        let (result, _, counter) = dispatch(Method::GET, "save");
        assert!(matches!(result, Err(WebError::MethodNotAllowed(m)) if m == Method::GET));
        assert_eq!(counter.hits, 0);
    }

    #[test]
    fn test_missing_action_renders_view() {
        let (result, ctx, _) = dispatch(Method::GET, "about");
        result.unwrap();
        assert_eq!(ctx.view(), Some("/view/counter/about.html"));
    }

    static RUNNING: AtomicUsize = AtomicUsize::new(0);
    static PEAK: AtomicUsize = AtomicUsize::new(0);

    #[derive(Default)]
    struct Slow;

    impl Slow {
        fn wait(&mut self, _ctx: &mut WebContext, _session: &mut Session) -> Result<(), WebError> {
            let now = RUNNING.fetch_add(1, Ordering::SeqCst) + 1;
            PEAK.fetch_max(now, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(100));
            RUNNING.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        }
    }

    impl Controller for Slow {
        fn action(&self, name: &str) -> Option<Action<Self>> {
            (name == "wait").then(|| Action::new(Slow::wait))
        }
    }

    #[test]
    fn test_per_request_controllers_run_concurrently() {
        let dao = DaoManager::sqlite(ConnectionConfig::default().max_connections(2)).unwrap();
        let last: Arc<dyn Interceptor> = Arc::new(FinalInterceptor::per_request(Slow::default, dao));

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let chain = InterceptorChain::new(vec![Arc::clone(&last)]);
                thread::spawn(move || {
                    let request = Request::builder().uri("/").body(()).unwrap();
                    let mut ctx = WebContext::new(&request, "");
                    ctx.set_controller_name("slow");
                    ctx.set_method_name("wait");
                    chain.run(&mut ctx)
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap().unwrap();
        }
        assert_eq!(PEAK.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_per_request_interceptor_owns_no_controller() {
        let dao = DaoManager::sqlite(ConnectionConfig::default()).unwrap();
        let last = FinalInterceptor::per_request(Counter::default, dao);
        assert!(matches!(last.into_controller(), Err(WebError::Controller(_))));
    }
}
