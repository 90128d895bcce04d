/// Web dispatch tests
///
/// Requests driven through an interceptor chain into a controller backed by
/// a SQLite file.
/// Run with: cargo test --test web_dispatch_tests

use http::{Method, Request, StatusCode};
use std::sync::Arc;
use tempfile::TempDir;
use topaz::{
    Action, ConnectionConfig, Controller, DaoManager, FinalInterceptor, Interceptor,
    InterceptorChain, Model, Session, Value, WebContext, WebError,
};

#[derive(Debug, Default, Model)]
struct Note {
    id: i64,
    body: String,
}

#[derive(Default)]
struct NoteController;

impl NoteController {
    fn list(&mut self, ctx: &mut WebContext, session: &mut Session) -> Result<(), WebError> {
        let notes = session.query::<Note>("SELECT id, body FROM note ORDER BY id", &[])?;
        let bodies: Vec<&str> = notes.iter().map(|n| n.body.as_str()).collect();
        ctx.set_attr("notes", &bodies)?;
        ctx.render("list.html");
        Ok(())
    }

    fn create(&mut self, ctx: &mut WebContext, session: &mut Session) -> Result<(), WebError> {
        let bodies = ctx.params("body").to_vec();
        for body in &bodies {
            session.execute("INSERT INTO note (body) VALUES (?1)", &[Value::from(body.as_str())])?;
        }
        if bodies.iter().any(|b| b.is_empty()) {
            ctx.add_error("body", "must not be empty");
            return Err(WebError::Controller("empty note".into()));
        }
        Ok(())
    }
}

impl Controller for NoteController {
    fn action(&self, name: &str) -> Option<Action<Self>> {
        match name {
            "list" => Some(Action::new(NoteController::list).allow(Method::GET)),
            "create" => Some(
                Action::new(NoteController::create)
                    .allow(Method::POST)
                    .transactional(),
            ),
            _ => None,
        }
    }
}

/// Rejects requests without an `x-user` header.
struct RequireUser;

impl Interceptor for RequireUser {
    fn intercept(&self, ctx: &mut WebContext, chain: &mut InterceptorChain) -> Result<(), WebError> {
        if ctx.header("x-user").is_none() {
            ctx.set_header("www-authenticate", "user")?;
            return Ok(());
        }
        chain.proceed(ctx)
    }
}

fn setup() -> (TempDir, DaoManager) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notes.db");
    let dao = DaoManager::sqlite(ConnectionConfig::sqlite(path.to_str().unwrap())).unwrap();
    dao.session().with_connection(|conn| {
        conn.execute_batch("CREATE TABLE note (id INTEGER PRIMARY KEY AUTOINCREMENT, body TEXT);")
    })
    .unwrap();
    (dir, dao)
}

fn interceptors(dao: &DaoManager) -> Vec<Arc<dyn Interceptor>> {
    vec![
        Arc::new(RequireUser),
        Arc::new(FinalInterceptor::per_request(|| NoteController, dao.clone())),
    ]
}

fn dispatch(dao: &DaoManager, method: Method, uri: &str, action: &str) -> (Result<(), WebError>, WebContext) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("x-user", "tester")
        .body(())
        .unwrap();
    let mut ctx = WebContext::new(&request, "/templates");
    ctx.set_controller_name("note");
    ctx.set_method_name(action);

    let chain = InterceptorChain::new(interceptors(dao));
    let result = chain.run(&mut ctx);
    (result, ctx)
}

#[test]
fn test_create_then_list() {
    let (_dir, dao) = setup();

    let (result, _) = dispatch(&dao, Method::POST, "/note/create?body=first&body=second", "create");
    result.unwrap();

    let (result, ctx) = dispatch(&dao, Method::GET, "/note/list", "list");
    result.unwrap();
    assert_eq!(ctx.view(), Some("/templates/note/list.html"));
    assert_eq!(ctx.attr_as::<Vec<String>>("notes"), Some(vec!["first".into(), "second".into()]));
    assert_eq!(dao.num_active(), 0);
}

#[test]
fn test_failed_transactional_action_rolls_back() {
    let (_dir, dao) = setup();

    let (result, ctx) = dispatch(&dao, Method::POST, "/note/create?body=kept&body=", "create");
    assert!(matches!(result, Err(WebError::Controller(_))));
    assert!(ctx.has_errors());

    let (_, ctx) = dispatch(&dao, Method::GET, "/note/list", "list");
    assert_eq!(ctx.attr_as::<Vec<String>>("notes"), Some(Vec::new()));
}

#[test]
fn test_method_not_allowed() {
    let (_dir, dao) = setup();

    let (result, _) = dispatch(&dao, Method::GET, "/note/create?body=x", "create");
    let err = result.unwrap_err();
    assert_eq!(err.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[test]
fn test_unknown_method_renders_named_view() {
    let (_dir, dao) = setup();

    let (result, ctx) = dispatch(&dao, Method::GET, "/note/help", "help");
    result.unwrap();
    assert_eq!(ctx.view(), Some("/templates/note/help.html"));
}

#[test]
fn test_interceptor_short_circuits_without_user() {
    let (_dir, dao) = setup();

    let request = Request::builder().uri("/note/list").body(()).unwrap();
    let mut ctx = WebContext::new(&request, "");
    ctx.set_method_name("list");

    let chain = InterceptorChain::new(interceptors(&dao));
    chain.run(&mut ctx).unwrap();

    assert_eq!(ctx.view(), None);
    assert_eq!(ctx.response_headers()["www-authenticate"], "user");
}
