use super::WebError;
use http::header::{ACCEPT, HeaderName, HeaderValue};
use http::{HeaderMap, Method, Request, Uri};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;

const DEFAULT_VIEW_BASE: &str = "/view/";
const DEFAULT_CONTROLLER: &str = "root";
const DEFAULT_METHOD: &str = "index";

/// Response formats a client may ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accept {
    Json,
    Xml,
    Html,
}

/// Everything one request carries through the interceptor chain.
///
/// Built once per request and owned by the thread handling it; nothing in
/// here is shared.
#[derive(Debug)]
pub struct WebContext {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    response_headers: HeaderMap,
    params: HashMap<String, Vec<String>>,
    attributes: HashMap<String, serde_json::Value>,
    errors: HashMap<String, String>,
    module_name: Option<String>,
    controller_name: String,
    method_name: String,
    view_base: String,
    view: Option<String>,
}

impl WebContext {
    /// Captures method, URI, headers and query parameters of `request`.
    /// A blank `view_base` falls back to `/view/`; a trailing `/` is enforced.
    pub fn new<B>(request: &Request<B>, view_base: &str) -> Self {
        let view_base = if view_base.trim().is_empty() {
            DEFAULT_VIEW_BASE.to_string()
        } else if view_base.ends_with('/') {
            view_base.to_string()
        } else {
            format!("{}/", view_base)
        };

        let mut ctx = Self {
            method: request.method().clone(),
            uri: request.uri().clone(),
            headers: request.headers().clone(),
            response_headers: HeaderMap::new(),
            params: HashMap::new(),
            attributes: HashMap::new(),
            errors: HashMap::new(),
            module_name: None,
            controller_name: DEFAULT_CONTROLLER.to_string(),
            method_name: DEFAULT_METHOD.to_string(),
            view_base,
            view: None,
        };

        if let Some(query) = request.uri().query() {
            ctx.add_form_params(query.as_bytes());
        }
        ctx
    }

    /// Adds `application/x-www-form-urlencoded` pairs, e.g. a POST body.
    pub fn add_form_params(&mut self, form: &[u8]) {
        for (key, value) in url::form_urlencoded::parse(form) {
            self.params
                .entry(key.into_owned())
                .or_default()
                .push(value.into_owned());
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn is_get(&self) -> bool {
        self.method == Method::GET
    }

    pub fn is_post(&self) -> bool {
        self.method == Method::POST
    }

    pub fn is_put(&self) -> bool {
        self.method == Method::PUT
    }

    pub fn is_head(&self) -> bool {
        self.method == Method::HEAD
    }

    pub fn is_delete(&self) -> bool {
        self.method == Method::DELETE
    }

    /// Request header, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn set_header(&mut self, name: &str, value: &str) -> Result<(), WebError> {
        let invalid = |reason: String| WebError::InvalidHeader {
            name: name.to_string(),
            reason,
        };
        let name_value = HeaderName::from_bytes(name.as_bytes()).map_err(|e| invalid(e.to_string()))?;
        let value = HeaderValue::from_str(value).map_err(|e| invalid(e.to_string()))?;
        self.response_headers.insert(name_value, value);
        Ok(())
    }

    pub fn response_headers(&self) -> &HeaderMap {
        &self.response_headers
    }

    /// First value of a request parameter.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .get(key)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    pub fn params(&self, key: &str) -> &[String] {
        self.params.get(key).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn attr(&self, key: &str) -> Option<&serde_json::Value> {
        self.attributes.get(key)
    }

    /// Attribute converted back into `T`; `None` if absent or of another shape.
    pub fn attr_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.attributes
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub fn set_attr<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) -> Result<(), WebError> {
        let value = serde_json::to_value(value).map_err(|source| WebError::Attribute {
            key: key.to_string(),
            source,
        })?;
        self.attributes.insert(key.to_string(), value);
        Ok(())
    }

    pub fn attributes(&self) -> &HashMap<String, serde_json::Value> {
        &self.attributes
    }

    /// Field-level validation errors collected by the controller.
    pub fn errors(&self) -> &HashMap<String, String> {
        &self.errors
    }

    pub fn add_error(&mut self, field: &str, message: &str) {
        self.errors.insert(field.to_string(), message.to_string());
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn module_name(&self) -> Option<&str> {
        self.module_name.as_deref()
    }

    pub fn set_module_name(&mut self, name: &str) {
        self.module_name = Some(name.to_string());
    }

    pub fn controller_name(&self) -> &str {
        &self.controller_name
    }

    pub fn set_controller_name(&mut self, name: &str) {
        self.controller_name = name.to_string();
    }

    pub fn method_name(&self) -> &str {
        &self.method_name
    }

    pub fn set_method_name(&mut self, name: &str) {
        self.method_name = name.to_string();
    }

    pub fn view_base(&self) -> &str {
        &self.view_base
    }

    /// `module/controller/method`, without the module segment when unset.
    pub fn request_resource(&self) -> String {
        match &self.module_name {
            Some(module) => format!("{}/{}/{}", module, self.controller_name, self.method_name),
            None => format!("{}/{}", self.controller_name, self.method_name),
        }
    }

    /// Selects `template` under this request's view directory.
    pub fn render(&mut self, template: &str) {
        let view = match &self.module_name {
            Some(module) => format!("{}{}/{}/{}", self.view_base, module, self.controller_name, template),
            None => format!("{}{}/{}", self.view_base, self.controller_name, template),
        };
        self.view = Some(view);
    }

    /// The view selected for rendering, if any.
    pub fn view(&self) -> Option<&str> {
        self.view.as_deref()
    }

    /// XML wins over JSON when both are listed; anything else is HTML.
    pub fn accept(&self) -> Accept {
        let accept = self
            .headers
            .get(ACCEPT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();

        if accept.contains("application/xml") {
            Accept::Xml
        } else if accept.contains("application/json") {
            Accept::Json
        } else {
            Accept::Html
        }
    }

    pub fn is_accept_json(&self) -> bool {
        self.accept() == Accept::Json
    }

    pub fn is_accept_xml(&self) -> bool {
        self.accept() == Accept::Xml
    }

    pub fn is_ajax(&self) -> bool {
        self.header("x-requested-with") == Some("XMLHttpRequest")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(method: Method, uri: &str) -> Request<()> {
        Request::builder().method(method).uri(uri).body(()).unwrap()
    }

    #[test]
    fn test_defaults() {
        let ctx = WebContext::new(&request(Method::GET, "/"), "");
        assert_eq!(ctx.view_base(), "/view/");
        assert_eq!(ctx.controller_name(), "root");
        assert_eq!(ctx.method_name(), "index");
        assert_eq!(ctx.request_resource(), "root/index");
        assert!(ctx.is_get());
        assert!(!ctx.is_post());
        assert_eq!(ctx.accept(), Accept::Html);
        assert!(!ctx.is_ajax());
    }

    #[test]
    fn test_view_base_gets_trailing_slash() {
        let ctx = WebContext::new(&request(Method::GET, "/"), "/templates");
        assert_eq!(ctx.view_base(), "/templates/");
    }

    #[test]
    fn test_query_and_form_params() {
        let mut ctx = WebContext::new(&request(Method::POST, "/user/save?id=7&tag=a&tag=b"), "");
        ctx.add_form_params(b"name=Ann+Lee&city=Oslo%20West");

        assert_eq!(ctx.param("id"), Some("7"));
        assert_eq!(ctx.params("tag"), ["a".to_string(), "b".to_string()]);
        assert_eq!(ctx.param("name"), Some("Ann Lee"));
        assert_eq!(ctx.param("city"), Some("Oslo West"));
        assert_eq!(ctx.param("missing"), None);
        assert!(ctx.params("missing").is_empty());
    }

    #[test]
    fn test_accept_and_ajax() {
        let req = Request::builder()
            .uri("/")
            .header("Accept", "application/json, application/xml")
            .header("X-Requested-With", "XMLHttpRequest")
            .body(())
            .unwrap();
        let ctx = WebContext::new(&req, "");

        assert_eq!(ctx.accept(), Accept::Xml);
        assert!(ctx.is_accept_xml());
        assert!(ctx.is_ajax());
        assert_eq!(ctx.header("accept"), Some("application/json, application/xml"));
    }

    #[test]
    fn test_resource_and_render() {
        let mut ctx = WebContext::new(&request(Method::GET, "/"), "/view");
        ctx.set_module_name("admin");
        ctx.set_controller_name("user");
        ctx.set_method_name("list");
        ctx.render("list.html");

        assert_eq!(ctx.request_resource(), "admin/user/list");
        assert_eq!(ctx.view(), Some("/view/admin/user/list.html"));
    }

    #[test]
    fn test_attributes_and_errors() {
        let mut ctx = WebContext::new(&request(Method::GET, "/"), "");
        ctx.set_attr("count", &3).unwrap();
        ctx.set_attr("names", &["a", "b"]).unwrap();
        ctx.add_error("email", "required");

        assert_eq!(ctx.attr("count"), Some(&serde_json::json!(3)));
        assert_eq!(ctx.attr_as::<Vec<String>>("names"), Some(vec!["a".into(), "b".into()]));
        assert_eq!(ctx.attr_as::<i32>("names"), None);
        assert!(ctx.has_errors());
        assert_eq!(ctx.errors()["email"], "required");
    }

    #[test]
    fn test_set_header() {
        let mut ctx = WebContext::new(&request(Method::GET, "/"), "");
        ctx.set_header("Cache-Control", "no-cache").unwrap();
        assert_eq!(ctx.response_headers()["cache-control"], "no-cache");
        assert!(matches!(
            ctx.set_header("bad header", "x"),
            Err(WebError::InvalidHeader { .. })
        ));
    }
}
