/* 📖 # Why a single ApiService for every endpoint?

All endpoints share the store, the session table and the response
conventions, so one service routes them internally by path:

- `GET /api/` every question with its option texts
- `GET /api/questions/` questions keyed by id
- `GET /api/options/` options keyed by id, with vote counts
- `GET /api/my-choices/` option ids chosen by the caller
- `POST /api/vote/` choose and unchoose options
- `POST /api/login/`, `POST /api/logout/`, `POST /api/register/`

Client mistakes (bad bodies, failed authentication, wrong method) are answered
with a 4xx status and a short machine-readable text. Only failures inside the
engine are returned as Err, which the PAL turns into a 500.
*/

/* 📖 # How does a protected endpoint find its user?

A `sessionid` cookie naming a live session wins. An inactive account behind
that session is refused with 403. Without a session the Authorization header
is checked as HTTP Basic credentials: missing or wrong credentials give 401
with the auth status code, correct credentials of an inactive account give
403 `inactive`.
*/

use std::sync::Arc;

use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use tracing::{debug, info};

use votebox_base::{
    HttpBody, HttpMethod, HttpRequest, HttpResponse, HttpService, HttpStatusCode, VoteboxResult,
};

use crate::auth::{
    AuthStatus, Registration, SessionTable, authenticate, basic_auth, clear_session_cookie,
    register_account, session_cookie, session_token,
};
use crate::model::UserId;
use crate::query::{all_questions, my_choices, option_views, question_summaries};
use crate::request::{Credentials, RequestBody};
use crate::store::StoreHandle;
use crate::vote::VoteRequest;

/// Settings of the API that come from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiOptions {
    /// Whether `/api/register/` creates accounts.
    pub allow_registration: bool,
    /// Indent JSON responses by this many spaces. Compact when `None`.
    pub json_indent: Option<usize>,
}

impl Default for ApiOptions {
    fn default() -> Self {
        Self {
            allow_registration: true,
            json_indent: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Endpoint {
    Index,
    Questions,
    Options,
    MyChoices,
    Vote,
    Login,
    Logout,
    Register,
}

impl Endpoint {
    fn from_path(path: &str) -> Option<Self> {
        let endpoint = match path.strip_prefix("/api")? {
            "/" => Endpoint::Index,
            "/questions/" => Endpoint::Questions,
            "/options/" => Endpoint::Options,
            "/my-choices/" => Endpoint::MyChoices,
            "/vote/" => Endpoint::Vote,
            "/login/" => Endpoint::Login,
            "/logout/" => Endpoint::Logout,
            "/register/" => Endpoint::Register,
            _ => return None,
        };
        Some(endpoint)
    }

    /// Whether the endpoint is read-only and served for GET and HEAD.
    fn is_safe(self) -> bool {
        matches!(
            self,
            Endpoint::Index | Endpoint::Questions | Endpoint::Options | Endpoint::MyChoices
        )
    }

    fn allows(self, method: HttpMethod) -> bool {
        if self.is_safe() {
            matches!(method, HttpMethod::Get | HttpMethod::Head)
        } else {
            method == HttpMethod::Post
        }
    }
}

/// A plain text response. The body always ends with a newline.
fn text_response(status: HttpStatusCode, message: &str) -> HttpResponse {
    let mut body = message.to_string();
    if !body.ends_with('\n') {
        body.push('\n');
    }
    HttpResponse::text(body).with_status(status)
}

/// HTTP service for the poll API.
///
/// ```
/// use votebox_base::{HttpMethod, HttpRequest, HttpService};
/// use votebox_engine::{ApiOptions, ApiService, InMemoryStore, StoreHandle};
///
/// let service = ApiService::new(StoreHandle::new(InMemoryStore::new()), ApiOptions::default());
/// let response = service
///     .handle_request(HttpRequest::new(HttpMethod::Get, "/api/"))
///     .unwrap();
/// assert_eq!(response.body().as_string(), Some("[]\n".to_string()));
/// ```
#[derive(Clone)]
pub struct ApiService {
    store: StoreHandle,
    sessions: Arc<SessionTable>,
    options: ApiOptions,
}

impl ApiService {
    pub fn new(store: StoreHandle, options: ApiOptions) -> Self {
        Self {
            store,
            sessions: Arc::new(SessionTable::new()),
            options,
        }
    }

    pub fn sessions(&self) -> &SessionTable {
        &self.sessions
    }

    /// Serialize data to JSON and wrap it in an HTTP 200 response.
    fn serialize_json_response<T: Serialize>(&self, data: &T) -> VoteboxResult<HttpResponse> {
        let mut out = Vec::new();
        let result = match self.options.json_indent {
            Some(width) => {
                let indent = " ".repeat(width);
                let formatter = PrettyFormatter::with_indent(indent.as_bytes());
                let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
                data.serialize(&mut serializer)
            }
            None => serde_json::to_writer(&mut out, data),
        };
        result.map_err(|e| votebox_base::err!("JSON serialization error: {}", e))?;
        let mut json = String::from_utf8(out)
            .map_err(|e| votebox_base::err!("JSON serialization error: {}", e))?;
        json.push('\n');
        Ok(HttpResponse::json(json))
    }

    fn parse_body(request: &HttpRequest) -> Result<RequestBody, HttpResponse> {
        RequestBody::parse(
            request.headers().get("content-type"),
            request.body().as_bytes(),
        )
        .map_err(|e| text_response(HttpStatusCode::BadRequest, &e.to_string()))
    }

    fn parse_credentials(request: &HttpRequest) -> Result<Credentials, HttpResponse> {
        let body = Self::parse_body(request)?;
        Credentials::from_body(&body)
            .map_err(|e| text_response(HttpStatusCode::BadRequest, &e.to_string()))
    }

    /// Find the user of a protected request, or the response refusing it.
    fn authorize(&self, request: &HttpRequest) -> VoteboxResult<Result<UserId, HttpResponse>> {
        if let Some(user) = session_token(request.headers()).and_then(|t| self.sessions.get(t)) {
            if let Some(account) = self.store.read(|store| store.account(user))? {
                if account.is_active {
                    return Ok(Ok(account.id));
                }
                return Ok(Err(text_response(
                    HttpStatusCode::Forbidden,
                    AuthStatus::Inactive.code(),
                )));
            }
        }
        let header = request.headers().get("authorization");
        Ok(match self.store.read(|store| basic_auth(store, header))? {
            Ok(account) => Ok(account.id),
            Err(AuthStatus::Inactive) => Err(text_response(
                HttpStatusCode::Forbidden,
                AuthStatus::Inactive.code(),
            )),
            Err(status) => Err(text_response(HttpStatusCode::Unauthorized, status.code())),
        })
    }

    /// End the session named by the request's cookie. Returns whether one
    /// existed.
    fn end_session(&self, request: &HttpRequest) -> bool {
        session_token(request.headers())
            .and_then(|token| self.sessions.remove(token))
            .is_some()
    }

    fn handle_index(&self) -> VoteboxResult<HttpResponse> {
        let questions = self.store.read(all_questions)?;
        self.serialize_json_response(&questions)
    }

    fn handle_questions(&self) -> VoteboxResult<HttpResponse> {
        let questions = self.store.read(question_summaries)?;
        self.serialize_json_response(&questions)
    }

    fn handle_options(&self) -> VoteboxResult<HttpResponse> {
        let options = self.store.read(option_views)?;
        self.serialize_json_response(&options)
    }

    fn handle_my_choices(&self, request: &HttpRequest) -> VoteboxResult<HttpResponse> {
        let user = match self.authorize(request)? {
            Ok(user) => user,
            Err(response) => return Ok(response),
        };
        let choices = self.store.read(|store| my_choices(store, user))?;
        self.serialize_json_response(&choices)
    }

    fn handle_vote(&self, request: &HttpRequest) -> VoteboxResult<HttpResponse> {
        let user = match self.authorize(request)? {
            Ok(user) => user,
            Err(response) => return Ok(response),
        };
        let body = match Self::parse_body(request) {
            Ok(body) => body,
            Err(response) => return Ok(response),
        };
        let vote = match VoteRequest::parse(&body) {
            Ok(vote) => vote,
            Err(error) => return Ok(text_response(HttpStatusCode::BadRequest, error.code())),
        };
        match self.store.vote(user, &vote)? {
            Ok(_) => Ok(text_response(HttpStatusCode::Ok, "")),
            Err(error) => Ok(text_response(HttpStatusCode::BadRequest, error.code())),
        }
    }

    fn handle_login(&self, request: &HttpRequest) -> VoteboxResult<HttpResponse> {
        let credentials = match Self::parse_credentials(request) {
            Ok(credentials) => credentials,
            Err(response) => return Ok(response),
        };
        let had_session = self.end_session(request);
        let account = self
            .store
            .read(|store| authenticate(store, &credentials.username, &credentials.password))?;
        let Some(account) = account else {
            debug!(username = %credentials.username, "wrong login");
            let response = text_response(HttpStatusCode::Ok, AuthStatus::WrongLogin.code());
            return Ok(if had_session {
                response.with_header("Set-Cookie", clear_session_cookie())
            } else {
                response
            });
        };
        let token = self.sessions.create(account.id);
        info!(user = %account.id, active = account.is_active, "logged in");
        let status = if account.is_active {
            AuthStatus::Success
        } else {
            AuthStatus::Inactive
        };
        Ok(text_response(HttpStatusCode::Ok, status.code())
            .with_header("Set-Cookie", session_cookie(&token)))
    }

    fn handle_logout(&self, request: &HttpRequest) -> VoteboxResult<HttpResponse> {
        if self.end_session(request) {
            debug!("session ended");
        }
        Ok(text_response(HttpStatusCode::Ok, "logged_out")
            .with_header("Set-Cookie", clear_session_cookie()))
    }

    fn handle_register(&self, request: &HttpRequest) -> VoteboxResult<HttpResponse> {
        if !self.options.allow_registration {
            return Ok(text_response(HttpStatusCode::Forbidden, "reg_closed"));
        }
        let credentials = match Self::parse_credentials(request) {
            Ok(credentials) => credentials,
            Err(response) => return Ok(response),
        };
        let registration = self.store.transaction(|store| {
            register_account(store, &credentials.username, &credentials.password)
        })?;
        Ok(match registration {
            Registration::Created(_) => text_response(HttpStatusCode::Ok, "success"),
            Registration::UsernameTaken => text_response(HttpStatusCode::Ok, "username_taken"),
        })
    }

    fn route(&self, request: &HttpRequest) -> VoteboxResult<HttpResponse> {
        let Some(endpoint) = Endpoint::from_path(request.path()) else {
            return Ok(text_response(HttpStatusCode::NotFound, "not_found"));
        };
        if !endpoint.allows(request.method()) {
            let allow = if endpoint.is_safe() { "GET, HEAD" } else { "POST" };
            return Ok(
                text_response(HttpStatusCode::MethodNotAllowed, "method_not_allowed")
                    .with_header("Allow", allow),
            );
        }
        match endpoint {
            Endpoint::Index => self.handle_index(),
            Endpoint::Questions => self.handle_questions(),
            Endpoint::Options => self.handle_options(),
            Endpoint::MyChoices => self.handle_my_choices(request),
            Endpoint::Vote => self.handle_vote(request),
            Endpoint::Login => self.handle_login(request),
            Endpoint::Logout => self.handle_logout(request),
            Endpoint::Register => self.handle_register(request),
        }
    }
}

impl std::fmt::Debug for ApiService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiService")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl HttpService for ApiService {
    fn handle_request(&self, request: HttpRequest) -> VoteboxResult<HttpResponse> {
        let response = self.route(&request)?;
        info!(
            method = %request.method(),
            path = request.path(),
            status = response.status().as_u16(),
            "handled request"
        );
        if request.method() == HttpMethod::Head {
            return Ok(response.with_body(HttpBody::empty()));
        }
        Ok(response)
    }
}
