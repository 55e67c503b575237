/* 📖 # Why resolve the body into RequestBody once?

Login, register and vote all accept the same encodings: a urlencoded or
multipart form, or JSON. Deciding which one applies is done in
RequestBody::parse from the Content-Type header, and the endpoints then match
on the enum instead of repeating header checks. A content type that is neither
form nor JSON is rejected here, before any endpoint logic runs.

RequestError is separate from VoteboxError. Everything in it is a
client mistake that ends as a 400 response with a short text body.
*/

use percent_encoding::percent_decode_str;
use serde_json::Value;

use crate::vote::VoteError;

/// A client error found while decoding a request body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    /// The Content-Type is neither a form nor JSON.
    ContentType { content_type: String },
    /// The body could not be decoded, or lacks required fields.
    BadData { message: String },
    /// The vote payload failed validation.
    Vote(VoteError),
}

impl RequestError {
    pub fn bad_data(message: impl Into<String>) -> Self {
        RequestError::BadData {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for RequestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestError::ContentType { content_type } => {
                write!(f, "Unknown Content-Type '{}'", content_type)
            }
            RequestError::BadData { message } => f.write_str(message),
            RequestError::Vote(error) => f.write_str(error.code()),
        }
    }
}

impl std::error::Error for RequestError {}

impl From<VoteError> for RequestError {
    fn from(error: VoteError) -> Self {
        RequestError::Vote(error)
    }
}

const URLENCODED: &str = "application/x-www-form-urlencoded";
const MULTIPART: &str = "multipart/form-data;";
const JSON: &str = "application/json";

/// Decoded form fields, in the order they appeared.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormData {
    fields: Vec<(String, String)>,
}

impl FormData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.push((name.into(), value.into()));
    }

    /// Parse an `application/x-www-form-urlencoded` body.
    ///
    /// ```
    /// use votebox_engine::request::FormData;
    ///
    /// let form = FormData::parse_urlencoded("choose=1&choose=2&note=a+b%21");
    /// assert_eq!(form.get_all("choose"), vec!["1", "2"]);
    /// assert_eq!(form.get_last("note"), Some("a b!"));
    /// ```
    pub fn parse_urlencoded(body: &str) -> Self {
        let mut form = Self::new();
        for pair in body.split('&').filter(|pair| !pair.is_empty()) {
            let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
            form.push(decode_component(name), decode_component(value));
        }
        form
    }

    /// Parse the text fields of a `multipart/form-data` body. File parts are
    /// skipped.
    pub fn parse_multipart(boundary: &str, body: &[u8]) -> Self {
        let body = String::from_utf8_lossy(body);
        let delimiter = format!("--{}", boundary);
        let mut form = Self::new();
        for part in body.split(delimiter.as_str()).skip(1) {
            if part.starts_with("--") {
                break;
            }
            let part = part.strip_prefix("\r\n").unwrap_or(part);
            let Some((headers, content)) = part.split_once("\r\n\r\n") else {
                continue;
            };
            let content = content.strip_suffix("\r\n").unwrap_or(content);
            let Some(disposition) = headers.lines().find(|line| {
                line.to_ascii_lowercase()
                    .starts_with("content-disposition:")
            }) else {
                continue;
            };
            if disposition_param(disposition, "filename").is_some() {
                continue;
            }
            if let Some(name) = disposition_param(disposition, "name") {
                form.push(name, content);
            }
        }
        form
    }

    /// All values of a repeated field.
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
            .collect()
    }

    /// The last value of a field.
    pub fn get_last(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .rev()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

fn decode_component(component: &str) -> String {
    let component = component.replace('+', " ");
    percent_decode_str(&component)
        .decode_utf8_lossy()
        .into_owned()
}

fn disposition_param(disposition: &str, param: &str) -> Option<String> {
    disposition.split(';').skip(1).find_map(|item| {
        let (key, value) = item.trim().split_once('=')?;
        if key.trim().eq_ignore_ascii_case(param) {
            Some(value.trim().trim_matches('"').to_string())
        } else {
            None
        }
    })
}

fn content_type_param(content_type: &str, param: &str) -> Option<String> {
    disposition_param(content_type, param).filter(|value| !value.is_empty())
}

/// A request body decoded according to its Content-Type.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    Form(FormData),
    Json(Value),
}

impl RequestBody {
    /// Decode `body` according to `content_type`.
    ///
    /// An empty body is [`RequestBody::Empty`] whatever the content type.
    pub fn parse(content_type: Option<&str>, body: &[u8]) -> Result<Self, RequestError> {
        if body.is_empty() {
            return Ok(RequestBody::Empty);
        }
        let content_type = content_type.unwrap_or("");
        if content_type.starts_with(URLENCODED) {
            let text = String::from_utf8_lossy(body);
            Ok(RequestBody::Form(FormData::parse_urlencoded(&text)))
        } else if content_type.starts_with(MULTIPART) {
            let boundary = content_type_param(content_type, "boundary")
                .ok_or_else(|| RequestError::bad_data("Missing multipart boundary"))?;
            Ok(RequestBody::Form(FormData::parse_multipart(&boundary, body)))
        } else if content_type.starts_with(JSON) {
            let text = std::str::from_utf8(body)
                .map_err(|_| RequestError::bad_data("Could not decode data to text"))?;
            let value = serde_json::from_str(text)
                .map_err(|_| RequestError::bad_data("Invalid JSON"))?;
            Ok(RequestBody::Json(value))
        } else {
            Err(RequestError::ContentType {
                content_type: content_type.to_string(),
            })
        }
    }
}

/// A username and password sent to `/login/` or `/register/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// A field value as it appeared in the body, before type checks.
enum Field<'a> {
    Text(&'a str),
    Json(&'a Value),
}

impl Field<'_> {
    fn is_truthy(&self) -> bool {
        match self {
            Field::Text(text) => !text.is_empty(),
            Field::Json(value) => json_truthy(value),
        }
    }

    fn as_str(&self) -> Option<&str> {
        match self {
            Field::Text(text) => Some(*text),
            Field::Json(value) => value.as_str(),
        }
    }
}

fn json_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

impl Credentials {
    /// Extract credentials from a decoded body.
    ///
    /// Checks run in order: the body is a mapping, both fields are present
    /// and truthy, then each is a string.
    pub fn from_body(body: &RequestBody) -> Result<Self, RequestError> {
        let (username, password) = match body {
            RequestBody::Empty => (None, None),
            RequestBody::Form(form) => (
                form.get_last("username").map(Field::Text),
                form.get_last("password").map(Field::Text),
            ),
            RequestBody::Json(Value::Object(map)) => (
                map.get("username").map(Field::Json),
                map.get("password").map(Field::Json),
            ),
            RequestBody::Json(_) => return Err(RequestError::bad_data("invalid data format")),
        };
        let (Some(username), Some(password)) = (username, password) else {
            return Err(RequestError::bad_data("username or password missing"));
        };
        if !username.is_truthy() || !password.is_truthy() {
            return Err(RequestError::bad_data("username or password missing"));
        }
        let username = username
            .as_str()
            .ok_or_else(|| RequestError::bad_data("invalid username format"))?;
        let password = password
            .as_str()
            .ok_or_else(|| RequestError::bad_data("invalid password format"))?;
        Ok(Credentials {
            username: username.to_string(),
            password: password.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn json_body(text: &str) -> RequestBody {
        RequestBody::parse(Some("application/json"), text.as_bytes()).unwrap()
    }

    #[test]
    fn test_parse_dispatch_on_content_type() {
        assert_eq!(RequestBody::parse(Some("text/plain"), b"").unwrap(), RequestBody::Empty);
        assert_eq!(
            RequestBody::parse(Some("application/json; charset=utf-8"), b"[1]").unwrap(),
            RequestBody::Json(json!([1]))
        );
        assert_eq!(
            RequestBody::parse(Some("application/json;"), b"{}").unwrap(),
            RequestBody::Json(json!({}))
        );
        let RequestBody::Form(form) = RequestBody::parse(
            Some("application/x-www-form-urlencoded; charset=utf-8"),
            b"choose=1",
        )
        .unwrap() else {
            panic!("expected form");
        };
        assert_eq!(form.get_all("choose"), vec!["1"]);
    }

    #[test]
    fn test_parse_unknown_content_type() {
        let err = RequestBody::parse(Some("text/plain"), b"choose=1").unwrap_err();
        assert_eq!(err.to_string(), "Unknown Content-Type 'text/plain'");

        let err = RequestBody::parse(None, b"[1]").unwrap_err();
        assert_eq!(err.to_string(), "Unknown Content-Type ''");

        // without parameters multipart has no boundary and is not a form
        let err = RequestBody::parse(Some("multipart/form-data"), b"x").unwrap_err();
        assert_eq!(
            err,
            RequestError::ContentType {
                content_type: "multipart/form-data".to_string()
            }
        );
    }

    #[test]
    fn test_parse_bad_json() {
        let err = RequestBody::parse(Some("application/json"), b"[1,").unwrap_err();
        assert_eq!(err.to_string(), "Invalid JSON");

        let err = RequestBody::parse(Some("application/json"), &[0xff, 0xfe]).unwrap_err();
        assert_eq!(err.to_string(), "Could not decode data to text");
    }

    #[test]
    fn test_parse_multipart() {
        let body = concat!(
            "--XyZ\r\n",
            "Content-Disposition: form-data; name=\"choose\"\r\n",
            "\r\n",
            "1\r\n",
            "--XyZ\r\n",
            "Content-Disposition: form-data; name=\"choose\"\r\n",
            "\r\n",
            "3\r\n",
            "--XyZ\r\n",
            "Content-Disposition: form-data; name=\"upload\"; filename=\"a.txt\"\r\n",
            "Content-Type: text/plain\r\n",
            "\r\n",
            "ignored\r\n",
            "--XyZ--\r\n",
        );
        let parsed =
            RequestBody::parse(Some("multipart/form-data; boundary=XyZ"), body.as_bytes()).unwrap();
        let RequestBody::Form(form) = parsed else {
            panic!("expected form");
        };
        assert_eq!(form.get_all("choose"), vec!["1", "3"]);
        assert_eq!(form.get_last("upload"), None);
    }

    #[test]
    fn test_parse_multipart_quoted_boundary() {
        let body = "--a b\r\nContent-Disposition: form-data; name=\"username\"\r\n\r\nuser1\r\n--a b--\r\n";
        let parsed = RequestBody::parse(
            Some("multipart/form-data; boundary=\"a b\""),
            body.as_bytes(),
        )
        .unwrap();
        let RequestBody::Form(form) = parsed else {
            panic!("expected form");
        };
        assert_eq!(form.get_last("username"), Some("user1"));
    }

    #[test]
    fn test_parse_multipart_missing_boundary() {
        let err = RequestBody::parse(Some("multipart/form-data; charset=utf-8"), b"x").unwrap_err();
        assert_eq!(err.to_string(), "Missing multipart boundary");
    }

    #[test]
    fn test_urlencoded_decoding() {
        let form = FormData::parse_urlencoded("username=J%C3%BCrgen&password=a+b&&flag");
        assert_eq!(form.get_last("username"), Some("Jürgen"));
        assert_eq!(form.get_last("password"), Some("a b"));
        assert_eq!(form.get_last("flag"), Some(""));
        assert_eq!(form.get_last("missing"), None);
    }

    #[test]
    fn test_credentials_from_form_uses_last_value() {
        let body = RequestBody::Form(FormData::parse_urlencoded(
            "username=first&username=user1&password=secret",
        ));
        assert_eq!(
            Credentials::from_body(&body).unwrap(),
            Credentials {
                username: "user1".to_string(),
                password: "secret".to_string()
            }
        );
    }

    #[test]
    fn test_credentials_errors() {
        let cases = [
            (json_body("[1, 2]"), "invalid data format"),
            (json_body("\"user1\""), "invalid data format"),
            (RequestBody::Empty, "username or password missing"),
            (json_body(r#"{"username": "user1"}"#), "username or password missing"),
            (
                json_body(r#"{"username": "", "password": "secret"}"#),
                "username or password missing",
            ),
            (
                json_body(r#"{"username": "user1", "password": 0}"#),
                "username or password missing",
            ),
            (
                json_body(r#"{"username": "user1", "password": null}"#),
                "username or password missing",
            ),
            (
                json_body(r#"{"username": 5, "password": "secret"}"#),
                "invalid username format",
            ),
            (
                json_body(r#"{"username": ["a"], "password": {"b": 1}}"#),
                "invalid username format",
            ),
            (
                json_body(r#"{"username": "user1", "password": true}"#),
                "invalid password format",
            ),
            (
                RequestBody::Form(FormData::parse_urlencoded("username=user1&password=")),
                "username or password missing",
            ),
        ];
        for (body, expected) in cases {
            let err = Credentials::from_body(&body).unwrap_err();
            assert_eq!(err.to_string(), expected, "body: {:?}", body);
        }
    }
}
