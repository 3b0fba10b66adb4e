//! Connection-string redaction for artifacts and logs.

use reqwest::Url;
use serde::Serialize;

const SENSITIVE_KEYS: &[&str] = &["password", "pass", "token", "api_key", "apikey"];
const MASK: &str = "***";

/// Connection metadata with secrets removed.
#[derive(Debug, Clone, Serialize)]
pub struct RedactedConnection {
    pub engine: Option<String>,
    pub user: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub database: Option<String>,
    pub redacted: String,
}

/// Masks the password and sensitive query parameters of `conn`.
///
/// A string that does not parse as a URL is masked entirely, since there is
/// no way to tell which part of it is secret.
pub fn redact_connection_string(conn: &str) -> RedactedConnection {
    let Ok(mut url) = Url::parse(conn) else {
        return RedactedConnection {
            engine: None,
            user: None,
            host: None,
            port: None,
            database: None,
            redacted: MASK.to_string(),
        };
    };

    let user = Some(url.username().to_string()).filter(|name| !name.is_empty());
    let database = url
        .path_segments()
        .and_then(|mut segments| segments.next())
        .filter(|name| !name.is_empty())
        .map(str::to_string);

    if url.password().is_some() && url.set_password(Some(MASK)).is_err() {
        return RedactedConnection {
            engine: Some(url.scheme().to_string()),
            user,
            host: None,
            port: None,
            database,
            redacted: MASK.to_string(),
        };
    }

    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(key, value)| {
            let value = if is_sensitive_key(&key) {
                MASK.to_string()
            } else {
                value.into_owned()
            };
            (key.into_owned(), value)
        })
        .collect();
    if !pairs.is_empty() {
        url.query_pairs_mut().clear().extend_pairs(pairs);
    }

    RedactedConnection {
        engine: Some(url.scheme().to_string()),
        user,
        host: url.host_str().map(str::to_string),
        port: url.port(),
        database,
        redacted: url.to_string(),
    }
}

fn is_sensitive_key(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    SENSITIVE_KEYS.contains(&key.as_str())
}
