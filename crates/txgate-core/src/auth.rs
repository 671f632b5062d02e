//! HTTP Basic-authentication header construction.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// Build the value of an `Authorization` header for HTTP Basic auth:
/// `"Basic " + base64(user ":" pass)`.
pub fn basic_auth_header(user: &str, pass: &str) -> String {
    let credentials = format!("{user}:{pass}");
    format!("Basic {}", STANDARD.encode(credentials.as_bytes()))
}
