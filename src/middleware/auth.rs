use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use http::header::{HeaderValue, AUTHORIZATION, WWW_AUTHENTICATE};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::context::Context;
use crate::handler::HandlerFunc;

/// Context key holding the authenticated user name.
pub const AUTH_USER_KEY: &str = "user";

/// User name to password.
pub type Accounts = HashMap<String, String>;

const DEFAULT_REALM: &str = "Authorization Required";

struct Credential {
    header: Vec<u8>,
    user: Arc<str>,
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0_u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

fn quote(realm: &str) -> String {
    let mut out = String::with_capacity(realm.len() + 2);
    out.push('"');
    for ch in realm.chars() {
        if ch == '"' || ch == '\\' {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push('"');
    out
}

/// HTTP Basic authentication against `accounts`, realm
/// `"Authorization Required"`.
///
/// On success the user name is stored under [`AUTH_USER_KEY`] as a
/// `String`; otherwise the chain is aborted with 401 and a
/// `WWW-Authenticate` challenge.
///
/// # Panics
///
/// Panics if an account has an empty user name.
pub fn basic_auth(accounts: Accounts) -> HandlerFunc {
    basic_auth_for_realm(accounts, "")
}

/// [`basic_auth`] with a custom realm; an empty realm uses the default.
///
/// # Panics
///
/// Panics if an account has an empty user name.
pub fn basic_auth_for_realm(accounts: Accounts, realm: &str) -> HandlerFunc {
    let realm = if realm.is_empty() { DEFAULT_REALM } else { realm };
    let challenge = HeaderValue::from_str(&format!("Basic realm={}", quote(realm)))
        .unwrap_or_else(|_| HeaderValue::from_static("Basic realm=\"Authorization Required\""));

    let credentials: Vec<Credential> = accounts
        .into_iter()
        .map(|(user, password)| {
            assert!(!user.is_empty(), "basic auth user name can not be empty");
            let encoded = STANDARD.encode(format!("{user}:{password}"));
            Credential {
                header: format!("Basic {encoded}").into_bytes(),
                user: Arc::from(user),
            }
        })
        .collect();

    HandlerFunc::new(move |c: &mut Context| {
        let presented = c
            .request()
            .headers()
            .get(AUTHORIZATION)
            .map(HeaderValue::as_bytes)
            .unwrap_or_default();
        // check every credential so timing does not reveal which one matched
        let mut found: Option<&Credential> = None;
        for credential in &credentials {
            if constant_time_eq(&credential.header, presented) {
                found = Some(credential);
            }
        }
        match found {
            Some(credential) => {
                c.set(AUTH_USER_KEY, credential.user.to_string());
            }
            None => {
                debug!(path = %c.path(), "Basic auth rejected");
                c.writer_mut().set_header(WWW_AUTHENTICATE, challenge.clone());
                c.abort(401);
            }
        }
    })
}
