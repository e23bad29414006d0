//! `WWW-Authenticate` challenge parsing.
//!
//! Registries answer unauthenticated requests with e.g.
//! `Bearer realm="https://auth.docker.io/token",service="registry.docker.io",scope="repository:library/python:pull"`.

use std::collections::HashMap;

/// Authentication scheme requested by the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthScheme {
    Bearer,
    Basic,
}

/// A parsed authentication challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthChallenge {
    pub scheme: AuthScheme,
    pub realm: Option<String>,
    pub service: Option<String>,
    pub scope: Option<String>,
}

impl AuthChallenge {
    /// Parse a header value. Returns a description of the problem on failure.
    pub fn parse(header: &str) -> Result<Self, String> {
        let header = header.trim();
        let (scheme, rest) = match header.find(char::is_whitespace) {
            Some(pos) => (&header[..pos], header[pos..].trim_start()),
            None => (header, ""),
        };

        let scheme = if scheme.eq_ignore_ascii_case("bearer") {
            AuthScheme::Bearer
        } else if scheme.eq_ignore_ascii_case("basic") {
            AuthScheme::Basic
        } else {
            return Err(format!("unsupported authentication scheme '{}'", scheme));
        };

        let mut params = parse_params(rest)?;
        let challenge = AuthChallenge {
            scheme,
            realm: params.remove("realm"),
            service: params.remove("service"),
            scope: params.remove("scope"),
        };

        if challenge.scheme == AuthScheme::Bearer && challenge.realm.is_none() {
            return Err("bearer challenge without realm".to_string());
        }
        Ok(challenge)
    }
}

/// Parse `key="value", key=value` pairs. Quoted values may contain commas.
fn parse_params(input: &str) -> Result<HashMap<String, String>, String> {
    let mut params = HashMap::new();
    let mut chars = input.chars().peekable();

    loop {
        while matches!(chars.peek(), Some(c) if c.is_whitespace() || *c == ',') {
            chars.next();
        }
        if chars.peek().is_none() {
            break;
        }

        let mut key = String::new();
        while let Some(&c) = chars.peek() {
            if c == '=' {
                break;
            }
            key.push(c);
            chars.next();
        }
        if chars.next() != Some('=') {
            return Err(format!("malformed challenge parameter '{}'", key.trim()));
        }
        let key = key.trim().to_ascii_lowercase();
        if key.is_empty() {
            return Err("challenge parameter without a name".to_string());
        }

        let mut value = String::new();
        if chars.peek() == Some(&'"') {
            chars.next();
            let mut closed = false;
            while let Some(c) = chars.next() {
                match c {
                    '\\' => {
                        if let Some(escaped) = chars.next() {
                            value.push(escaped);
                        }
                    }
                    '"' => {
                        closed = true;
                        break;
                    }
                    _ => value.push(c),
                }
            }
            if !closed {
                return Err(format!("unterminated quoted value for '{}'", key));
            }
        } else {
            while let Some(&c) = chars.peek() {
                if c == ',' {
                    break;
                }
                value.push(c);
                chars.next();
            }
            value = value.trim().to_string();
        }

        params.insert(key, value);
    }

    Ok(params)
}
