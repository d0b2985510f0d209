use axum::http::HeaderMap;
use serde::Deserialize;
use std::collections::HashMap;


/// API user from the `[[api_users]]` configuration section
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ApiUser {
    pub name: String,
    pub token: String,
    /// Glob patterns such as `events/*` or `actions/process-check-result`
    #[serde(default)]
    pub permissions: Vec<String>,
}

impl ApiUser {
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions
            .iter()
            .any(|pattern| permission_matches(pattern, permission))
    }
}

/// Authenticated caller.
///
/// `user` is `None` when authentication is disabled, in which case every
/// permission is granted.
#[derive(Debug, Clone, PartialEq)]
pub struct Principal {
    pub user: Option<ApiUser>,
}

impl Principal {
    pub fn anonymous() -> Self {
        Self { user: None }
    }

    pub fn name(&self) -> &str {
        self.user.as_ref().map(|u| u.name.as_str()).unwrap_or("anonymous")
    }

    pub fn can(&self, permission: &str) -> bool {
        match &self.user {
            Some(user) => user.has_permission(permission),
            None => true,
        }
    }
}

/// Token-keyed user table
#[derive(Debug, Clone, Default)]
pub struct Authenticator {
    users: HashMap<String, ApiUser>,
}

impl Authenticator {
    pub fn new(users: Vec<ApiUser>) -> Self {
        Self {
            users: users
                .into_iter()
                .map(|user| (user.token.clone(), user))
                .collect(),
        }
    }

    /// Authentication is enforced only when at least one user is configured.
    pub fn is_enabled(&self) -> bool {
        !self.users.is_empty()
    }

    pub fn authenticate(&self, headers: &HeaderMap) -> Result<Principal, TokenError> {
        if !self.is_enabled() {
            return Ok(Principal::anonymous());
        }

        let token = extract_bearer_token(headers)?;
        self.users
            .get(&token)
            .cloned()
            .map(|user| Principal { user: Some(user) })
            .ok_or(TokenError::Unknown)
    }
}

/// Match `permission` against a pattern where `*` spans any run of characters.
pub fn permission_matches(pattern: &str, permission: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = permission.chars().collect();

    let (mut p, mut t) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        if p < pattern.len() && pattern[p] == '*' {
            backtrack = Some((p, t));
            p += 1;
        } else if p < pattern.len() && pattern[p].eq_ignore_ascii_case(&text[t]) {
            p += 1;
            t += 1;
        } else if let Some((star, matched)) = backtrack {
            p = star + 1;
            t = matched + 1;
            backtrack = Some((star, matched + 1));
        } else {
            return false;
        }
    }

    pattern[p..].iter().all(|c| *c == '*')
}

/// Extract bearer token from HTTP Authorization header
///
/// Expected format: "Authorization: Bearer <token>"
/// Returns the token string if present and valid.
pub fn extract_bearer_token(headers: &HeaderMap) -> Result<String, TokenError> {
    let auth_header = headers
        .get("authorization")
        .ok_or(TokenError::Missing)?
        .to_str()
        .map_err(|_| TokenError::InvalidFormat)?;

    parse_bearer_token(auth_header)
}

fn parse_bearer_token(header_value: &str) -> Result<String, TokenError> {
    let parts: Vec<&str> = header_value.splitn(2, ' ').collect();

    if parts.len() != 2 {
        return Err(TokenError::InvalidFormat);
    }

    if parts[0].to_lowercase() != "bearer" {
        return Err(TokenError::InvalidFormat);
    }

    let token = parts[1].trim();

    if token.is_empty() {
        return Err(TokenError::Empty);
    }

    Ok(token.to_string())
}

/// Token extraction errors
#[derive(Debug, PartialEq, Clone)]
pub enum TokenError {
    /// Authorization header not present
    Missing,
    /// Not "Bearer <token>"
    InvalidFormat,
    /// Token is empty string
    Empty,
    /// No configured user holds this token
    Unknown,
}

impl std::fmt::Display for TokenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenError::Missing => write!(f, "Authorization token not provided"),
            TokenError::InvalidFormat => write!(f, "Invalid authorization token format"),
            TokenError::Empty => write!(f, "Authorization token is empty"),
            TokenError::Unknown => write!(f, "Authorization token not recognized"),
        }
    }
}

impl std::error::Error for TokenError {}
