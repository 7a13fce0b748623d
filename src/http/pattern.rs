//! Route pattern checks run at registration time, so a bad pattern is an
//! error instead of a panic while the router is assembled.

/// Rejected route.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouteError {
    #[error("invalid route pattern `{pattern}`: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("route `{pattern}` collides with reserved path `{reserved}`")]
    Reserved { pattern: String, reserved: String },

    #[error("router rejected routes: {0}")]
    Rejected(String),
}

impl RouteError {
    fn invalid(pattern: &str, reason: impl Into<String>) -> Self {
        Self::InvalidPattern {
            pattern: pattern.to_string(),
            reason: reason.into(),
        }
    }
}

/// Check `pattern` against Axum's path syntax (`/users/{id}`, `/files/{*rest}`).
pub fn validate_pattern(pattern: &str) -> Result<(), RouteError> {
    if !pattern.starts_with('/') {
        return Err(RouteError::invalid(pattern, "must start with `/`"));
    }

    let segments: Vec<&str> = pattern[1..].split('/').collect();
    let last = segments.len() - 1;
    for (i, segment) in segments.iter().enumerate() {
        if segment.starts_with(':') || segment.starts_with('*') {
            return Err(RouteError::invalid(pattern, "use `{name}` captures, not `:name` or `*name`"));
        }
        if let Some(open) = segment.find('{') {
            let Some(name) = segment[open + 1..].strip_suffix('}') else {
                return Err(RouteError::invalid(pattern, format!("unclosed capture in `{segment}`")));
            };
            let wildcard = name.starts_with('*');
            let name = name.trim_start_matches('*');
            if name.is_empty() || name.contains(['{', '}']) {
                return Err(RouteError::invalid(pattern, format!("bad capture name in `{segment}`")));
            }
            if wildcard && i != last {
                return Err(RouteError::invalid(pattern, "wildcard capture must be the last segment"));
            }
        } else if segment.contains('}') {
            return Err(RouteError::invalid(pattern, format!("unmatched `}}` in `{segment}`")));
        }
    }
    Ok(())
}

/// True when `pattern` equals `prefix` or sits below it.
pub(crate) fn is_under(pattern: &str, prefix: &str) -> bool {
    let prefix = prefix.trim_end_matches('/');
    pattern == prefix || pattern.strip_prefix(prefix).is_some_and(|rest| rest.starts_with('/'))
}
