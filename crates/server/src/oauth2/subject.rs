//! Who is the resource owner behind an authorization request.

use axum::http::HeaderMap;

use crate::oauth2::state::random_hex;

/// The resource owner a code or token is issued for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subject {
    pub id: String,
    pub display_name: String,
}

/// Resolves the authenticated subject of an authorization request.
pub trait SubjectResolver: Send + Sync {
    /// `None` means nobody is signed in and no code may be issued.
    fn current_subject(&self, headers: &HeaderMap) -> Option<Subject>;
}

/// Approves every request on behalf of a freshly minted demo user.
///
/// There is no login or consent step behind this. Production deployments must
/// plug in a resolver backed by a real session.
#[derive(Debug, Default, Clone, Copy)]
pub struct DemoSubjectResolver;

impl SubjectResolver for DemoSubjectResolver {
    fn current_subject(&self, _headers: &HeaderMap) -> Option<Subject> {
        Some(Subject {
            id: format!("user_{}", random_hex(8)),
            display_name: "Demo User".to_string(),
        })
    }
}

/// Subject for the password grant, derived from the username.
pub fn password_subject(username: &str) -> Subject {
    Subject {
        id: format!("user_{username}"),
        display_name: username.to_string(),
    }
}
