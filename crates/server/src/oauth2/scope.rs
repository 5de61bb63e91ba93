//! Recognized scopes and scope-string arithmetic.

/// Read Open Badges credentials.
pub const CREDENTIAL_READONLY: &str =
    "https://purl.imsglobal.org/spec/ob/v3p0/scope/credential.readonly";
/// Create or update Open Badges credentials.
pub const CREDENTIAL_UPSERT: &str =
    "https://purl.imsglobal.org/spec/ob/v3p0/scope/credential.upsert";
/// Read the profile.
pub const PROFILE_READONLY: &str =
    "https://purl.imsglobal.org/spec/ob/v3p0/scope/profile.readonly";
/// Update the profile.
pub const PROFILE_UPDATE: &str = "https://purl.imsglobal.org/spec/ob/v3p0/scope/profile.update";
/// Signals that the client wants a refresh token.
pub const OFFLINE_ACCESS: &str = "offline_access";

/// The fixed set of scopes this server understands.
pub const RECOGNIZED_SCOPES: [&str; 5] = [
    CREDENTIAL_READONLY,
    CREDENTIAL_UPSERT,
    PROFILE_READONLY,
    PROFILE_UPDATE,
    OFFLINE_ACCESS,
];

pub fn is_recognized(scope: &str) -> bool {
    RECOGNIZED_SCOPES.contains(&scope)
}

/// Split a space-delimited scope string, keeping only recognized values.
///
/// Order of first appearance is kept; duplicates are dropped.
pub fn filter_recognized(requested: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for scope in requested.split_whitespace() {
        if is_recognized(scope) && !out.iter().any(|s| s == scope) {
            out.push(scope.to_string());
        }
    }
    out
}

/// The full recognized set as a scope string.
pub fn all_recognized() -> String {
    RECOGNIZED_SCOPES.join(" ")
}

pub fn join(scopes: &[String]) -> String {
    scopes.join(" ")
}

/// Scope for a refresh grant.
///
/// Returns the part of `original` that was also requested, if that is non-empty.
/// Otherwise the original scope string is returned unchanged: a refresh can narrow
/// the grant but never widen or clear it.
pub fn narrow(original: &str, requested: Option<&str>) -> String {
    let Some(requested) = requested.filter(|r| !r.trim().is_empty()) else {
        return original.to_string();
    };
    let wanted = filter_recognized(requested);
    let kept: Vec<&str> = original
        .split_whitespace()
        .filter(|s| wanted.iter().any(|w| w == s))
        .collect();
    if kept.is_empty() {
        original.to_string()
    } else {
        kept.join(" ")
    }
}
