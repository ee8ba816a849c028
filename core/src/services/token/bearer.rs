//! Authorization header helper for the HTTP layer

const BEARER_SCHEME: &str = "bearer";

/// Extracts the credential from an `Authorization: Bearer <token>` value
///
/// The scheme is matched case-insensitively. Returns `None` for any other
/// scheme or an empty credential.
pub fn extract_bearer(header_value: &str) -> Option<&str> {
    let (scheme, credential) = header_value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case(BEARER_SCHEME) {
        return None;
    }
    let credential = credential.trim();
    (!credential.is_empty()).then_some(credential)
}
