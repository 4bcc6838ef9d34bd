//! SDK error classification.
//!
//! Every service reports failures as a code string plus a message. The
//! pipeline only needs to tell "not found", "already exists" and "access
//! denied" apart from the rest, so the codes below are folded into
//! [`ProviderError`] variants and everything else becomes `Sdk`.

use aws_sdk_iam::error::{DisplayErrorContext, ProvideErrorMetadata};

use lambda_cron_deploy::ProviderError;

const NOT_FOUND_CODES: &[&str] = &["NoSuchEntity", "ResourceNotFoundException"];

const CONFLICT_CODES: &[&str] = &["EntityAlreadyExists", "ResourceConflictException"];

/// Lambda also answers `ResourceConflictException` while a function is
/// pending or mid-update; only this message marks a real duplicate.
const DUPLICATE_MARKER: &str = "already exists";

const ACCESS_DENIED_CODES: &[&str] = &[
    "AccessDenied",
    "AccessDeniedException",
    "UnauthorizedOperation",
    "InvalidClientTokenId",
    "ExpiredToken",
];

/// Map any SDK error onto a [`ProviderError`], naming `resource` in the message.
pub(crate) fn map_sdk_error<E>(err: E, resource: &str) -> ProviderError
where
    E: ProvideErrorMetadata + std::error::Error,
{
    let detail = DisplayErrorContext(&err).to_string();
    classify(err.code(), resource, detail)
}

pub(crate) fn classify(code: Option<&str>, resource: &str, detail: String) -> ProviderError {
    let message = format!("{resource}: {detail}");
    match code {
        Some(c) if NOT_FOUND_CODES.contains(&c) => ProviderError::NotFound(message),
        Some("ResourceConflictException") if !detail.contains(DUPLICATE_MARKER) => {
            ProviderError::Sdk(message)
        }
        Some(c) if CONFLICT_CODES.contains(&c) => ProviderError::Conflict(message),
        Some(c) if ACCESS_DENIED_CODES.contains(&c) => ProviderError::AccessDenied(message),
        _ => ProviderError::Sdk(message),
    }
}
