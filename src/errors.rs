//! Error types for dynamap.
//!
//! This module defines the crate error taxonomy and maps AWS SDK errors
//! into it. Uses a single mapping function to avoid code duplication.
//!
//! Nothing here is retried, translated, or logged: every failure is
//! surfaced synchronously to the immediate caller.

use aws_sdk_dynamodb::error::SdkError;
use thiserror::Error;

/// All errors raised by this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// An entity schema declares zero or more than one key field.
    /// Detected at mapper construction, never at call time.
    #[error("entity `{entity}` declares {count} key fields; exactly one is required")]
    Configuration { entity: &'static str, count: usize },

    /// A host value shape that cannot be encoded as an item.
    #[error("cannot encode value: {0}")]
    Encoding(String),

    /// An attribute value with no recognized populated variant, or a
    /// value that cannot be coerced to the requested scalar type.
    #[error("cannot decode attribute: {0}")]
    Decoding(String),

    /// A request names a table other than the one the mapper is bound to.
    #[error("request targets table `{requested}` but mapper is bound to `{bound}`")]
    Validation { requested: String, bound: String },

    /// A key-based operation was attempted on an entity whose key field
    /// is unset. Caught client-side, before any request is dispatched.
    #[error("key field `{field}` of entity `{entity}` is not set")]
    MissingKey {
        entity: &'static str,
        field: &'static str,
    },

    /// Anything the underlying store client raised, passed through with
    /// its service error code when one could be extracted.
    #[error("service error{}: {message}", code.as_deref().map(|c| format!(" [{c}]")).unwrap_or_default())]
    Service {
        code: Option<String>,
        message: String,
    },
}

impl Error {
    /// The service error code, if this is a service error that carried one.
    pub fn service_code(&self) -> Option<&str> {
        match self {
            Error::Service { code, .. } => code.as_deref(),
            _ => None,
        }
    }
}

/// Map any AWS SDK error to [`Error::Service`].
///
/// This is the single entry point for SDK error handling. All operations
/// use this function; no translation beyond extracting the service error
/// code and message is performed.
pub(crate) fn map_sdk_error<E, R>(err: SdkError<E, R>, table: Option<&str>) -> Error
where
    E: std::fmt::Debug + std::fmt::Display,
    R: std::fmt::Debug,
{
    // Get both display and debug representations
    let err_display = err.to_string();
    let err_debug = format!("{:?}", err);

    let code = extract_error_code(&err_debug);

    let message = match code.as_deref() {
        Some("ResourceNotFoundException") => match table {
            Some(t) => format!("table '{}' not found", t),
            None => "resource not found".to_string(),
        },
        Some("ConditionalCheckFailedException") => {
            "the condition expression evaluated to false".to_string()
        }
        _ => extract_message(&err_debug).unwrap_or_else(|| {
            if err_display == "service error" {
                // The display is useless, use debug but truncate if too long
                let clean = err_debug.replace('\n', " ").replace("  ", " ");
                truncate_message(&clean, 500)
            } else {
                err_display
            }
        }),
    };

    Error::Service { code, message }
}

/// Truncate a message to at most `max` bytes, backing up to the nearest
/// char boundary so multi-byte characters never get split.
fn truncate_message(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end])
}

/// Extract error code from AWS SDK error debug string.
fn extract_error_code(err_str: &str) -> Option<String> {
    // Look for patterns like: code: Some("ResourceNotFoundException")
    if let Some(start) = err_str.find("code: Some(\"") {
        let rest = &err_str[start + 12..];
        if let Some(end) = rest.find('"') {
            return Some(rest[..end].to_string());
        }
    }

    // Also check for error type names in the string
    let known_errors = [
        "ResourceNotFoundException",
        "ValidationException",
        "ConditionalCheckFailedException",
        "ProvisionedThroughputExceededException",
        "ThrottlingException",
        "AccessDeniedException",
        "UnrecognizedClientException",
        "ItemCollectionSizeLimitExceededException",
        "RequestLimitExceeded",
    ];

    for error in known_errors {
        if err_str.contains(error) {
            return Some(error.to_string());
        }
    }

    None
}

/// Extract the error message from AWS SDK error debug string.
fn extract_message(err_str: &str) -> Option<String> {
    // Look for patterns like: message: Some("The actual error message")
    if let Some(start) = err_str.find("message: Some(\"") {
        let rest = &err_str[start + 15..];
        if let Some(end) = rest.find('"') {
            return Some(rest[..end].to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_error_code_from_debug_repr() {
        let s = r#"ServiceError { code: Some("ResourceNotFoundException"), .. }"#;
        assert_eq!(
            extract_error_code(s).as_deref(),
            Some("ResourceNotFoundException")
        );
    }

    #[test]
    fn extracts_error_code_by_name() {
        let s = "something something ThrottlingException something";
        assert_eq!(
            extract_error_code(s).as_deref(),
            Some("ThrottlingException")
        );
    }

    #[test]
    fn extracts_message_from_debug_repr() {
        let s = r#"meta: { message: Some("One or more parameter values were invalid") }"#;
        assert_eq!(
            extract_message(s).as_deref(),
            Some("One or more parameter values were invalid")
        );
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        // 'é' is two bytes; an odd byte limit lands mid-character.
        let s = "é".repeat(300);
        let truncated = truncate_message(&s, 499);
        assert!(truncated.ends_with("..."));
        assert_eq!(truncated.len(), 498 + 3);

        let short = truncate_message("fits", 500);
        assert_eq!(short, "fits");
    }

    #[test]
    fn service_error_display_includes_code() {
        let err = Error::Service {
            code: Some("ThrottlingException".to_string()),
            message: "slow down".to_string(),
        };
        let rendered = err.to_string();
        assert!(rendered.contains("ThrottlingException"));
        assert!(rendered.contains("slow down"));
    }
}
