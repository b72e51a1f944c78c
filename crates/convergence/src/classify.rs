//! Retryable vs fatal labelling of remote-call failures.
//!
//! A structured service error is fatal unless its code is on the
//! allow-list; a failure with no code at all (transport) is retryable.
//! Codes match either exactly or by family prefix, the text before the
//! first `.`, so `ResourceInUse` covers `ResourceInUse.Instance`.

use serde::{Deserialize, Serialize};

use crate::error::RemoteError;

/// Result of classifying one failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    /// Transient; the retry loop may try again
    Retryable,
    /// Permanent; the retry loop stops immediately
    Fatal,
}

impl Classification {
    /// Whether the retry loop should try again.
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::Retryable)
    }
}

/// An error that may carry a structured service code.
pub trait RemoteFailure {
    /// The service-defined code, or `None` for transport-level failures.
    fn service_code(&self) -> Option<&str>;
}

impl RemoteFailure for RemoteError {
    fn service_code(&self) -> Option<&str> {
        self.code()
    }
}

/// Policy that labels an error as retryable or fatal.
pub trait Classify<E: ?Sized> {
    fn classify(&self, error: &E) -> Classification;
}

/// Serializable allow-list, as read from configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Service error codes (or code families) treated as transient
    pub retryable_codes: Vec<String>,
}

/// Allow-list classifier for [`RemoteFailure`] errors.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorClassifier {
    retryable_codes: Vec<String>,
}

impl ErrorClassifier {
    /// Create a classifier from an allow-list of codes.
    pub fn new<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            retryable_codes: codes.into_iter().map(Into::into).collect(),
        }
    }

    pub fn from_config(config: &ClassifierConfig) -> Self {
        Self::new(config.retryable_codes.iter().cloned())
    }

    /// Extend the allow-list for one call site.
    ///
    /// Some operations have their own transient codes (a resource that is
    /// still being released, a quota that refreshes), which should not be
    /// retryable everywhere.
    #[must_use]
    pub fn with_codes<I, S>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for code in codes {
            let code = code.into();
            if !self.retryable_codes.contains(&code) {
                self.retryable_codes.push(code);
            }
        }
        self
    }

    pub fn retryable_codes(&self) -> &[String] {
        &self.retryable_codes
    }

    /// Whether `code` is on the allow-list, exactly or by family prefix.
    pub fn is_retryable_code(&self, code: &str) -> bool {
        let family = code.split_once('.').map_or(code, |(family, _)| family);
        self.retryable_codes
            .iter()
            .any(|allowed| allowed == code || allowed == family)
    }
}

impl<E: RemoteFailure + ?Sized> Classify<E> for ErrorClassifier {
    fn classify(&self, error: &E) -> Classification {
        match error.service_code() {
            None => Classification::Retryable,
            Some(code) if self.is_retryable_code(code) => Classification::Retryable,
            Some(_) => Classification::Fatal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> ErrorClassifier {
        ErrorClassifier::new(["InternalError", "ResourceInUse", "ClientError.NetworkError"])
    }

    #[test]
    fn test_transport_errors_are_retryable() {
        let err = RemoteError::transport("connection reset by peer");
        assert_eq!(classifier().classify(&err), Classification::Retryable);
        assert_eq!(
            ErrorClassifier::default().classify(&err),
            Classification::Retryable
        );
    }

    #[test]
    fn test_service_errors_are_fatal_by_default() {
        let err = RemoteError::service("InvalidParameterValue", "bad zone");
        assert_eq!(classifier().classify(&err), Classification::Fatal);
        assert!(!classifier().classify(&err).is_retryable());
    }

    #[test]
    fn test_allow_listed_code_is_retryable() {
        let err = RemoteError::service("InternalError", "try later");
        assert_eq!(classifier().classify(&err), Classification::Retryable);
    }

    #[test]
    fn test_family_prefix_matches() {
        let c = classifier();
        assert!(c.is_retryable_code("ResourceInUse.Instance"));
        assert!(c.is_retryable_code("InternalError.DbError"));
        // A full code on the list does not cover its siblings
        assert!(c.is_retryable_code("ClientError.NetworkError"));
        assert!(!c.is_retryable_code("ClientError.ParseError"));
        // Prefix means up to the first dot, not any substring
        assert!(!c.is_retryable_code("ResourceInUseX"));
    }

    #[test]
    fn test_with_codes_extends_without_duplicates() {
        let c = classifier().with_codes(["UnsupportedOperation", "InternalError"]);
        assert_eq!(c.retryable_codes().len(), 4);

        let err = RemoteError::service("UnsupportedOperation.Status", "busy");
        assert_eq!(c.classify(&err), Classification::Retryable);
        assert_eq!(classifier().classify(&err), Classification::Fatal);
    }

    #[test]
    fn test_from_config() {
        let config = ClassifierConfig {
            retryable_codes: vec!["RequestLimitExceeded".to_string()],
        };
        let c = ErrorClassifier::from_config(&config);
        assert!(c.is_retryable_code("RequestLimitExceeded.UinLimitExceeded"));
        assert!(!c.is_retryable_code("InternalError"));
    }
}
