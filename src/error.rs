// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ResolverError {
    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    #[error("Failed to parse kubeconfig: {0}")]
    KubeconfigError(String),

    #[error("Space not ready: {0}")]
    SpaceNotReady(String),

    #[error("Invalid label selector: {0}")]
    InvalidSelector(String),

    #[error("Object is not a provider's copy of a consumer's object: {0}")]
    MissingProvenance(String),

    #[error("No space mapped for kube-bind space id {0}")]
    UnmappedTenant(String),

    #[error("Owner not found: {0}")]
    OwnerNotFound(String),

    #[error("Index corruption: {0}")]
    IndexCorruption(String),
}

impl ResolverError {
    /// True when the API server answered 404
    pub fn is_not_found(&self) -> bool {
        matches!(self, ResolverError::KubeError(e) if is_status(e, 404))
    }

    /// True when the API server answered 409 on create
    pub fn is_already_exists(&self) -> bool {
        matches!(self, ResolverError::KubeError(e) if is_status(e, 409))
    }
}

fn is_status(err: &kube::Error, code: u16) -> bool {
    matches!(err, kube::Error::Api(resp) if resp.code == code)
}

pub type Result<T> = std::result::Result<T, ResolverError>;

#[cfg(test)]
mod tests {
    use super::*;
    use kube::core::ErrorResponse;

    fn api_error(code: u16, reason: &str) -> ResolverError {
        ResolverError::KubeError(kube::Error::Api(ErrorResponse {
            status: "Failure".to_string(),
            message: reason.to_string(),
            reason: reason.to_string(),
            code,
        }))
    }

    #[test]
    fn test_not_found_classification() {
        assert!(api_error(404, "NotFound").is_not_found());
        assert!(!api_error(409, "AlreadyExists").is_not_found());
        assert!(!ResolverError::InvalidSelector("x".to_string()).is_not_found());
    }

    #[test]
    fn test_already_exists_classification() {
        assert!(api_error(409, "AlreadyExists").is_already_exists());
        assert!(!api_error(500, "InternalError").is_already_exists());
    }
}
