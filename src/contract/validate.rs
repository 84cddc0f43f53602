//! Construction-time invariants of the contract types

use super::{File, RepositoryData, Request};
use git2::{Reference, ReferenceFormat};
use std::collections::HashSet;

/// Longest digest accepted as a commit identifier (SHA-512 sized)
pub const MAX_DIGEST_LEN: usize = 64;

/// Contract violations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContractError {
    /// A request is missing identity fields or carries malformed ones
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A produced response breaks the data model invariants
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl Request {
    /// Check the request before it is dispatched to any collaborator
    pub fn validate(&self) -> Result<(), ContractError> {
        if self.repository_id.is_empty() {
            return Err(ContractError::InvalidRequest(
                "repository_id is empty".to_string(),
            ));
        }

        if self.root_commit_hash.is_empty() {
            return Err(ContractError::InvalidRequest(
                "root_commit_hash is empty".to_string(),
            ));
        }

        if self.root_commit_hash.len() > MAX_DIGEST_LEN {
            return Err(ContractError::InvalidRequest(format!(
                "root_commit_hash is {} bytes, longest accepted digest is {}",
                self.root_commit_hash.len(),
                MAX_DIGEST_LEN
            )));
        }

        // An empty reference is allowed: it is advisory only
        if !self.reference.is_empty() && !is_valid_reference(&self.reference) {
            return Err(ContractError::InvalidRequest(format!(
                "reference {:?} is not a valid reference name",
                self.reference
            )));
        }

        Ok(())
    }
}

impl RepositoryData {
    /// Check the data model invariants of a produced response
    pub fn validate(&self) -> Result<(), ContractError> {
        if self.repository_id.is_empty() {
            return Err(ContractError::InvalidResponse(
                "repository_id is empty".to_string(),
            ));
        }

        let mut seen = HashSet::with_capacity(self.files.len());
        for file in &self.files {
            check_file(file)?;

            if !seen.insert(file.path.as_str()) {
                return Err(ContractError::InvalidResponse(format!(
                    "duplicate path {:?}",
                    file.path
                )));
            }
        }

        Ok(())
    }

    /// Check the response and that it answers `request`
    pub fn validate_for(&self, request: &Request) -> Result<(), ContractError> {
        self.validate()?;

        if self.repository_id != request.repository_id {
            return Err(ContractError::InvalidResponse(format!(
                "repository_id {:?} does not match request {:?}",
                self.repository_id, request.repository_id
            )));
        }

        Ok(())
    }
}

fn check_file(file: &File) -> Result<(), ContractError> {
    if file.path.is_empty() {
        return Err(ContractError::InvalidResponse(
            "file with empty path".to_string(),
        ));
    }

    // A parsed file must always carry a verifiable digest
    if !file.uast.is_empty() && file.hash.is_empty() {
        return Err(ContractError::InvalidResponse(format!(
            "file {:?} has a UAST but no hash",
            file.path
        )));
    }

    Ok(())
}

/// Git reference-name rules, allowing one-level names such as `main`
fn is_valid_reference(name: &str) -> bool {
    Reference::normalize_name(name, ReferenceFormat::ALLOW_ONELEVEL).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::Digest;

    fn scenario_request() -> Request {
        Request::new("r1", vec![0xAB, 0xCD, 0x12, 0x34], "refs/heads/main")
    }

    fn scenario_response() -> RepositoryData {
        let mut data = RepositoryData::new("r1", "https://example.com/r1.git");
        data.files
            .push(File::new("go", "main.go", "<tree>", vec![0x9f, 0x8e, 0x01]));
        data
    }

    #[test]
    fn test_valid_request() {
        assert_eq!(scenario_request().validate(), Ok(()));
    }

    #[test]
    fn test_request_reference_is_optional() {
        let request = Request::new("r1", vec![0x01], "");
        assert!(request.validate().is_ok());

        let request = Request::new("r1", vec![0x01], "main");
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_request_empty_repository_id() {
        let request = Request::new("", vec![0x01], "main");
        assert!(matches!(
            request.validate(),
            Err(ContractError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_request_empty_commit_hash() {
        let request = Request::new("r1", Digest::default(), "refs/heads/main");
        let err = request.validate().unwrap_err();
        assert_eq!(
            err,
            ContractError::InvalidRequest("root_commit_hash is empty".to_string())
        );
    }

    #[test]
    fn test_request_oversized_commit_hash() {
        let request = Request::new("r1", vec![0u8; MAX_DIGEST_LEN + 1], "");
        assert!(request.validate().is_err());

        let request = Request::new("r1", vec![0u8; MAX_DIGEST_LEN], "");
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_request_malformed_reference() {
        for bad in ["refs/heads/bad..name", "has space", "refs/heads/x.lock", "a~b"] {
            let request = Request::new("r1", vec![0x01], bad);
            assert!(
                matches!(request.validate(), Err(ContractError::InvalidRequest(_))),
                "{} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_valid_response() {
        let data = scenario_response();
        assert!(data.validate().is_ok());
        assert!(data.validate_for(&scenario_request()).is_ok());
    }

    #[test]
    fn test_empty_response_is_valid() {
        let data = RepositoryData::new("r1", "https://example.com/r1.git");
        assert!(data.validate().is_ok());
    }

    #[test]
    fn test_response_empty_repository_id() {
        let data = RepositoryData::new("", "https://example.com/r1.git");
        assert!(matches!(
            data.validate(),
            Err(ContractError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_response_duplicate_path() {
        let mut data = scenario_response();
        data.files
            .push(File::new("go", "main.go", "<other>", vec![0x01]));

        let err = data.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate path"));
    }

    #[test]
    fn test_response_uast_without_hash() {
        let mut data = scenario_response();
        data.files
            .push(File::new("go", "util.go", "<tree>", Digest::default()));

        assert!(matches!(
            data.validate(),
            Err(ContractError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_response_empty_uast_without_hash_is_allowed() {
        let mut data = scenario_response();
        data.files.push(File::new("go", "empty.go", "", Digest::default()));
        assert!(data.validate().is_ok());
    }

    #[test]
    fn test_response_empty_path() {
        let mut data = scenario_response();
        data.files.push(File::new("go", "", "<tree>", vec![0x01]));
        assert!(data.validate().is_err());
    }

    #[test]
    fn test_response_for_other_repository() {
        let data = scenario_response();
        let request = Request::new("r2", vec![0x01], "");

        assert!(matches!(
            data.validate_for(&request),
            Err(ContractError::InvalidResponse(_))
        ));
    }
}
