//! Identity Resolver
//!
//! Matches extracted candidate identifiers against a directory snapshot that
//! is indexed once per batch.
//!
//! # Tie-break
//! The first candidate (extraction order) present in the directory wins.
//! When other candidates point at *different* employees the document is
//! ambiguous: under [`AmbiguityPolicy::FirstMatch`] the first match is kept
//! and a warning is logged, under [`AmbiguityPolicy::Reject`] the document is
//! skipped for operator review.

use crate::error::DocumentError;
use payroll_common::config::AmbiguityPolicy;
use payroll_common::db::DirectoryRecord;
use std::collections::HashMap;
use tracing::warn;

/// Uppercase and keep only the identifier alphabet (`A–Z`, `0–9`, `Ñ`, `&`)
pub fn normalize_identifier(raw: &str) -> String {
    raw.to_uppercase()
        .chars()
        .filter(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || *c == 'Ñ' || *c == '&')
        .collect()
}

/// Directory snapshot keyed by normalized identifier
#[derive(Debug, Default)]
pub struct DirectoryIndex {
    by_identifier: HashMap<String, DirectoryRecord>,
}

impl DirectoryIndex {
    pub fn build(records: Vec<DirectoryRecord>) -> Self {
        let mut by_identifier = HashMap::with_capacity(records.len());
        for record in records {
            let key = normalize_identifier(&record.identifier);
            if key.is_empty() {
                continue;
            }
            if let Some(previous) = by_identifier.insert(key, record) {
                warn!(
                    identifier = %previous.identifier,
                    "Directory holds the same normalized identifier twice; keeping the later entry"
                );
            }
        }
        Self { by_identifier }
    }

    pub fn get(&self, normalized: &str) -> Option<&DirectoryRecord> {
        self.by_identifier.get(normalized)
    }

    pub fn len(&self) -> usize {
        self.by_identifier.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_identifier.is_empty()
    }
}

/// A document resolved to one employee
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedIdentity {
    /// Normalized identifier of the winning candidate
    pub identifier: String,
    pub employee_key: String,
    /// Employee keys matched by later candidates, excluding the winner
    pub conflicting_keys: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityResolver {
    policy: AmbiguityPolicy,
}

impl IdentityResolver {
    pub fn new(policy: AmbiguityPolicy) -> Self {
        Self { policy }
    }

    /// Resolve candidates to one employee
    pub fn resolve(
        &self,
        candidates: &[String],
        index: &DirectoryIndex,
    ) -> Result<ResolvedIdentity, DocumentError> {
        let mut winner: Option<ResolvedIdentity> = None;

        for candidate in candidates {
            let normalized = normalize_identifier(candidate);
            let Some(record) = index.get(&normalized) else {
                continue;
            };
            match winner.as_mut() {
                None => {
                    winner = Some(ResolvedIdentity {
                        identifier: normalized,
                        employee_key: record.employee_key.clone(),
                        conflicting_keys: Vec::new(),
                    });
                }
                Some(found) => {
                    if record.employee_key != found.employee_key
                        && !found.conflicting_keys.contains(&record.employee_key)
                    {
                        found.conflicting_keys.push(record.employee_key.clone());
                    }
                }
            }
        }

        let Some(resolved) = winner else {
            return Err(DocumentError::Unmatched {
                candidates: candidates.to_vec(),
            });
        };

        if resolved.conflicting_keys.is_empty() {
            return Ok(resolved);
        }

        match self.policy {
            AmbiguityPolicy::FirstMatch => {
                warn!(
                    identifier = %resolved.identifier,
                    employee_key = %resolved.employee_key,
                    others = ?resolved.conflicting_keys,
                    "Candidates match several employees; using first match"
                );
                Ok(resolved)
            }
            AmbiguityPolicy::Reject => {
                let mut employee_keys = vec![resolved.employee_key];
                employee_keys.extend(resolved.conflicting_keys);
                Err(DocumentError::Ambiguous { employee_keys })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(key: &str, identifier: &str) -> DirectoryRecord {
        DirectoryRecord {
            employee_key: key.to_string(),
            identifier: identifier.to_string(),
            display_name: String::new(),
        }
    }

    fn index() -> DirectoryIndex {
        DirectoryIndex::build(vec![
            record("1234", "ABCD850101XYZ"),
            record("5678", "WXYZ800202QQ1"),
            record("1234", "ABCD850101XY1"),
        ])
    }

    fn candidates(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_normalize_identifier() {
        assert_eq!(normalize_identifier(" abcd-850101 xyz."), "ABCD850101XYZ");
        assert_eq!(normalize_identifier("ñand850101ab1"), "ÑAND850101AB1");
        assert_eq!(normalize_identifier("a&bc850101xy9"), "A&BC850101XY9");
    }

    #[test]
    fn test_first_match_in_extraction_order() {
        let resolver = IdentityResolver::default();
        let resolved = resolver
            .resolve(&candidates(&["EMP990101AB1", "abcd850101xyz"]), &index())
            .unwrap();
        assert_eq!(resolved.employee_key, "1234");
        assert_eq!(resolved.identifier, "ABCD850101XYZ");
        assert!(resolved.conflicting_keys.is_empty());
    }

    #[test]
    fn test_unmatched_lists_candidates() {
        let err = IdentityResolver::default()
            .resolve(&candidates(&["ZZZZ010101AAA"]), &index())
            .unwrap_err();
        match err {
            DocumentError::Unmatched { candidates } => assert_eq!(candidates, vec!["ZZZZ010101AAA"]),
            other => panic!("expected unmatched, got {:?}", other),
        }
    }

    #[test]
    fn test_same_employee_twice_is_not_ambiguous() {
        let resolver = IdentityResolver::new(AmbiguityPolicy::Reject);
        let resolved = resolver
            .resolve(&candidates(&["ABCD850101XYZ", "ABCD850101XY1"]), &index())
            .unwrap();
        assert_eq!(resolved.employee_key, "1234");
    }

    #[test]
    fn test_first_match_policy_keeps_first() {
        let resolver = IdentityResolver::new(AmbiguityPolicy::FirstMatch);
        let resolved = resolver
            .resolve(&candidates(&["WXYZ800202QQ1", "ABCD850101XYZ"]), &index())
            .unwrap();
        assert_eq!(resolved.employee_key, "5678");
        assert_eq!(resolved.conflicting_keys, vec!["1234".to_string()]);
    }

    #[test]
    fn test_reject_policy_reports_all_keys() {
        let resolver = IdentityResolver::new(AmbiguityPolicy::Reject);
        let err = resolver
            .resolve(&candidates(&["WXYZ800202QQ1", "ABCD850101XYZ"]), &index())
            .unwrap_err();
        match err {
            DocumentError::Ambiguous { employee_keys } => {
                assert_eq!(employee_keys, vec!["5678".to_string(), "1234".to_string()])
            }
            other => panic!("expected ambiguous, got {:?}", other),
        }
    }

    #[test]
    fn test_index_normalizes_directory_identifiers() {
        let index = DirectoryIndex::build(vec![record("1", " abcd850101xyz ")]);
        assert_eq!(index.len(), 1);
        assert!(index.get("ABCD850101XYZ").is_some());
    }
}
