//! Scope authorities
//!
//! Providers disagree on how scopes travel: UAA sends a space-delimited
//! string, Auth0 an array. [`ScopeList`] accepts both, and the portal keeps
//! only the entries under its own authority namespace.

use serde::{Deserialize, Serialize};

use super::types::GrantedAuthority;

/// Scopes as delivered by a provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScopeList {
    /// Space-delimited string
    Delimited(String),
    /// One entry per scope
    List(Vec<String>),
}

impl ScopeList {
    /// Normalize to individual scope entries, order preserved
    #[must_use]
    pub fn into_entries(self) -> Vec<String> {
        match self {
            Self::Delimited(s) => s.split_whitespace().map(str::to_string).collect(),
            Self::List(list) => list,
        }
    }
}

impl From<&str> for ScopeList {
    fn from(value: &str) -> Self {
        Self::Delimited(value.to_string())
    }
}

impl From<String> for ScopeList {
    fn from(value: String) -> Self {
        Self::Delimited(value)
    }
}

impl From<Vec<String>> for ScopeList {
    fn from(value: Vec<String>) -> Self {
        Self::List(value)
    }
}

impl From<&[&str]> for ScopeList {
    fn from(value: &[&str]) -> Self {
        Self::List(value.iter().map(|s| (*s).to_string()).collect())
    }
}

fn is_under_namespace(entry: &str, namespace: &str) -> bool {
    entry
        .strip_prefix(namespace)
        .is_some_and(|rest| rest.starts_with('.') && rest.len() > 1)
}

/// Keep only the scope entries under `namespace`
///
/// Idempotent and order-preserving; a string input behaves exactly like the
/// equivalent array.
pub fn filter_scope_authorities(scopes: impl Into<ScopeList>, namespace: &str) -> Vec<String> {
    scopes
        .into()
        .into_entries()
        .into_iter()
        .filter(|entry| is_under_namespace(entry, namespace))
        .collect()
}

/// Parse `<namespace>.<type>.<value>.<level>` into a [`GrantedAuthority`]
///
/// Extra dots are absorbed into the type segment. Returns `None` for entries
/// outside the namespace or with fewer than three segments.
#[must_use]
pub fn parse_authority(authority: &str, namespace: &str) -> Option<GrantedAuthority> {
    let rest = authority.strip_prefix(namespace)?.strip_prefix('.')?;
    let mut segments = rest.rsplitn(3, '.');
    let level = segments.next()?;
    let value = segments.next()?;
    let authority_type = segments.next()?;

    Some(GrantedAuthority {
        authority_type: authority_type.to_uppercase(),
        value: value.to_string(),
        level: level.to_string(),
    })
}

#[cfg(test)]
mod tests {
    //! Unit tests for auth::scopes.
    use super::*;

    const NS: &str = "guidewire.edge";

    /// Validates `filter_scope_authorities` for a space-delimited string.
    ///
    /// Assertions:
    /// - Confirms only the namespaced entry is kept.
    #[test]
    fn test_filter_delimited_string() {
        let kept = filter_scope_authorities("guidewire.edge.a.b.c other.scope", NS);
        assert_eq!(kept, vec!["guidewire.edge.a.b.c".to_string()]);
    }

    /// Validates array input against the equivalent string and idempotence.
    ///
    /// Assertions:
    /// - Array and string inputs produce the same result.
    /// - Filtering the output again changes nothing.
    /// - Entries merely sharing the prefix text are dropped.
    #[test]
    fn test_filter_array_matches_string_and_is_idempotent() {
        let entries = vec![
            "openid".to_string(),
            "guidewire.edge.policy.write.all".to_string(),
            "guidewire.edgeless.x.y.z".to_string(),
            "guidewire.edge.claim.read.own".to_string(),
        ];

        let from_array = filter_scope_authorities(entries.clone(), NS);
        let from_string = filter_scope_authorities(entries.join(" "), NS);
        let twice = filter_scope_authorities(from_array.clone(), NS);

        assert_eq!(from_array, from_string);
        assert_eq!(twice, from_array);
        assert_eq!(
            from_array,
            vec![
                "guidewire.edge.policy.write.all".to_string(),
                "guidewire.edge.claim.read.own".to_string()
            ]
        );
    }

    /// Validates `ScopeList` deserialization of both provider shapes.
    ///
    /// Assertions:
    /// - A JSON string becomes `Delimited`, an array becomes `List`.
    #[test]
    fn test_scope_list_untagged() {
        let delimited: ScopeList = serde_json::from_str(r#""a b""#).unwrap();
        let list: ScopeList = serde_json::from_str(r#"["a","b"]"#).unwrap();

        assert_eq!(delimited.into_entries(), list.into_entries());
    }

    /// Validates `parse_authority` segment splitting.
    ///
    /// Assertions:
    /// - The type segment is upper-cased.
    /// - Extra dots fold into the type segment.
    /// - Short or foreign entries yield `None`.
    #[test]
    fn test_parse_authority() {
        let parsed = parse_authority("guidewire.edge.policy.write.all", NS).unwrap();
        assert_eq!(parsed.authority_type, "POLICY");
        assert_eq!(parsed.value, "write");
        assert_eq!(parsed.level, "all");

        let nested = parse_authority("guidewire.edge.account.sub.read.own", NS).unwrap();
        assert_eq!(nested.authority_type, "ACCOUNT.SUB");

        assert_eq!(parse_authority("guidewire.edge.policy.write", NS), None);
        assert_eq!(parse_authority("other.scope.a.b.c", NS), None);
    }
}
