//! Authentication and authorization: JWT-based identity, per-map/action
//! permission checks, and field-level response filtering.
//!
//! `PolicyEngine::authenticate` validates the token carried on `AUTH`
//! (`AuthMessage::token`) and returns the resulting `Principal`. Every
//! subsequent operation is checked against the principal's grants before it
//! reaches a domain service; `FieldFilter` then redacts any response fields
//! the principal isn't allowed to see.

use std::collections::HashSet;
use std::sync::Arc;

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use latticedb_core::types::Value;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Claims carried in the JWT issued to an authenticated client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the client/principal identifier.
    pub sub: String,
    /// Expiry, Unix seconds.
    pub exp: u64,
    /// Map-name glob patterns this principal may access, e.g. `["users.*"]`.
    #[serde(default)]
    pub maps: Vec<String>,
    /// Field paths to redact from responses for this principal.
    #[serde(default)]
    pub denied_fields: Vec<String>,
    /// Actions granted: `read`, `write`, `admin`.
    #[serde(default)]
    pub actions: Vec<String>,
}

/// The authenticated identity and its resolved grants for the lifetime of a connection.
#[derive(Debug, Clone)]
pub struct Principal {
    pub client_id: String,
    pub map_patterns: Vec<String>,
    pub denied_fields: HashSet<String>,
    pub actions: HashSet<String>,
}

impl Principal {
    /// An unauthenticated/anonymous principal with no grants. Used for
    /// connections before `AUTH` completes, or when auth is disabled.
    #[must_use]
    pub fn anonymous() -> Self {
        Self {
            client_id: String::new(),
            map_patterns: vec!["*".to_string()],
            denied_fields: HashSet::new(),
            actions: ["read".to_string(), "write".to_string()].into(),
        }
    }

    #[must_use]
    pub fn can_access_map(&self, map_name: &str) -> bool {
        self.map_patterns.iter().any(|p| glob_match(p, map_name))
    }

    #[must_use]
    pub fn can_perform(&self, action: &str) -> bool {
        self.actions.contains(action)
    }
}

/// A `*`-only glob: `*` matches anything, a literal pattern requires an
/// exact match, `prefix.*` matches any map starting with `prefix.`.
fn glob_match(pattern: &str, candidate: &str) -> bool {
    if pattern == "*" {
        return true;
    }
    if let Some(prefix) = pattern.strip_suffix(".*") {
        return candidate == prefix || candidate.starts_with(&format!("{prefix}."));
    }
    pattern == candidate
}

/// Errors raised while authenticating or authorizing a request.
#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    #[error("invalid or expired token")]
    InvalidToken,
    #[error("principal lacks permission for map {0:?}")]
    MapDenied(String),
    #[error("principal lacks permission for action {0:?}")]
    ActionDenied(String),
}

/// Validates JWTs and evaluates per-request authorization.
pub struct PolicyEngine {
    decoding_key: DecodingKey,
    validation: Validation,
    /// Static admin token compared in constant time, for operator/debug
    /// endpoints that bypass the JWT flow entirely.
    admin_token: Option<String>,
}

impl PolicyEngine {
    #[must_use]
    pub fn new(hmac_secret: &[u8], admin_token: Option<String>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        Self {
            decoding_key: DecodingKey::from_secret(hmac_secret),
            validation,
            admin_token,
        }
    }

    /// Decodes and validates `token`, producing the resulting `Principal`.
    pub fn authenticate(&self, token: &str, client_id: &str) -> Result<Principal, PolicyError> {
        if let Some(admin) = &self.admin_token {
            if constant_time_eq(token.as_bytes(), admin.as_bytes()) {
                return Ok(Principal {
                    client_id: client_id.to_string(),
                    map_patterns: vec!["*".to_string()],
                    denied_fields: HashSet::new(),
                    actions: ["read", "write", "admin"].map(str::to_string).into(),
                });
            }
        }

        let data = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|_| PolicyError::InvalidToken)?;
        let claims = data.claims;
        Ok(Principal {
            client_id: client_id.to_string(),
            map_patterns: if claims.maps.is_empty() {
                vec![]
            } else {
                claims.maps
            },
            denied_fields: claims.denied_fields.into_iter().collect(),
            actions: claims.actions.into_iter().collect(),
        })
    }

    /// Authorizes `principal` to perform `action` on `map_name`.
    pub fn authorize(&self, principal: &Principal, map_name: &str, action: &str) -> Result<(), PolicyError> {
        if !principal.can_access_map(map_name) {
            return Err(PolicyError::MapDenied(map_name.to_string()));
        }
        if !principal.can_perform(action) {
            return Err(PolicyError::ActionDenied(action.to_string()));
        }
        Ok(())
    }
}

/// Compares two secrets in constant time by first hashing each to a
/// fixed-length digest, so the comparison never leaks the operands'
/// relative lengths through its own length check.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    let digest_a = Sha256::digest(a);
    let digest_b = Sha256::digest(b);
    digest_a.ct_eq(&digest_b).into()
}

/// Redacts fields a principal is not permitted to see from an outgoing value.
pub struct FieldFilter;

impl FieldFilter {
    /// Removes every path in `principal.denied_fields` from `value`, returning
    /// the filtered copy. Paths are dot-separated, matching `Value::get_path`.
    #[must_use]
    pub fn apply(principal: &Principal, value: Value) -> Value {
        if principal.denied_fields.is_empty() {
            return value;
        }
        let mut filtered = value;
        for path in &principal.denied_fields {
            filtered = remove_path(filtered, path);
        }
        filtered
    }
}

fn remove_path(value: Value, path: &str) -> Value {
    let Value::Map(mut map) = value else {
        return value;
    };
    match path.split_once('.') {
        None => {
            map.remove(path);
            Value::Map(map)
        }
        Some((head, rest)) => {
            if let Some(child) = map.remove(head) {
                map.insert(head.to_string(), remove_path(child, rest));
            }
            Value::Map(map)
        }
    }
}

/// Shared handle, held by the connection layer and every domain service
/// that needs authorization checks.
pub type SharedPolicyEngine = Arc<PolicyEngine>;

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn engine() -> PolicyEngine {
        PolicyEngine::new(b"test-secret", Some("admin-token".to_string()))
    }

    fn token_for(claims: &Claims) -> String {
        encode(&Header::new(Algorithm::HS256), claims, &EncodingKey::from_secret(b"test-secret")).unwrap()
    }

    #[test]
    fn admin_token_grants_full_access() {
        let policy = engine();
        let principal = policy.authenticate("admin-token", "c1").unwrap();
        assert!(principal.can_access_map("anything"));
        assert!(principal.can_perform("admin"));
    }

    #[test]
    fn valid_jwt_resolves_grants() {
        let policy = engine();
        let claims = Claims {
            sub: "user-1".into(),
            exp: u64::MAX / 2,
            maps: vec!["orders.*".into()],
            denied_fields: vec!["ssn".into()],
            actions: vec!["read".into()],
        };
        let token = token_for(&claims);
        let principal = policy.authenticate(&token, "c1").unwrap();
        assert!(principal.can_access_map("orders.history"));
        assert!(!principal.can_access_map("users"));
        assert!(principal.can_perform("read"));
        assert!(!principal.can_perform("write"));
    }

    #[test]
    fn invalid_token_is_rejected() {
        let policy = engine();
        assert!(policy.authenticate("garbage", "c1").is_err());
    }

    #[test]
    fn glob_match_supports_prefix_wildcard() {
        assert!(glob_match("users.*", "users.profiles"));
        assert!(glob_match("users.*", "users"));
        assert!(!glob_match("users.*", "orders"));
        assert!(glob_match("*", "anything"));
    }

    #[test]
    fn field_filter_removes_denied_nested_path() {
        let mut principal = Principal::anonymous();
        principal.denied_fields.insert("profile.ssn".to_string());

        let mut inner = std::collections::BTreeMap::new();
        inner.insert("ssn".to_string(), Value::String("123-45-6789".into()));
        inner.insert("name".to_string(), Value::String("Alice".into()));
        let mut outer = std::collections::BTreeMap::new();
        outer.insert("profile".to_string(), Value::Map(inner));
        let value = Value::Map(outer);

        let filtered = FieldFilter::apply(&principal, value);
        let Value::Map(outer) = filtered else { panic!("expected map") };
        let Value::Map(profile) = outer.get("profile").unwrap().clone() else {
            panic!("expected map")
        };
        assert!(!profile.contains_key("ssn"));
        assert!(profile.contains_key("name"));
    }
}
