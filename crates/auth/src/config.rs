//! Environment-driven configuration.

use std::path::PathBuf;

use anyhow::{Context, bail};
use chrono::{DateTime, Duration, Utc};

use acs_core::{PrincipalId, RoleId};

use crate::{
    ACCESS_TOKEN_TTL_MINUTES, AccessClaims, MAX_ACCESS_TOKEN_TTL_MINUTES, PolicyDocument,
    TokenValidationError,
};

pub const POLICY_PATH_ENV: &str = "ACS_POLICY_PATH";
pub const ACCESS_TOKEN_TTL_ENV: &str = "ACS_ACCESS_TOKEN_TTL_MINUTES";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthConfig {
    /// Policy document replacing the embedded seed, if set.
    pub policy_path: Option<PathBuf>,
    pub access_token_ttl: Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            policy_path: None,
            access_token_ttl: Duration::minutes(ACCESS_TOKEN_TTL_MINUTES),
        }
    }
}

impl AuthConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (the process environment in
    /// production, a map in tests).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let mut config = Self::default();

        match lookup(POLICY_PATH_ENV) {
            Some(path) if !path.trim().is_empty() => config.policy_path = Some(PathBuf::from(path)),
            _ => tracing::warn!("{POLICY_PATH_ENV} not set; using embedded access policy"),
        }

        if let Some(raw) = lookup(ACCESS_TOKEN_TTL_ENV) {
            let minutes: i64 = raw
                .trim()
                .parse()
                .with_context(|| format!("{ACCESS_TOKEN_TTL_ENV} must be a whole number of minutes, got '{raw}'"))?;
            if !(1..=MAX_ACCESS_TOKEN_TTL_MINUTES).contains(&minutes) {
                bail!("{ACCESS_TOKEN_TTL_ENV} must be between 1 and {MAX_ACCESS_TOKEN_TTL_MINUTES}, got {minutes}");
            }
            config.access_token_ttl = Duration::try_minutes(minutes)
                .with_context(|| format!("{ACCESS_TOKEN_TTL_ENV} is out of range: {minutes}"))?;
        } else {
            tracing::warn!("{ACCESS_TOKEN_TTL_ENV} not set; access tokens live {ACCESS_TOKEN_TTL_MINUTES} minutes");
        }

        Ok(config)
    }

    /// Access claims for `sub` holding `role_id`, valid for the configured TTL.
    pub fn issue_claims(
        &self,
        sub: PrincipalId,
        role_id: RoleId,
        now: DateTime<Utc>,
    ) -> Result<AccessClaims, TokenValidationError> {
        AccessClaims::issue(sub, role_id, now, self.access_token_ttl)
    }

    /// Load the configured policy document, or the embedded one.
    pub fn load_policy(&self) -> anyhow::Result<PolicyDocument> {
        let Some(path) = &self.policy_path else {
            return Ok(PolicyDocument::embedded()?);
        };

        let json = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read access policy from {}", path.display()))?;
        let doc = PolicyDocument::from_json(&json)
            .with_context(|| format!("invalid access policy in {}", path.display()))?;
        tracing::info!(path = %path.display(), roles = doc.roles.len(), "access policy loaded");
        Ok(doc)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use chrono::Utc;

    use super::*;
    use crate::AuthzError;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn temp_policy(contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("acs-policy-{}.json", uuid::Uuid::now_v7()));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn defaults_without_environment() {
        let config = AuthConfig::from_lookup(lookup(&[])).unwrap();

        assert_eq!(config, AuthConfig::default());
        assert_eq!(config.access_token_ttl, Duration::minutes(20));
        assert_eq!(config.load_policy().unwrap().roles.len(), 3);
    }

    #[test]
    fn ttl_override_is_parsed() {
        let config = AuthConfig::from_lookup(lookup(&[(ACCESS_TOKEN_TTL_ENV, " 45 ")])).unwrap();
        assert_eq!(config.access_token_ttl, Duration::minutes(45));
    }

    #[test]
    fn bad_ttl_is_a_config_error() {
        assert!(AuthConfig::from_lookup(lookup(&[(ACCESS_TOKEN_TTL_ENV, "soon")])).is_err());
        assert!(AuthConfig::from_lookup(lookup(&[(ACCESS_TOKEN_TTL_ENV, "0")])).is_err());
    }

    #[test]
    fn oversized_ttl_is_a_config_error_not_a_panic() {
        let max = i64::MAX.to_string();
        assert!(AuthConfig::from_lookup(lookup(&[(ACCESS_TOKEN_TTL_ENV, &max)])).is_err());
        assert!(AuthConfig::from_lookup(lookup(&[(ACCESS_TOKEN_TTL_ENV, "1000000000000")])).is_err());
        assert!(AuthConfig::from_lookup(lookup(&[(ACCESS_TOKEN_TTL_ENV, "1441")])).is_err());

        let config = AuthConfig::from_lookup(lookup(&[(ACCESS_TOKEN_TTL_ENV, "1440")])).unwrap();
        assert_eq!(config.access_token_ttl, Duration::days(1));
    }

    #[test]
    fn issued_claims_use_configured_ttl() {
        let config = AuthConfig::from_lookup(lookup(&[(ACCESS_TOKEN_TTL_ENV, "5")])).unwrap();
        let now = Utc::now();

        let claims = config.issue_claims(PrincipalId::new(), RoleId::new(), now).unwrap();
        assert_eq!(claims.issued_at, now);
        assert_eq!(claims.expires_at, now + Duration::minutes(5));
    }

    #[test]
    fn policy_file_replaces_embedded_seed() {
        let path = temp_policy(
            r#"{"roles": [{"name": "locked", "accessRights": {
                "users": {"list": false, "view": false, "create": false, "edit": false, "delete": false},
                "roles": {"list": false, "view": false, "create": false, "edit": false, "delete": false},
                "openers": {"list": false, "view": false, "create": false, "edit": false, "delete": false},
                "barrierManufacturers": {"list": false, "view": false, "create": false, "edit": false, "delete": false},
                "barrierModels": {"list": false, "view": false, "create": false, "edit": false, "delete": false}
            }}]}"#,
        );
        let config = AuthConfig::from_lookup(lookup(&[(POLICY_PATH_ENV, path.to_str().unwrap())])).unwrap();

        let doc = config.load_policy().unwrap();
        let roles = doc.build_roles(Utc::now()).unwrap();
        assert_eq!(roles.len(), 1);
        assert_eq!(roles[0].name(), "locked");
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn malformed_policy_file_keeps_the_cause() {
        let path = temp_policy(r#"{"roles": [{"name": "x"}]}"#);
        let config = AuthConfig {
            policy_path: Some(path.clone()),
            ..AuthConfig::default()
        };

        let err = config.load_policy().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AuthzError>(),
            Some(AuthzError::MalformedPolicy(_))
        ));
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn missing_policy_file_is_an_error() {
        let config = AuthConfig {
            policy_path: Some(std::env::temp_dir().join("acs-policy-does-not-exist.json")),
            ..AuthConfig::default()
        };
        assert!(config.load_policy().is_err());
    }
}
