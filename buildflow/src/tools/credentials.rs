//! Credential resolution.
//!
//! Bundles are resolved right before the command that needs them and bound
//! into that command's environment only. Nothing here is stored on the
//! run context.

use crate::errors::CredentialResolutionError;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// A secret string whose `Debug` output is redacted.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    /// Wraps a secret value.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the secret value.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

/// A named set of secret values, e.g. a repository username and password.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialBundle {
    name: String,
    values: BTreeMap<String, Secret>,
}

impl CredentialBundle {
    /// Creates an empty bundle.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: BTreeMap::new(),
        }
    }

    /// Adds a value under a key such as `USR` or `PSW`.
    #[must_use]
    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), Secret::new(value));
        self
    }

    /// Returns the bundle name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns a value by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Secret> {
        self.values.get(key)
    }

    /// Returns all entries in key order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &Secret)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Resolves named credential bundles.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Resolves a bundle by name.
    async fn resolve(&self, name: &str) -> Result<CredentialBundle, CredentialResolutionError>;
}

/// Provider backed by bundles registered up front.
#[derive(Debug, Clone, Default)]
pub struct StaticCredentialProvider {
    bundles: HashMap<String, CredentialBundle>,
}

impl StaticCredentialProvider {
    /// Creates an empty provider.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a bundle under its own name.
    #[must_use]
    pub fn with_bundle(mut self, bundle: CredentialBundle) -> Self {
        self.bundles.insert(bundle.name().to_string(), bundle);
        self
    }
}

#[async_trait]
impl CredentialProvider for StaticCredentialProvider {
    async fn resolve(&self, name: &str) -> Result<CredentialBundle, CredentialResolutionError> {
        self.bundles
            .get(name)
            .cloned()
            .ok_or_else(|| CredentialResolutionError::NotFound {
                name: name.to_string(),
            })
    }
}

/// Provider reading username/password pairs from the environment.
///
/// A bundle named `maven-repo-creds` resolves from `MAVEN_REPO_CREDS_USR`
/// and `MAVEN_REPO_CREDS_PSW`; the password is required.
#[derive(Debug, Clone, Default)]
pub struct EnvCredentialProvider {
    prefix: String,
}

impl EnvCredentialProvider {
    /// Creates a provider reading unprefixed variables.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a provider reading variables that start with `prefix`.
    #[must_use]
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Returns the variable stem for a bundle name.
    #[must_use]
    pub fn variable_stem(&self, name: &str) -> String {
        let normalized: String = name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
            .collect();
        format!("{}{normalized}", self.prefix)
    }

    fn resolve_with<F>(&self, name: &str, lookup: F) -> Result<CredentialBundle, CredentialResolutionError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let stem = self.variable_stem(name);
        let user = lookup(&format!("{stem}_USR"));
        let password = lookup(&format!("{stem}_PSW"));

        match (user, password) {
            (None, None) => Err(CredentialResolutionError::NotFound {
                name: name.to_string(),
            }),
            (_, None) => Err(CredentialResolutionError::Incomplete {
                name: name.to_string(),
                field: format!("{stem}_PSW"),
            }),
            (user, Some(password)) => {
                let mut bundle = CredentialBundle::new(name).with_value("PSW", password);
                if let Some(user) = user {
                    bundle = bundle.with_value("USR", user);
                }
                Ok(bundle)
            }
        }
    }
}

#[async_trait]
impl CredentialProvider for EnvCredentialProvider {
    async fn resolve(&self, name: &str) -> Result<CredentialBundle, CredentialResolutionError> {
        self.resolve_with(name, |key| std::env::var(key).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_debug_is_redacted() {
        let secret = Secret::new("hunter2");
        assert_eq!(format!("{secret:?}"), "Secret(***)");
        assert_eq!(secret.expose(), "hunter2");
    }

    #[tokio::test]
    async fn test_static_provider() {
        let provider = StaticCredentialProvider::new().with_bundle(
            CredentialBundle::new("maven-repo-creds")
                .with_value("USR", "deployer")
                .with_value("PSW", "pw"),
        );

        let bundle = provider.resolve("maven-repo-creds").await.unwrap();
        assert_eq!(bundle.get("USR").map(Secret::expose), Some("deployer"));

        let err = provider.resolve("missing").await.unwrap_err();
        assert_eq!(err, CredentialResolutionError::NotFound { name: "missing".to_string() });
    }

    #[test]
    fn test_env_provider_variable_stem() {
        let provider = EnvCredentialProvider::with_prefix("CI_");
        assert_eq!(provider.variable_stem("maven-repo-creds"), "CI_MAVEN_REPO_CREDS");
    }

    #[test]
    fn test_env_provider_resolution() {
        let provider = EnvCredentialProvider::new();
        let vars: HashMap<&str, &str> = [
            ("NEXUS_USR", "ci"),
            ("NEXUS_PSW", "secret"),
            ("HALF_USR", "ci"),
        ]
        .into_iter()
        .collect();
        let lookup = |key: &str| vars.get(key).map(|v| (*v).to_string());

        let bundle = provider.resolve_with("nexus", lookup).unwrap();
        assert_eq!(bundle.get("PSW").map(Secret::expose), Some("secret"));

        assert!(matches!(
            provider.resolve_with("half", lookup),
            Err(CredentialResolutionError::Incomplete { .. })
        ));
        assert!(matches!(
            provider.resolve_with("absent", lookup),
            Err(CredentialResolutionError::NotFound { .. })
        ));
    }
}
