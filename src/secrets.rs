//! Secret resolver (spec §4.6). `SecretResolver` is the single async seam
//! every connector's credential hydration goes through; three
//! implementations cover the cloud secret manager, an in-memory variant for
//! tests, and an environment-variable prefix scan.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::error::{ConnectorError, ErrorKind};
use crate::security::log_sanitize;

const DEFAULT_TTL: Duration = Duration::from_secs(300);

const ENV_FIELDS: &[&str] = &[
    "USERNAME",
    "PASSWORD",
    "API_KEY",
    "API_SECRET",
    "CLIENT_ID",
    "CLIENT_SECRET",
    "TOKEN",
    "PRIVATE_KEY",
    "ACCESS_KEY",
    "SECRET_KEY",
    "HOST",
    "PORT",
    "DATABASE",
];

/// Mask a secret id for logging: `…` + last 8 chars, or `***` when shorter
/// than 13 characters (spec §4.6).
fn mask_secret_id(id: &str) -> String {
    if id.len() < 13 {
        "***".to_string()
    } else {
        format!("…{}", &id[id.len() - 8..])
    }
}

#[async_trait]
pub trait SecretResolver: Send + Sync {
    async fn get_secret(&self, secret_id: &str) -> Result<HashMap<String, String>, ConnectorError>;
}

struct CachedSecret {
    value: HashMap<String, String>,
    expires_at: Instant,
}

/// Consults a regional secrets service; caches per secret-id under a
/// read/write lock (spec §4.6, §5 "secrets cache uses analogous
/// separation"). The concrete backend call is behind `SecretBackend` so the
/// cloud SDK feature gating stays out of the caching logic.
#[async_trait]
pub trait SecretBackend: Send + Sync {
    async fn fetch_raw(&self, secret_id: &str) -> Result<String, ConnectorError>;
}

pub struct CloudSecretResolver {
    backend: Arc<dyn SecretBackend>,
    ttl: Duration,
    cache: RwLock<HashMap<String, CachedSecret>>,
}

impl CloudSecretResolver {
    pub fn new(backend: Arc<dyn SecretBackend>, ttl: Duration) -> Self {
        let ttl = if ttl.is_zero() { DEFAULT_TTL } else { ttl };
        Self { backend, ttl, cache: RwLock::new(HashMap::new()) }
    }

    fn parse_raw(raw: &str) -> HashMap<String, String> {
        match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(map)) => map
                .into_iter()
                .map(|(k, v)| (k, v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string())))
                .collect(),
            _ => {
                let mut fallback = HashMap::new();
                fallback.insert("value".to_string(), raw.to_string());
                fallback
            }
        }
    }
}

#[async_trait]
impl SecretResolver for CloudSecretResolver {
    async fn get_secret(&self, secret_id: &str) -> Result<HashMap<String, String>, ConnectorError> {
        {
            let cache = self.cache.read().await;
            if let Some(entry) = cache.get(secret_id) {
                if Instant::now() <= entry.expires_at {
                    return Ok(entry.value.clone());
                }
            }
        }

        tracing::debug!(secret_id = %mask_secret_id(secret_id), "fetching secret from cloud secret manager");
        let raw = self.backend.fetch_raw(secret_id).await.map_err(|e| {
            ConnectorError::new(
                "secret-resolver",
                "get_secret",
                ErrorKind::Connectivity,
                log_sanitize::sanitize(&e.to_string()),
            )
            .with_cause(e)
        })?;
        let parsed = Self::parse_raw(&raw);

        let mut cache = self.cache.write().await;
        cache.insert(secret_id.to_string(), CachedSecret { value: parsed.clone(), expires_at: Instant::now() + self.ttl });
        Ok(parsed)
    }
}

/// Deterministic in-memory resolver for tests (spec §4.6).
#[derive(Default)]
pub struct LocalSecretResolver {
    secrets: RwLock<HashMap<String, HashMap<String, String>>>,
}

impl LocalSecretResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_secret(&self, id: &str, value: HashMap<String, String>) {
        self.secrets.write().await.insert(id.to_string(), value);
    }
}

#[async_trait]
impl SecretResolver for LocalSecretResolver {
    async fn get_secret(&self, secret_id: &str) -> Result<HashMap<String, String>, ConnectorError> {
        self.secrets
            .read()
            .await
            .get(secret_id)
            .cloned()
            .ok_or_else(|| ConnectorError::new("secret-resolver", "get_secret", ErrorKind::NotFound, format!("no local secret registered for `{secret_id}`")))
    }
}

/// `SecretBackend` over GCP Secret Manager (spec §4.6's cloud variant).
/// `secret_id` is the fully qualified resource name
/// (`projects/.../secrets/.../versions/latest` or similar); the raw payload
/// bytes are interpreted as UTF-8 and handed to `CloudSecretResolver` for
/// JSON-or-fallback parsing.
#[cfg(feature = "secrets-gcp")]
pub struct GcpSecretManagerBackend {
    client: google_cloud_secretmanager_v1::client::SecretManagerService,
}

#[cfg(feature = "secrets-gcp")]
impl GcpSecretManagerBackend {
    pub async fn new() -> Result<Self, ConnectorError> {
        let client = google_cloud_secretmanager_v1::client::SecretManagerService::builder()
            .build()
            .await
            .map_err(|e| ConnectorError::new("secret-resolver", "connect", ErrorKind::Connectivity, e.to_string()))?;
        Ok(Self { client })
    }
}

#[cfg(feature = "secrets-gcp")]
#[async_trait]
impl SecretBackend for GcpSecretManagerBackend {
    async fn fetch_raw(&self, secret_id: &str) -> Result<String, ConnectorError> {
        let response = self
            .client
            .access_secret_version()
            .set_name(secret_id)
            .send()
            .await
            .map_err(|e| ConnectorError::new("secret-resolver", "fetch_raw", ErrorKind::Connectivity, e.to_string()))?;
        let payload = response.payload.ok_or_else(|| {
            ConnectorError::new("secret-resolver", "fetch_raw", ErrorKind::NotFound, "secret version has no payload")
        })?;
        String::from_utf8(payload.data.to_vec())
            .map_err(|e| ConnectorError::new("secret-resolver", "fetch_raw", ErrorKind::Configuration, e.to_string()))
    }
}

/// Scans the fixed field list into `P_<FIELD>` env vars (spec §4.6).
/// `secret_id` is ignored: the prefix alone determines which variables are
/// read, matching the environment-discovery tier's per-connector naming.
pub struct EnvPrefixSecretResolver {
    prefix: String,
}

impl EnvPrefixSecretResolver {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }
}

#[async_trait]
impl SecretResolver for EnvPrefixSecretResolver {
    async fn get_secret(&self, _secret_id: &str) -> Result<HashMap<String, String>, ConnectorError> {
        let mut found = HashMap::new();
        for field in ENV_FIELDS {
            let var_name = format!("{}_{}", self.prefix, field);
            if let Ok(value) = std::env::var(&var_name) {
                found.insert(field.to_lowercase(), value);
            }
        }
        if found.is_empty() {
            return Err(ConnectorError::new(
                "secret-resolver",
                "get_secret",
                ErrorKind::NotFound,
                format!("no environment variables found for prefix `{}`", self.prefix),
            ));
        }
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    #[test]
    fn mask_secret_id_uses_ellipsis_and_last_8_chars_when_long_enough() {
        assert_eq!(mask_secret_id("arn:aws:secretsmanager:us-east-1:123:secret:foo"), "…cret:foo");
    }

    #[test]
    fn mask_secret_id_uses_stars_when_short() {
        assert_eq!(mask_secret_id("short-id"), "***");
    }

    #[tokio::test]
    async fn local_resolver_returns_registered_secret() {
        let resolver = LocalSecretResolver::new();
        let mut value = HashMap::new();
        value.insert("username".to_string(), "svc".to_string());
        resolver.set_secret("db-creds", value).await;
        let result = resolver.get_secret("db-creds").await.unwrap();
        assert_eq!(result.get("username"), Some(&"svc".to_string()));
    }

    #[tokio::test]
    async fn local_resolver_errors_on_missing_id() {
        let resolver = LocalSecretResolver::new();
        let err = resolver.get_secret("missing").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn env_prefix_resolver_collects_recognised_fields() {
        std::env::set_var("TESTP_USERNAME", "alice");
        std::env::set_var("TESTP_PASSWORD", "hunter2");
        let resolver = EnvPrefixSecretResolver::new("TESTP");
        let result = resolver.get_secret("ignored").await.unwrap();
        assert_eq!(result.get("username"), Some(&"alice".to_string()));
        assert_eq!(result.get("password"), Some(&"hunter2".to_string()));
        std::env::remove_var("TESTP_USERNAME");
        std::env::remove_var("TESTP_PASSWORD");
    }

    #[tokio::test]
    async fn env_prefix_resolver_errors_when_nothing_found() {
        let resolver = EnvPrefixSecretResolver::new("NOPE_PREFIX_XYZ");
        let err = resolver.get_secret("ignored").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
    }

    struct FakeBackend {
        calls: StdMutex<u32>,
        response: String,
    }

    #[async_trait]
    impl SecretBackend for FakeBackend {
        async fn fetch_raw(&self, _secret_id: &str) -> Result<String, ConnectorError> {
            *self.calls.lock().unwrap() += 1;
            Ok(self.response.clone())
        }
    }

    #[tokio::test]
    async fn cloud_resolver_parses_json_object() {
        let backend = Arc::new(FakeBackend { calls: StdMutex::new(0), response: r#"{"username":"svc","password":"p"}"#.to_string() });
        let resolver = CloudSecretResolver::new(backend, Duration::from_secs(60));
        let result = resolver.get_secret("arn:aws:secretsmanager:us-east-1:123:secret:db").await.unwrap();
        assert_eq!(result.get("username"), Some(&"svc".to_string()));
    }

    #[tokio::test]
    async fn cloud_resolver_falls_back_to_raw_value_on_non_object_json() {
        let backend = Arc::new(FakeBackend { calls: StdMutex::new(0), response: "plain-string-secret".to_string() });
        let resolver = CloudSecretResolver::new(backend, Duration::from_secs(60));
        let result = resolver.get_secret("some-secret-id").await.unwrap();
        assert_eq!(result.get("value"), Some(&"plain-string-secret".to_string()));
    }

    #[tokio::test]
    async fn cloud_resolver_caches_and_avoids_second_backend_call() {
        let backend = Arc::new(FakeBackend { calls: StdMutex::new(0), response: r#"{"username":"svc"}"#.to_string() });
        let resolver = CloudSecretResolver::new(backend.clone(), Duration::from_secs(60));
        resolver.get_secret("id-1").await.unwrap();
        resolver.get_secret("id-1").await.unwrap();
        assert_eq!(*backend.calls.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn cloud_resolver_refetches_after_ttl_expiry() {
        let backend = Arc::new(FakeBackend { calls: StdMutex::new(0), response: r#"{"username":"svc"}"#.to_string() });
        let resolver = CloudSecretResolver::new(backend.clone(), Duration::from_millis(10));
        resolver.get_secret("id-1").await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        resolver.get_secret("id-1").await.unwrap();
        assert_eq!(*backend.calls.lock().unwrap(), 2);
    }

    #[tokio::test]
    async fn cloud_resolver_zero_ttl_falls_back_to_default() {
        let backend = Arc::new(FakeBackend { calls: StdMutex::new(0), response: "{}".to_string() });
        let resolver = CloudSecretResolver::new(backend, Duration::ZERO);
        assert_eq!(resolver.ttl, DEFAULT_TTL);
    }
}
