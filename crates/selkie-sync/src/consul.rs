//! Consul agent adapter
//!
//! Implements [`ServiceAgent`] against the Consul agent HTTP API.
//! Transport failures and 5xx responses are classified recoverable;
//! 4xx responses mean the agent rejected the definition itself.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use selkie_core::config::AgentConfig;

use crate::agent::ServiceAgent;
use crate::error::{SyncError, SyncResult};
use crate::ids::{CheckId, ServiceId};
use crate::service::{CheckDescriptor, CheckKind, ServiceDescriptor};

/// HTTP adapter for a Consul-compatible discovery agent
#[derive(Debug, Clone)]
pub struct ConsulAgent {
    base_url: String,
    client: reqwest::Client,
}

impl ConsulAgent {
    /// Create an adapter for the agent at `config.address`
    pub fn new(config: &AgentConfig) -> SyncResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| SyncError::agent_unreachable(e.to_string()))?;

        let base_url = if config.address.starts_with("http://") || config.address.starts_with("https://") {
            config.address.trim_end_matches('/').to_string()
        } else {
            format!("http://{}", config.address)
        };

        Ok(Self { base_url, client })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn transport_error(e: reqwest::Error) -> SyncError {
        if e.is_timeout() {
            SyncError::AgentTimeout {
                reason: e.to_string(),
            }
        } else {
            SyncError::agent_unreachable(e.to_string())
        }
    }

    async fn classify_response(id: &ServiceId, response: reqwest::Response) -> SyncResult<()> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        if status.is_client_error() {
            Err(SyncError::definition_rejected(
                id.as_str(),
                format!("{}: {}", status, body),
            ))
        } else {
            Err(SyncError::AgentFailed {
                id: id.to_string(),
                reason: format!("{}: {}", status, body),
            })
        }
    }
}

#[async_trait]
impl ServiceAgent for ConsulAgent {
    async fn list_services(&self) -> SyncResult<HashMap<ServiceId, ServiceDescriptor>> {
        let response = self
            .client
            .get(self.url("/v1/agent/services"))
            .send()
            .await
            .map_err(Self::transport_error)?;

        if !response.status().is_success() {
            return Err(SyncError::agent_unreachable(format!(
                "service listing failed: {}",
                response.status()
            )));
        }

        let services: HashMap<String, AgentService> = response
            .json()
            .await
            .map_err(|e| SyncError::agent_unreachable(e.to_string()))?;

        Ok(services
            .into_iter()
            .map(|(id, s)| {
                let mut tags = s.tags.unwrap_or_default();
                tags.sort();
                (
                    ServiceId::from_raw(id),
                    ServiceDescriptor {
                        name: s.service,
                        tags,
                        address: s.address,
                        port: s.port,
                    },
                )
            })
            .collect())
    }

    async fn list_checks(&self) -> SyncResult<HashMap<CheckId, CheckDescriptor>> {
        let response = self
            .client
            .get(self.url("/v1/agent/checks"))
            .send()
            .await
            .map_err(Self::transport_error)?;

        if !response.status().is_success() {
            return Err(SyncError::agent_unreachable(format!(
                "check listing failed: {}",
                response.status()
            )));
        }

        let checks: HashMap<String, AgentCheck> = response
            .json()
            .await
            .map_err(|e| SyncError::agent_unreachable(e.to_string()))?;

        // The listing does not echo back probe parameters; only identity
        // matters here since reconciliation compares ID sets and local
        // fingerprints.
        Ok(checks
            .into_iter()
            .map(|(id, c)| {
                (
                    CheckId::from_raw(id),
                    CheckDescriptor {
                        name: c.name,
                        service_id: ServiceId::from_raw(c.service_id),
                        kind: CheckKind::Tcp,
                        interval_ms: 0,
                        timeout_ms: 0,
                    },
                )
            })
            .collect())
    }

    async fn register(
        &self,
        id: &ServiceId,
        service: &ServiceDescriptor,
        checks: &[(CheckId, CheckDescriptor)],
    ) -> SyncResult<()> {
        let payload = ServiceRegistration {
            id: id.to_string(),
            name: service.name.clone(),
            tags: service.tags.clone(),
            address: service.address.clone(),
            port: service.port,
            checks: checks
                .iter()
                .map(|(check_id, check)| CheckRegistration::build(check_id, check, service))
                .collect(),
        };

        let response = self
            .client
            .put(self.url("/v1/agent/service/register"))
            .json(&payload)
            .send()
            .await
            .map_err(Self::transport_error)?;

        Self::classify_response(id, response).await
    }

    async fn deregister(&self, id: &ServiceId) -> SyncResult<()> {
        let response = self
            .client
            .put(self.url(&format!("/v1/agent/service/deregister/{}", id)))
            .send()
            .await
            .map_err(Self::transport_error)?;

        Self::classify_response(id, response).await
    }
}

// Wire types for the Consul agent API.

#[derive(Debug, Deserialize)]
struct AgentService {
    #[serde(rename = "Service")]
    service: String,
    #[serde(rename = "Tags")]
    tags: Option<Vec<String>>,
    #[serde(rename = "Address", default)]
    address: String,
    #[serde(rename = "Port", default)]
    port: u16,
}

#[derive(Debug, Deserialize)]
struct AgentCheck {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "ServiceID", default)]
    service_id: String,
}

#[derive(Debug, Serialize)]
struct ServiceRegistration {
    #[serde(rename = "ID")]
    id: String,
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Tags")]
    tags: Vec<String>,
    #[serde(rename = "Address")]
    address: String,
    #[serde(rename = "Port")]
    port: u16,
    #[serde(rename = "Checks")]
    checks: Vec<CheckRegistration>,
}

#[derive(Debug, Serialize)]
struct CheckRegistration {
    #[serde(rename = "CheckID")]
    check_id: String,
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "TCP", skip_serializing_if = "Option::is_none")]
    tcp: Option<String>,
    #[serde(rename = "HTTP", skip_serializing_if = "Option::is_none")]
    http: Option<String>,
    #[serde(rename = "Args", skip_serializing_if = "Option::is_none")]
    args: Option<Vec<String>>,
    #[serde(rename = "Interval")]
    interval: String,
    #[serde(rename = "Timeout")]
    timeout: String,
}

impl CheckRegistration {
    fn build(check_id: &CheckId, check: &CheckDescriptor, service: &ServiceDescriptor) -> Self {
        let (tcp, http, args) = match &check.kind {
            CheckKind::Tcp => (
                Some(format!("{}:{}", service.address, service.port)),
                None,
                None,
            ),
            CheckKind::Http { path } => (
                None,
                Some(format!("http://{}:{}{}", service.address, service.port, path)),
                None,
            ),
            CheckKind::Script { command, args } => {
                let mut full = vec![command.clone()];
                full.extend(args.iter().cloned());
                (None, None, Some(full))
            }
        };

        Self {
            check_id: check_id.to_string(),
            name: check.name.clone(),
            tcp,
            http,
            args,
            interval: format!("{}ms", check.interval_ms),
            timeout: format!("{}ms", check.timeout_ms),
        }
    }
}
