//! Health registry behind `GET /ping/alive`.
//!
//! A service registers one or more systems, each with a list of probes. A
//! system is healthy when all of its probes pass; the service is healthy
//! when all of its systems are.

use std::time::Duration;

use simflow_db::JobRepository;
use simflow_types::{HealthStatus, ProbeStatus, SystemStatus};

/// Timeout applied to probes that call another service.
const HTTP_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// One check.
#[derive(Debug, Clone)]
pub enum Probe {
    /// The job store answers a trivial query.
    Database(JobRepository),
    /// `GET {url}` returns a 2xx status.
    Http {
        /// URL to fetch.
        url: String,
        /// Shared client.
        client: reqwest::Client,
    },
}

impl Probe {
    /// Probe `url` with a short-timeout client.
    pub fn http(url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(HTTP_PROBE_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self::Http {
            url: url.into(),
            client,
        }
    }

    const fn name(&self) -> &'static str {
        match self {
            Self::Database(_) => "database",
            Self::Http { .. } => "http",
        }
    }

    async fn check(&self) -> ProbeStatus {
        let outcome = match self {
            Self::Database(repo) => repo.ping().await.map_err(|e| e.to_string()),
            Self::Http { url, client } => match client.get(url).send().await {
                Ok(resp) if resp.status().is_success() => Ok(()),
                Ok(resp) => Err(format!("{url} returned {}", resp.status())),
                Err(e) => Err(format!("{url} unreachable: {e}")),
            },
        };
        ProbeStatus {
            name: self.name().to_owned(),
            healthy: outcome.is_ok(),
            message: outcome.err(),
        }
    }
}

#[derive(Debug, Clone)]
struct System {
    name: String,
    probes: Vec<Probe>,
}

/// Systems and their probes for one service.
#[derive(Debug, Clone, Default)]
pub struct HealthRegistry {
    systems: Vec<System>,
}

impl HealthRegistry {
    /// An empty registry; reports healthy.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a system with its probes.
    #[must_use]
    pub fn with_system(mut self, name: impl Into<String>, probes: Vec<Probe>) -> Self {
        self.systems.push(System {
            name: name.into(),
            probes,
        });
        self
    }

    /// Run every probe and fold the results.
    pub async fn check(&self) -> HealthStatus {
        let mut systems = Vec::with_capacity(self.systems.len());
        for system in &self.systems {
            let mut detail = Vec::with_capacity(system.probes.len());
            for probe in &system.probes {
                detail.push(probe.check().await);
            }
            systems.push(SystemStatus {
                name: system.name.clone(),
                healthy: detail.iter().all(|p| p.healthy),
                detail,
            });
        }
        HealthStatus {
            healthy: systems.iter().all(|s| s.healthy),
            systems,
        }
    }
}

#[cfg(test)]
#[allow(clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_registry_is_healthy() {
        let status = HealthRegistry::new().check().await;
        assert!(status.healthy);
        assert!(status.systems.is_empty());
    }

    #[tokio::test]
    async fn memory_database_probe_passes() {
        let registry = HealthRegistry::new()
            .with_system("store", vec![Probe::Database(JobRepository::memory())]);
        let status = registry.check().await;
        assert!(status.healthy);
        assert_eq!(status.systems[0].detail[0].name, "database");
    }

    #[tokio::test]
    async fn one_failing_probe_fails_the_service() {
        let registry = HealthRegistry::new()
            .with_system("store", vec![Probe::Database(JobRepository::memory())])
            .with_system("model", vec![Probe::http("http://127.0.0.1:1/ping/started")]);
        let status = registry.check().await;
        assert!(!status.healthy);
        assert!(status.systems[0].healthy);
        assert!(!status.systems[1].healthy);
        assert!(status.systems[1].detail[0].message.is_some());
    }
}
