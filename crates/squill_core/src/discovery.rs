use crate::{ConnectionConfig, Endpoint, ProviderRegistry};
use log::warn;
use std::collections::HashMap;

/// State of the local Docker daemon as seen by the inspector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DockerStatus {
    Available,
    NotInstalled,
    NotRunning,
    NotAccessible,
}

/// A running container reported by the Docker inspector.
#[derive(Debug, Clone)]
pub struct DetectedContainer {
    pub name: String,
    pub image: String,
    pub host: String,
    pub port: Option<u16>,
    pub env: HashMap<String, String>,
}

/// Result of one discovery source.
///
/// Sources are independent: a failing source reports `Failed` and never
/// prevents the others from contributing.
#[derive(Debug, Clone)]
pub enum ProviderState {
    Loading,
    Ready(Vec<ConnectionConfig>),
    Failed(String),
}

/// An async producer of connection candidates (a cloud provider, the Docker
/// inspector, a static file). Concrete implementations live outside the
/// core; the ingestion only consumes their output.
pub trait DiscoverySource: Send + Sync {
    fn name(&self) -> &str;
    fn discover(&self) -> ProviderState;
}

/// A candidate connection with its origin, deduplicated against saved
/// configs.
#[derive(Debug, Clone)]
pub struct ConnectionCandidate {
    pub config: ConnectionConfig,
    pub source: String,
    /// Set when the candidate matches an already-saved connection.
    pub matches_saved: Option<String>,
}

/// Turns discovery output into deduplicated `ConnectionConfig` candidates.
pub struct DiscoveryIngestion<'a> {
    registry: &'a ProviderRegistry,
}

impl<'a> DiscoveryIngestion<'a> {
    pub fn new(registry: &'a ProviderRegistry) -> Self {
        Self { registry }
    }

    /// Map a detected container to a config using the provider Docker hints.
    ///
    /// Returns `None` when no registered provider claims the image.
    pub fn config_from_container(&self, container: &DetectedContainer) -> Option<ConnectionConfig> {
        let provider = self.registry.providers().find(|p| {
            p.spec
                .docker
                .as_ref()
                .is_some_and(|hints| hints.image_patterns.iter().any(|pat| container.image.contains(pat.as_str())))
        })?;

        let hints = provider.spec.docker.as_ref()?;

        let mut username = hints.default_username.clone();
        let mut password = None;
        let mut database = hints.default_database.clone();

        for (var, field) in &hints.env_fields {
            let Some(value) = container.env.get(var) else {
                continue;
            };
            match field.as_str() {
                "username" => username = Some(value.clone()),
                "password" => password = Some(value.clone()),
                "database" => database = Some(value.clone()),
                other => warn!("unknown docker env field mapping: {}", other),
            }
        }

        let port = container.port.or(provider.spec.default_port);

        Some(ConnectionConfig::new(
            container.name.clone(),
            provider.spec.db_type.clone(),
            Endpoint::Tcp {
                host: container.host.clone(),
                port,
                database,
                username,
                password,
            },
        ))
    }

    /// Dedup rule: a candidate matches a saved connection when the names
    /// match, or when the `db_type` matches, the saved host is local (or the
    /// candidate's own host), the ports agree, and the databases agree (a
    /// candidate without a database matches any).
    pub fn matches_saved(candidate: &ConnectionConfig, saved: &ConnectionConfig) -> bool {
        if candidate.name == saved.name {
            return true;
        }

        if candidate.db_type != saved.db_type {
            return false;
        }

        let (Endpoint::Tcp { .. }, Endpoint::Tcp { .. }) = (&candidate.endpoint, &saved.endpoint)
        else {
            return false;
        };

        let saved_host = saved.endpoint.host().unwrap_or_default();
        let candidate_host = candidate.endpoint.host().unwrap_or_default();
        let host_matches = matches!(saved_host, "localhost" | "127.0.0.1") || saved_host == candidate_host;

        let port_matches = saved.endpoint.port() == candidate.endpoint.port();

        let database_matches = match candidate.endpoint.database() {
            None => true,
            Some(db) => saved.endpoint.database() == Some(db),
        };

        host_matches && port_matches && database_matches
    }

    /// Fold the Docker inspector's report into a source state: containers
    /// map through the provider hints, and a daemon problem becomes a
    /// failed (never fatal) source.
    pub fn docker_state(
        &self,
        status: DockerStatus,
        containers: &[DetectedContainer],
    ) -> ProviderState {
        match status {
            DockerStatus::Available => ProviderState::Ready(
                containers
                    .iter()
                    .filter_map(|c| self.config_from_container(c))
                    .collect(),
            ),
            DockerStatus::NotInstalled => {
                ProviderState::Failed("Docker is not installed".to_string())
            }
            DockerStatus::NotRunning => ProviderState::Failed("Docker is not running".to_string()),
            DockerStatus::NotAccessible => {
                ProviderState::Failed("Docker daemon is not accessible".to_string())
            }
        }
    }

    /// Gather candidates from every source, tagging matches against the
    /// saved connections. Failed sources contribute their error state only.
    pub fn ingest(
        &self,
        sources: &[&dyn DiscoverySource],
        saved: &[ConnectionConfig],
    ) -> (Vec<ConnectionCandidate>, Vec<(String, String)>) {
        let mut candidates = Vec::new();
        let mut failures = Vec::new();

        for source in sources {
            match source.discover() {
                ProviderState::Ready(configs) => {
                    for config in configs {
                        let matches_saved = saved
                            .iter()
                            .find(|s| Self::matches_saved(&config, s))
                            .map(|s| s.name.clone());
                        candidates.push(ConnectionCandidate {
                            config,
                            source: source.name().to_string(),
                            matches_saved,
                        });
                    }
                }
                ProviderState::Failed(message) => {
                    warn!("discovery source {} failed: {}", source.name(), message);
                    failures.push((source.name().to_string(), message));
                }
                ProviderState::Loading => {}
            }
        }

        (candidates, failures)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{DockerHints, ProviderSpec};
    use crate::{Adapter, ColumnInfo, DbError, DriverConnection, ObjectRef};
    use std::sync::Arc;

    struct NullAdapter;

    impl Adapter for NullAdapter {
        fn db_type(&self) -> &str {
            "postgresql"
        }

        fn connect(
            &self,
            _config: &ConnectionConfig,
        ) -> Result<Box<dyn DriverConnection>, DbError> {
            Err(DbError::query_failed("not used"))
        }

        fn list_tables(
            &self,
            _conn: &dyn DriverConnection,
            _database: Option<&str>,
        ) -> Result<Vec<ObjectRef>, DbError> {
            Ok(Vec::new())
        }

        fn list_columns(
            &self,
            _conn: &dyn DriverConnection,
            _database: Option<&str>,
            _schema: Option<&str>,
            _table: &str,
        ) -> Result<Vec<ColumnInfo>, DbError> {
            Ok(Vec::new())
        }
    }

    fn registry_with_postgres() -> ProviderRegistry {
        let mut registry = ProviderRegistry::new();
        let mut spec = ProviderSpec::new("postgresql", "PostgreSQL");
        spec.default_port = Some(5432);
        spec.docker = Some(DockerHints {
            image_patterns: vec!["postgres".into()],
            env_fields: vec![
                ("POSTGRES_USER".into(), "username".into()),
                ("POSTGRES_PASSWORD".into(), "password".into()),
                ("POSTGRES_DB".into(), "database".into()),
            ],
            default_username: Some("postgres".into()),
            default_database: Some("postgres".into()),
        });
        registry.register(spec, Arc::new(NullAdapter));
        registry
    }

    fn container() -> DetectedContainer {
        DetectedContainer {
            name: "shop-db".into(),
            image: "postgres:16".into(),
            host: "localhost".into(),
            port: Some(5433),
            env: HashMap::from([
                ("POSTGRES_USER".to_string(), "shop".to_string()),
                ("POSTGRES_DB".to_string(), "shop".to_string()),
            ]),
        }
    }

    #[test]
    fn container_maps_through_docker_hints() {
        let registry = registry_with_postgres();
        let ingestion = DiscoveryIngestion::new(&registry);

        let config = ingestion.config_from_container(&container()).unwrap();
        assert_eq!(config.db_type, "postgresql");
        assert_eq!(config.endpoint.port(), Some(5433));
        assert_eq!(config.endpoint.database(), Some("shop"));
        if let Endpoint::Tcp { username, .. } = &config.endpoint {
            assert_eq!(username.as_deref(), Some("shop"));
        }
    }

    #[test]
    fn unclaimed_image_is_skipped() {
        let registry = registry_with_postgres();
        let ingestion = DiscoveryIngestion::new(&registry);

        let mut c = container();
        c.image = "nginx:latest".into();
        assert!(ingestion.config_from_container(&c).is_none());
    }

    #[test]
    fn dedup_by_name_wins() {
        let registry = registry_with_postgres();
        let ingestion = DiscoveryIngestion::new(&registry);
        let candidate = ingestion.config_from_container(&container()).unwrap();

        let saved = ConnectionConfig::new(
            "shop-db",
            "mysql",
            Endpoint::tcp("elsewhere", 3306),
        );
        assert!(DiscoveryIngestion::matches_saved(&candidate, &saved));
    }

    #[test]
    fn dedup_by_endpoint() {
        let registry = registry_with_postgres();
        let ingestion = DiscoveryIngestion::new(&registry);
        let candidate = ingestion.config_from_container(&container()).unwrap();

        let saved = ConnectionConfig::new(
            "prod-copy",
            "postgresql",
            Endpoint::Tcp {
                host: "127.0.0.1".into(),
                port: Some(5433),
                database: Some("shop".into()),
                username: None,
                password: None,
            },
        );
        assert!(DiscoveryIngestion::matches_saved(&candidate, &saved));

        let other_port = ConnectionConfig::new(
            "prod-copy",
            "postgresql",
            Endpoint::Tcp {
                host: "127.0.0.1".into(),
                port: Some(5432),
                database: Some("shop".into()),
                username: None,
                password: None,
            },
        );
        // Name differs and port differs: no match.
        let mut renamed = other_port;
        renamed.name = "not-shop".into();
        assert!(!DiscoveryIngestion::matches_saved(&candidate, &renamed));
    }

    #[test]
    fn docker_state_folds_status_and_containers() {
        let registry = registry_with_postgres();
        let ingestion = DiscoveryIngestion::new(&registry);

        match ingestion.docker_state(DockerStatus::Available, &[container()]) {
            ProviderState::Ready(configs) => assert_eq!(configs.len(), 1),
            other => panic!("unexpected state: {:?}", other),
        }

        assert!(matches!(
            ingestion.docker_state(DockerStatus::NotRunning, &[]),
            ProviderState::Failed(_)
        ));
    }

    struct FixedSource(&'static str, ProviderState);

    impl DiscoverySource for FixedSource {
        fn name(&self) -> &str {
            self.0
        }

        fn discover(&self) -> ProviderState {
            self.1.clone()
        }
    }

    #[test]
    fn failing_source_does_not_block_others() {
        let registry = registry_with_postgres();
        let ingestion = DiscoveryIngestion::new(&registry);
        let candidate = ingestion.config_from_container(&container()).unwrap();

        let good = FixedSource("docker", ProviderState::Ready(vec![candidate]));
        let bad = FixedSource("aws", ProviderState::Failed("credentials expired".into()));

        let (candidates, failures) = ingestion.ingest(&[&bad, &good], &[]);
        assert_eq!(candidates.len(), 1);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, "aws");
    }
}
