use crate::{Adapter, DbError};
use std::collections::HashMap;
use std::sync::Arc;

/// Hints for recognizing a backend inside a Docker container listing.
#[derive(Debug, Clone, Default)]
pub struct DockerHints {
    /// Image name substrings that identify this backend (e.g. "postgres").
    pub image_patterns: Vec<String>,
    /// Container env vars that carry connection fields, mapped to the field
    /// they populate: `username`, `password`, or `database`.
    pub env_fields: Vec<(String, String)>,
    pub default_username: Option<String>,
    pub default_database: Option<String>,
}

/// Static descriptor for one backend: display metadata, capability flags,
/// URL schemes, and Docker detection hints.
#[derive(Debug, Clone)]
pub struct ProviderSpec {
    pub db_type: String,
    pub display_name: String,
    pub badge_label: String,
    pub default_port: Option<u16>,
    pub url_schemes: Vec<String>,
    pub supports_ssh: bool,
    pub is_file_based: bool,
    pub has_advanced_auth: bool,
    pub requires_auth: bool,
    pub supports_multiple_databases: bool,
    pub docker: Option<DockerHints>,
}

impl ProviderSpec {
    pub fn new(db_type: impl Into<String>, display_name: impl Into<String>) -> Self {
        let display_name = display_name.into();
        Self {
            db_type: db_type.into(),
            badge_label: display_name.clone(),
            display_name,
            default_port: None,
            url_schemes: Vec::new(),
            supports_ssh: false,
            is_file_based: false,
            has_advanced_auth: false,
            requires_auth: true,
            supports_multiple_databases: true,
            docker: None,
        }
    }
}

/// A registered backend: its spec plus the adapter that serves it.
pub struct Provider {
    pub spec: ProviderSpec,
    pub adapter: Arc<dyn Adapter>,
}

/// Maps `db_type` keys and URL schemes to providers.
///
/// Constructed once at startup by `squill_providers::register_all()` and
/// passed explicitly to everything that needs a lookup; there is no ambient
/// global.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<Provider>>,
    schemes: HashMap<String, String>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider. Re-registering the same `db_type` replaces the
    /// previous entry (used by tests to install doubles).
    pub fn register(&mut self, spec: ProviderSpec, adapter: Arc<dyn Adapter>) {
        if let Some(previous) = self.providers.remove(&spec.db_type) {
            for scheme in &previous.spec.url_schemes {
                self.schemes.remove(&scheme.to_lowercase());
            }
        }

        for scheme in &spec.url_schemes {
            self.schemes
                .insert(scheme.to_lowercase(), spec.db_type.clone());
        }

        let db_type = spec.db_type.clone();
        self.providers
            .insert(db_type, Arc::new(Provider { spec, adapter }));
    }

    pub fn get(&self, db_type: &str) -> Result<Arc<Provider>, DbError> {
        self.providers
            .get(db_type)
            .cloned()
            .ok_or_else(|| DbError::UnknownProvider(db_type.to_string()))
    }

    /// Resolve a URL scheme to its `db_type`. Case-insensitive; `None` on
    /// miss (never an error).
    pub fn get_by_scheme(&self, scheme: &str) -> Option<&str> {
        self.schemes.get(&scheme.to_lowercase()).map(String::as_str)
    }

    pub fn supported_db_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.providers.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }

    /// All declared URL schemes mapped to their `db_type`.
    pub fn url_scheme_map(&self) -> &HashMap<String, String> {
        &self.schemes
    }

    pub fn providers(&self) -> impl Iterator<Item = &Arc<Provider>> {
        self.providers.values()
    }

    // Display/metadata accessors route through the provider so callers never
    // reach into specs they did not look up themselves.

    pub fn display_name(&self, db_type: &str) -> Result<String, DbError> {
        Ok(self.get(db_type)?.spec.display_name.clone())
    }

    pub fn badge_label(&self, db_type: &str) -> Result<String, DbError> {
        Ok(self.get(db_type)?.spec.badge_label.clone())
    }

    pub fn default_port(&self, db_type: &str) -> Result<Option<u16>, DbError> {
        Ok(self.get(db_type)?.spec.default_port)
    }

    pub fn is_file_based(&self, db_type: &str) -> Result<bool, DbError> {
        Ok(self.get(db_type)?.spec.is_file_based)
    }

    pub fn supports_ssh(&self, db_type: &str) -> Result<bool, DbError> {
        Ok(self.get(db_type)?.spec.supports_ssh)
    }

    pub fn requires_auth(&self, db_type: &str) -> Result<bool, DbError> {
        Ok(self.get(db_type)?.spec.requires_auth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ColumnInfo, ConnectionConfig, DriverConnection, ObjectRef};

    struct StubAdapter(String);

    impl Adapter for StubAdapter {
        fn db_type(&self) -> &str {
            &self.0
        }

        fn connect(
            &self,
            _config: &ConnectionConfig,
        ) -> Result<Box<dyn DriverConnection>, DbError> {
            Err(DbError::query_failed("stub"))
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

    fn spec(db_type: &str, schemes: &[&str]) -> ProviderSpec {
        let mut spec = ProviderSpec::new(db_type, db_type.to_uppercase());
        spec.url_schemes = schemes.iter().map(|s| s.to_string()).collect();
        spec
    }

    #[test]
    fn unknown_provider_is_an_error() {
        let registry = ProviderRegistry::new();
        assert!(matches!(
            registry.get("nope"),
            Err(DbError::UnknownProvider(_))
        ));
    }

    #[test]
    fn scheme_lookup_is_case_insensitive_and_total() {
        let mut registry = ProviderRegistry::new();
        registry.register(
            spec("postgresql", &["postgres", "postgresql"]),
            Arc::new(StubAdapter("postgresql".into())),
        );

        assert_eq!(registry.get_by_scheme("POSTGRES"), Some("postgresql"));
        assert_eq!(registry.get_by_scheme("mysql"), None);
    }

    #[test]
    fn reregistering_replaces_spec_and_schemes() {
        let mut registry = ProviderRegistry::new();
        registry.register(
            spec("sqlite", &["sqlite", "sqlite3"]),
            Arc::new(StubAdapter("sqlite".into())),
        );
        registry.register(
            spec("sqlite", &["sqlite"]),
            Arc::new(StubAdapter("sqlite".into())),
        );

        assert_eq!(registry.supported_db_types(), vec!["sqlite"]);
        // The old scheme was dropped with the replaced spec.
        assert_eq!(registry.get_by_scheme("sqlite3"), None);
        assert_eq!(registry.get_by_scheme("sqlite"), Some("sqlite"));
    }
}
