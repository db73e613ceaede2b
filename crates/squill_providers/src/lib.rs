//! One `ProviderSpec` and adapter per supported backend, and the explicit
//! `register_all` called at startup. There is no side-effectful
//! registration: the registry a caller gets is exactly what this module
//! built.

mod generic;
mod mysql;
mod postgres;
mod sqlite;
mod sqlserver;
mod util;

pub use generic::{GenericSqlAdapter, QuoteStyle};
pub use mysql::MySqlAdapter;
pub use postgres::PostgresAdapter;
pub use sqlite::SqliteAdapter;
pub use sqlserver::{AzureSqlAdapter, SqlServerAdapter};

use squill_core::{Adapter, DockerHints, ProviderRegistry, ProviderSpec};
use std::sync::Arc;

fn spec(
    db_type: &str,
    display_name: &str,
    badge: &str,
    schemes: &[&str],
) -> ProviderSpec {
    let mut spec = ProviderSpec::new(db_type, display_name);
    spec.badge_label = badge.to_string();
    spec.url_schemes = schemes.iter().map(|s| s.to_string()).collect();
    spec
}

fn docker(
    image_patterns: &[&str],
    env_fields: &[(&str, &str)],
    default_username: Option<&str>,
    default_database: Option<&str>,
) -> DockerHints {
    DockerHints {
        image_patterns: image_patterns.iter().map(|s| s.to_string()).collect(),
        env_fields: env_fields
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        default_username: default_username.map(String::from),
        default_database: default_database.map(String::from),
    }
}

/// Build the full provider registry.
pub fn register_all(registry: &mut ProviderRegistry) {
    // PostgreSQL wire family.
    let mut postgresql = spec("postgresql", "PostgreSQL", "PG", &["postgres", "postgresql"]);
    postgresql.default_port = Some(5432);
    postgresql.supports_ssh = true;
    postgresql.docker = Some(docker(
        &["postgres", "postgis"],
        &[
            ("POSTGRES_USER", "username"),
            ("POSTGRES_PASSWORD", "password"),
            ("POSTGRES_DB", "database"),
        ],
        Some("postgres"),
        Some("postgres"),
    ));
    registry.register(postgresql, adapter(PostgresAdapter::postgresql()));

    let mut cockroachdb = spec("cockroachdb", "CockroachDB", "CRDB", &["cockroachdb", "cockroach"]);
    cockroachdb.default_port = Some(26257);
    cockroachdb.supports_ssh = true;
    cockroachdb.docker = Some(docker(
        &["cockroachdb/cockroach"],
        &[("COCKROACH_USER", "username"), ("COCKROACH_DATABASE", "database")],
        Some("root"),
        Some("defaultdb"),
    ));
    registry.register(cockroachdb, adapter(PostgresAdapter::cockroachdb()));

    let mut redshift = spec("redshift", "Redshift", "RS", &["redshift"]);
    redshift.default_port = Some(5439);
    redshift.supports_ssh = true;
    registry.register(redshift, adapter(PostgresAdapter::redshift()));

    let mut supabase = spec("supabase", "Supabase", "SB", &["supabase"]);
    supabase.default_port = Some(5432);
    supabase.has_advanced_auth = true;
    registry.register(supabase, adapter(PostgresAdapter::supabase()));

    // SQL Server and its cloud variant.
    let mut mssql = spec("mssql", "SQL Server", "MSSQL", &["mssql", "sqlserver"]);
    mssql.default_port = Some(1433);
    mssql.supports_ssh = true;
    mssql.docker = Some(docker(
        &["mcr.microsoft.com/mssql/server"],
        &[("SA_PASSWORD", "password"), ("MSSQL_SA_PASSWORD", "password")],
        Some("sa"),
        Some("master"),
    ));
    registry.register(mssql, adapter(SqlServerAdapter::new()));

    let mut azuresql = spec("azuresql", "Azure SQL", "Azure", &["azuresql", "azure"]);
    azuresql.default_port = Some(1433);
    azuresql.supports_multiple_databases = false;
    azuresql.docker = Some(docker(
        &["mcr.microsoft.com/azure-sql-edge"],
        &[("MSSQL_SA_PASSWORD", "password")],
        Some("sa"),
        None,
    ));
    registry.register(azuresql, adapter(AzureSqlAdapter::new()));

    // MySQL.
    let mut mysql_spec = spec("mysql", "MySQL", "MySQL", &["mysql"]);
    mysql_spec.default_port = Some(3306);
    mysql_spec.supports_ssh = true;
    mysql_spec.docker = Some(docker(
        &["mysql", "mariadb"],
        &[
            ("MYSQL_USER", "username"),
            ("MYSQL_PASSWORD", "password"),
            ("MYSQL_DATABASE", "database"),
        ],
        Some("root"),
        None,
    ));
    registry.register(mysql_spec, adapter(MySqlAdapter::new()));

    // File-based engines.
    let mut sqlite = spec("sqlite", "SQLite", "SQLite", &["sqlite", "sqlite3"]);
    sqlite.is_file_based = true;
    sqlite.requires_auth = false;
    sqlite.supports_multiple_databases = false;
    registry.register(sqlite, adapter(SqliteAdapter::new()));

    let mut duckdb = spec("duckdb", "DuckDB", "Duck", &["duckdb"]);
    duckdb.is_file_based = true;
    duckdb.requires_auth = false;
    duckdb.supports_multiple_databases = false;
    registry.register(duckdb, adapter(GenericSqlAdapter::duckdb()));

    // Analytic and cloud backends.
    let mut clickhouse = spec("clickhouse", "ClickHouse", "CH", &["clickhouse"]);
    clickhouse.default_port = Some(9000);
    clickhouse.supports_ssh = true;
    clickhouse.docker = Some(docker(
        &["clickhouse/clickhouse-server", "yandex/clickhouse-server"],
        &[
            ("CLICKHOUSE_USER", "username"),
            ("CLICKHOUSE_PASSWORD", "password"),
            ("CLICKHOUSE_DB", "database"),
        ],
        Some("default"),
        Some("default"),
    ));
    registry.register(clickhouse, adapter(GenericSqlAdapter::clickhouse()));

    let mut snowflake = spec("snowflake", "Snowflake", "SF", &["snowflake"]);
    snowflake.has_advanced_auth = true;
    registry.register(snowflake, adapter(GenericSqlAdapter::snowflake()));

    let mut bigquery = spec("bigquery", "BigQuery", "BQ", &["bigquery"]);
    bigquery.has_advanced_auth = true;
    bigquery.requires_auth = false;
    registry.register(bigquery, adapter(GenericSqlAdapter::bigquery()));

    let mut athena = spec("athena", "Athena", "Athena", &["athena"]);
    athena.has_advanced_auth = true;
    registry.register(athena, adapter(GenericSqlAdapter::athena()));

    let mut turso = spec("turso", "Turso", "Turso", &["turso", "libsql"]);
    turso.has_advanced_auth = true;
    turso.supports_multiple_databases = false;
    registry.register(turso, adapter(GenericSqlAdapter::turso()));
}

fn adapter(adapter: impl Adapter + 'static) -> Arc<dyn Adapter> {
    Arc::new(adapter)
}

/// Convenience: a fully-populated registry.
pub fn default_registry() -> ProviderRegistry {
    let mut registry = ProviderRegistry::new();
    register_all(&mut registry);
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn all_backends_register() {
        let registry = default_registry();
        for db_type in [
            "postgresql",
            "cockroachdb",
            "redshift",
            "supabase",
            "mssql",
            "azuresql",
            "mysql",
            "sqlite",
            "duckdb",
            "clickhouse",
            "snowflake",
            "bigquery",
            "athena",
            "turso",
        ] {
            let provider = registry.get(db_type).unwrap();
            assert_eq!(provider.spec.db_type, db_type);
            assert_eq!(provider.adapter.db_type(), db_type);
        }
    }

    #[test]
    fn db_types_are_unique_and_schemes_disjoint() {
        let registry = default_registry();

        let types = registry.supported_db_types();
        let unique: HashSet<&str> = types.iter().copied().collect();
        assert_eq!(types.len(), unique.len());

        // The registry stores schemes in one map, so a collision between
        // providers would have silently dropped an entry; count them.
        let scheme_count: usize = registry
            .providers()
            .map(|p| p.spec.url_schemes.len())
            .sum();
        assert_eq!(registry.url_scheme_map().len(), scheme_count);
    }

    #[test]
    fn scheme_resolution() {
        let registry = default_registry();
        assert_eq!(registry.get_by_scheme("postgres"), Some("postgresql"));
        assert_eq!(registry.get_by_scheme("SQLSERVER"), Some("mssql"));
        assert_eq!(registry.get_by_scheme("libsql"), Some("turso"));
        assert_eq!(registry.get_by_scheme("mongodb"), None);
    }

    #[test]
    fn file_based_flags() {
        let registry = default_registry();
        assert!(registry.is_file_based("sqlite").unwrap());
        assert!(registry.is_file_based("duckdb").unwrap());
        assert!(!registry.is_file_based("postgresql").unwrap());
    }
}
