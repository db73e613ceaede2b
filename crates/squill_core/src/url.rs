use crate::{ConnectionConfig, DbError, Endpoint, ProviderRegistry};
use indexmap::IndexMap;
use std::path::PathBuf;

/// Parse a connection URL into a `ConnectionConfig`.
///
/// The scheme resolves the provider through the registry; unknown schemes
/// fail with `UnknownScheme`. Percent-encoded credentials are decoded and
/// query-string pairs land in the config's options map.
pub fn parse_connection_url(
    registry: &ProviderRegistry,
    url: &str,
) -> Result<ConnectionConfig, DbError> {
    let (scheme, rest) = url
        .split_once("://")
        .ok_or_else(|| DbError::UnknownScheme(url.to_string()))?;

    let db_type = registry
        .get_by_scheme(scheme)
        .ok_or_else(|| DbError::UnknownScheme(scheme.to_string()))?
        .to_string();

    let file_based = registry.is_file_based(&db_type)?;

    let (body, query) = match rest.split_once('?') {
        Some((body, query)) => (body, Some(query)),
        None => (rest, None),
    };

    let mut options = IndexMap::new();
    if let Some(query) = query {
        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            options.insert(decode(key)?, decode(value)?);
        }
    }

    let endpoint = if file_based {
        Endpoint::File {
            path: PathBuf::from(body),
        }
    } else {
        parse_tcp_body(registry, &db_type, body)?
    };

    let name = default_name(&db_type, &endpoint);
    let mut config = ConnectionConfig::new(name, db_type, endpoint);
    config.options = options;
    Ok(config)
}

fn parse_tcp_body(
    registry: &ProviderRegistry,
    db_type: &str,
    body: &str,
) -> Result<Endpoint, DbError> {
    let (authority, path) = match body.split_once('/') {
        Some((authority, path)) => (authority, Some(path)),
        None => (body, None),
    };

    let (credentials, host_part) = match authority.rsplit_once('@') {
        Some((credentials, host_part)) => (Some(credentials), host_part),
        None => (None, authority),
    };

    let (username, password) = match credentials {
        Some(creds) => match creds.split_once(':') {
            Some((user, pass)) => (Some(decode(user)?), Some(decode(pass)?)),
            None => (Some(decode(creds)?), None),
        },
        None => (None, None),
    };

    let (host, port) = match host_part.rsplit_once(':') {
        Some((host, port_str)) => {
            let port = port_str
                .parse::<u16>()
                .map_err(|_| DbError::invalid_config(format!("invalid port: {}", port_str)))?;
            (host, Some(port))
        }
        None => (host_part, registry.default_port(db_type)?),
    };

    if host.is_empty() {
        return Err(DbError::invalid_config("connection URL has no host"));
    }

    Ok(Endpoint::Tcp {
        host: host.to_string(),
        port,
        database: path.filter(|p| !p.is_empty()).map(|p| decode(p)).transpose()?,
        username,
        password,
    })
}

fn decode(raw: &str) -> Result<String, DbError> {
    urlencoding::decode(raw)
        .map(|s| s.into_owned())
        .map_err(|e| DbError::invalid_config(format!("invalid URL encoding: {}", e)))
}

fn default_name(db_type: &str, endpoint: &Endpoint) -> String {
    match endpoint {
        Endpoint::Tcp { host, database, .. } => match database {
            Some(db) => format!("{}-{}-{}", db_type, host, db),
            None => format!("{}-{}", db_type, host),
        },
        Endpoint::File { path } => {
            let stem = path
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_else(|| "file".to_string());
            format!("{}-{}", db_type, stem)
        }
        Endpoint::Uri { .. } => db_type.to_string(),
    }
}
