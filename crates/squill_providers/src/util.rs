use squill_core::{ColumnInfo, DbError, DriverConnection, ObjectRef, Value};

/// Escape a string into a single-quoted SQL literal.
pub(crate) fn sql_literal(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

fn value_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        other => other.as_display_string(),
    }
}

/// Run a metadata query and collect the first column as strings.
pub(crate) fn query_strings(conn: &dyn DriverConnection, sql: &str) -> Result<Vec<String>, DbError> {
    let mut cursor = conn.cursor()?;
    cursor.execute(sql)?;

    let mut out = Vec::new();
    loop {
        let batch = cursor.fetch_many(256)?;
        if batch.is_empty() {
            break;
        }
        for row in batch {
            if let Some(value) = row.first() {
                out.push(value_text(value));
            }
        }
    }
    cursor.close();
    Ok(out)
}

/// Run a metadata query returning `(schema, name)` pairs. Single-column
/// results become unqualified names.
pub(crate) fn query_objects(
    conn: &dyn DriverConnection,
    sql: &str,
) -> Result<Vec<ObjectRef>, DbError> {
    let mut cursor = conn.cursor()?;
    cursor.execute(sql)?;

    let mut out = Vec::new();
    loop {
        let batch = cursor.fetch_many(256)?;
        if batch.is_empty() {
            break;
        }
        for row in batch {
            match row.as_slice() {
                [schema, name, ..] => {
                    let schema = value_text(schema);
                    out.push(ObjectRef::new(
                        (!schema.is_empty()).then_some(schema),
                        value_text(name),
                    ));
                }
                [name] => out.push(ObjectRef::new(None::<String>, value_text(name))),
                [] => {}
            }
        }
    }
    cursor.close();
    Ok(out)
}

/// Run a metadata query returning `(name, type, nullable, is_pk)` columns.
pub(crate) fn query_columns(
    conn: &dyn DriverConnection,
    sql: &str,
) -> Result<Vec<ColumnInfo>, DbError> {
    let mut cursor = conn.cursor()?;
    cursor.execute(sql)?;

    let mut out = Vec::new();
    loop {
        let batch = cursor.fetch_many(256)?;
        if batch.is_empty() {
            break;
        }
        for row in batch {
            let name = row.first().map(value_text).unwrap_or_default();
            let data_type = row.get(1).map(value_text).unwrap_or_default();
            let nullable = row
                .get(2)
                .map(|v| {
                    let text = value_text(v).to_lowercase();
                    text == "yes" || text == "1" || text == "true"
                })
                .unwrap_or(true);
            let is_primary_key = row
                .get(3)
                .map(|v| {
                    let text = value_text(v).to_lowercase();
                    text == "1" || text == "true" || text == "pri"
                })
                .unwrap_or(false);

            out.push(ColumnInfo {
                name,
                data_type,
                nullable,
                is_primary_key,
            });
        }
    }
    cursor.close();
    Ok(out)
}
