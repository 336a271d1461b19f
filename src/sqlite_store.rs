//! SQLite-backed [`EntityStore`] implementation.
//!
//! Each kind maps to its own `entities_<kind>` table (see
//! [`migrate`](crate::migrate)). Every dynamic statement is assembled with
//! [`QueryBuilder`]: column names come only from the static alias tables and
//! every caller-supplied value is a bound parameter.
//!
//! List attributes are stored as JSON arrays; membership is an `EXISTS`
//! over `json_each(col)`, so members may contain any character.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};

use grimoire_core::models::{
    AttrValue, DocumentCount, DocumentMetadata, DocumentRef, Entity, EntityKind, SourceOrigin,
};
use grimoire_core::schema::{alias_table, AliasTable};
use grimoire_core::store::{
    ColumnType, Condition, EntityStore, Predicate, ScalarValue, StoreQuery, DOCUMENT_KEY_COLUMN,
    IDENTIFIER_COLUMN, NAME_COLUMN,
};

use crate::migrate::entity_table;

/// `name` folded with Rust's Unicode `to_lowercase`, written alongside
/// `name` and used for every case-insensitive name match. SQLite's own
/// `LOWER` and `LIKE` fold ASCII only.
pub const NAME_LOWER_COLUMN: &str = "name_lower";

const BASE_COLUMNS: [&str; 7] = [
    "identifier",
    "name",
    "source_origin",
    "document_key",
    "document_name",
    "document_source",
    "payload_json",
];

/// SQLite implementation of the [`EntityStore`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// A value as SQLite stores it.
enum SqlValue {
    Null,
    Int(i64),
    Real(f64),
    Text(String),
}

fn push_value(qb: &mut QueryBuilder<'_, Sqlite>, value: SqlValue) {
    match value {
        SqlValue::Null => qb.push_bind(None::<String>),
        SqlValue::Int(i) => qb.push_bind(i),
        SqlValue::Real(f) => qb.push_bind(f),
        SqlValue::Text(s) => qb.push_bind(s),
    };
}

fn encode_list(items: &[String]) -> Result<String> {
    Ok(serde_json::to_string(items)?)
}

fn decode_list(stored: &str) -> Result<Vec<String>> {
    serde_json::from_str(stored).with_context(|| format!("corrupt list value {:?}", stored))
}

fn attr_to_sql(value: &AttrValue) -> Result<SqlValue> {
    Ok(match value {
        AttrValue::Absent => SqlValue::Null,
        AttrValue::Int(i) => SqlValue::Int(*i),
        AttrValue::Float(f) => SqlValue::Real(*f),
        AttrValue::Bool(b) => SqlValue::Int(i64::from(*b)),
        AttrValue::Text(s) => SqlValue::Text(s.clone()),
        AttrValue::List(items) => SqlValue::Text(encode_list(items)?),
    })
}

fn scalar_to_sql(value: &ScalarValue) -> SqlValue {
    match value {
        ScalarValue::Int(i) => SqlValue::Int(*i),
        ScalarValue::Float(f) => SqlValue::Real(*f),
        ScalarValue::Bool(b) => SqlValue::Int(i64::from(*b)),
        ScalarValue::Text(s) => SqlValue::Text(s.clone()),
    }
}

/// `EXISTS (SELECT 1 FROM json_each(col) WHERE value = ?)`.
fn push_member_test(qb: &mut QueryBuilder<'_, Sqlite>, col: &str, needle: SqlValue) {
    qb.push(format!("EXISTS (SELECT 1 FROM json_each({}) WHERE value = ", col));
    push_value(qb, needle);
    qb.push(")");
}

fn select_columns(table: &AliasTable) -> String {
    BASE_COLUMNS
        .iter()
        .copied()
        .chain(table.attributes.iter().map(|a| a.name))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Reject any column not declared for the kind before it reaches SQL text.
fn checked_column<'a>(table: &AliasTable, column: &'a str) -> Result<&'a str> {
    match column {
        IDENTIFIER_COLUMN | NAME_COLUMN | DOCUMENT_KEY_COLUMN => Ok(column),
        _ if table.attribute(column).is_some() => Ok(column),
        _ => bail!("column '{}' is not defined for kind '{}'", column, table.kind),
    }
}

fn push_condition(
    qb: &mut QueryBuilder<'_, Sqlite>,
    table: &AliasTable,
    condition: &Condition,
) -> Result<()> {
    let col = checked_column(table, &condition.column)?;
    let is_list = condition.column_type == ColumnType::List;

    match &condition.predicate {
        Predicate::Eq(value) if is_list => push_member_test(qb, col, scalar_to_sql(value)),
        Predicate::Eq(value) => {
            qb.push(format!("{} = ", col));
            push_value(qb, scalar_to_sql(value));
        }
        Predicate::ILike(text) if is_list => {
            push_member_test(qb, col, SqlValue::Text(text.to_lowercase()))
        }
        Predicate::ILike(text) if col == NAME_COLUMN => {
            qb.push(format!("{} = ", NAME_LOWER_COLUMN));
            qb.push_bind(text.to_lowercase());
        }
        Predicate::ILike(text) => {
            qb.push(format!("LOWER({}) = LOWER(", col));
            qb.push_bind(text.clone());
            qb.push(")");
        }
        Predicate::Like(pattern) => {
            if col == NAME_COLUMN {
                qb.push(format!("{} LIKE ", NAME_LOWER_COLUMN));
            } else {
                qb.push(format!("LOWER({}) LIKE ", col));
            }
            qb.push_bind(pattern.to_sql());
            qb.push(" ESCAPE '\\'");
        }
        Predicate::In(values) if values.is_empty() => {
            qb.push("0");
        }
        Predicate::In(values) if is_list => {
            qb.push("(");
            for (i, value) in values.iter().enumerate() {
                if i > 0 {
                    qb.push(" OR ");
                }
                push_member_test(qb, col, scalar_to_sql(value));
            }
            qb.push(")");
        }
        Predicate::In(values) => {
            qb.push(format!("{} IN (", col));
            for (i, value) in values.iter().enumerate() {
                if i > 0 {
                    qb.push(", ");
                }
                push_value(qb, scalar_to_sql(value));
            }
            qb.push(")");
        }
        Predicate::Range { min, max } => {
            qb.push("(1 = 1");
            if let Some(min) = min {
                qb.push(format!(" AND {} >= ", col));
                qb.push_bind(*min);
            }
            if let Some(max) = max {
                qb.push(format!(" AND {} <= ", col));
                qb.push_bind(*max);
            }
            qb.push(")");
        }
    }
    Ok(())
}

fn row_to_entity(row: &SqliteRow, kind: EntityKind, table: &AliasTable) -> Result<Entity> {
    let origin: String = row.try_get("source_origin")?;
    let payload_json: String = row.try_get("payload_json")?;
    let identifier: String = row.try_get("identifier")?;

    let mut attributes = std::collections::BTreeMap::new();
    for attr in table.attributes {
        let value = match ColumnType::from(attr.ty) {
            ColumnType::Integer => row
                .try_get::<Option<i64>, _>(attr.name)?
                .map(AttrValue::Int),
            ColumnType::Boolean => row
                .try_get::<Option<i64>, _>(attr.name)?
                .map(|b| AttrValue::Bool(b != 0)),
            ColumnType::Real => row
                .try_get::<Option<f64>, _>(attr.name)?
                .map(AttrValue::Float),
            ColumnType::Text => row
                .try_get::<Option<String>, _>(attr.name)?
                .map(AttrValue::Text),
            ColumnType::List => row
                .try_get::<Option<String>, _>(attr.name)?
                .map(|s| decode_list(&s).map(AttrValue::List))
                .transpose()?,
        };
        attributes.insert(attr.name.to_string(), value.unwrap_or(AttrValue::Absent));
    }

    Ok(Entity {
        payload: serde_json::from_str(&payload_json)
            .with_context(|| format!("corrupt payload for {} '{}'", kind, identifier))?,
        identifier,
        name: row.try_get("name")?,
        kind,
        source_origin: origin.parse::<SourceOrigin>()?,
        document: DocumentRef {
            key: row.try_get("document_key")?,
            name: row.try_get("document_name")?,
            source: row.try_get("document_source")?,
        },
        attributes,
    })
}

fn upsert_statement(entity: &Entity) -> Result<QueryBuilder<'static, Sqlite>> {
    let table = alias_table(entity.kind);
    let columns = select_columns(table);

    let mut qb = QueryBuilder::new(format!(
        "INSERT INTO {} ({}, {}) VALUES (",
        entity_table(entity.kind),
        columns,
        NAME_LOWER_COLUMN
    ));
    qb.push_bind(entity.identifier.clone());
    qb.push(", ");
    qb.push_bind(entity.name.clone());
    qb.push(", ");
    qb.push_bind(entity.source_origin.as_str());
    qb.push(", ");
    qb.push_bind(entity.document.key.clone());
    qb.push(", ");
    qb.push_bind(entity.document.name.clone());
    qb.push(", ");
    qb.push_bind(entity.document.source.clone());
    qb.push(", ");
    qb.push_bind(serde_json::to_string(&entity.payload)?);
    for attr in table.attributes {
        qb.push(", ");
        let value = entity.attribute(attr.name).unwrap_or(&AttrValue::Absent);
        push_value(&mut qb, attr_to_sql(value)?);
    }
    qb.push(", ");
    qb.push_bind(entity.name.to_lowercase());

    let updates = BASE_COLUMNS
        .iter()
        .copied()
        .skip(1)
        .chain(table.attributes.iter().map(|a| a.name))
        .chain([NAME_LOWER_COLUMN])
        .map(|c| format!("{c} = excluded.{c}"))
        .collect::<Vec<_>>()
        .join(", ");
    qb.push(format!(") ON CONFLICT(identifier) DO UPDATE SET {}", updates));
    Ok(qb)
}

#[async_trait]
impl EntityStore for SqliteStore {
    async fn upsert_batch(&self, entities: &[Entity]) -> Result<usize> {
        let mut tx = self.pool.begin().await?;
        for entity in entities {
            upsert_statement(entity)?
                .build()
                .execute(&mut *tx)
                .await
                .with_context(|| format!("upsert {} '{}'", entity.kind, entity.identifier))?;
        }
        tx.commit().await?;
        Ok(entities.len())
    }

    async fn get(&self, kind: EntityKind, identifier: &str) -> Result<Option<Entity>> {
        let table = alias_table(kind);
        let row = sqlx::query(&format!(
            "SELECT {} FROM {} WHERE identifier = ?",
            select_columns(table),
            entity_table(kind)
        ))
        .bind(identifier)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| row_to_entity(&r, kind, table)).transpose()
    }

    async fn query(&self, query: &StoreQuery) -> Result<Vec<Entity>> {
        let table = alias_table(query.kind);
        let mut qb = QueryBuilder::new(format!(
            "SELECT {} FROM {} WHERE 1 = 1",
            select_columns(table),
            entity_table(query.kind)
        ));
        for condition in &query.conditions {
            qb.push(" AND ");
            push_condition(&mut qb, table, condition)?;
        }
        qb.push(" ORDER BY name, identifier LIMIT ");
        qb.push_bind(query.limit.max(0));

        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.iter()
            .map(|row| row_to_entity(row, query.kind, table))
            .collect()
    }

    async fn document_counts(&self, kind: EntityKind) -> Result<Vec<DocumentCount>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT document_key, document_name, document_source, COUNT(*) AS n
            FROM {}
            WHERE document_key IS NOT NULL
            GROUP BY document_key, document_name, document_source
            ORDER BY document_key, document_source
            "#,
            entity_table(kind)
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| DocumentCount {
                document_key: row.get("document_key"),
                document_name: row.get("document_name"),
                document_source: row.get("document_source"),
                count: row.get("n"),
            })
            .collect())
    }

    async fn document_metadata(&self) -> Result<Vec<DocumentMetadata>> {
        let rows = sqlx::query(
            "SELECT document_key, document_source, publisher, license, game_system FROM document_metadata",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| DocumentMetadata {
                document_key: row.get("document_key"),
                document_source: row.get("document_source"),
                publisher: row.get("publisher"),
                license: row.get("license"),
                game_system: row.get("game_system"),
            })
            .collect())
    }

    async fn upsert_document_metadata(&self, metadata: &DocumentMetadata) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO document_metadata (document_key, document_source, publisher, license, game_system)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(document_key, document_source) DO UPDATE SET
                publisher = excluded.publisher,
                license = excluded.license,
                game_system = excluded.game_system
            "#,
        )
        .bind(&metadata.document_key)
        .bind(&metadata.document_source)
        .bind(&metadata.publisher)
        .bind(&metadata.license)
        .bind(&metadata.game_system)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn purge(&self, kind: EntityKind) -> Result<u64> {
        let result = sqlx::query(&format!("DELETE FROM {}", entity_table(kind)))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn count(&self, kind: EntityKind) -> Result<i64> {
        let n: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", entity_table(kind)))
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }
}
