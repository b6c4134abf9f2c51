/// Parameterized statements and ordered result records
///
/// A [`Statement`] pairs SQL text using PostgreSQL `$n` placeholders with the
/// values bound to them. Read results come back as [`Record`]s: one ordered
/// list of `(column, value)` pairs per row, in the column order the query
/// declared.
///
/// # Example
///
/// ```
/// use taskledger_shared::db::statement::{SqlParam, Statement};
///
/// let stmt = Statement::new("SELECT id, fullname FROM users WHERE email LIKE $1")
///     .bind("%@example.org");
/// assert_eq!(stmt.params(), &[SqlParam::Text("%@example.org".to_string())]);
/// ```
use serde::Serialize;
use serde_json::Value;
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::{Query, QueryAs};
use sqlx::types::chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sqlx::types::{BigDecimal, Uuid};
use sqlx::{Column, Postgres, Row, TypeInfo};
use std::borrow::Cow;
use std::fmt;

/// A value bound to a `$n` placeholder
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    /// INTEGER (matches SERIAL ids)
    Int(i32),
    /// BIGINT
    BigInt(i64),
    /// DOUBLE PRECISION
    Float(f64),
    /// BOOLEAN
    Bool(bool),
    /// TEXT / VARCHAR
    Text(String),
    /// NULL, sent as a text-typed null; cast in SQL for other column types
    Null,
}

impl From<i32> for SqlParam {
    fn from(v: i32) -> Self {
        SqlParam::Int(v)
    }
}

impl From<i64> for SqlParam {
    fn from(v: i64) -> Self {
        SqlParam::BigInt(v)
    }
}

impl From<f64> for SqlParam {
    fn from(v: f64) -> Self {
        SqlParam::Float(v)
    }
}

impl From<bool> for SqlParam {
    fn from(v: bool) -> Self {
        SqlParam::Bool(v)
    }
}

impl From<String> for SqlParam {
    fn from(v: String) -> Self {
        SqlParam::Text(v)
    }
}

impl From<&str> for SqlParam {
    fn from(v: &str) -> Self {
        SqlParam::Text(v.to_string())
    }
}

impl<T: Into<SqlParam>> From<Option<T>> for SqlParam {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(SqlParam::Null)
    }
}

/// SQL text plus its bound parameters
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    sql: Cow<'static, str>,
    params: Vec<SqlParam>,
}

impl Statement {
    /// Creates a statement with no parameters
    pub fn new(sql: impl Into<Cow<'static, str>>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    /// Appends the value for the next `$n` placeholder
    pub fn bind(mut self, value: impl Into<SqlParam>) -> Self {
        self.params.push(value.into());
        self
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &[SqlParam] {
        &self.params
    }

    /// First line of the SQL, trimmed, for log fields
    pub fn summary(&self) -> &str {
        self.sql
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .unwrap_or("")
    }

    pub(crate) fn query(&self) -> Query<'_, Postgres, PgArguments> {
        let mut query = sqlx::query(self.sql());
        for param in &self.params {
            query = match param {
                SqlParam::Int(v) => query.bind(*v),
                SqlParam::BigInt(v) => query.bind(*v),
                SqlParam::Float(v) => query.bind(*v),
                SqlParam::Bool(v) => query.bind(*v),
                SqlParam::Text(v) => query.bind(v.as_str()),
                SqlParam::Null => query.bind(Option::<String>::None),
            };
        }
        query
    }

    pub(crate) fn query_as<T>(&self) -> QueryAs<'_, Postgres, T, PgArguments>
    where
        T: for<'r> sqlx::FromRow<'r, PgRow>,
    {
        let mut query = sqlx::query_as::<_, T>(self.sql());
        for param in &self.params {
            query = match param {
                SqlParam::Int(v) => query.bind(*v),
                SqlParam::BigInt(v) => query.bind(*v),
                SqlParam::Float(v) => query.bind(*v),
                SqlParam::Bool(v) => query.bind(*v),
                SqlParam::Text(v) => query.bind(v.as_str()),
                SqlParam::Null => query.bind(Option::<String>::None),
            };
        }
        query
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.summary())
    }
}

/// One result row as ordered `(column, value)` pairs
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Record {
    fields: Vec<(String, Value)>,
}

impl Record {
    /// Builds a record from pairs, keeping their order
    pub fn from_pairs<I, K>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        Self {
            fields: pairs.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    /// Value of the first column named `column`
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.fields.iter().find(|(name, _)| name == column).map(|(_, v)| v)
    }

    /// Column names in query order
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    /// Values in query order
    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.fields.iter().map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(name, v)| (name.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Decodes a PostgreSQL row column by column
    ///
    /// Integers, floats, booleans, text and JSON map to the matching JSON
    /// values. NUMERIC, UUID and the date/time types come back as strings:
    /// NUMERIC keeps its exact digits, TIMESTAMPTZ is RFC 3339, the others
    /// use PostgreSQL's own text form.
    ///
    /// # Errors
    ///
    /// Returns `sqlx::Error::Decode` for any other column type (cast it to
    /// `text` in the query instead).
    pub fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        let mut fields = Vec::with_capacity(row.columns().len());

        for (index, column) in row.columns().iter().enumerate() {
            let value = decode_column(row, index, column.type_info().name())?;
            fields.push((column.name().to_string(), value));
        }

        Ok(Self { fields })
    }
}

fn decode_column(row: &PgRow, index: usize, type_name: &str) -> Result<Value, sqlx::Error> {
    let value = match type_name {
        "BOOL" => row.try_get::<Option<bool>, _>(index)?.map(Value::from),
        "INT2" => row.try_get::<Option<i16>, _>(index)?.map(Value::from),
        "INT4" => row.try_get::<Option<i32>, _>(index)?.map(Value::from),
        "INT8" => row.try_get::<Option<i64>, _>(index)?.map(Value::from),
        "FLOAT4" => row.try_get::<Option<f32>, _>(index)?.map(Value::from),
        "FLOAT8" => row.try_get::<Option<f64>, _>(index)?.map(Value::from),
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" | "CHAR" | "UNKNOWN" => {
            row.try_get::<Option<String>, _>(index)?.map(Value::from)
        }
        "JSON" | "JSONB" => row.try_get::<Option<Value>, _>(index)?,
        "NUMERIC" => row
            .try_get::<Option<BigDecimal>, _>(index)?
            .map(|n| Value::from(n.to_string())),
        "TIMESTAMPTZ" => row
            .try_get::<Option<DateTime<Utc>>, _>(index)?
            .map(|t| Value::from(t.to_rfc3339())),
        "TIMESTAMP" => row
            .try_get::<Option<NaiveDateTime>, _>(index)?
            .map(|t| Value::from(t.to_string())),
        "DATE" => row
            .try_get::<Option<NaiveDate>, _>(index)?
            .map(|d| Value::from(d.to_string())),
        "TIME" => row
            .try_get::<Option<NaiveTime>, _>(index)?
            .map(|t| Value::from(t.to_string())),
        "UUID" => row
            .try_get::<Option<Uuid>, _>(index)?
            .map(|u| Value::from(u.to_string())),
        other => {
            return Err(sqlx::Error::Decode(
                format!("unsupported column type {} at index {}", other, index).into(),
            ))
        }
    };

    Ok(value.unwrap_or(Value::Null))
}
