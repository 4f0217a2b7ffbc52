use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{self, postgres::PgArguments, FromRow, PgPool, Row};
use uuid::Uuid;

use crate::database::manager::DatabaseError;
use crate::filter::{Filter, FilterData, FilterError};

pub struct QueryBuilder<T> {
    table_name: String,
    filter: Option<Filter>,
    _phantom: std::marker::PhantomData<T>,
}

fn qerr(e: FilterError) -> DatabaseError {
    DatabaseError::QueryError(e.to_string())
}

impl<T> QueryBuilder<T>
where
    T: for<'r> FromRow<'r, sqlx::postgres::PgRow> + Send + Unpin,
{
    pub fn new(table_name: impl Into<String>) -> Result<Self, DatabaseError> {
        let name = table_name.into();
        Filter::validate_table_name(&name).map_err(qerr)?;
        Ok(Self {
            table_name: name,
            filter: None,
            _phantom: std::marker::PhantomData,
        })
    }

    pub fn filter(mut self, filter_data: FilterData) -> Result<Self, DatabaseError> {
        let mut filter = Filter::new(&self.table_name).map_err(qerr)?;
        filter.assign(filter_data).map_err(qerr)?;
        self.filter = Some(filter);
        Ok(self)
    }

    fn into_filter(self) -> Result<Filter, DatabaseError> {
        match self.filter {
            Some(f) => Ok(f),
            None => Filter::new(&self.table_name).map_err(qerr),
        }
    }

    pub async fn select_all(self, pool: &PgPool) -> Result<Vec<T>, DatabaseError> {
        let sql_result = self.into_filter()?.to_sql().map_err(qerr)?;
        let mut q = sqlx::query_as::<_, T>(&sql_result.query);
        for p in sql_result.params.iter() {
            q = bind_param_query_as(q, p);
        }
        Ok(q.fetch_all(pool).await?)
    }

    pub async fn select_one(self, pool: &PgPool) -> Result<T, DatabaseError> {
        let sql_result = self.into_filter()?.to_sql().map_err(qerr)?;
        let mut q = sqlx::query_as::<_, T>(&sql_result.query);
        for p in sql_result.params.iter() {
            q = bind_param_query_as(q, p);
        }
        Ok(q.fetch_one(pool).await?)
    }

    pub async fn select_optional(self, pool: &PgPool) -> Result<Option<T>, DatabaseError> {
        let sql_result = self.into_filter()?.to_sql().map_err(qerr)?;
        let mut q = sqlx::query_as::<_, T>(&sql_result.query);
        for p in sql_result.params.iter() {
            q = bind_param_query_as(q, p);
        }
        Ok(q.fetch_optional(pool).await?)
    }

    pub async fn count(self, pool: &PgPool) -> Result<i64, DatabaseError> {
        let sql_result = self.into_filter()?.to_count_sql().map_err(qerr)?;
        let mut q = sqlx::query(&sql_result.query);
        for p in sql_result.params.iter() {
            q = bind_param_query(q, p);
        }
        let row = q.fetch_one(pool).await?;
        Ok(row.try_get("count")?)
    }

    pub async fn insert(self, pool: &PgPool, payload: &Value) -> Result<T, DatabaseError> {
        let sql_result = self.into_filter()?.to_insert_sql(payload).map_err(qerr)?;
        let mut q = sqlx::query_as::<_, T>(&sql_result.query);
        for p in sql_result.params.iter() {
            q = bind_param_query_as(q, p);
        }
        Ok(q.fetch_one(pool).await?)
    }

    pub async fn update(self, pool: &PgPool, payload: &Value) -> Result<u64, DatabaseError> {
        let sql_result = self.into_filter()?.to_update_sql(payload).map_err(qerr)?;
        let mut q = sqlx::query(&sql_result.query);
        for p in sql_result.params.iter() {
            q = bind_param_query(q, p);
        }
        Ok(q.execute(pool).await?.rows_affected())
    }

    pub async fn delete(self, pool: &PgPool) -> Result<u64, DatabaseError> {
        let sql_result = self.into_filter()?.to_delete_sql().map_err(qerr)?;
        let mut q = sqlx::query(&sql_result.query);
        for p in sql_result.params.iter() {
            q = bind_param_query(q, p);
        }
        Ok(q.execute(pool).await?.rows_affected())
    }
}

/// Bind a JSON value onto a plain query. Strings that parse as UUIDs or
/// RFC3339 timestamps bind as their native Postgres types so typed columns
/// compare correctly.
fn bind_param_query<'q>(
    q: sqlx::query::Query<'q, sqlx::Postgres, PgArguments>,
    v: &'q Value,
) -> sqlx::query::Query<'q, sqlx::Postgres, PgArguments> {
    match v {
        Value::Null => {
            let none: Option<String> = None;
            q.bind(none)
        }
        Value::Bool(b) => q.bind(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                q.bind(i)
            } else if let Some(u) = n.as_u64() {
                q.bind(u as i64)
            } else if let Some(f) = n.as_f64() {
                q.bind(f)
            } else {
                q.bind(n.to_string())
            }
        }
        Value::String(s) => {
            if let Ok(id) = Uuid::parse_str(s) {
                q.bind(id)
            } else if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
                q.bind(ts.with_timezone(&Utc))
            } else {
                q.bind(s)
            }
        }
        Value::Array(_) | Value::Object(_) => q.bind(v.clone()), // JSONB
    }
}

fn bind_param_query_as<'q, O>(
    q: sqlx::query::QueryAs<'q, sqlx::Postgres, O, PgArguments>,
    v: &'q Value,
) -> sqlx::query::QueryAs<'q, sqlx::Postgres, O, PgArguments>
where
    O: for<'r> FromRow<'r, sqlx::postgres::PgRow>,
{
    match v {
        Value::Null => {
            let none: Option<String> = None;
            q.bind(none)
        }
        Value::Bool(b) => q.bind(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                q.bind(i)
            } else if let Some(u) = n.as_u64() {
                q.bind(u as i64)
            } else if let Some(f) = n.as_f64() {
                q.bind(f)
            } else {
                q.bind(n.to_string())
            }
        }
        Value::String(s) => {
            if let Ok(id) = Uuid::parse_str(s) {
                q.bind(id)
            } else if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
                q.bind(ts.with_timezone(&Utc))
            } else {
                q.bind(s)
            }
        }
        Value::Array(_) | Value::Object(_) => q.bind(v.clone()),
    }
}
