use serde_json::Value;

use super::error::FilterError;
use super::filter_order::FilterOrder;
use super::filter_where::FilterWhere;
use super::types::{FilterData, FilterOrderInfo, SqlResult};

/// Validated, parameterized SQL generation for one table.
///
/// All identifiers pass through `validate_table_name`/`validate_column_name`
/// before they reach a query string; values only ever travel as `$n` params.
pub struct Filter {
    table_name: String,
    where_data: Option<Value>,
    order_data: Vec<FilterOrderInfo>,
    limit: Option<i64>,
    offset: Option<i64>,
}

impl Filter {
    pub fn new(table_name: impl Into<String>) -> Result<Self, FilterError> {
        let table_name = table_name.into();
        Self::validate_table_name(&table_name)?;
        Ok(Self {
            table_name,
            where_data: None,
            order_data: vec![],
            limit: None,
            offset: None,
        })
    }

    pub fn assign(&mut self, data: FilterData) -> Result<&mut Self, FilterError> {
        if let Some(where_clause) = data.where_clause {
            self.where_clause(where_clause)?;
        }
        if let Some(order) = data.order {
            self.order(order)?;
        }
        if let Some(limit) = data.limit {
            self.limit(limit, data.offset)?;
        }
        Ok(self)
    }

    pub fn where_clause(&mut self, conditions: Value) -> Result<&mut Self, FilterError> {
        FilterWhere::validate(&conditions)?;
        self.where_data = Some(conditions);
        Ok(self)
    }

    pub fn order(&mut self, order_spec: Value) -> Result<&mut Self, FilterError> {
        self.order_data = FilterOrder::validate_and_parse(&order_spec)?;
        Ok(self)
    }

    pub fn limit(&mut self, limit: i64, offset: Option<i64>) -> Result<&mut Self, FilterError> {
        if limit < 0 {
            return Err(FilterError::InvalidPagination(
                "limit must be non-negative".to_string(),
            ));
        }
        if let Some(off) = offset {
            if off < 0 {
                return Err(FilterError::InvalidPagination(
                    "offset must be non-negative".to_string(),
                ));
            }
        }
        self.limit = Some(limit);
        self.offset = offset;
        Ok(self)
    }

    pub fn to_sql(&self) -> Result<SqlResult, FilterError> {
        let (where_sql, params) = self.where_sql()?;
        let mut query = format!(
            "SELECT * FROM \"{}\" WHERE {}",
            self.table_name, where_sql
        );

        let order_sql = FilterOrder::generate(&self.order_data);
        if !order_sql.is_empty() {
            query.push(' ');
            query.push_str(&order_sql);
        }
        if let Some(limit) = self.limit {
            query.push_str(&format!(" LIMIT {}", limit));
        }
        if let Some(offset) = self.offset {
            query.push_str(&format!(" OFFSET {}", offset));
        }

        Ok(SqlResult { query, params })
    }

    pub fn to_count_sql(&self) -> Result<SqlResult, FilterError> {
        let (where_sql, params) = self.where_sql()?;
        Ok(SqlResult {
            query: format!(
                "SELECT COUNT(*) AS count FROM \"{}\" WHERE {}",
                self.table_name, where_sql
            ),
            params,
        })
    }

    /// INSERT from a JSON object payload, returning the full row.
    pub fn to_insert_sql(&self, payload: &Value) -> Result<SqlResult, FilterError> {
        let obj = payload
            .as_object()
            .ok_or_else(|| FilterError::InvalidWhereClause("payload must be an object".into()))?;
        if obj.is_empty() {
            return Err(FilterError::EmptyPayload);
        }

        let mut columns = Vec::with_capacity(obj.len());
        let mut placeholders = Vec::with_capacity(obj.len());
        let mut params = Vec::with_capacity(obj.len());
        for (i, (column, value)) in obj.iter().enumerate() {
            Self::validate_column_name(column)?;
            columns.push(format!("\"{}\"", column));
            placeholders.push(format!("${}", i + 1));
            params.push(value.clone());
        }

        Ok(SqlResult {
            query: format!(
                "INSERT INTO \"{}\" ({}) VALUES ({}) RETURNING *",
                self.table_name,
                columns.join(", "),
                placeholders.join(", ")
            ),
            params,
        })
    }

    /// UPDATE with SET from a JSON object payload and the assigned where clause.
    pub fn to_update_sql(&self, payload: &Value) -> Result<SqlResult, FilterError> {
        let obj = payload
            .as_object()
            .ok_or_else(|| FilterError::InvalidWhereClause("payload must be an object".into()))?;
        if obj.is_empty() {
            return Err(FilterError::EmptyPayload);
        }

        let mut assignments = Vec::with_capacity(obj.len());
        let mut params = Vec::with_capacity(obj.len());
        for (i, (column, value)) in obj.iter().enumerate() {
            Self::validate_column_name(column)?;
            assignments.push(format!("\"{}\" = ${}", column, i + 1));
            params.push(value.clone());
        }

        let (where_sql, where_params) = self.where_sql_from(params.len())?;
        params.extend(where_params);

        Ok(SqlResult {
            query: format!(
                "UPDATE \"{}\" SET {} WHERE {}",
                self.table_name,
                assignments.join(", "),
                where_sql
            ),
            params,
        })
    }

    pub fn to_delete_sql(&self) -> Result<SqlResult, FilterError> {
        let (where_sql, params) = self.where_sql()?;
        Ok(SqlResult {
            query: format!("DELETE FROM \"{}\" WHERE {}", self.table_name, where_sql),
            params,
        })
    }

    fn where_sql(&self) -> Result<(String, Vec<Value>), FilterError> {
        self.where_sql_from(0)
    }

    fn where_sql_from(&self, starting_param_index: usize) -> Result<(String, Vec<Value>), FilterError> {
        match &self.where_data {
            Some(data) => FilterWhere::generate(data, starting_param_index),
            None => Ok(("1=1".to_string(), vec![])),
        }
    }

    pub fn validate_table_name(name: &str) -> Result<(), FilterError> {
        if name.is_empty()
            || !name
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
            || name.starts_with(|c: char| c.is_ascii_digit())
        {
            return Err(FilterError::InvalidTableName(name.to_string()));
        }
        Ok(())
    }

    pub fn validate_column_name(name: &str) -> Result<(), FilterError> {
        if name.is_empty()
            || !name
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
            || name.starts_with(|c: char| c.is_ascii_digit())
        {
            return Err(FilterError::InvalidColumn(name.to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn filter(table: &str, data: FilterData) -> Filter {
        let mut f = Filter::new(table).unwrap();
        f.assign(data).unwrap();
        f
    }

    #[test]
    fn implicit_equality_and_param_order() {
        let f = filter(
            "products",
            FilterData::where_only(json!({"is_active": true})),
        );
        let sql = f.to_sql().unwrap();
        assert_eq!(
            sql.query,
            "SELECT * FROM \"products\" WHERE \"is_active\" = $1"
        );
        assert_eq!(sql.params, vec![json!(true)]);
    }

    #[test]
    fn in_operator_expands_params() {
        let f = filter(
            "products",
            FilterData::where_only(json!({"id": {"$in": ["a", "b", "c"]}})),
        );
        let sql = f.to_sql().unwrap();
        assert!(sql.query.contains("\"id\" IN ($1, $2, $3)"));
        assert_eq!(sql.params.len(), 3);
    }

    #[test]
    fn null_means_is_null() {
        let f = filter(
            "purchase_requests",
            FilterData::where_only(json!({"approver_id": null})),
        );
        let sql = f.to_sql().unwrap();
        assert!(sql.query.contains("\"approver_id\" IS NULL"));
        assert!(sql.params.is_empty());
    }

    #[test]
    fn order_limit_offset_render_in_order() {
        let f = filter(
            "products",
            FilterData {
                where_clause: Some(json!({"price": {"$gte": 1000}})),
                order: Some(json!({"created_at": "desc"})),
                limit: Some(20),
                offset: Some(40),
            },
        );
        let sql = f.to_sql().unwrap();
        assert_eq!(
            sql.query,
            "SELECT * FROM \"products\" WHERE \"price\" >= $1 ORDER BY \"created_at\" DESC LIMIT 20 OFFSET 40"
        );
    }

    #[test]
    fn update_params_continue_after_set() {
        let f = filter(
            "products",
            FilterData::where_only(json!({"id": "p1", "company_id": "c1"})),
        );
        let sql = f
            .to_update_sql(&json!({"is_active": false}))
            .unwrap();
        assert!(sql.query.starts_with("UPDATE \"products\" SET \"is_active\" = $1 WHERE "));
        assert!(sql.query.contains("$2"));
        assert!(sql.query.contains("$3"));
        assert_eq!(sql.params.len(), 3);
        assert_eq!(sql.params[0], json!(false));
    }

    #[test]
    fn insert_returns_row() {
        let f = Filter::new("categories").unwrap();
        let sql = f
            .to_insert_sql(&json!({"name": "drinks", "company_id": "c1"}))
            .unwrap();
        assert!(sql.query.starts_with("INSERT INTO \"categories\" ("));
        assert!(sql.query.ends_with("RETURNING *"));
        assert_eq!(sql.params.len(), 2);
    }

    #[test]
    fn identifiers_are_validated() {
        assert!(Filter::new("products; DROP TABLE users").is_err());
        assert!(Filter::new("Products").is_err());
        let mut f = Filter::new("products").unwrap();
        f.where_clause(json!({"price\" OR 1=1 --": 1})).unwrap();
        assert!(f.to_sql().is_err());
    }

    #[test]
    fn unsupported_operator_rejected() {
        let mut f = Filter::new("products").unwrap();
        f.where_clause(json!({"name": {"$regex": ".*"}})).unwrap();
        assert!(f.to_sql().is_err());
    }

    #[test]
    fn logical_or_wraps_subclauses() {
        let f = filter(
            "purchase_requests",
            FilterData::where_only(
                json!({"$or": [{"status": "PENDING"}, {"status": "APPROVED"}]}),
            ),
        );
        let sql = f.to_sql().unwrap();
        assert!(sql.query.contains("(\"status\" = $1) OR (\"status\" = $2)"));
        assert_eq!(sql.params, vec![json!("PENDING"), json!("APPROVED")]);
    }
}
