//! PostgreSQL backend via the synchronous `postgres` crate.

use postgres::types::Type;
use postgres::{Client, NoTls, Row};

use super::{Backend, ConnectionConfig, Dialect};
use crate::dataset::{Dataset, Value};
use crate::error::{ConnectionError, QueryError};

/// A client-server connection to PostgreSQL.
pub struct PostgresBackend {
    client: Client,
}

impl PostgresBackend {
    /// Connect using host/port/credentials/database from the descriptor.
    pub fn connect(config: &ConnectionConfig) -> Result<Self, ConnectionError> {
        let params = format!(
            "host={} port={} user={} password={} dbname={}",
            config.host,
            config.port(),
            config.user,
            config.password,
            config.database
        );
        let client =
            Client::connect(&params, NoTls).map_err(|e| ConnectionError::Failed(e.to_string()))?;
        Ok(Self { client })
    }
}

impl Backend for PostgresBackend {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    fn execute(&mut self, sql: &str) -> Result<u64, QueryError> {
        self.client
            .execute(sql, &[])
            .map_err(|e| QueryError::Execution(e.to_string()))
    }

    fn query(&mut self, sql: &str) -> Result<Dataset, QueryError> {
        // Prepare first so column names are known even for empty results.
        let statement = self
            .client
            .prepare(sql)
            .map_err(|e| QueryError::Execution(e.to_string()))?;
        let columns: Vec<String> = statement
            .columns()
            .iter()
            .map(|c| c.name().to_string())
            .collect();

        let rows = self
            .client
            .query(&statement, &[])
            .map_err(|e| QueryError::Execution(e.to_string()))?;

        let mut dataset = Dataset::new(columns);
        for row in rows {
            let mut values = Vec::with_capacity(row.len());
            for i in 0..row.len() {
                values.push(cell_value(&row, i)?);
            }
            dataset.push_row(values);
        }
        Ok(dataset)
    }
}

/// Convert one cell of a result row into a dataset value.
///
/// NUMERIC/DECIMAL is not mapped (our own stores use DOUBLE PRECISION);
/// reading such a column is an unsupported-type error.
fn cell_value(row: &Row, index: usize) -> Result<Value, QueryError> {
    let column = &row.columns()[index];
    let ty = column.type_();
    let get_error = |e: postgres::Error| QueryError::Execution(e.to_string());

    let value = if *ty == Type::INT2 {
        row.try_get::<_, Option<i16>>(index)
            .map_err(get_error)?
            .map(|v| Value::Integer(v as i64))
    } else if *ty == Type::INT4 {
        row.try_get::<_, Option<i32>>(index)
            .map_err(get_error)?
            .map(|v| Value::Integer(v as i64))
    } else if *ty == Type::INT8 {
        row.try_get::<_, Option<i64>>(index)
            .map_err(get_error)?
            .map(Value::Integer)
    } else if *ty == Type::FLOAT4 {
        row.try_get::<_, Option<f32>>(index)
            .map_err(get_error)?
            .map(|v| Value::Real(v as f64))
    } else if *ty == Type::FLOAT8 {
        row.try_get::<_, Option<f64>>(index)
            .map_err(get_error)?
            .map(Value::Real)
    } else if *ty == Type::BOOL {
        row.try_get::<_, Option<bool>>(index)
            .map_err(get_error)?
            .map(|v| Value::Integer(v as i64))
    } else if *ty == Type::TEXT || *ty == Type::VARCHAR || *ty == Type::BPCHAR || *ty == Type::NAME
    {
        row.try_get::<_, Option<String>>(index)
            .map_err(get_error)?
            .map(Value::Text)
    } else {
        return Err(QueryError::UnsupportedType {
            column: column.name().to_string(),
            type_name: ty.name().to_string(),
        });
    };
    Ok(value.unwrap_or(Value::Null))
}
