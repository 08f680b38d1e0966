//! MySQL backend via the synchronous `mysql` crate.

use mysql::consts::ColumnType as WireType;
use mysql::prelude::Queryable;
use mysql::{Conn, OptsBuilder};

use super::{Backend, ConnectionConfig, Dialect};
use crate::dataset::{Dataset, Value};
use crate::error::{ConnectionError, QueryError};

/// A client-server connection to MySQL.
pub struct MysqlBackend {
    conn: Conn,
}

impl MysqlBackend {
    /// Connect using host/port/credentials/database from the descriptor.
    pub fn connect(config: &ConnectionConfig) -> Result<Self, ConnectionError> {
        let opts = OptsBuilder::new()
            .ip_or_hostname(Some(config.host.clone()))
            .tcp_port(config.port())
            .user(Some(config.user.clone()))
            .pass(Some(config.password.clone()))
            .db_name(Some(config.database.clone()));
        let conn = Conn::new(opts).map_err(|e| ConnectionError::Failed(e.to_string()))?;
        Ok(Self { conn })
    }
}

impl Backend for MysqlBackend {
    fn dialect(&self) -> Dialect {
        Dialect::Mysql
    }

    fn execute(&mut self, sql: &str) -> Result<u64, QueryError> {
        let result = self
            .conn
            .query_iter(sql)
            .map_err(|e| QueryError::Execution(e.to_string()))?;
        Ok(result.affected_rows())
    }

    fn query(&mut self, sql: &str) -> Result<Dataset, QueryError> {
        let mut result = self
            .conn
            .query_iter(sql)
            .map_err(|e| QueryError::Execution(e.to_string()))?;

        // Text-protocol rows arrive as raw bytes; the column metadata
        // decides how each cell is interpreted.
        let columns: Vec<(String, Kind)> = result
            .columns()
            .as_ref()
            .iter()
            .map(|c| (c.name_str().to_string(), Kind::of(c.column_type())))
            .collect();

        let mut dataset = Dataset::new(columns.iter().map(|(name, _)| name.clone()).collect());
        for row in result.by_ref() {
            let row = row.map_err(|e| QueryError::Execution(e.to_string()))?;
            let mut values = Vec::with_capacity(columns.len());
            for (raw, (name, kind)) in row.unwrap().into_iter().zip(&columns) {
                values.push(cell_value(raw, name, *kind)?);
            }
            dataset.push_row(values);
        }
        Ok(dataset)
    }
}

/// Interpretation of a wire column in the dataset model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Integer,
    Real,
    Text,
}

impl Kind {
    fn of(ty: WireType) -> Self {
        match ty {
            WireType::MYSQL_TYPE_TINY
            | WireType::MYSQL_TYPE_SHORT
            | WireType::MYSQL_TYPE_INT24
            | WireType::MYSQL_TYPE_LONG
            | WireType::MYSQL_TYPE_LONGLONG
            | WireType::MYSQL_TYPE_YEAR => Kind::Integer,
            WireType::MYSQL_TYPE_FLOAT
            | WireType::MYSQL_TYPE_DOUBLE
            | WireType::MYSQL_TYPE_DECIMAL
            | WireType::MYSQL_TYPE_NEWDECIMAL => Kind::Real,
            _ => Kind::Text,
        }
    }
}

/// Convert one wire value into a dataset value.
fn cell_value(raw: mysql::Value, column: &str, kind: Kind) -> Result<Value, QueryError> {
    let parse_error = |text: &str, expected: &str| QueryError::Execution(format!(
        "column '{}': cannot parse '{}' as {}",
        column, text, expected
    ));

    match raw {
        mysql::Value::NULL => Ok(Value::Null),
        mysql::Value::Int(i) => Ok(Value::Integer(i)),
        mysql::Value::UInt(u) => {
            i64::try_from(u)
                .map(Value::Integer)
                .map_err(|_| QueryError::UnsupportedType {
                    column: column.to_string(),
                    type_name: "unsigned bigint out of range".to_string(),
                })
        }
        mysql::Value::Float(f) => Ok(Value::Real(f as f64)),
        mysql::Value::Double(d) => Ok(Value::Real(d)),
        mysql::Value::Bytes(bytes) => {
            let text = String::from_utf8_lossy(&bytes).to_string();
            match kind {
                Kind::Integer => text
                    .parse::<i64>()
                    .map(Value::Integer)
                    .map_err(|_| parse_error(&text, "integer")),
                Kind::Real => text
                    .parse::<f64>()
                    .map(Value::Real)
                    .map_err(|_| parse_error(&text, "real")),
                Kind::Text => Ok(Value::Text(text)),
            }
        }
        mysql::Value::Date(y, m, d, h, mi, s, _us) => Ok(Value::Text(format!(
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
            y, m, d, h, mi, s
        ))),
        mysql::Value::Time(neg, days, h, mi, s, _us) => {
            let sign = if neg { "-" } else { "" };
            Ok(Value::Text(format!(
                "{}{:02}:{:02}:{:02}",
                sign,
                u32::from(h) + days * 24,
                mi,
                s
            )))
        }
    }
}
