//! SQLite backend (file-based or in-memory) via `rusqlite`.

use rusqlite::types::ValueRef;
use rusqlite::Connection;
use std::path::Path;

use super::{Backend, Dialect};
use crate::dataset::{Dataset, Value};
use crate::error::{ConnectionError, QueryError};

/// A simple file-based (or in-memory) connection.
pub struct SqliteBackend {
    conn: Connection,
}

impl SqliteBackend {
    /// Open a database file, or an in-memory database when `path` is None.
    pub fn open(path: Option<&Path>) -> Result<Self, ConnectionError> {
        let conn = match path {
            Some(p) => Connection::open(p),
            None => Connection::open_in_memory(),
        }
        .map_err(|e| ConnectionError::Failed(e.to_string()))?;
        Ok(Self { conn })
    }
}

impl Backend for SqliteBackend {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn execute(&mut self, sql: &str) -> Result<u64, QueryError> {
        self.conn
            .execute(sql, [])
            .map(|n| n as u64)
            .map_err(|e| QueryError::Execution(e.to_string()))
    }

    fn query(&mut self, sql: &str) -> Result<Dataset, QueryError> {
        let mut stmt = self
            .conn
            .prepare(sql)
            .map_err(|e| QueryError::Execution(e.to_string()))?;
        let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();

        let mut dataset = Dataset::new(columns.clone());
        let mut rows = stmt
            .query([])
            .map_err(|e| QueryError::Execution(e.to_string()))?;
        while let Some(row) = rows
            .next()
            .map_err(|e| QueryError::Execution(e.to_string()))?
        {
            let mut values = Vec::with_capacity(columns.len());
            for (i, column) in columns.iter().enumerate() {
                let value = match row
                    .get_ref(i)
                    .map_err(|e| QueryError::Execution(e.to_string()))?
                {
                    ValueRef::Null => Value::Null,
                    ValueRef::Integer(n) => Value::Integer(n),
                    ValueRef::Real(r) => Value::Real(r),
                    ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).to_string()),
                    ValueRef::Blob(_) => {
                        return Err(QueryError::UnsupportedType {
                            column: column.clone(),
                            type_name: "blob".to_string(),
                        })
                    }
                };
                values.push(value);
            }
            dataset.push_row(values);
        }
        Ok(dataset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> SqliteBackend {
        let mut backend = SqliteBackend::open(None).unwrap();
        backend
            .execute(
                "CREATE TABLE IF NOT EXISTS Employees (
                    EmployeeID INTEGER PRIMARY KEY,
                    Name TEXT,
                    Department TEXT,
                    Salary REAL
                )",
            )
            .unwrap();
        backend
            .execute("INSERT INTO Employees VALUES (1, 'Alice', 'IT', 85000.0)")
            .unwrap();
        backend
    }

    #[test]
    fn test_query_types() {
        let mut backend = seeded();
        let d = backend.query("SELECT * FROM Employees").unwrap();
        assert_eq!(
            d.columns(),
            &["EmployeeID", "Name", "Department", "Salary"]
        );
        assert_eq!(d.get(0, "EmployeeID"), Some(&Value::Integer(1)));
        assert_eq!(d.get(0, "Name"), Some(&Value::Text("Alice".into())));
        assert_eq!(d.get(0, "Salary"), Some(&Value::Real(85000.0)));
    }

    #[test]
    fn test_insert_or_ignore_skips_duplicates() {
        let mut backend = seeded();
        let sql = Dialect::Sqlite
            .render_insert(
                "Employees",
                &[
                    "EmployeeID".to_string(),
                    "Name".to_string(),
                    "Department".to_string(),
                    "Salary".to_string(),
                ],
                &[vec![
                    Value::Integer(1),
                    Value::Text("Alice".into()),
                    Value::Text("IT".into()),
                    Value::Real(85000.0),
                ]],
                true,
            )
            .unwrap();
        assert_eq!(backend.execute(&sql).unwrap(), 0);
        assert_eq!(backend.load_table("Employees").unwrap().len(), 1);
    }

    #[test]
    fn test_update_and_delete() {
        let mut backend = seeded();
        let updated = backend
            .execute("UPDATE Employees SET Salary = 90000.0 WHERE Name = 'Alice'")
            .unwrap();
        assert_eq!(updated, 1);
        let deleted = backend
            .execute("DELETE FROM Employees WHERE Salary < 50000")
            .unwrap();
        assert_eq!(deleted, 0);
    }

    #[test]
    fn test_join_query() {
        let mut backend = seeded();
        backend
            .execute("CREATE TABLE Sales (SaleID INTEGER PRIMARY KEY, Product TEXT, Amount REAL)")
            .unwrap();
        backend
            .execute("INSERT INTO Sales VALUES (1, 'Laptop', 999.99)")
            .unwrap();

        let d = backend
            .query(
                "SELECT e.Name, s.Product, s.Amount
                 FROM Employees e
                 LEFT JOIN Sales s ON e.EmployeeID = s.SaleID",
            )
            .unwrap();
        assert_eq!(d.len(), 1);
        assert_eq!(d.get(0, "Product"), Some(&Value::Text("Laptop".into())));
    }

    #[test]
    fn test_store_replaces_table() {
        let mut backend = seeded();

        let mut d = Dataset::new(vec!["ItemName".into(), "Quantity".into()]);
        d.push_row(vec![Value::Text("Mouse".into()), Value::Integer(5)]);
        backend.store_table("Employees", &d).unwrap();

        // Old schema and contents are gone.
        let loaded = backend.load_table("Employees").unwrap();
        assert_eq!(loaded.columns(), &["ItemName", "Quantity"]);
        assert_eq!(loaded.len(), 1);
    }

    #[test]
    fn test_store_load_round_trip() {
        let mut backend = SqliteBackend::open(None).unwrap();
        let mut d = Dataset::new(vec!["id".into(), "name".into(), "score".into()]);
        d.push_row(vec![
            Value::Integer(1),
            Value::Text("Laptop".into()),
            Value::Real(999.99),
        ]);
        d.push_row(vec![Value::Integer(2), Value::Null, Value::Real(100.0)]);

        backend.store_table("round_trip", &d).unwrap();
        let loaded = backend.load_table("round_trip").unwrap();
        assert_eq!(loaded, d);
    }

    #[test]
    fn test_missing_table_is_query_error() {
        let mut backend = SqliteBackend::open(None).unwrap();
        assert!(matches!(
            backend.load_table("Nowhere"),
            Err(QueryError::Execution(_))
        ));
    }
}
