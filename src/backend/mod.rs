//! Relational-database backends behind a single capability interface.
//!
//! Three interchangeable backends are provided, differing only in connection
//! parameters and minor SQL dialect quirks:
//!
//! - [`sqlite`] - file-based (or in-memory) SQLite via `rusqlite`
//! - [`mysql`] - MySQL via the `mysql` crate
//! - [`postgres`] - PostgreSQL via the `postgres` crate
//!
//! The backend is selected by a [`ConnectionConfig`] value rather than
//! copy-pasted per-backend code. All calls are synchronous and blocking;
//! a connection is acquired at the start of an operation and released when
//! the backend value is dropped, on all exit paths.

pub mod mysql;
pub mod postgres;
pub mod sqlite;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::dataset::{Dataset, Value};
use crate::error::{ConnectionError, QueryError};

pub use self::mysql::MysqlBackend;
pub use self::postgres::PostgresBackend;
pub use self::sqlite::SqliteBackend;

/// Rows per INSERT statement when storing a dataset.
const INSERT_CHUNK_ROWS: usize = 500;

// =============================================================================
// Capability interface
// =============================================================================

/// One relational-database backend.
///
/// The connection is scoped to the value: dropping the backend closes it.
pub trait Backend {
    /// SQL dialect spoken by this backend.
    fn dialect(&self) -> Dialect;

    /// Execute a statement, returning the number of rows affected.
    fn execute(&mut self, sql: &str) -> Result<u64, QueryError>;

    /// Run a query and collect all rows into a dataset.
    fn query(&mut self, sql: &str) -> Result<Dataset, QueryError>;

    /// Load all rows of a table.
    fn load_table(&mut self, table: &str) -> Result<Dataset, QueryError> {
        let sql = format!("SELECT * FROM {}", self.dialect().quote_ident(table)?);
        self.query(&sql)
    }

    /// Write a dataset to a table, replacing any existing table of that
    /// name. Prior contents and schema are discarded unconditionally.
    fn store_table(&mut self, table: &str, dataset: &Dataset) -> Result<(), QueryError> {
        for sql in render_store(self.dialect(), table, dataset)? {
            self.execute(&sql)?;
        }
        Ok(())
    }
}

// =============================================================================
// Dialect
// =============================================================================

/// Inferred SQL storage class for a dataset column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Integer,
    Real,
    Text,
}

/// SQL dialect quirks: the complete per-backend difference surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dialect {
    Sqlite,
    Mysql,
    Postgres,
}

impl Dialect {
    /// Auto-incrementing primary key column definition.
    pub fn auto_increment(&self) -> &'static str {
        match self {
            Dialect::Sqlite => "INTEGER PRIMARY KEY AUTOINCREMENT",
            Dialect::Mysql => "BIGINT AUTO_INCREMENT PRIMARY KEY",
            Dialect::Postgres => "BIGSERIAL PRIMARY KEY",
        }
    }

    /// NULL-coalescing function name.
    pub fn coalesce_fn(&self) -> &'static str {
        match self {
            Dialect::Sqlite | Dialect::Mysql => "IFNULL",
            Dialect::Postgres => "COALESCE",
        }
    }

    /// Quote an identifier, rejecting names that cannot be quoted safely.
    pub fn quote_ident(&self, name: &str) -> Result<String, QueryError> {
        let valid = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !valid {
            return Err(QueryError::InvalidIdentifier(name.to_string()));
        }
        Ok(match self {
            Dialect::Mysql => format!("`{}`", name),
            _ => format!("\"{}\"", name),
        })
    }

    /// Column type name for CREATE TABLE.
    pub fn column_type(&self, ty: ColumnType) -> &'static str {
        match (self, ty) {
            (Dialect::Sqlite, ColumnType::Integer) => "INTEGER",
            (Dialect::Sqlite, ColumnType::Real) => "REAL",
            (Dialect::Mysql, ColumnType::Integer) => "BIGINT",
            (Dialect::Mysql, ColumnType::Real) => "DOUBLE",
            (Dialect::Postgres, ColumnType::Integer) => "BIGINT",
            (Dialect::Postgres, ColumnType::Real) => "DOUBLE PRECISION",
            (_, ColumnType::Text) => "TEXT",
        }
    }

    /// Render a value as a SQL literal. Text is quoted with doubled single
    /// quotes; non-finite reals degrade to NULL.
    pub fn literal(&self, value: &Value) -> String {
        match value {
            Value::Null => "NULL".to_string(),
            Value::Integer(i) => i.to_string(),
            Value::Real(r) => {
                if !r.is_finite() {
                    return "NULL".to_string();
                }
                let text = r.to_string();
                if text.contains('.') || text.contains('e') {
                    text
                } else {
                    format!("{}.0", text)
                }
            }
            Value::Text(t) => format!("'{}'", t.replace('\'', "''")),
        }
    }

    /// Render an INSERT for the given rows. With `ignore_conflicts`, rows
    /// violating a unique constraint are skipped using the dialect's
    /// conflict-ignoring syntax.
    pub fn render_insert(
        &self,
        table: &str,
        columns: &[String],
        rows: &[Vec<Value>],
        ignore_conflicts: bool,
    ) -> Result<String, QueryError> {
        let table = self.quote_ident(table)?;
        let column_list = columns
            .iter()
            .map(|c| self.quote_ident(c))
            .collect::<Result<Vec<_>, _>>()?
            .join(", ");
        let values = rows
            .iter()
            .map(|row| {
                let cells = row
                    .iter()
                    .map(|v| self.literal(v))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("({})", cells)
            })
            .collect::<Vec<_>>()
            .join(", ");

        let verb = match (self, ignore_conflicts) {
            (Dialect::Sqlite, true) => "INSERT OR IGNORE INTO",
            (Dialect::Mysql, true) => "INSERT IGNORE INTO",
            _ => "INSERT INTO",
        };
        let suffix = match (self, ignore_conflicts) {
            (Dialect::Postgres, true) => " ON CONFLICT DO NOTHING",
            _ => "",
        };
        Ok(format!(
            "{} {} ({}) VALUES {}{}",
            verb, table, column_list, values, suffix
        ))
    }
}

/// Infer the storage class of one dataset column from its values.
///
/// Any text forces text; otherwise any real forces real; an all-NULL
/// column defaults to text.
pub fn infer_column_type(dataset: &Dataset, index: usize) -> ColumnType {
    let mut ty: Option<ColumnType> = None;
    for row in dataset.rows() {
        let cell = match &row[index] {
            Value::Null => continue,
            Value::Integer(_) => ColumnType::Integer,
            Value::Real(_) => ColumnType::Real,
            Value::Text(_) => ColumnType::Text,
        };
        ty = Some(match (ty, cell) {
            (None, c) => c,
            (Some(ColumnType::Text), _) | (_, ColumnType::Text) => ColumnType::Text,
            (Some(ColumnType::Real), _) | (_, ColumnType::Real) => ColumnType::Real,
            _ => ColumnType::Integer,
        });
        if ty == Some(ColumnType::Text) {
            break;
        }
    }
    ty.unwrap_or(ColumnType::Text)
}

/// Render the statement sequence that replaces `table` with `dataset`:
/// DROP IF EXISTS, CREATE, then chunked INSERTs.
pub fn render_store(
    dialect: Dialect,
    table: &str,
    dataset: &Dataset,
) -> Result<Vec<String>, QueryError> {
    let quoted = dialect.quote_ident(table)?;

    let column_defs = dataset
        .columns()
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let ty = dialect.column_type(infer_column_type(dataset, i));
            Ok(format!("{} {}", dialect.quote_ident(name)?, ty))
        })
        .collect::<Result<Vec<_>, QueryError>>()?
        .join(", ");

    let mut statements = vec![
        format!("DROP TABLE IF EXISTS {}", quoted),
        format!("CREATE TABLE {} ({})", quoted, column_defs),
    ];
    for chunk in dataset.rows().chunks(INSERT_CHUNK_ROWS) {
        statements.push(dialect.render_insert(table, dataset.columns(), chunk, false)?);
    }
    Ok(statements)
}

// =============================================================================
// Connection configuration
// =============================================================================

/// Backend driver selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Driver {
    Sqlite,
    Mysql,
    Postgres,
}

impl std::str::FromStr for Driver {
    type Err = ConnectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sqlite" => Ok(Driver::Sqlite),
            "mysql" => Ok(Driver::Mysql),
            "postgres" | "postgresql" => Ok(Driver::Postgres),
            other => Err(ConnectionError::InvalidConfig(format!(
                "unknown driver '{}'",
                other
            ))),
        }
    }
}

fn default_host() -> String {
    "localhost".to_string()
}

/// Backend connection descriptor: driver plus host, port, credentials and
/// database name. Purely configuration; validity is checked at connect time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Which backend to connect to.
    pub driver: Driver,

    /// Database file path (SQLite only; omitted = in-memory).
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Server host (client-server backends).
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port (default: 3306 for MySQL, 5432 for PostgreSQL).
    #[serde(default)]
    pub port: Option<u16>,

    /// User name.
    #[serde(default)]
    pub user: String,

    /// Password.
    #[serde(default)]
    pub password: String,

    /// Database name.
    #[serde(default)]
    pub database: String,
}

impl ConnectionConfig {
    /// A file-based SQLite descriptor.
    pub fn sqlite(path: impl Into<PathBuf>) -> Self {
        Self {
            driver: Driver::Sqlite,
            path: Some(path.into()),
            ..Self::in_memory()
        }
    }

    /// An in-memory SQLite descriptor (tests, scratch work).
    pub fn in_memory() -> Self {
        Self {
            driver: Driver::Sqlite,
            path: None,
            host: default_host(),
            port: None,
            user: String::new(),
            password: String::new(),
            database: String::new(),
        }
    }

    /// Read the descriptor from `SIPHON_*` environment variables.
    ///
    /// `SIPHON_DRIVER` is required; the rest default like the serde
    /// representation. A `.env` file is honored if the caller loaded it
    /// (the CLI does, via `dotenvy`).
    pub fn from_env() -> Result<Self, ConnectionError> {
        let driver: Driver = std::env::var("SIPHON_DRIVER")
            .map_err(|_| ConnectionError::MissingEnv("SIPHON_DRIVER".to_string()))?
            .parse()?;
        let port = match std::env::var("SIPHON_PORT") {
            Ok(p) => Some(p.parse::<u16>().map_err(|_| {
                ConnectionError::InvalidConfig(format!("invalid SIPHON_PORT '{}'", p))
            })?),
            Err(_) => None,
        };
        Ok(Self {
            driver,
            path: std::env::var("SIPHON_PATH").ok().map(PathBuf::from),
            host: std::env::var("SIPHON_HOST").unwrap_or_else(|_| default_host()),
            port,
            user: std::env::var("SIPHON_USER").unwrap_or_default(),
            password: std::env::var("SIPHON_PASSWORD").unwrap_or_default(),
            database: std::env::var("SIPHON_DATABASE").unwrap_or_default(),
        })
    }

    /// Effective port, falling back to the driver's default.
    pub fn port(&self) -> u16 {
        self.port.unwrap_or(match self.driver {
            Driver::Mysql => 3306,
            Driver::Postgres => 5432,
            Driver::Sqlite => 0,
        })
    }

    /// Open a connection to the configured backend.
    pub fn connect(&self) -> Result<Box<dyn Backend>, ConnectionError> {
        match self.driver {
            Driver::Sqlite => Ok(Box::new(SqliteBackend::open(self.path.as_deref())?)),
            Driver::Mysql => {
                self.require_database()?;
                Ok(Box::new(MysqlBackend::connect(self)?))
            }
            Driver::Postgres => {
                self.require_database()?;
                Ok(Box::new(PostgresBackend::connect(self)?))
            }
        }
    }

    fn require_database(&self) -> Result<(), ConnectionError> {
        if self.database.is_empty() {
            return Err(ConnectionError::InvalidConfig(
                "database name is required for client-server backends".to_string(),
            ));
        }
        Ok(())
    }
}
