//! Storage seam: structured queries in, rows out; every write goes through
//! a named procedure.

use std::path::Path;
use std::sync::{LazyLock, Mutex, MutexGuard};

use regex::Regex;
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{Connection, ErrorCode, ffi};
use serde_json::Value;
use tracing::debug;

use crate::error::StoreError;
use crate::procedures;

static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern"));

static FAILED_COLUMNS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"constraint failed: ([\w.]+(?:, [\w.]+)*)").expect("constraint pattern")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Operator {
    #[default]
    In,
    LessThan,
    GreaterThan,
}

/// `key <op> values`. `In` matches any of the values; the comparison
/// operators must hold for all of them.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub key: String,
    pub values: Vec<Value>,
    pub operator: Operator,
}

impl Filter {
    pub fn eq(key: &str, value: impl Into<Value>) -> Self {
        Self {
            key: key.to_string(),
            values: vec![value.into()],
            operator: Operator::In,
        }
    }

    pub fn any<I, V>(key: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self {
            key: key.to_string(),
            values: values.into_iter().map(Into::into).collect(),
            operator: Operator::In,
        }
    }

    pub fn less_than(key: &str, value: impl Into<Value>) -> Self {
        Self {
            operator: Operator::LessThan,
            ..Self::eq(key, value)
        }
    }

    pub fn greater_than(key: &str, value: impl Into<Value>) -> Self {
        Self {
            operator: Operator::GreaterThan,
            ..Self::eq(key, value)
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ordering {
    pub key: String,
    pub descending: bool,
}

#[derive(Debug, Clone, Default)]
pub struct QueryDesc {
    pub props: Vec<String>,
    pub table: String,
    pub filters: Vec<Filter>,
    pub ordering: Option<Ordering>,
}

impl QueryDesc {
    pub fn new(table: &str, props: &[&str]) -> Self {
        Self {
            props: props.iter().map(|p| p.to_string()).collect(),
            table: table.to_string(),
            filters: Vec::new(),
            ordering: None,
        }
    }

    pub fn filtered(mut self, filters: impl IntoIterator<Item = Filter>) -> Self {
        self.filters.extend(filters);
        self
    }

    pub fn ordered_by(mut self, key: &str, descending: bool) -> Self {
        self.ordering = Some(Ordering {
            key: key.to_string(),
            descending,
        });
        self
    }

    /// SQL text and bound parameters for this query.
    pub fn generate(&self) -> Result<(String, Vec<SqlValue>), StoreError> {
        if self.props.is_empty() {
            return Err(StoreError::InvalidQuery("no property requested".to_string()));
        }
        check_identifier(&self.table)?;
        for prop in &self.props {
            check_identifier(prop)?;
        }

        let mut sql = format!("SELECT {} FROM {}", self.props.join(", "), self.table);
        let mut params = Vec::new();
        let mut clauses = Vec::new();

        for filter in &self.filters {
            check_identifier(&filter.key)?;
            let clause = match filter.operator {
                Operator::In if filter.values.is_empty() => "1 = 0".to_string(),
                Operator::In => format!(
                    "{} IN ({})",
                    filter.key,
                    vec!["?"; filter.values.len()].join(", ")
                ),
                Operator::LessThan | Operator::GreaterThan if filter.values.is_empty() => {
                    return Err(StoreError::InvalidQuery(format!(
                        "comparison on \"{}\" without value",
                        filter.key
                    )));
                }
                Operator::LessThan | Operator::GreaterThan => {
                    let op = if filter.operator == Operator::LessThan { "<" } else { ">" };
                    filter
                        .values
                        .iter()
                        .map(|_| format!("{} {} ?", filter.key, op))
                        .collect::<Vec<_>>()
                        .join(" AND ")
                }
            };
            clauses.push(clause);
            params.extend(filter.values.iter().map(to_sql));
        }

        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }

        if let Some(ordering) = &self.ordering {
            check_identifier(&ordering.key)?;
            sql.push_str(&format!(
                " ORDER BY {}{}",
                ordering.key,
                if ordering.descending { " DESC" } else { "" }
            ));
        }

        Ok((sql, params))
    }
}

fn check_identifier(ident: &str) -> Result<(), StoreError> {
    if IDENTIFIER.is_match(ident) {
        Ok(())
    } else {
        Err(StoreError::InvalidQuery(format!("invalid identifier \"{ident}\"")))
    }
}

/// A call to a named procedure. Arguments are JSON documents.
#[derive(Debug, Clone)]
pub struct InsertReq {
    pub script: String,
    pub args: Vec<Value>,
    pub skip_return: bool,
}

impl InsertReq {
    pub fn new(script: &str, args: Vec<Value>) -> Self {
        Self {
            script: script.to_string(),
            args,
            skip_return: false,
        }
    }

    pub fn skip_return(mut self) -> Self {
        self.skip_return = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    values: Vec<(String, Value)>,
}

impl Row {
    pub fn new(values: Vec<(String, Value)>) -> Self {
        Self { values }
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    pub fn str(&self, column: &str) -> Result<String, StoreError> {
        self.get(column)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| StoreError::Column(column.to_string()))
    }

    pub fn i64(&self, column: &str) -> Result<i64, StoreError> {
        self.get(column)
            .and_then(Value::as_i64)
            .ok_or_else(|| StoreError::Column(column.to_string()))
    }

    pub fn f64(&self, column: &str) -> Result<f64, StoreError> {
        self.get(column)
            .and_then(Value::as_f64)
            .ok_or_else(|| StoreError::Column(column.to_string()))
    }
}

pub type Rows = Vec<Row>;

/// Transactional store reachable through structured reads and named,
/// idempotent procedures.
pub trait Store: Send + Sync {
    fn fetch_from_db(&self, query: &QueryDesc) -> Result<Rows, StoreError>;

    fn insert_to_db(&self, req: &InsertReq) -> Result<(), StoreError>;
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        let rusqlite::Error::SqliteFailure(failure, Some(msg)) = &err else {
            return StoreError::Sqlite(err);
        };
        if failure.code != ErrorCode::ConstraintViolation {
            return StoreError::Sqlite(err);
        }

        match failure.extended_code {
            ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                let mut table = String::new();
                let mut columns = Vec::new();
                if let Some(cap) = FAILED_COLUMNS.captures(msg) {
                    for qualified in cap[1].split(", ") {
                        let (t, c) = qualified.split_once('.').unwrap_or(("", qualified));
                        table = t.to_string();
                        columns.push(c.to_string());
                    }
                }
                StoreError::Duplicate { table, columns }
            }
            ffi::SQLITE_CONSTRAINT_FOREIGNKEY => StoreError::ForeignKey(msg.clone()),
            ffi::SQLITE_CONSTRAINT_CHECK => StoreError::Check(msg.clone()),
            _ => StoreError::Sqlite(err),
        }
    }
}

fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(*b as i64),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => SqlValue::Real(n.as_f64().unwrap_or(0.0)),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

fn to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null | ValueRef::Blob(_) => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
    }
}

/// SQLite-backed store owning the schema and the procedures.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::with_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Store for SqliteStore {
    fn fetch_from_db(&self, query: &QueryDesc) -> Result<Rows, StoreError> {
        let (sql, params) = query.generate()?;
        let conn = self.conn();
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query(rusqlite::params_from_iter(params.iter()))?;

        let mut results = Vec::new();
        while let Some(row) = rows.next()? {
            let mut values = Vec::with_capacity(query.props.len());
            for (idx, prop) in query.props.iter().enumerate() {
                values.push((prop.clone(), to_json(row.get_ref(idx)?)));
            }
            results.push(Row::new(values));
        }
        Ok(results)
    }

    fn insert_to_db(&self, req: &InsertReq) -> Result<(), StoreError> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let changed = procedures::run(&tx, &req.script, &req.args)?;
        tx.commit()?;

        if !req.skip_return {
            debug!(script = %req.script, changed, "db.procedure");
        }
        Ok(())
    }
}

/// Initialize the database schema
pub fn init_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        r#"
        -- Content: read-only reference tables
        CREATE TABLE IF NOT EXISTS resources (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            base_amount REAL NOT NULL DEFAULT 0,
            base_production REAL NOT NULL DEFAULT 0,
            base_storage REAL NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS elements (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            kind TEXT NOT NULL CHECK (kind IN ('building', 'technology', 'ship', 'defense')),
            UNIQUE (kind, name)
        );

        CREATE TABLE IF NOT EXISTS progress_costs (
            element TEXT PRIMARY KEY REFERENCES elements(id),
            progression REAL NOT NULL CHECK (progression > 0)
        );

        CREATE TABLE IF NOT EXISTS element_costs (
            element TEXT NOT NULL REFERENCES elements(id),
            res TEXT NOT NULL REFERENCES resources(id),
            cost INTEGER NOT NULL CHECK (cost >= 0),
            PRIMARY KEY (element, res)
        );

        CREATE TABLE IF NOT EXISTS tech_dependencies (
            element TEXT NOT NULL REFERENCES elements(id),
            requirement TEXT NOT NULL REFERENCES elements(id),
            level INTEGER NOT NULL CHECK (level > 0),
            PRIMARY KEY (element, requirement)
        );

        CREATE TABLE IF NOT EXISTS production_rules (
            element TEXT NOT NULL REFERENCES elements(id),
            res TEXT NOT NULL REFERENCES resources(id),
            base REAL NOT NULL,
            progression REAL NOT NULL,
            temperature_coeff REAL NOT NULL DEFAULT 0,
            temperature_offset REAL NOT NULL DEFAULT 1,
            PRIMARY KEY (element, res)
        );

        CREATE TABLE IF NOT EXISTS storage_rules (
            element TEXT NOT NULL REFERENCES elements(id),
            res TEXT NOT NULL REFERENCES resources(id),
            base REAL NOT NULL,
            progression REAL NOT NULL,
            PRIMARY KEY (element, res)
        );

        -- Game state
        CREATE TABLE IF NOT EXISTS accounts (
            id TEXT PRIMARY KEY,
            mail TEXT NOT NULL UNIQUE
        );

        CREATE TABLE IF NOT EXISTS universes (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            economic_speed INTEGER NOT NULL,
            fleet_speed INTEGER NOT NULL,
            research_speed INTEGER NOT NULL,
            fleets_to_ruins_ratio REAL NOT NULL,
            defenses_to_ruins_ratio REAL NOT NULL,
            fleets_consumption_ratio REAL NOT NULL,
            galaxies_count INTEGER NOT NULL CHECK (galaxies_count > 0),
            galaxy_size INTEGER NOT NULL CHECK (galaxy_size > 0),
            solar_system_size INTEGER NOT NULL CHECK (solar_system_size > 0)
        );

        CREATE TABLE IF NOT EXISTS players (
            id TEXT PRIMARY KEY,
            account TEXT NOT NULL REFERENCES accounts(id),
            universe TEXT NOT NULL REFERENCES universes(id),
            name TEXT NOT NULL,
            UNIQUE (account, universe),
            UNIQUE (universe, name)
        );

        CREATE TABLE IF NOT EXISTS player_technologies (
            player TEXT NOT NULL REFERENCES players(id) ON DELETE CASCADE,
            technology TEXT NOT NULL REFERENCES elements(id),
            level INTEGER NOT NULL CHECK (level >= 0),
            PRIMARY KEY (player, technology)
        );

        CREATE TABLE IF NOT EXISTS planets (
            id TEXT PRIMARY KEY,
            player TEXT NOT NULL REFERENCES players(id),
            universe TEXT NOT NULL REFERENCES universes(id),
            name TEXT NOT NULL,
            galaxy INTEGER NOT NULL,
            solar_system INTEGER NOT NULL,
            position INTEGER NOT NULL,
            fields INTEGER NOT NULL CHECK (fields >= 0),
            min_temperature REAL NOT NULL,
            max_temperature REAL NOT NULL,
            diameter INTEGER NOT NULL,
            UNIQUE (universe, galaxy, solar_system, position)
        );

        CREATE TABLE IF NOT EXISTS planet_resources (
            planet TEXT NOT NULL REFERENCES planets(id) ON DELETE CASCADE,
            res TEXT NOT NULL REFERENCES resources(id),
            amount REAL NOT NULL CHECK (amount >= 0),
            production REAL NOT NULL,
            storage_capacity REAL NOT NULL,
            updated_at INTEGER NOT NULL,
            PRIMARY KEY (planet, res)
        );

        CREATE TABLE IF NOT EXISTS planet_buildings (
            planet TEXT NOT NULL REFERENCES planets(id) ON DELETE CASCADE,
            building TEXT NOT NULL REFERENCES elements(id),
            level INTEGER NOT NULL CHECK (level >= 0),
            PRIMARY KEY (planet, building)
        );

        CREATE TABLE IF NOT EXISTS planet_ships (
            planet TEXT NOT NULL REFERENCES planets(id) ON DELETE CASCADE,
            ship TEXT NOT NULL REFERENCES elements(id),
            count INTEGER NOT NULL CHECK (count >= 0),
            PRIMARY KEY (planet, ship)
        );

        CREATE TABLE IF NOT EXISTS planet_defenses (
            planet TEXT NOT NULL REFERENCES planets(id) ON DELETE CASCADE,
            defense TEXT NOT NULL REFERENCES elements(id),
            count INTEGER NOT NULL CHECK (count >= 0),
            PRIMARY KEY (planet, defense)
        );

        CREATE TABLE IF NOT EXISTS fleets (
            id TEXT PRIMARY KEY,
            universe TEXT NOT NULL REFERENCES universes(id),
            name TEXT NOT NULL,
            objective TEXT NOT NULL,
            galaxy INTEGER NOT NULL,
            solar_system INTEGER NOT NULL,
            position INTEGER NOT NULL
        );

        -- Pending upgrade actions
        CREATE TABLE IF NOT EXISTS construction_actions_buildings (
            id TEXT PRIMARY KEY,
            planet TEXT NOT NULL UNIQUE REFERENCES planets(id) ON DELETE CASCADE,
            element TEXT NOT NULL REFERENCES elements(id),
            current_level INTEGER NOT NULL CHECK (current_level >= 0),
            desired_level INTEGER NOT NULL CHECK (desired_level >= 0),
            completion_time INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS construction_actions_buildings_production_effects (
            action TEXT NOT NULL REFERENCES construction_actions_buildings(id) ON DELETE CASCADE,
            res TEXT NOT NULL REFERENCES resources(id),
            production_change REAL NOT NULL,
            PRIMARY KEY (action, res)
        );

        CREATE TABLE IF NOT EXISTS construction_actions_buildings_storage_effects (
            action TEXT NOT NULL REFERENCES construction_actions_buildings(id) ON DELETE CASCADE,
            res TEXT NOT NULL REFERENCES resources(id),
            storage_capacity_change REAL NOT NULL,
            PRIMARY KEY (action, res)
        );

        CREATE TABLE IF NOT EXISTS construction_actions_technologies (
            id TEXT PRIMARY KEY,
            player TEXT NOT NULL UNIQUE REFERENCES players(id) ON DELETE CASCADE,
            planet TEXT NOT NULL REFERENCES planets(id) ON DELETE CASCADE,
            element TEXT NOT NULL REFERENCES elements(id),
            current_level INTEGER NOT NULL CHECK (current_level >= 0),
            desired_level INTEGER NOT NULL CHECK (desired_level >= 0),
            completion_time INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS construction_actions_ships (
            id TEXT PRIMARY KEY,
            planet TEXT NOT NULL REFERENCES planets(id) ON DELETE CASCADE,
            element TEXT NOT NULL REFERENCES elements(id),
            amount INTEGER NOT NULL CHECK (amount > 0),
            remaining INTEGER NOT NULL CHECK (remaining >= 0 AND remaining <= amount),
            unit_duration INTEGER NOT NULL CHECK (unit_duration >= 0),
            started_at INTEGER NOT NULL,
            completion_time INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS construction_actions_defenses (
            id TEXT PRIMARY KEY,
            planet TEXT NOT NULL REFERENCES planets(id) ON DELETE CASCADE,
            element TEXT NOT NULL REFERENCES elements(id),
            amount INTEGER NOT NULL CHECK (amount > 0),
            remaining INTEGER NOT NULL CHECK (remaining >= 0 AND remaining <= amount),
            unit_duration INTEGER NOT NULL CHECK (unit_duration >= 0),
            started_at INTEGER NOT NULL,
            completion_time INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_planets_player ON planets(player);
        CREATE INDEX IF NOT EXISTS idx_players_universe ON players(universe);
        CREATE INDEX IF NOT EXISTS idx_actions_ships_planet ON construction_actions_ships(planet);
        CREATE INDEX IF NOT EXISTS idx_actions_defenses_planet ON construction_actions_defenses(planet);
        "#,
    )?;
    Ok(())
}
