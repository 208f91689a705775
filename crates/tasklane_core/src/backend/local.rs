//! SQLite-backed development backend.
//!
//! # Responsibility
//! - Implement the auth and row APIs over a local SQLite store so the core can
//!   run end-to-end without a network service.
//! - Emulate row-level security: every data call is scoped to the user behind
//!   the backend-held session.
//!
//! # Invariants
//! - Rows of one user are never visible to, or writable by, another user.
//! - Inserts naming a different owner are rejected; omitted owners default to
//!   the acting user.
//! - Auth listeners are invoked synchronously, after the session is stored,
//!   and must not register further listeners.

use crate::backend::{
    AuthApi, AuthChangeEvent, AuthListener, BackendError, BackendResult, DataApi, Embed, Row,
    SelectQuery, Table,
};
use crate::db::{open_db, open_db_in_memory, DbResult};
use crate::model::user::{AuthResponse, AuthSession, Profile, User, UserId};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use log::{debug, info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, ErrorCode, OptionalExtension};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

const MIN_PASSWORD_CHARS: usize = 6;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Text,
    Bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Access {
    /// Assigned by the backend.
    Generated,
    /// Settable at insert, immutable afterwards.
    InsertOnly,
    Writable,
}

#[derive(Debug, Clone, Copy)]
struct Column {
    name: &'static str,
    kind: ColumnKind,
    access: Access,
    /// Table whose row this column points at; it must be owned by the caller.
    references: Option<Table>,
}

const fn col(name: &'static str, kind: ColumnKind, access: Access) -> Column {
    Column {
        name,
        kind,
        access,
        references: None,
    }
}

const fn foreign(name: &'static str, references: Table) -> Column {
    Column {
        name,
        kind: ColumnKind::Text,
        access: Access::Writable,
        references: Some(references),
    }
}

const OWNER_COLUMN: &str = "user_id";

const TASK_COLUMNS: &[Column] = &[
    col("id", ColumnKind::Text, Access::Generated),
    col("title", ColumnKind::Text, Access::Writable),
    col("description", ColumnKind::Text, Access::Writable),
    col("completed", ColumnKind::Bool, Access::Writable),
    col("priority", ColumnKind::Text, Access::Writable),
    col("due_date", ColumnKind::Text, Access::Writable),
    col("created_at", ColumnKind::Text, Access::Generated),
    col("updated_at", ColumnKind::Text, Access::Generated),
    col(OWNER_COLUMN, ColumnKind::Text, Access::InsertOnly),
    foreign("project_id", Table::Projects),
];

const PROJECT_COLUMNS: &[Column] = &[
    col("id", ColumnKind::Text, Access::Generated),
    col("name", ColumnKind::Text, Access::Writable),
    col("description", ColumnKind::Text, Access::Writable),
    col("color", ColumnKind::Text, Access::Writable),
    col("created_at", ColumnKind::Text, Access::Generated),
    col("updated_at", ColumnKind::Text, Access::Generated),
    col(OWNER_COLUMN, ColumnKind::Text, Access::InsertOnly),
];

fn columns_of(table: Table) -> &'static [Column] {
    match table {
        Table::Tasks => TASK_COLUMNS,
        Table::Projects => PROJECT_COLUMNS,
    }
}

/// Development backend over one SQLite connection.
pub struct LocalBackend {
    conn: Mutex<Connection>,
    session: Mutex<Option<AuthSession>>,
    listeners: Mutex<Vec<AuthListener>>,
}

impl LocalBackend {
    /// Opens (or creates) a file-backed store.
    pub fn open(path: impl AsRef<Path>) -> DbResult<Self> {
        Ok(Self::with_connection(open_db(path)?))
    }

    /// Opens a private in-memory store.
    pub fn open_in_memory() -> DbResult<Self> {
        Ok(Self::with_connection(open_db_in_memory()?))
    }

    fn with_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
            session: Mutex::new(None),
            listeners: Mutex::new(Vec::new()),
        }
    }

    /// Reads the profile row created at sign-up.
    pub fn profile(&self, user_id: UserId) -> BackendResult<Option<Profile>> {
        let conn = lock(&self.conn);
        let row = conn
            .query_row(
                "SELECT id, username, full_name, avatar_url, created_at, updated_at
                 FROM profiles WHERE id = ?1;",
                [user_id.to_string()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        row.get::<_, Option<String>>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, String>(5)?,
                    ))
                },
            )
            .optional()
            .map_err(storage_error)?;

        let Some((id, username, full_name, avatar_url, created_at, updated_at)) = row else {
            return Ok(None);
        };
        Ok(Some(Profile {
            id: parse_uuid(&id, "profiles.id")?,
            username,
            full_name,
            avatar_url,
            created_at: parse_timestamp(&created_at, "profiles.created_at")?,
            updated_at: parse_timestamp(&updated_at, "profiles.updated_at")?,
        }))
    }

    fn acting_user_id(&self) -> Option<UserId> {
        lock(&self.session).as_ref().map(|session| session.user.id)
    }

    fn start_session(&self, user: User) -> AuthSession {
        let session = AuthSession {
            access_token: Uuid::new_v4().simple().to_string(),
            user,
            expires_at: None,
        };
        *lock(&self.session) = Some(session.clone());
        self.emit(AuthChangeEvent::SignedIn, Some(&session));
        session
    }

    fn emit(&self, event: AuthChangeEvent, session: Option<&AuthSession>) {
        let listeners = lock(&self.listeners);
        debug!(
            "event=auth_emit module=local_backend status=ok kind={} listeners={}",
            event.as_str(),
            listeners.len()
        );
        for listener in listeners.iter() {
            listener(event, session);
        }
    }

    fn load_user_by_id(conn: &Connection, id: UserId) -> BackendResult<Option<User>> {
        let row = conn
            .query_row(
                "SELECT id, email, user_metadata, created_at FROM users WHERE id = ?1;",
                [id.to_string()],
                user_columns,
            )
            .optional()
            .map_err(storage_error)?;
        row.map(decode_user).transpose()
    }

    fn select_visible(
        conn: &Connection,
        table: Table,
        owner: UserId,
        id: Option<Uuid>,
        embed: Option<Embed>,
    ) -> BackendResult<Vec<Row>> {
        let columns = columns_of(table);
        let mut sql = format!(
            "{} WHERE {OWNER_COLUMN} = ?1",
            select_sql(table, columns)
        );
        let mut binds = vec![SqlValue::Text(owner.to_string())];
        if let Some(id) = id {
            sql.push_str(" AND id = ?2");
            binds.push(SqlValue::Text(id.to_string()));
        }
        sql.push_str(" ORDER BY created_at DESC, rowid DESC;");

        let mut stmt = conn.prepare(&sql).map_err(storage_error)?;
        let mut rows = stmt
            .query(params_from_iter(binds))
            .map_err(storage_error)?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().map_err(storage_error)? {
            out.push(read_row(row, columns).map_err(storage_error)?);
        }

        if let Some(embed) = embed {
            for row in &mut out {
                attach_embed(conn, row, embed, owner)?;
            }
        }
        Ok(out)
    }

    fn select_one(
        conn: &Connection,
        table: Table,
        owner: UserId,
        id: Uuid,
        embed: Option<Embed>,
    ) -> BackendResult<Option<Row>> {
        Ok(Self::select_visible(conn, table, owner, Some(id), embed)?
            .into_iter()
            .next())
    }
}

#[async_trait]
impl AuthApi for LocalBackend {
    async fn get_session(&self) -> BackendResult<Option<AuthSession>> {
        Ok(lock(&self.session).clone())
    }

    fn on_session_change(&self, listener: AuthListener) {
        let current = lock(&self.session).clone();
        // Why: a listener registered after sign-in would otherwise miss the
        // state it must start from until the next transition.
        listener(AuthChangeEvent::InitialSession, current.as_ref());
        lock(&self.listeners).push(listener);
    }

    async fn get_current_user(&self) -> BackendResult<Option<User>> {
        let Some(id) = self.acting_user_id() else {
            return Ok(None);
        };
        let conn = lock(&self.conn);
        Self::load_user_by_id(&conn, id)
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: Row,
    ) -> BackendResult<AuthResponse> {
        let email = normalize_email(email)?;
        if password.chars().count() < MIN_PASSWORD_CHARS {
            return Err(BackendError::new(
                "weak_password",
                format!("Password should be at least {MIN_PASSWORD_CHARS} characters."),
            )
            .with_status(422));
        }

        let user = {
            let mut conn = lock(&self.conn);
            let exists = conn
                .query_row("SELECT 1 FROM users WHERE email = ?1;", [&email], |_| Ok(()))
                .optional()
                .map_err(storage_error)?
                .is_some();
            if exists {
                return Err(
                    BackendError::new("user_already_exists", "User already registered")
                        .with_status(422),
                );
            }

            let user = User {
                id: Uuid::new_v4(),
                email: email.clone(),
                user_metadata: metadata,
                created_at: Utc::now(),
            };
            let salt = Uuid::new_v4().simple().to_string();
            let created_at = format_timestamp(user.created_at);
            let metadata_text =
                serde_json::to_string(&user.user_metadata).map_err(|err| {
                    BackendError::new("invalid_metadata", err.to_string()).with_status(400)
                })?;

            let tx = conn.transaction().map_err(storage_error)?;
            tx.execute(
                "INSERT INTO users (id, email, password_salt, password_hash, user_metadata, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
                params![
                    user.id.to_string(),
                    user.email,
                    salt,
                    hash_password(&salt, password),
                    metadata_text,
                    created_at,
                ],
            )
            .map_err(storage_error)?;
            if let Some(username) = user.username().map(str::trim).filter(|name| !name.is_empty()) {
                tx.execute(
                    "INSERT INTO profiles (id, username, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?3);",
                    params![user.id.to_string(), username, created_at],
                )
                .map_err(storage_error)?;
            }
            tx.commit().map_err(storage_error)?;
            user
        };

        info!(
            "event=auth_sign_up module=local_backend status=ok user_id={}",
            user.id
        );
        let session = self.start_session(user.clone());
        Ok(AuthResponse {
            user: Some(user),
            session: Some(session),
        })
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> BackendResult<AuthResponse> {
        let email = email.trim().to_ascii_lowercase();
        let user = {
            let conn = lock(&self.conn);
            let credentials = conn
                .query_row(
                    "SELECT id, password_salt, password_hash FROM users WHERE email = ?1;",
                    [&email],
                    |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, String>(2)?,
                        ))
                    },
                )
                .optional()
                .map_err(storage_error)?;

            let user_id = match credentials {
                Some((id, salt, hash)) if hash_password(&salt, password) == hash => {
                    parse_uuid(&id, "users.id")?
                }
                _ => {
                    warn!("event=auth_sign_in module=local_backend status=error error_code=invalid_credentials");
                    return Err(invalid_credentials());
                }
            };
            Self::load_user_by_id(&conn, user_id)?.ok_or_else(invalid_credentials)?
        };

        info!(
            "event=auth_sign_in module=local_backend status=ok user_id={}",
            user.id
        );
        let session = self.start_session(user.clone());
        Ok(AuthResponse {
            user: Some(user),
            session: Some(session),
        })
    }

    async fn sign_out(&self) -> BackendResult<()> {
        let previous = lock(&self.session).take();
        if let Some(session) = &previous {
            info!(
                "event=auth_sign_out module=local_backend status=ok user_id={}",
                session.user.id
            );
        }
        self.emit(AuthChangeEvent::SignedOut, None);
        Ok(())
    }
}

#[async_trait]
impl DataApi for LocalBackend {
    async fn select(&self, table: Table, query: &SelectQuery) -> BackendResult<Vec<Row>> {
        // Anonymous or foreign-owner reads see nothing, like a row-level policy.
        match self.acting_user_id() {
            Some(acting) if acting == query.owner => {
                let conn = lock(&self.conn);
                Self::select_visible(&conn, table, acting, None, query.embed)
            }
            _ => Ok(Vec::new()),
        }
    }

    async fn insert(&self, table: Table, row: Row, embed: Option<Embed>) -> BackendResult<Row> {
        let acting = self
            .acting_user_id()
            .ok_or_else(|| row_level_security(table, 401))?;
        let columns = columns_of(table);
        let conn = lock(&self.conn);

        let mut names = Vec::new();
        let mut binds = Vec::new();
        let mut owner_given = false;
        for (key, value) in row {
            let column = find_column(columns, table, &key)?;
            if column.access == Access::Generated {
                return Err(read_only_column(table, &key));
            }
            if column.name == OWNER_COLUMN {
                if value.as_str() != Some(acting.to_string().as_str()) {
                    return Err(row_level_security(table, 403));
                }
                owner_given = true;
            }
            ensure_owned_reference(&conn, table, column, &value, acting)?;
            binds.push(to_sql_value(column, value)?);
            names.push(column.name);
        }
        if !owner_given {
            names.push(OWNER_COLUMN);
            binds.push(SqlValue::Text(acting.to_string()));
        }

        let id = Uuid::new_v4();
        let now = format_timestamp(Utc::now());
        names.extend(["id", "created_at", "updated_at"]);
        binds.push(SqlValue::Text(id.to_string()));
        binds.push(SqlValue::Text(now.clone()));
        binds.push(SqlValue::Text(now));

        let placeholders = (1..=names.len())
            .map(|index| format!("?{index}"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "INSERT INTO {table} ({}) VALUES ({placeholders});",
            names.join(", ")
        );

        conn.execute(&sql, params_from_iter(binds))
            .map_err(storage_error)?;
        debug!("event=row_insert module=local_backend status=ok table={table} id={id}");

        Self::select_one(&conn, table, acting, id, embed)?.ok_or_else(|| {
            BackendError::new("storage_failure", format!("inserted row {id} not readable"))
                .with_status(500)
        })
    }

    async fn update(
        &self,
        table: Table,
        id: Uuid,
        patch: Row,
        embed: Option<Embed>,
    ) -> BackendResult<Option<Row>> {
        let Some(acting) = self.acting_user_id() else {
            return Ok(None);
        };
        let columns = columns_of(table);
        let conn = lock(&self.conn);

        let mut assignments = Vec::new();
        let mut binds = Vec::new();
        for (key, value) in patch {
            let column = find_column(columns, table, &key)?;
            if column.access != Access::Writable {
                return Err(read_only_column(table, &key));
            }
            ensure_owned_reference(&conn, table, column, &value, acting)?;
            binds.push(to_sql_value(column, value)?);
            assignments.push(format!("{} = ?{}", column.name, binds.len()));
        }
        binds.push(SqlValue::Text(format_timestamp(Utc::now())));
        assignments.push(format!("updated_at = ?{}", binds.len()));
        binds.push(SqlValue::Text(id.to_string()));
        let id_index = binds.len();
        binds.push(SqlValue::Text(acting.to_string()));
        let owner_index = binds.len();

        let sql = format!(
            "UPDATE {table} SET {} WHERE id = ?{id_index} AND {OWNER_COLUMN} = ?{owner_index};",
            assignments.join(", ")
        );

        let changed = conn
            .execute(&sql, params_from_iter(binds))
            .map_err(storage_error)?;
        if changed == 0 {
            debug!("event=row_update module=local_backend status=miss table={table} id={id}");
            return Ok(None);
        }
        Self::select_one(&conn, table, acting, id, embed)
    }

    async fn delete(&self, table: Table, id: Uuid) -> BackendResult<()> {
        let Some(acting) = self.acting_user_id() else {
            return Ok(());
        };
        let conn = lock(&self.conn);
        let removed = conn
            .execute(
                &format!("DELETE FROM {table} WHERE id = ?1 AND {OWNER_COLUMN} = ?2;"),
                params![id.to_string(), acting.to_string()],
            )
            .map_err(storage_error)?;
        debug!(
            "event=row_delete module=local_backend status=ok table={table} id={id} removed={removed}"
        );
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn select_sql(table: Table, columns: &[Column]) -> String {
    let names = columns
        .iter()
        .map(|column| column.name)
        .collect::<Vec<_>>()
        .join(", ");
    format!("SELECT {names} FROM {table}")
}

fn read_row(row: &rusqlite::Row<'_>, columns: &[Column]) -> rusqlite::Result<Row> {
    let mut out = Row::new();
    for (index, column) in columns.iter().enumerate() {
        let value = match column.kind {
            ColumnKind::Text => row
                .get::<_, Option<String>>(index)?
                .map_or(Value::Null, Value::String),
            ColumnKind::Bool => row
                .get::<_, Option<i64>>(index)?
                .map_or(Value::Null, |flag| Value::Bool(flag != 0)),
        };
        out.insert(column.name.to_string(), value);
    }
    Ok(out)
}

fn attach_embed(conn: &Connection, row: &mut Row, embed: Embed, owner: UserId) -> BackendResult<()> {
    let related = match row.get(embed.foreign_key).and_then(Value::as_str) {
        Some(foreign_id) => {
            let foreign_id = parse_uuid(foreign_id, embed.foreign_key)?;
            LocalBackend::select_one(conn, embed.table, owner, foreign_id, None)?
                .map_or(Value::Null, Value::Object)
        }
        None => Value::Null,
    };
    row.insert(embed.alias.to_string(), related);
    Ok(())
}

fn find_column(columns: &'static [Column], table: Table, key: &str) -> BackendResult<Column> {
    columns
        .iter()
        .find(|column| column.name == key)
        .copied()
        .ok_or_else(|| {
            BackendError::new(
                "unknown_column",
                format!("column `{key}` does not exist on table `{table}`"),
            )
            .with_status(400)
        })
}

/// Rejects references to rows the acting user does not own, including rows
/// that do not exist, so foreign ids are indistinguishable from missing ones.
fn ensure_owned_reference(
    conn: &Connection,
    table: Table,
    column: Column,
    value: &Value,
    acting: UserId,
) -> BackendResult<()> {
    let (Some(target), Some(target_id)) = (column.references, value.as_str()) else {
        return Ok(());
    };
    let owned = conn
        .query_row(
            &format!("SELECT 1 FROM {target} WHERE id = ?1 AND {OWNER_COLUMN} = ?2;"),
            params![target_id, acting.to_string()],
            |_| Ok(()),
        )
        .optional()
        .map_err(storage_error)?
        .is_some();
    if owned {
        Ok(())
    } else {
        Err(row_level_security(table, 403))
    }
}

fn row_level_security(table: Table, status: u16) -> BackendError {
    BackendError::new(
        "row_level_security",
        format!("new row violates row-level security policy for table \"{table}\""),
    )
    .with_status(status)
}

fn read_only_column(table: Table, key: &str) -> BackendError {
    BackendError::new(
        "read_only_column",
        format!("column `{key}` on table `{table}` cannot be written"),
    )
    .with_status(400)
}

fn to_sql_value(column: Column, value: Value) -> BackendResult<SqlValue> {
    match (column.kind, value) {
        (_, Value::Null) => Ok(SqlValue::Null),
        (ColumnKind::Text, Value::String(text)) => Ok(SqlValue::Text(text)),
        (ColumnKind::Bool, Value::Bool(flag)) => Ok(SqlValue::Integer(i64::from(flag))),
        (_, other) => Err(BackendError::new(
            "invalid_value",
            format!("invalid value `{other}` for column `{}`", column.name),
        )
        .with_status(400)),
    }
}

fn storage_error(err: rusqlite::Error) -> BackendError {
    let constraint = matches!(
        &err,
        rusqlite::Error::SqliteFailure(failure, _) if failure.code == ErrorCode::ConstraintViolation
    );
    if constraint {
        BackendError::new("constraint_violation", err.to_string()).with_status(400)
    } else {
        BackendError::new("storage_failure", err.to_string()).with_status(500)
    }
}

fn invalid_credentials() -> BackendError {
    BackendError::new("invalid_credentials", "Invalid login credentials").with_status(400)
}

fn normalize_email(email: &str) -> BackendResult<String> {
    let normalized = email.trim().to_ascii_lowercase();
    if !EMAIL_RE.is_match(&normalized) {
        return Err(BackendError::new(
            "validation_failed",
            "Unable to validate email address: invalid format",
        )
        .with_status(400));
    }
    Ok(normalized)
}

fn hash_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(b":");
    hasher.update(password.as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect()
}

type UserColumns = (String, String, String, String);

fn user_columns(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserColumns> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

fn decode_user((id, email, metadata, created_at): UserColumns) -> BackendResult<User> {
    let user_metadata = serde_json::from_str::<Map<String, Value>>(&metadata).map_err(|err| {
        BackendError::new(
            "invalid_row",
            format!("invalid users.user_metadata: {err}"),
        )
        .with_status(500)
    })?;
    Ok(User {
        id: parse_uuid(&id, "users.id")?,
        email,
        user_metadata,
        created_at: parse_timestamp(&created_at, "users.created_at")?,
    })
}

fn parse_uuid(value: &str, field: &str) -> BackendResult<Uuid> {
    Uuid::parse_str(value).map_err(|_| {
        BackendError::new("invalid_row", format!("invalid uuid `{value}` in {field}"))
            .with_status(500)
    })
}

fn parse_timestamp(value: &str, field: &str) -> BackendResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|_| {
            BackendError::new(
                "invalid_row",
                format!("invalid timestamp `{value}` in {field}"),
            )
            .with_status(500)
        })
}

fn format_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}
