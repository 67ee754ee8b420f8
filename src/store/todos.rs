use chrono::{DateTime, Timelike, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, Type, ValueRef};
use rusqlite::{Connection, OptionalExtension, Row, params};

use super::StoreError;
use crate::core::timestamp::{format_timestamp, parse_timestamp};
use crate::core::todo::{CreateTodoInput, Todo, TodoFilter, TodoPatch, TodoPriority, TodoStatus, non_blank};

const SELECT_TODO: &str = "SELECT id, title, description, status, priority, category, dueDate, createdAt, updatedAt FROM todos";
const NEWEST_FIRST: &str = "ORDER BY createdAt DESC, id DESC";

impl ToSql for TodoStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for TodoStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let raw = value.as_str()?;
        Self::parse(raw).ok_or_else(|| FromSqlError::Other(format!("unknown status {raw:?}").into()))
    }
}

impl ToSql for TodoPriority {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for TodoPriority {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let raw = value.as_str()?;
        Self::parse(raw).ok_or_else(|| FromSqlError::Other(format!("unknown priority {raw:?}").into()))
    }
}

/// An open connection plus the last stamp it handed out.
pub(super) struct Session {
    pub(super) conn: Connection,
    last_stamp: Option<DateTime<Utc>>,
}

impl Session {
    pub(super) fn new(conn: Connection) -> Result<Self, StoreError> {
        let latest: Option<String> = conn.query_row("SELECT MAX(updatedAt) FROM todos", [], |row| row.get(0))?;
        Ok(Self {
            conn,
            last_stamp: latest.as_deref().and_then(parse_timestamp),
        })
    }

    /// Strictly increasing wall-clock stamp at microsecond resolution.
    /// A clock that stalls or steps back still yields a later stamp.
    pub(super) fn next_stamp(&mut self) -> DateTime<Utc> {
        let now = truncate_to_micros(Utc::now());
        let stamp = match self.last_stamp {
            Some(last) if now <= last => last + chrono::Duration::microseconds(1),
            _ => now,
        };
        self.last_stamp = Some(stamp);
        stamp
    }

    pub(super) fn insert(&mut self, input: CreateTodoInput) -> Result<Todo, StoreError> {
        validate_title(&input.title)?;
        let now = self.next_stamp();
        let todo = Todo {
            id: 0,
            title: input.title,
            description: non_blank(input.description),
            status: TodoStatus::Pending,
            priority: input.priority.unwrap_or_default(),
            category: non_blank(input.category),
            due_date: input.due_date,
            created_at: now,
            updated_at: now,
        };

        self.conn.execute(
            r#"
            INSERT INTO todos (title, description, status, priority, category, dueDate, createdAt, updatedAt)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                todo.title,
                todo.description,
                todo.status,
                todo.priority,
                todo.category,
                todo.due_date.map(format_timestamp),
                format_timestamp(todo.created_at),
                format_timestamp(todo.updated_at),
            ],
        )?;

        let id = self.conn.last_insert_rowid();
        self.fetch(id)?
            .ok_or_else(|| StoreError::storage(format!("todo {id} missing right after insert")))
    }

    pub(super) fn fetch(&self, id: i64) -> Result<Option<Todo>, StoreError> {
        Ok(self
            .conn
            .query_row(&format!("{SELECT_TODO} WHERE id = ?1"), params![id], todo_from_row)
            .optional()?)
    }

    /// Merge `patch` over the stored row and persist it. `updatedAt` is
    /// refreshed even when the patch is empty.
    pub(super) fn update(&mut self, id: i64, patch: &TodoPatch) -> Result<Todo, StoreError> {
        let mut todo = self.fetch(id)?.ok_or(StoreError::NotFound { id })?;
        if let Some(ref title) = patch.title {
            validate_title(title)?;
        }

        patch.apply_to(&mut todo);
        todo.description = non_blank(todo.description);
        todo.category = non_blank(todo.category);
        todo.updated_at = self.next_stamp();

        self.conn.execute(
            r#"
            UPDATE todos
            SET title = ?1, description = ?2, status = ?3, priority = ?4,
                category = ?5, dueDate = ?6, updatedAt = ?7
            WHERE id = ?8
            "#,
            params![
                todo.title,
                todo.description,
                todo.status,
                todo.priority,
                todo.category,
                todo.due_date.map(format_timestamp),
                format_timestamp(todo.updated_at),
                id,
            ],
        )?;

        self.fetch(id)?.ok_or(StoreError::NotFound { id })
    }

    pub(super) fn toggle(&mut self, id: i64) -> Result<Todo, StoreError> {
        let current = self.fetch(id)?.ok_or(StoreError::NotFound { id })?;
        self.update(id, &TodoPatch::status(current.status.toggled()))
    }

    /// Returns whether a row was removed.
    pub(super) fn delete(&self, id: i64) -> Result<bool, StoreError> {
        let removed = self.conn.execute("DELETE FROM todos WHERE id = ?1", params![id])?;
        Ok(removed > 0)
    }

    pub(super) fn list(&self, filter: TodoFilter) -> Result<Vec<Todo>, StoreError> {
        match filter.status() {
            Some(status) => self.query(&format!("{SELECT_TODO} WHERE status = ?1 {NEWEST_FIRST}"), params![status]),
            None => self.query(&format!("{SELECT_TODO} {NEWEST_FIRST}"), []),
        }
    }

    pub(super) fn search(&self, term: &str) -> Result<Vec<Todo>, StoreError> {
        let pattern = format!("%{}%", escape_like(term));
        self.query(
            &format!(r"{SELECT_TODO} WHERE title LIKE ?1 ESCAPE '\' OR description LIKE ?1 ESCAPE '\' {NEWEST_FIRST}"),
            params![pattern],
        )
    }

    fn query(&self, sql: &str, params: impl rusqlite::Params) -> Result<Vec<Todo>, StoreError> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params, todo_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

fn validate_title(title: &str) -> Result<(), StoreError> {
    if title.trim().is_empty() {
        return Err(StoreError::Validation("title must not be empty"));
    }
    Ok(())
}

fn truncate_to_micros(dt: DateTime<Utc>) -> DateTime<Utc> {
    let micros = dt.timestamp_subsec_micros();
    dt.with_nanosecond(micros * 1_000).unwrap_or(dt)
}

/// LIKE treats `%` and `_` as wildcards; match them literally.
fn escape_like(term: &str) -> String {
    let mut out = String::with_capacity(term.len());
    for ch in term.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

fn todo_from_row(row: &Row<'_>) -> rusqlite::Result<Todo> {
    Ok(Todo {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        status: row.get(3)?,
        priority: row.get(4)?,
        category: row.get(5)?,
        due_date: optional_stamp(row, 6)?,
        created_at: required_stamp(row, 7)?,
        updated_at: required_stamp(row, 8)?,
    })
}

fn optional_stamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    match raw {
        Some(raw) => parse_timestamp(&raw).map(Some).ok_or_else(|| bad_stamp(idx, &raw)),
        None => Ok(None),
    }
}

fn required_stamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_timestamp(&raw).ok_or_else(|| bad_stamp(idx, &raw))
}

fn bad_stamp(idx: usize, raw: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, format!("invalid timestamp {raw:?}").into())
}
