mod error;
mod repository;
mod schema;
mod todos;

pub use error::{BoxedCause, StoreError};
pub use repository::TodoRepository;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rusqlite::Connection;

use crate::core::todo::{CreateTodoInput, Todo, TodoFilter, TodoPatch};
use todos::Session;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Location {
    File(PathBuf),
    Memory,
}

/// SQLite-backed todo store.
///
/// Construction is cheap and touches nothing on disk; [`TodoStore::initialize`]
/// opens the database and installs the schema. Statements run on tokio's
/// blocking pool behind a single connection, so they execute one at a time.
#[derive(Clone)]
pub struct TodoStore {
    location: Location,
    session: Arc<Mutex<Option<Session>>>,
}

impl TodoStore {
    pub fn open(path: impl AsRef<Path>) -> Self {
        Self {
            location: Location::File(path.as_ref().to_path_buf()),
            session: Arc::new(Mutex::new(None)),
        }
    }

    /// A private database that lives as long as the store.
    pub fn in_memory() -> Self {
        Self {
            location: Location::Memory,
            session: Arc::new(Mutex::new(None)),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        match &self.location {
            Location::File(path) => Some(path),
            Location::Memory => None,
        }
    }

    /// Open the database and make sure the schema exists. Safe to call again;
    /// an already open connection is reused.
    pub async fn initialize(&self) -> Result<(), StoreError> {
        let location = self.location.clone();
        let session = Arc::clone(&self.session);
        tokio::task::spawn_blocking(move || {
            let mut guard = session
                .lock()
                .map_err(|_| StoreError::storage("store lock poisoned"))?;
            if let Some(existing) = guard.as_ref() {
                return schema::install_schema(&existing.conn);
            }

            let conn = open_connection(&location)?;
            schema::install_schema(&conn)?;
            *guard = Some(Session::new(conn)?);
            match &location {
                Location::File(path) => log::info!("Opened todo database at {}", path.display()),
                Location::Memory => log::info!("Opened in-memory todo database"),
            }
            Ok(())
        })
        .await?
    }

    pub async fn create(&self, input: CreateTodoInput) -> Result<Todo, StoreError> {
        let todo = self.with_session(move |s| s.insert(input)).await?;
        log::info!("Created todo {} ({:?})", todo.id, todo.title);
        Ok(todo)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<Todo>, StoreError> {
        self.with_session(move |s| s.fetch(id)).await
    }

    pub async fn update(&self, id: i64, patch: TodoPatch) -> Result<Todo, StoreError> {
        let todo = self.with_session(move |s| s.update(id, &patch)).await?;
        log::info!("Updated todo {}", id);
        Ok(todo)
    }

    /// Deleting an id that does not exist is not an error.
    pub async fn delete(&self, id: i64) -> Result<(), StoreError> {
        let removed = self.with_session(move |s| s.delete(id)).await?;
        if removed {
            log::info!("Deleted todo {}", id);
        } else {
            log::debug!("Delete of todo {} was a no-op", id);
        }
        Ok(())
    }

    pub async fn toggle_status(&self, id: i64) -> Result<Todo, StoreError> {
        let todo = self.with_session(move |s| s.toggle(id)).await?;
        log::info!("Todo {} is now {}", id, todo.status.as_str());
        Ok(todo)
    }

    /// Newest first; creation ties fall back to the later id.
    pub async fn list_all(&self) -> Result<Vec<Todo>, StoreError> {
        self.list_by_filter(TodoFilter::All).await
    }

    pub async fn list_by_filter(&self, filter: TodoFilter) -> Result<Vec<Todo>, StoreError> {
        self.with_session(move |s| s.list(filter)).await
    }

    /// Case-insensitive substring search over title and description.
    /// Blank terms match everything; callers normally route them to
    /// [`TodoStore::list_by_filter`] instead.
    pub async fn search(&self, term: &str) -> Result<Vec<Todo>, StoreError> {
        let term = term.to_string();
        self.with_session(move |s| s.search(&term)).await
    }

    async fn with_session<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Session) -> Result<T, StoreError> + Send + 'static,
    {
        let session = Arc::clone(&self.session);
        tokio::task::spawn_blocking(move || {
            let mut guard = session
                .lock()
                .map_err(|_| StoreError::storage("store lock poisoned"))?;
            let session = guard.as_mut().ok_or(StoreError::Uninitialized)?;
            f(session)
        })
        .await?
    }
}

fn open_connection(location: &Location) -> Result<Connection, StoreError> {
    let conn = match location {
        Location::File(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            Connection::open(path)?
        }
        Location::Memory => Connection::open_in_memory()?,
    };
    conn.busy_timeout(Duration::from_secs(5))?;
    Ok(conn)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::todo::{TodoPriority, TodoStatus};

    async fn ready_store() -> TodoStore {
        let store = TodoStore::in_memory();
        store.initialize().await.unwrap();
        store
    }

    fn titles(todos: &[Todo]) -> Vec<&str> {
        todos.iter().map(|t| t.title.as_str()).collect()
    }

    #[tokio::test]
    async fn operations_before_initialize_fail() {
        let store = TodoStore::in_memory();
        assert!(matches!(store.list_all().await, Err(StoreError::Uninitialized)));
        assert!(matches!(store.get_by_id(1).await, Err(StoreError::Uninitialized)));
        assert!(matches!(store.delete(1).await, Err(StoreError::Uninitialized)));
        assert!(matches!(
            store.create(CreateTodoInput::new("Too early")).await,
            Err(StoreError::Uninitialized)
        ));
    }

    #[tokio::test]
    async fn initialize_twice_keeps_data() {
        let store = ready_store().await;
        store.create(CreateTodoInput::new("Survives")).await.unwrap();
        store.initialize().await.unwrap();
        assert_eq!(titles(&store.list_all().await.unwrap()), vec!["Survives"]);
    }

    #[tokio::test]
    async fn create_applies_defaults() {
        let store = ready_store().await;
        let first = store.create(CreateTodoInput::new("Water plants")).await.unwrap();
        let second = store
            .create(CreateTodoInput::new("Book dentist").with_priority(TodoPriority::High))
            .await
            .unwrap();

        assert_eq!(first.status, TodoStatus::Pending);
        assert_eq!(first.priority, TodoPriority::Medium);
        assert_eq!(first.created_at, first.updated_at);
        assert_eq!(second.priority, TodoPriority::High);
        assert!(second.id > first.id);
    }

    #[tokio::test]
    async fn create_rejects_blank_title() {
        let store = ready_store().await;
        let err = store.create(CreateTodoInput::new("   ")).await.unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
        assert!(store.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_ids() {
        let store = ready_store().await;
        assert_eq!(store.get_by_id(42).await.unwrap(), None);
        assert!(store.update(42, TodoPatch::title("X")).await.unwrap_err().is_not_found());
        assert!(store.toggle_status(42).await.unwrap_err().is_not_found());
        store.delete(42).await.unwrap();
    }

    #[tokio::test]
    async fn delete_twice_is_harmless() {
        let store = ready_store().await;
        let todo = store.create(CreateTodoInput::new("Temporary")).await.unwrap();
        store.delete(todo.id).await.unwrap();
        store.delete(todo.id).await.unwrap();
        assert_eq!(store.get_by_id(todo.id).await.unwrap(), None);
        assert!(store.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_changes_only_given_fields() {
        let store = ready_store().await;
        let due = crate::core::timestamp::parse_due_input("2026-05-01T09:00").unwrap();
        let before = store
            .create(
                CreateTodoInput::new("Draft")
                    .with_description("quarterly report")
                    .with_priority(TodoPriority::Low)
                    .with_category("Work")
                    .with_due_date(due),
            )
            .await
            .unwrap();

        store.update(before.id, TodoPatch::title("X")).await.unwrap();
        let after = store.get_by_id(before.id).await.unwrap().unwrap();

        assert_eq!(after.title, "X");
        assert_eq!(after.description, before.description);
        assert_eq!(after.priority, before.priority);
        assert_eq!(after.category, before.category);
        assert_eq!(after.due_date, Some(due));
        assert_eq!(after.created_at, before.created_at);
        assert!(after.updated_at > before.updated_at);
    }

    #[tokio::test]
    async fn empty_update_still_bumps_updated_at() {
        let store = ready_store().await;
        let before = store.create(CreateTodoInput::new("Stretch")).await.unwrap();
        let after = store.update(before.id, TodoPatch::default()).await.unwrap();
        assert_eq!(after.title, before.title);
        assert!(after.updated_at > before.updated_at);
    }

    #[tokio::test]
    async fn update_can_clear_optional_fields() {
        let store = ready_store().await;
        let todo = store
            .create(CreateTodoInput::new("Gym").with_category("Health"))
            .await
            .unwrap();
        let patch = TodoPatch {
            category: Some(None),
            ..TodoPatch::default()
        };
        let updated = store.update(todo.id, patch).await.unwrap();
        assert_eq!(updated.category, None);
    }

    #[tokio::test]
    async fn update_rejects_blank_title() {
        let store = ready_store().await;
        let todo = store.create(CreateTodoInput::new("Keep title")).await.unwrap();
        let err = store.update(todo.id, TodoPatch::title("")).await.unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
        assert_eq!(store.get_by_id(todo.id).await.unwrap().unwrap().title, "Keep title");
    }

    #[tokio::test]
    async fn toggle_twice_restores_status() {
        let store = ready_store().await;
        let original = store.create(CreateTodoInput::new("Laundry")).await.unwrap();

        let once = store.toggle_status(original.id).await.unwrap();
        assert_eq!(once.status, TodoStatus::Completed);
        assert!(once.updated_at > original.updated_at);

        let twice = store.toggle_status(original.id).await.unwrap();
        assert_eq!(twice.status, TodoStatus::Pending);
        assert!(twice.updated_at > once.updated_at);
    }

    #[tokio::test]
    async fn newest_first_without_delay() {
        let store = ready_store().await;
        for title in ["A", "B", "C"] {
            store.create(CreateTodoInput::new(title)).await.unwrap();
        }
        assert_eq!(titles(&store.list_all().await.unwrap()), vec!["C", "B", "A"]);
    }

    #[tokio::test]
    async fn filters_partition_the_list() {
        let store = ready_store().await;
        for title in ["one", "two", "three", "four"] {
            store.create(CreateTodoInput::new(title)).await.unwrap();
        }
        let all = store.list_all().await.unwrap();
        store.toggle_status(all[0].id).await.unwrap();
        store.toggle_status(all[2].id).await.unwrap();

        let everything = store.list_by_filter(TodoFilter::All).await.unwrap();
        let active = store.list_by_filter(TodoFilter::Active).await.unwrap();
        let completed = store.list_by_filter(TodoFilter::Completed).await.unwrap();

        assert!(active.iter().all(|t| t.status == TodoStatus::Pending));
        assert!(completed.iter().all(|t| t.status == TodoStatus::Completed));
        assert_eq!(titles(&active), vec!["three", "one"]);
        assert_eq!(titles(&completed), vec!["four", "two"]);
        assert_eq!(everything.len(), active.len() + completed.len());
        assert_eq!(titles(&everything), vec!["four", "three", "two", "one"]);
    }

    #[tokio::test]
    async fn search_matches_title_or_description() {
        let store = ready_store().await;
        store.create(CreateTodoInput::new("Buy milk")).await.unwrap();
        store
            .create(CreateTodoInput::new("Errands").with_description("get milk"))
            .await
            .unwrap();
        store.create(CreateTodoInput::new("Buy bread")).await.unwrap();

        let hits = store.search("MILK").await.unwrap();
        assert_eq!(titles(&hits), vec!["Errands", "Buy milk"]);
    }

    #[tokio::test]
    async fn file_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("todos.db");

        let store = TodoStore::open(&path);
        store.initialize().await.unwrap();
        let created = store.create(CreateTodoInput::new("Remember me")).await.unwrap();
        drop(store);

        let reopened = TodoStore::open(&path);
        reopened.initialize().await.unwrap();
        let loaded = reopened.get_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(loaded, created);
        assert_eq!(reopened.path(), Some(path.as_path()));

        let next = reopened.create(CreateTodoInput::new("After reopen")).await.unwrap();
        assert!(next.created_at > created.created_at);
        assert!(next.id > created.id);
    }
}
