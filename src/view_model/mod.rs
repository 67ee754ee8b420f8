use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use crate::core::todo::{CreateTodoInput, Todo, TodoCounts, TodoFilter, TodoPatch};
use crate::store::{StoreError, TodoRepository};

/// Everything the list screen renders.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListState {
    /// The filtered or searched list on display.
    pub todos: Vec<Todo>,
    /// Every todo, kept for the counters.
    pub all_todos: Vec<Todo>,
    pub counts: TodoCounts,
    pub filter: TodoFilter,
    pub search_term: String,
    pub loading: bool,
    pub error: Option<String>,
}

/// Holds list UI state and keeps the displayed list in step with the store.
///
/// Every reload takes a sequence number when it starts. Only the reload that
/// holds the latest number may write its result, so an older reload that
/// finishes late is dropped instead of overwriting newer state.
pub struct TodoListViewModel {
    store: Arc<dyn TodoRepository>,
    state: Mutex<ListState>,
    issued: AtomicU64,
    ready: AtomicBool,
}

impl TodoListViewModel {
    pub fn new(store: Arc<dyn TodoRepository>) -> Self {
        Self {
            store,
            state: Mutex::new(ListState {
                loading: true,
                ..ListState::default()
            }),
            issued: AtomicU64::new(0),
            ready: AtomicBool::new(false),
        }
    }

    pub fn snapshot(&self) -> ListState {
        self.state().clone()
    }

    /// Initialize the store and run the first load.
    pub async fn activate(&self) -> Result<(), StoreError> {
        self.state().loading = true;
        if let Err(e) = self.store.initialize().await {
            log::error!("Failed to initialize database: {}", e);
            let mut state = self.state();
            state.error = Some(format!("Failed to initialize database: {e}"));
            state.loading = false;
            return Err(e);
        }
        self.ready.store(true, Ordering::SeqCst);
        self.load().await
    }

    /// Fetch the full list for the counters and the list on display: search
    /// results when the search term is non-blank, the filtered list otherwise.
    /// A non-blank term is searched as typed, surrounding spaces included.
    pub async fn load(&self) -> Result<(), StoreError> {
        let (seq, filter, term) = {
            let mut state = self.state();
            state.loading = true;
            let seq = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
            (seq, state.filter, state.search_term.clone())
        };

        let result = self.fetch(filter, &term).await;

        let mut state = self.state();
        if seq != self.issued.load(Ordering::SeqCst) {
            log::debug!("Discarding stale reload #{}", seq);
            return result.map(|_| ());
        }

        state.loading = false;
        match result {
            Ok((all, shown)) => {
                log::debug!("Reload #{} shows {} of {} todos", seq, shown.len(), all.len());
                state.counts = TodoCounts::tally(&all);
                state.all_todos = all;
                state.todos = shown;
                state.error = None;
                Ok(())
            }
            Err(e) => {
                log::error!("Failed to load todos: {}", e);
                state.error = Some(format!("Failed to load todos: {e}"));
                Err(e)
            }
        }
    }

    pub async fn refresh(&self) -> Result<(), StoreError> {
        self.load().await
    }

    pub async fn set_filter(&self, filter: TodoFilter) -> Result<(), StoreError> {
        let changed = {
            let mut state = self.state();
            let changed = state.filter != filter;
            state.filter = filter;
            changed
        };
        self.reload_if(changed).await
    }

    pub async fn set_search_term(&self, term: impl Into<String>) -> Result<(), StoreError> {
        let term = term.into();
        let changed = {
            let mut state = self.state();
            let changed = state.search_term != term;
            state.search_term = term;
            changed
        };
        self.reload_if(changed).await
    }

    pub fn dismiss_error(&self) {
        self.state().error = None;
    }

    pub async fn create(&self, input: CreateTodoInput) -> Result<Todo, StoreError> {
        let todo = self
            .store
            .create(input)
            .await
            .map_err(|e| self.fail("Failed to create todo", e))?;
        self.reload_after("create").await;
        Ok(todo)
    }

    pub async fn update(&self, id: i64, patch: TodoPatch) -> Result<Todo, StoreError> {
        let todo = self
            .store
            .update(id, patch)
            .await
            .map_err(|e| self.fail("Failed to update todo", e))?;
        self.reload_after("update").await;
        Ok(todo)
    }

    pub async fn delete(&self, id: i64) -> Result<(), StoreError> {
        self.store
            .delete(id)
            .await
            .map_err(|e| self.fail("Failed to delete todo", e))?;
        self.reload_after("delete").await;
        Ok(())
    }

    pub async fn toggle(&self, id: i64) -> Result<Todo, StoreError> {
        let todo = self
            .store
            .toggle_status(id)
            .await
            .map_err(|e| self.fail("Failed to toggle todo", e))?;
        self.reload_after("toggle").await;
        Ok(todo)
    }

    /// Move a todo's due date.
    pub async fn reschedule(&self, id: i64, due: DateTime<Utc>) -> Result<Todo, StoreError> {
        let todo = self
            .store
            .update(id, TodoPatch::due_date(Some(due)))
            .await
            .map_err(|e| self.fail("Failed to reschedule todo", e))?;
        self.reload_after("reschedule").await;
        Ok(todo)
    }

    pub async fn get(&self, id: i64) -> Result<Option<Todo>, StoreError> {
        self.store
            .get_by_id(id)
            .await
            .map_err(|e| self.fail("Failed to load todo", e))
    }

    async fn fetch(&self, filter: TodoFilter, term: &str) -> Result<(Vec<Todo>, Vec<Todo>), StoreError> {
        let all = self.store.list_all().await?;
        let shown = if term.trim().is_empty() {
            self.store.list_by_filter(filter).await?
        } else {
            self.store.search(term).await?
        };
        Ok((all, shown))
    }

    async fn reload_if(&self, changed: bool) -> Result<(), StoreError> {
        if changed && self.ready.load(Ordering::SeqCst) {
            self.load().await
        } else {
            Ok(())
        }
    }

    // The mutation already reached the store; a failed reload only shows up
    // in `error`.
    async fn reload_after(&self, op: &str) {
        if let Err(e) = self.load().await {
            log::warn!("Reload after {} failed: {}", op, e);
        }
    }

    fn fail(&self, context: &str, e: StoreError) -> StoreError {
        log::error!("{}: {}", context, e);
        self.state().error = Some(format!("{context}: {e}"));
        e
    }

    fn state(&self) -> MutexGuard<'_, ListState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
