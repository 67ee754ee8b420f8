use async_trait::async_trait;

use super::{StoreError, TodoStore};
use crate::core::todo::{CreateTodoInput, Todo, TodoFilter, TodoPatch};

/// The store operations the list view model depends on.
#[async_trait]
pub trait TodoRepository: Send + Sync {
    async fn initialize(&self) -> Result<(), StoreError>;
    async fn create(&self, input: CreateTodoInput) -> Result<Todo, StoreError>;
    async fn get_by_id(&self, id: i64) -> Result<Option<Todo>, StoreError>;
    async fn update(&self, id: i64, patch: TodoPatch) -> Result<Todo, StoreError>;
    async fn delete(&self, id: i64) -> Result<(), StoreError>;
    async fn toggle_status(&self, id: i64) -> Result<Todo, StoreError>;
    async fn list_all(&self) -> Result<Vec<Todo>, StoreError>;
    async fn list_by_filter(&self, filter: TodoFilter) -> Result<Vec<Todo>, StoreError>;
    async fn search(&self, term: &str) -> Result<Vec<Todo>, StoreError>;
}

#[async_trait]
impl TodoRepository for TodoStore {
    async fn initialize(&self) -> Result<(), StoreError> {
        TodoStore::initialize(self).await
    }

    async fn create(&self, input: CreateTodoInput) -> Result<Todo, StoreError> {
        TodoStore::create(self, input).await
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Todo>, StoreError> {
        TodoStore::get_by_id(self, id).await
    }

    async fn update(&self, id: i64, patch: TodoPatch) -> Result<Todo, StoreError> {
        TodoStore::update(self, id, patch).await
    }

    async fn delete(&self, id: i64) -> Result<(), StoreError> {
        TodoStore::delete(self, id).await
    }

    async fn toggle_status(&self, id: i64) -> Result<Todo, StoreError> {
        TodoStore::toggle_status(self, id).await
    }

    async fn list_all(&self) -> Result<Vec<Todo>, StoreError> {
        TodoStore::list_all(self).await
    }

    async fn list_by_filter(&self, filter: TodoFilter) -> Result<Vec<Todo>, StoreError> {
        TodoStore::list_by_filter(self, filter).await
    }

    async fn search(&self, term: &str) -> Result<Vec<Todo>, StoreError> {
        TodoStore::search(self, term).await
    }
}
