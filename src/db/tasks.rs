//! Task storage. Every query is scoped to the owning account.

use sqlx::{QueryBuilder, Sqlite, sqlite::SqlitePool};

/// Page size used when the caller does not ask for one.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Largest page a caller may request.
pub const MAX_PAGE_SIZE: u32 = 100;

const TASK_COLUMNS: &str = "SELECT id, account_id, title, completed, created_at, updated_at FROM tasks";

#[derive(Clone)]
pub struct TaskStore {
    pool: SqlitePool,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Task {
    pub id: i64,
    pub account_id: i64,
    pub title: String,
    pub completed: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// Listing filter. `page` is 1-based.
#[derive(Debug, Clone)]
pub struct TaskFilter {
    pub completed: Option<bool>,
    /// Case-insensitive substring of the title, matched literally
    pub search: Option<String>,
    pub page: u32,
    pub limit: u32,
}

impl Default for TaskFilter {
    fn default() -> Self {
        Self {
            completed: None,
            search: None,
            page: 1,
            limit: DEFAULT_PAGE_SIZE,
        }
    }
}

/// One page of tasks plus the number of tasks matching the filter.
#[derive(Debug, Clone)]
pub struct TaskPage {
    pub tasks: Vec<Task>,
    pub total: i64,
}

/// Escape LIKE wildcards so the search term matches literally.
fn like_pattern(search: &str) -> String {
    let mut pattern = String::with_capacity(search.len() + 2);
    pattern.push('%');
    for c in search.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

fn push_filters(builder: &mut QueryBuilder<'_, Sqlite>, account_id: i64, filter: &TaskFilter) {
    builder.push(" WHERE account_id = ").push_bind(account_id);

    if let Some(completed) = filter.completed {
        builder.push(" AND completed = ").push_bind(completed);
    }

    let search = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty());
    if let Some(search) = search {
        builder
            .push(" AND title LIKE ")
            .push_bind(like_pattern(search))
            .push(" ESCAPE '\\'");
    }
}

impl TaskStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a new, not yet completed task.
    pub async fn create(&self, account_id: i64, title: &str) -> Result<Task, sqlx::Error> {
        sqlx::query_as(
            "INSERT INTO tasks (account_id, title, completed) VALUES (?, ?, 0)
             RETURNING id, account_id, title, completed, created_at, updated_at",
        )
        .bind(account_id)
        .bind(title)
        .fetch_one(&self.pool)
        .await
    }

    /// Get a task by ID. Only returns the task if it belongs to the given account.
    pub async fn get(&self, id: i64, account_id: i64) -> Result<Option<Task>, sqlx::Error> {
        sqlx::query_as(&format!("{} WHERE id = ? AND account_id = ?", TASK_COLUMNS))
            .bind(id)
            .bind(account_id)
            .fetch_optional(&self.pool)
            .await
    }

    /// List an account's tasks, newest first.
    pub async fn list(&self, account_id: i64, filter: &TaskFilter) -> Result<TaskPage, sqlx::Error> {
        let limit = filter.limit.clamp(1, MAX_PAGE_SIZE);
        let offset = (filter.page.max(1) - 1) as i64 * limit as i64;

        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM tasks");
        push_filters(&mut count, account_id, filter);
        let (total,): (i64,) = count.build_query_as().fetch_one(&self.pool).await?;

        let mut query = QueryBuilder::<Sqlite>::new(TASK_COLUMNS);
        push_filters(&mut query, account_id, filter);
        query
            .push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(limit as i64)
            .push(" OFFSET ")
            .push_bind(offset);
        let tasks = query.build_query_as().fetch_all(&self.pool).await?;

        Ok(TaskPage { tasks, total })
    }

    /// Update title and/or completion. `None` leaves a field unchanged.
    /// Returns the updated task, or None if it does not exist for this account.
    pub async fn update(
        &self,
        id: i64,
        account_id: i64,
        title: Option<&str>,
        completed: Option<bool>,
    ) -> Result<Option<Task>, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE tasks SET title = COALESCE(?, title), completed = COALESCE(?, completed), updated_at = datetime('now')
             WHERE id = ? AND account_id = ?",
        )
        .bind(title)
        .bind(completed)
        .bind(id)
        .bind(account_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get(id, account_id).await
    }

    /// Flip the completion flag.
    pub async fn toggle(&self, id: i64, account_id: i64) -> Result<Option<Task>, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE tasks SET completed = NOT completed, updated_at = datetime('now')
             WHERE id = ? AND account_id = ?",
        )
        .bind(id)
        .bind(account_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get(id, account_id).await
    }

    /// Delete a task. Returns true if a task was deleted.
    pub async fn delete(&self, id: i64, account_id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = ? AND account_id = ?")
            .bind(id)
            .bind(account_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    async fn db_with_account() -> (Database, i64) {
        let db = Database::open(":memory:").await.unwrap();
        let id = db
            .accounts()
            .create("uuid-1", "alice@example.com", "hash", "Alice")
            .await
            .unwrap();
        (db, id)
    }

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("milk"), "%milk%");
        assert_eq!(like_pattern("100%"), "%100\\%%");
        assert_eq!(like_pattern("a_b\\c"), "%a\\_b\\\\c%");
    }

    #[tokio::test]
    async fn test_create_and_toggle() {
        let (db, account) = db_with_account().await;

        let task = db.tasks().create(account, "Buy milk").await.unwrap();
        assert_eq!(task.title, "Buy milk");
        assert!(!task.completed);

        let toggled = db.tasks().toggle(task.id, account).await.unwrap().unwrap();
        assert!(toggled.completed);

        let toggled = db.tasks().toggle(task.id, account).await.unwrap().unwrap();
        assert!(!toggled.completed);
    }

    #[tokio::test]
    async fn test_other_account_cannot_see_task() {
        let (db, account) = db_with_account().await;
        let other = db
            .accounts()
            .create("uuid-2", "bob@example.com", "hash", "Bob")
            .await
            .unwrap();

        let task = db.tasks().create(account, "Private").await.unwrap();

        assert!(db.tasks().get(task.id, other).await.unwrap().is_none());
        assert!(db.tasks().toggle(task.id, other).await.unwrap().is_none());
        assert!(!db.tasks().delete(task.id, other).await.unwrap());
        assert!(db.tasks().get(task.id, account).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_list_filters_and_pages() {
        let (db, account) = db_with_account().await;

        for i in 0..5 {
            let task = db.tasks().create(account, &format!("Task {}", i)).await.unwrap();
            if i % 2 == 0 {
                db.tasks().toggle(task.id, account).await.unwrap();
            }
        }
        db.tasks().create(account, "50% done_ish").await.unwrap();

        let all = db.tasks().list(account, &TaskFilter::default()).await.unwrap();
        assert_eq!(all.total, 6);
        // Newest first
        assert_eq!(all.tasks[0].title, "50% done_ish");

        let done = db
            .tasks()
            .list(
                account,
                &TaskFilter {
                    completed: Some(true),
                    ..TaskFilter::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(done.total, 3);
        assert!(done.tasks.iter().all(|t| t.completed));

        let literal = db
            .tasks()
            .list(
                account,
                &TaskFilter {
                    search: Some("0%".to_string()),
                    ..TaskFilter::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(literal.total, 1);

        let page = db
            .tasks()
            .list(
                account,
                &TaskFilter {
                    page: 2,
                    limit: 4,
                    ..TaskFilter::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(page.total, 6);
        assert_eq!(page.tasks.len(), 2);
    }

    #[tokio::test]
    async fn test_update_keeps_unset_fields() {
        let (db, account) = db_with_account().await;
        let task = db.tasks().create(account, "Original").await.unwrap();

        let updated = db
            .tasks()
            .update(task.id, account, None, Some(true))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.title, "Original");
        assert!(updated.completed);

        let updated = db
            .tasks()
            .update(task.id, account, Some("Renamed"), None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.title, "Renamed");
        assert!(updated.completed);
    }
}
