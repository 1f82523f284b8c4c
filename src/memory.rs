//! In-process implementations of the repository traits.
//!
//! Used by the test suite and for running the service without a database.
//! Records are kept in insertion order so pagination matches the natural order
//! of a MongoDB collection.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::{
    deadline::Deadline,
    models::{Role, Task, User},
    pagination::{Page, PageWindow},
    repository::{
        RepoError, TaskStore, TaskStoreState, UpdateCounts, UserDirectory, UserDirectoryState,
    },
    token::TokenPair,
};

/// InMemoryUserDirectory
///
/// [`UserDirectory`] over a `Vec` behind an async `RwLock`. Uniqueness of
/// email, phone and subject id is enforced under the write lock.
#[derive(Debug, Default, Clone)]
pub struct InMemoryUserDirectory {
    users: Arc<RwLock<Vec<User>>>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared handle, ready to drop into the application state.
    pub fn shared() -> UserDirectoryState {
        Arc::new(Self::new())
    }

    async fn find_where<P>(&self, pred: P, deadline: Deadline) -> Result<Option<User>, RepoError>
    where
        P: Fn(&User) -> bool + Send + Sync,
    {
        let found = deadline
            .run(async {
                let users = self.users.read().await;
                users.iter().find(|u| pred(u)).cloned()
            })
            .await?;
        Ok(found)
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn find_by_email(
        &self,
        email: &str,
        deadline: Deadline,
    ) -> Result<Option<User>, RepoError> {
        self.find_where(|u| u.email == email, deadline).await
    }

    async fn find_by_phone(
        &self,
        phone: &str,
        deadline: Deadline,
    ) -> Result<Option<User>, RepoError> {
        self.find_where(|u| u.phone == phone, deadline).await
    }

    async fn find_by_subject_id(
        &self,
        subject_id: &str,
        deadline: Deadline,
    ) -> Result<Option<User>, RepoError> {
        self.find_where(|u| u.subject_id == subject_id, deadline)
            .await
    }

    async fn insert(&self, user: User, deadline: Deadline) -> Result<(), RepoError> {
        deadline
            .run(async {
                let mut users = self.users.write().await;
                if let Some(clash) = users.iter().find_map(|existing| {
                    if existing.email == user.email {
                        Some("email")
                    } else if existing.phone == user.phone {
                        Some("phone")
                    } else if existing.subject_id == user.subject_id {
                        Some("subject_id")
                    } else {
                        None
                    }
                }) {
                    return Err(RepoError::Duplicate(format!("{clash} already exists")));
                }
                users.push(user);
                Ok(())
            })
            .await?
    }

    async fn update_role(
        &self,
        subject_id: &str,
        role: Role,
        deadline: Deadline,
    ) -> Result<UpdateCounts, RepoError> {
        let counts = deadline
            .run(async {
                let mut users = self.users.write().await;
                match users.iter_mut().find(|u| u.subject_id == subject_id) {
                    None => UpdateCounts::default(),
                    Some(user) if user.role == role => UpdateCounts {
                        matched: 1,
                        modified: 0,
                    },
                    Some(user) => {
                        user.role = role;
                        user.updated_at = Utc::now();
                        UpdateCounts {
                            matched: 1,
                            modified: 1,
                        }
                    }
                }
            })
            .await?;
        Ok(counts)
    }

    async fn update_tokens(
        &self,
        subject_id: &str,
        tokens: &TokenPair,
        deadline: Deadline,
    ) -> Result<UpdateCounts, RepoError> {
        let counts = deadline
            .run(async {
                let mut users = self.users.write().await;
                let Some(user) = users.iter_mut().find(|u| u.subject_id == subject_id) else {
                    return UpdateCounts::default();
                };
                user.access_token = Some(tokens.access_token.clone());
                user.refresh_token = Some(tokens.refresh_token.clone());
                user.updated_at = Utc::now();
                UpdateCounts {
                    matched: 1,
                    modified: 1,
                }
            })
            .await?;
        Ok(counts)
    }

    async fn list_page(
        &self,
        window: PageWindow,
        deadline: Deadline,
    ) -> Result<Page<User>, RepoError> {
        let page = deadline
            .run(async {
                let users = self.users.read().await;
                window.apply(&users)
            })
            .await?;
        Ok(page)
    }
}

/// InMemoryTaskStore
#[derive(Debug, Default, Clone)]
pub struct InMemoryTaskStore {
    tasks: Arc<RwLock<Vec<Task>>>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> TaskStoreState {
        Arc::new(Self::new())
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn list(&self, deadline: Deadline) -> Result<Vec<Task>, RepoError> {
        Ok(deadline.run(async { self.tasks.read().await.clone() }).await?)
    }

    async fn find_by_id(&self, id: &str, deadline: Deadline) -> Result<Option<Task>, RepoError> {
        let found = deadline
            .run(async {
                let tasks = self.tasks.read().await;
                tasks.iter().find(|t| t.id == id).cloned()
            })
            .await?;
        Ok(found)
    }

    async fn insert(&self, task: Task, deadline: Deadline) -> Result<(), RepoError> {
        deadline
            .run(async {
                let mut tasks = self.tasks.write().await;
                if tasks.iter().any(|t| t.id == task.id) {
                    return Err(RepoError::Duplicate(format!("task {} already exists", task.id)));
                }
                tasks.push(task);
                Ok(())
            })
            .await?
    }

    async fn update(&self, id: &str, task: Task, deadline: Deadline) -> Result<bool, RepoError> {
        let matched = deadline
            .run(async {
                let mut tasks = self.tasks.write().await;
                match tasks.iter_mut().find(|t| t.id == id) {
                    Some(existing) => {
                        existing.title = task.title;
                        existing.description = task.description;
                        existing.due_date = task.due_date;
                        existing.status = task.status;
                        true
                    }
                    None => false,
                }
            })
            .await?;
        Ok(matched)
    }

    async fn delete_by_id(&self, id: &str, deadline: Deadline) -> Result<u64, RepoError> {
        let deleted = deadline
            .run(async {
                let mut tasks = self.tasks.write().await;
                let before = tasks.len();
                tasks.retain(|t| t.id != id);
                (before - tasks.len()) as u64
            })
            .await?;
        Ok(deleted)
    }
}
