use async_trait::async_trait;
use bson::{Document, doc};
use chrono::Utc;
use futures::TryStreamExt;
use mongodb::{
    Collection, Database, IndexModel,
    error::{ErrorKind, WriteFailure},
    options::IndexOptions,
};
use std::sync::Arc;
use thiserror::Error;

use crate::{
    deadline::{Deadline, Elapsed},
    models::{Role, Task, User},
    pagination::{Page, PageWindow},
    token::TokenPair,
};

pub const USER_COLLECTION: &str = "users";
pub const TASK_COLLECTION: &str = "tasks";

/// Server error code for a unique index violation.
const DUPLICATE_KEY: i32 = 11000;

/// RepoError
///
/// Typed outcome of a failed persistence call. Raw driver errors never leave
/// this module.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("duplicate key: {0}")]
    Duplicate(String),

    #[error("operation exceeded its deadline")]
    Timeout,

    #[error("database error: {0}")]
    Database(String),
}

impl From<Elapsed> for RepoError {
    fn from(_: Elapsed) -> Self {
        RepoError::Timeout
    }
}

impl From<mongodb::error::Error> for RepoError {
    fn from(err: mongodb::error::Error) -> Self {
        match err.kind.as_ref() {
            ErrorKind::Write(WriteFailure::WriteError(write)) if write.code == DUPLICATE_KEY => {
                RepoError::Duplicate(write.message.clone())
            }
            _ => RepoError::Database(err.to_string()),
        }
    }
}

impl From<bson::de::Error> for RepoError {
    fn from(err: bson::de::Error) -> Self {
        RepoError::Database(format!("failed to decode document: {err}"))
    }
}

impl From<bson::ser::Error> for RepoError {
    fn from(err: bson::ser::Error) -> Self {
        RepoError::Database(format!("failed to encode document: {err}"))
    }
}

/// UpdateCounts
///
/// How many documents an update matched, and how many it actually changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UpdateCounts {
    pub matched: u64,
    pub modified: u64,
}

/// UserDirectory
///
/// Persistence contract for user records. Role-agnostic: access decisions are
/// made before these methods are reached.
///
/// Every method takes the caller's [`Deadline`] and must give up, returning
/// [`RepoError::Timeout`], once it passes.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_by_email(&self, email: &str, deadline: Deadline)
    -> Result<Option<User>, RepoError>;

    async fn find_by_phone(&self, phone: &str, deadline: Deadline)
    -> Result<Option<User>, RepoError>;

    async fn find_by_subject_id(
        &self,
        subject_id: &str,
        deadline: Deadline,
    ) -> Result<Option<User>, RepoError>;

    /// Fails with [`RepoError::Duplicate`] if the email, phone or subject id
    /// is already taken.
    async fn insert(&self, user: User, deadline: Deadline) -> Result<(), RepoError>;

    /// Sets the role. `modified` is zero when the user already had it.
    async fn update_role(
        &self,
        subject_id: &str,
        role: Role,
        deadline: Deadline,
    ) -> Result<UpdateCounts, RepoError>;

    /// Replaces both stored tokens. Idempotent for a given pair.
    async fn update_tokens(
        &self,
        subject_id: &str,
        tokens: &TokenPair,
        deadline: Deadline,
    ) -> Result<UpdateCounts, RepoError>;

    /// One page of users in insertion order, plus the total count.
    async fn list_page(
        &self,
        window: PageWindow,
        deadline: Deadline,
    ) -> Result<Page<User>, RepoError>;
}

/// TaskStore
///
/// Persistence contract for tasks.
#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn list(&self, deadline: Deadline) -> Result<Vec<Task>, RepoError>;

    async fn find_by_id(&self, id: &str, deadline: Deadline) -> Result<Option<Task>, RepoError>;

    async fn insert(&self, task: Task, deadline: Deadline) -> Result<(), RepoError>;

    /// Returns whether a task with `id` existed.
    async fn update(&self, id: &str, task: Task, deadline: Deadline) -> Result<bool, RepoError>;

    /// Returns the number of tasks removed.
    async fn delete_by_id(&self, id: &str, deadline: Deadline) -> Result<u64, RepoError>;
}

/// The shared handles injected into the use cases.
pub type UserDirectoryState = Arc<dyn UserDirectory>;
pub type TaskStoreState = Arc<dyn TaskStore>;

fn unique_index(field: &str) -> IndexModel {
    IndexModel::builder()
        .keys(doc! { field: 1 })
        .options(
            IndexOptions::builder()
                .unique(true)
                .name(format!("{field}_unique"))
                .build(),
        )
        .build()
}

/// MongoUserDirectory
///
/// [`UserDirectory`] backed by the `users` collection.
#[derive(Clone)]
pub struct MongoUserDirectory {
    collection: Collection<User>,
}

impl MongoUserDirectory {
    /// Opens the collection and makes sure the uniqueness indexes exist.
    pub async fn new(db: &Database) -> Result<Self, RepoError> {
        let collection = db.collection::<User>(USER_COLLECTION);
        collection
            .create_indexes(vec![
                unique_index("email"),
                unique_index("phone"),
                unique_index("subject_id"),
            ])
            .await?;

        Ok(Self { collection })
    }

    async fn find_one(&self, filter: Document, deadline: Deadline) -> Result<Option<User>, RepoError> {
        Ok(deadline.run(self.collection.find_one(filter)).await??)
    }
}

#[async_trait]
impl UserDirectory for MongoUserDirectory {
    async fn find_by_email(
        &self,
        email: &str,
        deadline: Deadline,
    ) -> Result<Option<User>, RepoError> {
        self.find_one(doc! { "email": email }, deadline).await
    }

    async fn find_by_phone(
        &self,
        phone: &str,
        deadline: Deadline,
    ) -> Result<Option<User>, RepoError> {
        self.find_one(doc! { "phone": phone }, deadline).await
    }

    async fn find_by_subject_id(
        &self,
        subject_id: &str,
        deadline: Deadline,
    ) -> Result<Option<User>, RepoError> {
        self.find_one(doc! { "subject_id": subject_id }, deadline)
            .await
    }

    async fn insert(&self, user: User, deadline: Deadline) -> Result<(), RepoError> {
        deadline.run(self.collection.insert_one(user)).await??;
        Ok(())
    }

    /// update_role
    ///
    /// A single pipeline update that only bumps `updated_at` when the role
    /// actually changes, so `modified_count` tells "already had it" apart
    /// from "changed".
    async fn update_role(
        &self,
        subject_id: &str,
        role: Role,
        deadline: Deadline,
    ) -> Result<UpdateCounts, RepoError> {
        let now = bson::to_bson(&Utc::now())?;
        let update = vec![doc! {
            "$set": {
                "updated_at": {
                    "$cond": [{ "$eq": ["$role", role.as_str()] }, "$updated_at", now]
                },
                "role": role.as_str(),
            }
        }];

        let result = deadline
            .run(self.collection.update_one(doc! { "subject_id": subject_id }, update))
            .await??;

        Ok(UpdateCounts {
            matched: result.matched_count,
            modified: result.modified_count,
        })
    }

    async fn update_tokens(
        &self,
        subject_id: &str,
        tokens: &TokenPair,
        deadline: Deadline,
    ) -> Result<UpdateCounts, RepoError> {
        let update = doc! {
            "$set": {
                "access_token": &tokens.access_token,
                "refresh_token": &tokens.refresh_token,
                "updated_at": bson::to_bson(&Utc::now())?,
            }
        };

        let result = deadline
            .run(self.collection.update_one(doc! { "subject_id": subject_id }, update))
            .await??;

        Ok(UpdateCounts {
            matched: result.matched_count,
            modified: result.modified_count,
        })
    }

    async fn list_page(
        &self,
        window: PageWindow,
        deadline: Deadline,
    ) -> Result<Page<User>, RepoError> {
        let docs: Vec<Document> = deadline
            .run(async {
                let cursor = self
                    .collection
                    .aggregate(window.aggregation_pipeline())
                    .await?;
                Ok::<_, mongodb::error::Error>(cursor.try_collect::<Vec<Document>>().await?)
            })
            .await??;

        // An empty collection groups into nothing at all.
        match docs.into_iter().next() {
            Some(doc) => Ok(bson::from_document::<Page<User>>(doc)?),
            None => Ok(Page::empty()),
        }
    }
}

/// MongoTaskStore
///
/// [`TaskStore`] backed by the `tasks` collection. Tasks are keyed by their
/// own `id` field; the driver-assigned `_id` is ignored on read.
#[derive(Clone)]
pub struct MongoTaskStore {
    collection: Collection<Task>,
}

impl MongoTaskStore {
    pub async fn new(db: &Database) -> Result<Self, RepoError> {
        let collection = db.collection::<Task>(TASK_COLLECTION);
        collection.create_index(unique_index("id")).await?;
        Ok(Self { collection })
    }
}

#[async_trait]
impl TaskStore for MongoTaskStore {
    async fn list(&self, deadline: Deadline) -> Result<Vec<Task>, RepoError> {
        let tasks = deadline
            .run(async {
                let cursor = self.collection.find(doc! {}).await?;
                Ok::<_, mongodb::error::Error>(cursor.try_collect::<Vec<Task>>().await?)
            })
            .await??;
        Ok(tasks)
    }

    async fn find_by_id(&self, id: &str, deadline: Deadline) -> Result<Option<Task>, RepoError> {
        Ok(deadline
            .run(self.collection.find_one(doc! { "id": id }))
            .await??)
    }

    async fn insert(&self, task: Task, deadline: Deadline) -> Result<(), RepoError> {
        deadline.run(self.collection.insert_one(task)).await??;
        Ok(())
    }

    async fn update(&self, id: &str, task: Task, deadline: Deadline) -> Result<bool, RepoError> {
        let update = doc! {
            "$set": {
                "title": task.title,
                "description": task.description,
                "due_date": bson::to_bson(&task.due_date)?,
                "status": task.status,
            }
        };

        let result = deadline
            .run(self.collection.update_one(doc! { "id": id }, update))
            .await??;
        Ok(result.matched_count > 0)
    }

    async fn delete_by_id(&self, id: &str, deadline: Deadline) -> Result<u64, RepoError> {
        let result = deadline
            .run(self.collection.delete_one(doc! { "id": id }))
            .await??;
        Ok(result.deleted_count)
    }
}
