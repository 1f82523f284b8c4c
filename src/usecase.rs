//! Use-case orchestrators.
//!
//! Each public method is one operation. It opens a [`Deadline`] from the
//! configured budget, drives every repository call under it, and performs at
//! most one write, as its last step. Access checks are the caller's job.

use chrono::Utc;
use std::time::Duration;
use uuid::Uuid;
use validator::{Validate, ValidationErrors};

use crate::{
    deadline::Deadline,
    error::AppError,
    models::{Role, SignupRequest, Task, TaskRequest, User},
    pagination::{Page, PageWindow},
    password::PasswordHasher,
    repository::{TaskStoreState, UpdateCounts, UserDirectoryState},
    token::{Identity, TokenPair, TokenService},
};

/// Turns the first failing field (by name, so the choice is stable) into an
/// [`AppError::Validation`].
fn first_violation(errors: ValidationErrors) -> AppError {
    let field_errors = errors.field_errors();
    let mut fields: Vec<_> = field_errors.into_iter().collect();
    fields.sort_by(|(a, _), (b, _)| a.cmp(b));

    match fields.into_iter().next() {
        Some((field, errs)) => {
            let reason = errs
                .first()
                .map(|e| {
                    e.message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| e.code.to_string())
                })
                .unwrap_or_else(|| "invalid".to_string());
            AppError::validation(field.to_string(), reason)
        }
        None => AppError::validation("payload", "invalid"),
    }
}

/// PromoteOutcome
///
/// The two successful results of Promote. A missing target is an error
/// (`NotFound`), not an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromoteOutcome {
    /// The user's role changed to ADMIN.
    Promoted,
    /// The user was already ADMIN; nothing was written.
    NoOp,
}

impl PromoteOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            PromoteOutcome::Promoted => "promoted",
            PromoteOutcome::NoOp => "no_op",
        }
    }
}

/// UserUseCase
///
/// Signup, Login, Promote and the user reads.
#[derive(Clone)]
pub struct UserUseCase {
    users: UserDirectoryState,
    tokens: TokenService,
    hasher: PasswordHasher,
    timeout: Duration,
}

impl UserUseCase {
    pub fn new(
        users: UserDirectoryState,
        tokens: TokenService,
        hasher: PasswordHasher,
        timeout: Duration,
    ) -> Self {
        Self {
            users,
            tokens,
            hasher,
            timeout,
        }
    }

    fn deadline(&self) -> Deadline {
        Deadline::after(self.timeout)
    }

    // Argon2 runs on the blocking pool.
    async fn hash_password(&self, plaintext: String) -> Result<String, AppError> {
        let hasher = self.hasher.clone();
        tokio::task::spawn_blocking(move || hasher.hash(&plaintext))
            .await
            .map_err(|e| AppError::Internal(format!("hashing task failed: {e}")))?
            .map_err(|e| AppError::Internal(e.to_string()))
    }

    async fn verify_password(&self, digest: String, candidate: String) -> Result<bool, AppError> {
        let hasher = self.hasher.clone();
        tokio::task::spawn_blocking(move || hasher.verify(&digest, &candidate))
            .await
            .map_err(|e| AppError::Internal(format!("verification task failed: {e}")))
    }

    fn issue(&self, identity: &Identity) -> Result<TokenPair, AppError> {
        self.tokens
            .issue(identity)
            .map_err(|e| AppError::Internal(e.to_string()))
    }

    /// signup
    ///
    /// Validates the payload, rejects an email or phone already on file, then
    /// stores the new user with a hashed password and a fresh token pair.
    pub async fn signup(&self, request: SignupRequest) -> Result<User, AppError> {
        request.validate().map_err(first_violation)?;
        let deadline = self.deadline();

        if self
            .users
            .find_by_email(&request.email, deadline)
            .await?
            .is_some()
        {
            return Err(AppError::Conflict("email already in use".to_string()));
        }
        if self
            .users
            .find_by_phone(&request.phone, deadline)
            .await?
            .is_some()
        {
            return Err(AppError::Conflict("phone number already in use".to_string()));
        }

        let password_hash = deadline
            .run(self.hash_password(request.password))
            .await??;

        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let mut user = User {
            id: id.clone(),
            subject_id: id,
            first_name: request.first_name,
            last_name: request.last_name,
            email: request.email,
            phone: request.phone,
            password_hash,
            role: request.role,
            access_token: None,
            refresh_token: None,
            created_at: now,
            updated_at: now,
        };

        let pair = self.issue(&Identity::from(&user))?;
        user.access_token = Some(pair.access_token);
        user.refresh_token = Some(pair.refresh_token);

        self.users.insert(user.clone(), deadline).await?;

        tracing::info!(subject_id = %user.subject_id, role = %user.role, "user signed up");
        Ok(user)
    }

    /// login
    ///
    /// Checks the password and, only when it matches, re-issues and stores a
    /// new token pair. A wrong password leaves the stored record untouched.
    pub async fn login(&self, email: &str, password: &str) -> Result<User, AppError> {
        let deadline = self.deadline();

        let mut user = self
            .users
            .find_by_email(email, deadline)
            .await?
            .ok_or_else(|| AppError::NotFound("user".to_string()))?;

        let matches = deadline
            .run(self.verify_password(user.password_hash.clone(), password.to_string()))
            .await??;
        if !matches {
            tracing::warn!(subject_id = %user.subject_id, "login with wrong password");
            return Err(AppError::InvalidCredential);
        }

        let pair = self.issue(&Identity::from(&user))?;
        let counts = self
            .users
            .update_tokens(&user.subject_id, &pair, deadline)
            .await?;
        if counts.matched == 0 {
            return Err(AppError::NotFound("user".to_string()));
        }

        user.access_token = Some(pair.access_token);
        user.refresh_token = Some(pair.refresh_token);
        user.updated_at = Utc::now();

        tracing::info!(subject_id = %user.subject_id, "user logged in");
        Ok(user)
    }

    /// promote
    ///
    /// Raises the target to ADMIN. Not matched is `NotFound`, matched but
    /// unchanged is [`PromoteOutcome::NoOp`].
    pub async fn promote(&self, subject_id: &str) -> Result<PromoteOutcome, AppError> {
        let counts = self
            .users
            .update_role(subject_id, Role::Admin, self.deadline())
            .await?;

        let outcome = match counts {
            UpdateCounts { matched: 0, .. } => {
                return Err(AppError::NotFound("user".to_string()));
            }
            UpdateCounts { modified: 0, .. } => PromoteOutcome::NoOp,
            _ => PromoteOutcome::Promoted,
        };

        tracing::info!(subject_id = %subject_id, outcome = outcome.as_str(), "promote");
        Ok(outcome)
    }

    pub async fn get_users(&self, window: PageWindow) -> Result<Page<User>, AppError> {
        Ok(self.users.list_page(window, self.deadline()).await?)
    }

    pub async fn get_user(&self, subject_id: &str) -> Result<User, AppError> {
        self.users
            .find_by_subject_id(subject_id, self.deadline())
            .await?
            .ok_or_else(|| AppError::NotFound("user".to_string()))
    }

    /// Stores `tokens` as the user's current pair.
    pub async fn update_all_tokens(
        &self,
        subject_id: &str,
        tokens: &TokenPair,
    ) -> Result<UpdateCounts, AppError> {
        Ok(self
            .users
            .update_tokens(subject_id, tokens, self.deadline())
            .await?)
    }
}

/// TaskUseCase
#[derive(Clone)]
pub struct TaskUseCase {
    tasks: TaskStoreState,
    timeout: Duration,
}

impl TaskUseCase {
    pub fn new(tasks: TaskStoreState, timeout: Duration) -> Self {
        Self { tasks, timeout }
    }

    fn deadline(&self) -> Deadline {
        Deadline::after(self.timeout)
    }

    pub async fn list(&self) -> Result<Vec<Task>, AppError> {
        Ok(self.tasks.list(self.deadline()).await?)
    }

    pub async fn get(&self, id: &str) -> Result<Task, AppError> {
        self.tasks
            .find_by_id(id, self.deadline())
            .await?
            .ok_or_else(|| AppError::NotFound(format!("task {id}")))
    }

    /// Creates a task under the client-supplied id, or a generated one when
    /// none is given. Reusing an existing id is a `Conflict`.
    pub async fn create(&self, request: TaskRequest) -> Result<Task, AppError> {
        request.validate().map_err(first_violation)?;

        let id = request
            .id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let task = Task {
            id,
            title: request.title,
            description: request.description,
            due_date: request.due_date,
            status: request.status,
        };

        self.tasks.insert(task.clone(), self.deadline()).await?;
        tracing::info!(task_id = %task.id, "task created");
        Ok(task)
    }

    /// Replaces every field but the id, which always comes from the path.
    pub async fn update(&self, id: &str, request: TaskRequest) -> Result<Task, AppError> {
        request.validate().map_err(first_violation)?;

        let task = Task {
            id: id.to_string(),
            title: request.title,
            description: request.description,
            due_date: request.due_date,
            status: request.status,
        };

        if !self.tasks.update(id, task.clone(), self.deadline()).await? {
            return Err(AppError::NotFound(format!("task {id}")));
        }
        tracing::info!(task_id = %id, "task updated");
        Ok(task)
    }

    pub async fn delete(&self, id: &str) -> Result<(), AppError> {
        if self.tasks.delete_by_id(id, self.deadline()).await? == 0 {
            return Err(AppError::NotFound(format!("task {id}")));
        }
        tracing::info!(task_id = %id, "task deleted");
        Ok(())
    }
}
