use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use std::{sync::Arc, time::Duration};
use task_manager::{
    deadline::{Deadline, Elapsed},
    error::AppError,
    memory::{InMemoryTaskStore, InMemoryUserDirectory},
    models::{Role, SignupRequest, Task, TaskRequest, User},
    pagination::{Page, PageWindow},
    password::{PasswordConfig, PasswordHasher},
    repository::{RepoError, TaskStore, UpdateCounts, UserDirectory, UserDirectoryState},
    token::{TokenPair, TokenService},
    usecase::{PromoteOutcome, TaskUseCase, UserUseCase},
};

const TIMEOUT: Duration = Duration::from_secs(10);

// --- Helpers ---

fn hasher() -> PasswordHasher {
    PasswordHasher::new(&PasswordConfig {
        memory_cost: 1024,
        time_cost: 1,
        parallelism: 1,
    })
    .unwrap()
}

fn tokens() -> TokenService {
    TokenService::new("usecase-tests-secret").unwrap()
}

fn users_over(directory: UserDirectoryState) -> UserUseCase {
    UserUseCase::new(directory, tokens(), hasher(), TIMEOUT)
}

fn signup_request(email: &str, phone: &str) -> SignupRequest {
    SignupRequest {
        first_name: "Alan".to_string(),
        last_name: "Turing".to_string(),
        email: email.to_string(),
        phone: phone.to_string(),
        password: "enigma-1912".to_string(),
        role: Role::User,
    }
}

fn task_request(id: Option<&str>, title: &str) -> TaskRequest {
    TaskRequest {
        id: id.map(str::to_string),
        title: title.to_string(),
        description: "details".to_string(),
        due_date: Utc.with_ymd_and_hms(2031, 6, 1, 9, 0, 0).unwrap(),
        status: "open".to_string(),
    }
}

// --- Slow repositories for deadline checks ---

/// Every call takes far longer than the use-case budget.
struct SlowStore;

impl SlowStore {
    async fn stall(deadline: Deadline) -> Result<(), RepoError> {
        deadline.run(tokio::time::sleep(Duration::from_secs(30))).await?;
        Ok(())
    }
}

#[async_trait]
impl TaskStore for SlowStore {
    async fn list(&self, deadline: Deadline) -> Result<Vec<Task>, RepoError> {
        Self::stall(deadline).await?;
        Ok(vec![])
    }
    async fn find_by_id(&self, _id: &str, deadline: Deadline) -> Result<Option<Task>, RepoError> {
        Self::stall(deadline).await?;
        Ok(None)
    }
    async fn insert(&self, _task: Task, deadline: Deadline) -> Result<(), RepoError> {
        Self::stall(deadline).await
    }
    async fn update(&self, _id: &str, _task: Task, deadline: Deadline) -> Result<bool, RepoError> {
        Self::stall(deadline).await?;
        Ok(false)
    }
    async fn delete_by_id(&self, _id: &str, deadline: Deadline) -> Result<u64, RepoError> {
        Self::stall(deadline).await?;
        Ok(0)
    }
}

#[async_trait]
impl UserDirectory for SlowStore {
    async fn find_by_email(&self, _e: &str, deadline: Deadline) -> Result<Option<User>, RepoError> {
        Self::stall(deadline).await?;
        Ok(None)
    }
    async fn find_by_phone(&self, _p: &str, deadline: Deadline) -> Result<Option<User>, RepoError> {
        Self::stall(deadline).await?;
        Ok(None)
    }
    async fn find_by_subject_id(
        &self,
        _s: &str,
        deadline: Deadline,
    ) -> Result<Option<User>, RepoError> {
        Self::stall(deadline).await?;
        Ok(None)
    }
    async fn insert(&self, _user: User, deadline: Deadline) -> Result<(), RepoError> {
        Self::stall(deadline).await
    }
    async fn update_role(
        &self,
        _s: &str,
        _role: Role,
        deadline: Deadline,
    ) -> Result<UpdateCounts, RepoError> {
        Self::stall(deadline).await?;
        Ok(UpdateCounts::default())
    }
    async fn update_tokens(
        &self,
        _s: &str,
        _t: &TokenPair,
        deadline: Deadline,
    ) -> Result<UpdateCounts, RepoError> {
        Self::stall(deadline).await?;
        Ok(UpdateCounts::default())
    }
    async fn list_page(
        &self,
        _w: PageWindow,
        deadline: Deadline,
    ) -> Result<Page<User>, RepoError> {
        Self::stall(deadline).await?;
        Ok(Page::empty())
    }
}

// --- Signup ---

#[tokio::test]
async fn test_signup_stores_hashed_user_with_tokens() {
    let directory = Arc::new(InMemoryUserDirectory::new());
    let users = users_over(directory.clone());

    let created = users
        .signup(signup_request("alan@example.com", "+44 1"))
        .await
        .unwrap();

    assert_eq!(created.id, created.subject_id);
    assert_eq!(created.role, Role::User);
    assert_ne!(created.password_hash, "enigma-1912");
    assert!(created.password_hash.starts_with("$argon2id$"));

    let access = created.access_token.as_deref().unwrap();
    let claims = tokens().validate(access).unwrap();
    assert_eq!(claims.subject_id, created.subject_id);
    assert_eq!(claims.email, "alan@example.com");

    let stored = directory
        .find_by_email("alan@example.com", Deadline::after(TIMEOUT))
        .await
        .unwrap();
    assert_eq!(stored, Some(created));
}

#[tokio::test]
async fn test_signup_rejects_taken_email_or_phone() {
    let users = users_over(InMemoryUserDirectory::shared());
    users
        .signup(signup_request("alan@example.com", "+44 1"))
        .await
        .unwrap();

    let same_email = users
        .signup(signup_request("alan@example.com", "+44 2"))
        .await;
    assert!(matches!(same_email, Err(AppError::Conflict(_))));

    let same_phone = users
        .signup(signup_request("other@example.com", "+44 1"))
        .await;
    assert!(matches!(same_phone, Err(AppError::Conflict(_))));

    // Exactly one record made it in.
    let page = users.get_users(PageWindow::new(0, 10)).await.unwrap();
    assert_eq!(page.total_count, 1);
}

#[tokio::test]
async fn test_signup_reports_invalid_field() {
    let users = users_over(InMemoryUserDirectory::shared());

    let mut bad_email = signup_request("not-an-email", "+44 1");
    bad_email.first_name = "Al".to_string();
    match users.signup(bad_email).await {
        Err(AppError::Validation { field, .. }) => assert_eq!(field, "email"),
        other => panic!("expected validation error, got {other:?}"),
    }

    let mut short_password = signup_request("alan@example.com", "+44 1");
    short_password.password = "12345".to_string();
    match users.signup(short_password).await {
        Err(AppError::Validation { field, .. }) => assert_eq!(field, "password"),
        other => panic!("expected validation error, got {other:?}"),
    }

    let mut short_name = signup_request("alan@example.com", "+44 1");
    short_name.last_name = "T".to_string();
    match users.signup(short_name).await {
        Err(AppError::Validation { field, .. }) => assert_eq!(field, "last_name"),
        other => panic!("expected validation error, got {other:?}"),
    }
}

// --- Login ---

#[tokio::test]
async fn test_login_with_correct_password_refreshes_tokens() {
    let directory = Arc::new(InMemoryUserDirectory::new());
    let users = users_over(directory.clone());
    let created = users
        .signup(signup_request("alan@example.com", "+44 1"))
        .await
        .unwrap();

    let logged_in = users.login("alan@example.com", "enigma-1912").await.unwrap();
    assert_eq!(logged_in.subject_id, created.subject_id);

    let access = logged_in.access_token.clone().unwrap();
    assert!(tokens().validate(&access).is_ok());

    let stored = directory
        .find_by_subject_id(&created.subject_id, Deadline::after(TIMEOUT))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.access_token, logged_in.access_token);
    assert_eq!(stored.refresh_token, logged_in.refresh_token);
}

#[tokio::test]
async fn test_login_with_wrong_password_changes_nothing() {
    let directory = Arc::new(InMemoryUserDirectory::new());
    let users = users_over(directory.clone());
    let created = users
        .signup(signup_request("alan@example.com", "+44 1"))
        .await
        .unwrap();

    let result = users.login("alan@example.com", "wrong-password").await;
    assert!(matches!(result, Err(AppError::InvalidCredential)));

    let stored = directory
        .find_by_subject_id(&created.subject_id, Deadline::after(TIMEOUT))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored, created);
}

#[tokio::test]
async fn test_login_unknown_email_is_not_found() {
    let users = users_over(InMemoryUserDirectory::shared());
    let result = users.login("ghost@example.com", "whatever").await;
    assert!(matches!(result, Err(AppError::NotFound(_))));
}

// --- Promote ---

#[tokio::test]
async fn test_promote_decision_table() {
    let users = users_over(InMemoryUserDirectory::shared());
    let created = users
        .signup(signup_request("alan@example.com", "+44 1"))
        .await
        .unwrap();

    assert_eq!(
        users.promote(&created.subject_id).await.unwrap(),
        PromoteOutcome::Promoted
    );
    assert_eq!(
        users.get_user(&created.subject_id).await.unwrap().role,
        Role::Admin
    );

    assert_eq!(
        users.promote(&created.subject_id).await.unwrap(),
        PromoteOutcome::NoOp
    );

    assert!(matches!(
        users.promote("missing-subject").await,
        Err(AppError::NotFound(_))
    ));
}

// --- Reads ---

#[tokio::test]
async fn test_get_user_and_update_all_tokens() {
    let users = users_over(InMemoryUserDirectory::shared());
    let created = users
        .signup(signup_request("alan@example.com", "+44 1"))
        .await
        .unwrap();

    assert!(matches!(
        users.get_user("missing").await,
        Err(AppError::NotFound(_))
    ));

    let pair = TokenPair {
        access_token: "a".to_string(),
        refresh_token: "r".to_string(),
    };
    let counts = users
        .update_all_tokens(&created.subject_id, &pair)
        .await
        .unwrap();
    assert_eq!(counts.matched, 1);

    let fetched = users.get_user(&created.subject_id).await.unwrap();
    assert_eq!(fetched.access_token.as_deref(), Some("a"));
    assert_eq!(fetched.refresh_token.as_deref(), Some("r"));
}

// --- Tasks ---

#[tokio::test]
async fn test_task_lifecycle() {
    let tasks = TaskUseCase::new(InMemoryTaskStore::shared(), TIMEOUT);

    let named = tasks.create(task_request(Some("t-1"), "Write")).await.unwrap();
    assert_eq!(named.id, "t-1");

    let generated = tasks.create(task_request(None, "Review")).await.unwrap();
    assert!(!generated.id.is_empty());
    let blank = tasks.create(task_request(Some("  "), "Ship")).await.unwrap();
    assert_ne!(blank.id.trim(), "");

    assert!(matches!(
        tasks.create(task_request(Some("t-1"), "Again")).await,
        Err(AppError::Conflict(_))
    ));
    assert!(matches!(
        tasks.create(task_request(None, "")).await,
        Err(AppError::Validation { .. })
    ));

    assert_eq!(tasks.list().await.unwrap().len(), 3);

    let updated = tasks
        .update("t-1", task_request(Some("ignored"), "Write more"))
        .await
        .unwrap();
    assert_eq!(updated.id, "t-1");
    assert_eq!(tasks.get("t-1").await.unwrap().title, "Write more");

    assert!(matches!(
        tasks.update("t-404", task_request(None, "x")).await,
        Err(AppError::NotFound(_))
    ));

    tasks.delete("t-1").await.unwrap();
    assert!(matches!(tasks.get("t-1").await, Err(AppError::NotFound(_))));
    assert!(matches!(tasks.delete("t-1").await, Err(AppError::NotFound(_))));
}

// --- Deadlines ---

#[tokio::test]
async fn test_deadline_passes_through_fast_work() {
    let deadline = Deadline::after(Duration::from_secs(5));
    assert!(!deadline.is_expired());
    assert!(deadline.remaining() > Duration::from_secs(4));

    assert_eq!(deadline.run(async { 42 }).await, Ok(42));
}

#[tokio::test]
async fn test_huge_budget_saturates_instead_of_overflowing() {
    let deadline = Deadline::after(Duration::MAX);
    assert!(!deadline.is_expired());
    assert!(deadline.remaining() > Duration::from_secs(60 * 60 * 24 * 300));

    let users = UserUseCase::new(InMemoryUserDirectory::shared(), tokens(), hasher(), Duration::MAX);
    users
        .signup(signup_request("far@example.com", "+9"))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_deadline_cuts_off_slow_work() {
    let deadline = Deadline::after(Duration::from_millis(20));
    let result = deadline
        .run(tokio::time::sleep(Duration::from_secs(30)))
        .await;

    assert_eq!(result, Err(Elapsed));
    assert!(deadline.is_expired());
    assert_eq!(deadline.remaining(), Duration::ZERO);
}

#[tokio::test]
async fn test_slow_task_store_times_out() {
    let tasks = TaskUseCase::new(Arc::new(SlowStore), Duration::from_millis(50));

    let started = std::time::Instant::now();
    let result = tasks.list().await;

    assert!(matches!(result, Err(AppError::Timeout)));
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn test_slow_user_directory_times_out() {
    let users = UserUseCase::new(
        Arc::new(SlowStore),
        tokens(),
        hasher(),
        Duration::from_millis(50),
    );

    assert!(matches!(
        users.login("a@example.com", "pw").await,
        Err(AppError::Timeout)
    ));
    assert!(matches!(
        users.promote("anyone").await,
        Err(AppError::Timeout)
    ));
    assert!(matches!(
        users.signup(signup_request("b@example.com", "+1")).await,
        Err(AppError::Timeout)
    ));
}
