// src/stores/relational.rs

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::quiz::{Answer, AnswerRow, Question, QuestionRow, Quiz, QuizRow};
use crate::models::user::{NewUser, User};

#[async_trait]
pub trait QuizGraphReader: Send + Sync + 'static {
    /// Loads a quiz with its questions and answers, or `None` if absent.
    async fn get_quiz_graph(&self, uuid: Uuid) -> AppResult<Option<Quiz>>;
}

#[async_trait]
pub trait UserDirectory: Send + Sync + 'static {
    async fn find_by_username(&self, username: &str) -> AppResult<Option<User>>;

    async fn find_by_uuid(&self, uuid: Uuid) -> AppResult<Option<User>>;

    /// Inserts a non-admin account. A taken username is `Conflict`.
    async fn create(&self, user: NewUser) -> AppResult<User>;

    /// Replaces the stored password hash. `NotFound` if the user is gone.
    async fn update_password(&self, uuid: Uuid, password_hash: &str) -> AppResult<()>;
}

/// Postgres-backed reader.
#[derive(Debug, Clone)]
pub struct PgQuizGraphReader {
    pool: PgPool,
}

impl PgQuizGraphReader {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl QuizGraphReader for PgQuizGraphReader {
    async fn get_quiz_graph(&self, uuid: Uuid) -> AppResult<Option<Quiz>> {
        let quiz = sqlx::query_as::<_, QuizRow>(
            r#"
            SELECT uuid, title, is_published, created_at, updated_at
            FROM quizzes
            WHERE uuid = $1
            "#,
        )
        .bind(uuid)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to fetch quiz: {:?}", e);
            AppError::from(e)
        })?;

        let Some(quiz) = quiz else {
            return Ok(None);
        };

        let questions = sqlx::query_as::<_, QuestionRow>(
            r#"
            SELECT uuid, description, position, time_limit
            FROM questions
            WHERE quiz_uuid = $1
            ORDER BY position
            "#,
        )
        .bind(uuid)
        .fetch_all(&self.pool)
        .await?;

        let answers = sqlx::query_as::<_, AnswerRow>(
            r#"
            SELECT a.uuid, a.question_uuid, a.description, a.is_correct
            FROM answers a
            JOIN questions q ON q.uuid = a.question_uuid
            WHERE q.quiz_uuid = $1
            ORDER BY a.created_at
            "#,
        )
        .bind(uuid)
        .fetch_all(&self.pool)
        .await?;

        let mut by_question: HashMap<Uuid, Vec<Answer>> = HashMap::new();
        for a in answers {
            by_question.entry(a.question_uuid).or_default().push(Answer {
                uuid: a.uuid,
                description: a.description,
                is_correct: a.is_correct,
            });
        }

        Ok(Some(Quiz {
            uuid: quiz.uuid,
            title: quiz.title,
            is_published: quiz.is_published,
            created_at: quiz.created_at,
            updated_at: quiz.updated_at,
            questions: questions
                .into_iter()
                .map(|q| Question {
                    answers: by_question.remove(&q.uuid).unwrap_or_default(),
                    uuid: q.uuid,
                    description: q.description,
                    position: q.position,
                    time_limit: q.time_limit,
                })
                .collect(),
        }))
    }
}

#[derive(Debug, Clone)]
pub struct PgUserDirectory {
    pool: PgPool,
}

impl PgUserDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    async fn find_by_username(&self, username: &str) -> AppResult<Option<User>> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, uuid, username, password, full_name, is_admin
            FROM users
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Login DB error: {:?}", e);
            AppError::from(e)
        })
    }

    async fn find_by_uuid(&self, uuid: Uuid) -> AppResult<Option<User>> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, uuid, username, password, full_name, is_admin
            FROM users
            WHERE uuid = $1
            "#,
        )
        .bind(uuid)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)
    }

    async fn create(&self, user: NewUser) -> AppResult<User> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (uuid, username, password, full_name, is_admin)
            VALUES ($1, $2, $3, $4, FALSE)
            RETURNING id, uuid, username, password, full_name, is_admin
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(&user.full_name)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            let unique = e
                .as_database_error()
                .is_some_and(|db| db.is_unique_violation());
            if unique {
                AppError::Conflict(format!("Username '{}' already exists", user.username))
            } else {
                tracing::error!("Failed to register user: {:?}", e);
                AppError::from(e)
            }
        })
    }

    async fn update_password(&self, uuid: Uuid, password_hash: &str) -> AppResult<()> {
        let result = sqlx::query("UPDATE users SET password = $1 WHERE uuid = $2")
            .bind(password_hash)
            .bind(uuid)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("user {uuid}")));
        }
        Ok(())
    }
}

/// In-memory quiz source.
#[derive(Debug, Default)]
pub struct MemoryQuizGraphReader {
    quizzes: Mutex<HashMap<Uuid, Quiz>>,
}

impl MemoryQuizGraphReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, quiz: Quiz) {
        if let Ok(mut quizzes) = self.quizzes.lock() {
            quizzes.insert(quiz.uuid, quiz);
        }
    }
}

#[async_trait]
impl QuizGraphReader for MemoryQuizGraphReader {
    async fn get_quiz_graph(&self, uuid: Uuid) -> AppResult<Option<Quiz>> {
        let quizzes = self
            .quizzes
            .lock()
            .map_err(|_| AppError::Internal("lock poisoned".into()))?;
        Ok(quizzes.get(&uuid).cloned())
    }
}

#[derive(Debug, Default)]
pub struct MemoryUserDirectory {
    users: Mutex<HashMap<String, User>>,
}

impl MemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, user: User) {
        if let Ok(mut users) = self.users.lock() {
            users.insert(user.username.clone(), user);
        }
    }

    fn lock(&self) -> AppResult<std::sync::MutexGuard<'_, HashMap<String, User>>> {
        self.users
            .lock()
            .map_err(|_| AppError::Internal("lock poisoned".into()))
    }
}

#[async_trait]
impl UserDirectory for MemoryUserDirectory {
    async fn find_by_username(&self, username: &str) -> AppResult<Option<User>> {
        Ok(self.lock()?.get(username).cloned())
    }

    async fn find_by_uuid(&self, uuid: Uuid) -> AppResult<Option<User>> {
        Ok(self.lock()?.values().find(|u| u.uuid == uuid).cloned())
    }

    async fn create(&self, user: NewUser) -> AppResult<User> {
        let mut users = self.lock()?;
        if users.contains_key(&user.username) {
            return Err(AppError::Conflict(format!(
                "Username '{}' already exists",
                user.username
            )));
        }
        let created = User {
            id: users.values().map(|u| u.id).max().unwrap_or(0) + 1,
            uuid: Uuid::new_v4(),
            username: user.username,
            password: user.password_hash,
            full_name: user.full_name,
            is_admin: false,
        };
        users.insert(created.username.clone(), created.clone());
        Ok(created)
    }

    async fn update_password(&self, uuid: Uuid, password_hash: &str) -> AppResult<()> {
        let mut users = self.lock()?;
        let user = users
            .values_mut()
            .find(|u| u.uuid == uuid)
            .ok_or_else(|| AppError::NotFound(format!("user {uuid}")))?;
        user.password = password_hash.to_string();
        Ok(())
    }
}
