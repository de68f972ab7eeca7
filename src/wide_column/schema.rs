// src/wide_column/schema.rs

use std::fmt;

/// Logical tables and server-side materialized views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Table {
    /// One row per exported question, linked by prev/next pointers.
    Questions,
    /// One row per published quiz.
    Quizzes,
    /// Base table for user progress, clustered by score descending.
    UserQuizzes,
    /// View of `UserQuizzes` keyed by user, for progress lookups.
    UserQuizzesByUser,
    /// View of `UserQuizzes` ordered by score then recency, for leaderboards.
    UserQuizzesByScore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Column {
    QuizUuid,
    QuestionUuid,
    PrevQuestionUuid,
    NextQuestionUuid,
    AnswerHash,
    TotalTime,
    UserUuid,
    FullName,
    CurrentQuestionUuid,
    Score,
    CreatedAt,
    UpdatedAt,
}

/// Sort direction for a clustering column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

/// `ORDER BY` clause restricted to a known column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderBy {
    pub column: Column,
    pub direction: Direction,
}

impl OrderBy {
    pub fn desc(column: Column) -> Self {
        Self {
            column,
            direction: Direction::Desc,
        }
    }

    pub fn asc(column: Column) -> Self {
        Self {
            column,
            direction: Direction::Asc,
        }
    }
}

impl Table {
    pub const ALL: [Table; 5] = [
        Table::Questions,
        Table::Quizzes,
        Table::UserQuizzes,
        Table::UserQuizzesByUser,
        Table::UserQuizzesByScore,
    ];

    /// Physical name, shared with the peer services reading the same keyspace.
    pub fn name(self) -> &'static str {
        match self {
            Table::Questions => "questions",
            Table::Quizzes => "quizs",
            Table::UserQuizzes => "user_quizs",
            Table::UserQuizzesByUser => "user_quizs_by_user",
            Table::UserQuizzesByScore => "user_quizs_by_score",
        }
    }

    pub fn columns(self) -> &'static [Column] {
        use Column::*;
        match self {
            Table::Questions => &[
                QuizUuid,
                QuestionUuid,
                PrevQuestionUuid,
                NextQuestionUuid,
                AnswerHash,
            ],
            Table::Quizzes => &[QuizUuid, QuestionUuid, TotalTime],
            Table::UserQuizzes | Table::UserQuizzesByUser | Table::UserQuizzesByScore => &[
                QuizUuid,
                UserUuid,
                Score,
                FullName,
                CurrentQuestionUuid,
                CreatedAt,
                UpdatedAt,
            ],
        }
    }

    /// Primary key columns, partition key first.
    pub fn primary_key(self) -> &'static [Column] {
        use Column::*;
        match self {
            Table::Questions => &[QuizUuid, QuestionUuid],
            Table::Quizzes => &[QuizUuid],
            Table::UserQuizzes => &[QuizUuid, Score, UserUuid],
            Table::UserQuizzesByUser => &[UserUuid, QuizUuid, Score],
            Table::UserQuizzesByScore => &[QuizUuid, Score, UpdatedAt, UserUuid],
        }
    }

    /// Clustering order applied when a partition is read.
    pub fn clustering(self) -> &'static [OrderBy] {
        const SCORE_DESC: OrderBy = OrderBy {
            column: Column::Score,
            direction: Direction::Desc,
        };
        const UPDATED_DESC: OrderBy = OrderBy {
            column: Column::UpdatedAt,
            direction: Direction::Desc,
        };
        match self {
            Table::UserQuizzes => &[SCORE_DESC],
            Table::UserQuizzesByScore => &[SCORE_DESC, UPDATED_DESC],
            _ => &[],
        }
    }

    /// Base table a view is maintained from.
    pub fn base(self) -> Option<Table> {
        match self {
            Table::UserQuizzesByUser | Table::UserQuizzesByScore => Some(Table::UserQuizzes),
            _ => None,
        }
    }

    pub fn is_view(self) -> bool {
        self.base().is_some()
    }

    pub fn has_column(self, column: Column) -> bool {
        self.columns().contains(&column)
    }
}

impl Column {
    pub fn name(self) -> &'static str {
        match self {
            Column::QuizUuid => "quiz_uuid",
            Column::QuestionUuid => "question_uuid",
            Column::PrevQuestionUuid => "prev_question_uuid",
            Column::NextQuestionUuid => "next_question_uuid",
            Column::AnswerHash => "answer_hash",
            Column::TotalTime => "total_time",
            Column::UserUuid => "user_uuid",
            Column::FullName => "fullname",
            Column::CurrentQuestionUuid => "current_question_uuid",
            Column::Score => "score",
            Column::CreatedAt => "created_at",
            Column::UpdatedAt => "updated_at",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for OrderBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dir = match self.direction {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        };
        write!(f, "{} {}", self.column, dir)
    }
}

/// DDL for every table and view, in creation order.
pub fn ddl() -> [&'static str; 5] {
    [
        r#"CREATE TABLE IF NOT EXISTS user_quizs (
    quiz_uuid UUID,
    score INT,
    user_uuid UUID,
    fullname TEXT,
    current_question_uuid UUID,
    created_at TIMESTAMP,
    updated_at TIMESTAMP,
    PRIMARY KEY (quiz_uuid, score, user_uuid)
) WITH CLUSTERING ORDER BY (score DESC)"#,
        r#"CREATE TABLE IF NOT EXISTS questions (
    quiz_uuid UUID,
    question_uuid UUID,
    prev_question_uuid UUID,
    next_question_uuid UUID,
    answer_hash TEXT,
    PRIMARY KEY (quiz_uuid, question_uuid)
)"#,
        r#"CREATE TABLE IF NOT EXISTS quizs (
    quiz_uuid UUID PRIMARY KEY,
    question_uuid UUID,
    total_time INT
)"#,
        r#"CREATE MATERIALIZED VIEW IF NOT EXISTS user_quizs_by_user AS
    SELECT quiz_uuid, user_uuid, score, fullname, current_question_uuid, created_at, updated_at
    FROM user_quizs
    WHERE quiz_uuid IS NOT NULL AND user_uuid IS NOT NULL AND score IS NOT NULL
    PRIMARY KEY (user_uuid, quiz_uuid, score)"#,
        r#"CREATE MATERIALIZED VIEW IF NOT EXISTS user_quizs_by_score AS
    SELECT quiz_uuid, score, user_uuid, fullname, current_question_uuid, created_at, updated_at
    FROM user_quizs
    WHERE quiz_uuid IS NOT NULL AND score IS NOT NULL AND user_uuid IS NOT NULL AND updated_at IS NOT NULL
    PRIMARY KEY (quiz_uuid, score, updated_at, user_uuid)
    WITH CLUSTERING ORDER BY (score DESC, updated_at DESC)"#,
    ]
}
