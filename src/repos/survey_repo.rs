//! Surveys with nested questions, choices and responses.
//!
//! Writes that touch several tables (survey + questions + choices,
//! response + answers) run inside one transaction so partial structures
//! never become visible.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use thiserror::Error;
use uuid::Uuid;

use crate::error::is_unique_violation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "question_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum QuestionType {
    Text,
    Radio,
    Checkbox,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Survey {
    pub id: Uuid,
    pub event_id: Option<Uuid>,
    pub title: String,
    pub description: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Question {
    pub id: Uuid,
    pub survey_id: Uuid,
    pub text: String,
    pub question_type: QuestionType,
    pub is_required: bool,
    pub position: i32,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Choice {
    pub id: Uuid,
    pub question_id: Uuid,
    pub text: String,
    pub position: i32,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SurveyResponse {
    pub id: Uuid,
    pub survey_id: Uuid,
    pub user_id: Uuid,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct QuestionDetail {
    #[serde(flatten)]
    pub question: Question,
    pub choices: Vec<Choice>,
}

#[derive(Debug, Serialize)]
pub struct SurveyDetail {
    #[serde(flatten)]
    pub survey: Survey,
    pub questions: Vec<QuestionDetail>,
}

#[derive(Debug, Deserialize)]
pub struct NewChoice {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct NewQuestion {
    pub text: String,
    pub question_type: QuestionType,
    #[serde(default = "default_required")]
    pub is_required: bool,
    #[serde(default)]
    pub choices: Vec<NewChoice>,
}

fn default_required() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct NewSurvey {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub event_id: Option<Uuid>,
    #[serde(default)]
    pub questions: Vec<NewQuestion>,
}

#[derive(Debug, Deserialize)]
pub struct NewAnswer {
    pub question_id: Uuid,
    pub text_answer: Option<String>,
    pub choice_id: Option<Uuid>,
}

#[derive(Debug, Error)]
pub enum SurveyError {
    #[error("survey not found")]
    NotFound,
    #[error("a response for this survey already exists")]
    AlreadySubmitted,
    #[error("survey is closed")]
    Closed,
    #[error("answer references a question outside this survey")]
    ForeignQuestion,
    #[error("choice does not belong to the question")]
    ForeignChoice,
    #[error("answer does not match the question type")]
    WrongShape,
    #[error("required question not answered")]
    MissingRequired,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub async fn list(pool: &PgPool) -> Result<Vec<Survey>, sqlx::Error> {
    sqlx::query_as::<_, Survey>("SELECT * FROM surveys ORDER BY created_at DESC")
        .fetch_all(pool)
        .await
}

pub async fn create(pool: &PgPool, survey: &NewSurvey) -> Result<SurveyDetail, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let created = sqlx::query_as::<_, Survey>(
        r#"
        INSERT INTO surveys (title, description, event_id)
        VALUES ($1, $2, $3)
        RETURNING *
        "#,
    )
    .bind(&survey.title)
    .bind(&survey.description)
    .bind(survey.event_id)
    .fetch_one(&mut *tx)
    .await?;

    let mut questions = Vec::with_capacity(survey.questions.len());
    for (pos, q) in survey.questions.iter().enumerate() {
        let question = sqlx::query_as::<_, Question>(
            r#"
            INSERT INTO questions (survey_id, text, question_type, is_required, position)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(created.id)
        .bind(&q.text)
        .bind(q.question_type)
        .bind(q.is_required)
        .bind(pos as i32)
        .fetch_one(&mut *tx)
        .await?;

        let mut choices = Vec::with_capacity(q.choices.len());
        for (cpos, c) in q.choices.iter().enumerate() {
            let choice = sqlx::query_as::<_, Choice>(
                r#"
                INSERT INTO choices (question_id, text, position)
                VALUES ($1, $2, $3)
                RETURNING *
                "#,
            )
            .bind(question.id)
            .bind(&c.text)
            .bind(cpos as i32)
            .fetch_one(&mut *tx)
            .await?;
            choices.push(choice);
        }

        questions.push(QuestionDetail { question, choices });
    }

    tx.commit().await?;
    Ok(SurveyDetail { survey: created, questions })
}

pub async fn find_detail(pool: &PgPool, id: Uuid) -> Result<Option<SurveyDetail>, sqlx::Error> {
    let Some(survey) = sqlx::query_as::<_, Survey>("SELECT * FROM surveys WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
    else {
        return Ok(None);
    };

    let questions = sqlx::query_as::<_, Question>(
        "SELECT * FROM questions WHERE survey_id = $1 ORDER BY position",
    )
    .bind(id)
    .fetch_all(pool)
    .await?;

    let mut detail = Vec::with_capacity(questions.len());
    for question in questions {
        let choices = sqlx::query_as::<_, Choice>(
            "SELECT * FROM choices WHERE question_id = $1 ORDER BY position",
        )
        .bind(question.id)
        .fetch_all(pool)
        .await?;
        detail.push(QuestionDetail { question, choices });
    }

    Ok(Some(SurveyDetail { survey, questions: detail }))
}

pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let res = sqlx::query("DELETE FROM surveys WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(res.rows_affected() > 0)
}

/// Record one user's answers to a survey.
///
/// Validation happens against the survey's own questions: answers must
/// reference questions belonging to the survey, and every required
/// question needs an answer. Duplicate submissions surface the unique
/// constraint as [`SurveyError::AlreadySubmitted`].
pub async fn submit_response(
    pool: &PgPool,
    survey_id: Uuid,
    user_id: Uuid,
    answers: &[NewAnswer],
) -> Result<SurveyResponse, SurveyError> {
    let survey = sqlx::query_as::<_, Survey>("SELECT * FROM surveys WHERE id = $1")
        .bind(survey_id)
        .fetch_optional(pool)
        .await?
        .ok_or(SurveyError::NotFound)?;
    if !survey.is_active {
        return Err(SurveyError::Closed);
    }

    let questions = sqlx::query_as::<_, Question>(
        "SELECT * FROM questions WHERE survey_id = $1 ORDER BY position",
    )
    .bind(survey_id)
    .fetch_all(pool)
    .await?;

    for answer in answers {
        let question = questions
            .iter()
            .find(|q| q.id == answer.question_id)
            .ok_or(SurveyError::ForeignQuestion)?;
        match question.question_type {
            QuestionType::Text => {
                if answer.choice_id.is_some() {
                    return Err(SurveyError::WrongShape);
                }
            }
            QuestionType::Radio | QuestionType::Checkbox => {
                let choice_id = answer.choice_id.ok_or(SurveyError::WrongShape)?;
                let (belongs,): (bool,) = sqlx::query_as(
                    "SELECT EXISTS (SELECT 1 FROM choices WHERE id = $1 AND question_id = $2)",
                )
                .bind(choice_id)
                .bind(question.id)
                .fetch_one(pool)
                .await?;
                if !belongs {
                    return Err(SurveyError::ForeignChoice);
                }
            }
        }
    }
    for question in questions.iter().filter(|q| q.is_required) {
        let answered = answers.iter().any(|a| {
            a.question_id == question.id
                && (a.choice_id.is_some()
                    || a.text_answer.as_deref().is_some_and(|t| !t.trim().is_empty()))
        });
        if !answered {
            return Err(SurveyError::MissingRequired);
        }
    }

    let mut tx = pool.begin().await?;

    let response = sqlx::query_as::<_, SurveyResponse>(
        r#"
        INSERT INTO survey_responses (survey_id, user_id)
        VALUES ($1, $2)
        RETURNING *
        "#,
    )
    .bind(survey_id)
    .bind(user_id)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            SurveyError::AlreadySubmitted
        } else {
            SurveyError::Database(e)
        }
    })?;

    for answer in answers {
        sqlx::query(
            r#"
            INSERT INTO answers (response_id, question_id, text_answer, choice_id)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(response.id)
        .bind(answer.question_id)
        .bind(&answer.text_answer)
        .bind(answer.choice_id)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(response)
}

pub async fn response_for_user(
    pool: &PgPool,
    survey_id: Uuid,
    user_id: Uuid,
) -> Result<Option<SurveyResponse>, sqlx::Error> {
    sqlx::query_as::<_, SurveyResponse>(
        "SELECT * FROM survey_responses WHERE survey_id = $1 AND user_id = $2",
    )
    .bind(survey_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await
}
