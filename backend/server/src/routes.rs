use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use tally::{BadgeCounts, UserId};
use tracing::info;

use crate::{
    answers::{create_answer, list_answers, user_answers},
    database::{Subject, apply_vote},
    error::AppError,
    models::{
        AnswerFilter, AnswerSummary, CreateAnswer, CreateQuestion, CreateUser, EditQuestion,
        EditUser, ListParams, Question, QuestionDetail, QuestionFilter, QuestionSummary,
        SaveRequest, SaveResult, SavedFilter, TagSummary, User, UserFilter, UserInfo, VoteRequest,
        VoteTally,
    },
    questions::{
        create_question, delete_question, edit_question, hot_questions, list_questions,
        user_questions, view_question,
    },
    state::AppState,
    tags::list_tags,
    users::{
        create_user, delete_user, edit_user, list_users, saved_questions, toggle_saved,
        user_badges, user_info,
    },
};

type Shared = State<Arc<AppState>>;

async fn vote(
    state: &AppState,
    subject: Subject,
    request: VoteRequest,
) -> Result<Json<VoteTally>, AppError> {
    let mut conn = state.connection();
    let votes = apply_vote(&mut conn, subject, &request.user_id, request.direction).await?;

    Ok(Json(VoteTally::new(&votes, &request.user_id)))
}

// Questions

pub async fn create_question_handler(
    State(state): Shared,
    Json(payload): Json<CreateQuestion>,
) -> Result<impl IntoResponse, AppError> {
    let question = create_question(&mut state.connection(), payload).await?;

    Ok((StatusCode::CREATED, Json(question)))
}

pub async fn list_questions_handler(
    State(state): Shared,
    Query(params): Query<ListParams<QuestionFilter>>,
) -> Result<Json<Vec<QuestionSummary>>, AppError> {
    Ok(Json(list_questions(&mut state.connection(), params).await?))
}

pub async fn hot_questions_handler(
    State(state): Shared,
) -> Result<Json<Vec<QuestionSummary>>, AppError> {
    Ok(Json(hot_questions(&mut state.connection()).await?))
}

pub async fn question_handler(
    State(state): Shared,
    Path(id): Path<u64>,
) -> Result<Json<QuestionDetail>, AppError> {
    Ok(Json(view_question(&mut state.connection(), id).await?))
}

pub async fn edit_question_handler(
    State(state): Shared,
    Path(id): Path<u64>,
    Json(payload): Json<EditQuestion>,
) -> Result<Json<Question>, AppError> {
    Ok(Json(edit_question(&mut state.connection(), id, payload).await?))
}

pub async fn delete_question_handler(
    State(state): Shared,
    Path(id): Path<u64>,
) -> Result<StatusCode, AppError> {
    delete_question(&mut state.connection(), id).await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn question_votes_handler(
    State(state): Shared,
    Path(id): Path<u64>,
    Json(payload): Json<VoteRequest>,
) -> Result<Json<VoteTally>, AppError> {
    vote(&state, Subject::Question(id), payload).await
}

// Answers

pub async fn create_answer_handler(
    State(state): Shared,
    Path(question_id): Path<u64>,
    Json(payload): Json<CreateAnswer>,
) -> Result<impl IntoResponse, AppError> {
    let answer = create_answer(&mut state.connection(), question_id, payload).await?;

    Ok((StatusCode::CREATED, Json(answer)))
}

pub async fn list_answers_handler(
    State(state): Shared,
    Path(question_id): Path<u64>,
    Query(params): Query<ListParams<AnswerFilter>>,
) -> Result<Json<Vec<AnswerSummary>>, AppError> {
    let answers = list_answers(&mut state.connection(), question_id, params.filter).await?;

    Ok(Json(answers))
}

pub async fn answer_votes_handler(
    State(state): Shared,
    Path(id): Path<u64>,
    Json(payload): Json<VoteRequest>,
) -> Result<Json<VoteTally>, AppError> {
    vote(&state, Subject::Answer(id), payload).await
}

// Users

pub async fn create_user_handler(
    State(state): Shared,
    Json(payload): Json<CreateUser>,
) -> Result<impl IntoResponse, AppError> {
    let user = create_user(&mut state.connection(), payload).await?;

    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn list_users_handler(
    State(state): Shared,
    Query(params): Query<ListParams<UserFilter>>,
) -> Result<Json<Vec<User>>, AppError> {
    Ok(Json(list_users(&mut state.connection(), params).await?))
}

pub async fn user_handler(
    State(state): Shared,
    Path(id): Path<String>,
) -> Result<Json<UserInfo>, AppError> {
    let info = user_info(
        &mut state.connection(),
        &UserId::from(id),
        &state.thresholds,
        state.config.badge_policy,
    )
    .await?;

    Ok(Json(info))
}

pub async fn edit_user_handler(
    State(state): Shared,
    Path(id): Path<String>,
    Json(payload): Json<EditUser>,
) -> Result<Json<User>, AppError> {
    Ok(Json(edit_user(&mut state.connection(), &UserId::from(id), payload).await?))
}

pub async fn delete_user_handler(
    State(state): Shared,
    Path(id): Path<String>,
) -> Result<Json<User>, AppError> {
    let user = delete_user(&mut state.connection(), &UserId::from(id)).await?;
    info!("Deleted user {}", user.username);

    Ok(Json(user))
}

pub async fn user_questions_handler(
    State(state): Shared,
    Path(id): Path<String>,
) -> Result<Json<Vec<QuestionSummary>>, AppError> {
    Ok(Json(user_questions(&mut state.connection(), &UserId::from(id)).await?))
}

pub async fn user_answers_handler(
    State(state): Shared,
    Path(id): Path<String>,
) -> Result<Json<Vec<AnswerSummary>>, AppError> {
    Ok(Json(user_answers(&mut state.connection(), &UserId::from(id)).await?))
}

pub async fn saved_questions_handler(
    State(state): Shared,
    Path(id): Path<String>,
    Query(params): Query<ListParams<SavedFilter>>,
) -> Result<Json<Vec<QuestionSummary>>, AppError> {
    let saved = saved_questions(&mut state.connection(), &UserId::from(id), params).await?;

    Ok(Json(saved))
}

pub async fn toggle_saved_handler(
    State(state): Shared,
    Path(id): Path<String>,
    Json(payload): Json<SaveRequest>,
) -> Result<Json<SaveResult>, AppError> {
    let result = toggle_saved(
        &mut state.connection(),
        &UserId::from(id),
        payload.question_id,
    )
    .await?;

    Ok(Json(result))
}

pub async fn badges_handler(
    State(state): Shared,
    Path(id): Path<String>,
) -> Result<Json<BadgeCounts>, AppError> {
    let counts = user_badges(
        &mut state.connection(),
        &UserId::from(id),
        &state.thresholds,
        state.config.badge_policy,
    )
    .await?;

    Ok(Json(counts))
}

// Tags

pub async fn tags_handler(State(state): Shared) -> Result<Json<Vec<TagSummary>>, AppError> {
    Ok(Json(list_tags(&mut state.connection()).await?))
}
