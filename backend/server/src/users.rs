//! # Users
//!
//! Profiles come from the identity provider, so the id is whatever it hands us. We only keep
//! the profile record and the id sets pointing at the user's questions, answers and saves.
//!
//! ## Badges
//!
//! Recomputed on every request from live counts, never stored.
//! - QUESTION_COUNT: questions asked
//! - ANSWER_COUNT: answers given
//! - QUESTION_UPVOTES: upvotes across all asked questions
//! - ANSWER_UPVOTES: upvotes across all given answers
//! - TOTAL_VIEWS: views across all asked questions
//!
//! ## Reputation
//!
//! Same live counts, views excluded: questions + answers + upvotes received. Filled in whenever a
//! profile is returned so `top_contributors` ranks by actual activity.
use std::cmp::Reverse;

use chrono::Utc;
use redis::{AsyncCommands, aio::ConnectionManager};
use tally::{
    ActivityCriterion, BadgeCounts, BadgePolicy, BadgeThresholds, CriterionKind, UserId,
    count_badges,
};
use tracing::{info, warn};

use crate::{
    answers::{answer_votes, queue_answer_removal},
    database::{
        ANSWERS, QUESTIONS, Subject, USERS, all_records, exists, get_record, get_records,
        put_record, saved_key, user_answers_key, user_questions_key, user_votes_key,
    },
    error::AppError,
    models::{
        Answer, CreateUser, EditUser, ListParams, QuestionSummary, SaveResult, SavedFilter, User,
        UserFilter, UserInfo,
    },
    questions::{
        apply_saved_filter, load_for_removal, queue_question_removal, question_stats,
        search_titles, summarize_all, with_stats,
    },
    utils::{joined_date, matches_any, search_matcher},
};

pub async fn create_user(
    conn: &mut ConnectionManager,
    request: CreateUser,
) -> Result<User, AppError> {
    if request.id.as_str().trim().is_empty() || request.username.trim().is_empty() {
        return Err(AppError::MalformedPayload("User id and username are required".into()));
    }

    let user = User {
        id: request.id,
        name: request.name,
        username: request.username,
        picture: request.picture,
        email: request.email,
        bio: request.bio,
        reputation: 0,
        joined_at: Utc::now(),
    };

    let created: bool = conn
        .hset_nx(USERS, user.id.as_str(), serde_json::to_string(&user)?)
        .await?;

    if !created {
        return Err(AppError::Conflict("User"));
    }

    info!("User {} joined", user.id);

    Ok(user)
}

pub async fn get_user(conn: &mut ConnectionManager, id: &UserId) -> Result<User, AppError> {
    get_record(conn, USERS, id.as_str())
        .await?
        .ok_or(AppError::NotFound("User"))
}

pub fn apply_user_filter(users: &mut [User], filter: Option<UserFilter>) {
    match filter {
        Some(UserFilter::Oldest) => users.sort_by_key(|u| u.joined_at),
        Some(UserFilter::TopContributors) => users.sort_by_key(|u| Reverse(u.reputation)),
        Some(UserFilter::Newest) | None => users.sort_by_key(|u| Reverse(u.joined_at)),
    }
}

pub async fn list_users(
    conn: &mut ConnectionManager,
    params: ListParams<UserFilter>,
) -> Result<Vec<User>, AppError> {
    let matcher = search_matcher(params.q.as_deref())?;

    let mut users: Vec<User> = all_records(conn, USERS).await?;
    users.retain(|u| matches_any(&matcher, &[u.name.as_str(), u.username.as_str()]));

    for user in &mut users {
        let criteria = activity(conn, &user.id).await?;
        user.reputation = contribution_score(&criteria);
    }

    apply_user_filter(&mut users, params.filter);

    Ok(users)
}

/// Everything a user contributed, views excluded.
pub fn contribution_score(criteria: &[ActivityCriterion]) -> i64 {
    criteria
        .iter()
        .filter(|c| c.kind != CriterionKind::TotalViews)
        .map(|c| c.count as i64)
        .sum()
}

/// Applies a profile edit. Empty `bio` or `picture` clears the field.
pub fn apply_edit(user: &mut User, edit: EditUser) -> Result<(), AppError> {
    if edit.username.as_deref().is_some_and(|u| u.trim().is_empty()) {
        return Err(AppError::MalformedPayload("Username cannot be empty".into()));
    }

    if let Some(name) = edit.name {
        user.name = name.trim().to_string();
    }

    if let Some(username) = edit.username {
        user.username = username.trim().to_string();
    }

    if let Some(bio) = edit.bio {
        user.bio = Some(bio).filter(|b| !b.trim().is_empty());
    }

    if let Some(picture) = edit.picture {
        user.picture = Some(picture).filter(|p| !p.trim().is_empty());
    }

    Ok(())
}

pub async fn edit_user(
    conn: &mut ConnectionManager,
    id: &UserId,
    edit: EditUser,
) -> Result<User, AppError> {
    let mut user = get_user(conn, id).await?;
    apply_edit(&mut user, edit)?;

    put_record(conn, USERS, id.as_str(), &user).await?;

    info!("User {id} updated their profile");

    Ok(user)
}

/// Builds the activity criteria for a user from their live counters.
pub async fn activity(
    conn: &mut ConnectionManager,
    user: &UserId,
) -> Result<Vec<ActivityCriterion>, AppError> {
    let question_ids: Vec<u64> = conn.smembers(user_questions_key(user)).await?;
    let answer_ids: Vec<u64> = conn.smembers(user_answers_key(user)).await?;

    let stats = question_stats(conn, &question_ids).await?;
    let votes = answer_votes(conn, &answer_ids).await?;

    Ok(vec![
        ActivityCriterion::new(CriterionKind::QuestionCount, question_ids.len() as u64),
        ActivityCriterion::new(CriterionKind::AnswerCount, answer_ids.len() as u64),
        ActivityCriterion::new(
            CriterionKind::QuestionUpvotes,
            stats.iter().map(|s| s.upvotes).sum(),
        ),
        ActivityCriterion::new(
            CriterionKind::AnswerUpvotes,
            votes.iter().map(|(up, _)| up).sum(),
        ),
        ActivityCriterion::new(
            CriterionKind::TotalViews,
            stats.iter().map(|s| s.views).sum(),
        ),
    ])
}

pub async fn user_badges(
    conn: &mut ConnectionManager,
    user: &UserId,
    thresholds: &BadgeThresholds,
    policy: BadgePolicy,
) -> Result<BadgeCounts, AppError> {
    if !exists(conn, USERS, user.as_str()).await? {
        return Err(AppError::NotFound("User"));
    }

    let criteria = activity(conn, user).await?;

    Ok(count_badges(&criteria, thresholds, policy)?)
}

pub async fn user_info(
    conn: &mut ConnectionManager,
    id: &UserId,
    thresholds: &BadgeThresholds,
    policy: BadgePolicy,
) -> Result<UserInfo, AppError> {
    let mut user = get_user(conn, id).await?;

    let criteria = activity(conn, id).await?;
    user.reputation = contribution_score(&criteria);
    let badge_counts = count_badges(&criteria, thresholds, policy)?;

    let total = |kind: CriterionKind| {
        criteria
            .iter()
            .find(|c| c.kind == kind)
            .map_or(0, |c| c.count)
    };

    Ok(UserInfo {
        total_questions: total(CriterionKind::QuestionCount),
        total_answers: total(CriterionKind::AnswerCount),
        badge_counts,
        joined: joined_date(user.joined_at),
        user,
    })
}

/// Removes a user with everything they posted and every ballot they cast, in one `MULTI`.
pub async fn delete_user(conn: &mut ConnectionManager, id: &UserId) -> Result<User, AppError> {
    let user = get_user(conn, id).await?;

    let mut pipe = redis::pipe();
    pipe.atomic();

    let question_ids: Vec<u64> = conn.smembers(user_questions_key(id)).await?;
    for &question_id in &question_ids {
        match load_for_removal(conn, question_id).await {
            Ok((question, answers)) => queue_question_removal(&mut pipe, &question, &answers),
            Err(AppError::NotFound(_)) => warn!("User {id} lists missing question {question_id}"),
            Err(e) => return Err(e),
        }
    }

    let answer_ids: Vec<u64> = conn.smembers(user_answers_key(id)).await?;
    let answers: Vec<Answer> = get_records(conn, ANSWERS, &answer_ids).await?;

    for answer in &answers {
        queue_answer_removal(&mut pipe, answer);
    }

    let ballots: Vec<String> = conn.smembers(user_votes_key(id)).await?;
    for subject in ballot_subjects(&ballots) {
        for key in subject.vote_keys() {
            pipe.srem(key, id.as_str()).ignore();
        }
    }

    pipe.hdel(USERS, id.as_str())
        .ignore()
        .del(vec![
            saved_key(id),
            user_questions_key(id),
            user_answers_key(id),
            user_votes_key(id),
        ])
        .ignore();

    let _: () = pipe.query_async(conn).await?;

    info!(
        "User {id} deleted with {} questions, {} answers and {} ballots",
        question_ids.len(),
        answers.len(),
        ballots.len()
    );

    Ok(user)
}

/// Parses `user:{id}:votes` members, skipping anything unreadable.
pub fn ballot_subjects(members: &[String]) -> Vec<Subject> {
    members
        .iter()
        .filter_map(|member| match member.parse() {
            Ok(subject) => Some(subject),
            Err(e) => {
                warn!("Skipping ballot entry: {e}");
                None
            }
        })
        .collect()
}

pub async fn toggle_saved(
    conn: &mut ConnectionManager,
    user: &UserId,
    question_id: u64,
) -> Result<SaveResult, AppError> {
    if !exists(conn, USERS, user.as_str()).await? {
        return Err(AppError::NotFound("User"));
    }

    if !exists(conn, QUESTIONS, question_id).await? {
        return Err(AppError::NotFound("Question"));
    }

    let key = saved_key(user);
    let is_saved: bool = conn.sismember(&key, question_id).await?;

    if is_saved {
        let _: () = conn.srem(&key, question_id).await?;
    } else {
        let _: () = conn.sadd(&key, question_id).await?;
    }

    Ok(SaveResult { saved: !is_saved })
}

pub async fn saved_questions(
    conn: &mut ConnectionManager,
    user: &UserId,
    params: ListParams<SavedFilter>,
) -> Result<Vec<QuestionSummary>, AppError> {
    if !exists(conn, USERS, user.as_str()).await? {
        return Err(AppError::NotFound("User"));
    }

    let matcher = search_matcher(params.q.as_deref())?;

    let ids: Vec<u64> = conn.smembers(saved_key(user)).await?;
    let mut questions = get_records(conn, QUESTIONS, &ids).await?;
    search_titles(&mut questions, &matcher);

    let mut rows = with_stats(conn, questions).await?;
    apply_saved_filter(&mut rows, params.filter);

    Ok(summarize_all(&rows))
}
