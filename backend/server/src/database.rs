//! # Redis
//!
//! RAM database.
//!
//! Stores users, questions and answers as JSON records and keeps every vote as set membership,
//! so a ballot change is a handful of `SADD`/`SREM` calls inside one `MULTI`.
//!
//! ## Keys
//!
//! - `users`, `questions`, `answers`: hash of id -> JSON record
//! - `question:next_id`, `answer:next_id`: id counters
//! - `question:{id}:upvotes`, `question:{id}:downvotes`: user id sets (same for `answer:{id}`)
//! - `question:{id}:answers`: answer id set
//! - `question:{id}:views`: view counter
//! - `tags`: tag name set, `tag:{name}`: question id set
//! - `user:{id}:questions`, `user:{id}:answers`, `user:{id}:saved`: id sets
//! - `user:{id}:votes`: subjects the user has a ballot on, as `question:{id}` or `answer:{id}`
use std::str::FromStr;

use redis::{
    AsyncCommands, Client, IntoConnectionInfo, RedisError, ToRedisArgs,
    aio::{ConnectionManager, ConnectionManagerConfig},
};
use serde::{Serialize, de::DeserializeOwned};
use tally::{Transition, UserId, VoteDirection, VoteState};
use tracing::debug;

use crate::error::AppError;

pub const USERS: &str = "users";
pub const QUESTIONS: &str = "questions";
pub const ANSWERS: &str = "answers";
pub const TAGS: &str = "tags";

pub async fn init_redis(
    redis_url: &str,
    redis_password: Option<&str>,
) -> Result<ConnectionManager, RedisError> {
    let mut info = redis_url.into_connection_info()?;
    if let Some(password) = redis_password {
        info.redis.password = Some(password.to_string());
    }

    let config = ConnectionManagerConfig::new().set_number_of_retries(1);

    Client::open(info)?
        .get_connection_manager_with_config(config)
        .await
}

/// Something that can be voted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subject {
    Question(u64),
    Answer(u64),
}

impl Subject {
    fn prefix(self) -> (&'static str, u64) {
        match self {
            Subject::Question(id) => ("question", id),
            Subject::Answer(id) => ("answer", id),
        }
    }

    pub fn records(self) -> &'static str {
        match self {
            Subject::Question(_) => QUESTIONS,
            Subject::Answer(_) => ANSWERS,
        }
    }

    pub fn id(self) -> u64 {
        self.prefix().1
    }

    /// Member stored in `user:{id}:votes`.
    pub fn key(self) -> String {
        let (prefix, id) = self.prefix();
        format!("{prefix}:{id}")
    }

    pub fn name(self) -> &'static str {
        match self {
            Subject::Question(_) => "Question",
            Subject::Answer(_) => "Answer",
        }
    }

    pub fn vote_keys(self) -> Vec<String> {
        vec![
            self.votes_key(VoteDirection::Up),
            self.votes_key(VoteDirection::Down),
        ]
    }

    pub fn votes_key(self, direction: VoteDirection) -> String {
        let (prefix, id) = self.prefix();

        match direction {
            VoteDirection::Up => format!("{prefix}:{id}:upvotes"),
            VoteDirection::Down => format!("{prefix}:{id}:downvotes"),
        }
    }
}

impl FromStr for Subject {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (prefix, id) = s
            .split_once(':')
            .ok_or_else(|| format!("Malformed subject key: {s}"))?;
        let id: u64 = id
            .parse()
            .map_err(|_| format!("Malformed subject id: {s}"))?;

        match prefix {
            "question" => Ok(Subject::Question(id)),
            "answer" => Ok(Subject::Answer(id)),
            other => Err(format!("Unknown subject kind: {other}")),
        }
    }
}

pub fn next_id_key(records: &str) -> String {
    match records {
        QUESTIONS => "question:next_id".to_string(),
        ANSWERS => "answer:next_id".to_string(),
        other => format!("{other}:next_id"),
    }
}

pub fn answers_key(question_id: u64) -> String {
    format!("question:{question_id}:answers")
}

pub fn views_key(question_id: u64) -> String {
    format!("question:{question_id}:views")
}

pub fn tag_key(tag: &str) -> String {
    format!("tag:{tag}")
}

pub fn user_questions_key(user: &UserId) -> String {
    format!("user:{user}:questions")
}

pub fn user_answers_key(user: &UserId) -> String {
    format!("user:{user}:answers")
}

pub fn saved_key(user: &UserId) -> String {
    format!("user:{user}:saved")
}

pub fn user_votes_key(user: &UserId) -> String {
    format!("user:{user}:votes")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetOp {
    Add(String),
    Remove(String),
}

/// Set operations that persist a transition for one voter.
///
/// Every add is paired with a remove from the opposite set so the stored sets stay disjoint
/// even when two requests resolved against the same stale read.
pub fn set_ops(subject: Subject, transition: Transition) -> Vec<SetOp> {
    match transition {
        Transition::Retract(from) => vec![SetOp::Remove(subject.votes_key(from))],
        Transition::Switch { from, to } => vec![
            SetOp::Remove(subject.votes_key(from)),
            SetOp::Add(subject.votes_key(to)),
        ],
        Transition::Cast(to) => vec![
            SetOp::Remove(subject.votes_key(to.opposite())),
            SetOp::Add(subject.votes_key(to)),
        ],
    }
}

/// Keeps `user:{id}:votes` in step with the ballot, member is [`Subject::key`].
pub fn ballot_op(user: &UserId, transition: Transition) -> SetOp {
    match transition {
        Transition::Retract(_) => SetOp::Remove(user_votes_key(user)),
        Transition::Cast(_) | Transition::Switch { .. } => SetOp::Add(user_votes_key(user)),
    }
}

pub async fn load_votes(
    conn: &mut ConnectionManager,
    subject: Subject,
) -> Result<VoteState, RedisError> {
    let (upvotes, downvotes): (Vec<String>, Vec<String>) = redis::pipe()
        .smembers(subject.votes_key(VoteDirection::Up))
        .smembers(subject.votes_key(VoteDirection::Down))
        .query_async(conn)
        .await?;

    Ok(VoteState::new(
        upvotes.into_iter().map(UserId::from),
        downvotes.into_iter().map(UserId::from),
    ))
}

/// Resolves a vote against the stored ballot and writes the change back atomically.
pub async fn apply_vote(
    conn: &mut ConnectionManager,
    subject: Subject,
    user: &UserId,
    direction: VoteDirection,
) -> Result<VoteState, AppError> {
    if !exists(conn, subject.records(), subject.id()).await? {
        return Err(AppError::NotFound(subject.name()));
    }

    if !exists(conn, USERS, user.as_str()).await? {
        return Err(AppError::NotFound("User"));
    }

    let current = load_votes(conn, subject).await?;
    let (updated, transition) = current.resolve(user, direction);

    debug!("{subject:?} vote by {user}: {transition:?}");

    let mut pipe = redis::pipe();
    pipe.atomic();

    for op in set_ops(subject, transition) {
        match op {
            SetOp::Add(key) => pipe.sadd(key, user.as_str()).ignore(),
            SetOp::Remove(key) => pipe.srem(key, user.as_str()).ignore(),
        };
    }

    match ballot_op(user, transition) {
        SetOp::Add(key) => pipe.sadd(key, subject.key()).ignore(),
        SetOp::Remove(key) => pipe.srem(key, subject.key()).ignore(),
    };

    let _: () = pipe.query_async(conn).await?;

    Ok(updated)
}

pub async fn exists<F>(
    conn: &mut ConnectionManager,
    records: &str,
    id: F,
) -> Result<bool, RedisError>
where
    F: ToRedisArgs + Send + Sync,
{
    conn.hexists(records, id).await
}

pub async fn get_record<T, F>(
    conn: &mut ConnectionManager,
    records: &str,
    id: F,
) -> Result<Option<T>, AppError>
where
    T: DeserializeOwned,
    F: ToRedisArgs + Send + Sync,
{
    let raw: Option<String> = conn.hget(records, id).await?;

    Ok(raw.map(|raw| serde_json::from_str(&raw)).transpose()?)
}

/// Fetches records in id order, skipping ids that no longer exist.
pub async fn get_records<T, F>(
    conn: &mut ConnectionManager,
    records: &str,
    ids: &[F],
) -> Result<Vec<T>, AppError>
where
    T: DeserializeOwned,
    F: ToRedisArgs,
{
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let raw: Vec<Option<String>> = redis::cmd("HMGET")
        .arg(records)
        .arg(ids)
        .query_async(conn)
        .await?;

    raw.into_iter()
        .flatten()
        .map(|raw| serde_json::from_str(&raw).map_err(AppError::from))
        .collect()
}

pub async fn all_records<T: DeserializeOwned>(
    conn: &mut ConnectionManager,
    records: &str,
) -> Result<Vec<T>, AppError> {
    let raw: Vec<String> = conn.hvals(records).await?;

    raw.iter()
        .map(|raw| serde_json::from_str(raw).map_err(AppError::from))
        .collect()
}

pub async fn put_record<T, F>(
    conn: &mut ConnectionManager,
    records: &str,
    id: F,
    record: &T,
) -> Result<(), AppError>
where
    T: Serialize,
    F: ToRedisArgs + Send + Sync,
{
    let _: () = conn.hset(records, id, serde_json::to_string(record)?).await?;

    Ok(())
}
