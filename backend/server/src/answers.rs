use std::cmp::Reverse;

use chrono::{DateTime, Utc};
use redis::{AsyncCommands, Pipeline, RedisError, aio::ConnectionManager};
use tally::{UserId, VoteDirection};
use tracing::info;

use crate::{
    database::{
        ANSWERS, QUESTIONS, Subject, USERS, answers_key, exists, get_records, next_id_key,
        user_answers_key,
    },
    error::AppError,
    models::{Answer, AnswerFilter, AnswerSummary, CreateAnswer},
    utils::{relative_time, validate_content},
};

pub async fn create_answer(
    conn: &mut ConnectionManager,
    question_id: u64,
    request: CreateAnswer,
) -> Result<Answer, AppError> {
    validate_content(&request.content)?;

    if !exists(conn, QUESTIONS, question_id).await? {
        return Err(AppError::NotFound("Question"));
    }

    if !exists(conn, USERS, request.author.as_str()).await? {
        return Err(AppError::NotFound("User"));
    }

    let id: u64 = conn.incr(next_id_key(ANSWERS), 1).await?;
    let answer = Answer {
        id,
        question: question_id,
        author: request.author,
        content: request.content,
        created_at: Utc::now(),
    };

    let _: () = redis::pipe()
        .atomic()
        .hset(ANSWERS, id, serde_json::to_string(&answer)?)
        .ignore()
        .sadd(answers_key(question_id), id)
        .ignore()
        .sadd(user_answers_key(&answer.author), id)
        .ignore()
        .query_async(conn)
        .await?;

    info!("Answer {id} posted on question {question_id} by {}", answer.author);

    Ok(answer)
}

/// Queues everything needed to forget an answer.
pub fn queue_answer_removal(pipe: &mut Pipeline, answer: &Answer) {
    pipe.hdel(ANSWERS, answer.id)
        .ignore()
        .srem(answers_key(answer.question), answer.id)
        .ignore()
        .srem(user_answers_key(&answer.author), answer.id)
        .ignore()
        .del(Subject::Answer(answer.id).vote_keys())
        .ignore();
}

/// `(upvotes, downvotes)` per answer, in input order.
pub async fn answer_votes(
    conn: &mut ConnectionManager,
    ids: &[u64],
) -> Result<Vec<(u64, u64)>, RedisError> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut pipe = redis::pipe();
    for &id in ids {
        let subject = Subject::Answer(id);

        pipe.scard(subject.votes_key(VoteDirection::Up))
            .scard(subject.votes_key(VoteDirection::Down));
    }

    let raw: Vec<u64> = pipe.query_async(conn).await?;

    Ok(raw.chunks(2).map(|chunk| (chunk[0], chunk[1])).collect())
}

pub fn summarize(
    answer: Answer,
    (upvotes, downvotes): (u64, u64),
    now: DateTime<Utc>,
) -> AnswerSummary {
    AnswerSummary {
        answered: relative_time(answer.created_at, now),
        id: answer.id,
        question: answer.question,
        author: answer.author,
        content: answer.content,
        upvotes,
        downvotes,
        created_at: answer.created_at,
    }
}

pub fn apply_answer_filter(answers: &mut [AnswerSummary], filter: Option<AnswerFilter>) {
    match filter {
        Some(AnswerFilter::HighestUpvotes) => answers.sort_by_key(|a| Reverse(a.upvotes)),
        Some(AnswerFilter::LowestUpvotes) => answers.sort_by_key(|a| a.upvotes),
        Some(AnswerFilter::Recent) => answers.sort_by_key(|a| Reverse(a.created_at)),
        Some(AnswerFilter::Old) | None => answers.sort_by_key(|a| a.created_at),
    }
}

async fn summarize_ids(
    conn: &mut ConnectionManager,
    ids: &[u64],
) -> Result<Vec<AnswerSummary>, AppError> {
    let answers: Vec<Answer> = get_records(conn, ANSWERS, ids).await?;

    let answer_ids: Vec<u64> = answers.iter().map(|a| a.id).collect();
    let votes = answer_votes(conn, &answer_ids).await?;

    let now = Utc::now();

    Ok(answers
        .into_iter()
        .zip(votes)
        .map(|(answer, votes)| summarize(answer, votes, now))
        .collect())
}

pub async fn list_answers(
    conn: &mut ConnectionManager,
    question_id: u64,
    filter: Option<AnswerFilter>,
) -> Result<Vec<AnswerSummary>, AppError> {
    if !exists(conn, QUESTIONS, question_id).await? {
        return Err(AppError::NotFound("Question"));
    }

    let ids: Vec<u64> = conn.smembers(answers_key(question_id)).await?;

    let mut answers = summarize_ids(conn, &ids).await?;
    apply_answer_filter(&mut answers, filter);

    Ok(answers)
}

pub async fn user_answers(
    conn: &mut ConnectionManager,
    user: &UserId,
) -> Result<Vec<AnswerSummary>, AppError> {
    if !exists(conn, USERS, user.as_str()).await? {
        return Err(AppError::NotFound("User"));
    }

    let ids: Vec<u64> = conn.smembers(user_answers_key(user)).await?;

    let mut answers = summarize_ids(conn, &ids).await?;
    apply_answer_filter(&mut answers, Some(AnswerFilter::HighestUpvotes));

    Ok(answers)
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;

    fn answer(id: u64, minutes_ago: i64, upvotes: u64) -> AnswerSummary {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        let created_at = now - Duration::minutes(minutes_ago);

        summarize(
            Answer {
                id,
                question: 1,
                author: UserId::from("u2"),
                content: "Use a RefCell or restructure the borrow".to_string(),
                created_at,
            },
            (upvotes, 0),
            now,
        )
    }

    fn ids(answers: &[AnswerSummary]) -> Vec<u64> {
        answers.iter().map(|a| a.id).collect()
    }

    #[test]
    fn test_summarize() {
        let summary = answer(1, 5, 2);

        assert_eq!(summary.answered, "5 minutes ago");
        assert_eq!(summary.upvotes, 2);
    }

    #[test]
    fn test_filters() {
        let base = vec![answer(1, 10, 3), answer(2, 30, 7), answer(3, 20, 0)];

        let cases = [
            (None, vec![2, 3, 1]),
            (Some(AnswerFilter::Recent), vec![1, 3, 2]),
            (Some(AnswerFilter::HighestUpvotes), vec![2, 1, 3]),
            (Some(AnswerFilter::LowestUpvotes), vec![3, 1, 2]),
        ];

        for (filter, expected) in cases {
            let mut answers = base.clone();
            apply_answer_filter(&mut answers, filter);
            assert_eq!(ids(&answers), expected, "{filter:?}");
        }
    }
}
