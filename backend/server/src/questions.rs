//! # Questions
//!
//! Question records, their listings and everything hanging off a question id.
//!
//! Counters are kept outside the JSON record (votes, views, answers) so they can be bumped
//! atomically without rewriting the record.
use std::cmp::Reverse;

use chrono::{DateTime, Utc};
use redis::{AsyncCommands, Pipeline, RedisError, aio::ConnectionManager};
use regex::Regex;
use tally::{UserId, VoteDirection};
use tracing::info;

use crate::{
    answers::queue_answer_removal,
    database::{
        ANSWERS, QUESTIONS, Subject, TAGS, USERS, all_records, answers_key, exists, get_record,
        get_records, load_votes, next_id_key, put_record, tag_key, user_questions_key, views_key,
    },
    error::AppError,
    models::{
        Answer, CreateQuestion, EditQuestion, ListParams, Question, QuestionDetail, QuestionFilter,
        QuestionStats, QuestionSummary, SavedFilter,
    },
    utils::{
        format_and_divide_number, matches_any, relative_time, search_matcher, validate_question,
        validate_tags,
    },
};

pub const HOT_LIMIT: usize = 5;

pub type Row = (Question, QuestionStats);

pub async fn create_question(
    conn: &mut ConnectionManager,
    request: CreateQuestion,
) -> Result<Question, AppError> {
    validate_question(&request.title, &request.content)?;
    let tags = validate_tags(&request.tags)?;

    if !exists(conn, USERS, request.author.as_str()).await? {
        return Err(AppError::NotFound("User"));
    }

    let id: u64 = conn.incr(next_id_key(QUESTIONS), 1).await?;
    let question = Question {
        id,
        title: request.title.trim().to_string(),
        content: request.content,
        tags,
        author: request.author,
        created_at: Utc::now(),
    };

    let mut pipe = redis::pipe();
    pipe.atomic()
        .hset(QUESTIONS, id, serde_json::to_string(&question)?)
        .ignore()
        .sadd(user_questions_key(&question.author), id)
        .ignore();

    for tag in &question.tags {
        pipe.sadd(TAGS, tag).ignore().sadd(tag_key(tag), id).ignore();
    }

    let _: () = pipe.query_async(conn).await?;

    info!("Question {id} created by {}", question.author);

    Ok(question)
}

pub async fn get_question(conn: &mut ConnectionManager, id: u64) -> Result<Question, AppError> {
    get_record(conn, QUESTIONS, id)
        .await?
        .ok_or(AppError::NotFound("Question"))
}

/// Upvotes, downvotes, views and answer count per question, in input order.
pub async fn question_stats(
    conn: &mut ConnectionManager,
    ids: &[u64],
) -> Result<Vec<QuestionStats>, RedisError> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut pipe = redis::pipe();
    for &id in ids {
        let subject = Subject::Question(id);

        pipe.scard(subject.votes_key(VoteDirection::Up))
            .scard(subject.votes_key(VoteDirection::Down))
            .get(views_key(id))
            .scard(answers_key(id));
    }

    let raw: Vec<Option<u64>> = pipe.query_async(conn).await?;

    Ok(raw
        .chunks(4)
        .map(|chunk| QuestionStats {
            upvotes: chunk[0].unwrap_or(0),
            downvotes: chunk[1].unwrap_or(0),
            views: chunk[2].unwrap_or(0),
            answers: chunk[3].unwrap_or(0),
        })
        .collect())
}

pub async fn with_stats(
    conn: &mut ConnectionManager,
    questions: Vec<Question>,
) -> Result<Vec<Row>, AppError> {
    let ids: Vec<u64> = questions.iter().map(|q| q.id).collect();
    let stats = question_stats(conn, &ids).await?;

    Ok(questions.into_iter().zip(stats).collect())
}

pub fn summarize(question: &Question, stats: QuestionStats, now: DateTime<Utc>) -> QuestionSummary {
    QuestionSummary {
        id: question.id,
        title: question.title.clone(),
        tags: question.tags.clone(),
        author: question.author.clone(),
        upvotes: stats.upvotes,
        downvotes: stats.downvotes,
        views: stats.views,
        answers: stats.answers,
        created_at: question.created_at,
        asked: relative_time(question.created_at, now),
        votes_display: format_and_divide_number(stats.upvotes),
        views_display: format_and_divide_number(stats.views),
        answers_display: format_and_divide_number(stats.answers),
    }
}

pub fn summarize_all(rows: &[Row]) -> Vec<QuestionSummary> {
    let now = Utc::now();

    rows.iter()
        .map(|(question, stats)| summarize(question, *stats, now))
        .collect()
}

pub fn search(questions: &mut Vec<Question>, matcher: &Option<Regex>) {
    questions.retain(|question| {
        matches_any(matcher, &[question.title.as_str(), question.content.as_str()])
    });
}

/// Saved questions are searched by title only.
pub fn search_titles(questions: &mut Vec<Question>, matcher: &Option<Regex>) {
    questions.retain(|question| matches_any(matcher, &[question.title.as_str()]));
}

pub fn apply_question_filter(rows: &mut Vec<Row>, filter: Option<QuestionFilter>) {
    match filter {
        Some(QuestionFilter::Frequent) => rows.sort_by_key(|(_, stats)| Reverse(stats.views)),
        Some(QuestionFilter::Unanswered) => {
            rows.retain(|(_, stats)| stats.answers == 0);
            rows.sort_by_key(|(question, _)| Reverse(question.created_at));
        }
        Some(QuestionFilter::Newest) | None => {
            rows.sort_by_key(|(question, _)| Reverse(question.created_at))
        }
    }
}

pub fn apply_saved_filter(rows: &mut [Row], filter: Option<SavedFilter>) {
    match filter {
        Some(SavedFilter::Oldest) => rows.sort_by_key(|(question, _)| question.created_at),
        Some(SavedFilter::MostVoted) => rows.sort_by_key(|(_, stats)| Reverse(stats.upvotes)),
        Some(SavedFilter::MostViewed) => rows.sort_by_key(|(_, stats)| Reverse(stats.views)),
        Some(SavedFilter::MostAnswered) => rows.sort_by_key(|(_, stats)| Reverse(stats.answers)),
        Some(SavedFilter::MostRecent) | None => {
            rows.sort_by_key(|(question, _)| Reverse(question.created_at))
        }
    }
}

/// Most viewed first, upvotes break ties.
pub fn sort_by_popularity(rows: &mut [Row]) {
    rows.sort_by_key(|(_, stats)| Reverse((stats.views, stats.upvotes)));
}

pub async fn list_questions(
    conn: &mut ConnectionManager,
    params: ListParams<QuestionFilter>,
) -> Result<Vec<QuestionSummary>, AppError> {
    let matcher = search_matcher(params.q.as_deref())?;

    let mut questions: Vec<Question> = all_records(conn, QUESTIONS).await?;
    search(&mut questions, &matcher);

    let mut rows = with_stats(conn, questions).await?;
    apply_question_filter(&mut rows, params.filter);

    Ok(summarize_all(&rows))
}

pub async fn hot_questions(conn: &mut ConnectionManager) -> Result<Vec<QuestionSummary>, AppError> {
    let questions: Vec<Question> = all_records(conn, QUESTIONS).await?;

    let mut rows = with_stats(conn, questions).await?;
    sort_by_popularity(&mut rows);
    rows.truncate(HOT_LIMIT);

    Ok(summarize_all(&rows))
}

pub async fn user_questions(
    conn: &mut ConnectionManager,
    user: &UserId,
) -> Result<Vec<QuestionSummary>, AppError> {
    if !exists(conn, USERS, user.as_str()).await? {
        return Err(AppError::NotFound("User"));
    }

    let ids: Vec<u64> = conn.smembers(user_questions_key(user)).await?;
    let questions = get_records(conn, QUESTIONS, &ids).await?;

    let mut rows = with_stats(conn, questions).await?;
    sort_by_popularity(&mut rows);

    Ok(summarize_all(&rows))
}

/// Question page: bumps the view counter and returns the full ballot.
pub async fn view_question(
    conn: &mut ConnectionManager,
    id: u64,
) -> Result<QuestionDetail, AppError> {
    let question = get_question(conn, id).await?;

    let _: u64 = conn.incr(views_key(id), 1).await?;

    let stats = question_stats(conn, &[id]).await?.pop().unwrap_or_default();
    let votes = load_votes(conn, Subject::Question(id)).await?;

    Ok(QuestionDetail {
        summary: summarize(&question, stats, Utc::now()),
        content: question.content,
        upvoters: votes.upvotes.into_iter().collect(),
        downvoters: votes.downvotes.into_iter().collect(),
    })
}

pub async fn edit_question(
    conn: &mut ConnectionManager,
    id: u64,
    edit: EditQuestion,
) -> Result<Question, AppError> {
    validate_question(&edit.title, &edit.content)?;

    let mut question = get_question(conn, id).await?;
    question.title = edit.title.trim().to_string();
    question.content = edit.content;

    put_record(conn, QUESTIONS, id, &question).await?;

    info!("Question {id} edited");

    Ok(question)
}

/// Loads a question with its answers, ready to be queued for removal.
pub async fn load_for_removal(
    conn: &mut ConnectionManager,
    id: u64,
) -> Result<(Question, Vec<Answer>), AppError> {
    let question = get_question(conn, id).await?;

    let answer_ids: Vec<u64> = conn.smembers(answers_key(id)).await?;
    let answers: Vec<Answer> = get_records(conn, ANSWERS, &answer_ids).await?;

    Ok((question, answers))
}

/// Queues a question with its answers, votes, views and tag links.
pub fn queue_question_removal(pipe: &mut Pipeline, question: &Question, answers: &[Answer]) {
    let id = question.id;

    let mut keys = Subject::Question(id).vote_keys();
    keys.push(views_key(id));
    keys.push(answers_key(id));

    pipe.hdel(QUESTIONS, id)
        .ignore()
        .srem(user_questions_key(&question.author), id)
        .ignore()
        .del(keys)
        .ignore();

    for tag in &question.tags {
        pipe.srem(tag_key(tag), id).ignore();
    }

    for answer in answers {
        queue_answer_removal(pipe, answer);
    }
}

pub async fn delete_question(conn: &mut ConnectionManager, id: u64) -> Result<(), AppError> {
    let (question, answers) = load_for_removal(conn, id).await?;

    let mut pipe = redis::pipe();
    pipe.atomic();
    queue_question_removal(&mut pipe, &question, &answers);

    let _: () = pipe.query_async(conn).await?;

    info!("Question {id} deleted with {} answers", answers.len());

    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;

    fn row(id: u64, hours_ago: i64, upvotes: u64, views: u64, answers: u64) -> Row {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

        (
            Question {
                id,
                title: format!("Question number {id}"),
                content: "Some content long enough".to_string(),
                tags: vec!["rust".to_string()],
                author: UserId::from("u1"),
                created_at: now - Duration::hours(hours_ago),
            },
            QuestionStats {
                upvotes,
                downvotes: 0,
                views,
                answers,
            },
        )
    }

    fn ids(rows: &[Row]) -> Vec<u64> {
        rows.iter().map(|(q, _)| q.id).collect()
    }

    #[test]
    fn test_newest_default() {
        let mut rows = vec![row(1, 5, 0, 0, 0), row(2, 1, 0, 0, 0), row(3, 3, 0, 0, 0)];
        apply_question_filter(&mut rows, None);

        assert_eq!(ids(&rows), vec![2, 3, 1]);
    }

    #[test]
    fn test_frequent() {
        let mut rows = vec![row(1, 0, 0, 10, 0), row(2, 0, 0, 50, 0), row(3, 0, 0, 20, 0)];
        apply_question_filter(&mut rows, Some(QuestionFilter::Frequent));

        assert_eq!(ids(&rows), vec![2, 3, 1]);
    }

    #[test]
    fn test_unanswered() {
        let mut rows = vec![row(1, 2, 0, 0, 0), row(2, 1, 0, 0, 3), row(3, 0, 0, 0, 0)];
        apply_question_filter(&mut rows, Some(QuestionFilter::Unanswered));

        assert_eq!(ids(&rows), vec![3, 1]);
    }

    #[test]
    fn test_popularity_tiebreak() {
        let mut rows = vec![row(1, 0, 1, 10, 0), row(2, 0, 5, 10, 0), row(3, 0, 0, 30, 0)];
        sort_by_popularity(&mut rows);

        assert_eq!(ids(&rows), vec![3, 2, 1]);
    }

    #[test]
    fn test_saved_filters() {
        let base = vec![row(1, 1, 9, 1, 2), row(2, 3, 1, 7, 0), row(3, 2, 4, 3, 5)];

        let cases = [
            (None, vec![1, 3, 2]),
            (Some(SavedFilter::Oldest), vec![2, 3, 1]),
            (Some(SavedFilter::MostVoted), vec![1, 3, 2]),
            (Some(SavedFilter::MostViewed), vec![2, 3, 1]),
            (Some(SavedFilter::MostAnswered), vec![3, 1, 2]),
        ];

        for (filter, expected) in cases {
            let mut rows = base.clone();
            apply_saved_filter(&mut rows, filter);
            assert_eq!(ids(&rows), expected, "{filter:?}");
        }
    }

    #[test]
    fn test_search() {
        let mut questions = vec![row(1, 0, 0, 0, 0).0, row(12, 0, 0, 0, 0).0];
        search(&mut questions, &search_matcher(Some("NUMBER 12")).unwrap());

        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].id, 12);
    }

    #[test]
    fn test_search_titles_ignores_content() {
        let mut questions = vec![row(1, 0, 0, 0, 0).0, row(2, 0, 0, 0, 0).0];
        questions[1].title = "Borrow checker woes".to_string();

        let mut by_title = questions.clone();
        search_titles(&mut by_title, &search_matcher(Some("borrow")).unwrap());
        assert_eq!(by_title.len(), 1);
        assert_eq!(by_title[0].id, 2);

        search_titles(&mut questions, &search_matcher(Some("long enough")).unwrap());
        assert!(questions.is_empty());
    }

    #[test]
    fn test_queue_question_removal() {
        let (question, _) = row(8, 0, 0, 0, 0);
        let answer = Answer {
            id: 3,
            question: 8,
            author: UserId::from("u2"),
            content: "An answer that is long enough".to_string(),
            created_at: question.created_at,
        };

        let mut pipe = redis::pipe();
        queue_question_removal(&mut pipe, &question, &[answer]);

        // question hdel, author srem, key del, one tag, four answer commands
        assert_eq!(pipe.cmd_iter().count(), 8);
    }

    #[test]
    fn test_summarize() {
        let (question, stats) = row(4, 2, 1500, 2_000_000, 1);
        let now = question.created_at + Duration::hours(2);
        let summary = summarize(&question, stats, now);

        assert_eq!(summary.asked, "2 hours ago");
        assert_eq!(summary.votes_display, "1.5K");
        assert_eq!(summary.views_display, "2.0M");
        assert_eq!(summary.answers_display, "1");
    }
}
