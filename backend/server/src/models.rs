use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tally::{BadgeCounts, UserId, VoteDirection, VoteState};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub username: String,
    #[serde(default)]
    pub picture: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    /// Filled from live activity when listing, not kept up to date in storage.
    #[serde(default)]
    pub reputation: i64,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: u64,
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
    pub author: UserId,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub id: u64,
    pub question: u64,
    pub author: UserId,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

// Requests

#[derive(Debug, Deserialize)]
pub struct CreateUser {
    pub id: UserId,
    pub name: String,
    pub username: String,
    pub picture: Option<String>,
    pub email: Option<String>,
    pub bio: Option<String>,
}

/// Profile edit, absent fields are left as they are.
#[derive(Debug, Default, Deserialize)]
pub struct EditUser {
    pub name: Option<String>,
    pub username: Option<String>,
    pub bio: Option<String>,
    pub picture: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateQuestion {
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
    pub author: UserId,
}

#[derive(Debug, Deserialize)]
pub struct EditQuestion {
    pub title: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateAnswer {
    pub author: UserId,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct VoteRequest {
    pub user_id: UserId,
    pub direction: VoteDirection,
}

#[derive(Debug, Deserialize)]
pub struct SaveRequest {
    pub question_id: u64,
}

#[derive(Debug, Deserialize)]
pub struct ListParams<F> {
    pub q: Option<String>,
    pub filter: Option<F>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionFilter {
    Newest,
    Frequent,
    Unanswered,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserFilter {
    Newest,
    Oldest,
    TopContributors,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SavedFilter {
    MostRecent,
    Oldest,
    MostVoted,
    MostViewed,
    MostAnswered,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerFilter {
    HighestUpvotes,
    LowestUpvotes,
    Recent,
    Old,
}

// Responses

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VoteTally {
    pub upvotes: usize,
    pub downvotes: usize,
    pub score: i64,
    pub has_upvoted: bool,
    pub has_downvoted: bool,
}

impl VoteTally {
    pub fn new(state: &VoteState, user: &UserId) -> Self {
        Self {
            upvotes: state.upvotes.len(),
            downvotes: state.downvotes.len(),
            score: state.score(),
            has_upvoted: state.has_voted(user, VoteDirection::Up),
            has_downvoted: state.has_voted(user, VoteDirection::Down),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QuestionStats {
    pub upvotes: u64,
    pub downvotes: u64,
    pub views: u64,
    pub answers: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuestionSummary {
    pub id: u64,
    pub title: String,
    pub tags: Vec<String>,
    pub author: UserId,
    pub upvotes: u64,
    pub downvotes: u64,
    pub views: u64,
    pub answers: u64,
    pub created_at: DateTime<Utc>,
    pub asked: String,
    pub votes_display: String,
    pub views_display: String,
    pub answers_display: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuestionDetail {
    #[serde(flatten)]
    pub summary: QuestionSummary,
    pub content: String,
    pub upvoters: Vec<UserId>,
    pub downvoters: Vec<UserId>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnswerSummary {
    pub id: u64,
    pub question: u64,
    pub author: UserId,
    pub content: String,
    pub upvotes: u64,
    pub downvotes: u64,
    pub created_at: DateTime<Utc>,
    pub answered: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserInfo {
    pub user: User,
    pub total_questions: u64,
    pub total_answers: u64,
    pub badge_counts: BadgeCounts,
    pub joined: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagSummary {
    pub name: String,
    pub questions: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SaveResult {
    pub saved: bool,
}
