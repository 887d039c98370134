use std::cmp::Reverse;

use redis::{AsyncCommands, aio::ConnectionManager};

use crate::{
    database::{TAGS, tag_key},
    error::AppError,
    models::TagSummary,
};

/// Tags still linked to at least one question, most used first.
pub async fn list_tags(conn: &mut ConnectionManager) -> Result<Vec<TagSummary>, AppError> {
    let names: Vec<String> = conn.smembers(TAGS).await?;
    if names.is_empty() {
        return Ok(Vec::new());
    }

    let mut pipe = redis::pipe();
    for name in &names {
        pipe.scard(tag_key(name));
    }

    let counts: Vec<u64> = pipe.query_async(conn).await?;

    let mut tags: Vec<TagSummary> = names
        .into_iter()
        .zip(counts)
        .filter(|(_, questions)| *questions > 0)
        .map(|(name, questions)| TagSummary { name, questions })
        .collect();

    sort_tags(&mut tags);

    Ok(tags)
}

pub fn sort_tags(tags: &mut [TagSummary]) {
    tags.sort_by(|a, b| {
        Reverse(a.questions)
            .cmp(&Reverse(b.questions))
            .then_with(|| a.name.cmp(&b.name))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_tags() {
        let mut tags = vec![
            TagSummary {
                name: "tokio".into(),
                questions: 2,
            },
            TagSummary {
                name: "axum".into(),
                questions: 2,
            },
            TagSummary {
                name: "rust".into(),
                questions: 9,
            },
        ];

        sort_tags(&mut tags);

        let names: Vec<&str> = tags.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["rust", "axum", "tokio"]);
    }
}
