//! `Engagement`: upvotes and comments per post.

use chrono::{DateTime, Utc};
use concord_core::{Concept, ConceptError, Operation};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    #[serde(rename = "commentID")]
    pub comment_id: String,
    #[serde(rename = "authorID")]
    pub author_id: String,
    pub text: String,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PostEngagement {
    pub upvotes: Vec<String>,
    pub comments: Vec<Comment>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Upvote {
    pub upvoted: bool,
    pub total: usize,
}

// ---------------------------------------------------------------------------
// Arguments
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ForPost {
    #[serde(rename = "postID")]
    pub post_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ToggleUpvote {
    #[serde(rename = "postID")]
    pub post_id: String,
    #[serde(rename = "userID")]
    pub user_id: String,
}

#[derive(Debug, Deserialize)]
pub struct AddComment {
    #[serde(rename = "postID")]
    pub post_id: String,
    #[serde(rename = "authorID")]
    pub author_id: String,
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct EditComment {
    #[serde(rename = "postID")]
    pub post_id: String,
    #[serde(rename = "commentID")]
    pub comment_id: String,
    #[serde(rename = "userID")]
    pub user_id: String,
    #[serde(rename = "newText")]
    pub new_text: String,
}

#[derive(Debug, Deserialize)]
pub struct DeleteComment {
    #[serde(rename = "postID")]
    pub post_id: String,
    #[serde(rename = "commentID")]
    pub comment_id: String,
    #[serde(rename = "userID")]
    pub user_id: String,
}

// ---------------------------------------------------------------------------
// Engagement
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct Engagement {
    posts: RwLock<HashMap<String, PostEngagement>>,
}

fn require_ids(ids: &[&str]) -> Result<(), ConceptError> {
    if ids.iter().any(|id| id.is_empty()) {
        return Err(ConceptError::InvalidArguments("Invalid ID provided.".into()));
    }
    Ok(())
}

impl Engagement {
    pub fn new() -> Self {
        Self::default()
    }

    /// Posts nobody engaged with report empty lists.
    pub async fn get_engagement_for_post(&self, args: ForPost) -> PostEngagement {
        self.posts
            .read()
            .await
            .get(&args.post_id)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn toggle_upvote(&self, args: ToggleUpvote) -> Result<Upvote, ConceptError> {
        require_ids(&[args.post_id.as_str(), args.user_id.as_str()])?;
        let mut posts = self.posts.write().await;
        let entry = posts.entry(args.post_id).or_default();
        let upvoted = match entry.upvotes.iter().position(|u| *u == args.user_id) {
            Some(i) => {
                entry.upvotes.remove(i);
                false
            }
            None => {
                entry.upvotes.push(args.user_id);
                true
            }
        };
        Ok(Upvote {
            upvoted,
            total: entry.upvotes.len(),
        })
    }

    pub async fn add_comment(&self, args: AddComment) -> Result<Comment, ConceptError> {
        require_ids(&[args.post_id.as_str(), args.author_id.as_str()])?;
        if args.text.trim().is_empty() {
            return Err(ConceptError::InvalidArguments("Comment text is required.".into()));
        }
        let comment = Comment {
            comment_id: Uuid::new_v4().to_string(),
            author_id: args.author_id,
            text: args.text,
            created_at: Utc::now(),
        };
        self.posts
            .write()
            .await
            .entry(args.post_id)
            .or_default()
            .comments
            .push(comment.clone());
        Ok(comment)
    }

    /// Only the comment's author may edit it.
    pub async fn edit_comment(&self, args: EditComment) -> bool {
        if args.new_text.trim().is_empty() {
            return false;
        }
        let mut posts = self.posts.write().await;
        let comment = posts.get_mut(&args.post_id).and_then(|e| {
            e.comments
                .iter_mut()
                .find(|c| c.comment_id == args.comment_id && c.author_id == args.user_id)
        });
        match comment {
            Some(c) => {
                c.text = args.new_text;
                true
            }
            None => false,
        }
    }

    /// Only the comment's author may delete it.
    pub async fn delete_comment(&self, args: DeleteComment) -> bool {
        let mut posts = self.posts.write().await;
        let Some(entry) = posts.get_mut(&args.post_id) else {
            return false;
        };
        let before = entry.comments.len();
        entry
            .comments
            .retain(|c| !(c.comment_id == args.comment_id && c.author_id == args.user_id));
        entry.comments.len() < before
    }
}

impl Concept for Engagement {
    fn name(&self) -> &'static str {
        "Engagement"
    }

    fn operations(self: Arc<Self>) -> Vec<Operation> {
        vec![
            Operation::bound("getEngagementForPost", &self, |c, a: ForPost| async move {
                let e = c.get_engagement_for_post(a).await;
                Ok::<_, ConceptError>(json!({ "upvotes": e.upvotes, "comments": e.comments }))
            })
            .accepts(["postID"])
            .returns(["upvotes", "comments"]),
            Operation::bound("toggleUpvote", &self, |c, a: ToggleUpvote| async move {
                c.toggle_upvote(a).await
            })
            .accepts(["postID", "userID"])
            .returns(["upvoted", "total"]),
            Operation::bound("addComment", &self, |c, a: AddComment| async move {
                c.add_comment(a).await.map(|comment| json!({ "comment": comment }))
            })
            .accepts(["postID", "authorID", "text"])
            .returns(["comment"]),
            Operation::bound("editComment", &self, |c, a: EditComment| async move {
                let success = c.edit_comment(a).await;
                Ok::<_, ConceptError>(json!({ "success": success }))
            })
            .accepts(["postID", "commentID", "userID", "newText"])
            .returns(["success"]),
            Operation::bound("deleteComment", &self, |c, a: DeleteComment| async move {
                let success = c.delete_comment(a).await;
                Ok::<_, ConceptError>(json!({ "success": success }))
            })
            .accepts(["postID", "commentID", "userID"])
            .returns(["success"]),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toggle(user: &str) -> ToggleUpvote {
        ToggleUpvote {
            post_id: "p1".into(),
            user_id: user.into(),
        }
    }

    #[tokio::test]
    async fn upvotes_toggle_per_user() {
        let e = Engagement::new();
        assert_eq!(
            e.toggle_upvote(toggle("u1")).await.unwrap(),
            Upvote {
                upvoted: true,
                total: 1
            }
        );
        assert_eq!(e.toggle_upvote(toggle("u2")).await.unwrap().total, 2);
        assert_eq!(
            e.toggle_upvote(toggle("u1")).await.unwrap(),
            Upvote {
                upvoted: false,
                total: 1
            }
        );
        let state = e
            .get_engagement_for_post(ForPost {
                post_id: "p1".into(),
            })
            .await;
        assert_eq!(state.upvotes, vec!["u2".to_string()]);
    }

    #[tokio::test]
    async fn unknown_post_has_empty_engagement() {
        let e = Engagement::new();
        let state = e
            .get_engagement_for_post(ForPost {
                post_id: "nothing".into(),
            })
            .await;
        assert_eq!(state, PostEngagement::default());
    }

    #[tokio::test]
    async fn comments_are_author_owned() {
        let e = Engagement::new();
        let comment = e
            .add_comment(AddComment {
                post_id: "p1".into(),
                author_id: "u1".into(),
                text: "nice".into(),
            })
            .await
            .unwrap();

        let edit = |user: &str| EditComment {
            post_id: "p1".into(),
            comment_id: comment.comment_id.clone(),
            user_id: user.into(),
            new_text: "very nice".into(),
        };
        assert!(!e.edit_comment(edit("u2")).await);
        assert!(e.edit_comment(edit("u1")).await);

        let delete = |user: &str| DeleteComment {
            post_id: "p1".into(),
            comment_id: comment.comment_id.clone(),
            user_id: user.into(),
        };
        assert!(!e.delete_comment(delete("u2")).await);
        assert!(e.delete_comment(delete("u1")).await);
        assert!(!e.delete_comment(delete("u1")).await);
    }

    #[tokio::test]
    async fn blank_comment_is_rejected() {
        let e = Engagement::new();
        let err = e
            .add_comment(AddComment {
                post_id: "p1".into(),
                author_id: "u1".into(),
                text: "   ".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ConceptError::InvalidArguments(_)));
    }
}
