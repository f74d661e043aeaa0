//! `DesignPost`: room design posts attached to a room template.

use chrono::{DateTime, Utc};
use concord_core::{Concept, ConceptError, Operation};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    #[serde(rename = "postID")]
    pub post_id: String,
    #[serde(rename = "authorID")]
    pub author_id: String,
    #[serde(rename = "templateID")]
    pub template_id: String,
    pub title: String,
    pub description: String,
    #[serde(rename = "imageURL")]
    pub image_url: String,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Arguments
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CreatePost {
    #[serde(rename = "authorID")]
    pub author_id: String,
    #[serde(rename = "templateID")]
    pub template_id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, rename = "imageURL")]
    pub image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PostRef {
    #[serde(rename = "postID")]
    pub post_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ByTemplate {
    #[serde(rename = "templateID")]
    pub template_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ByAuthor {
    #[serde(rename = "authorID")]
    pub author_id: String,
}

/// Absent fields keep their current value.
#[derive(Debug, Deserialize)]
pub struct EditPost {
    #[serde(rename = "postID")]
    pub post_id: String,
    #[serde(rename = "userID")]
    pub user_id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, rename = "imageURL")]
    pub image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DeletePost {
    #[serde(rename = "postID")]
    pub post_id: String,
    #[serde(rename = "userID")]
    pub user_id: String,
}

// ---------------------------------------------------------------------------
// DesignPost
// ---------------------------------------------------------------------------

/// Posts in creation order.
#[derive(Default)]
pub struct DesignPost {
    posts: RwLock<Vec<Post>>,
}

impl DesignPost {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create_post(&self, args: CreatePost) -> Result<String, ConceptError> {
        if args.author_id.is_empty() || args.template_id.is_empty() {
            return Err(ConceptError::InvalidArguments(
                "Invalid author or template ID.".into(),
            ));
        }
        if args.title.trim().is_empty() {
            return Err(ConceptError::InvalidArguments("A title is required.".into()));
        }
        let post = Post {
            post_id: Uuid::new_v4().to_string(),
            author_id: args.author_id,
            template_id: args.template_id,
            title: args.title,
            description: args.description.unwrap_or_default(),
            image_url: args.image_url.unwrap_or_default(),
            created_at: Utc::now(),
        };
        let id = post.post_id.clone();
        self.posts.write().await.push(post);
        Ok(id)
    }

    pub async fn get_post(&self, args: PostRef) -> Result<Post, ConceptError> {
        self.posts
            .read()
            .await
            .iter()
            .find(|p| p.post_id == args.post_id)
            .cloned()
            .ok_or_else(|| ConceptError::NotFound("Post not found".into()))
    }

    /// Newest first.
    pub async fn find_posts(&self, args: ByTemplate) -> Vec<Post> {
        self.select(|p| p.template_id == args.template_id).await
    }

    /// Newest first.
    pub async fn find_posts_by_author(&self, args: ByAuthor) -> Vec<Post> {
        self.select(|p| p.author_id == args.author_id).await
    }

    async fn select(&self, pred: impl Fn(&Post) -> bool) -> Vec<Post> {
        self.posts
            .read()
            .await
            .iter()
            .rev()
            .filter(|p| pred(p))
            .cloned()
            .collect()
    }

    /// Only the author may edit. `false` if the post is missing or not theirs.
    pub async fn edit_post(&self, args: EditPost) -> bool {
        let mut posts = self.posts.write().await;
        let Some(post) = posts
            .iter_mut()
            .find(|p| p.post_id == args.post_id && p.author_id == args.user_id)
        else {
            return false;
        };
        if let Some(title) = args.title.filter(|t| !t.trim().is_empty()) {
            post.title = title;
        }
        if let Some(description) = args.description {
            post.description = description;
        }
        if let Some(image_url) = args.image_url {
            post.image_url = image_url;
        }
        true
    }

    /// Only the author may delete.
    pub async fn delete_post(&self, args: DeletePost) -> bool {
        let mut posts = self.posts.write().await;
        let before = posts.len();
        posts.retain(|p| !(p.post_id == args.post_id && p.author_id == args.user_id));
        posts.len() < before
    }
}

impl Concept for DesignPost {
    fn name(&self) -> &'static str {
        "DesignPost"
    }

    fn operations(self: Arc<Self>) -> Vec<Operation> {
        vec![
            Operation::bound("createPost", &self, |c, a: CreatePost| async move {
                c.create_post(a).await.map(|id| json!({ "postID": id }))
            })
            .accepts(["authorID", "templateID", "title", "description", "imageURL"])
            .returns(["postID"]),
            Operation::bound("getPost", &self, |c, a: PostRef| async move {
                c.get_post(a).await.map(|post| json!({ "post": post }))
            })
            .accepts(["postID"])
            .returns(["post"]),
            Operation::bound("findPosts", &self, |c, a: ByTemplate| async move {
                let posts = c.find_posts(a).await;
                Ok::<_, ConceptError>(json!({ "posts": posts }))
            })
            .accepts(["templateID"])
            .returns(["posts"]),
            Operation::bound("findPostsByAuthor", &self, |c, a: ByAuthor| async move {
                let posts = c.find_posts_by_author(a).await;
                Ok::<_, ConceptError>(json!({ "posts": posts }))
            })
            .accepts(["authorID"])
            .returns(["posts"]),
            Operation::bound("editPost", &self, |c, a: EditPost| async move {
                let success = c.edit_post(a).await;
                Ok::<_, ConceptError>(json!({ "success": success }))
            })
            .accepts(["postID", "userID", "title", "description", "imageURL"])
            .returns(["success"]),
            Operation::bound("deletePost", &self, |c, a: DeletePost| async move {
                let success = c.delete_post(a).await;
                Ok::<_, ConceptError>(json!({ "success": success }))
            })
            .accepts(["postID", "userID"])
            .returns(["success"]),
        ]
    }
}
