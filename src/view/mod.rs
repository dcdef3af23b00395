//! Presentation state of the board, independent of any rendering layer.

pub mod comment_section;
pub mod optimistic;
pub mod post_card;
pub mod post_form;

pub use comment_section::CommentSectionView;
pub use post_card::PostCardView;
pub use post_form::CreatePostForm;

use crate::backend::DocumentStore;
use crate::models::db_operations::posts_db_operations;
use crate::models::{Notification, Post};

/// Posts whose title or content contains `term`, ignoring case, in their
/// original order. An empty term keeps every post.
pub fn filter_posts<'a>(posts: &'a [Post], term: &str) -> Vec<&'a Post> {
    if term.is_empty() {
        return posts.iter().collect();
    }
    let needle = term.to_lowercase();
    posts
        .iter()
        .filter(|post| {
            post.title.to_lowercase().contains(&needle)
                || post.content.to_lowercase().contains(&needle)
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoadStatus {
    Loading,
    Loaded,
    Failed(String),
}

/// The post list page: every loaded post plus the current search term.
#[derive(Debug)]
pub struct PostListView {
    all_posts: Vec<Post>,
    search_term: String,
    status: LoadStatus,
}

impl Default for PostListView {
    fn default() -> Self {
        Self::new()
    }
}

impl PostListView {
    pub fn new() -> Self {
        Self {
            all_posts: Vec::new(),
            search_term: String::new(),
            status: LoadStatus::Loading,
        }
    }

    /// Reloads all posts. On failure the previous posts are kept and the
    /// error notification is returned.
    pub fn load(&mut self, store: &dyn DocumentStore) -> Result<(), Notification> {
        self.status = LoadStatus::Loading;
        match posts_db_operations::list_posts(store) {
            Ok(posts) => {
                self.all_posts = posts;
                self.status = LoadStatus::Loaded;
                Ok(())
            }
            Err(e) => {
                log::error!("Loading posts failed: {}", e);
                let note = e.notification();
                self.status = LoadStatus::Failed(note.message.clone());
                Err(note)
            }
        }
    }

    pub fn set_search_term(&mut self, term: impl Into<String>) {
        self.search_term = term.into();
    }

    pub fn search_term(&self) -> &str {
        &self.search_term
    }

    pub fn status(&self) -> &LoadStatus {
        &self.status
    }

    pub fn all_posts(&self) -> &[Post] {
        &self.all_posts
    }

    pub fn visible_posts(&self) -> Vec<&Post> {
        filter_posts(&self.all_posts, &self.search_term)
    }
}
