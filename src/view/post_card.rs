use crate::backend::DocumentStore;
use crate::models::db_operations::posts_db_operations;
use crate::models::{Notification, Post};
use crate::view::optimistic::{run_optimistic, Increment};

/// One post in the list, with a locally displayed like count.
#[derive(Debug, Clone)]
pub struct PostCardView {
    post: Post,
    displayed_likes: u64,
}

impl PostCardView {
    pub fn new(post: Post) -> Self {
        let displayed_likes = post.likes;
        Self { post, displayed_likes }
    }

    pub fn post(&self) -> &Post {
        &self.post
    }

    pub fn displayed_likes(&self) -> u64 {
        self.displayed_likes
    }

    /// Shows the new like immediately. The displayed count is rolled back if
    /// the increment fails.
    pub fn like(&mut self, store: &dyn DocumentStore) -> Result<(), Notification> {
        let post_id = self.post.id.as_str();
        run_optimistic(&mut self.displayed_likes, &Increment(1), || {
            posts_db_operations::like_post(store, post_id)
        })
        .map(|_| ())
        .map_err(|e| {
            log::error!("Liking post {} failed: {}", post_id, e);
            e.notification()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory_store::MemoryDocumentStore;
    use crate::backend::{Collection, NewDocument};

    #[test]
    fn like_updates_display_and_store() {
        let store = MemoryDocumentStore::new();
        let id = store
            .insert(
                Collection::Posts,
                NewDocument::new()
                    .set("title", "Cake")
                    .set("content", "sweet")
                    .set("author", "Nok")
                    .set("createdAt", 1)
                    .set("likes", 2),
            )
            .unwrap();
        let post = posts_db_operations::get_post(&store, &id).unwrap();

        let mut card = PostCardView::new(post);
        card.like(&store).unwrap();
        assert_eq!(card.displayed_likes(), 3);
        assert_eq!(posts_db_operations::get_post(&store, &id).unwrap().likes, 3);
    }

    #[test]
    fn like_of_a_vanished_post_reverts() {
        let store = MemoryDocumentStore::new();
        let post = Post {
            id: "gone".to_string(),
            title: "Cake".to_string(),
            content: "sweet".to_string(),
            author: "Nok".to_string(),
            created_at: chrono::Utc::now(),
            likes: 5,
            image_url: None,
        };
        let mut card = PostCardView::new(post);
        let note = card.like(&store).unwrap_err();
        assert!(note.is_error());
        assert_eq!(card.displayed_likes(), 5);
    }
}
