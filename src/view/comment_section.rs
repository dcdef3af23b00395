use std::sync::Arc;

use actix_web::web;
use futures_util::StreamExt;

use crate::backend::DocumentStore;
use crate::error::BoardError;
use crate::models::db_operations::comments_db_operations::{self, CommentSubscription};
use crate::models::{Comment, Notification};

/// Comment section under one post, kept current by a live subscription.
///
/// The subscription is released when the view is closed or dropped.
pub struct CommentSectionView {
    post_id: String,
    subscription: Option<CommentSubscription>,
    comments: Vec<Comment>,
    pub draft_author: String,
    pub draft_content: String,
    submitting: bool,
}

impl CommentSectionView {
    pub fn open(store: &dyn DocumentStore, post_id: &str) -> Result<Self, Notification> {
        let subscription = comments_db_operations::watch_comments(store, post_id).map_err(|e| {
            log::error!("Subscribing to comments of post {} failed: {}", post_id, e);
            e.notification()
        })?;

        Ok(Self {
            post_id: post_id.to_string(),
            subscription: Some(subscription),
            comments: Vec::new(),
            draft_author: String::new(),
            draft_content: String::new(),
            submitting: false,
        })
    }

    pub fn post_id(&self) -> &str {
        &self.post_id
    }

    pub fn comments(&self) -> &[Comment] {
        &self.comments
    }

    pub fn is_live(&self) -> bool {
        self.subscription.is_some()
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting
    }

    /// Waits for the next snapshot and replaces the comment list with it.
    /// Returns `false` once the subscription has ended; a failure is
    /// reported as a notification and ends the subscription.
    pub async fn next_update(&mut self) -> Result<bool, Notification> {
        let Some(subscription) = self.subscription.as_mut() else {
            return Ok(false);
        };

        match subscription.next().await {
            Some(Ok(comments)) => {
                self.comments = comments;
                Ok(true)
            }
            Some(Err(e)) => {
                log::error!("Comment subscription of post {} failed: {}", self.post_id, e);
                self.subscription = None;
                Err(e.notification())
            }
            None => {
                self.subscription = None;
                Ok(false)
            }
        }
    }

    /// Validates the drafts and marks the section as submitting. The returned
    /// comment is written with [`PendingComment::run`] and the outcome handed
    /// back to [`CommentSectionView::finish_submit`].
    pub fn begin_submit(&mut self) -> Result<PendingComment, Notification> {
        if self.submitting {
            return Err(Notification::error("The comment is already being posted."));
        }
        let (author, content) = comments_db_operations::validate_new_comment(&self.draft_author, &self.draft_content)
            .map_err(|e| e.notification())?;

        self.submitting = true;
        Ok(PendingComment {
            post_id: self.post_id.clone(),
            author,
            content,
        })
    }

    /// Clears the submitting flag, and the drafts on success. The new comment
    /// arrives through the subscription.
    pub fn finish_submit(&mut self, result: Result<String, BoardError>) -> Result<String, Notification> {
        self.submitting = false;
        match result {
            Ok(id) => {
                self.draft_author.clear();
                self.draft_content.clear();
                Ok(id)
            }
            Err(e) => {
                log::error!("Adding comment to post {} failed: {}", self.post_id, e);
                Err(e.notification())
            }
        }
    }

    /// Posts the drafted comment on the blocking pool.
    pub async fn submit(&mut self, store: Arc<dyn DocumentStore>) -> Result<String, Notification> {
        let pending = self.begin_submit()?;
        let result = web::block(move || pending.run(store.as_ref()))
            .await
            .map_err(BoardError::from)
            .and_then(|result| result);
        self.finish_submit(result)
    }

    pub fn delete(&self, store: &dyn DocumentStore, comment_id: &str) -> Result<Notification, Notification> {
        comments_db_operations::delete_comment(store, comment_id)
            .map(|_| Notification::success("Comment deleted."))
            .map_err(|e| {
                log::error!("Deleting comment {} failed: {}", comment_id, e);
                e.notification()
            })
    }

    /// Releases the subscription. Further updates are not delivered.
    pub fn close(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.cancel();
        }
    }
}

/// A validated comment on its way to the backend.
#[derive(Debug)]
pub struct PendingComment {
    post_id: String,
    author: String,
    content: String,
}

impl PendingComment {
    pub fn run(&self, store: &dyn DocumentStore) -> Result<String, BoardError> {
        comments_db_operations::add_comment(store, &self.post_id, &self.author, &self.content)
    }
}
