use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::{Stream, StreamExt};

use crate::backend::{
    CancelHandle, Collection, Direction, Document, DocumentStore, DocumentSubscription,
    NewDocument, Query,
};
use crate::error::BoardError;
use crate::models::Comment;

const WHAT: &str = "comments";

/// Comments of one post, oldest first.
pub fn comments_query(post_id: &str) -> Query {
    Query::collection(Collection::Comments)
        .where_eq("postId", post_id)
        .order_by("createdAt", Direction::Ascending)
}

fn decode_all(documents: Vec<Document>) -> Result<Vec<Comment>, BoardError> {
    documents
        .into_iter()
        .map(|doc| doc.decode::<Comment>().map_err(|e| BoardError::fetch(WHAT, e)))
        .collect()
}

/// Returns the trimmed author and content, or a validation error when either
/// is blank.
pub fn validate_new_comment(author: &str, content: &str) -> Result<(String, String), BoardError> {
    let (author, content) = (author.trim(), content.trim());
    if author.is_empty() || content.is_empty() {
        return Err(BoardError::Validation(
            "Please enter both your name and a comment.".to_string(),
        ));
    }
    Ok((author.to_string(), content.to_string()))
}

pub fn list_comments(store: &dyn DocumentStore, post_id: &str) -> Result<Vec<Comment>, BoardError> {
    let documents = store
        .query(&comments_query(post_id))
        .map_err(|e| BoardError::fetch(WHAT, e))?;
    decode_all(documents)
}

/// Live comment list of one post. Yields the full ordered list on subscribe
/// and after every change to that post's comments. Ends after the first error
/// or on cancel; dropping it cancels the subscription.
pub struct CommentSubscription {
    inner: DocumentSubscription,
}

impl CommentSubscription {
    pub fn cancel_handle(&self) -> CancelHandle {
        self.inner.cancel_handle()
    }

    pub fn cancel(&self) {
        self.inner.cancel();
    }
}

impl Stream for CommentSubscription {
    type Item = Result<Vec<Comment>, BoardError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().inner.poll_next_unpin(cx).map(|snapshot| {
            snapshot.map(|result| {
                result
                    .map_err(|e| BoardError::fetch(WHAT, e))
                    .and_then(decode_all)
            })
        })
    }
}

pub fn watch_comments(store: &dyn DocumentStore, post_id: &str) -> Result<CommentSubscription, BoardError> {
    let inner = store
        .subscribe(comments_query(post_id))
        .map_err(|e| BoardError::fetch(WHAT, e))?;
    Ok(CommentSubscription { inner })
}

/// Callback form of [`watch_comments`]: drives the subscription on the
/// current actix runtime, calling `on_update` with every snapshot and
/// `on_error` once if the subscription fails. The returned handle must be
/// cancelled when the caller loses interest.
pub fn subscribe_comments<U, E>(
    store: &dyn DocumentStore,
    post_id: &str,
    mut on_update: U,
    on_error: E,
) -> Result<CancelHandle, BoardError>
where
    U: FnMut(Vec<Comment>) + 'static,
    E: FnOnce(BoardError) + 'static,
{
    let mut subscription = watch_comments(store, post_id)?;
    let handle = subscription.cancel_handle();

    actix_web::rt::spawn(async move {
        while let Some(snapshot) = subscription.next().await {
            match snapshot {
                Ok(comments) => on_update(comments),
                Err(e) => {
                    on_error(e);
                    break;
                }
            }
        }
    });

    Ok(handle)
}

/// Adds a comment to an existing post. The timestamp is assigned by the store.
pub fn add_comment(
    store: &dyn DocumentStore,
    post_id: &str,
    author: &str,
    content: &str,
) -> Result<String, BoardError> {
    let (author, content) = validate_new_comment(author, content)?;

    let post_exists = store
        .get(Collection::Posts, post_id)
        .map_err(|e| BoardError::fetch("recipe", e))?
        .is_some();
    if !post_exists {
        return Err(BoardError::NotFound("recipe".to_string()));
    }

    let document = NewDocument::new()
        .set("postId", post_id)
        .set("author", author)
        .set("content", content)
        .server_timestamp("createdAt");
    let id = store
        .insert(Collection::Comments, document)
        .map_err(|e| BoardError::write("comment", e))?;

    log::debug!("Added comment {} to post {}", id, post_id);
    Ok(id)
}

pub fn delete_comment(store: &dyn DocumentStore, id: &str) -> Result<(), BoardError> {
    store
        .delete(Collection::Comments, id)
        .map_err(|e| BoardError::write("comment", e))?;
    log::debug!("Deleted comment {}", id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comment_fields_are_trimmed() {
        let (author, content) = validate_new_comment("  Nok ", "\tdelicious!\n").unwrap();
        assert_eq!(author, "Nok");
        assert_eq!(content, "delicious!");
    }

    #[test]
    fn blank_comment_fields_are_rejected() {
        assert!(validate_new_comment("   ", "text").is_err());
        assert!(validate_new_comment("Nok", " \n ").is_err());
    }

    #[test]
    fn query_targets_one_post_oldest_first() {
        let query = comments_query("p1");
        assert_eq!(query.collection, Collection::Comments);
        assert_eq!(query.filters, vec![("postId".to_string(), serde_json::json!("p1"))]);
        assert_eq!(query.order_by, Some(("createdAt".to_string(), Direction::Ascending)));
    }
}
