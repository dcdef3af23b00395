use crate::backend::{Collection, Direction, DocumentStore, NewDocument, ObjectStore, Query};
use crate::error::BoardError;
use crate::models::{ImageUpload, NewPost, Post};
use chrono::{DateTime, Utc};

/// Object-store folder holding post images.
pub const IMAGE_PREFIX: &str = "post_images";

const WHAT: &str = "recipe";

/// Client-side check run before any backend call. Fields are not trimmed.
pub fn validate_new_post(post: &NewPost) -> Result<(), BoardError> {
    if post.title.is_empty() || post.content.is_empty() || post.author.is_empty() {
        return Err(BoardError::Validation(
            "Please fill in the title, the content and the author of the recipe.".to_string(),
        ));
    }
    Ok(())
}

/// `post_images/<epoch millis>_<file name>`. Only the last path component of
/// the original name is kept and characters outside `[A-Za-z0-9._-]` become `_`.
pub fn image_object_path(now: DateTime<Utc>, filename: &str) -> String {
    let base = filename.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or_default();
    let mut safe: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if safe.is_empty() || safe.chars().all(|c| c == '.') {
        safe = "image".to_string();
    }
    format!("{}/{}_{}", IMAGE_PREFIX, now.timestamp_millis(), safe)
}

/// All posts, newest first.
pub fn list_posts(store: &dyn DocumentStore) -> Result<Vec<Post>, BoardError> {
    let query = Query::collection(Collection::Posts).order_by("createdAt", Direction::Descending);
    let documents = store
        .query(&query)
        .map_err(|e| BoardError::fetch("recipes", e))?;

    documents
        .into_iter()
        .map(|doc| doc.decode::<Post>().map_err(|e| BoardError::fetch("recipes", e)))
        .collect()
}

pub fn get_post(store: &dyn DocumentStore, id: &str) -> Result<Post, BoardError> {
    store
        .get(Collection::Posts, id)
        .map_err(|e| BoardError::fetch(WHAT, e))?
        .ok_or_else(|| BoardError::NotFound(WHAT.to_string()))?
        .decode()
        .map_err(|e| BoardError::fetch(WHAT, e))
}

/// Validates, uploads the optional image, then inserts the post with zero
/// likes and the current wall-clock time. Returns the new post id.
///
/// An image uploaded before a failed insert is left in the object store.
pub fn create_post(
    store: &dyn DocumentStore,
    objects: &dyn ObjectStore,
    post: &NewPost,
    image: Option<&ImageUpload>,
) -> Result<String, BoardError> {
    validate_new_post(post)?;

    let now = Utc::now();
    let image_url = match image {
        Some(image) => {
            let path = image_object_path(now, &image.filename);
            Some(objects.upload(&path, &image.bytes).map_err(BoardError::Upload)?)
        }
        None => None,
    };

    let mut document = NewDocument::new()
        .set("title", post.title.as_str())
        .set("content", post.content.as_str())
        .set("author", post.author.as_str())
        .set("createdAt", now.timestamp_millis())
        .set("likes", 0);
    if let Some(url) = &image_url {
        document = document.set("imageUrl", url.as_str());
    }

    let id = store.insert(Collection::Posts, document).map_err(|e| {
        if let Some(url) = &image_url {
            log::warn!("Post insert failed; uploaded image '{}' is now orphaned", url);
        }
        BoardError::write(WHAT, e)
    })?;

    log::info!("Created post {} by '{}'", id, post.author);
    Ok(id)
}

/// Best-effort image removal followed by the document delete. A failing
/// image delete is logged and does not stop the document delete.
pub fn delete_post(
    store: &dyn DocumentStore,
    objects: &dyn ObjectStore,
    id: &str,
) -> Result<(), BoardError> {
    let post = get_post(store, id)?;

    if let Some(url) = post.image_url.as_deref() {
        if let Err(e) = objects.delete(url) {
            log::warn!("Could not delete image '{}' of post {}: {}", url, id, e);
        }
    }

    store
        .delete(Collection::Posts, id)
        .map_err(|e| BoardError::write(WHAT, e))?;
    log::info!("Deleted post {}", id);
    Ok(())
}

/// Atomic `likes += 1`. Returns the stored count after the increment.
pub fn like_post(store: &dyn DocumentStore, id: &str) -> Result<u64, BoardError> {
    let likes = store
        .increment(Collection::Posts, id, "likes", 1)
        .map_err(|e| BoardError::write(WHAT, e))?;
    Ok(likes.max(0) as u64)
}
