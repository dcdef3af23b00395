use std::sync::Arc;

use actix_web::web;

use crate::backend::{DocumentStore, ObjectStore};
use crate::error::BoardError;
use crate::models::db_operations::posts_db_operations;
use crate::models::{ImageUpload, NewPost, Notification};

/// State of the create-post form.
#[derive(Debug, Default)]
pub struct CreatePostForm {
    pub title: String,
    pub content: String,
    pub author: String,
    image: Option<ImageUpload>,
    submitting: bool,
}

impl CreatePostForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach_image(&mut self, image: ImageUpload) {
        self.image = Some(image);
    }

    pub fn clear_image(&mut self) {
        self.image = None;
    }

    pub fn image(&self) -> Option<&ImageUpload> {
        self.image.as_ref()
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting
    }

    fn fields(&self) -> NewPost {
        NewPost {
            title: self.title.clone(),
            content: self.content.clone(),
            author: self.author.clone(),
        }
    }

    /// Validates the form and marks it as submitting. The returned post is
    /// written with [`PendingPost::run`] and the outcome handed back to
    /// [`CreatePostForm::finish_submit`]. Empty fields are reported without
    /// any backend call.
    pub fn begin_submit(&mut self) -> Result<PendingPost, Notification> {
        if self.submitting {
            return Err(Notification::error("The recipe is already being posted."));
        }
        let fields = self.fields();
        if let Err(e) = posts_db_operations::validate_new_post(&fields) {
            return Err(e.notification());
        }

        self.submitting = true;
        Ok(PendingPost {
            fields,
            image: self.image.clone(),
        })
    }

    /// Clears the submitting flag. On success the form is reset; on failure
    /// it keeps its input.
    pub fn finish_submit(
        &mut self,
        result: Result<String, BoardError>,
    ) -> Result<(String, Notification), Notification> {
        self.submitting = false;
        match result {
            Ok(id) => {
                *self = Self::default();
                Ok((id, Notification::success("Recipe posted!")))
            }
            Err(e) => {
                log::error!("Creating post failed: {}", e);
                Err(e.notification())
            }
        }
    }

    /// Creates the post on the blocking pool and resets the form.
    pub async fn submit(
        &mut self,
        store: Arc<dyn DocumentStore>,
        objects: Arc<dyn ObjectStore>,
    ) -> Result<(String, Notification), Notification> {
        let pending = self.begin_submit()?;
        let result = web::block(move || pending.run(store.as_ref(), objects.as_ref()))
            .await
            .map_err(BoardError::from)
            .and_then(|result| result);
        self.finish_submit(result)
    }
}

/// A validated post on its way to the backend.
#[derive(Debug)]
pub struct PendingPost {
    fields: NewPost,
    image: Option<ImageUpload>,
}

impl PendingPost {
    pub fn run(&self, store: &dyn DocumentStore, objects: &dyn ObjectStore) -> Result<String, BoardError> {
        posts_db_operations::create_post(store, objects, &self.fields, self.image.as_ref())
    }
}
