use actix_multipart::Multipart;
use actix_web::web::BytesMut;
use futures_util::StreamExt;

use crate::error::BoardError;
use crate::models::{ImageUpload, NewPost};

fn malformed(e: impl std::fmt::Display) -> BoardError {
    log::warn!("Rejected malformed post form: {}", e);
    BoardError::Validation("The submitted form could not be read.".to_string())
}

/// Reads the create-post multipart form: text fields `title`, `content` and
/// `author`, plus an optional file field `image`. Unknown fields are ignored
/// and an `image` field without content counts as no image.
pub async fn read_post_form(
    mut payload: Multipart,
) -> Result<(NewPost, Option<ImageUpload>), BoardError> {
    let mut post = NewPost::default();
    let mut image = None;

    while let Some(item) = payload.next().await {
        let mut field = item.map_err(malformed)?;
        let field_name = field.content_disposition().get_name().unwrap_or_default().to_string();
        let filename = field
            .content_disposition()
            .get_filename()
            .unwrap_or("upload")
            .to_string();

        let mut data = BytesMut::new();
        while let Some(chunk) = field.next().await {
            data.extend_from_slice(&chunk.map_err(malformed)?);
        }

        match field_name.as_str() {
            "image" => {
                if !data.is_empty() {
                    image = Some(ImageUpload {
                        filename,
                        bytes: data.to_vec(),
                    });
                }
            }
            "title" | "content" | "author" => {
                let value = String::from_utf8(data.to_vec()).map_err(malformed)?;
                match field_name.as_str() {
                    "title" => post.title = value,
                    "content" => post.content = value,
                    _ => post.author = value,
                }
            }
            _ => (),
        }
    }

    Ok((post, image))
}
