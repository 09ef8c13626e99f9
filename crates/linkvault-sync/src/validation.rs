//! Local checks run before a bookmark is submitted.

use crate::NewBookmark;
use thiserror::Error;
use url::Url;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Please enter a title")]
    EmptyTitle,

    #[error("Please enter a valid URL")]
    InvalidUrl,
}

/// Trim and check user input, producing the row to insert.
pub fn validate_new_bookmark(
    owner_id: &str,
    title: &str,
    url: &str,
) -> Result<NewBookmark, ValidationError> {
    let url = url.trim();
    Url::parse(url).map_err(|_| ValidationError::InvalidUrl)?;

    let title = title.trim();
    if title.is_empty() {
        return Err(ValidationError::EmptyTitle);
    }

    Ok(NewBookmark {
        user_id: owner_id.to_string(),
        title: title.to_string(),
        url: url.to_string(),
    })
}
