// Typed backend endpoints
//
// Inherent `Gateway` methods grouped by resource. Each decodes the response
// body into the wire types in `models` and maps failures into `Error`.

pub mod account;
pub mod greetings;
pub mod hub;

use url::Url;

use crate::error::{Error, RequestError};

/// A response body plus the push hub its `Link` header advertised, if any.
#[derive(Debug, Clone)]
pub struct Discovered<T> {
    pub data: T,
    pub hub_url: Option<Url>,
}

/// `{collection}/{id}` with `id` encoded as one path segment.
///
/// Dot segments would be normalized away by URL parsing, so they are
/// rejected before any request is made.
pub(crate) fn item_path(collection: &str, id: &str) -> Result<String, Error> {
    if matches!(id, "" | "." | "..") {
        return Err(RequestError::new(400, format!("invalid identifier {id:?}")).into());
    }
    Ok(format!("{collection}/{}", urlencoding::encode(id)))
}
