use image::RgbImage;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::debug;

use crate::error::{RagError, RagResult};

/// Number of items retrieved when the caller does not ask for a specific count
pub const DEFAULT_TOP_K: usize = 5;

/// Index namespace holding the image captions
pub const DEFAULT_NAMESPACE: &str = "images";

/// A search query in one of the supported modalities.
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    Text(String),
    /// Decoded bitmap in RGB channel order
    Image(Arc<RgbImage>),
}

impl Query {
    /// Build a query from the optional parts of a request.
    ///
    /// Exactly one of `text` or `image_bytes` must be present. Blank text and
    /// empty uploads count as absent.
    pub fn from_parts(text: Option<String>, image_bytes: Option<Vec<u8>>) -> RagResult<Self> {
        let text = text.filter(|t| !t.trim().is_empty());
        let image_bytes = image_bytes.filter(|b| !b.is_empty());

        match (text, image_bytes) {
            (Some(text), None) => Ok(Query::Text(text)),
            (None, Some(bytes)) => Query::from_image_bytes(&bytes),
            (Some(_), Some(_)) => Err(RagError::InvalidQueryKind(
                "Provide either a text query or an image, not both".to_string(),
            )),
            (None, None) => Err(RagError::InvalidQueryKind(
                "Provide either a text query or an image".to_string(),
            )),
        }
    }

    /// Decode an encoded image (PNG, JPEG, WebP) into an RGB query.
    pub fn from_image_bytes(bytes: &[u8]) -> RagResult<Self> {
        let image = image::load_from_memory(bytes)?.to_rgb8();
        Ok(Query::Image(Arc::new(image)))
    }

    /// Check that the query can be embedded.
    pub fn validate(&self) -> RagResult<()> {
        match self {
            Query::Text(text) if text.trim().is_empty() => Err(RagError::InvalidQueryKind(
                "Text query is empty".to_string(),
            )),
            Query::Image(image) if image.width() == 0 || image.height() == 0 => Err(
                RagError::InvalidQueryKind("Image has no pixels".to_string()),
            ),
            _ => Ok(()),
        }
    }

    /// Metric and log label for the query modality.
    pub fn modality(&self) -> &'static str {
        match self {
            Query::Text(_) => "text",
            Query::Image(_) => "image",
        }
    }
}

/// A unit-length embedding in the shared text/image space.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingVector(Vec<f32>);

impl EmbeddingVector {
    /// L2-normalize `values`.
    ///
    /// Fails on empty, non-finite or zero-norm input, none of which can be
    /// compared meaningfully against the index.
    pub fn normalized(values: Vec<f32>) -> RagResult<Self> {
        if values.is_empty() {
            return Err(RagError::PipelineFailure("Embedding is empty".to_string()));
        }

        let norm = l2_norm(&values);
        if !norm.is_finite() || norm <= f32::EPSILON {
            return Err(RagError::PipelineFailure(format!(
                "Embedding cannot be normalized (norm = {})",
                norm
            )));
        }

        Ok(Self(values.into_iter().map(|v| v / norm).collect()))
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn into_inner(self) -> Vec<f32> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn norm(&self) -> f32 {
        l2_norm(&self.0)
    }
}

fn l2_norm(values: &[f32]) -> f32 {
    values.iter().map(|v| v * v).sum::<f32>().sqrt()
}

/// A raw nearest-neighbour hit as returned by a vector index backend.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexMatch {
    pub id: String,
    pub score: f32,
    pub metadata: Map<String, Value>,
}

/// An index entry with its caption, source reference and similarity score.
///
/// Metadata beyond `caption` and `url` is passed through untouched, except a
/// stored `score` key: `score` is reserved for the similarity score and the
/// stored value is dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedItem {
    pub caption: String,
    #[serde(rename = "url")]
    pub source_url: String,
    pub score: f32,
    #[serde(flatten)]
    pub metadata: Map<String, Value>,
}

impl RetrievedItem {
    pub fn new(caption: impl Into<String>, source_url: impl Into<String>, score: f32) -> Self {
        Self {
            caption: caption.into(),
            source_url: source_url.into(),
            score,
            metadata: Map::new(),
        }
    }
}

impl TryFrom<IndexMatch> for RetrievedItem {
    type Error = RagError;

    fn try_from(entry: IndexMatch) -> RagResult<Self> {
        let IndexMatch {
            id,
            score,
            mut metadata,
        } = entry;

        let mut required = |key: &str| match metadata.remove(key) {
            Some(Value::String(value)) => Ok(value),
            Some(_) => Err(RagError::MalformedIndexEntry {
                id: id.clone(),
                reason: format!("'{}' is not a string", key),
            }),
            None => Err(RagError::MalformedIndexEntry {
                id: id.clone(),
                reason: format!("missing '{}'", key),
            }),
        };

        let caption = required("caption")?;
        let source_url = required("url")?;

        if let Some(stored) = metadata.remove("score") {
            debug!(id = %id, stored = %stored, "Dropping reserved 'score' metadata key");
        }

        Ok(Self {
            caption,
            source_url,
            score,
            metadata,
        })
    }
}

/// The answer and the context it was grounded on.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub answer: String,
    pub retrieved_items: Vec<RetrievedItem>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb};
    use serde_json::json;
    use std::io::Cursor;

    fn png_bytes() -> Vec<u8> {
        let image = RgbImage::from_pixel(4, 3, Rgb([10, 20, 30]));
        let mut bytes = Cursor::new(Vec::new());
        image.write_to(&mut bytes, ImageFormat::Png).unwrap();
        bytes.into_inner()
    }

    fn metadata(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_query_from_text() {
        let query = Query::from_parts(Some("a dog".into()), None).unwrap();
        assert_eq!(query, Query::Text("a dog".into()));
        assert_eq!(query.modality(), "text");
    }

    #[test]
    fn test_query_from_image() {
        let query = Query::from_parts(None, Some(png_bytes())).unwrap();
        match query {
            Query::Image(image) => assert_eq!(image.dimensions(), (4, 3)),
            other => panic!("expected image query, got {other:?}"),
        }
    }

    #[test]
    fn test_query_requires_exactly_one_part() {
        assert!(matches!(
            Query::from_parts(None, None),
            Err(RagError::InvalidQueryKind(_))
        ));
        assert!(matches!(
            Query::from_parts(Some("   ".into()), Some(Vec::new())),
            Err(RagError::InvalidQueryKind(_))
        ));
        assert!(matches!(
            Query::from_parts(Some("a dog".into()), Some(png_bytes())),
            Err(RagError::InvalidQueryKind(_))
        ));
    }

    #[test]
    fn test_undecodable_image_is_invalid_query() {
        let err = Query::from_parts(None, Some(b"not an image".to_vec())).unwrap_err();
        assert!(matches!(err, RagError::InvalidQueryKind(_)));
    }

    #[test]
    fn test_validate_rejects_blank_text() {
        assert!(Query::Text(" \n".into()).validate().is_err());
        assert!(Query::Text("a cat".into()).validate().is_ok());
    }

    #[test]
    fn test_embedding_is_unit_length() {
        let vector = EmbeddingVector::normalized(vec![3.0, 4.0]).unwrap();
        assert!((vector.norm() - 1.0).abs() < 1e-6);
        assert_eq!(vector.as_slice(), &[0.6, 0.8]);
    }

    #[test]
    fn test_embedding_rejects_degenerate_input() {
        assert!(EmbeddingVector::normalized(vec![]).is_err());
        assert!(EmbeddingVector::normalized(vec![0.0, 0.0]).is_err());
        assert!(EmbeddingVector::normalized(vec![f32::NAN, 1.0]).is_err());
    }

    #[test]
    fn test_retrieved_item_from_match_passes_extra_metadata() {
        let entry = IndexMatch {
            id: "img-1".into(),
            score: 0.91,
            metadata: metadata(json!({
                "caption": "a dog running in a field",
                "url": "https://example.com/1.jpg",
                "photographer": "flickr"
            })),
        };

        let item = RetrievedItem::try_from(entry).unwrap();
        assert_eq!(item.caption, "a dog running in a field");
        assert_eq!(item.source_url, "https://example.com/1.jpg");
        assert_eq!(item.metadata.get("photographer"), Some(&json!("flickr")));

        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["url"], "https://example.com/1.jpg");
        assert_eq!(json["photographer"], "flickr");
        assert!(json.get("source_url").is_none());
    }

    #[test]
    fn test_retrieved_item_score_is_similarity_not_stored_key() {
        let entry = IndexMatch {
            id: "img-4".into(),
            score: 0.87,
            metadata: metadata(json!({
                "caption": "a puppy on grass",
                "url": "https://example.com/4.jpg",
                "score": "five stars"
            })),
        };

        let item = RetrievedItem::try_from(entry).unwrap();
        assert!(!item.metadata.contains_key("score"));

        let json = serde_json::to_value(&item).unwrap();
        assert!((json["score"].as_f64().unwrap() - 0.87).abs() < 1e-6);
    }

    #[test]
    fn test_retrieved_item_missing_caption_is_malformed() {
        let entry = IndexMatch {
            id: "img-2".into(),
            score: 0.5,
            metadata: metadata(json!({ "url": "https://example.com/2.jpg" })),
        };

        match RetrievedItem::try_from(entry) {
            Err(RagError::MalformedIndexEntry { id, reason }) => {
                assert_eq!(id, "img-2");
                assert!(reason.contains("caption"));
            }
            other => panic!("expected malformed entry, got {other:?}"),
        }
    }

    #[test]
    fn test_retrieved_item_non_string_url_is_malformed() {
        let entry = IndexMatch {
            id: "img-3".into(),
            score: 0.5,
            metadata: metadata(json!({ "caption": "a cat", "url": 7 })),
        };

        assert!(matches!(
            RetrievedItem::try_from(entry),
            Err(RagError::MalformedIndexEntry { .. })
        ));
    }
}
