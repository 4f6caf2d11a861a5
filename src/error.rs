use thiserror::Error;

pub type PostingsResult<T> = Result<T, PostingsError>;

#[derive(Debug, Error)]
pub enum PostingsError {
    #[error("postings offsets for {name}: {source}")]
    RangeResolution {
        name: String,
        #[source]
        source: Box<PostingsError>,
    },
    #[error("get postings: {0}")]
    Fetch(#[source] Box<PostingsError>),
    #[error("expand: {0}")]
    Expand(#[source] Box<PostingsError>),
    #[error("context canceled")]
    Cancelled,
    #[error("context deadline exceeded")]
    DeadlineExceeded,
    #[error("exceeded bytes limit while fetching postings: limit {limit}, requested {requested}")]
    LimitExceeded { limit: u64, requested: u64 },
    #[error("fetched postings count mismatch: expected {expected}, got {actual}")]
    FetchedPostingsMismatch { expected: usize, actual: usize },
    #[error("invalid matcher: {0}")]
    InvalidMatcher(String),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("index: {0}")]
    Index(String),
}

impl PostingsError {
    pub fn range_resolution(name: impl Into<String>, source: PostingsError) -> Self {
        PostingsError::RangeResolution {
            name: name.into(),
            source: Box::new(source),
        }
    }

    pub fn fetch(source: PostingsError) -> Self {
        PostingsError::Fetch(Box::new(source))
    }

    pub fn expand(source: PostingsError) -> Self {
        PostingsError::Expand(Box::new(source))
    }

    /// Returns true if the error (or the error it wraps) was caused by cancellation
    /// or by an expired deadline.
    pub fn is_cancellation(&self) -> bool {
        match self {
            PostingsError::Cancelled | PostingsError::DeadlineExceeded => true,
            PostingsError::RangeResolution { source, .. } => source.is_cancellation(),
            PostingsError::Fetch(source) | PostingsError::Expand(source) => {
                source.is_cancellation()
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrapped_error_messages() {
        let err = PostingsError::fetch(PostingsError::LimitExceeded {
            limit: 10,
            requested: 24,
        });
        assert_eq!(
            err.to_string(),
            "get postings: exceeded bytes limit while fetching postings: limit 10, requested 24"
        );

        let err = PostingsError::range_resolution("job", PostingsError::Index("boom".into()));
        assert_eq!(err.to_string(), "postings offsets for job: index: boom");
    }

    #[test]
    fn test_is_cancellation_sees_through_wrapping() {
        assert!(PostingsError::expand(PostingsError::Cancelled).is_cancellation());
        assert!(PostingsError::fetch(PostingsError::DeadlineExceeded).is_cancellation());
        assert!(!PostingsError::fetch(PostingsError::Index("x".into())).is_cancellation());
    }
}
