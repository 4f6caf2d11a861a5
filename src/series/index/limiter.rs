use crate::error::{PostingsError, PostingsResult};
use std::sync::atomic::{AtomicU64, Ordering};

/// Caps the number of bytes fetched on behalf of a single query.
///
/// Implementations are shared by every fetch of a query and must be safe for concurrent use.
pub trait BytesLimiter: Send + Sync {
    /// Charges `bytes` against the budget. Returns an error once the budget is exceeded.
    /// Charged bytes are never given back.
    fn reserve(&self, bytes: u64) -> PostingsResult<()>;
}

/// Atomic byte budget. A limit of 0 means unlimited.
#[derive(Debug, Default)]
pub struct BytesLimit {
    limit: u64,
    reserved: AtomicU64,
}

impl BytesLimit {
    pub fn new(limit: u64) -> Self {
        Self {
            limit,
            reserved: AtomicU64::new(0),
        }
    }

    pub fn unlimited() -> Self {
        Self::new(0)
    }

    /// Total bytes charged so far, including the charge that exceeded the limit.
    pub fn reserved(&self) -> u64 {
        self.reserved.load(Ordering::Relaxed)
    }
}

impl BytesLimiter for BytesLimit {
    fn reserve(&self, bytes: u64) -> PostingsResult<()> {
        let total = self.reserved.fetch_add(bytes, Ordering::Relaxed) + bytes;
        if self.limit > 0 && total > self.limit {
            return Err(PostingsError::LimitExceeded {
                limit: self.limit,
                requested: total,
            });
        }
        Ok(())
    }
}
