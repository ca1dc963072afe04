/// How many more duplicates may still be removed within one request.
///
/// Created fresh for each request from the configured cap and handed from one
/// pass to the next; nothing outlives the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalBudget {
    Unbounded,
    Limited(usize),
}

impl RemovalBudget {
    /// `-1` (or any negative cap) means unbounded.
    pub fn from_count(count: i64) -> Self {
        usize::try_from(count).map_or(Self::Unbounded, Self::Limited)
    }

    /// Whether one more removal fits after `removed` have already happened.
    pub fn allows(self, removed: usize) -> bool {
        match self {
            Self::Unbounded => true,
            Self::Limited(limit) => removed < limit,
        }
    }

    /// `min(n, remaining)`.
    pub fn cap(self, n: usize) -> usize {
        match self {
            Self::Unbounded => n,
            Self::Limited(limit) => n.min(limit),
        }
    }

    /// Bounds the budget to at most `max`; unbounded becomes `max`.
    pub fn clamp(self, max: usize) -> Self {
        Self::Limited(self.cap(max))
    }

    pub fn consume(&mut self, n: usize) {
        if let Self::Limited(limit) = self {
            *limit = limit.saturating_sub(n);
        }
    }

    pub fn is_exhausted(self) -> bool {
        self == Self::Limited(0)
    }
}
