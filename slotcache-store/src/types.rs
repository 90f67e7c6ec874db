//! Payload types shared by the shard store and the cache core.

/// One `(score, member)` pair of a sorted set.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreMember {
    /// Sorting score.
    pub score: f64,
    /// Binary-safe member payload.
    pub member: Vec<u8>,
}

impl ScoreMember {
    /// Creates a pair from a score and any byte-like member.
    #[must_use]
    pub fn new(score: f64, member: impl Into<Vec<u8>>) -> Self {
        Self {
            score,
            member: member.into(),
        }
    }
}

/// One `(field, value)` pair of a hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldValue {
    /// Hash field name.
    pub field: Vec<u8>,
    /// Binary-safe field payload.
    pub value: Vec<u8>,
}

impl FieldValue {
    /// Creates a pair from byte-like field and value.
    #[must_use]
    pub fn new(field: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }
}

/// Insertion side for `LINSERT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeforeOrAfter {
    /// Insert before the pivot element.
    Before,
    /// Insert after the pivot element.
    After,
}

/// One endpoint of a score interval.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScoreBound {
    /// `-inf`
    NegInf,
    /// `+inf`
    PosInf,
    /// Closed endpoint.
    Incl(f64),
    /// Open endpoint (the `(x` form of the wire protocol).
    Excl(f64),
}

impl ScoreBound {
    /// True when `score` is on the allowed side of this bound used as a minimum.
    #[must_use]
    pub fn allows_from_below(self, score: f64) -> bool {
        match self {
            Self::NegInf => true,
            Self::PosInf => false,
            Self::Incl(min) => score >= min,
            Self::Excl(min) => score > min,
        }
    }

    /// True when `score` is on the allowed side of this bound used as a maximum.
    #[must_use]
    pub fn allows_from_above(self, score: f64) -> bool {
        match self {
            Self::NegInf => false,
            Self::PosInf => true,
            Self::Incl(max) => score <= max,
            Self::Excl(max) => score < max,
        }
    }

    /// The finite endpoint value, if any.
    #[must_use]
    pub fn value(self) -> Option<f64> {
        match self {
            Self::Incl(value) | Self::Excl(value) => Some(value),
            Self::NegInf | Self::PosInf => None,
        }
    }

    /// True for the closed-endpoint form.
    #[must_use]
    pub fn is_closed(self) -> bool {
        matches!(self, Self::Incl(_))
    }
}

/// One endpoint of a lexicographic interval over members.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LexBound {
    /// `-`
    NegInf,
    /// `+`
    PosInf,
    /// Closed endpoint (`[member`).
    Incl(Vec<u8>),
    /// Open endpoint (`(member`).
    Excl(Vec<u8>),
}

impl LexBound {
    /// True when `member` is on the allowed side of this bound used as a minimum.
    #[must_use]
    pub fn allows_from_below(&self, member: &[u8]) -> bool {
        match self {
            Self::NegInf => true,
            Self::PosInf => false,
            Self::Incl(min) => member >= min.as_slice(),
            Self::Excl(min) => member > min.as_slice(),
        }
    }

    /// True when `member` is on the allowed side of this bound used as a maximum.
    #[must_use]
    pub fn allows_from_above(&self, member: &[u8]) -> bool {
        match self {
            Self::NegInf => false,
            Self::PosInf => true,
            Self::Incl(max) => member <= max.as_slice(),
            Self::Excl(max) => member < max.as_slice(),
        }
    }
}
