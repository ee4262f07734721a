//! Resume-point negotiation for reconnecting observers.

/// Header carrying the last sequence number a client saw.
pub const LAST_EVENT_ID_HEADER: &str = "Last-Event-Id";

/// Query parameter used when the header cannot be set.
pub const LAST_EVENT_ID_QUERY: &str = "lastEventId";

/// Where a subscription starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumePoint {
    /// From the start of the retained window.
    Fresh,
    /// After the event with this sequence number.
    After(u64),
}

impl ResumePoint {
    /// Parse one raw value. Anything but a non-negative integer is `Fresh`.
    ///
    /// ```
    /// use gatekeep::events::ResumePoint;
    ///
    /// assert_eq!(ResumePoint::parse(Some("0")), ResumePoint::After(0));
    /// assert_eq!(ResumePoint::parse(Some("-1")), ResumePoint::Fresh);
    /// assert_eq!(ResumePoint::parse(Some("")), ResumePoint::Fresh);
    /// ```
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some(value) if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) => value
                .parse()
                .map(ResumePoint::After)
                .unwrap_or(ResumePoint::Fresh),
            _ => ResumePoint::Fresh,
        }
    }

    /// Combine the header and query values; a valid header wins.
    pub fn resolve(header: Option<&str>, query: Option<&str>) -> Self {
        match Self::parse(header) {
            ResumePoint::Fresh => Self::parse(query),
            after => after,
        }
    }

    pub fn last_seq(self) -> Option<u64> {
        match self {
            ResumePoint::Fresh => None,
            ResumePoint::After(seq) => Some(seq),
        }
    }
}
