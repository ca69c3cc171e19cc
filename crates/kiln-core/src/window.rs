use time::OffsetDateTime;

/// Time interval scanned for modifications in one poll cycle.
///
/// Both bounds are exclusive: a change stamped exactly at `since` was already
/// owned by an earlier cycle, and a change stamped at or after `until`
/// belongs to a later one. A backwards window contains nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollWindow {
    pub since: OffsetDateTime,
    pub until: OffsetDateTime,
}

impl PollWindow {
    pub fn new(since: OffsetDateTime, until: OffsetDateTime) -> Self {
        Self { since, until }
    }

    pub fn is_backwards(&self) -> bool {
        self.since > self.until
    }

    pub fn contains(&self, instant: OffsetDateTime) -> bool {
        self.since < instant && instant < self.until
    }
}
