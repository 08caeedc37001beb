//! Session resume state
//!
//! Survives individual connections so a dropped socket can re-attach.

/// What is needed to resume a session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResumeState {
    pub session_id: Option<String>,
    /// Last dispatch sequence received
    pub sequence: Option<u64>,
    /// Gateway URL the server asked us to resume on
    pub resume_url: Option<String>,
}

impl ResumeState {
    /// Whether a Resume can be attempted instead of Identify
    #[must_use]
    pub fn can_resume(&self) -> bool {
        self.session_id.is_some() && self.sequence.is_some()
    }

    /// Record the sequence of a dispatch; sequences never move backwards
    pub fn record_sequence(&mut self, sequence: u64) {
        self.sequence = Some(self.sequence.map_or(sequence, |s| s.max(sequence)));
    }

    /// Forget the session so the next handshake identifies
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
