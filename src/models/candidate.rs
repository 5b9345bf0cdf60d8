use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CandidateOrigin {
    Extracted,
    Sniffed,
    Direct,
}

/// A URL suspected to reference a playable media stream, together with
/// whatever the prober managed to learn about it. Created per resolution
/// attempt and discarded afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub url: String,
    pub origin: CandidateOrigin,
    /// Delivered height in pixels, 0 when unknown.
    pub height: u32,
    pub size_bytes: Option<u64>,
    pub probe_error: Option<String>,
}

impl Candidate {
    pub fn new(url: impl Into<String>, origin: CandidateOrigin) -> Self {
        Self {
            url: url.into(),
            origin,
            height: 0,
            size_bytes: None,
            probe_error: None,
        }
    }

    pub fn probed_ok(&self) -> bool {
        self.probe_error.is_none()
    }
}

/// Output of one resolution attempt: the ordered work queue (selected
/// candidate first) and the quality floor it was produced under.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub queue: Vec<Candidate>,
    pub effective_min: u32,
}
