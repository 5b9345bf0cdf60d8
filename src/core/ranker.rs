use anyhow::anyhow;

use crate::models::candidate::Candidate;

/// Ranked view of a probed candidate pool.
#[derive(Debug, Clone)]
pub struct RankedCandidates {
    /// Every candidate, best first: height desc, then size desc, ties in
    /// insertion order.
    pub ordered: Vec<Candidate>,
    /// The subset meeting the effective minimum with a clean probe, in the
    /// same relative order.
    pub qualifying: Vec<Candidate>,
    /// The quality floor actually used. Equal to the requested minimum
    /// unless degradation kicked in, and never larger than it.
    pub effective_min: u32,
}

/// Stable quality ordering for display and queueing.
pub fn sort_by_quality(mut candidates: Vec<Candidate>) -> Vec<Candidate> {
    candidates.sort_by(|a, b| {
        b.height
            .cmp(&a.height)
            .then_with(|| b.size_bytes.unwrap_or(0).cmp(&a.size_bytes.unwrap_or(0)))
    });
    candidates
}

/// Candidates with a clean probe at or above `min_height`, order preserved.
pub fn qualifying(candidates: &[Candidate], min_height: u32) -> Vec<Candidate> {
    candidates
        .iter()
        .filter(|c| c.probed_ok() && c.height >= min_height)
        .cloned()
        .collect()
}

/// Rank a probed pool against `min_height`, relaxing the floor to the best
/// available height when nothing meets the target. Zero clean probes means
/// there is nothing to download at all.
pub fn rank(candidates: Vec<Candidate>, min_height: u32) -> anyhow::Result<RankedCandidates> {
    let ordered = sort_by_quality(candidates);

    let best_clean = ordered
        .iter()
        .filter(|c| c.probed_ok())
        .map(|c| c.height)
        .max();

    let Some(best_height) = best_clean else {
        return Err(anyhow!("no usable stream"));
    };

    let mut effective_min = min_height;
    let mut qualified = qualifying(&ordered, effective_min);
    if qualified.is_empty() {
        effective_min = best_height;
        qualified = qualifying(&ordered, effective_min);
    }

    Ok(RankedCandidates {
        ordered,
        qualifying: qualified,
        effective_min,
    })
}
