//! Safety-review verdicts.

/// Response prefix that approves a plan, compared case-insensitively.
pub const ACCEPT_TOKEN: &str = "SAFE";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Approved,
    /// Carries the reviewer's response verbatim (trimmed).
    Rejected { reason: String },
}

/// Classify a reviewer response. Anything not starting with [`ACCEPT_TOKEN`]
/// is a rejection.
pub fn judge_review(response: &str) -> Verdict {
    let trimmed = response.trim();
    let approved = trimmed
        .get(..ACCEPT_TOKEN.len())
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(ACCEPT_TOKEN));
    if approved {
        Verdict::Approved
    } else {
        Verdict::Rejected {
            reason: trimmed.to_string(),
        }
    }
}
