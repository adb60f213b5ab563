use crate::error::{PlannerError, PlannerResult};

/// Hard ceiling for any single prompt we send.
pub const PROMPT_TOKEN_CAP: usize = 60_000;

pub fn approx_tokens(s: &str) -> usize {
    // heuristic ~4 chars/token
    (s.chars().count() + 3) / 4
}

/// Single-line excerpt of at most `max_chars` characters.
pub fn excerpt(text: &str, max_chars: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_chars {
        return flat;
    }
    let mut s: String = flat.chars().take(max_chars.saturating_sub(1)).collect();
    s.push('…');
    s
}

pub fn assert_prompt_budget(prompt: &str, hard_cap: usize) -> PlannerResult<()> {
    let used = approx_tokens(prompt);
    if used > hard_cap {
        return Err(PlannerError::InvalidInput(format!(
            "prompt budget exceeded: {} > {} tokens (lower seeds.evidence_size or evidence_chars)",
            used, hard_cap
        )));
    }
    Ok(())
}
