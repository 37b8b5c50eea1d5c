//! Order-preserving subsequence scoring.
//!
//! Each query character is looked up in the candidate at or after the end of the
//! previous match. Contiguous runs, word starts and exact-case matches earn more; a
//! query character with no match costs a leakage penalty instead of disqualifying the
//! candidate (unless fuzziness is zero).

/// Fuzziness used by the fuzzy search channel.
pub const DEFAULT_FUZZINESS: f64 = 0.3;

/// Lowest score the fuzzy channel keeps. A lone shared character in an otherwise
/// unrelated text scores around 0.01; any real subsequence match clears 0.1.
pub const DEFAULT_MIN_SCORE: f64 = 0.1;

/// Scores `query` against `primary`, in `[0, 1]`. Equal strings score exactly 1.
pub fn string_score(primary: &str, query: &str, fuzziness: f64) -> f64 {
    if primary == query {
        return 1.0;
    }
    if query.is_empty() {
        return 0.0;
    }

    let prim: Vec<char> = primary.chars().collect();
    let sec: Vec<char> = query.chars().collect();
    if prim.is_empty() {
        return 0.0;
    }
    let prim_lower: Vec<char> = prim.iter().map(|&c| fold(c)).collect();

    let mut score = 0.0;
    let mut leakage = 1.0;
    let mut cursor = 0usize;

    for &q in &sec {
        let q_lower = fold(q);
        let found = prim_lower[cursor..].iter().position(|&c| c == q_lower).map(|off| cursor + off);
        let Some(b) = found else {
            if fuzziness <= 0.0 {
                return 0.0;
            }
            leakage += 1.0 - fuzziness;
            continue;
        };

        let mut weight = if b == cursor {
            7.0
        } else if prim[b - 1] == ' ' {
            9.0
        } else {
            1.0
        };
        if prim[b] == q {
            weight += 1.0;
        }
        score += weight / 10.0;
        cursor = b + 1;
    }

    let mut score = 0.5 * (score / prim.len() as f64 + score / sec.len() as f64) / leakage;
    if prim_lower[0] == fold(sec[0]) && score < 0.85 {
        score += 0.15;
    }
    score
}

/// Single-character lowercase, so indices line up with the input string.
fn fold(c: char) -> char {
    c.to_lowercase().next().unwrap_or(c)
}
