//! "Did you mean" candidates for unknown tool names.

fn normalize_name(value: &str) -> String {
    value
        .trim()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

fn distance_budget(normalized_len: usize) -> usize {
    match normalized_len {
        0 => 0,
        1..=4 => 1,
        5..=8 => 2,
        n => (n as f32 * 0.35).floor().max(3.0) as usize,
    }
}

/// Ranks `candidates` by closeness to `input`. Substring matches rank right after exact
/// (case/punctuation-insensitive) matches; ties break on length then name.
pub fn suggest<'a, I>(input: &str, candidates: I, limit: usize) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let needle = normalize_name(input);
    if needle.is_empty() || limit == 0 {
        return Vec::new();
    }
    let budget = distance_budget(needle.len());
    let mut scored: Vec<(usize, &str)> = candidates
        .into_iter()
        .filter_map(|candidate| {
            let normalized = normalize_name(candidate);
            if normalized.is_empty() {
                return None;
            }
            let score = if normalized == needle {
                0
            } else if normalized.contains(&needle) || needle.contains(&normalized) {
                1
            } else {
                edit_distance(&needle, &normalized)
            };
            (score <= budget).then_some((score, candidate))
        })
        .collect();
    scored.sort_by(|a, b| {
        a.0.cmp(&b.0)
            .then_with(|| a.1.len().cmp(&b.1.len()))
            .then_with(|| a.1.cmp(b.1))
    });
    let mut out: Vec<String> = Vec::new();
    for (_, candidate) in scored {
        if !out.iter().any(|existing| existing == candidate) {
            out.push(candidate.to_string());
        }
        if out.len() >= limit {
            break;
        }
    }
    out
}
