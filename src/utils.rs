/// Longest account code accepted in a trial balance.
pub const MAX_ACCOUNT_CODE_LEN: usize = 12;

/// Shortest account code accepted in a trial balance (a class plus a sub-class digit).
pub const MIN_ACCOUNT_CODE_LEN: usize = 2;

/// Returns true when `code` (already trimmed) is 2 to 12 ASCII digits.
pub fn is_valid_account_code(code: &str) -> bool {
    (MIN_ACCOUNT_CODE_LEN..=MAX_ACCOUNT_CODE_LEN).contains(&code.len())
        && code.bytes().all(|b| b.is_ascii_digit())
}

/// Explains why an account code was rejected, or `None` when it is valid.
pub fn account_code_problem(code: &str) -> Option<String> {
    let trimmed = code.trim();
    if is_valid_account_code(trimmed) {
        return None;
    }
    if trimmed.is_empty() {
        return Some("empty account code".to_string());
    }
    if !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Some(format!("account code '{}' contains non-digit characters", trimmed));
    }
    Some(format!(
        "account code '{}' has {} digits, expected {} to {}",
        trimmed,
        trimmed.len(),
        MIN_ACCOUNT_CODE_LEN,
        MAX_ACCOUNT_CODE_LEN
    ))
}

/// Drops prefixes that are extensions of another prefix in the same list.
///
/// A single bucket matches an entry once even if several of its prefixes
/// match (`["56", "564"]` behaves like `["56"]`). Empty prefixes are dropped
/// and the result is sorted.
pub fn normalize_prefixes<S: AsRef<str>>(prefixes: &[S]) -> Vec<String> {
    let mut sorted: Vec<&str> = prefixes
        .iter()
        .map(|p| p.as_ref().trim())
        .filter(|p| !p.is_empty())
        .collect();
    sorted.sort_unstable();
    sorted.dedup();

    let mut kept: Vec<String> = Vec::with_capacity(sorted.len());
    for prefix in sorted {
        // Sorted order puts a parent immediately before its extensions.
        if kept.last().is_some_and(|parent| prefix.starts_with(parent.as_str())) {
            continue;
        }
        kept.push(prefix.to_string());
    }
    kept
}
