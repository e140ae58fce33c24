/// Keep at most `max_chars` characters of `input`, never splitting a char.
pub fn clamp_chars(input: &str, max_chars: usize) -> String {
    match input.char_indices().nth(max_chars) {
        Some((end, _)) => input[..end].to_string(),
        None => input.to_string(),
    }
}

/// Trim, clamp and trim again so a clamped value is stable under re-clamping.
pub fn clean_label(input: &str, max_chars: usize) -> String {
    clamp_chars(input.trim(), max_chars).trim_end().to_string()
}

pub fn title_case(token: &str) -> String {
    let mut chars = token.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Human label for a domain: `docs.rust-lang.org` -> `Rust-lang`.
pub fn domain_label(domain: &str) -> String {
    let trimmed = domain.trim().trim_end_matches('.');
    let without_tld = match trimmed.rsplit_once('.') {
        Some((rest, tld)) if tld.chars().all(|c| c.is_ascii_alphabetic()) => rest,
        _ => trimmed,
    };
    let base = without_tld.rsplit('.').next().unwrap_or(without_tld);
    if base.is_empty() {
        return "Unknown".to_string();
    }
    title_case(base)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_respects_char_boundaries() {
        assert_eq!(clamp_chars("héllo wörld", 4), "héll");
        assert_eq!(clamp_chars("short", 40), "short");
    }

    #[test]
    fn clean_label_is_stable() {
        let once = clean_label("  alpha beta gamma  ", 6);
        assert_eq!(once, "alpha");
        assert_eq!(clean_label(&once, 6), once);
    }

    #[test]
    fn domain_labels() {
        assert_eq!(domain_label("docs.rust-lang.org"), "Rust-lang");
        assert_eq!(domain_label("github.com"), "Github");
        assert_eq!(domain_label("localhost"), "Localhost");
        assert_eq!(domain_label(""), "Unknown");
    }
}
