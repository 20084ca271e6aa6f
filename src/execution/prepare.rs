//! Code-unit preparation before execution.

/// Strip surrounding Markdown code fences from an agent-produced snippet.
/// The opening fence may carry a language tag; anything inside is untouched.
pub fn strip_code_fences(code: &str) -> String {
    let trimmed = code.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed.to_string();
    };
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    let body = match rest.split_once('\n') {
        Some((first, tail)) if is_lang_tag(first) => tail,
        _ => rest,
    };
    body.trim().to_string()
}

fn is_lang_tag(line: &str) -> bool {
    let t = line.trim();
    !t.is_empty() && t.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}
