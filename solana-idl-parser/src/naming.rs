//! Case normalization shared by discriminator derivation and schema naming.

/// Converts an IDL identifier to `snake_case`.
///
/// Word boundaries are lower→upper and digit→upper transitions, the end of an
/// acronym run (`URLPath` → `url_path`), and the separators ` `, `-`, `.`.
/// Existing underscores are preserved and never doubled.
#[must_use]
pub fn underscore(name: &str) -> String {
    let chars: Vec<char> = name.trim().chars().collect();
    let mut out = String::with_capacity(chars.len() + 4);

    for (i, &c) in chars.iter().enumerate() {
        if c == ' ' || c == '-' || c == '.' || c == '_' {
            if !out.is_empty() && !out.ends_with('_') {
                out.push('_');
            }
            continue;
        }

        if c.is_uppercase() && i > 0 && !out.is_empty() && !out.ends_with('_') {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            if prev.is_lowercase() || prev.is_ascii_digit() || (prev.is_uppercase() && next_is_lower)
            {
                out.push('_');
            }
        }

        out.extend(c.to_lowercase());
    }

    while out.ends_with('_') {
        out.pop();
    }
    out
}

/// Collapses a role or field name to a comparison key: lower-case with
/// separators removed, so `"Reply To"`, `"replyTo"` and `"reply_to"` agree.
#[must_use]
pub fn comparison_key(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}
