//! Command-line scanning.
//!
//! Switches are whitespace separated and may start with `-` or `/`.
//! Matching is ASCII case-insensitive, so `-LLM`, `-llm` and `/Llm` are the
//! same switch. A switch only matches as a whole token: `-llmcsv` does not
//! contain `-llm`.

fn switches(cmdline: &str) -> impl Iterator<Item = &str> {
    cmdline
        .split_whitespace()
        .filter_map(|token| token.strip_prefix('-').or_else(|| token.strip_prefix('/')))
}

/// Check whether `name` is present as a bare switch.
pub fn has_param(cmdline: &str, name: &str) -> bool {
    switches(cmdline).any(|switch| switch.eq_ignore_ascii_case(name))
}

/// Get the value of a `key=value` token.
///
/// The leading switch character is optional. Surrounding quotes are removed.
pub fn param_value<'a>(cmdline: &'a str, key: &str) -> Option<&'a str> {
    cmdline.split_whitespace().find_map(|token| {
        let token = token
            .strip_prefix('-')
            .or_else(|| token.strip_prefix('/'))
            .unwrap_or(token);
        let (name, value) = token.split_once('=')?;
        name.eq_ignore_ascii_case(key)
            .then(|| value.trim_matches('"'))
    })
}

/// Split a comma separated list, skipping empty items.
pub fn split_list(value: &str) -> impl Iterator<Item = &str> {
    value.split(',').map(str::trim).filter(|item| !item.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_param_whole_token() {
        assert!(has_param("game.exe -llm -windowed", "LLM"));
        assert!(has_param("game.exe /LLM", "llm"));
        assert!(!has_param("game.exe -llmcsv", "llm"));
        assert!(!has_param("game.exe llm", "llm"));
    }

    #[test]
    fn test_param_value() {
        let cmd = "game.exe -llm -LLMTAGSETS=Assets,AssetClasses -log";
        assert_eq!(param_value(cmd, "llmtagsets"), Some("Assets,AssetClasses"));
        assert_eq!(param_value("x LLMTAGSETS=\"Assets\"", "LLMTAGSETS"), Some("Assets"));
        assert_eq!(param_value(cmd, "missing"), None);
    }

    #[test]
    fn test_split_list() {
        let items: Vec<_> = split_list("Assets,, AssetClasses ,").collect();
        assert_eq!(items, vec!["Assets", "AssetClasses"]);
    }
}
