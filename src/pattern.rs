//! Translates SQL `LIKE`/`ILIKE` patterns into anchored regex source:
//! `%`→`.*`, `_`→`.`, escape all other regex metacharacters, anchor `^…$`.

/// Translate a `LIKE` pattern into regex source, anchored at both ends.
pub fn like_to_regex(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() * 2 + 2);
    out.push('^');
    for c in pattern.chars() {
        match c {
            '%' => out.push_str(".*"),
            '_' => out.push('.'),
            _ => {
                if is_regex_metachar(c) {
                    out.push('\\');
                }
                out.push(c);
            }
        }
    }
    out.push('$');
    out
}

fn is_regex_metachar(c: char) -> bool {
    matches!(
        c,
        '.' | '^'
            | '$'
            | '*'
            | '+'
            | '?'
            | '('
            | ')'
            | '['
            | ']'
            | '{'
            | '}'
            | '|'
            | '\\'
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::RegexBuilder;

    fn compiles(src: &str, case_insensitive: bool) -> regex::Regex {
        RegexBuilder::new(src)
            .case_insensitive(case_insensitive)
            .build()
            .unwrap()
    }

    #[test]
    fn percent_and_underscore() {
        let re = compiles(&like_to_regex("a%b"), false);
        assert!(re.is_match("ab"));
        assert!(re.is_match("axxxb"));
        assert!(!re.is_match("xab"));
        assert!(!re.is_match("abx"));

        let re = compiles(&like_to_regex("a_b"), false);
        assert!(re.is_match("axb"));
        assert!(!re.is_match("ab"));
        assert!(!re.is_match("axxb"));
    }

    #[test]
    fn escapes_metacharacters() {
        let re = compiles(&like_to_regex("a.b(c)"), false);
        assert!(re.is_match("a.b(c)"));
        assert!(!re.is_match("axb(c)"));
    }

    #[test]
    fn case_insensitive_matches_readme_prefix() {
        let re = compiles(&like_to_regex("README%"), true);
        assert!(re.is_match("readme.txt"));
        assert!(re.is_match("README.md"));
        assert!(!re.is_match("notes.txt"));
    }
}
