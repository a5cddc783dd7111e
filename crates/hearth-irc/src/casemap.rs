//! RFC 1459 case folding for nick and channel keys.
//!
//! Besides ASCII letters, `[]\~` fold to `{}|^`, so `Nick[m]` and `nick{m}`
//! address the same user.

/// Fold a single character.
#[inline]
pub const fn fold_char(c: char) -> char {
    match c {
        'A'..='Z' => c.to_ascii_lowercase(),
        '[' => '{',
        ']' => '}',
        '\\' => '|',
        '~' => '^',
        _ => c,
    }
}

/// Fold a nick or channel name into its lookup key.
pub fn fold(name: &str) -> String {
    name.chars().map(fold_char).collect()
}

/// Case-insensitive equality under RFC 1459 folding.
pub fn fold_eq(a: &str, b: &str) -> bool {
    a.len() == b.len() && a.chars().map(fold_char).eq(b.chars().map(fold_char))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folds_brackets_and_letters() {
        assert_eq!(fold("#HearthStone"), "#hearthstone");
        assert_eq!(fold("Bot[away]"), "bot{away}");
        assert_eq!(fold("a\\b~c"), "a|b^c");
    }

    #[test]
    fn fold_eq_matches_equivalent_names() {
        assert!(fold_eq("Nick[m]", "nick{M}"));
        assert!(!fold_eq("nick", "nick_"));
        assert!(!fold_eq("nick", "nock"));
    }

    #[test]
    fn non_ascii_is_left_alone() {
        assert_eq!(fold("Ünïcode"), "Ünïcode");
        assert_eq!(fold_char('É'), 'É');
    }
}
