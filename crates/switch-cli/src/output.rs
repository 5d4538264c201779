#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

/// Shorten to at most `max_len` characters, ending in `...` when cut
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_keeps_short_strings() {
        assert_eq!(truncate_string("Ciao", 10), "Ciao");
    }

    #[test]
    fn test_truncate_counts_characters() {
        assert_eq!(truncate_string("Sei un assistente è", 10), "Sei un ...");
        assert_eq!(truncate_string("èèèèèè", 5), "èè...");
    }
}
