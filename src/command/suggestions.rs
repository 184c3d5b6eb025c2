//! Ranked completion candidates for a partially typed token.

/// A single completion candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suggestion {
    /// Replacement text for the partial token.
    pub text: String,
}

/// The completed, ranked suggestion set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suggestions {
    /// The partial input the suggestions complete.
    pub partial: String,
    /// Candidates, prefix matches first, alphabetical within each group.
    pub entries: Vec<Suggestion>,
}

impl Suggestions {
    /// Whether no candidate matched.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Collects candidates during [`list_suggestions`] and ranks them on build.
///
/// [`list_suggestions`]: super::arguments::ArgumentType::list_suggestions
#[derive(Debug, Clone)]
pub struct SuggestionsBuilder {
    partial: String,
    entries: Vec<Suggestion>,
}

impl SuggestionsBuilder {
    /// Start collecting suggestions for `partial`.
    pub fn new(partial: impl Into<String>) -> Self {
        Self {
            partial: partial.into(),
            entries: Vec::new(),
        }
    }

    /// The partial input being completed.
    pub fn partial(&self) -> &str {
        &self.partial
    }

    /// Add a candidate. Duplicates are ignored.
    pub fn suggest(&mut self, text: impl Into<String>) -> &mut Self {
        let text = text.into();
        if !self.entries.iter().any(|s| s.text == text) {
            self.entries.push(Suggestion { text });
        }
        self
    }

    /// Rank and return the collected candidates: entries whose text starts
    /// with the partial input sort ahead of the rest, alphabetical within
    /// each group.
    pub fn build(self) -> Suggestions {
        let mut entries = self.entries;
        let partial = self.partial;
        entries.sort_by(|a, b| {
            let a_prefix = a.text.starts_with(&partial);
            let b_prefix = b.text.starts_with(&partial);
            b_prefix.cmp(&a_prefix).then_with(|| a.text.cmp(&b.text))
        });
        Suggestions { partial, entries }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_matches_rank_first() {
        let mut builder = SuggestionsBuilder::new("al");
        builder.suggest("bob").suggest("alice").suggest("albert");
        let suggestions = builder.build();
        let texts: Vec<&str> = suggestions.entries.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["albert", "alice", "bob"]);
    }

    #[test]
    fn duplicates_collapse() {
        let mut builder = SuggestionsBuilder::new("");
        builder.suggest("x").suggest("x");
        assert_eq!(builder.build().entries.len(), 1);
    }

    #[test]
    fn empty_builder_is_empty() {
        assert!(SuggestionsBuilder::new("q").build().is_empty());
    }
}
