//! Token classification against the lexicon.

use dealername_features::capitalize;
use dealername_lexicon::Lexicon;

/// Longest multi-word phrase (e.g. "salt lake city") matched as one segment.
const MAX_PHRASE_WORDS: usize = 3;

/// One or more adjacent tokens with everything the lexicon knows about them.
///
/// A segment can carry several classifications at once ("jackson" is both a
/// city and a last name); each rule asks only for what it needs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Segment {
    /// Lowercase source words
    pub words: Vec<String>,
    /// Canonical brand when the segment is a brand alias
    pub brand: Option<String>,
    pub city: bool,
    pub proper_noun: bool,
    pub first_name: bool,
    pub last_name: bool,
    pub generic: bool,
    pub region: bool,
    pub prefix: bool,
    pub short_alias: bool,
}

impl Segment {
    fn from_words(words: Vec<String>, lexicon: &Lexicon) -> Self {
        let text = words.join(" ");
        Self {
            brand: lexicon.canonical_brand(&text).map(str::to_string),
            city: lexicon.is_city(&text),
            proper_noun: lexicon.is_proper_noun(&text),
            first_name: lexicon.is_first_name(&text),
            last_name: lexicon.is_last_name(&text),
            generic: lexicon.is_generic(&text),
            region: lexicon.is_region(&text),
            prefix: lexicon.is_prefix(&text),
            short_alias: lexicon.is_short_alias(&text),
            words,
        }
    }

    pub fn text(&self) -> String {
        self.words.join(" ")
    }

    /// Presentable form: canonical label for brands, capitalized otherwise.
    pub fn display(&self) -> String {
        match &self.brand {
            Some(canonical) => canonical.clone(),
            None => self
                .words
                .iter()
                .map(|w| capitalize(w))
                .collect::<Vec<_>>()
                .join(" "),
        }
    }

    pub fn is_brand(&self) -> bool {
        self.brand.is_some()
    }

    /// Generic filler that may be dropped. Proper-noun membership wins.
    pub fn is_strippable(&self) -> bool {
        self.generic && !self.proper_noun && !self.is_brand() && !self.city
    }

    /// Carries an identity of its own (owner name or known proper noun).
    pub fn has_identity(&self) -> bool {
        self.proper_noun || self.first_name || self.last_name
    }

    /// Candidate half of a first/last or proper-noun pair.
    pub fn is_name_like(&self) -> bool {
        self.has_identity() && !self.is_brand()
    }

    pub fn is_bare_city(&self) -> bool {
        self.city && !self.proper_noun && !self.last_name && !self.is_brand()
    }
}

/// Group tokens into segments, preferring the longest known phrase.
pub fn classify(tokens: &[String], lexicon: &Lexicon) -> Vec<Segment> {
    let mut segments = Vec::with_capacity(tokens.len());
    let mut i = 0;

    while i < tokens.len() {
        let phrase_len = (2..=MAX_PHRASE_WORDS.min(tokens.len() - i))
            .rev()
            .find(|&len| {
                let phrase = tokens[i..i + len].join(" ");
                lexicon.is_city(&phrase) || lexicon.is_proper_noun(&phrase) || lexicon.is_brand(&phrase)
            })
            .unwrap_or(1);

        segments.push(Segment::from_words(tokens[i..i + phrase_len].to_vec(), lexicon));
        i += phrase_len;
    }
    segments
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn words(input: &[&str]) -> Vec<String> {
        input.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_classify_multiword_city() {
        let lex = Lexicon::builtin().unwrap();
        let segments = classify(&words(&["salt", "lake", "city", "honda"]), &lex);
        assert_eq!(segments.len(), 2);
        assert!(segments[0].city);
        assert_eq!(segments[0].display(), "Salt Lake City");
        assert_eq!(segments[1].brand.as_deref(), Some("Honda"));
    }

    #[test]
    fn test_segment_tags() {
        let lex = Lexicon::builtin().unwrap();
        let segments = classify(&words(&["jackson", "chevy", "of", "north", "vw"]), &lex);
        assert!(segments[0].city && segments[0].last_name);
        assert!(!segments[0].is_bare_city());
        assert_eq!(segments[1].display(), "Chevrolet");
        assert!(segments[2].is_strippable());
        assert!(segments[3].region);
        assert!(segments[4].short_alias);
    }
}
