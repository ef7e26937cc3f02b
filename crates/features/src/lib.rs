//! Tokenization and compound splitting for dealer domains.
//!
//! Provides pure functions used before any rule fires:
//! - Domain cleanup (scheme, `www.`, suffixes)
//! - Word splitting on separators and camel-case boundaries
//! - Compound splitting of unseparated blobs using lexicon anchors
//! - Display casing

use dealername_lexicon::Lexicon;

/// Suffixes removed from the end of a domain, longest first.
const DOMAIN_SUFFIXES: [&str; 6] = [".co.uk", ".com", ".net", ".org", ".biz", ".us"];

/// Tokens shorter than this are never treated as blobs.
const MIN_BLOB_LEN: usize = 6;

/// Unknown tokens at least this long are assumed to still be concatenations.
const UNSPLIT_BLOB_LEN: usize = 9;

/// Minimum length of each half in a vowel-boundary split.
const MIN_VOWEL_SPLIT_PART: usize = 3;

/// Output of `tokenize`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenStream {
    /// Lowercase tokens in input order
    pub tokens: Vec<String>,
    /// A compound split was tried on at least one token
    pub blob_split_attempted: bool,
    /// Tokens that still look like concatenations after splitting
    pub unsplit_blobs: Vec<String>,
}

impl TokenStream {
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// Remove scheme, path, `www.` and a known domain suffix, preserving case.
pub fn strip_domain(input: &str) -> String {
    let trimmed = input.trim();
    let rest = ["https://", "http://"]
        .iter()
        .find_map(|scheme| strip_prefix_ignore_case(trimmed, scheme))
        .unwrap_or(trimmed);

    let end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    let mut host = &rest[..end];
    if let Some(port) = host.find(':') {
        host = &host[..port];
    }
    let host = strip_prefix_ignore_case(host, "www.").unwrap_or(host);
    let host = host.trim_end_matches('.');

    let host = DOMAIN_SUFFIXES
        .iter()
        .find_map(|suffix| strip_suffix_ignore_case(host, suffix))
        .unwrap_or(host);
    host.trim_matches('.').to_string()
}

fn strip_prefix_ignore_case<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    text.get(..prefix.len())
        .filter(|head| head.eq_ignore_ascii_case(prefix))
        .map(|_| &text[prefix.len()..])
}

fn strip_suffix_ignore_case<'a>(text: &'a str, suffix: &str) -> Option<&'a str> {
    let at = text.len().checked_sub(suffix.len())?;
    text.get(at..)
        .filter(|tail| tail.eq_ignore_ascii_case(suffix))
        .map(|_| &text[..at])
}

/// Split on separators and lower-to-upper camel-case transitions, then
/// lowercase. Apostrophes are dropped without splitting ("Bob's" -> "bobs").
pub fn split_words(input: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;

    for c in input.chars() {
        if c == '\'' || c == '\u{2019}' {
            continue;
        }
        if !c.is_alphanumeric() {
            flush(&mut current, &mut words);
            prev_lower = false;
            continue;
        }
        if c.is_uppercase() && prev_lower {
            flush(&mut current, &mut words);
        }
        prev_lower = c.is_lowercase() || c.is_ascii_digit();
        current.extend(c.to_lowercase());
    }
    flush(&mut current, &mut words);
    words
}

fn flush(current: &mut String, words: &mut Vec<String>) {
    if !current.is_empty() {
        words.push(std::mem::take(current));
    }
}

/// Tokenize a domain or free text into lowercase words, splitting blobs.
///
/// Empty input yields an empty stream.
pub fn tokenize(input: &str, lexicon: &Lexicon) -> TokenStream {
    let words = split_words(&strip_domain(input));
    let whole_input_is_blob = words.len() == 1;
    let mut stream = TokenStream::default();

    for word in words {
        if !is_blob_candidate(&word, lexicon) {
            stream.tokens.push(word);
            continue;
        }

        stream.blob_split_attempted = true;
        let parts = split_on_anchors(&word, lexicon).or_else(|| {
            if whole_input_is_blob {
                split_on_vowel_boundary(&word)
            } else {
                None
            }
        });

        match parts {
            Some(parts) if parts.len() > 1 => {
                tracing::debug!(blob = %word, parts = ?parts, "Split compound token");
                stream.tokens.extend(parts);
            }
            _ => {
                tracing::debug!(blob = %word, "Compound split found no boundary");
                stream.tokens.push(word);
            }
        }
    }

    stream.unsplit_blobs = stream
        .tokens
        .iter()
        .filter(|t| t.len() >= UNSPLIT_BLOB_LEN && !lexicon.is_known_word(t))
        .cloned()
        .collect();
    stream
}

/// Normalize caller-supplied tokens the same way domain words are.
pub fn normalize_tokens(tokens: &[String]) -> Vec<String> {
    tokens.iter().flat_map(|t| split_words(t)).collect()
}

fn is_blob_candidate(word: &str, lexicon: &Lexicon) -> bool {
    word.len() >= MIN_BLOB_LEN
        && word.chars().all(|c| c.is_ascii_lowercase())
        && !lexicon.is_known_word(word)
}

/// Insert word boundaries around every lexicon anchor found in `blob`.
///
/// Anchors are tried longest first and never overlap. Gaps between anchors
/// are kept as their own tokens, split into a first/last name pair when
/// possible. Returns `None` when no anchor occurs in the blob.
pub fn split_on_anchors(blob: &str, lexicon: &Lexicon) -> Option<Vec<String>> {
    if !blob.is_ascii() {
        return None;
    }

    let mut taken = vec![false; blob.len()];
    let mut matches: Vec<(usize, usize, &[String])> = Vec::new();

    for anchor in lexicon.anchors() {
        if anchor.text.len() > blob.len() {
            continue;
        }
        for (start, _) in blob.match_indices(anchor.text.as_str()) {
            let end = start + anchor.text.len();
            if taken[start..end].iter().any(|t| *t) {
                continue;
            }
            taken[start..end].iter_mut().for_each(|t| *t = true);
            matches.push((start, end, anchor.words.as_slice()));
        }
    }

    if matches.is_empty() {
        return None;
    }
    matches.sort_by_key(|(start, _, _)| *start);

    let mut parts = Vec::new();
    let mut cursor = 0;
    for (start, end, words) in matches {
        if start > cursor {
            push_gap(&blob[cursor..start], lexicon, &mut parts);
        }
        parts.extend(words.iter().cloned());
        cursor = end;
    }
    if cursor < blob.len() {
        push_gap(&blob[cursor..], lexicon, &mut parts);
    }
    Some(parts)
}

fn push_gap(gap: &str, lexicon: &Lexicon, parts: &mut Vec<String>) {
    // A lone letter is almost always a possessive "s" or a typo.
    if gap.len() < 2 {
        return;
    }
    match split_name_pair(gap, lexicon) {
        Some((first, last)) => {
            parts.push(first);
            parts.push(last);
        }
        None => parts.push(gap.to_string()),
    }
}

/// Split a gap such as "rodbaker" into a known first and last name.
pub fn split_name_pair(gap: &str, lexicon: &Lexicon) -> Option<(String, String)> {
    if !gap.is_ascii() || gap.len() < 4 || lexicon.is_known_word(gap) {
        return None;
    }

    let candidates = || (2..=gap.len() - 2).map(|i| (&gap[..i], &gap[i..]));

    candidates()
        .find(|(first, last)| lexicon.is_first_name(first) && lexicon.is_last_name(last))
        .or_else(|| {
            candidates().find(|(first, last)| {
                lexicon.is_person_name(first) && lexicon.is_person_name(last)
            })
        })
        .map(|(first, last)| (first.to_string(), last.to_string()))
}

/// Last-resort split at the vowel-to-consonant boundary nearest the middle.
///
/// Best effort only; junk halves are expected to fail validation later.
pub fn split_on_vowel_boundary(blob: &str) -> Option<Vec<String>> {
    let chars: Vec<char> = blob.chars().collect();
    let len = chars.len();
    if len < MIN_VOWEL_SPLIT_PART * 2 + 2 {
        return None;
    }

    let middle = len / 2;
    (MIN_VOWEL_SPLIT_PART..=len - MIN_VOWEL_SPLIT_PART)
        .filter(|&i| is_vowel(chars[i - 1]) && !is_vowel(chars[i]))
        .min_by_key(|&i| i.abs_diff(middle))
        .map(|i| {
            vec![
                chars[..i].iter().collect::<String>(),
                chars[i..].iter().collect::<String>(),
            ]
        })
}

fn is_vowel(c: char) -> bool {
    matches!(c, 'a' | 'e' | 'i' | 'o' | 'u' | 'y')
}

/// Display casing for a lowercase word ("mcgrath" -> "McGrath").
pub fn capitalize(word: &str) -> String {
    let lower = word.to_lowercase();
    if lower.len() > 3 && lower.starts_with("mc") {
        return format!("Mc{}", upper_first(&lower[2..]));
    }
    upper_first(&lower)
}

fn upper_first(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
