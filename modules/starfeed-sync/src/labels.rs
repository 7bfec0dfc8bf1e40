//! Taxonomy matcher. A `Vocabulary` is an immutable snapshot of known
//! terms built once per batch job by scanning the catalog; `extract`
//! matches free text against it and `optimize` folds the matches back
//! into a catalog record, signalling no-ops so callers can skip
//! redundant store writes.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;
use tracing::info;

use gorse_client::GorseError;
use starfeed_common::{generate_categories, Item};

use crate::traits::CatalogStore;

static URL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"https?://\S+").unwrap());

const BLOCKLIST: &str = include_str!("blocklist.txt");
const STOPWORDS: &str = include_str!("stopwords.txt");

/// Catalog page size used when scanning labels.
const SCAN_PAGE_SIZE: usize = 1000;

pub struct Vocabulary {
    /// Sorted known terms, frequency-filtered and blocklist-free.
    terms: Vec<String>,
    blocklist: HashSet<String>,
    stopwords: HashSet<String>,
}

impl Vocabulary {
    /// Scan the whole catalog and keep every label that appears at least
    /// `min_freq` times and is not blocklisted.
    pub async fn build(store: &dyn CatalogStore, min_freq: usize) -> Result<Self, GorseError> {
        let mut counts: HashMap<String, usize> = HashMap::new();
        let mut cursor = String::new();
        loop {
            let (items, next) = store.items_page(SCAN_PAGE_SIZE, &cursor).await?;
            for item in items {
                for label in item.labels {
                    *counts.entry(label).or_default() += 1;
                }
            }
            if next.is_empty() {
                break;
            }
            cursor = next;
        }
        Ok(Self::from_counts(counts, min_freq))
    }

    /// Snapshot from precomputed label frequencies.
    pub fn from_counts(counts: HashMap<String, usize>, min_freq: usize) -> Self {
        let blocklist = parse_word_list(BLOCKLIST);
        let stopwords = parse_word_list(STOPWORDS);
        let mut terms: Vec<String> = counts
            .into_iter()
            .filter(|(term, count)| *count >= min_freq && !blocklist.contains(term.as_str()))
            .map(|(term, _)| term)
            .collect();
        terms.sort();
        info!(terms = terms.len(), "vocabulary snapshot ready");
        Self {
            terms,
            blocklist,
            stopwords,
        }
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    /// Match free text against the vocabulary. Single-word terms match by
    /// exact token; hyphenated terms match as a contiguous substring of
    /// the hyphen-joined token sequence.
    pub fn extract(&self, text: &str) -> BTreeSet<String> {
        if text.trim().is_empty() {
            return BTreeSet::new();
        }
        let mut tokens = tokenize(text);
        // Plural nouns also match their singular form; both remain
        // candidates.
        let singulars: Vec<String> = tokens
            .iter()
            .filter_map(|token| singularize(token))
            .collect();
        tokens.extend(singulars);
        let sentence = tokens.join("-");
        let token_set: HashSet<&str> = tokens.iter().map(String::as_str).collect();
        self.terms
            .iter()
            .filter(|term| {
                if term.contains('-') {
                    sentence.contains(term.as_str())
                } else {
                    token_set.contains(term.as_str())
                }
            })
            .cloned()
            .collect()
    }

    /// Fold extracted terms into the item's label set. Returns `None`
    /// when nothing would change — the no-op signal callers use to skip
    /// store writes.
    pub fn optimize(&self, item: &Item) -> Option<Item> {
        let comment = item.comment.as_deref()?;
        if comment.is_empty() {
            return None;
        }
        let cleaned = URL_RE.replace_all(comment, "");
        let extracted = self.extract(&cleaned);
        if extracted.is_empty() {
            return None;
        }
        let mut labels: BTreeSet<String> = extracted;
        labels.extend(item.labels.iter().cloned());
        labels.retain(|label| !self.stopwords.contains(label) && !self.blocklist.contains(label));
        let labels: Vec<String> = labels.into_iter().collect();
        let categories = generate_categories(&labels);
        if labels.len() == item.labels.len() && categories.len() == item.categories.len() {
            return None;
        }
        Some(Item {
            labels,
            categories,
            ..item.clone()
        })
    }
}

fn parse_word_list(raw: &str) -> HashSet<String> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

/// Lowercase word tokens. `+`, `#` and interior dots survive so terms
/// like `c++`, `c#` and `node.js` stay whole.
pub(crate) fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '+' || c == '#' || c == '.'))
        .map(|token| token.trim_matches('.').to_lowercase())
        .filter(|token| !token.is_empty())
        .collect()
}

/// Suffix-rule plural-to-singular conversion. Returns `None` when the
/// word has no distinct singular form.
pub(crate) fn singularize(word: &str) -> Option<String> {
    let irregular = match word {
        "children" => Some("child"),
        "people" => Some("person"),
        "men" => Some("man"),
        "women" => Some("woman"),
        "mice" => Some("mouse"),
        "geese" => Some("goose"),
        "feet" => Some("foot"),
        "teeth" => Some("tooth"),
        _ => None,
    };
    if let Some(singular) = irregular {
        return Some(singular.to_string());
    }
    if word.len() <= 3 {
        return None;
    }
    if let Some(stem) = word.strip_suffix("ies") {
        return Some(format!("{stem}y"));
    }
    for suffix in ["sses", "shes", "ches", "xes", "zes"] {
        if word.ends_with(suffix) {
            return Some(word[..word.len() - 2].to_string());
        }
    }
    if word.ends_with("ss") || word.ends_with("us") || word.ends_with("is") {
        return None;
    }
    if let Some(stem) = word.strip_suffix('s') {
        return Some(stem.to_string());
    }
    None
}
