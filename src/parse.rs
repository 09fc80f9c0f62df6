//! Free-text identifier parsing
//!
//! Callers paste identifier lists in several shapes: comma- or
//! newline-separated, whitespace-separated, or run-together article codes
//! (`1234EA5678EA`). This module normalizes all of them into an ordered
//! identifier list and reports duplicates without removing them; the
//! submission path applies the authoritative first-occurrence-wins dedup.

use std::collections::HashSet;

/// Outcome of parsing a raw identifier submission
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedIdentifiers {
    /// All identifiers in input order, trimmed, empties dropped
    pub identifiers: Vec<String>,
    /// Number of repeat occurrences (total - distinct)
    pub duplicate_count: usize,
    /// The repeat occurrences themselves, in input order
    pub duplicates: Vec<String>,
    /// Whether the input looked like article codes (`<digits>EA`)
    pub contains_article_codes: bool,
}

/// Parse a raw text submission into individual identifiers
pub fn parse_identifiers(raw: &str) -> ParsedIdentifiers {
    let mut contains_article_codes = raw.contains("EA");

    let input = if contains_article_codes {
        split_article_code_runs(raw)
    } else {
        raw.to_string()
    };

    let terms: Vec<String> = if input.contains(',') || input.contains('\n') {
        input.split([',', '\n']).map(str::to_string).collect()
    } else {
        let codes: Vec<String> = input
            .split_whitespace()
            .filter(|t| is_article_code(t))
            .map(str::to_string)
            .collect();

        if !codes.is_empty() {
            contains_article_codes = true;
            codes
        } else if input.len() > 50 && input.contains(' ') {
            input.split_whitespace().map(str::to_string).collect()
        } else {
            vec![input.clone()]
        }
    };

    let identifiers: Vec<String> = terms
        .iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();

    let mut seen = HashSet::new();
    let mut duplicates = Vec::new();
    for term in &identifiers {
        if !seen.insert(term.clone()) {
            duplicates.push(term.clone());
        }
    }

    ParsedIdentifiers {
        duplicate_count: duplicates.len(),
        duplicates,
        identifiers,
        contains_article_codes,
    }
}

/// Insert a separator after each `<digits>EA` run so that pasted codes
/// without separators ("1234EA5678EA") split into individual codes.
fn split_article_code_runs(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len() + 8);
    let mut i = 0;

    while i < chars.len() {
        if chars[i].is_ascii_digit() {
            let start = i;
            while i < chars.len() && chars[i].is_ascii_digit() {
                i += 1;
            }
            let digits: String = chars[start..i].iter().collect();
            if chars.get(i) == Some(&'E') && chars.get(i + 1) == Some(&'A') {
                out.push_str(&digits);
                out.push_str("EA ");
                i += 2;
            } else {
                out.push_str(&digits);
            }
        } else {
            out.push(chars[i]);
            i += 1;
        }
    }

    out
}

/// A token consisting of one or more digits followed by `EA`
fn is_article_code(token: &str) -> bool {
    token
        .strip_suffix("EA")
        .map(|prefix| !prefix.is_empty() && prefix.chars().all(|c| c.is_ascii_digit()))
        .unwrap_or(false)
}
