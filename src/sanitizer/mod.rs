// Response sanitization: strips the chat model's leaked internal
// reasoning, locates the start of the actual answer, and normalizes
// units and coordinates for display. Total and deterministic: a failure
// at any step degrades to the least-processed text available.


use fancy_regex::Regex;
use tracing::warn;

use crate::config::SanitizerConfig;

pub struct Sanitizer {
    reasoning: Vec<Regex>,
    markers: Vec<Regex>,
    unit_rules: Vec<(Regex, &'static str)>,
    coordinate_rules: Vec<(Regex, &'static str)>,
    collapse_newlines: Option<Regex>,
    min_answer_chars: usize,
}

/// Canonical unit spellings. Patterns are tried in order, so longhand
/// forms are normalized before their abbreviations.
const UNIT_RULES: [(&str, &str); 6] = [
    (r"(\d+(?:\.\d+)?)\s*°C", "${1}°C"),
    (r"(\d+(?:\.\d+)?)\s*PSU", "${1} PSU"),
    (r"(\d+(?:\.\d+)?)\s*meters?\b", "${1} meters"),
    (r"(\d+(?:\.\d+)?)\s*m\b", "${1} meters"),
    (r"(\d+(?:\.\d+)?)\s*decibars?\b", "${1} decibars"),
    (r"(\d+(?:\.\d+)?)\s*db\b", "${1} decibars"),
];

/// Coordinate rewrites. Hemisphere-worded phrases first, then bare
/// negative values; the lookaheads keep already-rewritten coordinates
/// from gaining a second hemisphere suffix.
const COORDINATE_RULES: [(&str, &str); 6] = [
    (
        r"Latitude:\s*(-?\d+(?:\.\d+)?)[^\n]*?\(South\)",
        "Latitude: ${1}° S",
    ),
    (
        r"Latitude:\s*(-?\d+(?:\.\d+)?)[^\n]*?\(North\)",
        "Latitude: ${1}° N",
    ),
    (
        r"Longitude:\s*(-?\d+(?:\.\d+)?)[^\n]*?\(East\)",
        "Longitude: ${1}° E",
    ),
    (
        r"Longitude:\s*(-?\d+(?:\.\d+)?)[^\n]*?\(West\)",
        "Longitude: ${1}° W",
    ),
    (
        r"Latitude:\s*(-\d+(?:\.\d+)?)°(?!\s*[NS])",
        "Latitude: ${1}° S",
    ),
    (
        r"Longitude:\s*(-\d+(?:\.\d+)?)°(?!\s*[EW])",
        "Longitude: ${1}° W",
    ),
];

impl Sanitizer {
    /// Compile the configured pattern lists. An invalid pattern is skipped
    /// with a warning rather than failing construction: sanitization must
    /// always be available.
    #[inline]
    pub fn new(config: &SanitizerConfig) -> Self {
        Self {
            reasoning: compile_patterns(&config.reasoning_patterns, "reasoning-removal"),
            markers: compile_patterns(&config.answer_markers, "answer-marker"),
            unit_rules: compile_rules(&UNIT_RULES, "unit"),
            coordinate_rules: compile_rules(&COORDINATE_RULES, "coordinate"),
            collapse_newlines: compile_single(r"\n{3,}", "blank-line collapse"),
            min_answer_chars: config.min_answer_chars,
        }
    }

    /// Clean one raw model response. Pure function of `(query, raw)`.
    #[inline]
    pub fn sanitize(&self, query: &str, raw: &str) -> String {
        let stripped = self.strip_reasoning(raw);
        let collapsed = self.collapse(&stripped);
        let located = self.locate_answer(&collapsed);
        let reformatted = self.reformat(located);
        let cleaned = reformatted.trim().to_string();

        if cleaned.chars().count() < self.min_answer_chars {
            // Never show the user an empty or near-empty reply
            format!("I found limited information for your query: '{query}'. {cleaned}")
        } else {
            cleaned
        }
    }

    /// Apply every reasoning-removal pattern globally, in priority order.
    fn strip_reasoning(&self, text: &str) -> String {
        let mut cleaned = text.to_string();
        for pattern in &self.reasoning {
            cleaned = pattern.replace_all(&cleaned, "").into_owned();
        }
        cleaned
    }

    /// Collapse runs of 3+ newlines down to a single blank line and trim
    /// the ends.
    fn collapse(&self, text: &str) -> String {
        let collapsed = match &self.collapse_newlines {
            Some(re) => re.replace_all(text, "\n\n").into_owned(),
            None => text.to_string(),
        };
        collapsed.trim().to_string()
    }

    /// Discard everything before the first answer-start marker. Markers
    /// are tried in priority order; the first that matches anywhere wins.
    fn locate_answer<'a>(&self, text: &'a str) -> &'a str {
        for marker in &self.markers {
            if let Ok(Some(found)) = marker.find(text) {
                return &text[found.start()..];
            }
        }
        text
    }

    fn reformat(&self, text: &str) -> String {
        let mut formatted = text.to_string();
        for (pattern, replacement) in self.unit_rules.iter().chain(&self.coordinate_rules) {
            formatted = pattern.replace_all(&formatted, *replacement).into_owned();
        }
        formatted
    }
}

fn compile_patterns(patterns: &[String], kind: &str) -> Vec<Regex> {
    patterns
        .iter()
        .filter_map(|pattern| match Regex::new(pattern) {
            Ok(re) => Some(re),
            Err(e) => {
                warn!("Skipping invalid {kind} pattern {pattern:?}: {e}");
                None
            }
        })
        .collect()
}

fn compile_rules(
    rules: &[(&'static str, &'static str)],
    kind: &str,
) -> Vec<(Regex, &'static str)> {
    rules
        .iter()
        .filter_map(|(pattern, replacement)| match Regex::new(pattern) {
            Ok(re) => Some((re, *replacement)),
            Err(e) => {
                warn!("Skipping invalid {kind} rule {pattern:?}: {e}");
                None
            }
        })
        .collect()
}

fn compile_single(pattern: &str, kind: &str) -> Option<Regex> {
    match Regex::new(pattern) {
        Ok(re) => Some(re),
        Err(e) => {
            warn!("Skipping invalid {kind} pattern {pattern:?}: {e}");
            None
        }
    }
}
