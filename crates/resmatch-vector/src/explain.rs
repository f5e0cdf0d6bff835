//! Explanation service: a short prose note on why a candidate was ranked.
//!
//! The catalog never calls this. The pipeline invokes it once per result row
//! after ranking, with the query text and the candidate's raw text.

use std::collections::{HashMap, HashSet};

use resmatch_core::config::ExplainConfig;
use resmatch_core::error::MatchError;

use crate::tokens;

/// Produces a recruiter-facing explanation for one (query, candidate) pair.
pub trait ExplanationService: Send + Sync {
    fn explain(
        &self,
        query_text: &str,
        candidate_text: &str,
    ) -> impl std::future::Future<Output = Result<String, MatchError>> + Send;
}

/// Object-safe companion of [`ExplanationService`].
pub trait DynExplanationService: Send + Sync {
    fn explain_boxed<'a>(
        &'a self,
        query_text: &'a str,
        candidate_text: &'a str,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<String, MatchError>> + Send + 'a>>;
}

impl<T: ExplanationService> DynExplanationService for T {
    fn explain_boxed<'a>(
        &'a self,
        query_text: &'a str,
        candidate_text: &'a str,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<String, MatchError>> + Send + 'a>> {
        Box::pin(self.explain(query_text, candidate_text))
    }
}

/// Keyword-overlap explainer.
///
/// Answers the three questions a recruiter asks of a match: why it matched,
/// which skills overlap, and which are missing. Job keywords are ranked by
/// frequency in the job text, then by first appearance.
#[derive(Debug, Clone)]
pub struct KeywordExplainer {
    max_candidate_chars: usize,
    max_keywords: usize,
}

impl KeywordExplainer {
    pub fn new(max_candidate_chars: usize, max_keywords: usize) -> Self {
        Self {
            max_candidate_chars,
            max_keywords: max_keywords.max(1),
        }
    }

    pub fn from_config(config: &ExplainConfig) -> Self {
        Self::new(config.max_candidate_chars, config.max_keywords)
    }

    fn compose(&self, query_text: &str, candidate_text: &str) -> Result<String, MatchError> {
        let job_terms = ranked_keywords(query_text);
        if job_terms.is_empty() {
            return Err(MatchError::Explanation(
                "Job description has no keywords to compare".to_string(),
            ));
        }

        let candidate = truncate_chars(candidate_text, self.max_candidate_chars);
        let candidate_terms: HashSet<String> = tokens::keywords(candidate).collect();

        let (overlap, missing): (Vec<&String>, Vec<&String>) = job_terms
            .iter()
            .partition(|t| candidate_terms.contains(t.as_str()));

        let share = overlap.len() as f64 / job_terms.len() as f64 * 100.0;
        let why = if overlap.is_empty() {
            "The resume shares no keywords with the job description; the ranking comes from \
             general wording only."
                .to_string()
        } else {
            format!(
                "The resume covers {} of {} job keywords ({:.0}%), led by {}.",
                overlap.len(),
                job_terms.len(),
                share,
                join(&overlap, 3)
            )
        };

        let overlapping = if overlap.is_empty() {
            "None.".to_string()
        } else {
            format!("{}.", join(&overlap, self.max_keywords))
        };
        let weaker = if missing.is_empty() {
            "None identified.".to_string()
        } else {
            format!("{}.", join(&missing, self.max_keywords))
        };

        Ok(format!(
            "1. Why this candidate matches: {}\n2. Key overlapping skills: {}\n3. Missing or weaker skills: {}",
            why, overlapping, weaker
        ))
    }
}

impl Default for KeywordExplainer {
    fn default() -> Self {
        Self::from_config(&ExplainConfig::default())
    }
}

impl ExplanationService for KeywordExplainer {
    async fn explain(&self, query_text: &str, candidate_text: &str) -> Result<String, MatchError> {
        self.compose(query_text, candidate_text)
    }
}

/// Unique keywords of `text`, most frequent first, ties by first appearance.
fn ranked_keywords(text: &str) -> Vec<String> {
    let mut counts: HashMap<String, (usize, usize)> = HashMap::new();
    for (pos, word) in tokens::keywords(text).enumerate() {
        counts.entry(word).or_insert((0, pos)).0 += 1;
    }
    let mut ranked: Vec<(String, (usize, usize))> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1 .0.cmp(&a.1 .0).then(a.1 .1.cmp(&b.1 .1)));
    ranked.into_iter().map(|(w, _)| w).collect()
}

fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

fn join(words: &[&String], limit: usize) -> String {
    words
        .iter()
        .take(limit)
        .map(|w| w.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const JOB: &str = "Backend engineer: Rust, Rust async, PostgreSQL, Kubernetes and Terraform.";

    #[tokio::test]
    async fn test_explanation_has_three_sections() {
        let explainer = KeywordExplainer::default();
        let text = explainer
            .explain(JOB, "Five years of Rust and PostgreSQL in production.")
            .await
            .unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("1. Why this candidate matches:"));
        assert!(lines[1].starts_with("2. Key overlapping skills:"));
        assert!(lines[2].starts_with("3. Missing or weaker skills:"));
    }

    #[tokio::test]
    async fn test_overlap_and_missing_keywords() {
        let explainer = KeywordExplainer::default();
        let text = explainer
            .explain(JOB, "Rust developer, PostgreSQL tuning.")
            .await
            .unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].contains("led by rust"));
        assert!(lines[1].contains("rust"));
        assert!(lines[1].contains("postgresql"));
        assert!(lines[2].contains("kubernetes"));
        assert!(lines[2].contains("terraform"));
        assert!(!lines[2].contains("rust"));
    }

    #[tokio::test]
    async fn test_no_overlap() {
        let explainer = KeywordExplainer::default();
        let text = explainer
            .explain(JOB, "Pastry chef, laminated doughs.")
            .await
            .unwrap();
        assert!(text.contains("shares no keywords"));
        assert!(text.contains("2. Key overlapping skills: None."));
    }

    #[tokio::test]
    async fn test_full_overlap() {
        let explainer = KeywordExplainer::default();
        let text = explainer.explain("Rust Kubernetes", "kubernetes, rust").await.unwrap();
        assert!(text.contains("2 of 2 job keywords (100%)"));
        assert!(text.ends_with("None identified."));
    }

    #[tokio::test]
    async fn test_candidate_text_is_truncated() {
        let explainer = KeywordExplainer::new(20, 8);
        let candidate = format!("{} kubernetes", "x".repeat(40));
        let text = explainer.explain("Kubernetes", &candidate).await.unwrap();
        assert!(text.contains("shares no keywords"));
    }

    #[tokio::test]
    async fn test_keyword_limit() {
        let explainer = KeywordExplainer::new(1500, 2);
        let text = explainer
            .explain("alpha beta gamma delta", "nothing relevant")
            .await
            .unwrap();
        assert!(text.ends_with("3. Missing or weaker skills: alpha, beta."));
    }

    #[tokio::test]
    async fn test_job_without_keywords_is_an_error() {
        let explainer = KeywordExplainer::default();
        assert!(matches!(
            explainer.explain("the and of", "rust").await,
            Err(MatchError::Explanation(_))
        ));
    }

    #[test]
    fn test_ranked_keywords_by_frequency_then_position() {
        let ranked = ranked_keywords("go rust python rust python rust");
        assert_eq!(ranked, vec!["rust", "python", "go"]);
    }

    #[test]
    fn test_truncate_chars_on_multibyte() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }
}
