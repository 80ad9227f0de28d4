use std::collections::HashMap;

use crate::scoring::{by_lexical_then_vector_rank, Scored};

/// Lower-cases and splits on whitespace. Punctuation stays attached.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace().map(str::to_lowercase).collect()
}

/// Okapi BM25 scored over the candidate set alone: document frequencies and
/// average length come from the candidates, not the whole index.
#[derive(Debug, Clone, Copy)]
pub struct Bm25Reranker {
    pub k1: f32,
    pub b: f32,
}

impl Default for Bm25Reranker {
    fn default() -> Self {
        Self { k1: 1.5, b: 0.75 }
    }
}

impl Bm25Reranker {
    pub const fn new(k1: f32, b: f32) -> Self {
        Self { k1, b }
    }

    /// Scores each document against the query, in input order.
    pub fn score_all<S: AsRef<str>>(&self, query: &str, documents: &[S]) -> Vec<f32> {
        let query_terms = tokenize(query);
        let docs: Vec<Vec<String>> = documents.iter().map(|d| tokenize(d.as_ref())).collect();

        if docs.is_empty() {
            return Vec::new();
        }

        let n = docs.len() as f32;
        let avg_len = docs.iter().map(Vec::len).sum::<usize>() as f32 / n;

        let mut doc_freq: HashMap<&str, usize> = HashMap::new();
        for doc in &docs {
            let mut seen: Vec<&str> = doc.iter().map(String::as_str).collect();
            seen.sort_unstable();
            seen.dedup();
            for term in seen {
                *doc_freq.entry(term).or_default() += 1;
            }
        }

        docs.iter()
            .map(|doc| {
                let mut term_freq: HashMap<&str, usize> = HashMap::new();
                for term in doc {
                    *term_freq.entry(term.as_str()).or_default() += 1;
                }
                let len = doc.len() as f32;
                let length_norm = if avg_len > 0.0 {
                    1.0 - self.b + self.b * len / avg_len
                } else {
                    1.0
                };

                query_terms
                    .iter()
                    .map(|term| {
                        let tf = term_freq.get(term.as_str()).copied().unwrap_or(0) as f32;
                        if tf == 0.0 {
                            return 0.0;
                        }
                        let df = doc_freq.get(term.as_str()).copied().unwrap_or(0) as f32;
                        let idf = ((n - df + 0.5) / (df + 0.5) + 1.0).ln();
                        idf * (tf * (self.k1 + 1.0)) / (tf + self.k1 * length_norm)
                    })
                    .sum()
            })
            .collect()
    }

    /// Attaches lexical scores and sorts best-first. Ties keep vector order.
    pub fn rerank<T, F>(&self, query: &str, candidates: Vec<Scored<T>>, text_of: F) -> Vec<Scored<T>>
    where
        F: Fn(&T) -> &str,
    {
        let texts: Vec<&str> = candidates.iter().map(|c| text_of(&c.item)).collect();
        let scores = self.score_all(query, &texts);

        let mut reranked: Vec<Scored<T>> = candidates
            .into_iter()
            .zip(scores)
            .map(|(candidate, score)| candidate.with_lexical_score(score))
            .collect();
        reranked.sort_by(by_lexical_then_vector_rank);
        reranked
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_is_lowercase_whitespace_only() {
        assert_eq!(
            tokenize("  The Cell,  divides\tFAST "),
            vec!["the", "cell,", "divides", "fast"]
        );
    }

    #[test]
    fn matching_document_outscores_others() {
        let reranker = Bm25Reranker::default();
        let docs = [
            "mitochondria produce energy for the cell",
            "the french revolution began in 1789",
            "photosynthesis happens in chloroplasts",
        ];
        let scores = reranker.score_all("what do mitochondria produce", &docs);

        assert_eq!(scores.len(), 3);
        assert!(scores[0] > scores[1]);
        assert!(scores[0] > scores[2]);
        assert!(scores.iter().all(|s| *s >= 0.0));
    }

    #[test]
    fn rerank_sorts_by_lexical_score_with_vector_tie_break() {
        let reranker = Bm25Reranker::default();
        let candidates = vec![
            Scored::new("unrelated text here".to_string(), 0),
            Scored::new("also unrelated".to_string(), 1),
            Scored::new("algebra equations".to_string(), 2),
        ];
        let ranked = reranker.rerank("algebra", candidates, String::as_str);
        let order: Vec<_> = ranked.iter().map(|s| s.vector_rank).collect();

        assert_eq!(order, vec![2, 0, 1]);
    }

    #[test]
    fn empty_candidate_set_is_fine() {
        let reranker = Bm25Reranker::default();
        assert!(reranker.score_all::<&str>("anything", &[]).is_empty());
        let ranked = reranker.rerank("x", Vec::<Scored<String>>::new(), String::as_str);
        assert!(ranked.is_empty());
    }

    #[test]
    fn repeated_query_terms_count_twice() {
        let reranker = Bm25Reranker::default();
        let docs = ["cell wall", "plant"];
        let once = reranker.score_all("cell", &docs);
        let twice = reranker.score_all("cell cell", &docs);
        assert!((twice[0] - 2.0 * once[0]).abs() < 1e-5);
    }
}
