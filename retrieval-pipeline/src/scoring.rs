use std::cmp::Ordering;

/// Holds the subscores gathered while a candidate moves through retrieval.
#[derive(Debug, Clone, Copy, Default)]
pub struct Scores {
    pub vector: Option<f32>,
    pub lexical: Option<f32>,
}

/// Generic wrapper combining an item with its retrieval scores and the rank it
/// held in the vector-similarity candidate list.
#[derive(Debug, Clone)]
pub struct Scored<T> {
    pub item: T,
    pub scores: Scores,
    pub vector_rank: usize,
}

impl<T> Scored<T> {
    pub fn new(item: T, vector_rank: usize) -> Self {
        Self {
            item,
            scores: Scores::default(),
            vector_rank,
        }
    }

    pub const fn with_vector_score(mut self, score: f32) -> Self {
        self.scores.vector = Some(score);
        self
    }

    pub const fn with_lexical_score(mut self, score: f32) -> Self {
        self.scores.lexical = Some(score);
        self
    }

    pub fn lexical(&self) -> f32 {
        sanitize(self.scores.lexical.unwrap_or(0.0))
    }

    pub fn vector(&self) -> f32 {
        sanitize(self.scores.vector.unwrap_or(0.0))
    }
}

pub fn sanitize(score: f32) -> f32 {
    if score.is_finite() {
        score
    } else {
        0.0
    }
}

/// Maps a cosine distance from the vector index back to a similarity in
/// `[-1, 1]`. Non-finite distances (zero vectors) score 0.
pub fn cosine_distance_to_similarity(distance: f32) -> f32 {
    if !distance.is_finite() {
        return 0.0;
    }
    (1.0 - distance).clamp(-1.0, 1.0)
}

/// Orders by lexical score descending, then by vector rank ascending.
pub fn by_lexical_then_vector_rank<T>(a: &Scored<T>, b: &Scored<T>) -> Ordering {
    b.lexical()
        .partial_cmp(&a.lexical())
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.vector_rank.cmp(&b.vector_rank))
}
