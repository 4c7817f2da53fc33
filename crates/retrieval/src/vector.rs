//! Similarity scoring shared by the retrieval backends: cosine scoring,
//! exact top-k ranking for the in-memory index and the pgvector literal the
//! Postgres backend binds.

use patentrag_core::Document;

/// Cosine similarity of two embeddings, accumulated in `f64`.
///
/// Mismatched dimensions, empty input and zero-norm vectors all score 0.0 so
/// a malformed index row never outranks a real match.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }

    let (dot, sq_a, sq_b) = a.iter().zip(b).fold((0.0f64, 0.0f64, 0.0f64), |(d, na, nb), (&x, &y)| {
        let (x, y) = (f64::from(x), f64::from(y));
        (d + x * y, na + x * x, nb + y * y)
    });

    let norm = (sq_a * sq_b).sqrt();
    if norm < 1e-10 { 0.0 } else { (dot / norm) as f32 }
}

/// Rank documents by cosine similarity to a query embedding.
///
/// Returns `(document, similarity)` pairs by descending similarity. The sort
/// is stable, so documents with equal scores keep their index order. Only
/// documents that carry an embedding and meet `min_score` are included.
pub fn vector_search(
    documents: &[Document],
    query_embedding: &[f32],
    limit: usize,
    min_score: f32,
) -> Vec<(Document, f32)> {
    let mut scored: Vec<(Document, f32)> = documents
        .iter()
        .filter(|doc| !doc.embedding.is_empty())
        .filter_map(|doc| {
            let sim = cosine_similarity(&doc.embedding, query_embedding);
            (sim >= min_score).then(|| (doc.clone(), sim))
        })
        .collect();

    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(limit);
    scored
}

/// Render a vector as a pgvector literal (`[0.1,0.2,0.3]`).
pub fn to_pgvector_literal(embedding: &[f32]) -> String {
    format!(
        "[{}]",
        embedding
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(",")
    )
}
