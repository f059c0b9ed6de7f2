//! In-memory BM25 (Okapi) lexical index
//!
//! Every call to [`LexicalIndex::index`] rebuilds the scoring structures
//! from scratch. The indexed documents are retained so lexical hits can be
//! materialized into full results when the vector stage is unavailable.

use ragforge_common::models::{Document, Filters, RankedHit};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// BM25 tuning parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BM25Params {
    /// Term-frequency saturation
    pub k1: f64,
    /// Document-length normalization
    pub b: f64,
    /// Floor for negative idf, as a fraction of the mean idf
    pub epsilon: f64,
}

impl Default for BM25Params {
    fn default() -> Self {
        Self {
            k1: 1.5,
            b: 0.75,
            epsilon: 0.25,
        }
    }
}

/// Id and BM25 score of one lexical match
#[derive(Debug, Clone, PartialEq)]
pub struct LexicalHit {
    pub id: String,
    pub score: f32,
}

/// Split text into index terms.
///
/// Whitespace and punctuation separate tokens. A maximal run of ASCII
/// letters is one lower-cased token; any other letter or digit (including
/// `_` and CJK ideographs) is a token on its own.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut latin = String::new();

    for ch in text.chars() {
        if ch.is_ascii_alphabetic() {
            latin.push(ch.to_ascii_lowercase());
            continue;
        }
        if !latin.is_empty() {
            tokens.push(std::mem::take(&mut latin));
        }
        if ch.is_alphanumeric() || ch == '_' {
            tokens.push(ch.to_lowercase().collect());
        }
    }
    if !latin.is_empty() {
        tokens.push(latin);
    }

    tokens
}

/// BM25 index over one generation of documents
#[derive(Debug, Clone, Default)]
pub struct LexicalIndex {
    params: BM25Params,
    documents: Vec<Document>,
    term_freqs: Vec<HashMap<String, usize>>,
    doc_lengths: Vec<usize>,
    avg_doc_length: f64,
    idf: HashMap<String, f64>,
}

impl LexicalIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_params(params: BM25Params) -> Self {
        Self {
            params,
            ..Self::default()
        }
    }

    pub fn params(&self) -> BM25Params {
        self.params
    }

    /// Number of indexed documents
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Indexed documents in corpus order
    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    /// Rebuild from `(id, text)` pairs
    pub fn index(&mut self, corpus: &[(String, String)]) {
        let documents: Vec<Document> = corpus
            .iter()
            .map(|(id, text)| Document::new(id.clone(), text.clone()))
            .collect();
        self.rebuild(documents);
    }

    /// Rebuild from documents; vectors are not retained
    pub fn index_documents(&mut self, documents: &[Document]) {
        let documents = documents
            .iter()
            .map(|d| Document {
                vector: None,
                ..d.clone()
            })
            .collect();
        self.rebuild(documents);
    }

    /// A new generation holding every current document except `ids`
    pub fn without(&self, ids: &[String]) -> Self {
        let removed: HashSet<&str> = ids.iter().map(String::as_str).collect();
        let mut next = Self::with_params(self.params);
        next.rebuild(
            self.documents
                .iter()
                .filter(|d| !removed.contains(d.id.as_str()))
                .cloned()
                .collect(),
        );
        next
    }

    fn rebuild(&mut self, documents: Vec<Document>) {
        // A repeated id overwrites the earlier entry in place
        let mut positions: HashMap<String, usize> = HashMap::new();
        let mut unique: Vec<Document> = Vec::with_capacity(documents.len());
        for document in documents {
            match positions.get(&document.id) {
                Some(&pos) => unique[pos] = document,
                None => {
                    positions.insert(document.id.clone(), unique.len());
                    unique.push(document);
                }
            }
        }

        self.term_freqs = Vec::with_capacity(unique.len());
        self.doc_lengths = Vec::with_capacity(unique.len());
        let mut doc_freqs: HashMap<String, usize> = HashMap::new();

        for document in &unique {
            let tokens = tokenize(&document.text);
            self.doc_lengths.push(tokens.len());

            let mut freqs: HashMap<String, usize> = HashMap::new();
            for token in tokens {
                *freqs.entry(token).or_insert(0) += 1;
            }
            for term in freqs.keys() {
                *doc_freqs.entry(term.clone()).or_insert(0) += 1;
            }
            self.term_freqs.push(freqs);
        }

        let total_length: usize = self.doc_lengths.iter().sum();
        self.avg_doc_length = if unique.is_empty() {
            0.0
        } else {
            total_length as f64 / unique.len() as f64
        };
        self.idf = compute_idf(&doc_freqs, unique.len(), self.params.epsilon);
        self.documents = unique;

        debug!(
            documents = self.documents.len(),
            terms = self.idf.len(),
            avg_doc_length = self.avg_doc_length,
            "Lexical index rebuilt"
        );
    }

    /// BM25 score of every document for `query`, in corpus order.
    /// Repeated query terms contribute once per occurrence.
    pub fn scores(&self, query: &str) -> Vec<f64> {
        let query_terms = tokenize(query);
        let BM25Params { k1, b, .. } = self.params;

        self.term_freqs
            .iter()
            .zip(&self.doc_lengths)
            .map(|(freqs, &doc_length)| {
                let length_norm = if self.avg_doc_length > 0.0 {
                    doc_length as f64 / self.avg_doc_length
                } else {
                    0.0
                };
                query_terms
                    .iter()
                    .map(|term| {
                        let Some(&freq) = freqs.get(term) else {
                            return 0.0;
                        };
                        let idf = self.idf.get(term).copied().unwrap_or(0.0);
                        let tf = freq as f64;
                        idf * (tf * (k1 + 1.0)) / (tf + k1 * (1.0 - b + b * length_norm))
                    })
                    .sum()
            })
            .collect()
    }

    /// Corpus indices ordered by descending score; ties keep corpus order
    fn ranked(&self, query: &str) -> Vec<(usize, f64)> {
        if self.documents.is_empty() {
            return vec![];
        }
        let scores = self.scores(query);
        let mut order: Vec<usize> = (0..scores.len()).collect();
        order.sort_by(|&a, &b| scores[b].partial_cmp(&scores[a]).unwrap_or(Ordering::Equal));
        order.into_iter().map(|i| (i, scores[i])).collect()
    }

    /// Top `top_k` documents for `query`.
    ///
    /// Documents sharing no term with the query still fill the list with a
    /// zero score. An empty index yields no hits.
    pub fn search(&self, query: &str, top_k: usize) -> Vec<LexicalHit> {
        self.ranked(query)
            .into_iter()
            .take(top_k)
            .map(|(i, score)| LexicalHit {
                id: self.documents[i].id.clone(),
                score: score as f32,
            })
            .collect()
    }

    /// Like [`search`](Self::search) but returns the retained documents,
    /// restricted to those matching `filters`
    pub fn search_documents(
        &self,
        query: &str,
        top_k: usize,
        filters: Option<&Filters>,
    ) -> Vec<RankedHit> {
        self.ranked(query)
            .into_iter()
            .filter(|(i, _)| filters.map_or(true, |f| self.documents[*i].matches(f)))
            .take(top_k)
            .map(|(i, score)| RankedHit::new(self.documents[i].clone(), score as f32))
            .collect()
    }
}

fn compute_idf(doc_freqs: &HashMap<String, usize>, corpus_size: usize, epsilon: f64) -> HashMap<String, f64> {
    let n = corpus_size as f64;
    let mut idf: HashMap<String, f64> = HashMap::with_capacity(doc_freqs.len());
    let mut idf_sum = 0.0;
    let mut negative: Vec<String> = Vec::new();

    for (term, &freq) in doc_freqs {
        let df = freq as f64;
        let value = (n - df + 0.5).ln() - (df + 0.5).ln();
        idf_sum += value;
        if value < 0.0 {
            negative.push(term.clone());
        }
        idf.insert(term.clone(), value);
    }

    if !idf.is_empty() {
        let floor = epsilon * idf_sum / idf.len() as f64;
        for term in negative {
            idf.insert(term, floor);
        }
    }
    idf
}
