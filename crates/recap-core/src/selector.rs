//! Deterministic question selection.
//!
//! Each exam gets a 64-bit seed derived from `(bank_version, marketing_name,
//! exam_index)`. One ChaCha8 stream per exam drives a shuffle per domain, in
//! domain-name order, and a final shuffle that interleaves domains, so the
//! same inputs always yield the same questions in the same order.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::SelectionError;
use crate::model::{DraftQuestion, Question, QuestionId};

/// How far the "already used" exclusion reaches within one generation run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReuseScope {
    /// Every exam draws from the full pool; a question may appear in several
    /// exams of a batch but never twice in one exam.
    #[default]
    PerExam,
    /// A question used by any exam of the batch is excluded from the rest.
    PerBatch,
}

impl fmt::Display for ReuseScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReuseScope::PerExam => write!(f, "per_exam"),
            ReuseScope::PerBatch => write!(f, "per_batch"),
        }
    }
}

impl FromStr for ReuseScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "per_exam" | "exam" => Ok(ReuseScope::PerExam),
            "per_batch" | "batch" => Ok(ReuseScope::PerBatch),
            other => Err(format!("unknown reuse scope: {other}")),
        }
    }
}

/// Seed for one exam: the first 8 bytes of
/// `SHA-256("{bank_version}:{marketing_name}:{exam_index}")`, big-endian.
pub fn exam_seed(bank_version: &str, marketing_name: &str, exam_index: usize) -> u64 {
    let digest = Sha256::digest(format!("{bank_version}:{marketing_name}:{exam_index}"));
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(head)
}

/// Draws exams from one question pool.
pub struct Selector<'a> {
    pool: BTreeMap<&'a str, Vec<&'a Question>>,
    scope: ReuseScope,
    batch_used: BTreeSet<QuestionId>,
}

impl<'a> Selector<'a> {
    pub fn new(questions: &'a [Question], scope: ReuseScope) -> Self {
        let mut pool: BTreeMap<&str, Vec<&Question>> = BTreeMap::new();
        for q in questions {
            pool.entry(q.domain.as_str()).or_default().push(q);
        }
        // Input order must not influence the shuffle.
        for list in pool.values_mut() {
            list.sort_by_key(|q| q.id);
        }
        Self {
            pool,
            scope,
            batch_used: BTreeSet::new(),
        }
    }

    pub fn scope(&self) -> ReuseScope {
        self.scope
    }

    /// Select one exam's questions according to `quota`, ordered 1..=n.
    pub fn select(
        &mut self,
        exam_index: usize,
        seed: u64,
        quota: &BTreeMap<String, usize>,
    ) -> Result<Vec<DraftQuestion>, SelectionError> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut exam_used: BTreeSet<QuestionId> = BTreeSet::new();
        let mut picked: Vec<&Question> = Vec::new();

        for (domain, &required) in quota {
            if required == 0 {
                continue;
            }
            let mut candidates: Vec<&Question> = self
                .pool
                .get(domain.as_str())
                .map(|list| {
                    list.iter()
                        .copied()
                        .filter(|q| !exam_used.contains(&q.id))
                        .filter(|q| {
                            self.scope == ReuseScope::PerExam || !self.batch_used.contains(&q.id)
                        })
                        .collect()
                })
                .unwrap_or_default();

            if candidates.len() < required {
                return Err(SelectionError::DomainExhausted {
                    exam_index,
                    domain: domain.clone(),
                    available: candidates.len(),
                    required,
                });
            }

            candidates.shuffle(&mut rng);
            for q in candidates.into_iter().take(required) {
                exam_used.insert(q.id);
                picked.push(q);
            }
        }

        picked.shuffle(&mut rng);

        if self.scope == ReuseScope::PerBatch {
            self.batch_used.extend(exam_used);
        }

        Ok(picked
            .into_iter()
            .enumerate()
            .map(|(i, q)| DraftQuestion {
                question_id: q.id,
                domain: q.domain.clone(),
                order: i as u32 + 1,
            })
            .collect())
    }
}
