//! Concept repository
//!
//! Archives the models of past concepts so a recurring concept can be
//! picked up again instead of relearned from scratch.

use crate::error::Result;
use crate::models::{ModelSnapshot, OnlineModel};
use serde::{Deserialize, Serialize};

/// Identifier of one model generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct ConceptId(pub u32);

impl ConceptId {
    pub fn next(self) -> Self {
        ConceptId(self.0 + 1)
    }
}

impl std::fmt::Display for ConceptId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "c{}", self.0)
    }
}

/// An archived concept model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredConcept {
    pub id: ConceptId,
    pub snapshot: ModelSnapshot,
    /// Stream position at which the concept was archived
    pub archived_at: u64,
}

/// Bounded archive of concept models; the least recently archived concept
/// is evicted first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConceptRepository {
    concepts: Vec<StoredConcept>,
    max_concepts: usize,
}

impl ConceptRepository {
    pub fn new(max_concepts: usize) -> Self {
        Self {
            concepts: Vec::with_capacity(max_concepts.min(16)),
            max_concepts,
        }
    }

    /// Archive a model under `id`, replacing an older entry for the same id.
    /// Returns the id evicted to make room, if any.
    pub fn archive(&mut self, id: ConceptId, model: &OnlineModel, seq: u64) -> Result<Option<ConceptId>> {
        let stored = StoredConcept {
            id,
            snapshot: model.snapshot()?,
            archived_at: seq,
        };

        if let Some(existing) = self.concepts.iter_mut().find(|c| c.id == id) {
            *existing = stored;
            return Ok(None);
        }

        self.concepts.push(stored);
        if self.concepts.len() <= self.max_concepts {
            return Ok(None);
        }

        let oldest = self
            .concepts
            .iter()
            .enumerate()
            .min_by_key(|(_, c)| c.archived_at)
            .map(|(i, _)| i);
        Ok(oldest.map(|i| self.concepts.remove(i).id))
    }

    /// Stored concept with the lowest mean loss on `recent`
    pub fn best_match(&self, recent: &[(Vec<f64>, f64)]) -> Result<Option<(ConceptId, f64)>> {
        let mut best: Option<(ConceptId, f64)> = None;

        for concept in &self.concepts {
            let model = OnlineModel::restore(&concept.snapshot)?;
            let loss = mean_loss(&model, recent)?;
            if best.map_or(true, |(_, best_loss)| loss < best_loss) {
                best = Some((concept.id, loss));
            }
        }

        Ok(best)
    }

    /// Remove a concept from the archive and rebuild its model
    pub fn recall(&mut self, id: ConceptId) -> Result<Option<OnlineModel>> {
        match self.concepts.iter().position(|c| c.id == id) {
            Some(idx) => {
                let concept = self.concepts.remove(idx);
                Ok(Some(OnlineModel::restore(&concept.snapshot)?))
            }
            None => Ok(None),
        }
    }

    pub fn ids(&self) -> Vec<ConceptId> {
        self.concepts.iter().map(|c| c.id).collect()
    }

    pub fn len(&self) -> usize {
        self.concepts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.concepts.is_empty()
    }
}

/// Mean loss of `model` over labeled vectors; infinite for an empty window
pub fn mean_loss(model: &OnlineModel, window: &[(Vec<f64>, f64)]) -> Result<f64> {
    if window.is_empty() {
        return Ok(f64::INFINITY);
    }

    let mut total = 0.0;
    for (x, y) in window {
        total += model.loss(model.predict(x)?, *y);
    }
    Ok(total / window.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ModelKind;

    fn trained(sign: f64) -> OnlineModel {
        let mut model = OnlineModel::new(ModelKind::Logistic, 1, 0.5);
        for i in 0..200 {
            let x = if i % 2 == 0 { 1.0 } else { -1.0 };
            let y = if x * sign > 0.0 { 1.0 } else { 0.0 };
            model.update(&[x], y, 1.0).unwrap();
        }
        model
    }

    fn window(sign: f64) -> Vec<(Vec<f64>, f64)> {
        vec![
            (vec![1.0], if sign > 0.0 { 1.0 } else { 0.0 }),
            (vec![-1.0], if sign > 0.0 { 0.0 } else { 1.0 }),
        ]
    }

    #[test]
    fn test_best_match_picks_fitting_concept() {
        let mut repo = ConceptRepository::new(4);
        repo.archive(ConceptId(0), &trained(1.0), 10).unwrap();
        repo.archive(ConceptId(1), &trained(-1.0), 20).unwrap();

        let (id, loss) = repo.best_match(&window(-1.0)).unwrap().unwrap();
        assert_eq!(id, ConceptId(1));
        assert_eq!(loss, 0.0);
    }

    #[test]
    fn test_evicts_oldest() {
        let mut repo = ConceptRepository::new(2);
        let model = trained(1.0);

        assert_eq!(repo.archive(ConceptId(0), &model, 1).unwrap(), None);
        assert_eq!(repo.archive(ConceptId(1), &model, 2).unwrap(), None);
        assert_eq!(repo.archive(ConceptId(2), &model, 3).unwrap(), Some(ConceptId(0)));
        assert_eq!(repo.ids(), vec![ConceptId(1), ConceptId(2)]);
    }

    #[test]
    fn test_recall_removes_concept() {
        let mut repo = ConceptRepository::new(2);
        let model = trained(1.0);
        repo.archive(ConceptId(3), &model, 1).unwrap();

        let recalled = repo.recall(ConceptId(3)).unwrap().unwrap();
        assert_eq!(recalled, model);
        assert!(repo.is_empty());
        assert!(repo.recall(ConceptId(3)).unwrap().is_none());
    }

    #[test]
    fn test_empty_window_has_infinite_loss() {
        assert!(mean_loss(&trained(1.0), &[]).unwrap().is_infinite());
    }
}
