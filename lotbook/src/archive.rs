use crate::{LotbookError, Lot};
use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};

/// Whether [`BatchArchive::save`] added a lot or replaced one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SaveOutcome {
    Created,
    Updated,
}

/// A lot copied out of the archive, with the tree to resume at.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedLot {
    pub lot: Lot,
    pub next_tree_number: u32,
}

/// Display row for an archived lot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LotSummary {
    pub name: String,

    /// Distinct tree numbers measured.
    pub tree_count: usize,

    pub measurement_count: usize,

    pub saved_at: Option<DateTime<Utc>>,
}

/// Saved lots, keyed by name, in the order they were first saved.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchArchive {
    lots: Vec<Lot>,
}

impl BatchArchive {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lots(&self) -> &[Lot] {
        &self.lots
    }

    pub fn len(&self) -> usize {
        self.lots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lots.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Lot> {
        self.lots.iter().find(|lot| lot.name() == name)
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.lots.iter().position(|lot| lot.name() == name)
    }

    /// Inserts `lot`, replacing in place any lot with the same name.
    pub fn save(&mut self, lot: Lot) -> SaveOutcome {
        match self.position(lot.name()) {
            Some(idx) => {
                debug!("archive; replacing {} at {idx}", lot.name());
                self.lots[idx] = lot;
                SaveOutcome::Updated
            }
            None => {
                debug!("archive; adding {}", lot.name());
                self.lots.push(lot);
                SaveOutcome::Created
            }
        }
    }

    pub fn load(&self, name: &str) -> Result<LoadedLot, LotbookError> {
        let lot = self
            .get(name)
            .ok_or_else(|| LotbookError::NotFound(format!("lot {name:?}")))?;
        Ok(LoadedLot {
            next_tree_number: lot.next_tree_number()?,
            lot: lot.clone(),
        })
    }

    /// Removes the lot at `position`. Confirming with the operator is
    /// the caller's job.
    pub fn delete(&mut self, position: usize) -> Result<Lot, LotbookError> {
        if position >= self.lots.len() {
            return Err(LotbookError::NotFound(format!("lot #{position}")));
        }
        Ok(self.lots.remove(position))
    }

    pub fn list(&self) -> Vec<LotSummary> {
        self.lots
            .iter()
            .map(|lot| LotSummary {
                name: lot.name().to_string(),
                tree_count: lot.tree_count(),
                measurement_count: lot.measurements().len(),
                saved_at: lot.saved_at(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::{BatchArchive, SaveOutcome};
    use crate::{
        testutil::{at, lot, measurement},
        LotbookError, Method,
    };

    #[test]
    fn test_save_upserts_by_name() {
        let mut archive = BatchArchive::new();
        assert_eq!(archive.save(lot("Norte", vec![])), SaveOutcome::Created);
        assert_eq!(archive.save(lot("Sur", vec![])), SaveOutcome::Created);

        let updated = lot("Norte", vec![measurement(1, Method::MethodA, &[5.0])]);
        assert_eq!(archive.save(updated), SaveOutcome::Updated);
        assert_eq!(archive.len(), 2);
        assert_eq!(archive.lots()[0].name(), "Norte");
        assert_eq!(archive.lots()[0].measurements().len(), 1);
        assert_eq!(archive.position("Sur"), Some(1));
    }

    #[test]
    fn test_load_next_tree_number() {
        let mut archive = BatchArchive::new();
        archive.save(lot("Vacio", vec![]));
        archive.save(lot(
            "Norte",
            vec![
                measurement(2, Method::MethodA, &[5.0]),
                measurement(7, Method::MethodB, &[6.0]),
                measurement(3, Method::MethodA, &[4.0]),
            ],
        ));
        assert_eq!(archive.load("Vacio").unwrap().next_tree_number, 1);
        let loaded = archive.load("Norte").unwrap();
        assert_eq!(loaded.next_tree_number, 8);
        assert_eq!(loaded.lot.name(), "Norte");
        assert!(matches!(archive.load("Este"), Err(LotbookError::NotFound(_))));

        archive.save(lot("Oeste", vec![measurement(u32::MAX, Method::MethodB, &[5.0])]));
        assert!(matches!(
            archive.load("Oeste"),
            Err(LotbookError::InvalidTreeNumber(_))
        ));
    }

    #[test]
    fn test_delete_by_position() {
        let mut archive = BatchArchive::new();
        archive.save(lot("Norte", vec![]));
        archive.save(lot("Sur", vec![]));
        assert!(matches!(archive.delete(2), Err(LotbookError::NotFound(_))));
        assert_eq!(archive.delete(0).unwrap().name(), "Norte");
        assert_eq!(archive.len(), 1);
        assert!(archive.get("Norte").is_none());
    }

    #[test]
    fn test_list_stats() {
        let mut archive = BatchArchive::new();
        let mut norte = lot(
            "Norte",
            vec![
                measurement(1, Method::MethodA, &[5.0]),
                measurement(1, Method::MethodB, &[5.1]),
                measurement(2, Method::MethodA, &[9.0]),
            ],
        );
        norte.set_saved_at(at(3));
        archive.save(norte);

        let list = archive.list();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].tree_count, 2);
        assert_eq!(list[0].measurement_count, 3);
        assert_eq!(list[0].saved_at, Some(at(3)));
    }
}
