use crate::model::{
    error::{Entity, RatingError, Result},
    structures::{comparison::Comparison, ComparisonId, ItemId}
};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;

/// Append-only log of judgments.
///
/// Entries are kept in creation order: ids increase by one per append and
/// `created_at` never moves backwards. Only the validity flag ever changes.
#[derive(Debug, Clone)]
pub struct ComparisonLedger {
    comparisons: IndexMap<ComparisonId, Comparison>,
    next_id: ComparisonId
}

impl Default for ComparisonLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl ComparisonLedger {
    pub fn new() -> ComparisonLedger {
        ComparisonLedger {
            comparisons: IndexMap::new(),
            next_id: 1
        }
    }

    pub fn from_comparisons(mut comparisons: Vec<Comparison>) -> Result<ComparisonLedger> {
        comparisons.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

        let mut ledger = ComparisonLedger::new();
        for comparison in comparisons {
            if ledger.comparisons.contains_key(&comparison.id) {
                return Err(RatingError::ConfigurationError(format!(
                    "duplicate comparison {}",
                    comparison.id
                )));
            }
            ledger.next_id = ledger.next_id.max(comparison.id + 1);
            ledger.comparisons.insert(comparison.id, comparison);
        }

        Ok(ledger)
    }

    /// Assigns the next id, clamps the timestamp to keep creation order, and stores the entry.
    pub fn append(&mut self, mut comparison: Comparison) -> Comparison {
        comparison.id = self.next_id;
        if let Some(latest) = self.latest_created_at() {
            if comparison.created_at < latest {
                comparison.created_at = latest;
            }
        }

        self.next_id += 1;
        self.comparisons.insert(comparison.id, comparison.clone());
        comparison
    }

    pub fn get(&self, id: ComparisonId) -> Result<&Comparison> {
        self.comparisons
            .get(&id)
            .ok_or_else(|| RatingError::not_found(Entity::Comparison, id))
    }

    /// Flips a valid comparison to invalid. There is no way back.
    pub fn invalidate(&mut self, id: ComparisonId, at: DateTime<Utc>) -> Result<Comparison> {
        let comparison = self
            .comparisons
            .get_mut(&id)
            .ok_or_else(|| RatingError::not_found(Entity::Comparison, id))?;

        if !comparison.is_valid {
            return Err(RatingError::AlreadyInvalid(id));
        }

        comparison.is_valid = false;
        comparison.invalidated_at = Some(at);
        Ok(comparison.clone())
    }

    /// Comparisons naming `item_id`, oldest first
    pub fn history_for(&self, item_id: ItemId, include_invalid: bool) -> Vec<Comparison> {
        self.comparisons
            .values()
            .filter(|c| c.involves(item_id) && (include_invalid || c.is_valid))
            .cloned()
            .collect()
    }

    pub fn valid_in_order(&self) -> impl Iterator<Item = &Comparison> {
        self.comparisons.values().filter(|c| c.is_valid)
    }

    /// Whether `item_id` appears in any comparison, valid or not
    pub fn has_history(&self, item_id: ItemId) -> bool {
        self.comparisons.values().any(|c| c.involves(item_id))
    }

    pub fn latest_created_at(&self) -> Option<DateTime<Utc>> {
        self.comparisons.values().last().map(|c| c.created_at)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Comparison> {
        self.comparisons.values()
    }

    pub fn len(&self) -> usize {
        self.comparisons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.comparisons.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::ComparisonLedger;
    use crate::{
        model::{error::RatingError, structures::outcome_level::OutcomeLevel},
        utils::test_utils::generate_comparison
    };
    use chrono::Duration;

    #[test]
    fn test_append_assigns_sequential_ids() {
        let mut ledger = ComparisonLedger::new();
        let first = ledger.append(generate_comparison(0, 1, 2, OutcomeLevel::Tie, 0.5));
        let second = ledger.append(generate_comparison(0, 2, 3, OutcomeLevel::StrongA, 1.0));

        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn test_append_clamps_created_at() {
        let mut ledger = ComparisonLedger::new();
        let first = ledger.append(generate_comparison(0, 1, 2, OutcomeLevel::Tie, 0.5));

        let mut earlier = generate_comparison(0, 1, 2, OutcomeLevel::Tie, 0.5);
        earlier.created_at = first.created_at - Duration::seconds(30);
        let second = ledger.append(earlier);

        assert_eq!(second.created_at, first.created_at);
    }

    #[test]
    fn test_invalidate_is_one_way() {
        let mut ledger = ComparisonLedger::new();
        let comparison = ledger.append(generate_comparison(0, 1, 2, OutcomeLevel::SlightB, 0.25));
        let at = comparison.created_at + Duration::seconds(2);

        let invalidated = ledger.invalidate(comparison.id, at).unwrap();
        assert!(!invalidated.is_valid);
        assert_eq!(invalidated.invalidated_at, Some(at));

        assert_eq!(
            ledger.invalidate(comparison.id, at),
            Err(RatingError::AlreadyInvalid(comparison.id))
        );
        assert!(matches!(ledger.invalidate(99, at), Err(RatingError::NotFound { .. })));
    }

    #[test]
    fn test_history_for_filters_invalid() {
        let mut ledger = ComparisonLedger::new();
        let c1 = ledger.append(generate_comparison(0, 1, 2, OutcomeLevel::StrongA, 1.0));
        let c2 = ledger.append(generate_comparison(0, 3, 1, OutcomeLevel::Tie, 0.5));
        ledger.append(generate_comparison(0, 2, 3, OutcomeLevel::StrongB, 0.0));
        ledger.invalidate(c1.id, c1.created_at).unwrap();

        let valid = ledger.history_for(1, false);
        assert_eq!(valid.iter().map(|c| c.id).collect::<Vec<_>>(), vec![c2.id]);

        let all = ledger.history_for(1, true);
        assert_eq!(all.iter().map(|c| c.id).collect::<Vec<_>>(), vec![c1.id, c2.id]);

        assert!(ledger.has_history(1));
        assert!(!ledger.has_history(4));
        assert_eq!(ledger.valid_in_order().count(), 2);
    }

    #[test]
    fn test_from_comparisons_orders_by_creation() {
        let mut late = generate_comparison(1, 1, 2, OutcomeLevel::Tie, 0.5);
        let early = generate_comparison(2, 1, 2, OutcomeLevel::Tie, 0.5);
        late.created_at = early.created_at + Duration::seconds(5);

        let mut ledger = ComparisonLedger::from_comparisons(vec![late, early]).unwrap();
        let ids = ledger.iter().map(|c| c.id).collect::<Vec<_>>();
        assert_eq!(ids, vec![2, 1]);

        let next = ledger.append(generate_comparison(0, 1, 2, OutcomeLevel::Tie, 0.5));
        assert_eq!(next.id, 3);
    }
}
