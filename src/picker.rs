use rand::Rng;
use thiserror::Error;

/// Error types for picker construction
#[derive(Debug, Error, PartialEq)]
pub enum PickerError {
    #[error("invalid picker configuration: {0}")]
    InvalidConfiguration(String),
}

/// Random picker with guaranteed coverage.
///
/// Every item in the list is returned at least once within `cycle_length`
/// consecutive picks. Internally the picker runs shuffle-without-replacement
/// passes over the item list (sub-cycles), refilling `remaining` from `chosen`
/// whenever a pass completes before the cycle does. Used to rotate image
/// generation backends so no API key is starved.
///
/// Not thread-safe; wrap in a mutex when shared across tasks.
#[derive(Debug, Clone)]
pub struct CoveragePicker<T: Clone + PartialEq> {
    items: Vec<T>,
    cycle_length: usize,
    pick_count: usize,
    remaining: Vec<T>,
    chosen: Vec<T>,
}

impl<T: Clone + PartialEq> CoveragePicker<T> {
    /// Create a picker over `items`. `cycle_length` defaults to the item
    /// count and must not be smaller than it.
    pub fn new(items: Vec<T>, cycle_length: Option<usize>) -> Result<Self, PickerError> {
        if items.is_empty() {
            return Err(PickerError::InvalidConfiguration(
                "item list must not be empty".to_string(),
            ));
        }
        let cycle_length = cycle_length.unwrap_or(items.len());
        if cycle_length < items.len() {
            return Err(PickerError::InvalidConfiguration(format!(
                "cycle length must be at least {}",
                items.len()
            )));
        }
        let mut picker = Self {
            items,
            cycle_length,
            pick_count: 0,
            remaining: Vec::new(),
            chosen: Vec::new(),
        };
        picker.reset();
        Ok(picker)
    }

    /// Restart the coverage cycle, shuffling all items back into play.
    pub fn reset(&mut self) {
        self.pick_count = 0;
        self.remaining = self.items.clone();
        self.chosen.clear();
    }

    /// Pick one item uniformly at random from those not yet drawn in the
    /// current sub-cycle. Never fails once construction succeeded.
    pub fn pick(&mut self) -> T {
        if self.pick_count >= self.cycle_length {
            self.reset();
        }

        // Sub-cycle exhausted before the full cycle: start a fresh pass.
        if self.remaining.is_empty() {
            std::mem::swap(&mut self.remaining, &mut self.chosen);
            self.chosen.clear();
        }

        let index = rand::thread_rng().gen_range(0..self.remaining.len());
        let item = self.remaining.swap_remove(index);
        self.chosen.push(item.clone());
        self.pick_count += 1;

        item
    }

    /// Number of picks made since the last reset.
    pub fn pick_count(&self) -> usize {
        self.pick_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn sorted(mut v: Vec<&str>) -> Vec<&str> {
        v.sort();
        v
    }

    #[test]
    fn test_empty_items_rejected() {
        let result = CoveragePicker::<String>::new(Vec::new(), None);
        assert!(matches!(result, Err(PickerError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_short_cycle_rejected() {
        let result = CoveragePicker::new(vec!["a", "b", "c"], Some(2));
        assert!(matches!(result, Err(PickerError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_full_pass_is_permutation() {
        // cycle_length == items.len(): one pass touches every item exactly once
        let mut picker = CoveragePicker::new(vec!["a", "b", "c"], None).unwrap();
        let picks: Vec<&str> = (0..3).map(|_| picker.pick()).collect();
        assert_eq!(sorted(picks), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_fourth_pick_starts_new_cycle() {
        let mut picker = CoveragePicker::new(vec!["a", "b", "c"], None).unwrap();
        for _ in 0..3 {
            picker.pick();
        }
        assert_eq!(picker.pick_count(), 3);
        picker.pick();
        // The internal reset ran before selection, so the count restarted.
        assert_eq!(picker.pick_count(), 1);
    }

    #[test]
    fn test_coverage_within_longer_cycle() {
        // Every cycle_length window aligned to a reset must contain all items.
        let items = vec!["a", "b", "c", "d"];
        let mut picker = CoveragePicker::new(items.clone(), Some(10)).unwrap();
        for _ in 0..5 {
            let window: HashSet<&str> = (0..10).map(|_| picker.pick()).collect();
            for item in &items {
                assert!(window.contains(item), "item {} starved in cycle", item);
            }
        }
    }

    #[test]
    fn test_sub_cycles_each_cover_all_items() {
        // Within one long cycle, every aligned items.len() block is a permutation.
        let items = vec![1, 2, 3];
        let mut picker = CoveragePicker::new(items.clone(), Some(9)).unwrap();
        for _ in 0..3 {
            let block: HashSet<i32> = (0..3).map(|_| picker.pick()).collect();
            assert_eq!(block.len(), items.len());
        }
    }

    #[test]
    fn test_single_item() {
        let mut picker = CoveragePicker::new(vec!["only"], Some(5)).unwrap();
        for _ in 0..20 {
            assert_eq!(picker.pick(), "only");
        }
    }

    #[test]
    fn test_reset_restores_initial_state() {
        let mut picker = CoveragePicker::new(vec!["a", "b", "c"], Some(6)).unwrap();
        for _ in 0..4 {
            picker.pick();
        }
        picker.reset();
        assert_eq!(picker.pick_count, 0);
        assert_eq!(sorted(picker.remaining.clone()), vec!["a", "b", "c"]);
        assert!(picker.chosen.is_empty());
    }

    #[test]
    fn test_partition_invariant_holds() {
        let mut picker = CoveragePicker::new(vec!["a", "b", "c", "d"], Some(11)).unwrap();
        for _ in 0..30 {
            picker.pick();
            assert_eq!(picker.remaining.len() + picker.chosen.len(), 4);
            let mut union = picker.remaining.clone();
            union.extend(picker.chosen.iter().cloned());
            assert_eq!(sorted(union), vec!["a", "b", "c", "d"]);
        }
    }
}
