/// Per-rule wildcard capture bookkeeping
///
/// Every wildcard written in a keep rule gets a stable, 1-based capture
/// index, assigned at parse time and shared across the whole rule so a later
/// `<n>` back-reference can name an earlier capture. The manager only counts
/// indices; captured text lives in a per-match [`Captures`], so one compiled
/// pipeline can serve many matching passes.
#[derive(Clone, Debug, Default)]
pub struct WildcardManager {
    count: usize,
}

impl WildcardManager {
    pub fn new() -> WildcardManager {
        WildcardManager { count: 0 }
    }

    /// Assign the next capture index (1-based)
    pub fn reserve(&mut self) -> usize {
        self.count += 1;
        self.count
    }

    /// Number of captures assigned so far
    pub fn count(&self) -> usize {
        self.count
    }

    /// Check that a `<index>` back-reference names an already-assigned capture
    pub fn check_back_reference(&self, index: usize) -> Result<(), String> {
        if index >= 1 && index <= self.count {
            Ok(())
        } else {
            Err(format!(
                "Invalid wildcard back-reference <{}> (only {} wildcard(s) seen so far)",
                index, self.count
            ))
        }
    }

    /// Fresh capture slots for one match attempt
    pub fn captures(&self) -> Captures {
        Captures {
            slots: vec![None; self.count],
        }
    }
}

/// Captured wildcard substrings for a single match attempt
///
/// Append-only from the matcher's point of view; slot `n` is written when
/// wildcard `n` matches and read when `<n>` is tested.
#[derive(Clone, Debug)]
pub struct Captures {
    slots: Vec<Option<String>>,
}

impl Captures {
    pub fn set(&mut self, index: usize, text: &str) {
        self.slots[index - 1] = Some(text.to_string());
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.slots.get(index - 1).and_then(|slot| slot.as_deref())
    }

    /// Forget captures at and after `index`, for backtracking
    pub fn truncate_from(&mut self, index: usize) {
        for slot in self.slots.iter_mut().skip(index - 1) {
            *slot = None;
        }
    }
}
