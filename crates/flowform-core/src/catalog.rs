//! Criteria catalog: named trigger conditions that nodes and edges refer to
//!
//! The catalog is an explicit service object. Converters take a reference to
//! one when they need to resolve criteria; nothing here is global.

use crate::error::{FlowError, Result};
use crate::model::CriterionRef;
use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Callback invoked with the full, sorted catalog after every change.
pub type Listener = Arc<dyn Fn(&[CriterionRef]) + Send + Sync>;

/// Handle returned by [`CriteriaCatalog::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Thread-safe store of criteria keyed by id.
pub struct CriteriaCatalog {
    entries: DashMap<String, CriterionRef>,
    listeners: DashMap<u64, Listener>,
    next_subscription: AtomicU64,
}

impl std::fmt::Debug for CriteriaCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CriteriaCatalog")
            .field("entries", &self.entries.len())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl CriteriaCatalog {
    pub fn new() -> Self {
        CriteriaCatalog {
            entries: DashMap::new(),
            listeners: DashMap::new(),
            next_subscription: AtomicU64::new(0),
        }
    }

    /// Create a catalog pre-populated with `criteria`.
    pub fn with_criteria(criteria: impl IntoIterator<Item = CriterionRef>) -> Self {
        let catalog = Self::new();
        for criterion in criteria {
            catalog.insert_entry(criterion);
        }
        catalog
    }

    /// The stock node criteria (personal details and observations).
    pub fn default_node_criteria() -> Self {
        const DEFAULTS: [(&str, &str, &str); 26] = [
            ("1", "address", "Address"),
            ("2", "allergies", "Allergies"),
            ("3", "currently_on_pill", "Currently on pill"),
            ("4", "demographic_dob", "Date of Birth"),
            ("5", "demographic_full_name", "Full Name"),
            ("6", "demographic_gender", "Gender"),
            ("7", "dva", "Department of Veterans' Affairs Number"),
            ("8", "email", "Email"),
            ("9", "eScript_only", "eScript only"),
            ("10", "ethnicity", "ethnicity"),
            ("11", "family_history", "Family History"),
            ("12", "medical_history", "Medical History"),
            ("13", "medicare", "Medicare"),
            ("14", "medication", "Medication"),
            ("15", "mobile", "Mobile"),
            ("16", "nib_membership_number", "NIB Membership Number"),
            ("17", "observation_alcohol", "Alcohol Consumption"),
            ("18", "observation_bp", "Blood pressure"),
            ("19", "observation_height", "Height"),
            ("20", "observation_smoking", "Smoking Status"),
            ("21", "observation_waist", "Waist Measurement"),
            ("22", "observation_weight", "Weight"),
            ("23", "payment", "Payment"),
            ("24", "preferred_product", "Preferred product"),
            ("25", "previously_on_pill", "Previously on pill"),
            ("26", "recently_on_medication", "Recently on medication"),
        ];
        Self::with_criteria(
            DEFAULTS
                .into_iter()
                .map(|(id, value, label)| CriterionRef::new(id, value, label)),
        )
    }

    /// Parse a catalog from a JSON array of `{id, value, label}` objects.
    pub fn from_json(json: &str) -> Result<Self> {
        let criteria: Vec<CriterionRef> = serde_json::from_str(json)?;
        Ok(Self::with_criteria(criteria))
    }

    /// Serialize the catalog, sorted by label.
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.get_all())?)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All criteria, sorted by label (case-insensitive), then id.
    pub fn get_all(&self) -> Vec<CriterionRef> {
        let mut all: Vec<CriterionRef> = self.entries.iter().map(|r| r.value().clone()).collect();
        all.sort_by(|a, b| {
            a.label
                .to_lowercase()
                .cmp(&b.label.to_lowercase())
                .then_with(|| a.id.cmp(&b.id))
        });
        all
    }

    /// Look up a criterion by id.
    pub fn get(&self, id: &str) -> Option<CriterionRef> {
        self.entries.get(id).map(|r| r.value().clone())
    }

    /// Replace the whole catalog and notify listeners.
    pub fn load(&self, criteria: impl IntoIterator<Item = CriterionRef>) {
        self.entries.clear();
        for criterion in criteria {
            self.insert_entry(criterion);
        }
        self.notify();
    }

    /// Add a criterion, assigning an id when it has none. Returns the stored entry.
    pub fn add(&self, criterion: CriterionRef) -> CriterionRef {
        let stored = self.insert_entry(criterion);
        self.notify();
        stored
    }

    /// Replace the criterion with the same id.
    pub fn update(&self, criterion: CriterionRef) -> Result<()> {
        if !self.entries.contains_key(&criterion.id) {
            return Err(FlowError::CriterionNotFound(criterion.id));
        }
        self.entries.insert(criterion.id.clone(), criterion);
        self.notify();
        Ok(())
    }

    /// Remove a criterion by id.
    pub fn delete(&self, id: &str) -> Option<CriterionRef> {
        let removed = self.entries.remove(id).map(|(_, criterion)| criterion);
        if removed.is_some() {
            self.notify();
        }
        removed
    }

    /// Find a criterion by id, then by value, then by label.
    pub fn resolve(&self, key: &str) -> Option<CriterionRef> {
        if key.is_empty() {
            return None;
        }
        if let Some(found) = self.get(key) {
            return Some(found);
        }
        let all = self.get_all();
        all.iter()
            .find(|c| c.value == key)
            .or_else(|| all.iter().find(|c| c.label == key))
            .cloned()
    }

    /// Register a change listener.
    pub fn subscribe(&self, listener: impl Fn(&[CriterionRef]) + Send + Sync + 'static) -> SubscriptionId {
        let id = self.next_subscription.fetch_add(1, Ordering::Relaxed);
        self.listeners.insert(id, Arc::new(listener));
        SubscriptionId(id)
    }

    /// Remove a listener. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, subscription: SubscriptionId) -> bool {
        self.listeners.remove(&subscription.0).is_some()
    }

    fn insert_entry(&self, mut criterion: CriterionRef) -> CriterionRef {
        if criterion.id.is_empty() {
            criterion.id = self.fresh_id();
        }
        self.entries.insert(criterion.id.clone(), criterion.clone());
        criterion
    }

    /// Millisecond timestamp, bumped until unused.
    fn fresh_id(&self) -> String {
        let mut candidate = chrono::Utc::now().timestamp_millis();
        while self.entries.contains_key(&candidate.to_string()) {
            candidate += 1;
        }
        candidate.to_string()
    }

    fn notify(&self) {
        let snapshot = self.get_all();
        // Clone handles first so listeners may call back into the catalog.
        let listeners: Vec<Listener> = self.listeners.iter().map(|r| Arc::clone(r.value())).collect();
        debug!("Notifying {} catalog listeners", listeners.len());
        for listener in listeners {
            listener(&snapshot);
        }
    }
}

impl Default for CriteriaCatalog {
    fn default() -> Self {
        Self::new()
    }
}
