use std::collections::{BTreeMap, HashSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use carbonsense_core::{DomainError, DomainResult, Entity, EntryId};

use crate::KG_PER_TONNE;
use crate::entry::{EmissionEntry, Scope};

/// Per-scope emission subtotals in kg CO2e.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScopeTotals {
    pub scope1_kg: f64,
    pub scope2_kg: f64,
    pub scope3_kg: f64,
}

impl ScopeTotals {
    pub fn get(&self, scope: Scope) -> f64 {
        match scope {
            Scope::Scope1 => self.scope1_kg,
            Scope::Scope2 => self.scope2_kg,
            Scope::Scope3 => self.scope3_kg,
        }
    }

    pub fn total_kg(&self) -> f64 {
        self.scope1_kg + self.scope2_kg + self.scope3_kg
    }

    fn add(&mut self, scope: Scope, kg: f64) {
        match scope {
            Scope::Scope1 => self.scope1_kg += kg,
            Scope::Scope2 => self.scope2_kg += kg,
            Scope::Scope3 => self.scope3_kg += kg,
        }
    }
}

/// Ordered collection of a company's emission entries.
///
/// Insertion order is preserved; it breaks ties when ranking sources.
/// Entry ids are unique within a ledger.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<EmissionEntry>", into = "Vec<EmissionEntry>")]
pub struct EmissionLedger {
    entries: Vec<EmissionEntry>,
}

impl EmissionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: Vec<EmissionEntry>) -> DomainResult<Self> {
        let mut ledger = Self::new();
        for entry in entries {
            ledger.push(entry)?;
        }
        Ok(ledger)
    }

    /// Append an entry; fails with `Conflict` if its id is already present.
    pub fn push(&mut self, entry: EmissionEntry) -> DomainResult<EntryId> {
        let id = *entry.id();
        if self.get(id).is_some() {
            return Err(DomainError::conflict(format!("duplicate emission entry id {id}")));
        }
        self.entries.push(entry);
        Ok(id)
    }

    /// Append a batch atomically: either every entry is added or none is.
    pub fn extend(&mut self, entries: Vec<EmissionEntry>) -> DomainResult<Vec<EntryId>> {
        let mut seen: HashSet<EntryId> = self.entries.iter().map(|e| *e.id()).collect();
        for entry in &entries {
            if !seen.insert(*entry.id()) {
                return Err(DomainError::conflict(format!(
                    "duplicate emission entry id {}",
                    entry.id()
                )));
            }
        }
        let ids = entries.iter().map(|e| *e.id()).collect();
        self.entries.extend(entries);
        Ok(ids)
    }

    /// Remove an entry by its stable id.
    pub fn remove(&mut self, id: EntryId) -> DomainResult<EmissionEntry> {
        let pos = self
            .entries
            .iter()
            .position(|e| *e.id() == id)
            .ok_or_else(DomainError::not_found)?;
        Ok(self.entries.remove(pos))
    }

    pub fn get(&self, id: EntryId) -> Option<&EmissionEntry> {
        self.entries.iter().find(|e| *e.id() == id)
    }

    pub fn entries(&self) -> &[EmissionEntry] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &EmissionEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_kg(&self) -> f64 {
        self.entries.iter().map(EmissionEntry::emissions_kg).sum()
    }

    pub fn total_tonnes(&self) -> f64 {
        self.total_kg() / KG_PER_TONNE
    }

    pub fn scope_totals(&self) -> ScopeTotals {
        let mut totals = ScopeTotals::default();
        for e in &self.entries {
            totals.add(e.scope(), e.emissions_kg());
        }
        totals
    }

    pub fn totals_by_category(&self) -> BTreeMap<String, f64> {
        self.totals_by(|e| e.category())
    }

    pub fn totals_by_business_unit(&self) -> BTreeMap<String, f64> {
        self.totals_by(|e| e.business_unit())
    }

    fn totals_by<'a, F>(&'a self, key: F) -> BTreeMap<String, f64>
    where
        F: Fn(&'a EmissionEntry) -> &'a str,
    {
        let mut out: BTreeMap<String, f64> = BTreeMap::new();
        for e in &self.entries {
            *out.entry(key(e).to_string()).or_insert(0.0) += e.emissions_kg();
        }
        out
    }

    /// Largest `n` sources, descending by emissions; ties keep ledger order.
    pub fn top_sources(&self, n: usize) -> Vec<&EmissionEntry> {
        let mut ranked: Vec<&EmissionEntry> = self.entries.iter().collect();
        // `sort_by` is stable, so equal emissions keep insertion order.
        ranked.sort_by(|a, b| b.emissions_kg().total_cmp(&a.emissions_kg()));
        ranked.truncate(n);
        ranked
    }

    /// Entries dated within `[start, end]` (inclusive).
    pub fn entries_between(&self, start: NaiveDate, end: NaiveDate) -> Vec<&EmissionEntry> {
        self.entries
            .iter()
            .filter(|e| e.date() >= start && e.date() <= end)
            .collect()
    }

    /// Fraction of entries with any verification (0.0 for an empty ledger).
    pub fn verified_share(&self) -> f64 {
        if self.entries.is_empty() {
            return 0.0;
        }
        let verified = self
            .entries
            .iter()
            .filter(|e| e.verification_status().is_verified())
            .count();
        verified as f64 / self.entries.len() as f64
    }
}

impl TryFrom<Vec<EmissionEntry>> for EmissionLedger {
    type Error = DomainError;

    fn try_from(value: Vec<EmissionEntry>) -> Result<Self, Self::Error> {
        Self::from_entries(value)
    }
}

impl From<EmissionLedger> for Vec<EmissionEntry> {
    fn from(value: EmissionLedger) -> Self {
        value.entries
    }
}

impl<'a> IntoIterator for &'a EmissionLedger {
    type Item = &'a EmissionEntry;
    type IntoIter = core::slice::Iter<'a, EmissionEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{DataQuality, NewEmissionEntry, VerificationStatus};
    use proptest::prelude::*;

    fn entry(activity: &str, scope: Scope, kg: f64, day: u32) -> EmissionEntry {
        EmissionEntry::record(NewEmissionEntry {
            date: NaiveDate::from_ymd_opt(2025, 1, day).unwrap(),
            business_unit: if scope == Scope::Scope3 { "Travel" } else { "Manufacturing" }.to_string(),
            project: "Not Applicable".to_string(),
            scope,
            category: format!("{scope} category"),
            activity: activity.to_string(),
            country: "India".to_string(),
            facility: String::new(),
            responsible_person: String::new(),
            quantity: kg,
            unit: "kg".to_string(),
            emission_factor: 1.0,
            data_quality: DataQuality::Medium,
            verification_status: if day % 2 == 0 {
                VerificationStatus::ThirdPartyVerified
            } else {
                VerificationStatus::Unverified
            },
            notes: String::new(),
        })
        .unwrap()
    }

    fn sample_ledger() -> EmissionLedger {
        EmissionLedger::from_entries(vec![
            entry("Manufacturing Equipment", Scope::Scope1, 5200.0, 1),
            entry("Heating Boiler", Scope::Scope1, 180.0, 2),
            entry("Server Operations", Scope::Scope2, 2100.0, 3),
            entry("Employee Flights", Scope::Scope3, 4500.0, 4),
            entry("Office Lighting", Scope::Scope2, 2100.0, 5),
            entry("Company Vehicles", Scope::Scope1, 650.0, 6),
        ])
        .unwrap()
    }

    #[test]
    fn totals_and_scope_breakdown() {
        let ledger = sample_ledger();
        assert_eq!(ledger.len(), 6);
        assert!((ledger.total_kg() - 14730.0).abs() < 1e-9);
        assert!((ledger.total_tonnes() - 14.73).abs() < 1e-9);

        let scopes = ledger.scope_totals();
        assert_eq!(scopes.get(Scope::Scope1), 6030.0);
        assert_eq!(scopes.get(Scope::Scope2), 4200.0);
        assert_eq!(scopes.get(Scope::Scope3), 4500.0);
    }

    #[test]
    fn grouping_by_business_unit() {
        let by_unit = sample_ledger().totals_by_business_unit();
        assert_eq!(by_unit.get("Travel"), Some(&4500.0));
        assert_eq!(by_unit.get("Manufacturing"), Some(&10230.0));
    }

    #[test]
    fn top_sources_rank_descending_with_stable_ties() {
        let ledger = sample_ledger();
        let top: Vec<&str> = ledger.top_sources(5).iter().map(|e| e.activity()).collect();
        assert_eq!(
            top,
            vec![
                "Manufacturing Equipment",
                "Employee Flights",
                "Server Operations",
                "Office Lighting",
                "Company Vehicles",
            ]
        );
    }

    #[test]
    fn remove_uses_stable_id_not_position() {
        let mut ledger = sample_ledger();
        let third = *ledger.entries()[2].id();
        let first = *ledger.entries()[0].id();

        ledger.remove(first).unwrap();
        // The third entry is still reachable by id after positions shifted.
        assert_eq!(ledger.get(third).unwrap().activity(), "Server Operations");
        assert!(matches!(ledger.remove(first), Err(DomainError::NotFound)));
        assert_eq!(ledger.len(), 5);
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut ledger = sample_ledger();
        let dup = ledger.entries()[0].clone();
        assert!(matches!(ledger.push(dup.clone()), Err(DomainError::Conflict(_))));

        let fresh = entry("Generator", Scope::Scope1, 10.0, 7);
        assert!(ledger.extend(vec![fresh, dup]).is_err());
        assert_eq!(ledger.len(), 6, "failed batch must not partially apply");
    }

    #[test]
    fn date_window_and_verified_share() {
        let ledger = sample_ledger();
        let start = NaiveDate::from_ymd_opt(2025, 1, 2).unwrap();
        let end = NaiveDate::from_ymd_opt(2025, 1, 4).unwrap();
        assert_eq!(ledger.entries_between(start, end).len(), 3);
        assert!((ledger.verified_share() - 0.5).abs() < 1e-12);
        assert_eq!(EmissionLedger::new().verified_share(), 0.0);
    }

    #[test]
    fn ledger_persists_as_plain_array() {
        let ledger = sample_ledger();
        let json = serde_json::to_value(&ledger).unwrap();
        assert!(json.is_array());
        let back: EmissionLedger = serde_json::from_value(json).unwrap();
        assert_eq!(back, ledger);
    }

    proptest! {
        /// Property: per-scope subtotals partition the ledger total.
        #[test]
        fn scope_subtotals_partition_total(
            rows in prop::collection::vec((1u8..=3, 0.0f64..100_000.0), 0..40)
        ) {
            let mut ledger = EmissionLedger::new();
            for (i, (scope, kg)) in rows.iter().enumerate() {
                let scope = Scope::from_number(*scope).unwrap();
                ledger.push(entry(&format!("source-{i}"), scope, *kg, 1 + (i as u32 % 28))).unwrap();
            }
            let total = ledger.total_kg();
            let partitioned = ledger.scope_totals().total_kg();
            prop_assert!((total - partitioned).abs() <= 1e-6 * total.max(1.0));
        }
    }
}
