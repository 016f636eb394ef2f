//! File-backed company directory and per-company emission ledgers.
//!
//! Layout under the data dir:
//!
//! ```text
//! companies.json                      company_id -> CompanyRecord
//! company_<id>/emissions.json         [EmissionEntry]
//! company_<id>/carbon_credits.json    CreditAccount
//! ```

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use carbonsense_core::error::ensure_not_blank;
use carbonsense_core::{CompanyId, DomainError, EntryId};
use carbonsense_emissions::{EmissionEntry, EmissionLedger, EmissionRecord, NewEmissionEntry, KG_PER_TONNE};
use carbonsense_registry::CarbonPosition;

use crate::storage::{JsonFileStore, StorageError};

const COMPANIES_FILE: &str = "companies.json";

/// Credits granted on registration.
pub const WELCOME_BONUS_CREDITS: f64 = 100.0;

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("company with email {0} already registered")]
    DuplicateEmail(String),

    #[error("company {0} not found")]
    NotFound(CompanyId),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("company directory lock poisoned")]
    Poisoned,
}

/// Registration form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCompany {
    pub company_name: String,
    pub email: String,
    pub industry: String,
    pub location: String,
    pub size: String,
    pub contact_person: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub website: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyRecord {
    pub company_id: CompanyId,
    pub company_name: String,
    pub email: String,
    pub industry: String,
    pub location: String,
    pub size: String,
    pub contact_person: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub website: String,
    pub registration_date: DateTime<Utc>,
    #[serde(default)]
    pub initial_carbon_credits: f64,
    /// Running total in kg CO2e.
    #[serde(default)]
    pub total_emissions: f64,
    #[serde(default)]
    pub carbon_credits: f64,
    pub is_active: bool,
    /// Registry key for this company (`0x` + id).
    pub blockchain_address: CompanyId,
    pub verification_status: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Earned,
    Purchased,
    Used,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditTransaction {
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    pub amount: f64,
    pub reason: String,
    pub date: DateTime<Utc>,
}

/// Contents of `carbon_credits.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreditAccount {
    pub credits_earned: f64,
    pub credits_purchased: f64,
    pub credits_used: f64,
    pub credits_available: f64,
    #[serde(default)]
    pub transactions: Vec<CreditTransaction>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarbonSummary {
    pub company_name: String,
    pub company_id: CompanyId,
    pub total_carbon_credits: f64,
    pub credits_earned: f64,
    pub credits_purchased: f64,
    pub credits_used: f64,
    pub total_emissions_kg: f64,
    pub total_emissions_tonnes: f64,
    /// Credits left after covering emissions, never below zero.
    pub remaining_credits: f64,
    pub carbon_status: CarbonPosition,
    pub emissions_count: usize,
    pub last_updated: DateTime<Utc>,
}

/// Company registry backed by JSON files.
///
/// The company map is cached behind a `RwLock`; read-modify-write cycles on a
/// company's files take that company's own mutex.
#[derive(Debug)]
pub struct CompanyDirectory {
    store: JsonFileStore,
    companies: RwLock<BTreeMap<CompanyId, CompanyRecord>>,
    company_locks: Mutex<HashMap<CompanyId, Arc<Mutex<()>>>>,
}

impl CompanyDirectory {
    pub fn open(data_dir: impl Into<PathBuf>) -> Result<Self, DirectoryError> {
        let store = JsonFileStore::new(data_dir);
        let companies: BTreeMap<CompanyId, CompanyRecord> = store.load_or_default(COMPANIES_FILE)?;
        tracing::debug!(root = %store.root().display(), companies = companies.len(), "company directory opened");
        Ok(Self {
            store,
            companies: RwLock::new(companies),
            company_locks: Mutex::new(HashMap::new()),
        })
    }

    /// Register a company, create its files and grant the welcome bonus.
    pub fn register(&self, form: NewCompany) -> Result<CompanyRecord, DirectoryError> {
        ensure_not_blank("company_name", &form.company_name)?;
        ensure_not_blank("email", &form.email)?;
        if !form.email.contains('@') {
            return Err(DomainError::validation(format!("invalid email '{}'", form.email)).into());
        }

        let record = {
            let mut companies = self.companies.write().map_err(|_| DirectoryError::Poisoned)?;
            let email = form.email.trim();
            if companies.values().any(|c| c.email.eq_ignore_ascii_case(email)) {
                return Err(DirectoryError::DuplicateEmail(email.to_string()));
            }

            let now = Utc::now();
            let company_id = generate_company_id(&form.company_name, email, now)?;
            let record = CompanyRecord {
                blockchain_address: CompanyId::new(format!("0x{company_id}"))?,
                company_id: company_id.clone(),
                company_name: form.company_name.trim().to_string(),
                email: email.to_string(),
                industry: form.industry,
                location: form.location,
                size: form.size,
                contact_person: form.contact_person,
                phone: form.phone,
                website: form.website,
                registration_date: now,
                initial_carbon_credits: 0.0,
                total_emissions: 0.0,
                carbon_credits: 0.0,
                is_active: true,
                verification_status: "pending".to_string(),
            };

            companies.insert(company_id, record.clone());
            self.store.save(COMPANIES_FILE, &*companies)?;
            record
        };

        let id = record.company_id.clone();
        self.store.create_if_missing(emissions_path(&id), &Vec::<EmissionEntry>::new())?;
        self.store.create_if_missing(credits_path(&id), &CreditAccount::default())?;

        tracing::info!(company_id = %id, address = %record.blockchain_address, "company registered");

        self.award_credits(&id, WELCOME_BONUS_CREDITS, "Welcome bonus for new registration")?;
        self.get(&id)?.ok_or(DirectoryError::NotFound(id))
    }

    pub fn get(&self, id: &CompanyId) -> Result<Option<CompanyRecord>, DirectoryError> {
        let companies = self.companies.read().map_err(|_| DirectoryError::Poisoned)?;
        Ok(companies.get(id).cloned())
    }

    pub fn by_email(&self, email: &str) -> Result<Option<CompanyRecord>, DirectoryError> {
        let companies = self.companies.read().map_err(|_| DirectoryError::Poisoned)?;
        Ok(companies
            .values()
            .find(|c| c.email.eq_ignore_ascii_case(email.trim()))
            .cloned())
    }

    pub fn all(&self) -> Result<Vec<CompanyRecord>, DirectoryError> {
        let companies = self.companies.read().map_err(|_| DirectoryError::Poisoned)?;
        Ok(companies.values().cloned().collect())
    }

    /// Adjust the running emissions total (kg); clamps at zero.
    pub fn add_emissions(&self, id: &CompanyId, delta_kg: f64) -> Result<f64, DirectoryError> {
        self.update_record(id, |record| {
            record.total_emissions = (record.total_emissions + delta_kg).max(0.0);
            record.total_emissions
        })
    }

    pub fn award_credits(&self, id: &CompanyId, credits: f64, reason: &str) -> Result<CreditAccount, DirectoryError> {
        carbonsense_core::error::ensure_non_negative("credits", credits)?;
        let lock = self.company_lock(id)?;
        let _guard = lock.lock().map_err(|_| DirectoryError::Poisoned)?;

        self.update_record(id, |record| record.carbon_credits += credits)?;

        let mut account: CreditAccount = self.store.load_or_default(credits_path(id))?;
        account.credits_earned += credits;
        account.credits_available += credits;
        account.transactions.push(CreditTransaction {
            kind: TransactionKind::Earned,
            amount: credits,
            reason: reason.to_string(),
            date: Utc::now(),
        });
        self.store.save(credits_path(id), &account)?;

        tracing::info!(company_id = %id, credits, reason, "credits awarded");
        Ok(account)
    }

    pub fn credit_account(&self, id: &CompanyId) -> Result<CreditAccount, DirectoryError> {
        self.ensure_exists(id)?;
        Ok(self.store.load_or_default(credits_path(id))?)
    }

    /// Load a company's ledger. Rows persisted without an id get one and the
    /// file is rewritten so the ids stay stable.
    pub fn load_ledger(&self, id: &CompanyId) -> Result<EmissionLedger, DirectoryError> {
        self.ensure_exists(id)?;
        let lock = self.company_lock(id)?;
        let _guard = lock.lock().map_err(|_| DirectoryError::Poisoned)?;
        self.load_ledger_locked(id)
    }

    pub fn save_ledger(&self, id: &CompanyId, ledger: &EmissionLedger) -> Result<(), DirectoryError> {
        self.ensure_exists(id)?;
        let lock = self.company_lock(id)?;
        let _guard = lock.lock().map_err(|_| DirectoryError::Poisoned)?;
        self.store.save(emissions_path(id), ledger)?;
        Ok(())
    }

    /// Record one entry from form input.
    pub fn record_emission(&self, id: &CompanyId, input: NewEmissionEntry) -> Result<EmissionEntry, DirectoryError> {
        let entry = EmissionEntry::record(input)?;
        self.append_entries(id, vec![entry.clone()])?;
        Ok(entry)
    }

    /// Import loosely-typed rows; all or nothing.
    pub fn import_emissions(&self, id: &CompanyId, rows: Vec<EmissionRecord>) -> Result<Vec<EmissionEntry>, DirectoryError> {
        let entries = rows
            .into_iter()
            .map(EmissionEntry::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        self.append_entries(id, entries.clone())?;
        Ok(entries)
    }

    pub fn remove_emission(&self, id: &CompanyId, entry_id: EntryId) -> Result<EmissionEntry, DirectoryError> {
        self.ensure_exists(id)?;
        let removed = {
            let lock = self.company_lock(id)?;
            let _guard = lock.lock().map_err(|_| DirectoryError::Poisoned)?;
            let mut ledger = self.load_ledger_locked(id)?;
            let removed = ledger.remove(entry_id)?;
            self.store.save(emissions_path(id), &ledger)?;
            removed
        };
        self.add_emissions(id, -removed.emissions_kg())?;
        Ok(removed)
    }

    /// Credits left after covering ledger emissions (in tonnes).
    pub fn carbon_summary(&self, id: &CompanyId) -> Result<CarbonSummary, DirectoryError> {
        let record = self.get(id)?.ok_or_else(|| DirectoryError::NotFound(id.clone()))?;
        let account = self.credit_account(id)?;
        let ledger = self.load_ledger(id)?;

        let total_kg = ledger.total_kg();
        let remaining = account.credits_available - total_kg / KG_PER_TONNE;

        Ok(CarbonSummary {
            company_name: record.company_name,
            company_id: record.company_id,
            total_carbon_credits: account.credits_available,
            credits_earned: account.credits_earned,
            credits_purchased: account.credits_purchased,
            credits_used: account.credits_used,
            total_emissions_kg: total_kg,
            total_emissions_tonnes: total_kg / KG_PER_TONNE,
            remaining_credits: remaining.max(0.0),
            carbon_status: CarbonPosition::from_net(remaining),
            emissions_count: ledger.len(),
            last_updated: Utc::now(),
        })
    }

    fn append_entries(&self, id: &CompanyId, entries: Vec<EmissionEntry>) -> Result<(), DirectoryError> {
        self.ensure_exists(id)?;
        let added_kg: f64 = entries.iter().map(EmissionEntry::emissions_kg).sum();
        {
            let lock = self.company_lock(id)?;
            let _guard = lock.lock().map_err(|_| DirectoryError::Poisoned)?;
            let mut ledger = self.load_ledger_locked(id)?;
            ledger.extend(entries)?;
            self.store.save(emissions_path(id), &ledger)?;
        }
        self.add_emissions(id, added_kg)?;
        Ok(())
    }

    fn load_ledger_locked(&self, id: &CompanyId) -> Result<EmissionLedger, DirectoryError> {
        let rows: Vec<serde_json::Value> = self.store.load_or_default(emissions_path(id))?;
        let needs_ids = rows.iter().any(|r| r.get("id").is_none_or(|v| v.is_null()));
        let ledger: EmissionLedger = serde_json::from_value(serde_json::Value::Array(rows))
            .map_err(|e| DomainError::validation(format!("invalid emissions file for {id}: {e}")))?;
        if needs_ids {
            tracing::info!(company_id = %id, "assigning ids to legacy emission rows");
            self.store.save(emissions_path(id), &ledger)?;
        }
        Ok(ledger)
    }

    fn update_record<T>(&self, id: &CompanyId, f: impl FnOnce(&mut CompanyRecord) -> T) -> Result<T, DirectoryError> {
        let mut companies = self.companies.write().map_err(|_| DirectoryError::Poisoned)?;
        let record = companies.get_mut(id).ok_or_else(|| DirectoryError::NotFound(id.clone()))?;
        let out = f(record);
        self.store.save(COMPANIES_FILE, &*companies)?;
        Ok(out)
    }

    fn ensure_exists(&self, id: &CompanyId) -> Result<(), DirectoryError> {
        let companies = self.companies.read().map_err(|_| DirectoryError::Poisoned)?;
        if companies.contains_key(id) {
            Ok(())
        } else {
            Err(DirectoryError::NotFound(id.clone()))
        }
    }

    fn company_lock(&self, id: &CompanyId) -> Result<Arc<Mutex<()>>, DirectoryError> {
        let mut locks = self.company_locks.lock().map_err(|_| DirectoryError::Poisoned)?;
        Ok(Arc::clone(locks.entry(id.clone()).or_default()))
    }
}

/// First 12 hex chars of SHA-256 over `name_email_timestamp`.
fn generate_company_id(name: &str, email: &str, at: DateTime<Utc>) -> Result<CompanyId, DomainError> {
    let seed = format!("{}_{}_{}", name.trim(), email, at.timestamp_nanos_opt().unwrap_or_default());
    let digest = hex::encode(Sha256::digest(seed.as_bytes()));
    CompanyId::new(&digest[..12])
}

fn emissions_path(id: &CompanyId) -> String {
    format!("company_{id}/emissions.json")
}

fn credits_path(id: &CompanyId) -> String {
    format!("company_{id}/carbon_credits.json")
}
