use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use carbonsense_core::error::{ensure_non_negative, ensure_not_blank, ensure_positive};
use carbonsense_core::{Aggregate, AggregateId, AggregateRoot, CompanyId};
use carbonsense_events::Event;

use crate::credit::{CreditLot, LotId};
use crate::error::RegistryError;
use crate::hash::content_hash;
use crate::marketplace::{self, AMOUNT_EPSILON, MarketplaceListing, TransferLeg};
use crate::project::{BlueCarbonProject, EcosystemType, ProjectId, ProjectStatus};
use crate::verification::{VerificationId, VerificationRecord};

/// Command: RegisterProject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterProject {
    pub name: String,
    pub location: String,
    pub area_hectares: f64,
    pub ecosystem_type: EcosystemType,
    /// Tonnes CO2 per year.
    pub estimated_sequestration: f64,
    pub owner: CompanyId,
    /// Free-form project documentation; only its hash is kept.
    pub metadata: serde_json::Value,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SubmitVerification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitVerification {
    pub project_id: ProjectId,
    pub verified_amount: f64,
    pub verifier: String,
    pub verification_data: serde_json::Value,
    pub comments: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ApproveVerification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApproveVerification {
    pub verification_id: VerificationId,
    /// Price per tonne of the lot issued to the project owner.
    pub price_per_ton: f64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RecordEmissions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordEmissions {
    pub company: CompanyId,
    pub amount_tonnes: f64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: PurchaseCredits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseCredits {
    pub buyer: CompanyId,
    pub seller: CompanyId,
    pub amount: f64,
    /// Applied to the buyer's new lots as given; not checked against listings.
    pub price_per_ton: f64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RegistryCommand {
    RegisterProject(RegisterProject),
    SubmitVerification(SubmitVerification),
    ApproveVerification(ApproveVerification),
    RecordEmissions(RecordEmissions),
    PurchaseCredits(PurchaseCredits),
}

/// Event: ProjectRegistered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectRegistered {
    pub project_id: ProjectId,
    pub name: String,
    pub location: String,
    pub area_hectares: f64,
    pub ecosystem_type: EcosystemType,
    pub estimated_sequestration: f64,
    pub owner: CompanyId,
    pub content_hash: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: VerificationSubmitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationSubmitted {
    pub verification_id: VerificationId,
    pub project_id: ProjectId,
    pub verifier: String,
    pub verified_amount: f64,
    pub data_hash: String,
    pub comments: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: VerificationApproved. Carries the lot it issued.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationApproved {
    pub verification_id: VerificationId,
    pub project_id: ProjectId,
    pub lot_id: LotId,
    pub owner: CompanyId,
    pub amount: f64,
    pub price_per_ton: f64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: EmissionsRecorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmissionsRecorded {
    pub company: CompanyId,
    pub amount_tonnes: f64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: CreditsTransferred.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditsTransferred {
    pub buyer: CompanyId,
    pub seller: CompanyId,
    pub amount: f64,
    pub price_per_ton: f64,
    pub legs: Vec<TransferLeg>,
    pub occurred_at: DateTime<Utc>,
}

impl CreditsTransferred {
    pub fn total_cost(&self) -> f64 {
        self.amount * self.price_per_ton
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RegistryEvent {
    ProjectRegistered(ProjectRegistered),
    VerificationSubmitted(VerificationSubmitted),
    VerificationApproved(VerificationApproved),
    EmissionsRecorded(EmissionsRecorded),
    CreditsTransferred(CreditsTransferred),
}

impl Event for RegistryEvent {
    fn event_type(&self) -> &'static str {
        match self {
            RegistryEvent::ProjectRegistered(_) => "registry.project.registered",
            RegistryEvent::VerificationSubmitted(_) => "registry.verification.submitted",
            RegistryEvent::VerificationApproved(_) => "registry.verification.approved",
            RegistryEvent::EmissionsRecorded(_) => "registry.emissions.recorded",
            RegistryEvent::CreditsTransferred(_) => "registry.credits.transferred",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            RegistryEvent::ProjectRegistered(e) => e.occurred_at,
            RegistryEvent::VerificationSubmitted(e) => e.occurred_at,
            RegistryEvent::VerificationApproved(e) => e.occurred_at,
            RegistryEvent::EmissionsRecorded(e) => e.occurred_at,
            RegistryEvent::CreditsTransferred(e) => e.occurred_at,
        }
    }
}

/// Whether a company's credits exceed its recorded emissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CarbonPosition {
    #[serde(rename = "Carbon Positive")]
    Positive,
    #[serde(rename = "Carbon Negative")]
    Negative,
}

impl CarbonPosition {
    /// Strictly positive net balance is `Positive`; zero is `Negative`.
    pub fn from_net(net: f64) -> Self {
        if net > 0.0 {
            CarbonPosition::Positive
        } else {
            CarbonPosition::Negative
        }
    }
}

/// Per-company registry view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyDashboard {
    pub company_address: CompanyId,
    pub carbon_credits: f64,
    pub total_emissions: f64,
    pub net_balance: f64,
    pub owned_projects: Vec<BlueCarbonProject>,
    pub verification_status: CarbonPosition,
    pub marketplace_listings: Vec<MarketplaceListing>,
}

/// Registry-wide totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryStats {
    pub total_projects: usize,
    pub total_verifications: usize,
    pub pending_verifications: usize,
    pub total_active_credits: f64,
    pub total_emissions_recorded: f64,
    pub companies_with_credits: usize,
    pub projects_by_ecosystem: BTreeMap<String, usize>,
}

/// Aggregate root: CarbonRegistry.
///
/// Owns every project, verification and credit lot. Lots are kept in
/// creation order, which is the order the marketplace walks them in.
#[derive(Debug, Clone, PartialEq)]
pub struct CarbonRegistry {
    id: AggregateId,
    projects: BTreeMap<ProjectId, BlueCarbonProject>,
    verifications: BTreeMap<VerificationId, VerificationRecord>,
    lots: Vec<CreditLot>,
    emissions: BTreeMap<CompanyId, f64>,
    next_project_id: ProjectId,
    next_verification_id: VerificationId,
    next_lot_id: LotId,
    version: u64,
}

impl CarbonRegistry {
    /// Empty registry for a stream, ready for rehydration.
    pub fn empty(id: AggregateId) -> Self {
        Self {
            id,
            projects: BTreeMap::new(),
            verifications: BTreeMap::new(),
            lots: Vec::new(),
            emissions: BTreeMap::new(),
            next_project_id: ProjectId::FIRST,
            next_verification_id: VerificationId::FIRST,
            next_lot_id: LotId::FIRST,
            version: 0,
        }
    }

    pub fn project(&self, id: ProjectId) -> Option<&BlueCarbonProject> {
        self.projects.get(&id)
    }

    /// Projects in id order.
    pub fn projects(&self) -> impl Iterator<Item = &BlueCarbonProject> {
        self.projects.values()
    }

    pub fn verification(&self, id: VerificationId) -> Option<&VerificationRecord> {
        self.verifications.get(&id)
    }

    pub fn verifications_for(&self, project_id: ProjectId) -> Vec<&VerificationRecord> {
        self.verifications
            .values()
            .filter(|v| v.project_id == project_id)
            .collect()
    }

    pub fn pending_verifications(&self) -> Vec<&VerificationRecord> {
        self.verifications.values().filter(|v| !v.is_approved).collect()
    }

    /// Every lot ever created, active or not.
    pub fn lots(&self) -> &[CreditLot] {
        &self.lots
    }

    /// Active lots held by `company`, in creation order.
    pub fn lots_held_by<'a>(&'a self, company: &'a CompanyId) -> impl Iterator<Item = &'a CreditLot> {
        self.lots
            .iter()
            .filter(move |l| l.is_active && &l.holder == company)
    }

    /// Sum of the company's active lots.
    pub fn balance(&self, company: &CompanyId) -> f64 {
        self.lots_held_by(company).map(|l| l.amount).sum()
    }

    /// Cumulative tonnes recorded for the company.
    pub fn emissions(&self, company: &CompanyId) -> f64 {
        self.emissions.get(company).copied().unwrap_or(0.0)
    }

    pub fn net_balance(&self, company: &CompanyId) -> f64 {
        self.balance(company) - self.emissions(company)
    }

    pub fn total_active_credits(&self) -> f64 {
        self.lots.iter().filter(|l| l.is_active).map(|l| l.amount).sum()
    }

    /// Every active lot, in creation order.
    pub fn listings(&self) -> Vec<MarketplaceListing> {
        self.lots
            .iter()
            .filter(|l| l.is_active)
            .map(MarketplaceListing::from)
            .collect()
    }

    pub fn dashboard(&self, company: &CompanyId) -> CompanyDashboard {
        let net_balance = self.net_balance(company);
        CompanyDashboard {
            company_address: company.clone(),
            carbon_credits: self.balance(company),
            total_emissions: self.emissions(company),
            net_balance,
            owned_projects: self
                .projects
                .values()
                .filter(|p| &p.owner == company)
                .cloned()
                .collect(),
            verification_status: CarbonPosition::from_net(net_balance),
            marketplace_listings: self.lots_held_by(company).map(MarketplaceListing::from).collect(),
        }
    }

    pub fn stats(&self) -> RegistryStats {
        let mut projects_by_ecosystem = BTreeMap::new();
        for p in self.projects.values() {
            *projects_by_ecosystem
                .entry(p.ecosystem_type.as_str().to_string())
                .or_insert(0) += 1;
        }

        let mut holders: Vec<&CompanyId> = self
            .lots
            .iter()
            .filter(|l| l.is_active)
            .map(|l| &l.holder)
            .collect();
        holders.sort();
        holders.dedup();

        RegistryStats {
            total_projects: self.projects.len(),
            total_verifications: self.verifications.len(),
            pending_verifications: self.verifications.values().filter(|v| !v.is_approved).count(),
            total_active_credits: self.total_active_credits(),
            total_emissions_recorded: self.emissions.values().sum(),
            companies_with_credits: holders.len(),
            projects_by_ecosystem,
        }
    }
}

impl AggregateRoot for CarbonRegistry {
    type Id = AggregateId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

impl Aggregate for CarbonRegistry {
    type Command = RegistryCommand;
    type Event = RegistryEvent;
    type Error = RegistryError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            RegistryEvent::ProjectRegistered(e) => {
                self.projects.insert(
                    e.project_id,
                    BlueCarbonProject {
                        id: e.project_id,
                        name: e.name.clone(),
                        location: e.location.clone(),
                        area_hectares: e.area_hectares,
                        ecosystem_type: e.ecosystem_type,
                        owner: e.owner.clone(),
                        estimated_sequestration: e.estimated_sequestration,
                        created_at: e.occurred_at,
                        status: ProjectStatus::Proposed,
                        content_hash: e.content_hash.clone(),
                    },
                );
                self.next_project_id = self.next_project_id.max(e.project_id.next());
            }
            RegistryEvent::VerificationSubmitted(e) => {
                self.verifications.insert(
                    e.verification_id,
                    VerificationRecord {
                        id: e.verification_id,
                        project_id: e.project_id,
                        verifier: e.verifier.clone(),
                        verified_amount: e.verified_amount,
                        verification_date: e.occurred_at,
                        data_hash: e.data_hash.clone(),
                        is_approved: false,
                        comments: e.comments.clone(),
                    },
                );
                self.next_verification_id = self.next_verification_id.max(e.verification_id.next());
            }
            RegistryEvent::VerificationApproved(e) => {
                if let Some(v) = self.verifications.get_mut(&e.verification_id) {
                    v.is_approved = true;
                }
                if let Some(p) = self.projects.get_mut(&e.project_id) {
                    p.status = ProjectStatus::Verified;
                }
                self.lots.push(CreditLot {
                    id: e.lot_id,
                    project_id: e.project_id,
                    amount: e.amount,
                    price_per_ton: e.price_per_ton,
                    holder: e.owner.clone(),
                    is_active: true,
                    created_at: e.occurred_at,
                });
                self.next_lot_id = self.next_lot_id.max(e.lot_id.next());
            }
            RegistryEvent::EmissionsRecorded(e) => {
                *self.emissions.entry(e.company.clone()).or_insert(0.0) += e.amount_tonnes;
            }
            RegistryEvent::CreditsTransferred(e) => {
                for leg in &e.legs {
                    if let Some(source) = self.lots.iter_mut().find(|l| l.id == leg.source_lot) {
                        if leg.exhausts_source {
                            source.is_active = false;
                        } else {
                            source.amount -= leg.amount;
                        }
                    }
                    self.lots.push(CreditLot {
                        id: leg.new_lot,
                        project_id: leg.project_id,
                        amount: leg.amount,
                        price_per_ton: e.price_per_ton,
                        holder: e.buyer.clone(),
                        is_active: true,
                        created_at: e.occurred_at,
                    });
                    self.next_lot_id = self.next_lot_id.max(leg.new_lot.next());
                }
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            RegistryCommand::RegisterProject(cmd) => self.handle_register(cmd),
            RegistryCommand::SubmitVerification(cmd) => self.handle_submit(cmd),
            RegistryCommand::ApproveVerification(cmd) => self.handle_approve(cmd),
            RegistryCommand::RecordEmissions(cmd) => self.handle_record_emissions(cmd),
            RegistryCommand::PurchaseCredits(cmd) => self.handle_purchase(cmd),
        }
    }
}

impl CarbonRegistry {
    fn handle_register(&self, cmd: &RegisterProject) -> Result<Vec<RegistryEvent>, RegistryError> {
        ensure_not_blank("name", &cmd.name)?;
        ensure_not_blank("location", &cmd.location)?;
        ensure_positive("area_hectares", cmd.area_hectares)?;
        ensure_non_negative("estimated_sequestration", cmd.estimated_sequestration)?;

        Ok(vec![RegistryEvent::ProjectRegistered(ProjectRegistered {
            project_id: self.next_project_id,
            name: cmd.name.trim().to_string(),
            location: cmd.location.trim().to_string(),
            area_hectares: cmd.area_hectares,
            ecosystem_type: cmd.ecosystem_type,
            estimated_sequestration: cmd.estimated_sequestration,
            owner: cmd.owner.clone(),
            content_hash: content_hash(&cmd.metadata),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_submit(&self, cmd: &SubmitVerification) -> Result<Vec<RegistryEvent>, RegistryError> {
        if !self.projects.contains_key(&cmd.project_id) {
            return Err(RegistryError::ProjectNotFound(cmd.project_id));
        }
        ensure_positive("verified_amount", cmd.verified_amount)?;
        ensure_not_blank("verifier", &cmd.verifier)?;

        Ok(vec![RegistryEvent::VerificationSubmitted(VerificationSubmitted {
            verification_id: self.next_verification_id,
            project_id: cmd.project_id,
            verifier: cmd.verifier.trim().to_string(),
            verified_amount: cmd.verified_amount,
            data_hash: content_hash(&cmd.verification_data),
            comments: cmd.comments.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_approve(&self, cmd: &ApproveVerification) -> Result<Vec<RegistryEvent>, RegistryError> {
        let verification = self
            .verifications
            .get(&cmd.verification_id)
            .ok_or(RegistryError::VerificationNotFound(cmd.verification_id))?;
        if verification.is_approved {
            return Err(RegistryError::AlreadyApproved(cmd.verification_id));
        }
        let project = self
            .projects
            .get(&verification.project_id)
            .ok_or(RegistryError::ProjectNotFound(verification.project_id))?;
        ensure_non_negative("price_per_ton", cmd.price_per_ton)?;

        Ok(vec![RegistryEvent::VerificationApproved(VerificationApproved {
            verification_id: verification.id,
            project_id: project.id,
            lot_id: self.next_lot_id,
            owner: project.owner.clone(),
            amount: verification.verified_amount,
            price_per_ton: cmd.price_per_ton,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_record_emissions(
        &self,
        cmd: &RecordEmissions,
    ) -> Result<Vec<RegistryEvent>, RegistryError> {
        ensure_non_negative("amount_tonnes", cmd.amount_tonnes)?;

        Ok(vec![RegistryEvent::EmissionsRecorded(EmissionsRecorded {
            company: cmd.company.clone(),
            amount_tonnes: cmd.amount_tonnes,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_purchase(&self, cmd: &PurchaseCredits) -> Result<Vec<RegistryEvent>, RegistryError> {
        ensure_positive("amount", cmd.amount)?;
        ensure_non_negative("price_per_ton", cmd.price_per_ton)?;
        if cmd.buyer == cmd.seller {
            return Err(RegistryError::Validation(
                "buyer and seller must be different companies".to_string(),
            ));
        }

        let available = self.balance(&cmd.seller);
        if cmd.amount > available + AMOUNT_EPSILON {
            return Err(RegistryError::InsufficientCredits {
                available,
                requested: cmd.amount,
            });
        }

        let legs = marketplace::plan_transfer(
            self.lots_held_by(&cmd.seller),
            cmd.amount,
            self.next_lot_id,
        );
        // Within the tolerance the plan can move slightly more or less than
        // asked; the event records what actually changed hands.
        let moved: f64 = legs.iter().map(|leg| leg.amount).sum();

        Ok(vec![RegistryEvent::CreditsTransferred(CreditsTransferred {
            buyer: cmd.buyer.clone(),
            seller: cmd.seller.clone(),
            amount: moved,
            price_per_ton: cmd.price_per_ton,
            legs,
            occurred_at: cmd.occurred_at,
        })])
    }
}
