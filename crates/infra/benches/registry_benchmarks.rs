use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use std::sync::Arc;

use chrono::NaiveDate;
use carbonsense_compliance::{AssessmentPeriod, CompanyProfile, ComplianceAssessor};
use carbonsense_core::CompanyId;
use carbonsense_emissions::{
    DataQuality, EmissionEntry, EmissionLedger, NewEmissionEntry, Scope, VerificationStatus,
};
use carbonsense_infra::event_store::InMemoryEventStore;
use carbonsense_infra::registry_service::{NewProject, RegistryService};
use carbonsense_registry::EcosystemType;

fn company(name: &str) -> CompanyId {
    CompanyId::new(name).unwrap()
}

fn project(owner: &CompanyId) -> NewProject {
    NewProject {
        name: "Sundarbans Mangrove Restoration".to_string(),
        location: "West Bengal".to_string(),
        area_hectares: 150.0,
        ecosystem_type: EcosystemType::Mangrove,
        estimated_sequestration: 500.0,
        owner: owner.clone(),
        metadata: serde_json::Value::Null,
    }
}

/// Service with `lots` approved verifications held by the seller.
fn seeded_service(lots: usize) -> (RegistryService<Arc<InMemoryEventStore>>, CompanyId, CompanyId) {
    let service = RegistryService::open(Arc::new(InMemoryEventStore::new())).unwrap();
    let seller = company("0xseller");
    let buyer = company("0xbuyer");
    let registered = service.register_project(project(&seller)).unwrap();
    for _ in 0..lots {
        let v = service
            .submit_verification(registered.id, 1_000.0, "NCCR", serde_json::json!({}), "")
            .unwrap();
        service.approve_verification(v).unwrap();
    }
    (service, seller, buyer)
}

fn bench_registry_commands(c: &mut Criterion) {
    let mut group = c.benchmark_group("registry_commands");

    group.bench_function("register_project", |b| {
        let service = RegistryService::open(Arc::new(InMemoryEventStore::new())).unwrap();
        let owner = company("0xowner");
        b.iter(|| black_box(service.register_project(project(&owner)).unwrap()));
    });

    group.bench_function("submit_and_approve", |b| {
        let (service, seller, _) = seeded_service(0);
        let id = service.register_project(project(&seller)).unwrap().id;
        b.iter(|| {
            let v = service
                .submit_verification(id, black_box(42.0), "NCCR", serde_json::Value::Null, "")
                .unwrap();
            black_box(service.approve_verification(v).unwrap());
        });
    });

    group.finish();
}

fn bench_purchase_across_lots(c: &mut Criterion) {
    let mut group = c.benchmark_group("purchase_across_lots");

    for lots in [1usize, 10, 100] {
        group.throughput(Throughput::Elements(lots as u64));
        group.bench_with_input(BenchmarkId::new("split_purchase", lots), &lots, |b, &lots| {
            // Seller holds `lots` lots of 1000 t; each purchase touches every one.
            let (service, seller, buyer) = seeded_service(lots);
            let amount = (lots as f64 - 0.5) * 1_000.0;
            b.iter(|| {
                black_box(
                    service
                        .purchase(buyer.clone(), seller.clone(), black_box(amount), 65.0)
                        .unwrap(),
                );
                // Hand the credits back so the seller's balance stays constant.
                service.purchase(seller.clone(), buyer.clone(), amount, 65.0).unwrap();
            });
        });
    }

    group.finish();
}

fn bench_rehydration(c: &mut Criterion) {
    let mut group = c.benchmark_group("registry_rehydration");
    group.sample_size(20);

    for lots in [10usize, 100, 1000] {
        let (service, _, _) = seeded_service(lots);
        let store = Arc::clone(service.store());
        group.bench_with_input(BenchmarkId::new("replay", lots), &lots, |b, _| {
            b.iter(|| black_box(RegistryService::open(Arc::clone(&store)).unwrap()));
        });
    }

    group.finish();
}

fn ledger(entries: usize) -> EmissionLedger {
    let scopes = [Scope::Scope1, Scope::Scope2, Scope::Scope3];
    let rows = (0..entries)
        .map(|i| {
            EmissionEntry::record(NewEmissionEntry {
                date: NaiveDate::from_ymd_opt(2025, 1 + (i % 12) as u32, 1).unwrap(),
                business_unit: "Manufacturing".to_string(),
                project: "Not Applicable".to_string(),
                scope: scopes[i % 3],
                category: format!("Category {}", i % 7),
                activity: format!("Activity {i}"),
                country: "India".to_string(),
                facility: String::new(),
                responsible_person: String::new(),
                quantity: (i % 500) as f64,
                unit: "kg".to_string(),
                emission_factor: 1.5,
                data_quality: DataQuality::Medium,
                verification_status: VerificationStatus::Unverified,
                notes: String::new(),
            })
            .unwrap()
        })
        .collect();
    EmissionLedger::from_entries(rows).unwrap()
}

fn bench_assessment(c: &mut Criterion) {
    let mut group = c.benchmark_group("compliance_assessment");
    let assessor = ComplianceAssessor::default();
    let profile = CompanyProfile {
        name: "Green Textiles".to_string(),
        industry: "manufacturing".to_string(),
        employees: 50,
        revenue_million: 100.0,
        country: "India".to_string(),
    };

    for entries in [10usize, 1_000, 10_000] {
        let ledger = ledger(entries);
        group.throughput(Throughput::Elements(entries as u64));
        group.bench_with_input(BenchmarkId::new("assess", entries), &ledger, |b, ledger| {
            b.iter(|| black_box(assessor.assess(ledger, &profile, AssessmentPeriod::annual()).unwrap()));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_registry_commands,
    bench_purchase_across_lots,
    bench_rehydration,
    bench_assessment
);
criterion_main!(benches);
