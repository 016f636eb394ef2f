use std::path::Path;

use carbonsense_infra::AppConfig;
use reqwest::StatusCode;
use serde_json::json;

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn(data_dir: &Path) -> Self {
        // Same router as prod, bound to an ephemeral port over a temp data dir.
        let config = AppConfig {
            data_dir: data_dir.to_path_buf(),
            event_log: data_dir.join("registry_events.jsonl"),
            bind_addr: "127.0.0.1:0".to_string(),
            ..AppConfig::default()
        };
        let app = carbonsense_api::app::build_app(config).expect("failed to build app");
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn post(client: &reqwest::Client, url: String, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
    let res = client.post(url).json(&body).send().await.unwrap();
    let status = res.status();
    (status, res.json().await.unwrap_or(serde_json::Value::Null))
}

async fn get(client: &reqwest::Client, url: String) -> (StatusCode, serde_json::Value) {
    let res = client.get(url).send().await.unwrap();
    let status = res.status();
    (status, res.json().await.unwrap_or(serde_json::Value::Null))
}

fn assert_close(value: &serde_json::Value, expected: f64) {
    let actual = value.as_f64().unwrap_or(f64::NAN);
    assert!((actual - expected).abs() < 1e-6, "expected {expected}, got {value}");
}

fn mangrove_project(owner: &str) -> serde_json::Value {
    json!({
        "name": "Sundarbans Mangrove Restoration",
        "location": "West Bengal, India",
        "area_hectares": 150.0,
        "ecosystem_type": "mangrove",
        "estimated_sequestration": 500.0,
        "owner": owner,
        "metadata": { "survey": "2025-Q1" }
    })
}

/// Register, submit and approve; returns the project id.
async fn issue_credits(client: &reqwest::Client, srv: &TestServer, owner: &str, amount: f64) -> u64 {
    let (status, project) = post(client, srv.url("/api/projects"), mangrove_project(owner)).await;
    assert_eq!(status, StatusCode::CREATED);
    let project_id = project["id"].as_u64().unwrap();

    let (status, submitted) = post(
        client,
        srv.url("/api/verifications"),
        json!({ "project_id": project_id, "verified_amount": amount, "verifier": "NCCR Field Team" }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let verification_id = submitted["verification_id"].as_u64().unwrap();

    let (status, _) = post(
        client,
        srv.url(&format!("/api/verifications/{verification_id}/approve")),
        json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    project_id
}

#[tokio::test]
async fn health_is_ok() {
    let dir = tempfile::tempdir().unwrap();
    let srv = TestServer::spawn(dir.path()).await;
    let res = reqwest::get(srv.url("/health")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn verification_issues_credits_once() {
    let dir = tempfile::tempdir().unwrap();
    let srv = TestServer::spawn(dir.path()).await;
    let client = reqwest::Client::new();

    let project_id = issue_credits(&client, &srv, "0xowner", 68.5).await;

    let (status, detail) = get(&client, srv.url(&format!("/api/projects/{project_id}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["status"], "VERIFIED");
    assert_eq!(detail["verifications"].as_array().unwrap().len(), 1);
    let verification_id = detail["verifications"][0]["id"].as_u64().unwrap();

    let (status, body) = post(
        &client,
        srv.url(&format!("/api/verifications/{verification_id}/approve")),
        json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "already_approved");

    let (_, dashboard) = get(&client, srv.url("/api/companies/0xowner/dashboard")).await;
    assert_eq!(dashboard["carbon_credits"], 68.5);
    assert_eq!(dashboard["verification_status"], "Carbon Positive");
    assert_eq!(dashboard["owned_projects"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn marketplace_purchase_moves_credits() {
    let dir = tempfile::tempdir().unwrap();
    let srv = TestServer::spawn(dir.path()).await;
    let client = reqwest::Client::new();
    issue_credits(&client, &srv, "0xseller", 68.5).await;

    let (_, listings) = get(&client, srv.url("/api/marketplace")).await;
    assert_eq!(listings["items"].as_array().unwrap().len(), 1);
    assert_eq!(listings["items"][0]["price_per_ton"], 50.0);

    let (status, body) = post(
        &client,
        srv.url("/api/marketplace/purchase"),
        json!({ "buyer": "0xbuyer", "seller": "0xseller", "amount": 20.0, "price_per_ton": 65.0 }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_cost"], 1300.0);

    let (_, buyer) = get(&client, srv.url("/api/companies/0xbuyer/dashboard")).await;
    let (_, seller) = get(&client, srv.url("/api/companies/0xseller/dashboard")).await;
    assert_eq!(buyer["carbon_credits"], 20.0);
    assert_eq!(seller["carbon_credits"], 48.5);

    let (status, body) = post(
        &client,
        srv.url("/api/marketplace/purchase"),
        json!({ "buyer": "0xbuyer", "seller": "0xseller", "amount": 100.0, "price_per_ton": 65.0 }),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "insufficient_credits");

    let (_, seller) = get(&client, srv.url("/api/companies/0xseller/dashboard")).await;
    assert_eq!(seller["carbon_credits"], 48.5);
}

#[tokio::test]
async fn registry_emissions_drive_net_balance_and_stats() {
    let dir = tempfile::tempdir().unwrap();
    let srv = TestServer::spawn(dir.path()).await;
    let client = reqwest::Client::new();
    issue_credits(&client, &srv, "0xmill", 10.0).await;

    let (status, body) = post(
        &client,
        srv.url("/api/emissions"),
        json!({ "company": "0xmill", "amount_tonnes": 25.0 }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_emissions"], 25.0);

    let (_, dashboard) = get(&client, srv.url("/api/companies/0xmill/dashboard")).await;
    assert_eq!(dashboard["net_balance"], -15.0);
    assert_eq!(dashboard["verification_status"], "Carbon Negative");

    let (_, stats) = get(&client, srv.url("/api/stats")).await;
    assert_eq!(stats["total_projects"], 1);
    assert_eq!(stats["total_emissions_recorded"], 25.0);
    assert_eq!(stats["projects_by_ecosystem"]["mangrove"], 1);
}

#[tokio::test]
async fn bad_requests_map_to_json_errors() {
    let dir = tempfile::tempdir().unwrap();
    let srv = TestServer::spawn(dir.path()).await;
    let client = reqwest::Client::new();

    let (status, body) = get(&client, srv.url("/api/projects/not-a-number")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_id");

    let (status, _) = get(&client, srv.url("/api/projects/42")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = post(
        &client,
        srv.url("/api/verifications"),
        json!({ "project_id": 42, "verified_amount": 1.0, "verifier": "x" }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");

    let mut invalid = mangrove_project("0xowner");
    invalid["area_hectares"] = json!(0.0);
    let (status, body) = post(&client, srv.url("/api/projects"), invalid).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");
}

#[tokio::test]
async fn company_ledger_summary_and_assessment() {
    let dir = tempfile::tempdir().unwrap();
    let srv = TestServer::spawn(dir.path()).await;
    let client = reqwest::Client::new();

    let (status, company) = post(
        &client,
        srv.url("/api/companies"),
        json!({
            "company_name": "Green Textiles Pvt Ltd",
            "email": "ops@greentex.in",
            "industry": "manufacturing",
            "location": "India",
            "size": "Small (10-49 employees)",
            "contact_person": "Asha"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = company["company_id"].as_str().unwrap().to_string();

    let (status, body) = post(
        &client,
        srv.url("/api/companies"),
        json!({
            "company_name": "Copycat", "email": "OPS@greentex.in", "industry": "retail",
            "location": "India", "size": "Micro", "contact_person": "B"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "duplicate_email");

    let (status, added) = post(
        &client,
        srv.url(&format!("/api/companies/{id}/emissions")),
        json!({ "entries": [
            { "scope": 1, "category": "Mobile Combustion", "activity": "Diesel Generator",
              "quantity": 1000, "unit": "litres", "emission_factor": 2.68, "verification_status": "Internally Verified" },
            { "scope": "Scope 2", "category": "Electricity", "activity": "Grid Power",
              "quantity": 10000, "unit": "kWh", "emission_factor": 0.82 }
        ]}),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "body: {added}");
    let diesel_id = added["items"][0]["id"].as_str().unwrap().to_string();

    let (_, ledger) = get(&client, srv.url(&format!("/api/companies/{id}/emissions"))).await;
    assert_eq!(ledger["items"].as_array().unwrap().len(), 2);
    assert_close(&ledger["total_tonnes"], 10.88);

    let (_, summary) = get(&client, srv.url(&format!("/api/companies/{id}/summary"))).await;
    assert_eq!(summary["total_carbon_credits"], 100.0);
    assert_close(&summary["remaining_credits"], 89.12);
    assert_eq!(summary["carbon_status"], "Carbon Positive");

    let (status, assessment) = post(
        &client,
        srv.url(&format!("/api/companies/{id}/assessment")),
        json!({ "employees": 50, "revenue_million": 100.0 }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "body: {assessment}");
    assert_eq!(assessment["industry"], "Manufacturing");
    assert_close(&assessment["emissions_actual"], 10.88);
    let fine = assessment["fine_amount"].as_f64().unwrap();
    let credit = assessment["credit_amount"].as_f64().unwrap();
    assert!(fine == 0.0 || credit == 0.0);
    assert_eq!(assessment["reduction_scenarios"].as_array().unwrap().len(), 2);
    assert!(!assessment["recommendations"].as_array().unwrap().is_empty());

    let (status, body) = post(
        &client,
        srv.url(&format!("/api/companies/{id}/assessment")),
        json!({ "employees": 50, "revenue_million": 100.0, "industry": "mining" }),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "unknown_industry");

    let res = client
        .delete(srv.url(&format!("/api/companies/{id}/emissions/{diesel_id}")))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let (_, ledger) = get(&client, srv.url(&format!("/api/companies/{id}/emissions"))).await;
    assert_eq!(ledger["items"].as_array().unwrap().len(), 1);
    assert_close(&ledger["total_kg"], 8200.0);
}

#[tokio::test]
async fn state_survives_restart_and_log_is_auditable() {
    let dir = tempfile::tempdir().unwrap();
    let client = reqwest::Client::new();
    {
        let srv = TestServer::spawn(dir.path()).await;
        issue_credits(&client, &srv, "0xseller", 30.0).await;
        let (status, _) = post(
            &client,
            srv.url("/api/marketplace/purchase"),
            json!({ "buyer": "0xbuyer", "seller": "0xseller", "amount": 12.0, "price_per_ton": 55.0 }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let srv = TestServer::spawn(dir.path()).await;
    let (_, buyer) = get(&client, srv.url("/api/companies/0xbuyer/dashboard")).await;
    assert_eq!(buyer["carbon_credits"], 12.0);

    let (status, events) = get(&client, srv.url("/api/registry/events")).await;
    assert_eq!(status, StatusCode::OK);
    let items = events["items"].as_array().unwrap();
    assert_eq!(items.len(), 4);
    assert_eq!(items[0]["event_type"], "registry.project.registered");
    assert_eq!(items[3]["event_type"], "registry.credits.transferred");
    assert_eq!(events["next_after"], 4);

    let (_, tail) = get(&client, srv.url("/api/registry/events?after=2&limit=1")).await;
    assert_eq!(tail["items"].as_array().unwrap().len(), 1);
    assert_eq!(tail["items"][0]["sequence_number"], 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_writes_all_land_in_the_log() {
    let dir = tempfile::tempdir().unwrap();
    let srv = TestServer::spawn(dir.path()).await;
    let client = reqwest::Client::new();

    let mut tasks = Vec::new();
    for _ in 0..16 {
        let client = client.clone();
        let url = srv.url("/api/emissions");
        tasks.push(tokio::spawn(async move {
            post(&client, url, json!({ "company": "0xmill", "amount_tonnes": 1.5 })).await.0
        }));
    }
    for task in tasks {
        assert_eq!(task.await.unwrap(), StatusCode::OK);
    }

    let (_, dashboard) = get(&client, srv.url("/api/companies/0xmill/dashboard")).await;
    assert_close(&dashboard["total_emissions"], 24.0);
    let (_, events) = get(&client, srv.url("/api/registry/events")).await;
    assert_eq!(events["items"].as_array().unwrap().len(), 16);
}
