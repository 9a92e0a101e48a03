use std::sync::Arc;

use reqwest::{Client, StatusCode};
use sd_api::{build_router, AppConfig, AppState, USER_HEADER};
use serde_json::{json, Value};

async fn spawn_app() -> String {
    let state = Arc::new(AppState::in_memory(AppConfig::default()));
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move { axum::serve(listener, app).await.expect("serve app") });
    format!("http://{addr}")
}

struct Api {
    base: String,
    client: Client,
    user: &'static str,
}

impl Api {
    async fn new(user: &'static str) -> Self {
        Self {
            base: spawn_app().await,
            client: Client::new(),
            user,
        }
    }

    fn as_user(&self, user: &'static str) -> Self {
        Self {
            base: self.base.clone(),
            client: self.client.clone(),
            user,
        }
    }

    async fn send(&self, method: reqwest::Method, path: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut req = self
            .client
            .request(method, format!("{}{}", self.base, path))
            .header(USER_HEADER, self.user);
        if let Some(body) = body {
            req = req.json(&body);
        }
        let resp = req.send().await.expect("send request");
        let status = resp.status();
        let text = resp.text().await.expect("read body");
        let value = serde_json::from_str(&text).unwrap_or(Value::String(text));
        (status, value)
    }

    async fn get(&self, path: &str) -> (StatusCode, Value) {
        self.send(reqwest::Method::GET, path, None).await
    }

    async fn post(&self, path: &str, body: Value) -> (StatusCode, Value) {
        self.send(reqwest::Method::POST, path, Some(body)).await
    }

    async fn create_store(&self, name: &str, url: &str) -> Value {
        let (status, store) = self.post("/api/stores", json!({ "name": name, "url": url })).await;
        assert_eq!(status, StatusCode::OK, "create store: {store}");
        store
    }

    async fn set_plan(&self, plan: &str) -> Value {
        let (status, account) = self
            .send(reqwest::Method::PUT, "/api/me/plan", Some(json!({ "plan": plan })))
            .await;
        assert_eq!(status, StatusCode::OK, "set plan: {account}");
        account
    }
}

fn three_issue_scan(score: u8) -> Value {
    json!({
        "overallScore": score,
        "performanceScore": 60,
        "seoScore": 81,
        "issues": [
            { "id": "a", "title": "Render-blocking scripts", "category": "performance", "severity": "high" },
            { "id": "b", "title": "Missing alt text", "category": "accessibility", "severity": "medium" },
            { "id": "c", "title": "Duplicate meta titles", "category": "seo", "severity": "low" }
        ],
        "recommendations": ["Defer third-party scripts"]
    })
}

#[tokio::test]
async fn health_reports_version() {
    let api = Api::new("alice").await;
    let (status, body) = api.get("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn scan_creation_syncs_store_health_cache() {
    let api = Api::new("alice").await;
    let store = api.create_store("Fashion Forward", "fashionforward.myshopify.com").await;
    assert_eq!(store["status"], "pending");
    assert_eq!(store["healthScore"], 0);
    assert_eq!(store["issuesCount"], 0);
    assert!(store["lastScanAt"].is_null());

    let id = store["id"].as_str().expect("store id");
    let (status, scan) = api.post(&format!("/api/stores/{id}/scans"), three_issue_scan(72)).await;
    assert_eq!(status, StatusCode::OK, "{scan}");
    assert_eq!(scan["issues"][0]["status"], "open");

    let (status, synced) = api.get(&format!("/api/stores/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(synced["healthScore"], 72);
    assert_eq!(synced["issuesCount"], 3);
    assert_eq!(synced["status"], "warning");
    assert_eq!(synced["lastScanAt"], scan["createdAt"]);

    let (_, scans) = api.get(&format!("/api/stores/{id}/scans")).await;
    assert_eq!(scans.as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn free_plan_quota_then_upgrade() {
    let api = Api::new("bob").await;
    let store = api.create_store("Shop", "shop.example.com").await;
    let path = format!("/api/stores/{}/scans", store["id"].as_str().unwrap());

    let (_, usage) = api.get("/api/usage").await;
    assert_eq!(usage["remaining"], 1);

    let (status, _) = api.post(&path, three_issue_scan(50)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = api.post(&path, three_issue_scan(55)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body["message"].as_str().unwrap().contains("free"));

    let account = api.set_plan("pro").await;
    assert_eq!(account["usage"]["remaining"], 9);
    assert_eq!(account["usage"]["scanCount"], 1);
    assert_eq!(account["plan"]["scanQuotaPerMonth"], 10);

    let (status, _) = api.post(&path, three_issue_scan(55)).await;
    assert_eq!(status, StatusCode::OK);
    let (_, usage) = api.get("/api/usage").await;
    assert_eq!(usage["remaining"], 8);
}

#[tokio::test]
async fn unknown_plan_is_rejected_on_change() {
    let api = Api::new("carol").await;
    let (status, _) = api
        .send(reqwest::Method::PUT, "/api/me/plan", Some(json!({ "plan": "platinum" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, me) = api.get("/api/me").await;
    assert_eq!(me["user"]["plan"], "free");
}

#[tokio::test]
async fn store_quota_applies_per_plan() {
    let api = Api::new("dave").await;
    api.create_store("One", "one.example.com").await;
    let (status, _) = api.post("/api/stores", json!({ "name": "Two", "url": "two.example.com" })).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    api.set_plan("pro").await;
    api.create_store("Two", "two.example.com").await;

    let (_, stores) = api.get("/api/stores").await;
    let names: Vec<&str> = stores
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["One", "Two"]);
}

#[tokio::test]
async fn delete_missing_store_reports_false() {
    let api = Api::new("erin").await;
    let (status, body) = api
        .send(
            reqwest::Method::DELETE,
            "/api/stores/1f0e0c5c-3a8e-4a43-9d1f-5f4b8f7f3c11",
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);

    let (status, body) = api.send(reqwest::Method::DELETE, "/api/stores/not-a-uuid", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);

    let store = api.create_store("Shop", "shop.example.com").await;
    let path = format!("/api/stores/{}", store["id"].as_str().unwrap());
    let (_, body) = api.send(reqwest::Method::DELETE, &path, None).await;
    assert_eq!(body["success"], true);
    let (status, _) = api.get(&path).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn patch_cannot_touch_cached_scan_fields() {
    let api = Api::new("frank").await;
    let store = api.create_store("Shop", "https://shop.example.com/").await;
    assert_eq!(store["url"], "shop.example.com");
    let path = format!("/api/stores/{}", store["id"].as_str().unwrap());

    let (status, updated) = api
        .send(
            reqwest::Method::PATCH,
            &path,
            Some(json!({ "name": "Shop Renamed", "healthScore": 99, "issuesCount": 0 })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["name"], "Shop Renamed");
    assert_eq!(updated["healthScore"], 0);

    let (status, _) = api
        .send(
            reqwest::Method::PATCH,
            "/api/stores/1f0e0c5c-3a8e-4a43-9d1f-5f4b8f7f3c11",
            Some(json!({ "name": "Ghost" })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn auto_fix_is_gated_and_idempotent() {
    let api = Api::new("grace").await;
    let store = api.create_store("Shop", "shop.example.com").await;
    let (_, scan) = api
        .post(
            &format!("/api/stores/{}/scans", store["id"].as_str().unwrap()),
            three_issue_scan(64),
        )
        .await;
    let scan_id = scan["id"].as_str().unwrap().to_string();
    let fix_path = format!("/api/scans/{scan_id}/issues/b/auto-fix");

    let (status, _) = api.post(&fix_path, json!({})).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    api.set_plan("pro").await;
    for _ in 0..2 {
        let (status, body) = api.post(&fix_path, json!({})).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["success"], true);
        assert_eq!(body["issue"]["id"], "b");
        assert_eq!(body["issue"]["title"], "Missing alt text");
        assert_eq!(body["issue"]["status"], "fixed");
        assert_eq!(body["scan"]["issues"][1]["status"], "fixed");
        assert_eq!(body["scan"]["issues"][0]["status"], "open");
    }

    let (_, history) = api.get(&format!("/api/scans/{scan_id}/fix-history")).await;
    let history = history.as_array().unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0]["issueId"], "b");
    assert_eq!(history[0]["success"], true);

    let (status, _) = api.post(&format!("/api/scans/{scan_id}/issues/zzz/auto-fix"), json!({})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, stats) = api.get("/api/admin/stats").await;
    assert_eq!(stats["fixedIssues"], 1);
    assert_eq!(stats["openIssues"], 2);
}

#[tokio::test]
async fn benchmark_returns_static_comparison() {
    let api = Api::new("heidi").await;
    let store = api.create_store("Shop", "shop.example.com").await;
    let (_, scan) = api
        .post(
            &format!("/api/stores/{}/scans", store["id"].as_str().unwrap()),
            three_issue_scan(72),
        )
        .await;
    let scan_id = scan["id"].as_str().unwrap();

    let (status, bench) = api.get(&format!("/api/scans/{scan_id}/benchmark")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(bench["scanId"], scan_id);
    assert_eq!(bench["yourScore"]["overallScore"], 72);
    assert_eq!(bench["yourScore"]["seoScore"], 81);
    assert_eq!(bench["industryAverage"]["overallScore"], 68);
    assert_eq!(bench["topPerformers"]["overallScore"], 92);

    let (status, _) = api
        .get("/api/scans/1f0e0c5c-3a8e-4a43-9d1f-5f4b8f7f3c11/benchmark")
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn validation_failures_are_client_errors() {
    let api = Api::new("ivan").await;
    let (status, body) = api.post("/api/stores", json!({ "name": "  ", "url": "shop.example.com" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("name"));

    let (status, _) = api.post("/api/stores", json!({ "name": "Shop" })).await;
    assert!(status.is_client_error());

    let store = api.create_store("Shop", "shop.example.com").await;
    let path = format!("/api/stores/{}/scans", store["id"].as_str().unwrap());
    let (status, _) = api.post(&path, json!({ "overallScore": 150 })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, usage) = api.get("/api/usage").await;
    assert_eq!(usage["remaining"], 1);
}

#[tokio::test]
async fn records_are_scoped_to_their_owner() {
    let alice = Api::new("judy").await;
    let mallory = alice.as_user("mallory");

    let store = alice.create_store("Shop", "shop.example.com").await;
    let id = store["id"].as_str().unwrap();

    let (status, _) = mallory.get(&format!("/api/stores/{id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, stores) = mallory.get("/api/stores").await;
    assert_eq!(stores, json!([]));
    let (status, _) = mallory.post(&format!("/api/stores/{id}/scans"), three_issue_scan(70)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, body) = mallory
        .send(reqwest::Method::DELETE, &format!("/api/stores/{id}"), None)
        .await;
    assert_eq!(body["success"], false);

    let (status, _) = alice.get(&format!("/api/stores/{id}")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn plans_and_admin_config_are_listed() {
    let api = Api::new("ken").await;
    let (_, plans) = api.get("/api/plans").await;
    let ids: Vec<&str> = plans
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["free", "pro", "advanced"]);

    let (status, config) = api.get("/api/admin/config").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(config["storage"], "memory");
    assert_eq!(config["defaultUserId"], "demo-user");
}
