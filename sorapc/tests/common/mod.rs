//! Shared fixtures: a migrated SQLite file and in-process fakes for the
//! remote collaborators.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Value, json};
use tempfile::TempDir;

use sorapc::config::AppConfig;
use sorapc::database::{DbPool, init_pool, run_migrations};
use sorapc::downloader::MediaFetcher;
use sorapc::remote::{
    CreateVideoRequest, DraftItem, DraftsPage, PublishedUrlKey, RemoteApi, WatermarkResolver,
};
use sorapc::services::ServiceContainer;
use sorapc::{Error, Result};

/// A migrated database living in its own temp directory.
pub struct TestDb {
    pub dir: TempDir,
    pub pool: DbPool,
}

pub async fn setup_test_db() -> TestDb {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let url = format!("sqlite:{}?mode=rwc", dir.path().join("test.db").display());
    let pool = init_pool(&url).await.expect("Failed to create test pool");
    run_migrations(&pool)
        .await
        .expect("Failed to run migrations");
    TestDb { dir, pool }
}

#[derive(Default)]
pub struct FakeRemote {
    pub create_responses: Mutex<Vec<String>>,
    pub pending: Mutex<Value>,
    pub drafts: Mutex<Vec<DraftItem>>,
    pub account_status: Mutex<Value>,
    pub subscriptions: Mutex<Option<Value>>,
    pub publish_response: Mutex<Value>,
    pub published_by_task: Mutex<Value>,
    pub published_by_generation: Mutex<Value>,
    pub calls: Mutex<Vec<String>>,
}

impl FakeRemote {
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(json!([])),
            account_status: Mutex::new(json!({})),
            publish_response: Mutex::new(json!({})),
            published_by_task: Mutex::new(json!({})),
            published_by_generation: Mutex::new(json!({})),
            ..Default::default()
        }
    }

    pub fn push_create(&self, raw: &str) {
        self.create_responses.lock().unwrap().push(raw.to_string());
    }

    pub fn set<T>(slot: &Mutex<T>, value: T) {
        *slot.lock().unwrap() = value;
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl RemoteApi for FakeRemote {
    async fn create_video(&self, bearer: &str, request: &CreateVideoRequest) -> Result<String> {
        self.record(format!("create:{bearer}:{}", request.prompt));
        let mut queue = self.create_responses.lock().unwrap();
        if queue.is_empty() {
            return Err(Error::UpstreamStatus {
                status: 500,
                body: "no scripted response".into(),
            });
        }
        Ok(queue.remove(0))
    }

    async fn pending(&self, bearer: &str) -> Result<Value> {
        self.record(format!("pending:{bearer}"));
        Ok(self.pending.lock().unwrap().clone())
    }

    async fn drafts(&self, bearer: &str, limit: u32, offset: u32) -> Result<DraftsPage> {
        self.record(format!("drafts:{bearer}:{limit}:{offset}"));
        Ok(DraftsPage {
            items: self.drafts.lock().unwrap().clone(),
            cursor: None,
        })
    }

    async fn account_status(&self, bearer: &str) -> Result<Value> {
        self.record(format!("status:{bearer}"));
        Ok(self.account_status.lock().unwrap().clone())
    }

    async fn subscriptions(&self, bearer: &str) -> Result<Value> {
        self.record(format!("subscriptions:{bearer}"));
        self.subscriptions
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| Error::UpstreamStatus {
                status: 404,
                body: "no subscriptions".into(),
            })
    }

    async fn publish_video(&self, bearer: &str, generation_id: &str, prompt: &str) -> Result<Value> {
        self.record(format!("publish:{bearer}:{generation_id}:{prompt}"));
        Ok(self.publish_response.lock().unwrap().clone())
    }

    async fn published_url(&self, bearer: &str, key: PublishedUrlKey<'_>) -> Result<Value> {
        self.record(format!("published_url:{bearer}:{}={}", key.field(), key.value()));
        let response = match key {
            PublishedUrlKey::Task(_) => self.published_by_task.lock().unwrap().clone(),
            PublishedUrlKey::Generation(_) => self.published_by_generation.lock().unwrap().clone(),
        };
        Ok(response)
    }
}

#[derive(Default)]
pub struct FakeResolver {
    pub result: Mutex<Option<String>>,
    pub calls: Mutex<Vec<(String, String, String)>>,
}

#[async_trait]
impl WatermarkResolver for FakeResolver {
    async fn resolve(&self, endpoint: &str, token: &str, share_url: &str) -> Result<Option<String>> {
        self.calls.lock().unwrap().push((
            endpoint.to_string(),
            token.to_string(),
            share_url.to_string(),
        ));
        Ok(self.result.lock().unwrap().clone())
    }
}

/// Writes the URL text as file content; URLs in `failing` error out
/// without touching the destination.
#[derive(Default)]
pub struct FakeFetcher {
    pub failing: Mutex<HashSet<String>>,
    pub fetched: Mutex<Vec<(String, String)>>,
}

impl FakeFetcher {
    pub fn fail_on(&self, url: &str) {
        self.failing.lock().unwrap().insert(url.to_string());
    }

    pub fn fetched(&self) -> Vec<(String, String)> {
        self.fetched.lock().unwrap().clone()
    }
}

#[async_trait]
impl MediaFetcher for FakeFetcher {
    async fn fetch_to(&self, url: &str, dest: &Path) -> Result<u64> {
        if self.failing.lock().unwrap().contains(url) {
            return Err(Error::download_failed("HTTP 500"));
        }
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(dest, url.as_bytes())?;
        self.fetched
            .lock()
            .unwrap()
            .push((url.to_string(), dest.display().to_string()));
        Ok(url.len() as u64)
    }
}

/// A full service container over fakes, with downloads under the temp dir.
pub struct Harness {
    pub db: TestDb,
    pub remote: Arc<FakeRemote>,
    pub resolver: Arc<FakeResolver>,
    pub fetcher: Arc<FakeFetcher>,
    pub container: ServiceContainer,
    pub config: AppConfig,
}

pub async fn harness_with(config_overrides: &[(&str, &str)]) -> Harness {
    let db = setup_test_db().await;
    let download_dir = db.dir.path().join("downloads");
    let mut vars: HashMap<String, String> = config_overrides
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    vars.insert(
        "SORAPC_DOWNLOAD_DIR".into(),
        download_dir.display().to_string(),
    );
    let config = AppConfig::from_lookup(|key| vars.get(key).cloned());

    let remote = Arc::new(FakeRemote::new());
    let resolver = Arc::new(FakeResolver::default());
    let fetcher = Arc::new(FakeFetcher::default());

    let container = ServiceContainer::with_collaborators(
        db.pool.clone(),
        &config,
        remote.clone(),
        resolver.clone(),
        fetcher.clone(),
    )
    .await
    .expect("Failed to build container");

    Harness {
        db,
        remote,
        resolver,
        fetcher,
        container,
        config,
    }
}

pub async fn harness() -> Harness {
    harness_with(&[]).await
}

/// Insert a credential row directly.
pub async fn insert_credential(
    pool: &DbPool,
    token: &str,
    status_json: Option<&str>,
    plan_type: &str,
) -> i64 {
    let (id,): (i64,) = sqlx::query_as(
        "INSERT INTO tokens (token, status_json, plan_type, created_at, updated_at)
         VALUES (?, ?, ?, 0, 0) RETURNING id",
    )
    .bind(token)
    .bind(status_json)
    .bind(plan_type)
    .fetch_one(pool)
    .await
    .expect("Failed to insert credential");
    id
}

pub fn remaining_status(remaining: i64) -> String {
    json!({
        "rate_limit_and_credit_balance": {
            "estimated_num_videos_remaining": remaining
        }
    })
    .to_string()
}

pub fn draft(task_id: &str, generation_id: &str, url: &str) -> DraftItem {
    DraftItem {
        id: format!("draft_{generation_id}"),
        generation_id: generation_id.to_string(),
        task_id: task_id.to_string(),
        downloadable_url: url.to_string(),
        prompt: String::new(),
    }
}
