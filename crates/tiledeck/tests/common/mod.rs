//! Test utilities and common setup.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Method, Request, Response, header},
};
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;

use tiledeck::api::{AppState, create_router};
use tiledeck::config::{ConfigStore, DefaultEnv, MergeOptions, merge_with_env};
use tiledeck::exec::{DispatchError, LaunchPlan, ProcessProbe, ProcessStatusCache, Spawner};
use tiledeck::programs::{ProgramCatalog, ProgramEntry, ProgramIndex, ProgramSource};

pub const TEST_TOKEN: &str = "integration-test-token-0123456789";
pub const NOTEPAD: &str = r"C:\Windows\System32\notepad.exe";

/// Records launch plans instead of starting processes.
#[derive(Default)]
pub struct RecordingSpawner {
    plans: Mutex<Vec<LaunchPlan>>,
}

impl RecordingSpawner {
    pub fn plans(&self) -> Vec<LaunchPlan> {
        self.plans.lock().unwrap().clone()
    }
}

#[async_trait]
impl Spawner for RecordingSpawner {
    async fn launch(&self, plan: &LaunchPlan) -> Result<(), DispatchError> {
        self.plans.lock().unwrap().push(plan.clone());
        Ok(())
    }
}

/// Reports a fixed set of running processes.
pub struct FixedProbe(pub HashSet<String>);

#[async_trait]
impl ProcessProbe for FixedProbe {
    async fn running(&self) -> Result<HashSet<String>> {
        Ok(self.0.clone())
    }
}

pub struct TestApp {
    pub router: Router,
    pub store: Arc<ConfigStore>,
    pub spawner: Arc<RecordingSpawner>,
    pub dir: TempDir,
}

pub struct TestAppBuilder {
    overrides: Value,
    running: Vec<String>,
    unwritable: bool,
}

impl TestAppBuilder {
    /// Extra raw config merged over the test defaults.
    pub fn config(mut self, overrides: Value) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn running(mut self, process: &str) -> Self {
        self.running.push(process.to_lowercase());
        self
    }

    /// Store the config beneath a regular file so every write fails.
    pub fn unwritable(mut self) -> Self {
        self.unwritable = true;
        self
    }

    pub fn build(self) -> TestApp {
        let dir = TempDir::new().unwrap();
        let workspace = dir.path().display().to_string();
        let env = DefaultEnv {
            program_files: r"C:\Program Files".to_string(),
            program_files_x86: r"C:\Program Files (x86)".to_string(),
            local_app_data: r"C:\Users\test\AppData\Local".to_string(),
            current_dir: workspace.clone(),
        };

        let mut raw = json!({
            "token": TEST_TOKEN,
            "workspaceDir": workspace,
        });
        if let (Some(raw), Some(extra)) = (raw.as_object_mut(), self.overrides.as_object()) {
            for (key, value) in extra {
                raw.insert(key.clone(), value.clone());
            }
        }
        let config = merge_with_env(&raw, MergeOptions { autodetect: false }, &env);

        let path = if self.unwritable {
            let blocker = dir.path().join("not-a-dir");
            std::fs::write(&blocker, b"").unwrap();
            blocker.join("config.json")
        } else {
            dir.path().join("config.json")
        };
        let store = Arc::new(ConfigStore::new(path, config));

        let catalog = ProgramCatalog::fixed(ProgramIndex::from_entries([ProgramEntry::new(
            NOTEPAD,
            ProgramSource::StartMenu,
        )]));
        let spawner = Arc::new(RecordingSpawner::default());
        let probe = FixedProbe(self.running.into_iter().collect());

        let state = AppState::new(
            store.clone(),
            Arc::new(catalog),
            spawner.clone(),
            Arc::new(ProcessStatusCache::new(Arc::new(probe))),
        );

        TestApp {
            router: create_router(state, None),
            store,
            spawner,
            dir,
        }
    }
}

pub fn test_app() -> TestAppBuilder {
    TestAppBuilder {
        overrides: json!({}),
        running: Vec::new(),
        unwritable: false,
    }
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn get(&self, uri: &str) -> Response<Body> {
        self.send(
            Request::builder()
                .uri(uri)
                .method(Method::GET)
                .header("X-Token", TEST_TOKEN)
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    pub async fn post(&self, uri: &str, body: Value) -> Response<Body> {
        self.send(
            Request::builder()
                .uri(uri)
                .method(Method::POST)
                .header("X-Token", TEST_TOKEN)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_string(&body).unwrap()))
                .unwrap(),
        )
        .await
    }
}

pub async fn body_json(response: Response<Body>) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}
