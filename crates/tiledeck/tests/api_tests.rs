//! API integration tests.

use axum::{
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use serde_json::json;
use tiledeck::exec::LaunchPlan;

mod common;
use common::{NOTEPAD, TEST_TOKEN, body_json, test_app};

#[tokio::test]
async fn test_missing_token_is_rejected() {
    let app = test_app().build();

    let response = app
        .send(
            Request::builder()
                .uri("/api/health")
                .method(Method::GET)
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = body_json(response).await;
    assert_eq!(json["ok"], false);
    assert_eq!(json["error"], "missing token");
}

#[tokio::test]
async fn test_mutated_token_is_rejected() {
    let app = test_app().build();
    let mut mutated = TEST_TOKEN.to_string();
    mutated.replace_range(5..6, "X");

    let response = app
        .send(
            Request::builder()
                .uri("/api/health")
                .header("X-Token", mutated)
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"], "token mismatch");
}

#[tokio::test]
async fn test_query_token_is_accepted() {
    let app = test_app().build();

    let response = app
        .send(
            Request::builder()
                .uri(format!("/api/health?token={TEST_TOKEN}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["ok"], true);
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn test_rate_limit_boundary() {
    let app = test_app()
        .config(json!({ "rateLimit": { "windowMs": 1000, "max": 5 } }))
        .build();

    for _ in 0..5 {
        assert_eq!(app.get("/api/health").await.status(), StatusCode::OK);
    }

    let response = app.get("/api/health").await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let retry_after: u64 = response.headers()[header::RETRY_AFTER]
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!((1..=1).contains(&retry_after));

    tokio::time::sleep(std::time::Duration::from_millis(1100)).await;
    assert_eq!(app.get("/api/health").await.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_settings_redact_token_and_validate() {
    let app = test_app().build();

    let json = body_json(app.get("/api/settings").await).await;
    assert_eq!(json["config"]["token"], "********");
    assert_eq!(json["config"]["port"], 3210);

    let response = app.post("/api/settings", json!({ "port": 0 })).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .post("/api/settings", json!({ "workspaceDir": "relative/path" }))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .post(
            "/api/settings",
            json!({ "port": 4000, "token": "ignored-by-settings", "rateLimit": { "max": 1 } }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["config"]["port"], 4000);
    assert_eq!(json["config"]["rateLimit"]["max"], 3);

    let on_disk: serde_json::Value =
        serde_json::from_slice(&std::fs::read(app.store.path()).unwrap()).unwrap();
    assert_eq!(on_disk["port"], 4000);
    assert_eq!(on_disk["token"], TEST_TOKEN);
}

#[tokio::test]
async fn test_launcher_update_checks_existence() {
    let app = test_app().build();

    let response = app
        .post("/api/settings/launcher", json!({ "id": "nope", "path": "" }))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let missing = app.dir.path().join("missing.exe");
    let response = app
        .post(
            "/api/settings/launcher",
            json!({ "id": "chrome", "path": missing.display().to_string() }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let exe = app.dir.path().join("chrome.exe");
    std::fs::write(&exe, b"").unwrap();
    let response = app
        .post(
            "/api/settings/launcher",
            json!({ "id": "chrome", "path": exe.display().to_string() }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await["launcher"]["path"],
        exe.display().to_string()
    );
}

#[tokio::test]
async fn test_autodetect_unknown_launcher() {
    let app = test_app().build();
    let response = app
        .post("/api/settings/autodetect", json!({ "launcherId": "nope" }))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app.post("/api/settings/autodetect", json!({})).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_json(response).await["detected"].is_array());
}

#[tokio::test]
async fn test_builtin_tile_cannot_be_deleted() {
    let app = test_app().build();

    let response = app.post("/api/tiles/delete", json!({ "id": "terminal" })).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app.get("/api/tiles/terminal").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["tile"]["builtin"], true);

    let response = app.post("/api/tiles/delete", json!({ "id": "custom-nope" })).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_builtin_tile_cannot_be_overwritten() {
    let app = test_app().build();
    let response = app
        .post(
            "/api/tiles/upsert",
            json!({ "tile": { "id": "terminal", "profile": "work", "page": "main",
                              "label": "Mine", "type": "url", "target": "example.com" } }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = body_json(app.get("/api/tiles/terminal").await).await;
    assert_eq!(json["tile"]["label"], "Terminal");
}

#[tokio::test]
async fn test_upsert_resolves_program_name() {
    let app = test_app().build();

    let response = app
        .post(
            "/api/tiles/upsert",
            json!({ "tile": { "profile": "work", "page": "main", "label": "Notepad",
                              "type": "app", "target": "notepad" } }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["tile"]["target"], NOTEPAD);
    let id = json["tile"]["id"].as_str().unwrap().to_string();
    assert!(id.starts_with("custom-"));

    let response = app.get(&format!("/api/tiles/{id}")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["tile"]["target"], NOTEPAD);
    assert_eq!(json["tile"]["type"], "app");

    let on_disk = std::fs::read_to_string(app.store.path()).unwrap();
    assert!(on_disk.contains(&id));
}

#[tokio::test]
async fn test_upsert_rejects_unknown_page() {
    let app = test_app().build();
    let response = app
        .post(
            "/api/tiles/upsert",
            json!({ "tile": { "profile": "work", "page": "nowhere", "label": "Site",
                              "type": "url", "target": "example.com" } }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(
        body_json(response).await["error"]
            .as_str()
            .unwrap()
            .contains("nowhere")
    );
}

#[tokio::test]
async fn test_persist_failure_keeps_memory() {
    let app = test_app().unwritable().build();

    let response = app
        .post(
            "/api/tiles/upsert",
            json!({ "tile": { "id": "custom-site", "profile": "work", "page": "main",
                              "label": "Site", "type": "url", "target": "example.com" } }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(response).await["error"], "config write failed");

    assert_eq!(app.get("/api/tiles/custom-site").await.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_tiles_respect_show_if() {
    let app = test_app().running("Wow.exe").build();
    let json = body_json(app.get("/api/tiles?profile=gaming").await).await;
    assert_eq!(json["wowRunning"], true);
    let ids: Vec<&str> = json["tiles"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|t| t["id"].as_str())
        .collect();
    assert!(!ids.contains(&"wow-start"));
    assert!(ids.contains(&"wow-addons"));
    assert!(!ids.contains(&"terminal"));

    let app = test_app().build();
    let json = body_json(app.get("/api/tiles?profile=gaming").await).await;
    assert_eq!(json["wowRunning"], false);
    assert!(
        json["tiles"]
            .as_array()
            .unwrap()
            .iter()
            .any(|t| t["id"] == "wow-start")
    );
}

#[tokio::test]
async fn test_program_resolution() {
    let app = test_app().build();

    let response = app
        .post("/api/programs/resolve", json!({ "input": "notepad" }))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["path"], NOTEPAD);

    let response = app
        .post("/api/programs/resolve", json!({ "input": "zzqqxx" }))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let json = body_json(app.get("/api/programs?q=note&limit=5").await).await;
    assert_eq!(json["total"], 1);
    assert_eq!(json["programs"][0]["path"], NOTEPAD);
}

#[tokio::test]
async fn test_run_records_launch_plan() {
    let app = test_app().build();

    let response = app.post("/api/run", json!({ "id": "workspace-folder" })).await;
    assert_eq!(response.status(), StatusCode::OK);
    let workspace = app.dir.path().display().to_string();
    assert_eq!(body_json(response).await["target"], workspace.as_str());

    let response = app.post("/api/run", json!({ "id": "missing" })).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    assert_eq!(
        app.spawner.plans(),
        vec![LaunchPlan::Open { target: workspace }]
    );
}

#[tokio::test]
async fn test_named_actions() {
    let app = test_app().build();

    let response = app.post("/api/actions/terminal", json!({})).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["target"], "wt.exe");

    let response = app.post("/api/actions/formatDisk", json!({})).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app.post("/api/actions/wowLogs", json!({})).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    assert_eq!(app.spawner.plans().len(), 1);
}

#[tokio::test]
async fn test_settings_accept_normalizable_values() {
    let app = test_app().config(json!({ "port": 5000 })).build();

    let response = app.post("/api/settings", json!({ "port": "8080" })).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["config"]["port"], 8080);

    let response = app.post("/api/settings", json!({ "port": "http" })).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(app.get("/api/settings").await).await;
    assert_eq!(json["config"]["port"], 8080);

    let workspace = app.dir.path().join("ws").display().to_string();
    let response = app
        .post("/api/settings", json!({ "workspaceDir": format!("\"{workspace}\"") }))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["config"]["workspaceDir"], workspace);

    let response = app
        .post("/api/settings", json!({ "workspaceDir": "%TILEDECK_UNSET_VAR%/x" }))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(app.get("/api/settings").await).await;
    assert_eq!(json["config"]["workspaceDir"], workspace);
}

#[tokio::test]
async fn test_settings_expand_env_workspace_dir() {
    // Any variable whose value is already an absolute path will do.
    let Some((name, value)) = std::env::vars().find(|(name, value)| {
        name.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_')
            && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
            && value.starts_with('/')
            && value.len() < 512
            && value == value.trim()
            && !value.contains(['%', ':', '"', '\''])
            && !value.chars().any(char::is_control)
    }) else {
        return;
    };
    let app = test_app().build();

    let response = app
        .post("/api/settings", json!({ "workspaceDir": format!("%{name}%") }))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["config"]["workspaceDir"], value);
}

#[tokio::test]
async fn test_bad_tokens_share_one_rate_limit_bucket() {
    let app = test_app()
        .config(json!({ "rateLimit": { "windowMs": 60000, "max": 5 } }))
        .build();

    let mut limited = 0;
    for i in 0..20 {
        let response = app
            .send(
                Request::builder()
                    .uri("/api/health")
                    .header("X-Token", format!("guess-{i}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;
        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            limited += 1;
        } else {
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        }
    }
    assert_eq!(limited, 15);

    assert_eq!(app.get("/api/health").await.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_settings_update_keeps_concurrent_tile_edits() {
    let app = test_app()
        .config(json!({ "rateLimit": { "windowMs": 60000, "max": 10000 } }))
        .build();

    for i in 0..10 {
        let tile = json!({ "tile": { "id": format!("custom-site-{i}"), "profile": "work",
                                     "page": "main", "label": "Site", "type": "url",
                                     "target": "example.com" } });
        let (settings, upsert) = tokio::join!(
            app.post("/api/settings", json!({ "port": 4000 + i })),
            app.post("/api/tiles/upsert", tile),
        );
        assert_eq!(settings.status(), StatusCode::OK);
        assert_eq!(upsert.status(), StatusCode::OK);
    }

    for i in 0..10 {
        let response = app.get(&format!("/api/tiles/custom-site-{i}")).await;
        assert_eq!(response.status(), StatusCode::OK, "custom-site-{i} was lost");
    }
}
