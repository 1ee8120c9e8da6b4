#![allow(dead_code)]

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use axum::body::Bytes;
use axum::extract::Path as UrlPath;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

pub struct TestEnv {
    _tmp: TempDir,
    pub root: PathBuf,
    pub state: PathBuf,
}

impl TestEnv {
    pub fn new() -> Self {
        let tmp = TempDir::new().expect("create temp dir");
        let root = tmp.path().to_path_buf();
        let state = root.join("state");
        Self {
            _tmp: tmp,
            root,
            state,
        }
    }

    /// Command pointed at an isolated state dir and an unreachable backend.
    pub fn cmd(&self) -> Command {
        let mut cmd = cargo_bin_cmd!("kdv-checks");
        cmd.env("KDV_API_BASE_URL", "http://127.0.0.1:9/api")
            .env_remove("KDV_STATE_DIR")
            .env_remove("RUST_LOG")
            .arg("--state-dir")
            .arg(&self.state);
        cmd
    }

    pub fn cmd_with(&self, backend: &Backend) -> Command {
        let mut cmd = self.cmd();
        cmd.args(["--base-url", &backend.base_url, "--poll-interval", "10ms"]);
        cmd
    }

    pub fn write_file(&self, name: &str, body: &[u8]) -> PathBuf {
        let path = self.root.join(name);
        fs::write(&path, body).expect("write fixture");
        path
    }

    pub fn run_json(&self, backend: &Backend, args: &[&str]) -> Value {
        let out = self
            .cmd_with(backend)
            .arg("--json")
            .args(args)
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();
        serde_json::from_slice(&out).expect("valid json output")
    }
}

pub fn day_result() -> Value {
    json!([
        { "date": "06-01-2025", "modules": ["bkr"] },
        { "day": "2025-01-06", "slices": [
            { "From Time": "07:00", "To Time": "07:15", "#Children": 9, "RequiredStaff": 2,
              "#Staff": 1, "BKR": "No", "Details": "1 more staff needed" },
            { "From Time": "07:15", "To Time": "07:30", "#Children": 7, "RequiredStaff": 1,
              "#Staff": 1, "BKR": "Yes", "Details": "" }
        ]}
    ])
}

/// In-process fake of the compliance backend, served from its own runtime thread.
pub struct Backend {
    pub base_url: String,
    pub last_check: Arc<Mutex<Option<Value>>>,
    pub uploads: Arc<AtomicUsize>,
}

impl Backend {
    pub fn start() -> Self {
        let last_check: Arc<Mutex<Option<Value>>> = Arc::new(Mutex::new(None));
        let uploads = Arc::new(AtomicUsize::new(0));

        let upload_count = uploads.clone();
        let recorded = last_check.clone();
        let app = Router::new()
            .route(
                "/api/uploads",
                post(move |_body: Bytes| {
                    let upload_count = upload_count.clone();
                    async move {
                        let n = upload_count.fetch_add(1, Ordering::SeqCst);
                        Json(json!({
                            "objectKey": format!("key0000{n}"),
                            "fileUrl": format!("/files/key0000{n}"),
                        }))
                    }
                }),
            )
            .route(
                "/api/checks",
                get(|| async { Json(json!(["chk-0", "chk-1"])) }).post(
                    move |Json(body): Json<Value>| {
                        let recorded = recorded.clone();
                        async move {
                            *recorded.lock().expect("lock") = Some(body);
                            Json(json!({ "id": "chk-1" }))
                        }
                    },
                ),
            )
            .route(
                "/api/checks/:id",
                get(|UrlPath(id): UrlPath<String>| async move {
                    if id == "chk-running" {
                        Json(json!({ "status": { "message": "running", "progress": 40 } }))
                    } else if id == "chk-failed" {
                        Json(json!({ "status": { "message": "failed" } }))
                    } else {
                        Json(json!({ "status": { "message": "completed" }, "result": day_result() }))
                    }
                }),
            )
            .route(
                "/api/requirements",
                get(|| async {
                    Json(json!({ "requiredDocuments": {
                        "staff-planning": ["a1b2c3d4_rooster.pdf"],
                        "child-planning": []
                    }}))
                }),
            )
            .route(
                "/api/vgc-lists",
                post(|| async { Json(json!({ "checkId": "vgc-1" })) }),
            )
            .route(
                "/api/vgc-lists/:id",
                get(|| async {
                    Json(json!({
                        "status": { "message": "completed" },
                        "result": { "Anna": ["Bram", "Cas"] }
                    }))
                }),
            );

        let (tx, rx) = std::sync::mpsc::channel();
        std::thread::spawn(move || {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("backend runtime");
            rt.block_on(async move {
                let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
                    .await
                    .expect("bind backend");
                tx.send(listener.local_addr().expect("backend addr"))
                    .expect("send addr");
                axum::serve(listener, app).await.expect("serve backend");
            });
        });
        let addr = rx.recv().expect("backend started");

        Self {
            base_url: format!("http://{addr}/api"),
            last_check,
            uploads,
        }
    }

    pub fn last_check(&self) -> Value {
        self.last_check
            .lock()
            .expect("lock")
            .clone()
            .expect("a check was started")
    }
}
