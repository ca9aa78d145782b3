use std::path::Path;

use overlay_core::{OverrideRecord, Route};
use overlay_server::config::{FragmentConfig, ProviderConfig};
use overlay_server::{AppConfig, build_app};
use serde_json::Value;
use tempfile::TempDir;
use tokio::task::JoinHandle;

const USER_HEADER: &str = "x-remote-user";

struct Site {
    _tmp: TempDir,
    config: AppConfig,
    alice_dir: String,
}

fn write(path: &Path, contents: &str) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, contents).unwrap();
}

/// Template tree shared by the tests:
///
/// - default: `index.html`, `about.html`
/// - alice overrides `index.html` and ships static files
/// - bob has the `beta` routing fragment plus a fragment nobody provides
fn site(debug: bool) -> Site {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path();
    write(&root.join("templates/index.html"), "default index");
    write(&root.join("templates/about.html"), "default about");
    write(&root.join("alice/index.html"), "alice index");
    write(&root.join("alice_staticfiles/app.css"), "body { color: red; }");
    write(&root.join("beta/beta/landing.html"), "beta landing");

    let alice_dir = root.join("alice").to_string_lossy().to_string();
    let beta_dir = root.join("beta").to_string_lossy().to_string();
    let retired_dir = root.join("retired").to_string_lossy().to_string();

    let mut config = AppConfig::default();
    config.server.debug = debug;
    // Override dirs are absolute here, so the static root is just `<dir>_staticfiles/`.
    config.templates.project_path = String::new();
    config.templates.default_dir = Some(root.join("templates").to_string_lossy().to_string());
    config.storage.seed = vec![
        OverrideRecord::new("alice", 1, None, alice_dir.as_str()),
        OverrideRecord::new("bob", 1, Some("beta"), beta_dir.as_str()),
        OverrideRecord::new("bob", 2, Some("retired"), retired_dir.as_str()),
    ];
    config.routing.url_provider = Some("site.url_overrides".into());
    config.routing.root = vec![
        Route::new("/", "index.html").named("home"),
        Route::new("/about", "about.html").named("about"),
    ];
    config.routing.providers = vec![ProviderConfig {
        id: "site.url_overrides".into(),
        fragments: vec![FragmentConfig {
            name: "beta".into(),
            routes: vec![Route::new("/landing", "beta/landing.html").named("landing")],
        }],
    }];

    Site {
        _tmp: tmp,
        config,
        alice_dir,
    }
}

async fn start_server(
    config: &AppConfig,
) -> (String, tokio::sync::oneshot::Sender<()>, JoinHandle<()>) {
    let app = build_app(config).await.expect("build app");

    let listener = tokio::net::TcpListener::bind((std::net::Ipv4Addr::LOCALHOST, 0))
        .await
        .expect("bind");
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = tokio::sync::oneshot::channel::<()>();

    let server = tokio::spawn(async move {
        let _ = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = rx.await;
            })
            .await;
    });

    (format!("http://{addr}"), tx, server)
}

async fn get_as(client: &reqwest::Client, url: &str, user: Option<&str>) -> reqwest::Response {
    let mut req = client.get(url);
    if let Some(user) = user {
        req = req.header(USER_HEADER, user);
    }
    req.send().await.unwrap()
}

#[tokio::test]
async fn probes_respond() {
    let site = site(false);
    let (base, shutdown_tx, handle) = start_server(&site.config).await;
    let client = reqwest::Client::new();

    let resp = client.get(format!("{base}/healthz")).send().await.unwrap();
    assert!(resp.status().is_success());
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");

    let resp = client.get(format!("{base}/readyz")).send().await.unwrap();
    assert!(resp.status().is_success());
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ready");
    assert_eq!(body["storage"], "in-memory-papaya");
    assert_eq!(body["cache"], "local");
    assert_eq!(body["routing_overrides"], true);

    let _ = shutdown_tx.send(());
    let _ = handle.await;
}

#[tokio::test]
async fn anonymous_requests_use_the_baseline() {
    let site = site(false);
    let (base, shutdown_tx, handle) = start_server(&site.config).await;
    let client = reqwest::Client::new();

    let resp = get_as(&client, &format!("{base}/"), None).await;
    assert_eq!(resp.status(), 200);
    assert!(resp.headers().contains_key("x-request-id"));
    assert!(
        resp.headers()["content-type"]
            .to_str()
            .unwrap()
            .starts_with("text/html")
    );
    assert_eq!(resp.text().await.unwrap(), "default index");

    let resp = get_as(&client, &format!("{base}/landing"), None).await;
    assert_eq!(resp.status(), 404);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "route-not-found");

    let _ = shutdown_tx.send(());
    let _ = handle.await;
}

#[tokio::test]
async fn request_id_is_propagated() {
    let site = site(false);
    let (base, shutdown_tx, handle) = start_server(&site.config).await;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("{base}/"))
        .header("x-request-id", "abc-123")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.headers()["x-request-id"], "abc-123");

    let _ = shutdown_tx.send(());
    let _ = handle.await;
}

#[tokio::test]
async fn template_overrides_apply_per_user() {
    let site = site(false);
    let (base, shutdown_tx, handle) = start_server(&site.config).await;
    let client = reqwest::Client::new();

    let resp = get_as(&client, &format!("{base}/"), Some("alice")).await;
    assert_eq!(resp.text().await.unwrap(), "alice index");

    // Not overridden: found further down the search path.
    let resp = get_as(&client, &format!("{base}/about"), Some("alice")).await;
    assert_eq!(resp.text().await.unwrap(), "default about");

    // The next unrelated request is back on the baseline.
    let resp = get_as(&client, &format!("{base}/"), None).await;
    assert_eq!(resp.text().await.unwrap(), "default index");
    let resp = get_as(&client, &format!("{base}/"), Some("carol")).await;
    assert_eq!(resp.text().await.unwrap(), "default index");

    let _ = shutdown_tx.send(());
    let _ = handle.await;
}

#[tokio::test]
async fn routing_overrides_apply_per_user() {
    let site = site(false);
    let (base, shutdown_tx, handle) = start_server(&site.config).await;
    let client = reqwest::Client::new();

    let resp = get_as(&client, &format!("{base}/landing"), Some("bob")).await;
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "beta landing");

    // The root table still answers underneath the override fragment.
    let resp = get_as(&client, &format!("{base}/about"), Some("bob")).await;
    assert_eq!(resp.text().await.unwrap(), "default about");

    let resp = get_as(&client, &format!("{base}/landing"), Some("alice")).await;
    assert_eq!(resp.status(), 404);

    let _ = shutdown_tx.send(());
    let _ = handle.await;
}

#[tokio::test]
async fn concurrent_users_never_share_artifacts() {
    let site = site(false);
    let (base, shutdown_tx, handle) = start_server(&site.config).await;
    let client = reqwest::Client::new();

    let mut tasks = Vec::new();
    for i in 0..40 {
        let client = client.clone();
        let base = base.clone();
        tasks.push(tokio::spawn(async move {
            let user = if i % 2 == 0 { "alice" } else { "bob" };
            let index = get_as(&client, &format!("{base}/"), Some(user))
                .await
                .text()
                .await
                .unwrap();
            let landing = get_as(&client, &format!("{base}/landing"), Some(user))
                .await
                .status()
                .as_u16();
            (user, index, landing)
        }));
    }

    for task in tasks {
        let (user, index, landing) = task.await.unwrap();
        match user {
            "alice" => {
                assert_eq!(index, "alice index");
                assert_eq!(landing, 404);
            }
            _ => {
                assert_eq!(index, "default index");
                assert_eq!(landing, 200);
            }
        }
    }

    let _ = shutdown_tx.send(());
    let _ = handle.await;
}

#[tokio::test]
async fn only_get_and_head_are_dispatched() {
    let site = site(false);
    let (base, shutdown_tx, handle) = start_server(&site.config).await;
    let client = reqwest::Client::new();

    let resp = client.post(format!("{base}/")).send().await.unwrap();
    assert_eq!(resp.status(), 405);
    assert_eq!(resp.headers()["allow"], "GET, HEAD");
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "method-not-allowed");

    let resp = client.head(format!("{base}/")).send().await.unwrap();
    assert_eq!(resp.status(), 200);

    let _ = shutdown_tx.send(());
    let _ = handle.await;
}

#[tokio::test]
async fn missing_template_is_not_found() {
    let mut site = site(false);
    site.config
        .routing
        .root
        .push(Route::new("/ghost", "ghost.html"));
    let (base, shutdown_tx, handle) = start_server(&site.config).await;
    let client = reqwest::Client::new();

    let resp = get_as(&client, &format!("{base}/ghost"), Some("alice")).await;
    assert_eq!(resp.status(), 404);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "template-not-found");

    let _ = shutdown_tx.send(());
    let _ = handle.await;
}

#[tokio::test]
async fn development_routes_are_hidden_outside_debug() {
    let site = site(false);
    let (base, shutdown_tx, handle) = start_server(&site.config).await;
    let client = reqwest::Client::new();
    let static_prefix = format!("/static/{}", site.alice_dir.replace('/', ""));

    let resp = get_as(&client, &format!("{base}/_overlay/context"), Some("alice")).await;
    assert_eq!(resp.status(), 404);

    let resp = get_as(&client, &format!("{base}{static_prefix}/app.css"), None).await;
    assert_eq!(resp.status(), 404);

    let _ = shutdown_tx.send(());
    let _ = handle.await;
}

#[tokio::test]
async fn debug_mode_exposes_context_and_static_assets() {
    let site = site(true);
    let (base, shutdown_tx, handle) = start_server(&site.config).await;
    let client = reqwest::Client::new();
    let static_prefix = format!("/static/{}", site.alice_dir.replace('/', ""));

    let resp = get_as(&client, &format!("{base}{static_prefix}/app.css"), None).await;
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "body { color: red; }");

    let resp = get_as(&client, &format!("{base}/_overlay/context"), Some("bob")).await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["user"], "bob");
    assert_eq!(body["template_dirs"].as_array().unwrap().len(), 3);
    assert_eq!(body["routing_namespaces"], serde_json::json!(["beta", null]));

    let resp = get_as(&client, &format!("{base}/_overlay/context"), None).await;
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["user"], Value::Null);
    assert_eq!(body["template_dirs"].as_array().unwrap().len(), 1);
    assert_eq!(body["routing_namespaces"], Value::Null);

    let _ = shutdown_tx.send(());
    let _ = handle.await;
}

#[tokio::test]
async fn metrics_are_exported() {
    overlay_server::metrics::init_metrics();
    let site = site(false);
    let (base, shutdown_tx, handle) = start_server(&site.config).await;
    let client = reqwest::Client::new();

    let resp = get_as(&client, &format!("{base}/"), Some("alice")).await;
    assert_eq!(resp.status(), 200);

    let resp = client.get(format!("{base}/metrics")).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    let body = resp.text().await.unwrap();
    assert!(body.contains("overlay_store_queries_total"));

    let _ = shutdown_tx.send(());
    let _ = handle.await;
}

#[tokio::test]
async fn debug_startup_skips_unmountable_override_dirs() {
    let mut site = site(true);
    site.config
        .storage
        .seed
        .push(OverrideRecord::new("dave", 1, None, "/:theme"));
    let (base, shutdown_tx, handle) = start_server(&site.config).await;
    let client = reqwest::Client::new();
    let static_prefix = format!("/static/{}", site.alice_dir.replace('/', ""));

    let resp = get_as(&client, &format!("{base}{static_prefix}/app.css"), None).await;
    assert_eq!(resp.status(), 200);

    let _ = shutdown_tx.send(());
    let _ = handle.await;
}
