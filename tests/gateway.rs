//! End-to-end tests driving a running gateway over TCP.

use std::path::Path;

use hostgate::config::{load_config, GatewayConfig, RouterConfig};
use hostgate::lifecycle::{Gateway, RegistryError, StartupError};
use reqwest::header::{AUTHORIZATION, HOST};
use reqwest::StatusCode;
use serde_json::{json, Value};

mod common;

const LISTEN: &str = "127.0.0.1:0";

fn router(blocks: &[&str], port: u16) -> RouterConfig {
    RouterConfig {
        allowed_targets: blocks.iter().map(|b| b.to_string()).collect(),
        backend_port: Some(port),
        ..RouterConfig::new(LISTEN)
    }
}

async fn start(config: GatewayConfig) -> Gateway {
    Gateway::start(config, Path::new("unused.toml")).await.unwrap()
}

fn proxy_url(gateway: &Gateway, path: &str) -> String {
    format!("http://{}{path}", gateway.listener_addr(LISTEN).unwrap())
}

#[tokio::test]
async fn literal_host_is_forwarded_unchanged() {
    let backend = common::start_echo_backend().await;
    let gateway = start(GatewayConfig {
        routers: vec![router(&["127.0.0.0/8"], backend.addr.port())],
        ..GatewayConfig::default()
    })
    .await;

    let res = common::client()
        .post(proxy_url(&gateway, "/orders/42?expand=items"))
        .header(HOST, "127-0-0-1.apps.test")
        .body("payload")
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.headers().contains_key("x-request-id"));
    let echo: Value = res.json().await.unwrap();
    assert_eq!(echo["method"], "POST");
    assert_eq!(echo["path"], "/orders/42");
    assert_eq!(echo["query"], "expand=items");
    assert_eq!(echo["body"], "payload");
    assert_eq!(echo["host"], "127-0-0-1.apps.test");
    assert_eq!(echo["user_agent"], "");
    assert_eq!(echo["forwarded_for"], "127.0.0.1");
    assert!(echo["request_id"].is_string());
    assert_eq!(backend.hits(), 1);

    gateway.shutdown().await;
}

#[tokio::test]
async fn client_user_agent_is_preserved() {
    let backend = common::start_echo_backend().await;
    let gateway = start(GatewayConfig {
        routers: vec![router(&["127.0.0.1/32"], backend.addr.port())],
        ..GatewayConfig::default()
    })
    .await;

    let echo: Value = common::client()
        .get(proxy_url(&gateway, "/"))
        .header(HOST, "127-0-0-1")
        .header("user-agent", "probe/1.0")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(echo["user_agent"], "probe/1.0");

    gateway.shutdown().await;
}

#[tokio::test]
async fn denied_target_never_reaches_backend() {
    let backend = common::start_echo_backend().await;
    let gateway = start(GatewayConfig {
        routers: vec![router(&["10.0.0.0/8"], backend.addr.port())],
        ..GatewayConfig::default()
    })
    .await;

    let res = common::client()
        .get(proxy_url(&gateway, "/"))
        .header(HOST, "127-0-0-1.apps.test")
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    assert_eq!(backend.hits(), 0);

    gateway.shutdown().await;
}

#[tokio::test]
async fn arbitrary_target_skips_allow_list() {
    let backend = common::start_echo_backend().await;
    let mut config = router(&[], backend.addr.port());
    config.allow_arbitrary_target = true;
    let gateway = start(GatewayConfig {
        routers: vec![config],
        ..GatewayConfig::default()
    })
    .await;

    let res = common::client()
        .get(proxy_url(&gateway, "/"))
        .header(HOST, "127-0-0-1.apps.test")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(backend.hits(), 1);

    gateway.shutdown().await;
}

#[tokio::test]
async fn unresolvable_name_is_bad_gateway() {
    let backend = common::start_echo_backend().await;
    let gateway = start(GatewayConfig {
        routers: vec![router(&["0.0.0.0/0"], backend.addr.port())],
        ..GatewayConfig::default()
    })
    .await;

    let res = common::client()
        .get(proxy_url(&gateway, "/"))
        .header(HOST, "no-such-service.apps.test")
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(backend.hits(), 0);

    gateway.shutdown().await;
}

#[tokio::test]
async fn table_names_route_after_sync() {
    let backend = common::start_echo_backend().await;
    let source = common::start_table_server(json!({
        "billing": "127.0.0.1",
        "broken": "not-an-address",
    }))
    .await;

    let gateway = start(GatewayConfig {
        remote_config_path: Some(source),
        control: Some("127.0.0.1:0".into()),
        routers: vec![router(&["127.0.0.0/8"], backend.addr.port())],
        ..GatewayConfig::default()
    })
    .await;

    let sync = gateway.sync().clone();
    assert!(common::eventually(|| sync.lookup("billing").is_some()).await);
    assert_eq!(sync.lookup("broken"), None);

    let echo: Value = common::client()
        .get(proxy_url(&gateway, "/invoices"))
        .header(HOST, "billing.apps.test")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(echo["host"], "billing.apps.test");
    assert_eq!(echo["path"], "/invoices");

    let control = gateway.control_addr().unwrap();
    let table: Value = common::client()
        .get(format!("http://{control}/routing-table"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(table, json!({"billing": "127.0.0.1"}));

    gateway.shutdown().await;
}

#[tokio::test]
async fn control_reload_swaps_policy_in_place() {
    let backend = common::start_echo_backend().await;
    let dir = tempfile::tempdir().unwrap();
    let port = backend.addr.port();

    let write = |blocks: &str, extra: &str| {
        common::write_config(
            dir.path(),
            &format!(
                r#"
                control = "127.0.0.1:0"

                [[routers]]
                listen_addr = "{LISTEN}"
                allowed_targets = [{blocks}]
                backend_port = {port}
                {extra}
                "#
            ),
        )
    };

    let path = write(r#""10.0.0.0/8""#, "");
    let config = load_config(&path).unwrap();
    let gateway = Gateway::start(config, &path).await.unwrap();
    let control = gateway.control_addr().unwrap();
    let client = common::client();

    let send = || {
        client
            .get(proxy_url(&gateway, "/"))
            .header(HOST, "127-0-0-1.apps.test")
            .send()
    };
    assert_eq!(send().await.unwrap().status(), StatusCode::FORBIDDEN);

    write(
        r#""127.0.0.0/8""#,
        r#"
        [[routers]]
        listen_addr = "127.0.0.1:1"
        allowed_targets = []
        "#,
    );
    let report: Value = client
        .post(format!("http://{control}/reload"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(report["updated"], json!([LISTEN]));
    assert_eq!(report["ignored"], json!(["127.0.0.1:1"]));
    assert_eq!(send().await.unwrap().status(), StatusCode::OK);

    // A bad block leaves the running policy untouched.
    write(r#""127.0.0.0/8", "not-a-block""#, "");
    let report: Value = client
        .post(format!("http://{control}/reload"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(report["failed"][0]["listen_addr"], LISTEN);
    assert_eq!(send().await.unwrap().status(), StatusCode::OK);

    std::fs::remove_file(&path).unwrap();
    let res = client.post(format!("http://{control}/reload")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(send().await.unwrap().status(), StatusCode::OK);

    gateway.shutdown().await;
}

#[tokio::test]
async fn control_key_is_enforced() {
    let gateway = start(GatewayConfig {
        control: Some("127.0.0.1:0".into()),
        control_api_key: Some("s3cret".into()),
        routers: vec![router(&["10.0.0.0/8"], 80)],
        ..GatewayConfig::default()
    })
    .await;
    let control = gateway.control_addr().unwrap();
    let client = common::client();

    let res = client.get(format!("http://{control}/status")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client
        .get(format!("http://{control}/status"))
        .header(AUTHORIZATION, "Bearer s3cret")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let status: Value = res.json().await.unwrap();
    assert_eq!(status["listeners"], 1);

    let listeners: Value = client
        .get(format!("http://{control}/listeners"))
        .header(AUTHORIZATION, "Bearer s3cret")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(listeners[0]["listen_addr"], LISTEN);
    assert_eq!(listeners[0]["allowed_blocks"], json!(["10.0.0.0/8"]));

    gateway.shutdown().await;
}

#[tokio::test]
async fn duplicate_listener_is_fatal() {
    let config = GatewayConfig {
        routers: vec![router(&[], 80), router(&["10.0.0.0/8"], 80)],
        ..GatewayConfig::default()
    };
    let err = Gateway::start(config, Path::new("unused.toml")).await.err().unwrap();
    assert!(matches!(
        err,
        StartupError::Registry(RegistryError::DuplicateListener(_))
    ));
}
