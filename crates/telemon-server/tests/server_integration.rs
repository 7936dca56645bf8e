//! Server integration tests.
//!
//! These run the real listener over a file-backed token store.

mod common;

use anyhow::Result;
use tempfile::TempDir;
use telemon_server::ServerConfig;
use telemon_upstream::MockUpstream;

const ALICE: [(&str, &str); 2] = [("username", "13812345678"), ("password", "pw")];

#[tokio::test]
async fn test_server_health_returns_version() -> Result<()> {
    let temp = TempDir::new()?;
    let server = common::TestServer::start(&temp).await?;

    let resp = server
        .client
        .get(format!("{}/health", server.base_url()))
        .send()
        .await?;

    assert!(resp.status().is_success());
    let body: serde_json::Value = resp.json().await?;
    assert_eq!(body["status"], "ok");
    assert!(body.get("version").is_some());
    assert_eq!(body["upstream"], "mock");
    assert_eq!(body["cached_users"], 0);

    server.get("/show/flow", &ALICE).send().await?.error_for_status()?;
    let body: serde_json::Value = server
        .client
        .get(format!("{}/health", server.base_url()))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(body["cached_users"], 1);
    assert_eq!(body["refreshing"], 0);

    Ok(())
}

#[tokio::test]
async fn test_missing_key_is_401() -> Result<()> {
    let temp = TempDir::new()?;
    let server = common::TestServer::start(&temp).await?;

    let resp = server
        .client
        .get(format!("{}/show/flow", server.base_url()))
        .query(&ALICE)
        .send()
        .await?;

    assert_eq!(resp.status().as_u16(), 401);
    let body: serde_json::Value = resp.json().await?;
    assert_eq!(body["code"], 401);
    assert_eq!(server.upstream.call_count(), 0);

    Ok(())
}

#[tokio::test]
async fn test_wrong_key_is_403() -> Result<()> {
    let temp = TempDir::new()?;
    let server = common::TestServer::start(&temp).await?;

    let resp = server
        .client
        .get(format!("{}/show/flow", server.base_url()))
        .query(&ALICE)
        .query(&[("key", "wrong")])
        .send()
        .await?;

    assert_eq!(resp.status().as_u16(), 403);
    assert_eq!(server.upstream.call_count(), 0);

    Ok(())
}

#[tokio::test]
async fn test_missing_password_is_400() -> Result<()> {
    let temp = TempDir::new()?;
    let server = common::TestServer::start(&temp).await?;

    let resp = server
        .get("/show/flow", &[("username", "13812345678")])
        .send()
        .await?;

    assert_eq!(resp.status().as_u16(), 400);
    let body: serde_json::Value = resp.json().await?;
    assert_eq!(body["code"], 400);

    Ok(())
}

#[tokio::test]
async fn test_flow_is_cached_and_token_persisted() -> Result<()> {
    let temp = TempDir::new()?;
    let server = common::TestServer::start(&temp).await?;

    let first: serde_json::Value = server.get("/show/flow", &ALICE).send().await?.json().await?;
    let second: serde_json::Value = server.get("/show/flow", &ALICE).send().await?.json().await?;

    assert_eq!(first["code"], 200);
    assert_eq!(first["data"]["username"], "138****5678");
    assert_eq!(first, second);
    assert_eq!(server.upstream.login_count(), 1);
    assert_eq!(server.upstream.fetch_count(), 1);

    let record = temp.path().join("tokens").join("13812345678.json");
    let saved: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(record)?)?;
    assert_eq!(saved["token"], "tok-1");
    assert!(saved["loginLastTime"].as_i64().unwrap() > 0);

    server.stop().await?;
    Ok(())
}

#[tokio::test]
async fn test_restart_keeps_login_cooldown() -> Result<()> {
    let temp = TempDir::new()?;

    let server = common::TestServer::start(&temp).await?;
    server.get("/show/flow", &ALICE).send().await?.error_for_status()?;
    server.stop().await?;

    // A fresh process: empty cache, but the token and cooldown are on disk.
    // The password has not been checked in this process, so the token is
    // not used and no login is allowed yet.
    let upstream = MockUpstream::new();
    upstream.accept_token("tok-1");
    let server =
        common::TestServer::start_with(temp.path(), upstream, ServerConfig::default()).await?;

    let resp = server.get("/show/flow", &ALICE).send().await?;
    assert_eq!(resp.status().as_u16(), 429);
    assert!(resp.headers().contains_key("retry-after"));
    assert_eq!(server.upstream.call_count(), 0);

    let record = temp.path().join("tokens").join("13812345678.json");
    let saved: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(record)?)?;
    assert_eq!(saved["token"], "tok-1");

    server.stop().await?;
    Ok(())
}

#[tokio::test]
async fn test_wrong_password_is_not_served_from_cache() -> Result<()> {
    let temp = TempDir::new()?;
    let server = common::TestServer::start(&temp).await?;
    server.get("/show/flow", &ALICE).send().await?.error_for_status()?;

    let wrong = [("username", "13812345678"), ("password", "guess")];
    let resp = server.get("/show/flow", &wrong).send().await?;
    assert_eq!(resp.status().as_u16(), 429);
    let body: serde_json::Value = resp.json().await?;
    assert!(body.get("data").is_none());
    assert_eq!(server.upstream.call_count(), 2);

    server.stop().await?;
    Ok(())
}

#[tokio::test]
async fn test_dev_routes_only_in_dev_mode() -> Result<()> {
    let temp = TempDir::new()?;
    let prod = common::TestServer::start(&temp).await?;
    let resp = prod.get("/show/stats", &[]).send().await?;
    assert_eq!(resp.status().as_u16(), 404);

    let dev_dir = TempDir::new()?;
    let dev = common::TestServer::start_with(
        dev_dir.path(),
        MockUpstream::new(),
        ServerConfig::default().with_dev(true),
    )
    .await?;
    let resp = dev.get("/show/stats", &[]).send().await?;
    assert!(resp.status().is_success());

    Ok(())
}

#[tokio::test]
async fn test_multiple_servers_different_ports() -> Result<()> {
    let (a, b) = (TempDir::new()?, TempDir::new()?);
    let server1 = common::TestServer::start(&a).await?;
    let server2 = common::TestServer::start(&b).await?;

    assert_ne!(server1.addr, server2.addr);
    assert!(server1.health().await?);
    assert!(server2.health().await?);

    Ok(())
}
