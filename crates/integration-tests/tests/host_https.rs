mod support;

use std::time::Duration;

use host_server::http::build_static_router;
use host_server::server::{serve_https, shutdown_channel};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

use support::static_site::{APP_JS, INDEX_HTML, StaticSite};
use support::tls::{TEST_DOMAIN, TestCertificate};

#[tokio::test]
async fn https_listener_serves_assets_and_index_fallback() {
    let site = StaticSite::create();
    let certificate = TestCertificate::generate();
    let (listener, addr) = support::local_listener().await;
    let (trigger, shutdown) = shutdown_channel();
    let server = tokio::spawn(serve_https(
        listener,
        certificate.server_config.clone(),
        build_static_router(&site.static_dir, &site.index_file),
        shutdown,
    ));

    let client = certificate.client(addr);
    let base = format!("https://{TEST_DOMAIN}:{}", addr.port());

    let root = get_text(&client, &format!("{base}/")).await;
    let fallback = get_text(&client, &format!("{base}/random-route")).await;
    let asset = get_text(&client, &format!("{base}/assets/app.js")).await;

    assert_eq!(root, INDEX_HTML);
    assert_eq!(fallback, root);
    assert_eq!(asset, APP_JS);

    drop(client);
    trigger.trigger();
    tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .expect("https listener should stop after shutdown")
        .expect("server task should join")
        .expect("https listener should stop cleanly");
}

#[tokio::test]
async fn failed_handshake_does_not_stop_the_listener() {
    let site = StaticSite::create();
    let certificate = TestCertificate::generate();
    let (listener, addr) = support::local_listener().await;
    let (trigger, shutdown) = shutdown_channel();
    let server = tokio::spawn(serve_https(
        listener,
        certificate.server_config.clone(),
        build_static_router(&site.static_dir, &site.index_file),
        shutdown,
    ));

    let mut plaintext = TcpStream::connect(addr)
        .await
        .expect("raw connection should open");
    plaintext
        .write_all(b"GET / HTTP/1.1\r\nHost: koala.test\r\n\r\n")
        .await
        .expect("plaintext request should be written");
    drop(plaintext);

    let client = certificate.client(addr);
    let body = get_text(
        &client,
        &format!("https://{TEST_DOMAIN}:{}/random-route", addr.port()),
    )
    .await;
    assert_eq!(body, INDEX_HTML);

    drop(client);
    trigger.trigger();
    tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .expect("https listener should stop after shutdown")
        .expect("server task should join")
        .expect("https listener should stop cleanly");
}

async fn get_text(client: &reqwest::Client, url: &str) -> String {
    let response = client
        .get(url)
        .send()
        .await
        .expect("https request should succeed");
    assert_eq!(response.status(), reqwest::StatusCode::OK, "{url}");
    response.text().await.expect("body should be readable")
}
