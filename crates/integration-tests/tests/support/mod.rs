#![allow(dead_code)]

pub mod mock_provider;
pub mod static_site;
pub mod tls;

use std::net::SocketAddr;

use host_server::server::bind;
use tokio::net::TcpListener;

pub async fn local_listener() -> (TcpListener, SocketAddr) {
    let listener = bind(SocketAddr::from(([127, 0, 0, 1], 0)))
        .await
        .expect("listener should bind");
    let addr = listener
        .local_addr()
        .expect("listener address should resolve");
    (listener, addr)
}
