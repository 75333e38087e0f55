use std::fs;
use std::sync::Arc;

use host_server::tls::load_tls_config;
use rustls::ServerConfig;

pub const TEST_DOMAIN: &str = "koala.test";

/// Self-signed certificate for [`TEST_DOMAIN`], loaded through the same path
/// the host uses at startup.
pub struct TestCertificate {
    pub cert_pem: String,
    pub server_config: Arc<ServerConfig>,
}

impl TestCertificate {
    pub fn generate() -> Self {
        let certified = rcgen::generate_simple_self_signed(vec![TEST_DOMAIN.to_string()])
            .expect("self-signed certificate should generate");
        let cert_pem = certified.cert.pem();

        let dir = tempfile::tempdir().expect("tempdir should be created");
        let cert_path = dir.path().join("fullchain.pem");
        let key_path = dir.path().join("privkey.pem");
        fs::write(&cert_path, &cert_pem).expect("cert should be written");
        fs::write(&key_path, certified.key_pair.serialize_pem()).expect("key should be written");

        let server_config =
            load_tls_config(&cert_path, &key_path).expect("tls config should load");
        Self {
            cert_pem,
            server_config,
        }
    }

    pub fn client(&self, addr: std::net::SocketAddr) -> reqwest::Client {
        let root = reqwest::Certificate::from_pem(self.cert_pem.as_bytes())
            .expect("test certificate should parse");
        reqwest::Client::builder()
            .add_root_certificate(root)
            .resolve(TEST_DOMAIN, addr)
            .build()
            .expect("https client should build")
    }
}
