use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rustls::ServerConfig;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TlsSetupError {
    #[error("failed to read tls {kind} at {path}: {source}")]
    Read {
        kind: &'static str,
        path: PathBuf,
        source: io::Error,
    },
    #[error("no certificates found in {0}")]
    NoCertificates(PathBuf),
    #[error("no private key found in {0}")]
    NoPrivateKey(PathBuf),
    #[error("invalid tls certificate or key: {0}")]
    Rustls(#[from] rustls::Error),
}

/// Reads the PEM certificate chain and private key and builds the server
/// config used by the HTTPS listener. Advertises h2 and http/1.1 over ALPN.
pub fn load_tls_config(
    cert_path: &Path,
    key_path: &Path,
) -> Result<Arc<ServerConfig>, TlsSetupError> {
    let certs = read_certificates(cert_path)?;
    let key = read_private_key(key_path)?;

    let mut config =
        ServerConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
            .with_safe_default_protocol_versions()?
            .with_no_client_auth()
            .with_single_cert(certs, key)?;
    config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];

    Ok(Arc::new(config))
}

fn read_certificates(path: &Path) -> Result<Vec<CertificateDer<'static>>, TlsSetupError> {
    let read_err = |source| TlsSetupError::Read {
        kind: "certificate",
        path: path.to_path_buf(),
        source,
    };

    let mut reader = BufReader::new(File::open(path).map_err(read_err)?);
    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(read_err)?;
    if certs.is_empty() {
        return Err(TlsSetupError::NoCertificates(path.to_path_buf()));
    }
    Ok(certs)
}

fn read_private_key(path: &Path) -> Result<PrivateKeyDer<'static>, TlsSetupError> {
    let read_err = |source| TlsSetupError::Read {
        kind: "private key",
        path: path.to_path_buf(),
        source,
    };

    let mut reader = BufReader::new(File::open(path).map_err(read_err)?);
    rustls_pemfile::private_key(&mut reader)
        .map_err(read_err)?
        .ok_or_else(|| TlsSetupError::NoPrivateKey(path.to_path_buf()))
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::{TlsSetupError, load_tls_config};

    fn self_signed() -> (String, String) {
        let certified = rcgen::generate_simple_self_signed(vec!["localhost".to_string()])
            .expect("self-signed certificate should generate");
        (certified.cert.pem(), certified.key_pair.serialize_pem())
    }

    #[test]
    fn loads_pem_certificate_and_key() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let (cert_pem, key_pem) = self_signed();
        let cert_path = dir.path().join("fullchain.pem");
        let key_path = dir.path().join("privkey.pem");
        fs::write(&cert_path, cert_pem).expect("cert fixture should be written");
        fs::write(&key_path, key_pem).expect("key fixture should be written");

        let config = load_tls_config(&cert_path, &key_path).expect("tls config should load");
        assert_eq!(
            config.alpn_protocols,
            vec![b"h2".to_vec(), b"http/1.1".to_vec()]
        );
    }

    #[test]
    fn missing_certificate_file_is_a_read_error() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let err = load_tls_config(
            &dir.path().join("fullchain.pem"),
            &dir.path().join("privkey.pem"),
        )
        .expect_err("missing files should fail");

        assert!(matches!(
            err,
            TlsSetupError::Read {
                kind: "certificate",
                ..
            }
        ));
    }

    #[test]
    fn pem_without_expected_blocks_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let (cert_pem, _) = self_signed();
        let cert_path = dir.path().join("fullchain.pem");
        let key_path = dir.path().join("privkey.pem");
        fs::write(&cert_path, &cert_pem).expect("cert fixture should be written");
        fs::write(&key_path, &cert_pem).expect("key fixture should be written");

        let err = load_tls_config(&cert_path, &key_path).expect_err("key file has no key");
        assert!(matches!(err, TlsSetupError::NoPrivateKey(_)));

        fs::write(&cert_path, "not a pem file").expect("cert fixture should be written");
        let err = load_tls_config(&cert_path, &key_path).expect_err("cert file has no certs");
        assert!(matches!(err, TlsSetupError::NoCertificates(_)));
    }
}
