//! TLS-Acceptor aus PEM-Dateien

use anyhow::{bail, Context, Result};
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::ServerConfig as TlsServerConfig;
use std::io::BufReader;
use std::sync::Arc;
use tokio_rustls::TlsAcceptor;

use crate::config::SicherheitEinstellungen;

/// Laedt Zertifikatskette und Schluessel und baut den Acceptor
pub fn acceptor_laden(einstellungen: &SicherheitEinstellungen) -> Result<TlsAcceptor> {
    let zertifikate = zertifikate_laden(&einstellungen.tls_zertifikat)?;
    let schluessel = schluessel_laden(&einstellungen.tls_schluessel)?;

    let config = TlsServerConfig::builder_with_provider(Arc::new(
        rustls::crypto::ring::default_provider(),
    ))
    .with_safe_default_protocol_versions()?
    .with_no_client_auth()
    .with_single_cert(zertifikate, schluessel)
    .context("Zertifikat und Schluessel passen nicht zusammen")?;

    tracing::info!(
        zertifikat = %einstellungen.tls_zertifikat,
        "TLS-Konfiguration geladen"
    );
    Ok(TlsAcceptor::from(Arc::new(config)))
}

fn zertifikate_laden(pfad: &str) -> Result<Vec<CertificateDer<'static>>> {
    let datei = std::fs::File::open(pfad)
        .with_context(|| format!("TLS-Zertifikat '{pfad}' nicht lesbar"))?;
    let zertifikate = rustls_pemfile::certs(&mut BufReader::new(datei))
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("TLS-Zertifikat '{pfad}' ungueltig"))?;

    if zertifikate.is_empty() {
        bail!("Keine Zertifikate in '{pfad}' gefunden");
    }
    Ok(zertifikate)
}

fn schluessel_laden(pfad: &str) -> Result<PrivateKeyDer<'static>> {
    let datei = std::fs::File::open(pfad)
        .with_context(|| format!("TLS-Schluessel '{pfad}' nicht lesbar"))?;
    rustls_pemfile::private_key(&mut BufReader::new(datei))
        .with_context(|| format!("TLS-Schluessel '{pfad}' ungueltig"))?
        .with_context(|| format!("Kein privater Schluessel in '{pfad}' gefunden"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn einstellungen(zertifikat: &str, schluessel: &str) -> SicherheitEinstellungen {
        SicherheitEinstellungen {
            tls_aktiviert: true,
            tls_zertifikat: zertifikat.into(),
            tls_schluessel: schluessel.into(),
        }
    }

    #[test]
    fn fehlende_dateien_sind_ein_fehler() {
        let dir = tempfile::tempdir().unwrap();
        let zert = dir.path().join("cert.pem");
        let key = dir.path().join("key.pem");
        let ergebnis = acceptor_laden(&einstellungen(
            zert.to_str().unwrap(),
            key.to_str().unwrap(),
        ));
        let meldung = format!("{:#}", ergebnis.err().unwrap());
        assert!(meldung.contains("nicht lesbar"), "{meldung}");
    }

    #[test]
    fn datei_ohne_zertifikat_wird_abgelehnt() {
        let mut zert = tempfile::NamedTempFile::new().unwrap();
        writeln!(zert, "kein PEM-Inhalt").unwrap();
        let ergebnis = zertifikate_laden(zert.path().to_str().unwrap());
        assert!(ergebnis.is_err());
    }

    #[test]
    fn datei_ohne_schluessel_wird_abgelehnt() {
        let mut key = tempfile::NamedTempFile::new().unwrap();
        writeln!(key, "kein PEM-Inhalt").unwrap();
        let ergebnis = schluessel_laden(key.path().to_str().unwrap());
        assert!(ergebnis.is_err());
    }
}
