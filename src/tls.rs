use std::net::IpAddr;
use std::path::{Path, PathBuf};

use axum::extract::Request;
use axum::http::{header, StatusCode, Uri};
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use axum::Router;
use rcgen::{CertificateParams, DnType, ExtendedKeyUsagePurpose, KeyPair, KeyUsagePurpose, SanType};

/// Paths to TLS certificate files within the data directory.
#[derive(Debug, Clone)]
pub struct TlsPaths {
    pub server_cert: PathBuf,
    pub server_key: PathBuf,
}

impl TlsPaths {
    pub fn new(data_dir: &Path) -> Self {
        let tls_dir = data_dir.join("tls");
        Self {
            server_cert: tls_dir.join("server.crt"),
            server_key: tls_dir.join("server.key"),
        }
    }

    pub fn certs_exist(&self) -> bool {
        self.server_cert.exists() && self.server_key.exists()
    }
}

/// Ensure a self-signed certificate exists, generating it if missing.
pub fn ensure_certs(data_dir: &Path) -> anyhow::Result<TlsPaths> {
    let paths = TlsPaths::new(data_dir);

    if paths.certs_exist() {
        tracing::info!("TLS certificate found at {}", paths.server_cert.display());
        return Ok(paths);
    }

    if let Some(dir) = paths.server_cert.parent() {
        std::fs::create_dir_all(dir)?;
    }
    tracing::info!("Generating self-signed TLS certificate");

    let (cert_pem, key_pem) = generate_self_signed()?;
    std::fs::write(&paths.server_cert, cert_pem)?;
    std::fs::write(&paths.server_key, key_pem)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&paths.server_key, std::fs::Permissions::from_mode(0o600))?;
    }

    Ok(paths)
}

fn generate_self_signed() -> anyhow::Result<(String, String)> {
    let mut params = CertificateParams::default();
    params.distinguished_name.push(DnType::CommonName, "Forum");
    params.not_before = rcgen::date_time_ymd(2024, 1, 1);
    params.not_after = rcgen::date_time_ymd(2034, 1, 1);
    params.extended_key_usages = vec![ExtendedKeyUsagePurpose::ServerAuth];
    params.key_usages = vec![
        KeyUsagePurpose::DigitalSignature,
        KeyUsagePurpose::KeyEncipherment,
    ];
    params.subject_alt_names = vec![
        SanType::DnsName("localhost".try_into()?),
        SanType::IpAddress(IpAddr::V4(std::net::Ipv4Addr::LOCALHOST)),
    ];

    let key_pair = KeyPair::generate()?;
    let cert = params.self_signed(&key_pair)?;
    Ok((cert.pem(), key_pair.serialize_pem()))
}

/// Load TLS certificates into an axum-server RustlsConfig.
pub async fn load_rustls_config(
    paths: &TlsPaths,
) -> anyhow::Result<axum_server::tls_rustls::RustlsConfig> {
    let config =
        axum_server::tls_rustls::RustlsConfig::from_pem_file(&paths.server_cert, &paths.server_key)
            .await?;
    Ok(config)
}

/// Plain-HTTP app that sends every request to the HTTPS listener.
pub fn https_redirector(https_port: u16) -> Router {
    Router::new().fallback(move |request: Request| async move {
        let host = request
            .headers()
            .get(header::HOST)
            .and_then(|h| h.to_str().ok())
            .unwrap_or("localhost");
        https_location(host, https_port, request.uri())
            .map(|location| Redirect::permanent(&location).into_response())
            .unwrap_or_else(|| StatusCode::BAD_REQUEST.into_response())
    })
}

fn https_location(host: &str, https_port: u16, uri: &Uri) -> Option<String> {
    let authority: axum::http::uri::Authority = host.parse().ok()?;
    let path = uri.path_and_query().map(|p| p.as_str()).unwrap_or("/");
    Some(if https_port == 443 {
        format!("https://{}{}", authority.host(), path)
    } else {
        format!("https://{}:{}{}", authority.host(), https_port, path)
    })
}

/// Middleware sending `www.` hosts to the bare host.
pub async fn strip_www(request: Request, next: Next) -> Response {
    let bare = request
        .headers()
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("www."))
        .map(str::to_string);

    match bare {
        Some(host) => {
            let path = request
                .uri()
                .path_and_query()
                .map(|p| p.as_str())
                .unwrap_or("/");
            (
                StatusCode::FOUND,
                [(header::LOCATION, format!("https://{host}{path}"))],
            )
                .into_response()
        }
        None => next.run(request).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use tower::ServiceExt;

    #[test]
    fn tls_paths_structure() {
        let paths = TlsPaths::new(Path::new("/home/user/.forum"));
        assert_eq!(
            paths.server_cert,
            PathBuf::from("/home/user/.forum/tls/server.crt")
        );
        assert_eq!(
            paths.server_key,
            PathBuf::from("/home/user/.forum/tls/server.key")
        );
    }

    #[test]
    fn generate_certs_and_idempotency() {
        let tmp = tempfile::tempdir().unwrap();
        let paths1 = ensure_certs(tmp.path()).unwrap();
        assert!(paths1.certs_exist());
        let cert1 = std::fs::read_to_string(&paths1.server_cert).unwrap();
        assert!(cert1.contains("BEGIN CERTIFICATE"));

        let paths2 = ensure_certs(tmp.path()).unwrap();
        let cert2 = std::fs::read_to_string(&paths2.server_cert).unwrap();
        assert_eq!(cert1, cert2);
    }

    #[cfg(unix)]
    #[test]
    fn private_key_has_restricted_permissions() {
        use std::os::unix::fs::PermissionsExt;
        let tmp = tempfile::tempdir().unwrap();
        let paths = ensure_certs(tmp.path()).unwrap();
        let mode = std::fs::metadata(&paths.server_key)
            .unwrap()
            .permissions()
            .mode()
            & 0o777;
        assert_eq!(mode, 0o600);
    }

    #[test]
    fn https_location_swaps_port() {
        let uri: Uri = "/post?id=1".parse().unwrap();
        assert_eq!(
            https_location("localhost:8080", 10443, &uri).as_deref(),
            Some("https://localhost:10443/post?id=1")
        );
        assert_eq!(
            https_location("forum.example", 443, &uri).as_deref(),
            Some("https://forum.example/post?id=1")
        );
    }

    #[tokio::test]
    async fn redirector_answers_with_permanent_redirect() {
        let response = https_redirector(10443)
            .oneshot(
                Request::builder()
                    .uri("/user/login")
                    .header(header::HOST, "localhost:8080")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PERMANENT_REDIRECT);
        assert_eq!(
            response.headers().get(header::LOCATION).unwrap(),
            "https://localhost:10443/user/login"
        );
    }

    #[tokio::test]
    async fn www_host_is_sent_to_bare_host() {
        let app = Router::new()
            .route("/", axum::routing::get(|| async { "home" }))
            .layer(axum::middleware::from_fn(strip_www));

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/search?search=go")
                    .header(header::HOST, "www.forum.example")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(
            response.headers().get(header::LOCATION).unwrap(),
            "https://forum.example/search?search=go"
        );

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header(header::HOST, "forum.example")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
