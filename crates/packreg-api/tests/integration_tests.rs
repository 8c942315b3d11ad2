//! # Integration Tests for packreg-api
//!
//! Drives the full router with `oneshot`: authentication, pack lifecycle,
//! publishing, tier-gated downloads, license verification and the error
//! envelope.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use packreg_api::state::{ApiConfig, AppState};
use packreg_core::wire::{
    DownloadResponse, LicenseKeyInfo, PackInfo, UploadFile, VerifyLicenseResponse, VersionInfo,
};
use packreg_core::{sha256_hex, PackSlug, PackStatus, SemVer};
use packreg_crypto::Ed25519PublicKey;
use packreg_license::{LicenseVerifier, Verification};
use serde_json::{json, Value};
use tower::ServiceExt;

const SECRET: &str = "s3cret";

fn test_app() -> axum::Router {
    let config = ApiConfig {
        auth_secret: Some(SECRET.to_string()),
        pricing_url: "https://example.test/pricing".to_string(),
        watermark_seed: Some("test-seed".to_string()),
        ..ApiConfig::default()
    };
    packreg_api::app(AppState::in_memory(config).unwrap())
}

fn bearer(tier: &str, subject: &str) -> String {
    format!("Bearer {tier}:{subject}:{SECRET}")
}

async fn send(
    app: &axum::Router,
    method: &str,
    uri: &str,
    auth: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut req = Request::builder().method(method).uri(uri);
    if let Some(a) = auth {
        req = req.header("Authorization", a);
    }
    let req = match body {
        Some(b) => req
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&b).unwrap()))
            .unwrap(),
        None => req.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = serde_json::from_slice(&bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
    (status, value)
}

async fn create_pack(app: &axum::Router, owner: &str, slug: &str, tier: &str) -> PackInfo {
    let (status, body) = send(
        app,
        "POST",
        "/v1/packs",
        Some(&bearer("enterprise", owner)),
        Some(json!({"slug": slug, "name": "Demo Pack", "tier_required": tier})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    serde_json::from_value(body).unwrap()
}

fn publish_body(version: &str) -> Value {
    json!({
        "version": version,
        "manifest": {"name": "demo", "description": "test pack"},
        "files": [
            UploadFile::from_bytes("skills/review/SKILL.md", b"# Review\n\nCheck the diff.\n"),
            UploadFile::from_bytes("commands/ship.md", b"Ship it.\n"),
            UploadFile::from_bytes("data/config.yaml", b"level: 3\n"),
        ]
    })
}

async fn publish(app: &axum::Router, owner: &str, pack: &PackInfo, version: &str) -> (StatusCode, Value) {
    send(
        app,
        "POST",
        &format!("/v1/packs/{}/versions", pack.id),
        Some(&bearer("enterprise", owner)),
        Some(publish_body(version)),
    )
    .await
}

// -- Health & unauthenticated routes ------------------------------------------

#[tokio::test]
async fn health_probes_need_no_auth() {
    let app = test_app();
    let (status, body) = send(&app, "GET", "/health/liveness", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "ok");
    let (status, body) = send(&app, "GET", "/health/readiness", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "ready");
}

#[tokio::test]
async fn license_key_is_public() {
    let app = test_app();
    let (status, body) = send(&app, "GET", "/v1/license/key", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let key: LicenseKeyInfo = serde_json::from_value(body).unwrap();
    assert_eq!(key.algorithm, "ed25519");
    let public = Ed25519PublicKey::from_hex(&key.public_key).unwrap();
    assert_eq!(public.key_id(), key.key_id);
}

#[tokio::test]
async fn metrics_without_recorder_is_not_found() {
    let app = test_app();
    let (status, _) = send(&app, "GET", "/metrics", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn api_requires_bearer_token() {
    let app = test_app();
    let (status, body) = send(&app, "GET", "/v1/account", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    let (status, _) = send(&app, "GET", "/v1/account", Some("Bearer pro:alice:wrong"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn account_reports_token_identity() {
    let app = test_app();
    let (status, body) = send(&app, "GET", "/v1/account", Some(&bearer("team", "carol")), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"subject": "carol", "tier": "team"}));
}

// -- Packs ---------------------------------------------------------------------

#[tokio::test]
async fn draft_pack_is_visible_to_owner_only() {
    let app = test_app();
    let pack = create_pack(&app, "alice", "demo", "free").await;
    assert_eq!(pack.status, PackStatus::Draft);
    assert!(pack.latest_version.is_none());

    let (status, _) = send(&app, "GET", "/v1/packs/demo", Some(&bearer("pro", "alice")), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, "GET", "/v1/packs/demo", Some(&bearer("pro", "bob")), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn duplicate_slug_conflicts() {
    let app = test_app();
    create_pack(&app, "alice", "demo", "free").await;
    let (status, body) = send(
        &app,
        "POST",
        "/v1/packs",
        Some(&bearer("pro", "bob")),
        Some(json!({"slug": "demo", "name": "Other", "tier_required": "free"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "CONFLICT");
}

#[tokio::test]
async fn invalid_slug_is_422_and_bad_json_is_400() {
    let app = test_app();
    let (status, body) = send(
        &app,
        "POST",
        "/v1/packs",
        Some(&bearer("pro", "alice")),
        Some(json!({"slug": "Bad Slug", "name": "x", "tier_required": "free"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let (status, body) = send(
        &app,
        "POST",
        "/v1/packs",
        Some(&bearer("pro", "alice")),
        Some(json!({"slug": "ok"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

// -- Publishing ----------------------------------------------------------------

#[tokio::test]
async fn first_publish_promotes_pack() {
    let app = test_app();
    let pack = create_pack(&app, "alice", "demo", "free").await;

    let (status, body) = publish(&app, "alice", &pack, "1.0.0").await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let version: VersionInfo = serde_json::from_value(body).unwrap();
    assert!(version.is_latest);
    assert_eq!(version.files.len(), 3);
    let skill = version
        .files
        .iter()
        .find(|f| f.path.as_str() == "skills/review/SKILL.md")
        .unwrap();
    assert_eq!(skill.content_hash, sha256_hex(b"# Review\n\nCheck the diff.\n"));
    assert_eq!(skill.mime_type, "text/markdown");

    let (_, body) = send(&app, "GET", "/v1/packs/demo", Some(&bearer("free", "bob")), None).await;
    let info: PackInfo = serde_json::from_value(body).unwrap();
    assert_eq!(info.status, PackStatus::Published);
    assert_eq!(info.latest_version, Some(SemVer::new(1, 0, 0)));
}

#[tokio::test]
async fn duplicate_version_is_version_conflict() {
    let app = test_app();
    let pack = create_pack(&app, "alice", "demo", "free").await;
    publish(&app, "alice", &pack, "1.0.0").await;
    let (status, body) = publish(&app, "alice", &pack, "1.0.0").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "VERSION_CONFLICT");

    let (_, body) = send(
        &app,
        "GET",
        "/v1/packs/demo/versions",
        Some(&bearer("free", "bob")),
        None,
    )
    .await;
    let versions: Vec<VersionInfo> = serde_json::from_value(body).unwrap();
    assert_eq!(versions.len(), 1);
    assert!(versions[0].is_latest);
}

#[tokio::test]
async fn latest_moves_to_newest_publish() {
    let app = test_app();
    let pack = create_pack(&app, "alice", "demo", "free").await;
    publish(&app, "alice", &pack, "1.0.0").await;
    publish(&app, "alice", &pack, "1.1.0").await;

    let (_, body) = send(
        &app,
        "GET",
        "/v1/packs/demo/versions",
        Some(&bearer("free", "bob")),
        None,
    )
    .await;
    let versions: Vec<VersionInfo> = serde_json::from_value(body).unwrap();
    assert_eq!(versions[0].version, SemVer::new(1, 1, 0));
    assert!(versions[0].is_latest);
    assert!(!versions[1].is_latest);
}

#[tokio::test]
async fn only_owner_may_publish() {
    let app = test_app();
    let pack = create_pack(&app, "alice", "demo", "free").await;
    let (status, body) = publish(&app, "mallory", &pack, "1.0.0").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "FORBIDDEN");
}

#[tokio::test]
async fn publish_to_unknown_pack_is_404() {
    let app = test_app();
    let (status, _) = send(
        &app,
        "POST",
        &format!("/v1/packs/{}/versions", uuid::Uuid::new_v4()),
        Some(&bearer("pro", "alice")),
        Some(publish_body("1.0.0")),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn publish_rejects_bad_content() {
    let app = test_app();
    let pack = create_pack(&app, "alice", "demo", "free").await;
    let uri = format!("/v1/packs/{}/versions", pack.id);
    let auth = bearer("pro", "alice");

    let bad_b64 = json!({"version": "1.0.0", "manifest": {}, "files": [{"path": "a.md", "content": "***"}]});
    let (status, _) = send(&app, "POST", &uri, Some(&auth), Some(bad_b64)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let traversal = json!({"version": "1.0.0", "manifest": {}, "files": [UploadFile::from_bytes("../x.md", b"x")]});
    let (status, _) = send(&app, "POST", &uri, Some(&auth), Some(traversal)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let bad_version = json!({"version": "v1", "manifest": {}});
    let (status, _) = send(&app, "POST", &uri, Some(&auth), Some(bad_version)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

// -- Lifecycle -----------------------------------------------------------------

#[tokio::test]
async fn status_transitions_follow_lifecycle() {
    let app = test_app();
    let pack = create_pack(&app, "alice", "demo", "free").await;
    let uri = format!("/v1/packs/{}/status", pack.id);
    let auth = bearer("pro", "alice");

    // draft -> published only happens through publishing
    let (status, _) = send(&app, "POST", &uri, Some(&auth), Some(json!({"status": "published"}))).await;
    assert_eq!(status, StatusCode::CONFLICT);

    publish(&app, "alice", &pack, "1.0.0").await;
    let (status, body) = send(&app, "POST", &uri, Some(&auth), Some(json!({"status": "deprecated"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "deprecated");

    // deprecated packs stay downloadable
    let (status, _) = send(
        &app,
        "GET",
        "/v1/packs/demo/versions/1.0.0/download",
        Some(&bearer("free", "bob")),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // and refuse new versions
    let (status, _) = publish(&app, "alice", &pack, "1.1.0").await;
    assert_eq!(status, StatusCode::CONFLICT);
}

// -- Download ------------------------------------------------------------------

#[tokio::test]
async fn download_returns_files_and_valid_license() {
    let app = test_app();
    let pack = create_pack(&app, "alice", "demo", "pro").await;
    publish(&app, "alice", &pack, "1.0.0").await;

    let (status, body) = send(
        &app,
        "GET",
        "/v1/packs/demo/versions/latest/download",
        Some(&bearer("team", "carol")),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let download: DownloadResponse = serde_json::from_value(body).unwrap();
    assert_eq!(download.version, SemVer::new(1, 0, 0));
    assert_eq!(download.manifest["name"], "demo");
    assert_eq!(download.files.len(), 3);
    for f in &download.files {
        assert_eq!(sha256_hex(&f.decode_content().unwrap()), f.content_hash);
    }
    assert!(download.license.watermark.starts_with("wm_"));

    // offline verification with the published key
    let (_, key) = send(&app, "GET", "/v1/license/key", None, None).await;
    let key: LicenseKeyInfo = serde_json::from_value(key).unwrap();
    let verifier = LicenseVerifier::new(Ed25519PublicKey::from_hex(&key.public_key).unwrap());
    match verifier.verify(&download.license.token) {
        Verification::Valid(claims) => {
            assert_eq!(claims.subject, "carol");
            assert_eq!(claims.pack, PackSlug::parse("demo").unwrap());
            assert_eq!(claims.watermark, download.license.watermark);
        }
        Verification::Invalid(reason) => panic!("license rejected: {reason}"),
    }
}

#[tokio::test]
async fn watermark_is_stable_per_holder() {
    let app = test_app();
    let pack = create_pack(&app, "alice", "demo", "free").await;
    publish(&app, "alice", &pack, "1.0.0").await;

    let mut marks = Vec::new();
    for subject in ["bob", "bob", "carol"] {
        let (_, body) = send(
            &app,
            "GET",
            "/v1/packs/demo/versions/1.0.0/download",
            Some(&bearer("free", subject)),
            None,
        )
        .await;
        let d: DownloadResponse = serde_json::from_value(body).unwrap();
        marks.push(d.license.watermark);
    }
    assert_eq!(marks[0], marks[1]);
    assert_ne!(marks[0], marks[2]);
}

#[tokio::test]
async fn insufficient_tier_is_refused_with_upgrade_details() {
    let app = test_app();
    let pack = create_pack(&app, "alice", "team-pack", "team").await;
    publish(&app, "alice", &pack, "1.0.0").await;

    let (status, body) = send(
        &app,
        "GET",
        "/v1/packs/team-pack/versions/1.0.0/download",
        Some(&bearer("pro", "bob")),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "TIER_INSUFFICIENT");
    assert_eq!(
        body["error"]["details"],
        json!({
            "current_tier": "pro",
            "required_tier": "team",
            "upgrade_url": "https://example.test/pricing"
        })
    );
}

#[tokio::test]
async fn download_of_missing_version_or_draft_is_404() {
    let app = test_app();
    let pack = create_pack(&app, "alice", "demo", "free").await;

    let (status, _) = send(
        &app,
        "GET",
        "/v1/packs/demo/versions/latest/download",
        Some(&bearer("pro", "alice")),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    publish(&app, "alice", &pack, "1.0.0").await;
    let (status, _) = send(
        &app,
        "GET",
        "/v1/packs/demo/versions/2.0.0/download",
        Some(&bearer("pro", "bob")),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app,
        "GET",
        "/v1/packs/demo/versions/not-semver/download",
        Some(&bearer("pro", "bob")),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

// -- License verification --------------------------------------------------------

#[tokio::test]
async fn verify_endpoint_reports_structured_results() {
    let app = test_app();
    let pack = create_pack(&app, "alice", "demo", "free").await;
    publish(&app, "alice", &pack, "1.0.0").await;
    let (_, body) = send(
        &app,
        "GET",
        "/v1/packs/demo/versions/1.0.0/download",
        Some(&bearer("free", "bob")),
        None,
    )
    .await;
    let d: DownloadResponse = serde_json::from_value(body).unwrap();
    let auth = bearer("free", "bob");

    let (status, body) = send(
        &app,
        "POST",
        "/v1/license/verify",
        Some(&auth),
        Some(json!({"token": d.license.token, "pack": "demo", "version": "1.0.0"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let r: VerifyLicenseResponse = serde_json::from_value(body).unwrap();
    assert!(r.valid);
    assert_eq!(r.claims.unwrap()["subject"], "bob");

    let (_, body) = send(
        &app,
        "POST",
        "/v1/license/verify",
        Some(&auth),
        Some(json!({"token": d.license.token, "pack": "demo", "version": "2.0.0"})),
    )
    .await;
    let r: VerifyLicenseResponse = serde_json::from_value(body).unwrap();
    assert!(!r.valid);
    assert_eq!(r.reason.as_deref(), Some("license_mismatch"));

    let (_, body) = send(
        &app,
        "POST",
        "/v1/license/verify",
        Some(&auth),
        Some(json!({"token": "garbage"})),
    )
    .await;
    let r: VerifyLicenseResponse = serde_json::from_value(body).unwrap();
    assert!(!r.valid);
    assert_eq!(r.reason.as_deref(), Some("malformed"));

    let (status, _) = send(
        &app,
        "POST",
        "/v1/license/verify",
        Some(&auth),
        Some(json!({"token": d.license.token, "pack": "demo"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn license_from_another_registry_has_invalid_signature() {
    let ours = test_app();
    let theirs = test_app();
    let pack = create_pack(&theirs, "alice", "demo", "free").await;
    publish(&theirs, "alice", &pack, "1.0.0").await;
    let (_, body) = send(
        &theirs,
        "GET",
        "/v1/packs/demo/versions/1.0.0/download",
        Some(&bearer("free", "bob")),
        None,
    )
    .await;
    let d: DownloadResponse = serde_json::from_value(body).unwrap();

    let (_, body) = send(
        &ours,
        "POST",
        "/v1/license/verify",
        Some(&bearer("free", "bob")),
        Some(json!({"token": d.license.token})),
    )
    .await;
    let r: VerifyLicenseResponse = serde_json::from_value(body).unwrap();
    assert!(!r.valid);
    assert_eq!(r.reason.as_deref(), Some("invalid_signature"));
}
