//! Shared fixtures for tests that run against a mocked site.

#![allow(dead_code)]

use mockito::{Mock, ServerGuard};
use serde_json::json;
use site_session::{CertificateCredentials, SharePointSite, SiteConfig};

pub const TENANT_ID: &str = "tenant";
pub const CLIENT_ID: &str = "client-id";
pub const THUMBPRINT: &str = "5FF5ADD0BEDC965120FC6C333AFB265944E0E35E";
pub const TEST_KEY: &str = include_str!("../fixtures/test_key.pem");

pub const TOKEN_PATH: &str = "/tenant/oauth2/v2.0/token";

pub fn credentials() -> CertificateCredentials {
    CertificateCredentials::new(TENANT_ID, CLIENT_ID, THUMBPRINT, TEST_KEY)
}

pub fn site_url(server: &ServerGuard) -> String {
    format!("{}/sites/team", server.url())
}

pub fn api_path(endpoint: &str) -> String {
    format!("/sites/team/_api/{}", endpoint)
}

/// Token endpoint answering every request with a one-hour token.
pub async fn mock_token(server: &mut ServerGuard) -> Mock {
    server
        .mock("POST", TOKEN_PATH)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "access_token": "test-token",
                "token_type": "Bearer",
                "expires_in": 3600
            })
            .to_string(),
        )
        .create_async()
        .await
}

/// A session connected to the mocked site. Keep the returned mock alive.
pub async fn connected_site(server: &mut ServerGuard) -> (SharePointSite, Mock) {
    let token = mock_token(server).await;
    let config =
        SiteConfig::new(site_url(server), credentials()).with_authority_host(server.url());
    let mut site = SharePointSite::new(config);
    assert!(site.connect_with_config());
    (site, token)
}
