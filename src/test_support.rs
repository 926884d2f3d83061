//! In-process stand-in for the checkclaw API used by command tests

use axum::Router;
use tokio::net::TcpListener;

use crate::api::ApiClient;
use crate::credentials::Credentials;

pub const TEST_API_KEY: &str = "ck_test_123";

/// Serve `router` on an ephemeral loopback port and return its base URL
pub async fn serve(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

/// Client authenticated with [`TEST_API_KEY`]
pub fn client(base_url: &str) -> ApiClient {
    ApiClient::new(base_url, Some(Credentials::ApiKey(TEST_API_KEY.to_string()))).unwrap()
}

/// Serve `router` and return an authenticated client for it
pub async fn api(router: Router) -> ApiClient {
    client(&serve(router).await)
}
