//! Account commands: `signup`, `login`, `logout` and `whoami`

use anyhow::{Context, Result};
use dialoguer::{Input, Password};
use serde_json::json;
use tracing::info;

use crate::api::ApiClient;
use crate::commands::{to_json, OutputFormat};
use crate::credentials::{CredentialStore, Credentials};
use crate::models::{AuthResponse, UserInfo};
use crate::utils::colors::Theme;

fn prompt_email() -> Result<String> {
    let email: String = Input::new()
        .with_prompt("Email")
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.contains('@') {
                Ok(())
            } else {
                Err("Enter a valid email address")
            }
        })
        .interact_text()
        .context("Failed to read email")?;
    Ok(email.trim().to_string())
}

fn user_output(user: &UserInfo, headline: &str, output_format: OutputFormat) -> Result<String> {
    if output_format.is_json() {
        return to_json(user);
    }
    Ok(format!(
        "{} {headline} {}",
        Theme::success("✓"),
        Theme::highlight(&user.email)
    ))
}

/// Register a new account with prompted email and password
///
/// # Errors
/// Returns an error if prompting, the API request or saving credentials fails
pub async fn signup(
    client: &ApiClient,
    store: &CredentialStore,
    output_format: OutputFormat,
) -> Result<String> {
    let email = prompt_email()?;
    let password = Password::new()
        .with_prompt("Password")
        .with_confirmation("Confirm password", "Passwords do not match.")
        .interact()
        .context("Failed to read password")?;

    let user = register(client, store, &email, &password).await?;
    user_output(&user, "Account created! Logged in as", output_format)
}

/// `POST /auth/signup` and store the returned API key
///
/// # Errors
/// Returns an error if the request fails or credentials cannot be saved
pub async fn register(
    client: &ApiClient,
    store: &CredentialStore,
    email: &str,
    password: &str,
) -> Result<UserInfo> {
    let body = json!({ "email": email, "password": password });
    let response: AuthResponse = client.post("/auth/signup", Some(&body)).await?;
    store.save(&Credentials::ApiKey(response.api_key))?;
    info!(user = %response.user.id, "account created");
    Ok(response.user)
}

/// Log in with an API key, or with prompted email and password
///
/// # Errors
/// Returns an error if the credentials are rejected or cannot be saved
pub async fn login(
    client: &ApiClient,
    store: &CredentialStore,
    api_key: Option<&str>,
    output_format: OutputFormat,
) -> Result<String> {
    let user = if let Some(key) = api_key {
        login_with_key(client.base_url(), store, key).await?
    } else {
        let email = prompt_email()?;
        let password = Password::new()
            .with_prompt("Password")
            .interact()
            .context("Failed to read password")?;
        login_with_password(client, store, &email, &password).await?
    };
    user_output(&user, "Logged in as", output_format)
}

/// Verify `key` against `GET /auth/me` before storing it
///
/// # Errors
/// Returns an error if the key is rejected or cannot be saved
pub async fn login_with_key(api_url: &str, store: &CredentialStore, key: &str) -> Result<UserInfo> {
    let key = key.trim();
    if key.is_empty() {
        anyhow::bail!("API key must not be empty");
    }
    let credentials = Credentials::ApiKey(key.to_string());
    let keyed = ApiClient::new(api_url, Some(credentials.clone()))?;
    let user: UserInfo = keyed.get("/auth/me", &[]).await?;
    store.save(&credentials)?;
    info!(user = %user.id, "logged in with api key");
    Ok(user)
}

/// `POST /auth/login` and store the returned API key
///
/// # Errors
/// Returns an error if the login is rejected or credentials cannot be saved
pub async fn login_with_password(
    client: &ApiClient,
    store: &CredentialStore,
    email: &str,
    password: &str,
) -> Result<UserInfo> {
    let body = json!({ "email": email, "password": password });
    let response: AuthResponse = client.post("/auth/login", Some(&body)).await?;
    store.save(&Credentials::ApiKey(response.api_key))?;
    info!(user = %response.user.id, "logged in");
    Ok(response.user)
}

/// Forget stored credentials
///
/// # Errors
/// Returns an error if the credential file cannot be removed
pub fn logout(store: &CredentialStore, output_format: OutputFormat) -> Result<String> {
    let was_logged_in = store.load().ok().flatten().is_some();
    store.clear()?;

    if output_format.is_json() {
        return to_json(&json!({ "logged_out": was_logged_in }));
    }
    Ok(if was_logged_in {
        format!("{} Logged out", Theme::success("✓"))
    } else {
        Theme::dim("Not logged in.").to_string()
    })
}

/// Show the current user
///
/// # Errors
/// Returns an error if not logged in or the request fails
pub async fn whoami(client: &ApiClient, output_format: OutputFormat) -> Result<String> {
    client.require_auth()?;
    let user: UserInfo = client.get("/auth/me", &[]).await?;

    if output_format.is_json() {
        return to_json(&user);
    }
    Ok(format!(
        "{} {}\n{} {}\n{} {}",
        Theme::info("Email:"),
        Theme::highlight(&user.email),
        Theme::info("User ID:"),
        user.id,
        Theme::info("Plan:"),
        Theme::value(user.plan.as_deref().unwrap_or("free"))
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::Value;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> CredentialStore {
        CredentialStore::at(dir.path().join("credentials.toml"))
    }

    fn router() -> Router {
        Router::new()
            .route(
                "/auth/me",
                get(|headers: HeaderMap| async move {
                    match headers.get("authorization").and_then(|v| v.to_str().ok()) {
                        Some("Bearer ck_good") => Ok(Json(json!({
                            "id": "usr_1", "email": "ada@example.com", "plan": "pro"
                        }))),
                        _ => Err((StatusCode::UNAUTHORIZED, Json(json!({"error": "invalid api key"})))),
                    }
                }),
            )
            .route(
                "/auth/login",
                post(|Json(body): Json<Value>| async move {
                    if body["password"] == "hunter22" {
                        Ok(Json(json!({
                            "api_key": "ck_from_login",
                            "user": {"id": "usr_1", "email": body["email"]}
                        })))
                    } else {
                        Err((StatusCode::UNAUTHORIZED, Json(json!({"error": "wrong password"}))))
                    }
                }),
            )
            .route(
                "/auth/signup",
                post(|Json(body): Json<Value>| async move {
                    Json(json!({
                        "api_key": "ck_new",
                        "user": {"id": "usr_2", "email": body["email"]}
                    }))
                }),
            )
    }

    #[tokio::test]
    async fn test_login_with_key_verifies_before_saving() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let base = test_support::serve(router()).await;

        let err = login_with_key(&base, &store, "ck_bad").await.unwrap_err();
        assert!(err.to_string().contains("invalid api key"));
        assert!(store.load().unwrap().is_none());

        let user = login_with_key(&base, &store, " ck_good ").await.unwrap();
        assert_eq!(user.email, "ada@example.com");
        assert_eq!(
            store.load().unwrap(),
            Some(Credentials::ApiKey("ck_good".to_string()))
        );
    }

    #[tokio::test]
    async fn test_password_login_stores_api_key() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let base = test_support::serve(router()).await;
        let client = ApiClient::new(&base, None).unwrap();

        assert!(login_with_password(&client, &store, "ada@example.com", "nope")
            .await
            .is_err());
        let user = login_with_password(&client, &store, "ada@example.com", "hunter22")
            .await
            .unwrap();
        assert_eq!(user.email, "ada@example.com");
        assert_eq!(
            store.load().unwrap(),
            Some(Credentials::ApiKey("ck_from_login".to_string()))
        );
    }

    #[tokio::test]
    async fn test_register_stores_api_key() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let client = ApiClient::new(&test_support::serve(router()).await, None).unwrap();

        let user = register(&client, &store, "new@example.com", "pw").await.unwrap();
        assert_eq!(user.id, "usr_2");
        assert_eq!(
            store.load().unwrap(),
            Some(Credentials::ApiKey("ck_new".to_string()))
        );
    }

    #[tokio::test]
    async fn test_whoami() {
        colored::control::set_override(false);
        let base = test_support::serve(router()).await;
        let client =
            ApiClient::new(&base, Some(Credentials::ApiKey("ck_good".to_string()))).unwrap();
        let output = whoami(&client, OutputFormat::Human).await.unwrap();
        assert!(output.contains("ada@example.com"));
        assert!(output.contains("Plan: pro"));
    }

    #[test]
    fn test_logout_clears_credentials() {
        colored::control::set_override(false);
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store
            .save(&Credentials::Session("sid=1".to_string()))
            .unwrap();

        assert_eq!(logout(&store, OutputFormat::Human).unwrap(), "✓ Logged out");
        assert!(store.load().unwrap().is_none());
        assert_eq!(logout(&store, OutputFormat::Human).unwrap(), "Not logged in.");
    }
}
