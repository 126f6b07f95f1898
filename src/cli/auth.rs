//! CLI auth command handlers.

use crate::auth::{TokenManager, TokenStatus};
use crate::error::Result;

/// Handle `cgm-link auth url`.
pub fn handle_url(manager: &TokenManager, state: Option<&str>) -> Result<()> {
    let url = match state {
        Some(state) => manager.authorization_url_with_state(state),
        None => manager.authorization_url(),
    };
    println!("🔗 Visit: {url}");
    println!("📋 Then run: cgm-link auth login <code>");
    Ok(())
}

/// Handle `cgm-link auth login <code>`.
pub async fn handle_login(manager: &TokenManager, code: &str) -> Result<()> {
    let record = manager.exchange_authorization_code(code).await?;
    println!("✅ Login successful!");
    println!(
        "   Access token valid until {}",
        record.effective_expiry().format("%Y-%m-%d %H:%M UTC")
    );
    Ok(())
}

/// Handle `cgm-link auth status`.
pub async fn handle_status(manager: &TokenManager) -> Result<()> {
    println!("🔐 Authentication Status\n");
    match manager.status().await? {
        TokenStatus::NotAuthenticated => println!("  ❌ Not logged in"),
        TokenStatus::Authenticated {
            expires_at,
            needs_refresh,
            scope,
        } => {
            let expires = expires_at.format("%Y-%m-%d %H:%M UTC");
            if needs_refresh {
                println!("  ⚠️  Token expiring ({expires}), will refresh on next use");
            } else {
                println!("  ✅ Logged in (expires {expires})");
            }
            if !scope.is_empty() {
                println!("  Scope: {scope}");
            }
        }
    }
    println!("  Store key: {}", manager.store().key());
    Ok(())
}

/// Handle `cgm-link auth logout`.
pub async fn handle_logout(manager: &TokenManager) -> Result<()> {
    manager.logout().await?;
    println!("✅ Logged out");
    Ok(())
}
