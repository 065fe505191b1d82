//! CLI command handlers for login, status, refresh, logout, and get.

use std::io::Write;
use std::sync::Arc;

use crate::auth::{FileTokenStore, Proof, TokenStoreConfig};
use crate::config::SessionConfig;
use crate::error::RecoverySuggestion;
use crate::session::{SessionManager, SessionStatus};

use super::{Commands, LoginMethod};

/// Build the session manager backed by the on-disk store.
pub fn open_session(config: &SessionConfig) -> Result<SessionManager, Box<dyn std::error::Error>> {
    let store = Arc::new(FileTokenStore::new(TokenStoreConfig::new(
        config.store_dir.clone(),
    )));
    Ok(config.build_manager(store)?)
}

/// Dispatch a parsed command.
pub async fn run(command: Commands) -> Result<(), Box<dyn std::error::Error>> {
    let config = SessionConfig::from_env()?;
    let session = open_session(&config)?;

    match command {
        Commands::Login(args) => handle_login(&session, args.method).await,
        Commands::Status => handle_status(&session),
        Commands::Refresh => handle_refresh(&session).await,
        Commands::Logout => handle_logout(&session).await,
        Commands::Get(args) => handle_get(&config, session, &args.path).await,
    }
}

/// Handle `login <method>`.
pub async fn handle_login(
    session: &SessionManager,
    method: LoginMethod,
) -> Result<(), Box<dyn std::error::Error>> {
    let proof = match method {
        LoginMethod::Password { email, password } => {
            let password = match password {
                Some(password) => password,
                None => prompt("Password: ")?,
            };
            Proof::password(email, password)
        }
        LoginMethod::Otp { phone, code } => Proof::otp(phone, code),
        LoginMethod::Google {
            id_token,
            access_token: Some(access_token),
        } => Proof::google_with_access_token(id_token, access_token),
        LoginMethod::Google { id_token, .. } => Proof::google(id_token),
    };

    match session.establish(proof).await {
        Ok(()) => {
            println!("✅ Signed in");
            Ok(())
        }
        Err(err) if err.is_issuance_failure() => {
            eprintln!("❌ Sign-in failed: {err}");
            std::process::exit(1);
        }
        Err(err) => Err(err.into()),
    }
}

/// Handle `status`.
pub fn handle_status(session: &SessionManager) -> Result<(), Box<dyn std::error::Error>> {
    match session.status()? {
        SessionStatus::SignedOut => println!("❌ Not signed in"),
        SessionStatus::Active {
            flow,
            access_expires_at,
            refresh_expires_at,
            needs_refresh,
        } => {
            println!("✅ Signed in via {flow}");
            println!(
                "   Access token expires  {}",
                access_expires_at.format("%Y-%m-%d %H:%M")
            );
            println!(
                "   Refresh token expires {}",
                refresh_expires_at.format("%Y-%m-%d %H:%M")
            );
            if needs_refresh {
                println!("   ⚠️  Access token will be refreshed on next use");
            }
        }
    }
    Ok(())
}

/// Handle `refresh`.
pub async fn handle_refresh(session: &SessionManager) -> Result<(), Box<dyn std::error::Error>> {
    match session.force_refresh().await {
        Ok(_) => {
            println!("✅ Session refreshed");
            handle_status(session)
        }
        Err(err) if err.is_session_expired() => {
            eprintln!("❌ {err}. Sign in again.");
            std::process::exit(1);
        }
        Err(err) => Err(err.into()),
    }
}

/// Handle `logout`.
pub async fn handle_logout(session: &SessionManager) -> Result<(), Box<dyn std::error::Error>> {
    session.terminate().await?;
    println!("✅ Signed out");
    Ok(())
}

/// Handle `get <path>`.
pub async fn handle_get(
    config: &SessionConfig,
    session: SessionManager,
    path: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let client = config.build_client(session);
    match client.get(path).await {
        Ok(response) => {
            let status = response.status();
            let body = response.text().await?;
            println!("{status}");
            println!("{body}");
            Ok(())
        }
        Err(err) if err.recovery_suggestion() == RecoverySuggestion::SignInAgain => {
            eprintln!("❌ {err}. Sign in again.");
            std::process::exit(1);
        }
        Err(err) => Err(err.into()),
    }
}

fn prompt(label: &str) -> Result<String, Box<dyn std::error::Error>> {
    print!("{label}");
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    let value = line.trim().to_string();
    if value.is_empty() {
        return Err("no input provided".into());
    }
    Ok(value)
}
