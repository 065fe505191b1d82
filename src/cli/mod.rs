//! CLI entry point for storefront-session.

pub mod session;

use clap::{Args, Parser, Subcommand};

/// Storefront session CLI
#[derive(Parser, Debug)]
#[command(
    name = "storefront-session",
    version,
    about = "Sign in to the storefront API and inspect the stored session"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Sign in and store a new session
    Login(LoginArgs),
    /// Show the stored session
    Status,
    /// Refresh the access token now
    Refresh,
    /// Sign out and clear the stored session
    Logout,
    /// Send an authenticated GET to a protected endpoint
    Get(GetArgs),
}

/// Arguments for `login`.
#[derive(Args, Debug)]
pub struct LoginArgs {
    #[command(subcommand)]
    pub method: LoginMethod,
}

/// Supported sign-in flows.
#[derive(Subcommand, Debug)]
pub enum LoginMethod {
    /// Email and password
    Password {
        #[arg(long)]
        email: String,
        /// Read from stdin when omitted
        #[arg(long)]
        password: Option<String>,
    },
    /// Phone number and one-time code
    Otp {
        #[arg(long)]
        phone: String,
        #[arg(long)]
        code: String,
    },
    /// Google ID token obtained from Google Sign-In
    Google {
        #[arg(long)]
        id_token: String,
        /// Google access token, revoked again on logout
        #[arg(long)]
        access_token: Option<String>,
    },
}

/// Arguments for `get`.
#[derive(Args, Debug)]
pub struct GetArgs {
    /// Path relative to the API base URL, or an absolute URL
    pub path: String,
}

impl Cli {
    /// Parse CLI arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
