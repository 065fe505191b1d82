//! Error classification and recovery hints.

/// Broad error category for routing recovery logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// No usable session; the user must sign in again.
    SessionExpired,
    /// The issuer rejected a sign-in proof or could not be reached.
    CredentialRejected,
    Network,
    Storage,
    Configuration,
    Serialization,
}

/// Suggested recovery action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoverySuggestion {
    /// Route the user back to interactive sign-in.
    SignInAgain,
    /// Show the error message inline and keep the current session.
    ShowMessage,
    RetryLater,
    CheckConfiguration,
    ContactSupport,
}
