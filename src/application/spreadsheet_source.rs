// Collaborator traits for the external spreadsheet and auth services
use crate::domain::error::FetchError;
use async_trait::async_trait;

/// Raw rows as returned by the spreadsheet service: one `Vec` of cells per row.
pub type RawRows = Vec<Vec<String>>;

#[async_trait]
pub trait SpreadsheetSource: Send + Sync {
    /// Fetch the full row log of a named range. Windowing is up to the caller.
    async fn fetch_rows(&self, range: &str) -> Result<RawRows, FetchError>;
}

/// Sign-in provider. Status changes are pushed back separately as
/// `DashboardEvent::AuthStatusChanged`.
pub trait AuthProvider: Send + Sync {
    /// Start the sign-in flow without waiting for it.
    fn sign_in(&self);
}
