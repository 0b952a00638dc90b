// Auth gate - defers API calls until the auth provider reports sign-in
use crate::application::spreadsheet_source::AuthProvider;
use crate::domain::dashboard::AuthState;
use std::sync::Arc;

pub type AuthorizedCall = Box<dyn FnOnce() + Send>;

/// Tracks authorization and at most one pending call.
///
/// Events are expected to arrive serialized on one task, so there is no
/// locking here. A newer pending call replaces the older one (last writer
/// wins); pending calls are never queued.
pub struct AuthGate {
    provider: Arc<dyn AuthProvider>,
    state: AuthState,
    pending: Option<AuthorizedCall>,
    sign_in_outstanding: bool,
}

impl AuthGate {
    pub fn new(provider: Arc<dyn AuthProvider>) -> Self {
        Self {
            provider,
            state: AuthState::Unauthenticated,
            pending: None,
            sign_in_outstanding: false,
        }
    }

    pub fn state(&self) -> AuthState {
        self.state
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Run `action` now if authenticated; otherwise park it and start sign-in.
    pub fn request_authorized_call(&mut self, action: AuthorizedCall) {
        match self.state {
            AuthState::Authenticated => {
                self.pending = None;
                action();
            }
            AuthState::Unauthenticated => {
                if self.pending.replace(action).is_some() {
                    tracing::debug!("Replacing pending authorized call");
                }
                self.start_sign_in();
            }
        }
    }

    /// Push-style status notification from the auth provider.
    pub fn on_auth_status_changed(&mut self, is_signed_in: bool) {
        self.sign_in_outstanding = false;

        if is_signed_in {
            tracing::info!("Authorized");
            self.state = AuthState::Authenticated;
            if let Some(action) = self.pending.take() {
                action();
            }
        } else {
            // The pending call stays parked for the next successful sign-in
            tracing::info!("Not authorized");
            self.state = AuthState::Unauthenticated;
        }
    }

    /// Drop the parked call, e.g. after the sign-in flow timed out.
    pub fn abandon_pending(&mut self) -> bool {
        self.sign_in_outstanding = false;
        self.pending.take().is_some()
    }

    fn start_sign_in(&mut self) {
        if self.sign_in_outstanding {
            return;
        }
        tracing::info!("Signing in for pending request");
        self.sign_in_outstanding = true;
        self.provider.sign_in();
    }
}
