// Single-flight credential refresh
//
// At most one `/token/refresh` call is in flight per gateway. The first
// unauthorized request installs a shared future; every request rejected
// while it runs awaits the same future and receives the same outcome.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::REFRESH_PATH;
use crate::error::RequestError;
use crate::gateway::{Gateway, RequestDescriptor, normalize};

/// Resolves to the new access token.
type RefreshFuture = Shared<BoxFuture<'static, Result<String, RequestError>>>;

enum RefreshState {
    Idle,
    Refreshing(RefreshFuture),
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

/// Token pair as returned by `/login_check` and `/token/refresh`.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub token: String,
    pub refresh_token: String,
}

/// Idle/Refreshing state machine shared by all clones of a [`Gateway`].
pub struct RefreshCoordinator {
    state: Mutex<RefreshState>,
    issued: AtomicU64,
}

impl RefreshCoordinator {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(RefreshState::Idle),
            issued: AtomicU64::new(0),
        }
    }

    pub fn is_refreshing(&self) -> bool {
        matches!(
            *self.state.lock().expect("refresh lock poisoned"),
            RefreshState::Refreshing(_)
        )
    }

    /// Number of refresh calls started since construction.
    pub fn refreshes_issued(&self) -> u64 {
        self.issued.load(Ordering::Relaxed)
    }

    /// Join the in-flight refresh, or start one.
    pub(crate) async fn refresh(&self, gateway: &Gateway) -> Result<String, RequestError> {
        let pending = {
            let mut state = self.state.lock().expect("refresh lock poisoned");
            match &*state {
                RefreshState::Refreshing(pending) => pending.clone(),
                RefreshState::Idle => {
                    let pending = run_refresh(gateway.clone()).boxed().shared();
                    *state = RefreshState::Refreshing(pending.clone());
                    self.issued.fetch_add(1, Ordering::Relaxed);
                    pending
                }
            }
        };
        pending.await
    }

    fn finish(&self) {
        *self.state.lock().expect("refresh lock poisoned") = RefreshState::Idle;
    }
}

impl std::fmt::Debug for RefreshCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshCoordinator")
            .field("refreshing", &self.is_refreshing())
            .field("issued", &self.refreshes_issued())
            .finish()
    }
}

/// Exchange the refresh token, settle the session, then go back to idle.
async fn run_refresh(gateway: Gateway) -> Result<String, RequestError> {
    let session = gateway.session().clone();
    let refresh_token = session.refresh_token();

    let outcome = exchange(&gateway, &refresh_token).await;
    match &outcome {
        Ok(pair) => {
            session.set_credentials(&pair.token, &pair.refresh_token);
            info!("access token refreshed");
        }
        Err(e) => {
            warn!(error = %e, "token refresh failed, clearing session");
            session.clear_credentials();
        }
    }
    gateway.inner.refresh.finish();

    outcome.map(|pair| pair.token)
}

/// The refresh call carries no bearer header and bypasses the
/// unauthorized-recovery path, so it can never trigger itself.
async fn exchange(gateway: &Gateway, refresh_token: &str) -> Result<TokenResponse, RequestError> {
    let req = RequestDescriptor::post(REFRESH_PATH).json(&RefreshRequest { refresh_token })?;
    let resp = gateway.dispatch(&req, "").await.map_err(normalize)?;
    resp.json::<TokenResponse>()
        .map_err(|e| RequestError::new(resp.status().as_u16(), e.to_string()))
}
