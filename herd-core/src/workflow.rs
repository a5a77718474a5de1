use serde::Deserialize;
use serde_json::json;

use crate::workload::{Check, RequestContext, WorkloadResult};

/// One step of the authentication workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum AuthStep {
    Register,
    Login,
    Refresh,
    Logout,
}

/// Workflow progress. Non-terminal states name the step currently awaited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    Registering,
    LoggingIn,
    Refreshing,
    LoggingOut,
    Done,
    Aborted(AbortReason),
}

/// Why a flow ended before logout. A missing token is a terminal state the
/// caller consumes, not a silent early return.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AbortReason {
    #[error("{step} returned unexpected status {status}")]
    StepFailed { step: AuthStep, status: u16 },

    #[error("{step} response carried no usable token")]
    MissingToken { step: AuthStep },

    #[error("{step} applied out of turn")]
    OutOfOrder { step: AuthStep },
}

/// Raw response for one step, fed back by whatever transport the caller
/// drives.
#[derive(Debug, Clone)]
pub struct StepResponse {
    pub status: u16,
    pub body: String,
}

impl StepResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Deserialize)]
struct LoginTokens {
    #[serde(rename = "accessToken")]
    access_token: Option<String>,
    #[serde(rename = "refreshToken")]
    refresh_token: Option<String>,
}

/// How a logout response passed. A 401 whose body carries the revoked-token
/// marker means the server already considered the token dead; that is an
/// idempotent outcome, counted apart from a live revocation rather than
/// folded into it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogoutAssessment {
    Revoked,
    AlreadyRevoked,
}

/// Result of feeding one response into the machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Advanced,
    Completed(LogoutAssessment),
    Aborted(AbortReason),
}

/// Per-iteration dummy identity, unique across VUs and iterations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub nickname: String,
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn dummy(vu_id: u64, iteration: u64) -> Self {
        Self {
            nickname: format!("dummy_user_{vu_id}_{iteration}"),
            email: format!("user_{vu_id}_{iteration}@example.com"),
            password: "Dummy@pass1234".to_string(),
        }
    }
}

/// Explicit state machine for the register -> login -> refresh -> logout
/// workflow. Sans-IO: the caller performs each request and feeds the
/// observed [`StepResponse`] back through [`apply`]; transition guards
/// decide whether the flow advances, completes, or aborts.
///
/// The held token pair is the one issued at login; the flow logs out with
/// that original refresh token even after a refresh rotated it server-side,
/// which is why an already-revoked logout is a first-class outcome.
///
/// [`apply`]: AuthFlow::apply
#[derive(Debug, Clone)]
pub struct AuthFlow {
    state: AuthState,
    credentials: Credentials,
    tokens: Option<TokenPair>,
    base_context: RequestContext,
}

impl AuthFlow {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            state: AuthState::Registering,
            credentials,
            tokens: None,
            base_context: RequestContext::new(
                vec![("Content-Type".to_string(), "application/json".to_string())],
                Vec::new(),
            ),
        }
    }

    pub fn state(&self) -> &AuthState {
        &self.state
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn tokens(&self) -> Option<&TokenPair> {
        self.tokens.as_ref()
    }

    /// The step awaited next, or `None` once the flow is terminal.
    pub fn next_step(&self) -> Option<AuthStep> {
        match self.state {
            AuthState::Registering => Some(AuthStep::Register),
            AuthState::LoggingIn => Some(AuthStep::Login),
            AuthState::Refreshing => Some(AuthStep::Refresh),
            AuthState::LoggingOut => Some(AuthStep::Logout),
            AuthState::Done | AuthState::Aborted(_) => None,
        }
    }

    /// Request context for the given step: JSON headers always, bearer
    /// access token once one is held.
    pub fn request_context(&self, step: AuthStep) -> RequestContext {
        match (step, &self.tokens) {
            (AuthStep::Refresh | AuthStep::Logout, Some(tokens)) => {
                self.base_context.with_bearer(&tokens.access_token)
            }
            _ => self.base_context.clone(),
        }
    }

    /// JSON body for the given step.
    pub fn request_body(&self, step: AuthStep) -> String {
        let c = &self.credentials;
        let refresh_token = self
            .tokens
            .as_ref()
            .map(|t| t.refresh_token.as_str())
            .unwrap_or_default();

        match step {
            AuthStep::Register => json!({
                "nickname": c.nickname,
                "email": c.email,
                "password": c.password,
            }),
            AuthStep::Login => json!({
                "email": c.email,
                "password": c.password,
            }),
            AuthStep::Refresh | AuthStep::Logout => json!({
                "refreshToken": refresh_token,
            }),
        }
        .to_string()
    }

    /// Feed the observed response for `step` into the machine.
    pub fn apply(&mut self, step: AuthStep, response: &StepResponse) -> Transition {
        if self.next_step() != Some(step) {
            return self.abort(AbortReason::OutOfOrder { step });
        }

        match step {
            AuthStep::Register => match response.status {
                200 | 201 => {
                    self.state = AuthState::LoggingIn;
                    Transition::Advanced
                }
                status => self.abort(AbortReason::StepFailed { step, status }),
            },
            AuthStep::Login => {
                if response.status != 200 {
                    return self.abort(AbortReason::StepFailed {
                        step,
                        status: response.status,
                    });
                }

                match serde_json::from_str::<LoginTokens>(&response.body) {
                    Ok(LoginTokens {
                        access_token: Some(access_token),
                        refresh_token: Some(refresh_token),
                    }) => {
                        self.tokens = Some(TokenPair {
                            access_token,
                            refresh_token,
                        });
                        self.state = AuthState::Refreshing;
                        Transition::Advanced
                    }
                    _ => self.abort(AbortReason::MissingToken { step }),
                }
            }
            AuthStep::Refresh => match response.status {
                200 => {
                    self.state = AuthState::LoggingOut;
                    Transition::Advanced
                }
                status => self.abort(AbortReason::StepFailed { step, status }),
            },
            AuthStep::Logout => match response.status {
                200..=299 => {
                    self.state = AuthState::Done;
                    Transition::Completed(LogoutAssessment::Revoked)
                }
                401 if response.body.to_ascii_lowercase().contains("revoked") => {
                    self.state = AuthState::Done;
                    Transition::Completed(LogoutAssessment::AlreadyRevoked)
                }
                status => self.abort(AbortReason::StepFailed { step, status }),
            },
        }
    }

    fn abort(&mut self, reason: AbortReason) -> Transition {
        self.state = AuthState::Aborted(reason.clone());
        Transition::Aborted(reason)
    }
}

/// The original register assertion: account creation answers 200 or 201.
pub fn register_status_check() -> Check {
    Check::new("status is 200 or 201", |r: &WorkloadResult| {
        matches!(r.status, Some(200 | 201))
    })
}
