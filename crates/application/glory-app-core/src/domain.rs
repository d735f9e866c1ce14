use std::time::Duration;

use glory_core::{DraftKey, Identity, ViewState};
use serde::{Deserialize, Serialize};

use crate::approval::ApprovalPolicy;
use crate::autosave::SaveStatus;
use crate::session::SessionState;

/// Where the REST document store lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteSettings {
    pub base_url: String,
    pub api_key: String,
    #[serde(default = "default_table")]
    pub table: String,
}

fn default_table() -> String {
    "cvs".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlorySettings {
    pub autosave_period_ms: u64,
    pub session_window_ms: i64,
    pub identity_timeout_ms: u64,
    pub auth_recheck_delay_ms: u64,
    /// Keep admin sessions signed in when the tab closes.
    pub preserve_admin_sessions: bool,
    pub approval_max_attempts: u32,
    pub approval_initial_delay_ms: u64,
    pub approval_max_delay_ms: u64,
    pub remote: Option<RemoteSettings>,
}

impl Default for GlorySettings {
    fn default() -> Self {
        Self {
            autosave_period_ms: glory_config::DEFAULT_AUTOSAVE_PERIOD_MS,
            session_window_ms: glory_config::SESSION_NAVIGATION_WINDOW_MS,
            identity_timeout_ms: glory_config::IDENTITY_CHECK_TIMEOUT_MS,
            auth_recheck_delay_ms: glory_config::AUTH_RECHECK_DELAY_MS,
            preserve_admin_sessions: true,
            approval_max_attempts: glory_config::APPROVAL_MAX_ATTEMPTS,
            approval_initial_delay_ms: glory_config::APPROVAL_INITIAL_DELAY_MS,
            approval_max_delay_ms: glory_config::APPROVAL_MAX_DELAY_MS,
            remote: None,
        }
    }
}

impl GlorySettings {
    pub fn autosave_period(&self) -> Duration {
        Duration::from_millis(glory_config::clamp_autosave_period(self.autosave_period_ms))
    }

    pub fn identity_timeout(&self) -> Duration {
        Duration::from_millis(self.identity_timeout_ms.max(1))
    }

    pub fn auth_recheck_delay(&self) -> Duration {
        Duration::from_millis(self.auth_recheck_delay_ms)
    }

    pub fn session_window_ms(&self) -> i64 {
        self.session_window_ms.max(0)
    }

    pub fn approval_policy(&self) -> ApprovalPolicy {
        ApprovalPolicy {
            max_attempts: glory_config::clamp_approval_attempts(self.approval_max_attempts),
            initial_delay: Duration::from_millis(self.approval_initial_delay_ms),
            max_delay: Duration::from_millis(
                self.approval_max_delay_ms.max(self.approval_initial_delay_ms),
            ),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum BootState {
    #[default]
    Loading,
    Ready,
    Failed(String),
}

#[derive(Debug, Clone, Default)]
pub struct AppState {
    pub boot: BootState,
    pub settings: GlorySettings,
    pub view: ViewState,
    pub save_status: SaveStatus,
    pub session: SessionState,
    pub identity: Option<Identity>,
    /// Auto-save results for any other draft are ignored.
    pub active_draft: Option<DraftKey>,
    pub error: Option<String>,
}
