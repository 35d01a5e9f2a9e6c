//! Usage: Export status state machine (single transition function) and its user-facing status line.

use serde::Serialize;

use crate::shared::error::AppError;
use crate::shared::error_code::ErrorCode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportPhase {
    Start,
    Poll,
    Download,
}

impl ExportPhase {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Poll => "poll",
            Self::Download => "download",
        }
    }

    /// Phase an export error came from; `None` for errors raised outside the workflow (tokens, etc).
    pub fn of_error(err: &AppError) -> Option<Self> {
        match ErrorCode::from_str(err.code())? {
            ErrorCode::ExportStartFailed | ErrorCode::ExportIdMissing => Some(Self::Start),
            ErrorCode::ExportStatusFailed
            | ErrorCode::ExportJobFailed
            | ErrorCode::ExportTimedOut => Some(Self::Poll),
            ErrorCode::ExportDownloadFailed => Some(Self::Download),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusTone {
    Neutral,
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ExportState {
    #[default]
    Idle,
    PreparingEmbed,
    EmbedFailed,
    Starting,
    Polling {
        export_id: String,
        percent_complete: u8,
    },
    Succeeded {
        file_name: String,
    },
    Failed {
        phase: Option<ExportPhase>,
        message: String,
    },
    TimedOut,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportEvent {
    EmbedRequested,
    EmbedReady,
    EmbedFailed,
    Begin,
    Started { export_id: String },
    Progress { percent_complete: u8 },
    Completed { file_name: String },
    Failed { phase: Option<ExportPhase>, message: String },
    TimedOut,
    Reset,
}

impl ExportEvent {
    pub fn from_error(err: &AppError) -> Self {
        if err.is(ErrorCode::ExportTimedOut) {
            return Self::TimedOut;
        }
        Self::Failed {
            phase: ExportPhase::of_error(err),
            message: err.message().to_string(),
        }
    }
}

impl ExportState {
    /// The only way export state changes. `None` means the event is not valid in this state.
    pub fn transition(&self, event: &ExportEvent) -> Option<ExportState> {
        use ExportEvent as E;
        use ExportState as S;

        let next = match (self, event) {
            (_, E::Reset) => S::Idle,

            (s, E::EmbedRequested) if !s.is_in_flight() => S::PreparingEmbed,
            (S::PreparingEmbed, E::EmbedReady) => S::Idle,
            (S::PreparingEmbed, E::EmbedFailed) => S::EmbedFailed,

            (s, E::Begin) if !s.is_in_flight() && *s != S::PreparingEmbed => S::Starting,
            (S::Starting, E::Started { export_id }) => S::Polling {
                export_id: export_id.clone(),
                percent_complete: 0,
            },
            (S::Polling { export_id, .. }, E::Progress { percent_complete }) => S::Polling {
                export_id: export_id.clone(),
                percent_complete: (*percent_complete).min(100),
            },
            (S::Polling { .. }, E::Completed { file_name }) => S::Succeeded {
                file_name: file_name.clone(),
            },
            (S::Starting | S::Polling { .. }, E::Failed { phase, message }) => S::Failed {
                phase: *phase,
                message: message.clone(),
            },
            (S::Polling { .. }, E::TimedOut) => S::TimedOut,

            _ => return None,
        };
        Some(next)
    }

    pub fn is_in_flight(&self) -> bool {
        matches!(self, Self::Starting | Self::Polling { .. })
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Succeeded { .. } | Self::Failed { .. } | Self::TimedOut
        )
    }

    pub fn status_text(&self) -> String {
        match self {
            Self::Idle => String::new(),
            Self::PreparingEmbed => "Export: preparing embed".to_string(),
            Self::EmbedFailed => "Export: failed to embed".to_string(),
            Self::Starting => "Export: starting…".to_string(),
            Self::Polling {
                percent_complete, ..
            } => format!("Export: running ({percent_complete}%)"),
            Self::Succeeded { .. } => "Export: completed".to_string(),
            Self::Failed { .. } => "Export: failed".to_string(),
            Self::TimedOut => "Export: timed out".to_string(),
        }
    }

    pub fn tone(&self) -> StatusTone {
        match self {
            Self::Idle => StatusTone::Neutral,
            Self::PreparingEmbed | Self::Starting | Self::Polling { .. } => StatusTone::Info,
            Self::Succeeded { .. } => StatusTone::Success,
            Self::EmbedFailed | Self::Failed { .. } | Self::TimedOut => StatusTone::Error,
        }
    }
}
