//! Host controller types.

use serde::Serialize;

use chatvault_capture::CaptureStatus;

/// Browser runtime status.
#[derive(Debug, Clone, Default, Serialize)]
pub struct HostStatus {
    pub running: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "launchedAt")]
    pub launched_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "activeUrl")]
    pub active_url: Option<String>,
    /// The messaging view is logged in.
    #[serde(rename = "loggedIn")]
    pub logged_in: bool,
    /// A login QR code is on screen.
    #[serde(rename = "qrVisible")]
    pub qr_visible: bool,
    pub injected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capture: Option<CaptureStatus>,
}
