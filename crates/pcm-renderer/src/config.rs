use std::time::Duration;

/// Renderer identity and connection tuning.
#[derive(Clone, Debug)]
pub struct RendererConfig {
    /// Client application name presented to the sink server.
    pub app_name: String,
    /// Name given to the playback stream.
    pub stream_name: String,
    /// Target sink/output selector; `None` picks the server default.
    pub sink: Option<String>,
    /// Media role hint attached to the client (for example "music").
    pub media_role: Option<String>,
    /// Upper bound on waiting for the connection to become ready.
    /// `None` waits indefinitely.
    pub connect_timeout: Option<Duration>,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            app_name: "pcm-renderer".into(),
            stream_name: "pcm playback".into(),
            sink: None,
            media_role: Some("music".into()),
            connect_timeout: None,
        }
    }
}
