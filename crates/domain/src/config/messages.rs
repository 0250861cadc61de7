use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Message relay
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagesConfig {
    /// URL path under which stored media is served.
    #[serde(default = "d_media_mount")]
    pub media_mount: String,
    /// IANA zone used for `timestampLocal` (e.g. `"Asia/Karachi"`).
    /// When unset the host's local zone is used.
    #[serde(default)]
    pub timezone: Option<String>,
    /// Address suffix of one-to-one chats.
    #[serde(default = "d_direct_suffix")]
    pub direct_suffix: String,
    /// Address suffix of group chats.
    #[serde(default = "d_group_suffix")]
    pub group_suffix: String,
}

impl Default for MessagesConfig {
    fn default() -> Self {
        Self {
            media_mount: d_media_mount(),
            timezone: None,
            direct_suffix: d_direct_suffix(),
            group_suffix: d_group_suffix(),
        }
    }
}

fn d_media_mount() -> String {
    "/media".into()
}
fn d_direct_suffix() -> String {
    "@c.us".into()
}
fn d_group_suffix() -> String {
    "@g.us".into()
}
