//! Widget configuration served to embedding pages.

use serde::{Deserialize, Serialize};

/// Theme colors for the widget.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetTheme {
    pub primary_color: String,
    pub secondary_color: String,
    pub text_color: String,
    pub background_color: String,
}

impl Default for WidgetTheme {
    fn default() -> Self {
        Self {
            primary_color: "#667eea".to_string(),
            secondary_color: "#764ba2".to_string(),
            text_color: "#333333".to_string(),
            background_color: "#ffffff".to_string(),
        }
    }
}

/// Feature toggles for the widget.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetFeatures {
    pub typing: bool,
    pub sound: bool,
    pub emoji: bool,
    pub file_upload: bool,
}

impl Default for WidgetFeatures {
    fn default() -> Self {
        Self {
            typing: true,
            sound: false,
            emoji: true,
            file_upload: false,
        }
    }
}

/// Full widget configuration object.
///
/// The config endpoint accepts a `configId` path segment for forward
/// compatibility but always serves these defaults; per-site configs
/// would need a backing store this service deliberately doesn't have.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetConfig {
    pub title: String,
    pub welcome_message: String,
    pub placeholder: String,
    pub position: String,
    pub theme: WidgetTheme,
    pub features: WidgetFeatures,
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self {
            title: "Chat with us!".to_string(),
            welcome_message: "Hi! How can I help you today?".to_string(),
            placeholder: "Type a message...".to_string(),
            position: "bottom-right".to_string(),
            theme: WidgetTheme::default(),
            features: WidgetFeatures::default(),
        }
    }
}
