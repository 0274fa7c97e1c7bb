//! Data models for embedchat entities.

mod message;
mod session;
mod widget;

pub use message::{Message, MessageRole};
pub use session::ChatSession;
pub use widget::{WidgetConfig, WidgetFeatures, WidgetTheme};
