use std::borrow::Cow;
use std::path::Path;

use serde_json::json;

use crate::config::StoreConnectionConfig;

pub fn config_metadata(config: &StoreConnectionConfig) -> serde_json::Value {
    json!({
        "database_path": display_path(&config.path).as_ref(),
        "max_connections": config.max_connections,
        "busy_timeout_secs": config.busy_timeout_secs,
        "connect_timeout_secs": config.connect_timeout_secs,
        "create_if_missing": config.create_if_missing,
    })
}

/// Render a database path for logs, falling back to a lossy conversion for
/// paths that are not valid UTF-8.
pub fn display_path(path: &Path) -> Cow<'_, str> {
    if path.as_os_str().is_empty() {
        return Cow::Borrowed("<unset>");
    }
    path.to_string_lossy()
}
