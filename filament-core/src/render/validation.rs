//! Structural checks applied while materializing.

use crate::config::Config;
use crate::error::{Error, Result};

use super::element::EventHandler;

pub fn validate_tag(config: &Config, tag: &str) -> Result<()> {
    if config.is_denied_tag(tag) {
        return Err(Error::DisallowedTag {
            tag: tag.to_string(),
        });
    }
    Ok(())
}

/// `depth` counts ancestors, so the root-level element of a mount under
/// `<body>` starts at the root's own depth.
pub fn validate_depth(config: &Config, depth: usize) -> Result<()> {
    if depth >= config.max_depth {
        return Err(Error::MaxDepthExceeded {
            limit: config.max_depth,
        });
    }
    Ok(())
}

/// Static guard over a handler's label. Not a sandbox.
pub fn validate_event_handler(config: &Config, event: &str, handler: &EventHandler) -> Result<()> {
    let Some(label) = handler.label() else {
        return Ok(());
    };
    let label = label.to_lowercase();
    if config
        .handler_patterns
        .iter()
        .any(|pattern| label.contains(pattern.as_str()))
    {
        return Err(Error::UnsafeHandler {
            event: event.to_string(),
        });
    }
    Ok(())
}
