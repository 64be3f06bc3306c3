//! Runtime Limits
//!
//! The limits the engine and renderer enforce: subscriber caps, nesting
//! depth, denied tags and the event handler guard. One `Config` is active
//! per execution context (thread). It can be built in code or parsed from
//! JSON, with every missing field falling back to its default.

use std::cell::RefCell;
use std::rc::Rc;

use serde::Deserialize;

/// Default maximum number of subscribers on a single signal.
pub const DEFAULT_MAX_SUBSCRIBERS: usize = 1000;

/// Default maximum element nesting depth.
pub const DEFAULT_MAX_DEPTH: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Subscribers allowed on one signal before `subscribe` fails.
    pub max_subscribers: usize,

    /// Structural depth at which materialization fails.
    pub max_depth: usize,

    /// Tags the renderer refuses to create (compared case-insensitively).
    pub denied_tags: Vec<String>,

    /// Substrings a handler label may not contain (compared lowercased).
    pub handler_patterns: Vec<String>,

    /// Class prefix owned by the framework; the diff preserves these.
    pub marker_class_prefix: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_subscribers: DEFAULT_MAX_SUBSCRIBERS,
            max_depth: DEFAULT_MAX_DEPTH,
            denied_tags: ["script", "iframe", "object", "embed"]
                .into_iter()
                .map(String::from)
                .collect(),
            handler_patterns: [
                "eval",
                "settimeout",
                "setinterval",
                "new function",
                "constructor",
                "__proto__",
                "prototype",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            marker_class_prefix: "h-".to_string(),
        }
    }
}

impl Config {
    /// Parse a config from JSON. Missing fields keep their defaults.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Whether `tag` is on the deny list.
    pub fn is_denied_tag(&self, tag: &str) -> bool {
        self.denied_tags
            .iter()
            .any(|denied| denied.eq_ignore_ascii_case(tag))
    }
}

thread_local! {
    static ACTIVE: RefCell<Rc<Config>> = RefCell::new(Rc::new(Config::default()));
}

/// Replace the config for the current execution context.
pub fn set(config: Config) {
    ACTIVE.with(|active| *active.borrow_mut() = Rc::new(config));
}

/// The config active in the current execution context.
pub fn current() -> Rc<Config> {
    ACTIVE.with(|active| Rc::clone(&active.borrow()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config = Config::from_json(r#"{ "max_subscribers": 3 }"#).unwrap();
        assert_eq!(config.max_subscribers, 3);
        assert_eq!(config.max_depth, DEFAULT_MAX_DEPTH);
        assert!(config.is_denied_tag("SCRIPT"));
    }

    #[test]
    fn set_replaces_thread_config() {
        set(Config {
            max_depth: 7,
            ..Config::default()
        });
        assert_eq!(current().max_depth, 7);
        set(Config::default());
        assert_eq!(current().max_depth, DEFAULT_MAX_DEPTH);
    }
}
