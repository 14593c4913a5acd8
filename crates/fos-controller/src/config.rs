//! Engine Configuration

/// Names the engine looks for in the document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Attribute whose value names an element's controller
    pub target_attribute: String,

    /// Attribute on a declaration element naming the controller it provides
    pub alias_attribute: String,

    /// Optional attribute on a declaration forcing the load kind
    pub load_kind_attribute: String,

    /// Tag of declaration elements (`<link controller-name=... href=...>`)
    pub declaration_tag: String,

    /// Event type dispatched after a controller attaches
    pub attached_event: String,

    /// Event type dispatched after a controller detaches
    pub detached_event: String,
}

impl Default for Config {
    fn default() -> Self {
        let target = "controller";
        Self {
            target_attribute: target.to_string(),
            alias_attribute: format!("{target}-name"),
            load_kind_attribute: "type-is".to_string(),
            declaration_tag: "link".to_string(),
            attached_event: format!("{target}.attached"),
            detached_event: format!("{target}.detached"),
        }
    }
}
