//! Query, context and per-request routing options

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::EngineMode;
use crate::{MuninnError, Result};

/// Conversation and environment context accompanying a query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryContext {
    /// Earlier turns of the conversation, oldest first.
    #[serde(default)]
    pub previous_queries: Vec<String>,
    /// Free-text statement of what the user is trying to do.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_intent: Option<String>,
    /// Structured domain data already collected (e.g. current server metrics).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain_data: Option<serde_json::Value>,
    #[serde(default)]
    pub flags: BTreeMap<String, bool>,
}

impl QueryContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn previous_query(mut self, query: impl Into<String>) -> Self {
        self.previous_queries.push(query.into());
        self
    }

    pub fn user_intent(mut self, intent: impl Into<String>) -> Self {
        self.user_intent = Some(intent.into());
        self
    }

    pub fn domain_data(mut self, data: serde_json::Value) -> Self {
        self.domain_data = Some(data);
        self
    }

    pub fn flag(mut self, name: impl Into<String>, value: bool) -> Self {
        self.flags.insert(name.into(), value);
        self
    }

    /// Whether structured domain data is present and non-empty.
    pub fn has_domain_data(&self) -> bool {
        match &self.domain_data {
            None | Some(serde_json::Value::Null) => false,
            Some(serde_json::Value::Object(map)) => !map.is_empty(),
            Some(serde_json::Value::Array(items)) => !items.is_empty(),
            Some(_) => true,
        }
    }
}

/// Per-request routing options.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RouteOptions {
    /// Route to exactly this engine, skipping scoring and the cache.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub force_engine: Option<String>,
    /// Restrict the chain to engines compatible with this mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<EngineMode>,
    /// Overall budget for the request. Once spent the router falls back.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline: Option<Duration>,
    /// Neither read from nor write to the cache.
    #[serde(default)]
    pub bypass_cache: bool,
}

/// One analysis request.
///
/// The text is guaranteed non-empty after trimming.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "QueryFields")]
pub struct Query {
    text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    context: Option<QueryContext>,
    #[serde(default)]
    options: RouteOptions,
}

/// Wire shape of [`Query`]; deserialized queries go through [`Query::new`].
#[derive(Deserialize)]
struct QueryFields {
    text: String,
    #[serde(default)]
    context: Option<QueryContext>,
    #[serde(default)]
    options: RouteOptions,
}

impl TryFrom<QueryFields> for Query {
    type Error = MuninnError;

    fn try_from(fields: QueryFields) -> Result<Self> {
        let mut query = Query::new(fields.text)?.with_options(fields.options);
        query.context = fields.context;
        Ok(query)
    }
}

impl Query {
    /// Create a query, rejecting empty or whitespace-only text.
    pub fn new(text: impl Into<String>) -> Result<Self> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(MuninnError::InvalidInput("query text is empty".to_string()));
        }
        Ok(Self {
            text,
            context: None,
            options: RouteOptions::default(),
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn context(&self) -> Option<&QueryContext> {
        self.context.as_ref()
    }

    pub fn options(&self) -> &RouteOptions {
        &self.options
    }

    pub fn with_context(mut self, context: QueryContext) -> Self {
        self.context = Some(context);
        self
    }

    pub fn with_options(mut self, options: RouteOptions) -> Self {
        self.options = options;
        self
    }

    pub fn force_engine(mut self, engine_id: impl Into<String>) -> Self {
        self.options.force_engine = Some(engine_id.into());
        self
    }

    pub fn mode(mut self, mode: EngineMode) -> Self {
        self.options.mode = Some(mode);
        self
    }

    pub fn deadline(mut self, deadline: Duration) -> Self {
        self.options.deadline = Some(deadline);
        self
    }

    pub fn bypass_cache(mut self) -> Self {
        self.options.bypass_cache = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_is_rejected() {
        assert!(matches!(
            Query::new("   \n\t"),
            Err(MuninnError::InvalidInput(_))
        ));
        assert!(Query::new("").is_err());
    }

    #[test]
    fn builder_sets_options() {
        let query = Query::new("show cpu")
            .unwrap()
            .mode(EngineMode::Local)
            .force_engine("local-rag")
            .deadline(Duration::from_secs(2))
            .bypass_cache();
        let opts = query.options();
        assert_eq!(opts.mode, Some(EngineMode::Local));
        assert_eq!(opts.force_engine.as_deref(), Some("local-rag"));
        assert_eq!(opts.deadline, Some(Duration::from_secs(2)));
        assert!(opts.bypass_cache);
    }

    #[test]
    fn deserialized_text_is_checked() {
        let query: Query = serde_json::from_str(
            r#"{"text": "disk usage", "options": {"mode": "local", "bypass_cache": true}}"#,
        )
        .unwrap();
        assert_eq!(query.text(), "disk usage");
        assert_eq!(query.options().mode, Some(EngineMode::Local));
        assert!(query.options().bypass_cache);
        assert!(query.context().is_none());

        let err = serde_json::from_str::<Query>(r#"{"text": "  "}"#).unwrap_err();
        assert!(err.to_string().contains("empty"), "{err}");
    }

    #[test]
    fn domain_data_presence() {
        assert!(!QueryContext::new().has_domain_data());
        assert!(
            !QueryContext::new()
                .domain_data(serde_json::json!({}))
                .has_domain_data()
        );
        assert!(
            QueryContext::new()
                .domain_data(serde_json::json!({"cpu": 93}))
                .has_domain_data()
        );
    }
}
