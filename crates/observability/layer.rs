use chrono::Utc;
use std::collections::BTreeMap;
use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Id, Record};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;
use tracing_subscriber::registry::LookupSpan;

use super::alerts::{AlertDispatcher, AlertEvent};
use super::config::ServiceContext;

/// Events emitted by the alert pipeline itself are never re-alerted.
const OWN_TARGET: &str = concat!(env!("CARGO_CRATE_NAME"), "::observability");

const REDACTED: &str = "[REDACTED]";
const SENSITIVE_MARKERS: [&str; 8] = [
    "secret",
    "password",
    "token",
    "authorization",
    "api_key",
    "signature",
    "webhook",
    "email",
];

/// Forwards events at or above `min_level` to the ops alert sinks.
pub(crate) struct OpsAlertLayer {
    dispatcher: AlertDispatcher,
    service_context: ServiceContext,
    min_level: Level,
}

impl OpsAlertLayer {
    pub(crate) fn new(
        dispatcher: AlertDispatcher,
        service_context: ServiceContext,
        min_level: Level,
    ) -> Self {
        Self {
            dispatcher,
            service_context,
            min_level,
        }
    }
}

#[derive(Default)]
struct RedactingVisitor {
    values: BTreeMap<String, String>,
}

impl RedactingVisitor {
    fn insert(&mut self, field: &Field, value: String) {
        let name = field.name();
        let value = if is_sensitive(name) {
            REDACTED.to_string()
        } else {
            value
        };
        self.values.insert(name.to_string(), value);
    }
}

impl Visit for RedactingVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.insert(field, format!("{value:?}"));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.insert(field, value.to_string());
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field, value.to_string());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field, value.to_string());
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.insert(field, value.to_string());
    }
}

struct SpanFields(BTreeMap<String, String>);

impl<S> Layer<S> for OpsAlertLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let mut visitor = RedactingVisitor::default();
        attrs.record(&mut visitor);

        if let Some(span) = ctx.span(id) {
            span.extensions_mut().insert(SpanFields(visitor.values));
        }
    }

    fn on_record(&self, id: &Id, values: &Record<'_>, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };

        let mut visitor = RedactingVisitor::default();
        values.record(&mut visitor);

        let mut extensions = span.extensions_mut();
        match extensions.get_mut::<SpanFields>() {
            Some(existing) => existing.0.extend(visitor.values),
            None => extensions.insert(SpanFields(visitor.values)),
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if *metadata.level() > self.min_level || metadata.target().starts_with(OWN_TARGET) {
            return;
        }

        let mut visitor = RedactingVisitor::default();
        event.record(&mut visitor);
        let message = visitor.values.remove("message").map(|raw| unquote(&raw));

        let mut fields = visitor.values;
        let mut spans = Vec::new();
        if let Some(scope) = ctx.event_scope(event) {
            for span in scope.from_root() {
                spans.push(span.name().to_string());
                if let Some(span_fields) = span.extensions().get::<SpanFields>() {
                    for (key, value) in &span_fields.0 {
                        fields.entry(key.clone()).or_insert_with(|| value.clone());
                    }
                }
            }
        }

        let location = match (metadata.file(), metadata.line()) {
            (Some(file), Some(line)) => Some(format!("{file}:{line}")),
            _ => None,
        };

        self.dispatcher.dispatch(AlertEvent {
            level: *metadata.level(),
            timestamp: Utc::now(),
            service_name: self.service_context.service_name.clone(),
            stage: self.service_context.stage.clone(),
            component: self.service_context.component.clone(),
            target: metadata.target().to_string(),
            location,
            message,
            fields,
            spans,
        });
    }
}

fn unquote(raw: &str) -> String {
    let trimmed = raw.trim();
    trimmed
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .unwrap_or(trimmed)
        .to_string()
}

fn is_sensitive(field_name: &str) -> bool {
    let field = field_name.to_ascii_lowercase();
    SENSITIVE_MARKERS.iter().any(|marker| field.contains(marker))
}
