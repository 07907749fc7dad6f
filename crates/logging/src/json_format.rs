// crates/logging/src/json_format.rs
use serde_json::{Map, Value};
use time::OffsetDateTime;
use time::macros::format_description;
use tracing::{Event, Subscriber};
use tracing_serde::{AsSerde, fields::AsMap};
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields, format::Writer};
use tracing_subscriber::registry::LookupSpan;

/// One JSON object per line.
///
/// Each record carries the emitting pid and the names of the enclosing
/// spans (`worker` inside a forked worker), so master and worker output can
/// be separated in a shared log. `message` and `peer` are lifted to the top
/// level; remaining event fields are nested under `fields`.
#[derive(Default)]
pub struct JsonFormatter;

impl<S, N> FormatEvent<S, N> for JsonFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'writer> FormatFields<'writer> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> std::fmt::Result {
        let meta = event.metadata();
        let timestamp = OffsetDateTime::now_utc()
            .format(&format_description!(
                "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z"
            ))
            .map_err(|_| std::fmt::Error)?;

        let mut fields = match serde_json::to_value(event.field_map()) {
            Ok(Value::Object(map)) => map,
            Ok(_) => Map::new(),
            Err(_) => return Err(std::fmt::Error),
        };
        let spans: Vec<Value> = ctx
            .event_scope()
            .map(|scope| scope.from_root().map(|span| Value::from(span.name())).collect())
            .unwrap_or_default();

        let mut record = Map::new();
        record.insert("timestamp".into(), Value::String(timestamp));
        record.insert(
            "level".into(),
            serde_json::to_value(meta.level().as_serde()).map_err(|_| std::fmt::Error)?,
        );
        record.insert("target".into(), Value::from(meta.target()));
        record.insert("pid".into(), Value::from(std::process::id()));
        if !spans.is_empty() {
            record.insert("spans".into(), Value::Array(spans));
        }
        if let Some(message) = fields.remove("message") {
            record.insert("message".into(), message);
        }
        if let Some(peer) = fields.remove("peer") {
            record.insert("peer".into(), peer);
        }
        if !fields.is_empty() {
            record.insert("fields".into(), Value::Object(fields));
        }

        let line = serde_json::to_string(&Value::Object(record)).map_err(|_| std::fmt::Error)?;
        writer.write_str(&line)?;
        writer.write_char('\n')
    }
}
