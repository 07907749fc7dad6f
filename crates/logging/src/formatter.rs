use std::fmt;
use time::{OffsetDateTime, macros::format_description};
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields, format::Writer};
use tracing_subscriber::registry::LookupSpan;

/// Line formatter for daemon logs.
///
/// Without a template every event renders as `prefork[<pid>]: <message>`
/// followed by its structured fields. A template replaces that layout:
///
/// * `%p` process id of the emitting process (master or worker)
/// * `%t` local timestamp
/// * `%l` level
/// * `%m` message followed by its fields
/// * `%a` value of the `peer` field, if present
/// * `%%` a literal percent sign
pub struct PreforkFormatter {
    tokens: Option<Vec<Token>>,
}

impl PreforkFormatter {
    pub fn new(format: Option<String>) -> Self {
        let tokens = format.map(|f| parse_tokens(&f));
        Self { tokens }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Token {
    Lit(String),
    Percent,
    Pid,
    Time,
    Level,
    Message,
    Peer,
}

fn parse_tokens(fmt: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut chars = fmt.chars();
    let mut lit = String::new();
    while let Some(c) = chars.next() {
        if c == '%' {
            if !lit.is_empty() {
                tokens.push(Token::Lit(std::mem::take(&mut lit)));
            }
            match chars.next() {
                Some('%') => tokens.push(Token::Percent),
                Some('p') => tokens.push(Token::Pid),
                Some('t') => tokens.push(Token::Time),
                Some('l') => tokens.push(Token::Level),
                Some('m') => tokens.push(Token::Message),
                Some('a') => tokens.push(Token::Peer),
                Some(other) => {
                    lit.push('%');
                    lit.push(other);
                }
                None => lit.push('%'),
            }
        } else {
            lit.push(c);
        }
    }
    if !lit.is_empty() {
        tokens.push(Token::Lit(lit));
    }
    tokens
}

/// Collects the message and the remaining fields of an event in the order
/// they were recorded.
#[derive(Default)]
pub(crate) struct MessageVisitor {
    pub(crate) msg: String,
    pub(crate) fields: Vec<(&'static str, String)>,
}

impl MessageVisitor {
    pub(crate) fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Message followed by `key=value` pairs.
    pub(crate) fn render(&self) -> String {
        let mut out = self.msg.clone();
        for (k, v) in &self.fields {
            if !out.is_empty() {
                out.push(' ');
            }
            out.push_str(k);
            out.push('=');
            out.push_str(v);
        }
        out
    }
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            if !self.msg.is_empty() {
                self.msg.push(' ');
            }
            self.msg.push_str(value);
        } else {
            self.fields.push((field.name(), value.to_string()));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            if !self.msg.is_empty() {
                self.msg.push(' ');
            }
            self.msg.push_str(&format!("{value:?}"));
        } else {
            self.fields.push((field.name(), format!("{value:?}")));
        }
    }
}

fn format_time() -> String {
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    let fmt = format_description!("[year]/[month]/[day] [hour]:[minute]:[second]");
    now.format(&fmt).unwrap_or_default()
}

impl<S, N> FormatEvent<S, N> for PreforkFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        let Some(tokens) = &self.tokens else {
            let msg = visitor.render();
            let msg = if msg.is_empty() {
                event.metadata().target().to_string()
            } else {
                msg
            };
            return writeln!(writer, "prefork[{}]: {}", std::process::id(), msg);
        };
        let mut out = String::new();
        for tok in tokens {
            match tok {
                Token::Lit(s) => out.push_str(s),
                Token::Percent => out.push('%'),
                Token::Pid => out.push_str(&std::process::id().to_string()),
                Token::Time => out.push_str(&format_time()),
                Token::Level => out.push_str(event.metadata().level().as_str()),
                Token::Message => out.push_str(&visitor.render()),
                Token::Peer => {
                    if let Some(v) = visitor.field("peer") {
                        out.push_str(v);
                    }
                }
            }
        }
        writer.write_str(&out)?;
        writer.write_char('\n')
    }
}
