//! Analytics: one narrow event interface injected at startup.
//!
//! The gtag sink renders the event as a `gtag('event', ..)` script for the page
//! to embed; user-supplied values are escaped first. The no-op sink discards.

use tracing::{debug, info};

use crate::domain::AnalyticsEvent;
use crate::util::js_string_escape;

/// Element id of the bootstrap script; its presence marks an already-tagged page.
pub const GA_SCRIPT_ID: &str = "google_analytics";

pub trait AnalyticsSink: Send + Sync {
  /// Emit an event. Returns a script snippet when the sink renders one.
  fn emit(&self, event: &AnalyticsEvent) -> Option<String>;
}

pub struct NoopSink;

impl AnalyticsSink for NoopSink {
  fn emit(&self, event: &AnalyticsEvent) -> Option<String> {
    debug!(target: "analytics", name = %event.name, "Analytics disabled; event dropped");
    None
  }
}

pub struct GtagSink {
  pub measurement_id: String,
}

impl AnalyticsSink for GtagSink {
  fn emit(&self, event: &AnalyticsEvent) -> Option<String> {
    let script = event_script(event);
    info!(target: "analytics", measurement_id = %self.measurement_id, name = %event.name, category = %event.category, label = %event.label, value_len = event.value.len(), "Analytics event emitted");
    Some(script)
  }
}

/// `gtag('event', ..)` snippet with every field escaped for a JS string literal.
pub fn event_script(event: &AnalyticsEvent) -> String {
  format!(
    "<script>\n  gtag('event', '{}', {{\n    'event_category': '{}',\n    'event_label': '{}',\n    'value': '{}'\n  }});\n</script>",
    js_string_escape(&event.name),
    js_string_escape(&event.category),
    js_string_escape(&event.label),
    js_string_escape(&event.value),
  )
}

/// The gtag.js bootstrap tag for a measurement id.
pub fn bootstrap_script(measurement_id: &str) -> String {
  let id = crate::util::html_escape(measurement_id);
  format!(
    "<!-- Google tag (gtag.js) -->\n\
     <script async src=\"https://www.googletagmanager.com/gtag/js?id={id}\"></script>\n\
     <script id='{GA_SCRIPT_ID}'>\n  \
     window.dataLayer = window.dataLayer || [];\n  \
     function gtag(){{dataLayer.push(arguments);}}\n  \
     gtag('js', new Date());\n  \
     gtag('config', '{id}');\n\
     </script>\n"
  )
}

/// Insert the bootstrap tag right after `<head>`. Pages already tagged are returned unchanged.
pub fn inject_bootstrap(html: &str, measurement_id: &str) -> String {
  if html.contains(&format!("id='{GA_SCRIPT_ID}'")) || html.contains(&format!("id=\"{GA_SCRIPT_ID}\"")) {
    return html.to_string();
  }
  html.replacen("<head>", &format!("<head>\n{}", bootstrap_script(measurement_id)), 1)
}
