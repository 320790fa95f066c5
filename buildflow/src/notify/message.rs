//! Notification events and status-keyed message templates.

use crate::context::RunContext;
use crate::core::RunStatus;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;

/// Everything a notification needs to know about a finished run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationEvent {
    /// The final run status.
    pub status: RunStatus,
    /// The job name.
    pub job_name: String,
    /// The build number.
    pub build_number: u64,
    /// Link to the build page.
    pub build_url: String,
    /// Link to the console log.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub console_url: Option<String>,
    /// Links to published reports by name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub report_links: BTreeMap<String, String>,
    /// Run duration in seconds.
    pub duration_seconds: i64,
    /// Names of the channels the event is sent to.
    #[serde(default)]
    pub channels: Vec<String>,
}

impl NotificationEvent {
    /// Builds the event for a run.
    #[must_use]
    pub fn from_context(status: RunStatus, ctx: &RunContext) -> Self {
        Self {
            status,
            job_name: ctx.job_name().to_string(),
            build_number: ctx.build_number(),
            build_url: ctx.build_url().to_string(),
            console_url: ctx.console_url(),
            report_links: ctx.report_links().clone(),
            duration_seconds: ctx.elapsed().num_seconds().max(0),
            channels: Vec::new(),
        }
    }

    /// Sets the target channel names.
    #[must_use]
    pub fn with_channels(mut self, channels: Vec<String>) -> Self {
        self.channels = channels;
        self
    }

    /// Renders the message for this event's status.
    #[must_use]
    pub fn render(&self) -> Message {
        let template = Template::for_status(self.status);
        let vars = self.template_vars();

        let mut text = render(template.text, &vars);
        let mut html = render(template.html, &vars);

        if let Some(ref console) = self.console_url {
            text.push_str(&format!("\nConsole: {console}"));
            html.push_str(&format!("<p><a href=\"{console}\">Console output</a></p>"));
        }
        if !self.report_links.is_empty() {
            html.push_str("<ul>");
            for (name, url) in &self.report_links {
                text.push_str(&format!("\n{} report: {url}", capitalize(name)));
                html.push_str(&format!("<li><a href=\"{url}\">{} report</a></li>", capitalize(name)));
            }
            html.push_str("</ul>");
        }

        Message {
            status: self.status,
            subject: render(template.subject, &vars),
            text,
            html,
        }
    }

    fn template_vars(&self) -> HashMap<&'static str, String> {
        let mut vars = HashMap::new();
        vars.insert("JOB_NAME", self.job_name.clone());
        vars.insert("BUILD_NUMBER", self.build_number.to_string());
        vars.insert("BUILD_URL", self.build_url.clone());
        vars.insert("STATUS", self.status.as_ci_result().to_string());
        vars.insert("DURATION", format!("{}s", self.duration_seconds));
        vars
    }
}

/// A rendered notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// The run status the message reports.
    pub status: RunStatus,
    /// Subject line.
    pub subject: String,
    /// Plain text body for chat channels.
    pub text: String,
    /// HTML body for mail.
    pub html: String,
}

struct Template {
    subject: &'static str,
    text: &'static str,
    html: &'static str,
}

const SUCCESS: Template = Template {
    subject: "SUCCESS: ${JOB_NAME} #${BUILD_NUMBER}",
    text: "Build succeeded: ${JOB_NAME} #${BUILD_NUMBER} (${DURATION})\nBuild: ${BUILD_URL}",
    html: "<h2 style=\"color:#36a64f\">Build succeeded</h2>\
           <p>Project: <b>${JOB_NAME}</b><br>Build: #${BUILD_NUMBER}<br>Duration: ${DURATION}</p>\
           <p><a href=\"${BUILD_URL}\">Open build</a></p>",
};

const UNSTABLE: Template = Template {
    subject: "UNSTABLE: ${JOB_NAME} #${BUILD_NUMBER}",
    text: "Build unstable: ${JOB_NAME} #${BUILD_NUMBER}, some checks did not pass (${DURATION})\nBuild: ${BUILD_URL}",
    html: "<h2 style=\"color:#ff9800\">Build unstable</h2>\
           <p>Project: <b>${JOB_NAME}</b><br>Build: #${BUILD_NUMBER}<br>Duration: ${DURATION}</p>\
           <p>Some checks did not pass. Review the reports below.</p>\
           <p><a href=\"${BUILD_URL}\">Open build</a></p>",
};

const FAILURE: Template = Template {
    subject: "FAILURE: ${JOB_NAME} #${BUILD_NUMBER}",
    text: "Build failed: ${JOB_NAME} #${BUILD_NUMBER} (${DURATION})\nBuild: ${BUILD_URL}",
    html: "<h2 style=\"color:#d32f2f\">Build failed</h2>\
           <p>Project: <b>${JOB_NAME}</b><br>Build: #${BUILD_NUMBER}<br>Duration: ${DURATION}</p>\
           <p><a href=\"${BUILD_URL}\">Open build</a></p>",
};

impl Template {
    fn for_status(status: RunStatus) -> &'static Self {
        match status {
            RunStatus::Success => &SUCCESS,
            RunStatus::Unstable => &UNSTABLE,
            RunStatus::Failure => &FAILURE,
        }
    }
}

#[allow(clippy::expect_used)]
static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([A-Z_]+)\}").expect("placeholder pattern is valid"));

/// Substitutes `${NAME}` placeholders; unknown names are left verbatim.
fn render(template: &str, vars: &HashMap<&'static str, String>) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &regex::Captures<'_>| {
            vars.get(&caps[1])
                .cloned()
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    chars
        .next()
        .map(|first| first.to_uppercase().chain(chars).collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::BuildIdentity;
    use pretty_assertions::assert_eq;

    fn event(status: RunStatus) -> NotificationEvent {
        let ctx = RunContext::new(
            BuildIdentity::new("payments", 42).with_build_url("https://ci.example.com/job/payments/42/"),
        );
        NotificationEvent::from_context(status, &ctx)
    }

    #[test]
    fn test_event_from_context() {
        let event = event(RunStatus::Unstable);
        assert_eq!(event.job_name, "payments");
        assert_eq!(event.build_number, 42);
        assert_eq!(
            event.console_url.as_deref(),
            Some("https://ci.example.com/job/payments/42/console")
        );
    }

    #[test]
    fn test_templates_keyed_by_status() {
        assert_eq!(event(RunStatus::Success).render().subject, "SUCCESS: payments #42");
        assert_eq!(event(RunStatus::Unstable).render().subject, "UNSTABLE: payments #42");
        assert_eq!(event(RunStatus::Failure).render().subject, "FAILURE: payments #42");
    }

    #[test]
    fn test_render_includes_links() {
        let mut event = event(RunStatus::Failure);
        event.report_links.insert("coverage".to_string(), "https://ci/jacoco/".to_string());
        let message = event.render();

        assert!(message.text.starts_with("Build failed: payments #42"));
        assert!(message.text.contains("Build: https://ci.example.com/job/payments/42/"));
        assert!(message.text.contains("Console: https://ci.example.com/job/payments/42/console"));
        assert!(message.text.contains("Coverage report: https://ci/jacoco/"));
        assert!(message.html.contains("<a href=\"https://ci/jacoco/\">Coverage report</a>"));
        assert!(!message.html.contains("${"));
    }

    #[test]
    fn test_render_leaves_unknown_placeholders() {
        let vars = HashMap::from([("JOB_NAME", "app".to_string())]);
        assert_eq!(render("${JOB_NAME} ${BRANCH}", &vars), "app ${BRANCH}");
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("tests"), "Tests");
        assert_eq!(capitalize(""), "");
    }
}
