//! Email content for an expiry notice.

use chrono::NaiveDate;

use crate::registry::AuthorisationRecord;

/// Placeholder SendGrid replaces with the subscription preferences URL.
pub const PREFERENCES_URL_TAG: &str = "<%asm_preferences_raw_url%>";

const RULE: &str = "------------------------------------------------------------";

#[derive(Debug, Clone, PartialEq)]
pub struct NoticeItem {
    pub auth_id: i64,
    pub map_id: i64,
    pub auth_name: String,
    pub expiry_date: NaiveDate,
}

/// One email's worth of expiring authorisations for a single person.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpiryNotice {
    pub resource_id: String,
    pub resource_name: String,
    pub subject: String,
    /// Sorted by expiry date, earliest first
    pub items: Vec<NoticeItem>,
}

impl ExpiryNotice {
    /// Build a notice from a person's qualifying records.
    ///
    /// Records without an expiry date are dropped.
    pub fn from_records(resource_id: &str, records: &[AuthorisationRecord]) -> Self {
        let mut items: Vec<NoticeItem> = records
            .iter()
            .filter_map(|r| {
                r.expiry_date().map(|expiry_date| NoticeItem {
                    auth_id: r.id,
                    map_id: r.map_id,
                    auth_name: r.map_name.clone(),
                    expiry_date,
                })
            })
            .collect();
        items.sort_by_key(|i| i.expiry_date);

        let resource_name = records
            .first()
            .map(|r| r.resource_name.clone())
            .unwrap_or_else(|| resource_id.to_string());

        Self {
            resource_id: resource_id.to_string(),
            resource_name,
            subject: subject_for(items.len()),
            items,
        }
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    pub fn earliest_expiry(&self) -> Option<NaiveDate> {
        self.items.first().map(|i| i.expiry_date)
    }

    /// Plain-text body.
    pub fn render_text(&self, with_preferences_link: bool) -> String {
        let mut lines = vec![
            format!("Dear {},", self.resource_name),
            String::new(),
            format!(
                "This is a notification that you have {} STARS authorisation(s) expiring soon.",
                self.items.len()
            ),
            String::new(),
        ];

        if let Some(earliest) = self.earliest_expiry() {
            lines.push(format!("Earliest expiry: {}", format_date(earliest)));
            lines.push(String::new());
        }

        lines.push("Authorisations expiring:".to_string());
        lines.push(RULE.to_string());
        for item in &self.items {
            lines.push(format!("- {}", item.auth_name));
            lines.push(format!("  Expiry: {}", format_date(item.expiry_date)));
            lines.push(String::new());
        }
        lines.push(RULE.to_string());
        lines.push(String::new());
        lines.push("Please renew your authorisations via your QESO.".to_string());
        lines.push(String::new());
        lines.push("This is an automated notification from the STARS expiry notifier.".to_string());
        if with_preferences_link {
            lines.push(format!("Manage preferences: {}", PREFERENCES_URL_TAG));
        }

        lines.join("\n")
    }

    /// HTML body; registry-supplied text is escaped.
    pub fn render_html(&self, with_preferences_link: bool) -> String {
        let mut html = String::from(
            "<html>\n<head>\n<style>\n\
             body { font-family: Arial, sans-serif; line-height: 1.6; color: #333; }\n\
             h2 { color: #2c3e50; }\n\
             table { border-collapse: collapse; width: 100%; margin: 20px 0; }\n\
             th, td { border: 1px solid #ddd; padding: 12px; text-align: left; }\n\
             th { background-color: #3498db; color: white; }\n\
             tr:nth-child(even) { background-color: #f2f2f2; }\n\
             .warning { color: #e74c3c; font-weight: bold; }\n\
             .footer { margin-top: 30px; font-size: 0.9em; color: #7f8c8d; }\n\
             </style>\n</head>\n<body>\n",
        );

        html.push_str(&format!("<h2>Dear {},</h2>\n", escape_html(&self.resource_name)));
        html.push_str(&format!(
            "<p>This is a notification that you have <strong>{}</strong> STARS authorisation(s) expiring soon.</p>\n",
            self.items.len()
        ));
        if let Some(earliest) = self.earliest_expiry() {
            html.push_str(&format!(
                "<p class=\"warning\">Earliest expiry: {}</p>\n",
                format_date(earliest)
            ));
        }

        html.push_str("<h3>Authorisations Expiring:</h3>\n<table>\n");
        html.push_str("<tr>\n<th>Authorisation</th>\n<th>Expiry Date</th>\n</tr>\n");
        for item in &self.items {
            html.push_str(&format!(
                "<tr>\n<td>{}</td>\n<td>{}</td>\n</tr>\n",
                escape_html(&item.auth_name),
                format_date(item.expiry_date)
            ));
        }
        html.push_str("</table>\n");
        html.push_str("<p>Please renew your authorisations via your QESO.</p>\n");

        html.push_str("<p class=\"footer\">This is an automated notification from the STARS expiry notifier.");
        if with_preferences_link {
            html.push_str(&format!(
                "<br><a href=\"{}\">Manage preferences</a>",
                PREFERENCES_URL_TAG
            ));
        }
        html.push_str("</p>\n</body>\n</html>");

        html
    }
}

fn subject_for(count: usize) -> String {
    format!(
        "STARS Authorisations Expiring Soon - Action Required ({} auth{})",
        count,
        if count == 1 { "" } else { "s" }
    )
}

fn format_date(date: NaiveDate) -> String {
    date.format("%d %B %Y").to_string()
}

fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
