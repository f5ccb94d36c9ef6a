use chrono_tz::Tz;

use crate::feed::NewsItem;

/// Rendered message body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Digest {
    pub body: String,
}

impl Digest {
    /// Render `items` as a numbered markdown list under `heading`.
    /// Returns `None` when there is nothing to send.
    pub fn from_items(heading: &str, items: &[NewsItem], tz: Tz) -> Option<Self> {
        if items.is_empty() {
            return None;
        }

        let mut body = format!("{heading}\n\n");
        for (i, item) in items.iter().enumerate() {
            body.push_str(&format!(
                "{}. [{}]({})",
                i + 1,
                escape_link_text(&item.title),
                item.link
            ));
            if let Some(published) = item.published {
                body.push_str(&format!(
                    " ({})",
                    published.with_timezone(&tz).format("%Y-%m-%d %H:%M")
                ));
            }
            body.push_str("\n\n");
        }

        Some(Self {
            body: body.trim_end().to_string(),
        })
    }
}

fn escape_link_text(text: &str) -> String {
    text.replace('[', "\\[").replace(']', "\\]")
}
