//! Response cleaning tables
//!
//! Model output drifts: it wraps tables in code fences, prepends chatty
//! preambles, offers several alternative translations. The phrases stripped
//! here live in tables so they can be extended from configuration.

/// Boilerplate phrases removed from specification table responses
pub const DEFAULT_TABLE_BOILERPLATE: &[&str] = &[
    "Here's the HTML table representing the technical specifications from the image:",
    "This HTML code creates a nicely formatted table with the technical specifications translated into Vietnamese.",
    "Remember to replace",
    "The table includes all the specifications from the image and the required copyright information.",
    "Dưới đây là bảng HTML chứa thông số kỹ thuật được trích xuất từ hình ảnh, được dịch sang tiếng Việt:",
    "with the actual product code if it's different",
];

/// Markers after which a translated name response stops being the name
pub const NAME_CUT_MARKERS: &[&str] = &[
    "Option 1",
    "Option 2",
    "Option 3",
    "There are several ways to translate",
    "depending on the desired level",
    "Formal",
    "less formal",
    "descriptive",
    "suitable for technical documentation",
];

/// Removes markdown code fences around a response
///
/// With an explicit ```` ```html ```` fence only the fenced block is kept;
/// stray bare fences are simply deleted.
pub fn strip_code_fences(raw: &str) -> String {
    if let Some(start) = raw.find("```html") {
        let body = &raw[start + "```html".len()..];
        let end = body.find("```").unwrap_or(body.len());
        return body[..end].trim().to_string();
    }
    raw.replace("```", "").trim().to_string()
}

/// Cleans specification table responses
#[derive(Debug, Clone)]
pub struct TableCleaner {
    denylist: Vec<String>,
    attribution_label: String,
    attribution_value: String,
}

impl TableCleaner {
    /// Builds a cleaner from the default denylist plus `extra` phrases
    pub fn new(extra: &[String], attribution_label: &str, attribution_value: &str) -> Self {
        let denylist = DEFAULT_TABLE_BOILERPLATE
            .iter()
            .map(|phrase| phrase.to_string())
            .chain(extra.iter().filter(|p| !p.trim().is_empty()).cloned())
            .collect();

        Self {
            denylist,
            attribution_label: attribution_label.to_string(),
            attribution_value: attribution_value.to_string(),
        }
    }

    /// The attribution row every table ends with
    pub fn attribution_row(&self) -> String {
        format!(
            r#"<tr><td style="font-weight: bold;">{}</td><td>{}</td></tr>"#,
            self.attribution_label, self.attribution_value
        )
    }

    /// Reduces a raw response to the table markup
    ///
    /// Returns `None` when the response holds no table.
    pub fn clean(&self, raw: &str) -> Option<String> {
        let mut text = strip_code_fences(raw);
        for phrase in &self.denylist {
            text = text.replace(phrase.as_str(), "");
        }

        // ASCII lowercasing keeps byte offsets aligned with `text`
        let lower = text.to_ascii_lowercase();
        let start = lower.find("<table")?;
        let end = lower.rfind("</table>")? + "</table>".len();
        if end <= start {
            return None;
        }
        let table = text[start..end].trim();

        if table.contains(&self.attribution_value) {
            return Some(table.to_string());
        }

        let table_lower = table.to_ascii_lowercase();
        let insert_at = table_lower
            .rfind("</tbody>")
            .or_else(|| table_lower.rfind("</table>"))?;

        let mut with_row = String::with_capacity(table.len() + 96);
        with_row.push_str(&table[..insert_at]);
        with_row.push_str(&self.attribution_row());
        with_row.push_str(&table[insert_at..]);
        Some(with_row)
    }
}

/// Reduces a translated-name response to a single name
///
/// Emphasis and quote markers are dropped, only the first non-empty line is
/// kept, and the line is cut at the first marker from [`NAME_CUT_MARKERS`]
/// that leaves text before it. The optional suffix is appended last.
pub fn clean_name(raw: &str, suffix: Option<&str>) -> Option<String> {
    let line = raw
        .lines()
        .map(|line| {
            line.replace('*', "")
                .trim()
                .trim_start_matches('>')
                .trim()
                .trim_matches('"')
                .trim()
                .to_string()
        })
        .find(|line| !line.is_empty())?;

    let mut name = line.as_str();
    for marker in NAME_CUT_MARKERS {
        if let Some(idx) = name.find(marker) {
            let head = name[..idx].trim().trim_end_matches(':').trim();
            if !head.is_empty() {
                name = head;
                break;
            }
        }
    }

    let name = name.trim();
    if name.is_empty() {
        return None;
    }

    match suffix.map(str::trim).filter(|s| !s.is_empty()) {
        Some(suffix) => Some(format!("{} {}", name, suffix)),
        None => Some(name.to_string()),
    }
}
