//! Badge markup: the built-in ticket template and the page rule that pins a
//! document to its physical label size.

use serde::{Deserialize, Serialize};
use url::form_urlencoded;

use crate::geometry::PageGeometry;

/// Fields printed on the built-in badge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BadgeTemplate {
    pub name: String,
    /// Encoded into the QR image and printed underneath it.
    pub qr_payload: String,
}

impl BadgeTemplate {
    pub fn new(name: impl Into<String>, qr_payload: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            qr_payload: qr_payload.into(),
        }
    }

    /// Renders the badge as a standalone HTML document.
    ///
    /// `qr_image_url` is a URL with a `{payload}` placeholder pointing at a QR
    /// image service. Without one the payload is printed as text only.
    pub fn to_html(&self, geometry: &PageGeometry, qr_image_url: Option<&str>) -> String {
        let (w, h) = geometry.oriented_mm();
        let name = escape_html(&self.name);
        let payload = escape_html(&self.qr_payload);
        let qr = match qr_image_url {
            Some(url) => {
                let src = url.replace("{payload}", &percent_encode(&self.qr_payload));
                format!(
                    r#"<img class="qr" src="{}" alt="{payload}" style="width:20mm;height:19mm;">"#,
                    escape_html(&src)
                )
            }
            None => String::new(),
        };

        format!(
            r#"<!DOCTYPE html>
<html><head><meta charset="utf-8"><title>Ticket</title></head>
<body style="padding:0; margin:0">
<div class="layout" style="width:{w}mm; height:{h}mm; position:relative; overflow:hidden; font-family: Verdana, Geneva, sans-serif;">
<p class="name" style="margin:0; padding-top:3mm; text-align:center; font-size:17px; font-weight:bold;">{name}</p>
<div style="position:absolute; left:2mm; bottom:2mm;">{qr}</div>
<span class="code" style="position:absolute; right:4mm; bottom:3mm; font-size:12px;">{payload}</span>
</div>
</body></html>
"#
        )
    }
}

/// Inserts an `@page` rule sizing the document to `geometry` with zero margins.
///
/// The rule goes at the end of `<head>` so it wins over earlier stylesheets.
pub fn with_page_style(markup: &str, geometry: &PageGeometry) -> String {
    let style = format!(
        "<style>@page {{ size: {}; margin: 0; }} html, body {{ margin: 0; padding: 0; }}</style>",
        geometry.css_size()
    );
    let lower = markup.to_ascii_lowercase();

    if let Some(pos) = lower.find("</head>") {
        let mut out = String::with_capacity(markup.len() + style.len());
        out.push_str(&markup[..pos]);
        out.push_str(&style);
        out.push_str(&markup[pos..]);
        return out;
    }

    if let Some(start) = lower.find("<html")
        && let Some(end) = lower[start..].find('>')
    {
        let pos = start + end + 1;
        return format!("{}<head>{style}</head>{}", &markup[..pos], &markup[pos..]);
    }

    format!("<!DOCTYPE html>\n<html><head>{style}</head><body>{markup}</body></html>\n")
}

/// Inserts `<base href>` as the first element of `<head>`, so every relative
/// URL in the document resolves against `href`.
pub fn with_base_href(markup: &str, href: &str) -> String {
    let tag = format!(r#"<base href="{}">"#, escape_html(href));
    let lower = markup.to_ascii_lowercase();
    let head = lower.match_indices("<head").find(|(i, _)| {
        matches!(lower.as_bytes().get(i + 5), Some(b'>' | b' ' | b'\t' | b'\n' | b'\r'))
    });

    if let Some((start, _)) = head
        && let Some(end) = lower[start..].find('>')
    {
        let pos = start + end + 1;
        return format!("{}{tag}{}", &markup[..pos], &markup[pos..]);
    }
    format!("{tag}{markup}")
}

pub fn escape_html(input: &str) -> String {
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

fn percent_encode(input: &str) -> String {
    form_urlencoded::byte_serialize(input.as_bytes()).collect()
}
