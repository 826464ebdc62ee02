//! RSS 2.0 parsing: `channel > item` entries into [`Item`]s.

use quick_xml::events::Event;
use quick_xml::Reader;
use vestnik_core::Item;

use crate::dates::decode_pub_date;
use crate::FeedError;

/// Result of parsing one feed body: the decoded items plus any per-item
/// soft errors (bad `pubDate`s). Items with an undecodable date are still
/// present, stamped with `pub_date = 0`.
#[derive(Debug, Default)]
pub(crate) struct ParsedChannel {
    pub items: Vec<Item>,
    pub soft_errors: Vec<FeedError>,
}

/// Parse an RSS feed body.
///
/// # Errors
///
/// Returns [`FeedError::Xml`] if the XML is malformed. Per-item date
/// failures are not fatal; they land in [`ParsedChannel::soft_errors`].
pub(crate) fn parse_channel(xml: &str) -> Result<ParsedChannel, FeedError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut parsed = ParsedChannel::default();

    let mut in_item = false;
    let mut current_tag = String::new();
    let mut title = String::new();
    let mut link = String::new();
    let mut description = String::new();
    let mut pub_date = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = std::str::from_utf8(e.name().as_ref())
                    .unwrap_or("")
                    .to_string();
                if name == "item" {
                    in_item = true;
                    title.clear();
                    link.clear();
                    description.clear();
                    pub_date.clear();
                } else {
                    current_tag = name;
                }
            }
            Ok(Event::End(e)) => {
                let raw = e.name();
                let name = std::str::from_utf8(raw.as_ref()).unwrap_or("");
                if name == "item" && in_item {
                    in_item = false;
                    if link.is_empty() {
                        continue;
                    }
                    let ts = match decode_pub_date(&pub_date) {
                        Ok(ts) => ts,
                        Err(e) => {
                            parsed.soft_errors.push(e);
                            0
                        }
                    };
                    parsed.items.push(Item {
                        id: 0,
                        title: title.clone(),
                        pub_date: ts,
                        description: strip_html(&description),
                        link: link.clone(),
                    });
                }
            }
            Ok(Event::Text(e)) => {
                if in_item {
                    let text = e.unescape().unwrap_or_default().into_owned();
                    assign_field(&current_tag, text, &mut title, &mut link, &mut description, &mut pub_date);
                }
            }
            Ok(Event::CData(e)) => {
                if in_item {
                    let text = String::from_utf8_lossy(e.as_ref()).into_owned();
                    assign_field(&current_tag, text, &mut title, &mut link, &mut description, &mut pub_date);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(FeedError::Xml(e)),
            _ => {}
        }
    }

    Ok(parsed)
}

fn assign_field(
    tag: &str,
    text: String,
    title: &mut String,
    link: &mut String,
    description: &mut String,
    pub_date: &mut String,
) {
    match tag {
        "title" => *title = text,
        "link" => *link = text,
        "description" => *description = text,
        "pubDate" => *pub_date = text,
        _ => {}
    }
}

/// Strip HTML tags from a string, returning plain text.
pub(crate) fn strip_html(html: &str) -> String {
    let mut result = String::with_capacity(html.len());
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => result.push(ch),
            _ => {}
        }
    }
    result.trim().to_string()
}
