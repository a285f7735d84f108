//! TwiML voice responses.

/// Where speech collected by `<Gather>` is posted.
pub const VOICE_ACTION: &str = "/voice/receive";

const XML_HEADER: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;

pub fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

fn says(messages: &[String], language: &str) -> String {
    let language = escape_xml(language);
    messages
        .iter()
        .map(|m| format!(r#"<Say language="{language}">{}</Say>"#, escape_xml(m)))
        .collect()
}

/// An empty response; the provider takes no action.
pub fn empty() -> String {
    format!("{XML_HEADER}<Response></Response>")
}

/// Speak the messages and listen for the next answer. Silence falls through
/// to a redirect so the turn is posted anyway.
pub fn gather(messages: &[String], language: &str) -> String {
    let lang = escape_xml(language);
    format!(
        r#"{XML_HEADER}<Response><Gather input="speech" action="{VOICE_ACTION}" method="POST" language="{lang}" speechTimeout="auto">{}</Gather><Redirect method="POST">{VOICE_ACTION}</Redirect></Response>"#,
        says(messages, language)
    )
}

/// Speak the messages and end the call.
pub fn say_and_hangup(messages: &[String], language: &str) -> String {
    format!(
        "{XML_HEADER}<Response>{}<Hangup/></Response>",
        says(messages, language)
    )
}
