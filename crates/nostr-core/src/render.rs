//! Rendering tokenized content into display text.

use crate::event::{short_hex, Event};
use crate::mention::{note_id, tokenize, Span};
use crate::metadata::ProfileNames;
use tracing::warn;

/// How bare URLs are turned into clickable links.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LinkMarkup {
    /// `<a href="…" target="_blank" rel="noopener noreferrer">…</a>`
    #[default]
    Html,
    /// OSC 8 escape sequence understood by most terminal emulators.
    Terminal,
    /// Leave URLs as they are.
    Plain,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RenderOptions {
    pub links: LinkMarkup,
}

/// Handle for a profile reference: cached name, else the first 8 hex chars.
pub fn profile_handle(pubkey: &str, names: &dyn ProfileNames) -> String {
    names
        .handle_for(pubkey)
        .unwrap_or_else(|| short_hex(pubkey).to_string())
}

/// Placeholder for an event reference, e.g. `note:note1abcde...`.
pub fn event_placeholder(id: &str) -> String {
    let note = note_id(id).unwrap_or_else(|| id.to_string());
    let head = note.get(..10).unwrap_or(&note);
    format!("note:{head}...")
}

/// Escape text for HTML element content and attribute values.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

fn text(raw: &str, markup: LinkMarkup) -> String {
    match markup {
        LinkMarkup::Html => escape_html(raw),
        _ => raw.to_string(),
    }
}

fn link(url: &str, markup: LinkMarkup) -> String {
    match markup {
        LinkMarkup::Html => {
            let url = escape_html(url);
            format!(r#"<a href="{url}" target="_blank" rel="noopener noreferrer">{url}</a>"#)
        }
        LinkMarkup::Terminal => format!("\x1b]8;;{url}\x1b\\{url}\x1b]8;;\x1b\\"),
        LinkMarkup::Plain => url.to_string(),
    }
}

/// Render spans. Every reference to the same identity renders identically.
///
/// With [`LinkMarkup::Html`] all note text, names and URLs are escaped.
pub fn render(spans: &[Span<'_>], names: &dyn ProfileNames, options: RenderOptions) -> String {
    let mut out = String::new();
    for span in spans {
        match span {
            Span::Text(raw) => out.push_str(&text(raw, options.links)),
            Span::Profile { pubkey, .. } => {
                out.push('@');
                out.push_str(&text(&profile_handle(pubkey, names), options.links));
            }
            Span::Event { id, .. } => out.push_str(&event_placeholder(id)),
            Span::Url(url) => out.push_str(&link(url, options.links)),
        }
    }
    out
}

/// Resolve references in pristine note content.
///
/// Never fails: when the content cannot be tokenized the raw content is
/// returned unchanged (HTML-escaped under [`LinkMarkup::Html`]).
pub fn resolve_content(
    content: &str,
    tags: &[Vec<String>],
    names: &dyn ProfileNames,
    options: RenderOptions,
) -> String {
    match tokenize(content, tags) {
        Ok(spans) => render(&spans, names, options),
        Err(e) => {
            warn!("Reference parsing failed, showing raw content: {e}");
            text(content, options.links)
        }
    }
}

/// [`resolve_content`] for an event's own content and tags.
pub fn resolve_event(event: &Event, names: &dyn ProfileNames, options: RenderOptions) -> String {
    resolve_content(&event.content, &event.tags, names, options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::UserMetadata;
    use std::collections::HashMap;

    const PK_HEX: &str = "3bf0c63fcb93463407af97a5e5ee64fa883d107ef9e558472c4eb9aaaefa459d";
    const NPUB: &str = "npub180cvv07tjdrrgpa0j7j7tmnyl2yr6yr7l8j4s3evf6u64th6gkwsyjh6w6";
    const EVENT_HEX: &str = "46d731680add2990efe1cc619dc9b8014feeb23261ab9dee50e9d11814de5a2b";

    fn alice() -> HashMap<String, UserMetadata> {
        let mut names = HashMap::new();
        names.insert(
            PK_HEX.to_string(),
            UserMetadata {
                name: Some("alice".into()),
                ..Default::default()
            },
        );
        names
    }

    fn nobody() -> HashMap<String, UserMetadata> {
        HashMap::new()
    }

    fn plain() -> RenderOptions {
        RenderOptions {
            links: LinkMarkup::Plain,
        }
    }

    #[test]
    fn known_profile_renders_cached_name() {
        let content = format!("hello nostr:{PK_HEX} check this out");
        let out = resolve_content(&content, &[], &alice(), plain());
        assert_eq!(out, "hello @alice check this out");
    }

    #[test]
    fn unknown_profile_renders_hex_prefix() {
        let content = format!("hello nostr:{NPUB} check this out");
        let out = resolve_content(&content, &[], &nobody(), plain());
        assert_eq!(out, "hello @3bf0c63f check this out");
    }

    #[test]
    fn repeated_references_render_identically() {
        let content = format!("nostr:{NPUB} nostr:{PK_HEX} #[0]");
        let tags = vec![vec!["p".to_string(), PK_HEX.to_string()]];
        let out = resolve_content(&content, &tags, &alice(), plain());
        assert_eq!(out, "@alice @alice @alice");
    }

    #[test]
    fn event_reference_becomes_placeholder() {
        let note = note_id(EVENT_HEX).unwrap();
        let out = resolve_content(&format!("look nostr:{note}"), &[], &nobody(), plain());
        assert_eq!(out, format!("look note:{}...", &note[..10]));
        assert!(!out.contains(EVENT_HEX));
    }

    #[test]
    fn urls_become_html_links() {
        let out = resolve_content(
            "see https://example.com ok",
            &[],
            &nobody(),
            RenderOptions::default(),
        );
        assert_eq!(
            out,
            r#"see <a href="https://example.com" target="_blank" rel="noopener noreferrer">https://example.com</a> ok"#
        );
    }

    #[test]
    fn html_output_escapes_markup_from_notes() {
        let content = "<b>hi</b> & https://a.io/<img/src=x/onerror=alert(1)>\"'";
        let out = resolve_content(content, &[], &nobody(), RenderOptions::default());
        assert!(!out.contains("<b>"));
        assert!(!out.contains("<img"));
        assert_eq!(
            out,
            "&lt;b&gt;hi&lt;/b&gt; &amp; <a href=\"https://a.io/&lt;img/src=x/onerror=alert(1)&gt;&quot;&#39;\" \
             target=\"_blank\" rel=\"noopener noreferrer\">https://a.io/&lt;img/src=x/onerror=alert(1)&gt;&quot;&#39;</a>"
        );

        let names = HashMap::from([(
            PK_HEX.to_string(),
            UserMetadata {
                name: Some("<script>".into()),
                ..Default::default()
            },
        )]);
        let out = resolve_content(&format!("nostr:{PK_HEX}"), &[], &names, RenderOptions::default());
        assert_eq!(out, "@&lt;script&gt;");
        assert_eq!(resolve_content("<i>", &[], &nobody(), plain()), "<i>");
    }

    #[test]
    fn terminal_links_use_osc8() {
        let out = resolve_content(
            "https://nos.lol",
            &[],
            &nobody(),
            RenderOptions {
                links: LinkMarkup::Terminal,
            },
        );
        assert!(out.starts_with("\x1b]8;;https://nos.lol\x1b\\"));
    }

    #[test]
    fn parse_failure_returns_raw_content() {
        let content = "broken nostr:npub1qqqqqqqq https://example.com";
        let out = resolve_content(content, &[], &alice(), RenderOptions::default());
        assert_eq!(out, content);
    }

    #[test]
    fn resolving_twice_is_byte_identical() {
        let content = format!("gm nostr:{NPUB} https://a.b/c #[0]");
        let tags = vec![vec!["e".to_string(), EVENT_HEX.to_string()]];
        let first = resolve_content(&content, &tags, &alice(), RenderOptions::default());
        let second = resolve_content(&content, &tags, &alice(), RenderOptions::default());
        assert_eq!(first, second);
    }

    #[test]
    fn rerender_after_metadata_arrives_uses_pristine_content() {
        let content = format!("hi nostr:{PK_HEX}");
        let before = resolve_content(&content, &[], &nobody(), plain());
        let after = resolve_content(&content, &[], &alice(), plain());
        assert_eq!(before, "hi @3bf0c63f");
        assert_eq!(after, "hi @alice");
    }
}
