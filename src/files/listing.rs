//! HTML directory listings.

use std::fmt::Write as _;

use html_escape::{encode_double_quoted_attribute, encode_text};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Characters left unescaped inside one path segment.
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Stylesheet linked from every listing, served from the static directory.
pub const LISTING_STYLESHEET: &str = "/static/css/customStyle.css";

/// Coarse entry type, used for the icon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Directory,
    Image,
    Text,
    Audio,
    Video,
    Archive,
    Document,
    File,
}

impl EntryKind {
    /// Classify a non-directory entry from its extension.
    pub fn for_file_name(name: &str) -> Self {
        let Some(mime) = mime_guess::from_path(name).first() else {
            return EntryKind::File;
        };

        match (mime.type_().as_str(), mime.subtype().as_str()) {
            ("image", _) => EntryKind::Image,
            ("text", _) => EntryKind::Text,
            ("audio", _) => EntryKind::Audio,
            ("video", _) => EntryKind::Video,
            ("application", "zip" | "gzip" | "x-tar" | "x-7z-compressed" | "x-bzip2" | "vnd.rar") => {
                EntryKind::Archive
            }
            ("application", "pdf" | "msword" | "rtf") => EntryKind::Document,
            ("application", sub) if sub.starts_with("vnd.openxmlformats") || sub.starts_with("vnd.oasis") => {
                EntryKind::Document
            }
            ("application", "json" | "xml" | "javascript" | "toml" | "x-sh") => EntryKind::Text,
            _ => EntryKind::File,
        }
    }

    pub fn css_class(self) -> &'static str {
        match self {
            EntryKind::Directory => "icon-directory",
            EntryKind::Image => "icon-image",
            EntryKind::Text => "icon-text",
            EntryKind::Audio => "icon-audio",
            EntryKind::Video => "icon-video",
            EntryKind::Archive => "icon-archive",
            EntryKind::Document => "icon-document",
            EntryKind::File => "icon-file",
        }
    }

    pub fn glyph(self) -> &'static str {
        match self {
            EntryKind::Directory => "\u{1F4C1}",
            EntryKind::Image => "\u{1F5BC}",
            EntryKind::Text => "\u{1F4DD}",
            EntryKind::Audio => "\u{1F3B5}",
            EntryKind::Video => "\u{1F3AC}",
            EntryKind::Archive => "\u{1F4E6}",
            EntryKind::Document => "\u{1F4D1}",
            EntryKind::File => "\u{1F4C4}",
        }
    }
}

/// One child of a listed directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEntry {
    pub name: String,
    pub kind: EntryKind,
}

/// Children of one directory, already filtered and sorted.
#[derive(Debug, Clone)]
pub struct DirectoryListing {
    /// Decoded URL segments of the listed directory.
    pub segments: Vec<String>,
    pub is_root: bool,
    pub entries: Vec<ListingEntry>,
}

impl DirectoryListing {
    pub fn new(url_path: &str, is_root: bool, entries: Vec<ListingEntry>) -> Self {
        let segments = url_path
            .split('/')
            .filter(|s| !s.is_empty() && *s != ".")
            .map(str::to_string)
            .collect();
        Self {
            segments,
            is_root,
            entries,
        }
    }

    /// Display path, always with leading and trailing `/`.
    pub fn display_path(&self) -> String {
        let mut path = String::from("/");
        for segment in &self.segments {
            path.push_str(segment);
            path.push('/');
        }
        path
    }

    /// Encoded href of the listed directory, with trailing `/`.
    fn base_href(&self) -> String {
        encoded_prefix(&self.segments)
    }

    /// Render the listing as a standalone HTML page.
    pub fn render_html(&self) -> String {
        let display_path = self.display_path();
        let title = encode_text(&display_path);
        let base = self.base_href();
        let mut html = String::with_capacity(1024 + self.entries.len() * 160);

        let _ = write!(
            html,
            "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n\
             <meta charset=\"utf-8\">\n\
             <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
             <title>listing directory {title}</title>\n\
             <link rel=\"stylesheet\" href=\"{LISTING_STYLESHEET}\">\n\
             </head>\n<body class=\"directory\">\n<div id=\"wrapper\">\n<h1>"
        );
        self.write_breadcrumbs(&mut html);
        html.push_str("</h1>\n<ul id=\"files\" class=\"view-tiles\">\n");

        if !self.is_root {
            let parent = encoded_prefix(&self.segments[..self.segments.len().saturating_sub(1)]);
            write_entry(&mut html, &parent, "..", EntryKind::Directory);
        }
        for entry in &self.entries {
            let mut href = format!("{base}{}", encode_segment(&entry.name));
            if entry.kind == EntryKind::Directory {
                href.push('/');
            }
            write_entry(&mut html, &href, &entry.name, entry.kind);
        }

        html.push_str("</ul>\n</div>\n</body>\n</html>\n");
        html
    }

    fn write_breadcrumbs(&self, html: &mut String) {
        html.push_str("<a href=\"/\">~</a> / ");
        for (i, segment) in self.segments.iter().enumerate() {
            let href = encoded_prefix(&self.segments[..=i]);
            let _ = write!(
                html,
                "<a href=\"{}\">{}</a> / ",
                encode_double_quoted_attribute(&href),
                encode_text(segment)
            );
        }
    }
}

fn write_entry(html: &mut String, href: &str, name: &str, kind: EntryKind) {
    let _ = writeln!(
        html,
        "<li><a href=\"{href}\" class=\"icon {class}\" title=\"{title}\">\
         <span class=\"glyph\" aria-hidden=\"true\">{glyph}</span>\
         <span class=\"name\">{name}</span></a></li>",
        href = encode_double_quoted_attribute(href),
        class = kind.css_class(),
        title = encode_double_quoted_attribute(name),
        name = encode_text(name),
        glyph = kind.glyph(),
    );
}

fn encode_segment(segment: &str) -> String {
    utf8_percent_encode(segment, SEGMENT).to_string()
}

fn encoded_prefix(segments: &[String]) -> String {
    let mut href = String::from("/");
    for segment in segments {
        href.push_str(&encode_segment(segment));
        href.push('/');
    }
    href
}
