//! HTML document processor: fragment extraction, rewrite and serialization

use std::collections::VecDeque;
use std::io;
use std::path::{Path, PathBuf};

use html5ever::serialize::{serialize, Serialize, SerializeOpts, Serializer, TraversalScope};
use html5ever::tendril::{StrTendril, TendrilSink};
use html5ever::{namespace_url, ns, parse_document, parse_fragment, LocalName, QualName};
use indicatif::{ProgressBar, ProgressStyle};
use markup5ever_rcdom::{Handle, NodeData, RcDom};
use tracing::{debug, info};

use crate::core::client::TextGenerator;
use crate::core::errors::{Result, TranslationError};
use crate::core::translator::{preview, CachedTranslator};

/// Elements whose sole text child is translated
pub const TEXT_TAGS: &[&str] = &[
    "p", "h1", "h2", "h3", "h4", "h5", "h6", "li", "td", "th", "span", "div", "a", "button",
];

/// Attributes whose value is translated on any element
pub const TEXT_ATTRS: &[&str] = &["alt", "title", "placeholder"];

/// Elements whose content is never translated
const RAW_TEXT_TAGS: &[&str] = &["script", "style"];

/// Tags that mark the source as a whole document rather than a fragment
const DOCUMENT_TAGS: &[&str] = &["<html", "<head", "<body"];

/// Where a fragment lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FragmentKind {
    /// The single text child of the element
    Text,
    /// The value of the named attribute
    Attribute(String),
}

/// One translatable span of the document
#[derive(Debug, Clone)]
pub struct Fragment {
    /// Element that owns the text or attribute
    pub node: Handle,
    /// Source text with surrounding whitespace trimmed
    pub original: String,
    /// Text child or attribute
    pub kind: FragmentKind,
}

/// A parsed page, either a whole document or a body fragment
pub struct HtmlDocument {
    dom: RcDom,
    fragment: bool,
}

impl HtmlDocument {
    /// Parse markup. Sources without a doctype or `html`/`head`/`body` tag
    /// are parsed as body content and serialize without added wrappers.
    pub fn parse(html: &str) -> Self {
        if is_full_document(html) {
            Self {
                dom: parse_document(RcDom::default(), Default::default()).one(html),
                fragment: false,
            }
        } else {
            let context = QualName::new(None, ns!(html), LocalName::from("body"));
            Self {
                dom: parse_fragment(RcDom::default(), Default::default(), context, vec![]).one(html),
                fragment: true,
            }
        }
    }

    /// Whether the source was parsed as a body fragment
    pub fn is_fragment(&self) -> bool {
        self.fragment
    }

    /// Node whose children make up the output
    fn root(&self) -> Handle {
        if self.fragment {
            // The fragment parser hangs everything off a synthetic <html> element
            if let Some(html) = self.dom.document.children.borrow().first() {
                return html.clone();
            }
        }
        self.dom.document.clone()
    }

    /// Serialize the document back to markup
    pub fn serialize(&self) -> Result<String> {
        let mut buf: Vec<u8> = Vec::new();
        let opts = SerializeOpts {
            traversal_scope: TraversalScope::ChildrenOnly(None),
            ..Default::default()
        };
        serialize(&mut buf, &TreeNode(self.root()), opts)?;

        String::from_utf8(buf).map_err(|e| TranslationError::InternalError(e.to_string()))
    }
}

fn is_full_document(html: &str) -> bool {
    let lower = html.to_ascii_lowercase();
    if lower.contains("<!doctype") {
        return true;
    }

    // `<head` must not match `<header`
    DOCUMENT_TAGS.iter().any(|tag| {
        lower.match_indices(tag).any(|(i, _)| {
            lower[i + tag.len()..]
                .chars()
                .next()
                .map_or(true, |c| c == '>' || c == '/' || c.is_ascii_whitespace())
        })
    })
}

/// Parse markup into a document
pub fn parse_html(html: &str) -> HtmlDocument {
    HtmlDocument::parse(html)
}

/// Serialize the document back to markup
pub fn serialize_document(doc: &HtmlDocument) -> Result<String> {
    doc.serialize()
}

/// Serializable view of a node that also writes `<template>` contents,
/// which the rcdom serializer leaves out.
struct TreeNode(Handle);

enum SerializeOp {
    Open(Handle),
    Close(QualName),
}

/// Children to serialize: a template's content fragment, else the node's own
fn output_children(node: &Handle) -> Vec<Handle> {
    if let NodeData::Element {
        template_contents, ..
    } = &node.data
    {
        if let Some(contents) = template_contents.borrow().as_ref() {
            return contents.children.borrow().clone();
        }
    }
    node.children.borrow().clone()
}

impl Serialize for TreeNode {
    fn serialize<S: Serializer>(&self, serializer: &mut S, scope: TraversalScope) -> io::Result<()> {
        let mut ops: VecDeque<SerializeOp> = match scope {
            TraversalScope::IncludeNode => VecDeque::from([SerializeOp::Open(self.0.clone())]),
            TraversalScope::ChildrenOnly(_) => output_children(&self.0)
                .into_iter()
                .map(SerializeOp::Open)
                .collect(),
        };

        while let Some(op) = ops.pop_front() {
            match op {
                SerializeOp::Open(handle) => match &handle.data {
                    NodeData::Element { name, attrs, .. } => {
                        serializer.start_elem(
                            name.clone(),
                            attrs.borrow().iter().map(|at| (&at.name, &at.value[..])),
                        )?;

                        ops.push_front(SerializeOp::Close(name.clone()));
                        for child in output_children(&handle).into_iter().rev() {
                            ops.push_front(SerializeOp::Open(child));
                        }
                    }
                    NodeData::Document => {
                        for child in output_children(&handle).into_iter().rev() {
                            ops.push_front(SerializeOp::Open(child));
                        }
                    }
                    NodeData::Doctype { name, .. } => serializer.write_doctype(name)?,
                    NodeData::Text { contents } => serializer.write_text(&contents.borrow())?,
                    NodeData::Comment { contents } => serializer.write_comment(contents)?,
                    NodeData::ProcessingInstruction { target, contents } => {
                        serializer.write_processing_instruction(target, contents)?
                    }
                },
                SerializeOp::Close(name) => serializer.end_elem(name)?,
            }
        }

        Ok(())
    }
}

/// Text of the element when its only child is a text node
fn sole_text(node: &Handle) -> Option<String> {
    let children = node.children.borrow();
    if children.len() != 1 {
        return None;
    }
    match &children[0].data {
        NodeData::Text { contents } => Some(contents.borrow().to_string()),
        _ => None,
    }
}

/// Collect translatable fragments in document order
pub fn extract_fragments(doc: &HtmlDocument) -> Vec<Fragment> {
    let mut fragments = Vec::new();
    walk(&doc.root(), false, &mut fragments);
    fragments
}

fn walk(node: &Handle, in_raw_text: bool, fragments: &mut Vec<Fragment>) {
    let mut in_raw_text = in_raw_text;

    if let NodeData::Element {
        name,
        attrs,
        template_contents,
        ..
    } = &node.data
    {
        let tag: &str = name.local.as_ref();

        if !in_raw_text && TEXT_TAGS.contains(&tag) {
            if let Some(text) = sole_text(node) {
                let trimmed = text.trim();
                if !trimmed.is_empty() {
                    fragments.push(Fragment {
                        node: node.clone(),
                        original: trimmed.to_string(),
                        kind: FragmentKind::Text,
                    });
                }
            }
        }

        for attr in attrs.borrow().iter() {
            let attr_name: &str = attr.name.local.as_ref();
            if !TEXT_ATTRS.contains(&attr_name) {
                continue;
            }
            let value = attr.value.trim();
            if !value.is_empty() {
                fragments.push(Fragment {
                    node: node.clone(),
                    original: value.to_string(),
                    kind: FragmentKind::Attribute(attr_name.to_string()),
                });
            }
        }

        in_raw_text = in_raw_text || RAW_TEXT_TAGS.contains(&tag);

        if let Some(contents) = template_contents.borrow().as_ref() {
            walk(contents, in_raw_text, fragments);
        }
    }

    for child in node.children.borrow().iter() {
        walk(child, in_raw_text, fragments);
    }
}

/// Overwrite one fragment location with its translation
pub fn apply_fragment(fragment: &Fragment, translated: &str) {
    match &fragment.kind {
        FragmentKind::Text => {
            let children = fragment.node.children.borrow();
            if let Some(NodeData::Text { contents }) = children.first().map(|c| &c.data) {
                *contents.borrow_mut() = StrTendril::from_slice(translated);
            }
        }
        FragmentKind::Attribute(attr_name) => {
            if let NodeData::Element { attrs, .. } = &fragment.node.data {
                for attr in attrs.borrow_mut().iter_mut() {
                    if &*attr.name.local == attr_name.as_str() {
                        attr.value = StrTendril::from_slice(translated);
                    }
                }
            }
        }
    }
}

/// Write translations back, pairing fragments and translations by position
pub fn apply_translations(fragments: &[Fragment], translations: &[String]) -> Result<()> {
    if fragments.len() != translations.len() {
        return Err(TranslationError::InternalError(format!(
            "{} fragments but {} translations",
            fragments.len(),
            translations.len()
        )));
    }

    for (fragment, translated) in fragments.iter().zip(translations) {
        apply_fragment(fragment, translated);
    }

    Ok(())
}

/// Outcome of translating one document
#[derive(Debug, Clone)]
pub struct DocumentReport {
    /// Rewritten markup
    pub html: String,
    /// Number of fragments found
    pub fragments: usize,
    /// Fragments left in the source language after a failed request
    pub fallbacks: usize,
}

/// HTML processor that drives extraction, translation and rewrite
pub struct HtmlProcessor<G> {
    translator: CachedTranslator<G>,
    show_progress: bool,
}

impl<G: TextGenerator> HtmlProcessor<G> {
    /// Create a new HTML processor
    pub fn new(translator: CachedTranslator<G>) -> Self {
        Self {
            translator,
            show_progress: false,
        }
    }

    /// Draw a progress bar while fragments are translated
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// The translator and its run cache
    pub fn translator(&self) -> &CachedTranslator<G> {
        &self.translator
    }

    /// Translate HTML markup and return the rewritten document
    pub async fn translate_document(&mut self, html: &str) -> Result<DocumentReport> {
        let doc = parse_html(html);
        let fragments = extract_fragments(&doc);

        info!("Found {} text fragments to translate", fragments.len());

        let pb = self.progress_bar(fragments.len());
        let mut translations = Vec::with_capacity(fragments.len());
        let mut fallbacks = 0;

        for (i, fragment) in fragments.iter().enumerate() {
            if !self.translator.is_cached(&fragment.original) {
                pb.set_message(preview(&fragment.original));
                debug!(
                    "[{}/{}] {}",
                    i + 1,
                    fragments.len(),
                    preview(&fragment.original)
                );
            }

            let outcome = self.translator.translate(&fragment.original).await;
            if outcome.is_fallback() {
                fallbacks += 1;
            }
            translations.push(outcome.into_text());
            pb.inc(1);
        }

        pb.finish_and_clear();

        apply_translations(&fragments, &translations)?;
        let html = serialize_document(&doc)?;

        Ok(DocumentReport {
            html,
            fragments: fragments.len(),
            fallbacks,
        })
    }

    /// Translate a single HTML file
    pub async fn translate_file(&mut self, input: &Path, output: &Path) -> Result<DocumentReport> {
        debug!("Translating: {}", input.display());

        let content = tokio::fs::read_to_string(input)
            .await
            .map_err(|e| TranslationError::FileError {
                path: input.display().to_string(),
                message: e.to_string(),
            })?;

        let report = self.translate_document(&content).await?;

        // Ensure output directory exists
        if let Some(parent) = output.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| TranslationError::FileError {
                        path: parent.display().to_string(),
                        message: e.to_string(),
                    })?;
            }
        }

        tokio::fs::write(output, &report.html)
            .await
            .map_err(|e| TranslationError::FileError {
                path: output.display().to_string(),
                message: e.to_string(),
            })?;

        info!("Translated: {} -> {}", input.display(), output.display());
        Ok(report)
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }

        let pb = ProgressBar::new(len as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
        {
            pb.set_style(style.progress_chars("=>-"));
        }
        pb
    }
}

/// Check if file is HTML
pub fn is_html_file(path: &Path) -> bool {
    path.extension()
        .map(|ext| {
            let ext = ext.to_string_lossy().to_lowercase();
            ext == "html" || ext == "htm"
        })
        .unwrap_or(false)
}

/// Find HTML files recursively
pub fn find_html_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(TranslationError::FileError {
            path: dir.display().to_string(),
            message: "Not a directory".to_string(),
        });
    }

    let mut files = Vec::new();
    for entry in walkdir::WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if path.is_file() && is_html_file(path) {
            files.push(path.to_path_buf());
        }
    }

    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element_name(node: &Handle) -> Option<&str> {
        match &node.data {
            NodeData::Element { name, .. } => Some(name.local.as_ref()),
            _ => None,
        }
    }

    fn originals(fragments: &[Fragment]) -> Vec<&str> {
        fragments.iter().map(|f| f.original.as_str()).collect()
    }

    #[test]
    fn test_extracts_leaf_text_in_document_order() {
        let doc = parse_html("<h1> Title </h1><div><p>First</p><ul><li>Item</li></ul></div><button>Go</button>");
        let fragments = extract_fragments(&doc);

        assert_eq!(originals(&fragments), vec!["Title", "First", "Item", "Go"]);
        assert!(fragments.iter().all(|f| f.kind == FragmentKind::Text));
    }

    #[test]
    fn test_skips_whitespace_only_text() {
        let doc = parse_html("<p>   </p><p>\n\t</p>");
        assert!(extract_fragments(&doc).is_empty());
    }

    #[test]
    fn test_skips_mixed_content_and_unlisted_tags() {
        let doc = parse_html("<p>Read <b>this</b> now</p><em>Emphasis</em><label>Name</label>");
        let fragments = extract_fragments(&doc);

        // Only the <b> child would qualify, but <b> is not a text tag.
        assert!(fragments.is_empty());
    }

    #[test]
    fn test_nested_single_child_only_inner_element() {
        let doc = parse_html("<li><a href=\"/\">Home</a></li>");
        let fragments = extract_fragments(&doc);

        assert_eq!(originals(&fragments), vec!["Home"]);
        assert_eq!(element_name(&fragments[0].node), Some("a"));
    }

    #[test]
    fn test_ignores_script_and_style_regions() {
        let doc = parse_html(
            "<head><style>p { color: red; }</style></head>\
             <body><script>var s = '<p>not me</p>';</script><p>me</p></body>",
        );
        let fragments = extract_fragments(&doc);

        assert_eq!(originals(&fragments), vec!["me"]);
    }

    #[test]
    fn test_extracts_attributes() {
        let doc = parse_html(
            "<img src=\"a.png\" alt=\"Sunset photo\" title=\"  \">\
             <input placeholder=\"Search\"><a title=\"Home page\">Home</a>",
        );
        let fragments = extract_fragments(&doc);

        assert_eq!(
            originals(&fragments),
            vec!["Sunset photo", "Search", "Home", "Home page"]
        );
        assert_eq!(fragments[0].kind, FragmentKind::Attribute("alt".to_string()));
        assert_eq!(fragments[1].kind, FragmentKind::Attribute("placeholder".to_string()));
        assert_eq!(fragments[2].kind, FragmentKind::Text);
        assert_eq!(fragments[3].kind, FragmentKind::Attribute("title".to_string()));
    }

    #[test]
    fn test_apply_replaces_text_and_attribute_only() {
        let doc = parse_html("<div><p>Hi</p><img src=\"a.png\" alt=\"Sunset photo\" class=\"hero\"></div>");
        let fragments = extract_fragments(&doc);
        let translations = vec!["مرحبا".to_string(), "صورة الغروب".to_string()];

        apply_translations(&fragments, &translations).unwrap();
        let html = serialize_document(&doc).unwrap();

        assert_eq!(
            html,
            "<div><p>مرحبا</p><img src=\"a.png\" alt=\"صورة الغروب\" class=\"hero\"></div>"
        );
    }

    #[test]
    fn test_apply_rejects_length_mismatch() {
        let doc = parse_html("<p>One</p><p>Two</p>");
        let fragments = extract_fragments(&doc);

        let result = apply_translations(&fragments, &["Uno".to_string()]);
        assert!(matches!(result, Err(TranslationError::InternalError(_))));
    }

    #[test]
    fn test_serialize_without_changes_keeps_markup() {
        let source = "<!DOCTYPE html><html><head><title>T</title></head><body><p class=\"x\">   </p></body></html>";
        let doc = parse_html(source);
        assert!(extract_fragments(&doc).is_empty());

        assert!(!doc.is_fragment());
        assert_eq!(serialize_document(&doc).unwrap(), source);
    }

    #[test]
    fn test_fragment_serializes_without_wrappers() {
        for source in ["<p>Hi</p>", "<p>   </p>", "<li>One</li><li>Two</li>", "Plain text"] {
            let doc = parse_html(source);
            assert!(doc.is_fragment());
            assert_eq!(serialize_document(&doc).unwrap(), source);
        }
    }

    #[test]
    fn test_header_tag_does_not_mark_a_document() {
        let doc = parse_html("<header><h1>Site</h1></header>");
        assert!(doc.is_fragment());
        assert_eq!(
            serialize_document(&doc).unwrap(),
            "<header><h1>Site</h1></header>"
        );

        assert!(!parse_html("<BODY class=\"x\"><p>Hi</p></BODY>").is_fragment());
        assert!(!parse_html("<!doctype html><p>Hi</p>").is_fragment());
    }

    #[test]
    fn test_template_contents_are_extracted() {
        let doc = parse_html("<template><p>Hello</p><img alt=\"Logo\"></template><p>Out</p>");
        let fragments = extract_fragments(&doc);

        assert_eq!(originals(&fragments), vec!["Hello", "Logo", "Out"]);
        assert_eq!(element_name(&fragments[0].node), Some("p"));
        assert_eq!(fragments[1].kind, FragmentKind::Attribute("alt".to_string()));
    }

    #[test]
    fn test_template_contents_are_written_back() {
        let doc = parse_html("<template><p>Hello</p><img alt=\"Logo\"></template><p>Out</p>");
        let fragments = extract_fragments(&doc);
        let translations = vec!["مرحبا".to_string(), "شعار".to_string(), "خارج".to_string()];

        apply_translations(&fragments, &translations).unwrap();

        assert_eq!(
            serialize_document(&doc).unwrap(),
            "<template><p>مرحبا</p><img alt=\"شعار\"></template><p>خارج</p>"
        );
    }

    #[test]
    fn test_script_inside_template_is_skipped() {
        let doc = parse_html("<template><script>var t = 'x';</script><span>Label</span></template>");
        let fragments = extract_fragments(&doc);

        assert_eq!(originals(&fragments), vec!["Label"]);
        assert_eq!(
            serialize_document(&doc).unwrap(),
            "<template><script>var t = 'x';</script><span>Label</span></template>"
        );
    }

    struct Shouting;

    #[async_trait::async_trait]
    impl TextGenerator for Shouting {
        async fn generate(&self, prompt: &str) -> Result<String> {
            let start = prompt.find("Text:\n\"").map(|i| i + 7).unwrap_or(0);
            let end = prompt.rfind("\"\n\nTranslation:").unwrap_or(prompt.len());
            Ok(prompt[start..end].to_uppercase())
        }

        async fn ping(&self) -> Result<Vec<String>> {
            Ok(vec![])
        }
    }

    #[test]
    fn test_translate_document_keeps_structure() {
        let mut processor = HtmlProcessor::new(CachedTranslator::new(Shouting, "Arabic"));

        let report = tokio_test::block_on(
            processor.translate_document("<div><p>Hi</p><p>Bye</p></div>"),
        )
        .unwrap();

        assert_eq!(report.html, "<div><p>HI</p><p>BYE</p></div>");
        assert_eq!(report.fragments, 2);
        assert_eq!(report.fallbacks, 0);
    }

    #[test]
    fn test_is_html_file() {
        assert!(is_html_file(Path::new("index.html")));
        assert!(is_html_file(Path::new("INDEX.HTM")));
        assert!(!is_html_file(Path::new("notes.md")));
    }

    #[test]
    fn test_find_html_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("a.html"), "<p>a</p>").unwrap();
        std::fs::write(dir.path().join("nested/b.htm"), "<p>b</p>").unwrap();
        std::fs::write(dir.path().join("c.txt"), "c").unwrap();

        let files = find_html_files(dir.path()).unwrap();
        assert_eq!(files.len(), 2);
        assert!(files.iter().all(|f| is_html_file(f)));

        assert!(find_html_files(&dir.path().join("a.html")).is_err());
    }
}
