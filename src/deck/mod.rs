//! Minimal PresentationML package access.
//!
//! A `.pptx` file is a zip archive of XML parts tied together by
//! relationship files. The pipeline needs very little of it: the slide list
//! in order, the slide size, the shapes on each slide, and the ability to
//! swap one picture per slide. [`Deck`] loads every part into memory, lets
//! the [`shapes`] and [`picture`] modules read and rewrite individual parts,
//! and writes the whole package back on [`Deck::save`].
//!
//! Parts keep their original archive order on save, so `[Content_Types].xml`
//! stays the first entry, where OPC readers look for it.

pub mod picture;
pub mod shapes;

use crate::error::DeckError;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::io::{Cursor, Read, Write};
use std::path::Path;
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

pub use shapes::{Paragraph, Shape, ShapeKind, TextRun};

const PRESENTATION_PART: &str = "ppt/presentation.xml";
const CONTENT_TYPES_PART: &str = "[Content_Types].xml";
const REL_TYPE_SLIDE_LAYOUT: &str = "/slideLayout";

/// Upper bound on the buffer reserved up front for one part.
const MAX_PREALLOC: usize = 16 * 1024 * 1024;

/// Slide size used when `<p:sldSz>` is absent (10in × 7.5in).
const DEFAULT_SLIDE_SIZE: (i64, i64) = (9_144_000, 6_858_000);

/// One file inside the package.
#[derive(Debug, Clone)]
struct Part {
    name: String,
    data: Vec<u8>,
}

/// A relationship entry from a `.rels` part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub id: String,
    pub rel_type: String,
    pub target: String,
    /// `TargetMode="External"` relationships point outside the package.
    pub external: bool,
}

/// An opened presentation package.
#[derive(Debug, Clone)]
pub struct Deck {
    parts: Vec<Part>,
    /// Slide part names in presentation order.
    slides: Vec<String>,
    slide_width: i64,
    slide_height: i64,
}

impl Deck {
    /// Read a `.pptx` file from disk.
    pub fn open(path: &Path) -> Result<Self, DeckError> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(&bytes)
    }

    /// Parse a `.pptx` package held in memory.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DeckError> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))?;
        let mut parts = Vec::with_capacity(archive.len());
        for i in 0..archive.len() {
            let mut file = archive.by_index(i)?;
            if file.is_dir() {
                continue;
            }
            // The declared size comes from the archive header; do not trust it blindly.
            let declared = usize::try_from(file.size()).unwrap_or(usize::MAX);
            let mut data = Vec::with_capacity(declared.min(MAX_PREALLOC));
            file.read_to_end(&mut data)?;
            parts.push(Part {
                name: file.name().to_string(),
                data,
            });
        }

        let mut deck = Self {
            parts,
            slides: Vec::new(),
            slide_width: DEFAULT_SLIDE_SIZE.0,
            slide_height: DEFAULT_SLIDE_SIZE.1,
        };
        deck.load_presentation()?;
        debug!(
            "Opened deck: {} parts, {} slides, {}x{} EMU",
            deck.parts.len(),
            deck.slides.len(),
            deck.slide_width,
            deck.slide_height
        );
        Ok(deck)
    }

    /// Number of slides in presentation order.
    pub fn slide_count(&self) -> usize {
        self.slides.len()
    }

    /// Slide width and height in EMU.
    pub fn slide_size(&self) -> (i64, i64) {
        (self.slide_width, self.slide_height)
    }

    /// Part name of the slide at `index`, e.g. `ppt/slides/slide3.xml`.
    pub fn slide_part(&self, index: usize) -> Result<&str, DeckError> {
        self.slides
            .get(index)
            .map(String::as_str)
            .ok_or(DeckError::SlideOutOfRange {
                index,
                total: self.slides.len(),
            })
    }

    /// Top-level shapes of the slide at `index`.
    pub fn shapes(&self, index: usize) -> Result<Vec<Shape>, DeckError> {
        let name = self.slide_part(index)?;
        let xml = self.require(name)?;
        shapes::parse_shapes(name, xml)
    }

    /// Name of the layout the slide at `index` is based on.
    pub fn layout_name(&self, index: usize) -> Result<Option<String>, DeckError> {
        let slide = self.slide_part(index)?;
        let rels = self.relationships(slide)?;
        let Some(layout) = rels
            .iter()
            .find(|r| !r.external && r.rel_type.ends_with(REL_TYPE_SLIDE_LAYOUT))
        else {
            return Ok(None);
        };
        let layout_part = resolve_target(slide, &layout.target);
        let Some(xml) = self.part(&layout_part) else {
            return Ok(None);
        };
        let csld = find_attribute(&layout_part, xml, b"cSld", b"name")?;
        Ok(csld.filter(|n| !n.is_empty()))
    }

    /// Raw bytes of a part, if present.
    pub fn part(&self, name: &str) -> Option<&[u8]> {
        self.parts
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.data.as_slice())
    }

    fn require(&self, name: &str) -> Result<&[u8], DeckError> {
        self.part(name)
            .ok_or_else(|| DeckError::MissingPart(name.to_string()))
    }

    /// Replace a part's bytes, appending it if it does not exist yet.
    pub fn set_part(&mut self, name: &str, data: Vec<u8>) {
        match self.parts.iter_mut().find(|p| p.name == name) {
            Some(part) => part.data = data,
            None => self.parts.push(Part {
                name: name.to_string(),
                data,
            }),
        }
    }

    /// Drop a part. Returns whether it existed.
    pub fn remove_part(&mut self, name: &str) -> bool {
        let before = self.parts.len();
        self.parts.retain(|p| p.name != name);
        self.parts.len() != before
    }

    /// Relationships of `part`; empty when it has no `.rels` file.
    pub fn relationships(&self, part: &str) -> Result<Vec<Relationship>, DeckError> {
        let rels_name = rels_part_name(part);
        match self.part(&rels_name) {
            Some(xml) => parse_relationships(&rels_name, xml),
            None => Ok(Vec::new()),
        }
    }

    /// Write the relationships of `part` back to its `.rels` file.
    pub fn set_relationships(&mut self, part: &str, rels: &[Relationship]) {
        let rels_name = rels_part_name(part);
        self.set_part(&rels_name, serialize_relationships(rels));
    }

    /// Write the package to `path`.
    ///
    /// The archive is written next to the destination first and renamed over
    /// it, so a crash mid-write never leaves a truncated deck behind.
    pub fn save(&self, path: &Path) -> Result<(), DeckError> {
        let tmp_path = path.with_extension("pptx.tmp");
        let written = self
            .write_archive(&tmp_path)
            .and_then(|()| std::fs::rename(&tmp_path, path).map_err(DeckError::from));
        if let Err(e) = written {
            if tmp_path.exists() {
                if let Err(rm) = std::fs::remove_file(&tmp_path) {
                    debug!("Could not remove {}: {}", tmp_path.display(), rm);
                }
            }
            return Err(e);
        }
        debug!("Saved deck to {}", path.display());
        Ok(())
    }

    fn write_archive(&self, path: &Path) -> Result<(), DeckError> {
        let file = std::fs::File::create(path)?;
        let mut zip = ZipWriter::new(std::io::BufWriter::new(file));
        for part in &self.parts {
            // Media is already compressed; deflating it again only costs time.
            let method = if part.name.starts_with("ppt/media/") {
                CompressionMethod::Stored
            } else {
                CompressionMethod::Deflated
            };
            let options = SimpleFileOptions::default().compression_method(method);
            zip.start_file(part.name.as_str(), options)?;
            zip.write_all(&part.data)?;
        }
        let mut inner = zip.finish()?;
        inner.flush()?;
        Ok(())
    }

    /// Make sure `[Content_Types].xml` declares a default for `extension`.
    pub fn ensure_content_type(&mut self, extension: &str, content_type: &str) -> Result<(), DeckError> {
        let xml = self.require(CONTENT_TYPES_PART)?;
        let mut reader = Reader::from_reader(xml);
        let mut close_at = None;
        loop {
            let before = reader.buffer_position() as usize;
            match reader.read_event() {
                Ok(Event::Empty(e)) | Ok(Event::Start(e)) if e.local_name().as_ref() == b"Default" => {
                    for attr in e.attributes().flatten() {
                        if attr.key.local_name().as_ref() == b"Extension"
                            && attr.value.eq_ignore_ascii_case(extension.as_bytes())
                        {
                            return Ok(());
                        }
                    }
                }
                Ok(Event::End(e)) if e.local_name().as_ref() == b"Types" => {
                    close_at = Some(before);
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(xml_error(CONTENT_TYPES_PART, e)),
                _ => {}
            }
        }
        let at = close_at.ok_or_else(|| DeckError::Xml {
            part: CONTENT_TYPES_PART.to_string(),
            detail: "missing </Types>".to_string(),
        })?;
        let entry = format!(
            r#"<Default Extension="{}" ContentType="{}"/>"#,
            escape(extension),
            escape(content_type)
        );
        let mut updated = Vec::with_capacity(xml.len() + entry.len());
        updated.extend_from_slice(&xml[..at]);
        updated.extend_from_slice(entry.as_bytes());
        updated.extend_from_slice(&xml[at..]);
        self.set_part(CONTENT_TYPES_PART, updated);
        Ok(())
    }

    /// Read slide order and slide size from `ppt/presentation.xml`.
    fn load_presentation(&mut self) -> Result<(), DeckError> {
        let xml = self.require(PRESENTATION_PART)?;
        let mut reader = Reader::from_reader(xml);
        let mut slide_ids = Vec::new();
        let mut size = None;
        loop {
            match reader.read_event() {
                Ok(Event::Empty(e)) | Ok(Event::Start(e)) => match e.local_name().as_ref() {
                    b"sldId" => {
                        // The relationship id is `r:id`; the bare `id` is the numeric slide id.
                        for attr in e.attributes().flatten() {
                            if attr.key.local_name().as_ref() == b"id" && attr.key.prefix().is_some() {
                                slide_ids.push(attr_string(PRESENTATION_PART, &attr.value)?);
                            }
                        }
                    }
                    b"sldSz" => {
                        let mut cx = None;
                        let mut cy = None;
                        for attr in e.attributes().flatten() {
                            let value = attr_string(PRESENTATION_PART, &attr.value)?;
                            match attr.key.as_ref() {
                                b"cx" => cx = value.parse::<i64>().ok(),
                                b"cy" => cy = value.parse::<i64>().ok(),
                                _ => {}
                            }
                        }
                        if let (Some(cx), Some(cy)) = (cx, cy) {
                            size = Some((cx, cy));
                        }
                    }
                    _ => {}
                },
                Ok(Event::Eof) => break,
                Err(e) => return Err(xml_error(PRESENTATION_PART, e)),
                _ => {}
            }
        }

        let rels = self.relationships(PRESENTATION_PART)?;
        let mut slides = Vec::with_capacity(slide_ids.len());
        for id in &slide_ids {
            let rel = rels
                .iter()
                .find(|r| &r.id == id)
                .ok_or_else(|| DeckError::MissingPart(format!("{PRESENTATION_PART} relationship {id}")))?;
            let name = resolve_target(PRESENTATION_PART, &rel.target);
            if self.part(&name).is_none() {
                return Err(DeckError::MissingPart(name));
            }
            slides.push(name);
        }

        self.slides = slides;
        if let Some((cx, cy)) = size {
            self.slide_width = cx;
            self.slide_height = cy;
        }
        Ok(())
    }
}

// ── Package helpers ──────────────────────────────────────────────────────

/// `ppt/slides/slide1.xml` → `ppt/slides/_rels/slide1.xml.rels`.
pub fn rels_part_name(part: &str) -> String {
    match part.rsplit_once('/') {
        Some((dir, file)) => format!("{dir}/_rels/{file}.rels"),
        None => format!("_rels/{part}.rels"),
    }
}

/// Resolve a relationship target against the part that owns it.
///
/// `("ppt/slides/slide1.xml", "../media/image1.png")` → `ppt/media/image1.png`.
pub fn resolve_target(source_part: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }
    let mut segments: Vec<&str> = match source_part.rsplit_once('/') {
        Some((dir, _)) => dir.split('/').collect(),
        None => Vec::new(),
    };
    for seg in target.split('/') {
        match seg {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    segments.join("/")
}

fn parse_relationships(part: &str, xml: &[u8]) -> Result<Vec<Relationship>, DeckError> {
    let mut reader = Reader::from_reader(xml);
    let mut rels = Vec::new();
    loop {
        match reader.read_event() {
            Ok(Event::Empty(e)) | Ok(Event::Start(e)) if e.local_name().as_ref() == b"Relationship" => {
                let mut rel = Relationship {
                    id: String::new(),
                    rel_type: String::new(),
                    target: String::new(),
                    external: false,
                };
                for attr in e.attributes().flatten() {
                    let value = attr_string(part, &attr.value)?;
                    match attr.key.as_ref() {
                        b"Id" => rel.id = value,
                        b"Type" => rel.rel_type = value,
                        b"Target" => rel.target = value,
                        b"TargetMode" => rel.external = value == "External",
                        _ => {}
                    }
                }
                rels.push(rel);
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_error(part, e)),
            _ => {}
        }
    }
    Ok(rels)
}

fn serialize_relationships(rels: &[Relationship]) -> Vec<u8> {
    let mut xml = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n\
         <Relationships xmlns=\"http://schemas.openxmlformats.org/package/2006/relationships\">",
    );
    for rel in rels {
        xml.push_str(&format!(
            r#"<Relationship Id="{}" Type="{}" Target="{}""#,
            escape(&rel.id),
            escape(&rel.rel_type),
            escape(&rel.target)
        ));
        if rel.external {
            xml.push_str(r#" TargetMode="External""#);
        }
        xml.push_str("/>");
    }
    xml.push_str("</Relationships>");
    xml.into_bytes()
}

/// First value of `attr` on the first `element` in the part.
fn find_attribute(part: &str, xml: &[u8], element: &[u8], attr_name: &[u8]) -> Result<Option<String>, DeckError> {
    let mut reader = Reader::from_reader(xml);
    loop {
        match reader.read_event() {
            Ok(Event::Empty(e)) | Ok(Event::Start(e)) if e.local_name().as_ref() == element => {
                for attr in e.attributes().flatten() {
                    if attr.key.local_name().as_ref() == attr_name {
                        return attr_string(part, &attr.value).map(Some);
                    }
                }
                return Ok(None);
            }
            Ok(Event::Eof) => return Ok(None),
            Err(e) => return Err(xml_error(part, e)),
            _ => {}
        }
    }
}

/// Decode an attribute value, resolving XML escapes.
pub(crate) fn attr_string(part: &str, raw: &[u8]) -> Result<String, DeckError> {
    let text = std::str::from_utf8(raw).map_err(|e| DeckError::Xml {
        part: part.to_string(),
        detail: e.to_string(),
    })?;
    quick_xml::escape::unescape(text)
        .map(|s| s.into_owned())
        .map_err(|e| DeckError::Xml {
            part: part.to_string(),
            detail: e.to_string(),
        })
}

pub(crate) fn escape(s: &str) -> std::borrow::Cow<'_, str> {
    quick_xml::escape::escape(s)
}

pub(crate) fn xml_error(part: &str, e: impl std::fmt::Display) -> DeckError {
    DeckError::Xml {
        part: part.to_string(),
        detail: e.to_string(),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Builders for tiny in-memory decks used across unit tests.

    use std::io::Write;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    pub const NS: &str = r#"xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main""#;

    /// Wrap shape XML in a full slide part.
    pub fn slide_xml(shapes: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><p:sld {NS}><p:cSld><p:spTree><p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr/>{shapes}</p:spTree></p:cSld></p:sld>"#
        )
    }

    /// A text shape; `ph` is the placeholder type, `runs` are (text, size in pt).
    pub fn text_shape(id: u32, name: &str, ph: Option<&str>, runs: &[(&str, Option<u32>)]) -> String {
        let nv_pr = match ph {
            Some(t) => format!(r#"<p:nvPr><p:ph type="{t}"/></p:nvPr>"#),
            None => "<p:nvPr/>".to_string(),
        };
        let runs: String = runs
            .iter()
            .map(|(text, size)| {
                let rpr = match size {
                    Some(pt) => format!(r#"<a:rPr lang="fr-FR" sz="{}"/>"#, pt * 100),
                    None => r#"<a:rPr lang="fr-FR"/>"#.to_string(),
                };
                format!("<a:r>{rpr}<a:t>{text}</a:t></a:r>")
            })
            .collect();
        format!(
            r#"<p:sp><p:nvSpPr><p:cNvPr id="{id}" name="{name}"/><p:cNvSpPr/>{nv_pr}</p:nvSpPr><p:spPr/><p:txBody><a:bodyPr/><a:lstStyle/><a:p>{runs}</a:p></p:txBody></p:sp>"#
        )
    }

    /// Build a deck whose slides carry the given shape XML.
    pub fn deck_bytes(slides: &[String]) -> Vec<u8> {
        let mut zip = ZipWriter::new(std::io::Cursor::new(Vec::new()));
        let mut put = |name: &str, data: &str| {
            zip.start_file(name, SimpleFileOptions::default()).unwrap();
            zip.write_all(data.as_bytes()).unwrap();
        };

        let mut overrides = String::new();
        let mut ids = String::new();
        let mut pres_rels = String::new();
        for i in 1..=slides.len() {
            overrides.push_str(&format!(
                r#"<Override PartName="/ppt/slides/slide{i}.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.slide+xml"/>"#
            ));
            ids.push_str(&format!(r#"<p:sldId id="{}" r:id="rId{}"/>"#, 255 + i, i + 1));
            pres_rels.push_str(&format!(
                r#"<Relationship Id="rId{}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide" Target="slides/slide{i}.xml"/>"#,
                i + 1
            ));
        }

        put(
            "[Content_Types].xml",
            &format!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="xml" ContentType="application/xml"/><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>{overrides}</Types>"#
            ),
        );
        put(
            "ppt/presentation.xml",
            &format!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><p:presentation {NS}><p:sldIdLst>{ids}</p:sldIdLst><p:sldSz cx="9144000" cy="6858000"/></p:presentation>"#
            ),
        );
        put(
            "ppt/_rels/presentation.xml.rels",
            &format!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">{pres_rels}</Relationships>"#
            ),
        );
        put(
            "ppt/slideLayouts/slideLayout1.xml",
            &format!(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><p:sldLayout {NS}><p:cSld name="Title and Content"><p:spTree/></p:cSld></p:sldLayout>"#),
        );
        for (i, shapes) in slides.iter().enumerate() {
            let n = i + 1;
            put(&format!("ppt/slides/slide{n}.xml"), &slide_xml(shapes));
            put(
                &format!("ppt/slides/_rels/slide{n}.xml.rels"),
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideLayout" Target="../slideLayouts/slideLayout1.xml"/></Relationships>"#,
            );
        }
        zip.finish().unwrap().into_inner()
    }
}
