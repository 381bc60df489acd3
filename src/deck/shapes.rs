//! Slide XML → shape model.
//!
//! Only what title detection needs is kept: each top-level shape of the
//! slide's `<p:spTree>` with its name, placeholder type, and the runs of its
//! text body with their explicit font sizes. Shapes nested in groups are
//! folded into their group and never carry text of their own.

use super::{attr_string, xml_error};
use crate::error::DeckError;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

/// Kind of a top-level shape-tree element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeKind {
    /// `p:sp`: autoshape, text box or placeholder.
    Shape,
    /// `p:pic`
    Picture,
    /// `p:graphicFrame`: table, chart, diagram.
    GraphicFrame,
    /// `p:grpSp`
    Group,
    /// `p:cxnSp`
    Connector,
    /// Anything else (`mc:AlternateContent`, `p:contentPart`, ...).
    Other,
}

impl ShapeKind {
    fn from_local_name(name: &[u8]) -> Self {
        match name {
            b"sp" => Self::Shape,
            b"pic" => Self::Picture,
            b"graphicFrame" => Self::GraphicFrame,
            b"grpSp" => Self::Group,
            b"cxnSp" => Self::Connector,
            _ => Self::Other,
        }
    }
}

/// A text run (`a:r` or `a:fld`) or a line break.
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub text: String,
    /// Explicit size from `a:rPr/@sz`, in points.
    pub size_pt: Option<f32>,
}

/// One `a:p` paragraph.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Paragraph {
    pub runs: Vec<TextRun>,
}

impl Paragraph {
    pub fn text(&self) -> String {
        self.runs.iter().map(|r| r.text.as_str()).collect()
    }
}

/// A top-level shape on a slide.
#[derive(Debug, Clone, PartialEq)]
pub struct Shape {
    /// `cNvPr/@id`, 0 when absent.
    pub id: u32,
    /// `cNvPr/@name`.
    pub name: String,
    pub kind: ShapeKind,
    /// `ph/@type`; a `p:ph` without a type is an `obj` placeholder.
    pub placeholder: Option<String>,
    /// Present only for `p:sp` shapes with a `p:txBody`.
    pub paragraphs: Option<Vec<Paragraph>>,
}

impl Shape {
    /// Whether the shape has a text frame at all (it may still be empty).
    pub fn has_text_frame(&self) -> bool {
        self.paragraphs.is_some()
    }

    /// Paragraph texts joined by newlines; empty without a text frame.
    pub fn text(&self) -> String {
        match &self.paragraphs {
            Some(paras) => paras
                .iter()
                .map(Paragraph::text)
                .collect::<Vec<_>>()
                .join("\n"),
            None => String::new(),
        }
    }

    /// All runs of all paragraphs.
    pub fn runs(&self) -> impl Iterator<Item = &TextRun> {
        self.paragraphs
            .iter()
            .flatten()
            .flat_map(|p| p.runs.iter())
    }

    pub fn placeholder_type(&self) -> Option<&str> {
        self.placeholder.as_deref()
    }
}

/// Partially parsed shape while its element is open.
struct ShapeBuilder {
    shape: Shape,
    /// Depth of the shape element itself.
    depth: usize,
    /// False for tree properties (`p:nvGrpSpPr`, `p:grpSpPr`, `p:extLst`),
    /// which are walked but not reported.
    keep: bool,
    in_text_body: bool,
    in_text: bool,
}

/// Parse the top-level shapes of a slide part.
pub fn parse_shapes(part: &str, xml: &[u8]) -> Result<Vec<Shape>, DeckError> {
    let mut reader = Reader::from_reader(xml);
    let mut shapes = Vec::new();
    let mut depth = 0usize;
    // Depth of `p:spTree`; its direct children are the shapes.
    let mut tree_depth: Option<usize> = None;
    let mut current: Option<ShapeBuilder> = None;

    loop {
        let event = reader.read_event().map_err(|e| xml_error(part, e))?;
        match event {
            Event::Start(e) => {
                depth += 1;
                if let Some(b) = current.as_mut() {
                    b.open(part, &e, depth)?;
                } else if let Some(td) = tree_depth {
                    if depth == td + 1 {
                        current = Some(ShapeBuilder::new(e.local_name().as_ref(), depth));
                    }
                } else if e.local_name().as_ref() == b"spTree" {
                    tree_depth = Some(depth);
                }
            }
            Event::Empty(e) => {
                if let Some(b) = current.as_mut() {
                    b.empty(part, &e, depth + 1)?;
                }
            }
            Event::Text(t) => {
                if let Some(b) = current.as_mut().filter(|b| b.in_text) {
                    let text = t.unescape().map_err(|e| xml_error(part, e))?;
                    b.push_text(&text);
                }
            }
            Event::CData(t) => {
                if let Some(b) = current.as_mut().filter(|b| b.in_text) {
                    b.push_text(&String::from_utf8_lossy(&t));
                }
            }
            Event::End(e) => {
                let closes_shape = current.as_ref().is_some_and(|b| b.depth == depth);
                if closes_shape {
                    if let Some(done) = current.take().filter(|b| b.keep) {
                        shapes.push(done.shape);
                    }
                } else if let Some(b) = current.as_mut() {
                    b.close(e.local_name().as_ref());
                } else if tree_depth == Some(depth) {
                    tree_depth = None;
                }
                depth = depth.saturating_sub(1);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(shapes)
}

impl ShapeBuilder {
    fn new(element: &[u8], depth: usize) -> Self {
        let keep = !matches!(element, b"nvGrpSpPr" | b"grpSpPr" | b"extLst");
        Self {
            shape: Shape {
                id: 0,
                name: String::new(),
                kind: ShapeKind::from_local_name(element),
                placeholder: None,
                paragraphs: None,
            },
            depth,
            keep,
            in_text_body: false,
            in_text: false,
        }
    }

    /// Only the `p:sp` text body is read; groups keep their nested text to
    /// themselves.
    fn reads_text(&self) -> bool {
        self.shape.kind == ShapeKind::Shape
    }

    fn open(&mut self, part: &str, e: &BytesStart<'_>, depth: usize) -> Result<(), DeckError> {
        match e.local_name().as_ref() {
            b"txBody" if self.reads_text() && depth == self.depth + 1 => {
                self.in_text_body = true;
                self.shape.paragraphs.get_or_insert_with(Vec::new);
            }
            b"p" if self.in_text_body => self.paragraphs_mut().push(Paragraph::default()),
            b"r" | b"fld" if self.in_text_body => self.start_run(),
            b"t" if self.in_text_body => self.in_text = true,
            _ => self.empty(part, e, depth)?,
        }
        Ok(())
    }

    /// Handle attributes of an element, whether it is empty or not.
    fn empty(&mut self, part: &str, e: &BytesStart<'_>, depth: usize) -> Result<(), DeckError> {
        match e.local_name().as_ref() {
            // The shape's own cNvPr sits two levels below it (nvSpPr/cNvPr).
            b"cNvPr" if depth == self.depth + 2 => {
                for attr in e.attributes().flatten() {
                    match attr.key.as_ref() {
                        b"name" => self.shape.name = attr_string(part, &attr.value)?,
                        b"id" => self.shape.id = attr_string(part, &attr.value)?.parse().unwrap_or(0),
                        _ => {}
                    }
                }
            }
            b"ph" if depth == self.depth + 3 && self.shape.placeholder.is_none() => {
                let mut ph_type = "obj".to_string();
                for attr in e.attributes().flatten() {
                    if attr.key.as_ref() == b"type" {
                        ph_type = attr_string(part, &attr.value)?;
                    }
                }
                self.shape.placeholder = Some(ph_type);
            }
            b"rPr" if self.in_text_body => {
                for attr in e.attributes().flatten() {
                    if attr.key.as_ref() == b"sz" {
                        let size = attr_string(part, &attr.value)?
                            .parse::<f32>()
                            .ok()
                            .map(|hundredths| hundredths / 100.0);
                        if let Some(run) = self.paragraphs_mut().last_mut().and_then(|p| p.runs.last_mut()) {
                            run.size_pt = size;
                        }
                    }
                }
            }
            b"br" if self.in_text_body => {
                self.start_run();
                self.push_text("\n");
            }
            // An empty <a:p/> is still a paragraph; an empty <a:r/> is a run.
            b"p" if self.in_text_body => self.paragraphs_mut().push(Paragraph::default()),
            b"r" | b"fld" if self.in_text_body => self.start_run(),
            b"txBody" if self.reads_text() && depth == self.depth + 1 => {
                self.shape.paragraphs.get_or_insert_with(Vec::new);
            }
            _ => {}
        }
        Ok(())
    }

    fn close(&mut self, name: &[u8]) {
        match name {
            b"t" => self.in_text = false,
            b"txBody" => {
                self.in_text_body = false;
                self.in_text = false;
            }
            _ => {}
        }
    }

    fn paragraphs_mut(&mut self) -> &mut Vec<Paragraph> {
        self.shape.paragraphs.get_or_insert_with(Vec::new)
    }

    fn start_run(&mut self) {
        let paras = self.paragraphs_mut();
        if paras.is_empty() {
            paras.push(Paragraph::default());
        }
        if let Some(p) = paras.last_mut() {
            p.runs.push(TextRun {
                text: String::new(),
                size_pt: None,
            });
        }
    }

    fn push_text(&mut self, text: &str) {
        let paras = self.paragraphs_mut();
        if let Some(run) = paras.last_mut().and_then(|p| p.runs.last_mut()) {
            run.text.push_str(text);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{slide_xml, text_shape};
    use super::*;

    fn parse(shapes: &str) -> Vec<Shape> {
        parse_shapes("slide.xml", slide_xml(shapes).as_bytes()).unwrap()
    }

    #[test]
    fn reads_name_placeholder_and_runs() {
        let shapes = parse(&text_shape(
            2,
            "Title 1",
            Some("title"),
            &[("Messe ", Some(44)), ("du dimanche", None)],
        ));
        assert_eq!(shapes.len(), 1);
        let s = &shapes[0];
        assert_eq!(s.id, 2);
        assert_eq!(s.name, "Title 1");
        assert_eq!(s.kind, ShapeKind::Shape);
        assert_eq!(s.placeholder_type(), Some("title"));
        assert_eq!(s.text(), "Messe du dimanche");
        let sizes: Vec<_> = s.runs().map(|r| r.size_pt).collect();
        assert_eq!(sizes, vec![Some(44.0), None]);
    }

    #[test]
    fn placeholder_without_type_is_obj() {
        let xml = r#"<p:sp><p:nvSpPr><p:cNvPr id="3" name="Content"/><p:cNvSpPr/><p:nvPr><p:ph idx="1"/></p:nvPr></p:nvSpPr><p:spPr/><p:txBody><a:bodyPr/><a:p><a:r><a:t>Corps</a:t></a:r></a:p></p:txBody></p:sp>"#;
        let shapes = parse(xml);
        assert_eq!(shapes[0].placeholder_type(), Some("obj"));
    }

    #[test]
    fn paragraphs_join_with_newline_and_entities_decode() {
        let xml = r#"<p:sp><p:nvSpPr><p:cNvPr id="4" name="Text"/><p:cNvSpPr/><p:nvPr/></p:nvSpPr><p:spPr/><p:txBody><a:bodyPr/><a:p><a:r><a:t>Pain &amp; vin</a:t></a:r></a:p><a:p><a:r><a:t>Ligne</a:t></a:r><a:br/><a:r><a:t>deux</a:t></a:r></a:p><a:p/></p:txBody></p:sp>"#;
        let shapes = parse(xml);
        assert_eq!(shapes[0].text(), "Pain & vin\nLigne\ndeux\n");
    }

    #[test]
    fn picture_has_no_text_frame() {
        let xml = r#"<p:pic><p:nvPicPr><p:cNvPr id="5" name="generated_image_slide_1"/><p:cNvPicPr/><p:nvPr/></p:nvPicPr><p:blipFill><a:blip r:embed="rId2"/></p:blipFill><p:spPr/></p:pic>"#;
        let shapes = parse(xml);
        assert_eq!(shapes.len(), 1);
        assert_eq!(shapes[0].kind, ShapeKind::Picture);
        assert_eq!(shapes[0].name, "generated_image_slide_1");
        assert!(!shapes[0].has_text_frame());
    }

    #[test]
    fn group_children_are_not_top_level() {
        let inner = text_shape(7, "Inner", None, &[("Caché", Some(40))]);
        let xml = format!(
            r#"<p:grpSp><p:nvGrpSpPr><p:cNvPr id="6" name="Group 1"/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr/>{inner}</p:grpSp>"#
        );
        let shapes = parse(&xml);
        assert_eq!(shapes.len(), 1);
        assert_eq!(shapes[0].kind, ShapeKind::Group);
        assert_eq!(shapes[0].name, "Group 1");
        assert_eq!(shapes[0].id, 6);
        assert!(!shapes[0].has_text_frame());
    }

    #[test]
    fn malformed_xml_is_an_error() {
        let err = parse_shapes("ppt/slides/slide1.xml", b"<p:sld><p:cSld></p:sld>").unwrap_err();
        assert!(matches!(err, DeckError::Xml { .. }));
    }
}
