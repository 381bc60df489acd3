//! Picture removal and insertion on a slide.
//!
//! Slide XML is edited by splicing byte ranges found with the pull parser,
//! so everything we do not touch is written back exactly as it was read.

use super::{escape, resolve_target, xml_error, Deck, Relationship};
use crate::config::ImageBox;
use crate::error::DeckError;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::debug;

/// Substring that tags pictures this tool inserted.
pub const GENERATED_MARKER: &str = "generated_image";

const REL_TYPE_IMAGE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";
const NS_DRAWINGML: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
const NS_RELATIONSHIPS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

/// Everything needed to put one image on a slide.
#[derive(Debug, Clone)]
pub struct NewPicture<'a> {
    /// Shape name, also the media file stem (`generated_image_slide_3`).
    pub name: &'a str,
    pub bytes: Vec<u8>,
    /// Media extension without the dot.
    pub extension: &'a str,
    pub content_type: &'a str,
    pub placement: ImageBox,
}

/// What [`insert_picture`] added.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertedPicture {
    pub shape_id: u32,
    pub rel_id: String,
    pub media_part: String,
}

/// A top-level `p:pic` found in a slide's shape tree.
struct PicSpan {
    start: usize,
    end: usize,
    name: String,
    embed: Option<String>,
}

/// Remove every top-level picture whose name contains [`GENERATED_MARKER`].
///
/// Relationships those pictures used are dropped once nothing else on the
/// slide refers to them, along with tagged media parts. Returns the number
/// of pictures removed.
pub fn remove_generated_pictures(deck: &mut Deck, slide_index: usize) -> Result<usize, DeckError> {
    let slide = deck.slide_part(slide_index)?.to_string();
    let xml = deck.require(&slide)?;
    let spans: Vec<PicSpan> = top_level_pictures(&slide, xml)?
        .into_iter()
        .filter(|p| p.name.contains(GENERATED_MARKER))
        .collect();
    if spans.is_empty() {
        return Ok(0);
    }

    let mut updated = Vec::with_capacity(xml.len());
    let mut cursor = 0;
    for span in &spans {
        updated.extend_from_slice(&xml[cursor..span.start]);
        cursor = span.end;
    }
    updated.extend_from_slice(&xml[cursor..]);

    let mut rels = deck.relationships(&slide)?;
    let mut dropped_media = Vec::new();
    for id in spans.iter().filter_map(|s| s.embed.as_deref()) {
        let quoted = format!("\"{id}\"");
        if contains(&updated, quoted.as_bytes()) {
            continue;
        }
        if let Some(pos) = rels.iter().position(|r| r.id == id) {
            let rel = rels.remove(pos);
            if !rel.external {
                let media = resolve_target(&slide, &rel.target);
                if media.rsplit('/').next().is_some_and(|f| f.contains(GENERATED_MARKER)) {
                    dropped_media.push(media);
                }
            }
        }
    }

    deck.set_part(&slide, updated);
    deck.set_relationships(&slide, &rels);
    for media in dropped_media {
        deck.remove_part(&media);
        debug!("Removed media part {}", media);
    }
    debug!("Removed {} generated picture(s) from {}", spans.len(), slide);
    Ok(spans.len())
}

/// Add `picture` to the slide at `slide_index`.
///
/// Writes the media part, registers a relationship and a content type, and
/// appends a `p:pic` at the end of the shape tree so it draws on top.
pub fn insert_picture(
    deck: &mut Deck,
    slide_index: usize,
    picture: NewPicture<'_>,
) -> Result<InsertedPicture, DeckError> {
    let slide = deck.slide_part(slide_index)?.to_string();
    let xml = deck.require(&slide)?;
    let scan = scan_shape_tree(&slide, xml)?;
    let close_at = scan.tree_close.ok_or_else(|| DeckError::Xml {
        part: slide.clone(),
        detail: "slide has no shape tree".to_string(),
    })?;

    let mut rels = deck.relationships(&slide)?;
    let rel_id = next_rel_id(&rels);
    let media_part = format!("ppt/media/{}.{}", picture.name, picture.extension);
    rels.push(Relationship {
        id: rel_id.clone(),
        rel_type: REL_TYPE_IMAGE.to_string(),
        target: relative_target(&slide, &media_part),
        external: false,
    });

    let shape_id = scan.max_shape_id + 1;
    let pic = picture_xml(&scan.prefix, shape_id, picture.name, &rel_id, &picture.placement);
    let mut updated = Vec::with_capacity(xml.len() + pic.len());
    updated.extend_from_slice(&xml[..close_at]);
    updated.extend_from_slice(pic.as_bytes());
    updated.extend_from_slice(&xml[close_at..]);

    deck.ensure_content_type(picture.extension, picture.content_type)?;
    deck.set_part(&media_part, picture.bytes);
    deck.set_relationships(&slide, &rels);
    deck.set_part(&slide, updated);
    debug!(
        "Inserted picture '{}' (id {}, {}) on {}",
        picture.name, shape_id, rel_id, slide
    );

    Ok(InsertedPicture {
        shape_id,
        rel_id,
        media_part,
    })
}

fn top_level_pictures(part: &str, xml: &[u8]) -> Result<Vec<PicSpan>, DeckError> {
    let mut reader = Reader::from_reader(xml);
    let mut pictures = Vec::new();
    let mut depth = 0usize;
    let mut tree_depth = None;
    let mut open: Option<PicSpan> = None;
    let mut pic_depth = 0usize;

    loop {
        let before = reader.buffer_position() as usize;
        match reader.read_event().map_err(|e| xml_error(part, e))? {
            Event::Start(e) => {
                depth += 1;
                let name = e.local_name();
                match (name.as_ref(), tree_depth) {
                    (b"spTree", None) => tree_depth = Some(depth),
                    (b"pic", Some(td)) if depth == td + 1 => {
                        pic_depth = depth;
                        open = Some(PicSpan {
                            start: before,
                            end: before,
                            name: String::new(),
                            embed: None,
                        });
                    }
                    _ => {
                        // Re-saved decks give cNvPr and blip children (extLst).
                        if let Some(pic) = open.as_mut() {
                            read_pic_element(part, pic, &e, depth == pic_depth + 2)?;
                        }
                    }
                }
            }
            Event::Empty(e) => {
                if let Some(pic) = open.as_mut() {
                    read_pic_element(part, pic, &e, depth == pic_depth + 1)?;
                }
            }
            Event::End(_) => {
                if depth == pic_depth {
                    if let Some(mut pic) = open.take() {
                        pic.end = reader.buffer_position() as usize;
                        pictures.push(pic);
                    }
                    pic_depth = 0;
                } else if tree_depth == Some(depth) {
                    tree_depth = None;
                }
                depth = depth.saturating_sub(1);
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(pictures)
}

/// Pick the shape name and blip embed out of an element inside a picture.
///
/// `in_nv_props` is true when the element sits directly under `p:nvPicPr`.
fn read_pic_element(
    part: &str,
    pic: &mut PicSpan,
    e: &BytesStart<'_>,
    in_nv_props: bool,
) -> Result<(), DeckError> {
    match e.local_name().as_ref() {
        b"cNvPr" if in_nv_props => {
            for attr in e.attributes().flatten() {
                if attr.key.as_ref() == b"name" {
                    pic.name = super::attr_string(part, &attr.value)?;
                }
            }
        }
        b"blip" if pic.embed.is_none() => {
            for attr in e.attributes().flatten() {
                if attr.key.local_name().as_ref() == b"embed" {
                    pic.embed = Some(super::attr_string(part, &attr.value)?);
                }
            }
        }
        _ => {}
    }
    Ok(())
}

struct TreeScan {
    /// Byte offset of the shape tree's closing tag.
    tree_close: Option<usize>,
    /// Highest `cNvPr/@id` on the slide.
    max_shape_id: u32,
    /// Namespace prefix used for PresentationML elements (`p`).
    prefix: String,
}

fn scan_shape_tree(part: &str, xml: &[u8]) -> Result<TreeScan, DeckError> {
    let mut reader = Reader::from_reader(xml);
    let mut scan = TreeScan {
        tree_close: None,
        max_shape_id: 0,
        prefix: "p".to_string(),
    };
    loop {
        let before = reader.buffer_position() as usize;
        match reader.read_event().map_err(|e| xml_error(part, e))? {
            Event::Start(e) | Event::Empty(e) => match e.local_name().as_ref() {
                b"cNvPr" => {
                    for attr in e.attributes().flatten() {
                        if attr.key.as_ref() == b"id" {
                            let id = super::attr_string(part, &attr.value)?.parse::<u32>().unwrap_or(0);
                            scan.max_shape_id = scan.max_shape_id.max(id);
                        }
                    }
                }
                b"spTree" => {
                    scan.prefix = e
                        .name()
                        .prefix()
                        .map(|p| String::from_utf8_lossy(p.as_ref()).into_owned())
                        .unwrap_or_default();
                }
                _ => {}
            },
            Event::End(e) if e.local_name().as_ref() == b"spTree" && scan.tree_close.is_none() => {
                scan.tree_close = Some(before);
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(scan)
}

/// `rId<N>` one past the highest numeric relationship id.
fn next_rel_id(rels: &[Relationship]) -> String {
    let max = rels
        .iter()
        .filter_map(|r| r.id.strip_prefix("rId")?.parse::<u32>().ok())
        .max()
        .unwrap_or(0);
    format!("rId{}", max + 1)
}

/// Relative target from `source_part` to `target_part`, both package paths.
fn relative_target(source_part: &str, target_part: &str) -> String {
    let source_dir: Vec<&str> = match source_part.rsplit_once('/') {
        Some((dir, _)) => dir.split('/').collect(),
        None => Vec::new(),
    };
    let target: Vec<&str> = target_part.split('/').collect();
    let common = source_dir
        .iter()
        .zip(&target)
        .take_while(|(a, b)| a == b)
        .count();
    let mut out: Vec<&str> = vec![".."; source_dir.len() - common];
    out.extend_from_slice(&target[common..]);
    out.join("/")
}

fn picture_xml(prefix: &str, id: u32, name: &str, rel_id: &str, b: &ImageBox) -> String {
    let p = if prefix.is_empty() {
        String::new()
    } else {
        format!("{prefix}:")
    };
    let name = escape(name);
    format!(
        concat!(
            r#"<{p}pic xmlns:a="{a}" xmlns:r="{r}">"#,
            r#"<{p}nvPicPr><{p}cNvPr id="{id}" name="{name}"/>"#,
            r#"<{p}cNvPicPr><a:picLocks noChangeAspect="1"/></{p}cNvPicPr><{p}nvPr/></{p}nvPicPr>"#,
            r#"<{p}blipFill><a:blip r:embed="{rel}"/><a:stretch><a:fillRect/></a:stretch></{p}blipFill>"#,
            r#"<{p}spPr><a:xfrm><a:off x="{x}" y="{y}"/><a:ext cx="{cx}" cy="{cy}"/></a:xfrm>"#,
            r#"<a:prstGeom prst="rect"><a:avLst/></a:prstGeom></{p}spPr>"#,
            r#"</{p}pic>"#
        ),
        p = p,
        a = NS_DRAWINGML,
        r = NS_RELATIONSHIPS,
        id = id,
        name = name,
        rel = escape(rel_id),
        x = b.left,
        y = b.top,
        cx = b.width,
        cy = b.height,
    )
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::super::testing::{deck_bytes, text_shape};
    use super::*;
    use crate::deck::ShapeKind;

    fn image_box() -> ImageBox {
        ImageBox {
            left: 5_029_200,
            top: 2_057_400,
            width: 3_657_600,
            height: 2_743_200,
        }
    }

    fn new_picture(name: &str) -> NewPicture<'_> {
        NewPicture {
            name,
            bytes: vec![0xFF, 0xD8, 0xFF],
            extension: "jpg",
            content_type: "image/jpeg",
            placement: image_box(),
        }
    }

    fn deck() -> Deck {
        let title = text_shape(2, "Title 1", Some("title"), &[("Messe", None)]);
        Deck::from_bytes(&deck_bytes(&[title])).unwrap()
    }

    #[test]
    fn relative_targets() {
        assert_eq!(
            relative_target("ppt/slides/slide1.xml", "ppt/media/x.png"),
            "../media/x.png"
        );
        assert_eq!(relative_target("ppt/presentation.xml", "ppt/media/x.png"), "media/x.png");
    }

    #[test]
    fn next_rel_id_skips_used_ids() {
        let rel = |id: &str| Relationship {
            id: id.into(),
            rel_type: String::new(),
            target: String::new(),
            external: false,
        };
        assert_eq!(next_rel_id(&[]), "rId1");
        assert_eq!(next_rel_id(&[rel("rId1"), rel("rId7"), rel("custom")]), "rId8");
    }

    #[test]
    fn insert_adds_picture_media_and_relationship() {
        let mut deck = deck();
        let inserted = insert_picture(&mut deck, 0, new_picture("generated_image_slide_1")).unwrap();
        assert_eq!(inserted.shape_id, 3);
        assert_eq!(inserted.rel_id, "rId2");
        assert_eq!(inserted.media_part, "ppt/media/generated_image_slide_1.jpg");

        let shapes = deck.shapes(0).unwrap();
        assert_eq!(shapes.len(), 2);
        assert_eq!(shapes[1].kind, ShapeKind::Picture);
        assert_eq!(shapes[1].name, "generated_image_slide_1");

        let rels = deck.relationships("ppt/slides/slide1.xml").unwrap();
        let image = rels.iter().find(|r| r.id == "rId2").unwrap();
        assert_eq!(image.target, "../media/generated_image_slide_1.jpg");
        assert!(deck.part("ppt/media/generated_image_slide_1.jpg").is_some());

        let types = std::str::from_utf8(deck.part("[Content_Types].xml").unwrap()).unwrap();
        assert!(types.contains(r#"Extension="jpg""#));

        let slide = std::str::from_utf8(deck.part("ppt/slides/slide1.xml").unwrap()).unwrap();
        assert!(slide.contains(r#"<a:off x="5029200" y="2057400"/>"#));
        assert!(slide.contains(r#"<a:ext cx="3657600" cy="2743200"/>"#));
    }

    #[test]
    fn remove_then_insert_keeps_a_single_generated_picture() {
        let mut deck = deck();
        insert_picture(&mut deck, 0, new_picture("generated_image_slide_1")).unwrap();
        for _ in 0..2 {
            remove_generated_pictures(&mut deck, 0).unwrap();
            insert_picture(&mut deck, 0, new_picture("generated_image_slide_1")).unwrap();
        }
        let generated = deck
            .shapes(0)
            .unwrap()
            .into_iter()
            .filter(|s| s.name.contains(GENERATED_MARKER))
            .count();
        assert_eq!(generated, 1);
        let rels = deck.relationships("ppt/slides/slide1.xml").unwrap();
        assert_eq!(rels.len(), 2, "{rels:?}");
    }

    #[test]
    fn removal_drops_relationship_and_media() {
        let mut deck = deck();
        insert_picture(&mut deck, 0, new_picture("generated_image_slide_1")).unwrap();
        let removed = remove_generated_pictures(&mut deck, 0).unwrap();
        assert_eq!(removed, 1);
        assert!(deck.part("ppt/media/generated_image_slide_1.jpg").is_none());
        let rels = deck.relationships("ppt/slides/slide1.xml").unwrap();
        assert!(rels.iter().all(|r| r.rel_type != REL_TYPE_IMAGE));
        let shapes = deck.shapes(0).unwrap();
        assert_eq!(shapes.len(), 1);
        assert_eq!(shapes[0].name, "Title 1");
    }

    #[test]
    fn removal_leaves_other_pictures_alone() {
        let logo = r#"<p:pic><p:nvPicPr><p:cNvPr id="9" name="Logo"/><p:cNvPicPr/><p:nvPr/></p:nvPicPr><p:blipFill><a:blip r:embed="rId1"/></p:blipFill><p:spPr/></p:pic>"#;
        let mut deck = Deck::from_bytes(&deck_bytes(&[logo.to_string()])).unwrap();
        assert_eq!(remove_generated_pictures(&mut deck, 0).unwrap(), 0);
        assert_eq!(deck.shapes(0).unwrap()[0].name, "Logo");
    }

    #[test]
    fn removal_finds_pictures_resaved_with_extension_lists() {
        let resaved = concat!(
            r#"<p:pic><p:nvPicPr><p:cNvPr id="4" name="generated_image_slide_1">"#,
            r#"<a:extLst><a:ext uri="{FF2B5EF4-FFF2-40B4-BE49-F238E27FC236}"/></a:extLst></p:cNvPr>"#,
            r#"<p:cNvPicPr><a:picLocks noChangeAspect="1"/></p:cNvPicPr><p:nvPr/></p:nvPicPr>"#,
            r#"<p:blipFill><a:blip r:embed="rId5"><a:extLst><a:ext uri="{28A0092B-C50C-407E-A947-70E740481C1C}"/></a:extLst></a:blip>"#,
            r#"<a:stretch><a:fillRect/></a:stretch></p:blipFill><p:spPr/></p:pic>"#
        );
        let mut deck = Deck::from_bytes(&deck_bytes(&[resaved.to_string()])).unwrap();
        assert_eq!(remove_generated_pictures(&mut deck, 0).unwrap(), 1);
        insert_picture(&mut deck, 0, new_picture("generated_image_slide_1")).unwrap();

        let generated = deck
            .shapes(0)
            .unwrap()
            .into_iter()
            .filter(|s| s.name.contains(GENERATED_MARKER))
            .count();
        assert_eq!(generated, 1);
        let slide = std::str::from_utf8(deck.part("ppt/slides/slide1.xml").unwrap()).unwrap();
        assert!(!slide.contains("rId5"));
    }

    #[test]
    fn out_of_range_slide_is_an_error() {
        let mut deck = deck();
        assert!(matches!(
            insert_picture(&mut deck, 4, new_picture("generated_image_slide_5")),
            Err(DeckError::SlideOutOfRange { index: 4, total: 1 })
        ));
    }
}
