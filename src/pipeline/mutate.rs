//! Slide mutation: place a downloaded image on its slide and save the deck.

use crate::config::ImagePlacement;
use crate::deck::picture::{insert_picture, remove_generated_pictures, NewPicture, GENERATED_MARKER};
use crate::deck::Deck;
use crate::error::{DeckError, SlideError};
use crate::output::GeneratedImage;
use std::path::Path;
use tracing::{debug, info};

/// Shape name for the generated picture on a slide (`slide_index` 0-based).
pub fn picture_name(slide_index: usize) -> String {
    format!("{GENERATED_MARKER}_slide_{}", slide_index + 1)
}

/// Replace the generated picture on one slide and persist the deck.
///
/// Any picture from an earlier run is removed first, so the slide ends up
/// with exactly one generated image. The edits are made on a copy of the
/// deck and only kept once the save to `output` succeeds; on error `deck`
/// is left as it was. Returns the picture's shape name.
pub async fn apply_image(
    deck: &mut Deck,
    image: &GeneratedImage,
    placement: &ImagePlacement,
    output: &Path,
) -> Result<String, SlideError> {
    let slide_index = image.slide_index;
    let insertion_err = |e: DeckError| SlideError::Insertion {
        slide: slide_index + 1,
        detail: e.to_string(),
    };

    let bytes = tokio::fs::read(&image.file_path)
        .await
        .map_err(|e| insertion_err(e.into()))?;

    let mut staged = deck.clone();
    let removed = remove_generated_pictures(&mut staged, slide_index).map_err(insertion_err)?;
    if removed > 0 {
        debug!("Slide {}: replaced {} earlier generated picture(s)", slide_index + 1, removed);
    }

    let (slide_width, slide_height) = staged.slide_size();
    let placement = placement.layout(slide_width, slide_height);
    let name = picture_name(slide_index);
    let inserted = insert_picture(
        &mut staged,
        slide_index,
        NewPicture {
            name: &name,
            bytes,
            extension: image.extension(),
            content_type: image.content_type(),
            placement,
        },
    )
    .map_err(insertion_err)?;
    debug!(
        "Slide {}: picture {} -> {} ({})",
        slide_index + 1,
        inserted.shape_id,
        inserted.media_part,
        inserted.rel_id
    );

    staged.save(output).map_err(insertion_err)?;
    *deck = staged;
    info!("Slide {}: image inserted, saved {}", slide_index + 1, output.display());
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deck::testing::{deck_bytes, text_shape};
    use image::ImageFormat;

    fn jpeg(dir: &Path) -> GeneratedImage {
        let img = image::RgbImage::from_pixel(8, 8, image::Rgb([10, 20, 30]));
        let path = dir.join("slide_1_image.jpg");
        img.save_with_format(&path, ImageFormat::Jpeg).unwrap();
        GeneratedImage {
            slide_index: 0,
            file_path: path,
            validated: true,
            format: ImageFormat::Jpeg,
        }
    }

    fn generated_count(deck: &Deck, slide: usize) -> usize {
        deck.shapes(slide)
            .unwrap()
            .iter()
            .filter(|s| s.name.contains(GENERATED_MARKER))
            .count()
    }

    #[test]
    fn picture_names_are_one_based() {
        assert_eq!(picture_name(0), "generated_image_slide_1");
        assert_eq!(picture_name(9), "generated_image_slide_10");
    }

    #[tokio::test]
    async fn rerun_leaves_exactly_one_generated_image() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.pptx");
        let bytes = deck_bytes(&[text_shape(2, "Title 1", Some("title"), &[("Messe", None)])]);
        let mut deck = Deck::from_bytes(&bytes).unwrap();
        let image = jpeg(dir.path());
        let placement = ImagePlacement::default();

        for _ in 0..3 {
            let name = apply_image(&mut deck, &image, &placement, &output).await.unwrap();
            assert_eq!(name, "generated_image_slide_1");
        }
        assert_eq!(generated_count(&deck, 0), 1);

        let saved = Deck::open(&output).unwrap();
        assert_eq!(generated_count(&saved, 0), 1);
        assert!(saved.part("ppt/media/generated_image_slide_1.jpg").is_some());
    }

    #[tokio::test]
    async fn failed_save_leaves_the_deck_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let bytes = deck_bytes(&[
            text_shape(2, "Title 1", Some("title"), &[("Messe", None)]),
            text_shape(2, "Title 1", Some("title"), &[("Gloria", None)]),
        ]);
        let mut deck = Deck::from_bytes(&bytes).unwrap();
        let placement = ImagePlacement::default();

        let unwritable = dir.path().join("missing").join("out.pptx");
        let err = apply_image(&mut deck, &jpeg(dir.path()), &placement, &unwritable)
            .await
            .unwrap_err();
        assert!(matches!(err, SlideError::Insertion { slide: 1, .. }));
        assert_eq!(generated_count(&deck, 0), 0);
        assert!(deck.part("ppt/media/generated_image_slide_1.jpg").is_none());

        let output = dir.path().join("out.pptx");
        let mut second = jpeg(dir.path());
        second.slide_index = 1;
        apply_image(&mut deck, &second, &placement, &output).await.unwrap();

        let saved = Deck::open(&output).unwrap();
        assert_eq!(generated_count(&saved, 0), 0);
        assert_eq!(generated_count(&saved, 1), 1);
        assert!(!dir.path().join("out.pptx.tmp").exists());
    }

    #[tokio::test]
    async fn missing_slide_is_an_insertion_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut deck = Deck::from_bytes(&deck_bytes(&[String::new()])).unwrap();
        let mut image = jpeg(dir.path());
        image.slide_index = 5;
        let err = apply_image(&mut deck, &image, &ImagePlacement::default(), &dir.path().join("o.pptx"))
            .await
            .unwrap_err();
        assert!(matches!(err, SlideError::Insertion { slide: 6, .. }));
    }
}
