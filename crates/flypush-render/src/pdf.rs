//! # PDF Packaging
//!
//! Wraps composed label rasters into a multi-page PDF.
//!
//! Every page embeds its raster as an unscaled image XObject. The print
//! geometry rotates the landscape raster onto a portrait page through the
//! content matrix alone, so the pixels the printer receives are the exact
//! pixels the preview showed.

use image::RgbImage;
use lopdf::{dictionary, Document, Object, Stream};

use crate::error::{RenderError, RenderResult};
use flypush_core::formats::LabelFormat;

// =============================================================================
// Assembly
// =============================================================================

/// Builds a PDF from composed rasters.
///
/// `pages` pairs each raster with its copy count; each copy becomes its
/// own page referencing the shared image XObject. `for_print` selects the
/// portrait print geometry (rotated in the content matrix when the format
/// asks for it) over the landscape preview geometry.
pub fn build_pdf(
    pages: &[(RgbImage, u32)],
    format: &LabelFormat,
    for_print: bool,
) -> RenderResult<Vec<u8>> {
    if pages.is_empty() {
        return Err(RenderError::Pdf("no labels to render".to_string()));
    }

    let (page_w, page_h) = if for_print {
        format.print_page_pt()
    } else {
        format.preview_page_pt()
    };
    let rotate = for_print && format.rotate_for_print;

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let mut page_ids: Vec<Object> = Vec::new();
    for (index, (raster, copies)) in pages.iter().enumerate() {
        let image_name = format!("Im{}", index);

        let image_id = doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => raster.width() as i64,
                "Height" => raster.height() as i64,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
            },
            raster.as_raw().clone(),
        ));

        let resources_id = doc.add_object(dictionary! {
            "XObject" => dictionary! {
                image_name.as_str() => image_id,
            },
        });

        let content = if rotate {
            // Rotate the landscape raster a quarter turn onto the portrait
            // page: image width runs down the page, image height across it.
            format!(
                "q\n0 -{:.2} {:.2} 0 0 {:.2} cm\n/{} Do\nQ\n",
                page_h, page_w, page_h, image_name
            )
        } else {
            format!(
                "q\n{:.2} 0 0 {:.2} 0 0 cm\n/{} Do\nQ\n",
                page_w, page_h, image_name
            )
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));

        // Copies of a payload share the XObject and content stream
        for _ in 0..(*copies).max(1) {
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![
                    0.into(),
                    0.into(),
                    Object::Real(page_w as f32),
                    Object::Real(page_h as f32),
                ],
                "Resources" => resources_id,
                "Contents" => content_id,
            });
            page_ids.push(page_id.into());
        }
    }

    let page_count = page_ids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => page_ids,
            "Count" => page_count,
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    doc.compress();

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)?;

    tracing::debug!(
        pages = page_count,
        format = format.key,
        for_print,
        bytes = buffer.len(),
        "PDF assembled"
    );

    Ok(buffer)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use flypush_core::formats;

    fn sample_raster(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
        })
    }

    fn dymo() -> &'static LabelFormat {
        formats::lookup("dymo_11352").unwrap()
    }

    fn numeric(obj: &Object) -> f32 {
        match obj {
            Object::Integer(i) => *i as f32,
            Object::Real(r) => *r,
            other => panic!("not a number: {:?}", other),
        }
    }

    fn media_box(doc: &Document) -> (f32, f32) {
        let (_, page_id) = doc.get_pages().into_iter().next().unwrap();
        let page = doc.get_dictionary(page_id).unwrap();
        let media = page.get(b"MediaBox").unwrap().as_array().unwrap();
        (numeric(&media[2]), numeric(&media[3]))
    }

    #[test]
    fn test_rejects_empty_page_list() {
        assert!(build_pdf(&[], dymo(), true).is_err());
    }

    #[test]
    fn test_copies_expand_to_pages() {
        let pages = vec![(sample_raster(64, 32), 3), (sample_raster(64, 32), 2)];
        let bytes = build_pdf(&pages, dymo(), false).unwrap();

        let doc = Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 5);
    }

    #[test]
    fn test_preview_page_is_landscape() {
        let bytes = build_pdf(&[(sample_raster(64, 32), 1)], dymo(), false).unwrap();
        let doc = Document::load_mem(&bytes).unwrap();
        let (w, h) = media_box(&doc);
        assert!(w > h, "preview page must be landscape ({} x {})", w, h);
    }

    #[test]
    fn test_print_page_is_portrait_for_rotating_format() {
        let bytes = build_pdf(&[(sample_raster(64, 32), 1)], dymo(), true).unwrap();
        let doc = Document::load_mem(&bytes).unwrap();
        let (w, h) = media_box(&doc);
        assert!(w < h, "print page must be portrait ({} x {})", w, h);
    }

    #[test]
    fn test_print_embeds_raster_bit_exact() {
        // The pixels inside the print PDF must be the composed raster,
        // untouched: rotation happens in the content matrix, never by
        // resampling the image.
        let raster = sample_raster(120, 56);
        let bytes = build_pdf(&[(raster.clone(), 1)], dymo(), true).unwrap();

        let doc = Document::load_mem(&bytes).unwrap();
        let embedded = doc
            .objects
            .values()
            .find_map(|obj| match obj {
                Object::Stream(stream)
                    if matches!(
                        stream.dict.get(b"Subtype"),
                        Ok(Object::Name(name)) if name.as_slice() == b"Image".as_slice()
                    ) =>
                {
                    Some(stream.decompressed_content().unwrap())
                }
                _ => None,
            })
            .expect("PDF contains no image XObject");

        assert_eq!(&embedded, raster.as_raw());
    }

    #[test]
    fn test_preview_and_print_share_pixels() {
        let raster = sample_raster(100, 40);
        let extract = |bytes: &[u8]| {
            let doc = Document::load_mem(bytes).unwrap();
            doc.objects
                .values()
                .find_map(|obj| match obj {
                    Object::Stream(stream)
                        if matches!(
                            stream.dict.get(b"Subtype"),
                            Ok(Object::Name(name)) if name.as_slice() == b"Image".as_slice()
                        ) =>
                    {
                        Some(stream.decompressed_content().unwrap())
                    }
                    _ => None,
                })
                .unwrap()
        };

        let preview = build_pdf(&[(raster.clone(), 1)], dymo(), false).unwrap();
        let print = build_pdf(&[(raster, 1)], dymo(), true).unwrap();
        assert_eq!(extract(&preview), extract(&print));
    }
}
