//! Minimal PDF generation for extractor tests
//!
//! Text documents use the standard Courier font so no font program has to be
//! embedded. Image-only documents carry a page whose content stream only
//! paints a rectangle, so no text can be extracted.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};

/// A one-or-more page PDF with one text line per entry of `pages`
pub fn text_pdf(pages: &[&[&str]]) -> Vec<u8> {
    build_text_pdf("Font", pages)
}

/// A text page whose font resource is not typed `/Font`
///
/// The file opens cleanly; lopdf trips an assertion (a panic in debug
/// builds) while decoding its text.
pub fn mislabeled_font_pdf(lines: &[&str]) -> Vec<u8> {
    build_text_pdf("FontDescriptor", &[lines])
}

fn build_text_pdf(font_type: &str, pages: &[&[&str]]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(dictionary! {
        "Type" => font_type,
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => font_id,
        },
    });

    let mut kids = Vec::new();
    for lines in pages {
        let mut operations = Vec::new();
        for (row, line) in lines.iter().enumerate() {
            operations.push(Operation::new("BT", vec![]));
            operations.push(Operation::new("Tf", vec!["F1".into(), 11.into()]));
            operations.push(Operation::new(
                "Td",
                vec![40.into(), (780 - 16 * row as i64).into()],
            ));
            // trailing blank keeps words of adjacent lines apart in extracted text
            operations.push(Operation::new("Tj", vec![Object::string_literal(format!("{} ", line))]));
            operations.push(Operation::new("ET", vec![]));
        }
        kids.push(add_page(&mut doc, pages_id, Some(resources_id), Content { operations }));
    }

    finish(doc, pages_id, kids)
}

/// A single-page receipt carrying `identifier` and the given period phrase
pub fn receipt_pdf(identifier: &str, period_line: &str) -> Vec<u8> {
    let rfc_line = format!("RFC: {}", identifier);
    text_pdf(&[&["RECIBO DE NOMINA", rfc_line.as_str(), period_line]])
}

/// A PDF with drawing operations only
pub fn image_only_pdf() -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let content = Content {
        operations: vec![
            Operation::new("q", vec![]),
            Operation::new("re", vec![50.into(), 50.into(), 200.into(), 300.into()]),
            Operation::new("f", vec![]),
            Operation::new("Q", vec![]),
        ],
    };
    let page_id = add_page(&mut doc, pages_id, None, content);
    finish(doc, pages_id, vec![page_id])
}

fn add_page(
    doc: &mut Document,
    pages_id: ObjectId,
    resources_id: Option<ObjectId>,
    content: Content,
) -> ObjectId {
    let encoded = content.encode().expect("content stream encodes");
    let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));

    let mut page = dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
    };
    if let Some(resources_id) = resources_id {
        page.set("Resources", resources_id);
    }
    doc.add_object(page)
}

fn finish(mut doc: Document, pages_id: ObjectId, kids: Vec<ObjectId>) -> Vec<u8> {
    let count = kids.len() as i64;
    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => kids.into_iter().map(Object::from).collect::<Vec<_>>(),
        "Count" => count,
        "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("pdf serializes");
    bytes
}
