//! PDF encoding of paginated report lines.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};

use crate::error::{ProcessingError, ProcessingResult};

use super::layout::{Line, PageGeometry};

const FONT_REGULAR: &str = "F1";
const FONT_BOLD: &str = "F2";

/// Encode pages of lines as a PDF using the built-in Courier fonts.
pub fn encode_pdf(
    title: &str,
    pages: &[Vec<Line>],
    geometry: &PageGeometry,
) -> ProcessingResult<Vec<u8>> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let regular_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let bold_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier-Bold",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            FONT_REGULAR => regular_id,
            FONT_BOLD => bold_id,
        },
    });

    let total = pages.len();
    let mut kids: Vec<Object> = Vec::with_capacity(total);
    for (idx, page) in pages.iter().enumerate() {
        let content = Content {
            operations: page_operations(page, idx + 1, total, geometry),
        };
        let encoded = content
            .encode()
            .map_err(|e| ProcessingError::render(format!("content stream: {e}")))?;
        let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let pages_dict = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => Object::Integer(total as i64),
        "Resources" => resources_id,
        "MediaBox" => vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Integer(geometry.width),
            Object::Integer(geometry.height),
        ],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages_dict));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    let info_id = doc.add_object(dictionary! {
        "Title" => Object::string_literal(pdf_text(title)),
    });
    doc.trailer.set("Root", catalog_id);
    doc.trailer.set("Info", info_id);

    let mut buf = Vec::new();
    doc.save_to(&mut buf)
        .map_err(|e| ProcessingError::render(format!("write pdf: {e}")))?;
    Ok(buf)
}

fn page_operations(
    lines: &[Line],
    page_no: usize,
    total: usize,
    geometry: &PageGeometry,
) -> Vec<Operation> {
    let mut ops = Vec::with_capacity(lines.len() * 5 + 5);
    let mut y = geometry.height - geometry.margin;

    for line in lines {
        y -= line.style.leading();
        if line.text.is_empty() {
            continue;
        }
        let font = if line.style.is_bold() { FONT_BOLD } else { FONT_REGULAR };
        push_text(&mut ops, font, line.style.font_size(), geometry.margin, y, &line.text);
    }

    let footer = format!("Page {page_no} of {total}");
    push_text(&mut ops, FONT_REGULAR, 8, geometry.margin, geometry.margin / 2, &footer);
    ops
}

fn push_text(ops: &mut Vec<Operation>, font: &str, size: i64, x: i64, y: i64, text: &str) {
    ops.push(Operation::new("BT", vec![]));
    ops.push(Operation::new(
        "Tf",
        vec![Object::Name(font.as_bytes().to_vec()), Object::Integer(size)],
    ));
    ops.push(Operation::new("Td", vec![Object::Integer(x), Object::Integer(y)]));
    ops.push(Operation::new("Tj", vec![Object::string_literal(pdf_text(text))]));
    ops.push(Operation::new("ET", vec![]));
}

/// The standard Type1 fonts only cover Latin-1-ish glyphs; anything outside ASCII becomes `?`.
fn pdf_text(text: &str) -> String {
    text.chars()
        .map(|c| if c.is_ascii() && !c.is_ascii_control() { c } else { '?' })
        .collect()
}
