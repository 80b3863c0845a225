//! Text stamping with lopdf
//!
//! Every selected page gets its own copy of the (possibly inherited)
//! resource dictionary with a Type1 font and an ExtGState carrying the
//! opacity, plus an extra content stream that draws the text.
//!
//! # Placement
//!
//! PDF user space has its origin in the bottom-left corner with y pointing
//! up. The text box (measured width x font size) is aligned to the anchor
//! inside the page box, moved by the offset and rotated about its own
//! centre:
//!
//! ```text
//! cm = [cos sin -sin cos cx cy]    text origin at (-w/2, -h/2)
//! ```

use std::path::Path;

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};

use super::descriptor::{HAlign, Rgb, VAlign, WatermarkStyle};
use super::engine::{PageSelection, WatermarkEngine, WatermarkError};
use super::metrics::encode_win_ansi;

/// Page box used when a page carries neither CropBox nor MediaBox
const US_LETTER: [f32; 4] = [0.0, 0.0, 612.0, 792.0];

/// Guard against cycles in malformed page trees
const MAX_TREE_DEPTH: usize = 32;

const FONT_PREFIX: &str = "WmF";
const GSTATE_PREFIX: &str = "WmGS";

/// Watermark engine writing content streams with lopdf
#[derive(Debug, Clone, Copy, Default)]
pub struct LopdfEngine;

impl LopdfEngine {
    pub fn new() -> Self {
        Self
    }
}

impl WatermarkEngine for LopdfEngine {
    fn add_text_watermark(
        &self,
        input: &Path,
        output: &Path,
        pages: &PageSelection,
        text: &str,
        style: &WatermarkStyle,
    ) -> Result<usize, WatermarkError> {
        let mut doc = Document::load(input)
            .map_err(|e| WatermarkError::UnreadableInput(e.to_string()))?;

        let stamped = stamp_document(&mut doc, pages, text, style)?;

        doc.save(output)
            .map_err(|e| WatermarkError::Output(e.to_string()))?;

        tracing::debug!(
            input = %input.display(),
            output = %output.display(),
            pages = stamped,
            "Watermark applied"
        );

        Ok(stamped)
    }
}

/// Objects shared by every stamped page of one document
struct SharedObjects {
    font: ObjectId,
    gstate: ObjectId,
    save: ObjectId,
    restore: ObjectId,
}

/// Stamp `text` onto the selected pages of a loaded document.
pub fn stamp_document(
    doc: &mut Document,
    pages: &PageSelection,
    text: &str,
    style: &WatermarkStyle,
) -> Result<usize, WatermarkError> {
    let targets: Vec<ObjectId> = doc
        .get_pages()
        .into_iter()
        .filter(|(number, _)| pages.includes(*number))
        .map(|(_, id)| id)
        .collect();

    if targets.is_empty() {
        return Err(WatermarkError::NoPagesSelected);
    }

    let shared = SharedObjects {
        font: doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => style.font.base_font(),
            "Encoding" => "WinAnsiEncoding",
        }),
        gstate: doc.add_object(dictionary! {
            "Type" => "ExtGState",
            "ca" => Object::Real(style.opacity),
            "CA" => Object::Real(style.opacity),
        }),
        save: doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec())),
        restore: doc.add_object(Stream::new(Dictionary::new(), b"Q\n".to_vec())),
    };

    let encoded = encode_win_ansi(text);
    let width = style.font.text_width(text, style.points as f32);

    for page_id in &targets {
        let page_box = page_box(doc, *page_id);
        let (font_name, gstate_name) = install_resources(doc, *page_id, &shared)?;

        let content = Content {
            operations: stamp_operations(
                style,
                encoded.clone(),
                width,
                page_box,
                &font_name,
                &gstate_name,
            ),
        };
        let bytes = content
            .encode()
            .map_err(|e| WatermarkError::Processing(format!("encode stamp content: {}", e)))?;

        attach_stamp(doc, *page_id, bytes, style.on_top, &shared)?;
    }

    Ok(targets.len())
}

/// Build the drawing operators for one page
fn stamp_operations(
    style: &WatermarkStyle,
    encoded: Vec<u8>,
    width: f32,
    page_box: [f32; 4],
    font_name: &str,
    gstate_name: &str,
) -> Vec<Operation> {
    let size = style.points as f32;
    let [llx, lly, urx, ury] = page_box;
    let (halign, valign) = style.position.alignment();

    let x0 = match halign {
        HAlign::Left => llx,
        HAlign::Center => llx + (urx - llx - width) / 2.0,
        HAlign::Right => urx - width,
    };
    let y0 = match valign {
        VAlign::Bottom => lly,
        VAlign::Middle => lly + (ury - lly - size) / 2.0,
        VAlign::Top => ury - size,
    };

    let (dx, dy) = style.offset;
    let cx = x0 + dx + width / 2.0;
    let cy = y0 + dy + size / 2.0;
    let (sin, cos) = style.rotation.to_radians().sin_cos();
    let Rgb { r, g, b } = style.fill;

    vec![
        Operation::new("q", vec![]),
        Operation::new("gs", vec![Object::Name(gstate_name.as_bytes().to_vec())]),
        Operation::new("rg", vec![Object::Real(r), Object::Real(g), Object::Real(b)]),
        Operation::new(
            "cm",
            vec![
                Object::Real(cos),
                Object::Real(sin),
                Object::Real(-sin),
                Object::Real(cos),
                Object::Real(cx),
                Object::Real(cy),
            ],
        ),
        Operation::new("BT", vec![]),
        Operation::new(
            "Tf",
            vec![Object::Name(font_name.as_bytes().to_vec()), Object::Real(size)],
        ),
        Operation::new(
            "Td",
            vec![Object::Real(-width / 2.0), Object::Real(-size / 2.0)],
        ),
        Operation::new("Tj", vec![Object::String(encoded, StringFormat::Literal)]),
        Operation::new("ET", vec![]),
        Operation::new("Q", vec![]),
    ]
}

/// Give the page a local resource dictionary containing the watermark font
/// and graphics state. Returns the names they were registered under.
fn install_resources(
    doc: &mut Document,
    page_id: ObjectId,
    shared: &SharedObjects,
) -> Result<(String, String), WatermarkError> {
    let mut resources = match inherited(doc, page_id, b"Resources") {
        Some(Object::Dictionary(dict)) => dict.clone(),
        Some(Object::Reference(id)) => doc.get_dictionary(*id).cloned().unwrap_or_default(),
        _ => Dictionary::new(),
    };

    let font_name = register(doc, &mut resources, b"Font", FONT_PREFIX, shared.font);
    let gstate_name = register(doc, &mut resources, b"ExtGState", GSTATE_PREFIX, shared.gstate);

    page_dict_mut(doc, page_id)?.set("Resources", Object::Dictionary(resources));

    Ok((font_name, gstate_name))
}

/// Add `id` to a resource category under the first free `<prefix><n>` name
fn register(
    doc: &Document,
    resources: &mut Dictionary,
    category: &[u8],
    prefix: &str,
    id: ObjectId,
) -> String {
    let mut entries = match resources.get(category) {
        Ok(Object::Dictionary(dict)) => dict.clone(),
        Ok(Object::Reference(ref_id)) => doc.get_dictionary(*ref_id).cloned().unwrap_or_default(),
        _ => Dictionary::new(),
    };

    let mut n = 1;
    let name = loop {
        let candidate = format!("{}{}", prefix, n);
        if !entries.has(candidate.as_bytes()) {
            break candidate;
        }
        n += 1;
    };

    entries.set(name.clone(), Object::Reference(id));
    resources.set(category.to_vec(), Object::Dictionary(entries));
    name
}

/// Add the stamp stream to the page's content list
fn attach_stamp(
    doc: &mut Document,
    page_id: ObjectId,
    bytes: Vec<u8>,
    on_top: bool,
    shared: &SharedObjects,
) -> Result<(), WatermarkError> {
    let existing: Vec<Object> = match doc
        .get_dictionary(page_id)
        .ok()
        .and_then(|page| page.get(b"Contents").ok())
    {
        Some(Object::Reference(id)) => match doc.get_object(*id) {
            Ok(Object::Array(items)) => items.clone(),
            _ => vec![Object::Reference(*id)],
        },
        Some(Object::Array(items)) => items.clone(),
        _ => Vec::new(),
    };

    let stamp_id = doc.add_object(Stream::new(Dictionary::new(), bytes));

    // On top: isolate the original content in q/Q so its graphics state
    // cannot leak into the stamp.
    let contents = if on_top {
        let mut contents = Vec::with_capacity(existing.len() + 3);
        contents.push(Object::Reference(shared.save));
        contents.extend(existing);
        contents.push(Object::Reference(shared.restore));
        contents.push(Object::Reference(stamp_id));
        contents
    } else {
        let mut contents = Vec::with_capacity(existing.len() + 1);
        contents.push(Object::Reference(stamp_id));
        contents.extend(existing);
        contents
    };

    page_dict_mut(doc, page_id)?.set("Contents", Object::Array(contents));
    Ok(())
}

fn page_dict_mut(doc: &mut Document, page_id: ObjectId) -> Result<&mut Dictionary, WatermarkError> {
    doc.get_object_mut(page_id)
        .and_then(Object::as_dict_mut)
        .map_err(|e| WatermarkError::Processing(format!("page {:?}: {}", page_id, e)))
}

/// Look up a page attribute, following `/Parent` for inheritable keys
fn inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut node = page_id;
    for _ in 0..MAX_TREE_DEPTH {
        let dict = doc.get_dictionary(node).ok()?;
        if let Ok(value) = dict.get(key) {
            return Some(value);
        }
        node = dict.get(b"Parent").ok()?.as_reference().ok()?;
    }
    None
}

/// Visible page area: CropBox, then MediaBox, then US Letter
fn page_box(doc: &Document, page_id: ObjectId) -> [f32; 4] {
    inherited(doc, page_id, b"CropBox")
        .and_then(|obj| rectangle(doc, obj))
        .or_else(|| inherited(doc, page_id, b"MediaBox").and_then(|obj| rectangle(doc, obj)))
        .unwrap_or(US_LETTER)
}

fn rectangle(doc: &Document, obj: &Object) -> Option<[f32; 4]> {
    let obj = match obj {
        Object::Reference(id) => doc.get_object(*id).ok()?,
        other => other,
    };
    let values: Vec<f32> = obj.as_array().ok()?.iter().filter_map(number).collect();
    match values.as_slice() {
        [x1, y1, x2, y2] => Some([x1.min(*x2), y1.min(*y2), x1.max(*x2), y1.max(*y2)]),
        _ => None,
    }
}

fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}
