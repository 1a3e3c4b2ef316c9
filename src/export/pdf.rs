use printpdf::{BuiltinFont, Mm, PdfDocument};

use super::{DocumentLayout, ExportError, PageGeometry};

const LAYER_NAME: &str = "Layer 1";

/// Renders a laid-out day with the built-in Helvetica font.
pub fn render(layout: &DocumentLayout, geometry: &PageGeometry) -> Result<Vec<u8>, ExportError> {
    let width = Mm(geometry.page_width);
    let height = Mm(geometry.page_height);
    let (doc, first_page, first_layer) =
        PdfDocument::new(layout.title.as_str(), width, height, LAYER_NAME);
    let font = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|err| ExportError::Pdf(err.to_string()))?;

    for (index, page) in layout.pages.iter().enumerate() {
        let layer = if index == 0 {
            doc.get_page(first_page).get_layer(first_layer)
        } else {
            let (page_index, layer_index) = doc.add_page(width, height, LAYER_NAME);
            doc.get_page(page_index).get_layer(layer_index)
        };
        for op in &page.ops {
            // pdf coordinates grow upward from the bottom edge
            layer.use_text(
                win_ansi(&op.text),
                op.font_size,
                Mm(op.x),
                Mm(geometry.page_height - op.y),
                &font,
            );
        }
    }

    doc.save_to_bytes()
        .map_err(|err| ExportError::Pdf(err.to_string()))
}

/// Maps text onto the WinAnsi code page used by the built-in fonts.
///
/// The built-in font path writes each char as a single byte, so anything
/// above U+00FF must be moved to its WinAnsi slot first. Characters with no
/// slot become `?`.
pub fn win_ansi(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '\u{20}'..='\u{7e}' | '\u{a0}'..='\u{ff}' | '\n' | '\t' => c,
            '€' => '\u{80}',
            '‚' => '\u{82}',
            'ƒ' => '\u{83}',
            '„' => '\u{84}',
            '…' => '\u{85}',
            '†' => '\u{86}',
            '‡' => '\u{87}',
            'ˆ' => '\u{88}',
            '‰' => '\u{89}',
            'Š' => '\u{8a}',
            '‹' => '\u{8b}',
            'Œ' => '\u{8c}',
            'Ž' => '\u{8e}',
            '‘' => '\u{91}',
            '’' => '\u{92}',
            '“' => '\u{93}',
            '”' => '\u{94}',
            '•' => '\u{95}',
            '–' => '\u{96}',
            '—' => '\u{97}',
            '˜' => '\u{98}',
            '™' => '\u{99}',
            'š' => '\u{9a}',
            '›' => '\u{9b}',
            'œ' => '\u{9c}',
            'ž' => '\u{9e}',
            'Ÿ' => '\u{9f}',
            _ => '?',
        })
        .collect()
}
