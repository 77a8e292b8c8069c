use unicode_normalization::UnicodeNormalization;

use crate::config::NormalizeOptions;

/// OCR confusions collapsed to a single zero when `ocr_digit_fixups` is on.
const DIGIT_FIXUPS: &[&str] = &["O0", "OO", "0O"];

/// Clean up an extracted string before it is stored in a cell.
///
/// Steps, each switchable through [`NormalizeOptions`]:
/// 1. NFKC (full-width forms to ASCII)
/// 2. Em dash, en dash and minus sign to '-'
/// 3. OCR digit fix-ups
/// 4. '/' to '_'
///
/// Leading and trailing whitespace is always removed.
pub fn normalize_text(raw: &str, opts: &NormalizeOptions) -> String {
    if raw.trim().is_empty() {
        return String::new();
    }

    let mut s: String = if opts.nfkc {
        raw.nfkc().collect()
    } else {
        raw.to_string()
    };

    if opts.unify_dashes {
        s = s
            .chars()
            .map(|c| match c {
                '\u{2014}' | '\u{2013}' | '\u{2212}' => '-',
                _ => c,
            })
            .collect();
    }

    if opts.ocr_digit_fixups {
        for pattern in DIGIT_FIXUPS {
            s = s.replace(pattern, "0");
        }
    }

    if opts.slash_to_underscore {
        s = s.replace('/', "_");
    }

    s.trim().to_string()
}
