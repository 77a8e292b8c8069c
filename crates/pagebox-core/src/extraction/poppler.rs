use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use crate::error::PageboxError;
use crate::extraction::{PageHandle, RegionImage, RenderBackend};
use crate::geometry::{BBox, PageSize};

/// Rendering backend built on the poppler command-line tools.
///
/// - `pdfinfo` for the page count
/// - `pdftotext -bbox` for the page size and word boxes
/// - `pdftoppm` to rasterize regions for OCR
pub struct PopplerBackend {
    pdftotext: String,
    pdftoppm: String,
    pdfinfo: String,
}

impl PopplerBackend {
    pub fn new() -> Self {
        PopplerBackend {
            pdftotext: "pdftotext".into(),
            pdftoppm: "pdftoppm".into(),
            pdfinfo: "pdfinfo".into(),
        }
    }

    /// Check if pdftotext is available on the system.
    pub fn is_available() -> bool {
        Command::new("pdftotext")
            .arg("-v")
            .output()
            .map(|o| o.status.success() || !o.stderr.is_empty())
            .unwrap_or(false)
    }
}

impl Default for PopplerBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderBackend for PopplerBackend {
    fn page_count(&self, file: &Path) -> Result<usize, PageboxError> {
        let stdout = run_tool(Command::new(&self.pdfinfo).arg(file), &self.pdfinfo)?;
        let info = String::from_utf8_lossy(&stdout);
        parse_page_count(&info).ok_or_else(|| {
            PageboxError::Backend(format!("pdfinfo reported no page count for {}", file.display()))
        })
    }

    fn open_page(&self, file: &Path, page: usize) -> Result<Arc<dyn PageHandle>, PageboxError> {
        let number = (page + 1).to_string();
        let stdout = run_tool(
            Command::new(&self.pdftotext)
                .args(["-f", &number, "-l", &number, "-bbox"])
                .arg(file)
                .arg("-"),
            &self.pdftotext,
        )?;
        let xml = String::from_utf8_lossy(&stdout);
        let (size, words) = parse_bbox_page(&xml)?;
        tracing::debug!(
            file = %file.display(),
            page,
            words = words.len(),
            "opened page"
        );
        Ok(Arc::new(PopplerPage {
            file: file.to_path_buf(),
            page,
            size,
            words,
            pdftoppm: self.pdftoppm.clone(),
        }))
    }

    fn backend_name(&self) -> &str {
        "poppler"
    }
}

#[derive(Debug, Clone)]
struct Word {
    bbox: BBox,
    text: String,
}

/// One page: its size and every word box, parsed once.
struct PopplerPage {
    file: PathBuf,
    page: usize,
    size: PageSize,
    words: Vec<Word>,
    pdftoppm: String,
}

impl PageHandle for PopplerPage {
    fn page_size(&self) -> PageSize {
        self.size
    }

    fn extract_vector_text(&self, region: BBox) -> Result<String, PageboxError> {
        Ok(words_in_region(&self.words, region))
    }

    fn render_region(&self, region: BBox, dpi: f32) -> Result<RegionImage, PageboxError> {
        let scale = f64::from(dpi) / 72.0;
        let x = (region.x_min * scale).floor().max(0.0) as u64;
        let y = (region.y_min * scale).floor().max(0.0) as u64;
        let w = (region.width() * scale).ceil().max(1.0) as u64;
        let h = (region.height() * scale).ceil().max(1.0) as u64;

        let dir = tempfile::tempdir().map_err(|e| PageboxError::Backend(e.to_string()))?;
        let root = dir.path().join("region");
        let number = (self.page + 1).to_string();
        run_tool(
            Command::new(&self.pdftoppm)
                .args(["-f", &number, "-l", &number])
                .args(["-r", &dpi.to_string()])
                .args(["-x", &x.to_string(), "-y", &y.to_string()])
                .args(["-W", &w.to_string(), "-H", &h.to_string()])
                .args(["-png", "-singlefile"])
                .arg(&self.file)
                .arg(&root),
            &self.pdftoppm,
        )?;

        let png = std::fs::read(root.with_extension("png"))
            .map_err(|e| PageboxError::Backend(format!("pdftoppm produced no image: {e}")))?;
        Ok(RegionImage { png, dpi })
    }
}

/// Run a tool and return its stdout, mapping a missing binary and non-zero
/// exits onto typed errors.
fn run_tool(cmd: &mut Command, tool: &str) -> Result<Vec<u8>, PageboxError> {
    let output = cmd.output().map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            PageboxError::ToolNotFound {
                tool: tool.to_string(),
            }
        } else {
            PageboxError::Backend(format!("{tool} failed: {e}"))
        }
    })?;

    if !output.status.success() {
        let code = output.status.code().unwrap_or(-1);
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        return Err(PageboxError::ToolFailed {
            tool: tool.to_string(),
            code,
            stderr,
        });
    }

    Ok(output.stdout)
}

fn parse_page_count(info: &str) -> Option<usize> {
    info.lines()
        .find_map(|line| line.strip_prefix("Pages:"))
        .and_then(|rest| rest.trim().parse().ok())
}

/// Parse `pdftotext -bbox` output for a single page.
fn parse_bbox_page(xml: &str) -> Result<(PageSize, Vec<Word>), PageboxError> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut size = None;
    let mut words = Vec::new();
    let mut current: Option<BBox> = None;
    let mut text = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.name().as_ref() {
                b"page" if size.is_none() => {
                    size = Some(PageSize::new(attr_f64(&e, "width")?, attr_f64(&e, "height")?));
                }
                b"word" => {
                    current = Some(BBox {
                        x_min: attr_f64(&e, "xMin")?,
                        y_min: attr_f64(&e, "yMin")?,
                        x_max: attr_f64(&e, "xMax")?,
                        y_max: attr_f64(&e, "yMax")?,
                    });
                    text.clear();
                }
                _ => {}
            },
            Ok(Event::Text(t)) if current.is_some() => {
                let s = t.unescape().map_err(|e| bad_xml(&e.to_string()))?;
                text.push_str(&s);
            }
            Ok(Event::End(e)) if e.name().as_ref() == b"word" => {
                if let Some(bbox) = current.take() {
                    let w = text.trim();
                    if !w.is_empty() {
                        words.push(Word {
                            bbox,
                            text: w.to_string(),
                        });
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(bad_xml(&e.to_string())),
            _ => {}
        }
    }

    let size = size.ok_or_else(|| bad_xml("no <page> element"))?;
    Ok((size, words))
}

fn attr_f64(tag: &BytesStart<'_>, name: &str) -> Result<f64, PageboxError> {
    for attr in tag.attributes() {
        let attr = attr.map_err(|e| bad_xml(&e.to_string()))?;
        if attr.key.as_ref() == name.as_bytes() {
            let value = attr.unescape_value().map_err(|e| bad_xml(&e.to_string()))?;
            return value
                .trim()
                .parse()
                .map_err(|_| bad_xml(&format!("attribute {name}='{value}' is not a number")));
        }
    }
    Err(bad_xml(&format!("missing attribute {name}")))
}

fn bad_xml(reason: &str) -> PageboxError {
    PageboxError::Backend(format!("unexpected pdftotext -bbox output: {reason}"))
}

/// Join the words whose centre lies inside `region`, one output line per
/// visual line.
fn words_in_region(words: &[Word], region: BBox) -> String {
    let mut out = String::new();
    let mut prev: Option<&BBox> = None;

    for word in words {
        let cx = (word.bbox.x_min + word.bbox.x_max) / 2.0;
        let cy = (word.bbox.y_min + word.bbox.y_max) / 2.0;
        if !region.contains_point(cx, cy) {
            continue;
        }
        if let Some(p) = prev {
            let prev_cy = (p.y_min + p.y_max) / 2.0;
            if (cy - prev_cy).abs() > p.height() / 2.0 {
                out.push('\n');
            } else {
                out.push(' ');
            }
        }
        out.push_str(&word.text);
        prev = Some(&word.bbox);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<!DOCTYPE html PUBLIC "-//W3C//DTD XHTML 1.0 Transitional//EN"
"http://www.w3.org/TR/xhtml1/DTD/xhtml1-transitional.dtd">
<html xmlns="http://www.w3.org/1999/xhtml">
<head>
<title></title>
<meta name="Producer" content="pdfTeX"/>
</head>
<body>
<doc>
  <page width="612.000000" height="792.000000">
    <word xMin="72.000000" yMin="90.000000" xMax="120.000000" yMax="102.000000">Invoice</word>
    <word xMin="124.000000" yMin="90.000000" xMax="170.000000" yMax="102.000000">INV-042</word>
    <word xMin="72.000000" yMin="110.000000" xMax="110.000000" yMax="122.000000">Date:</word>
    <word xMin="114.000000" yMin="110.000000" xMax="180.000000" yMax="122.000000">2024-01-02</word>
    <word xMin="400.000000" yMin="700.000000" xMax="450.000000" yMax="712.000000">R&amp;D</word>
  </page>
</doc>
</body>
</html>
"#;

    #[test]
    fn test_parse_bbox_page() {
        let (size, words) = parse_bbox_page(SAMPLE).unwrap();
        assert_eq!(size, PageSize::new(612.0, 792.0));
        assert_eq!(words.len(), 5);
        assert_eq!(words[1].text, "INV-042");
        assert_eq!(words[4].text, "R&D");
        assert_eq!(words[2].bbox.y_min, 110.0);
    }

    #[test]
    fn test_words_in_region_groups_lines() {
        let (_, words) = parse_bbox_page(SAMPLE).unwrap();
        let region = BBox {
            x_min: 60.0,
            y_min: 80.0,
            x_max: 200.0,
            y_max: 130.0,
        };
        assert_eq!(words_in_region(&words, region), "Invoice INV-042\nDate: 2024-01-02");
    }

    #[test]
    fn test_words_in_region_uses_centres() {
        let (_, words) = parse_bbox_page(SAMPLE).unwrap();
        let region = BBox {
            x_min: 110.0,
            y_min: 80.0,
            x_max: 200.0,
            y_max: 105.0,
        };
        assert_eq!(words_in_region(&words, region), "INV-042");
    }

    #[test]
    fn test_missing_page_element() {
        assert!(parse_bbox_page("<doc></doc>").is_err());
    }

    #[test]
    fn test_parse_page_count() {
        let info = "Title:          x\n\
                    Producer:       pdfTeX\n\
                    Pages:          12\n\
                    Encrypted:      no\n";
        assert_eq!(parse_page_count(info), Some(12));
        assert_eq!(parse_page_count("Title: x\n"), None);
    }
}
