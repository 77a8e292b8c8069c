//! Pixel and page-relative rectangle math.
//!
//! Boxes are persisted as fractions of the page width/height so they stay
//! valid across zoom and DPI changes. Pixel rectangles only exist while a
//! page is on screen (or being rendered) and are derived on demand.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Slack allowed on the `[0,1]` bounds when validating stored rectangles.
pub const BOUNDS_EPSILON: f64 = 1e-9;

/// A rectangle expressed as fractions of page width/height.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "[f64; 4]", into = "[f64; 4]")]
pub struct RelRect {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl RelRect {
    pub const fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        RelRect { x, y, w, h }
    }

    pub fn right(&self) -> f64 {
        self.x + self.w
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.h
    }

    pub fn area(&self) -> f64 {
        self.w.max(0.0) * self.h.max(0.0)
    }

    /// True when every edge lies inside the unit square and the area is non-zero.
    pub fn is_valid(&self) -> bool {
        let finite = [self.x, self.y, self.w, self.h].iter().all(|v| v.is_finite());
        finite
            && self.x >= -BOUNDS_EPSILON
            && self.y >= -BOUNDS_EPSILON
            && self.w > 0.0
            && self.h > 0.0
            && self.right() <= 1.0 + BOUNDS_EPSILON
            && self.bottom() <= 1.0 + BOUNDS_EPSILON
    }

    /// Largest absolute coordinate difference, used for approximate comparisons.
    pub fn max_abs_diff(&self, other: &RelRect) -> f64 {
        [
            (self.x - other.x).abs(),
            (self.y - other.y).abs(),
            (self.w - other.w).abs(),
            (self.h - other.h).abs(),
        ]
        .into_iter()
        .fold(0.0, f64::max)
    }
}

impl TryFrom<[f64; 4]> for RelRect {
    type Error = String;

    fn try_from(v: [f64; 4]) -> Result<Self, Self::Error> {
        let rect = RelRect::new(v[0], v[1], v[2], v[3]);
        if rect.is_valid() {
            Ok(rect)
        } else {
            Err(format!(
                "rectangle [{}, {}, {}, {}] is outside the unit page or has zero area",
                v[0], v[1], v[2], v[3]
            ))
        }
    }
}

impl From<RelRect> for [f64; 4] {
    fn from(r: RelRect) -> Self {
        [r.x, r.y, r.w, r.h]
    }
}

impl fmt::Display for RelRect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({:.4}, {:.4}, {:.4}x{:.4})",
            self.x, self.y, self.w, self.h
        )
    }
}

/// A rectangle in display pixels. Width/height may be negative while a drag
/// is still in progress (dragging up or left).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelRect {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl PixelRect {
    pub const fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        PixelRect { x, y, w, h }
    }
}

/// Page dimensions, in pixels or points depending on context.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageSize {
    pub width: f64,
    pub height: f64,
}

impl PageSize {
    pub const fn new(width: f64, height: f64) -> Self {
        PageSize { width, height }
    }
}

/// Corner-form rectangle in the page's native coordinate space (PDF points,
/// origin top-left).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BBox {
    pub x_min: f64,
    pub y_min: f64,
    pub x_max: f64,
    pub y_max: f64,
}

impl BBox {
    pub fn width(&self) -> f64 {
        self.x_max - self.x_min
    }

    pub fn height(&self) -> f64 {
        self.y_max - self.y_min
    }

    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        x >= self.x_min && x <= self.x_max && y >= self.y_min && y <= self.y_max
    }
}

/// Convert a pixel rectangle drawn on a page of `page_px` pixels into
/// page-relative coordinates. Inverted drags are normalized. The result is
/// not clamped; see [`clamp_to_page`].
pub fn to_relative(rect: PixelRect, page_px: PageSize) -> RelRect {
    let (x0, x1) = ordered(rect.x, rect.x + rect.w);
    let (y0, y1) = ordered(rect.y, rect.y + rect.h);
    RelRect {
        x: x0 / page_px.width,
        y: y0 / page_px.height,
        w: (x1 - x0) / page_px.width,
        h: (y1 - y0) / page_px.height,
    }
}

/// Convert a relative rectangle to pixels for a page rendered at `page_px`
/// (its size at zoom 1.0) and displayed at `zoom`.
pub fn to_pixel(rect: RelRect, page_px: PageSize, zoom: f64) -> PixelRect {
    let sx = page_px.width * zoom;
    let sy = page_px.height * zoom;
    PixelRect {
        x: rect.x * sx,
        y: rect.y * sy,
        w: rect.w * sx,
        h: rect.h * sy,
    }
}

/// Map a relative rectangle into the page's native space (points).
pub fn to_native(rect: RelRect, page_pt: PageSize) -> BBox {
    BBox {
        x_min: rect.x * page_pt.width,
        y_min: rect.y * page_pt.height,
        x_max: rect.right() * page_pt.width,
        y_max: rect.bottom() * page_pt.height,
    }
}

/// Clip a rectangle to the unit page. Returns `None` when nothing with a
/// positive area remains (or the input is not finite).
pub fn clamp_to_page(rect: RelRect) -> Option<RelRect> {
    if ![rect.x, rect.y, rect.w, rect.h].iter().all(|v| v.is_finite()) {
        return None;
    }
    let (ax, bx) = ordered(rect.x, rect.right());
    let (ay, by) = ordered(rect.y, rect.bottom());
    let x0 = ax.clamp(0.0, 1.0);
    let y0 = ay.clamp(0.0, 1.0);
    let x1 = bx.clamp(0.0, 1.0);
    let y1 = by.clamp(0.0, 1.0);
    if x1 - x0 <= 0.0 || y1 - y0 <= 0.0 {
        return None;
    }
    Some(RelRect::new(x0, y0, x1 - x0, y1 - y0))
}

/// Intersection of two rectangles, if it has a positive area.
pub fn intersection(a: &RelRect, b: &RelRect) -> Option<RelRect> {
    let x0 = a.x.max(b.x);
    let y0 = a.y.max(b.y);
    let x1 = a.right().min(b.right());
    let y1 = a.bottom().min(b.bottom());
    if x1 > x0 && y1 > y0 {
        Some(RelRect::new(x0, y0, x1 - x0, y1 - y0))
    } else {
        None
    }
}

pub fn intersection_area(a: &RelRect, b: &RelRect) -> f64 {
    intersection(a, b).map(|r| r.area()).unwrap_or(0.0)
}

/// Two rectangles overlap when they share a positive area. Touching edges do
/// not count.
pub fn overlaps(a: &RelRect, b: &RelRect) -> bool {
    intersection(a, b).is_some()
}

/// Pick the existing box a drag-release lands on.
///
/// Candidates are `(box id, rect)`. The box with the largest intersection
/// with `drag` wins; on equal areas the higher id (the more recently created
/// box) wins. Returns `None` when the drag overlaps nothing.
pub fn pick_drop_target<'a, I>(candidates: I, drag: &RelRect) -> Option<u64>
where
    I: IntoIterator<Item = (u64, &'a RelRect)>,
{
    let mut best: Option<(u64, f64)> = None;
    for (id, rect) in candidates {
        let area = intersection_area(rect, drag);
        if area <= 0.0 {
            continue;
        }
        best = match best {
            Some((best_id, best_area))
                if best_area > area || (best_area == area && best_id > id) =>
            {
                Some((best_id, best_area))
            }
            _ => Some((id, area)),
        };
    }
    best.map(|(id, _)| id)
}

fn ordered(a: f64, b: f64) -> (f64, f64) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pixel_round_trip() {
        let page = PageSize::new(1240.0, 1754.0);
        let cases = [
            PixelRect::new(0.0, 0.0, 1240.0, 1754.0),
            PixelRect::new(13.5, 900.25, 211.0, 37.75),
            PixelRect::new(1239.0, 1.0, 1.0, 0.5),
        ];
        for r in cases {
            let back = to_pixel(to_relative(r, page), page, 1.0);
            assert!((back.x - r.x).abs() < 1e-6);
            assert!((back.y - r.y).abs() < 1e-6);
            assert!((back.w - r.w).abs() < 1e-6);
            assert!((back.h - r.h).abs() < 1e-6);
        }
    }

    #[test]
    fn test_relative_is_zoom_invariant() {
        let base = PageSize::new(600.0, 800.0);
        let rel = RelRect::new(0.25, 0.5, 0.1, 0.05);
        let zoomed = to_pixel(rel, base, 2.0);
        assert_eq!(zoomed.x, 300.0);
        assert!((zoomed.w - 120.0).abs() < 1e-9);

        let displayed = PageSize::new(1200.0, 1600.0);
        let again = to_relative(zoomed, displayed);
        assert!(again.max_abs_diff(&rel) < 1e-9);
    }

    #[test]
    fn test_inverted_drag_is_normalized() {
        let page = PageSize::new(100.0, 200.0);
        let rel = to_relative(PixelRect::new(50.0, 100.0, -20.0, -40.0), page);
        assert!(rel.max_abs_diff(&RelRect::new(0.3, 0.3, 0.2, 0.2)) < 1e-12);
    }

    #[test]
    fn test_clamp_clips_and_rejects_degenerate() {
        let clipped = clamp_to_page(RelRect::new(-0.1, 0.9, 0.3, 0.3)).unwrap();
        assert!(clipped.max_abs_diff(&RelRect::new(0.0, 0.9, 0.2, 0.1)) < 1e-12);

        assert!(clamp_to_page(RelRect::new(1.2, 0.1, 0.3, 0.3)).is_none());
        assert!(clamp_to_page(RelRect::new(0.2, 0.2, 0.0, 0.3)).is_none());
        assert!(clamp_to_page(RelRect::new(f64::NAN, 0.2, 0.1, 0.3)).is_none());
    }

    #[test]
    fn test_overlaps_ignores_touching_edges() {
        let a = RelRect::new(0.0, 0.0, 0.5, 0.5);
        let b = RelRect::new(0.5, 0.0, 0.5, 0.5);
        let c = RelRect::new(0.4, 0.4, 0.2, 0.2);
        assert!(!overlaps(&a, &b));
        assert!(overlaps(&a, &c));
        assert!(overlaps(&b, &c));
    }

    #[test]
    fn test_pick_drop_target_largest_intersection() {
        let a = RelRect::new(0.0, 0.0, 0.5, 0.5);
        let b = RelRect::new(0.4, 0.4, 0.5, 0.5);
        let drag = RelRect::new(0.35, 0.35, 0.3, 0.3);
        let target = pick_drop_target([(1, &a), (2, &b)], &drag);
        assert_eq!(target, Some(2));
    }

    #[test]
    fn test_pick_drop_target_tie_prefers_newest() {
        let a = RelRect::new(0.0, 0.0, 0.5, 1.0);
        let b = RelRect::new(0.5, 0.0, 0.5, 1.0);
        let drag = RelRect::new(0.25, 0.25, 0.5, 0.5);
        assert_eq!(pick_drop_target([(7, &a), (3, &b)], &drag), Some(7));
        assert_eq!(pick_drop_target([(3, &a), (7, &b)], &drag), Some(7));
    }

    #[test]
    fn test_pick_drop_target_none_outside() {
        let a = RelRect::new(0.0, 0.0, 0.1, 0.1);
        let drag = RelRect::new(0.5, 0.5, 0.1, 0.1);
        assert_eq!(pick_drop_target([(1, &a)], &drag), None);
    }

    #[test]
    fn test_rel_rect_json_rejects_out_of_range() {
        let ok: RelRect = serde_json::from_str("[0.1, 0.2, 0.3, 0.4]").unwrap();
        assert_eq!(ok, RelRect::new(0.1, 0.2, 0.3, 0.4));
        assert!(serde_json::from_str::<RelRect>("[0.9, 0.2, 0.3, 0.4]").is_err());
        assert!(serde_json::from_str::<RelRect>("[0.1, 0.2, 0.0, 0.4]").is_err());
        assert!(serde_json::from_str::<RelRect>("[0.1, 0.2, 0.3]").is_err());
        assert_eq!(
            serde_json::to_string(&RelRect::new(0.5, 0.25, 0.125, 0.0625)).unwrap(),
            "[0.5,0.25,0.125,0.0625]"
        );
    }

    #[test]
    fn test_to_native_scales_to_points() {
        let bbox = to_native(RelRect::new(0.5, 0.25, 0.25, 0.5), PageSize::new(612.0, 792.0));
        assert_eq!(bbox.x_min, 306.0);
        assert_eq!(bbox.y_min, 198.0);
        assert_eq!(bbox.x_max, 459.0);
        assert_eq!(bbox.y_max, 594.0);
    }
}
