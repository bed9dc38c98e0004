// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Gutter-offset page tiling.
//
// Pages step by their drawable size and start at (-gutter, -gutter), so the
// drawable rectangles tile the document exactly while the full page rects
// overlap their neighbours by two gutters.  All geometry is whole pixels.

use serde::{Deserialize, Serialize};
use tilewerk_core::config::LayoutLimits;
use tilewerk_core::types::{Orientation, OrientationPolicy, PaperSize, PixelRect};
use tracing::{info, instrument, warn};

use crate::scale::ScaleFactor;

/// One physical sheet in document pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageDescriptor {
    /// Top-left of the full page rect. May be negative.
    pub x: i64,
    pub y: i64,
    pub width: u32,
    pub height: u32,
    pub gutter: u32,
    pub row: u32,
    pub col: u32,
}

impl PageDescriptor {
    /// Full page rect including the gutter band.
    pub fn rect(&self) -> PixelRect {
        PixelRect::new(self.x, self.y, self.width, self.height)
    }

    /// Page rect shrunk by the gutter on every side.
    pub fn drawable_rect(&self) -> PixelRect {
        self.rect().shrink(self.gutter)
    }

    /// Drawable rect in page-local coordinates (origin at the page corner).
    pub fn local_drawable_rect(&self) -> PixelRect {
        PixelRect::new(
            self.gutter as i64,
            self.gutter as i64,
            self.width.saturating_sub(2 * self.gutter),
            self.height.saturating_sub(2 * self.gutter),
        )
    }
}

/// Why a grid came back empty.  These are user-correctable settings, not errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GridNotice {
    EmptyDocument,
    GutterTooLarge { page_width: u32, page_height: u32, gutter: u32 },
    PageTooSmall { width: f64, height: f64 },
    TooManyTiles { estimated: f64, cap: u32 },
}

impl GridNotice {
    /// Status-bar text for the notice.
    pub fn message(&self) -> String {
        match self {
            Self::EmptyDocument => "No document loaded - nothing to tile".into(),
            Self::GutterTooLarge {
                page_width,
                page_height,
                gutter,
            } => format!(
                "Gutter too large for page size: {gutter}px gutter leaves no drawable area on a {page_width}x{page_height}px page"
            ),
            Self::PageTooSmall { width, height } => format!(
                "Warning: Scale too large - pages would be {width:.0}x{height:.0} pixels"
            ),
            Self::TooManyTiles { estimated, cap } => format!(
                "Warning: Scale would generate {estimated:.0} tiles (limit: {cap})"
            ),
        }
    }
}

impl std::fmt::Display for GridNotice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message())
    }
}

/// Tile counts along each axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridSummary {
    pub tiles_x: u32,
    pub tiles_y: u32,
    pub total: u32,
}

/// Ordered (row-major) pages covering a document.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PageGrid {
    pub pages: Vec<PageDescriptor>,
    pub gutter_px: u32,
    /// Set when the grid is empty because the request was rejected.
    pub notice: Option<GridNotice>,
    /// The request this grid was computed from.
    #[serde(default)]
    pub request: Option<GridRequest>,
}

impl PageGrid {
    fn rejected(req: GridRequest, notice: GridNotice) -> Self {
        warn!(notice = %notice, "page grid rejected");
        Self {
            pages: Vec::new(),
            gutter_px: req.gutter_px,
            notice: Some(notice),
            request: Some(req),
        }
    }

    /// True when this grid was computed from exactly `req`.
    pub fn built_from(&self, req: &GridRequest) -> bool {
        self.request.as_ref() == Some(req)
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn summary(&self) -> GridSummary {
        let tiles_x = self.pages.iter().map(|p| p.col + 1).max().unwrap_or(0);
        let tiles_y = self.pages.iter().map(|p| p.row + 1).max().unwrap_or(0);
        GridSummary {
            tiles_x,
            tiles_y,
            total: self.pages.len() as u32,
        }
    }

    /// Union of every full page rect.
    pub fn bounds(&self) -> Option<PixelRect> {
        let mut iter = self.pages.iter().map(PageDescriptor::rect);
        let first = iter.next()?;
        Some(iter.fold(first, |acc, r| acc.union(&r)))
    }

    /// Mean width/height ratio of the pages.
    pub fn average_aspect(&self) -> Option<f64> {
        let aspects: Vec<f64> = self
            .pages
            .iter()
            .filter(|p| p.width > 0 && p.height > 0)
            .map(|p| p.width as f64 / p.height as f64)
            .collect();
        if aspects.is_empty() {
            return None;
        }
        Some(aspects.iter().sum::<f64>() / aspects.len() as f64)
    }
}

/// Inputs to grid generation, all in document pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridRequest {
    pub doc_width: u32,
    pub doc_height: u32,
    pub page_width_px: u32,
    pub page_height_px: u32,
    pub gutter_px: u32,
}

/// Builds page grids under configurable safety limits.
#[derive(Debug, Clone, Copy)]
pub struct PageGridCalculator {
    limits: LayoutLimits,
}

impl PageGridCalculator {
    pub fn new(limits: LayoutLimits) -> Self {
        Self { limits }
    }

    /// Convert a physical paper and gutter into a pixel request.
    ///
    /// `Landscape` forces width > height, `Portrait` forces height > width and
    /// `Auto` keeps the paper as given.
    pub fn request_for(
        doc_width: u32,
        doc_height: u32,
        scale: ScaleFactor,
        paper: PaperSize,
        policy: OrientationPolicy,
        gutter_mm: f64,
    ) -> GridRequest {
        let (w_mm, h_mm) = match policy {
            OrientationPolicy::Auto => paper.dimensions_mm(),
            OrientationPolicy::Landscape => paper.oriented_mm(Orientation::Landscape),
            OrientationPolicy::Portrait => paper.oriented_mm(Orientation::Portrait),
        };
        GridRequest {
            doc_width,
            doc_height,
            page_width_px: to_px(scale.mm_to_px(w_mm)),
            page_height_px: to_px(scale.mm_to_px(h_mm)),
            gutter_px: to_px(scale.mm_to_px(gutter_mm.max(0.0))),
        }
    }

    /// Generate the grid, or an empty grid carrying a [`GridNotice`].
    #[instrument(skip(self))]
    pub fn compute(&self, req: GridRequest) -> PageGrid {
        let gutter = req.gutter_px;
        if req.doc_width == 0 || req.doc_height == 0 {
            return PageGrid::rejected(req, GridNotice::EmptyDocument);
        }

        let page_w = req.page_width_px as f64;
        let page_h = req.page_height_px as f64;
        if page_w < self.limits.min_page_px || page_h < self.limits.min_page_px {
            return PageGrid::rejected(
                req,
                GridNotice::PageTooSmall {
                    width: page_w,
                    height: page_h,
                },
            );
        }

        let estimated = (req.doc_width as f64 / page_w) * (req.doc_height as f64 / page_h);
        if estimated > self.limits.max_tiles as f64 {
            return PageGrid::rejected(
                req,
                GridNotice::TooManyTiles {
                    estimated,
                    cap: self.limits.max_tiles,
                },
            );
        }

        let twice = 2 * gutter as u64;
        if twice >= req.page_width_px as u64 || twice >= req.page_height_px as u64 {
            return PageGrid::rejected(
                req,
                GridNotice::GutterTooLarge {
                    page_width: req.page_width_px,
                    page_height: req.page_height_px,
                    gutter,
                },
            );
        }

        let step_x = req.page_width_px as i64 - twice as i64;
        let step_y = req.page_height_px as i64 - twice as i64;
        let g = gutter as i64;
        let doc_w = req.doc_width as i64;
        let doc_h = req.doc_height as i64;

        let mut pages = Vec::new();
        let mut y = -g;
        let mut row = 0u32;
        while y + g < doc_h {
            let mut x = -g;
            let mut col = 0u32;
            while x + g < doc_w {
                pages.push(PageDescriptor {
                    x,
                    y,
                    width: req.page_width_px,
                    height: req.page_height_px,
                    gutter,
                    row,
                    col,
                });
                x += step_x;
                col += 1;
            }
            y += step_y;
            row += 1;
        }

        let grid = PageGrid {
            pages,
            gutter_px: gutter,
            notice: None,
            request: Some(req),
        };
        let summary = grid.summary();
        info!(
            tiles_x = summary.tiles_x,
            tiles_y = summary.tiles_y,
            total = summary.total,
            "page grid generated"
        );
        grid
    }
}

fn to_px(value: f64) -> u32 {
    if value.is_finite() && value > 0.0 {
        value.round().min(u32::MAX as f64) as u32
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn calculator() -> PageGridCalculator {
        PageGridCalculator::new(LayoutLimits::default())
    }

    fn req(doc: (u32, u32), page: (u32, u32), gutter: u32) -> GridRequest {
        GridRequest {
            doc_width: doc.0,
            doc_height: doc.1,
            page_width_px: page.0,
            page_height_px: page.1,
            gutter_px: gutter,
        }
    }

    /// Every document pixel lies in exactly one drawable rect.
    fn assert_exact_cover(grid: &PageGrid, doc_w: u32, doc_h: u32) {
        let mut hits = vec![0u8; (doc_w * doc_h) as usize];
        for page in &grid.pages {
            let doc = PixelRect::new(0, 0, doc_w, doc_h);
            let Some(r) = page.drawable_rect().intersect(&doc) else {
                continue;
            };
            for y in r.y..r.bottom() {
                for x in r.x..r.right() {
                    hits[(y as u32 * doc_w + x as u32) as usize] += 1;
                }
            }
        }
        assert!(hits.iter().all(|&h| h == 1), "drawable rects must cover the document exactly once");
    }

    #[test]
    fn a4_at_tenth_mm_gives_two_columns() {
        let scale = ScaleFactor::new(0.1).expect("scale");
        let request = PageGridCalculator::request_for(
            3000,
            2000,
            scale,
            PaperSize::A4,
            OrientationPolicy::Auto,
            10.0,
        );
        assert_eq!(request.page_width_px, 2100);
        assert_eq!(request.page_height_px, 2970);
        assert_eq!(request.gutter_px, 100);

        let grid = calculator().compute(request);
        let summary = grid.summary();
        assert_eq!((summary.tiles_x, summary.tiles_y, summary.total), (2, 1, 2));
        assert_eq!(grid.pages[0].drawable_rect(), PixelRect::new(0, 0, 1900, 2770));
        assert_eq!(grid.pages[1].x, 1800);
        assert!(grid.notice.is_none());
    }

    #[test]
    fn first_page_is_offset_by_gutter() {
        let grid = calculator().compute(req((500, 500), (200, 300), 20));
        let first = grid.pages[0];
        assert_eq!((first.x, first.y), (-20, -20));
        assert_eq!(first.drawable_rect().x, 0);
        assert_eq!(first.drawable_rect().y, 0);
    }

    #[test]
    fn drawable_rects_tile_exactly() {
        let cases = [
            ((1000, 700), (230, 170), 15),
            ((999, 1001), (100, 100), 0),
            ((640, 480), (321, 123), 60),
            ((57, 300), (90, 60), 10),
        ];
        for (doc, page, gutter) in cases {
            let grid = calculator().compute(req(doc, page, gutter));
            assert!(!grid.is_empty(), "case {doc:?} {page:?} {gutter}");
            assert_exact_cover(&grid, doc.0, doc.1);
        }
    }

    #[test]
    fn neighbours_are_contiguous() {
        let grid = calculator().compute(req((1000, 1000), (300, 250), 25));
        for pair in grid.pages.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            if a.row == b.row {
                assert_eq!(a.drawable_rect().right(), b.drawable_rect().x);
            }
        }
    }

    #[test]
    fn rows_are_row_major() {
        let grid = calculator().compute(req((1000, 1000), (300, 300), 0));
        let order: Vec<(u32, u32)> = grid.pages.iter().map(|p| (p.row, p.col)).collect();
        let mut sorted = order.clone();
        sorted.sort();
        assert_eq!(order, sorted);
        assert_eq!(grid.summary().total, 16);
    }

    #[test]
    fn identical_requests_give_identical_grids() {
        let r = req((2345, 1234), (400, 500), 33);
        assert_eq!(calculator().compute(r), calculator().compute(r));
    }

    #[test]
    fn gutter_at_half_page_is_rejected() {
        for gutter in [100, 101, 500] {
            let grid = calculator().compute(req((1000, 1000), (200, 400), gutter));
            assert!(grid.is_empty());
            assert!(matches!(grid.notice, Some(GridNotice::GutterTooLarge { .. })));
        }
    }

    #[test]
    fn too_many_tiles_is_rejected() {
        let grid = calculator().compute(req((10_000, 10_000), (500, 500), 10));
        match grid.notice {
            Some(GridNotice::TooManyTiles { estimated, cap }) => {
                assert_eq!(cap, 100);
                assert!((estimated - 400.0).abs() < 1e-9);
            }
            other => panic!("unexpected notice {other:?}"),
        }
    }

    #[test]
    fn tile_cap_is_configurable() {
        let limits = LayoutLimits {
            max_tiles: 500,
            ..LayoutLimits::default()
        };
        let grid = PageGridCalculator::new(limits).compute(req((10_000, 10_000), (500, 500), 10));
        assert!(!grid.is_empty());
    }

    #[test]
    fn tiny_pages_are_rejected() {
        let grid = calculator().compute(req((100, 100), (40, 60), 0));
        assert!(matches!(grid.notice, Some(GridNotice::PageTooSmall { .. })));
    }

    #[test]
    fn empty_document_is_rejected() {
        let grid = calculator().compute(req((0, 500), (100, 100), 0));
        assert_eq!(grid.notice, Some(GridNotice::EmptyDocument));
    }

    #[test]
    fn grid_remembers_its_request() {
        let r = req((1000, 800), (210, 297), 10);
        let grid = calculator().compute(r);
        assert!(grid.built_from(&r));
        assert!(!grid.built_from(&req((1000, 800), (297, 420), 10)));
        let rejected = calculator().compute(req((0, 800), (210, 297), 10));
        assert!(rejected.built_from(&req((0, 800), (210, 297), 10)));
        assert!(!PageGrid::default().built_from(&r));
    }

    #[test]
    fn landscape_policy_swaps_page_axes() {
        let scale = ScaleFactor::new(1.0).expect("scale");
        let request = PageGridCalculator::request_for(
            1000,
            1000,
            scale,
            PaperSize::A4,
            OrientationPolicy::Landscape,
            0.0,
        );
        assert_eq!((request.page_width_px, request.page_height_px), (297, 210));
    }

    #[test]
    fn bounds_cover_every_page() {
        let grid = calculator().compute(req((1000, 600), (300, 300), 20));
        let bounds = grid.bounds().expect("non-empty");
        assert_eq!((bounds.x, bounds.y), (-20, -20));
        for page in &grid.pages {
            assert_eq!(bounds.intersect(&page.rect()), Some(page.rect()));
        }
    }
}
