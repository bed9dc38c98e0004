// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Output orientation policy.

use tilewerk_core::types::{Orientation, OrientationPolicy, PaperSize};

use crate::grid::PageGrid;

/// Resolve the physical orientation for tile pages.
///
/// For `Auto`, the grid's average tile aspect is compared with the paper's
/// portrait and landscape aspects.  Landscape wins only when it is closer by
/// more than `tolerance`; an empty grid falls back to portrait.
pub fn choose_orientation(
    policy: OrientationPolicy,
    grid: &PageGrid,
    paper: PaperSize,
    tolerance: f64,
) -> Orientation {
    match policy {
        OrientationPolicy::Landscape => Orientation::Landscape,
        OrientationPolicy::Portrait => Orientation::Portrait,
        OrientationPolicy::Auto => {
            let Some(aspect) = grid.average_aspect() else {
                return Orientation::Portrait;
            };
            let (pw, ph) = paper.oriented_mm(Orientation::Portrait);
            let portrait_diff = (aspect - pw / ph).abs();
            let landscape_diff = (aspect - ph / pw).abs();
            if landscape_diff + tolerance < portrait_diff {
                Orientation::Landscape
            } else {
                Orientation::Portrait
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{GridRequest, PageGridCalculator};
    use tilewerk_core::config::LayoutLimits;

    fn grid_with_page(w: u32, h: u32) -> PageGrid {
        PageGridCalculator::new(LayoutLimits::default()).compute(GridRequest {
            doc_width: 1000,
            doc_height: 1000,
            page_width_px: w,
            page_height_px: h,
            gutter_px: 10,
        })
    }

    #[test]
    fn wide_tiles_choose_landscape() {
        let grid = grid_with_page(297, 210);
        assert_eq!(
            choose_orientation(OrientationPolicy::Auto, &grid, PaperSize::A4, 0.0),
            Orientation::Landscape
        );
    }

    #[test]
    fn tall_tiles_choose_portrait() {
        let grid = grid_with_page(210, 297);
        assert_eq!(
            choose_orientation(OrientationPolicy::Auto, &grid, PaperSize::A4, 0.0),
            Orientation::Portrait
        );
    }

    #[test]
    fn tolerance_keeps_near_ties_portrait() {
        // 1.3 is 0.11 from landscape A4 and 0.59 from portrait.
        let grid = grid_with_page(390, 300);
        assert_eq!(
            choose_orientation(OrientationPolicy::Auto, &grid, PaperSize::A4, 0.0),
            Orientation::Landscape
        );
        assert_eq!(
            choose_orientation(OrientationPolicy::Auto, &grid, PaperSize::A4, 0.5),
            Orientation::Portrait
        );
    }

    #[test]
    fn empty_grid_is_portrait() {
        assert_eq!(
            choose_orientation(OrientationPolicy::Auto, &PageGrid::default(), PaperSize::A4, 0.0),
            Orientation::Portrait
        );
    }

    #[test]
    fn explicit_policy_wins() {
        let grid = grid_with_page(210, 297);
        assert_eq!(
            choose_orientation(OrientationPolicy::Landscape, &grid, PaperSize::A4, 0.0),
            Orientation::Landscape
        );
    }
}
