use super::types::{ForegroundMask, Region, RegionExtractor, BACKGROUND};
use anyhow::Result;

/// 8-connected component labelling over a binary mask.
///
/// A component's area is its pixel count. Any non-zero mask value counts as
/// foreground. Stateless: each call only looks at the mask it is given.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConnectedComponents;

impl RegionExtractor for ConnectedComponents {
    fn extract(&self, mask: &ForegroundMask, min_area: u64) -> Result<Vec<Region>> {
        let _span = tracing::debug_span!("extract_regions").entered();

        let (width, height) = mask.dimensions();
        let (w, h) = (width as usize, height as usize);
        let pixels = mask.as_raw();

        let mut visited = vec![false; w * h];
        let mut stack: Vec<usize> = Vec::new();
        let mut regions = Vec::new();
        let mut discarded = 0usize;

        for start in 0..w * h {
            if visited[start] || pixels[start] == BACKGROUND {
                continue;
            }

            visited[start] = true;
            stack.push(start);

            let (mut min_x, mut min_y) = (usize::MAX, usize::MAX);
            let (mut max_x, mut max_y) = (0usize, 0usize);
            let mut area = 0u64;

            while let Some(index) = stack.pop() {
                let (x, y) = (index % w, index / w);
                area += 1;
                min_x = min_x.min(x);
                min_y = min_y.min(y);
                max_x = max_x.max(x);
                max_y = max_y.max(y);

                // All 8 neighbours, clamped to the mask.
                for ny in y.saturating_sub(1)..=(y + 1).min(h - 1) {
                    for nx in x.saturating_sub(1)..=(x + 1).min(w - 1) {
                        let neighbour = ny * w + nx;
                        if !visited[neighbour] && pixels[neighbour] != BACKGROUND {
                            visited[neighbour] = true;
                            stack.push(neighbour);
                        }
                    }
                }
            }

            if area < min_area {
                discarded += 1;
                continue;
            }

            regions.push(Region {
                x: min_x as u32,
                y: min_y as u32,
                width: (max_x - min_x + 1) as u32,
                height: (max_y - min_y + 1) as u32,
                area,
            });
        }

        tracing::trace!(
            "{} regions kept, {} below {} px discarded",
            regions.len(),
            discarded,
            min_area
        );
        Ok(regions)
    }
}
