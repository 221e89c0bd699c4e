use ndarray::Array2;

/// Raw coordinate sums of one component, enough to derive its centroid and
/// second central moments without revisiting its pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Moments {
    pub n: usize,
    pub sum_r: f64,
    pub sum_c: f64,
    pub sum_rr: f64,
    pub sum_cc: f64,
    pub sum_rc: f64,
}

impl Moments {
    pub fn push(&mut self, row: usize, col: usize) {
        let (r, c) = (row as f64, col as f64);
        self.n += 1;
        self.sum_r += r;
        self.sum_c += c;
        self.sum_rr += r * r;
        self.sum_cc += c * c;
        self.sum_rc += r * c;
    }

    /// Centroid as (row, col).
    pub fn centroid(&self) -> (f64, f64) {
        let n = self.n.max(1) as f64;
        (self.sum_r / n, self.sum_c / n)
    }

    /// Second central moments (mu_rr, mu_cc, mu_rc), normalised by pixel count.
    /// Each pixel is treated as a unit square, adding 1/12 to both variances.
    pub fn central(&self) -> (f64, f64, f64) {
        let n = self.n.max(1) as f64;
        let (mr, mc) = self.centroid();
        let mu_rr = self.sum_rr / n - mr * mr + 1.0 / 12.0;
        let mu_cc = self.sum_cc / n - mc * mc + 1.0 / 12.0;
        let mu_rc = self.sum_rc / n - mr * mc;
        (mu_rr, mu_cc, mu_rc)
    }
}

/// Statistics for a single connected component.
#[derive(Clone, Debug)]
pub struct ComponentStats {
    /// Compact label, 1-based, in raster order of the component's first pixel.
    pub label: u32,
    /// Number of pixels in the component.
    pub area: usize,
    /// Bounding box: (min_row, max_row, min_col, max_col).
    pub bbox: (usize, usize, usize, usize),
    pub moments: Moments,
}

/// Result of connected-component labeling.
#[derive(Clone, Debug)]
pub struct Labeling {
    /// Per-pixel label; 0 = background.
    pub labels: Array2<u32>,
    /// Components indexed by `label - 1`.
    pub components: Vec<ComponentStats>,
}

impl Labeling {
    /// Boolean mask holding the pixels of every component `keep` accepts.
    pub fn select<F>(&self, keep: F) -> Array2<bool>
    where
        F: Fn(&ComponentStats) -> bool,
    {
        let retained: Vec<bool> = self.components.iter().map(keep).collect();
        self.labels
            .mapv(|lbl| lbl > 0 && retained[(lbl - 1) as usize])
    }
}

/// Label a binary mask with two-pass union-find using 8-connectivity
/// (upper-left, up, upper-right and left neighbors).
///
/// Final labels are compacted so that components are numbered in raster order
/// of their first pixel, whatever the provisional labels were.
pub fn label_components(mask: &Array2<bool>) -> Labeling {
    let (h, w) = mask.dim();
    let mut labels = Array2::<u32>::zeros((h, w));
    if h == 0 || w == 0 {
        return Labeling {
            labels,
            components: Vec::new(),
        };
    }

    let mut next_label: u32 = 1;
    // Index 0 unused; labels start at 1.
    let mut parent: Vec<u32> = vec![0; 64];

    // Pass 1: provisional labels.
    for row in 0..h {
        for col in 0..w {
            if !mask[[row, col]] {
                continue;
            }

            let mut neighbors = [0u32; 4];
            if col > 0 {
                neighbors[0] = labels[[row, col - 1]];
            }
            if row > 0 {
                neighbors[1] = labels[[row - 1, col]];
                if col > 0 {
                    neighbors[2] = labels[[row - 1, col - 1]];
                }
                if col + 1 < w {
                    neighbors[3] = labels[[row - 1, col + 1]];
                }
            }

            let smallest = neighbors.iter().copied().filter(|&l| l > 0).min();
            match smallest {
                None => {
                    if next_label as usize >= parent.len() {
                        parent.resize(parent.len() * 2, 0);
                    }
                    parent[next_label as usize] = next_label;
                    labels[[row, col]] = next_label;
                    next_label += 1;
                }
                Some(min_label) => {
                    labels[[row, col]] = min_label;
                    for &other in neighbors.iter().filter(|&&l| l > 0 && l != min_label) {
                        union(&mut parent, min_label, other);
                    }
                }
            }
        }
    }

    for i in 1..next_label as usize {
        parent[i] = find(&parent, i as u32);
    }

    // Pass 2: compact root labels in raster order and collect stats.
    let mut compact = vec![0u32; next_label as usize];
    let mut components: Vec<ComponentStats> = Vec::new();

    for row in 0..h {
        for col in 0..w {
            let lbl = labels[[row, col]];
            if lbl == 0 {
                continue;
            }
            let root = parent[lbl as usize] as usize;
            if compact[root] == 0 {
                components.push(ComponentStats {
                    label: components.len() as u32 + 1,
                    area: 0,
                    bbox: (row, row, col, col),
                    moments: Moments::default(),
                });
                compact[root] = components.len() as u32;
            }
            let final_label = compact[root];
            labels[[row, col]] = final_label;

            let entry = &mut components[(final_label - 1) as usize];
            entry.area += 1;
            entry.bbox.0 = entry.bbox.0.min(row);
            entry.bbox.1 = entry.bbox.1.max(row);
            entry.bbox.2 = entry.bbox.2.min(col);
            entry.bbox.3 = entry.bbox.3.max(col);
            entry.moments.push(row, col);
        }
    }

    Labeling { labels, components }
}

fn find(parent: &[u32], mut x: u32) -> u32 {
    while parent[x as usize] != x {
        x = parent[x as usize];
    }
    x
}

fn union(parent: &mut [u32], a: u32, b: u32) {
    let ra = find(parent, a);
    let rb = find(parent, b);
    if ra != rb {
        let (small, big) = if ra < rb { (ra, rb) } else { (rb, ra) };
        parent[big as usize] = small;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagonal_pixels_form_one_component() {
        let mut mask = Array2::from_elem((5, 5), false);
        for i in 0..5 {
            mask[[i, i]] = true;
        }
        let labeling = label_components(&mask);
        assert_eq!(labeling.components.len(), 1);
        assert_eq!(labeling.components[0].area, 5);
    }

    #[test]
    fn labels_follow_raster_order() {
        // A "V" shape: two arms that merge on the last row, plus a later blob.
        let mut mask = Array2::from_elem((4, 8), false);
        mask[[0, 0]] = true;
        mask[[0, 4]] = true;
        mask[[1, 1]] = true;
        mask[[1, 3]] = true;
        mask[[2, 2]] = true;
        mask[[3, 7]] = true;
        let labeling = label_components(&mask);
        assert_eq!(labeling.components.len(), 2);
        assert_eq!(labeling.labels[[0, 0]], 1);
        assert_eq!(labeling.labels[[0, 4]], 1);
        assert_eq!(labeling.labels[[3, 7]], 2);
        assert_eq!(labeling.components[0].area, 5);
    }

    #[test]
    fn select_keeps_only_accepted_components() {
        let mut mask = Array2::from_elem((3, 6), false);
        mask[[0, 0]] = true;
        mask[[0, 1]] = true;
        mask[[2, 5]] = true;
        let labeling = label_components(&mask);
        let kept = labeling.select(|c| c.area >= 2);
        assert!(kept[[0, 0]] && kept[[0, 1]]);
        assert!(!kept[[2, 5]]);
    }
}
