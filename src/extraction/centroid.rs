//! # Streak centroiding
//!
//! Detection of the satellite streak in a single frame:
//!
//! 1. the `top_k` brightest pixels seed the search,
//! 2. each seed is dilated into a disc of `dilation_radius` pixels; the union is the mask,
//! 3. masked pixels strictly above `mean + k·σ` of the masked intensities are foreground,
//! 4. foreground pixels are labelled into connected components (union-find, 4- or
//!    8-connectivity),
//! 5. components whose bounding box spans fewer than `min_bbox_size` pixels in both
//!    directions are discarded,
//! 6. the component with the largest mean intensity wins; its centroid is the center of
//!    its bounding box.
//!
//! A frame without any surviving component yields [`FrameDetection::NoDetection`].

use hifitime::Epoch;
use log::debug;
use serde::Serialize;

use crate::constants::Seconds;
use crate::time::add_seconds;
use crate::tlefit_errors::TleFitError;

/// Row-major intensity image with its exposure timing.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pixels: Vec<f64>,
    width: usize,
    height: usize,
    pub exposure_start: Epoch,
    pub exposure_duration: Seconds,
}

impl Frame {
    /// Errors
    /// ----------
    /// * [`TleFitError::InvalidExtractionParameter`] when `pixels.len() != width * height`,
    ///   the frame is empty or the exposure duration is negative or non-finite.
    pub fn new(
        pixels: Vec<f64>,
        width: usize,
        height: usize,
        exposure_start: Epoch,
        exposure_duration: Seconds,
    ) -> Result<Self, TleFitError> {
        if width == 0 || height == 0 || pixels.len() != width * height {
            return Err(TleFitError::InvalidExtractionParameter(format!(
                "{} pixels do not form a {width}x{height} frame",
                pixels.len()
            )));
        }
        if !(exposure_duration.is_finite() && exposure_duration >= 0.0) {
            return Err(TleFitError::InvalidExtractionParameter(format!(
                "exposure duration {exposure_duration} s"
            )));
        }
        Ok(Frame {
            pixels,
            width,
            height,
            exposure_start,
            exposure_duration,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn pixels(&self) -> &[f64] {
        &self.pixels
    }

    #[inline]
    pub fn at(&self, row: usize, col: usize) -> f64 {
        self.pixels[row * self.width + col]
    }

    /// Middle of the exposure.
    pub fn mid_exposure(&self) -> Epoch {
        add_seconds(self.exposure_start, 0.5 * self.exposure_duration)
    }
}

/// Pixel adjacency used for component labelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum Connectivity {
    Four,
    #[default]
    Eight,
}

/// Tuning of [`detect_streak`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CentroidParams {
    /// Number of brightest pixels seeding the mask.
    pub top_k: usize,
    /// Radius, in pixels, of the disc grown around each seed.
    pub dilation_radius: usize,
    /// Threshold multiplier `k` in `mean + k·σ`.
    pub sigma_k: f64,
    pub connectivity: Connectivity,
    /// Minimum bounding-box extent (rows or columns) of an accepted component.
    pub min_bbox_size: usize,
}

impl Default for CentroidParams {
    fn default() -> Self {
        CentroidParams {
            top_k: 20,
            dilation_radius: 4,
            sigma_k: 2.0,
            connectivity: Connectivity::Eight,
            min_bbox_size: 2,
        }
    }
}

impl CentroidParams {
    pub fn validate(&self) -> Result<(), TleFitError> {
        if self.top_k == 0 {
            return Err(TleFitError::InvalidExtractionParameter(
                "top_k must be at least 1".into(),
            ));
        }
        if !(self.sigma_k.is_finite() && self.sigma_k >= 0.0) {
            return Err(TleFitError::InvalidExtractionParameter(format!(
                "sigma_k must be finite and non-negative, got {}",
                self.sigma_k
            )));
        }
        if self.min_bbox_size == 0 {
            return Err(TleFitError::InvalidExtractionParameter(
                "min_bbox_size must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Inclusive pixel bounds of a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BoundingBox {
    pub min_row: usize,
    pub max_row: usize,
    pub min_col: usize,
    pub max_col: usize,
}

impl BoundingBox {
    fn from_pixel(row: usize, col: usize) -> Self {
        BoundingBox {
            min_row: row,
            max_row: row,
            min_col: col,
            max_col: col,
        }
    }

    fn include(&mut self, row: usize, col: usize) {
        self.min_row = self.min_row.min(row);
        self.max_row = self.max_row.max(row);
        self.min_col = self.min_col.min(col);
        self.max_col = self.max_col.max(col);
    }

    pub fn width(&self) -> usize {
        self.max_col - self.min_col + 1
    }

    pub fn height(&self) -> usize {
        self.max_row - self.min_row + 1
    }

    /// Center as fractional `(row, col)`.
    pub fn center(&self) -> (f64, f64) {
        (
            0.5 * (self.min_row + self.max_row) as f64,
            0.5 * (self.min_col + self.max_col) as f64,
        )
    }

    pub fn touches_border(&self, width: usize, height: usize) -> bool {
        self.min_row == 0 || self.min_col == 0 || self.max_row + 1 == height || self.max_col + 1 == width
    }
}

/// Connected foreground component.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Blob {
    /// Member pixels as `(row, col)`.
    pub pixels: Vec<(usize, usize)>,
    pub bbox: BoundingBox,
    pub mean_intensity: f64,
}

/// Selected streak of a frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Detection {
    pub blob: Blob,
    /// Bounding-box center, `(row, col)`.
    pub centroid: (f64, f64),
    /// Threshold used for the foreground.
    pub threshold: f64,
}

impl Detection {
    pub fn touches_border(&self, frame: &Frame) -> bool {
        self.blob.bbox.touches_border(frame.width, frame.height)
    }
}

/// Outcome of [`detect_streak`] on one frame.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameDetection {
    Detected(Detection),
    NoDetection,
}

impl FrameDetection {
    pub fn detection(&self) -> Option<&Detection> {
        match self {
            FrameDetection::Detected(d) => Some(d),
            FrameDetection::NoDetection => None,
        }
    }
}

/// Flat indices of the `k` brightest pixels, brightest first; ties keep raster order.
pub(crate) fn top_k_indices(pixels: &[f64], k: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..pixels.len()).filter(|&i| pixels[i].is_finite()).collect();
    order.sort_by(|&a, &b| pixels[b].total_cmp(&pixels[a]));
    order.truncate(k);
    order
}

/// Union of discs of `radius` around every seed.
pub(crate) fn dilate(seeds: &[usize], width: usize, height: usize, radius: usize) -> Vec<bool> {
    let mut mask = vec![false; width * height];
    let r = radius as isize;
    for &seed in seeds {
        let (row, col) = ((seed / width) as isize, (seed % width) as isize);
        for dr in -r..=r {
            for dc in -r..=r {
                if dr * dr + dc * dc > r * r {
                    continue;
                }
                let (y, x) = (row + dr, col + dc);
                if y >= 0 && x >= 0 && (y as usize) < height && (x as usize) < width {
                    mask[y as usize * width + x as usize] = true;
                }
            }
        }
    }
    mask
}

/// `mean + k·σ` of the masked pixels (population σ).
fn masked_threshold(pixels: &[f64], mask: &[bool], k: f64) -> Option<f64> {
    let values: Vec<f64> = pixels
        .iter()
        .zip(mask)
        .filter(|(v, &m)| m && v.is_finite())
        .map(|(v, _)| *v)
        .collect();
    if values.is_empty() {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    Some(mean + k * variance.sqrt())
}

fn find(parent: &mut [usize], mut x: usize) -> usize {
    while parent[x] != x {
        parent[x] = parent[parent[x]];
        x = parent[x];
    }
    x
}

fn union(parent: &mut [usize], a: usize, b: usize) {
    let (ra, rb) = (find(parent, a), find(parent, b));
    if ra != rb {
        // the smaller root survives
        parent[ra.max(rb)] = ra.min(rb);
    }
}

/// Two-pass union-find labelling; returns one entry per component, in raster order
/// of their first pixel.
pub(crate) fn label_components(
    foreground: &[bool],
    width: usize,
    height: usize,
    connectivity: Connectivity,
) -> Vec<Vec<(usize, usize)>> {
    let mut labels = vec![0usize; width * height];
    // label 0 is the background
    let mut parent = vec![0usize];

    for row in 0..height {
        for col in 0..width {
            let idx = row * width + col;
            if !foreground[idx] {
                continue;
            }
            let mut neighbours = [0usize; 4];
            if col > 0 {
                neighbours[0] = labels[idx - 1];
            }
            if row > 0 {
                neighbours[1] = labels[idx - width];
                if connectivity == Connectivity::Eight {
                    if col > 0 {
                        neighbours[2] = labels[idx - width - 1];
                    }
                    if col + 1 < width {
                        neighbours[3] = labels[idx - width + 1];
                    }
                }
            }

            match neighbours.iter().copied().filter(|&l| l > 0).min() {
                None => {
                    let label = parent.len();
                    parent.push(label);
                    labels[idx] = label;
                }
                Some(min_label) => {
                    labels[idx] = min_label;
                    for &l in neighbours.iter().filter(|&&l| l > 0) {
                        union(&mut parent, min_label, l);
                    }
                }
            }
        }
    }

    let mut slot_of_root = vec![usize::MAX; parent.len()];
    let mut components: Vec<Vec<(usize, usize)>> = Vec::new();
    for (idx, &label) in labels.iter().enumerate() {
        if label == 0 {
            continue;
        }
        let root = find(&mut parent, label);
        if slot_of_root[root] == usize::MAX {
            slot_of_root[root] = components.len();
            components.push(Vec::new());
        }
        components[slot_of_root[root]].push((idx / width, idx % width));
    }
    components
}

fn to_blob(frame: &Frame, pixels: Vec<(usize, usize)>) -> Option<Blob> {
    let (&(r0, c0), rest) = pixels.split_first()?;
    let mut bbox = BoundingBox::from_pixel(r0, c0);
    for &(r, c) in rest {
        bbox.include(r, c);
    }
    let mean_intensity =
        pixels.iter().map(|&(r, c)| frame.at(r, c)).sum::<f64>() / pixels.len() as f64;
    Some(Blob {
        pixels,
        bbox,
        mean_intensity,
    })
}

/// Locate the brightest streak of `frame`.
///
/// Errors
/// ----------
/// * [`TleFitError::InvalidExtractionParameter`] for invalid `params`.
pub fn detect_streak(frame: &Frame, params: &CentroidParams) -> Result<FrameDetection, TleFitError> {
    params.validate()?;

    let seeds = top_k_indices(&frame.pixels, params.top_k);
    let mask = dilate(&seeds, frame.width, frame.height, params.dilation_radius);
    let Some(threshold) = masked_threshold(&frame.pixels, &mask, params.sigma_k) else {
        return Ok(FrameDetection::NoDetection);
    };

    let foreground: Vec<bool> = frame
        .pixels
        .iter()
        .zip(&mask)
        .map(|(&v, &m)| m && v > threshold)
        .collect();

    let best = label_components(&foreground, frame.width, frame.height, params.connectivity)
        .into_iter()
        .filter_map(|pixels| to_blob(frame, pixels))
        .filter(|b| b.bbox.width() >= params.min_bbox_size || b.bbox.height() >= params.min_bbox_size)
        .max_by(|a, b| a.mean_intensity.total_cmp(&b.mean_intensity));

    Ok(match best {
        Some(blob) => {
            debug!(
                "streak of {} px at bbox {:?}, mean {:.2} > {:.2}",
                blob.pixels.len(),
                blob.bbox,
                blob.mean_intensity,
                threshold
            );
            FrameDetection::Detected(Detection {
                centroid: blob.bbox.center(),
                blob,
                threshold,
            })
        }
        None => FrameDetection::NoDetection,
    })
}
