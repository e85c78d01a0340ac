use crate::data::RegionStore;
use crate::types::Color;
use anyhow::{Context, Result};
use geo::{Coord, Point, Rect};
use image::imageops::FilterType;
use image::{ImageBuffer, ImageFormat, Rgba, RgbaImage};
use rayon::prelude::*;
use std::io::Cursor;
use std::path::Path;

/// Fraction of the frame left empty on each side of the map.
const MARGIN: f64 = 0.05;

/// Size the flag affordance is scaled to.
pub const FLAG_SIZE: (u32, u32) = (200, 120);

/// Equal-aspect fit of a map's bounds into a frame, y axis pointing up.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    width: u32,
    height: u32,
    origin: Coord<f64>,
    scale: f64,
    offset_x: f64,
    offset_y: f64,
}

impl Viewport {
    pub fn fit(bounds: Rect<f64>, width: u32, height: u32) -> Self {
        let span = |s: f64| if s > 0.0 { s } else { 1.0 };
        let span_x = span(bounds.width());
        let span_y = span(bounds.height());

        let usable = 1.0 - 2.0 * MARGIN;
        let scale = (width as f64 * usable / span_x).min(height as f64 * usable / span_y);

        Self {
            width,
            height,
            origin: Coord {
                x: bounds.min().x,
                y: bounds.max().y,
            },
            scale,
            offset_x: (width as f64 - span_x * scale) / 2.0,
            offset_y: (height as f64 - span_y * scale) / 2.0,
        }
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn to_pixel(&self, c: Coord<f64>) -> (f64, f64) {
        (
            self.offset_x + (c.x - self.origin.x) * self.scale,
            self.offset_y + (self.origin.y - c.y) * self.scale,
        )
    }

    /// Map coordinate under a frame pixel; `None` outside the frame.
    pub fn to_map(&self, px: f64, py: f64) -> Option<Point<f64>> {
        let inside = px >= 0.0 && py >= 0.0 && px < self.width as f64 && py < self.height as f64;
        if !inside {
            return None;
        }
        Some(Point::new(
            self.origin.x + (px - self.offset_x) / self.scale,
            self.origin.y - (py - self.offset_y) / self.scale,
        ))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FrameStyle {
    pub background: Color,
    pub border: Color,
    pub border_width: u32,
}

struct ProjectedRegion {
    fill: Rgba<u8>,
    rings: Vec<Vec<(f64, f64)>>,
    top: f64,
    bottom: f64,
}

fn project(store: &RegionStore, viewport: &Viewport) -> Vec<ProjectedRegion> {
    store
        .colors()
        .map(|(region, color)| {
            let rings: Vec<Vec<(f64, f64)>> = region
                .geometry
                .0
                .iter()
                .flat_map(|polygon| std::iter::once(polygon.exterior()).chain(polygon.interiors()))
                .map(|ring| ring.coords().map(|c| viewport.to_pixel(*c)).collect())
                .collect();

            let (top, bottom) = rings
                .iter()
                .flatten()
                .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| {
                    (lo.min(p.1), hi.max(p.1))
                });

            ProjectedRegion {
                fill: color.to_rgba(),
                rings,
                top,
                bottom,
            }
        })
        .collect()
}

/// Draws every region with its current color over the background.
///
/// Regions are painted in load order, fills first (even-odd, per pixel
/// center) and then borders. No axes or other decorations.
pub fn draw_map(store: &RegionStore, viewport: &Viewport, style: &FrameStyle) -> RgbaImage {
    let (width, height) = viewport.size();
    let mut img: RgbaImage = ImageBuffer::from_pixel(width, height, style.background.to_rgba());
    let regions = project(store, viewport);

    let row_len = width as usize * 4;
    img.par_chunks_mut(row_len)
        .enumerate()
        .for_each(|(y, row)| fill_row(row, y as f64 + 0.5, width, &regions));

    if style.border_width > 0 {
        let border = style.border.to_rgba();
        for region in &regions {
            for ring in &region.rings {
                for edge in ring.windows(2) {
                    draw_line(&mut img, edge[0], edge[1], style.border_width, border);
                }
            }
        }
    }

    img
}

fn fill_row(row: &mut [u8], yc: f64, width: u32, regions: &[ProjectedRegion]) {
    let mut crossings: Vec<f64> = Vec::new();

    for region in regions {
        if yc < region.top || yc > region.bottom {
            continue;
        }

        crossings.clear();
        for ring in &region.rings {
            for edge in ring.windows(2) {
                let (a, b) = (edge[0], edge[1]);
                if (a.1 <= yc) != (b.1 <= yc) {
                    crossings.push(a.0 + (yc - a.1) * (b.0 - a.0) / (b.1 - a.1));
                }
            }
        }
        crossings.sort_by(f64::total_cmp);

        for span in crossings.chunks_exact(2) {
            // Pixel x is covered when its center x + 0.5 lies in [span[0], span[1]).
            let start = (span[0] - 0.5).ceil().max(0.0) as u32;
            let end = ((span[1] - 0.5).ceil().max(0.0) as u32).min(width);
            for x in start..end {
                let i = x as usize * 4;
                row[i..i + 4].copy_from_slice(&region.fill.0);
            }
        }
    }
}

fn draw_line(img: &mut RgbaImage, a: (f64, f64), b: (f64, f64), thickness: u32, color: Rgba<u8>) {
    let (mut x0, mut y0) = (a.0.floor() as i64, a.1.floor() as i64);
    let (x1, y1) = (b.0.floor() as i64, b.1.floor() as i64);
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        stamp(img, x0, y0, thickness, color);
        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

fn stamp(img: &mut RgbaImage, cx: i64, cy: i64, thickness: u32, color: Rgba<u8>) {
    let half = (thickness as i64 - 1) / 2;
    let (w, h) = (img.width() as i64, img.height() as i64);
    for y in cy - half..cy - half + thickness as i64 {
        for x in cx - half..cx - half + thickness as i64 {
            if x >= 0 && y >= 0 && x < w && y < h {
                img.put_pixel(x as u32, y as u32, color);
            }
        }
    }
}

pub fn encode_png(img: &RgbaImage) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .context("Failed to encode PNG")?;
    Ok(bytes)
}

pub fn save_png(img: &RgbaImage, path: &Path) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create output directory: {:?}", dir))?;
    }
    img.save_with_format(path, ImageFormat::Png)
        .with_context(|| format!("Failed to save frame: {:?}", path))
}

/// Loads a flag image and scales it to [`FLAG_SIZE`].
pub fn load_flag(path: &Path) -> Result<RgbaImage> {
    let img = image::open(path).with_context(|| format!("Failed to open flag image: {:?}", path))?;
    let (w, h) = FLAG_SIZE;
    Ok(image::imageops::resize(&img.to_rgba8(), w, h, FilterType::Triangle))
}
