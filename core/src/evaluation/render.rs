//! Confusion-matrix heat map written as PNG.
//!
//! Actual classes run down the rows, predicted classes across the columns.
//! Each cell is shaded from white to dark blue by its count and annotated
//! with the count itself. Class labels sit along both axes under the
//! `Actual`/`Predicted` axis titles, with the plot title on top. Text is
//! drawn in capitals with a 3x5 bitmap font.

use crate::evaluation::confusion::ConfusionMatrix;
use crate::error::{Error, Result};
use image::{Rgb, RgbImage};
use std::path::Path;
use tracing::debug;

const CELL: u32 = 120;
const MARGIN: u32 = 24;
const GAP: u32 = 12;
const COUNT_SCALE: u32 = 6;
const TEXT_SCALE: u32 = 3;
const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const INK: Rgb<u8> = Rgb([20, 20, 20]);
const LIGHT: [f64; 3] = [247.0, 251.0, 255.0];
const DARK: [f64; 3] = [8.0, 48.0, 107.0];

/// Render `matrix` to `path`; `labels` must have one entry per class
pub fn render_confusion_matrix(
    matrix: &ConfusionMatrix,
    labels: &[String],
    title: &str,
    path: &Path,
) -> Result<()> {
    let n = matrix.n_classes() as u32;
    if n == 0 || labels.len() != n as usize {
        return Err(Error::InvalidInput(format!(
            "Need one label per class: {} labels for {} classes",
            labels.len(),
            n
        )));
    }

    let layout = Layout::new(n, labels, title);
    let mut canvas = RgbImage::from_pixel(layout.width, layout.height, BACKGROUND);
    let max = matrix.max_count().max(1) as f64;

    for actual in 0..n {
        for predicted in 0..n {
            let count = matrix.get(actual as usize, predicted as usize);
            let intensity = count as f64 / max;

            let (x0, y0) = layout.cell_origin(actual, predicted);
            fill_rect(&mut canvas, x0 + 1, y0 + 1, CELL - 2, CELL - 2, shade(intensity));

            let ink = if intensity > 0.5 {
                Rgb([255, 255, 255])
            } else {
                INK
            };
            draw_centered(
                &mut canvas,
                &count.to_string(),
                x0 + CELL / 2,
                y0 + CELL / 2,
                COUNT_SCALE,
                ink,
            );
        }
    }

    layout.draw_annotations(&mut canvas, labels, title);

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    canvas.save(path)?;
    debug!("Rendered {}x{} confusion matrix to {}", n, n, path.display());
    Ok(())
}

/// Where the grid and text go for a given matrix size and set of strings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Layout {
    n: u32,
    left: u32,
    top: u32,
    width: u32,
    height: u32,
    label_scale: u32,
}

impl Layout {
    fn new(n: u32, labels: &[String], title: &str) -> Self {
        let longest = labels
            .iter()
            .map(|label| fitted(label).chars().count() as u32)
            .max()
            .unwrap_or(1)
            .max(1);
        let label_scale = ((CELL - 8) / (4 * longest)).clamp(1, TEXT_SCALE);
        let row_label_width = labels
            .iter()
            .map(|label| text_width(&fitted(label), label_scale))
            .max()
            .unwrap_or(0);

        let grid = CELL * n;
        let left = MARGIN + 3 * TEXT_SCALE + GAP + row_label_width + GAP;
        let top = MARGIN + 5 * TEXT_SCALE + GAP;
        let bottom = GAP + 5 * label_scale + GAP + 5 * TEXT_SCALE + MARGIN;

        Self {
            n,
            left,
            top,
            width: (left + grid + MARGIN).max(text_width(title, TEXT_SCALE) + 2 * MARGIN),
            height: top + grid + bottom,
            label_scale,
        }
    }

    fn cell_origin(&self, actual: u32, predicted: u32) -> (u32, u32) {
        (self.left + predicted * CELL, self.top + actual * CELL)
    }

    fn draw_annotations(&self, canvas: &mut RgbImage, labels: &[String], title: &str) {
        let grid = CELL * self.n;
        let label_height = 5 * self.label_scale;

        draw_centered(
            canvas,
            title,
            self.width / 2,
            MARGIN + 5 * TEXT_SCALE / 2,
            TEXT_SCALE,
            INK,
        );

        for (i, label) in labels.iter().enumerate() {
            let label = fitted(label);
            let offset = i as u32 * CELL + CELL / 2;

            // Column labels under the grid
            draw_centered(
                canvas,
                &label,
                self.left + offset,
                self.top + grid + GAP + label_height / 2,
                self.label_scale,
                INK,
            );

            // Row labels right-aligned against the grid
            let x = self.left - GAP - text_width(&label, self.label_scale);
            draw_text(
                canvas,
                &label,
                x,
                (self.top + offset).saturating_sub(label_height / 2),
                self.label_scale,
                INK,
            );
        }

        draw_centered(
            canvas,
            "Predicted",
            self.left + grid / 2,
            self.top + grid + GAP + label_height + GAP + 5 * TEXT_SCALE / 2,
            TEXT_SCALE,
            INK,
        );
        draw_vertical(canvas, "Actual", MARGIN, self.top + grid / 2, TEXT_SCALE, INK);
    }
}

/// Labels longer than a cell at the smallest scale are cut
fn fitted(label: &str) -> String {
    let max_chars = ((CELL - 8) / 4) as usize;
    label.chars().take(max_chars).collect()
}

fn shade(intensity: f64) -> Rgb<u8> {
    let t = intensity.clamp(0.0, 1.0);
    let channel = |i: usize| (LIGHT[i] + (DARK[i] - LIGHT[i]) * t).round() as u8;
    Rgb([channel(0), channel(1), channel(2)])
}

fn fill_rect(canvas: &mut RgbImage, x0: u32, y0: u32, width: u32, height: u32, color: Rgb<u8>) {
    for y in y0..(y0 + height).min(canvas.height()) {
        for x in x0..(x0 + width).min(canvas.width()) {
            canvas.put_pixel(x, y, color);
        }
    }
}

fn text_width(text: &str, scale: u32) -> u32 {
    let chars = text.chars().count() as u32;
    (4 * chars).saturating_sub(1) * scale
}

/// Draw `text` with its top-left corner at (`x`, `y`)
fn draw_text(canvas: &mut RgbImage, text: &str, x: u32, y: u32, scale: u32, color: Rgb<u8>) {
    for (i, c) in text.chars().enumerate() {
        draw_glyph(canvas, c, x + i as u32 * 4 * scale, y, scale, color);
    }
}

/// Draw `text` centred on (`cx`, `cy`)
fn draw_centered(canvas: &mut RgbImage, text: &str, cx: u32, cy: u32, scale: u32, color: Rgb<u8>) {
    let x = cx.saturating_sub(text_width(text, scale) / 2);
    let y = cy.saturating_sub(5 * scale / 2);
    draw_text(canvas, text, x, y, scale, color);
}

/// Draw `text` top to bottom, one character per line, centred on `cy`
fn draw_vertical(canvas: &mut RgbImage, text: &str, x: u32, cy: u32, scale: u32, color: Rgb<u8>) {
    let line = 6 * scale;
    let height = (text.chars().count() as u32 * line).saturating_sub(scale);
    let top = cy.saturating_sub(height / 2);
    for (i, c) in text.chars().enumerate() {
        draw_glyph(canvas, c, x, top + i as u32 * line, scale, color);
    }
}

fn draw_glyph(canvas: &mut RgbImage, c: char, x: u32, y: u32, scale: u32, color: Rgb<u8>) {
    for (row, bits) in glyph(c).iter().enumerate() {
        for col in 0..3u32 {
            if bits & (0b100 >> col) != 0 {
                fill_rect(
                    canvas,
                    x + col * scale,
                    y + row as u32 * scale,
                    scale,
                    scale,
                    color,
                );
            }
        }
    }
}

/// 3x5 bitmap, one row per entry, high bit on the left
fn glyph(c: char) -> [u8; 5] {
    match c.to_ascii_uppercase() {
        '0' => [0b111, 0b101, 0b101, 0b101, 0b111],
        '1' => [0b010, 0b110, 0b010, 0b010, 0b111],
        '2' => [0b111, 0b001, 0b111, 0b100, 0b111],
        '3' => [0b111, 0b001, 0b111, 0b001, 0b111],
        '4' => [0b101, 0b101, 0b111, 0b001, 0b001],
        '5' => [0b111, 0b100, 0b111, 0b001, 0b111],
        '6' => [0b111, 0b100, 0b111, 0b101, 0b111],
        '7' => [0b111, 0b001, 0b010, 0b010, 0b010],
        '8' => [0b111, 0b101, 0b111, 0b101, 0b111],
        '9' => [0b111, 0b101, 0b111, 0b001, 0b111],
        'A' => [0b010, 0b101, 0b111, 0b101, 0b101],
        'B' => [0b110, 0b101, 0b110, 0b101, 0b110],
        'C' => [0b011, 0b100, 0b100, 0b100, 0b011],
        'D' => [0b110, 0b101, 0b101, 0b101, 0b110],
        'E' => [0b111, 0b100, 0b110, 0b100, 0b111],
        'F' => [0b111, 0b100, 0b110, 0b100, 0b100],
        'G' => [0b011, 0b100, 0b101, 0b101, 0b011],
        'H' => [0b101, 0b101, 0b111, 0b101, 0b101],
        'I' => [0b111, 0b010, 0b010, 0b010, 0b111],
        'J' => [0b001, 0b001, 0b001, 0b101, 0b010],
        'K' => [0b101, 0b101, 0b110, 0b101, 0b101],
        'L' => [0b100, 0b100, 0b100, 0b100, 0b111],
        'M' => [0b101, 0b111, 0b111, 0b101, 0b101],
        'N' => [0b110, 0b101, 0b101, 0b101, 0b101],
        'O' => [0b010, 0b101, 0b101, 0b101, 0b010],
        'P' => [0b110, 0b101, 0b110, 0b100, 0b100],
        'Q' => [0b010, 0b101, 0b101, 0b110, 0b011],
        'R' => [0b110, 0b101, 0b110, 0b101, 0b101],
        'S' => [0b011, 0b100, 0b010, 0b001, 0b110],
        'T' => [0b111, 0b010, 0b010, 0b010, 0b010],
        'U' => [0b101, 0b101, 0b101, 0b101, 0b111],
        'V' => [0b101, 0b101, 0b101, 0b101, 0b010],
        'W' => [0b101, 0b101, 0b111, 0b111, 0b101],
        'X' => [0b101, 0b101, 0b010, 0b101, 0b101],
        'Y' => [0b101, 0b101, 0b010, 0b010, 0b010],
        'Z' => [0b111, 0b001, 0b010, 0b100, 0b111],
        ' ' => [0; 5],
        '-' => [0b000, 0b000, 0b111, 0b000, 0b000],
        '_' => [0b000, 0b000, 0b000, 0b000, 0b111],
        '.' => [0b000, 0b000, 0b000, 0b000, 0b010],
        '(' => [0b001, 0b010, 0b010, 0b010, 0b001],
        ')' => [0b100, 0b010, 0b010, 0b010, 0b100],
        _ => [0b111, 0b001, 0b010, 0b000, 0b010],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array1;

    fn labels(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn binary_matrix() -> ConfusionMatrix {
        let y_true = Array1::from(vec![0, 0, 1, 1, 1]);
        let y_pred = Array1::from(vec![0, 1, 1, 1, 1]);
        ConfusionMatrix::new(&y_true, &y_pred, 2).unwrap()
    }

    fn render_to_bytes(matrix: &ConfusionMatrix, labels: &[String], title: &str) -> Vec<u8> {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("confusion_matrix.png");
        render_confusion_matrix(matrix, labels, title, &path).unwrap();
        std::fs::read(&path).unwrap()
    }

    #[test]
    fn test_cells_follow_the_layout() {
        let matrix = binary_matrix();
        let names = labels(&["Normal", "Legendary"]);
        let title = "Legendary Prediction Confusion Matrix";

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("confusion_matrix.png");
        render_confusion_matrix(&matrix, &names, title, &path).unwrap();

        let image = image::open(&path).unwrap().to_rgb8();
        let layout = Layout::new(2, &names, title);
        assert_eq!((image.width(), image.height()), (layout.width, layout.height));
        assert!(layout.width >= text_width(title, TEXT_SCALE) + 2 * MARGIN);

        // Busiest cell (actual 1, predicted 1) is the darkest
        let (x, y) = layout.cell_origin(1, 1);
        assert_eq!(*image.get_pixel(x + 3, y + 3), shade(1.0));
        let (x, y) = layout.cell_origin(1, 0);
        assert_eq!(*image.get_pixel(x + 3, y + 3), shade(0.0));
    }

    #[test]
    fn test_labels_are_drawn() {
        let matrix = binary_matrix();
        // Same lengths keep the layout identical, so only the text differs
        let normal = render_to_bytes(&matrix, &labels(&["Normal", "Legend"]), "Confusion Matrix");
        let other = render_to_bytes(&matrix, &labels(&["Common", "Mythic"]), "Confusion Matrix");
        assert_ne!(normal, other);

        let retitled = render_to_bytes(&matrix, &labels(&["Normal", "Legend"]), "Confusion Mapping");
        assert_ne!(normal, retitled);
    }

    #[test]
    fn test_row_labels_sit_left_of_the_grid() {
        let matrix = binary_matrix();
        let names = labels(&["Normal", "Legendary"]);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("confusion_matrix.png");
        render_confusion_matrix(&matrix, &names, "Confusion Matrix", &path).unwrap();

        let image = image::open(&path).unwrap().to_rgb8();
        let layout = Layout::new(2, &names, "Confusion Matrix");
        let ink_left_of_grid = (layout.top..layout.top + CELL)
            .flat_map(|y| (MARGIN + 3 * TEXT_SCALE..layout.left).map(move |x| (x, y)))
            .any(|(x, y)| *image.get_pixel(x, y) == INK);
        assert!(ink_left_of_grid);
    }

    #[test]
    fn test_glyphs_ignore_case() {
        assert_eq!(glyph('a'), glyph('A'));
        assert_ne!(glyph('N'), glyph('L'));
        assert_eq!(glyph(' '), [0; 5]);
    }

    #[test]
    fn test_label_count_must_match() {
        let y = Array1::from(vec![0, 1]);
        let matrix = ConfusionMatrix::new(&y, &y, 2).unwrap();
        let dir = tempfile::tempdir().unwrap();
        assert!(render_confusion_matrix(
            &matrix,
            &labels(&["only"]),
            "Confusion Matrix",
            &dir.path().join("x.png")
        )
        .is_err());
    }
}
