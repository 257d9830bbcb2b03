//! ASCII plotting for terminal output.
//!
//! This is intentionally "dumb" (fixed-size grid), optimized for:
//! - quick visual sanity checks of monthly volume in a terminal
//! - deterministic output (helpful for golden tests)
//!
//! Plot elements:
//! - monthly totals: `o`
//! - connecting line: `-`

use crate::app::pipeline::MonthTotal;

/// Render total units per grid month as a line chart.
pub fn render_monthly_plot(totals: &[MonthTotal], width: usize, height: usize) -> String {
    let (Some(first), Some(last)) = (totals.first(), totals.last()) else {
        return "Monthly units: no data\n".to_string();
    };
    let width = width.max(10);
    let height = height.max(5);

    let x_max = (totals.len() as f64 - 1.0).max(1.0);
    let (y_min, y_max) = y_range(totals);
    let (y_min, y_max) = pad_range(y_min, y_max, 0.05);

    let points: Vec<(usize, usize)> = totals
        .iter()
        .enumerate()
        .map(|(i, t)| (map_x(i as f64, 0.0, x_max, width), map_y(t.units, y_min, y_max, height)))
        .collect();

    let mut grid = vec![vec![' '; width]; height];
    for w in points.windows(2) {
        let ((x0, y0), (x1, y1)) = (w[0], w[1]);
        draw_line(&mut grid, x0, y0, x1, y1, '-');
    }
    for &(x, y) in &points {
        grid[y][x] = 'o';
    }

    let mut out = String::new();
    out.push_str(&format!(
        "Monthly units: {}..{} | y=[{y_min:.2}, {y_max:.2}]\n",
        first.month, last.month
    ));
    for row in grid {
        out.push_str(&row.into_iter().collect::<String>());
        out.push('\n');
    }
    out
}

fn y_range(totals: &[MonthTotal]) -> (f64, f64) {
    let min = totals.iter().map(|t| t.units).fold(f64::INFINITY, f64::min);
    let max = totals.iter().map(|t| t.units).fold(f64::NEG_INFINITY, f64::max);
    if !(min.is_finite() && max.is_finite()) {
        return (0.0, 1.0);
    }
    if max > min { (min, max) } else { (min - 1.0, max + 1.0) }
}

fn pad_range(min: f64, max: f64, frac: f64) -> (f64, f64) {
    let span = (max - min).abs();
    let pad = (span * frac).max(1e-12);
    (min - pad, max + pad)
}

fn map_x(t: f64, t_min: f64, t_max: f64, width: usize) -> usize {
    let width = width.max(2);
    let u = ((t - t_min) / (t_max - t_min)).clamp(0.0, 1.0);
    (u * (width as f64 - 1.0)).round() as usize
}

fn map_y(y: f64, y_min: f64, y_max: f64, height: usize) -> usize {
    let height = height.max(2);
    let u = ((y - y_min) / (y_max - y_min)).clamp(0.0, 1.0);
    // y=top is max -> row 0
    (height as f64 - 1.0 - (u * (height as f64 - 1.0))).round() as usize
}

/// Integer line drawing (Bresenham-ish).
fn draw_line(grid: &mut [Vec<char>], x0: usize, y0: usize, x1: usize, y1: usize, ch: char) {
    let mut x0 = x0 as isize;
    let mut y0 = y0 as isize;
    let x1 = x1 as isize;
    let y1 = y1 as isize;

    let dx = (x1 - x0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let dy = -(y1 - y0).abs();
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        if y0 >= 0
            && (y0 as usize) < grid.len()
            && x0 >= 0
            && (x0 as usize) < grid[0].len()
            && grid[y0 as usize][x0 as usize] == ' '
        {
            grid[y0 as usize][x0 as usize] = ch;
        }

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
