use image::{GrayImage, Luma, Rgb, RgbImage, imageops};

// L1 Sobel magnitude above which a pixel counts as an edge.
const EDGE_THRESHOLD: i32 = 150;
const CHANNEL_SHIFT_PX: f32 = 25.0;

/// Effect strength at `t_secs` into the montage: `0.5 + 0.3·sin(2πt)`.
pub fn pulse_intensity(t_secs: f64) -> f32 {
    (0.5 + 0.3 * (2.0 * std::f64::consts::PI * t_secs).sin()) as f32
}

/// Splits a still shown from `start_secs` for `duration_secs` into
/// frame-rate slots, so the pulse moves while the still is on screen.
/// Slot lengths always sum to `duration_secs`.
pub fn pulse_slots(start_secs: f64, duration_secs: f64, fps: u32) -> Vec<(f64, f64)> {
    let n = (duration_secs * fps.max(1) as f64).ceil().max(1.0) as usize;
    let step = duration_secs / n as f64;
    (0..n)
        .map(|k| (start_secs + k as f64 * step, step))
        .collect()
}

/// Blurred edge maps of one still. They do not depend on intensity, so one
/// instance serves every pulse frame rendered from that still.
pub struct EdgeGlow {
    fine: GrayImage,
    glow: GrayImage,
}

impl EdgeGlow {
    pub fn of(frame: &RgbImage) -> Self {
        let edges = edge_map(frame);
        Self {
            fine: imageops::blur(&edges, 2.0),
            glow: imageops::blur(&edges, 5.0),
        }
    }
}

/// Chromatic split plus glowing edges.
///
/// Red rolls right and blue rolls left by `25·intensity` pixels (wrapping).
/// The edge map is blurred twice: a tight blur (σ 2) brightens green, a wide
/// one (σ 5) glows into red and blue. The result gets a 1.2× boost.
pub fn psychedelic(frame: &RgbImage, edges: &EdgeGlow, intensity: f32) -> RgbImage {
    let (w, h) = frame.dimensions();
    if w == 0 || h == 0 {
        return frame.clone();
    }

    let shift = (CHANNEL_SHIFT_PX * intensity) as i64;

    let mut out = RgbImage::new(w, h);
    for y in 0..h {
        for x in 0..w {
            let rx = (x as i64 - shift).rem_euclid(w as i64) as u32;
            let bx = (x as i64 + shift).rem_euclid(w as i64) as u32;

            let fine = unit(edges.fine.get_pixel(x, y)[0]);
            let glow = unit(edges.glow.get_pixel(x, y)[0]);

            let r = (unit(frame.get_pixel(rx, y)[0]) + glow * 0.3 * intensity).clamp(0.0, 1.0);
            let g = (unit(frame.get_pixel(x, y)[1]) + fine * 0.5 * intensity).clamp(0.0, 1.0);
            let b = (unit(frame.get_pixel(bx, y)[2]) + glow * 0.3 * intensity).clamp(0.0, 1.0);

            out.put_pixel(x, y, Rgb([boost(r), boost(g), boost(b)]));
        }
    }
    out
}

fn edge_map(frame: &RgbImage) -> GrayImage {
    let gray = imageops::grayscale(frame);
    let (w, h) = gray.dimensions();
    let mut edges = GrayImage::new(w, h);
    if w < 3 || h < 3 {
        return edges;
    }

    let px = |x: u32, y: u32| gray.get_pixel(x, y)[0] as i32;
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let gx = px(x + 1, y - 1) + 2 * px(x + 1, y) + px(x + 1, y + 1)
                - px(x - 1, y - 1)
                - 2 * px(x - 1, y)
                - px(x - 1, y + 1);
            let gy = px(x - 1, y + 1) + 2 * px(x, y + 1) + px(x + 1, y + 1)
                - px(x - 1, y - 1)
                - 2 * px(x, y - 1)
                - px(x + 1, y - 1);
            if gx.abs() + gy.abs() >= EDGE_THRESHOLD {
                edges.put_pixel(x, y, Luma([255]));
            }
        }
    }
    edges
}

fn unit(v: u8) -> f32 {
    v as f32 / 255.0
}

fn boost(v: f32) -> u8 {
    ((v * 1.2).clamp(0.0, 1.0) * 255.0) as u8
}
