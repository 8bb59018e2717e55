use ab_glyph::{Font, FontVec, Glyph, PxScale, ScaleFont, point};
use anyhow::{Context, Result, anyhow};
use dt_core::{CircleColor, Key, Side, Stimulus, StimulusKind};
use dt_session::TextScreen;
use dt_timing::Timer;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use string_cache::DefaultAtom as Atom;
use tiny_skia::{Color, FillRule, Paint, PathBuilder, Pixmap, Rect, Transform};
use tracing::warn;

pub const BACKGROUND: [u8; 4] = [41, 43, 45, 255];
pub const FOREGROUND: [u8; 4] = [161, 163, 165, 255];

pub const CIRCLE_RADIUS: f32 = 100.0;
pub const PEDAL_SIZE: (f32, f32) = (150.0, 250.0);
const PEDAL_MARGIN: f32 = 50.0;

const TITLE_PX: f32 = 40.0;
const TEXT_PX: f32 = 26.0;
const LINE_STEP: f32 = TEXT_PX * 1.8;

/// What the canvas should show.
#[derive(Debug, Clone, PartialEq)]
pub enum Scene {
    Blank,
    Loading,
    Text(TextScreen),
    Stimulus {
        kind: StimulusKind,
        placement: (f32, f32),
    },
}

pub struct FrameStats {
    pub clear: Duration,
    pub draw: Duration,
    pub copy: Duration,
    pub total: Duration,
    pub dirty_count: usize,
}

struct TextCache {
    font: Option<FontVec>,
    map: HashMap<(Atom, [u8; 4], u32), Arc<Pixmap>>,
}

impl TextCache {
    fn new(font: Option<FontVec>) -> Self {
        Self {
            font,
            map: HashMap::new(),
        }
    }

    fn get_or_render(&mut self, text: &str, size_px: f32, color: [u8; 4]) -> Option<Arc<Pixmap>> {
        let font = self.font.as_ref()?;
        let key = (Atom::from(text), color, size_px.to_bits());
        if let Some(pm) = self.map.get(&key) {
            return Some(Arc::clone(pm));
        }
        let pm = Arc::new(render_text_pixmap(text, size_px, font, color)?);
        self.map.insert(key, Arc::clone(&pm));
        Some(pm)
    }
}

/// Rasterizes one line of text into a tight, transparent, premultiplied pixmap.
pub fn render_text_pixmap<F: Font>(text: &str, font_size: f32, font: &F, color: [u8; 4]) -> Option<Pixmap> {
    let scale = PxScale::from(font_size);
    let sf = font.as_scaled(scale);

    // baseline at ascent
    let mut pen_x = 0.0f32;
    let mut glyphs = Vec::<Glyph>::new();
    for ch in text.chars() {
        let id = font.glyph_id(ch);
        if let Some(prev) = glyphs.last() {
            pen_x += sf.kern(prev.id, id);
        }
        glyphs.push(Glyph {
            id,
            scale,
            position: point(pen_x, sf.ascent()),
        });
        pen_x += sf.h_advance(id);
    }

    let outlines: Vec<_> = glyphs
        .into_iter()
        .filter_map(|g| font.outline_glyph(g))
        .collect();
    let (mut min_x, mut min_y) = (f32::INFINITY, f32::INFINITY);
    let (mut max_x, mut max_y) = (f32::NEG_INFINITY, f32::NEG_INFINITY);
    for out in &outlines {
        let b = out.px_bounds();
        min_x = min_x.min(b.min.x);
        min_y = min_y.min(b.min.y);
        max_x = max_x.max(b.max.x);
        max_y = max_y.max(b.max.y);
    }
    if outlines.is_empty() {
        return None;
    }

    let w = (max_x.ceil() - min_x.floor()).max(1.0) as u32;
    let h = (max_y.ceil() - min_y.floor()).max(1.0) as u32;
    let mut pm = Pixmap::new(w, h)?;
    let stride = w as usize * 4;
    let dst = pm.data_mut();

    for out in &outlines {
        let b = out.px_bounds();
        out.draw(|x, y, cov| {
            if cov <= f32::EPSILON {
                return;
            }
            let ix = (x as f32 + b.min.x - min_x).floor() as i32;
            let iy = (y as f32 + b.min.y - min_y).floor() as i32;
            if ix < 0 || iy < 0 || ix >= w as i32 || iy >= h as i32 {
                return;
            }
            let i = iy as usize * stride + ix as usize * 4;

            // source premultiplied by coverage, then src-over
            let a = (cov * color[3] as f32 / 255.0).clamp(0.0, 1.0);
            let inv = 1.0 - a;
            for c in 0..3 {
                let src = color[c] as f32 * a;
                dst[i + c] = (src + dst[i + c] as f32 * inv).min(255.0) as u8;
            }
            dst[i + 3] = (a * 255.0 + dst[i + 3] as f32 * inv).min(255.0) as u8;
        });
    }

    Some(pm)
}

/// Draws `src` over `canvas` with its top-left corner at `(x0, y0)` and
/// returns the clipped area it touched.
fn blit_over(canvas: &mut Pixmap, src: &Pixmap, x0: i32, y0: i32) -> Option<Rect> {
    let (cw, ch) = (canvas.width() as i32, canvas.height() as i32);
    let dst_x0 = x0.max(0);
    let dst_y0 = y0.max(0);
    let dst_x1 = (x0 + src.width() as i32).min(cw);
    let dst_y1 = (y0 + src.height() as i32).min(ch);
    if dst_x1 <= dst_x0 || dst_y1 <= dst_y0 {
        return None;
    }

    let src_x = (dst_x0 - x0) as usize;
    let src_y = (dst_y0 - y0) as usize;
    let copy_w = (dst_x1 - dst_x0) as usize;
    let copy_h = (dst_y1 - dst_y0) as usize;
    let src_stride = src.width() as usize * 4;
    let dst_stride = canvas.width() as usize * 4;
    let src_data = src.data();
    let dst_data = canvas.data_mut();

    for row in 0..copy_h {
        let s = (src_y + row) * src_stride + src_x * 4;
        let d = (dst_y0 as usize + row) * dst_stride + dst_x0 as usize * 4;
        let s_row = &src_data[s..s + copy_w * 4];
        let d_row = &mut dst_data[d..d + copy_w * 4];

        if s_row.iter().skip(3).step_by(4).all(|&a| a == 255) {
            d_row.copy_from_slice(s_row);
            continue;
        }
        for (sp, dp) in s_row.chunks_exact(4).zip(d_row.chunks_exact_mut(4)) {
            let inv = 255 - sp[3] as u32;
            for c in 0..4 {
                dp[c] = (sp[c] as u32 + (dp[c] as u32 * inv + 127) / 255).min(255) as u8;
            }
        }
    }

    Rect::from_xywh(dst_x0 as f32, dst_y0 as f32, copy_w as f32, copy_h as f32)
}

fn stimulus_pixmap(kind: StimulusKind) -> Option<Pixmap> {
    let mut paint = Paint::default();
    match kind {
        StimulusKind::Color(color) => {
            let [r, g, b, a] = color.rgba();
            paint.set_color(Color::from_rgba8(r, g, b, a));
            paint.anti_alias = true;
            let size = (CIRCLE_RADIUS * 2.0).ceil() as u32;
            let mut pm = Pixmap::new(size, size)?;
            let mut pb = PathBuilder::new();
            pb.push_circle(CIRCLE_RADIUS, CIRCLE_RADIUS, CIRCLE_RADIUS);
            pm.fill_path(&pb.finish()?, &paint, FillRule::Winding, Transform::identity(), None);
            Some(pm)
        }
        StimulusKind::Pedal(_) => {
            let [r, g, b, a] = CircleColor::White.rgba();
            paint.set_color(Color::from_rgba8(r, g, b, a));
            let mut pm = Pixmap::new(PEDAL_SIZE.0 as u32, PEDAL_SIZE.1 as u32)?;
            pm.fill_rect(
                Rect::from_xywh(0.0, 0.0, PEDAL_SIZE.0, PEDAL_SIZE.1)?,
                &paint,
                Transform::identity(),
                None,
            );
            Some(pm)
        }
        StimulusKind::Tone(_) => None,
    }
}

/// Color used for a hint naming `key`.
fn key_color(key: Option<Key>) -> [u8; 4] {
    match key {
        Some(Key::White) => CircleColor::White.rgba(),
        Some(Key::Yellow) => CircleColor::Yellow.rgba(),
        Some(Key::Green) => CircleColor::Green.rgba(),
        Some(Key::Blue) => CircleColor::Blue.rgba(),
        Some(Key::Red) => CircleColor::Red.rgba(),
        _ => FOREGROUND,
    }
}

fn background_buffer(width: u32, height: u32) -> Vec<u8> {
    BACKGROUND
        .into_iter()
        .cycle()
        .take((width * height * 4) as usize)
        .collect()
}

fn blank_canvas(width: u32, height: u32) -> Result<Pixmap> {
    let mut canvas =
        Pixmap::new(width, height).ok_or_else(|| anyhow!("invalid canvas size {width}x{height}"))?;
    let [r, g, b, a] = BACKGROUND;
    canvas.fill(Color::from_rgba8(r, g, b, a));
    Ok(canvas)
}

/// Software renderer: draws scenes into an offscreen canvas and copies only
/// the regions that changed into the window's frame buffer.
pub struct SkiaRenderer {
    width: u32,
    height: u32,
    canvas: Pixmap,
    stimulus_cache: HashMap<usize, Pixmap>,
    text_cache: TextCache,
    scene: Scene,
    scene_dirty: bool,
    dirty_regions: Vec<Rect>,
    first_frame: bool,
    clear_buffer: Vec<u8>,
}

impl SkiaRenderer {
    pub fn new(width: u32, height: u32, font: Option<FontVec>) -> Result<Self> {
        if font.is_none() {
            warn!("no font loaded, text screens will be blank");
        }
        let mut stimulus_cache = HashMap::new();
        for label in [
            "white",
            "yellow",
            "green",
            "blue",
            "red",
            "left_pedal",
            "right_pedal",
        ] {
            let kind: StimulusKind = label.parse()?;
            if let Some(pm) = stimulus_pixmap(kind) {
                stimulus_cache.insert(kind.cache_id(), pm);
            }
        }

        Ok(Self {
            width,
            height,
            canvas: blank_canvas(width, height)?,
            stimulus_cache,
            text_cache: TextCache::new(font),
            scene: Scene::Blank,
            scene_dirty: true,
            dirty_regions: Vec::with_capacity(16),
            first_frame: true,
            clear_buffer: background_buffer(width, height),
        })
    }

    pub fn load_font(path: &Path) -> Result<FontVec> {
        let bytes = std::fs::read(path).with_context(|| format!("reading font {}", path.display()))?;
        FontVec::try_from_vec(bytes).with_context(|| format!("parsing font {}", path.display()))
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        self.width = width;
        self.height = height;
        self.canvas = blank_canvas(width, height)?;
        self.clear_buffer = background_buffer(width, height);
        self.dirty_regions.clear();
        self.first_frame = true;
        self.scene_dirty = true;
        Ok(())
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn set_scene(&mut self, scene: Scene) {
        if scene != self.scene {
            self.scene = scene;
            self.scene_dirty = true;
        }
    }

    /// Center of a visual stimulus on the current canvas. Circles keep three
    /// radii from every edge; pedals sit in the bottom corners.
    pub fn stimulus_center(&self, kind: StimulusKind, placement: (f32, f32)) -> Option<(f32, f32)> {
        let (w, h) = (self.width as f32, self.height as f32);
        match kind {
            StimulusKind::Color(_) => {
                let margin = CIRCLE_RADIUS * 3.0;
                let span = |extent: f32, p: f32| {
                    let free = extent - 2.0 * margin;
                    if free <= 0.0 {
                        extent * 0.5
                    } else {
                        margin + p.clamp(0.0, 1.0) * free
                    }
                };
                Some((span(w, placement.0), span(h, placement.1)))
            }
            StimulusKind::Pedal(side) => {
                let y = h - PEDAL_MARGIN - PEDAL_SIZE.1 * 0.5;
                let x = match side {
                    Side::Left => PEDAL_MARGIN + PEDAL_SIZE.0 * 0.5,
                    Side::Right => w - PEDAL_MARGIN - PEDAL_SIZE.0 * 0.5,
                };
                Some((x, y))
            }
            StimulusKind::Tone(_) => None,
        }
    }

    /// Redraws if the scene changed and copies the touched regions into
    /// `frame_buffer` (RGBA8, window sized). Returns `None` when nothing changed.
    pub fn render_frame<T: Timer>(&mut self, frame_buffer: &mut [u8], timer: &mut T) -> Option<FrameStats> {
        if frame_buffer.len() != self.clear_buffer.len() {
            warn!(
                got = frame_buffer.len(),
                expected = self.clear_buffer.len(),
                "frame buffer size mismatch"
            );
            return None;
        }
        if !self.scene_dirty && !self.first_frame {
            return None;
        }
        let t_start = timer.now();

        if self.first_frame {
            self.first_frame = false;
            frame_buffer.copy_from_slice(&self.clear_buffer);
            self.dirty_regions.clear();
        }

        let old_dirty = std::mem::take(&mut self.dirty_regions);
        let t = timer.now();
        self.clear_dirty(&old_dirty);
        let clear = timer.elapsed(t);

        let t = timer.now();
        self.draw_scene();
        self.scene_dirty = false;
        let draw = timer.elapsed(t);

        let mut present = old_dirty;
        present.extend_from_slice(&self.dirty_regions);
        Self::coalesce_dirty(&mut present);

        let t = timer.now();
        for rect in &present {
            self.copy_dirty_region(*rect, frame_buffer);
        }
        let copy = timer.elapsed(t);

        let total = timer.elapsed(t_start);
        timer.record_frame(total);
        Some(FrameStats {
            clear,
            draw,
            copy,
            total,
            dirty_count: self.dirty_regions.len(),
        })
    }

    fn draw_scene(&mut self) {
        match self.scene.clone() {
            Scene::Blank => {}
            Scene::Loading => {
                let pos = (self.width as f32 * 0.44, self.height as f32 * 0.5);
                self.draw_text("Loading...", TEXT_PX, FOREGROUND, pos);
            }
            Scene::Text(screen) => self.draw_text_screen(&screen),
            Scene::Stimulus { kind, placement } => {
                let Some((cx, cy)) = self.stimulus_center(kind, placement) else {
                    return;
                };
                let Some(pm) = self.stimulus_cache.get(&kind.cache_id()) else {
                    return;
                };
                let x0 = (cx - pm.width() as f32 * 0.5).floor() as i32;
                let y0 = (cy - pm.height() as f32 * 0.5).floor() as i32;
                if let Some(rect) = blit_over(&mut self.canvas, pm, x0, y0) {
                    self.dirty_regions.push(rect);
                }
            }
        }
    }

    fn draw_text_screen(&mut self, screen: &TextScreen) {
        let left = self.width as f32 * 0.08;
        self.draw_text(&screen.title, TITLE_PX, FOREGROUND, (left, self.height as f32 * 0.1));

        let mut y = self.height as f32 * 0.25;
        for line in &screen.lines {
            self.draw_text(line, TEXT_PX, FOREGROUND, (left, y));
            y += LINE_STEP;
        }

        let mut y = self.height as f32 * 0.75;
        for hint in &screen.hints {
            self.draw_text(&hint.text, TEXT_PX, key_color(hint.key), (left, y));
            y += LINE_STEP;
        }
    }

    /// Left-aligned text with its top-left corner at `pos`.
    fn draw_text(&mut self, text: &str, size_px: f32, color: [u8; 4], pos: (f32, f32)) {
        let Some(pm) = self.text_cache.get_or_render(text, size_px, color) else {
            return;
        };
        if let Some(rect) = blit_over(&mut self.canvas, &pm, pos.0 as i32, pos.1 as i32) {
            self.dirty_regions.push(rect);
        }
    }

    fn pixel_span(&self, rect: Rect) -> Option<(usize, usize, usize, usize)> {
        let (w, h) = (self.width as f32, self.height as f32);
        let x0 = rect.x().floor().clamp(0.0, w) as usize;
        let y0 = rect.y().floor().clamp(0.0, h) as usize;
        let x1 = (rect.x() + rect.width()).ceil().min(w) as usize;
        let y1 = (rect.y() + rect.height()).ceil().min(h) as usize;
        (x1 > x0 && y1 > y0).then_some((x0, y0, x1, y1))
    }

    fn clear_dirty(&mut self, dirty: &[Rect]) {
        let stride = self.width as usize * 4;
        for rect in dirty {
            let Some((x0, y0, x1, y1)) = self.pixel_span(*rect) else {
                continue;
            };
            let row_len = (x1 - x0) * 4;
            let canvas = self.canvas.data_mut();
            for y in y0..y1 {
                let off = y * stride + x0 * 4;
                canvas[off..off + row_len].copy_from_slice(&self.clear_buffer[off..off + row_len]);
            }
        }
    }

    fn copy_dirty_region(&self, dirty: Rect, frame_buffer: &mut [u8]) {
        let Some((x0, y0, x1, y1)) = self.pixel_span(dirty) else {
            return;
        };
        let stride = self.width as usize * 4;
        let bytes = (x1 - x0) * 4;
        let canvas = self.canvas.data();
        for row in y0..y1 {
            let off = row * stride + x0 * 4;
            frame_buffer[off..off + bytes].copy_from_slice(&canvas[off..off + bytes]);
        }
    }

    fn coalesce_dirty(rects: &mut Vec<Rect>) {
        rects.sort_by(|a, b| a.y().total_cmp(&b.y()).then(a.x().total_cmp(&b.x())));
        let mut out: Vec<Rect> = Vec::with_capacity(rects.len());
        for r in rects.drain(..) {
            if let Some(last) = out.last_mut() {
                let same_row =
                    (r.y() - last.y()).abs() < 1.0 && (r.height() - last.height()).abs() < 1.0;
                let touching = r.x() <= last.x() + last.width() + 1.0;
                if same_row && touching {
                    let nx = last.x().min(r.x());
                    let nx2 = (last.x() + last.width()).max(r.x() + r.width());
                    if let Some(merged) = Rect::from_xywh(nx, last.y(), nx2 - nx, last.height()) {
                        *last = merged;
                        continue;
                    }
                }
            }
            out.push(r);
        }
        *rects = out;
    }
}
