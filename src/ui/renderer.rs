/// Presentation layer: double-buffered, diff-based terminal renderer.
///
/// A pure projection of `GameSnapshot`; it never changes game state.
///
/// How it works:
///   1. Build the next frame into `front` buffer (array of Cell)
///   2. Compare each cell with `back` buffer (previous frame)
///   3. Only emit terminal commands for cells that changed
///   4. All commands are batched with `queue!`, flushed once at the end
///   5. Swap front/back
///
/// Phase changes and resizes invalidate `back`, forcing a full repaint.

use std::io::{self, BufWriter, Write};

use crossterm::{
    cursor::{self, MoveTo},
    execute, queue,
    style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor},
    terminal::{self, Clear, ClearType},
};

use crate::domain::rules::{self, Outcome};
use crate::sim::world::{GameSnapshot, LinkState, Phase};

// ── Cell: the unit of the back-buffer ──

#[derive(Clone, Copy, PartialEq, Eq)]
struct Cell {
    ch: char,
    fg: Color,
    bg: Color,
}

impl Cell {
    /// Explicit dark background for every cell, matching the Clear color,
    /// so VTE terminals show no seams between rows.
    const BASE_BG: Color = Color::Rgb { r: 22, g: 22, b: 35 };

    const BLANK: Cell = Cell { ch: ' ', fg: Color::White, bg: Cell::BASE_BG };

    /// Sentinel used to invalidate the back buffer.
    const INVALID: Cell = Cell { ch: '?', fg: Color::Magenta, bg: Color::Magenta };

    fn new(ch: char, fg: Color) -> Self {
        Cell { ch, fg, bg: Self::BASE_BG }
    }
}

// ── FrameBuffer: a 2D grid of Cells ──

struct FrameBuffer {
    width: usize,
    height: usize,
    cells: Vec<Cell>,
}

impl FrameBuffer {
    fn new(w: usize, h: usize) -> Self {
        FrameBuffer {
            width: w,
            height: h,
            cells: vec![Cell::BLANK; w * h],
        }
    }

    fn resize(&mut self, w: usize, h: usize) {
        if self.width != w || self.height != h {
            self.width = w;
            self.height = h;
            self.cells = vec![Cell::BLANK; w * h];
        }
    }

    fn clear(&mut self) {
        self.cells.fill(Cell::BLANK);
    }

    fn set(&mut self, x: usize, y: usize, cell: Cell) {
        if x < self.width && y < self.height {
            self.cells[y * self.width + x] = cell;
        }
    }

    fn get(&self, x: usize, y: usize) -> Cell {
        if x < self.width && y < self.height {
            self.cells[y * self.width + x]
        } else {
            Cell::BLANK
        }
    }

    /// Write a string at (x, y). Each char occupies 1 column.
    fn put_str(&mut self, x: usize, y: usize, s: &str, fg: Color) {
        for (i, ch) in s.chars().enumerate() {
            if x + i >= self.width { break; }
            self.set(x + i, y, Cell::new(ch, fg));
        }
    }

    /// Write a string horizontally centered on row y.
    fn put_centered(&mut self, y: usize, s: &str, fg: Color) {
        let len = s.chars().count();
        let x = self.width.saturating_sub(len) / 2;
        self.put_str(x, y, s, fg);
    }

    #[cfg(test)]
    fn row_text(&self, y: usize) -> String {
        (0..self.width).map(|x| self.get(x, y).ch).collect()
    }
}

// ── Palette ──

const GREEN: Color = Color::Rgb { r: 80, g: 255, b: 80 };
const RED: Color = Color::Rgb { r: 255, g: 60, b: 60 };
const ORANGE: Color = Color::Rgb { r: 255, g: 170, b: 40 };
const CYAN: Color = Color::Rgb { r: 80, g: 220, b: 255 };
const GOLD: Color = Color::Rgb { r: 255, g: 220, b: 50 };

const TITLE_ROW: usize = 1;
const BODY_ROW: usize = 4;

// ── Renderer ──

pub struct Renderer {
    writer: BufWriter<io::Stdout>,
    front: FrameBuffer,
    back: FrameBuffer,
    term_w: usize,
    term_h: usize,
    last_phase: Option<Phase>,
}

impl Renderer {
    pub fn new() -> Self {
        Renderer {
            writer: BufWriter::with_capacity(16384, io::stdout()),
            front: FrameBuffer::new(0, 0),
            back: FrameBuffer::new(0, 0),
            term_w: 0,
            term_h: 0,
            last_phase: None,
        }
    }

    pub fn init(&mut self) -> io::Result<()> {
        terminal::enable_raw_mode()?;
        execute!(
            self.writer,
            terminal::EnterAlternateScreen,
            cursor::Hide,
            SetBackgroundColor(Cell::BASE_BG),
            Clear(ClearType::All)
        )?;

        let (tw, th) = terminal::size().unwrap_or((80, 24));
        self.term_w = tw as usize;
        self.term_h = th as usize;
        self.front.resize(self.term_w, self.term_h);
        self.back.resize(self.term_w, self.term_h);
        self.back.cells.fill(Cell::INVALID);

        Ok(())
    }

    pub fn cleanup(&mut self) -> io::Result<()> {
        execute!(
            self.writer,
            ResetColor,
            cursor::Show,
            terminal::LeaveAlternateScreen
        )?;
        terminal::disable_raw_mode()
    }

    pub fn render(&mut self, snap: &GameSnapshot) -> io::Result<()> {
        let (tw, th) = terminal::size().unwrap_or((80, 24));
        if tw as usize != self.term_w || th as usize != self.term_h {
            self.term_w = tw as usize;
            self.term_h = th as usize;
            self.front.resize(self.term_w, self.term_h);
            self.back.resize(self.term_w, self.term_h);
            self.invalidate()?;
        }

        if self.last_phase != Some(snap.phase) {
            self.invalidate()?;
            self.last_phase = Some(snap.phase);
        }

        self.compose(snap);
        self.flush_diff()?;
        std::mem::swap(&mut self.front, &mut self.back);

        Ok(())
    }

    fn invalidate(&mut self) -> io::Result<()> {
        self.back.cells.fill(Cell::INVALID);
        queue!(self.writer, SetBackgroundColor(Cell::BASE_BG), Clear(ClearType::All))
    }

    fn compose(&mut self, snap: &GameSnapshot) {
        self.front.clear();
        self.front.put_centered(TITLE_ROW, "◆ SCALE RACE ◆  you vs. the autoscaler", GOLD);
        match snap.phase {
            Phase::Idle => self.compose_idle(),
            Phase::Playing => self.compose_playing(snap),
            Phase::Finished => self.compose_finished(snap),
        }
        self.compose_footer();
    }

    fn compose_idle(&mut self) {
        self.front.put_centered(BODY_ROW + 2, "Press ENTER to start the race!", GREEN);
        let goal = format!(
            "Reach {} points before the deployment scales to {} replicas.",
            rules::WIN_SCORE,
            rules::SCALE_LIMIT
        );
        self.front.put_centered(BODY_ROW + 4, &goal, Color::White);
    }

    fn compose_playing(&mut self, snap: &GameSnapshot) {
        let half = self.front.width / 2;
        let left = 2;
        let right = half + 2;
        let y = BODY_ROW;

        // Player panel
        let points = format!("Your Points: {} / {}", snap.score, rules::WIN_SCORE);
        self.front.put_str(left, y, &points, GREEN);
        self.front.put_str(left, y + 2, "Press the sequence:", Color::White);
        let mut x = left;
        for (i, dir) in snap.sequence.iter().enumerate() {
            let fg = if i < snap.cursor {
                GREEN
            } else if i == snap.cursor {
                CYAN
            } else {
                Color::Grey
            };
            self.front.set(x, y + 4, Cell::new(dir.glyph(), fg));
            if i == snap.cursor {
                self.front.set(x, y + 5, Cell::new('▔', CYAN));
            }
            x += 2;
        }
        let cleared = format!("Sequences cleared: {}", snap.sequences_cleared);
        self.front.put_str(left, y + 7, &cleared, Color::DarkGrey);

        // Replica panel
        let at_limit = rules::is_scale_limit(snap.replicas);
        let replicas = format!("Replicas: {} / {}", snap.replicas, rules::SCALE_LIMIT);
        self.front.put_str(right, y, &replicas, if at_limit { RED } else { ORANGE });
        if at_limit {
            self.front.put_str(right, y + 2, "Scale Up Complete!", RED);
        } else {
            self.front.put_str(right, y + 2, "Scaling...", ORANGE);
        }
        let bar_w = self.front.width.saturating_sub(right + 4).min(rules::SCALE_LIMIT as usize);
        self.compose_bar(right, y + 4, bar_w, snap.replicas, if at_limit { RED } else { ORANGE });

        let link = match snap.link {
            LinkState::Offline => "backend: offline",
            LinkState::Triggering => "backend: requesting scale-up...",
            LinkState::Subscribing => "backend: connecting to replica stream...",
            LinkState::Streaming => "backend: watching replicas",
        };
        self.front.put_str(right, y + 7, link, Color::DarkGrey);
    }

    fn compose_bar(&mut self, x: usize, y: usize, width: usize, replicas: u32, fg: Color) {
        if width == 0 { return; }
        let filled = (replicas.min(rules::SCALE_LIMIT) as usize * width) / rules::SCALE_LIMIT as usize;
        for i in 0..width {
            let ch = if i < filled { '█' } else { '░' };
            self.front.set(x + i, y, Cell::new(ch, fg));
        }
    }

    fn compose_finished(&mut self, snap: &GameSnapshot) {
        let (headline, fg) = match snap.outcome {
            Some(Outcome::Win) => (Outcome::Win.headline(), GREEN),
            Some(other) => (other.headline(), RED),
            None => ("GAME OVER!", RED),
        };
        self.front.put_centered(BODY_ROW, headline, fg);
        let score = format!("◈ Final score: {}", snap.score);
        let replicas = format!("◈ Final replicas: {}", snap.replicas);
        self.front.put_centered(BODY_ROW + 2, &score, Color::White);
        self.front.put_centered(BODY_ROW + 3, &replicas, Color::White);
        self.front.put_centered(BODY_ROW + 5, "▸ ENTER: Play again   ▸ ESC: Quit", GREEN);
    }

    fn compose_footer(&mut self) {
        let h = self.front.height;
        if h < 3 { return; }
        self.front.put_centered(
            h - 2,
            "Press the arrow keys (↑ ↓ ← →) in the order shown to gain points.",
            Color::DarkGrey,
        );
        self.front.put_centered(h - 1, "ESC: quit", Color::DarkGrey);
    }

    fn flush_diff(&mut self) -> io::Result<()> {
        let mut last_fg = Color::White;
        let mut last_bg = Cell::BASE_BG;
        let mut cursor_at: Option<(usize, usize)> = None;

        // Explicit base colors; ResetColor would fall back to the
        // terminal's default background.
        queue!(self.writer,
            SetForegroundColor(Color::White),
            SetBackgroundColor(Cell::BASE_BG),
        )?;

        for y in 0..self.front.height {
            for x in 0..self.front.width {
                let cell = self.front.get(x, y);
                if cell == self.back.get(x, y) {
                    continue;
                }

                if cursor_at != Some((x, y)) {
                    queue!(self.writer, MoveTo(x as u16, y as u16))?;
                }
                if cell.fg != last_fg {
                    queue!(self.writer, SetForegroundColor(cell.fg))?;
                    last_fg = cell.fg;
                }
                if cell.bg != last_bg {
                    queue!(self.writer, SetBackgroundColor(cell.bg))?;
                    last_bg = cell.bg;
                }
                queue!(self.writer, Print(cell.ch))?;
                cursor_at = Some((x + 1, y));
            }
        }

        self.writer.flush()
    }
}
