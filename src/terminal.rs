// SPDX-License-Identifier: GPL-3.0-only

//! Terminal scanner preview
//!
//! Renders the camera feed with Unicode half-block characters and shows the
//! zoom level and last decoded payload in a status line. The scan session
//! runs on its own thread with a current-thread tokio runtime; this thread
//! only draws and reads keys.

use crate::backends::camera::types::{CameraFrame, PixelFormat};
use crate::backends::camera::{self, DigitalZoomView, ZoomHandle};
use crate::config::Config;
use crate::constants::{pipeline, timing};
use crate::errors::AppResult;
use crate::frame_processor::DecodedSymbol;
use crate::permission::{PermissionGate, SystemPermission};
use crate::session::{BoundCamera, ScanSession, SessionOutcome};

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Terminal, backend::CrosstermBackend, buffer::Buffer, layout::Rect, style::Color,
    widgets::Widget,
};
use std::io::{self, stdout};
use tokio::sync::{mpsc, oneshot};
use tracing::info;

/// Run the scanner with a terminal preview until the user quits
pub fn run(config: Config) -> Result<SessionOutcome, Box<dyn std::error::Error>> {
    let (frame_tx, frame_rx) = futures::channel::mpsc::channel(pipeline::PREVIEW_CHANNEL_DEPTH);
    let (symbol_tx, symbol_rx) = mpsc::unbounded_channel();
    let (bound_tx, bound_rx) = oneshot::channel();
    let (quit_tx, quit_rx) = oneshot::channel::<()>();

    let mirror = config.mirror_preview;
    let provider = permission_provider(&config);
    let session = ScanSession::new(config)
        .with_preview(frame_tx)
        .with_symbol_listener(symbol_tx)
        .on_bound(bound_tx);

    let worker = std::thread::Builder::new()
        .name("scan-session".into())
        .spawn(move || -> AppResult<SessionOutcome> {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?;
            runtime.block_on(async move {
                let mut gate = PermissionGate::new(provider);
                session
                    .run(&mut gate, async {
                        let _ = quit_rx.await;
                    })
                    .await
            })
        })?;

    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut view = PreviewState {
        frames: frame_rx,
        symbols: symbol_rx,
        bound_rx: Some(bound_rx),
        bound: None,
        frame_widget: FrameWidget::new(mirror),
        last_symbol: None,
    };
    let result = run_app(&mut terminal, &mut view, &worker);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    let _ = quit_tx.send(());
    let outcome = worker
        .join()
        .map_err(|_| "scan session thread panicked")??;

    result?;
    Ok(outcome)
}

/// Provider for the configured permission backend
///
/// The device check needs a node path, so the camera is resolved here
/// before anything is bound.
pub fn permission_provider(config: &Config) -> SystemPermission {
    let device_path = camera::select_camera(&camera::enumerate_cameras(), &config.camera_selector())
        .map(|device| device.path)
        .unwrap_or_default();
    SystemPermission::new(config.permission, &device_path)
}

struct PreviewState {
    frames: futures::channel::mpsc::Receiver<CameraFrame>,
    symbols: mpsc::UnboundedReceiver<Vec<DecodedSymbol>>,
    bound_rx: Option<oneshot::Receiver<BoundCamera>>,
    bound: Option<BoundCamera>,
    frame_widget: FrameWidget,
    last_symbol: Option<DecodedSymbol>,
}

impl PreviewState {
    fn poll(&mut self) {
        while let Ok(frame) = self.frames.try_recv() {
            self.frame_widget.update_frame(frame);
        }

        while let Ok(symbols) = self.symbols.try_recv() {
            if let Some(last) = symbols.into_iter().last() {
                self.last_symbol = Some(last);
            }
        }

        if let Some(mut rx) = self.bound_rx.take() {
            match rx.try_recv() {
                Ok(bound) => {
                    info!(device = %bound.device.name, "Preview attached to camera");
                    self.frame_widget.digital_zoom = bound.digital_view.clone();
                    self.bound = Some(bound);
                }
                Err(oneshot::error::TryRecvError::Empty) => self.bound_rx = Some(rx),
                Err(oneshot::error::TryRecvError::Closed) => {}
            }
        }
    }

    fn status_message(&self) -> String {
        let Some(bound) = &self.bound else {
            return "Starting camera... | 'q' quit".to_string();
        };

        let mut msg = format!(
            "{} | {}",
            bound.device.name,
            zoom_label(&bound.zoom, bound.digital_view.is_some())
        );
        match &self.last_symbol {
            Some(symbol) => msg.push_str(&format!(" | {}: {}", symbol.format, symbol.display_value)),
            None => msg.push_str(" | no barcode yet"),
        }
        msg.push_str(" | 'q' quit");
        msg
    }
}

fn zoom_label(zoom: &ZoomHandle, digital: bool) -> String {
    let kind = if digital { "digital" } else { "optical" };
    format!("zoom {:.1}x ({})", zoom.current(), kind)
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    view: &mut PreviewState,
    worker: &std::thread::JoinHandle<AppResult<SessionOutcome>>,
) -> Result<(), Box<dyn std::error::Error>> {
    loop {
        view.poll();

        // Session ended by itself
        if worker.is_finished() {
            break;
        }

        let status_message = view.status_message();
        terminal.draw(|f| {
            let area = f.area();

            let camera_area = Rect {
                x: area.x,
                y: area.y,
                width: area.width,
                height: area.height.saturating_sub(1),
            };
            f.render_widget(&view.frame_widget, camera_area);

            let status_area = Rect {
                x: area.x,
                y: area.height.saturating_sub(1),
                width: area.width,
                height: 1,
            };
            f.render_widget(
                StatusBar {
                    message: &status_message,
                },
                status_area,
            );
        })?;

        if event::poll(timing::PREVIEW_REFRESH)?
            && let Event::Key(key) = event::read()?
            && key.kind == KeyEventKind::Press
        {
            if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
                break;
            }
            if key.code == KeyCode::Char('q') || key.code == KeyCode::Esc {
                break;
            }
        }
    }

    Ok(())
}

/// Widget that renders a camera frame using half-block characters
struct FrameWidget {
    frame: Option<CameraFrame>,
    mirror: bool,
    digital_zoom: Option<DigitalZoomView>,
}

impl FrameWidget {
    fn new(mirror: bool) -> Self {
        Self {
            frame: None,
            mirror,
            digital_zoom: None,
        }
    }

    fn update_frame(&mut self, frame: CameraFrame) {
        self.frame = Some(frame);
    }
}

/// Centered source window for a zoom ratio: (x0, y0, width, height)
fn crop_window(width: u32, height: u32, ratio: f32) -> (u32, u32, u32, u32) {
    let ratio = ratio.max(1.0);
    let crop_w = ((width as f32 / ratio) as u32).max(1);
    let crop_h = ((height as f32 / ratio) as u32).max(1);
    ((width - crop_w) / 2, (height - crop_h) / 2, crop_w, crop_h)
}

impl Widget for &FrameWidget {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let Some(frame) = &self.frame else {
            let msg = "Waiting for camera...";
            let x = area.x + (area.width.saturating_sub(msg.len() as u16)) / 2;
            let y = area.y + area.height / 2;
            if y < area.y + area.height && x < area.x + area.width {
                buf.set_string(x, y, msg, ratatui::style::Style::default());
            }
            return;
        };
        if frame.width == 0 || frame.height == 0 || area.width == 0 || area.height == 0 {
            return;
        }

        let ratio = self.digital_zoom.as_ref().map(|v| v.ratio()).unwrap_or(1.0);
        let (crop_x, crop_y, crop_w, crop_h) = crop_window(frame.width, frame.height, ratio);

        // Each terminal cell displays 2 vertical pixels
        let frame_aspect = crop_w as f64 / crop_h as f64;
        let term_width = area.width as f64;
        let term_height = (area.height * 2) as f64;

        let (display_width, display_height) = if term_width / term_height > frame_aspect {
            let h = term_height;
            let w = h * frame_aspect;
            (w as u16, (h / 2.0) as u16)
        } else {
            let w = term_width;
            let h = w / frame_aspect;
            (w as u16, (h / 2.0) as u16)
        };
        if display_width == 0 || display_height == 0 {
            return;
        }

        let x_offset = area.x + (area.width.saturating_sub(display_width)) / 2;
        let y_offset = area.y + (area.height.saturating_sub(display_height)) / 2;

        let x_scale = crop_w as f64 / display_width as f64;
        let y_scale = crop_h as f64 / (display_height * 2) as f64;

        for ty in 0..display_height {
            for tx in 0..display_width {
                let term_x = x_offset + tx;
                let term_y = y_offset + ty;

                if term_x >= area.x + area.width || term_y >= area.y + area.height {
                    continue;
                }

                let mut src_x = (tx as f64 * x_scale) as u32;
                if self.mirror {
                    src_x = crop_w.saturating_sub(1).saturating_sub(src_x);
                }
                let src_x = crop_x + src_x;
                let src_y_top = crop_y + (ty as f64 * 2.0 * y_scale) as u32;
                let src_y_bottom = crop_y + ((ty as f64 * 2.0 + 1.0) * y_scale) as u32;

                let top_color = sample_pixel(frame, src_x, src_y_top);
                let bottom_color = sample_pixel(frame, src_x, src_y_bottom);

                if let Some(cell) = buf.cell_mut((term_x, term_y)) {
                    cell.set_char('▀');
                    cell.set_fg(top_color);
                    cell.set_bg(bottom_color);
                }
            }
        }
    }
}

fn sample_pixel(frame: &CameraFrame, x: u32, y: u32) -> Color {
    let (r, g, b) = sample_pixel_rgb(frame, x, y);
    Color::Rgb(r, g, b)
}

fn sample_pixel_rgb(frame: &CameraFrame, x: u32, y: u32) -> (u8, u8, u8) {
    let x = x.min(frame.width - 1);
    let y = y.min(frame.height - 1);
    let bpp = frame.format.primary_plane_bytes_per_pixel();
    let idx = (y * frame.stride + x * bpp) as usize;
    let data: &[u8] = &frame.data;

    match frame.format {
        PixelFormat::RGBA | PixelFormat::RGB24 => match data.get(idx..idx + 3) {
            Some(rgb) => (rgb[0], rgb[1], rgb[2]),
            None => (0, 0, 0),
        },
        // YUV and gray: first byte of the pixel is luma
        _ => {
            let v = data.get(idx).copied().unwrap_or(0);
            (v, v, v)
        }
    }
}

/// Status bar widget
struct StatusBar<'a> {
    message: &'a str,
}

impl Widget for StatusBar<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        for x in area.x..area.x + area.width {
            if let Some(cell) = buf.cell_mut((x, area.y)) {
                cell.set_char(' ');
                cell.set_bg(Color::DarkGray);
            }
        }

        let text: String = self.message.chars().take(area.width as usize).collect();
        buf.set_string(
            area.x,
            area.y,
            text,
            ratatui::style::Style::default()
                .fg(Color::White)
                .bg(Color::DarkGray),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crop_window_centers() {
        assert_eq!(crop_window(1280, 720, 1.0), (0, 0, 1280, 720));
        assert_eq!(crop_window(1280, 720, 2.0), (320, 180, 640, 360));
        assert_eq!(crop_window(100, 100, 0.5), (0, 0, 100, 100));
    }

    #[test]
    fn test_frame_renders_into_buffer() {
        let frame = CameraFrame::from_rgba(2, 2, vec![255, 0, 0, 255].repeat(4));
        let mut widget = FrameWidget::new(false);
        widget.update_frame(frame);

        let area = Rect::new(0, 0, 4, 2);
        let mut buf = Buffer::empty(area);
        (&widget).render(area, &mut buf);

        let cell = buf.cell((1, 0)).unwrap();
        assert_eq!(cell.symbol(), "▀");
        assert_eq!(cell.fg, Color::Rgb(255, 0, 0));
    }

    #[test]
    fn test_gray_frame_samples_as_luma() {
        let frame = CameraFrame::from_gray(2, 1, vec![10, 240]);
        assert_eq!(sample_pixel_rgb(&frame, 1, 0), (240, 240, 240));
        assert_eq!(sample_pixel_rgb(&frame, 9, 9), (240, 240, 240));
    }

    #[test]
    fn test_status_before_bind_is_neutral() {
        let (_frame_tx, frames) = futures::channel::mpsc::channel(1);
        let (_symbol_tx, symbols) = mpsc::unbounded_channel();
        let view = PreviewState {
            frames,
            symbols,
            bound_rx: None,
            bound: None,
            frame_widget: FrameWidget::new(false),
            last_symbol: None,
        };

        let status = view.status_message();
        assert!(!status.to_lowercase().contains("permission"));
        assert!(status.starts_with("Starting camera"));
    }

    #[test]
    fn test_status_bar_truncates_by_chars() {
        let area = Rect::new(0, 0, 3, 1);
        let mut buf = Buffer::empty(area);
        StatusBar { message: "ÄÖÜß" }.render(area, &mut buf);
        assert_eq!(buf.cell((2, 0)).unwrap().symbol(), "Ü");
    }
}
