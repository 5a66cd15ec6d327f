/// Terminal front end for the umbra shadow-mapped renderer
use crossterm::{
    cursor,
    event::{self, Event, KeyCode, KeyEvent, MouseButton, MouseEvent, MouseEventKind},
    execute, queue,
    style::{Color, Print, ResetColor, SetForegroundColor},
    terminal::{self},
};
use nalgebra::Vector2;
use std::io::{self, stdout, Write};
use std::time::{Duration, Instant};
use thiserror::Error;
use umbra_core::{
    Device, OrbitCamera, RenderError, SceneConfig, TextureImage, TriangleBuffer, TwoPassRenderer,
};

pub mod input;
pub mod presenter;

pub use input::InputContext;

/// Cursor pixels reported per terminal cell, horizontally and vertically
const CELL_PIXELS: Vector2<f32> = Vector2::new(8.0, 16.0);
/// Orbit step for one arrow key press, in cursor pixels
const ARROW_STEP: f32 = 100.0;

/// Anything that stops the viewer
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Terminal I/O failed: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Render(#[from] RenderError),
}

/// Terminal cells are about twice as tall as they are wide
fn cell_aspect(width: u32, height: u32) -> f32 {
    width as f32 / (height.max(1) as f32 * 2.0)
}

/// Render one frame at `width` x `height` cells and write it to `writer`
pub fn snapshot<W: Write>(
    writer: &mut W,
    buffer: &TriangleBuffer,
    diffuse: &TextureImage,
    config: SceneConfig,
    width: u32,
    height: u32,
) -> Result<(), AppError> {
    let mut device = Device::new(width, height);
    let mut renderer = TwoPassRenderer::new(&mut device, buffer, diffuse, config)?;
    let camera = OrbitCamera {
        aspect: cell_aspect(width, height),
        ..OrbitCamera::default()
    };

    renderer
        .render_frame(&mut device, &camera)
        .map_err(RenderError::from)?;
    presenter::draw(writer, device.color_buffer(), width as usize, height as usize)?;
    queue!(writer, Print("\r\n"))?;
    writer.flush()?;
    Ok(())
}

/// Main application struct for the interactive terminal viewer
pub struct TerminalApp {
    device: Device,
    renderer: TwoPassRenderer,
    input: InputContext,
    frame_interval: Duration,
    running: bool,
    last_frame: Instant,
    frame_count: u32,
    fps: f32,
}

impl TerminalApp {
    pub fn new(
        buffer: &TriangleBuffer,
        diffuse: &TextureImage,
        config: SceneConfig,
    ) -> Result<Self, AppError> {
        let (width, height) = terminal::size()?;
        let (width, height) = (u32::from(width), u32::from(height));
        let frame_interval = config.frame_interval();

        let mut device = Device::new(width, height);
        let renderer = TwoPassRenderer::new(&mut device, buffer, diffuse, config)?;
        let camera = OrbitCamera {
            aspect: cell_aspect(width, height),
            ..OrbitCamera::default()
        };

        Ok(Self {
            device,
            renderer,
            input: InputContext::new(camera),
            frame_interval,
            running: true,
            last_frame: Instant::now(),
            frame_count: 0,
            fps: 0.0,
        })
    }

    pub fn run(&mut self) -> Result<(), AppError> {
        terminal::enable_raw_mode()?;
        execute!(
            stdout(),
            terminal::EnterAlternateScreen,
            event::EnableMouseCapture,
            cursor::Hide
        )?;

        let result = self.main_loop();

        // Cleanup
        execute!(
            stdout(),
            event::DisableMouseCapture,
            terminal::LeaveAlternateScreen,
            cursor::Show
        )?;
        terminal::disable_raw_mode()?;

        result
    }

    fn main_loop(&mut self) -> Result<(), AppError> {
        while self.running {
            let frame_start = Instant::now();

            // Handle input
            while event::poll(Duration::ZERO)? {
                self.handle_event(event::read()?);
            }

            // Render
            self.renderer
                .render_frame(&mut self.device, &self.input.camera)
                .map_err(RenderError::from)?;
            self.present()?;

            // Frame timing
            self.frame_count += 1;
            let elapsed = frame_start.elapsed();
            if elapsed < self.frame_interval {
                std::thread::sleep(self.frame_interval - elapsed);
            }

            // Update FPS counter
            let now = Instant::now();
            if (now - self.last_frame).as_secs() >= 1 {
                self.fps = self.frame_count as f32 / (now - self.last_frame).as_secs_f32();
                self.frame_count = 0;
                self.last_frame = now;
            }
        }

        Ok(())
    }

    fn handle_event(&mut self, event: Event) {
        match event {
            Event::Key(KeyEvent { code, .. }) => self.handle_key(code),
            Event::Mouse(MouseEvent { kind, column, row, .. }) => {
                let position =
                    Vector2::new(f32::from(column), f32::from(row)).component_mul(&CELL_PIXELS);
                match kind {
                    MouseEventKind::Down(MouseButton::Left) => {
                        self.input.on_button(true);
                        self.input.on_cursor(position);
                    }
                    MouseEventKind::Up(MouseButton::Left) => self.input.on_button(false),
                    MouseEventKind::Drag(MouseButton::Left) | MouseEventKind::Moved => {
                        self.input.on_cursor(position)
                    }
                    MouseEventKind::ScrollUp => self.input.on_scroll(1.0),
                    MouseEventKind::ScrollDown => self.input.on_scroll(-1.0),
                    _ => {}
                }
            }
            Event::Resize(width, height) => {
                let (width, height) = (u32::from(width), u32::from(height));
                self.device.resize(width, height);
                self.input.camera.aspect = cell_aspect(width, height);
                log::debug!("Resized to {width}x{height}");
            }
            _ => {}
        }
    }

    fn handle_key(&mut self, code: KeyCode) {
        let camera = &mut self.input.camera;
        match code {
            KeyCode::Char('q') | KeyCode::Esc => {
                self.running = false;
            }
            KeyCode::Char('l') => {
                self.renderer.cycle_shadow_light();
            }
            KeyCode::Up => camera.orbit(Vector2::new(0.0, -ARROW_STEP)),
            KeyCode::Down => camera.orbit(Vector2::new(0.0, ARROW_STEP)),
            KeyCode::Left => camera.orbit(Vector2::new(-ARROW_STEP, 0.0)),
            KeyCode::Right => camera.orbit(Vector2::new(ARROW_STEP, 0.0)),
            KeyCode::Char('+') => camera.zoom(1.0),
            KeyCode::Char('-') => camera.zoom(-1.0),
            _ => {}
        }
    }

    fn present(&mut self) -> io::Result<()> {
        let mut stdout = stdout();
        queue!(stdout, cursor::MoveTo(0, 0))?;

        presenter::draw(
            &mut stdout,
            self.device.color_buffer(),
            self.device.width() as usize,
            self.device.height() as usize,
        )?;

        // Draw UI overlay
        queue!(
            stdout,
            cursor::MoveTo(0, 0),
            SetForegroundColor(Color::Yellow),
            Print(format!(
                "Umbra | FPS: {:.1} | Shadow light: #{} | \
                 Drag/Arrows=Orbit Wheel/+/-=Zoom L=Light Q=Quit",
                self.fps,
                self.renderer.config().shadow_light
            )),
            ResetColor
        )?;

        stdout.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use umbra_core::{assemble, parse_obj, ShadowConfig, TriangulationMode, DEMO_SCENE_OBJ};

    #[test]
    fn test_cell_aspect() {
        assert_eq!(cell_aspect(80, 40), 1.0);
        assert_eq!(cell_aspect(80, 0), 40.0);
    }

    #[test]
    fn test_snapshot_writes_every_row() {
        let tables = parse_obj(DEMO_SCENE_OBJ).unwrap();
        let buffer = assemble(&tables, TriangulationMode::SlidingWindow).unwrap();
        let config = SceneConfig {
            shadow: ShadowConfig {
                width: 128,
                height: 128,
                ..ShadowConfig::default()
            },
            ..SceneConfig::default()
        };

        let mut out = Vec::new();
        snapshot(&mut out, &buffer, &TextureImage::white(), config, 24, 12).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.matches("\r\n").count(), 12);
    }
}
