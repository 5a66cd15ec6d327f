/// Example: Render the built-in cube-over-ground scene in the terminal
///
/// Usage: cargo run --example render_cube [-- --once]
///
/// With `--once` a single frame is printed to stdout instead of starting the
/// interactive viewer.
use std::env;
use std::io::stdout;
use umbra_core::{assemble, parse_obj, RenderError, SceneConfig, TextureImage, DEMO_SCENE_OBJ};
use umbra_terminal::{AppError, TerminalApp};

fn main() -> Result<(), AppError> {
    env_logger::init();

    let config = SceneConfig::default();
    let tables = parse_obj(DEMO_SCENE_OBJ).map_err(RenderError::from)?;
    let buffer = assemble(&tables, config.triangulation).map_err(RenderError::from)?;
    println!("Demo scene: {} triangles", buffer.triangle_count());

    if env::args().any(|arg| arg == "--once") {
        let white = TextureImage::white();
        return umbra_terminal::snapshot(&mut stdout().lock(), &buffer, &white, config, 100, 40);
    }

    let mut app = TerminalApp::new(&buffer, &TextureImage::white(), config)?;
    app.run()
}
