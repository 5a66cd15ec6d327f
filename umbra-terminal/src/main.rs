/// Umbra - Shadow-mapped OBJ viewer for the terminal
///
/// Controls:
///   - Left drag / Arrow Keys: Orbit the camera
///   - Mouse wheel / + -: Zoom
///   - L: Cycle the shadow-casting light
///   - Q/ESC: Quit
use clap::Parser;
use env_logger::Env;
use std::io::stdout;
use std::path::PathBuf;
use umbra_core::{
    load_triangle_buffer, RenderError, SceneConfig, ShadowConfig, TextureImage, TriangulationMode,
};
use umbra_terminal::{AppError, TerminalApp};

#[derive(Parser, Debug)]
#[command(name = "umbra", version, about = "Shadow-mapped OBJ viewer for the terminal")]
struct Args {
    /// OBJ mesh file to display
    mesh: PathBuf,

    /// Albedo texture (PNG or JPEG); white when omitted
    #[arg(long)]
    texture: Option<PathBuf>,

    /// Target frame rate
    #[arg(long, default_value_t = 60)]
    fps: u32,

    /// Shadow map width and height in texels
    #[arg(long, default_value_t = 1024)]
    shadow_size: u32,

    /// Triangulate faces as fans instead of the sliding window
    #[arg(long)]
    fan: bool,

    /// Render a single frame to stdout and exit
    #[arg(long)]
    snapshot: bool,

    /// Snapshot width in cells
    #[arg(long, default_value_t = 80, requires = "snapshot")]
    width: u32,

    /// Snapshot height in cells
    #[arg(long, default_value_t = 40, requires = "snapshot")]
    height: u32,
}

impl Args {
    fn scene_config(&self) -> SceneConfig {
        SceneConfig {
            target_fps: self.fps,
            shadow: ShadowConfig {
                width: self.shadow_size,
                height: self.shadow_size,
                ..ShadowConfig::default()
            },
            triangulation: if self.fan {
                TriangulationMode::Fan
            } else {
                TriangulationMode::SlidingWindow
            },
            ..SceneConfig::default()
        }
    }
}

fn run(args: Args) -> Result<(), AppError> {
    let config = args.scene_config();
    config.validate().map_err(RenderError::from)?;

    log::info!("Loading mesh file: {}", args.mesh.display());
    let buffer = load_triangle_buffer(&args.mesh, config.triangulation).map_err(RenderError::from)?;
    log::info!("Loaded {} triangles", buffer.triangle_count());

    let diffuse = match &args.texture {
        Some(path) => TextureImage::from_file(path).map_err(RenderError::from)?,
        None => TextureImage::white(),
    };

    if args.snapshot {
        let (width, height) = (args.width, args.height);
        return umbra_terminal::snapshot(
            &mut stdout().lock(),
            &buffer,
            &diffuse,
            config,
            width,
            height,
        );
    }

    let mut app = TerminalApp::new(&buffer, &diffuse, config)?;
    app.run()
}

fn main() {
    // Logs go to stderr; keep them quiet while the screen is owned by the viewer
    env_logger::Builder::from_env(Env::default().default_filter_or("warn")).init();

    let args = Args::parse();
    if let Err(err) = run(args) {
        log::error!("{err}");
        std::process::exit(1);
    }
}
