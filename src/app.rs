use crate::capability::probe_renderer;
use crate::config::{Config, RendererMode};
use crate::keymap::{Key, KeyMap};
use crate::model::{ModelBank, ModelCatalog, PointwiseNet};
use crate::playback::PlaybackState;
use crate::prefs::{prefs_storage_path, AppPrefs};
use crate::render::{letterbox, HalfBlockRenderer, KittyRenderer, Presentation, Renderer};
use crate::session::{Session, SessionState};
use crate::terminal::TerminalGuard;
use crate::video::{ensure_tool_available, open_source, FfmpegSource, FrameSource, SourceKind};
use anyhow::{anyhow, Context};
use crossterm::event::{self, Event, KeyEvent, KeyEventKind, KeyModifiers};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::{Duration, Instant};

/// Inset thumbnail size relative to the output frame.
const INSET_SCALE: f32 = 0.25;

pub fn run(cfg: Config) -> anyhow::Result<()> {
    let catalog = load_catalog(cfg.catalog.as_deref(), &cfg.models)?;
    let keymap = match cfg.keymap.as_deref() {
        Some(path) => {
            KeyMap::load(path).with_context(|| format!("load keymap {}", path.display()))?
        }
        None => KeyMap::default(),
    };
    keymap
        .validate_against(&catalog)
        .context("keymap conflicts with model catalog")?;

    let bank = ModelBank::load(&catalog)?;
    let initial = match cfg.model.as_deref() {
        Some(sel) => catalog
            .resolve(sel)
            .ok_or_else(|| anyhow!("model '{sel}' not found in catalog"))?,
        None => 0,
    };

    ensure_tool_available("ffmpeg")?;
    let spec = cfg.source_spec();
    let mut source = open_source(&spec)?;
    let info = source.info();
    let playback = match source.kind() {
        SourceKind::File => PlaybackState::new(info.fps, cfg.target_fps.unwrap_or(info.fps)),
        SourceKind::Camera => PlaybackState::live(info.fps),
    };

    let prefs_path = cfg.prefs.then(prefs_storage_path).flatten();
    let prefs = AppPrefs::load(prefs_path.as_deref()).unwrap_or_else(|err| {
        log::warn!("ignoring unreadable prefs: {err}");
        AppPrefs::default()
    });

    let mut state = SessionState::new(initial, bank.len());
    state.distortion = prefs.distortion();
    state.distortion.enabled = cfg.pulse;
    state.show_hud = prefs.show_hud;
    state.show_inset = prefs.show_inset;

    let mut session = Session::new(
        catalog,
        bank,
        Box::new(PointwiseNet::new()),
        state,
        playback,
        source.kind(),
        cfg.counter_policy,
    )?;

    let report = probe_renderer(cfg.renderer, cfg.auto_probe);
    for note in report.notes() {
        log::info!("capability: {note}");
    }
    let mut renderer: Box<dyn Renderer> = match report.renderer {
        RendererMode::HalfBlock => Box::new(HalfBlockRenderer::new()),
        RendererMode::Kitty => Box::new(KittyRenderer::new()),
    };
    log::info!(
        "session start: {} via {} renderer, network {}",
        spec.describe(),
        renderer.name(),
        session.network_name()
    );

    let result = {
        let _term = TerminalGuard::new()?;
        run_loop(&cfg, &keymap, &mut session, &mut source, &mut *renderer)
    };

    let s = session.state();
    let save = AppPrefs::capture(&s.distortion, s.show_hud, s.show_inset);
    if let Err(err) = save.save(prefs_path.as_deref()) {
        log::warn!("could not save prefs: {err}");
    }
    log::info!("session end after {} model rebuilds", session.rebuilds());
    result
}

fn run_loop(
    cfg: &Config,
    keymap: &KeyMap,
    session: &mut Session,
    source: &mut FfmpegSource,
    renderer: &mut dyn Renderer,
) -> anyhow::Result<()> {
    let mut out = BufWriter::new(TerminalGuard::stdout());
    let mut fps = FpsCounter::new();
    let mut shown: Option<crate::frame::ImageBuffer> = None;

    loop {
        let now = Instant::now();

        while event::poll(Duration::from_millis(0))? {
            if let Event::Key(k) = event::read()? {
                if k.kind != KeyEventKind::Release && handle_key(k, keymap, session) {
                    return Ok(());
                }
            }
        }

        if let Some(frame) = session.step(source)? {
            shown = Some(frame);
        }
        let Some(frame) = shown.as_ref() else {
            std::thread::sleep(Duration::from_millis(10));
            continue;
        };

        let state = session.state();
        let mut composed = frame.clone();
        if state.show_inset {
            if let Some(raw) = session.last_raw() {
                composed.composite_inset(raw, INSET_SCALE);
            }
        }

        let (term_cols, term_rows) = crossterm::terminal::size()?;
        let hud = if state.show_hud {
            wrap_hud_lines(term_cols as usize, &[session.hud_line(fps.fps())]).join("\n")
        } else {
            String::new()
        };
        let hud_rows = hud_rows_for_text(term_rows, state.show_hud, &hud);
        let visual_rows = term_rows.saturating_sub(hud_rows).max(1);
        let image = match renderer.pixel_size(term_cols, visual_rows) {
            Some((w, h)) => letterbox(&composed, w, h),
            None => composed,
        };
        let help = state
            .show_help
            .then(|| keymap.help_text(session.catalog()));

        let p = Presentation {
            term_cols,
            term_rows,
            visual_rows,
            image: &image,
            hud: &hud,
            hud_rows,
            overlay: help.as_deref(),
            sync_updates: cfg.sync_updates,
        };
        renderer.present(&p, &mut out)?;
        out.flush()?;
        fps.tick();

        let target = match session.kind() {
            SourceKind::File => session.playback().frame_interval(),
            SourceKind::Camera => Duration::from_secs_f32(1.0 / cfg.fps.max(1) as f32),
        };
        let elapsed = now.elapsed();
        if elapsed < target {
            std::thread::sleep(target - elapsed);
        }
    }
}

/// Returns true when the session should end.
fn handle_key(k: KeyEvent, keymap: &KeyMap, session: &mut Session) -> bool {
    if k.modifiers.contains(KeyModifiers::CONTROL) {
        return matches!(k.code, crossterm::event::KeyCode::Char('c'));
    }
    let Some(key) = Key::from_code(k.code) else {
        return false;
    };
    match keymap.resolve(key, session.catalog()) {
        Some(action) => session.handle(action),
        None => false,
    }
}

fn load_catalog(catalog: Option<&Path>, models_dir: &Path) -> anyhow::Result<ModelCatalog> {
    match catalog {
        Some(path) => {
            ModelCatalog::load(path).with_context(|| format!("load catalog {}", path.display()))
        }
        None => ModelCatalog::scan_dir(models_dir)
            .with_context(|| format!("scan model directory {}", models_dir.display())),
    }
}

fn hud_rows_for_text(term_rows: u16, show_hud: bool, hud: &str) -> u16 {
    if !show_hud {
        return 0;
    }
    (hud.lines().count() as u16).min(term_rows.saturating_sub(1))
}

fn wrap_hud_lines(cols: usize, lines: &[String]) -> Vec<String> {
    let width = cols.max(1);
    let mut out = Vec::new();
    for line in lines {
        let chars: Vec<char> = line.chars().collect();
        if chars.is_empty() {
            out.push(String::new());
            continue;
        }
        out.extend(chars.chunks(width).map(|c| c.iter().collect::<String>()));
    }
    out
}

struct FpsCounter {
    last: Instant,
    frames: u32,
    fps: f32,
}

impl FpsCounter {
    fn new() -> Self {
        Self {
            last: Instant::now(),
            frames: 0,
            fps: 0.0,
        }
    }

    fn tick(&mut self) {
        self.frames += 1;
        let dt = self.last.elapsed().as_secs_f32();
        if dt >= 0.5 {
            self.fps = self.frames as f32 / dt;
            self.frames = 0;
            self.last = Instant::now();
        }
    }

    fn fps(&self) -> f32 {
        self.fps
    }
}
