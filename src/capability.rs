use crate::config::RendererMode;

#[derive(Debug, Clone)]
pub struct CapabilityReport {
    pub auto_probe: bool,
    pub requested_renderer: RendererMode,
    pub renderer: RendererMode,
    notes: Vec<String>,
}

impl CapabilityReport {
    pub fn changed(&self) -> bool {
        self.renderer != self.requested_renderer
    }

    pub fn notes(&self) -> &[String] {
        &self.notes
    }

    pub fn status_label(&self) -> String {
        if !self.auto_probe {
            return format!("off (renderer={:?})", self.renderer);
        }
        if self.changed() {
            return format!("fallback {:?}->{:?}", self.requested_renderer, self.renderer);
        }
        format!("ok renderer={:?}", self.renderer)
    }
}

/// Downgrade the kitty renderer when the terminal cannot show images.
pub fn probe_renderer(requested: RendererMode, auto_probe: bool) -> CapabilityReport {
    probe_with(requested, auto_probe, kitty_graphics_available())
}

pub fn probe_with(requested: RendererMode, auto_probe: bool, kitty_ok: bool) -> CapabilityReport {
    let mut report = CapabilityReport {
        auto_probe,
        requested_renderer: requested,
        renderer: requested,
        notes: Vec::new(),
    };
    if !auto_probe {
        report.notes.push("capability probe disabled by --auto-probe=false".to_string());
        return report;
    }
    if requested == RendererMode::Kitty && !kitty_ok {
        report.renderer = RendererMode::HalfBlock;
        report
            .notes
            .push("kitty graphics unavailable in this terminal; using half-block".to_string());
    }
    report
}

fn kitty_graphics_available() -> bool {
    match std::env::var("STYLEWAVE_FORCE_KITTY")
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
        .as_str()
    {
        "1" | "true" | "yes" | "on" => return true,
        "0" | "false" | "no" | "off" => return false,
        _ => {}
    }
    if std::env::var("KITTY_WINDOW_ID").is_ok() {
        return true;
    }
    let term = std::env::var("TERM").unwrap_or_default().to_ascii_lowercase();
    let program = std::env::var("TERM_PROGRAM")
        .unwrap_or_default()
        .to_ascii_lowercase();
    term.contains("kitty") || program.contains("ghostty") || program.contains("kitty")
}
