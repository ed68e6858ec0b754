//! Batch export: sequential read, every-Nth stylize, frame hold for the rest.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use anyhow::Result;

use crate::distort::{CounterPolicy, DistortionConfig, WaveField};
use crate::frame::ImageBuffer;
use crate::model::StyleNetwork;
use crate::playback::HoldSchedule;
use crate::video::{FrameSink, FrameSource};

/// Progress is logged after this many processed frames.
pub const PROGRESS_EVERY: u64 = 5;

#[derive(Debug, Clone, Copy)]
pub struct ExportOptions {
    pub schedule: HoldSchedule,
    pub distortion: DistortionConfig,
    /// Trigger a wave every K written frames. Forces distortion on.
    pub pulse_every: Option<u64>,
    pub policy: CounterPolicy,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            schedule: HoldSchedule::new(10),
            distortion: DistortionConfig::default(),
            pulse_every: None,
            policy: CounterPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExportStats {
    pub frames_read: u64,
    pub frames_processed: u64,
    pub frames_written: u64,
    pub interrupted: bool,
    /// Read error that ended the stream early, if any.
    pub read_error: Option<String>,
}

/// Run the whole export. The sink is finished on every path, so whatever
/// was written before an interrupt or error stays playable.
pub fn export_frames(
    source: &mut dyn FrameSource,
    sink: &mut dyn FrameSink,
    net: &mut dyn StyleNetwork,
    opts: &ExportOptions,
    interrupted: &AtomicBool,
) -> Result<ExportStats> {
    let result = run_frames(source, sink, net, opts, interrupted);
    match result {
        Ok(stats) => {
            sink.finish()?;
            Ok(stats)
        }
        Err(err) => {
            if let Err(finish_err) = sink.finish() {
                log::warn!("closing output after error failed: {finish_err:#}");
            }
            Err(err)
        }
    }
}

fn run_frames(
    source: &mut dyn FrameSource,
    sink: &mut dyn FrameSink,
    net: &mut dyn StyleNetwork,
    opts: &ExportOptions,
    interrupted: &AtomicBool,
) -> Result<ExportStats> {
    let mut stats = ExportStats::default();
    let mut held: Option<ImageBuffer> = None;
    let mut waves = WaveField::new(opts.policy);
    let mut distortion = opts.distortion.clamped();
    let pulse_every = opts.pulse_every.filter(|k| *k > 0);
    if pulse_every.is_some() {
        distortion.enabled = true;
    }

    let total = source.info().frame_count;
    let started = Instant::now();

    loop {
        if interrupted.load(Ordering::Relaxed) {
            log::warn!("interrupted, keeping {} written frames", stats.frames_written);
            stats.interrupted = true;
            break;
        }

        let raw = match source.read_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => break,
            Err(err) => {
                log::warn!("read failed at frame {}: {err}; ending export", stats.frames_read);
                stats.read_error = Some(err.to_string());
                break;
            }
        };
        let index = stats.frames_read;
        stats.frames_read += 1;

        let styled = match held.as_ref() {
            Some(frame) if !opts.schedule.should_process(index) => frame.clone(),
            _ => {
                let frame = net.stylize(&raw);
                stats.frames_processed += 1;
                if stats.frames_processed % PROGRESS_EVERY == 0 {
                    log_progress(&stats, total, opts.schedule, started);
                }
                held = Some(frame.clone());
                frame
            }
        };

        if let Some(k) = pulse_every {
            if stats.frames_written % k == 0 {
                waves.trigger(&distortion);
            }
        }
        let out = waves.apply(&styled, &distortion);

        sink.write_frame(&out)?;
        stats.frames_written += 1;
    }

    Ok(stats)
}

fn log_progress(stats: &ExportStats, total: Option<u64>, schedule: HoldSchedule, started: Instant) {
    let elapsed = started.elapsed().as_secs_f32();
    match total {
        Some(total) => log::info!(
            "processed {}/{} frames ({}/{} read, {:.1}s)",
            stats.frames_processed,
            schedule.processed_count(total),
            stats.frames_read,
            total,
            elapsed
        ),
        None => log::info!(
            "processed {} frames ({} read, {:.1}s)",
            stats.frames_processed,
            stats.frames_read,
            elapsed
        ),
    }
}
