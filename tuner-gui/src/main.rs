//! # Vocal Tuner GUI
//!
//! Iced front end for the vocal tuner. The window shows the stable note
//! readout, a cent meter and a one-octave keyboard, with panels for the
//! pitch trainer and the metronome.
//!
//! ## Threads
//! - **Main thread**: the iced application, polling results on a 16 ms tick
//! - **Audio worker**: owns the cpal stream and the `TunerSession`
//! - **Metronome clock**: a `MetronomeClock` timer thread
//!
//! All three talk over crossbeam channels.

mod ui;

use anyhow::Context;
use cpal::traits::StreamTrait;
use crossbeam_channel::{Receiver, Sender};
use iced::{Element, Subscription, Theme};
use log::{error, info, warn};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tuner_core::config::{clamp_beats_per_bar, clamp_bpm, clamp_gain_db, clamp_tolerance};
use tuner_core::{
    AudioFrame, BeatEvent, FrameResult, MetronomeClock, PitchClass, SessionCommand, SmoothingProfile,
    TunerConfig, TunerSession, TuningReference, audio,
};
use ui::main_display::create_main_view;

const SETTINGS_PATH: &str = "tuner_settings.json";

pub fn main() -> iced::Result {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    info!("[MAIN] Starting vocal tuner");
    let result = iced::application("Vocal Tuner", TunerApp::update, TunerApp::view)
        .subscription(TunerApp::subscription)
        .theme(TunerApp::theme)
        .run();
    info!("[MAIN] Application finished: {:?}", result);
    result
}

#[derive(Debug, Clone)]
pub enum Message {
    // Listening
    Start,
    Stop,
    DeviceSelected(String),
    ProfileSelected(SmoothingProfile),
    TuningReferenceChanged(String),
    GainChanged(f32),

    // Trainer
    KeySelected(PitchClass),
    TrainerOctaveSelected(i32),
    ToleranceChanged(u32),
    ToggleTraining,

    // Metronome
    ToggleMetronome,
    BpmChanged(u32),
    BeatsPerBarSelected(u32),

    SaveSettings,
    LoadSettings,

    Tick,
}

/// Everything the view layer reads.
#[derive(Debug, Clone)]
pub struct AppDisplayData {
    pub config: TunerConfig,
    pub devices: Vec<String>,
    pub listening: bool,
    pub status: String,
    /// Raw text of the A4 field; may be mid-edit and unparsable.
    pub reference_input: String,
    pub last_result: Option<FrameResult>,
    pub training: bool,
    pub metronome_running: bool,
    pub last_beat: Option<BeatEvent>,
}

struct TunerApp {
    audio_worker: Option<AudioWorker>,
    metronome: Option<(MetronomeClock, Receiver<BeatEvent>)>,
    display_data: AppDisplayData,
}

/// Handle to the audio thread.
struct AudioWorker {
    command_tx: Sender<SessionCommand>,
    result_rx: Receiver<FrameResult>,
    shutdown_tx: Sender<()>,
    thread_handle: Option<JoinHandle<()>>,
}

impl AudioWorker {
    /// Spawns the audio thread. The session is built up front so bad settings
    /// are reported here rather than from inside the thread.
    fn spawn(config: &TunerConfig) -> anyhow::Result<Self> {
        let mut session = TunerSession::from_config(config).context("invalid tuner settings")?;
        let device = config.input_device.clone();
        let frame_size = config.frame_size;

        let (command_tx, command_rx) = crossbeam_channel::unbounded::<SessionCommand>();
        let (result_tx, result_rx) = crossbeam_channel::bounded::<FrameResult>(32);
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(1);

        let thread_handle = thread::spawn(move || {
            let (raw_audio_tx, raw_audio_rx) = crossbeam_channel::bounded::<Vec<f32>>(8);
            let (stream, sample_rate) =
                match audio::start_audio_capture(device.as_deref(), frame_size, raw_audio_tx) {
                    Ok(started) => started,
                    Err(e) => {
                        error!("[AUDIO-THREAD] Failed to start audio: {}", e);
                        return;
                    }
                };
            info!("[AUDIO-THREAD] Listening at {} Hz", sample_rate);

            loop {
                crossbeam_channel::select! {
                    recv(raw_audio_rx) -> msg => match msg {
                        Ok(samples) => match AudioFrame::new(samples, sample_rate) {
                            Ok(frame) => {
                                let result = session.process_frame(frame, Instant::now());
                                // Full queue: the GUI is behind, so the result is skipped.
                                let _ = result_tx.try_send(result);
                            }
                            Err(e) => warn!("[AUDIO-THREAD] Dropping frame: {}", e),
                        },
                        Err(_) => {
                            warn!("[AUDIO-THREAD] Audio channel closed");
                            break;
                        }
                    },
                    recv(command_rx) -> msg => match msg {
                        Ok(command) => {
                            if let Err(e) = session.apply(command, Instant::now()) {
                                warn!("[AUDIO-THREAD] Rejected command: {}", e);
                            }
                        }
                        Err(_) => break,
                    },
                    recv(shutdown_rx) -> _ => {
                        info!("[AUDIO-THREAD] Received shutdown signal");
                        break;
                    },
                }
            }

            session.stop();
            if let Err(e) = stream.pause() {
                warn!("[AUDIO-THREAD] Error pausing stream: {}", e);
            }
            drop(stream);
            info!("[AUDIO-THREAD] Audio thread finished");
        });

        Ok(Self {
            command_tx,
            result_rx,
            shutdown_tx,
            thread_handle: Some(thread_handle),
        })
    }

    fn send(&self, command: SessionCommand) {
        if self.command_tx.send(command).is_err() {
            warn!("[MAIN] Audio worker is gone; command dropped");
        }
    }

    fn is_finished(&self) -> bool {
        self.thread_handle.as_ref().is_none_or(|handle| handle.is_finished())
    }

    fn shutdown(&mut self) {
        if let Some(handle) = self.thread_handle.take() {
            let _ = self.shutdown_tx.try_send(());
            if handle.join().is_err() {
                error!("[MAIN] Audio thread panicked");
            }
        }
    }
}

impl Drop for AudioWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl Default for TunerApp {
    fn default() -> Self {
        let config = TunerConfig::load_or_default(SETTINGS_PATH);
        let devices = audio::list_input_devices().unwrap_or_else(|e| {
            warn!("[MAIN] Could not list input devices: {}", e);
            Vec::new()
        });
        Self {
            audio_worker: None,
            metronome: None,
            display_data: AppDisplayData {
                reference_input: format_reference(config.tuning_reference_hz),
                config,
                devices,
                listening: false,
                status: "Stopped".to_string(),
                last_result: None,
                training: false,
                metronome_running: false,
                last_beat: None,
            },
        }
    }
}

impl TunerApp {
    fn update(&mut self, message: Message) {
        match message {
            Message::Start => self.start_listening(),
            Message::Stop => self.stop_listening(),
            Message::DeviceSelected(name) => {
                self.display_data.config.input_device = Some(name);
                if self.display_data.listening {
                    self.stop_listening();
                    self.start_listening();
                }
            }
            Message::ProfileSelected(profile) => {
                self.display_data.config.smoothing = profile;
                self.send(SessionCommand::SetProfile(profile));
            }
            Message::TuningReferenceChanged(input) => {
                // Only valid references reach the session; the field keeps whatever was typed.
                if let Some(reference) =
                    input.trim().parse::<f32>().ok().and_then(|hz| TuningReference::new(hz).ok())
                {
                    self.display_data.config.tuning_reference_hz = reference.hz();
                    // A running training session keeps its totals and is scored
                    // against the new reference from the next frame on.
                    self.send(SessionCommand::SetTuningReference(reference.hz()));
                }
                self.display_data.reference_input = input;
            }
            Message::GainChanged(gain_db) => {
                let gain_db = clamp_gain_db(gain_db);
                self.display_data.config.input_gain_db = gain_db;
                self.send(SessionCommand::SetInputGainDb(gain_db));
            }
            Message::KeySelected(note) => {
                self.display_data.config.trainer.note = note;
                if self.display_data.training {
                    self.send_training_target();
                }
            }
            Message::TrainerOctaveSelected(octave) => {
                self.display_data.config.trainer.octave = octave;
                if self.display_data.training {
                    self.send_training_target();
                }
            }
            Message::ToleranceChanged(cents) => {
                self.display_data.config.trainer.tolerance_cents = clamp_tolerance(cents);
                if self.display_data.training {
                    self.send_training_target();
                }
            }
            Message::ToggleTraining => {
                self.display_data.training = !self.display_data.training;
                if self.display_data.training {
                    self.send_training_target();
                } else {
                    self.send(SessionCommand::StopTraining);
                }
            }
            Message::ToggleMetronome => {
                if self.metronome.is_some() {
                    self.stop_metronome();
                } else {
                    self.start_metronome();
                }
            }
            Message::BpmChanged(bpm) => {
                self.display_data.config.metronome.bpm = clamp_bpm(bpm);
                self.restart_metronome();
            }
            Message::BeatsPerBarSelected(beats) => {
                self.display_data.config.metronome.beats_per_bar = clamp_beats_per_bar(beats);
                self.restart_metronome();
            }
            Message::SaveSettings => match self.display_data.config.save(SETTINGS_PATH) {
                Ok(()) => {
                    info!("[MAIN] Settings saved to {}", SETTINGS_PATH);
                    self.display_data.status = "Settings saved".to_string();
                }
                Err(e) => {
                    error!("[MAIN] Error saving settings: {}", e);
                    self.display_data.status = format!("Save failed: {}", e);
                }
            },
            Message::LoadSettings => match TunerConfig::load(SETTINGS_PATH) {
                Ok(config) => self.apply_loaded_config(config),
                Err(e) => {
                    error!("[MAIN] Error loading settings: {}", e);
                    self.display_data.status = format!("Load failed: {}", e);
                }
            },
            Message::Tick => self.poll_channels(),
        }
    }

    fn start_listening(&mut self) {
        if self.audio_worker.is_some() {
            return;
        }
        match AudioWorker::spawn(&self.display_data.config) {
            Ok(worker) => {
                self.audio_worker = Some(worker);
                self.display_data.listening = true;
                self.display_data.status = "Listening".to_string();
                if self.display_data.training {
                    self.send_training_target();
                }
            }
            Err(e) => {
                error!("[MAIN] Cannot start listening: {:#}", e);
                self.display_data.status = format!("Cannot start: {:#}", e);
            }
        }
    }

    /// Releases the input device and clears the readout. Harmless when already stopped.
    fn stop_listening(&mut self) {
        if let Some(mut worker) = self.audio_worker.take() {
            worker.shutdown();
            info!("[MAIN] Listening stopped");
        }
        self.display_data.listening = false;
        self.display_data.last_result = None;
        self.display_data.status = "Stopped".to_string();
    }

    fn send(&self, command: SessionCommand) {
        if let Some(worker) = &self.audio_worker {
            worker.send(command);
        }
    }

    fn send_training_target(&self) {
        let trainer = &self.display_data.config.trainer;
        self.send(SessionCommand::StartTraining {
            target_midi: trainer.target_midi(),
            tolerance_cents: trainer.tolerance_cents,
        });
    }

    fn apply_loaded_config(&mut self, config: TunerConfig) {
        info!("[MAIN] Settings loaded from {}", SETTINGS_PATH);
        let was_listening = self.display_data.listening;
        self.stop_listening();
        self.display_data.reference_input = format_reference(config.tuning_reference_hz);
        self.display_data.config = config;
        if was_listening {
            self.start_listening();
        }
        self.restart_metronome();
        self.display_data.status = "Settings loaded".to_string();
    }

    fn start_metronome(&mut self) {
        let (beat_tx, beat_rx) = crossbeam_channel::unbounded();
        let settings = &self.display_data.config.metronome;
        let clock = MetronomeClock::spawn(settings.bpm, settings.beats_per_bar, beat_tx);
        self.metronome = Some((clock, beat_rx));
        self.display_data.metronome_running = true;
    }

    fn stop_metronome(&mut self) {
        if let Some((mut clock, _)) = self.metronome.take() {
            clock.stop();
        }
        self.display_data.metronome_running = false;
        self.display_data.last_beat = None;
    }

    fn restart_metronome(&mut self) {
        if self.metronome.is_some() {
            self.stop_metronome();
            self.start_metronome();
        }
    }

    fn poll_channels(&mut self) {
        if let Some(worker) = &self.audio_worker {
            while let Ok(result) = worker.result_rx.try_recv() {
                self.display_data.last_result = Some(result);
            }
            if worker.is_finished() {
                self.audio_worker = None;
                self.display_data.listening = false;
                self.display_data.last_result = None;
                self.display_data.status = "Audio input unavailable".to_string();
            }
        }

        if let Some((_, beat_rx)) = &self.metronome {
            while let Ok(beat) = beat_rx.try_recv() {
                self.display_data.last_beat = Some(beat);
            }
        }
    }

    fn view(&self) -> Element<'_, Message> {
        create_main_view(&self.display_data)
    }

    fn subscription(&self) -> Subscription<Message> {
        iced::time::every(Duration::from_millis(16)).map(|_| Message::Tick)
    }

    fn theme(&self) -> Theme {
        Theme::Dark
    }
}

fn format_reference(hz: f32) -> String {
    format!("{}", hz)
}
