//! # Main Display Module
//!
//! Layout of the tuner window: a readout column on the left and a settings
//! sidebar on the right holding the trainer and metronome panels.

use iced::widget::{Space, button, column, container, horizontal_space, pick_list, row, slider, text, text_input};
use iced::{Alignment, Color, Element, Length};
use tuner_core::config::{MAX_GAIN_DB, MAX_TOLERANCE_CENTS};
use tuner_core::metronome::{MAX_BPM, MIN_BPM};
use tuner_core::{PracticeSnapshot, SmoothingProfile};

use super::{cent_meter, note_keyboard};
use crate::{AppDisplayData, Message};

const OCTAVES: [i32; 7] = [1, 2, 3, 4, 5, 6, 7];
const BEATS_PER_BAR: [u32; 12] = [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12];

const ACTIVE: Color = Color::from_rgb(0.8, 0.2, 0.2);
const ACCENT_BEAT: Color = Color::from_rgb(1.0, 0.33, 0.33);
const PLAIN_BEAT: Color = Color::from_rgb(0.20, 0.86, 0.60);
const DIM: Color = Color::from_rgb(0.6, 0.6, 0.6);

pub fn create_main_view(data: &AppDisplayData) -> Element<'_, Message> {
    let main_column = column![
        row![
            text("Vocal Tuner").size(28),
            horizontal_space(),
            text(data.status.as_str()).size(14).color(DIM),
        ]
        .align_y(Alignment::Center),
        create_input_panel(data),
        create_readout_panel(data),
        create_keyboard_panel(data),
    ]
    .width(Length::Fill)
    .spacing(15);

    let sidebar = column![
        create_trainer_panel(data),
        create_metronome_panel(data),
        create_settings_panel(),
    ]
    .spacing(20)
    .padding(15)
    .width(Length::Fixed(280.0));

    container(row![main_column, Space::with_width(10), sidebar].padding(20))
        .width(Length::Fill)
        .height(Length::Fill)
        .into()
}

fn toggle_button(label: &str, active: bool, message: Message) -> Element<'_, Message> {
    let mut toggle = button(text(label).size(14)).padding([6, 12]).on_press(message);
    if active {
        toggle = toggle.style(|_theme, _status| button::Style {
            background: Some(iced::Background::Color(ACTIVE)),
            text_color: Color::WHITE,
            ..button::Style::default()
        });
    }
    toggle.into()
}

fn panel<'a>(title: &'a str, content: impl Into<Element<'a, Message>>) -> Element<'a, Message> {
    column![text(title).size(18), content.into()].spacing(8).into()
}

/// Listening controls: start/stop, device, profile, reference and gain.
fn create_input_panel(data: &AppDisplayData) -> Element<'_, Message> {
    let listen = if data.listening {
        toggle_button("Stop", true, Message::Stop)
    } else {
        toggle_button("Start", false, Message::Start)
    };

    let device = pick_list(
        data.devices.as_slice(),
        data.config.input_device.clone(),
        Message::DeviceSelected,
    )
    .placeholder("Default input");

    let profile = pick_list(
        SmoothingProfile::ALL,
        Some(data.config.smoothing),
        Message::ProfileSelected,
    );

    let reference = text_input("440", &data.reference_input)
        .on_input(Message::TuningReferenceChanged)
        .width(Length::Fixed(80.0));

    let gain_db = data.config.input_gain_db;
    let gain = slider(-MAX_GAIN_DB..=MAX_GAIN_DB, gain_db, Message::GainChanged)
        .step(0.5)
        .width(Length::Fixed(160.0));

    column![
        row![listen, device, profile].spacing(10).align_y(Alignment::Center),
        row![
            text("A4 (Hz)").size(14),
            reference,
            Space::with_width(20),
            text("Gain").size(14),
            gain,
            text(format!("{:+.1} dB", gain_db)).size(14),
        ]
        .spacing(10)
        .align_y(Alignment::Center),
    ]
    .spacing(10)
    .into()
}

fn create_readout_panel(data: &AppDisplayData) -> Element<'_, Message> {
    let result = data.last_result.as_ref();
    let reading = result.and_then(|r| r.reading);

    let note = reading.map_or_else(|| "--".to_string(), |r| r.note.to_string());
    let cents = reading.map_or_else(|| "-- ¢".to_string(), |r| format!("{:+} ¢", r.cents));
    let frequency = result
        .and_then(|r| r.smoothed_frequency_hz)
        .map_or_else(|| "-- Hz".to_string(), |hz| format!("{:.2} Hz", hz));
    let raw = result
        .and_then(|r| r.raw_frequency_hz)
        .map_or_else(|| "raw --".to_string(), |hz| format!("raw {:.1} Hz", hz));
    let rms = result.map_or(0.0, |r| r.rms);
    let held = reading.is_some_and(|r| r.held);

    let readout = row![
        text(note).size(56),
        Space::with_width(20),
        column![
            text(frequency).size(24),
            text(cents).size(24),
        ]
        .spacing(4),
        horizontal_space(),
        column![
            text(if held { "held" } else { "" }).size(14).color(DIM),
            text(raw).size(14).color(DIM),
            text(format!("RMS {:.3}", rms)).size(14).color(DIM),
        ]
        .spacing(4)
        .align_x(Alignment::End),
    ]
    .align_y(Alignment::Center);

    panel(
        "Pitch",
        column![
            readout,
            cent_meter::CentMeter::new(reading.map(|r| r.cents), held).view(),
        ]
        .spacing(10),
    )
}

fn create_keyboard_panel(data: &AppDisplayData) -> Element<'_, Message> {
    let detected = data
        .last_result
        .as_ref()
        .and_then(|r| r.reading)
        .map(|r| r.note.pitch_class);
    let target = data.training.then_some(data.config.trainer.note);
    panel("Notes", note_keyboard::NoteKeyboard::new(detected, target).view())
}

fn create_trainer_panel(data: &AppDisplayData) -> Element<'_, Message> {
    let trainer = &data.config.trainer;
    let snapshot = data
        .last_result
        .as_ref()
        .and_then(|r| r.practice)
        .filter(|_| data.training);

    let octave = pick_list(OCTAVES, Some(trainer.octave), Message::TrainerOctaveSelected);
    let tolerance = slider(1..=MAX_TOLERANCE_CENTS, trainer.tolerance_cents, Message::ToleranceChanged);

    panel(
        "Trainer",
        column![
            row![
                text(format!("Target {}", trainer.note)).size(16),
                horizontal_space(),
                text("Octave").size(14),
                octave,
            ]
            .spacing(8)
            .align_y(Alignment::Center),
            row![text(format!("±{} ¢", trainer.tolerance_cents)).size(14), tolerance]
                .spacing(8)
                .align_y(Alignment::Center),
            toggle_button(
                if data.training { "Stop training" } else { "Start training" },
                data.training,
                Message::ToggleTraining,
            ),
            practice_values(snapshot.as_ref()),
        ]
        .spacing(8),
    )
}

fn practice_values(snapshot: Option<&PracticeSnapshot>) -> Element<'static, Message> {
    let cents = |value: Option<String>| value.unwrap_or_else(|| "--".to_string());
    let (current, in_tune, best, mean) = match snapshot {
        Some(s) => (
            cents(s.current_error.map(|e| format!("{:+} ¢", e))),
            format!("{:.1} s", s.in_tune.as_secs_f32()),
            cents(s.best_abs_error.map(|e| format!("{} ¢", e))),
            cents(s.mean_abs_error.map(|e| format!("{:.1} ¢", e))),
        ),
        None => ("--".to_string(), "0.0 s".to_string(), "--".to_string(), "--".to_string()),
    };

    column![
        labelled("Error", current),
        labelled("In tune", in_tune),
        labelled("Best", best),
        labelled("Mean", mean),
    ]
    .spacing(4)
    .into()
}

fn labelled(label: &'static str, value: String) -> Element<'static, Message> {
    row![text(label).size(14).color(DIM), horizontal_space(), text(value).size(14)].into()
}

fn create_metronome_panel(data: &AppDisplayData) -> Element<'_, Message> {
    let settings = &data.config.metronome;

    let bpm = slider(MIN_BPM..=MAX_BPM, settings.bpm, Message::BpmChanged);
    let beats = pick_list(
        BEATS_PER_BAR,
        Some(settings.beats_per_bar),
        Message::BeatsPerBarSelected,
    );

    let indicator = (0..settings.beats_per_bar).fold(row![].spacing(6), |lights, index| {
        let light = match data.last_beat {
            Some(beat) if data.metronome_running && beat.index == index => {
                text("●").size(20).color(if beat.accent { ACCENT_BEAT } else { PLAIN_BEAT })
            }
            _ => text("○").size(20).color(DIM),
        };
        lights.push(light)
    });

    panel(
        "Metronome",
        column![
            row![text(format!("{} BPM", settings.bpm)).size(14), bpm]
                .spacing(8)
                .align_y(Alignment::Center),
            row![text("Beats per bar").size(14), horizontal_space(), beats]
                .spacing(8)
                .align_y(Alignment::Center),
            row![
                toggle_button(
                    if data.metronome_running { "Stop" } else { "Start" },
                    data.metronome_running,
                    Message::ToggleMetronome,
                ),
                Space::with_width(10),
                indicator,
            ]
            .align_y(Alignment::Center),
        ]
        .spacing(8),
    )
}

fn create_settings_panel() -> Element<'static, Message> {
    panel(
        "Settings",
        row![
            button(text("Save").size(14)).padding([6, 12]).on_press(Message::SaveSettings),
            button(text("Load").size(14)).padding([6, 12]).on_press(Message::LoadSettings),
        ]
        .spacing(10),
    )
}
