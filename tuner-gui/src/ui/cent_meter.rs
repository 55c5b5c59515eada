//! # Cent Meter
//!
//! Horizontal meter for the stable cents value. The needle sits at the
//! centre when the displayed note is in tune and pins at either edge past
//! ±50 cents. A held note draws its needle dimmed.

use iced::widget::canvas::{self, Geometry, Path, Stroke, Text};
use iced::widget::container;
use iced::{Color, Element, Point, Rectangle, Renderer, Size, Theme, mouse};

const METER_RANGE: f32 = 50.0;
const GRADUATIONS: [i32; 5] = [-50, -25, 0, 25, 50];

/// Width of the green zone around the centre, in cents.
const IN_TUNE_CENTS: i32 = 5;
const CLOSE_CENTS: i32 = 20;

pub struct CentMeter {
    cents: Option<i32>,
    held: bool,
}

impl CentMeter {
    pub fn new(cents: Option<i32>, held: bool) -> Self {
        Self { cents, held }
    }

    pub fn view(self) -> Element<'static, crate::Message> {
        container(
            canvas::Canvas::new(self)
                .width(iced::Length::Fill)
                .height(iced::Length::Fixed(80.0)),
        )
        .into()
    }
}

fn position(cents: f32, width: f32) -> f32 {
    (cents.clamp(-METER_RANGE, METER_RANGE) + METER_RANGE) / (2.0 * METER_RANGE) * width
}

fn needle_color(cents: i32) -> Color {
    match cents.abs() {
        c if c <= IN_TUNE_CENTS => Color::from_rgb8(0x34, 0xDB, 0x98),
        c if c <= CLOSE_CENTS => Color::from_rgb8(0xFF, 0xC3, 0x00),
        _ => Color::from_rgb8(0xFF, 0x33, 0x33),
    }
}

impl<Message> canvas::Program<Message> for CentMeter {
    type State = ();

    fn draw(
        &self,
        _state: &Self::State,
        renderer: &Renderer,
        _theme: &Theme,
        bounds: Rectangle,
        _cursor: mouse::Cursor,
    ) -> Vec<Geometry> {
        let mut frame = canvas::Frame::new(renderer, bounds.size());
        let width = bounds.width;
        let scale_height = bounds.height - 18.0;

        frame.fill(
            &Path::rectangle(Point::ORIGIN, Size::new(width, scale_height)),
            Color::from_rgb8(0x30, 0x30, 0x30),
        );

        let zone_left = position(-IN_TUNE_CENTS as f32, width);
        let zone_right = position(IN_TUNE_CENTS as f32, width);
        frame.fill(
            &Path::rectangle(
                Point::new(zone_left, 0.0),
                Size::new(zone_right - zone_left, scale_height),
            ),
            Color::from_rgba8(0x34, 0xDB, 0x98, 0.2),
        );

        for mark in GRADUATIONS {
            let x = position(mark as f32, width);
            let emphasis = mark == 0;
            frame.stroke(
                &Path::line(Point::new(x, 0.0), Point::new(x, scale_height)),
                Stroke::default()
                    .with_width(if emphasis { 2.0 } else { 1.0 })
                    .with_color(if emphasis { Color::WHITE } else { Color::from_rgb8(0x80, 0x80, 0x80) }),
            );
            frame.fill_text(Text {
                content: format!("{:+}", mark),
                position: Point::new(x.clamp(4.0, width - 24.0), scale_height + 2.0),
                color: Color::from_rgb8(0xA0, 0xA0, 0xA0),
                size: iced::Pixels(12.0),
                ..Text::default()
            });
        }

        if let Some(cents) = self.cents {
            let x = position(cents as f32, width);
            let mut color = needle_color(cents);
            if self.held {
                color.a = 0.5;
            }
            frame.fill(
                &Path::rectangle(Point::new(x - 2.0, 0.0), Size::new(4.0, scale_height)),
                color,
            );
        }

        vec![frame.into_geometry()]
    }
}
