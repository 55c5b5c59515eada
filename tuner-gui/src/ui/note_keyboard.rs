//! # Note Keyboard
//!
//! One octave of keys, C to B. The key of the displayed note lights up
//! green and the trainer target is marked red. Clicking a key picks it as
//! the trainer note.

use iced::widget::canvas::{self, Event, Fill, Geometry, Path, Stroke, event};
use iced::widget::container;
use iced::{Color, Element, Point, Rectangle, Renderer, Size, Theme, mouse};
use tuner_core::PitchClass;

const WHITE_KEYS: usize = 7;
const BLACK_KEY_WIDTH: f32 = 0.6;
const BLACK_KEY_HEIGHT: f32 = 0.6;

const DETECTED: Color = Color::from_rgb(0.20, 0.86, 0.60);
const TARGET: Color = Color::from_rgb(1.0, 0.20, 0.20);

#[derive(Debug, Clone)]
pub struct NoteKeyboard {
    detected: Option<PitchClass>,
    target: Option<PitchClass>,
}

impl NoteKeyboard {
    pub fn new(detected: Option<PitchClass>, target: Option<PitchClass>) -> Self {
        Self { detected, target }
    }

    pub fn view(self) -> Element<'static, crate::Message> {
        container(
            canvas::Canvas::new(self)
                .width(iced::Length::Fill)
                .height(iced::Length::Fixed(110.0)),
        )
        .into()
    }

    fn fill_for(&self, key: PitchClass) -> Option<Color> {
        if self.target == Some(key) {
            Some(TARGET)
        } else if self.detected == Some(key) {
            Some(DETECTED)
        } else {
            None
        }
    }
}

/// Left edge of a black key, in white-key widths.
///
/// Black keys straddle the boundary after the white key below them.
fn black_key_offset(key: PitchClass) -> f32 {
    white_keys_below(key) as f32 - BLACK_KEY_WIDTH / 2.0
}

/// Number of white keys strictly below `key` within the octave.
fn white_keys_below(key: PitchClass) -> usize {
    PitchClass::ALL
        .iter()
        .take(key.index() as usize)
        .filter(|pc| !pc.is_sharp())
        .count()
}

fn key_at(bounds: Size, pos: Point) -> Option<PitchClass> {
    let white_width = bounds.width / WHITE_KEYS as f32;

    let black_hit = PitchClass::ALL.into_iter().filter(|pc| pc.is_sharp()).find(|&pc| {
        Rectangle {
            x: black_key_offset(pc) * white_width,
            y: 0.0,
            width: white_width * BLACK_KEY_WIDTH,
            height: bounds.height * BLACK_KEY_HEIGHT,
        }
        .contains(pos)
    });
    if black_hit.is_some() {
        return black_hit;
    }

    let column = (pos.x / white_width).floor() as usize;
    PitchClass::ALL
        .into_iter()
        .filter(|pc| !pc.is_sharp())
        .nth(column)
}

impl canvas::Program<crate::Message> for NoteKeyboard {
    type State = ();

    fn update(
        &self,
        _state: &mut Self::State,
        event: Event,
        bounds: Rectangle,
        cursor: mouse::Cursor,
    ) -> (event::Status, Option<crate::Message>) {
        if let (Event::Mouse(mouse::Event::ButtonPressed(mouse::Button::Left)), Some(position)) =
            (event, cursor.position_in(bounds))
        {
            if let Some(key) = key_at(bounds.size(), position) {
                return (event::Status::Captured, Some(crate::Message::KeySelected(key)));
            }
        }
        (event::Status::Ignored, None)
    }

    fn draw(
        &self,
        _state: &Self::State,
        renderer: &Renderer,
        _theme: &Theme,
        bounds: Rectangle,
        _cursor: mouse::Cursor,
    ) -> Vec<Geometry> {
        let mut frame = canvas::Frame::new(renderer, bounds.size());
        let white_width = bounds.width / WHITE_KEYS as f32;

        for (column, key) in PitchClass::ALL.into_iter().filter(|pc| !pc.is_sharp()).enumerate() {
            let origin = Point::new(column as f32 * white_width, 0.0);
            let size = Size::new(white_width, bounds.height);
            frame.fill_rectangle(origin, size, Fill::from(self.fill_for(key).unwrap_or(Color::WHITE)));
            frame.stroke(
                &Path::rectangle(origin, size),
                Stroke::default().with_color(Color::BLACK),
            );
        }

        for key in PitchClass::ALL.into_iter().filter(|pc| pc.is_sharp()) {
            frame.fill_rectangle(
                Point::new(black_key_offset(key) * white_width, 0.0),
                Size::new(white_width * BLACK_KEY_WIDTH, bounds.height * BLACK_KEY_HEIGHT),
                Fill::from(self.fill_for(key).unwrap_or(Color::BLACK)),
            );
        }

        vec![frame.into_geometry()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn black_keys_sit_between_their_neighbours() {
        assert_eq!(white_keys_below(PitchClass::CSharp), 1);
        assert_eq!(white_keys_below(PitchClass::FSharp), 3);
        assert_eq!(white_keys_below(PitchClass::B), 6);
    }

    #[test]
    fn clicks_map_to_keys() {
        let size = Size::new(700.0, 100.0);
        // Lower half only has white keys.
        assert_eq!(key_at(size, Point::new(50.0, 90.0)), Some(PitchClass::C));
        assert_eq!(key_at(size, Point::new(650.0, 90.0)), Some(PitchClass::B));
        // C♯ spans 70..130 across the top.
        assert_eq!(key_at(size, Point::new(100.0, 10.0)), Some(PitchClass::CSharp));
        assert_eq!(key_at(size, Point::new(150.0, 10.0)), Some(PitchClass::D));
    }
}
